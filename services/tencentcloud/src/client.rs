// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::sync::Arc;

use log::{debug, warn};
use tcapi_core::time::now;
use tcapi_core::{Context, Error, ProvideCredential, Result, SigningCredential};
use tokio_util::sync::CancellationToken;

use crate::request::{ApiRequest, RequestDescriptor};
use crate::response::{decode, ApiResponse, RawResponse};
use crate::retry::{new_client_token, RetryDecision, RetryPolicy};
use crate::sign_request::{signer_from_profile, SignRequest, SigningContext};
use crate::{Credential, Profile, V3Signer};

/// Client signs and dispatches API requests.
///
/// Cloning is cheap: clones share the transport, the credential provider and
/// the signer. Every call keeps its own retry state, so a client can serve
/// concurrent calls.
///
/// ```no_run
/// use tcapi_core::{Context, OsEnv};
/// use tcapi_http_send_reqwest::ReqwestHttpSend;
/// use tcapi_tencentcloud::{Client, CommonRequest, DefaultCredentialProvider, Profile};
///
/// # async fn example() -> tcapi_core::Result<()> {
/// let ctx = Context::new()
///     .with_http_send(ReqwestHttpSend::default())
///     .with_env(OsEnv);
/// let client = Client::new(ctx, DefaultCredentialProvider::new())
///     .with_region("ap-guangzhou")
///     .with_profile(Profile::new().with_language("en-US"))?;
///
/// let req = CommonRequest::new("cvm", "2017-03-12", "DescribeZones");
/// let resp = client.send(req).await?;
/// println!("{}", resp.request_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    ctx: Context,
    provider: Arc<dyn ProvideCredential<Credential = Credential>>,
    region: Option<String>,
    profile: Profile,
    signer: Arc<dyn SignRequest>,
    policy: RetryPolicy,
}

impl Client {
    /// Create a client with the default profile.
    pub fn new(ctx: Context, provider: impl ProvideCredential<Credential = Credential>) -> Self {
        let profile = Profile::default();
        Self {
            ctx,
            provider: Arc::new(provider),
            region: None,
            signer: Arc::new(V3Signer::new().with_language(&profile.language)),
            policy: RetryPolicy::from_profile(&profile),
            profile,
        }
    }

    /// Set the region sent with every request.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Replace the profile, the signer and the retry policy follow it.
    pub fn with_profile(mut self, profile: Profile) -> Result<Self> {
        profile.validate()?;
        self.signer = signer_from_profile(&profile)?;
        self.policy = RetryPolicy::from_profile(&profile);
        self.profile = profile;
        Ok(self)
    }

    /// Region of this client.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Profile of this client.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Send a request and decode its response.
    pub async fn send<R: ApiRequest>(&self, req: R) -> Result<R::Response> {
        self.send_with_cancel(req, &CancellationToken::new()).await
    }

    /// Send a request, giving up as soon as `cancel` is triggered.
    ///
    /// Cancellation is observed before every attempt, while waiting for the
    /// response and during backoff. It always returns a
    /// [`tcapi_core::ErrorKind::Cancelled`] error.
    pub async fn send_with_cancel<R: ApiRequest>(
        &self,
        mut req: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response> {
        let idempotent = match req.as_idempotent_mut() {
            Some(idem) => {
                if self.policy.is_enabled() && idem.client_token().map_or(true, str::is_empty) {
                    idem.set_client_token(new_client_token());
                }
                true
            }
            None => false,
        };

        let desc = RequestDescriptor::build(&req, &self.profile, self.region.as_deref())
            .map_err(|e| with_action(e, &req))?;

        let mut state = self.policy.start();
        loop {
            if cancel.is_cancelled() {
                return Err(with_action(cancelled(), &req));
            }

            // Credential loading and transmission both stop on cancellation.
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(with_action(cancelled(), &req)),
                result = self.attempt(&desc) => result,
            };
            let err = match result {
                Ok(raw) => return R::Response::from_raw(raw),
                Err(err) => err,
            };

            let attempt = state.attempt + 1;
            match self.policy.decide(&mut state, &err, idempotent) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        "{}.{} attempt {attempt} failed, retrying in {delay:?}: {err}",
                        desc.service, desc.action
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(with_action(cancelled(), &req)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::Exhausted => {
                    return Err(with_action(
                        err.with_context(format!("retries exhausted after {attempt} attempts")),
                        &req,
                    ));
                }
                RetryDecision::Fatal => return Err(with_action(err, &req)),
            }
        }
    }

    async fn attempt(&self, desc: &RequestDescriptor) -> Result<RawResponse> {
        let cred = self.load_credential().await?;

        // Always sign with a fresh timestamp.
        let signing = SigningContext::new(now(), &desc.service);
        let envelope = self.signer.sign_request(desc, &cred, &signing)?;
        if self.profile.debug {
            debug!("sending request:\n{}", envelope.dump());
        }
        let req = envelope.into_http_request()?;

        let timeout = self.profile.request_timeout;
        let resp = tokio::time::timeout(timeout, self.ctx.http_send(req))
            .await
            .map_err(|_| Error::network(format!("request timed out after {timeout:?}")))??;

        if self.profile.debug {
            debug!(
                "received response: {}\n{}",
                resp.status(),
                String::from_utf8_lossy(resp.body())
            );
        }
        decode(resp, &self.profile)
    }

    async fn load_credential(&self) -> Result<Credential> {
        let cred = match self.provider.provide_credential(&self.ctx).await {
            Ok(Some(cred)) => cred,
            Ok(None) => {
                return Err(Error::config_invalid("no credential available")
                    .with_context("hint: configure a credential provider"))
            }
            Err(err) if err.is_config_error() => return Err(err),
            Err(err) => {
                return Err(Error::config_invalid("failed to load credential").with_source(err))
            }
        };

        if !cred.is_valid() {
            return Err(Error::credential_invalid(
                "credential is empty or about to expire",
            ));
        }
        Ok(cred)
    }
}

fn cancelled() -> Error {
    Error::cancelled("request cancelled by caller")
}

fn with_action<R: ApiRequest>(err: Error, req: &R) -> Error {
    err.with_context(format!("action: {}.{}", req.service(), req.action()))
}
