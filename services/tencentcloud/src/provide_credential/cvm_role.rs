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

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use log::debug;
use serde::Deserialize;
use tcapi_core::time::{from_timestamp, parse_rfc3339};
use tcapi_core::{Context, Error, ProvideCredential, Result, SigningCredential};

use crate::constants::*;
use crate::Credential;

/// CvmRoleCredentialProvider loads temporary credentials of the CAM role bound
/// to the CVM instance from the instance metadata service.
///
/// Credentials are cached until they are about to expire. Set
/// `TENCENTCLOUD_CVM_METADATA_DISABLED=true` to skip this provider.
#[derive(Debug, Default, Clone)]
pub struct CvmRoleCredentialProvider {
    endpoint: Option<String>,
    role_name: Option<String>,
    cache: Arc<Mutex<Option<Credential>>>,
}

impl CvmRoleCredentialProvider {
    /// Create a new CvmRoleCredentialProvider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint of the metadata service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use this role instead of discovering the one bound to the instance.
    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(DEFAULT_CVM_METADATA_ENDPOINT)
            .trim_end_matches('/')
    }

    async fn get(&self, ctx: &Context, url: &str) -> Result<String> {
        let req = http::Request::builder()
            .method(Method::GET)
            .uri(url)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build metadata request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::config_invalid("failed to reach CVM metadata service")
                .with_source(e)
                .with_context(format!("url: {url}"))
                .with_context("hint: check if running on a CVM instance")
        })?;

        if resp.status() != StatusCode::OK {
            return Err(Error::config_invalid(format!(
                "CVM metadata service returned {}",
                resp.status()
            ))
            .with_context(format!("url: {url}"))
            .with_context(format!("body: {}", resp.body())));
        }
        Ok(resp.into_body())
    }

    async fn role_name(&self, ctx: &Context) -> Result<String> {
        if let Some(role) = &self.role_name {
            return Ok(role.clone());
        }

        let url = format!(
            "{}/latest/meta-data/cam/security-credentials/",
            self.endpoint()
        );
        let content = self.get(ctx, &url).await?;
        let role = content.lines().next().unwrap_or_default().trim().to_string();
        if role.is_empty() {
            return Err(Error::config_invalid("no CAM role bound to CVM instance")
                .with_context("hint: bind a CAM role to your CVM instance"));
        }
        Ok(role)
    }
}

#[async_trait]
impl ProvideCredential for CvmRoleCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if ctx
            .env_var(TENCENTCLOUD_CVM_METADATA_DISABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(None);
        }

        {
            let cached = self.cache.lock().expect("lock poisoned");
            if let Some(cred) = cached.as_ref().filter(|v| v.is_valid()) {
                return Ok(Some(cred.clone()));
            }
        }

        let role = self.role_name(ctx).await?;
        let url = format!(
            "{}/latest/meta-data/cam/security-credentials/{role}",
            self.endpoint()
        );
        let content = self.get(ctx, &url).await?;

        let resp: CvmRoleCredentials = serde_json::from_str(&content).map_err(|e| {
            Error::unexpected("failed to parse CVM role credentials")
                .with_source(e)
                .with_context(format!("role: {role}"))
        })?;
        if resp.code != "Success" {
            return Err(Error::credential_invalid(format!(
                "CVM metadata service returned code {}",
                resp.code
            ))
            .with_context(format!("role: {role}")));
        }

        let expires_in = if !resp.expiration.is_empty() {
            parse_rfc3339(&resp.expiration)?
        } else {
            from_timestamp(resp.expired_time)?
        };
        debug!("loaded credential of CAM role {role}, expires at {expires_in}");

        let cred = Credential {
            secret_id: resp.tmp_secret_id,
            secret_key: resp.tmp_secret_key,
            token: Some(resp.token).filter(|v| !v.is_empty()),
            expires_in: Some(expires_in),
        };
        *self.cache.lock().expect("lock poisoned") = Some(cred.clone());

        Ok(Some(cred))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CvmRoleCredentials {
    tmp_secret_id: String,
    tmp_secret_key: String,
    token: String,
    expired_time: i64,
    expiration: String,
    code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use tcapi_core::{ErrorKind, HttpSend, StaticEnv};

    #[derive(Debug, Clone, Default)]
    struct MetadataServer {
        responses: Arc<Mutex<VecDeque<(u16, String)>>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl MetadataServer {
        fn new(responses: Vec<(u16, String)>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpSend for MetadataServer {
        async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
            self.requests.lock().unwrap().push(req.uri().to_string());
            let (status, body) = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request");
            Ok(http::Response::builder()
                .status(status)
                .body(Bytes::from(body))
                .unwrap())
        }
    }

    fn credentials(expiration: &str) -> String {
        format!(
            r#"{{"TmpSecretId":"tmp_id","TmpSecretKey":"tmp_key","ExpiredTime":1615590047,"Expiration":"{expiration}","Token":"tmp_token","Code":"Success"}}"#
        )
    }

    #[tokio::test]
    async fn test_cvm_role_credential_provider() -> anyhow::Result<()> {
        let expiration = (tcapi_core::time::now() + chrono::TimeDelta::try_hours(6).unwrap())
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let server = MetadataServer::new(vec![
            (200, "tcapi-role".to_string()),
            (200, credentials(&expiration)),
        ]);
        let ctx = Context::new().with_http_send(server.clone());
        let provider = CvmRoleCredentialProvider::new();

        let cred = provider
            .provide_credential(&ctx)
            .await?
            .expect("credential must be provided");
        assert_eq!(cred.secret_id, "tmp_id");
        assert_eq!(cred.secret_key, "tmp_key");
        assert_eq!(cred.token(), Some("tmp_token"));
        assert!(cred.expires_in.is_some());

        // Served from cache.
        let cached = provider
            .provide_credential(&ctx)
            .await?
            .expect("credential must be provided");
        assert_eq!(cached, cred);
        assert_eq!(
            server.requests(),
            vec![
                "http://metadata.tencentyun.com/latest/meta-data/cam/security-credentials/",
                "http://metadata.tencentyun.com/latest/meta-data/cam/security-credentials/tcapi-role",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_cache_is_refreshed() -> anyhow::Result<()> {
        let server = MetadataServer::new(vec![
            (200, credentials("2021-03-12T23:00:47Z")),
            (200, credentials("2021-03-12T23:00:47Z")),
        ]);
        let ctx = Context::new().with_http_send(server.clone());
        let provider = CvmRoleCredentialProvider::new()
            .with_endpoint("http://127.0.0.1:8080/")
            .with_role_name("fixed-role");

        provider.provide_credential(&ctx).await?;
        provider.provide_credential(&ctx).await?;
        assert_eq!(
            server.requests(),
            vec![
                "http://127.0.0.1:8080/latest/meta-data/cam/security-credentials/fixed-role",
                "http://127.0.0.1:8080/latest/meta-data/cam/security-credentials/fixed-role",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_metadata_errors() -> anyhow::Result<()> {
        let server = MetadataServer::new(vec![(404, "not found".to_string())]);
        let ctx = Context::new().with_http_send(server);
        let err = CvmRoleCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .expect_err("metadata must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let server = MetadataServer::new(vec![(
            200,
            r#"{"Code":"AssumeRoleFailed"}"#.to_string(),
        )]);
        let ctx = Context::new().with_http_send(server);
        let err = CvmRoleCredentialProvider::new()
            .with_role_name("role")
            .provide_credential(&ctx)
            .await
            .expect_err("metadata must fail");
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
        Ok(())
    }

    #[tokio::test]
    async fn test_disabled() -> anyhow::Result<()> {
        let ctx = Context::new().with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from([(
                TENCENTCLOUD_CVM_METADATA_DISABLED.to_string(),
                "true".to_string(),
            )]),
        });
        let cred = CvmRoleCredentialProvider::new().provide_credential(&ctx).await?;
        assert!(cred.is_none());
        Ok(())
    }
}
