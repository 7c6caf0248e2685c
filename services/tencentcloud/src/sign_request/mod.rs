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

//! Signers turning a [`RequestDescriptor`] into a [`SignedEnvelope`].

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use rand::Rng;
use tcapi_core::time::{format_date, DateTime};
use tcapi_core::utils::Redact;
use tcapi_core::{Error, Result};

use crate::constants::{TC3_TERMINATOR, X_TC_TOKEN};
use crate::request::RequestDescriptor;
use crate::{Credential, Profile, SignMethod};

mod v1;
pub use v1::V1Signer;

mod v3;
pub use v3::V3Signer;

/// Time bound values of one signing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    /// Unix seconds.
    pub timestamp: i64,
    /// `YYYY-MM-DD` in UTC, derived from `timestamp`.
    pub date: String,
    /// `<date>/<service>/tc3_request`
    pub credential_scope: String,
    /// Random number used by the legacy signature.
    pub nonce: u32,
}

impl SigningContext {
    /// Build the context of an attempt starting at `now`.
    pub fn new(now: DateTime, service: &str) -> Self {
        let date = format_date(now);
        Self {
            timestamp: now.timestamp(),
            credential_scope: format!("{date}/{service}/{TC3_TERMINATOR}"),
            date,
            nonce: rand::thread_rng().gen_range(1..=u32::MAX),
        }
    }

    /// Use a fixed nonce.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
}

/// Request ready to be sent, only valid for the timestamp it was signed with.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl SignedEnvelope {
    /// Convert into an http request for [`tcapi_core::HttpSend`].
    pub fn into_http_request(self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method)
            .uri(&self.url)
            .body(self.body)?;
        *req.headers_mut() = self.headers;
        Ok(req)
    }

    /// Human readable dump with secrets redacted.
    pub fn dump(&self) -> String {
        let mut out = format!("{} {}\n", self.method, self.url);
        for (name, value) in self.headers.iter() {
            let value = value.to_str().unwrap_or("<binary>");
            if value_is_secret(name) {
                out.push_str(&format!("{name}: {}\n", Redact::from(value)));
            } else {
                out.push_str(&format!("{name}: {value}\n"));
            }
        }
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(&self.body));
        out
    }
}

fn value_is_secret(name: &http::HeaderName) -> bool {
    name == http::header::AUTHORIZATION || name.as_str() == X_TC_TOKEN
}

/// Sign a resolved request with a credential.
///
/// Signing is pure: the same inputs always produce the same envelope.
pub trait SignRequest: Debug + Send + Sync + 'static {
    /// Build the envelope of one attempt.
    fn sign_request(
        &self,
        req: &RequestDescriptor,
        cred: &Credential,
        signing: &SigningContext,
    ) -> Result<SignedEnvelope>;
}

/// Pick the signer configured by the profile.
pub fn signer_from_profile(profile: &Profile) -> Result<Arc<dyn SignRequest>> {
    let signer: Arc<dyn SignRequest> = match profile.sign_method {
        SignMethod::Tc3HmacSha256 => Arc::new(
            V3Signer::new()
                .with_language(&profile.language)
                .with_unsigned_payload(profile.unsigned_payload),
        ),
        method @ (SignMethod::HmacSha1 | SignMethod::HmacSha256) => {
            if profile.unsigned_payload {
                return Err(Error::config_invalid(format!(
                    "unsigned payload is not supported by {method}"
                )));
            }
            Arc::new(V1Signer::new(method)?.with_language(&profile.language))
        }
    };
    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tcapi_core::time::from_timestamp;

    #[test]
    fn test_signing_context() -> Result<()> {
        let ctx = SigningContext::new(from_timestamp(1600000000)?, "ccc");

        assert_eq!(ctx.timestamp, 1600000000);
        assert_eq!(ctx.date, "2020-09-13");
        assert_eq!(ctx.credential_scope, "2020-09-13/ccc/tc3_request");
        assert_ne!(ctx.nonce, 0);
        Ok(())
    }

    #[test]
    fn test_dump_redacts_secrets() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(X_TC_TOKEN, "a-very-secret-session-token".parse()?);
        headers.insert(http::header::HOST, "ccc.tencentcloudapi.com".parse()?);
        let envelope = SignedEnvelope {
            method: Method::POST,
            url: "https://ccc.tencentcloudapi.com/".to_string(),
            headers,
            body: Bytes::from_static(b"{}"),
        };

        let dump = envelope.dump();
        assert!(dump.starts_with("POST https://ccc.tencentcloudapi.com/\n"));
        assert!(dump.contains("host: ccc.tencentcloudapi.com"));
        assert!(!dump.contains("a-very-secret-session-token"));

        let req = envelope.into_http_request()?;
        assert_eq!(req.uri().host(), Some("ccc.tencentcloudapi.com"));
        assert_eq!(req.body().as_ref(), b"{}");
        Ok(())
    }

    #[test]
    fn test_signer_from_profile() {
        assert!(signer_from_profile(&Profile::default()).is_ok());
        assert!(
            signer_from_profile(&Profile::default().with_sign_method(SignMethod::HmacSha1)).is_ok()
        );
        assert!(signer_from_profile(
            &Profile::default()
                .with_sign_method(SignMethod::HmacSha256)
                .with_unsigned_payload(true)
        )
        .is_err());
    }
}
