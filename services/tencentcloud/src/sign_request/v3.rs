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

use std::fmt::Write;

use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use log::debug;
use tcapi_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use tcapi_core::{Error, Result};

use super::{SignRequest, SignedEnvelope, SigningContext};
use crate::canonical::CanonicalRequest;
use crate::constants::*;
use crate::request::RequestDescriptor;
use crate::Credential;

/// Signer for `TC3-HMAC-SHA256`.
///
/// - [Signature v3](https://www.tencentcloud.com/document/api/213/33224)
#[derive(Debug, Clone)]
pub struct V3Signer {
    language: String,
    unsigned_payload: bool,
}

impl Default for V3Signer {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            unsigned_payload: false,
        }
    }
}

impl V3Signer {
    /// Create a signer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of `X-TC-Language`, empty to omit it.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Sign `UNSIGNED-PAYLOAD` instead of the body.
    pub fn with_unsigned_payload(mut self, unsigned_payload: bool) -> Self {
        self.unsigned_payload = unsigned_payload;
        self
    }
}

impl SignRequest for V3Signer {
    fn sign_request(
        &self,
        req: &RequestDescriptor,
        cred: &Credential,
        signing: &SigningContext,
    ) -> Result<SignedEnvelope> {
        let creq = CanonicalRequest::build(req, self.unsigned_payload)?;
        let canonical = creq.to_canonical_string()?;
        debug!("calculated canonical request: {canonical}");

        // StringToSign:
        //
        // TC3-HMAC-SHA256
        // 1600000000
        // 2020-09-13/ccc/tc3_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "{TC3_ALGORITHM}")?;
            writeln!(f, "{}", signing.timestamp)?;
            writeln!(f, "{}", signing.credential_scope)?;
            write!(f, "{}", hex_sha256(canonical.as_bytes()))?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key = generate_signing_key(&cred.secret_key, &signing.date, &req.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut headers = HeaderMap::new();
        // Custom headers go first so protocol headers always win.
        if req.is_octet_stream {
            for (k, v) in &req.custom_headers {
                headers.insert(HeaderName::try_from(k.as_str())?, HeaderValue::try_from(v)?);
            }
        }
        headers.insert(HOST, HeaderValue::try_from(&creq.host)?);
        headers.insert(CONTENT_TYPE, HeaderValue::try_from(&creq.content_type)?);
        headers.insert(X_TC_ACTION, HeaderValue::try_from(&req.action)?);
        headers.insert(X_TC_VERSION, HeaderValue::try_from(&req.version)?);
        headers.insert(X_TC_TIMESTAMP, HeaderValue::from(signing.timestamp));
        headers.insert(X_TC_REQUEST_CLIENT, HeaderValue::from_static(REQUEST_CLIENT));
        if !self.language.is_empty() {
            headers.insert(X_TC_LANGUAGE, HeaderValue::try_from(&self.language)?);
        }
        if let Some(region) = &req.region {
            headers.insert(X_TC_REGION, HeaderValue::try_from(region)?);
        }
        if let Some(token) = cred.token() {
            let mut value = HeaderValue::try_from(token)?;
            value.set_sensitive(true);
            headers.insert(X_TC_TOKEN, value);
        }
        if self.unsigned_payload {
            headers.insert(X_TC_CONTENT_SHA256, HeaderValue::from_static(UNSIGNED_PAYLOAD));
        }

        let mut authorization = HeaderValue::try_from(format!(
            "{TC3_ALGORITHM} Credential={}/{}, SignedHeaders={TC3_SIGNED_HEADERS}, Signature={signature}",
            cred.secret_id, signing.credential_scope,
        ))
        .map_err(|e| {
            Error::request_invalid("failed to create authorization header").with_source(e)
        })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let mut url = req.base_url();
        if req.http_method == Method::GET && !creq.query.is_empty() {
            url.push('?');
            url.push_str(&creq.query);
        }

        Ok(SignedEnvelope {
            method: req.http_method.clone(),
            url,
            headers,
            body: req.payload.clone().unwrap_or_default(),
        })
    }
}

fn generate_signing_key(secret: &str, date: &str, service: &str) -> Vec<u8> {
    let secret_date = hmac_sha256(format!("TC3{secret}").as_bytes(), date.as_bytes());
    let secret_service = hmac_sha256(&secret_date, service.as_bytes());
    hmac_sha256(&secret_service, TC3_TERMINATOR.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tcapi_core::time::from_timestamp;

    fn describe_instances() -> RequestDescriptor {
        RequestDescriptor {
            service: "cvm".to_string(),
            version: "2017-03-12".to_string(),
            action: "DescribeInstances".to_string(),
            http_method: Method::POST,
            scheme: "https".to_string(),
            domain: "cvm.tencentcloudapi.com".to_string(),
            path: "/".to_string(),
            region: Some("ap-guangzhou".to_string()),
            params: BTreeMap::new(),
            payload: Some(Bytes::from_static(
                r#"{"Limit": 1, "Filters": [{"Values": ["未命名"], "Name": "instance-name"}]}"#.as_bytes(),
            )),
            is_octet_stream: false,
            custom_headers: BTreeMap::new(),
        }
    }

    fn credential() -> Credential {
        Credential::new(
            "AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE",
            "Gu5t9xGARNpq86cd98joQYCN3EXAMPLE",
        )
    }

    #[test]
    fn test_sign_post() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let signing = SigningContext::new(from_timestamp(1551113065)?, "cvm");
        let envelope = V3Signer::new().sign_request(&describe_instances(), &credential(), &signing)?;

        assert_eq!(envelope.method, Method::POST);
        assert_eq!(envelope.url, "https://cvm.tencentcloudapi.com/");
        assert_eq!(
            envelope.headers[AUTHORIZATION],
            "TC3-HMAC-SHA256 Credential=AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE/2019-02-25/cvm/tc3_request, SignedHeaders=content-type;host, Signature=991261763bfe618b138134febd0bbda2eb9110679f443da53c0f17ad3e4aaa9b"
        );
        assert!(envelope.headers[AUTHORIZATION].is_sensitive());
        assert_eq!(envelope.headers[HOST], "cvm.tencentcloudapi.com");
        assert_eq!(envelope.headers[CONTENT_TYPE], "application/json");
        assert_eq!(envelope.headers[X_TC_ACTION], "DescribeInstances");
        assert_eq!(envelope.headers[X_TC_VERSION], "2017-03-12");
        assert_eq!(envelope.headers[X_TC_TIMESTAMP], "1551113065");
        assert_eq!(envelope.headers[X_TC_REGION], "ap-guangzhou");
        assert_eq!(envelope.headers[X_TC_LANGUAGE], "zh-CN");
        assert_eq!(envelope.headers[X_TC_REQUEST_CLIENT], REQUEST_CLIENT);
        assert!(envelope.headers.get(X_TC_TOKEN).is_none());
        assert!(envelope.headers.get(X_TC_CONTENT_SHA256).is_none());
        Ok(())
    }

    #[test]
    fn test_sign_get() -> Result<()> {
        let mut req = describe_instances();
        req.http_method = Method::GET;
        req.payload = None;
        req.params = [("Limit", "1"), ("Offset", "0"), ("Action", "DescribeInstances")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let signing = SigningContext::new(from_timestamp(1551113065)?, "cvm");
        let envelope = V3Signer::new().sign_request(&req, &credential(), &signing)?;

        assert_eq!(envelope.url, "https://cvm.tencentcloudapi.com/?Limit=1&Offset=0");
        assert_eq!(envelope.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert!(envelope.body.is_empty());
        assert_eq!(
            envelope.headers[AUTHORIZATION],
            "TC3-HMAC-SHA256 Credential=AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE/2019-02-25/cvm/tc3_request, SignedHeaders=content-type;host, Signature=17fce503e5968a70d2c4675b40a56818ac6d5c8f985aec73a35c4a208abfd458"
        );
        Ok(())
    }

    #[test]
    fn test_sign_with_token_and_unsigned_payload() -> Result<()> {
        let mut req = describe_instances();
        req.region = None;
        let cred = credential().with_token("session-token");

        let signing = SigningContext::new(from_timestamp(1551113065)?, "cvm");
        let envelope = V3Signer::new()
            .with_unsigned_payload(true)
            .with_language("en-US")
            .sign_request(&req, &cred, &signing)?;

        assert_eq!(envelope.headers[X_TC_TOKEN], "session-token");
        assert!(envelope.headers[X_TC_TOKEN].is_sensitive());
        assert_eq!(envelope.headers[X_TC_CONTENT_SHA256], "UNSIGNED-PAYLOAD");
        assert_eq!(envelope.headers[X_TC_LANGUAGE], "en-US");
        assert!(envelope.headers.get(X_TC_REGION).is_none());
        // The body is still sent as is.
        assert_eq!(Some(&envelope.body), req.payload.as_ref());
        Ok(())
    }

    #[test]
    fn test_sign_octet_stream() -> Result<()> {
        let mut req = describe_instances();
        req.is_octet_stream = true;
        req.payload = Some(Bytes::from_static(b"\x00\x01\x02"));
        req.custom_headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/octet-stream".to_string()),
            ("X-CLS-TopicId".to_string(), "topic".to_string()),
            ("X-TC-Action".to_string(), "Overridden".to_string()),
        ]);

        let signing = SigningContext::new(from_timestamp(1551113065)?, "cvm");
        let envelope = V3Signer::new().sign_request(&req, &credential(), &signing)?;

        assert_eq!(envelope.headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(envelope.headers["x-cls-topicid"], "topic");
        assert_eq!(envelope.headers[X_TC_ACTION], "DescribeInstances");
        assert_eq!(envelope.body.as_ref(), b"\x00\x01\x02");
        Ok(())
    }

    #[test]
    fn test_invalid_custom_header() -> Result<()> {
        let mut req = describe_instances();
        req.is_octet_stream = true;
        req.custom_headers = BTreeMap::from([("bad header".to_string(), "v".to_string())]);

        let signing = SigningContext::new(from_timestamp(1551113065)?, "cvm");
        let err = V3Signer::new()
            .sign_request(&req, &credential(), &signing)
            .expect_err("must be invalid");
        assert_eq!(err.kind(), tcapi_core::ErrorKind::RequestInvalid);
        Ok(())
    }
}
