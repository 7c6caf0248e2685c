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

use std::collections::BTreeMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderValue, Method};
use log::debug;
use percent_encoding::utf8_percent_encode;
use tcapi_core::hash::{base64_hmac_sha1, base64_hmac_sha256};
use tcapi_core::{Error, Result};

use super::{SignRequest, SignedEnvelope, SigningContext};
use crate::constants::*;
use crate::request::RequestDescriptor;
use crate::{Credential, SignMethod};

/// Signer for the legacy `HmacSHA1` and `HmacSHA256` signatures.
///
/// Every param, including the protocol ones, travels in the query of GET
/// requests or in the form body of POST requests.
#[derive(Debug, Clone)]
pub struct V1Signer {
    method: SignMethod,
    language: String,
}

impl V1Signer {
    /// Create a signer for `HmacSHA1` or `HmacSHA256`.
    pub fn new(method: SignMethod) -> Result<Self> {
        if method == SignMethod::Tc3HmacSha256 {
            return Err(Error::config_invalid(format!(
                "{method} is not a legacy sign method"
            )));
        }
        Ok(Self {
            method,
            language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    /// Set the `Language` param, empty to omit it.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    fn params(
        &self,
        req: &RequestDescriptor,
        cred: &Credential,
        signing: &SigningContext,
    ) -> BTreeMap<String, String> {
        let mut params = req.params.clone();
        params.remove(PARAM_SIGNATURE);

        let mut set = |k: &str, v: &str| {
            params.insert(k.to_string(), v.to_string());
        };
        set(PARAM_ACTION, &req.action);
        set(PARAM_VERSION, &req.version);
        if let Some(region) = &req.region {
            set(PARAM_REGION, region);
        }
        set(PARAM_TIMESTAMP, &signing.timestamp.to_string());
        set(PARAM_NONCE, &signing.nonce.to_string());
        set(PARAM_REQUEST_CLIENT, REQUEST_CLIENT);
        set(PARAM_SECRET_ID, &cred.secret_id);
        set(PARAM_SIGNATURE_METHOD, self.method.as_str());
        if let Some(token) = cred.token() {
            set(PARAM_TOKEN, token);
        }
        if !self.language.is_empty() {
            set(PARAM_LANGUAGE, &self.language);
        }
        params
    }
}

impl SignRequest for V1Signer {
    fn sign_request(
        &self,
        req: &RequestDescriptor,
        cred: &Credential,
        signing: &SigningContext,
    ) -> Result<SignedEnvelope> {
        if req.is_octet_stream {
            return Err(Error::request_invalid(format!(
                "octet-stream body can't be signed with {}",
                self.method
            )));
        }

        let mut params = self.params(req, cred, signing);

        // StringToSign: POSTcvm.tencentcloudapi.com/?Action=...&Nonce=...
        let string_to_sign = format!(
            "{}{}{}?{}",
            req.http_method,
            req.domain,
            req.path,
            params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        );
        debug!("calculated string to sign: {string_to_sign}");

        let signature = match self.method {
            SignMethod::HmacSha1 => {
                base64_hmac_sha1(cred.secret_key.as_bytes(), string_to_sign.as_bytes())
            }
            _ => base64_hmac_sha256(cred.secret_key.as_bytes(), string_to_sign.as_bytes()),
        };
        params.insert(PARAM_SIGNATURE.to_string(), signature);

        let encoded = params
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, &TENCENT_QUERY_ENCODE_SET),
                    utf8_percent_encode(v, &TENCENT_QUERY_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::try_from(&req.domain)?);

        let (url, body) = if req.http_method == Method::GET {
            (format!("{}?{encoded}", req.base_url()), Bytes::new())
        } else {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_FORM));
            (req.base_url(), Bytes::from(encoded))
        };

        Ok(SignedEnvelope {
            method: req.http_method.clone(),
            url,
            headers,
            body,
        })
    }
}
