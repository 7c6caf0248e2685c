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

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use http::Method;
use tcapi_core::{Error, Result};

use crate::constants::*;
use crate::retry::Backoff;

/// Algorithm used to sign requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SignMethod {
    /// Legacy query string signature with HMAC-SHA1.
    HmacSha1,
    /// Legacy query string signature with HMAC-SHA256.
    HmacSha256,
    /// Canonical request signature, `TC3-HMAC-SHA256`.
    #[default]
    Tc3HmacSha256,
}

impl SignMethod {
    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignMethod::HmacSha1 => "HmacSHA1",
            SignMethod::HmacSha256 => "HmacSHA256",
            SignMethod::Tc3HmacSha256 => TC3_ALGORITHM,
        }
    }
}

impl Display for SignMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HmacSHA1" => Ok(SignMethod::HmacSha1),
            "HmacSHA256" => Ok(SignMethod::HmacSha256),
            TC3_ALGORITHM => Ok(SignMethod::Tc3HmacSha256),
            v => Err(Error::config_invalid(format!("unsupported sign method: {v}"))),
        }
    }
}

/// Transport profile shared by every call of a client.
///
/// Per-request options take precedence over the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// `https` or `http`.
    pub scheme: String,
    /// Root domain used to build `<service>.<root_domain>`.
    pub root_domain: String,
    /// Fixed endpoint that overrides the per-service domain.
    pub endpoint: Option<String>,
    /// Default http method, `POST` or `GET`.
    pub request_method: Method,
    /// Timeout of a single attempt.
    pub request_timeout: Duration,
    /// Language of error messages, `zh-CN` or `en-US`.
    pub language: String,
    /// Signing algorithm.
    pub sign_method: SignMethod,
    /// Sign the literal `UNSIGNED-PAYLOAD` instead of the body (TC3 only).
    pub unsigned_payload: bool,
    /// Retries allowed for network failures on idempotent requests.
    pub network_failure_max_retries: u32,
    /// Backoff between network failure retries.
    pub network_failure_backoff: Backoff,
    /// Retries allowed for throttled calls.
    pub rate_limit_max_retries: u32,
    /// Backoff between rate limit retries.
    pub rate_limit_backoff: Backoff,
    /// Error codes treated as throttling.
    pub rate_limit_codes: Vec<String>,
    /// Dump outgoing requests and incoming responses via `log::debug!`.
    pub debug: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            root_domain: DEFAULT_ROOT_DOMAIN.to_string(),
            endpoint: None,
            request_method: Method::POST,
            request_timeout: Duration::from_secs(60),
            language: DEFAULT_LANGUAGE.to_string(),
            sign_method: SignMethod::default(),
            unsigned_payload: false,
            network_failure_max_retries: 0,
            network_failure_backoff: Backoff::default(),
            rate_limit_max_retries: 0,
            rate_limit_backoff: Backoff::default(),
            rate_limit_codes: RATE_LIMIT_CODES.iter().map(|v| v.to_string()).collect(),
            debug: false,
        }
    }
}

impl Profile {
    /// Create a profile with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the root domain.
    pub fn with_root_domain(mut self, root_domain: impl Into<String>) -> Self {
        self.root_domain = root_domain.into();
        self
    }

    /// Set a fixed endpoint such as `ccc.ap-guangzhou.tencentcloudapi.com`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the default http method.
    pub fn with_request_method(mut self, method: Method) -> Self {
        self.request_method = method;
        self
    }

    /// Set the timeout of a single attempt.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the language of error messages.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the signing algorithm.
    pub fn with_sign_method(mut self, sign_method: SignMethod) -> Self {
        self.sign_method = sign_method;
        self
    }

    /// Enable or disable unsigned payload.
    pub fn with_unsigned_payload(mut self, unsigned_payload: bool) -> Self {
        self.unsigned_payload = unsigned_payload;
        self
    }

    /// Configure network failure retries.
    pub fn with_network_failure_retry(mut self, max_retries: u32, backoff: Backoff) -> Self {
        self.network_failure_max_retries = max_retries;
        self.network_failure_backoff = backoff;
        self
    }

    /// Configure rate limit retries.
    pub fn with_rate_limit_retry(mut self, max_retries: u32, backoff: Backoff) -> Self {
        self.rate_limit_max_retries = max_retries;
        self.rate_limit_backoff = backoff;
        self
    }

    /// Replace the error codes treated as throttling.
    pub fn with_rate_limit_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rate_limit_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the debug dump.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check that the profile can be used to build requests.
    pub fn validate(&self) -> Result<()> {
        if self.scheme != "https" && self.scheme != "http" {
            return Err(Error::config_invalid(format!(
                "unsupported scheme: {}",
                self.scheme
            )));
        }
        if self.root_domain.is_empty() && self.endpoint.is_none() {
            return Err(Error::config_invalid(
                "either root domain or endpoint must be set",
            ));
        }
        if matches!(&self.endpoint, Some(v) if v.is_empty()) {
            return Err(Error::config_invalid("endpoint must not be empty"));
        }
        if self.request_method != Method::POST && self.request_method != Method::GET {
            return Err(Error::config_invalid(format!(
                "unsupported request method: {}",
                self.request_method
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config_invalid("request timeout must be positive"));
        }
        if self.unsigned_payload && self.sign_method != SignMethod::Tc3HmacSha256 {
            return Err(Error::config_invalid(format!(
                "unsigned payload is not supported by {}",
                self.sign_method
            )));
        }

        Ok(())
    }

    pub(crate) fn is_rate_limit_code(&self, code: &str) -> bool {
        self.rate_limit_codes.iter().any(|v| v == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tcapi_core::ErrorKind;
    use test_case::test_case;

    #[test]
    fn test_default_profile() {
        let profile = Profile::default();

        assert_eq!(profile.scheme, "https");
        assert_eq!(profile.root_domain, "tencentcloudapi.com");
        assert_eq!(profile.request_method, Method::POST);
        assert_eq!(profile.request_timeout, Duration::from_secs(60));
        assert_eq!(profile.language, "zh-CN");
        assert_eq!(profile.sign_method, SignMethod::Tc3HmacSha256);
        assert!(!profile.unsigned_payload);
        assert_eq!(profile.network_failure_max_retries, 0);
        assert_eq!(profile.rate_limit_max_retries, 0);
        assert!(profile.is_rate_limit_code("RequestLimitExceeded.UinLimitExceeded"));
        assert!(!profile.is_rate_limit_code("LimitExceeded"));
        assert!(profile.validate().is_ok());
    }

    #[test_case("HmacSHA1", SignMethod::HmacSha1)]
    #[test_case("HmacSHA256", SignMethod::HmacSha256)]
    #[test_case("TC3-HMAC-SHA256", SignMethod::Tc3HmacSha256)]
    fn test_sign_method_from_str(input: &str, expected: SignMethod) {
        let method: SignMethod = input.parse().expect("must be valid");
        assert_eq!(method, expected);
        assert_eq!(method.as_str(), input);
    }

    #[test]
    fn test_sign_method_unknown() {
        let err = "HmacMD5".parse::<SignMethod>().expect_err("must be invalid");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test_case(Profile::new().with_scheme("ftp"); "bad scheme")]
    #[test_case(Profile::new().with_root_domain(""); "no domain")]
    #[test_case(Profile::new().with_endpoint(""); "empty endpoint")]
    #[test_case(Profile::new().with_request_method(Method::PUT); "bad method")]
    #[test_case(Profile::new().with_request_timeout(Duration::ZERO); "zero timeout")]
    #[test_case(
        Profile::new().with_unsigned_payload(true).with_sign_method(SignMethod::HmacSha256);
        "unsigned payload with v1"
    )]
    fn test_invalid_profile(profile: Profile) {
        let err = profile.validate().expect_err("must be invalid");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_endpoint_without_root_domain() {
        let profile = Profile::new()
            .with_root_domain("")
            .with_endpoint("ccc.internal.tencentcloudapi.com");
        assert!(profile.validate().is_ok());
    }
}
