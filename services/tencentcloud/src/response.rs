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

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tcapi_core::{Error, Result};

use crate::constants::AUTH_FAILURE_CODE;
use crate::Profile;

/// Error reported inside the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Decoded `{"Response": {...}}` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// `RequestId` assigned by the server.
    pub request_id: String,
    /// `Error` object, if any.
    pub error: Option<ServiceError>,
    /// Content of `Response`.
    pub body: Map<String, Value>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Map<String, Value>,
}

impl RawResponse {
    /// Parse the envelope from response bytes.
    pub fn parse(bs: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bs).map_err(|e| {
            Error::unexpected("failed to parse response envelope")
                .with_code("ClientError.ParseJsonError")
                .with_source(e)
        })?;
        let body = envelope.response;

        let request_id = body
            .get("RequestId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let error = match body.get("Error") {
            Some(v) => Some(ServiceError::deserialize(v).map_err(|e| {
                Error::unexpected("failed to parse error in response")
                    .with_code("ClientError.ParseJsonError")
                    .with_request_id(&request_id)
                    .with_source(e)
            })?),
            None => None,
        };

        Ok(Self {
            request_id,
            error,
            body,
        })
    }
}

/// Output of an API action.
pub trait ApiResponse: Sized + Send {
    /// Build the output from a successful envelope.
    fn from_raw(raw: RawResponse) -> Result<Self>;
}

/// Typed response with the `RequestId` split out.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub request_id: String,
    pub data: T,
}

impl<T: DeserializeOwned + Send> ApiResponse for Response<T> {
    fn from_raw(raw: RawResponse) -> Result<Self> {
        let data = T::deserialize(Value::Object(raw.body)).map_err(|e| {
            Error::unexpected("failed to deserialize response")
                .with_code("ClientError.ParseJsonError")
                .with_request_id(&raw.request_id)
                .with_source(e)
        })?;
        Ok(Self {
            request_id: raw.request_id,
            data,
        })
    }
}

/// Turn an http response into an envelope or a classified error.
pub(crate) fn decode(resp: http::Response<Bytes>, profile: &Profile) -> Result<RawResponse> {
    let status = resp.status();
    let body = resp.into_body();

    match RawResponse::parse(&body) {
        Ok(raw) => match raw.error {
            Some(err) => Err(classify(err, &raw.request_id, profile)),
            None if status.is_success() => Ok(raw),
            None => Err(status_error(status, &body)),
        },
        Err(err) if status.is_success() => Err(err),
        Err(_) => Err(status_error(status, &body)),
    }
}

fn classify(err: ServiceError, request_id: &str, profile: &Profile) -> Error {
    let is_auth = err.code == AUTH_FAILURE_CODE
        || err
            .code
            .strip_prefix(AUTH_FAILURE_CODE)
            .is_some_and(|v| v.starts_with('.'));

    let e = if profile.is_rate_limit_code(&err.code) {
        Error::throttled(err.message)
    } else if is_auth {
        Error::authentication_failed(err.message)
    } else {
        Error::service(err.message)
    };
    e.with_code(err.code).with_request_id(request_id)
}

fn status_error(status: StatusCode, body: &[u8]) -> Error {
    let message = format!(
        "unexpected http status {status}: {}",
        String::from_utf8_lossy(body)
    );
    let e = if status.is_server_error() {
        Error::network(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::authentication_failed(message)
    } else {
        Error::unexpected(message)
    };
    e.with_code("ClientError.HttpStatusCodeError")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tcapi_core::ErrorKind;
    use test_case::test_case;

    fn response(status: u16, body: &str) -> http::Response<Bytes> {
        http::Response::builder()
            .status(status)
            .body(Bytes::from(body.to_string()))
            .expect("must be valid")
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct CreateStaffResponse {
        error_staff_list: Vec<String>,
    }

    #[test]
    fn test_decode_success() -> Result<()> {
        let raw = decode(
            response(
                200,
                r#"{"Response":{"ErrorStaffList":[],"RequestId":"ebdc4b5c-9e1a-4e1b-bfb4-1a0e1a1e1a1e"}}"#,
            ),
            &Profile::default(),
        )?;
        assert_eq!(raw.request_id, "ebdc4b5c-9e1a-4e1b-bfb4-1a0e1a1e1a1e");
        assert_eq!(raw.error, None);

        let resp = Response::<CreateStaffResponse>::from_raw(raw)?;
        assert_eq!(resp.request_id, "ebdc4b5c-9e1a-4e1b-bfb4-1a0e1a1e1a1e");
        assert_eq!(resp.data.error_staff_list, Vec::<String>::new());
        Ok(())
    }

    #[test_case("RequestLimitExceeded", ErrorKind::Throttled)]
    #[test_case("RequestLimitExceeded.UinLimitExceeded", ErrorKind::Throttled)]
    #[test_case("AuthFailure", ErrorKind::AuthenticationFailed)]
    #[test_case("AuthFailure.SignatureExpire", ErrorKind::AuthenticationFailed)]
    #[test_case("AuthFailureX", ErrorKind::Service)]
    #[test_case("InvalidParameter", ErrorKind::Service)]
    #[test_case("LimitExceeded", ErrorKind::Service)]
    fn test_decode_service_error(code: &str, kind: ErrorKind) {
        let body = format!(
            r#"{{"Response":{{"Error":{{"Code":"{code}","Message":"boom"}},"RequestId":"req-1"}}}}"#
        );
        let err = decode(response(200, &body), &Profile::default()).expect_err("must fail");

        assert_eq!(err.kind(), kind);
        assert_eq!(err.code(), Some(code));
        assert_eq!(err.message(), "boom");
        assert_eq!(err.request_id(), Some("req-1"));
    }

    #[test]
    fn test_custom_rate_limit_codes() {
        let profile = Profile::default().with_rate_limit_codes(["ResourceBusy"]);
        let body = r#"{"Response":{"Error":{"Code":"ResourceBusy","Message":"busy"},"RequestId":"req-1"}}"#;
        let err = decode(response(200, body), &profile).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Throttled);

        let body = r#"{"Response":{"Error":{"Code":"RequestLimitExceeded","Message":"slow"},"RequestId":"req-2"}}"#;
        let err = decode(response(200, body), &profile).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Service);
    }

    #[test_case(502, "<html>bad gateway</html>", ErrorKind::Network)]
    #[test_case(503, "", ErrorKind::Network)]
    #[test_case(401, "", ErrorKind::AuthenticationFailed)]
    #[test_case(403, "forbidden", ErrorKind::AuthenticationFailed)]
    #[test_case(404, "not found", ErrorKind::Unexpected)]
    #[test_case(200, "not json", ErrorKind::Unexpected)]
    fn test_decode_without_envelope(status: u16, body: &str, kind: ErrorKind) {
        let err = decode(response(status, body), &Profile::default()).expect_err("must fail");
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_structured_error_wins_over_status() {
        let body = r#"{"Response":{"Error":{"Code":"InternalError","Message":"oops"},"RequestId":"req-1"}}"#;
        let err = decode(response(500, body), &Profile::default()).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Service);
        assert_eq!(err.code(), Some("InternalError"));
    }
}
