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

//! Request model: the [`ApiRequest`] trait implemented by API inputs and the
//! [`RequestDescriptor`] the signers work on.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::Method;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tcapi_core::{Error, Result};

use crate::response::{ApiResponse, Response};
use crate::Profile;

/// Per-request overrides of the transport profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Http method, falls back to [`Profile::request_method`].
    pub method: Option<Method>,
    /// Scheme, falls back to [`Profile::scheme`].
    pub scheme: Option<String>,
    /// Domain, falls back to [`Profile::endpoint`] and then `<service>.<root_domain>`.
    pub domain: Option<String>,
    /// Path, falls back to `/`.
    pub path: Option<String>,
    /// Extra headers, only sent with octet-stream bodies.
    pub headers: BTreeMap<String, String>,
}

/// Requests that the server can deduplicate through a `ClientToken`.
///
/// Only idempotent requests are resent after network failures.
pub trait Idempotent {
    /// The token currently carried by the request.
    fn client_token(&self) -> Option<&str>;
    /// Replace the token.
    fn set_client_token(&mut self, token: String);
}

/// Input of one API action.
///
/// The request fields are taken from the `Serialize` implementation: they form
/// the JSON body of POST requests and the flattened query of GET requests.
pub trait ApiRequest: Serialize + Send + Sync {
    /// Output of the action.
    type Response: ApiResponse;

    /// Service name, like `ccc`.
    fn service(&self) -> &str;
    /// API version, like `2020-02-10`.
    fn version(&self) -> &str;
    /// Action name, like `CreateStaff`.
    fn action(&self) -> &str;

    /// Overrides of the transport profile.
    fn options(&self) -> RequestOptions {
        RequestOptions::default()
    }

    /// Raw body for actions that upload an `application/octet-stream` payload.
    fn octet_stream_body(&self) -> Option<Bytes> {
        None
    }

    /// Expose the idempotency capability.
    fn as_idempotent_mut(&mut self) -> Option<&mut dyn Idempotent> {
        None
    }
}

/// Resolved description of a request, read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub service: String,
    pub version: String,
    pub action: String,
    pub http_method: Method,
    pub scheme: String,
    pub domain: String,
    pub path: String,
    pub region: Option<String>,
    /// Flattened request fields.
    pub params: BTreeMap<String, String>,
    /// Body for POST requests: JSON fields or the octet-stream body.
    pub payload: Option<Bytes>,
    pub is_octet_stream: bool,
    pub custom_headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Resolve a request against the profile.
    ///
    /// Any error here happens before the first attempt.
    pub fn build<R: ApiRequest>(
        req: &R,
        profile: &Profile,
        region: Option<&str>,
    ) -> Result<Self> {
        let opts = req.options();

        let http_method = opts
            .method
            .unwrap_or_else(|| profile.request_method.clone());
        if http_method != Method::GET && http_method != Method::POST {
            return Err(Error::request_invalid(format!(
                "unsupported http method: {http_method}"
            )));
        }

        let scheme = opts.scheme.unwrap_or_else(|| profile.scheme.clone());
        if scheme != "https" && scheme != "http" {
            return Err(Error::request_invalid(format!("unsupported scheme: {scheme}")));
        }

        let domain = match opts.domain.or_else(|| profile.endpoint.clone()) {
            Some(v) => v,
            None => format!("{}.{}", req.service(), profile.root_domain),
        };
        let path = match opts.path {
            Some(v) if !v.is_empty() => v,
            _ => "/".to_string(),
        };

        let value = serde_json::to_value(req).map_err(|e| {
            Error::request_invalid("failed to serialize request").with_source(e)
        })?;
        let params = flatten(&value)?;

        let octet = req.octet_stream_body();
        if octet.is_some() && http_method == Method::GET {
            return Err(Error::request_invalid(
                "octet-stream body can't be sent with GET",
            ));
        }

        let is_octet_stream = octet.is_some();
        let payload = match octet {
            Some(body) => Some(body),
            None if http_method == Method::POST => {
                let bs = serde_json::to_vec(req).map_err(|e| {
                    Error::request_invalid("failed to serialize request").with_source(e)
                })?;
                Some(Bytes::from(bs))
            }
            None => None,
        };

        Ok(Self {
            service: req.service().to_string(),
            version: req.version().to_string(),
            action: req.action().to_string(),
            http_method,
            scheme,
            domain,
            path,
            region: region.filter(|v| !v.is_empty()).map(|v| v.to_string()),
            params,
            payload,
            is_octet_stream,
            custom_headers: opts.headers,
        })
    }

    /// Url without query.
    pub fn base_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.domain, self.path)
    }
}

/// Flatten a JSON object into `Outer.Inner` / `List.0` style params.
pub fn flatten(value: &Value) -> Result<BTreeMap<String, String>> {
    let Value::Object(fields) = value else {
        return Err(Error::request_invalid(
            "request must serialize into a JSON object",
        ));
    };

    let mut params = BTreeMap::new();
    for (k, v) in fields {
        flatten_value(k.clone(), v, &mut params);
    }
    Ok(params)
}

fn flatten_value(key: String, value: &Value, params: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::String(v) => {
            params.insert(key, v.clone());
        }
        Value::Bool(_) | Value::Number(_) => {
            params.insert(key, value.to_string());
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten_value(format!("{key}.{idx}"), item, params);
            }
        }
        Value::Object(fields) => {
            for (k, v) in fields {
                flatten_value(format!("{key}.{k}"), v, params);
            }
        }
    }
}

const CLIENT_TOKEN: &str = "ClientToken";

/// Request built at runtime from a service, version, action and a JSON object.
///
/// Useful for actions without a typed model.
#[derive(Debug, Clone, Default)]
pub struct CommonRequest {
    service: String,
    version: String,
    action: String,
    params: Map<String, Value>,
    options: RequestOptions,
    octet_stream_body: Option<Bytes>,
    idempotent: bool,
}

impl CommonRequest {
    /// Create a request without params.
    pub fn new(
        service: impl Into<String>,
        version: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    /// Set a single param.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replace params with the fields of a JSON object string.
    pub fn with_params_json(mut self, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            Error::request_invalid("failed to parse request params").with_source(e)
        })?;
        let Value::Object(params) = value else {
            return Err(Error::request_invalid("request params must be a JSON object"));
        };
        self.params = params;
        Ok(self)
    }

    /// Send `body` as `application/octet-stream` together with `headers`.
    ///
    /// The params are still available as flattened fields but not sent as body.
    pub fn with_octet_stream(mut self, body: Bytes, headers: BTreeMap<String, String>) -> Self {
        self.octet_stream_body = Some(body);
        self.options.headers = headers;
        self
    }

    /// Override the transport options of this request.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        let headers = std::mem::take(&mut self.options.headers);
        self.options = options;
        if self.options.headers.is_empty() {
            self.options.headers = headers;
        }
        self
    }

    /// Mark the action as idempotent, enabling network failure retries and
    /// `ClientToken` injection.
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Params of the request.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

impl Serialize for CommonRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.params.serialize(serializer)
    }
}

impl Idempotent for CommonRequest {
    fn client_token(&self) -> Option<&str> {
        self.params.get(CLIENT_TOKEN).and_then(Value::as_str)
    }

    fn set_client_token(&mut self, token: String) {
        self.params.insert(CLIENT_TOKEN.to_string(), Value::String(token));
    }
}

impl ApiRequest for CommonRequest {
    type Response = Response<Value>;

    fn service(&self) -> &str {
        &self.service
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn action(&self) -> &str {
        &self.action
    }

    fn options(&self) -> RequestOptions {
        self.options.clone()
    }

    fn octet_stream_body(&self) -> Option<Bytes> {
        self.octet_stream_body.clone()
    }

    fn as_idempotent_mut(&mut self) -> Option<&mut dyn Idempotent> {
        if self.idempotent {
            Some(self)
        } else {
            None
        }
    }
}
