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

//! Canonical request for `TC3-HMAC-SHA256`.

use std::collections::BTreeMap;
use std::fmt::Write;

use http::Method;
use percent_encoding::utf8_percent_encode;
use tcapi_core::hash::hex_sha256;
use tcapi_core::Result;

use crate::constants::*;
use crate::request::RequestDescriptor;

/// Canonical form of a request, the input of the TC3 string to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub method: Method,
    /// Always `/`, the request path is not part of the signature.
    pub uri: String,
    /// Sorted and encoded query, also used as the url query of GET requests.
    pub query: String,
    pub content_type: String,
    pub host: String,
    pub payload_hash: String,
}

impl CanonicalRequest {
    /// Canonicalize a descriptor.
    pub fn build(req: &RequestDescriptor, unsigned_payload: bool) -> Result<Self> {
        let query = if req.http_method == Method::GET {
            canonical_query(&req.params)
        } else {
            String::new()
        };

        let payload_hash = if unsigned_payload {
            hex_sha256(UNSIGNED_PAYLOAD.as_bytes())
        } else {
            hex_sha256(req.payload.as_deref().unwrap_or_default())
        };

        Ok(Self {
            method: req.http_method.clone(),
            uri: CANONICAL_URI.to_string(),
            query,
            content_type: content_type(req),
            host: req.domain.clone(),
            payload_hash,
        })
    }

    /// Render the canonical request:
    ///
    /// ```text
    /// METHOD
    /// URI
    /// QUERY
    /// content-type:<content type>
    /// host:<host>
    ///
    /// content-type;host
    /// PAYLOAD_HASH
    /// ```
    pub fn to_canonical_string(&self) -> Result<String> {
        // 256 is enough for most requests.
        let mut f = String::with_capacity(256);

        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.uri)?;
        writeln!(f, "{}", self.query)?;
        writeln!(f, "content-type:{}", self.content_type)?;
        writeln!(f, "host:{}", self.host)?;
        writeln!(f)?;
        writeln!(f, "{TC3_SIGNED_HEADERS}")?;
        write!(f, "{}", self.payload_hash)?;

        Ok(f)
    }
}

/// Build the query of a GET request.
///
/// Protocol params travel in `X-TC-*` headers, so they are left out. Keys are
/// sorted by their raw value and both keys and values are percent encoded.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, &TENCENT_QUERY_ENCODE_SET),
                utf8_percent_encode(v, &TENCENT_QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Content type that will be sent and signed.
pub fn content_type(req: &RequestDescriptor) -> String {
    if req.http_method == Method::GET {
        return CONTENT_TYPE_FORM.to_string();
    }
    if req.is_octet_stream {
        return req
            .custom_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(http::header::CONTENT_TYPE.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| CONTENT_TYPE_OCTET_STREAM.to_string());
    }
    CONTENT_TYPE_JSON.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn descriptor(method: Method) -> RequestDescriptor {
        RequestDescriptor {
            service: "cvm".to_string(),
            version: "2017-03-12".to_string(),
            action: "DescribeInstances".to_string(),
            http_method: method,
            scheme: "https".to_string(),
            domain: "cvm.tencentcloudapi.com".to_string(),
            path: "/".to_string(),
            region: Some("ap-guangzhou".to_string()),
            params: BTreeMap::new(),
            payload: None,
            is_octet_stream: false,
            custom_headers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_canonical_query() {
        let params: BTreeMap<String, String> = [
            ("Limit", "10"),
            ("Filters.0.Name", "instance-name"),
            ("Filters.0.Values.0", "a b/c~d"),
            ("Action", "DescribeInstances"),
            ("Version", "2017-03-12"),
            ("Nonce", "123"),
            ("Region", "ap-guangzhou"),
            ("RequestClient", "SDK_RUST"),
            ("Timestamp", "1551113065"),
            ("Offset", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(
            canonical_query(&params),
            "Filters.0.Name=instance-name&Filters.0.Values.0=a%20b%2Fc~d&Limit=10&Offset=0"
        );
    }

    #[test]
    fn test_canonical_get() -> Result<()> {
        let mut req = descriptor(Method::GET);
        req.params.insert("Limit".to_string(), "1".to_string());
        req.params.insert("Offset".to_string(), "0".to_string());

        let creq = CanonicalRequest::build(&req, false)?;
        assert_eq!(
            creq.to_canonical_string()?,
            "GET\n/\nLimit=1&Offset=0\ncontent-type:application/x-www-form-urlencoded\nhost:cvm.tencentcloudapi.com\n\ncontent-type;host\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        Ok(())
    }

    #[test]
    fn test_canonical_post() -> Result<()> {
        let mut req = descriptor(Method::POST);
        req.params.insert("Limit".to_string(), "1".to_string());
        req.payload = Some(Bytes::from_static(br#"{"Limit": 1, "Filters": [{"Values": ["\u672a\u547d\u540d"], "Name": "instance-name"}]}"#));

        let creq = CanonicalRequest::build(&req, false)?;
        assert_eq!(creq.query, "");
        assert_eq!(
            creq.to_canonical_string()?,
            "POST\n/\n\ncontent-type:application/json\nhost:cvm.tencentcloudapi.com\n\ncontent-type;host\n35e9c5b0e3ae67532d3c9f17ead6c90222632e5b1ff7f6e89887f1398934f064"
        );
        Ok(())
    }

    #[test]
    fn test_canonical_uri_ignores_path() -> Result<()> {
        let mut req = descriptor(Method::GET);
        req.path = "/v2/index.php".to_string();

        let creq = CanonicalRequest::build(&req, false)?;
        assert_eq!(creq.uri, "/");
        assert!(creq.to_canonical_string()?.starts_with("GET\n/\n\n"));
        assert_eq!(req.base_url(), "https://cvm.tencentcloudapi.com/v2/index.php");
        Ok(())
    }

    #[test]
    fn test_unsigned_payload() -> Result<()> {
        let mut req = descriptor(Method::POST);
        req.payload = Some(Bytes::from_static(br#"{"Name":"x"}"#));

        let creq = CanonicalRequest::build(&req, true)?;
        assert_eq!(creq.payload_hash, hex_sha256(b"UNSIGNED-PAYLOAD"));
        Ok(())
    }

    #[test]
    fn test_content_type() {
        let mut req = descriptor(Method::POST);
        assert_eq!(content_type(&req), "application/json");

        req.is_octet_stream = true;
        assert_eq!(content_type(&req), "application/octet-stream");

        req.custom_headers
            .insert("content-type".to_string(), "application/x-protobuf".to_string());
        assert_eq!(content_type(&req), "application/x-protobuf");

        let req = descriptor(Method::GET);
        assert_eq!(content_type(&req), "application/x-www-form-urlencoded");
    }
}
