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

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

// Headers used by the TC3 protocol.
pub const X_TC_ACTION: &str = "x-tc-action";
pub const X_TC_VERSION: &str = "x-tc-version";
pub const X_TC_TIMESTAMP: &str = "x-tc-timestamp";
pub const X_TC_REQUEST_CLIENT: &str = "x-tc-requestclient";
pub const X_TC_LANGUAGE: &str = "x-tc-language";
pub const X_TC_REGION: &str = "x-tc-region";
pub const X_TC_TOKEN: &str = "x-tc-token";
pub const X_TC_CONTENT_SHA256: &str = "x-tc-content-sha256";

pub const TC3_ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const TC3_TERMINATOR: &str = "tc3_request";
pub const CANONICAL_URI: &str = "/";
pub const TC3_SIGNED_HEADERS: &str = "content-type;host";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

// Protocol-common params.
pub const PARAM_ACTION: &str = "Action";
pub const PARAM_VERSION: &str = "Version";
pub const PARAM_NONCE: &str = "Nonce";
pub const PARAM_REGION: &str = "Region";
pub const PARAM_REQUEST_CLIENT: &str = "RequestClient";
pub const PARAM_TIMESTAMP: &str = "Timestamp";
pub const PARAM_SECRET_ID: &str = "SecretId";
pub const PARAM_SIGNATURE_METHOD: &str = "SignatureMethod";
pub const PARAM_SIGNATURE: &str = "Signature";
pub const PARAM_TOKEN: &str = "Token";
pub const PARAM_LANGUAGE: &str = "Language";

/// Params carried by headers in TC3, never part of the canonical query.
pub const RESERVED_PARAMS: [&str; 6] = [
    PARAM_ACTION,
    PARAM_VERSION,
    PARAM_NONCE,
    PARAM_REGION,
    PARAM_REQUEST_CLIENT,
    PARAM_TIMESTAMP,
];

pub const REQUEST_CLIENT: &str = concat!("SDK_RUST_", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_ROOT_DOMAIN: &str = "tencentcloudapi.com";
pub const DEFAULT_LANGUAGE: &str = "zh-CN";

/// Error codes the service uses to signal throttling.
pub const RATE_LIMIT_CODES: [&str; 4] = [
    "RequestLimitExceeded",
    "RequestLimitExceeded.UinLimitExceeded",
    "RequestLimitExceeded.GlobalRegionUinLimitExceeded",
    "RequestLimitExceeded.IPLimitExceeded",
];

/// Error code prefix the service uses to reject signatures and credentials.
pub const AUTH_FAILURE_CODE: &str = "AuthFailure";

// Env values used by credential providers.
pub const TENCENTCLOUD_SECRET_ID: &str = "TENCENTCLOUD_SECRET_ID";
pub const TENCENTCLOUD_SECRET_KEY: &str = "TENCENTCLOUD_SECRET_KEY";
pub const TENCENTCLOUD_TOKEN: &str = "TENCENTCLOUD_TOKEN";
pub const TENCENTCLOUD_SECURITY_TOKEN: &str = "TENCENTCLOUD_SECURITY_TOKEN";
pub const TENCENTCLOUD_CREDENTIALS_FILE: &str = "TENCENTCLOUD_CREDENTIALS_FILE";
pub const TENCENTCLOUD_PROFILE: &str = "TENCENTCLOUD_PROFILE";
pub const TENCENTCLOUD_CVM_METADATA_DISABLED: &str = "TENCENTCLOUD_CVM_METADATA_DISABLED";

pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.tencentcloud/credentials";
pub const DEFAULT_CVM_METADATA_ENDPOINT: &str = "http://metadata.tencentyun.com";

/// AsciiSet for query encoding.
///
/// Percent encode every byte except the unreserved characters: 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'.
pub static TENCENT_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
