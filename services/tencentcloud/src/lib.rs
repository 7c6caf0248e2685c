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

//! Signing and dispatching Tencent Cloud API 3.0 requests.
//!
//! This crate builds canonical requests, signs them with `TC3-HMAC-SHA256` or
//! the legacy `HmacSHA1` / `HmacSHA256` signatures, and sends them with
//! bounded retries for network failures and throttling.
//!
//! ## Overview
//!
//! - [`Client`] drives a call: credential, signing, transport, decoding and retries.
//! - [`ApiRequest`] / [`ApiResponse`] describe an action; [`CommonRequest`] covers
//!   actions without a typed model.
//! - [`Profile`] holds transport settings shared by every call of a client.
//! - [`V3Signer`] and [`V1Signer`] implement [`SignRequest`].
//! - Credential providers: [`StaticCredentialProvider`], [`EnvCredentialProvider`],
//!   [`ProfileCredentialProvider`], [`CvmRoleCredentialProvider`] and the
//!   [`DefaultCredentialProvider`] chain.
//!
//! ## Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use tcapi_core::{Context, OsEnv, Result};
//! use tcapi_file_read_tokio::TokioFileRead;
//! use tcapi_http_send_reqwest::ReqwestHttpSend;
//! use tcapi_tencentcloud::{ApiRequest, Client, DefaultCredentialProvider, Response};
//!
//! #[derive(Serialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct CreateStaffRequest {
//!     sdk_app_id: u64,
//!     staffs: Vec<Staff>,
//! }
//!
//! #[derive(Serialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct Staff {
//!     mail: String,
//!     staff_name: String,
//! }
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct CreateStaffResponse {
//!     error_staff_list: Option<Vec<serde_json::Value>>,
//! }
//!
//! impl ApiRequest for CreateStaffRequest {
//!     type Response = Response<CreateStaffResponse>;
//!
//!     fn service(&self) -> &str { "ccc" }
//!     fn version(&self) -> &str { "2020-02-10" }
//!     fn action(&self) -> &str { "CreateStaff" }
//! }
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::new()
//!     .with_file_read(TokioFileRead)
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//! let client = Client::new(ctx, DefaultCredentialProvider::new()).with_region("ap-guangzhou");
//!
//! let resp = client
//!     .send(CreateStaffRequest {
//!         sdk_app_id: 1400000000,
//!         staffs: vec![Staff {
//!             mail: "staff@example.com".to_string(),
//!             staff_name: "staff".to_string(),
//!         }],
//!     })
//!     .await?;
//! println!("request id: {}", resp.request_id);
//! # Ok(())
//! # }
//! ```

mod constants;

mod credential;
pub use credential::Credential;

mod profile;
pub use profile::{Profile, SignMethod};

mod retry;
pub use retry::{Backoff, RetryDecision, RetryPolicy, RetryState};

mod request;
pub use request::{flatten, ApiRequest, CommonRequest, Idempotent, RequestDescriptor, RequestOptions};

mod response;
pub use response::{ApiResponse, RawResponse, Response, ServiceError};

mod canonical;
pub use canonical::{canonical_query, CanonicalRequest};

mod sign_request;
pub use sign_request::{
    signer_from_profile, SignRequest, SignedEnvelope, SigningContext, V1Signer, V3Signer,
};

mod client;
pub use client::Client;

mod provide_credential;
pub use provide_credential::*;
