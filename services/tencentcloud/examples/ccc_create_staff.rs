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

//! Create seats of a Cloud Contact Center instance.
//!
//! ```shell
//! TENCENTCLOUD_SECRET_ID=xxx TENCENTCLOUD_SECRET_KEY=xxx \
//!     cargo run --example ccc_create_staff -- 1400000000 alice@example.com
//! ```

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tcapi_core::{Context, Error, OsEnv, Result};
use tcapi_file_read_tokio::TokioFileRead;
use tcapi_http_send_reqwest::ReqwestHttpSend;
use tcapi_tencentcloud::{
    ApiRequest, Backoff, Client, DefaultCredentialProvider, Profile, Response,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateStaffRequest {
    sdk_app_id: u64,
    staffs: Vec<SeatUserInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SeatUserInfo {
    name: String,
    mail: String,
    staff_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateStaffResponse {
    #[serde(default)]
    error_staff_list: Vec<serde_json::Value>,
}

impl ApiRequest for CreateStaffRequest {
    type Response = Response<CreateStaffResponse>;

    fn service(&self) -> &str {
        "ccc"
    }
    fn version(&self) -> &str {
        "2020-02-10"
    }
    fn action(&self) -> &str {
        "CreateStaff"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(app_id), Some(mail)) = (args.next(), args.next()) else {
        return Err(Error::config_invalid("usage: ccc_create_staff <sdk_app_id> <mail>"));
    };
    let sdk_app_id = app_id
        .parse()
        .map_err(|e| Error::config_invalid("sdk_app_id must be a number").with_source(e))?;

    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let client = Client::new(ctx, DefaultCredentialProvider::new())
        .with_region("ap-guangzhou")
        .with_profile(
            Profile::new()
                .with_request_timeout(Duration::from_secs(30))
                .with_rate_limit_retry(3, Backoff::new()),
        )?;

    let req = CreateStaffRequest {
        sdk_app_id,
        staffs: vec![SeatUserInfo {
            name: mail.split('@').next().unwrap_or_default().to_string(),
            mail,
            staff_number: "0001".to_string(),
        }],
    };
    let resp = client.send(req).await?;

    println!("request id: {}", resp.request_id);
    for staff in resp.data.error_staff_list {
        println!("failed: {staff}");
    }
    Ok(())
}
