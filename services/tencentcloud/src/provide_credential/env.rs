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

use async_trait::async_trait;
use tcapi_core::{Context, ProvideCredential, Result};

use crate::constants::*;
use crate::Credential;

/// EnvCredentialProvider loads credentials from environment variables.
///
/// - `TENCENTCLOUD_SECRET_ID`: the secret id
/// - `TENCENTCLOUD_SECRET_KEY`: the secret key
/// - `TENCENTCLOUD_TOKEN` or `TENCENTCLOUD_SECURITY_TOKEN`: the session token (optional)
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let secret_id = ctx.env_var(TENCENTCLOUD_SECRET_ID).filter(|v| !v.is_empty());
        let secret_key = ctx.env_var(TENCENTCLOUD_SECRET_KEY).filter(|v| !v.is_empty());

        let (Some(secret_id), Some(secret_key)) = (secret_id, secret_key) else {
            return Ok(None);
        };

        let token = ctx
            .env_var(TENCENTCLOUD_TOKEN)
            .or_else(|| ctx.env_var(TENCENTCLOUD_SECURITY_TOKEN))
            .filter(|v| !v.is_empty());

        Ok(Some(Credential {
            secret_id,
            secret_key,
            token,
            expires_in: None,
        }))
    }
}
