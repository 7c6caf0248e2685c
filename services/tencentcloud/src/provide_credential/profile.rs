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
use ini::Ini;
use log::debug;
use tcapi_core::{Context, Error, ProvideCredential, Result};

use crate::constants::*;
use crate::Credential;

/// ProfileCredentialProvider loads credentials from an INI credentials file.
///
/// The file is taken from, in order:
/// 1. the path given by `with_credentials_file()`
/// 2. the `TENCENTCLOUD_CREDENTIALS_FILE` environment variable
/// 3. `~/.tencentcloud/credentials`
///
/// The section is taken from `with_profile()`, then `TENCENTCLOUD_PROFILE`,
/// and defaults to `default`:
///
/// ```ini
/// [default]
/// secret_id = AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE
/// secret_key = Gu5t9xGARNpq86cd98joQYCN3EXAMPLE
/// ```
#[derive(Debug, Default)]
pub struct ProfileCredentialProvider {
    profile: Option<String>,
    credentials_file: Option<String>,
}

impl ProfileCredentialProvider {
    /// Create a new ProfileCredentialProvider with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the path to the credentials file.
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = self
            .profile
            .clone()
            .or_else(|| ctx.env_var(TENCENTCLOUD_PROFILE))
            .unwrap_or_else(|| "default".to_string());

        let path = self
            .credentials_file
            .clone()
            .or_else(|| ctx.env_var(TENCENTCLOUD_CREDENTIALS_FILE))
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string());

        let path = if path.starts_with("~/") {
            match ctx.expand_home_dir(&path) {
                Some(expanded) => expanded,
                None => {
                    debug!("failed to expand homedir for path: {path}");
                    return Ok(None);
                }
            }
        } else {
            path
        };

        let content = match ctx.file_read(&path).await {
            Ok(content) => content,
            Err(err) => {
                debug!("failed to read credentials file {path}: {err:?}");
                return Ok(None);
            }
        };

        let conf = Ini::load_from_str(&String::from_utf8_lossy(&content)).map_err(|e| {
            Error::config_invalid("failed to parse credentials file")
                .with_source(e)
                .with_context(format!("path: {path}"))
        })?;

        let Some(props) = conf.section(Some(profile.as_str())) else {
            debug!("profile {profile} not found in credentials file {path}");
            return Ok(None);
        };

        match (props.get("secret_id"), props.get("secret_key")) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => Ok(Some(Credential {
                secret_id: id.to_string(),
                secret_key: key.to_string(),
                token: props
                    .get("token")
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string()),
                expires_in: None,
            })),
            _ => Err(Error::config_invalid(format!(
                "profile {profile} in credentials file must contain secret_id and secret_key"
            ))
            .with_context(format!("path: {path}"))),
        }
    }
}
