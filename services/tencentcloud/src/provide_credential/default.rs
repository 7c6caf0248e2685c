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
use tcapi_core::{Context, ProvideCredential, ProvideCredentialChain, Result};

use super::{CvmRoleCredentialProvider, EnvCredentialProvider, ProfileCredentialProvider};
use crate::Credential;

/// DefaultCredentialProvider tries the standard sources in order:
///
/// 1. environment variables
/// 2. the credentials file
/// 3. the CAM role of the CVM instance
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    chain: ProvideCredentialChain<Credential>,
}

impl Default for DefaultCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultCredentialProvider {
    /// Create a new DefaultCredentialProvider.
    pub fn new() -> Self {
        let chain = ProvideCredentialChain::new()
            .push(EnvCredentialProvider::new())
            .push(ProfileCredentialProvider::new())
            .push(CvmRoleCredentialProvider::new());

        Self { chain }
    }

    /// Put a provider in front of the standard sources.
    pub fn push_front(self, provider: impl ProvideCredential<Credential = Credential>) -> Self {
        let chain = ProvideCredentialChain::new()
            .push(provider)
            .push(self);
        Self { chain }
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.chain.provide_credential(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::StaticCredentialProvider;
    use std::collections::HashMap;
    use tcapi_core::StaticEnv;
    use tcapi_file_read_tokio::TokioFileRead;

    fn context(envs: &[(&str, &str)]) -> Context {
        Context::new().with_file_read(TokioFileRead).with_env(StaticEnv {
            home_dir: None,
            envs: envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[tokio::test]
    async fn test_env_wins() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let ctx = context(&[
            (TENCENTCLOUD_SECRET_ID, "env_secret_id"),
            (TENCENTCLOUD_SECRET_KEY, "env_secret_key"),
        ]);
        let cred = DefaultCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be provided");
        assert_eq!(cred.secret_id, "env_secret_id");
        Ok(())
    }

    #[tokio::test]
    async fn test_nothing_configured() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        // No home dir, no env and the metadata service is disabled.
        let ctx = context(&[(TENCENTCLOUD_CVM_METADATA_DISABLED, "true")]);
        let cred = DefaultCredentialProvider::new()
            .provide_credential(&ctx)
            .await?;
        assert!(cred.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_push_front() -> anyhow::Result<()> {
        let ctx = context(&[
            (TENCENTCLOUD_SECRET_ID, "env_secret_id"),
            (TENCENTCLOUD_SECRET_KEY, "env_secret_key"),
        ]);
        let cred = DefaultCredentialProvider::new()
            .push_front(StaticCredentialProvider::new("static_id", "static_key"))
            .provide_credential(&ctx)
            .await?
            .expect("credential must be provided");
        assert_eq!(cred.secret_id, "static_id");
        Ok(())
    }
}
