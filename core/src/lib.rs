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

//! Core components for signing and dispatching cloud API requests.
//!
//! This crate provides the foundational types and traits shared by the tcapi
//! crates.
//!
//! ## Overview
//!
//! - **Context**: A container that holds implementations for file reading, HTTP sending,
//!   and environment access.
//! - **Traits**: Abstract interfaces for credential resolution ([`ProvideCredential`])
//!   and credential validation ([`SigningCredential`]).
//! - **Chain**: [`ProvideCredentialChain`] tries credential sources in order, first
//!   success wins.
//! - **Error**: a single [`Error`] type whose [`ErrorKind`] tells callers and the retry
//!   engine what went wrong.
//!
//! ## Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use tcapi_core::{Context, ProvideCredential, ProvideCredentialChain, Result};
//!
//! #[derive(Debug)]
//! struct Fixed;
//!
//! #[async_trait]
//! impl ProvideCredential for Fixed {
//!     type Credential = String;
//!
//!     async fn provide_credential(&self, _: &Context) -> Result<Option<String>> {
//!         Ok(Some("secret".to_string()))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let chain = ProvideCredentialChain::new().push(Fixed);
//! let cred = chain.provide_credential(&Context::new()).await?;
//! assert_eq!(cred.as_deref(), Some("secret"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: Cryptographic hashing utilities
//! - [`time`]: Time manipulation utilities
//! - [`utils`]: General utilities including data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::Env;
pub use context::FileRead;
pub use context::HttpSend;
pub use context::NoopEnv;
pub use context::NoopFileRead;
pub use context::NoopHttpSend;
pub use context::OsEnv;
pub use context::StaticEnv;

mod error;
pub use error::{Error, ErrorKind, Result};

mod api;
pub use api::{ProvideCredential, SigningCredential};
mod chain;
pub use chain::ProvideCredentialChain;
