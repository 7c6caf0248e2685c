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

//! Reqwest based transport for tcapi.
//!
//! `ReqwestHttpSend` implements the `HttpSend` trait from `tcapi_core` on top of a
//! pooled `reqwest::Client`. Cloning the client is cheap and shares the pool, so
//! one `ReqwestHttpSend` can serve any number of concurrent calls.
//!
//! ```no_run
//! use std::time::Duration;
//! use tcapi_core::Context;
//! use tcapi_http_send_reqwest::ReqwestHttpSend;
//!
//! # fn example() -> anyhow::Result<()> {
//! let client = reqwest::Client::builder()
//!     .pool_max_idle_per_host(10)
//!     .connect_timeout(Duration::from_secs(5))
//!     .build()?;
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqwest::{Client, Request};
use tcapi_core::{Error, HttpSend, Result};

/// Reqwest-based implementation of the `HttpSend` trait.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req).map_err(|e| {
            Error::request_invalid("failed to convert request into reqwest request")
                .with_source(e)
        })?;
        let url = req.url().to_string();

        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| classify(e).with_context(format!("url: {url}")))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| {
                Error::network("failed to read response body")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_builder() {
        return Error::request_invalid("failed to build http request").with_source(err);
    }

    let message = if err.is_timeout() {
        "http request timed out"
    } else if err.is_connect() {
        "failed to connect to server"
    } else {
        "failed to send http request"
    };
    Error::network(message).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcapi_core::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_http_send() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept must succeed");
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let body = r#"{"Response":{"RequestId":"req-1"}}"#;
            let resp = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
        });

        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(format!("http://{addr}/"))
            .body(Bytes::from_static(b"{}"))?;
        let resp = ReqwestHttpSend::default().http_send(req).await?;

        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.body().as_ref(),
            br#"{"Response":{"RequestId":"req-1"}}"#
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_failure_is_network_error() -> anyhow::Result<()> {
        // Take a free port and release it so nobody is listening there.
        let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;

        let req = http::Request::builder()
            .uri(format!("http://{addr}/"))
            .body(Bytes::new())?;
        let err = ReqwestHttpSend::default()
            .http_send(req)
            .await
            .expect_err("nobody is listening");

        assert_eq!(err.kind(), ErrorKind::Network);
        Ok(())
    }
}
