// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Out-of-band `pong` notification to the monitor.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Bound on a single notification request.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Tells the monitor that a `ping` reached the relay.
pub trait Notifier: Send + Sync {
    fn notify_pong(&self) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts `pong` as `text/plain` to the monitor URL.
///
/// The response status and body are ignored.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for HttpNotifier {
    async fn notify_pong(&self) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body("pong")
            .send()
            .await?;
        debug!("monitor answered {}", response.status());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_posts_pong_as_text_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.ends_with(b"pong") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 418 I'm a teapot\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8(request).unwrap()
        });

        let notifier = HttpNotifier::new(format!("http://{}/", addr)).unwrap();
        // Non-success status is still a delivered notification
        notifier.notify_pong().await.unwrap();

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post / http/1.1"));
        assert!(request.contains("content-type: text/plain"));
        assert!(request.ends_with("pong"));
    }

    #[tokio::test]
    async fn test_unreachable_monitor_is_an_error() {
        // Bind then drop to obtain a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let notifier = HttpNotifier::new(format!("http://127.0.0.1:{}/", port)).unwrap();
        assert!(notifier.notify_pong().await.is_err());
    }
}
