//! Outbound signed round-trips to the S3-compatible backend.
//!
//! The gateway only needs the request to succeed; response bodies are
//! drained and dropped.

use crate::{
    errors::{GatewayError, GatewayResult},
    services::signer::SignedHeaders,
};
use async_trait::async_trait;
use reqwest::{Method, header};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Send `method uri` with the given headers and no body.
    async fn execute(&self, method: Method, uri: &Url, headers: &SignedHeaders)
    -> GatewayResult<()>;
}

/// `reqwest`-based backend client.
///
/// Connection-level failures (connect errors, timeouts) are retried up to
/// `max_attempts` total attempts. A received HTTP status is final.
#[derive(Clone, Debug)]
pub struct HttpObjectBackend {
    client: reqwest::Client,
    max_attempts: u32,
}

impl HttpObjectBackend {
    pub fn new(timeout: Duration, max_attempts: u32) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
        })
    }

    fn build_request(
        &self,
        method: &Method,
        uri: &Url,
        headers: &SignedHeaders,
    ) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method.clone(), uri.clone())
            .header(header::AUTHORIZATION, &headers.authorization)
            .header("x-amz-date", &headers.amz_date)
            .header("x-amz-content-sha256", &headers.content_sha256);
        // S3 rejects a PUT without Content-Length.
        if *method == Method::PUT {
            request.body(Vec::<u8>::new())
        } else {
            request
        }
    }
}

#[async_trait]
impl ObjectBackend for HttpObjectBackend {
    async fn execute(
        &self,
        method: Method,
        uri: &Url,
        headers: &SignedHeaders,
    ) -> GatewayResult<()> {
        let mut attempt = 1;
        loop {
            match self.build_request(&method, uri, headers).send().await {
                Ok(response) => {
                    let status = response.status();
                    if let Err(err) = response.bytes().await {
                        debug!("discarding unreadable response body from {}: {}", uri, err);
                    }
                    debug!("{} {} -> {}", method, uri, status);
                    if !status.is_success() {
                        return Err(GatewayError::BackendStatus {
                            method: method.to_string(),
                            uri: uri.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    return Ok(());
                }
                Err(err) if attempt < self.max_attempts && (err.is_connect() || err.is_timeout()) => {
                    warn!(
                        "{} {} failed on attempt {}/{}: {}",
                        method, uri, attempt, self.max_attempts, err
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(GatewayError::Transport(err)),
            }
        }
    }
}
