use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, warn};

use engine::retry::RetryPolicy;

use crate::error::{MediaError, MediaResult, SlotFailure};

/// Largest product image accepted from a remote host.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Downloads product images to local files, retrying per the policy.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> MediaResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/*,*/*;q=0.8"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(ImageFetcher {
            client,
            policy,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Download `url` into `dest`, trying up to the policy's attempt limit.
    pub async fn fetch_with_retry(&self, slot: usize, url: &str, dest: &Path) -> Result<(), SlotFailure> {
        let mut last_error = None;

        for attempt in self.policy.attempts() {
            debug!(slot, attempt, url, "Downloading image");
            match self.fetch_once(url, dest).await {
                Ok(bytes) => {
                    debug!(slot, attempt, bytes, "Image downloaded");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        slot,
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        error = %e,
                        "Image download attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if let Some(delay) = self.policy.delay_after(attempt) {
                sleep(delay).await;
            }
        }

        // Leave no half-written download behind for the placeholder slot
        let _ = tokio::fs::remove_file(dest).await;

        Err(SlotFailure {
            slot,
            attempts: self.policy.max_attempts(),
            source: last_error.unwrap_or_else(|| MediaError::EmptyBody(url.to_string())),
        })
    }

    // Streams the body to `dest`, never holding more than one chunk in memory.
    async fn fetch_once(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(self.too_large(url));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::EmptyBody(url.to_string()));
        }
        Ok(written)
    }

    fn too_large(&self, url: &str) -> MediaError {
        MediaError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }
}
