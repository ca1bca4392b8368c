use crate::config::RetryPolicy;
use crate::fetch::error::FetchError;
use crate::fetch::source::BlobSource;
use crate::types::blob::{BlobKey, RawBlob};
use chrono::Utc;
use log::{debug, warn};

/// Wraps a [`BlobSource`] with bounded exponential backoff.
///
/// Only transient errors are retried. `NotFound` is an expected answer and
/// returns immediately, as do format errors.
pub struct RemoteFetcher<S> {
    source: S,
    retry: RetryPolicy,
}

impl<S: BlobSource> RemoteFetcher<S> {
    pub fn new(source: S, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch(&self, key: &BlobKey) -> Result<RawBlob, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;

        loop {
            match self.source.fetch(key).await {
                Ok(bytes) => {
                    debug!("Fetched {} on attempt {}", key, attempt);
                    return Ok(RawBlob::new(key.clone(), bytes, Utc::now()));
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Fetching {} failed (attempt {}/{}), retrying in {:?}: {}",
                        key,
                        attempt,
                        max_attempts,
                        delay,
                        e.describe()
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.retry.max_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
