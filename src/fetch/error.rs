use std::error::Error as StdError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection problems, timeouts and server-side hiccups. Retried.
    #[error("Network request failed for {url}")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The archive has no file for this station and bucket. Never retried.
    #[error("No archive file at {url}")]
    NotFound { url: String },

    /// The archive answered with content that cannot be used.
    #[error("Unexpected archive response for {url}: {reason}")]
    UpstreamFormat { url: String, reason: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        FetchError::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network { .. })
    }

    /// The error message followed by its source chain, on one line.
    pub(crate) fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
