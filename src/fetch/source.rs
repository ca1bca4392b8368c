use crate::fetch::error::FetchError;
use crate::types::blob::BlobKey;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

/// Where archive files come from.
///
/// Implementations return the *decompressed* file contents for a key, or a
/// [`FetchError`] classifying the failure. Retries are not their concern.
pub trait BlobSource: Send + Sync {
    fn fetch(&self, key: &BlobKey) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Downloads gzip-compressed CSV files from the bulk archive over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url_template: String,
}

impl HttpSource {
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    pub(crate) fn url_for(&self, key: &BlobKey) -> String {
        self.url_template
            .replace("{granularity}", key.granularity.path_segment())
            .replace("{bucket}", &key.bucket.path_segment())
            .replace("{station}", &key.station)
    }
}

impl BlobSource for HttpSource {
    async fn fetch(&self, key: &BlobKey) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(key);
        info!("Downloading data from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::network(url.clone(), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound { url });
        }
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if is_transient_status(status) {
                    FetchError::network(url, e)
                } else {
                    FetchError::UpstreamFormat {
                        url,
                        reason: format!("unexpected HTTP status {status}"),
                    }
                });
            }
        };

        let stream = response.bytes_stream().map_err(io::Error::other);
        let stream_reader = StreamReader::new(stream);
        let mut decoder = GzipDecoder::new(stream_reader);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .await
            .map_err(|e| classify_read_error(&url, e))?;

        info!(
            "Downloaded and decompressed {} bytes for {}",
            decompressed.len(),
            key
        );
        Ok(decompressed)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Errors from the body stream are network trouble; anything else came from
/// the gzip decoder and means the payload itself is broken.
fn classify_read_error(url: &str, error: io::Error) -> FetchError {
    let from_stream = error
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>());
    if from_stream {
        FetchError::network(url, error)
    } else {
        FetchError::UpstreamFormat {
            url: url.to_string(),
            reason: format!("could not decompress archive file: {error}"),
        }
    }
}
