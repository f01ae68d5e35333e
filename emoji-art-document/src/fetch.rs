//! Background image fetching.
//!
//! One fetch runs at a time per document. Every fetch is tagged with a
//! generation; starting or cancelling a fetch retires the previous
//! generation, so a result that races past cancellation is recognised as
//! stale when it reaches the document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::FetchError;

/// Progress of the background image for the current background.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Nothing in flight; the image (if any) is up to date.
    #[default]
    Idle,
    /// Bytes for a URL background are being fetched.
    Fetching,
    /// The URL could not be fetched or did not hold an image.
    Failed(Url),
}

/// Source of image bytes for URL backgrounds.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the raw bytes behind `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be retrieved.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Default maximum response size (32 MiB).
pub const DEFAULT_MAX_BYTES: usize = 32 * 1024 * 1024;

/// Default fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetcher for `http`, `https`, `file` and base64 `data` URLs.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http: Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    /// Create a fetcher with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client fails to build.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("emoji-art/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            max_bytes: DEFAULT_MAX_BYTES,
        })
    }

    /// Limit the accepted response size.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let bytes = response.bytes().await?;
        self.check_size(bytes.len())?;
        Ok(bytes.to_vec())
    }

    async fn fetch_file(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|()| FetchError::UnsupportedScheme(format!("unusable file URL {url}")))?;
        let bytes = tokio::fs::read(&path).await?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    fn check_size(&self, len: usize) -> Result<(), FetchError> {
        if len > self.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => self.fetch_file(url).await,
            "data" => {
                let bytes = decode_data_url(url.as_str())?;
                self.check_size(bytes.len())?;
                Ok(bytes)
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Decode a base64 `data:` URL such as `data:image/png;base64,iVBOR...`.
fn decode_data_url(uri: &str) -> Result<Vec<u8>, FetchError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(FetchError::InvalidDataUrl("not a data URL".to_string()));
    };
    let (metadata, encoded) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUrl("missing comma".to_string()))?;
    if !metadata.ends_with(";base64") {
        return Err(FetchError::InvalidDataUrl(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| FetchError::InvalidDataUrl(e.to_string()))
}

/// Result of one fetch, handed back to the owning document.
#[derive(Debug)]
pub struct FetchCompletion {
    pub(crate) generation: u64,
    pub(crate) url: Url,
    pub(crate) result: Result<Vec<u8>, FetchError>,
}

impl FetchCompletion {
    /// URL this fetch was for.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Runs fetches on Tokio tasks and queues their completions.
pub(crate) struct FetchPipeline {
    fetcher: Arc<dyn ImageFetcher>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<FetchCompletion>,
    rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl FetchPipeline {
    pub(crate) fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            generation: 0,
            in_flight: None,
            tx,
            rx,
        }
    }

    /// Generation of the most recently started (or retired) fetch.
    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Abort the in-flight fetch, if any, and retire its generation.
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            tracing::debug!("Cancelling background fetch generation {}", self.generation);
            handle.abort();
        }
        self.generation += 1;
    }

    /// Cancel whatever is running and start fetching `url`.
    pub(crate) fn start(&mut self, url: Url) {
        self.cancel();
        let generation = self.generation;
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        tracing::debug!("Fetching background {url} (generation {generation})");
        self.in_flight = Some(tokio::spawn(async move {
            let result = fetcher.fetch(&url).await;
            // The document may already be gone.
            let _ = tx.send(FetchCompletion {
                generation,
                url,
                result,
            });
        }));
    }

    /// Accept a completion if it belongs to the current generation.
    pub(crate) fn accept(&mut self, completion: FetchCompletion) -> Option<FetchCompletion> {
        if completion.generation != self.generation {
            tracing::debug!(
                "Discarding stale fetch of {} (generation {}, current {})",
                completion.url,
                completion.generation,
                self.generation
            );
            return None;
        }
        self.in_flight = None;
        Some(completion)
    }

    /// Next queued completion without waiting.
    pub(crate) fn try_next(&mut self) -> Option<FetchCompletion> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next queued completion.
    pub(crate) async fn next(&mut self) -> Option<FetchCompletion> {
        self.rx.recv().await
    }
}
