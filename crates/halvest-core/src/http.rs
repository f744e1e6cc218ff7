//! Shared HTTP client with a sync facade over async reqwest.
//!
//! Crawl and download stages run on plain threads, so requests go
//! through a shared tokio runtime via `block_on`. No retries happen at
//! this level: the crawl treats failures as fatal and the download pool
//! isolates them per task.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout (headers + body)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Error from one HTTP fetch.
#[derive(Debug)]
pub enum FetchError {
    /// Request or read timed out.
    Timeout { message: String },
    /// Connector failure: DNS, refused connection, TLS setup.
    Connect { message: String },
    /// Any other HTTP-level failure, with status when one was received.
    Http {
        status: Option<u16>,
        message: String,
    },
    Io(std::io::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { message } => write!(f, "timeout: {message}"),
            Self::Connect { message } => write!(f, "connect: {message}"),
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Classify a reqwest error into the fetch taxonomy.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                message: e.to_string(),
            }
        } else if e.is_connect() {
            Self::Connect {
                message: e.to_string(),
            }
        } else {
            Self::Http {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }

    /// Transient network failures: the kinds the download pool absorbs
    /// per task (connection reset, connector/DNS failure, timeout).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } => true,
            Self::Http { status: None, .. } => true, // reset mid-transfer
            Self::Http {
                status: Some(_), ..
            } => false,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
            ),
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Blocking GET returning the whole response body as text.
pub fn get_text(url: &str) -> Result<String, FetchError> {
    SHARED_RUNTIME.handle().block_on(async {
        let resp = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(&e))?;
        resp.text().await.map_err(|e| FetchError::from_reqwest(&e))
    })
}

/// Blocking GET returning the whole response body as bytes.
pub fn get_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    SHARED_RUNTIME.handle().block_on(async {
        let resp = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(&e))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(bytes.to_vec())
    })
}
