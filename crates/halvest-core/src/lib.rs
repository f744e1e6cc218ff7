//! Halvest Core - Common infrastructure for the HAL harvesting pipeline
//!
//! This crate provides the pieces shared by the crawl, download, and
//! packaging stages: the sentinel queue coordinating producer/consumer
//! pairs, the download concurrency gate, and the HTTP client facade.

pub mod fsutil;
pub mod http;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod semaphore;

// Re-exports for convenience
pub use fsutil::ensure_dir;
pub use http::{FetchError, SHARED_RUNTIME, get_bytes, get_text, http_client};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use queue::{QueueClosed, QueueReceiver, QueueSender, Recv, bounded};
pub use semaphore::Semaphore;
