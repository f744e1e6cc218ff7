//! Small filesystem helpers shared by the pipeline stages.

use std::io;
use std::path::Path;

/// Ensure a directory exists, creating it (and parents) when missing.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    log::warn!("No folder at {}: creating it", path.display());
    std::fs::create_dir_all(path)
}
