//! SHA-256 ledger of finished archives.
//!
//! Every rotated archive gets one `{hex}\t{filename}` line appended to
//! `checksum.sha256` in its language's shard directory, so a consumer
//! can verify a partially transferred corpus file by file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK: usize = 4096;

/// Ledger file name inside each shard directory.
pub const LEDGER_NAME: &str = "checksum.sha256";

/// Streaming SHA-256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Append one archive's digest line to the ledger.
pub fn append_ledger(ledger: &Path, archive: &Path) -> io::Result<()> {
    let hex = sha256_file(archive)?;
    let name = archive
        .file_name()
        .ok_or_else(|| io::Error::other("archive path has no file name"))?
        .to_string_lossy();
    let mut file = OpenOptions::new().create(true).append(true).open(ledger)?;
    writeln!(file, "{hex}\t{name}")
}
