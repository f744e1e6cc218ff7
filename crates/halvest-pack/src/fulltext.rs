//! Full-text lookup in the GROBID extraction archive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use zip::ZipArchive;
use zip::result::ZipError;

/// Zip archive of extracted texts, keyed as `txts/{halid}.grobid.txt`.
pub struct FullTextArchive {
    zip: ZipArchive<File>,
}

impl FullTextArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let zip = ZipArchive::new(file)
            .with_context(|| format!("reading zip structure of {}", path.display()))?;
        Ok(Self { zip })
    }

    /// Raw bytes of one paper's extracted text, `None` when the archive
    /// holds no entry for it.
    pub fn read(&mut self, halid: &str) -> Result<Option<Vec<u8>>> {
        let name = format!("txts/{halid}.grobid.txt");
        match self.zip.by_name(&name) {
            Ok(mut entry) => {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut buf)
                    .with_context(|| format!("reading {name}"))?;
                Ok(Some(buf))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("looking up {name}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn fixture_zip(dir: &Path, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join("texts.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (halid, body) in entries {
            writer
                .start_file(
                    format!("txts/{halid}.grobid.txt"),
                    SimpleFileOptions::default(),
                )
                .unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn reads_present_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_zip(dir.path(), &[("04286657", b"full text here")]);
        let mut archive = FullTextArchive::open(&path).unwrap();
        assert_eq!(
            archive.read("04286657").unwrap(),
            Some(b"full text here".to_vec())
        );
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_zip(dir.path(), &[("04286657", b"t")]);
        let mut archive = FullTextArchive::open(&path).unwrap();
        assert_eq!(archive.read("00000000").unwrap(), None);
    }

    #[test]
    fn corrupt_archive_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(FullTextArchive::open(&path).is_err());
    }
}
