//! Response payload unpacking
//!
//! base64 payload → saved archive → extraction directory.
//!
//! Cleanup policy: the extraction directory is deleted before every
//! extraction, and the saved archive is overwritten on every save, so nothing
//! from a previous cycle survives into the next one.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Decode the response `data` field.
///
/// Line breaks and other ASCII whitespace are ignored, as MIME-style encoders
/// wrap long payloads.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::MalformedPayload(e.to_string()))
}

/// Resolve an archive entry name below `dest`.
///
/// Only plain path components are accepted; `..`, absolute paths and drive
/// prefixes are rejected so no entry can be written outside `dest`.
pub fn resolve_entry_path(dest: &Path, name: &str) -> Result<PathBuf> {
    let mut resolved = dest.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeEntry(name.to_string()));
            }
        }
    }

    if depth == 0 {
        return Err(Error::UnsafeEntry(name.to_string()));
    }
    Ok(resolved)
}

/// Saves archives and extracts them into a scratch directory
#[derive(Debug, Clone)]
pub struct Unpacker {
    archive_path: PathBuf,
    extract_dir: PathBuf,
}

impl Unpacker {
    pub fn new(archive_path: impl Into<PathBuf>, extract_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            extract_dir: extract_dir.into(),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    /// Write archive bytes, replacing any previous archive
    pub fn save_archive(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.archive_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::file_io(parent, e))?;
        }
        fs::write(&self.archive_path, bytes).map_err(|e| Error::file_io(&self.archive_path, e))?;
        info!(path = %self.archive_path.display(), bytes = bytes.len(), "Archive saved");
        Ok(())
    }

    /// Extract every entry of the saved archive.
    ///
    /// Returns entry names in archive order. Directories are created, files
    /// written (overwriting). Any unsafe entry name aborts the extraction.
    pub fn extract(&self) -> Result<Vec<String>> {
        let file = File::open(&self.archive_path).map_err(|e| Error::file_io(&self.archive_path, e))?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| Error::CorruptArchive(e.to_string()))?;

        self.clear_extract_dir()?;
        fs::create_dir_all(&self.extract_dir).map_err(|e| Error::file_io(&self.extract_dir, e))?;

        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| Error::CorruptArchive(e.to_string()))?;
            let name = entry.name().to_string();
            let out_path = resolve_entry_path(&self.extract_dir, &name)?;

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| Error::file_io(&out_path, e))?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::file_io(parent, e))?;
                }
                let mut out = File::create(&out_path).map_err(|e| Error::file_io(&out_path, e))?;
                io::copy(&mut entry, &mut out).map_err(|e| match e.kind() {
                    io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                        Error::CorruptArchive(format!("{}: {}", name, e))
                    }
                    _ => Error::file_io(&out_path, e),
                })?;
            }

            debug!(entry = %name, "Extracted");
            names.push(name);
        }

        info!(
            dir = %self.extract_dir.display(),
            entries = names.len(),
            "Archive extracted"
        );
        Ok(names)
    }

    /// Save then extract
    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<String>> {
        self.save_archive(bytes)?;
        self.extract()
    }

    /// Remove the saved archive only
    pub fn remove_archive(&self) -> Result<()> {
        remove_if_exists(&self.archive_path, false)
    }

    /// Remove archive and extraction directory
    pub fn cleanup(&self) -> Result<()> {
        self.remove_archive()?;
        self.clear_extract_dir()
    }

    fn clear_extract_dir(&self) -> Result<()> {
        remove_if_exists(&self.extract_dir, true)
    }
}

fn remove_if_exists(path: &Path, dir: bool) -> Result<()> {
    let result = if dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::file_io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip() {
        let original = "UEsDBAoAAAAAAA==";
        let bytes = decode_payload(original).unwrap();
        assert_eq!(STANDARD.encode(bytes), original);
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let bytes = decode_payload("aGVs\nbG8g\r\nd29y bGQ=").unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(matches!(decode_payload("not*base64!"), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_resolve_plain_and_nested_names() {
        let dest = Path::new("/tmp/out");
        assert_eq!(resolve_entry_path(dest, "token.wav").unwrap(), dest.join("token.wav"));
        assert_eq!(resolve_entry_path(dest, "a/b.txt").unwrap(), dest.join("a").join("b.txt"));
        assert_eq!(resolve_entry_path(dest, "./a/").unwrap(), dest.join("a"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dest = Path::new("/tmp/out");
        assert!(matches!(resolve_entry_path(dest, "../evil.txt"), Err(Error::UnsafeEntry(_))));
        assert!(matches!(resolve_entry_path(dest, "a/../../evil"), Err(Error::UnsafeEntry(_))));
        assert!(matches!(resolve_entry_path(dest, "/etc/passwd"), Err(Error::UnsafeEntry(_))));
        assert!(matches!(resolve_entry_path(dest, "."), Err(Error::UnsafeEntry(_))));
    }

    #[test]
    fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let unpacker = Unpacker::new(dir.path().join("x.zip"), dir.path().join("out"));
        unpacker.cleanup().unwrap();
    }
}
