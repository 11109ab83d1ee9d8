//! Read-only access to the catalog file archive.
//!
//! Catalog file locations are relative; inside the zip they live under
//! [`ENTRY_PREFIX`]. Every call opens its own handle, so nothing is shared
//! between requests. All methods block and belong on a blocking thread.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::catalog::file_name;

/// Directory inside the zip that holds every catalog file.
pub const ENTRY_PREFIX: &str = "files/";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("entry '{0}' not found in archive")]
    EntryNotFound(String),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Zip(ZipError),
    #[error("{0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => Self::Io(e),
            other => Self::Zip(other),
        }
    }
}

/// A file pulled out of the archive for download.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Suggested download name (last segment of the location).
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct FileArchive {
    path: PathBuf,
}

impl FileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Zip entry name for a catalog location.
    pub fn entry_name(location: &str) -> String {
        format!("{}{}", ENTRY_PREFIX, location.trim_start_matches('/'))
    }

    fn open(&self) -> Result<ZipArchive<File>, ArchiveError> {
        let file = File::open(&self.path)?;
        Ok(ZipArchive::new(file)?)
    }

    /// Read an entry and decode it as UTF-8 text.
    pub fn read_text(&self, location: &str) -> Result<String, ArchiveError> {
        let entry_name = Self::entry_name(location);
        let mut archive = self.open()?;
        let mut entry = match archive.by_name(&entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::EntryNotFound(entry_name)),
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        debug!("Read {} bytes from {} for preview", bytes.len(), entry_name);
        Ok(String::from_utf8(bytes)?)
    }

    /// Extract an entry to a temporary file and return its bytes.
    ///
    /// The temporary file is removed before this returns.
    pub fn extract(&self, location: &str) -> Result<ExtractedFile, ArchiveError> {
        let entry_name = Self::entry_name(location);
        let mut archive = self.open()?;
        if archive.index_for_name(&entry_name).is_none() {
            return Err(ArchiveError::EntryNotFound(entry_name));
        }
        let mut entry = archive.by_name(&entry_name)?;

        let mut scratch = tempfile::NamedTempFile::new()?;
        let written = io::copy(&mut entry, scratch.as_file_mut())?;
        debug!(
            "Extracted {} ({} bytes) to {:?}",
            entry_name,
            written,
            scratch.path()
        );

        let file = scratch.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::with_capacity(written as usize);
        file.read_to_end(&mut bytes)?;

        Ok(ExtractedFile {
            name: file_name(location).to_string(),
            bytes,
        })
    }
}
