//! Durable version markers
//!
//! One JSON marker file per design scope under a single directory. A
//! marker is replaced atomically:
//!
//! 1. Write to `<marker>.tmp`
//! 2. fsync the temp file
//! 3. Rename temp to final (atomic on POSIX)
//! 4. fsync the directory so the rename survives a crash
//!
//! A reader therefore sees either the previous marker or the new one,
//! never a torn write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::design::DesignScope;

use super::{VersionMarker, VersionStore, VersionStoreError, VersionStoreResult};

/// Marker file extension
const MARKER_EXTENSION: &str = "marker";

/// Version store writing one fsynced marker file per scope.
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    dir: PathBuf,
}

impl FileVersionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the marker file of a scope.
    pub fn marker_path(&self, scope: &DesignScope) -> PathBuf {
        let file_name = format!(
            "{}__{}__{}.{}",
            encode_component(scope.tenant.as_str()),
            scope.kind.as_str(),
            encode_component(&scope.design),
            MARKER_EXTENSION
        );
        self.dir.join(file_name)
    }

    fn io_error(path: &Path) -> impl FnOnce(io::Error) -> VersionStoreError + '_ {
        move |source| VersionStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl VersionStore for FileVersionStore {
    fn get_version(&self, scope: &DesignScope) -> VersionStoreResult<Option<VersionMarker>> {
        let path = self.marker_path(scope);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(Self::io_error(&path))?;

        let marker: VersionMarker =
            serde_json::from_str(&content).map_err(|e| VersionStoreError::Corrupt {
                path: path.clone(),
                reason: format!("failed to parse marker: {}", e),
            })?;

        if marker.scope != *scope {
            return Err(VersionStoreError::Corrupt {
                path,
                reason: format!("marker belongs to {}, expected {}", marker.scope, scope),
            });
        }

        Ok(Some(marker))
    }

    fn set_version(&self, marker: &VersionMarker) -> VersionStoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;

        let path = self.marker_path(&marker.scope);
        let temp_path = path.with_extension(format!("{}.tmp", MARKER_EXTENSION));

        let content =
            serde_json::to_string_pretty(marker).map_err(|e| VersionStoreError::Corrupt {
                path: path.clone(),
                reason: format!("failed to serialize marker: {}", e),
            })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(Self::io_error(&temp_path))?;
        file.write_all(content.as_bytes())
            .map_err(Self::io_error(&temp_path))?;
        file.sync_all().map_err(Self::io_error(&temp_path))?;

        fs::rename(&temp_path, &path).map_err(Self::io_error(&path))?;

        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}

/// Escapes everything but `[A-Za-z0-9.-]` so any tenant or design name
/// maps to a distinct, portable file name component.
fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("_{:02X}", byte)),
        }
    }
    encoded
}
