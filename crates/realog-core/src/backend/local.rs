//! Local document persistence
//!
//! The local backend keeps the whole document in one JSON file in the data
//! directory. It is always written, whatever backend is authoritative, so a
//! failed remote never loses an edit.
//!
//! Writes are atomic (write to temp file, then rename) to prevent corruption.
//!
//! Files:
//! - `journal.json` - the document
//! - `journal.json.corrupt-<timestamp>` - documents that failed to parse,
//!   kept for recovery

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{debug, warn};

use super::{Backend, BackendError, BackendKind, BackendResult, ProbeReport};
use crate::document::Document;

/// File name of the stored document
pub const DOCUMENT_FILE: &str = "journal.json";

/// Local JSON file backend
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    /// Create a backend storing its document in `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(DOCUMENT_FILE),
        }
    }

    /// Path of the document file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a document exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the stored document
    ///
    /// Returns `None` if nothing has been stored yet.
    pub fn read(&self) -> BackendResult<Option<Document>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)
            .map_err(|e| BackendError::from_io(e, self.path.clone()))?;

        let mut value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| BackendError::CorruptDocument {
                path: self.path.clone(),
                details: e.to_string(),
            })?;

        // Older stores could hold a document without a settings object
        if value.get("settings").is_some_and(|s| s.is_null()) {
            value["settings"] = serde_json::Value::Object(Default::default());
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BackendError::CorruptDocument {
                path: self.path.clone(),
                details: e.to_string(),
            })
    }

    /// Load the stored document, degrading to the built-in default
    ///
    /// A missing file yields [`Document::initial`]. A file that does not
    /// parse is moved aside to a timestamped `.corrupt-` copy and the
    /// default is returned. Errors reading the file are returned as they
    /// are and the file is left in place.
    pub fn load_or_default(&self) -> BackendResult<Document> {
        match self.read() {
            Ok(Some(doc)) => Ok(doc),
            Ok(None) => {
                debug!("No local document at {:?}, using defaults", self.path);
                Ok(Document::initial())
            }
            Err(e @ BackendError::CorruptDocument { .. }) => {
                warn!("{}", e);
                self.preserve_corrupt(Local::now())?;
                Ok(Document::initial())
            }
            Err(e) => Err(e),
        }
    }

    /// Write the document atomically
    pub fn write(&self, doc: &Document) -> BackendResult<()> {
        let bytes = serde_json::to_vec(doc).map_err(|e| BackendError::LocalStorage {
            path: self.path.clone(),
            details: format!("serialization failed: {}", e),
        })?;

        atomic_write(&self.path, &bytes)
    }

    /// Path a document found corrupt at `at` is moved to
    pub fn corrupt_path(&self, at: DateTime<Local>) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", at.format("%Y%m%dT%H%M%S%.3f")));
        PathBuf::from(name)
    }

    /// Move the unparseable document aside without replacing older copies
    fn preserve_corrupt(&self, at: DateTime<Local>) -> BackendResult<PathBuf> {
        let base = self.corrupt_path(at);
        let mut backup = base.clone();
        let mut n = 1;
        while backup.exists() {
            let mut name = base.as_os_str().to_owned();
            name.push(format!("-{}", n));
            backup = PathBuf::from(name);
            n += 1;
        }

        fs::rename(&self.path, &backup).map_err(|e| BackendError::from_io(e, self.path.clone()))?;
        warn!("Corrupt local document preserved at {:?}", backup);
        Ok(backup)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn probe(&self) -> BackendResult<ProbeReport> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        if let Err(e) = fs::create_dir_all(dir) {
            return Ok(ProbeReport::offline(
                "Data directory unavailable",
                Some(e.to_string()),
            ));
        }

        let readonly = fs::metadata(dir)
            .map(|m| m.permissions().readonly())
            .unwrap_or(true);
        if readonly {
            Ok(ProbeReport::offline(
                "Data directory is read-only",
                Some(dir.display().to_string()),
            ))
        } else {
            Ok(ProbeReport::online(
                "Available",
                Some(self.path.display().to_string()),
            ))
        }
    }

    async fn load(&self) -> BackendResult<Document> {
        Ok(self.read()?.unwrap_or_else(Document::initial))
    }

    async fn save(&self, doc: &Document) -> BackendResult<()> {
        self.write(doc)
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
fn atomic_write(path: &Path, data: &[u8]) -> BackendResult<()> {
    let io_err = |e| BackendError::from_io(e, path.to_path_buf());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path).map_err(io_err)?;
    file.write_all(data).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    fs::rename(&temp_path, path).map_err(io_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Entry, Theme};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_initial_document() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());

        assert!(!local.exists());
        assert!(local.read().unwrap().is_none());
        assert_eq!(local.load_or_default().unwrap(), Document::initial());
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());

        let mut doc = Document::initial();
        doc.settings.theme = Some(Theme::Dark);
        doc.upsert_entry(Entry::at(Category::Daily, 42));
        local.write(&doc).unwrap();

        assert!(local.exists());
        let loaded = local.read().unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());
        local.write(&Document::initial()).unwrap();

        assert!(!temp_dir.path().join("journal.tmp").exists());
    }

    #[test]
    fn test_overwrite_existing() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());

        let mut doc = Document::default();
        local.write(&doc).unwrap();
        doc.upsert_entry(Entry::at(Category::Weekly, 1));
        local.write(&doc).unwrap();

        assert_eq!(local.read().unwrap().unwrap().entries.len(), 1);
    }

    fn corrupt_copies(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("journal.json.corrupt-"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_corrupt_file_degrades_to_default_and_is_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());
        fs::write(local.path(), "{ this is not json").unwrap();

        assert!(matches!(local.read(), Err(BackendError::CorruptDocument { .. })));
        let doc = local.load_or_default().unwrap();
        assert_eq!(doc, Document::initial());

        assert_eq!(corrupt_copies(temp_dir.path()).len(), 1);
        assert!(!local.path().exists());
    }

    #[test]
    fn test_repeated_corruption_keeps_every_copy() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());
        let at = Local::now();

        fs::write(local.path(), "first").unwrap();
        let first = local.preserve_corrupt(at).unwrap();
        fs::write(local.path(), "second").unwrap();
        let second = local.preserve_corrupt(at).unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(fs::read_to_string(&second).unwrap(), "second");
        assert_eq!(corrupt_copies(temp_dir.path()).len(), 2);
    }

    #[test]
    fn test_wrong_shape_counts_as_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());
        fs::write(local.path(), r#"{"entries": "not a list"}"#).unwrap();

        assert_eq!(local.load_or_default().unwrap(), Document::initial());
        assert_eq!(corrupt_copies(temp_dir.path()).len(), 1);
    }

    #[test]
    fn test_read_failure_is_an_error_and_file_stays() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());
        // A directory where the document should be cannot be read as text
        fs::create_dir(local.path()).unwrap();

        let err = local.load_or_default().unwrap_err();
        assert!(matches!(err, BackendError::LocalStorage { .. }));
        assert!(local.path().is_dir());
        assert!(corrupt_copies(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_null_settings_are_tolerated() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());
        fs::write(
            local.path(),
            r#"{"questions": [], "entries": [], "settings": null}"#,
        )
        .unwrap();

        let doc = local.read().unwrap().unwrap();
        assert_eq!(doc.settings, Default::default());
    }

    #[tokio::test]
    async fn test_backend_trait_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalBackend::new(temp_dir.path());

        let report = local.probe().await.unwrap();
        assert!(report.online);

        let mut doc = Document::initial();
        doc.upsert_entry(Entry::at(Category::Yearly, 7));
        local.save(&doc).await.unwrap();
        assert_eq!(local.load().await.unwrap(), doc);
    }
}
