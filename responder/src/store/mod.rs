//! Flat-file storage for per-form reply templates.
//!
//! The whole file is re-read on every lookup so edits made by hand or by
//! another process are picked up without a restart. Writes go to a uniquely
//! named temporary file in the same directory, which is then renamed over
//! the original.

pub mod format;
pub mod types;

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use format::{apply_upsert, find_record, parse_records};
pub use types::{StoreError, TemplateRecord, UpsertOutcome};

/// Handle to the template file, cheap to clone across handlers.
#[derive(Clone)]
pub struct TemplateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl TemplateStore {
    /// Create a store backed by the file at `path`. The file need not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Look up the template for `form_id`.
    pub async fn find(&self, form_id: &str) -> Result<Option<TemplateRecord>, StoreError> {
        let contents = self.read_contents().await?;
        let record = find_record(&contents, form_id);

        debug!(
            form_id = %form_id,
            found = record.is_some(),
            path = %self.inner.path.display(),
            "template_lookup"
        );

        Ok(record)
    }

    /// List every complete record in file order.
    pub async fn records(&self) -> Result<Vec<TemplateRecord>, StoreError> {
        let contents = self.read_contents().await?;
        Ok(parse_records(&contents))
    }

    /// Update the record for `record.form_id` in place, or append it.
    pub async fn upsert(&self, record: &TemplateRecord) -> Result<UpsertOutcome, StoreError> {
        let _guard = self.inner.write_lock.lock().await;

        let contents = self.read_contents().await?;
        let (updated, outcome) = apply_upsert(&contents, record);
        self.write_contents(&updated).await?;

        info!(
            form_id = %record.form_id,
            outcome = ?outcome,
            path = %self.inner.path.display(),
            "template_stored"
        );

        Ok(outcome)
    }

    async fn read_contents(&self) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(&self.inner.path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write_contents(&self, contents: &str) -> Result<(), StoreError> {
        let path = self.inner.path.clone();
        let contents = contents.to_owned();

        let written = tokio::task::spawn_blocking(move || -> io::Result<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            // Removed on drop if anything below fails.
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .and_then(|result| result);

        written.map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.inner.path.clone(),
            source,
        }
    }
}
