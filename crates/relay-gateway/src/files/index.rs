//! File directory index
//!
//! In-memory listing of the storage directory. Every mutation goes to disk
//! first and is followed by a full rescan, so the cached listing always
//! matches the directory once the call returns.

use super::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;

/// Check that `name` is a single plain path component
pub fn validate_filename(name: &str) -> StorageResult<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(name),
        _ => Err(StorageError::InvalidFilename(name.to_string())),
    }
}

/// Cached view of the files held in server storage
#[derive(Debug)]
pub struct FileIndex {
    /// Storage directory
    root: PathBuf,

    /// Sorted filenames from the last scan
    files: RwLock<Vec<String>>,

    /// Serializes write-then-rescan sequences
    mutation: Mutex<()>,
}

impl FileIndex {
    /// Create an index over `root`; the listing stays empty until [`scan`](Self::scan)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: RwLock::new(Vec::new()),
            mutation: Mutex::new(()),
        }
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if missing
    pub async fn ensure_root(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Re-read the storage directory and replace the cached listing
    pub async fn scan(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::debug!(filename = ?raw, "Skipping non UTF-8 filename");
                }
            }
        }
        names.sort();

        *self.files.write() = names.clone();
        Ok(names)
    }

    /// Current cached listing (a copy)
    pub fn listing(&self) -> Vec<String> {
        self.files.read().clone()
    }

    /// Whether `filename` is in the cached listing
    pub fn lookup(&self, filename: &str) -> bool {
        self.files.read().iter().any(|f| f == filename)
    }

    /// Insert a name into the cached listing without touching disk
    pub fn add(&self, filename: &str) {
        let mut files = self.files.write();
        if let Err(pos) = files.binary_search_by(|f| f.as_str().cmp(filename)) {
            files.insert(pos, filename.to_string());
        }
    }

    /// Drop a name from the cached listing without touching disk
    pub fn remove(&self, filename: &str) -> bool {
        let mut files = self.files.write();
        match files.iter().position(|f| f == filename) {
            Some(pos) => {
                files.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Persist `content` under `filename`, replacing any existing file
    ///
    /// Returns the refreshed listing.
    pub async fn store(&self, filename: &str, content: &[u8]) -> StorageResult<Vec<String>> {
        let path = self.path_for(filename)?;
        let _guard = self.mutation.lock().await;

        tokio::fs::write(&path, content).await?;
        self.add(filename);
        self.scan().await
    }

    /// Read a stored file; `None` if it does not exist
    pub async fn read(&self, filename: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(filename)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file and return the refreshed listing
    pub async fn delete(&self, filename: &str) -> StorageResult<Vec<String>> {
        let path = self.path_for(filename)?;
        let _guard = self.mutation.lock().await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.scan().await?;
                return Err(StorageError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        self.remove(filename);
        self.scan().await
    }

    fn path_for(&self, filename: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(validate_filename(filename)?))
    }
}
