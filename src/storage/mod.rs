//! Local File Storage
//!
//! Persists uploaded files in a flat data directory with simple
//! byte-quota accounting. Replication and the HTTP layer both read
//! files back through this store.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Flat on-disk file store with a byte quota.
pub struct LocalStore {
    root: PathBuf,
    quota_bytes: u64,
}

impl LocalStore {
    /// Create the store, ensuring the data directory exists.
    pub fn new(root: PathBuf, quota_bytes: u64) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, quota_bytes })
    }

    /// Data directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured quota in bytes
    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Validate a client-supplied filename and resolve it under the root.
    /// Names are flat: no separators, no parent references.
    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            return Err(Error::InvalidFilename(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }

    /// Write `bytes` as `filename`, enforcing the quota first.
    ///
    /// Overwriting an existing file only counts the size difference
    /// against the quota. Returns the on-disk path.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(filename)?;

        let used = self.usage().await?;
        let replaced = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        let after = used - replaced + bytes.len() as u64;
        if after > self.quota_bytes {
            return Err(Error::QuotaExceeded {
                used,
                incoming: bytes.len() as u64,
                limit: self.quota_bytes,
            });
        }

        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("Stored '{}' ({} bytes)", filename, bytes.len());
        Ok(path)
    }

    /// Read a stored file's content.
    pub async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolve(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sorted list of stored filenames.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a stored file. Removing a file that does not exist is not
    /// an error, matching the delete endpoint's contract.
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Total bytes currently stored.
    pub async fn usage(&self) -> Result<u64> {
        let mut total = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }

    /// Number of stored files.
    pub async fn file_count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}
