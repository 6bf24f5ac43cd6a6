//! # Pod Spec Store
//!
//! Durable handoff between building a pod's engine document and asking the
//! engine to create it. One file per pod, named by the encoded pod identity:
//!
//! ```text
//! /var/lib/kubelet/hyper/
//! ├── kube_<uid>_web_default
//! └── kube_<uid>_db_prod
//! ```
//!
//! This is not a cache. The file is overwritten on every run and removed on
//! kill.
//!
//! ## Security Model
//!
//! ### Key Validation
//!
//! Keys become file names. A key that is empty, contains a path separator or
//! is `.`/`..` is rejected before any path is built.
//!
//! ### Atomic Writes
//!
//! Files are written to a unique temp name and renamed into place, so a
//! crash never leaves a truncated document behind.
//!
//! ## Permissions
//!
//! The directory is created on demand with mode `0755`; files get `0664`.

use crate::constants::{SPEC_DIR_MODE, SPEC_FILE_MODE};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed store of serialized pod documents.
///
/// ## Thread Safety
///
/// `SpecStore` is safe to use from multiple threads. Operations on
/// different keys are independent; the caller serializes operations on the
/// same key.
#[derive(Debug, Clone)]
pub struct SpecStore {
    /// Base directory of the store.
    base_dir: PathBuf,
}

impl SpecStore {
    /// Creates a store at the specified path, creating the directory.
    pub fn with_path(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        create_dir(&base_dir).map_err(|e| Error::StorageInitFailed {
            path: base_dir.clone(),
            reason: e.to_string(),
        })?;

        info!("Spec store initialized at: {}", base_dir.display());

        Ok(Self { base_dir })
    }

    /// Returns the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file for `key`.
    pub fn spec_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }

    /// Checks if a spec exists.
    pub fn exists(&self, key: &str) -> bool {
        self.spec_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Stores `data` under `key`, replacing any previous content.
    pub fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.spec_path(key)?;

        // The directory may have been removed since construction.
        create_dir(&self.base_dir).map_err(|e| Error::StorageWriteFailed(e.to_string()))?;

        let temp_path = self
            .base_dir
            .join(format!(".{key}.tmp.{}", uuid::Uuid::now_v7()));
        write_file(&temp_path, data).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::StorageWriteFailed(e.to_string())
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::StorageWriteFailed(e.to_string())
        })?;

        debug!("Stored pod spec {} ({} bytes)", key, data.len());
        Ok(())
    }

    /// Reads the spec stored under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.spec_path(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::SpecNotFound {
                key: key.to_string(),
            },
            _ => Error::Io(e),
        })
    }

    /// Removes the spec stored under `key`. Removing a missing key succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.spec_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed pod spec {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageWriteFailed(e.to_string())),
        }
    }

    /// Lists stored keys.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(Error::InvalidInput(format!("invalid spec store key '{key}'")));
    }
    Ok(())
}

#[cfg(unix)]
fn create_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(SPEC_DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> std::io::Result<()> {
    let _ = SPEC_DIR_MODE;
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(SPEC_FILE_MODE)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let _ = SPEC_FILE_MODE;
    fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_spec_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = SpecStore::with_path(temp.path()).unwrap();

        store.put("kube_u_p_n", b"{}").unwrap();
        assert!(store.exists("kube_u_p_n"));
        assert_eq!(store.get("kube_u_p_n").unwrap(), b"{}");

        store.delete("kube_u_p_n").unwrap();
        assert!(!store.exists("kube_u_p_n"));
    }

    #[test]
    fn test_rejects_path_keys() {
        let temp = TempDir::new().unwrap();
        let store = SpecStore::with_path(temp.path()).unwrap();

        assert!(store.put("../escape", b"x").is_err());
        assert!(store.put("a/b", b"x").is_err());
        assert!(store.put("", b"x").is_err());
    }
}
