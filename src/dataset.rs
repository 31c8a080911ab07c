//! Handle to the currently active dataset.
//!
//! The service keeps exactly one live database file; an upload replaces it
//! wholesale. "Not yet initialized" (no upload so far) is distinct from an
//! uploaded-but-empty database: the former is a precondition failure, the
//! latter just yields zero rows.

use crate::error::ServiceError;
use crate::util::paths;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ActiveDataset {
    data_dir: PathBuf,
    generation: AtomicU64,
}

/// What an upload replaced and when. Echoed back to the uploader.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaceReceipt {
    pub saved_as: PathBuf,
    pub size_bytes: u64,
    pub generation: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl ActiveDataset {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {:?}", data_dir))?;
        Ok(Self {
            data_dir,
            generation: AtomicU64::new(0),
        })
    }

    pub fn live_path(&self) -> PathBuf {
        paths::live_db(&self.data_dir)
    }

    pub fn is_initialized(&self) -> bool {
        self.live_path().exists()
    }

    /// Open the active database read-only for one request-scoped scan.
    pub fn open(&self) -> Result<Connection, ServiceError> {
        let path = self.live_path();
        if !path.exists() {
            return Err(ServiceError::NoDatabase);
        }
        Ok(Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    /// Swap in a new database. The bytes land in a sibling temp file first
    /// and are renamed over the live path, so a scan never observes a
    /// half-written file.
    pub fn replace(&self, bytes: &[u8]) -> Result<ReplaceReceipt, ServiceError> {
        let live = self.live_path();
        let tmp = paths::upload_tmp(&self.data_dir);
        std::fs::write(&tmp, bytes).map_err(|source| ServiceError::Replace {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &live).map_err(|source| ServiceError::Replace {
            path: live.clone(),
            source,
        })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "[gen {}] active dataset replaced: {:?} ({} bytes)",
            generation,
            live,
            bytes.len()
        );
        Ok(ReplaceReceipt {
            saved_as: live,
            size_bytes: bytes.len() as u64,
            generation,
            uploaded_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_bytes() -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE processes1 (PackageName TEXT, Uid, Pids TEXT, Metrics TEXT);")
            .unwrap();
        drop(conn);
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_open_before_first_upload_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ds = ActiveDataset::new(dir.path().join("data")).unwrap();
        assert!(!ds.is_initialized());
        assert!(matches!(ds.open(), Err(ServiceError::NoDatabase)));
    }

    #[test]
    fn test_replace_makes_dataset_readable_and_bumps_generation() {
        let dir = tempfile::tempdir().unwrap();
        let ds = ActiveDataset::new(dir.path()).unwrap();

        let bytes = sqlite_bytes();
        let first = ds.replace(&bytes).unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.size_bytes, bytes.len() as u64);
        assert!(ds.is_initialized());

        let conn = ds.open().unwrap();
        assert!(crate::storage::table_exists(&conn, "processes1").unwrap());

        let second = ds.replace(&bytes).unwrap();
        assert_eq!(second.generation, 2);
        // temp file must not linger after the rename
        assert!(!paths::upload_tmp(dir.path()).exists());
    }
}
