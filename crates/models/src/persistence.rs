//! Model artifact persistence.
//!
//! A trained model is stored as one JSON document wrapped in an `Artifact`
//! that records the catalog fingerprint it was trained against. Writes go
//! to a `.tmp` sibling first and are renamed into place, so a crash mid-save
//! never leaves a half-written artifact where a loader would find it. Loads
//! reject fingerprint mismatches instead of serving a stale model.

use crate::error::{ModelError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Fingerprint-tagged wrapper around a persisted payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub fingerprint: u64,
    pub payload: T,
}

/// Directory-rooted store for named model artifacts.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Final path for a named artifact
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Atomically persist a payload under `name`, tagged with the catalog
    /// fingerprint it was trained on
    pub fn save<T: Serialize>(&self, name: &str, fingerprint: u64, payload: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let artifact = Artifact {
            fingerprint,
            payload,
        };
        let bytes = serde_json::to_vec(&artifact)?;

        let path = self.path(name);
        // Unique per write so concurrent savers never clobber each other's
        // staging file; the rename into place stays atomic either way
        let tmp = tmp_path(&path);
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        info!(name, bytes = bytes.len(), path = %path.display(), "saved model artifact");
        Ok(())
    }

    /// Load a payload saved under `name`.
    ///
    /// Fails with `Stale` when the stored fingerprint does not match the
    /// serving catalog; the caller retrains instead of serving mismatched
    /// vocabulary.
    pub fn load<T: DeserializeOwned>(&self, name: &str, expected_fingerprint: u64) -> Result<T> {
        let path = self.path(name);
        let bytes = fs::read(&path)?;
        let artifact: Artifact<T> = serde_json::from_slice(&bytes)?;
        if artifact.fingerprint != expected_fingerprint {
            warn!(
                name,
                stored = artifact.fingerprint,
                expected = expected_fingerprint,
                "persisted artifact is stale"
            );
            return Err(ModelError::Stale {
                expected: expected_fingerprint,
                found: artifact.fingerprint,
            });
        }
        Ok(artifact.payload)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cf::{CfConfig, CfModel};
    use catalog::SyntheticCatalog;

    fn scratch_store(tag: &str) -> ModelStore {
        let dir = std::env::temp_dir().join(format!(
            "pen-intel-store-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        ModelStore::new(dir)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let catalog = SyntheticCatalog::new(4).generate().unwrap();
        let model = CfModel::train(&catalog, &CfConfig::default()).unwrap();
        let store = scratch_store("roundtrip");

        let fingerprint = catalog.fingerprint();
        store.save("cf", fingerprint, &model).unwrap();
        assert!(store.exists("cf"));

        let loaded: CfModel = store.load("cf", fingerprint).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.predict(1, 1), model.predict(1, 1));
        assert_eq!(loaded.predict(17, 30), model.predict(17, 30));
    }

    #[test]
    fn test_load_rejects_stale_fingerprint() {
        let catalog = SyntheticCatalog::new(4).generate().unwrap();
        let model = CfModel::train(&catalog, &CfConfig::default()).unwrap();
        let store = scratch_store("stale");

        store.save("cf", catalog.fingerprint(), &model).unwrap();
        let err = store
            .load::<CfModel>("cf", catalog.fingerprint() ^ 1)
            .unwrap_err();
        assert!(matches!(err, ModelError::Stale { .. }));
    }

    #[test]
    fn test_load_missing_artifact_is_io_error() {
        let store = scratch_store("missing");
        let err = store.load::<CfModel>("nothing-here", 0).unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let catalog = SyntheticCatalog::new(4).generate().unwrap();
        let model = CfModel::train(&catalog, &CfConfig::default()).unwrap();
        let store = scratch_store("tmp");

        store.save("cf", catalog.fingerprint(), &model).unwrap();
        let leftovers = fs::read_dir(&store.dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let store = scratch_store("garbage");
        fs::create_dir_all(&store.dir).unwrap();
        fs::write(store.path("cf"), b"{ not json").unwrap();

        let err = store.load::<CfModel>("cf", 0).unwrap_err();
        assert!(matches!(err, ModelError::Serde(_)));
    }
}
