use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{LabelKind, LogisticRegression, Model, TfidfVectorizer};

pub const VECTORIZER_FILE: &str = "tfidf_current.bin";
pub const CLASSIFIER_FILE: &str = "model_current.bin";
pub const MANIFEST_FILE: &str = "current.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Model not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Model artifacts do not form a committed pair: {0}")]
    Mismatch(String),
}

/// Durable home of the "current" model.
///
/// `save` replaces whatever was there; `load` fails with
/// [`StoreError::NotFound`] until the first successful save.
pub trait ModelStore {
    fn save(&self, model: &Model) -> Result<(), StoreError>;
    fn load(&self) -> Result<Model, StoreError>;
    /// Whether a save has been committed. Does not read the artifacts.
    fn has_model(&self) -> bool;
}

lazy_static! {
    // One save lock per canonical models directory, shared by every handle in the process.
    static ref WRITE_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn write_lock_for(models_dir: &Path) -> Arc<Mutex<()>> {
    let key = fs::canonicalize(models_dir).unwrap_or_else(|_| models_dir.to_path_buf());
    let mut locks = WRITE_LOCKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(key).or_default())
}

/// Commit record written after both artifacts are in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub vectorizer_sha256: String,
    pub classifier_sha256: String,
    pub num_classes: usize,
    pub vocabulary_size: usize,
    /// Seconds since the Unix epoch
    pub saved_at: u64,
}

#[derive(Serialize)]
struct ClassifierArtifactRef<'a> {
    classifier: &'a LogisticRegression,
    label_kind: LabelKind,
}

#[derive(Deserialize)]
struct ClassifierArtifact {
    classifier: LogisticRegression,
    label_kind: LabelKind,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Stores the current model as two bincode artifacts plus a JSON manifest.
///
/// Saves are serialized per directory across every handle in the process.
/// Each file is written to a temporary sibling and renamed into place; the
/// manifest goes last and carries the SHA-256 of both artifacts, so a reader
/// that races a writer (or finds the leftovers of a crash) gets
/// [`StoreError::Mismatch`] instead of a vectorizer/classifier pair that was
/// never fit together.
#[derive(Clone, Debug)]
pub struct FileModelStore {
    models_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileModelStore {
    /// Creates a new FileModelStore with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("ODS_CLASSIFIER_HOME") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("ods-classifier").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("ods-classifier").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("ods-classifier").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        let write_lock = write_lock_for(&models_dir);
        Ok(Self { models_dir, write_lock })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn vectorizer_path(&self) -> PathBuf {
        self.models_dir.join(VECTORIZER_FILE)
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.models_dir.join(CLASSIFIER_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.models_dir.join(MANIFEST_FILE)
    }

    pub fn is_model_saved(&self) -> bool {
        let manifest_path = self.manifest_path();
        log::debug!("Checking for manifest at {:?} (exists: {})", manifest_path, manifest_path.exists());
        manifest_path.exists()
    }

    pub fn read_manifest(&self) -> Result<Manifest, StoreError> {
        let path = self.manifest_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!(
                    "no model has been saved in {:?}",
                    self.models_dir
                )));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(format!("manifest: {}", e)))
    }

    /// Checks both artifacts against the manifest without deserializing them.
    pub fn verify_model(&self) -> Result<bool, StoreError> {
        let manifest = self.read_manifest()?;
        let vectorizer_ok = self.verify_file(&self.vectorizer_path(), &manifest.vectorizer_sha256)?;
        let classifier_ok = self.verify_file(&self.classifier_path(), &manifest.classifier_sha256)?;
        log::info!("Verification results: vectorizer {}, classifier {}", vectorizer_ok, classifier_ok);
        Ok(vectorizer_ok && classifier_ok)
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(sha256_hex(&bytes) == expected_hash),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read_artifact(&self, path: &Path, expected_hash: &str, artifact: &str) -> Result<Vec<u8>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Mismatch(format!("{} file {:?} is missing", artifact, path)));
            }
            Err(e) => return Err(e.into()),
        };
        let hash = sha256_hex(&bytes);
        if hash != expected_hash {
            log::error!("{} hash mismatch: expected {}, got {}", artifact, expected_hash, hash);
            return Err(StoreError::Mismatch(format!(
                "{} file {:?} does not match the manifest",
                artifact, path
            )));
        }
        Ok(bytes)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, path)
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, model: &Model) -> Result<(), StoreError> {
        let _lock = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let vectorizer_bytes = bincode::serialize(model.vectorizer())
            .map_err(|e| StoreError::Serialization(format!("vectorizer: {}", e)))?;
        let classifier_bytes = bincode::serialize(&ClassifierArtifactRef {
            classifier: model.classifier(),
            label_kind: model.label_kind(),
        })
        .map_err(|e| StoreError::Serialization(format!("classifier: {}", e)))?;

        let info = model.info();
        let manifest = Manifest {
            vectorizer_sha256: sha256_hex(&vectorizer_bytes),
            classifier_sha256: sha256_hex(&classifier_bytes),
            num_classes: info.num_classes,
            vocabulary_size: info.vocabulary_size,
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StoreError::Serialization(format!("manifest: {}", e)))?;

        fs::create_dir_all(&self.models_dir)?;
        log::info!("Writing {} bytes to {:?}", vectorizer_bytes.len(), self.vectorizer_path());
        self.write_atomic(&self.vectorizer_path(), &vectorizer_bytes)?;
        log::info!("Writing {} bytes to {:?}", classifier_bytes.len(), self.classifier_path());
        self.write_atomic(&self.classifier_path(), &classifier_bytes)?;
        self.write_atomic(&self.manifest_path(), &manifest_bytes)?;

        log::info!(
            "Saved model ({} classes, {} terms) to {:?}",
            manifest.num_classes,
            manifest.vocabulary_size,
            self.models_dir
        );
        Ok(())
    }

    fn load(&self) -> Result<Model, StoreError> {
        let manifest = self.read_manifest()?;
        log::debug!("Loading model saved at {} from {:?}", manifest.saved_at, self.models_dir);

        let vectorizer_bytes = self.read_artifact(&self.vectorizer_path(), &manifest.vectorizer_sha256, "vectorizer")?;
        let classifier_bytes = self.read_artifact(&self.classifier_path(), &manifest.classifier_sha256, "classifier")?;

        let vectorizer: TfidfVectorizer = bincode::deserialize(&vectorizer_bytes)
            .map_err(|e| StoreError::Serialization(format!("vectorizer: {}", e)))?;
        let artifact: ClassifierArtifact = bincode::deserialize(&classifier_bytes)
            .map_err(|e| StoreError::Serialization(format!("classifier: {}", e)))?;

        Model::new(vectorizer, artifact.classifier, artifact.label_kind)
            .map_err(|e| StoreError::Mismatch(e.to_string()))
    }

    fn has_model(&self) -> bool {
        self.is_model_saved()
    }
}

/// Keeps the current model in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    current: Mutex<Option<Model>>,
    saves: AtomicUsize,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: Model) -> Self {
        Self {
            current: Mutex::new(Some(model)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, model: &Model) -> Result<(), StoreError> {
        let mut current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(model.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Result<Model, StoreError> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| StoreError::NotFound("no model has been saved in memory".into()))
    }

    fn has_model(&self) -> bool {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::VectorizerConfig;

    fn fitted_model() -> Model {
        let texts = ["good food", "bad food", "good place", "bad place"];
        let labels: Vec<String> = ["pos", "neg", "pos", "neg"].iter().map(|s| s.to_string()).collect();
        let mut vectorizer = TfidfVectorizer::new(VectorizerConfig { min_df: 1, ..VectorizerConfig::default() });
        let features = vectorizer.fit_transform(&texts).unwrap();
        let mut classifier = LogisticRegression::default();
        classifier.fit(&features, &labels).unwrap();
        Model::new(vectorizer, classifier, LabelKind::Text).unwrap()
    }

    #[test]
    fn test_load_before_save_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path()).unwrap();
        assert!(!store.has_model());
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_save_writes_manifest_last() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path()).unwrap();
        store.save(&fitted_model()).unwrap();

        assert!(store.is_model_saved());
        assert!(store.verify_model().unwrap());
        let manifest = store.read_manifest().unwrap();
        assert_eq!(manifest.num_classes, 2);
        assert!(!dir.path().join("current.tmp").exists());
    }

    #[test]
    fn test_tampered_artifact_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path()).unwrap();
        store.save(&fitted_model()).unwrap();

        fs::write(store.classifier_path(), b"corrupted data").unwrap();
        assert!(!store.verify_model().unwrap());
        assert!(matches!(store.load(), Err(StoreError::Mismatch(_))));
    }

    #[test]
    fn test_missing_artifact_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path()).unwrap();
        store.save(&fitted_model()).unwrap();

        fs::remove_file(store.vectorizer_path()).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Mismatch(_))));
    }

    #[test]
    fn test_handles_on_one_directory_share_the_save_lock() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileModelStore::new(dir.path()).unwrap();
        let second = FileModelStore::new(dir.path().join(".")).unwrap();
        assert!(Arc::ptr_eq(&first.write_lock, &second.write_lock));

        let _held = first.write_lock.lock().unwrap();
        assert!(second.write_lock.try_lock().is_err());

        let other_dir = tempfile::tempdir().unwrap();
        let other = FileModelStore::new(other_dir.path()).unwrap();
        assert!(!Arc::ptr_eq(&first.write_lock, &other.write_lock));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryModelStore::new();
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
        assert!(!store.has_model());

        let model = fitted_model();
        store.save(&model).unwrap();
        assert!(store.has_model());
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            store.load().unwrap().predict(&["good"]).unwrap(),
            model.predict(&["good"]).unwrap()
        );
    }

    #[test]
    fn test_default_models_dir() {
        // Test with environment variable
        env::set_var("ODS_CLASSIFIER_HOME", "/tmp/test-ods-home");
        let path = FileModelStore::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-ods-home/models"));
        env::remove_var("ODS_CLASSIFIER_HOME");

        // Test without environment variable
        let path = FileModelStore::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("ods-classifier/models"));
    }
}
