use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use reqwest;
use sha2::{Sha256, Digest};
use dirs;
use log;

/// Serialized-graph artifact, preferred when present.
pub const GRAPH_FILE: &str = "model_weights.onnx";
/// Raw parameter checkpoint, used when no graph is available.
pub const CHECKPOINT_FILE: &str = "model_weights.safetensors";
/// Training-time metadata (class count, label map, artifact digests).
pub const META_FILE: &str = "meta.json";

/// Environment variable overriding the default weights directory.
pub const WEIGHTS_ENV: &str = "SSPRED_WEIGHTS";

#[derive(Debug, thiserror::Error)]
pub enum WeightStoreError {
    #[error("No model artifacts found in {dir}. Expected {graph} or {checkpoint} (+ {meta}).", graph = GRAPH_FILE, checkpoint = CHECKPOINT_FILE, meta = META_FILE)]
    NotFound { dir: String },
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Locates, verifies and fetches the weight artifacts of the predictor.
///
/// A weights directory holds up to three files: [`GRAPH_FILE`],
/// [`CHECKPOINT_FILE`] and [`META_FILE`].
#[derive(Clone, Debug)]
pub struct WeightStore {
    weights_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl WeightStore {
    /// Creates a new WeightStore with the default weights directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_weights_dir())
    }

    /// Returns the default weights directory path
    pub fn get_default_weights_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(WEIGHTS_ENV) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("sspred").join("weights");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("sspred").join("weights");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("sspred").join("weights")
    }

    /// The directory is not created here; only [`WeightStore::download_artifact`]
    /// writes to it.
    pub fn new<P: AsRef<Path>>(weights_dir: P) -> Self {
        Self {
            weights_dir: weights_dir.as_ref().to_path_buf(),
            download_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }

    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.weights_dir.join(file_name)
    }

    pub fn graph_path(&self) -> PathBuf {
        self.artifact_path(GRAPH_FILE)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.artifact_path(CHECKPOINT_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.artifact_path(META_FILE)
    }

    pub fn has_graph(&self) -> bool {
        self.graph_path().exists()
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint_path().exists()
    }

    /// True when at least one loadable artifact is present.
    pub fn is_available(&self) -> bool {
        let graph_path = self.graph_path();
        let checkpoint_path = self.checkpoint_path();
        log::debug!("Checking for model artifacts:");
        log::debug!("  Graph path: {:?} (exists: {})", graph_path, graph_path.exists());
        log::debug!("  Checkpoint path: {:?} (exists: {})", checkpoint_path, checkpoint_path.exists());
        graph_path.exists() || checkpoint_path.exists()
    }

    /// Fails with [`WeightStoreError::NotFound`] when neither artifact exists.
    pub fn ensure_available(&self) -> Result<(), WeightStoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(WeightStoreError::NotFound {
                dir: self.weights_dir.display().to_string(),
            })
        }
    }

    /// Checks an artifact against its expected digest, failing with
    /// [`WeightStoreError::HashMismatch`] when it differs.
    pub fn verify_artifact(&self, file_name: &str, expected_hash: &str) -> Result<(), WeightStoreError> {
        let path = self.artifact_path(file_name);
        let bytes = fs::read(&path)?;
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected_hash) {
            log::error!("{} hash mismatch: expected {}, got {}", file_name, expected_hash, actual);
            return Err(WeightStoreError::HashMismatch {
                file_type: file_name.to_string(),
                expected: expected_hash.to_string(),
                actual,
            });
        }
        log::info!("{} verified successfully", file_name);
        Ok(())
    }

    /// Downloads `url` into the weights directory as `file_name`.
    ///
    /// When `expected_hash` is given the payload is checked before anything is
    /// written. The weights directory is created if it does not exist yet.
    pub async fn download_artifact(
        &self,
        url: &str,
        file_name: &str,
        expected_hash: Option<&str>,
    ) -> Result<PathBuf, WeightStoreError> {
        let _lock = self.download_lock.lock().await;
        let path = self.artifact_path(file_name);

        log::info!("Downloading {} from {} to {:?}", file_name, url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let hash = sha256_hex(&bytes);
            if !hash.eq_ignore_ascii_case(expected) {
                log::error!("{} hash mismatch: expected {}, got {}", file_name, expected, hash);
                return Err(WeightStoreError::HashMismatch {
                    file_type: file_name.to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        fs::create_dir_all(&self.weights_dir)?;
        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(&path, &bytes)?;

        log::info!("{} downloaded successfully", file_name);
        Ok(path)
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
