/// Local persisted state
///
/// JSON values stored as one file per key under the data directory, the
/// on-disk stand-in for browser local storage.
use crate::error::{TubeError, TubeResult};
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// File path for a key; anything outside `[A-Za-z0-9_-]` becomes `_`
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", name))
    }

    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> TubeResult<Option<T>> {
        let path = self.path_for(key);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TubeError::Io(e)),
        }
    }

    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> TubeResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let data = serde_json::to_vec_pretty(value)?;
        fs::write(self.path_for(key), data).await?;
        Ok(())
    }

    /// Remove a key; missing keys are not an error
    pub async fn remove(&self, key: &str) -> TubeResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TubeError::Io(e)),
        }
    }
}
