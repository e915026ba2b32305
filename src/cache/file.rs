//! Directory-backed cache store that survives between runs.
//!
//! Each key is written to `<dir>/<sha256(key)>.json`. Keys can hold whole SQL
//! statements, so they are hashed rather than used as file names.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::store::{CacheError, CacheStore};

pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Use `dir`, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::Io {
                key: dir.display().to_string(),
                source,
            })?;
        Ok(FileCacheStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.dir
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let content = match tokio::fs::read(self.path_for(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| CacheError::Serde {
                key: key.to_string(),
                source,
            })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CacheError> {
        let content = serde_json::to_vec(&value).map_err(|source| CacheError::Serde {
            key: key.to_string(),
            source,
        })?;

        // Write then rename so a reader never sees a half-written record
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, content)
            .await
            .map_err(|source| CacheError::Io {
                key: key.to_string(),
                source,
            })?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|source| CacheError::Io {
                key: key.to_string(),
                source,
            })
    }
}
