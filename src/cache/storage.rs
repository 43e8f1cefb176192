use crate::errors::CacheError;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A response as stored in a bucket and as returned by the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "base64_body")]
    pub body: Bytes,
}

impl AssetResponse {
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }
}

mod base64_body {
    use axum::body::Bytes;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BucketFile {
    name: String,
    entries: BTreeMap<String, AssetResponse>,
}

/// Named container of cached responses keyed by absolute URL.
#[derive(Debug)]
pub struct Bucket {
    name: String,
    file: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, AssetResponse>>,
}

impl Bucket {
    pub async fn get(&self, url: &str) -> Option<AssetResponse> {
        self.entries.read().await.get(url).cloned()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn put(&self, url: &str, response: AssetResponse) -> Result<(), CacheError> {
        self.put_all(vec![(url.to_string(), response)]).await
    }

    /// Adds every entry or none of them.
    pub async fn put_all(&self, batch: Vec<(String, AssetResponse)>) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.extend(batch);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn persist(&self, entries: &BTreeMap<String, AssetResponse>) -> Result<(), CacheError> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let file = BucketFile {
            name: self.name.clone(),
            entries: entries.clone(),
        };
        let payload =
            serde_json::to_vec(&file).map_err(|err| CacheError::Storage(err.to_string()))?;

        let staging = staging_path(path);
        fs::write(&staging, payload)
            .await
            .map_err(|err| CacheError::Storage(format!("{}: {err}", staging.display())))?;
        fs::rename(&staging, path)
            .await
            .map_err(|err| CacheError::Storage(format!("{}: {err}", path.display())))
    }
}

/// Every bucket the cache worker knows about, optionally mirrored to a directory.
#[derive(Debug, Default)]
pub struct CacheStorage {
    root: Option<PathBuf>,
    buckets: RwLock<BTreeMap<String, Arc<Bucket>>>,
}

impl CacheStorage {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the buckets persisted under `root`, creating the directory if needed.
    pub async fn open_dir(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|err| CacheError::Storage(format!("{}: {err}", root.display())))?;

        let mut buckets = BTreeMap::new();
        let mut dir = fs::read_dir(&root)
            .await
            .map_err(|err| CacheError::Storage(err.to_string()))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| CacheError::Storage(err.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match read_bucket(&path).await {
                Ok(file) => {
                    let bucket = Bucket {
                        name: file.name.clone(),
                        file: Some(path),
                        entries: RwLock::new(file.entries),
                    };
                    buckets.insert(file.name, Arc::new(bucket));
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable cache bucket"),
            }
        }

        info!(root = %root.display(), buckets = buckets.len(), "cache storage opened");
        Ok(Self {
            root: Some(root),
            buckets: RwLock::new(buckets),
        })
    }

    /// Returns the bucket called `name`, creating an empty one if absent.
    pub async fn open(&self, name: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.read().await.get(name) {
            return Arc::clone(bucket);
        }
        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Bucket {
                name: name.to_string(),
                file: self.root.as_deref().map(|root| bucket_path(root, name)),
                entries: RwLock::new(BTreeMap::new()),
            })
        });
        Arc::clone(bucket)
    }

    pub async fn has(&self, name: &str) -> bool {
        self.buckets.read().await.contains_key(name)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.buckets.read().await.keys().cloned().collect()
    }

    pub async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let Some(bucket) = self.buckets.write().await.remove(name) else {
            return Ok(false);
        };
        if let Some(path) = &bucket.file {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(CacheError::Storage(err.to_string())),
            }
        }
        Ok(true)
    }
}

async fn read_bucket(path: &Path) -> Result<BucketFile, CacheError> {
    let bytes = fs::read(path)
        .await
        .map_err(|err| CacheError::Storage(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| CacheError::Storage(err.to_string()))
}

/// Bucket files are staged here and renamed into place.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn bucket_path(root: &Path, name: &str) -> PathBuf {
    let file_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    root.join(format!("{file_name}.json"))
}
