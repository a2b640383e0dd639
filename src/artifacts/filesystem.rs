use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tokio::fs;
use tracing::info;

use crate::canonical::checksum;
use crate::errors::{Error, Result};

use super::store::{ArtifactStore, PutOutcome};

/// Filesystem-rooted artifact store for local development.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemStore { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let io_err = |e: std::io::Error| {
            Error::unavailable(
                "filesystem write failed",
                json!({ "path": path.display().to_string(), "error": e.to_string() }),
            )
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Write to a sibling temp file and rename so readers never observe
        // a partially written object.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).await.map_err(io_err)?;
        fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    async fn put_immutable(&self, key: &str, bytes: &[u8]) -> Result<PutOutcome> {
        let path = self.path_for(key);

        match fs::read(&path).await {
            Ok(existing) => {
                return Ok(PutOutcome::AlreadyExists {
                    existing_checksum: checksum(&existing),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::unavailable(
                    "filesystem read failed",
                    json!({ "path": path.display().to_string(), "error": e.to_string() }),
                ));
            }
        }

        self.write_atomically(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
        Ok(PutOutcome::Created)
    }

    async fn put_mutable(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        self.write_atomically(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote pointer");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::unavailable(
                "filesystem read failed",
                json!({ "path": path.display().to_string(), "error": e.to_string() }),
            )),
        }
    }

    fn uri_for(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_immutable_then_read_back() {
        let dir = tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        let outcome = store
            .put_immutable("rulesets/prod/INDIA/IN/CARD_AUTH/v1/ruleset.json", b"{}")
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Created);

        let read = store
            .get("rulesets/prod/INDIA/IN/CARD_AUTH/v1/ruleset.json")
            .await
            .unwrap();
        assert_eq!(read.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_put_immutable_never_overwrites() {
        let dir = tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        store.put_immutable("a/v1/ruleset.json", b"first").await.unwrap();
        let outcome = store
            .put_immutable("a/v1/ruleset.json", b"second")
            .await
            .unwrap();

        match outcome {
            PutOutcome::AlreadyExists { existing_checksum } => {
                assert_eq!(existing_checksum, checksum(b"first"));
            }
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        assert_eq!(store.get("a/v1/ruleset.json").await.unwrap().unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_put_mutable_overwrites() {
        let dir = tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        store.put_mutable("a/manifest.json", b"v1").await.unwrap();
        store.put_mutable("a/manifest.json", b"v2").await.unwrap();
        assert_eq!(store.get("a/manifest.json").await.unwrap().unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        assert!(store.get("missing.json").await.unwrap().is_none());
    }

    #[test]
    fn test_uri_form() {
        let store = FilesystemStore::new("/var/artifacts");
        assert_eq!(
            store.uri_for("fields/registry/v1/fields.json"),
            "file:///var/artifacts/fields/registry/v1/fields.json"
        );
    }
}
