use async_trait::async_trait;

use crate::errors::Result;

/// Outcome of an immutable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    /// A value already exists at the key; callers compare checksums to
    /// decide between no-op success and a fatal mismatch.
    AlreadyExists { existing_checksum: String },
}

/// Object-storage boundary for published artifacts.
///
/// Two backends implement this: a filesystem root for local development
/// and an S3-compatible service. The choice is runtime configuration.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write-once semantics for versioned artifacts. Implementations must
    /// never overwrite an existing key; they report what is already there.
    async fn put_immutable(&self, key: &str, bytes: &[u8]) -> Result<PutOutcome>;

    /// Unconditional PUT for pointer objects (last writer wins).
    async fn put_mutable(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Fully qualified URI for a key (`file://...` or `s3://bucket/...`).
    fn uri_for(&self, key: &str) -> String;
}
