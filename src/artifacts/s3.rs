//! S3-compatible artifact store.
//!
//! Speaks plain HTTP against MinIO, LocalStack, and other S3-compatible
//! endpoints. Immutable writes use `If-None-Match: *` so the service never
//! clobbers a published artifact; pointer writes are unconditional PUTs.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::info;

use crate::canonical::checksum;
use crate::errors::{Error, Result};

use super::store::{ArtifactStore, PutOutcome};

/// Connection parameters for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Path-style addressing; required for MinIO.
    pub path_style: bool,
    pub timeout_secs: u64,
}

impl S3Config {
    pub fn minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        S3Config {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            path_style: true,
            timeout_secs: 30,
        }
    }
}

pub struct S3Store {
    config: S3Config,
    client: reqwest::Client,
}

impl S3Store {
    pub fn new(config: S3Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::unavailable(
                    "failed to build object storage client",
                    json!({ "error": e.to_string() }),
                )
            })?;
        Ok(S3Store { config, client })
    }

    fn object_url(&self, key: &str) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        if self.config.path_style {
            format!("{}/{}/{}", endpoint, self.config.bucket, key)
        } else {
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            let scheme = if endpoint.starts_with("http://") {
                "http"
            } else {
                "https"
            };
            format!("{}://{}.{}/{}", scheme, self.config.bucket, host, key)
        }
    }

    fn transient(&self, op: &str, key: &str, err: impl ToString) -> Error {
        Error::unavailable(
            format!("object storage {op} failed"),
            json!({
                "bucket": self.config.bucket,
                "key": key,
                "error": err.to_string(),
            }),
        )
    }

    fn unexpected_status(&self, op: &str, key: &str, status: StatusCode) -> Error {
        Error::publishing(
            format!("object storage {op} returned {status}"),
            json!({
                "bucket": self.config.bucket,
                "key": key,
                "status": status.as_u16(),
            }),
        )
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn put_immutable(&self, key: &str, bytes: &[u8]) -> Result<PutOutcome> {
        let url = self.object_url(key);
        let response = self
            .client
            .put(&url)
            .header("Content-Type", "application/json")
            .header("If-None-Match", "*")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| self.transient("PUT", key, e))?;

        match response.status() {
            s if s.is_success() => {
                info!(bucket = %self.config.bucket, key, bytes = bytes.len(), "Wrote artifact");
                Ok(PutOutcome::Created)
            }
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                // Key exists; surface its checksum for the caller's
                // same-content check.
                let existing = self.get(key).await?.ok_or_else(|| {
                    self.unexpected_status("PUT", key, StatusCode::PRECONDITION_FAILED)
                })?;
                Ok(PutOutcome::AlreadyExists {
                    existing_checksum: checksum(&existing),
                })
            }
            s if s.is_server_error() => Err(self.transient("PUT", key, s)),
            s => Err(self.unexpected_status("PUT", key, s)),
        }
    }

    async fn put_mutable(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let url = self.object_url(key);
        let response = self
            .client
            .put(&url)
            .header("Content-Type", "application/json")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| self.transient("PUT", key, e))?;

        match response.status() {
            s if s.is_success() => {
                info!(bucket = %self.config.bucket, key, bytes = bytes.len(), "Wrote pointer");
                Ok(())
            }
            s if s.is_server_error() => Err(self.transient("PUT", key, s)),
            s => Err(self.unexpected_status("PUT", key, s)),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transient("GET", key, e))?;

        match response.status() {
            s if s.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| self.transient("GET", key, e))?;
                Ok(Some(bytes.to_vec()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_server_error() => Err(self.transient("GET", key, s)),
            s => Err(self.unexpected_status("GET", key, s)),
        }
    }

    fn uri_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.config.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_style_url() {
        let store = S3Store::new(S3Config::minio("http://localhost:9000", "fraud-artifacts"))
            .unwrap();
        assert_eq!(
            store.object_url("rulesets/prod/INDIA/IN/CARD_AUTH/v5/ruleset.json"),
            "http://localhost:9000/fraud-artifacts/rulesets/prod/INDIA/IN/CARD_AUTH/v5/ruleset.json"
        );
    }

    #[test]
    fn test_virtual_host_url() {
        let mut config = S3Config::minio("https://s3.ap-south-1.amazonaws.com", "fraud-artifacts");
        config.path_style = false;
        let store = S3Store::new(config).unwrap();
        assert_eq!(
            store.object_url("fields/registry/manifest.json"),
            "https://fraud-artifacts.s3.ap-south-1.amazonaws.com/fields/registry/manifest.json"
        );
    }

    #[test]
    fn test_s3_uri() {
        let store = S3Store::new(S3Config::minio("http://localhost:9000", "fraud-artifacts"))
            .unwrap();
        assert_eq!(
            store.uri_for("fields/registry/v1/fields.json"),
            "s3://fraud-artifacts/fields/registry/v1/fields.json"
        );
    }
}
