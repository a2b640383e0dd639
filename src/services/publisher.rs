//! Ruleset artifact publishing.
//!
//! Called by the store inside the ruleset-approve transaction. Write
//! order is locked: (a) immutable artifact, (b) DB manifest row, (c)
//! mutable pointer. An orphaned artifact is harmless (content-addressed);
//! a pointer without its artifact or manifest row is not, so the pointer
//! always goes last.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::artifacts::keys::{ruleset_artifact_key, ruleset_pointer_key};
use crate::artifacts::store::{ArtifactStore, PutOutcome};
use crate::canonical::{to_canonical_bytes, FloatPolicy};
use crate::compiler::CompiledArtifact;
use crate::domain::enums::RuleType;
use crate::domain::ruleset::RulesetScope;
use crate::errors::{Error, Result};

/// Pointer schema version (locked).
const POINTER_SCHEMA_VERSION: &str = "1.0";

/// Transient storage failures are retried this many times.
const MAX_ATTEMPTS: u32 = 3;

/// Map a governance rule type to its runtime publication key.
///
/// ALLOWLIST and BLOCKLIST rulesets are governance-only; publishing them
/// is a validation failure, not a state error.
pub fn runtime_ruleset_key(rule_type: RuleType) -> Result<&'static str> {
    rule_type.ruleset_key().ok_or_else(|| {
        Error::validation(
            format!("rule type '{rule_type}' cannot be published to runtime"),
            json!({
                "rule_type": rule_type.as_str(),
                "valid_types": ["AUTH", "MONITORING"],
            }),
        )
    })
}

/// Content of the mutable pointer object.
#[derive(Debug, Clone)]
pub struct PointerDoc {
    pub scope: RulesetScope,
    pub ruleset_key: &'static str,
    pub ruleset_version: i32,
    pub artifact_uri: String,
    pub checksum: String,
    pub field_registry_version: Option<i32>,
    pub published_at: DateTime<Utc>,
}

impl PointerDoc {
    fn to_json(&self) -> Value {
        let mut doc = json!({
            "schema_version": POINTER_SCHEMA_VERSION,
            "environment": self.scope.environment,
            "region": self.scope.region,
            "country": self.scope.country,
            "ruleset_key": self.ruleset_key,
            "ruleset_version": self.ruleset_version,
            "artifact_uri": self.artifact_uri,
            "checksum": self.checksum,
            "published_at": self.published_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let Some(v) = self.field_registry_version {
            doc["field_registry_version"] = json!(v);
        }
        doc
    }
}

/// Object-storage side of the publish flow, invoked by store
/// implementations between their transactional DB writes.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Step (a): write the versioned artifact. Returns its URI. A
    /// pre-existing key with the same checksum is a no-op success; a
    /// different checksum is fatal.
    async fn write_artifact(
        &self,
        scope: &RulesetScope,
        ruleset_key: &'static str,
        version: i32,
        artifact: &CompiledArtifact,
    ) -> Result<String>;

    /// Step (c): write the mutable pointer (last writer wins).
    async fn write_pointer(&self, pointer: &PointerDoc) -> Result<()>;
}

/// Production publisher over an [`ArtifactStore`] backend.
pub struct RulesetPublisher {
    store: Arc<dyn ArtifactStore>,
    prefix: String,
}

impl RulesetPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>, prefix: impl Into<String>) -> Self {
        RulesetPublisher {
            store,
            prefix: prefix.into(),
        }
    }

    /// Retry a storage operation on transient failures with exponential
    /// backoff; anything still failing after the last attempt surfaces as
    /// a publishing error.
    async fn with_retries<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_millis(100);
        for attempt in 1..=MAX_ATTEMPTS {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e @ Error::Unavailable { .. }) if attempt < MAX_ATTEMPTS => {
                    warn!(op = op_name, attempt, error = %e, "Transient storage failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(Error::Unavailable { message, details }) => {
                    return Err(Error::publishing(
                        format!("{op_name} failed after {MAX_ATTEMPTS} attempts: {message}"),
                        details,
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("retry loop returns on the final attempt")
    }
}

#[async_trait]
impl Publisher for RulesetPublisher {
    async fn write_artifact(
        &self,
        scope: &RulesetScope,
        ruleset_key: &'static str,
        version: i32,
        artifact: &CompiledArtifact,
    ) -> Result<String> {
        let key = ruleset_artifact_key(&self.prefix, scope, ruleset_key, version);

        let outcome = self
            .with_retries("artifact write", || {
                self.store.put_immutable(&key, &artifact.bytes)
            })
            .await?;

        match outcome {
            PutOutcome::Created => {}
            PutOutcome::AlreadyExists { existing_checksum }
                if existing_checksum == artifact.checksum =>
            {
                // Republishing identical content is safe; the artifact is
                // content-addressed by its checksum.
                info!(key, checksum = %artifact.checksum, "Artifact already present, identical");
            }
            PutOutcome::AlreadyExists { existing_checksum } => {
                return Err(Error::publishing(
                    "artifact key already exists with a different checksum",
                    json!({
                        "key": key,
                        "existing_checksum": existing_checksum,
                        "new_checksum": artifact.checksum,
                    }),
                ));
            }
        }

        let uri = self.store.uri_for(&key);
        info!(uri, checksum = %artifact.checksum, "Published artifact");
        Ok(uri)
    }

    async fn write_pointer(&self, pointer: &PointerDoc) -> Result<()> {
        let key = ruleset_pointer_key(&self.prefix, &pointer.scope, pointer.ruleset_key);
        let bytes = to_canonical_bytes(&pointer.to_json(), FloatPolicy::ShortestRoundTrip)
            .map_err(|e| {
                Error::publishing(
                    format!("pointer is not canonicalizable: {e}"),
                    json!({ "key": key }),
                )
            })?;

        self.with_retries("pointer write", || self.store.put_mutable(&key, &bytes))
            .await?;

        info!(key, version = pointer.ruleset_version, "Updated pointer");
        Ok(())
    }
}
