//! Field catalog cache and field-registry publication.
//!
//! The registry artifact is the runtime's view of the field catalog:
//! a canonical snapshot of every APPROVED field version, versioned and
//! content-addressed like ruleset artifacts. Publishing a new registry
//! invalidates the in-process catalog cache.

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::artifacts::keys::{registry_artifact_key, registry_pointer_key};
use crate::artifacts::store::{ArtifactStore, PutOutcome};
use crate::canonical::{checksum, to_canonical_bytes, FloatPolicy};
use crate::domain::field::{FieldCatalog, FieldRegistryManifest, RuleFieldVersion};
use crate::domain::id::ordered_uuid;
use crate::errors::{Error, Result};
use crate::storage::traits::Store;

/// Registry pointer schema version.
const POINTER_SCHEMA_VERSION: &str = "1.0";

/// Owns the catalog cache and the registry publication flow.
pub struct RegistryService {
    store: Arc<dyn Store>,
    artifacts: Arc<dyn ArtifactStore>,
    prefix: String,
    cache: RwLock<Option<FieldCatalog>>,
}

impl RegistryService {
    pub fn new(
        store: Arc<dyn Store>,
        artifacts: Arc<dyn ArtifactStore>,
        prefix: impl Into<String>,
    ) -> Self {
        RegistryService {
            store,
            artifacts,
            prefix: prefix.into(),
            cache: RwLock::new(None),
        }
    }

    /// Active catalog, cached until the next registry publish.
    pub async fn catalog(&self) -> Result<FieldCatalog> {
        if let Some(cached) = self.cache.read().clone() {
            return Ok(cached);
        }
        let fresh = self.store.active_catalog().await?;
        *self.cache.write() = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached catalog; the next read reloads from the store.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    /// First unused field id (ids 1..26 are reserved for standard fields).
    pub async fn next_field_id(&self) -> Result<i32> {
        self.store.next_field_id().await
    }

    /// Snapshot all APPROVED field versions and publish them as the next
    /// registry version: artifact first, manifest row second, pointer last.
    pub async fn publish_registry(&self, by: &str) -> Result<FieldRegistryManifest> {
        let mut versions = self.store.approved_field_versions().await?;
        versions.sort_by_key(|v| v.field_id);

        let registry_version = self.store.latest_registry_version().await?.unwrap_or(0) + 1;
        let snapshot = registry_snapshot(registry_version, &versions);

        let bytes =
            to_canonical_bytes(&snapshot, FloatPolicy::Reject).map_err(|e| {
                Error::publishing(
                    format!("registry snapshot is not canonicalizable: {e}"),
                    json!({ "registry_version": registry_version }),
                )
            })?;
        let digest = checksum(&bytes);

        let artifact_key = registry_artifact_key(&self.prefix, registry_version);
        match self.artifacts.put_immutable(&artifact_key, &bytes).await? {
            PutOutcome::Created => {}
            PutOutcome::AlreadyExists { existing_checksum } if existing_checksum == digest => {}
            PutOutcome::AlreadyExists { existing_checksum } => {
                return Err(Error::publishing(
                    "registry artifact key already exists with a different checksum",
                    json!({
                        "key": artifact_key,
                        "existing_checksum": existing_checksum,
                        "new_checksum": digest,
                    }),
                ));
            }
        }
        let artifact_uri = self.artifacts.uri_for(&artifact_key);

        let manifest = self
            .store
            .insert_registry_manifest(FieldRegistryManifest {
                manifest_id: ordered_uuid(),
                registry_version,
                artifact_uri: artifact_uri.clone(),
                checksum: digest.clone(),
                field_count: versions.len() as i32,
                created_by: by.to_string(),
                created_at: Utc::now(),
            })
            .await?;

        let pointer = json!({
            "schema_version": POINTER_SCHEMA_VERSION,
            "registry_version": registry_version,
            "artifact_uri": artifact_uri,
            "checksum": digest,
            "field_count": versions.len(),
            "published_at": manifest.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let pointer_bytes = to_canonical_bytes(&pointer, FloatPolicy::ShortestRoundTrip)
            .map_err(|e| {
                Error::publishing(
                    format!("registry pointer is not canonicalizable: {e}"),
                    json!({ "registry_version": registry_version }),
                )
            })?;
        self.artifacts
            .put_mutable(&registry_pointer_key(&self.prefix), &pointer_bytes)
            .await?;

        self.invalidate();

        info!(
            registry_version,
            fields = versions.len(),
            checksum = %manifest.checksum,
            "Published field registry"
        );
        Ok(manifest)
    }
}

/// Registry artifact content: fields ordered by field_id for stable output.
fn registry_snapshot(registry_version: i32, versions: &[RuleFieldVersion]) -> Value {
    let fields: Vec<Value> = versions
        .iter()
        .map(|v| {
            let mut operators: Vec<&str> =
                v.allowed_operators.iter().map(|o| o.as_str()).collect();
            operators.sort_unstable();
            json!({
                "fieldKey": v.field_key,
                "fieldId": v.field_id,
                "displayName": v.display_name,
                "dataType": v.data_type.as_str(),
                "allowedOperators": operators,
                "multiValueAllowed": v.multi_value_allowed,
                "isSensitive": v.is_sensitive,
                "version": v.version,
            })
        })
        .collect();

    json!({
        "registryVersion": registry_version,
        "fieldCount": versions.len(),
        "fields": fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enums::{DataType, EntityStatus, Operator};

    fn field_version(key: &str, id: i32) -> RuleFieldVersion {
        RuleFieldVersion {
            field_version_id: ordered_uuid(),
            field_key: key.into(),
            version: 1,
            field_id: id,
            display_name: key.to_uppercase(),
            description: None,
            data_type: DataType::String,
            allowed_operators: vec![Operator::In, Operator::Eq],
            multi_value_allowed: true,
            is_sensitive: false,
            status: EntityStatus::Approved,
            created_by: "system".into(),
            created_at: Utc::now(),
            approved_by: Some("system".into()),
            approved_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_snapshot_is_ordered_and_deterministic() {
        let versions = vec![field_version("mcc", 7), field_version("amount", 11)];
        let a = registry_snapshot(3, &versions);
        let b = registry_snapshot(3, &versions);

        assert_eq!(
            to_canonical_bytes(&a, FloatPolicy::Reject).unwrap(),
            to_canonical_bytes(&b, FloatPolicy::Reject).unwrap()
        );
        assert_eq!(a["registryVersion"], 3);
        assert_eq!(a["fieldCount"], 2);
        // Operators are sorted inside the snapshot.
        assert_eq!(a["fields"][0]["allowedOperators"], json!(["EQ", "IN"]));
    }
}
