use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use super::enums::{DataType, EntityStatus, Operator};

/// Identity row for a rule field. `field_key` and `field_id` are
/// immutable once assigned; everything else versions through the
/// maker-checker workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleField {
    pub field_key: String,
    pub field_id: i32,
    pub display_name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub allowed_operators: Vec<Operator>,
    pub multi_value_allowed: bool,
    pub is_sensitive: bool,
    pub is_active: bool,
    pub current_version: i32,
    /// Optimistic-lock counter, incremented on every update.
    pub row_version: i32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a field definition, one row per version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFieldVersion {
    pub field_version_id: Uuid,
    pub field_key: String,
    pub version: i32,
    pub field_id: i32,
    pub display_name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub allowed_operators: Vec<Operator>,
    pub multi_value_allowed: bool,
    pub is_sensitive: bool,
    pub status: EntityStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Extensible per-field metadata (enum values, UI hints, validation
/// parameters) stored as JSON key/value rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFieldMetadata {
    pub field_key: String,
    pub meta_key: String,
    pub meta_value: Value,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validation view of a field, as consumed by the condition-tree
/// validator and the compiler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub field_id: i32,
    pub data_type: DataType,
    pub allowed_operators: HashSet<Operator>,
    pub multi_value_allowed: bool,
    pub is_sensitive: bool,
    pub is_active: bool,
    /// Permitted values for ENUM fields, from field metadata.
    pub enum_values: Option<HashSet<String>>,
}

/// The active field catalog keyed by `field_key`.
///
/// BTreeMap keeps registry snapshots in a stable iteration order.
pub type FieldCatalog = BTreeMap<String, FieldMeta>;

/// Publication record for a field-registry snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRegistryManifest {
    pub manifest_id: Uuid,
    pub registry_version: i32,
    pub artifact_uri: String,
    pub checksum: String,
    pub field_count: i32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Maker-supplied input for creating or revising a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDraft {
    pub field_key: String,
    pub display_name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub allowed_operators: Vec<Operator>,
    pub multi_value_allowed: bool,
    pub is_sensitive: bool,
}

impl RuleField {
    /// Validation view of this field with optional enum values attached.
    pub fn to_meta(&self, enum_values: Option<HashSet<String>>) -> FieldMeta {
        FieldMeta {
            field_id: self.field_id,
            data_type: self.data_type,
            allowed_operators: self.allowed_operators.iter().copied().collect(),
            multi_value_allowed: self.multi_value_allowed,
            is_sensitive: self.is_sensitive,
            is_active: self.is_active,
            enum_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_meta_carries_operator_set() {
        let field = RuleField {
            field_key: "mcc".into(),
            field_id: 7,
            display_name: "Merchant Category Code".into(),
            description: None,
            data_type: DataType::String,
            allowed_operators: vec![Operator::Eq, Operator::In, Operator::In],
            multi_value_allowed: true,
            is_sensitive: false,
            is_active: true,
            current_version: 1,
            row_version: 1,
            created_by: "system".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let meta = field.to_meta(None);
        assert_eq!(meta.allowed_operators.len(), 2);
        assert!(meta.allowed_operators.contains(&Operator::In));
        assert!(meta.is_active);
    }
}
