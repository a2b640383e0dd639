use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::AuditEntityType;

/// Append-only audit trail entry. `old_value`/`new_value` are structural
/// snapshots (full snapshots for creates, field subsets for updates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: Uuid,
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub action: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
}

/// Filters for audit reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<AuditEntityType>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub performed_by: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}
