use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ApprovalAction, ApprovalEntityType, ApprovalStatus};

/// Maker-checker workflow row. The database enforces `maker <> checker`
/// with a check constraint; the engine enforces it before any write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub approval_id: Uuid,
    pub entity_type: ApprovalEntityType,
    pub entity_id: Uuid,
    pub action: ApprovalAction,
    pub status: ApprovalStatus,
    pub maker: String,
    pub checker: Option<String>,
    pub remarks: Option<String>,
    /// Unique per `(entity_type, entity_id)` when present; replaying a
    /// submit with the same key returns the original row.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Approval row enriched for listings: the owning rule or ruleset
/// identity is resolved from the version the approval points at, so
/// reviewers can navigate from a pending approval to its entity without
/// a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSummary {
    #[serde(flatten)]
    pub approval: Approval,
    /// Set when `entity_type` is RULE_VERSION and the version resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,
    /// Set when `entity_type` is RULESET_VERSION and the version resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ruleset_id: Option<Uuid>,
}
