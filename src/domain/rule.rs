use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::condition::ConditionNode;
use super::enums::{EntityStatus, RuleAction, RuleType};

/// Logical identity of a fraud rule. The governed logic lives in
/// immutable `RuleVersion` rows; this row tracks the current version
/// and carries the optimistic lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub description: Option<String>,
    pub rule_type: RuleType,
    pub status: EntityStatus,
    pub current_version: i32,
    /// Optimistic-lock counter, incremented on every update.
    pub row_version: i32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable version of a rule: condition tree, scope, priority, action.
/// Content never changes once the version reaches APPROVED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleVersion {
    pub rule_version_id: Uuid,
    pub rule_id: Uuid,
    pub version: i32,
    pub condition_tree: ConditionNode,
    /// Dimension name to permitted values; empty object means universal
    /// within the ruleset's country.
    pub scope: Value,
    /// 1..=1000; higher evaluates first.
    pub priority: i32,
    pub action: RuleAction,
    pub status: EntityStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Priority bounds enforced at version creation.
pub const PRIORITY_MIN: i32 = 1;
pub const PRIORITY_MAX: i32 = 1000;

/// Maker-supplied input for a new rule version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleVersionDraft {
    pub condition_tree: Value,
    #[serde(default = "default_scope")]
    pub scope: Value,
    pub priority: i32,
    pub action: Option<RuleAction>,
    /// When present, the rule identity's row_version must match or the
    /// write fails with a conflict.
    pub expected_rule_row_version: Option<i32>,
}

fn default_scope() -> Value {
    Value::Object(Default::default())
}
