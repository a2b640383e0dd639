use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::enums::{DataType, Operator, RuleAction, RuleType};
use crate::storage::pagination::{Direction, PageRequest};

/// Common list-query parameters shared by paginated endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub cursor: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl PageParams {
    pub fn to_request(&self) -> PageRequest {
        PageRequest {
            cursor: self.cursor.clone(),
            direction: self.direction,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub rule_name: String,
    pub description: Option<String>,
    pub rule_type: RuleType,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleVersionRequest {
    pub condition_tree: Value,
    #[serde(default = "empty_object")]
    pub scope: Value,
    pub priority: i32,
    pub action: Option<RuleAction>,
    pub expected_rule_row_version: Option<i32>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub remarks: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRulesetRequest {
    pub environment: String,
    pub region: String,
    pub country: String,
    pub rule_type: RuleType,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRulesetRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRulesetVersionRequest {
    pub rule_version_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    pub field_key: String,
    pub display_name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub allowed_operators: Vec<Operator>,
    #[serde(default)]
    pub multi_value_allowed: bool,
    #[serde(default)]
    pub is_sensitive: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReviseFieldRequest {
    pub display_name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub allowed_operators: Vec<Operator>,
    #[serde(default)]
    pub multi_value_allowed: bool,
    #[serde(default)]
    pub is_sensitive: bool,
    pub expected_row_version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertFieldMetadataRequest {
    pub meta_key: String,
    pub meta_value: Value,
    pub description: Option<String>,
}

// Filtered list params repeat the pagination fields instead of
// flattening PageParams: serde_urlencoded cannot deserialize numeric
// fields through #[serde(flatten)].

#[derive(Debug, Default, Deserialize)]
pub struct RulesetListParams {
    pub environment: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub rule_type: Option<RuleType>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalListParams {
    pub status: Option<crate::domain::enums::ApprovalStatus>,
    pub entity_type: Option<crate::domain::enums::ApprovalEntityType>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditListParams {
    pub entity_type: Option<crate::domain::enums::AuditEntityType>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub performed_by: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub until: Option<chrono::DateTime<chrono::Utc>>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl RulesetListParams {
    pub fn page(&self) -> PageRequest {
        PageRequest {
            cursor: self.cursor.clone(),
            direction: self.direction,
            limit: self.limit,
        }
    }
}

impl ApprovalListParams {
    pub fn page(&self) -> PageRequest {
        PageRequest {
            cursor: self.cursor.clone(),
            direction: self.direction,
            limit: self.limit,
        }
    }
}

impl AuditListParams {
    pub fn page(&self) -> PageRequest {
        PageRequest {
            cursor: self.cursor.clone(),
            direction: self.direction,
            limit: self.limit,
        }
    }
}
