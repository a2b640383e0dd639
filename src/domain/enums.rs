use serde::{Deserialize, Serialize};
use std::fmt;

/// Governance class of a fraud rule.
///
/// AUTH and MONITORING map to runtime publication keys; ALLOWLIST and
/// BLOCKLIST are governance-only and never published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Allowlist,
    Blocklist,
    Auth,
    Monitoring,
}

impl RuleType {
    /// Evaluation mode declared in compiled artifacts (locked mapping).
    pub fn evaluation_mode(&self) -> &'static str {
        match self {
            RuleType::Allowlist | RuleType::Blocklist | RuleType::Auth => "FIRST_MATCH",
            RuleType::Monitoring => "ALL_MATCHING",
        }
    }

    /// Runtime publication key, if this rule type is publishable.
    pub fn ruleset_key(&self) -> Option<&'static str> {
        match self {
            RuleType::Auth => Some("CARD_AUTH"),
            RuleType::Monitoring => Some("CARD_MONITORING"),
            RuleType::Allowlist | RuleType::Blocklist => None,
        }
    }

    /// Default rule action when the maker does not provide one.
    pub fn default_action(&self) -> RuleAction {
        match self {
            RuleType::Allowlist => RuleAction::Approve,
            RuleType::Blocklist => RuleAction::Decline,
            RuleType::Auth => RuleAction::Decline,
            RuleType::Monitoring => RuleAction::Review,
        }
    }

    /// Actions a rule of this type may carry.
    pub fn allowed_actions(&self) -> &'static [RuleAction] {
        match self {
            RuleType::Allowlist => &[RuleAction::Approve],
            RuleType::Blocklist => &[RuleAction::Decline],
            RuleType::Auth => &[RuleAction::Approve, RuleAction::Decline],
            RuleType::Monitoring => &[RuleAction::Review],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Allowlist => "ALLOWLIST",
            RuleType::Blocklist => "BLOCKLIST",
            RuleType::Auth => "AUTH",
            RuleType::Monitoring => "MONITORING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ALLOWLIST" => Some(RuleType::Allowlist),
            "BLOCKLIST" => Some(RuleType::Blocklist),
            "AUTH" => Some(RuleType::Auth),
            "MONITORING" => Some(RuleType::Monitoring),
            _ => None,
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by rules, rule versions, ruleset versions,
/// and field versions. ACTIVE applies to ruleset versions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Superseded,
    Active,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "DRAFT",
            EntityStatus::PendingApproval => "PENDING_APPROVAL",
            EntityStatus::Approved => "APPROVED",
            EntityStatus::Rejected => "REJECTED",
            EntityStatus::Superseded => "SUPERSEDED",
            EntityStatus::Active => "ACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(EntityStatus::Draft),
            "PENDING_APPROVAL" => Some(EntityStatus::PendingApproval),
            "APPROVED" => Some(EntityStatus::Approved),
            "REJECTED" => Some(EntityStatus::Rejected),
            "SUPERSEDED" => Some(EntityStatus::Superseded),
            "ACTIVE" => Some(EntityStatus::Active),
            _ => None,
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an approval workflow row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ApprovalStatus::Pending),
            "APPROVED" => Some(ApprovalStatus::Approved),
            "REJECTED" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow action recorded on an approval row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    Submit,
    Approve,
    Reject,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Submit => "SUBMIT",
            ApprovalAction::Approve => "APPROVE",
            ApprovalAction::Reject => "REJECT",
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity an approval row is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalEntityType {
    RuleVersion,
    RulesetVersion,
    FieldVersion,
}

impl ApprovalEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalEntityType::RuleVersion => "RULE_VERSION",
            ApprovalEntityType::RulesetVersion => "RULESET_VERSION",
            ApprovalEntityType::FieldVersion => "FIELD_VERSION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RULE_VERSION" => Some(ApprovalEntityType::RuleVersion),
            "RULESET_VERSION" => Some(ApprovalEntityType::RulesetVersion),
            "FIELD_VERSION" => Some(ApprovalEntityType::FieldVersion),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntityType {
    RuleField,
    RuleFieldMetadata,
    Rule,
    RuleVersion,
    Ruleset,
    RulesetVersion,
    Approval,
    FieldVersion,
    FieldRegistryManifest,
}

impl AuditEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntityType::RuleField => "RULE_FIELD",
            AuditEntityType::RuleFieldMetadata => "RULE_FIELD_METADATA",
            AuditEntityType::Rule => "RULE",
            AuditEntityType::RuleVersion => "RULE_VERSION",
            AuditEntityType::Ruleset => "RULESET",
            AuditEntityType::RulesetVersion => "RULESET_VERSION",
            AuditEntityType::Approval => "APPROVAL",
            AuditEntityType::FieldVersion => "FIELD_VERSION",
            AuditEntityType::FieldRegistryManifest => "FIELD_REGISTRY_MANIFEST",
        }
    }
}

impl fmt::Display for AuditEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data type of a rule field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Date,
    Enum,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Number => "NUMBER",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Enum => "ENUM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STRING" => Some(DataType::String),
            "NUMBER" => Some(DataType::Number),
            "BOOLEAN" => Some(DataType::Boolean),
            "DATE" => Some(DataType::Date),
            "ENUM" => Some(DataType::Enum),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators available to rule conditions (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Between,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
}

impl Operator {
    /// Operators that take a non-empty list value.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Operators that take a two-element range value.
    pub fn takes_range(&self) -> bool {
        matches!(self, Operator::Between)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Between => "BETWEEN",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOT_CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Regex => "REGEX",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EQ" => Some(Operator::Eq),
            "NE" => Some(Operator::Ne),
            "GT" => Some(Operator::Gt),
            "GTE" => Some(Operator::Gte),
            "LT" => Some(Operator::Lt),
            "LTE" => Some(Operator::Lte),
            "IN" => Some(Operator::In),
            "NOT_IN" => Some(Operator::NotIn),
            "BETWEEN" => Some(Operator::Between),
            "CONTAINS" => Some(Operator::Contains),
            "NOT_CONTAINS" => Some(Operator::NotContains),
            "STARTS_WITH" => Some(Operator::StartsWith),
            "ENDS_WITH" => Some(Operator::EndsWith),
            "REGEX" => Some(Operator::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the runtime takes when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    Approve,
    Decline,
    Review,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Approve => "APPROVE",
            RuleAction::Decline => "DECLINE",
            RuleAction::Review => "REVIEW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPROVE" => Some(RuleAction::Approve),
            "DECLINE" => Some(RuleAction::Decline),
            "REVIEW" => Some(RuleAction::Review),
            _ => None,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_mode_mapping_is_locked() {
        assert_eq!(RuleType::Allowlist.evaluation_mode(), "FIRST_MATCH");
        assert_eq!(RuleType::Blocklist.evaluation_mode(), "FIRST_MATCH");
        assert_eq!(RuleType::Auth.evaluation_mode(), "FIRST_MATCH");
        assert_eq!(RuleType::Monitoring.evaluation_mode(), "ALL_MATCHING");
    }

    #[test]
    fn test_ruleset_key_mapping() {
        assert_eq!(RuleType::Auth.ruleset_key(), Some("CARD_AUTH"));
        assert_eq!(RuleType::Monitoring.ruleset_key(), Some("CARD_MONITORING"));
        assert_eq!(RuleType::Allowlist.ruleset_key(), None);
        assert_eq!(RuleType::Blocklist.ruleset_key(), None);
    }

    #[test]
    fn test_default_and_allowed_actions() {
        assert_eq!(RuleType::Auth.default_action(), RuleAction::Decline);
        assert!(RuleType::Auth.allowed_actions().contains(&RuleAction::Approve));
        assert!(!RuleType::Monitoring
            .allowed_actions()
            .contains(&RuleAction::Decline));
        assert_eq!(RuleType::Allowlist.allowed_actions(), &[RuleAction::Approve]);
    }

    #[test]
    fn test_enum_wire_forms() {
        let json = serde_json::to_string(&EntityStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"PENDING_APPROVAL\"");

        let op: Operator = serde_json::from_str("\"NOT_IN\"").unwrap();
        assert_eq!(op, Operator::NotIn);

        assert_eq!(Operator::parse("STARTS_WITH"), Some(Operator::StartsWith));
        assert_eq!(Operator::parse("LIKE"), None);
    }

    #[test]
    fn test_operator_shape_predicates() {
        assert!(Operator::In.takes_list());
        assert!(Operator::NotIn.takes_list());
        assert!(Operator::Between.takes_range());
        assert!(!Operator::Eq.takes_list());
        assert!(!Operator::Eq.takes_range());
    }
}
