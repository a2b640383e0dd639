//! Deterministic ruleset compilation.
//!
//! Turns a committed ruleset version and its member rule versions into
//! the canonical artifact consumed by the runtime engine. The output is
//! the contract: same committed state, same bytes, same checksum.

use serde_json::{json, Value};
use tracing::info;

use crate::canonical::{checksum, to_canonical_bytes, FloatPolicy};
use crate::compiler::validator::validate_condition_tree;
use crate::domain::enums::EntityStatus;
use crate::domain::field::FieldCatalog;
use crate::domain::rule::{Rule, RuleVersion};
use crate::domain::ruleset::{Ruleset, RulesetVersion};
use crate::errors::{Error, Result};

/// Velocity checks that fail at runtime are skipped rather than failing
/// the whole evaluation.
const VELOCITY_FAILURE_POLICY: &str = "SKIP";

/// Everything the compiler needs, already loaded by the caller.
pub struct CompileInput<'a> {
    pub ruleset: &'a Ruleset,
    pub ruleset_version: &'a RulesetVersion,
    pub members: &'a [(RuleVersion, Rule)],
    pub catalog: &'a FieldCatalog,
}

/// Compiled output: the AST, its canonical bytes, and their checksum.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub ast: Value,
    pub bytes: Vec<u8>,
    pub checksum: String,
}

/// Compile a ruleset version into its canonical artifact.
///
/// Accepted source states: PENDING_APPROVAL (inside an approve flow),
/// APPROVED, and ACTIVE. DRAFT and REJECTED versions are never compiled.
/// Every member rule version must be APPROVED.
pub fn compile(input: CompileInput<'_>) -> Result<CompiledArtifact> {
    let version = input.ruleset_version;

    match version.status {
        EntityStatus::PendingApproval | EntityStatus::Approved | EntityStatus::Active => {}
        other => {
            return Err(Error::invalid_state(
                format!("ruleset version in status {other} cannot be compiled"),
                json!({
                    "ruleset_version_id": version.ruleset_version_id,
                    "status": other.as_str(),
                }),
            ));
        }
    }

    verify_members_approved(version, input.members)?;
    validate_members(version, input.members, input.catalog)?;

    let sorted = sort_members(input.members);
    let ast = build_ast(input.ruleset, version, &sorted);

    let bytes = to_canonical_bytes(&ast, FloatPolicy::Reject).map_err(|e| {
        Error::compilation(
            format!("artifact is not canonicalizable: {e}"),
            json!({ "ruleset_version_id": version.ruleset_version_id }),
        )
    })?;
    let checksum = checksum(&bytes);

    info!(
        ruleset_id = %input.ruleset.ruleset_id,
        ruleset_version_id = %version.ruleset_version_id,
        rules = sorted.len(),
        mode = input.ruleset.rule_type.evaluation_mode(),
        bytes = bytes.len(),
        "Compiled ruleset version"
    );

    Ok(CompiledArtifact { ast, bytes, checksum })
}

fn verify_members_approved(
    version: &RulesetVersion,
    members: &[(RuleVersion, Rule)],
) -> Result<()> {
    let non_approved: Vec<Value> = members
        .iter()
        .filter(|(rv, _)| rv.status != EntityStatus::Approved)
        .map(|(rv, _)| {
            json!({ "rule_version_id": rv.rule_version_id, "status": rv.status.as_str() })
        })
        .collect();

    if !non_approved.is_empty() {
        return Err(Error::compilation(
            "ruleset version has non-APPROVED member rule versions",
            json!({
                "ruleset_version_id": version.ruleset_version_id,
                "non_approved": non_approved,
            }),
        ));
    }
    Ok(())
}

fn validate_members(
    version: &RulesetVersion,
    members: &[(RuleVersion, Rule)],
    catalog: &FieldCatalog,
) -> Result<()> {
    for (rule_version, rule) in members {
        if let Err(e) = validate_condition_tree(&rule_version.condition_tree, catalog) {
            return Err(Error::compilation(
                format!(
                    "condition tree validation failed for rule version {}",
                    rule_version.rule_version_id
                ),
                json!({
                    "ruleset_version_id": version.ruleset_version_id,
                    "rule_version_id": rule_version.rule_version_id,
                    "rule_id": rule.rule_id,
                    "path": e.details().get("path").cloned().unwrap_or(Value::Null),
                    "reason": e.message(),
                }),
            ));
        }
    }
    Ok(())
}

/// Deterministic order: priority DESC, then rule_id ASC. Rule ids are
/// time-ordered, so the tie-break is stable across compilations.
fn sort_members<'a>(members: &'a [(RuleVersion, Rule)]) -> Vec<&'a (RuleVersion, Rule)> {
    let mut sorted: Vec<&(RuleVersion, Rule)> = members.iter().collect();
    sorted.sort_by(|a, b| {
        b.0.priority
            .cmp(&a.0.priority)
            .then_with(|| a.1.rule_id.cmp(&b.1.rule_id))
    });
    sorted
}

fn build_ast(
    ruleset: &Ruleset,
    version: &RulesetVersion,
    sorted: &[&(RuleVersion, Rule)],
) -> Value {
    let rules: Vec<Value> = sorted
        .iter()
        .map(|(rule_version, rule)| {
            json!({
                "ruleId": rule.rule_id.to_string(),
                "ruleVersionId": rule_version.rule_version_id.to_string(),
                "priority": rule_version.priority,
                "when": rule_version.condition_tree.to_value(),
                "action": rule_version.action.as_str(),
                "scope": rule_version.scope,
            })
        })
        .collect();

    json!({
        "rulesetId": ruleset.ruleset_id.to_string(),
        "version": version.version,
        "ruleType": ruleset.rule_type.as_str(),
        "evaluation": { "mode": ruleset.rule_type.evaluation_mode() },
        "velocityFailurePolicy": VELOCITY_FAILURE_POLICY,
        "rules": rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::ConditionNode;
    use crate::domain::enums::{DataType, Operator, RuleAction, RuleType};
    use crate::domain::field::FieldMeta;
    use crate::domain::id::ordered_uuid;
    use chrono::Utc;
    use uuid::Uuid;

    fn catalog() -> FieldCatalog {
        let mut c = FieldCatalog::new();
        c.insert(
            "amount".into(),
            FieldMeta {
                field_id: 11,
                data_type: DataType::Number,
                allowed_operators: [Operator::Gt, Operator::Lte].into_iter().collect(),
                multi_value_allowed: false,
                is_sensitive: false,
                is_active: true,
                enum_values: None,
            },
        );
        c
    }

    fn ruleset(rule_type: RuleType) -> Ruleset {
        Ruleset {
            ruleset_id: ordered_uuid(),
            environment: "prod".into(),
            region: "INDIA".into(),
            country: "IN".into(),
            rule_type,
            name: Some("auth rules".into()),
            description: None,
            created_by: "maker-1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ruleset_version(ruleset_id: Uuid, status: EntityStatus) -> RulesetVersion {
        RulesetVersion {
            ruleset_version_id: ordered_uuid(),
            ruleset_id,
            version: 5,
            status,
            created_by: "maker-1".into(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            activated_at: None,
        }
    }

    fn member(priority: i32, threshold: i64, status: EntityStatus) -> (RuleVersion, Rule) {
        let rule = Rule {
            rule_id: ordered_uuid(),
            rule_name: format!("rule p{priority}"),
            description: None,
            rule_type: RuleType::Auth,
            status: EntityStatus::Approved,
            current_version: 1,
            row_version: 1,
            created_by: "maker-1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let version = RuleVersion {
            rule_version_id: ordered_uuid(),
            rule_id: rule.rule_id,
            version: 1,
            condition_tree: ConditionNode::from_value(&json!({
                "field": "amount", "op": "GT", "value": threshold
            }))
            .unwrap(),
            scope: json!({}),
            priority,
            action: RuleAction::Decline,
            status,
            created_by: "maker-1".into(),
            created_at: Utc::now(),
            approved_by: Some("checker-1".into()),
            approved_at: Some(Utc::now()),
        };
        (version, rule)
    }

    #[test]
    fn test_compile_orders_by_priority_desc() {
        let rs = ruleset(RuleType::Auth);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Approved);
        let members = vec![
            member(50, 1000, EntityStatus::Approved),
            member(100, 3000, EntityStatus::Approved),
        ];

        let artifact = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &members,
            catalog: &catalog(),
        })
        .unwrap();

        let rules = artifact.ast["rules"].as_array().unwrap();
        assert_eq!(rules[0]["priority"], 100);
        assert_eq!(rules[1]["priority"], 50);
        assert_eq!(artifact.ast["evaluation"]["mode"], "FIRST_MATCH");
        assert_eq!(artifact.ast["velocityFailurePolicy"], "SKIP");
    }

    #[test]
    fn test_equal_priority_breaks_ties_by_rule_id() {
        let rs = ruleset(RuleType::Monitoring);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Approved);
        // ordered_uuid() is increasing, so the first created member has
        // the smaller rule_id and must come first.
        let first = member(100, 1, EntityStatus::Approved);
        let second = member(100, 2, EntityStatus::Approved);
        let members = vec![second.clone(), first.clone()];

        let artifact = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &members,
            catalog: &catalog(),
        })
        .unwrap();

        let rules = artifact.ast["rules"].as_array().unwrap();
        assert_eq!(rules[0]["ruleId"], first.1.rule_id.to_string());
        assert_eq!(rules[1]["ruleId"], second.1.rule_id.to_string());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let rs = ruleset(RuleType::Auth);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Approved);
        let members = vec![
            member(100, 3000, EntityStatus::Approved),
            member(50, 1000, EntityStatus::Approved),
        ];
        let cat = catalog();

        let a = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &members,
            catalog: &cat,
        })
        .unwrap();
        let b = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &members,
            catalog: &cat,
        })
        .unwrap();

        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.checksum, b.checksum);
        assert!(a.checksum.starts_with("sha256:"));
        assert_eq!(a.checksum.len(), 71);
    }

    #[test]
    fn test_empty_ruleset_compiles_to_empty_rules() {
        let rs = ruleset(RuleType::Monitoring);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Approved);

        let artifact = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &[],
            catalog: &catalog(),
        })
        .unwrap();

        assert_eq!(artifact.ast["rules"].as_array().unwrap().len(), 0);
        assert_eq!(artifact.ast["evaluation"]["mode"], "ALL_MATCHING");
    }

    #[test]
    fn test_draft_version_rejected() {
        let rs = ruleset(RuleType::Auth);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Draft);

        let err = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &[],
            catalog: &catalog(),
        })
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidStateError");
    }

    #[test]
    fn test_non_approved_member_fails_compilation() {
        let rs = ruleset(RuleType::Auth);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::PendingApproval);
        let members = vec![member(100, 3000, EntityStatus::Draft)];

        let err = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &members,
            catalog: &catalog(),
        })
        .unwrap_err();
        assert_eq!(err.kind(), "CompilationError");
        assert!(err.details()["non_approved"].is_array());
    }

    #[test]
    fn test_invalid_member_tree_reports_rule_context() {
        let rs = ruleset(RuleType::Auth);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Approved);
        let mut bad = member(100, 3000, EntityStatus::Approved);
        bad.0.condition_tree = ConditionNode::from_value(&json!({
            "field": "unknown_field", "op": "EQ", "value": 1
        }))
        .unwrap();
        let members = vec![bad];

        let err = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &members,
            catalog: &catalog(),
        })
        .unwrap_err();
        assert_eq!(err.kind(), "CompilationError");
        assert_eq!(
            err.details()["rule_version_id"],
            members[0].0.rule_version_id.to_string()
        );
        assert_eq!(err.details()["rule_id"], members[0].1.rule_id.to_string());
        assert!(err.details()["reason"].as_str().unwrap().contains("unknown field"));
    }

    #[test]
    fn test_artifact_carries_no_timestamps_or_environment() {
        let rs = ruleset(RuleType::Auth);
        let rsv = ruleset_version(rs.ruleset_id, EntityStatus::Approved);
        let artifact = compile(CompileInput {
            ruleset: &rs,
            ruleset_version: &rsv,
            members: &[],
            catalog: &catalog(),
        })
        .unwrap();

        let keys: Vec<&str> = artifact
            .ast
            .as_object()
            .unwrap()
            .keys()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["evaluation", "ruleType", "rules", "rulesetId", "velocityFailurePolicy", "version"]
        );
    }
}
