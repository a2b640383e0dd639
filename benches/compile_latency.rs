use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::collections::HashSet;

use chrono::Utc;
use rulegov::canonical::{checksum, to_canonical_bytes, FloatPolicy};
use rulegov::compiler::{compile, CompileInput};
use rulegov::domain::condition::ConditionNode;
use rulegov::domain::enums::{DataType, EntityStatus, Operator, RuleAction, RuleType};
use rulegov::domain::field::{FieldCatalog, FieldMeta};
use rulegov::domain::id::ordered_uuid;
use rulegov::domain::rule::{Rule, RuleVersion};
use rulegov::domain::ruleset::{Ruleset, RulesetVersion};

fn catalog() -> FieldCatalog {
    let mut c = FieldCatalog::new();
    for (key, id) in [("amount", 3), ("mcc", 12), ("merchant_country", 11)] {
        c.insert(
            key.to_string(),
            FieldMeta {
                field_id: id,
                data_type: if key == "amount" {
                    DataType::Number
                } else {
                    DataType::String
                },
                allowed_operators: HashSet::from([
                    Operator::Eq,
                    Operator::Gt,
                    Operator::In,
                    Operator::Between,
                ]),
                multi_value_allowed: true,
                is_sensitive: false,
                is_active: true,
                enum_values: None,
            },
        );
    }
    c
}

fn member(priority: i32, threshold: i64) -> (RuleVersion, Rule) {
    let now = Utc::now();
    let rule = Rule {
        rule_id: ordered_uuid(),
        rule_name: format!("bench rule p{priority}"),
        description: None,
        rule_type: RuleType::Auth,
        status: EntityStatus::Approved,
        current_version: 1,
        row_version: 1,
        created_by: "bench".into(),
        created_at: now,
        updated_at: now,
    };
    let version = RuleVersion {
        rule_version_id: ordered_uuid(),
        rule_id: rule.rule_id,
        version: 1,
        condition_tree: ConditionNode::from_value(&json!({
            "and": [
                {"field": "amount", "op": "GT", "value": threshold},
                {"field": "mcc", "op": "IN", "value": ["7995", "5967", "6051"]},
            ]
        }))
        .unwrap(),
        scope: json!({"network": ["VISA"]}),
        priority,
        action: RuleAction::Decline,
        status: EntityStatus::Approved,
        created_by: "bench".into(),
        created_at: now,
        approved_by: Some("bench-checker".into()),
        approved_at: Some(now),
    };
    (version, rule)
}

fn bench_compile(c: &mut Criterion) {
    let now = Utc::now();
    let ruleset = Ruleset {
        ruleset_id: ordered_uuid(),
        environment: "bench".into(),
        region: "INDIA".into(),
        country: "IN".into(),
        rule_type: RuleType::Auth,
        name: None,
        description: None,
        created_by: "bench".into(),
        created_at: now,
        updated_at: now,
    };
    let ruleset_version = RulesetVersion {
        ruleset_version_id: ordered_uuid(),
        ruleset_id: ruleset.ruleset_id,
        version: 1,
        status: EntityStatus::Approved,
        created_by: "bench".into(),
        created_at: now,
        approved_by: Some("bench-checker".into()),
        approved_at: Some(now),
        activated_at: None,
    };
    let members: Vec<(RuleVersion, Rule)> = (1..=100).map(|i| member(i, i as i64 * 100)).collect();
    let cat = catalog();

    c.bench_function("compile_100_rules", |b| {
        b.iter(|| {
            let artifact = compile(CompileInput {
                ruleset: black_box(&ruleset),
                ruleset_version: &ruleset_version,
                members: &members,
                catalog: &cat,
            })
            .unwrap();
            black_box(artifact.checksum);
        })
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let value = json!({
        "rulesetId": ordered_uuid().to_string(),
        "rules": (0..100).map(|i| json!({
            "priority": i,
            "when": {"and": [
                {"field": "amount", "op": "GT", "value": i * 100},
                {"field": "mcc", "op": "IN", "value": ["7995", "5967"]},
            ]},
        })).collect::<Vec<_>>(),
    });

    c.bench_function("canonicalize_100_rules", |b| {
        b.iter(|| {
            let bytes = to_canonical_bytes(black_box(&value), FloatPolicy::Reject).unwrap();
            black_box(checksum(&bytes));
        })
    });
}

criterion_group!(benches, bench_compile, bench_canonicalize);
criterion_main!(benches);
