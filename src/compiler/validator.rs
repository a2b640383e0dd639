//! Condition-tree validation against the field catalog.
//!
//! The gatekeeper between governance input and compiled artifacts: every
//! leaf must reference an active field, use an operator that field allows,
//! and carry a value of the field's data type. Failures report the
//! JSONPath of the offending node.

use chrono::DateTime;
use serde_json::{json, Value};

use crate::domain::condition::ConditionNode;
use crate::domain::enums::{DataType, Operator};
use crate::domain::field::{FieldCatalog, FieldMeta};
use crate::errors::{Error, Result};

/// Validate a parsed condition tree against the active catalog.
pub fn validate_condition_tree(tree: &ConditionNode, catalog: &FieldCatalog) -> Result<()> {
    validate_node(tree, catalog, "$")
}

/// Parse a raw JSON tree and validate it in one step.
pub fn parse_and_validate(raw: &Value, catalog: &FieldCatalog) -> Result<ConditionNode> {
    let tree = ConditionNode::from_value(raw).map_err(|e| {
        Error::validation(
            format!("invalid condition tree: {}", e.reason),
            json!({ "path": e.path }),
        )
    })?;
    validate_condition_tree(&tree, catalog)?;
    Ok(tree)
}

fn validate_node(node: &ConditionNode, catalog: &FieldCatalog, path: &str) -> Result<()> {
    match node {
        ConditionNode::And(children) => {
            for (i, child) in children.iter().enumerate() {
                validate_node(child, catalog, &format!("{path}.and[{i}]"))?;
            }
            Ok(())
        }
        ConditionNode::Or(children) => {
            for (i, child) in children.iter().enumerate() {
                validate_node(child, catalog, &format!("{path}.or[{i}]"))?;
            }
            Ok(())
        }
        ConditionNode::Not(child) => validate_node(child, catalog, &format!("{path}.not")),
        ConditionNode::Leaf { field, op, value } => validate_leaf(field, *op, value, catalog, path),
    }
}

fn validate_leaf(
    field_key: &str,
    op: Operator,
    value: &Value,
    catalog: &FieldCatalog,
    path: &str,
) -> Result<()> {
    let meta = catalog.get(field_key).ok_or_else(|| {
        Error::validation(
            format!("unknown field '{field_key}'"),
            json!({ "path": path, "field_key": field_key }),
        )
    })?;

    if !meta.is_active {
        return Err(Error::validation(
            format!("field '{field_key}' is not active"),
            json!({ "path": path, "field_key": field_key }),
        ));
    }

    if !meta.allowed_operators.contains(&op) {
        let mut allowed: Vec<&str> = meta.allowed_operators.iter().map(|o| o.as_str()).collect();
        allowed.sort_unstable();
        return Err(Error::validation(
            format!("operator '{op}' not allowed for field '{field_key}'"),
            json!({
                "path": path,
                "field_key": field_key,
                "operator": op.as_str(),
                "allowed_operators": allowed,
            }),
        ));
    }

    if op.takes_range() {
        return validate_between(field_key, meta, value, path);
    }

    if op.takes_list() {
        if !meta.multi_value_allowed {
            return Err(Error::validation(
                format!("field '{field_key}' does not allow multi-value operators"),
                json!({
                    "path": path,
                    "field_key": field_key,
                    "operator": op.as_str(),
                    "multi_value_allowed": false,
                }),
            ));
        }
        let items = value.as_array().ok_or_else(|| {
            Error::validation(
                format!("operator '{op}' requires a list for field '{field_key}'"),
                json!({ "path": path, "field_key": field_key, "operator": op.as_str() }),
            )
        })?;
        if items.is_empty() {
            return Err(Error::validation(
                format!("operator '{op}' requires a non-empty list for field '{field_key}'"),
                json!({ "path": path, "field_key": field_key, "operator": op.as_str() }),
            ));
        }
        for item in items {
            check_scalar(field_key, meta, item, path)?;
        }
        return Ok(());
    }

    // Single-value operators take a scalar.
    if value.is_array() {
        return Err(Error::validation(
            format!("operator '{op}' does not accept lists for field '{field_key}'"),
            json!({ "path": path, "field_key": field_key, "operator": op.as_str() }),
        ));
    }
    check_scalar(field_key, meta, value, path)
}

fn validate_between(field_key: &str, meta: &FieldMeta, value: &Value, path: &str) -> Result<()> {
    let items = match value.as_array() {
        Some(items) if items.len() == 2 => items,
        _ => {
            return Err(Error::validation(
                format!("BETWEEN requires exactly 2 values for field '{field_key}'"),
                json!({ "path": path, "field_key": field_key, "operator": "BETWEEN" }),
            ));
        }
    };
    for item in items {
        check_scalar(field_key, meta, item, path)?;
    }
    if !bounds_ordered(&items[0], &items[1]) {
        return Err(Error::validation(
            format!("BETWEEN bounds must be ordered for field '{field_key}'"),
            json!({
                "path": path,
                "field_key": field_key,
                "operator": "BETWEEN",
                "low": items[0],
                "high": items[1],
            }),
        ));
    }
    Ok(())
}

/// first <= second for the scalar types BETWEEN supports.
fn bounds_ordered(low: &Value, high: &Value) -> bool {
    match (low, high) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a <= b,
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a <= b,
                _ => false,
            },
        },
        // Strings cover DATE (ISO-8601 sorts chronologically) and ENUM.
        (Value::String(a), Value::String(b)) => a <= b,
        _ => true,
    }
}

fn check_scalar(field_key: &str, meta: &FieldMeta, value: &Value, path: &str) -> Result<()> {
    // Null is allowed for nullable comparisons.
    if value.is_null() {
        return Ok(());
    }

    let mismatch = |expected: &str| {
        Error::validation(
            format!("field '{field_key}' expects {expected} value"),
            json!({
                "path": path,
                "field_key": field_key,
                "expected_type": meta.data_type.as_str(),
                "value": value,
            }),
        )
    };

    match meta.data_type {
        DataType::String => {
            if !value.is_string() {
                return Err(mismatch("STRING"));
            }
        }
        DataType::Number => {
            if !value.is_number() {
                return Err(mismatch("NUMBER"));
            }
        }
        DataType::Boolean => {
            if !value.is_boolean() {
                return Err(mismatch("BOOLEAN"));
            }
        }
        DataType::Date => {
            let s = value.as_str().ok_or_else(|| mismatch("DATE (ISO-8601)"))?;
            if DateTime::parse_from_rfc3339(s).is_err() {
                return Err(Error::validation(
                    format!("field '{field_key}' expects an ISO-8601 instant"),
                    json!({ "path": path, "field_key": field_key, "value": s }),
                ));
            }
        }
        DataType::Enum => {
            let s = value.as_str().ok_or_else(|| mismatch("ENUM"))?;
            if let Some(allowed) = &meta.enum_values {
                if !allowed.contains(s) {
                    let mut sorted: Vec<&String> = allowed.iter().collect();
                    sorted.sort_unstable();
                    return Err(Error::validation(
                        format!("value '{s}' not in enum set for field '{field_key}'"),
                        json!({
                            "path": path,
                            "field_key": field_key,
                            "value": s,
                            "enum_values": sorted,
                        }),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn meta(
        data_type: DataType,
        operators: &[Operator],
        multi_value: bool,
        active: bool,
    ) -> FieldMeta {
        FieldMeta {
            field_id: 1,
            data_type,
            allowed_operators: operators.iter().copied().collect(),
            multi_value_allowed: multi_value,
            is_sensitive: false,
            is_active: active,
            enum_values: None,
        }
    }

    fn catalog() -> FieldCatalog {
        let mut c = FieldCatalog::new();
        c.insert(
            "amount".into(),
            meta(
                DataType::Number,
                &[Operator::Gt, Operator::Gte, Operator::Lt, Operator::Between],
                false,
                true,
            ),
        );
        c.insert(
            "mcc".into(),
            meta(DataType::String, &[Operator::Eq, Operator::In], true, true),
        );
        c.insert(
            "is_recurring".into(),
            meta(DataType::Boolean, &[Operator::Eq], false, true),
        );
        c.insert(
            "tx_time".into(),
            meta(DataType::Date, &[Operator::Gte, Operator::Between], false, true),
        );
        c.insert(
            "retired_field".into(),
            meta(DataType::String, &[Operator::Eq], false, false),
        );
        let mut network = meta(DataType::Enum, &[Operator::Eq, Operator::In], true, true);
        network.enum_values = Some(HashSet::from(["VISA".to_string(), "MASTERCARD".to_string()]));
        c.insert("network".into(), network);
        c
    }

    fn validate(raw: Value) -> Result<ConditionNode> {
        parse_and_validate(&raw, &catalog())
    }

    #[test]
    fn test_valid_tree_passes() {
        validate(json!({
            "and": [
                {"field": "amount", "op": "GT", "value": 3000},
                {"field": "mcc", "op": "IN", "value": ["7995", "5967"]},
                {"not": {"field": "is_recurring", "op": "EQ", "value": true}}
            ]
        }))
        .unwrap();
    }

    #[test]
    fn test_unknown_field() {
        let err = validate(json!({"field": "nope", "op": "EQ", "value": 1})).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(err.details()["field_key"], "nope");
        assert_eq!(err.details()["path"], "$");
    }

    #[test]
    fn test_inactive_field() {
        let err =
            validate(json!({"field": "retired_field", "op": "EQ", "value": "x"})).unwrap_err();
        assert!(err.message().contains("not active"));
    }

    #[test]
    fn test_operator_not_allowed() {
        let err = validate(json!({"field": "amount", "op": "EQ", "value": 10})).unwrap_err();
        assert_eq!(err.details()["operator"], "EQ");
        assert!(err.details()["allowed_operators"].is_array());
    }

    #[test]
    fn test_value_type_mismatch() {
        let err = validate(json!({"field": "amount", "op": "GT", "value": "high"})).unwrap_err();
        assert_eq!(err.details()["expected_type"], "NUMBER");

        let err =
            validate(json!({"field": "is_recurring", "op": "EQ", "value": "yes"})).unwrap_err();
        assert_eq!(err.details()["expected_type"], "BOOLEAN");
    }

    #[test]
    fn test_date_requires_iso8601() {
        validate(json!({"field": "tx_time", "op": "GTE", "value": "2026-01-15T10:00:00Z"}))
            .unwrap();

        let err =
            validate(json!({"field": "tx_time", "op": "GTE", "value": "yesterday"})).unwrap_err();
        assert!(err.message().contains("ISO-8601"));
    }

    #[test]
    fn test_enum_membership() {
        validate(json!({"field": "network", "op": "EQ", "value": "VISA"})).unwrap();

        let err = validate(json!({"field": "network", "op": "EQ", "value": "AMEX"})).unwrap_err();
        assert!(err.message().contains("enum set"));
    }

    #[test]
    fn test_in_requires_non_empty_list_and_multi_value() {
        let err = validate(json!({"field": "mcc", "op": "IN", "value": []})).unwrap_err();
        assert!(err.message().contains("non-empty"));

        let err = validate(json!({"field": "mcc", "op": "IN", "value": "7995"})).unwrap_err();
        assert!(err.message().contains("requires a list"));

        // amount has multi_value_allowed = false and no IN either; give a
        // field that allows IN but not multi-value to hit the gate.
        let mut c = catalog();
        c.insert(
            "single".into(),
            meta(DataType::String, &[Operator::In], false, true),
        );
        let err = parse_and_validate(
            &json!({"field": "single", "op": "IN", "value": ["x"]}),
            &c,
        )
        .unwrap_err();
        assert!(err.message().contains("multi-value"));
    }

    #[test]
    fn test_between_arity_and_order() {
        validate(json!({"field": "amount", "op": "BETWEEN", "value": [100, 500]})).unwrap();

        let err =
            validate(json!({"field": "amount", "op": "BETWEEN", "value": [100]})).unwrap_err();
        assert!(err.message().contains("exactly 2"));

        let err = validate(json!({"field": "amount", "op": "BETWEEN", "value": [500, 100]}))
            .unwrap_err();
        assert!(err.message().contains("ordered"));

        // Dates compare chronologically via their ISO-8601 string form.
        validate(json!({
            "field": "tx_time", "op": "BETWEEN",
            "value": ["2026-01-01T00:00:00Z", "2026-02-01T00:00:00Z"]
        }))
        .unwrap();
    }

    #[test]
    fn test_scalar_operator_rejects_list() {
        let err =
            validate(json!({"field": "amount", "op": "GT", "value": [1, 2]})).unwrap_err();
        assert!(err.message().contains("does not accept lists"));
    }

    #[test]
    fn test_error_path_points_into_tree() {
        let err = validate(json!({
            "and": [
                {"field": "amount", "op": "GT", "value": 1},
                {"or": [{"field": "bad_field", "op": "EQ", "value": 1}]}
            ]
        }))
        .unwrap_err();
        assert_eq!(err.details()["path"], "$.and[1].or[0]");
    }

    #[test]
    fn test_typed_wire_shape_validates_too() {
        validate(json!({
            "type": "AND",
            "conditions": [
                {"type": "CONDITION", "field": "amount", "operator": "GT", "value": 3000}
            ]
        }))
        .unwrap();
    }
}
