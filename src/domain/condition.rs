use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::enums::Operator;

/// Recursive predicate tree attached to a rule version.
///
/// Two wire shapes are accepted on input:
///
/// - keyword: `{"and": [...]}`, `{"or": [...]}`, `{"not": {...}}`,
///   `{"field": "...", "op": "...", "value": ...}`
/// - typed: `{"type": "AND", "conditions": [...]}`, `{"type": "NOT",
///   "condition": {...}}`, `{"type": "CONDITION", "field": "...",
///   "operator": "...", "value": ...}`
///
/// Serialization always emits the keyword shape; it is the canonical
/// form carried into compiled artifacts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
    Leaf {
        field: String,
        op: Operator,
        value: Value,
    },
}

impl ConditionNode {
    /// Parse a node from a JSON value, accepting both wire shapes.
    ///
    /// Structural errors report the JSONPath of the offending node.
    pub fn from_value(value: &Value) -> Result<Self, ConditionParseError> {
        parse_node(value, "$")
    }

    /// Render the node in the keyword wire shape.
    pub fn to_value(&self) -> Value {
        match self {
            ConditionNode::And(children) => {
                json!({ "and": children.iter().map(|c| c.to_value()).collect::<Vec<_>>() })
            }
            ConditionNode::Or(children) => {
                json!({ "or": children.iter().map(|c| c.to_value()).collect::<Vec<_>>() })
            }
            ConditionNode::Not(child) => json!({ "not": child.to_value() }),
            ConditionNode::Leaf { field, op, value } => {
                json!({ "field": field, "op": op.as_str(), "value": value })
            }
        }
    }

    /// Iterate every leaf in the tree, depth first.
    pub fn leaves(&self) -> Vec<&ConditionNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ConditionNode>) {
        match self {
            ConditionNode::And(children) | ConditionNode::Or(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
            ConditionNode::Not(child) => child.collect_leaves(out),
            ConditionNode::Leaf { .. } => out.push(self),
        }
    }
}

/// Structural parse failure with JSONPath context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason} at {path}")]
pub struct ConditionParseError {
    pub path: String,
    pub reason: String,
}

impl ConditionParseError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        ConditionParseError {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

fn parse_node(value: &Value, path: &str) -> Result<ConditionNode, ConditionParseError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ConditionParseError::new(path, "condition node must be an object"))?;

    if let Some(children) = obj.get("and") {
        return parse_children(children, &format!("{path}.and"), ConditionNode::And);
    }
    if let Some(children) = obj.get("or") {
        return parse_children(children, &format!("{path}.or"), ConditionNode::Or);
    }
    if let Some(child) = obj.get("not") {
        let parsed = parse_node(child, &format!("{path}.not"))?;
        return Ok(ConditionNode::Not(Box::new(parsed)));
    }

    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase);

    match node_type.as_deref() {
        Some("AND") => {
            let children = obj.get("conditions").ok_or_else(|| {
                ConditionParseError::new(path, "'type': 'AND' requires 'conditions'")
            })?;
            parse_children(children, &format!("{path}.conditions"), ConditionNode::And)
        }
        Some("OR") => {
            let children = obj.get("conditions").ok_or_else(|| {
                ConditionParseError::new(path, "'type': 'OR' requires 'conditions'")
            })?;
            parse_children(children, &format!("{path}.conditions"), ConditionNode::Or)
        }
        Some("NOT") => {
            let child = obj.get("condition").ok_or_else(|| {
                ConditionParseError::new(path, "'type': 'NOT' requires 'condition'")
            })?;
            let parsed = parse_node(child, &format!("{path}.condition"))?;
            Ok(ConditionNode::Not(Box::new(parsed)))
        }
        Some("CONDITION") => parse_leaf(obj, path),
        Some(other) => Err(ConditionParseError::new(
            path,
            format!("unknown node type '{other}'"),
        )),
        None if obj.contains_key("field") => parse_leaf(obj, path),
        None => Err(ConditionParseError::new(
            path,
            "node must contain 'and', 'or', 'not', 'field', or 'type'",
        )),
    }
}

fn parse_children(
    value: &Value,
    path: &str,
    build: fn(Vec<ConditionNode>) -> ConditionNode,
) -> Result<ConditionNode, ConditionParseError> {
    let items = value
        .as_array()
        .ok_or_else(|| ConditionParseError::new(path, "composite operand must be a list"))?;
    if items.is_empty() {
        return Err(ConditionParseError::new(
            path,
            "composite operand cannot be empty",
        ));
    }
    let mut children = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        children.push(parse_node(item, &format!("{path}[{i}]"))?);
    }
    Ok(build(children))
}

fn parse_leaf(obj: &Map<String, Value>, path: &str) -> Result<ConditionNode, ConditionParseError> {
    let field = obj
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| ConditionParseError::new(path, "leaf node missing string 'field'"))?;

    // The typed shape uses 'operator'; the keyword shape uses 'op'.
    let op_raw = obj
        .get("op")
        .or_else(|| obj.get("operator"))
        .and_then(Value::as_str)
        .ok_or_else(|| ConditionParseError::new(path, "leaf node missing 'op' or 'operator'"))?;

    let op = Operator::parse(op_raw)
        .ok_or_else(|| ConditionParseError::new(path, format!("unknown operator '{op_raw}'")))?;

    let value = obj
        .get("value")
        .ok_or_else(|| ConditionParseError::new(path, "leaf node missing 'value'"))?
        .clone();

    Ok(ConditionNode::Leaf {
        field: field.to_string(),
        op,
        value,
    })
}

impl Serialize for ConditionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConditionNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ConditionNode::from_value(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keyword_shape() {
        let v = json!({
            "and": [
                {"field": "amount", "op": "GT", "value": 3000},
                {"or": [
                    {"field": "mcc", "op": "IN", "value": ["7995"]},
                    {"not": {"field": "country", "op": "EQ", "value": "IN"}}
                ]}
            ]
        });
        let node = ConditionNode::from_value(&v).unwrap();
        match &node {
            ConditionNode::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
        assert_eq!(node.leaves().len(), 3);
    }

    #[test]
    fn test_parse_typed_shape() {
        let v = json!({
            "type": "AND",
            "conditions": [
                {"type": "CONDITION", "field": "amount", "operator": "GT", "value": 3000},
                {"type": "NOT", "condition":
                    {"type": "CONDITION", "field": "mcc", "operator": "EQ", "value": "7995"}}
            ]
        });
        let node = ConditionNode::from_value(&v).unwrap();
        assert_eq!(node.leaves().len(), 2);
    }

    #[test]
    fn test_typed_shape_normalizes_to_keyword_shape() {
        let v = json!({
            "type": "CONDITION", "field": "amount", "operator": "GT", "value": 3000
        });
        let node = ConditionNode::from_value(&v).unwrap();
        assert_eq!(
            node.to_value(),
            json!({"field": "amount", "op": "GT", "value": 3000})
        );
    }

    #[test]
    fn test_empty_composite_rejected() {
        let err = ConditionNode::from_value(&json!({"and": []})).unwrap_err();
        assert_eq!(err.path, "$.and");

        let err =
            ConditionNode::from_value(&json!({"type": "OR", "conditions": []})).unwrap_err();
        assert_eq!(err.path, "$.conditions");
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = ConditionNode::from_value(&json!({"field": "a", "op": "LIKE", "value": 1}))
            .unwrap_err();
        assert!(err.reason.contains("LIKE"));
    }

    #[test]
    fn test_missing_value_rejected_but_null_allowed() {
        let err =
            ConditionNode::from_value(&json!({"field": "a", "op": "EQ"})).unwrap_err();
        assert!(err.reason.contains("value"));

        let node =
            ConditionNode::from_value(&json!({"field": "a", "op": "EQ", "value": null})).unwrap();
        assert!(matches!(node, ConditionNode::Leaf { .. }));
    }

    #[test]
    fn test_nested_error_path() {
        let v = json!({"and": [{"field": "a", "op": "EQ", "value": 1}, {"or": [42]}]});
        let err = ConditionNode::from_value(&v).unwrap_err();
        assert_eq!(err.path, "$.and[1].or[0]");
    }

    #[test]
    fn test_serde_round_trip_emits_keyword_shape() {
        let input = json!({
            "type": "AND",
            "conditions": [
                {"type": "CONDITION", "field": "amount", "operator": "GTE", "value": 100}
            ]
        });
        let node: ConditionNode = serde_json::from_value(input).unwrap();
        let out = serde_json::to_value(&node).unwrap();
        assert_eq!(
            out,
            json!({"and": [{"field": "amount", "op": "GTE", "value": 100}]})
        );
    }
}
