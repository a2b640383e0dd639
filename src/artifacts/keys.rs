//! Object-storage key layout (locked contract):
//!
//! ```text
//! {root}/rulesets/{environment}/{region}/{country}/{ruleset_key}/v{N}/ruleset.json
//! {root}/rulesets/{environment}/{region}/{country}/{ruleset_key}/manifest.json
//! {root}/fields/registry/v{N}/fields.json
//! {root}/fields/registry/manifest.json
//! ```

use crate::domain::ruleset::RulesetScope;

fn prefixed(prefix: &str, rest: String) -> String {
    if prefix.is_empty() {
        rest
    } else {
        format!("{}/{}", prefix.trim_matches('/'), rest)
    }
}

/// Immutable ruleset artifact key.
pub fn ruleset_artifact_key(
    prefix: &str,
    scope: &RulesetScope,
    ruleset_key: &str,
    version: i32,
) -> String {
    prefixed(
        prefix,
        format!(
            "rulesets/{}/{}/{}/{}/v{}/ruleset.json",
            scope.environment, scope.region, scope.country, ruleset_key, version
        ),
    )
}

/// Mutable ruleset pointer key.
pub fn ruleset_pointer_key(prefix: &str, scope: &RulesetScope, ruleset_key: &str) -> String {
    prefixed(
        prefix,
        format!(
            "rulesets/{}/{}/{}/{}/manifest.json",
            scope.environment, scope.region, scope.country, ruleset_key
        ),
    )
}

/// Immutable field-registry artifact key.
pub fn registry_artifact_key(prefix: &str, registry_version: i32) -> String {
    prefixed(
        prefix,
        format!("fields/registry/v{registry_version}/fields.json"),
    )
}

/// Mutable field-registry pointer key.
pub fn registry_pointer_key(prefix: &str) -> String {
    prefixed(prefix, "fields/registry/manifest.json".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enums::RuleType;

    fn scope() -> RulesetScope {
        RulesetScope {
            environment: "prod".into(),
            region: "INDIA".into(),
            country: "IN".into(),
            rule_type: RuleType::Auth,
        }
    }

    #[test]
    fn test_ruleset_keys() {
        assert_eq!(
            ruleset_artifact_key("", &scope(), "CARD_AUTH", 5),
            "rulesets/prod/INDIA/IN/CARD_AUTH/v5/ruleset.json"
        );
        assert_eq!(
            ruleset_pointer_key("", &scope(), "CARD_AUTH"),
            "rulesets/prod/INDIA/IN/CARD_AUTH/manifest.json"
        );
    }

    #[test]
    fn test_registry_keys_with_prefix() {
        assert_eq!(
            registry_artifact_key("fraud/", 3),
            "fraud/fields/registry/v3/fields.json"
        );
        assert_eq!(
            registry_pointer_key("fraud"),
            "fraud/fields/registry/manifest.json"
        );
        assert_eq!(registry_pointer_key(""), "fields/registry/manifest.json");
    }
}
