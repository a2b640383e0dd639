use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EntityStatus, RuleType};

/// Ruleset identity. One row per `(environment, region, country,
/// rule_type)`; the natural key is immutable after creation, the
/// name and description are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub ruleset_id: Uuid,
    pub environment: String,
    pub region: String,
    pub country: String,
    pub rule_type: RuleType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a ruleset: a fixed set of rule-version ids.
/// The unit of compilation and publishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetVersion {
    pub ruleset_version_id: Uuid,
    pub ruleset_id: Uuid,
    pub version: i32,
    pub status: EntityStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// Governance record of a published artifact; the source of truth for
/// what was published, where, and with which checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetManifest {
    pub manifest_id: Uuid,
    pub environment: String,
    pub region: String,
    pub country: String,
    pub rule_type: RuleType,
    pub ruleset_version: i32,
    pub ruleset_version_id: Uuid,
    pub field_registry_version: Option<i32>,
    pub artifact_uri: String,
    pub checksum: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Natural key of a ruleset identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RulesetScope {
    pub environment: String,
    pub region: String,
    pub country: String,
    pub rule_type: RuleType,
}

impl RulesetScope {
    pub fn of(ruleset: &Ruleset) -> Self {
        RulesetScope {
            environment: ruleset.environment.clone(),
            region: ruleset.region.clone(),
            country: ruleset.country.clone(),
            rule_type: ruleset.rule_type,
        }
    }
}
