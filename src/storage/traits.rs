use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::approval::{Approval, ApprovalSummary};
use crate::domain::audit::{AuditEntry, AuditFilter};
use crate::domain::enums::{ApprovalEntityType, ApprovalStatus, EntityStatus, RuleType};
use crate::domain::field::{
    FieldCatalog, FieldDraft, FieldRegistryManifest, RuleField, RuleFieldMetadata,
    RuleFieldVersion,
};
use crate::domain::rule::{Rule, RuleVersion, RuleVersionDraft};
use crate::domain::ruleset::{Ruleset, RulesetManifest, RulesetScope, RulesetVersion};
use crate::errors::Result;
use crate::services::publisher::Publisher;
use crate::storage::pagination::{Page, PageRequest};

/// Filters for ruleset identity listings.
#[derive(Debug, Clone, Default)]
pub struct RulesetFilter {
    pub environment: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub rule_type: Option<RuleType>,
}

/// Persistence boundary for the governance core.
///
/// Implementations are responsible for transactional integrity: every
/// multi-row mutation (lifecycle transition, membership insert, publish)
/// commits atomically together with its audit entry, and the ruleset
/// approve flow runs the publisher inside the same transactional unit so
/// a publish failure rolls the approval back.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- field catalog (C4)

    async fn create_field(&self, draft: FieldDraft, by: &str) -> Result<RuleField>;

    /// Create the next DRAFT version of an existing field. When
    /// `expected_row_version` is set and stale, fails with a conflict.
    async fn revise_field(
        &self,
        field_key: &str,
        draft: FieldDraft,
        expected_row_version: Option<i32>,
        by: &str,
    ) -> Result<RuleFieldVersion>;

    async fn get_field(&self, field_key: &str) -> Result<RuleField>;
    async fn list_fields(&self, page: PageRequest) -> Result<Page<RuleField>>;

    async fn upsert_field_metadata(
        &self,
        field_key: &str,
        meta_key: &str,
        meta_value: Value,
        description: Option<String>,
        by: &str,
    ) -> Result<RuleFieldMetadata>;
    async fn field_metadata(&self, field_key: &str) -> Result<Vec<RuleFieldMetadata>>;

    /// Latest APPROVED snapshot per active field, keyed by field_key.
    async fn active_catalog(&self) -> Result<FieldCatalog>;

    /// First unused field id >= 27 (1..26 are the seeded standard fields).
    async fn next_field_id(&self) -> Result<i32>;

    async fn get_field_version(&self, field_version_id: Uuid) -> Result<RuleFieldVersion>;
    async fn submit_field_version(
        &self,
        field_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RuleFieldVersion, Approval)>;
    async fn approve_field_version(
        &self,
        field_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleFieldVersion>;
    async fn reject_field_version(
        &self,
        field_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleFieldVersion>;

    /// Latest APPROVED version per field, for registry snapshots.
    async fn approved_field_versions(&self) -> Result<Vec<RuleFieldVersion>>;
    async fn latest_registry_version(&self) -> Result<Option<i32>>;
    async fn insert_registry_manifest(
        &self,
        manifest: FieldRegistryManifest,
    ) -> Result<FieldRegistryManifest>;

    // ---- rules (C5)

    async fn create_rule(
        &self,
        rule_name: &str,
        description: Option<String>,
        rule_type: RuleType,
        by: &str,
    ) -> Result<Rule>;
    async fn get_rule(&self, rule_id: Uuid) -> Result<Rule>;
    async fn list_rules(&self, page: PageRequest) -> Result<Page<Rule>>;

    /// Insert the next immutable version of a rule. The condition tree is
    /// validated against the active catalog before any write.
    async fn create_rule_version(
        &self,
        rule_id: Uuid,
        draft: RuleVersionDraft,
        by: &str,
    ) -> Result<RuleVersion>;
    async fn get_rule_version(&self, rule_version_id: Uuid) -> Result<RuleVersion>;
    async fn list_rule_versions(&self, rule_id: Uuid) -> Result<Vec<RuleVersion>>;

    async fn submit_rule_version(
        &self,
        rule_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RuleVersion, Approval)>;
    async fn approve_rule_version(
        &self,
        rule_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleVersion>;
    async fn reject_rule_version(
        &self,
        rule_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleVersion>;

    // ---- rulesets (C6)

    async fn create_ruleset(
        &self,
        scope: RulesetScope,
        name: Option<String>,
        description: Option<String>,
        by: &str,
    ) -> Result<Ruleset>;
    async fn update_ruleset(
        &self,
        ruleset_id: Uuid,
        name: Option<String>,
        description: Option<String>,
        by: &str,
    ) -> Result<Ruleset>;
    async fn get_ruleset(&self, ruleset_id: Uuid) -> Result<Ruleset>;
    async fn find_ruleset_by_scope(&self, scope: &RulesetScope) -> Result<Option<Ruleset>>;
    async fn list_rulesets(
        &self,
        filter: RulesetFilter,
        page: PageRequest,
    ) -> Result<Page<Ruleset>>;

    /// Snapshot a new DRAFT ruleset version with the given members. Every
    /// member must exist and carry the ruleset's rule type.
    async fn create_ruleset_version(
        &self,
        ruleset_id: Uuid,
        rule_version_ids: &[Uuid],
        by: &str,
    ) -> Result<RulesetVersion>;
    async fn get_ruleset_version(&self, ruleset_version_id: Uuid) -> Result<RulesetVersion>;
    async fn list_ruleset_versions(
        &self,
        ruleset_id: Uuid,
        status: Option<EntityStatus>,
        page: PageRequest,
    ) -> Result<Page<RulesetVersion>>;
    async fn ruleset_version_members(
        &self,
        ruleset_version_id: Uuid,
    ) -> Result<Vec<(RuleVersion, Rule)>>;

    async fn submit_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RulesetVersion, Approval)>;

    /// Approve and publish. Compilation and both object-storage writes run
    /// inside the approval's transactional unit; any failure leaves the
    /// version PENDING_APPROVAL and no manifest row behind.
    async fn approve_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
        publisher: &dyn Publisher,
    ) -> Result<(RulesetVersion, RulesetManifest)>;

    async fn reject_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RulesetVersion>;

    /// Promote an APPROVED version to ACTIVE, demoting any ACTIVE sibling
    /// to SUPERSEDED in the same transaction.
    async fn activate_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        by: &str,
    ) -> Result<RulesetVersion>;

    async fn list_manifests(&self, scope: &RulesetScope) -> Result<Vec<RulesetManifest>>;

    // ---- approvals + audit (C7, C10)

    /// List approvals with the owning rule or ruleset identity resolved
    /// from the referenced version where possible.
    async fn list_approvals(
        &self,
        status: Option<ApprovalStatus>,
        entity_type: Option<ApprovalEntityType>,
        page: PageRequest,
    ) -> Result<Page<ApprovalSummary>>;

    async fn list_audit(&self, filter: AuditFilter, page: PageRequest)
        -> Result<Page<AuditEntry>>;
}
