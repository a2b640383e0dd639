//! In-memory store for tests and database-less local runs.
//!
//! Implements the full `Store` contract, including staged-commit
//! semantics for the ruleset approve flow: all mutations are applied to a
//! staged copy of the state and only committed once the publisher's
//! writes succeed, mirroring the transactional rollback of the Postgres
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::compiler::{self, CompileInput};
use crate::domain::approval::{Approval, ApprovalSummary};
use crate::domain::audit::{AuditEntry, AuditFilter};
use crate::domain::enums::{
    ApprovalAction, ApprovalEntityType, ApprovalStatus, AuditEntityType, EntityStatus, RuleAction,
    RuleType,
};
use crate::domain::field::{
    FieldCatalog, FieldDraft, FieldMeta, FieldRegistryManifest, RuleField, RuleFieldMetadata,
    RuleFieldVersion,
};
use crate::domain::id::IdGenerator;
use crate::domain::rule::{Rule, RuleVersion, RuleVersionDraft, PRIORITY_MAX, PRIORITY_MIN};
use crate::domain::ruleset::{Ruleset, RulesetManifest, RulesetScope, RulesetVersion};
use crate::errors::{Error, Result};
use crate::services::lifecycle::{
    check_maker_not_checker, ensure_activatable, ensure_pending, ensure_submittable,
};
use crate::services::publisher::{runtime_ruleset_key, PointerDoc, Publisher};
use crate::storage::pagination::{
    build_page, row_matches_cursor, Direction, Page, PageRequest, AUDIT_DEFAULT_LIMIT,
    AUDIT_MAX_LIMIT, DEFAULT_LIMIT, MAX_LIMIT,
};
use crate::storage::seed::{STANDARD_FIELDS, STANDARD_FIELD_MAX_ID};
use crate::storage::traits::{RulesetFilter, Store};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    fields: HashMap<String, RuleField>,
    field_versions: HashMap<Uuid, RuleFieldVersion>,
    field_metadata: HashMap<(String, String), RuleFieldMetadata>,
    registry_manifests: Vec<FieldRegistryManifest>,
    rules: HashMap<Uuid, Rule>,
    rule_versions: HashMap<Uuid, RuleVersion>,
    rulesets: HashMap<Uuid, Ruleset>,
    ruleset_versions: HashMap<Uuid, RulesetVersion>,
    /// ruleset_version_id -> member rule_version_ids (snapshot-bound).
    memberships: HashMap<Uuid, Vec<Uuid>>,
    approvals: Vec<Approval>,
    audit: Vec<AuditEntry>,
    manifests: Vec<RulesetManifest>,
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
    ids: IdGenerator,
}

impl MemoryStore {
    /// Empty store with the standard field catalog seeded and approved.
    pub fn new() -> Self {
        let ids = IdGenerator::new();
        let mut state = MemoryState::default();
        let now = Utc::now();

        for seed in STANDARD_FIELDS {
            state.fields.insert(
                seed.field_key.to_string(),
                RuleField {
                    field_key: seed.field_key.to_string(),
                    field_id: seed.field_id,
                    display_name: seed.display_name.to_string(),
                    description: None,
                    data_type: seed.data_type,
                    allowed_operators: seed.allowed_operators.to_vec(),
                    multi_value_allowed: seed.multi_value_allowed,
                    is_sensitive: seed.is_sensitive,
                    is_active: true,
                    current_version: 1,
                    row_version: 1,
                    created_by: "system".to_string(),
                    created_at: now,
                    updated_at: now,
                },
            );
            let version_id = ids.next();
            state.field_versions.insert(
                version_id,
                RuleFieldVersion {
                    field_version_id: version_id,
                    field_key: seed.field_key.to_string(),
                    version: 1,
                    field_id: seed.field_id,
                    display_name: seed.display_name.to_string(),
                    description: None,
                    data_type: seed.data_type,
                    allowed_operators: seed.allowed_operators.to_vec(),
                    multi_value_allowed: seed.multi_value_allowed,
                    is_sensitive: seed.is_sensitive,
                    status: EntityStatus::Approved,
                    created_by: "system".to_string(),
                    created_at: now,
                    approved_by: Some("system".to_string()),
                    approved_at: Some(now),
                },
            );
        }

        MemoryStore {
            state: Mutex::new(state),
            ids,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

fn not_found(what: &str, key: &str, value: impl ToString) -> Error {
    Error::not_found(format!("{what} not found"), json!({ key: value.to_string() }))
}

fn push_audit(
    state: &mut MemoryState,
    ids: &IdGenerator,
    entity_type: AuditEntityType,
    entity_id: Uuid,
    action: &str,
    old_value: Option<Value>,
    new_value: Option<Value>,
    by: &str,
) {
    state.audit.push(AuditEntry {
        audit_id: ids.next(),
        entity_type,
        entity_id,
        action: action.to_string(),
        old_value,
        new_value,
        performed_by: by.to_string(),
        performed_at: Utc::now(),
    });
}

fn catalog_of(state: &MemoryState) -> FieldCatalog {
    let mut catalog = FieldCatalog::new();
    for field in state.fields.values() {
        if !field.is_active {
            continue;
        }
        let approved = state
            .field_versions
            .values()
            .filter(|v| v.field_key == field.field_key && v.status == EntityStatus::Approved)
            .max_by_key(|v| v.version);
        let Some(version) = approved else { continue };

        let enum_values = state
            .field_metadata
            .get(&(field.field_key.clone(), "enum_values".to_string()))
            .and_then(|m| m.meta_value.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect::<HashSet<String>>()
            });

        catalog.insert(
            field.field_key.clone(),
            FieldMeta {
                field_id: version.field_id,
                data_type: version.data_type,
                allowed_operators: version.allowed_operators.iter().copied().collect(),
                multi_value_allowed: version.multi_value_allowed,
                is_sensitive: version.is_sensitive,
                is_active: field.is_active,
                enum_values,
            },
        );
    }
    catalog
}

/// Resolve the owning rule or ruleset identity for an approval row,
/// mirroring the listing join in the Postgres store.
fn approval_summary(state: &MemoryState, approval: &Approval) -> ApprovalSummary {
    let rule_id = match approval.entity_type {
        ApprovalEntityType::RuleVersion => state
            .rule_versions
            .get(&approval.entity_id)
            .map(|v| v.rule_id),
        _ => None,
    };
    let ruleset_id = match approval.entity_type {
        ApprovalEntityType::RulesetVersion => state
            .ruleset_versions
            .get(&approval.entity_id)
            .map(|v| v.ruleset_id),
        _ => None,
    };
    ApprovalSummary {
        approval: approval.clone(),
        rule_id,
        ruleset_id,
    }
}

fn find_pending_approval(state: &MemoryState, entity_id: Uuid) -> Option<usize> {
    state
        .approvals
        .iter()
        .rposition(|a| a.entity_id == entity_id && a.status == ApprovalStatus::Pending)
}

fn find_idempotent_replay(
    state: &MemoryState,
    entity_type: ApprovalEntityType,
    entity_id: Uuid,
    idempotency_key: Option<&str>,
) -> Option<Approval> {
    let key = idempotency_key?;
    state
        .approvals
        .iter()
        .find(|a| {
            a.entity_type == entity_type
                && a.entity_id == entity_id
                && a.idempotency_key.as_deref() == Some(key)
        })
        .cloned()
}

fn paginate<T: Clone>(
    rows: Vec<T>,
    page: &PageRequest,
    default_limit: usize,
    max_limit: usize,
    key_of: impl Fn(&T) -> (Uuid, DateTime<Utc>) + Copy,
) -> Result<Page<T>> {
    let limit = page.effective_limit(default_limit, max_limit)?;
    let cursor = page.decoded_cursor()?;
    let is_first_page = cursor.is_none();

    let mut matching: Vec<T> = rows
        .into_iter()
        .filter(|row| match &cursor {
            None => true,
            Some(c) => {
                let (id, created_at) = key_of(row);
                row_matches_cursor(id, created_at, c, page.direction)
            }
        })
        .collect();

    match page.direction {
        Direction::Next => {
            matching.sort_by(|a, b| (key_of(b).1, key_of(b).0).cmp(&(key_of(a).1, key_of(a).0)))
        }
        Direction::Prev => {
            matching.sort_by(|a, b| (key_of(a).1, key_of(a).0).cmp(&(key_of(b).1, key_of(b).0)))
        }
    }
    matching.truncate(limit + 1);

    Ok(build_page(matching, limit, page.direction, is_first_page, |row| key_of(row)))
}

fn validate_action(rule_type: RuleType, action: Option<RuleAction>) -> Result<RuleAction> {
    let action = action.unwrap_or_else(|| rule_type.default_action());
    if !rule_type.allowed_actions().contains(&action) {
        return Err(Error::conflict(
            format!("{rule_type} rules cannot carry action {action}"),
            json!({
                "rule_type": rule_type.as_str(),
                "action": action.as_str(),
                "allowed_actions": rule_type
                    .allowed_actions()
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>(),
            }),
        ));
    }
    Ok(action)
}

#[async_trait]
impl Store for MemoryStore {
    // ---- field catalog (C4)

    async fn create_field(&self, draft: FieldDraft, by: &str) -> Result<RuleField> {
        let mut state = self.state.lock().await;
        if state.fields.contains_key(&draft.field_key) {
            return Err(Error::conflict(
                "field key already exists",
                json!({ "field_key": draft.field_key }),
            ));
        }

        let max_id = state.fields.values().map(|f| f.field_id).max().unwrap_or(0);
        let field_id = max_id.max(STANDARD_FIELD_MAX_ID) + 1;
        let now = Utc::now();

        let field = RuleField {
            field_key: draft.field_key.clone(),
            field_id,
            display_name: draft.display_name.clone(),
            description: draft.description.clone(),
            data_type: draft.data_type,
            allowed_operators: draft.allowed_operators.clone(),
            multi_value_allowed: draft.multi_value_allowed,
            is_sensitive: draft.is_sensitive,
            is_active: true,
            current_version: 1,
            row_version: 1,
            created_by: by.to_string(),
            created_at: now,
            updated_at: now,
        };

        let version_id = self.ids.next();
        state.field_versions.insert(
            version_id,
            RuleFieldVersion {
                field_version_id: version_id,
                field_key: draft.field_key.clone(),
                version: 1,
                field_id,
                display_name: draft.display_name,
                description: draft.description,
                data_type: draft.data_type,
                allowed_operators: draft.allowed_operators,
                multi_value_allowed: draft.multi_value_allowed,
                is_sensitive: draft.is_sensitive,
                status: EntityStatus::Draft,
                created_by: by.to_string(),
                created_at: now,
                approved_by: None,
                approved_at: None,
            },
        );
        state.fields.insert(draft.field_key.clone(), field.clone());

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RuleField,
            version_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&field).unwrap_or(Value::Null)),
            by,
        );
        Ok(field)
    }

    async fn revise_field(
        &self,
        field_key: &str,
        draft: FieldDraft,
        expected_row_version: Option<i32>,
        by: &str,
    ) -> Result<RuleFieldVersion> {
        let mut state = self.state.lock().await;
        let field = state
            .fields
            .get(field_key)
            .cloned()
            .ok_or_else(|| not_found("field", "field_key", field_key))?;

        if let Some(expected) = expected_row_version {
            if expected != field.row_version {
                return Err(Error::conflict(
                    "field was modified concurrently",
                    json!({ "expected": expected, "actual": field.row_version }),
                ));
            }
        }

        if field.field_id <= STANDARD_FIELD_MAX_ID && draft.data_type != field.data_type {
            return Err(Error::validation(
                "standard field data types are immutable",
                json!({ "field_key": field_key, "field_id": field.field_id }),
            ));
        }

        let next_version = state
            .field_versions
            .values()
            .filter(|v| v.field_key == field_key)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;

        let version_id = self.ids.next();
        let version = RuleFieldVersion {
            field_version_id: version_id,
            field_key: field_key.to_string(),
            version: next_version,
            field_id: field.field_id,
            display_name: draft.display_name,
            description: draft.description,
            data_type: draft.data_type,
            allowed_operators: draft.allowed_operators,
            multi_value_allowed: draft.multi_value_allowed,
            is_sensitive: draft.is_sensitive,
            status: EntityStatus::Draft,
            created_by: by.to_string(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
        };
        state.field_versions.insert(version_id, version.clone());

        if let Some(f) = state.fields.get_mut(field_key) {
            f.row_version += 1;
            f.updated_at = Utc::now();
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::FieldVersion,
            version_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&version).unwrap_or(Value::Null)),
            by,
        );
        Ok(version)
    }

    async fn get_field(&self, field_key: &str) -> Result<RuleField> {
        let state = self.state.lock().await;
        state
            .fields
            .get(field_key)
            .cloned()
            .ok_or_else(|| not_found("field", "field_key", field_key))
    }

    async fn list_fields(&self, page: PageRequest) -> Result<Page<RuleField>> {
        let state = self.state.lock().await;
        let rows: Vec<RuleField> = state.fields.values().cloned().collect();
        // Field identities have no surrogate uuid; key listings off the
        // latest version id is overkill here, so synthesize a stable key
        // from the field id.
        paginate(rows, &page, DEFAULT_LIMIT, MAX_LIMIT, |f| {
            (Uuid::from_u128(f.field_id as u128), f.created_at)
        })
    }

    async fn upsert_field_metadata(
        &self,
        field_key: &str,
        meta_key: &str,
        meta_value: Value,
        description: Option<String>,
        by: &str,
    ) -> Result<RuleFieldMetadata> {
        let mut state = self.state.lock().await;
        if !state.fields.contains_key(field_key) {
            return Err(not_found("field", "field_key", field_key));
        }

        let map_key = (field_key.to_string(), meta_key.to_string());
        let old = state.field_metadata.get(&map_key).cloned();
        let row = RuleFieldMetadata {
            field_key: field_key.to_string(),
            meta_key: meta_key.to_string(),
            meta_value,
            description,
            created_at: old.as_ref().map(|m| m.created_at).unwrap_or_else(Utc::now),
        };
        state.field_metadata.insert(map_key, row.clone());

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RuleFieldMetadata,
            Uuid::nil(),
            "UPSERT",
            old.map(|m| serde_json::to_value(&m).unwrap_or(Value::Null)),
            Some(serde_json::to_value(&row).unwrap_or(Value::Null)),
            by,
        );
        Ok(row)
    }

    async fn field_metadata(&self, field_key: &str) -> Result<Vec<RuleFieldMetadata>> {
        let state = self.state.lock().await;
        if !state.fields.contains_key(field_key) {
            return Err(not_found("field", "field_key", field_key));
        }
        let mut rows: Vec<RuleFieldMetadata> = state
            .field_metadata
            .values()
            .filter(|m| m.field_key == field_key)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.meta_key.cmp(&b.meta_key));
        Ok(rows)
    }

    async fn active_catalog(&self) -> Result<FieldCatalog> {
        let state = self.state.lock().await;
        Ok(catalog_of(&state))
    }

    async fn next_field_id(&self) -> Result<i32> {
        let state = self.state.lock().await;
        let max_id = state.fields.values().map(|f| f.field_id).max().unwrap_or(0);
        Ok(max_id.max(STANDARD_FIELD_MAX_ID) + 1)
    }

    async fn get_field_version(&self, field_version_id: Uuid) -> Result<RuleFieldVersion> {
        let state = self.state.lock().await;
        state
            .field_versions
            .get(&field_version_id)
            .cloned()
            .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))
    }

    async fn submit_field_version(
        &self,
        field_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RuleFieldVersion, Approval)> {
        let mut state = self.state.lock().await;
        let version = state
            .field_versions
            .get(&field_version_id)
            .cloned()
            .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;

        if let Some(existing) = find_idempotent_replay(
            &state,
            ApprovalEntityType::FieldVersion,
            field_version_id,
            idempotency_key.as_deref(),
        ) {
            return Ok((version, existing));
        }

        ensure_submittable(version.status)?;
        let old_status = version.status;
        if let Some(v) = state.field_versions.get_mut(&field_version_id) {
            v.status = EntityStatus::PendingApproval;
        }

        let approval = Approval {
            approval_id: self.ids.next(),
            entity_type: ApprovalEntityType::FieldVersion,
            entity_id: field_version_id,
            action: ApprovalAction::Submit,
            status: ApprovalStatus::Pending,
            maker: maker.to_string(),
            checker: None,
            remarks,
            idempotency_key,
            created_at: Utc::now(),
            decided_at: None,
        };
        state.approvals.push(approval.clone());

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::FieldVersion,
            field_version_id,
            "SUBMIT",
            Some(json!({ "status": old_status.as_str() })),
            Some(json!({ "status": "PENDING_APPROVAL" })),
            maker,
        );

        let updated = state.field_versions[&field_version_id].clone();
        Ok((updated, approval))
    }

    async fn approve_field_version(
        &self,
        field_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleFieldVersion> {
        let mut state = self.state.lock().await;
        let approval_idx = find_pending_approval(&state, field_version_id)
            .ok_or_else(|| not_found("pending approval", "field_version_id", field_version_id))?;
        check_maker_not_checker(&state.approvals[approval_idx].maker, checker)?;

        let version = state
            .field_versions
            .get(&field_version_id)
            .cloned()
            .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;
        ensure_pending(version.status)?;

        let now = Utc::now();
        let field_key = version.field_key.clone();

        // Previously approved versions of the same field step down.
        for v in state.field_versions.values_mut() {
            if v.field_key == field_key && v.status == EntityStatus::Approved {
                v.status = EntityStatus::Superseded;
            }
        }

        if let Some(v) = state.field_versions.get_mut(&field_version_id) {
            v.status = EntityStatus::Approved;
            v.approved_by = Some(checker.to_string());
            v.approved_at = Some(now);
        }
        let approved = state.field_versions[&field_version_id].clone();

        // Fold the approved snapshot back into the identity row.
        if let Some(f) = state.fields.get_mut(&field_key) {
            f.display_name = approved.display_name.clone();
            f.description = approved.description.clone();
            f.data_type = approved.data_type;
            f.allowed_operators = approved.allowed_operators.clone();
            f.multi_value_allowed = approved.multi_value_allowed;
            f.is_sensitive = approved.is_sensitive;
            f.current_version = approved.version;
            f.row_version += 1;
            f.updated_at = now;
        }

        let approval = &mut state.approvals[approval_idx];
        approval.action = ApprovalAction::Approve;
        approval.status = ApprovalStatus::Approved;
        approval.checker = Some(checker.to_string());
        approval.decided_at = Some(now);
        if remarks.is_some() {
            approval.remarks = remarks;
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::FieldVersion,
            field_version_id,
            "APPROVE",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "APPROVED", "approved_by": checker })),
            checker,
        );
        Ok(approved)
    }

    async fn reject_field_version(
        &self,
        field_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleFieldVersion> {
        let mut state = self.state.lock().await;
        let approval_idx = find_pending_approval(&state, field_version_id)
            .ok_or_else(|| not_found("pending approval", "field_version_id", field_version_id))?;
        check_maker_not_checker(&state.approvals[approval_idx].maker, checker)?;

        let version = state
            .field_versions
            .get(&field_version_id)
            .cloned()
            .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;
        ensure_pending(version.status)?;

        if let Some(v) = state.field_versions.get_mut(&field_version_id) {
            v.status = EntityStatus::Rejected;
        }

        let now = Utc::now();
        let approval = &mut state.approvals[approval_idx];
        approval.action = ApprovalAction::Reject;
        approval.status = ApprovalStatus::Rejected;
        approval.checker = Some(checker.to_string());
        approval.decided_at = Some(now);
        if remarks.is_some() {
            approval.remarks = remarks;
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::FieldVersion,
            field_version_id,
            "REJECT",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "REJECTED" })),
            checker,
        );
        Ok(state.field_versions[&field_version_id].clone())
    }

    async fn approved_field_versions(&self) -> Result<Vec<RuleFieldVersion>> {
        let state = self.state.lock().await;
        let mut latest: HashMap<String, RuleFieldVersion> = HashMap::new();
        for v in state.field_versions.values() {
            if v.status != EntityStatus::Approved {
                continue;
            }
            match latest.get(&v.field_key) {
                Some(existing) if existing.version >= v.version => {}
                _ => {
                    latest.insert(v.field_key.clone(), v.clone());
                }
            }
        }
        let mut rows: Vec<RuleFieldVersion> = latest.into_values().collect();
        rows.sort_by_key(|v| v.field_id);
        Ok(rows)
    }

    async fn latest_registry_version(&self) -> Result<Option<i32>> {
        let state = self.state.lock().await;
        Ok(state
            .registry_manifests
            .iter()
            .map(|m| m.registry_version)
            .max())
    }

    async fn insert_registry_manifest(
        &self,
        manifest: FieldRegistryManifest,
    ) -> Result<FieldRegistryManifest> {
        let mut state = self.state.lock().await;
        if state
            .registry_manifests
            .iter()
            .any(|m| m.registry_version == manifest.registry_version)
        {
            return Err(Error::conflict(
                "registry version already published",
                json!({ "registry_version": manifest.registry_version }),
            ));
        }
        state.registry_manifests.push(manifest.clone());
        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::FieldRegistryManifest,
            manifest.manifest_id,
            "PUBLISH",
            None,
            Some(serde_json::to_value(&manifest).unwrap_or(Value::Null)),
            &manifest.created_by,
        );
        Ok(manifest)
    }

    // ---- rules (C5)

    async fn create_rule(
        &self,
        rule_name: &str,
        description: Option<String>,
        rule_type: RuleType,
        by: &str,
    ) -> Result<Rule> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let rule = Rule {
            rule_id: self.ids.next(),
            rule_name: rule_name.to_string(),
            description,
            rule_type,
            status: EntityStatus::Draft,
            current_version: 1,
            row_version: 1,
            created_by: by.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.rules.insert(rule.rule_id, rule.clone());
        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::Rule,
            rule.rule_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&rule).unwrap_or(Value::Null)),
            by,
        );
        Ok(rule)
    }

    async fn get_rule(&self, rule_id: Uuid) -> Result<Rule> {
        let state = self.state.lock().await;
        state
            .rules
            .get(&rule_id)
            .cloned()
            .ok_or_else(|| not_found("rule", "rule_id", rule_id))
    }

    async fn list_rules(&self, page: PageRequest) -> Result<Page<Rule>> {
        let state = self.state.lock().await;
        let rows: Vec<Rule> = state.rules.values().cloned().collect();
        paginate(rows, &page, DEFAULT_LIMIT, MAX_LIMIT, |r| (r.rule_id, r.created_at))
    }

    async fn create_rule_version(
        &self,
        rule_id: Uuid,
        draft: RuleVersionDraft,
        by: &str,
    ) -> Result<RuleVersion> {
        let mut state = self.state.lock().await;
        let rule = state
            .rules
            .get(&rule_id)
            .cloned()
            .ok_or_else(|| not_found("rule", "rule_id", rule_id))?;

        if let Some(expected) = draft.expected_rule_row_version {
            if expected != rule.row_version {
                return Err(Error::conflict(
                    "rule was modified concurrently",
                    json!({
                        "rule_id": rule_id,
                        "expected": expected,
                        "actual": rule.row_version,
                    }),
                ));
            }
        }

        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&draft.priority) {
            return Err(Error::validation(
                "priority out of range",
                json!({ "priority": draft.priority, "min": PRIORITY_MIN, "max": PRIORITY_MAX }),
            ));
        }

        if !draft.scope.is_object() {
            return Err(Error::validation(
                "scope must be an object of dimension lists",
                json!({ "scope": draft.scope }),
            ));
        }

        let action = validate_action(rule.rule_type, draft.action)?;

        let catalog = catalog_of(&state);
        let tree = compiler::parse_and_validate(&draft.condition_tree, &catalog)?;

        let next_version = state
            .rule_versions
            .values()
            .filter(|v| v.rule_id == rule_id)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;

        let version = RuleVersion {
            rule_version_id: self.ids.next(),
            rule_id,
            version: next_version,
            condition_tree: tree,
            scope: draft.scope,
            priority: draft.priority,
            action,
            status: EntityStatus::Draft,
            created_by: by.to_string(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
        };
        state.rule_versions.insert(version.rule_version_id, version.clone());

        if let Some(r) = state.rules.get_mut(&rule_id) {
            r.current_version = next_version;
            r.row_version += 1;
            r.updated_at = Utc::now();
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RuleVersion,
            version.rule_version_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&version).unwrap_or(Value::Null)),
            by,
        );
        Ok(version)
    }

    async fn get_rule_version(&self, rule_version_id: Uuid) -> Result<RuleVersion> {
        let state = self.state.lock().await;
        state
            .rule_versions
            .get(&rule_version_id)
            .cloned()
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))
    }

    async fn list_rule_versions(&self, rule_id: Uuid) -> Result<Vec<RuleVersion>> {
        let state = self.state.lock().await;
        if !state.rules.contains_key(&rule_id) {
            return Err(not_found("rule", "rule_id", rule_id));
        }
        let mut rows: Vec<RuleVersion> = state
            .rule_versions
            .values()
            .filter(|v| v.rule_id == rule_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(rows)
    }

    async fn submit_rule_version(
        &self,
        rule_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RuleVersion, Approval)> {
        let mut state = self.state.lock().await;
        let version = state
            .rule_versions
            .get(&rule_version_id)
            .cloned()
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;

        if let Some(existing) = find_idempotent_replay(
            &state,
            ApprovalEntityType::RuleVersion,
            rule_version_id,
            idempotency_key.as_deref(),
        ) {
            return Ok((version, existing));
        }

        ensure_submittable(version.status)?;
        let old_status = version.status;
        if let Some(v) = state.rule_versions.get_mut(&rule_version_id) {
            v.status = EntityStatus::PendingApproval;
        }

        let approval = Approval {
            approval_id: self.ids.next(),
            entity_type: ApprovalEntityType::RuleVersion,
            entity_id: rule_version_id,
            action: ApprovalAction::Submit,
            status: ApprovalStatus::Pending,
            maker: maker.to_string(),
            checker: None,
            remarks,
            idempotency_key,
            created_at: Utc::now(),
            decided_at: None,
        };
        state.approvals.push(approval.clone());

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RuleVersion,
            rule_version_id,
            "SUBMIT",
            Some(json!({ "status": old_status.as_str() })),
            Some(json!({ "status": "PENDING_APPROVAL" })),
            maker,
        );

        let updated = state.rule_versions[&rule_version_id].clone();
        Ok((updated, approval))
    }

    async fn approve_rule_version(
        &self,
        rule_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleVersion> {
        let mut state = self.state.lock().await;
        let approval_idx = find_pending_approval(&state, rule_version_id)
            .ok_or_else(|| not_found("pending approval", "rule_version_id", rule_version_id))?;
        check_maker_not_checker(&state.approvals[approval_idx].maker, checker)?;

        let version = state
            .rule_versions
            .get(&rule_version_id)
            .cloned()
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;
        ensure_pending(version.status)?;

        let now = Utc::now();
        let rule_id = version.rule_id;

        for v in state.rule_versions.values_mut() {
            if v.rule_id == rule_id && v.status == EntityStatus::Approved {
                v.status = EntityStatus::Superseded;
            }
        }

        if let Some(v) = state.rule_versions.get_mut(&rule_version_id) {
            v.status = EntityStatus::Approved;
            v.approved_by = Some(checker.to_string());
            v.approved_at = Some(now);
        }

        if let Some(r) = state.rules.get_mut(&rule_id) {
            r.status = EntityStatus::Approved;
            r.current_version = version.version;
            r.row_version += 1;
            r.updated_at = now;
        }

        let approval = &mut state.approvals[approval_idx];
        approval.action = ApprovalAction::Approve;
        approval.status = ApprovalStatus::Approved;
        approval.checker = Some(checker.to_string());
        approval.decided_at = Some(now);
        if remarks.is_some() {
            approval.remarks = remarks;
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RuleVersion,
            rule_version_id,
            "APPROVE",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "APPROVED", "approved_by": checker })),
            checker,
        );
        Ok(state.rule_versions[&rule_version_id].clone())
    }

    async fn reject_rule_version(
        &self,
        rule_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleVersion> {
        let mut state = self.state.lock().await;
        let approval_idx = find_pending_approval(&state, rule_version_id)
            .ok_or_else(|| not_found("pending approval", "rule_version_id", rule_version_id))?;
        check_maker_not_checker(&state.approvals[approval_idx].maker, checker)?;

        let version = state
            .rule_versions
            .get(&rule_version_id)
            .cloned()
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;
        ensure_pending(version.status)?;

        if let Some(v) = state.rule_versions.get_mut(&rule_version_id) {
            v.status = EntityStatus::Rejected;
        }

        let now = Utc::now();
        let approval = &mut state.approvals[approval_idx];
        approval.action = ApprovalAction::Reject;
        approval.status = ApprovalStatus::Rejected;
        approval.checker = Some(checker.to_string());
        approval.decided_at = Some(now);
        if remarks.is_some() {
            approval.remarks = remarks;
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RuleVersion,
            rule_version_id,
            "REJECT",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "REJECTED" })),
            checker,
        );
        Ok(state.rule_versions[&rule_version_id].clone())
    }

    // ---- rulesets (C6)

    async fn create_ruleset(
        &self,
        scope: RulesetScope,
        name: Option<String>,
        description: Option<String>,
        by: &str,
    ) -> Result<Ruleset> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .rulesets
            .values()
            .find(|r| RulesetScope::of(r) == scope)
        {
            return Err(Error::conflict(
                "ruleset already exists for this scope",
                json!({
                    "ruleset_id": existing.ruleset_id,
                    "environment": scope.environment,
                    "region": scope.region,
                    "country": scope.country,
                    "rule_type": scope.rule_type.as_str(),
                }),
            ));
        }

        let now = Utc::now();
        let ruleset = Ruleset {
            ruleset_id: self.ids.next(),
            environment: scope.environment,
            region: scope.region,
            country: scope.country,
            rule_type: scope.rule_type,
            name,
            description,
            created_by: by.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.rulesets.insert(ruleset.ruleset_id, ruleset.clone());
        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::Ruleset,
            ruleset.ruleset_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&ruleset).unwrap_or(Value::Null)),
            by,
        );
        Ok(ruleset)
    }

    async fn update_ruleset(
        &self,
        ruleset_id: Uuid,
        name: Option<String>,
        description: Option<String>,
        by: &str,
    ) -> Result<Ruleset> {
        let mut state = self.state.lock().await;
        let old = state
            .rulesets
            .get(&ruleset_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset", "ruleset_id", ruleset_id))?;

        let updated = match state.rulesets.get_mut(&ruleset_id) {
            Some(ruleset) => {
                if name.is_some() {
                    ruleset.name = name;
                }
                if description.is_some() {
                    ruleset.description = description;
                }
                ruleset.updated_at = Utc::now();
                ruleset.clone()
            }
            None => return Err(not_found("ruleset", "ruleset_id", ruleset_id)),
        };

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::Ruleset,
            ruleset_id,
            "UPDATE",
            Some(json!({ "name": old.name, "description": old.description })),
            Some(json!({ "name": updated.name, "description": updated.description })),
            by,
        );
        Ok(updated)
    }

    async fn get_ruleset(&self, ruleset_id: Uuid) -> Result<Ruleset> {
        let state = self.state.lock().await;
        state
            .rulesets
            .get(&ruleset_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset", "ruleset_id", ruleset_id))
    }

    async fn find_ruleset_by_scope(&self, scope: &RulesetScope) -> Result<Option<Ruleset>> {
        let state = self.state.lock().await;
        Ok(state
            .rulesets
            .values()
            .find(|r| &RulesetScope::of(r) == scope)
            .cloned())
    }

    async fn list_rulesets(
        &self,
        filter: RulesetFilter,
        page: PageRequest,
    ) -> Result<Page<Ruleset>> {
        let state = self.state.lock().await;
        let rows: Vec<Ruleset> = state
            .rulesets
            .values()
            .filter(|r| {
                filter.environment.as_deref().map_or(true, |e| r.environment == e)
                    && filter.region.as_deref().map_or(true, |v| r.region == v)
                    && filter.country.as_deref().map_or(true, |v| r.country == v)
                    && filter.rule_type.map_or(true, |t| r.rule_type == t)
            })
            .cloned()
            .collect();
        paginate(rows, &page, DEFAULT_LIMIT, MAX_LIMIT, |r| (r.ruleset_id, r.created_at))
    }

    async fn create_ruleset_version(
        &self,
        ruleset_id: Uuid,
        rule_version_ids: &[Uuid],
        by: &str,
    ) -> Result<RulesetVersion> {
        let mut state = self.state.lock().await;
        let ruleset = state
            .rulesets
            .get(&ruleset_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset", "ruleset_id", ruleset_id))?;

        // Membership insert enforces rule-type consistency: a ruleset
        // never mixes rule versions of a different rule type.
        for rv_id in rule_version_ids {
            let rule_version = state
                .rule_versions
                .get(rv_id)
                .ok_or_else(|| not_found("rule version", "rule_version_id", *rv_id))?;
            let rule = state
                .rules
                .get(&rule_version.rule_id)
                .ok_or_else(|| not_found("rule", "rule_id", rule_version.rule_id))?;
            if rule.rule_type != ruleset.rule_type {
                return Err(Error::validation(
                    "rule type does not match ruleset",
                    json!({
                        "ruleset_id": ruleset_id,
                        "rule_version_id": rv_id,
                        "rule_type": rule.rule_type.as_str(),
                        "ruleset_rule_type": ruleset.rule_type.as_str(),
                    }),
                ));
            }
        }

        let next_version = state
            .ruleset_versions
            .values()
            .filter(|v| v.ruleset_id == ruleset_id)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;

        let version = RulesetVersion {
            ruleset_version_id: self.ids.next(),
            ruleset_id,
            version: next_version,
            status: EntityStatus::Draft,
            created_by: by.to_string(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            activated_at: None,
        };
        state
            .ruleset_versions
            .insert(version.ruleset_version_id, version.clone());
        state
            .memberships
            .insert(version.ruleset_version_id, rule_version_ids.to_vec());

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RulesetVersion,
            version.ruleset_version_id,
            "CREATE",
            None,
            Some(json!({
                "version": next_version,
                "rule_version_ids": rule_version_ids,
            })),
            by,
        );
        Ok(version)
    }

    async fn get_ruleset_version(&self, ruleset_version_id: Uuid) -> Result<RulesetVersion> {
        let state = self.state.lock().await;
        state
            .ruleset_versions
            .get(&ruleset_version_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))
    }

    async fn list_ruleset_versions(
        &self,
        ruleset_id: Uuid,
        status: Option<EntityStatus>,
        page: PageRequest,
    ) -> Result<Page<RulesetVersion>> {
        let state = self.state.lock().await;
        let rows: Vec<RulesetVersion> = state
            .ruleset_versions
            .values()
            .filter(|v| v.ruleset_id == ruleset_id && status.map_or(true, |s| v.status == s))
            .cloned()
            .collect();
        paginate(rows, &page, DEFAULT_LIMIT, MAX_LIMIT, |v| {
            (v.ruleset_version_id, v.created_at)
        })
    }

    async fn ruleset_version_members(
        &self,
        ruleset_version_id: Uuid,
    ) -> Result<Vec<(RuleVersion, Rule)>> {
        let state = self.state.lock().await;
        members_of(&state, ruleset_version_id)
    }

    async fn submit_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RulesetVersion, Approval)> {
        let mut state = self.state.lock().await;
        let version = state
            .ruleset_versions
            .get(&ruleset_version_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;

        if let Some(existing) = find_idempotent_replay(
            &state,
            ApprovalEntityType::RulesetVersion,
            ruleset_version_id,
            idempotency_key.as_deref(),
        ) {
            return Ok((version, existing));
        }

        ensure_submittable(version.status)?;
        let old_status = version.status;
        if let Some(v) = state.ruleset_versions.get_mut(&ruleset_version_id) {
            v.status = EntityStatus::PendingApproval;
        }

        let approval = Approval {
            approval_id: self.ids.next(),
            entity_type: ApprovalEntityType::RulesetVersion,
            entity_id: ruleset_version_id,
            action: ApprovalAction::Submit,
            status: ApprovalStatus::Pending,
            maker: maker.to_string(),
            checker: None,
            remarks,
            idempotency_key,
            created_at: Utc::now(),
            decided_at: None,
        };
        state.approvals.push(approval.clone());

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "SUBMIT",
            Some(json!({ "status": old_status.as_str() })),
            Some(json!({ "status": "PENDING_APPROVAL" })),
            maker,
        );

        let updated = state.ruleset_versions[&ruleset_version_id].clone();
        Ok((updated, approval))
    }

    async fn approve_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
        publisher: &dyn Publisher,
    ) -> Result<(RulesetVersion, RulesetManifest)> {
        let mut state = self.state.lock().await;

        // Validation phase: nothing is mutated until publish succeeds.
        let approval_idx = find_pending_approval(&state, ruleset_version_id).ok_or_else(|| {
            not_found("pending approval", "ruleset_version_id", ruleset_version_id)
        })?;
        check_maker_not_checker(&state.approvals[approval_idx].maker, checker)?;

        let version = state
            .ruleset_versions
            .get(&ruleset_version_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        ensure_pending(version.status)?;

        let ruleset = state
            .rulesets
            .get(&version.ruleset_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset", "ruleset_id", version.ruleset_id))?;
        let ruleset_key = runtime_ruleset_key(ruleset.rule_type)?;
        let scope = RulesetScope::of(&ruleset);

        let members = members_of(&state, ruleset_version_id)?;
        let catalog = catalog_of(&state);
        let artifact = compiler::compile(CompileInput {
            ruleset: &ruleset,
            ruleset_version: &version,
            members: &members,
            catalog: &catalog,
        })?;

        if state.manifests.iter().any(|m| {
            m.environment == scope.environment
                && m.region == scope.region
                && m.country == scope.country
                && m.rule_type == scope.rule_type
                && m.ruleset_version == version.version
        }) {
            return Err(Error::conflict(
                "manifest already exists for this ruleset version",
                json!({ "ruleset_version": version.version }),
            ));
        }

        // Step (a): immutable artifact, before any state change.
        let artifact_uri = publisher
            .write_artifact(&scope, ruleset_key, version.version, &artifact)
            .await?;

        // Stage the transactional mutations on a copy; the pointer write
        // decides whether they commit.
        let mut staged = state.clone();
        let now = Utc::now();

        for v in staged.ruleset_versions.values_mut() {
            if v.ruleset_id == version.ruleset_id && v.status == EntityStatus::Approved {
                v.status = EntityStatus::Superseded;
            }
        }
        if let Some(v) = staged.ruleset_versions.get_mut(&ruleset_version_id) {
            v.status = EntityStatus::Approved;
            v.approved_by = Some(checker.to_string());
            v.approved_at = Some(now);
        }

        let approval = &mut staged.approvals[approval_idx];
        approval.action = ApprovalAction::Approve;
        approval.status = ApprovalStatus::Approved;
        approval.checker = Some(checker.to_string());
        approval.decided_at = Some(now);
        if remarks.is_some() {
            approval.remarks = remarks;
        }

        let field_registry_version = staged
            .registry_manifests
            .iter()
            .map(|m| m.registry_version)
            .max();

        // Step (b): manifest row joins the staged transaction.
        let manifest = RulesetManifest {
            manifest_id: self.ids.next(),
            environment: scope.environment.clone(),
            region: scope.region.clone(),
            country: scope.country.clone(),
            rule_type: scope.rule_type,
            ruleset_version: version.version,
            ruleset_version_id,
            field_registry_version,
            artifact_uri: artifact_uri.clone(),
            checksum: artifact.checksum.clone(),
            created_by: checker.to_string(),
            created_at: now,
        };
        staged.manifests.push(manifest.clone());

        push_audit(
            &mut staged,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "APPROVE",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({
                "status": "APPROVED",
                "approved_by": checker,
                "manifest_id": manifest.manifest_id,
                "checksum": manifest.checksum,
            })),
            checker,
        );

        // Step (c): pointer last. Failure abandons the staged state, so
        // the approval rolls back and no manifest row survives.
        publisher
            .write_pointer(&PointerDoc {
                scope,
                ruleset_key,
                ruleset_version: version.version,
                artifact_uri,
                checksum: artifact.checksum.clone(),
                field_registry_version,
                published_at: now,
            })
            .await?;

        let approved = staged.ruleset_versions[&ruleset_version_id].clone();
        *state = staged;
        Ok((approved, manifest))
    }

    async fn reject_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RulesetVersion> {
        let mut state = self.state.lock().await;
        let approval_idx = find_pending_approval(&state, ruleset_version_id).ok_or_else(|| {
            not_found("pending approval", "ruleset_version_id", ruleset_version_id)
        })?;
        check_maker_not_checker(&state.approvals[approval_idx].maker, checker)?;

        let version = state
            .ruleset_versions
            .get(&ruleset_version_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        ensure_pending(version.status)?;

        if let Some(v) = state.ruleset_versions.get_mut(&ruleset_version_id) {
            v.status = EntityStatus::Rejected;
        }

        let now = Utc::now();
        let approval = &mut state.approvals[approval_idx];
        approval.action = ApprovalAction::Reject;
        approval.status = ApprovalStatus::Rejected;
        approval.checker = Some(checker.to_string());
        approval.decided_at = Some(now);
        if remarks.is_some() {
            approval.remarks = remarks;
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "REJECT",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "REJECTED" })),
            checker,
        );
        Ok(state.ruleset_versions[&ruleset_version_id].clone())
    }

    async fn activate_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        by: &str,
    ) -> Result<RulesetVersion> {
        let mut state = self.state.lock().await;
        let version = state
            .ruleset_versions
            .get(&ruleset_version_id)
            .cloned()
            .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        ensure_activatable(version.status)?;

        let now = Utc::now();
        let mut demoted = Vec::new();
        for v in state.ruleset_versions.values_mut() {
            if v.ruleset_id == version.ruleset_id
                && v.ruleset_version_id != ruleset_version_id
                && v.status == EntityStatus::Active
            {
                v.status = EntityStatus::Superseded;
                demoted.push(v.ruleset_version_id);
            }
        }

        if let Some(v) = state.ruleset_versions.get_mut(&ruleset_version_id) {
            v.status = EntityStatus::Active;
            v.activated_at = Some(now);
        }

        push_audit(
            &mut state,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "ACTIVATE",
            Some(json!({ "status": "APPROVED" })),
            Some(json!({ "status": "ACTIVE", "superseded": demoted })),
            by,
        );
        Ok(state.ruleset_versions[&ruleset_version_id].clone())
    }

    async fn list_manifests(&self, scope: &RulesetScope) -> Result<Vec<RulesetManifest>> {
        let state = self.state.lock().await;
        let mut rows: Vec<RulesetManifest> = state
            .manifests
            .iter()
            .filter(|m| {
                m.environment == scope.environment
                    && m.region == scope.region
                    && m.country == scope.country
                    && m.rule_type == scope.rule_type
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.ruleset_version.cmp(&a.ruleset_version));
        Ok(rows)
    }

    // ---- approvals + audit (C7, C10)

    async fn list_approvals(
        &self,
        status: Option<ApprovalStatus>,
        entity_type: Option<ApprovalEntityType>,
        page: PageRequest,
    ) -> Result<Page<ApprovalSummary>> {
        let state = self.state.lock().await;
        let rows: Vec<ApprovalSummary> = state
            .approvals
            .iter()
            .filter(|a| {
                status.map_or(true, |s| a.status == s)
                    && entity_type.map_or(true, |t| a.entity_type == t)
            })
            .map(|a| approval_summary(&state, a))
            .collect();
        paginate(rows, &page, DEFAULT_LIMIT, MAX_LIMIT, |s| {
            (s.approval.approval_id, s.approval.created_at)
        })
    }

    async fn list_audit(
        &self,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditEntry>> {
        let state = self.state.lock().await;
        let rows: Vec<AuditEntry> = state
            .audit
            .iter()
            .filter(|e| {
                filter.entity_type.map_or(true, |t| e.entity_type == t)
                    && filter.entity_id.map_or(true, |id| e.entity_id == id)
                    && filter.action.as_deref().map_or(true, |a| e.action == a)
                    && filter
                        .performed_by
                        .as_deref()
                        .map_or(true, |p| e.performed_by == p)
                    && filter.since.map_or(true, |t| e.performed_at >= t)
                    && filter.until.map_or(true, |t| e.performed_at <= t)
            })
            .cloned()
            .collect();
        paginate(rows, &page, AUDIT_DEFAULT_LIMIT, AUDIT_MAX_LIMIT, |e| {
            (e.audit_id, e.performed_at)
        })
    }
}

fn members_of(state: &MemoryState, ruleset_version_id: Uuid) -> Result<Vec<(RuleVersion, Rule)>> {
    let member_ids = state
        .memberships
        .get(&ruleset_version_id)
        .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;

    member_ids
        .iter()
        .map(|rv_id| {
            let rule_version = state
                .rule_versions
                .get(rv_id)
                .cloned()
                .ok_or_else(|| not_found("rule version", "rule_version_id", *rv_id))?;
            let rule = state
                .rules
                .get(&rule_version.rule_id)
                .cloned()
                .ok_or_else(|| not_found("rule", "rule_id", rule_version.rule_id))?;
            Ok((rule_version, rule))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactStore, FilesystemStore};
    use crate::services::publisher::RulesetPublisher;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn approved_auth_rule(
        store: &MemoryStore,
        name: &str,
        threshold: i64,
        priority: i32,
    ) -> RuleVersion {
        let rule = store
            .create_rule(name, None, RuleType::Auth, "maker-1")
            .await
            .unwrap();
        let version = store
            .create_rule_version(
                rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": threshold}),
                    scope: json!({}),
                    priority,
                    action: Some(crate::domain::enums::RuleAction::Decline),
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();
        store
            .submit_rule_version(version.rule_version_id, "maker-1", None, None)
            .await
            .unwrap();
        store
            .approve_rule_version(version.rule_version_id, "checker-1", None)
            .await
            .unwrap()
    }

    async fn auth_ruleset(store: &MemoryStore) -> Ruleset {
        store
            .create_ruleset(
                RulesetScope {
                    environment: "prod".into(),
                    region: "INDIA".into(),
                    country: "IN".into(),
                    rule_type: RuleType::Auth,
                },
                Some("IN auth rules".into()),
                None,
                "maker-1",
            )
            .await
            .unwrap()
    }

    fn publisher(dir: &std::path::Path) -> (Arc<FilesystemStore>, RulesetPublisher) {
        let backend = Arc::new(FilesystemStore::new(dir));
        let publisher = RulesetPublisher::new(backend.clone(), "");
        (backend, publisher)
    }

    // Scenario: create + submit + approve a rule with different actors.
    #[tokio::test]
    async fn test_rule_lifecycle_with_distinct_actors() {
        let store = MemoryStore::new();
        let rule = store
            .create_rule("High Amount", None, RuleType::Auth, "maker-1")
            .await
            .unwrap();
        assert_eq!(rule.status, EntityStatus::Draft);
        assert_eq!(rule.current_version, 1);

        let version = store
            .create_rule_version(
                rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 3000}),
                    scope: json!({}),
                    priority: 100,
                    action: Some(crate::domain::enums::RuleAction::Decline),
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();
        assert_eq!(version.status, EntityStatus::Draft);

        let (submitted, approval) = store
            .submit_rule_version(version.rule_version_id, "maker-1", None, None)
            .await
            .unwrap();
        assert_eq!(submitted.status, EntityStatus::PendingApproval);
        assert_eq!(approval.maker, "maker-1");
        assert_eq!(approval.status, ApprovalStatus::Pending);

        let approved = store
            .approve_rule_version(version.rule_version_id, "checker-1", None)
            .await
            .unwrap();
        assert_eq!(approved.status, EntityStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("checker-1"));
    }

    // Scenario: approve-by-self is forbidden and changes nothing.
    #[tokio::test]
    async fn test_self_approval_forbidden() {
        let store = MemoryStore::new();
        let rule = store
            .create_rule("High Amount", None, RuleType::Auth, "maker-1")
            .await
            .unwrap();
        let version = store
            .create_rule_version(
                rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 3000}),
                    scope: json!({}),
                    priority: 100,
                    action: None,
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();
        store
            .submit_rule_version(version.rule_version_id, "maker-1", None, None)
            .await
            .unwrap();

        let err = store
            .approve_rule_version(version.rule_version_id, "maker-1", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ForbiddenError");

        let unchanged = store.get_rule_version(version.rule_version_id).await.unwrap();
        assert_eq!(unchanged.status, EntityStatus::PendingApproval);
    }

    // Scenario: idempotent submit returns the original approval row.
    #[tokio::test]
    async fn test_idempotent_submit() {
        let store = MemoryStore::new();
        let rule = store
            .create_rule("High Amount", None, RuleType::Auth, "maker-1")
            .await
            .unwrap();
        let version = store
            .create_rule_version(
                rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 3000}),
                    scope: json!({}),
                    priority: 100,
                    action: None,
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();

        let (_, a1) = store
            .submit_rule_version(
                version.rule_version_id,
                "maker-1",
                None,
                Some("k1".to_string()),
            )
            .await
            .unwrap();
        let (_, a2) = store
            .submit_rule_version(
                version.rule_version_id,
                "maker-1",
                None,
                Some("k1".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(a1.approval_id, a2.approval_id);

        let approvals = store
            .list_approvals(None, Some(ApprovalEntityType::RuleVersion), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(approvals.items.len(), 1);
    }

    // Approval listings resolve the owning rule or ruleset identity.
    #[tokio::test]
    async fn test_approval_listing_resolves_entity_context() {
        let store = MemoryStore::new();
        let rule = store
            .create_rule("High Amount", None, RuleType::Auth, "maker-1")
            .await
            .unwrap();
        let rule_version = store
            .create_rule_version(
                rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 3000}),
                    scope: json!({}),
                    priority: 100,
                    action: None,
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();
        store
            .submit_rule_version(rule_version.rule_version_id, "maker-1", None, None)
            .await
            .unwrap();

        let ruleset = auth_ruleset(&store).await;
        let ruleset_version = store
            .create_ruleset_version(ruleset.ruleset_id, &[], "maker-1")
            .await
            .unwrap();
        store
            .submit_ruleset_version(ruleset_version.ruleset_version_id, "maker-1", None, None)
            .await
            .unwrap();

        let approvals = store
            .list_approvals(None, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(approvals.items.len(), 2);

        let rule_approval = approvals
            .items
            .iter()
            .find(|s| s.approval.entity_type == ApprovalEntityType::RuleVersion)
            .unwrap();
        assert_eq!(rule_approval.rule_id, Some(rule.rule_id));
        assert!(rule_approval.ruleset_id.is_none());

        let ruleset_approval = approvals
            .items
            .iter()
            .find(|s| s.approval.entity_type == ApprovalEntityType::RulesetVersion)
            .unwrap();
        assert_eq!(ruleset_approval.ruleset_id, Some(ruleset.ruleset_id));
        assert!(ruleset_approval.rule_id.is_none());

        // The flattened wire form carries the context keys only where set.
        let wire = serde_json::to_value(rule_approval).unwrap();
        assert_eq!(wire["rule_id"], rule.rule_id.to_string());
        assert_eq!(wire["maker"], "maker-1");
        assert!(wire.get("ruleset_id").is_none());
    }

    // Scenario: publish an AUTH ruleset to CARD_AUTH.
    #[tokio::test]
    async fn test_publish_auth_ruleset() {
        let store = MemoryStore::new();
        let dir = tempdir().unwrap();
        let (backend, publisher) = publisher(dir.path());

        let high = approved_auth_rule(&store, "High Amount", 3000, 100).await;
        let low = approved_auth_rule(&store, "Low Amount", 1000, 50).await;
        let ruleset = auth_ruleset(&store).await;

        // Versions 1..4 exist only to push the published version to 5.
        for _ in 0..4 {
            store
                .create_ruleset_version(ruleset.ruleset_id, &[high.rule_version_id], "maker-1")
                .await
                .unwrap();
        }
        let v5 = store
            .create_ruleset_version(
                ruleset.ruleset_id,
                &[low.rule_version_id, high.rule_version_id],
                "maker-1",
            )
            .await
            .unwrap();
        assert_eq!(v5.version, 5);

        store
            .submit_ruleset_version(v5.ruleset_version_id, "maker-1", None, None)
            .await
            .unwrap();
        let (approved, manifest) = store
            .approve_ruleset_version(v5.ruleset_version_id, "checker-1", None, &publisher)
            .await
            .unwrap();

        assert_eq!(approved.status, EntityStatus::Approved);
        assert_eq!(manifest.ruleset_version, 5);
        assert_eq!(manifest.environment, "prod");
        assert!(manifest.checksum.starts_with("sha256:"));

        // Artifact exists at the locked key and matches the checksum.
        let artifact_bytes = backend
            .get("rulesets/prod/INDIA/IN/CARD_AUTH/v5/ruleset.json")
            .await
            .unwrap()
            .expect("artifact must exist");
        assert_eq!(crate::canonical::checksum(&artifact_bytes), manifest.checksum);

        // Rules are ordered priority 100 then 50.
        let ast: Value = serde_json::from_slice(&artifact_bytes).unwrap();
        let rules = ast["rules"].as_array().unwrap();
        assert_eq!(rules[0]["priority"], 100);
        assert_eq!(rules[1]["priority"], 50);

        // Pointer names version 5.
        let pointer_bytes = backend
            .get("rulesets/prod/INDIA/IN/CARD_AUTH/manifest.json")
            .await
            .unwrap()
            .expect("pointer must exist");
        let pointer: Value = serde_json::from_slice(&pointer_bytes).unwrap();
        assert_eq!(pointer["ruleset_version"], 5);
        assert_eq!(pointer["ruleset_key"], "CARD_AUTH");
        assert_eq!(pointer["checksum"], manifest.checksum);

        // Governance manifest row is queryable.
        let manifests = store
            .list_manifests(&RulesetScope::of(&ruleset))
            .await
            .unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].ruleset_version, 5);
    }

    // Scenario: ALLOWLIST rulesets are governance-only.
    #[tokio::test]
    async fn test_allowlist_publish_rejected() {
        let store = MemoryStore::new();
        let dir = tempdir().unwrap();
        let (backend, publisher) = publisher(dir.path());

        let ruleset = store
            .create_ruleset(
                RulesetScope {
                    environment: "prod".into(),
                    region: "INDIA".into(),
                    country: "IN".into(),
                    rule_type: RuleType::Allowlist,
                },
                None,
                None,
                "maker-1",
            )
            .await
            .unwrap();
        let version = store
            .create_ruleset_version(ruleset.ruleset_id, &[], "maker-1")
            .await
            .unwrap();
        store
            .submit_ruleset_version(version.ruleset_version_id, "maker-1", None, None)
            .await
            .unwrap();

        let err = store
            .approve_ruleset_version(version.ruleset_version_id, "checker-1", None, &publisher)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        // No state change, no artifact, no manifest row.
        let unchanged = store
            .get_ruleset_version(version.ruleset_version_id)
            .await
            .unwrap();
        assert_eq!(unchanged.status, EntityStatus::PendingApproval);
        assert!(backend
            .get("rulesets/prod/INDIA/IN/CARD_AUTH/v1/ruleset.json")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .list_manifests(&RulesetScope::of(&ruleset))
            .await
            .unwrap()
            .is_empty());
    }

    // Scenario: activation demotes the prior ACTIVE version.
    #[tokio::test]
    async fn test_activation_demotes_prior_active() {
        let store = MemoryStore::new();
        let dir = tempdir().unwrap();
        let (_backend, publisher) = publisher(dir.path());

        let rule = approved_auth_rule(&store, "High Amount", 3000, 100).await;
        let ruleset = auth_ruleset(&store).await;

        let mut versions = Vec::new();
        for _ in 0..2 {
            let v = store
                .create_ruleset_version(ruleset.ruleset_id, &[rule.rule_version_id], "maker-1")
                .await
                .unwrap();
            store
                .submit_ruleset_version(v.ruleset_version_id, "maker-1", None, None)
                .await
                .unwrap();
            store
                .approve_ruleset_version(v.ruleset_version_id, "checker-1", None, &publisher)
                .await
                .unwrap();
            versions.push(v);
        }

        // Approving v2 superseded v1; re-approve flow means only v2 is
        // APPROVED now, so activate it, then build v3 to activate after.
        let v2_active = store
            .activate_ruleset_version(versions[1].ruleset_version_id, "admin-1")
            .await
            .unwrap();
        assert_eq!(v2_active.status, EntityStatus::Active);

        let v3 = store
            .create_ruleset_version(ruleset.ruleset_id, &[rule.rule_version_id], "maker-1")
            .await
            .unwrap();
        store
            .submit_ruleset_version(v3.ruleset_version_id, "maker-1", None, None)
            .await
            .unwrap();
        store
            .approve_ruleset_version(v3.ruleset_version_id, "checker-1", None, &publisher)
            .await
            .unwrap();

        let v3_active = store
            .activate_ruleset_version(v3.ruleset_version_id, "admin-1")
            .await
            .unwrap();
        assert_eq!(v3_active.status, EntityStatus::Active);

        let old = store
            .get_ruleset_version(versions[1].ruleset_version_id)
            .await
            .unwrap();
        assert_eq!(old.status, EntityStatus::Superseded);
        assert!(v3_active.activated_at.unwrap() > v2_active.activated_at.unwrap());

        // Exactly one ACTIVE version for the ruleset.
        let active = store
            .list_ruleset_versions(
                ruleset.ruleset_id,
                Some(EntityStatus::Active),
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(active.items.len(), 1);
        assert_eq!(active.items[0].ruleset_version_id, v3.ruleset_version_id);
    }

    // Publish failure aborts the approval: no state change, no manifest.
    #[tokio::test]
    async fn test_publish_failure_rolls_back_approval() {
        struct PointerFails {
            inner: FilesystemStore,
        }

        #[async_trait]
        impl ArtifactStore for PointerFails {
            async fn put_immutable(&self, key: &str, bytes: &[u8]) -> Result<crate::artifacts::PutOutcome> {
                self.inner.put_immutable(key, bytes).await
            }
            async fn put_mutable(&self, _key: &str, _bytes: &[u8]) -> Result<()> {
                Err(Error::publishing("pointer write refused", json!({})))
            }
            async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
                self.inner.get(key).await
            }
            fn uri_for(&self, key: &str) -> String {
                self.inner.uri_for(key)
            }
        }

        let store = MemoryStore::new();
        let dir = tempdir().unwrap();
        let backend = Arc::new(PointerFails {
            inner: FilesystemStore::new(dir.path()),
        });
        let publisher = RulesetPublisher::new(backend.clone(), "");

        let rule = approved_auth_rule(&store, "High Amount", 3000, 100).await;
        let ruleset = auth_ruleset(&store).await;
        let version = store
            .create_ruleset_version(ruleset.ruleset_id, &[rule.rule_version_id], "maker-1")
            .await
            .unwrap();
        store
            .submit_ruleset_version(version.ruleset_version_id, "maker-1", None, None)
            .await
            .unwrap();

        let err = store
            .approve_ruleset_version(version.ruleset_version_id, "checker-1", None, &publisher)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "PublishingError");

        // Approval rolled back; the content-addressed artifact may linger
        // but no pointer and no manifest row exist.
        let unchanged = store
            .get_ruleset_version(version.ruleset_version_id)
            .await
            .unwrap();
        assert_eq!(unchanged.status, EntityStatus::PendingApproval);
        assert!(store
            .list_manifests(&RulesetScope::of(&ruleset))
            .await
            .unwrap()
            .is_empty());
        assert!(backend
            .get("rulesets/prod/INDIA/IN/CARD_AUTH/manifest.json")
            .await
            .unwrap()
            .is_none());
    }

    // Snapshot immutability: membership survives later rule updates.
    #[tokio::test]
    async fn test_membership_is_snapshot_bound() {
        let store = MemoryStore::new();
        let dir = tempdir().unwrap();
        let (_backend, publisher) = publisher(dir.path());

        let v1 = approved_auth_rule(&store, "High Amount", 3000, 100).await;
        let ruleset = auth_ruleset(&store).await;
        let rsv = store
            .create_ruleset_version(ruleset.ruleset_id, &[v1.rule_version_id], "maker-1")
            .await
            .unwrap();
        store
            .submit_ruleset_version(rsv.ruleset_version_id, "maker-1", None, None)
            .await
            .unwrap();
        store
            .approve_ruleset_version(rsv.ruleset_version_id, "checker-1", None, &publisher)
            .await
            .unwrap();

        // A newer rule version supersedes v1, but the published snapshot
        // still references the exact member it was approved with.
        let v2 = store
            .create_rule_version(
                v1.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 9000}),
                    scope: json!({}),
                    priority: 100,
                    action: None,
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();
        store
            .submit_rule_version(v2.rule_version_id, "maker-1", None, None)
            .await
            .unwrap();
        store
            .approve_rule_version(v2.rule_version_id, "checker-1", None)
            .await
            .unwrap();

        let members = store
            .ruleset_version_members(rsv.ruleset_version_id)
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0.rule_version_id, v1.rule_version_id);
        assert_eq!(members[0].0.status, EntityStatus::Superseded);
    }

    #[tokio::test]
    async fn test_rule_type_mismatch_rejected_at_membership_insert() {
        let store = MemoryStore::new();
        let monitoring_rule = store
            .create_rule("Watch", None, RuleType::Monitoring, "maker-1")
            .await
            .unwrap();
        let version = store
            .create_rule_version(
                monitoring_rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 10}),
                    scope: json!({}),
                    priority: 10,
                    action: None,
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();

        let ruleset = auth_ruleset(&store).await;
        let err = store
            .create_ruleset_version(ruleset.ruleset_id, &[version.rule_version_id], "maker-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(err.details()["rule_type"], "MONITORING");
    }

    #[tokio::test]
    async fn test_optimistic_lock_conflict() {
        let store = MemoryStore::new();
        let rule = store
            .create_rule("High Amount", None, RuleType::Auth, "maker-1")
            .await
            .unwrap();

        let draft = |expected| RuleVersionDraft {
            condition_tree: json!({"field": "amount", "op": "GT", "value": 1}),
            scope: json!({}),
            priority: 10,
            action: None,
            expected_rule_row_version: expected,
        };

        // First write bumps row_version from 1 to 2.
        store
            .create_rule_version(rule.rule_id, draft(Some(1)), "maker-1")
            .await
            .unwrap();

        let err = store
            .create_rule_version(rule.rule_id, draft(Some(1)), "maker-2")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
        assert_eq!(err.details()["actual"], 2);
    }

    #[tokio::test]
    async fn test_duplicate_ruleset_scope_conflict() {
        let store = MemoryStore::new();
        let first = auth_ruleset(&store).await;

        let err = store
            .create_ruleset(
                RulesetScope::of(&first),
                Some("again".into()),
                None,
                "maker-2",
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
        assert_eq!(err.details()["ruleset_id"], first.ruleset_id.to_string());
    }

    #[tokio::test]
    async fn test_keyset_pagination_round_trip() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store
                .create_rule(&format!("rule-{i}"), None, RuleType::Auth, "maker-1")
                .await
                .unwrap();
        }

        let page1 = store.list_rules(PageRequest::first(3)).await.unwrap();
        assert_eq!(page1.items.len(), 3);
        assert!(page1.has_next);
        assert!(!page1.has_prev);

        let page2 = store
            .list_rules(PageRequest::after(page1.next_cursor.clone().unwrap(), 3))
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 3);
        assert!(page2.has_next);
        assert!(page2.has_prev);

        let page3 = store
            .list_rules(PageRequest::after(page2.next_cursor.clone().unwrap(), 3))
            .await
            .unwrap();
        assert_eq!(page3.items.len(), 1);
        assert!(!page3.has_next);

        // Concatenated pages form a strictly descending sequence with no
        // duplicates.
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for page in [&page1, &page2, &page3] {
            for rule in &page.items {
                assert!(seen.insert(rule.rule_id));
                all.push((rule.created_at, rule.rule_id));
            }
        }
        for pair in all.windows(2) {
            assert!(pair[0] > pair[1]);
        }

        // Paging backward from page 2 returns page 1's items.
        let back = store
            .list_rules(PageRequest::before(page2.prev_cursor.clone().unwrap(), 3))
            .await
            .unwrap();
        let back_ids: Vec<Uuid> = back.items.iter().map(|r| r.rule_id).collect();
        let page1_ids: Vec<Uuid> = page1.items.iter().map(|r| r.rule_id).collect();
        assert_eq!(back_ids, page1_ids);
    }

    #[tokio::test]
    async fn test_audit_trail_filters() {
        let store = MemoryStore::new();
        let rule = store
            .create_rule("High Amount", None, RuleType::Auth, "maker-1")
            .await
            .unwrap();
        let version = store
            .create_rule_version(
                rule.rule_id,
                RuleVersionDraft {
                    condition_tree: json!({"field": "amount", "op": "GT", "value": 3000}),
                    scope: json!({}),
                    priority: 100,
                    action: None,
                    expected_rule_row_version: None,
                },
                "maker-1",
            )
            .await
            .unwrap();
        store
            .submit_rule_version(version.rule_version_id, "maker-1", None, None)
            .await
            .unwrap();
        store
            .approve_rule_version(version.rule_version_id, "checker-1", None)
            .await
            .unwrap();

        let submits = store
            .list_audit(
                AuditFilter {
                    entity_type: Some(AuditEntityType::RuleVersion),
                    action: Some("SUBMIT".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(submits.items.len(), 1);
        assert_eq!(submits.items[0].performed_by, "maker-1");

        let by_checker = store
            .list_audit(
                AuditFilter {
                    performed_by: Some("checker-1".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_checker.items.len(), 1);
        assert_eq!(by_checker.items[0].action, "APPROVE");
    }

    #[tokio::test]
    async fn test_standard_catalog_seeded() {
        let store = MemoryStore::new();
        let catalog = store.active_catalog().await.unwrap();
        assert_eq!(catalog.len(), 26);
        assert!(catalog.contains_key("amount"));
        assert!(catalog.contains_key("mcc"));
        assert_eq!(store.next_field_id().await.unwrap(), 27);
    }

    #[tokio::test]
    async fn test_enum_metadata_feeds_catalog() {
        let store = MemoryStore::new();
        store
            .upsert_field_metadata(
                "card_network",
                "enum_values",
                json!(["VISA", "MASTERCARD", "RUPAY"]),
                None,
                "admin-1",
            )
            .await
            .unwrap();

        let catalog = store.active_catalog().await.unwrap();
        let network = &catalog["card_network"];
        let enums = network.enum_values.as_ref().unwrap();
        assert!(enums.contains("RUPAY"));
        assert!(!enums.contains("AMEX"));
    }

    #[tokio::test]
    async fn test_field_revision_lifecycle() {
        let store = MemoryStore::new();
        let field = store
            .create_field(
                FieldDraft {
                    field_key: "loyalty_tier".into(),
                    display_name: "Loyalty Tier".into(),
                    description: None,
                    data_type: crate::domain::enums::DataType::String,
                    allowed_operators: vec![
                        crate::domain::enums::Operator::Eq,
                        crate::domain::enums::Operator::In,
                    ],
                    multi_value_allowed: true,
                    is_sensitive: false,
                },
                "maker-1",
            )
            .await
            .unwrap();
        assert_eq!(field.field_id, 27);

        // Not in the catalog until a version is approved.
        assert!(!store.active_catalog().await.unwrap().contains_key("loyalty_tier"));

        let versions: Vec<RuleFieldVersion> = {
            let state = store.state.lock().await;
            state
                .field_versions
                .values()
                .filter(|v| v.field_key == "loyalty_tier")
                .cloned()
                .collect()
        };
        let version_id = versions[0].field_version_id;

        store
            .submit_field_version(version_id, "maker-1", None, None)
            .await
            .unwrap();
        let err = store
            .approve_field_version(version_id, "maker-1", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ForbiddenError");

        store
            .approve_field_version(version_id, "checker-1", None)
            .await
            .unwrap();
        assert!(store.active_catalog().await.unwrap().contains_key("loyalty_tier"));
    }
}
