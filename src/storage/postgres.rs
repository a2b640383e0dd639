//! PostgreSQL store.
//!
//! Every multi-row mutation runs in a transaction; identity rows are
//! locked with `FOR UPDATE` so concurrent approvals serialize, and the
//! ruleset approve flow interleaves the publisher's object-storage
//! writes with the transaction (artifact, manifest row, pointer) so a
//! publish failure rolls the approval back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::compiler::{self, CompileInput};
use crate::domain::approval::{Approval, ApprovalSummary};
use crate::domain::audit::{AuditEntry, AuditFilter};
use crate::domain::enums::{
    ApprovalAction, ApprovalEntityType, ApprovalStatus, AuditEntityType, DataType, EntityStatus,
    Operator, RuleAction, RuleType,
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
    build_page, Cursor, Direction, Page, PageRequest, AUDIT_DEFAULT_LIMIT, AUDIT_MAX_LIMIT,
    DEFAULT_LIMIT, MAX_LIMIT,
};
use crate::storage::seed::{STANDARD_FIELDS, STANDARD_FIELD_MAX_ID};
use crate::storage::traits::{RulesetFilter, Store};

pub struct PgStore {
    pool: PgPool,
    ids: IdGenerator,
}

impl PgStore {
    /// Connect with a bounded pool.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(PgStore {
            pool,
            ids: IdGenerator::new(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seed the standard field catalog (idempotent).
    pub async fn seed_standard_fields(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for seed in STANDARD_FIELDS {
            let operators: Vec<String> = seed
                .allowed_operators
                .iter()
                .map(|o| o.as_str().to_string())
                .collect();
            let inserted = sqlx::query(
                r#"
                INSERT INTO rule_fields
                    (field_key, field_id, display_name, data_type, allowed_operators,
                     multi_value_allowed, is_sensitive, is_active, current_version,
                     row_version, created_by, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, 1, 1, 'system', now(), now())
                ON CONFLICT (field_key) DO NOTHING
                "#,
            )
            .bind(seed.field_key)
            .bind(seed.field_id)
            .bind(seed.display_name)
            .bind(seed.data_type.as_str())
            .bind(&operators)
            .bind(seed.multi_value_allowed)
            .bind(seed.is_sensitive)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() > 0 {
                sqlx::query(
                    r#"
                    INSERT INTO rule_field_versions
                        (field_version_id, field_key, version, field_id, display_name,
                         data_type, allowed_operators, multi_value_allowed, is_sensitive,
                         status, created_by, created_at, approved_by, approved_at)
                    VALUES ($1, $2, 1, $3, $4, $5, $6, $7, $8, 'APPROVED', 'system',
                            now(), 'system', now())
                    "#,
                )
                .bind(self.ids.next())
                .bind(seed.field_key)
                .bind(seed.field_id)
                .bind(seed.display_name)
                .bind(seed.data_type.as_str())
                .bind(&operators)
                .bind(seed.multi_value_allowed)
                .bind(seed.is_sensitive)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

// ---- row mapping

fn parse_enum<T>(raw: &str, parse: fn(&str) -> Option<T>, what: &str) -> Result<T> {
    parse(raw).ok_or_else(|| {
        Error::integrity(
            format!("unrecognized {what} value in database"),
            json!({ "value": raw }),
        )
    })
}

fn parse_operators(raw: Vec<String>) -> Result<Vec<Operator>> {
    raw.iter()
        .map(|s| parse_enum(s, Operator::parse, "operator"))
        .collect()
}

fn field_from_row(row: &PgRow) -> Result<RuleField> {
    Ok(RuleField {
        field_key: row.get("field_key"),
        field_id: row.get("field_id"),
        display_name: row.get("display_name"),
        description: row.get("description"),
        data_type: parse_enum(row.get("data_type"), DataType::parse, "data type")?,
        allowed_operators: parse_operators(row.get("allowed_operators"))?,
        multi_value_allowed: row.get("multi_value_allowed"),
        is_sensitive: row.get("is_sensitive"),
        is_active: row.get("is_active"),
        current_version: row.get("current_version"),
        row_version: row.get("row_version"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn field_version_from_row(row: &PgRow) -> Result<RuleFieldVersion> {
    Ok(RuleFieldVersion {
        field_version_id: row.get("field_version_id"),
        field_key: row.get("field_key"),
        version: row.get("version"),
        field_id: row.get("field_id"),
        display_name: row.get("display_name"),
        description: row.get("description"),
        data_type: parse_enum(row.get("data_type"), DataType::parse, "data type")?,
        allowed_operators: parse_operators(row.get("allowed_operators"))?,
        multi_value_allowed: row.get("multi_value_allowed"),
        is_sensitive: row.get("is_sensitive"),
        status: parse_enum(row.get("status"), EntityStatus::parse, "status")?,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
    })
}

fn rule_from_row(row: &PgRow) -> Result<Rule> {
    Ok(Rule {
        rule_id: row.get("rule_id"),
        rule_name: row.get("rule_name"),
        description: row.get("description"),
        rule_type: parse_enum(row.get("rule_type"), RuleType::parse, "rule type")?,
        status: parse_enum(row.get("status"), EntityStatus::parse, "status")?,
        current_version: row.get("current_version"),
        row_version: row.get("row_version"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn rule_version_from_row(row: &PgRow) -> Result<RuleVersion> {
    let tree: Value = row.get("condition_tree");
    let condition_tree = crate::domain::condition::ConditionNode::from_value(&tree)
        .map_err(|e| Error::integrity("stored condition tree is unreadable", json!({ "reason": e.reason })))?;
    Ok(RuleVersion {
        rule_version_id: row.get("rule_version_id"),
        rule_id: row.get("rule_id"),
        version: row.get("version"),
        condition_tree,
        scope: row.get("scope"),
        priority: row.get("priority"),
        action: parse_enum(row.get("action"), RuleAction::parse, "rule action")?,
        status: parse_enum(row.get("status"), EntityStatus::parse, "status")?,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
    })
}

fn ruleset_from_row(row: &PgRow) -> Result<Ruleset> {
    Ok(Ruleset {
        ruleset_id: row.get("ruleset_id"),
        environment: row.get("environment"),
        region: row.get("region"),
        country: row.get("country"),
        rule_type: parse_enum(row.get("rule_type"), RuleType::parse, "rule type")?,
        name: row.get("name"),
        description: row.get("description"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn ruleset_version_from_row(row: &PgRow) -> Result<RulesetVersion> {
    Ok(RulesetVersion {
        ruleset_version_id: row.get("ruleset_version_id"),
        ruleset_id: row.get("ruleset_id"),
        version: row.get("version"),
        status: parse_enum(row.get("status"), EntityStatus::parse, "status")?,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
        activated_at: row.get("activated_at"),
    })
}

fn approval_from_row(row: &PgRow) -> Result<Approval> {
    Ok(Approval {
        approval_id: row.get("approval_id"),
        entity_type: parse_enum(
            row.get("entity_type"),
            ApprovalEntityType::parse,
            "approval entity type",
        )?,
        entity_id: row.get("entity_id"),
        action: parse_enum(
            row.get("action"),
            |s| match s {
                "SUBMIT" => Some(ApprovalAction::Submit),
                "APPROVE" => Some(ApprovalAction::Approve),
                "REJECT" => Some(ApprovalAction::Reject),
                _ => None,
            },
            "approval action",
        )?,
        status: parse_enum(row.get("status"), ApprovalStatus::parse, "approval status")?,
        maker: row.get("maker"),
        checker: row.get("checker"),
        remarks: row.get("remarks"),
        idempotency_key: row.get("idempotency_key"),
        created_at: row.get("created_at"),
        decided_at: row.get("decided_at"),
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry> {
    let entity_type: String = row.get("entity_type");
    let entity_type = match entity_type.as_str() {
        "RULE_FIELD" => AuditEntityType::RuleField,
        "RULE_FIELD_METADATA" => AuditEntityType::RuleFieldMetadata,
        "RULE" => AuditEntityType::Rule,
        "RULE_VERSION" => AuditEntityType::RuleVersion,
        "RULESET" => AuditEntityType::Ruleset,
        "RULESET_VERSION" => AuditEntityType::RulesetVersion,
        "APPROVAL" => AuditEntityType::Approval,
        "FIELD_VERSION" => AuditEntityType::FieldVersion,
        "FIELD_REGISTRY_MANIFEST" => AuditEntityType::FieldRegistryManifest,
        other => {
            return Err(Error::integrity(
                "unrecognized audit entity type in database",
                json!({ "value": other }),
            ))
        }
    };
    Ok(AuditEntry {
        audit_id: row.get("audit_id"),
        entity_type,
        entity_id: row.get("entity_id"),
        action: row.get("action"),
        old_value: row.get("old_value"),
        new_value: row.get("new_value"),
        performed_by: row.get("performed_by"),
        performed_at: row.get("performed_at"),
    })
}

fn manifest_from_row(row: &PgRow) -> Result<RulesetManifest> {
    Ok(RulesetManifest {
        manifest_id: row.get("manifest_id"),
        environment: row.get("environment"),
        region: row.get("region"),
        country: row.get("country"),
        rule_type: parse_enum(row.get("rule_type"), RuleType::parse, "rule type")?,
        ruleset_version: row.get("ruleset_version"),
        ruleset_version_id: row.get("ruleset_version_id"),
        field_registry_version: row.get("field_registry_version"),
        artifact_uri: row.get("artifact_uri"),
        checksum: row.get("checksum"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    })
}

// ---- shared query helpers

async fn insert_audit(
    conn: &mut PgConnection,
    ids: &IdGenerator,
    entity_type: AuditEntityType,
    entity_id: Uuid,
    action: &str,
    old_value: Option<Value>,
    new_value: Option<Value>,
    by: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log
            (audit_id, entity_type, entity_id, action, old_value, new_value,
             performed_by, performed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        "#,
    )
    .bind(ids.next())
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(action)
    .bind(old_value)
    .bind(new_value)
    .bind(by)
    .execute(conn)
    .await?;
    Ok(())
}

async fn load_catalog(conn: &mut PgConnection) -> Result<FieldCatalog> {
    let rows = sqlx::query(
        r#"
        SELECT fv.field_key, fv.field_id, fv.data_type, fv.allowed_operators,
               fv.multi_value_allowed, fv.is_sensitive
        FROM rule_field_versions fv
        JOIN rule_fields f ON f.field_key = fv.field_key
        WHERE fv.status = 'APPROVED'
          AND f.is_active
          AND fv.version = (
              SELECT MAX(v2.version) FROM rule_field_versions v2
              WHERE v2.field_key = fv.field_key AND v2.status = 'APPROVED'
          )
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let enum_rows = sqlx::query(
        r#"
        SELECT field_key, meta_value FROM rule_field_metadata
        WHERE meta_key = 'enum_values'
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut enum_values: std::collections::HashMap<String, std::collections::HashSet<String>> =
        std::collections::HashMap::new();
    for row in &enum_rows {
        let field_key: String = row.get("field_key");
        let value: Value = row.get("meta_value");
        if let Some(items) = value.as_array() {
            enum_values.insert(
                field_key,
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            );
        }
    }

    let mut catalog = FieldCatalog::new();
    for row in &rows {
        let field_key: String = row.get("field_key");
        catalog.insert(
            field_key.clone(),
            FieldMeta {
                field_id: row.get("field_id"),
                data_type: parse_enum(row.get("data_type"), DataType::parse, "data type")?,
                allowed_operators: parse_operators(row.get("allowed_operators"))?
                    .into_iter()
                    .collect(),
                multi_value_allowed: row.get("multi_value_allowed"),
                is_sensitive: row.get("is_sensitive"),
                is_active: true,
                enum_values: enum_values.remove(&field_key),
            },
        );
    }
    Ok(catalog)
}

async fn load_members(
    conn: &mut PgConnection,
    ruleset_version_id: Uuid,
) -> Result<Vec<(RuleVersion, Rule)>> {
    let rows = sqlx::query(
        r#"
        SELECT rv.rule_version_id, rv.rule_id, rv.version, rv.condition_tree, rv.scope,
               rv.priority, rv.action, rv.status, rv.created_by, rv.created_at,
               rv.approved_by, rv.approved_at,
               r.rule_id AS r_rule_id, r.rule_name, r.description, r.rule_type,
               r.status AS r_status, r.current_version, r.row_version,
               r.created_by AS r_created_by, r.created_at AS r_created_at,
               r.updated_at AS r_updated_at
        FROM ruleset_version_rules m
        JOIN rule_versions rv ON rv.rule_version_id = m.rule_version_id
        JOIN rules r ON r.rule_id = rv.rule_id
        WHERE m.ruleset_version_id = $1
        "#,
    )
    .bind(ruleset_version_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let rule_version = rule_version_from_row(row)?;
            let rule = Rule {
                rule_id: row.get("r_rule_id"),
                rule_name: row.get("rule_name"),
                description: row.get("description"),
                rule_type: parse_enum(row.get("rule_type"), RuleType::parse, "rule type")?,
                status: parse_enum(row.get("r_status"), EntityStatus::parse, "status")?,
                current_version: row.get("current_version"),
                row_version: row.get("row_version"),
                created_by: row.get("r_created_by"),
                created_at: row.get("r_created_at"),
                updated_at: row.get("r_updated_at"),
            };
            Ok((rule_version, rule))
        })
        .collect()
}

async fn pending_approval_for(
    conn: &mut PgConnection,
    entity_id: Uuid,
) -> Result<Option<Approval>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM approvals
        WHERE entity_id = $1 AND status = 'PENDING'
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(entity_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(approval_from_row).transpose()
}

async fn idempotent_replay(
    conn: &mut PgConnection,
    entity_type: ApprovalEntityType,
    entity_id: Uuid,
    idempotency_key: Option<&str>,
) -> Result<Option<Approval>> {
    let Some(key) = idempotency_key else {
        return Ok(None);
    };
    let row = sqlx::query(
        r#"
        SELECT * FROM approvals
        WHERE entity_type = $1 AND entity_id = $2 AND idempotency_key = $3
        "#,
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(approval_from_row).transpose()
}

async fn decide_approval(
    conn: &mut PgConnection,
    approval_id: Uuid,
    action: ApprovalAction,
    status: ApprovalStatus,
    checker: &str,
    remarks: Option<&str>,
    decided_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE approvals
        SET action = $2, status = $3, checker = $4,
            remarks = COALESCE($5, remarks), decided_at = $6
        WHERE approval_id = $1
        "#,
    )
    .bind(approval_id)
    .bind(action.as_str())
    .bind(status.as_str())
    .bind(checker)
    .bind(remarks)
    .bind(decided_at)
    .execute(conn)
    .await?;
    Ok(())
}

fn cursor_binds(cursor: &Option<Cursor>) -> (Option<DateTime<Utc>>, Option<Uuid>) {
    match cursor {
        Some(c) => (Some(c.created_at), Some(c.id)),
        None => (None, None),
    }
}

fn not_found(what: &str, key: &str, value: impl ToString) -> Error {
    Error::not_found(format!("{what} not found"), json!({ key: value.to_string() }))
}

#[async_trait]
impl Store for PgStore {
    // ---- field catalog (C4)

    async fn create_field(&self, draft: FieldDraft, by: &str) -> Result<RuleField> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rule_fields WHERE field_key = $1)")
                .bind(&draft.field_key)
                .fetch_one(&mut *tx)
                .await?;
        if exists {
            return Err(Error::conflict(
                "field key already exists",
                json!({ "field_key": draft.field_key }),
            ));
        }

        let max_id: Option<i32> = sqlx::query_scalar("SELECT MAX(field_id) FROM rule_fields")
            .fetch_one(&mut *tx)
            .await?;
        let field_id = max_id.unwrap_or(0).max(STANDARD_FIELD_MAX_ID) + 1;
        let operators: Vec<String> = draft
            .allowed_operators
            .iter()
            .map(|o| o.as_str().to_string())
            .collect();

        let row = sqlx::query(
            r#"
            INSERT INTO rule_fields
                (field_key, field_id, display_name, description, data_type,
                 allowed_operators, multi_value_allowed, is_sensitive, is_active,
                 current_version, row_version, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, 1, 1, $9, now(), now())
            RETURNING *
            "#,
        )
        .bind(&draft.field_key)
        .bind(field_id)
        .bind(&draft.display_name)
        .bind(&draft.description)
        .bind(draft.data_type.as_str())
        .bind(&operators)
        .bind(draft.multi_value_allowed)
        .bind(draft.is_sensitive)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;
        let field = field_from_row(&row)?;

        let version_id = self.ids.next();
        sqlx::query(
            r#"
            INSERT INTO rule_field_versions
                (field_version_id, field_key, version, field_id, display_name,
                 description, data_type, allowed_operators, multi_value_allowed,
                 is_sensitive, status, created_by, created_at)
            VALUES ($1, $2, 1, $3, $4, $5, $6, $7, $8, $9, 'DRAFT', $10, now())
            "#,
        )
        .bind(version_id)
        .bind(&draft.field_key)
        .bind(field_id)
        .bind(&draft.display_name)
        .bind(&draft.description)
        .bind(draft.data_type.as_str())
        .bind(&operators)
        .bind(draft.multi_value_allowed)
        .bind(draft.is_sensitive)
        .bind(by)
        .execute(&mut *tx)
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RuleField,
            version_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&field).unwrap_or(Value::Null)),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(field)
    }

    async fn revise_field(
        &self,
        field_key: &str,
        draft: FieldDraft,
        expected_row_version: Option<i32>,
        by: &str,
    ) -> Result<RuleFieldVersion> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM rule_fields WHERE field_key = $1 FOR UPDATE")
            .bind(field_key)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("field", "field_key", field_key))?;
        let field = field_from_row(&row)?;

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

        let next_version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM rule_field_versions WHERE field_key = $1",
        )
        .bind(field_key)
        .fetch_one(&mut *tx)
        .await?;

        let operators: Vec<String> = draft
            .allowed_operators
            .iter()
            .map(|o| o.as_str().to_string())
            .collect();
        let version_id = self.ids.next();
        let row = sqlx::query(
            r#"
            INSERT INTO rule_field_versions
                (field_version_id, field_key, version, field_id, display_name,
                 description, data_type, allowed_operators, multi_value_allowed,
                 is_sensitive, status, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'DRAFT', $11, now())
            RETURNING *
            "#,
        )
        .bind(version_id)
        .bind(field_key)
        .bind(next_version)
        .bind(field.field_id)
        .bind(&draft.display_name)
        .bind(&draft.description)
        .bind(draft.data_type.as_str())
        .bind(&operators)
        .bind(draft.multi_value_allowed)
        .bind(draft.is_sensitive)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;
        let version = field_version_from_row(&row)?;

        sqlx::query(
            "UPDATE rule_fields SET row_version = row_version + 1, updated_at = now() WHERE field_key = $1",
        )
        .bind(field_key)
        .execute(&mut *tx)
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::FieldVersion,
            version_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&version).unwrap_or(Value::Null)),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn get_field(&self, field_key: &str) -> Result<RuleField> {
        let row = sqlx::query("SELECT * FROM rule_fields WHERE field_key = $1")
            .bind(field_key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("field", "field_key", field_key))?;
        field_from_row(&row)
    }

    async fn list_fields(&self, page: PageRequest) -> Result<Page<RuleField>> {
        let limit = page.effective_limit(DEFAULT_LIMIT, MAX_LIMIT)?;
        let cursor = page.decoded_cursor()?;
        let is_first_page = cursor.is_none();
        let (c_at, c_id) = cursor_binds(&cursor);

        // Field identities have an integer primary id; the wire cursor
        // carries it as a synthesized uuid, unpacked here for SQL.
        let c_field_id = c_id.map(|u| u.as_u128() as i32);
        let sql = match page.direction {
            Direction::Next => {
                r#"
                SELECT * FROM rule_fields
                WHERE ($1::timestamptz IS NULL OR (created_at, field_id) < ($1, $2))
                ORDER BY created_at DESC, field_id DESC
                LIMIT $3
                "#
            }
            Direction::Prev => {
                r#"
                SELECT * FROM rule_fields
                WHERE ($1::timestamptz IS NULL OR (created_at, field_id) > ($1, $2))
                ORDER BY created_at ASC, field_id ASC
                LIMIT $3
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(c_at)
            .bind(c_field_id)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<RuleField> = rows.iter().map(field_from_row).collect::<Result<_>>()?;
        Ok(build_page(items, limit, page.direction, is_first_page, |f| {
            (Uuid::from_u128(f.field_id as u128), f.created_at)
        }))
    }

    async fn upsert_field_metadata(
        &self,
        field_key: &str,
        meta_key: &str,
        meta_value: Value,
        description: Option<String>,
        by: &str,
    ) -> Result<RuleFieldMetadata> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rule_fields WHERE field_key = $1)")
                .bind(field_key)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(not_found("field", "field_key", field_key));
        }

        let old: Option<Value> = sqlx::query_scalar(
            "SELECT meta_value FROM rule_field_metadata WHERE field_key = $1 AND meta_key = $2",
        )
        .bind(field_key)
        .bind(meta_key)
        .fetch_optional(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO rule_field_metadata
                (field_key, meta_key, meta_value, description, created_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (field_key, meta_key)
            DO UPDATE SET meta_value = EXCLUDED.meta_value,
                          description = EXCLUDED.description
            RETURNING *
            "#,
        )
        .bind(field_key)
        .bind(meta_key)
        .bind(&meta_value)
        .bind(&description)
        .fetch_one(&mut *tx)
        .await?;

        let metadata = RuleFieldMetadata {
            field_key: row.get("field_key"),
            meta_key: row.get("meta_key"),
            meta_value: row.get("meta_value"),
            description: row.get("description"),
            created_at: row.get("created_at"),
        };

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RuleFieldMetadata,
            Uuid::nil(),
            "UPSERT",
            old.map(|v| json!({ "meta_value": v })),
            Some(json!({ "meta_key": meta_key, "meta_value": metadata.meta_value })),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(metadata)
    }

    async fn field_metadata(&self, field_key: &str) -> Result<Vec<RuleFieldMetadata>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rule_fields WHERE field_key = $1)")
                .bind(field_key)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(not_found("field", "field_key", field_key));
        }

        let rows = sqlx::query(
            "SELECT * FROM rule_field_metadata WHERE field_key = $1 ORDER BY meta_key",
        )
        .bind(field_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RuleFieldMetadata {
                field_key: row.get("field_key"),
                meta_key: row.get("meta_key"),
                meta_value: row.get("meta_value"),
                description: row.get("description"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn active_catalog(&self) -> Result<FieldCatalog> {
        let mut conn = self.pool.acquire().await?;
        load_catalog(&mut conn).await
    }

    async fn next_field_id(&self) -> Result<i32> {
        let max_id: Option<i32> = sqlx::query_scalar("SELECT MAX(field_id) FROM rule_fields")
            .fetch_one(&self.pool)
            .await?;
        Ok(max_id.unwrap_or(0).max(STANDARD_FIELD_MAX_ID) + 1)
    }

    async fn get_field_version(&self, field_version_id: Uuid) -> Result<RuleFieldVersion> {
        let row = sqlx::query("SELECT * FROM rule_field_versions WHERE field_version_id = $1")
            .bind(field_version_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;
        field_version_from_row(&row)
    }

    async fn submit_field_version(
        &self,
        field_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RuleFieldVersion, Approval)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT * FROM rule_field_versions WHERE field_version_id = $1 FOR UPDATE",
        )
        .bind(field_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;
        let version = field_version_from_row(&row)?;

        if let Some(existing) = idempotent_replay(
            &mut tx,
            ApprovalEntityType::FieldVersion,
            field_version_id,
            idempotency_key.as_deref(),
        )
        .await?
        {
            return Ok((version, existing));
        }

        ensure_submittable(version.status)?;
        sqlx::query(
            "UPDATE rule_field_versions SET status = 'PENDING_APPROVAL' WHERE field_version_id = $1",
        )
        .bind(field_version_id)
        .execute(&mut *tx)
        .await?;

        let approval_row = sqlx::query(
            r#"
            INSERT INTO approvals
                (approval_id, entity_type, entity_id, action, status, maker,
                 remarks, idempotency_key, created_at)
            VALUES ($1, 'FIELD_VERSION', $2, 'SUBMIT', 'PENDING', $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(field_version_id)
        .bind(maker)
        .bind(&remarks)
        .bind(&idempotency_key)
        .fetch_one(&mut *tx)
        .await?;
        let approval = approval_from_row(&approval_row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::FieldVersion,
            field_version_id,
            "SUBMIT",
            Some(json!({ "status": version.status.as_str() })),
            Some(json!({ "status": "PENDING_APPROVAL" })),
            maker,
        )
        .await?;

        tx.commit().await?;
        let mut updated = version;
        updated.status = EntityStatus::PendingApproval;
        Ok((updated, approval))
    }

    async fn approve_field_version(
        &self,
        field_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleFieldVersion> {
        let mut tx = self.pool.begin().await?;

        let approval = pending_approval_for(&mut tx, field_version_id)
            .await?
            .ok_or_else(|| not_found("pending approval", "field_version_id", field_version_id))?;
        check_maker_not_checker(&approval.maker, checker)?;

        let row = sqlx::query(
            "SELECT * FROM rule_field_versions WHERE field_version_id = $1 FOR UPDATE",
        )
        .bind(field_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;
        let version = field_version_from_row(&row)?;
        ensure_pending(version.status)?;

        // Lock the identity row to serialize concurrent approvals.
        sqlx::query("SELECT 1 FROM rule_fields WHERE field_key = $1 FOR UPDATE")
            .bind(&version.field_key)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE rule_field_versions SET status = 'SUPERSEDED'
            WHERE field_key = $1 AND status = 'APPROVED'
            "#,
        )
        .bind(&version.field_key)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            UPDATE rule_field_versions
            SET status = 'APPROVED', approved_by = $2, approved_at = $3
            WHERE field_version_id = $1
            RETURNING *
            "#,
        )
        .bind(field_version_id)
        .bind(checker)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let approved = field_version_from_row(&row)?;

        let operators: Vec<String> = approved
            .allowed_operators
            .iter()
            .map(|o| o.as_str().to_string())
            .collect();
        sqlx::query(
            r#"
            UPDATE rule_fields
            SET display_name = $2, description = $3, data_type = $4,
                allowed_operators = $5, multi_value_allowed = $6, is_sensitive = $7,
                current_version = $8, row_version = row_version + 1, updated_at = $9
            WHERE field_key = $1
            "#,
        )
        .bind(&approved.field_key)
        .bind(&approved.display_name)
        .bind(&approved.description)
        .bind(approved.data_type.as_str())
        .bind(&operators)
        .bind(approved.multi_value_allowed)
        .bind(approved.is_sensitive)
        .bind(approved.version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        decide_approval(
            &mut tx,
            approval.approval_id,
            ApprovalAction::Approve,
            ApprovalStatus::Approved,
            checker,
            remarks.as_deref(),
            now,
        )
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::FieldVersion,
            field_version_id,
            "APPROVE",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "APPROVED", "approved_by": checker })),
            checker,
        )
        .await?;

        tx.commit().await?;
        Ok(approved)
    }

    async fn reject_field_version(
        &self,
        field_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleFieldVersion> {
        let mut tx = self.pool.begin().await?;

        let approval = pending_approval_for(&mut tx, field_version_id)
            .await?
            .ok_or_else(|| not_found("pending approval", "field_version_id", field_version_id))?;
        check_maker_not_checker(&approval.maker, checker)?;

        let row = sqlx::query(
            "SELECT * FROM rule_field_versions WHERE field_version_id = $1 FOR UPDATE",
        )
        .bind(field_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("field version", "field_version_id", field_version_id))?;
        let version = field_version_from_row(&row)?;
        ensure_pending(version.status)?;

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE rule_field_versions SET status = 'REJECTED'
            WHERE field_version_id = $1
            RETURNING *
            "#,
        )
        .bind(field_version_id)
        .fetch_one(&mut *tx)
        .await?;
        let rejected = field_version_from_row(&row)?;

        decide_approval(
            &mut tx,
            approval.approval_id,
            ApprovalAction::Reject,
            ApprovalStatus::Rejected,
            checker,
            remarks.as_deref(),
            now,
        )
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::FieldVersion,
            field_version_id,
            "REJECT",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "REJECTED" })),
            checker,
        )
        .await?;

        tx.commit().await?;
        Ok(rejected)
    }

    async fn approved_field_versions(&self) -> Result<Vec<RuleFieldVersion>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM rule_field_versions fv
            WHERE fv.status = 'APPROVED'
              AND fv.version = (
                  SELECT MAX(v2.version) FROM rule_field_versions v2
                  WHERE v2.field_key = fv.field_key AND v2.status = 'APPROVED'
              )
            ORDER BY fv.field_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(field_version_from_row).collect()
    }

    async fn latest_registry_version(&self) -> Result<Option<i32>> {
        let version: Option<i32> =
            sqlx::query_scalar("SELECT MAX(registry_version) FROM field_registry_manifest")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    async fn insert_registry_manifest(
        &self,
        manifest: FieldRegistryManifest,
    ) -> Result<FieldRegistryManifest> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO field_registry_manifest
                (manifest_id, registry_version, artifact_uri, checksum, field_count,
                 created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(manifest.manifest_id)
        .bind(manifest.registry_version)
        .bind(&manifest.artifact_uri)
        .bind(&manifest.checksum)
        .bind(manifest.field_count)
        .bind(&manifest.created_by)
        .bind(manifest.created_at)
        .execute(&mut *tx)
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::FieldRegistryManifest,
            manifest.manifest_id,
            "PUBLISH",
            None,
            Some(serde_json::to_value(&manifest).unwrap_or(Value::Null)),
            &manifest.created_by,
        )
        .await?;

        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO rules
                (rule_id, rule_name, description, rule_type, status, current_version,
                 row_version, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'DRAFT', 1, 1, $5, now(), now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(rule_name)
        .bind(&description)
        .bind(rule_type.as_str())
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;
        let rule = rule_from_row(&row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::Rule,
            rule.rule_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&rule).unwrap_or(Value::Null)),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(rule)
    }

    async fn get_rule(&self, rule_id: Uuid) -> Result<Rule> {
        let row = sqlx::query("SELECT * FROM rules WHERE rule_id = $1")
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("rule", "rule_id", rule_id))?;
        rule_from_row(&row)
    }

    async fn list_rules(&self, page: PageRequest) -> Result<Page<Rule>> {
        let limit = page.effective_limit(DEFAULT_LIMIT, MAX_LIMIT)?;
        let cursor = page.decoded_cursor()?;
        let is_first_page = cursor.is_none();
        let (c_at, c_id) = cursor_binds(&cursor);

        let sql = match page.direction {
            Direction::Next => {
                r#"
                SELECT * FROM rules
                WHERE ($1::timestamptz IS NULL OR (created_at, rule_id) < ($1, $2))
                ORDER BY created_at DESC, rule_id DESC
                LIMIT $3
                "#
            }
            Direction::Prev => {
                r#"
                SELECT * FROM rules
                WHERE ($1::timestamptz IS NULL OR (created_at, rule_id) > ($1, $2))
                ORDER BY created_at ASC, rule_id ASC
                LIMIT $3
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(c_at)
            .bind(c_id)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<Rule> = rows.iter().map(rule_from_row).collect::<Result<_>>()?;
        Ok(build_page(items, limit, page.direction, is_first_page, |r| {
            (r.rule_id, r.created_at)
        }))
    }

    async fn create_rule_version(
        &self,
        rule_id: Uuid,
        draft: RuleVersionDraft,
        by: &str,
    ) -> Result<RuleVersion> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM rules WHERE rule_id = $1 FOR UPDATE")
            .bind(rule_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("rule", "rule_id", rule_id))?;
        let rule = rule_from_row(&row)?;

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

        let action = draft.action.unwrap_or_else(|| rule.rule_type.default_action());
        if !rule.rule_type.allowed_actions().contains(&action) {
            return Err(Error::conflict(
                format!("{} rules cannot carry action {}", rule.rule_type, action),
                json!({
                    "rule_type": rule.rule_type.as_str(),
                    "action": action.as_str(),
                }),
            ));
        }

        let catalog = load_catalog(&mut tx).await?;
        let tree = compiler::parse_and_validate(&draft.condition_tree, &catalog)?;

        // Version numbers are assigned under the identity row lock.
        let next_version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM rule_versions WHERE rule_id = $1",
        )
        .bind(rule_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO rule_versions
                (rule_version_id, rule_id, version, condition_tree, scope, priority,
                 action, status, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'DRAFT', $8, now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(rule_id)
        .bind(next_version)
        .bind(tree.to_value())
        .bind(&draft.scope)
        .bind(draft.priority)
        .bind(action.as_str())
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;
        let version = rule_version_from_row(&row)?;

        sqlx::query(
            r#"
            UPDATE rules
            SET current_version = $2, row_version = row_version + 1, updated_at = now()
            WHERE rule_id = $1
            "#,
        )
        .bind(rule_id)
        .bind(next_version)
        .execute(&mut *tx)
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RuleVersion,
            version.rule_version_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&version).unwrap_or(Value::Null)),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn get_rule_version(&self, rule_version_id: Uuid) -> Result<RuleVersion> {
        let row = sqlx::query("SELECT * FROM rule_versions WHERE rule_version_id = $1")
            .bind(rule_version_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;
        rule_version_from_row(&row)
    }

    async fn list_rule_versions(&self, rule_id: Uuid) -> Result<Vec<RuleVersion>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rules WHERE rule_id = $1)")
                .bind(rule_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(not_found("rule", "rule_id", rule_id));
        }

        let rows = sqlx::query(
            "SELECT * FROM rule_versions WHERE rule_id = $1 ORDER BY version DESC",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rule_version_from_row).collect()
    }

    async fn submit_rule_version(
        &self,
        rule_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RuleVersion, Approval)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM rule_versions WHERE rule_version_id = $1 FOR UPDATE")
            .bind(rule_version_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;
        let version = rule_version_from_row(&row)?;

        if let Some(existing) = idempotent_replay(
            &mut tx,
            ApprovalEntityType::RuleVersion,
            rule_version_id,
            idempotency_key.as_deref(),
        )
        .await?
        {
            return Ok((version, existing));
        }

        ensure_submittable(version.status)?;
        sqlx::query(
            "UPDATE rule_versions SET status = 'PENDING_APPROVAL' WHERE rule_version_id = $1",
        )
        .bind(rule_version_id)
        .execute(&mut *tx)
        .await?;

        let approval_row = sqlx::query(
            r#"
            INSERT INTO approvals
                (approval_id, entity_type, entity_id, action, status, maker,
                 remarks, idempotency_key, created_at)
            VALUES ($1, 'RULE_VERSION', $2, 'SUBMIT', 'PENDING', $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(rule_version_id)
        .bind(maker)
        .bind(&remarks)
        .bind(&idempotency_key)
        .fetch_one(&mut *tx)
        .await?;
        let approval = approval_from_row(&approval_row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RuleVersion,
            rule_version_id,
            "SUBMIT",
            Some(json!({ "status": version.status.as_str() })),
            Some(json!({ "status": "PENDING_APPROVAL" })),
            maker,
        )
        .await?;

        tx.commit().await?;
        let mut updated = version;
        updated.status = EntityStatus::PendingApproval;
        Ok((updated, approval))
    }

    async fn approve_rule_version(
        &self,
        rule_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleVersion> {
        let mut tx = self.pool.begin().await?;

        let approval = pending_approval_for(&mut tx, rule_version_id)
            .await?
            .ok_or_else(|| not_found("pending approval", "rule_version_id", rule_version_id))?;
        check_maker_not_checker(&approval.maker, checker)?;

        let row = sqlx::query("SELECT * FROM rule_versions WHERE rule_version_id = $1 FOR UPDATE")
            .bind(rule_version_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;
        let version = rule_version_from_row(&row)?;
        ensure_pending(version.status)?;

        sqlx::query("SELECT 1 FROM rules WHERE rule_id = $1 FOR UPDATE")
            .bind(version.rule_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE rule_versions SET status = 'SUPERSEDED' WHERE rule_id = $1 AND status = 'APPROVED'",
        )
        .bind(version.rule_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            UPDATE rule_versions
            SET status = 'APPROVED', approved_by = $2, approved_at = $3
            WHERE rule_version_id = $1
            RETURNING *
            "#,
        )
        .bind(rule_version_id)
        .bind(checker)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let approved = rule_version_from_row(&row)?;

        sqlx::query(
            r#"
            UPDATE rules
            SET status = 'APPROVED', current_version = $2,
                row_version = row_version + 1, updated_at = $3
            WHERE rule_id = $1
            "#,
        )
        .bind(version.rule_id)
        .bind(approved.version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        decide_approval(
            &mut tx,
            approval.approval_id,
            ApprovalAction::Approve,
            ApprovalStatus::Approved,
            checker,
            remarks.as_deref(),
            now,
        )
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RuleVersion,
            rule_version_id,
            "APPROVE",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "APPROVED", "approved_by": checker })),
            checker,
        )
        .await?;

        tx.commit().await?;
        Ok(approved)
    }

    async fn reject_rule_version(
        &self,
        rule_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RuleVersion> {
        let mut tx = self.pool.begin().await?;

        let approval = pending_approval_for(&mut tx, rule_version_id)
            .await?
            .ok_or_else(|| not_found("pending approval", "rule_version_id", rule_version_id))?;
        check_maker_not_checker(&approval.maker, checker)?;

        let row = sqlx::query("SELECT * FROM rule_versions WHERE rule_version_id = $1 FOR UPDATE")
            .bind(rule_version_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("rule version", "rule_version_id", rule_version_id))?;
        let version = rule_version_from_row(&row)?;
        ensure_pending(version.status)?;

        let now = Utc::now();
        let row = sqlx::query(
            "UPDATE rule_versions SET status = 'REJECTED' WHERE rule_version_id = $1 RETURNING *",
        )
        .bind(rule_version_id)
        .fetch_one(&mut *tx)
        .await?;
        let rejected = rule_version_from_row(&row)?;

        decide_approval(
            &mut tx,
            approval.approval_id,
            ApprovalAction::Reject,
            ApprovalStatus::Rejected,
            checker,
            remarks.as_deref(),
            now,
        )
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RuleVersion,
            rule_version_id,
            "REJECT",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "REJECTED" })),
            checker,
        )
        .await?;

        tx.commit().await?;
        Ok(rejected)
    }

    // ---- rulesets (C6)

    async fn create_ruleset(
        &self,
        scope: RulesetScope,
        name: Option<String>,
        description: Option<String>,
        by: &str,
    ) -> Result<Ruleset> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            r#"
            SELECT ruleset_id FROM rulesets
            WHERE environment = $1 AND region = $2 AND country = $3 AND rule_type = $4
            "#,
        )
        .bind(&scope.environment)
        .bind(&scope.region)
        .bind(&scope.country)
        .bind(scope.rule_type.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            let existing_id: Uuid = row.get("ruleset_id");
            return Err(Error::conflict(
                "ruleset already exists for this scope",
                json!({
                    "ruleset_id": existing_id,
                    "environment": scope.environment,
                    "region": scope.region,
                    "country": scope.country,
                    "rule_type": scope.rule_type.as_str(),
                }),
            ));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO rulesets
                (ruleset_id, environment, region, country, rule_type, name,
                 description, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(&scope.environment)
        .bind(&scope.region)
        .bind(&scope.country)
        .bind(scope.rule_type.as_str())
        .bind(&name)
        .bind(&description)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;
        let ruleset = ruleset_from_row(&row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::Ruleset,
            ruleset.ruleset_id,
            "CREATE",
            None,
            Some(serde_json::to_value(&ruleset).unwrap_or(Value::Null)),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(ruleset)
    }

    async fn update_ruleset(
        &self,
        ruleset_id: Uuid,
        name: Option<String>,
        description: Option<String>,
        by: &str,
    ) -> Result<Ruleset> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM rulesets WHERE ruleset_id = $1 FOR UPDATE")
            .bind(ruleset_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("ruleset", "ruleset_id", ruleset_id))?;
        let old = ruleset_from_row(&row)?;

        let row = sqlx::query(
            r#"
            UPDATE rulesets
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = now()
            WHERE ruleset_id = $1
            RETURNING *
            "#,
        )
        .bind(ruleset_id)
        .bind(&name)
        .bind(&description)
        .fetch_one(&mut *tx)
        .await?;
        let updated = ruleset_from_row(&row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::Ruleset,
            ruleset_id,
            "UPDATE",
            Some(json!({ "name": old.name, "description": old.description })),
            Some(json!({ "name": updated.name, "description": updated.description })),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn get_ruleset(&self, ruleset_id: Uuid) -> Result<Ruleset> {
        let row = sqlx::query("SELECT * FROM rulesets WHERE ruleset_id = $1")
            .bind(ruleset_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("ruleset", "ruleset_id", ruleset_id))?;
        ruleset_from_row(&row)
    }

    async fn find_ruleset_by_scope(&self, scope: &RulesetScope) -> Result<Option<Ruleset>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM rulesets
            WHERE environment = $1 AND region = $2 AND country = $3 AND rule_type = $4
            "#,
        )
        .bind(&scope.environment)
        .bind(&scope.region)
        .bind(&scope.country)
        .bind(scope.rule_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(ruleset_from_row).transpose()
    }

    async fn list_rulesets(
        &self,
        filter: RulesetFilter,
        page: PageRequest,
    ) -> Result<Page<Ruleset>> {
        let limit = page.effective_limit(DEFAULT_LIMIT, MAX_LIMIT)?;
        let cursor = page.decoded_cursor()?;
        let is_first_page = cursor.is_none();
        let (c_at, c_id) = cursor_binds(&cursor);

        let sql = match page.direction {
            Direction::Next => {
                r#"
                SELECT * FROM rulesets
                WHERE ($1::text IS NULL OR environment = $1)
                  AND ($2::text IS NULL OR region = $2)
                  AND ($3::text IS NULL OR country = $3)
                  AND ($4::text IS NULL OR rule_type = $4)
                  AND ($5::timestamptz IS NULL OR (created_at, ruleset_id) < ($5, $6))
                ORDER BY created_at DESC, ruleset_id DESC
                LIMIT $7
                "#
            }
            Direction::Prev => {
                r#"
                SELECT * FROM rulesets
                WHERE ($1::text IS NULL OR environment = $1)
                  AND ($2::text IS NULL OR region = $2)
                  AND ($3::text IS NULL OR country = $3)
                  AND ($4::text IS NULL OR rule_type = $4)
                  AND ($5::timestamptz IS NULL OR (created_at, ruleset_id) > ($5, $6))
                ORDER BY created_at ASC, ruleset_id ASC
                LIMIT $7
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(&filter.environment)
            .bind(&filter.region)
            .bind(&filter.country)
            .bind(filter.rule_type.map(|t| t.as_str()))
            .bind(c_at)
            .bind(c_id)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<Ruleset> = rows.iter().map(ruleset_from_row).collect::<Result<_>>()?;
        Ok(build_page(items, limit, page.direction, is_first_page, |r| {
            (r.ruleset_id, r.created_at)
        }))
    }

    async fn create_ruleset_version(
        &self,
        ruleset_id: Uuid,
        rule_version_ids: &[Uuid],
        by: &str,
    ) -> Result<RulesetVersion> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM rulesets WHERE ruleset_id = $1 FOR UPDATE")
            .bind(ruleset_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("ruleset", "ruleset_id", ruleset_id))?;
        let ruleset = ruleset_from_row(&row)?;

        // Membership insert enforces rule-type consistency.
        for rv_id in rule_version_ids {
            let row = sqlx::query(
                r#"
                SELECT r.rule_type FROM rule_versions rv
                JOIN rules r ON r.rule_id = rv.rule_id
                WHERE rv.rule_version_id = $1
                "#,
            )
            .bind(rv_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("rule version", "rule_version_id", *rv_id))?;
            let rule_type = parse_enum(row.get("rule_type"), RuleType::parse, "rule type")?;
            if rule_type != ruleset.rule_type {
                return Err(Error::validation(
                    "rule type does not match ruleset",
                    json!({
                        "ruleset_id": ruleset_id,
                        "rule_version_id": rv_id,
                        "rule_type": rule_type.as_str(),
                        "ruleset_rule_type": ruleset.rule_type.as_str(),
                    }),
                ));
            }
        }

        // Version numbers are assigned under the identity row lock.
        let next_version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM ruleset_versions WHERE ruleset_id = $1",
        )
        .bind(ruleset_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO ruleset_versions
                (ruleset_version_id, ruleset_id, version, status, created_by, created_at)
            VALUES ($1, $2, $3, 'DRAFT', $4, now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(ruleset_id)
        .bind(next_version)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;
        let version = ruleset_version_from_row(&row)?;

        for rv_id in rule_version_ids {
            sqlx::query(
                r#"
                INSERT INTO ruleset_version_rules
                    (ruleset_version_id, rule_version_id, created_at)
                VALUES ($1, $2, now())
                "#,
            )
            .bind(version.ruleset_version_id)
            .bind(rv_id)
            .execute(&mut *tx)
            .await?;
        }

        insert_audit(
            &mut tx,
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
        )
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn get_ruleset_version(&self, ruleset_version_id: Uuid) -> Result<RulesetVersion> {
        let row = sqlx::query("SELECT * FROM ruleset_versions WHERE ruleset_version_id = $1")
            .bind(ruleset_version_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        ruleset_version_from_row(&row)
    }

    async fn list_ruleset_versions(
        &self,
        ruleset_id: Uuid,
        status: Option<EntityStatus>,
        page: PageRequest,
    ) -> Result<Page<RulesetVersion>> {
        let limit = page.effective_limit(DEFAULT_LIMIT, MAX_LIMIT)?;
        let cursor = page.decoded_cursor()?;
        let is_first_page = cursor.is_none();
        let (c_at, c_id) = cursor_binds(&cursor);

        let sql = match page.direction {
            Direction::Next => {
                r#"
                SELECT * FROM ruleset_versions
                WHERE ruleset_id = $1
                  AND ($2::text IS NULL OR status = $2)
                  AND ($3::timestamptz IS NULL OR (created_at, ruleset_version_id) < ($3, $4))
                ORDER BY created_at DESC, ruleset_version_id DESC
                LIMIT $5
                "#
            }
            Direction::Prev => {
                r#"
                SELECT * FROM ruleset_versions
                WHERE ruleset_id = $1
                  AND ($2::text IS NULL OR status = $2)
                  AND ($3::timestamptz IS NULL OR (created_at, ruleset_version_id) > ($3, $4))
                ORDER BY created_at ASC, ruleset_version_id ASC
                LIMIT $5
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(ruleset_id)
            .bind(status.map(|s| s.as_str()))
            .bind(c_at)
            .bind(c_id)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<RulesetVersion> = rows
            .iter()
            .map(ruleset_version_from_row)
            .collect::<Result<_>>()?;
        Ok(build_page(items, limit, page.direction, is_first_page, |v| {
            (v.ruleset_version_id, v.created_at)
        }))
    }

    async fn ruleset_version_members(
        &self,
        ruleset_version_id: Uuid,
    ) -> Result<Vec<(RuleVersion, Rule)>> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ruleset_versions WHERE ruleset_version_id = $1)",
        )
        .bind(ruleset_version_id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(not_found("ruleset version", "ruleset_version_id", ruleset_version_id));
        }

        let mut conn = self.pool.acquire().await?;
        load_members(&mut conn, ruleset_version_id).await
    }

    async fn submit_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        maker: &str,
        remarks: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<(RulesetVersion, Approval)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT * FROM ruleset_versions WHERE ruleset_version_id = $1 FOR UPDATE",
        )
        .bind(ruleset_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        let version = ruleset_version_from_row(&row)?;

        if let Some(existing) = idempotent_replay(
            &mut tx,
            ApprovalEntityType::RulesetVersion,
            ruleset_version_id,
            idempotency_key.as_deref(),
        )
        .await?
        {
            return Ok((version, existing));
        }

        ensure_submittable(version.status)?;
        sqlx::query(
            "UPDATE ruleset_versions SET status = 'PENDING_APPROVAL' WHERE ruleset_version_id = $1",
        )
        .bind(ruleset_version_id)
        .execute(&mut *tx)
        .await?;

        let approval_row = sqlx::query(
            r#"
            INSERT INTO approvals
                (approval_id, entity_type, entity_id, action, status, maker,
                 remarks, idempotency_key, created_at)
            VALUES ($1, 'RULESET_VERSION', $2, 'SUBMIT', 'PENDING', $3, $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(self.ids.next())
        .bind(ruleset_version_id)
        .bind(maker)
        .bind(&remarks)
        .bind(&idempotency_key)
        .fetch_one(&mut *tx)
        .await?;
        let approval = approval_from_row(&approval_row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "SUBMIT",
            Some(json!({ "status": version.status.as_str() })),
            Some(json!({ "status": "PENDING_APPROVAL" })),
            maker,
        )
        .await?;

        tx.commit().await?;
        let mut updated = version;
        updated.status = EntityStatus::PendingApproval;
        Ok((updated, approval))
    }

    async fn approve_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
        publisher: &dyn Publisher,
    ) -> Result<(RulesetVersion, RulesetManifest)> {
        let mut tx = self.pool.begin().await?;

        let approval = pending_approval_for(&mut tx, ruleset_version_id)
            .await?
            .ok_or_else(|| {
                not_found("pending approval", "ruleset_version_id", ruleset_version_id)
            })?;
        check_maker_not_checker(&approval.maker, checker)?;

        let row = sqlx::query(
            "SELECT * FROM ruleset_versions WHERE ruleset_version_id = $1 FOR UPDATE",
        )
        .bind(ruleset_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        let version = ruleset_version_from_row(&row)?;
        ensure_pending(version.status)?;

        let row = sqlx::query("SELECT * FROM rulesets WHERE ruleset_id = $1 FOR UPDATE")
            .bind(version.ruleset_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("ruleset", "ruleset_id", version.ruleset_id))?;
        let ruleset = ruleset_from_row(&row)?;
        let ruleset_key = runtime_ruleset_key(ruleset.rule_type)?;
        let scope = RulesetScope::of(&ruleset);

        let members = load_members(&mut tx, ruleset_version_id).await?;
        let catalog = load_catalog(&mut tx).await?;
        let artifact = compiler::compile(CompileInput {
            ruleset: &ruleset,
            ruleset_version: &version,
            members: &members,
            catalog: &catalog,
        })?;

        // Step (a): immutable artifact before any row changes.
        let artifact_uri = publisher
            .write_artifact(&scope, ruleset_key, version.version, &artifact)
            .await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE ruleset_versions SET status = 'SUPERSEDED'
            WHERE ruleset_id = $1 AND status = 'APPROVED'
              AND ruleset_version_id <> $2
            "#,
        )
        .bind(version.ruleset_id)
        .bind(ruleset_version_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            UPDATE ruleset_versions
            SET status = 'APPROVED', approved_by = $2, approved_at = $3
            WHERE ruleset_version_id = $1
            RETURNING *
            "#,
        )
        .bind(ruleset_version_id)
        .bind(checker)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let approved = ruleset_version_from_row(&row)?;

        decide_approval(
            &mut tx,
            approval.approval_id,
            ApprovalAction::Approve,
            ApprovalStatus::Approved,
            checker,
            remarks.as_deref(),
            now,
        )
        .await?;

        let field_registry_version: Option<i32> =
            sqlx::query_scalar("SELECT MAX(registry_version) FROM field_registry_manifest")
                .fetch_one(&mut *tx)
                .await?;

        // Step (b): the manifest row joins the approval transaction.
        let manifest_id = self.ids.next();
        sqlx::query(
            r#"
            INSERT INTO ruleset_manifest
                (manifest_id, environment, region, country, rule_type, ruleset_version,
                 ruleset_version_id, field_registry_version, artifact_uri, checksum,
                 created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(manifest_id)
        .bind(&scope.environment)
        .bind(&scope.region)
        .bind(&scope.country)
        .bind(scope.rule_type.as_str())
        .bind(version.version)
        .bind(ruleset_version_id)
        .bind(field_registry_version)
        .bind(&artifact_uri)
        .bind(&artifact.checksum)
        .bind(checker)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let manifest = RulesetManifest {
            manifest_id,
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

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "APPROVE",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({
                "status": "APPROVED",
                "approved_by": checker,
                "manifest_id": manifest_id,
                "checksum": artifact.checksum,
            })),
            checker,
        )
        .await?;

        // Step (c): pointer last, still inside the transactional unit; a
        // failure here drops the transaction and rolls the approval back.
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

        tx.commit().await?;
        Ok((approved, manifest))
    }

    async fn reject_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        checker: &str,
        remarks: Option<String>,
    ) -> Result<RulesetVersion> {
        let mut tx = self.pool.begin().await?;

        let approval = pending_approval_for(&mut tx, ruleset_version_id)
            .await?
            .ok_or_else(|| {
                not_found("pending approval", "ruleset_version_id", ruleset_version_id)
            })?;
        check_maker_not_checker(&approval.maker, checker)?;

        let row = sqlx::query(
            "SELECT * FROM ruleset_versions WHERE ruleset_version_id = $1 FOR UPDATE",
        )
        .bind(ruleset_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        let version = ruleset_version_from_row(&row)?;
        ensure_pending(version.status)?;

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE ruleset_versions SET status = 'REJECTED'
            WHERE ruleset_version_id = $1
            RETURNING *
            "#,
        )
        .bind(ruleset_version_id)
        .fetch_one(&mut *tx)
        .await?;
        let rejected = ruleset_version_from_row(&row)?;

        decide_approval(
            &mut tx,
            approval.approval_id,
            ApprovalAction::Reject,
            ApprovalStatus::Rejected,
            checker,
            remarks.as_deref(),
            now,
        )
        .await?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "REJECT",
            Some(json!({ "status": "PENDING_APPROVAL" })),
            Some(json!({ "status": "REJECTED" })),
            checker,
        )
        .await?;

        tx.commit().await?;
        Ok(rejected)
    }

    async fn activate_ruleset_version(
        &self,
        ruleset_version_id: Uuid,
        by: &str,
    ) -> Result<RulesetVersion> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT * FROM ruleset_versions WHERE ruleset_version_id = $1 FOR UPDATE",
        )
        .bind(ruleset_version_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("ruleset version", "ruleset_version_id", ruleset_version_id))?;
        let version = ruleset_version_from_row(&row)?;
        ensure_activatable(version.status)?;

        // Advisory lock per ruleset serializes competing activations.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(version.ruleset_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE ruleset_versions SET status = 'SUPERSEDED'
            WHERE ruleset_id = $1 AND status = 'ACTIVE'
              AND ruleset_version_id <> $2
            "#,
        )
        .bind(version.ruleset_id)
        .bind(ruleset_version_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            UPDATE ruleset_versions
            SET status = 'ACTIVE', activated_at = $2
            WHERE ruleset_version_id = $1
            RETURNING *
            "#,
        )
        .bind(ruleset_version_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let activated = ruleset_version_from_row(&row)?;

        insert_audit(
            &mut tx,
            &self.ids,
            AuditEntityType::RulesetVersion,
            ruleset_version_id,
            "ACTIVATE",
            Some(json!({ "status": "APPROVED" })),
            Some(json!({ "status": "ACTIVE" })),
            by,
        )
        .await?;

        tx.commit().await?;
        Ok(activated)
    }

    async fn list_manifests(&self, scope: &RulesetScope) -> Result<Vec<RulesetManifest>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ruleset_manifest
            WHERE environment = $1 AND region = $2 AND country = $3 AND rule_type = $4
            ORDER BY ruleset_version DESC
            "#,
        )
        .bind(&scope.environment)
        .bind(&scope.region)
        .bind(&scope.country)
        .bind(scope.rule_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(manifest_from_row).collect()
    }

    // ---- approvals + audit (C7, C10)

    async fn list_approvals(
        &self,
        status: Option<ApprovalStatus>,
        entity_type: Option<ApprovalEntityType>,
        page: PageRequest,
    ) -> Result<Page<ApprovalSummary>> {
        let limit = page.effective_limit(DEFAULT_LIMIT, MAX_LIMIT)?;
        let cursor = page.decoded_cursor()?;
        let is_first_page = cursor.is_none();
        let (c_at, c_id) = cursor_binds(&cursor);

        // LEFT JOINs resolve the owning rule/ruleset identity in the
        // same query instead of a lookup per row.
        let sql = match page.direction {
            Direction::Next => {
                r#"
                SELECT a.*, rv.rule_id AS ctx_rule_id, rsv.ruleset_id AS ctx_ruleset_id
                FROM approvals a
                LEFT JOIN rule_versions rv ON a.entity_id = rv.rule_version_id
                LEFT JOIN ruleset_versions rsv ON a.entity_id = rsv.ruleset_version_id
                WHERE ($1::text IS NULL OR a.status = $1)
                  AND ($2::text IS NULL OR a.entity_type = $2)
                  AND ($3::timestamptz IS NULL OR (a.created_at, a.approval_id) < ($3, $4))
                ORDER BY a.created_at DESC, a.approval_id DESC
                LIMIT $5
                "#
            }
            Direction::Prev => {
                r#"
                SELECT a.*, rv.rule_id AS ctx_rule_id, rsv.ruleset_id AS ctx_ruleset_id
                FROM approvals a
                LEFT JOIN rule_versions rv ON a.entity_id = rv.rule_version_id
                LEFT JOIN ruleset_versions rsv ON a.entity_id = rsv.ruleset_version_id
                WHERE ($1::text IS NULL OR a.status = $1)
                  AND ($2::text IS NULL OR a.entity_type = $2)
                  AND ($3::timestamptz IS NULL OR (a.created_at, a.approval_id) > ($3, $4))
                ORDER BY a.created_at ASC, a.approval_id ASC
                LIMIT $5
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(status.map(|s| s.as_str()))
            .bind(entity_type.map(|t| t.as_str()))
            .bind(c_at)
            .bind(c_id)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<ApprovalSummary> = rows
            .iter()
            .map(|row| {
                let approval = approval_from_row(row)?;
                let rule_id: Option<Uuid> = match approval.entity_type {
                    ApprovalEntityType::RuleVersion => row.get("ctx_rule_id"),
                    _ => None,
                };
                let ruleset_id: Option<Uuid> = match approval.entity_type {
                    ApprovalEntityType::RulesetVersion => row.get("ctx_ruleset_id"),
                    _ => None,
                };
                Ok(ApprovalSummary {
                    approval,
                    rule_id,
                    ruleset_id,
                })
            })
            .collect::<Result<_>>()?;
        Ok(build_page(items, limit, page.direction, is_first_page, |s| {
            (s.approval.approval_id, s.approval.created_at)
        }))
    }

    async fn list_audit(
        &self,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditEntry>> {
        let limit = page.effective_limit(AUDIT_DEFAULT_LIMIT, AUDIT_MAX_LIMIT)?;
        let cursor = page.decoded_cursor()?;
        let is_first_page = cursor.is_none();
        let (c_at, c_id) = cursor_binds(&cursor);

        let sql = match page.direction {
            Direction::Next => {
                r#"
                SELECT * FROM audit_log
                WHERE ($1::text IS NULL OR entity_type = $1)
                  AND ($2::uuid IS NULL OR entity_id = $2)
                  AND ($3::text IS NULL OR action = $3)
                  AND ($4::text IS NULL OR performed_by = $4)
                  AND ($5::timestamptz IS NULL OR performed_at >= $5)
                  AND ($6::timestamptz IS NULL OR performed_at <= $6)
                  AND ($7::timestamptz IS NULL OR (performed_at, audit_id) < ($7, $8))
                ORDER BY performed_at DESC, audit_id DESC
                LIMIT $9
                "#
            }
            Direction::Prev => {
                r#"
                SELECT * FROM audit_log
                WHERE ($1::text IS NULL OR entity_type = $1)
                  AND ($2::uuid IS NULL OR entity_id = $2)
                  AND ($3::text IS NULL OR action = $3)
                  AND ($4::text IS NULL OR performed_by = $4)
                  AND ($5::timestamptz IS NULL OR performed_at >= $5)
                  AND ($6::timestamptz IS NULL OR performed_at <= $6)
                  AND ($7::timestamptz IS NULL OR (performed_at, audit_id) > ($7, $8))
                ORDER BY performed_at ASC, audit_id ASC
                LIMIT $9
                "#
            }
        };
        let rows = sqlx::query(sql)
            .bind(filter.entity_type.map(|t| t.as_str()))
            .bind(filter.entity_id)
            .bind(&filter.action)
            .bind(&filter.performed_by)
            .bind(filter.since)
            .bind(filter.until)
            .bind(c_at)
            .bind(c_id)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let items: Vec<AuditEntry> = rows.iter().map(audit_from_row).collect::<Result<_>>()?;
        Ok(build_page(items, limit, page.direction, is_first_page, |e| {
            (e.audit_id, e.performed_at)
        }))
    }
}
