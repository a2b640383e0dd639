use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::compiler::{self, CompileInput};
use crate::domain::audit::AuditFilter;
use crate::domain::field::FieldDraft;
use crate::domain::rule::RuleVersionDraft;
use crate::domain::ruleset::RulesetScope;
use crate::services::{Publisher, RegistryService, RulesetPublisher};
use crate::storage::traits::{RulesetFilter, Store};

use super::principal::Principal;
use super::request::{
    ApprovalListParams, AuditListParams, CreateFieldRequest, CreateRuleRequest,
    CreateRuleVersionRequest, CreateRulesetRequest, CreateRulesetVersionRequest, DecisionRequest,
    PageParams, ReviseFieldRequest, RulesetListParams, SubmitRequest, UpdateRulesetRequest,
    UpsertFieldMetadataRequest,
};
use super::response::{ApiResult, HealthResponse, ReadyResponse};

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<RegistryService>,
    pub publisher: Arc<RulesetPublisher>,
    pub start_time: Instant,
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/v1/fields", get(list_fields).post(create_field))
        .route("/v1/fields/catalog", get(get_catalog))
        .route("/v1/fields/registry/publish", post(publish_registry))
        .route("/v1/fields/:field_key", get(get_field))
        .route("/v1/fields/:field_key/versions", post(revise_field))
        .route(
            "/v1/fields/:field_key/metadata",
            get(get_field_metadata).put(upsert_field_metadata),
        )
        .route("/v1/field-versions/:id/submit", post(submit_field_version))
        .route("/v1/field-versions/:id/approve", post(approve_field_version))
        .route("/v1/field-versions/:id/reject", post(reject_field_version))
        .route("/v1/rules", get(list_rules).post(create_rule))
        .route("/v1/rules/:id", get(get_rule))
        .route(
            "/v1/rules/:id/versions",
            get(list_rule_versions).post(create_rule_version),
        )
        .route("/v1/rule-versions/:id/submit", post(submit_rule_version))
        .route("/v1/rule-versions/:id/approve", post(approve_rule_version))
        .route("/v1/rule-versions/:id/reject", post(reject_rule_version))
        .route("/v1/rulesets", get(list_rulesets).post(create_ruleset))
        .route("/v1/rulesets/:id", get(get_ruleset).patch(update_ruleset))
        .route(
            "/v1/rulesets/:id/versions",
            get(list_ruleset_versions).post(create_ruleset_version),
        )
        .route("/v1/rulesets/:id/manifests", get(list_manifests))
        .route("/v1/ruleset-versions/:id", get(get_ruleset_version))
        .route("/v1/ruleset-versions/:id/artifact", get(compile_preview))
        .route("/v1/ruleset-versions/:id/submit", post(submit_ruleset_version))
        .route("/v1/ruleset-versions/:id/approve", post(approve_ruleset_version))
        .route("/v1/ruleset-versions/:id/reject", post(reject_ruleset_version))
        .route("/v1/ruleset-versions/:id/activate", post(activate_ruleset_version))
        .route("/v1/approvals", get(list_approvals))
        .route("/v1/audit", get(list_audit))
        .with_state(state)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn handle_ready(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let catalog = state.registry.catalog().await?;
    Ok(Json(ReadyResponse {
        ready: !catalog.is_empty(),
        catalog_fields: catalog.len(),
    }))
}

// ---- fields

async fn create_field(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateFieldRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("fields:write")?;
    let field = state
        .store
        .create_field(
            FieldDraft {
                field_key: req.field_key,
                display_name: req.display_name,
                description: req.description,
                data_type: req.data_type,
                allowed_operators: req.allowed_operators,
                multi_value_allowed: req.multi_value_allowed,
                is_sensitive: req.is_sensitive,
            },
            &principal.subject,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(field)))
}

async fn list_fields(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_fields(params.to_request()).await?))
}

async fn get_field(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(field_key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.get_field(&field_key).await?))
}

async fn get_catalog(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.registry.catalog().await?))
}

async fn revise_field(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(field_key): Path<String>,
    Json(req): Json<ReviseFieldRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("fields:write")?;
    let version = state
        .store
        .revise_field(
            &field_key,
            FieldDraft {
                field_key: field_key.clone(),
                display_name: req.display_name,
                description: req.description,
                data_type: req.data_type,
                allowed_operators: req.allowed_operators,
                multi_value_allowed: req.multi_value_allowed,
                is_sensitive: req.is_sensitive,
            },
            req.expected_row_version,
            &principal.subject,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

async fn get_field_metadata(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(field_key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.field_metadata(&field_key).await?))
}

async fn upsert_field_metadata(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(field_key): Path<String>,
    Json(req): Json<UpsertFieldMetadataRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("fields:write")?;
    let row = state
        .store
        .upsert_field_metadata(
            &field_key,
            &req.meta_key,
            req.meta_value,
            req.description,
            &principal.subject,
        )
        .await?;
    state.registry.invalidate();
    Ok(Json(row))
}

async fn submit_field_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:submit")?;
    let (version, approval) = state
        .store
        .submit_field_version(id, &principal.subject, req.remarks, req.idempotency_key)
        .await?;
    Ok(Json(json!({ "version": version, "approval": approval })))
}

async fn approve_field_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:decide")?;
    let version = state
        .store
        .approve_field_version(id, &principal.subject, req.remarks)
        .await?;
    state.registry.invalidate();
    Ok(Json(version))
}

async fn reject_field_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:decide")?;
    let version = state
        .store
        .reject_field_version(id, &principal.subject, req.remarks)
        .await?;
    Ok(Json(version))
}

async fn publish_registry(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    principal.require("fields:publish")?;
    let manifest = state.registry.publish_registry(&principal.subject).await?;
    info!(
        registry_version = manifest.registry_version,
        by = %principal.subject,
        "Field registry published"
    );
    Ok((StatusCode::CREATED, Json(manifest)))
}

// ---- rules

async fn create_rule(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateRuleRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("rules:write")?;
    let rule = state
        .store
        .create_rule(&req.rule_name, req.description, req.rule_type, &principal.subject)
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn list_rules(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_rules(params.to_request()).await?))
}

async fn get_rule(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.get_rule(id).await?))
}

async fn create_rule_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateRuleVersionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("rules:write")?;
    let version = state
        .store
        .create_rule_version(
            id,
            RuleVersionDraft {
                condition_tree: req.condition_tree,
                scope: req.scope,
                priority: req.priority,
                action: req.action,
                expected_rule_row_version: req.expected_rule_row_version,
            },
            &principal.subject,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

async fn list_rule_versions(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_rule_versions(id).await?))
}

async fn submit_rule_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:submit")?;
    let (version, approval) = state
        .store
        .submit_rule_version(id, &principal.subject, req.remarks, req.idempotency_key)
        .await?;
    Ok(Json(json!({ "version": version, "approval": approval })))
}

async fn approve_rule_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:decide")?;
    let version = state
        .store
        .approve_rule_version(id, &principal.subject, req.remarks)
        .await?;
    Ok(Json(version))
}

async fn reject_rule_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:decide")?;
    let version = state
        .store
        .reject_rule_version(id, &principal.subject, req.remarks)
        .await?;
    Ok(Json(version))
}

// ---- rulesets

async fn create_ruleset(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateRulesetRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("rulesets:write")?;
    let ruleset = state
        .store
        .create_ruleset(
            RulesetScope {
                environment: req.environment,
                region: req.region,
                country: req.country,
                rule_type: req.rule_type,
            },
            req.name,
            req.description,
            &principal.subject,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ruleset)))
}

async fn list_rulesets(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(params): Query<RulesetListParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = RulesetFilter {
        environment: params.environment.clone(),
        region: params.region.clone(),
        country: params.country.clone(),
        rule_type: params.rule_type,
    };
    Ok(Json(state.store.list_rulesets(filter, params.page()).await?))
}

async fn get_ruleset(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.get_ruleset(id).await?))
}

async fn update_ruleset(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRulesetRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("rulesets:write")?;
    let ruleset = state
        .store
        .update_ruleset(id, req.name, req.description, &principal.subject)
        .await?;
    Ok(Json(ruleset))
}

async fn create_ruleset_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateRulesetVersionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("rulesets:write")?;
    let version = state
        .store
        .create_ruleset_version(id, &req.rule_version_ids, &principal.subject)
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

async fn list_ruleset_versions(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .store
            .list_ruleset_versions(id, None, params.to_request())
            .await?,
    ))
}

async fn get_ruleset_version(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.get_ruleset_version(id).await?))
}

/// Compile a committed ruleset version without publishing, for
/// governance review of what the runtime would receive.
async fn compile_preview(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let version = state.store.get_ruleset_version(id).await?;
    let ruleset = state.store.get_ruleset(version.ruleset_id).await?;
    let members = state.store.ruleset_version_members(id).await?;
    let catalog = state.registry.catalog().await?;

    let artifact = compiler::compile(CompileInput {
        ruleset: &ruleset,
        ruleset_version: &version,
        members: &members,
        catalog: &catalog,
    })?;
    Ok(Json(json!({
        "ast": artifact.ast,
        "checksum": artifact.checksum,
        "size_bytes": artifact.bytes.len(),
    })))
}

async fn submit_ruleset_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:submit")?;
    let (version, approval) = state
        .store
        .submit_ruleset_version(id, &principal.subject, req.remarks, req.idempotency_key)
        .await?;
    Ok(Json(json!({ "version": version, "approval": approval })))
}

async fn approve_ruleset_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:decide")?;
    let publisher: &dyn Publisher = state.publisher.as_ref();
    let (version, manifest) = state
        .store
        .approve_ruleset_version(id, &principal.subject, req.remarks, publisher)
        .await?;
    info!(
        ruleset_version_id = %id,
        checksum = %manifest.checksum,
        by = %principal.subject,
        "Ruleset version approved and published"
    );
    Ok(Json(json!({ "version": version, "manifest": manifest })))
}

async fn reject_ruleset_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<impl IntoResponse> {
    principal.require("approvals:decide")?;
    let version = state
        .store
        .reject_ruleset_version(id, &principal.subject, req.remarks)
        .await?;
    Ok(Json(version))
}

async fn activate_ruleset_version(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    principal.require("rulesets:activate")?;
    let version = state
        .store
        .activate_ruleset_version(id, &principal.subject)
        .await?;
    Ok(Json(version))
}

async fn list_manifests(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let ruleset = state.store.get_ruleset(id).await?;
    Ok(Json(
        state.store.list_manifests(&RulesetScope::of(&ruleset)).await?,
    ))
}

// ---- approvals + audit

async fn list_approvals(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(params): Query<ApprovalListParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .store
            .list_approvals(params.status, params.entity_type, params.page())
            .await?,
    ))
}

async fn list_audit(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(params): Query<AuditListParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = AuditFilter {
        entity_type: params.entity_type,
        entity_id: params.entity_id,
        action: params.action.clone(),
        performed_by: params.performed_by.clone(),
        since: params.since,
        until: params.until,
    };
    Ok(Json(state.store.list_audit(filter, params.page()).await?))
}
