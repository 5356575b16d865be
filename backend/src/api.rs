use crate::db;
use crate::errors::ApiError;
use crate::ledger;
use crate::membership;
use crate::models::*;
use crate::policy::{require, Caller, Capability, Role};
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use rand::RngCore;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, serde::Deserialize)]
pub struct PageParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl PageParams {
    /// Offsets are capped at `i64::MAX`, the largest value SQLite can bind.
    fn resolve(&self) -> (u64, u64) {
        let offset = self.offset.unwrap_or(0).min(i64::MAX as u64);
        (offset, self.limit.unwrap_or(50).min(500))
    }
}

pub fn router(state: AppState) -> Router {
    let batch_body_limit = DefaultBodyLimit::max(state.config.max_batch_body_bytes);

    let protected_routes = Router::new()
        .route("/api/v1/batches", post(create_batch).layer(batch_body_limit))
        .route("/api/v1/proofs", post(create_proof))
        .route("/api/v1/verify", post(verify_proof))
        .route("/api/v1/members", post(create_member))
        .route("/api/v1/members/:api_key", delete(delete_member))
        .route("/api/v1/events", get(list_events))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/roots", get(list_roots))
        .route("/api/v1/roots/current", get(current_root))
        .route("/api/v1/roots/audit", get(audit_roots))
        .route("/api/v1/roots/:sequence", get(get_root))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Resolve the API key to a [`Caller`]. Capability checks happen in each handler.
async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(provided_key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("request without api key");
        return Err(ApiError::Unauthorized);
    };

    let caller = if provided_key == state.config.admin_api_key {
        Some(Caller { role: Role::Admin, label: "admin".to_string() })
    } else {
        db::find_member(&state.db, provided_key).await?
    };

    let Some(caller) = caller else {
        tracing::warn!("unauthorized access attempt");
        return Err(ApiError::Unauthorized);
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

async fn create_batch(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<BatchCreateRequest>,
) -> Result<Json<BatchCreateResponse>, ApiError> {
    require(&caller, Capability::PublishRoot)?;

    let records = req
        .records
        .iter()
        .map(|r| req.encoding.decode(r))
        .collect::<Result<Vec<_>, _>>()?;

    let resp = ledger::publish_batch(&state, &caller, records).await?;
    Ok(Json(resp))
}

async fn create_proof(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ProofRequest>,
) -> Result<Json<ProofResponse>, ApiError> {
    require(&caller, Capability::IssueProof)?;
    Ok(Json(membership::issue_proof(&state, &caller, req).await?))
}

async fn verify_proof(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    require(&caller, Capability::VerifyMembership)?;
    Ok(Json(membership::verify_membership(&state, &caller, req).await?))
}

async fn current_root(State(state): State<AppState>) -> Result<Json<RootRecord>, ApiError> {
    let Some(record) = db::current_root_record(&state.db).await? else {
        return Err(ApiError::NotFound("no root has been published".to_string()));
    };
    Ok(Json(record))
}

async fn get_root(State(state): State<AppState>, Path(sequence): Path<u64>) -> Result<Json<RootRecord>, ApiError> {
    let Some(record) = db::get_root_record(&state.db, sequence).await? else {
        return Err(ApiError::NotFound(format!("no root record with sequence {sequence}")));
    };
    Ok(Json(record))
}

async fn list_roots(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<RootListResponse>, ApiError> {
    let (offset, limit) = params.resolve();
    let total = db::count_root_records(&state.db).await?;
    let records = db::list_root_records(&state.db, offset, limit).await?;

    Ok(Json(RootListResponse {
        offset,
        limit,
        total,
        records,
    }))
}

async fn audit_roots(State(state): State<AppState>) -> Result<Json<ChainAuditResponse>, ApiError> {
    let records = db::list_all_root_records(&state.db).await?;
    Ok(Json(ledger::audit_chain(&records)))
}

async fn create_member(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<MemberCreateRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    require(&caller, Capability::ManageMembers)?;

    if req.role == Role::Admin {
        return Err(ApiError::BadRequest("admin is configured, not registered".to_string()));
    }

    let api_key = match req.api_key {
        Some(key) if key.trim().is_empty() => {
            return Err(ApiError::BadRequest("api_key must not be empty".to_string()));
        }
        Some(key) if key == state.config.admin_api_key => {
            return Err(ApiError::Conflict("api key already registered".to_string()));
        }
        Some(key) => key,
        None => {
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
    };
    let label = req.label.unwrap_or_else(|| req.role.as_str().to_string());
    let created_at = Utc::now();

    db::insert_member(&state.db, &api_key, req.role, &label, created_at).await?;
    db::insert_event(
        &state.db,
        EventKind::MemberAdded,
        &caller.label,
        json!({ "role": req.role, "label": label }),
    )
    .await?;

    tracing::info!(role = req.role.as_str(), %label, "member registered");

    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            api_key,
            role: req.role,
            label,
            created_at,
        }),
    ))
}

async fn delete_member(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(api_key): Path<String>,
) -> Result<StatusCode, ApiError> {
    require(&caller, Capability::ManageMembers)?;

    let Some(member) = db::delete_member(&state.db, &api_key).await? else {
        return Err(ApiError::NotFound("member not found".to_string()));
    };

    db::insert_event(
        &state.db,
        EventKind::MemberRevoked,
        &caller.label,
        json!({ "role": member.role, "label": member.label }),
    )
    .await?;

    tracing::info!(role = member.role.as_str(), label = %member.label, "member revoked");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_events(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<PageParams>,
) -> Result<Json<EventListResponse>, ApiError> {
    require(&caller, Capability::ReadEvents)?;

    let (offset, limit) = params.resolve();
    let events = db::list_events(&state.db, offset, limit).await?;

    Ok(Json(EventListResponse {
        offset,
        limit,
        events,
    }))
}
