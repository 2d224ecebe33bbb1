//! Cache administration endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::cache::{InvalidationPattern, ResourceType};
use crate::domain::tenant::TenantId;
use crate::domain::warming::{WarmingRunSummary, WarmingSnapshot, WarmingStage};
use crate::infrastructure::cache::CacheHealth;
use crate::infrastructure::services::{CacheStatistics, InvalidationReport, PurgeReport};

#[derive(Debug, Deserialize)]
pub struct InvalidateTenantParams {
    pub resource: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WarmTenantParams {
    pub stage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvalidatePatternRequest {
    pub pattern: String,
}

#[derive(Debug, Serialize)]
pub struct InvalidatePatternResponse {
    pub pattern: String,
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct WarmingStartedResponse {
    pub status: &'static str,
}

fn parse_tenant(raw: &str) -> Result<TenantId, ApiError> {
    TenantId::new(raw).map_err(|e| ApiError::from(e).with_param("tenant_id"))
}

/// GET /admin/cache/stats
pub async fn get_statistics(State(state): State<AppState>) -> Json<CacheStatistics> {
    Json(state.manager.detailed_statistics().await)
}

/// GET /admin/cache/health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health: CacheHealth = state.manager.health_check().await;
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health))
}

/// POST /admin/cache/invalidate
pub async fn invalidate_all(State(state): State<AppState>) -> Json<PurgeReport> {
    Json(state.manager.invalidate_all().await)
}

/// POST /admin/cache/invalidate/pattern
pub async fn invalidate_pattern(
    State(state): State<AppState>,
    Json(request): Json<InvalidatePatternRequest>,
) -> Result<Json<InvalidatePatternResponse>, ApiError> {
    let pattern = InvalidationPattern::parse(&request.pattern)?;
    let deleted = state.store().delete_pattern(&pattern).await;

    info!(pattern = %pattern, deleted, "Invalidated cache pattern via admin API");

    Ok(Json(InvalidatePatternResponse {
        pattern: pattern.to_string(),
        deleted,
    }))
}

/// POST /admin/cache/tenants/{tenant_id}/invalidate
pub async fn invalidate_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(params): Query<InvalidateTenantParams>,
) -> Result<Json<InvalidationReport>, ApiError> {
    let tenant = parse_tenant(&tenant_id)?;
    let resource = params
        .resource
        .as_deref()
        .map(str::parse::<ResourceType>)
        .transpose()
        .map_err(|e| ApiError::from(e).with_param("resource"))?;

    let report = state.manager.invalidate_for_tenant(&tenant, resource).await?;
    Ok(Json(report))
}

/// POST /admin/cache/tenants/{tenant_id}/warm
pub async fn warm_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(params): Query<WarmTenantParams>,
) -> Result<Json<WarmingRunSummary>, ApiError> {
    let tenant = parse_tenant(&tenant_id)?;
    let stage = params
        .stage
        .as_deref()
        .map(str::parse::<WarmingStage>)
        .transpose()
        .map_err(|e| ApiError::from(e).with_param("stage"))?;

    let summary = state.manager.warm_tenant(&tenant, stage).await?;
    Ok(Json(summary))
}

/// POST /admin/cache/warm
///
/// Starts a full run in the background and returns immediately.
pub async fn warm_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.manager.spawn_warm_all()?;

    Ok((
        StatusCode::ACCEPTED,
        Json(WarmingStartedResponse { status: "started" }),
    ))
}

/// GET /admin/cache/warming
pub async fn warming_progress(State(state): State<AppState>) -> Json<WarmingSnapshot> {
    Json(state.manager.warming_progress())
}
