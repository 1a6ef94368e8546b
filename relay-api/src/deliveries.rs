use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use relay_catalog::Simulation;
use relay_order::models::DeliveryPage;
use relay_order::{CreatedDelivery, DeliveryDraft, StatusUpdate};
use relay_shared::{DeliveryDetail, DeliveryFilter, Principal};

use crate::error::ApiResult;
use crate::notifications::{ListQuery, DEFAULT_PAGE_SIZE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/deliveries/simulate", post(simulate))
        .route("/v1/deliveries", get(list).post(create))
        .route("/v1/deliveries/{id}/status", patch(update_status))
        .route("/v1/deliveries/code/{code}", get(find_by_code))
}

/// POST /v1/deliveries/simulate
async fn simulate(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(draft): Json<DeliveryDraft>,
) -> ApiResult<Json<Simulation>> {
    Ok(Json(state.orchestrator.simulate(&draft, &principal).await?))
}

/// POST /v1/deliveries
async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(draft): Json<DeliveryDraft>,
) -> ApiResult<(StatusCode, Json<CreatedDelivery>)> {
    let created = state.orchestrator.create(&draft, &principal).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/deliveries
/// Paging via `page`/`limit`, criteria via the `DeliveryFilter` fields
async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(paging): Query<ListQuery>,
    Query(filter): Query<DeliveryFilter>,
) -> ApiResult<Json<DeliveryPage>> {
    let page = state
        .orchestrator
        .list(
            &filter,
            paging.page.unwrap_or(1),
            paging.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            &principal,
        )
        .await?;
    Ok(Json(page))
}

/// PATCH /v1/deliveries/{id}/status
async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<StatusUpdate>> {
    Ok(Json(state.orchestrator.update_status(id, &req.status, &principal).await?))
}

/// GET /v1/deliveries/code/{code}
async fn find_by_code(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
) -> ApiResult<Json<DeliveryDetail>> {
    Ok(Json(state.orchestrator.find_by_code(&code, &principal).await?))
}
