use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use relay_order::models::{BalanceSummary, CourierReport, CourierStats, WithdrawReceipt, WithdrawRequest};
use relay_shared::Principal;

use crate::error::ApiResult;
use crate::state::AppState;

/// Both days, or neither for the current week
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/couriers/{id}/balance", get(balance))
        .route("/v1/couriers/{id}/withdraw", post(withdraw))
        .route("/v1/couriers/{id}/stats", get(stats))
        .route("/v1/couriers/{id}/reports", get(reports))
}

/// GET /v1/couriers/{id}/balance
/// `id` is the courier's user id
async fn balance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BalanceSummary>> {
    Ok(Json(state.wallet.balance_summary(id, &principal).await?))
}

/// POST /v1/couriers/{id}/withdraw
async fn withdraw(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<Json<WithdrawReceipt>> {
    Ok(Json(state.wallet.withdraw(id, &req, &principal).await?))
}

/// GET /v1/couriers/{id}/stats
async fn stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CourierStats>> {
    Ok(Json(state.wallet.stats(id, &principal).await?))
}

/// GET /v1/couriers/{id}/reports?start_date=2026-10-04&end_date=2026-10-10
async fn reports(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<CourierReport>> {
    let report = state
        .wallet
        .reports(id, query.start_date, query.end_date, &principal)
        .await?;
    Ok(Json(report))
}
