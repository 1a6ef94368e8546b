use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use relay_order::models::{NotificationDraft, NotificationPage, PaymentSlipRequest};
use relay_shared::{Notification, Principal};

use crate::error::ApiResult;
use crate::state::AppState;

pub(crate) const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct PaymentSlipResponse {
    pub notified_admins: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", get(list).post(create))
        .route("/v1/notifications/unread-count", get(unread_count))
        .route("/v1/notifications/payment-slip", post(request_payment_slip))
        .route("/v1/notifications/{id}/read", patch(mark_read))
        .route("/v1/notifications/{id}/approve", patch(approve))
        .route("/v1/notifications/{id}/reject", patch(reject))
}

async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<NotificationPage>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(Json(state.notifications.list(&principal, page, limit).await?))
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<UnreadCount>> {
    let count = state.notifications.unread_count(&principal).await?;
    Ok(Json(UnreadCount { count }))
}

async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(draft): Json<NotificationDraft>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let created = state.notifications.create(&draft, &principal).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn request_payment_slip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<PaymentSlipRequest>,
) -> ApiResult<(StatusCode, Json<PaymentSlipResponse>)> {
    let notified_admins = state.notifications.request_payment_slip(&req, &principal).await?;
    Ok((StatusCode::CREATED, Json(PaymentSlipResponse { notified_admins })))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.notifications.mark_read(id, &principal).await?))
}

async fn approve(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.notifications.approve(id, &principal).await?))
}

async fn reject(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.notifications.reject(id, &principal).await?))
}
