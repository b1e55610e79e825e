use crate::api::handlers::call_context;
use crate::app_state::AppState;
use crate::domain::enums::OrderStatus;
use crate::services::orders::OrderSummary;
use crate::utils::{ApiError, ApiResponse};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub course_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: OrderStatus,
}

// 结账建单
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderSummary>>), ApiError> {
    let ctx = call_context(&headers, &ConnectInfo(addr));
    let summary = state.order_service.create_order(&ctx, &payload.course_ids).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(summary))))
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let ctx = call_context(&headers, &ConnectInfo(addr));
    state.order_service.cancel_order(&ctx, order_id).await?;
    Ok(Json(ApiResponse::success(())))
}

// 特权状态覆写, 供后台工具使用
pub async fn set_order_status(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let ctx = call_context(&headers, &ConnectInfo(addr));
    state
        .order_service
        .set_status(&ctx, order_id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderSummary>>, ApiError> {
    let summary = state.order_service.order_summary(order_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}
