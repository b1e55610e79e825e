use crate::api::handlers::call_context;
use crate::app_state::AppState;
use crate::domain::entities::Payment;
use crate::services::intents::{CreateIntentRequest, IntentResponse};
use crate::utils::{ApiError, ApiResponse};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// 创建支付意向, 返回网关跳转地址
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IntentResponse>>), ApiError> {
    info!(order_id = %payload.order_id, destination = %payload.destination_id, "API: Create payment intent");
    let ctx = call_context(&headers, &ConnectInfo(addr));
    let response = state.intent_service.create_intent(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    let payment = state.intent_service.payment_status(payment_id).await?;
    Ok(Json(ApiResponse::success(payment)))
}
