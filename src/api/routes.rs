use crate::api::handlers::{callback_handlers, order_handlers, payment_handlers};
use crate::app_state::AppState;
use axum::http::HeaderValue;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// 含 "*" 时放开跨域, 否则按配置列表解析; 解析不了的条目丢弃
fn allowed_origins(origins: &[String]) -> Option<Vec<HeaderValue>> {
    if origins.iter().any(|o| o == "*") {
        return None;
    }
    Some(origins.iter().filter_map(|o| o.parse().ok()).collect())
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = match allowed_origins(&app_state.config.server.cors_origins) {
        None => CorsLayer::new().allow_origin(Any),
        Some(list) => CorsLayer::new().allow_origin(AllowOrigin::list(list)),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    let timeout = TimeoutLayer::new(Duration::from_secs(app_state.config.server.request_timeout));

    Router::new()
        // 健康检查
        .route("/health", get(|| async { "OK" }))

        // 订单接口
        .route("/api/v1/orders", post(order_handlers::create_order))
        .route("/api/v1/orders/:order_id", get(order_handlers::get_order))
        .route("/api/v1/orders/:order_id/cancel", post(order_handlers::cancel_order))
        .route("/api/v1/orders/:order_id/status", put(order_handlers::set_order_status))

        // 支付意向接口
        .route("/api/v1/payments", post(payment_handlers::create_payment))
        .route("/api/v1/payments/:payment_id", get(payment_handlers::get_payment))

        // 网关回调: 返回路径与服务器通知路径
        .route("/api/v1/callbacks/:provider/return", get(callback_handlers::handle_return))
        .route("/api/v1/callbacks/:provider/ipn", get(callback_handlers::handle_notification))

        .layer(cors)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
