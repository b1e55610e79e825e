use crate::api::handlers::call_context;
use crate::app_state::AppState;
use crate::services::notifications::AckBody;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

// 浏览器返回: 仅展示, 处理后 303 跳回商户页面
pub async fn handle_return(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(provider): Path<String>,
    Query(fields): Query<BTreeMap<String, String>>,
) -> Redirect {
    let ctx = call_context(&headers, &ConnectInfo(addr));
    info!(provider = %provider, client_ip = %ctx.client_ip, "Browser return received");
    let location = state.return_service.handle_return(&ctx, &provider, fields).await;
    Redirect::to(&location)
}

// 服务器通知 (IPN): 权威路径, 始终 HTTP 200, 由应答码驱动网关重发
pub async fn handle_notification(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(provider): Path<String>,
    Query(fields): Query<BTreeMap<String, String>>,
) -> Json<AckBody> {
    let ctx = call_context(&headers, &ConnectInfo(addr));
    let ack = state
        .notification_service
        .handle_notification(&ctx, &provider, fields)
        .await;
    info!(provider = %provider, code = ack.code(), "Notification acknowledged");
    Json(AckBody::from(ack))
}
