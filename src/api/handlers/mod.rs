pub mod callback_handlers;
pub mod order_handlers;
pub mod payment_handlers;

use crate::domain::CallContext;
use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::SocketAddr;
use uuid::Uuid;

/// 从请求头与连接信息还原调用上下文。
/// 身份由上游网关注入 x-user-id; 代理链上取 x-forwarded-for 首个地址。
pub fn call_context(headers: &HeaderMap, addr: &ConnectInfo<SocketAddr>) -> CallContext {
    let caller = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.0.ip().to_string());

    let locale = headers
        .get("x-locale")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("vn")
        .to_string();

    CallContext::new(caller, client_ip, locale)
}
