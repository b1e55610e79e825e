use crate::services::ServiceError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

// 统一 API 响应结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "0".to_string(),
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

/// 面向 HTTP 的错误包装; 回调通知路径不走这里, 它有自己的应答码表
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            ServiceError::OrderNotFound(_)
            | ServiceError::PaymentNotFound(_)
            | ServiceError::DestinationNotFound(_)
            | ServiceError::MerchantNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::UnsupportedDestination(_)
            | ServiceError::EmptyOrder
            | ServiceError::Adapter(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) | ServiceError::Collaborator(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match &self.0 {
            ServiceError::OrderNotFound(_) => "4002",
            ServiceError::PaymentNotFound(_) => "4003",
            ServiceError::DestinationNotFound(_) => "4007",
            ServiceError::MerchantNotFound(_) => "4008",
            ServiceError::UnsupportedDestination(_) => "4009",
            ServiceError::EmptyOrder => "4010",
            ServiceError::Adapter(_) => "3001",
            ServiceError::Unauthorized => "2000",
            ServiceError::Conflict(_) => "4005",
            ServiceError::Store(StoreError::NotFound(_)) => "3002",
            ServiceError::Store(_) | ServiceError::Collaborator(_) => "1000",
        }
    }

    // 5xx 只暴露笼统消息, 细节进日志
    fn user_message(&self) -> String {
        match &self.0 {
            ServiceError::Store(e @ (StoreError::Database(_) | StoreError::Corrupt(_))) => {
                error!("Store error: {}", e);
                "An internal error occurred. Please try again later.".to_string()
            }
            ServiceError::Collaborator(e) => {
                error!("Collaborator error: {}", e);
                "An internal error occurred. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.user_message();

        if status.is_server_error() {
            error!(
                status_code = %status.as_u16(),
                error_code = %code,
                error_message = %message,
                "Server error occurred"
            );
        }

        (status, Json(ApiResponse::<()>::error(code, &message))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_api_response() {
        let success = ApiResponse::success("test data");
        assert!(success.success);
        assert_eq!(success.code, "0");
        assert_eq!(success.data, Some("test data"));

        let err = ApiResponse::<String>::error("4002", "Order not found");
        assert!(!err.success);
        assert_eq!(err.code, "4002");
        assert_eq!(err.data, None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(ServiceError::OrderNotFound(Uuid::new_v4())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(ServiceError::UnsupportedDestination("momo".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ServiceError::Conflict("already settled".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(ServiceError::Unauthorized).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
