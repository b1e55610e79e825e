//! 结算流程消费的外部能力接口: 课程目录与事件通知。
//! 这里只定义契约; 自带的 MySQL 实现见 `mysql` 子模块。
//! 购物车清理与购买计数属于结算工作单元, 见 `store::SettlementTxn`。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod mysql;

#[derive(Debug, Error)]
#[error("collaborator failure: {0}")]
pub struct CollaboratorError(pub String);

impl From<sqlx::Error> for CollaboratorError {
    fn from(e: sqlx::Error) -> Self {
        Self(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CourseInfo {
    pub id: Uuid,
    pub price: Decimal,
    pub validity_days: i64,
    pub is_public: bool,
    pub is_free: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_course(&self, id: Uuid) -> Result<Option<CourseInfo>, CollaboratorError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementEvent {
    pub order_id: Uuid,
    pub owner_id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub settled_at: DateTime<Utc>,
}

/// 尽力而为的事件出口; 失败绝不回滚结算, 所以接口不返回错误
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: SettlementEvent);
}

/// 默认事件出口: 结构化日志。队列型出口实现同一 trait 即可替换。
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn emit(&self, event: SettlementEvent) {
        tracing::info!(
            order_id = %event.order_id,
            owner_id = %event.owner_id,
            payment_id = %event.payment_id,
            amount = %event.amount,
            "Settlement event emitted"
        );
    }
}
