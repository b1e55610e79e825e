//! 持久层契约。结算相关的写操作都走 `SettlementTxn` 工作单元:
//! 要么 `commit` 全部生效, 要么随 drop 全部丢弃。

use crate::domain::entities::{
    Merchant, Order, OrderLine, Payment, PaymentDestination, PaymentSignature, PaymentTransaction,
};
use crate::domain::enums::{OrderStatus, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod mysql;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// 打开一个工作单元; 同一 Payment 的并发结算在这一层被串行化
    async fn begin(&self) -> Result<Box<dyn SettlementTxn>, StoreError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn find_order_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError>;
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;
    async fn find_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError>;
    async fn find_payments_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError>;
    async fn find_signature_by_payment(&self, payment_id: Uuid) -> Result<Option<PaymentSignature>, StoreError>;
    async fn find_destination(&self, id: &str) -> Result<Option<PaymentDestination>, StoreError>;
    async fn find_merchant(&self, id: &str) -> Result<Option<Merchant>, StoreError>;
    async fn find_merchant_by_short_name(&self, short_name: &str) -> Result<Option<Merchant>, StoreError>;

    /// 离线对账: 超过有效期的 Pending 支付置为 Failed, 返回影响行数
    async fn expire_stale_payments(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// 工作单元。未 commit 就被 drop 时, 其中的全部写入回滚。
#[async_trait]
pub trait SettlementTxn: Send {
    async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> Result<(), StoreError>;
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
    async fn insert_signature(&mut self, signature: &PaymentSignature) -> Result<(), StoreError>;
    async fn insert_transaction(&mut self, transaction: &PaymentTransaction) -> Result<(), StoreError>;

    /// 按交易引用取 Payment 并锁定到本工作单元结束 (SELECT ... FOR UPDATE 语义)
    async fn lock_payment_by_reference(&mut self, reference: &str) -> Result<Option<Payment>, StoreError>;

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn order_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError>;

    /// 该 Payment 全部 Settled 台账行的金额合计
    async fn settled_amount(&mut self, payment_id: Uuid) -> Result<Decimal, StoreError>;

    async fn update_payment_outcome(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        paid_amount: Decimal,
        last_message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> Result<(), StoreError>;

    /// 结算副作用: 清掉下单者购物车里对应的课程 (可重入)
    async fn remove_cart_items(&mut self, owner_id: Uuid, course_ids: &[Uuid]) -> Result<(), StoreError>;

    /// 结算副作用: 购买计数加一, 不存在则以 1 建档。
    /// 与状态翻转同一工作单元, 回滚时计数不会多走
    async fn increment_purchase(&mut self, owner_id: Uuid, course_id: Uuid) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
