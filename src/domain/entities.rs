use crate::domain::enums::{Currency, OrderStatus, PaymentStatus, TransactionOutcome};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

impl Order {
    pub fn new(owner_id: Uuid, total_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            total_price,
            status: OrderStatus::Draft,
            order_date: Utc::now(),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, OrderStatus::Success)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, OrderStatus::Draft | OrderStatus::Progressing)
    }
}

/// 订单行, 价格与有效期在下单时刻快照, 之后不随目录变化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub course_id: Uuid,
    pub price: Decimal,
    pub order_date: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
}

impl OrderLine {
    pub fn snapshot(
        order_id: Uuid,
        course_id: Uuid,
        price: Decimal,
        order_date: DateTime<Utc>,
        validity_days: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            course_id,
            price,
            order_date,
            expire_date: order_date + Duration::days(validity_days),
        }
    }
}

/// 一次结算尝试; 一个订单可以有多次尝试, 但至多一次进入 Settled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub destination_id: String,
    pub merchant_id: String,
    pub required_amount: Decimal,
    pub currency: Currency,
    pub expire_date: DateTime<Utc>,
    pub status: PaymentStatus,
    pub paid_amount: Decimal,
    pub last_message: String,
    pub last_update_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        order_id: Uuid,
        destination_id: String,
        merchant_id: String,
        required_amount: Decimal,
        currency: Currency,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            destination_id,
            merchant_id,
            required_amount,
            currency,
            expire_date: now + ttl,
            status: PaymentStatus::Pending,
            paid_amount: Decimal::ZERO,
            last_message: String::new(),
            last_update_at: now,
        }
    }

    /// 对外的交易引用, 出站 URL 与入站通知用它相互定位
    pub fn reference(&self) -> String {
        self.id.to_string()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, PaymentStatus::Pending)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_date
    }
}

/// 出站签名的审计记录, 创建后永不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSignature {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub sign_value: String,
    pub sign_date: DateTime<Utc>,
    pub sign_owner: String,
    pub is_valid: bool,
}

impl PaymentSignature {
    pub fn new(payment_id: Uuid, sign_value: String, sign_owner: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            sign_value,
            sign_date: Utc::now(),
            sign_owner,
            is_valid: true,
        }
    }
}

/// 入站通知台账行, 只追加; 重复投递照常记录, 不丢弃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub message: String,
    pub raw_payload: String,
    pub outcome: TransactionOutcome,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn record(
        payment_id: Uuid,
        message: String,
        raw_payload: String,
        outcome: TransactionOutcome,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            message,
            raw_payload,
            outcome,
            amount,
            date: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDestination {
    pub id: String,
    pub short_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub name: String,
    pub short_name: String,
    /// 网关侧的商户代码 (如 VNPay 的 TmnCode)
    pub code: String,
    pub return_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_line_snapshot_expiry() {
        let order_date = Utc::now();
        let line = OrderLine::snapshot(Uuid::new_v4(), Uuid::new_v4(), dec!(200000), order_date, 30);
        assert_eq!(line.expire_date, order_date + Duration::days(30));
        assert_eq!(line.price, dec!(200000));
    }

    #[test]
    fn new_payment_is_pending_with_zero_paid() {
        let p = Payment::new(
            Uuid::new_v4(),
            "dest-1".to_string(),
            "merchant-1".to_string(),
            dec!(200000),
            Currency::VND,
            Duration::minutes(15),
        );
        assert!(p.is_pending());
        assert_eq!(p.paid_amount, Decimal::ZERO);
        assert!(!p.is_expired(Utc::now()));
        assert!(p.is_expired(Utc::now() + Duration::minutes(16)));
    }
}
