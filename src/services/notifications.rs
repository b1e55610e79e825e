use crate::adapters::{ProviderCallback, ProviderRegistry};
use crate::collaborators::{NotificationSink, SettlementEvent};
use crate::domain::entities::PaymentTransaction;
use crate::domain::enums::{OrderStatus, PaymentStatus, TransactionOutcome};
use crate::domain::money;
use crate::domain::CallContext;
use crate::services::ServiceError;
use crate::store::PaymentStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 服务器通知路径的应答码; 网关凭应答决定是否重发, 码表是闭集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementAck {
    Ok,
    NotFound,
    AlreadyConfirmed,
    AmountMismatch,
    InvalidSignature,
    InternalError,
}

impl SettlementAck {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementAck::Ok => "00",
            SettlementAck::NotFound => "01",
            SettlementAck::AlreadyConfirmed => "02",
            SettlementAck::AmountMismatch => "04",
            SettlementAck::InvalidSignature => "97",
            SettlementAck::InternalError => "99",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SettlementAck::Ok => "Confirm Success",
            SettlementAck::NotFound => "Order not found",
            SettlementAck::AlreadyConfirmed => "Order already confirmed",
            SettlementAck::AmountMismatch => "Invalid amount",
            SettlementAck::InvalidSignature => "Invalid signature",
            SettlementAck::InternalError => "Unknown error",
        }
    }
}

/// 网关期望的应答报文; 始终 HTTP 200, 语义只看 code
#[derive(Debug, Serialize)]
pub struct AckBody {
    #[serde(rename = "RspCode")]
    pub code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl From<SettlementAck> for AckBody {
    fn from(ack: SettlementAck) -> Self {
        Self {
            code: ack.code(),
            message: ack.message(),
        }
    }
}

/// 结算通知处理: at-least-once 投递下保证恰好一次生效。
/// 幂等闸门是行锁下的状态检查, 台账只追加, 结算副作用与状态翻转同一工作单元。
pub struct NotificationService {
    store: Arc<dyn PaymentStore>,
    providers: Arc<ProviderRegistry>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        providers: Arc<ProviderRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            providers,
            sink,
        }
    }

    /// 永不失败: 任何内部错误折叠为 99, 留给网关重发
    pub async fn handle_notification(
        &self,
        ctx: &CallContext,
        provider: &str,
        fields: BTreeMap<String, String>,
    ) -> SettlementAck {
        // 签名不过不触库
        let adapter = match self.providers.get(provider) {
            Some(a) => a,
            None => {
                warn!(provider, client_ip = %ctx.client_ip, "Notification for unknown provider");
                return SettlementAck::InvalidSignature;
            }
        };

        if !adapter.verify_signature(&fields) {
            warn!(provider, client_ip = %ctx.client_ip, "Notification signature verification failed");
            return SettlementAck::InvalidSignature;
        }

        let callback = match adapter.parse_callback(&fields) {
            Ok(c) => c,
            Err(e) => {
                error!(provider, error = %e, "Notification payload malformed");
                return SettlementAck::InternalError;
            }
        };

        match self.settle(provider, &callback, &fields).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(provider, txn_ref = %callback.txn_ref, error = %e, "Settlement failed, awaiting redelivery");
                SettlementAck::InternalError
            }
        }
    }

    async fn settle(
        &self,
        provider: &str,
        callback: &ProviderCallback,
        fields: &BTreeMap<String, String>,
    ) -> Result<SettlementAck, ServiceError> {
        let mut txn = self.store.begin().await?;

        // 行锁: 并发投递在此串行化
        let payment = match txn.lock_payment_by_reference(&callback.txn_ref).await? {
            Some(p) => p,
            None => return Ok(SettlementAck::NotFound),
        };

        // 金额先于重复检查: 金额不符的重发也必须拿到 04
        if !money::minor_units_match(callback.amount_minor, payment.required_amount) {
            warn!(
                payment_id = %payment.id,
                expected = %payment.required_amount,
                got_minor = callback.amount_minor,
                "Notification amount mismatch"
            );
            return Ok(SettlementAck::AmountMismatch);
        }

        if !payment.is_pending() {
            info!(payment_id = %payment.id, status = %payment.status, "Duplicate notification acknowledged");
            return Ok(SettlementAck::AlreadyConfirmed);
        }

        let outcome = if callback.success {
            TransactionOutcome::Settled
        } else {
            TransactionOutcome::Failed
        };

        // 台账行先落; 重复投递的行也会留下, 真相可回放
        let raw_payload = serde_json::to_string(fields).unwrap_or_else(|_| {
            fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        });
        let amount = rust_decimal::Decimal::from(callback.amount_minor) / rust_decimal::Decimal::from(100);
        let record = PaymentTransaction::record(
            payment.id,
            callback.message.clone(),
            raw_payload,
            outcome,
            amount,
        );
        txn.insert_transaction(&record).await?;

        let paid_amount = txn.settled_amount(payment.id).await?;
        let now = Utc::now();
        let (new_status, paid) = match outcome {
            TransactionOutcome::Settled => (PaymentStatus::Settled, paid_amount),
            TransactionOutcome::Failed => (PaymentStatus::Failed, payment.paid_amount),
        };
        txn.update_payment_outcome(payment.id, new_status, paid, &callback.message, now)
            .await?;

        if new_status != PaymentStatus::Settled {
            txn.commit().await?;
            info!(provider, payment_id = %payment.id, "Notification recorded failed attempt");
            return Ok(SettlementAck::Ok);
        }

        let order = txn
            .find_order(payment.order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(payment.order_id))?;
        let lines = txn.order_lines(order.id).await?;

        txn.set_order_status(order.id, OrderStatus::Success).await?;

        // 结算副作用走同一工作单元: 半途失败连同状态翻转一起回滚, 等重发
        let course_ids: Vec<_> = lines.iter().map(|l| l.course_id).collect();
        txn.remove_cart_items(order.owner_id, &course_ids).await?;
        for line in &lines {
            txn.increment_purchase(order.owner_id, line.course_id).await?;
        }

        txn.commit().await?;

        info!(
            provider,
            payment_id = %payment.id,
            order_id = %order.id,
            amount = %paid,
            "Order settled"
        );

        // 提交之后的尽力而为通知, 不参与幂等闸门
        self.sink
            .emit(SettlementEvent {
                order_id: order.id,
                owner_id: order.owner_id,
                payment_id: payment.id,
                amount: paid,
                settled_at: now,
            })
            .await;

        Ok(SettlementAck::Ok)
    }
}
