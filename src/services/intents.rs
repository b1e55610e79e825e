use crate::adapters::{ProviderRegistry, RedirectRequest};
use crate::domain::entities::{Payment, PaymentSignature};
use crate::domain::enums::{Currency, OrderStatus};
use crate::domain::CallContext;
use crate::services::ServiceError;
use crate::store::PaymentStore;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
    pub destination_id: String,
    pub amount: Decimal,
    pub content: String,
    pub currency: Currency,
    /// 缺省时按目的地短名匹配商户
    pub merchant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub payment_id: Uuid,
    pub redirect_url: String,
}

/// 支付意向工厂: 一个工作单元内落 Payment(Pending), 订单转 Progressing,
/// 并记录出站签名; 任何一步失败则全部回滚。
pub struct IntentService {
    store: Arc<dyn PaymentStore>,
    providers: Arc<ProviderRegistry>,
    intent_ttl: Duration,
}

impl IntentService {
    pub fn new(store: Arc<dyn PaymentStore>, providers: Arc<ProviderRegistry>, intent_ttl: Duration) -> Self {
        Self {
            store,
            providers,
            intent_ttl,
        }
    }

    pub async fn create_intent(
        &self,
        ctx: &CallContext,
        request: CreateIntentRequest,
    ) -> Result<IntentResponse, ServiceError> {
        // 目的地与适配器在任何写入之前解析; 不支持的目的地直接失败, 零写入
        let destination = self
            .store
            .find_destination(&request.destination_id)
            .await?
            .ok_or_else(|| ServiceError::DestinationNotFound(request.destination_id.clone()))?;

        let adapter = self
            .providers
            .get(&destination.short_name)
            .ok_or_else(|| ServiceError::UnsupportedDestination(destination.short_name.clone()))?;

        let order = self
            .store
            .find_order(request.order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(request.order_id))?;

        if order.status == OrderStatus::Success {
            return Err(ServiceError::Conflict(format!(
                "order {} is already settled",
                order.id
            )));
        }

        // 显式商户优先, 否则按目的地短名匹配
        let merchant = match &request.merchant_id {
            Some(id) => self
                .store
                .find_merchant(id)
                .await?
                .ok_or_else(|| ServiceError::MerchantNotFound(id.clone()))?,
            None => self
                .store
                .find_merchant_by_short_name(&destination.short_name)
                .await?
                .ok_or_else(|| ServiceError::MerchantNotFound(destination.short_name.clone()))?,
        };

        let payment = Payment::new(
            order.id,
            destination.id.clone(),
            merchant.id.clone(),
            request.amount,
            request.currency,
            self.intent_ttl,
        );

        // URL 构造是纯函数, 在工作单元外完成
        let redirect = adapter.build_redirect(&RedirectRequest {
            merchant_code: merchant.code.clone(),
            order_id: order.id,
            payment_id: payment.id,
            amount: request.amount,
            currency: request.currency,
            order_info: request.content.clone(),
            locale: ctx.locale.clone(),
            client_ip: ctx.client_ip.clone(),
            created_at: payment.last_update_at,
        })?;

        let signature = PaymentSignature::new(payment.id, redirect.signature, merchant.id.clone());

        let mut txn = self.store.begin().await?;
        txn.insert_payment(&payment).await?;
        txn.set_order_status(order.id, OrderStatus::Progressing).await?;
        txn.insert_signature(&signature).await?;
        txn.commit().await?;

        info!(
            payment_id = %payment.id,
            order_id = %order.id,
            destination = %destination.short_name,
            amount = %request.amount,
            "Payment intent created"
        );

        Ok(IntentResponse {
            payment_id: payment.id,
            redirect_url: redirect.url,
        })
    }

    pub async fn payment_status(&self, payment_id: Uuid) -> Result<Payment, ServiceError> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| ServiceError::PaymentNotFound(payment_id.to_string()))
    }
}
