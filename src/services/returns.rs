use crate::adapters::ProviderRegistry;
use crate::domain::CallContext;
use crate::store::PaymentStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 浏览器返回路径的展示结果; 仅供前端渲染, 不改变任何结算状态
#[derive(Debug, Serialize)]
pub struct ReturnResult {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ReturnResult {
    fn failure(status: &'static str, message: &'static str) -> Self {
        Self {
            status,
            message,
            order_id: None,
            payment_id: None,
            amount: None,
            signature: None,
        }
    }
}

/// 返回路径只读: 校验签名, 查找支付, 组装跳转地址。
/// 真相来自服务器通知路径, 这里一律不写库。
pub struct ReturnService {
    store: Arc<dyn PaymentStore>,
    providers: Arc<ProviderRegistry>,
    fallback_return_url: String,
}

impl ReturnService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        providers: Arc<ProviderRegistry>,
        fallback_return_url: String,
    ) -> Self {
        Self {
            store,
            providers,
            fallback_return_url,
        }
    }

    /// 返回前端最终跳转地址。签名不合法时不触库, 直接回退地址。
    pub async fn handle_return(
        &self,
        ctx: &CallContext,
        provider: &str,
        fields: BTreeMap<String, String>,
    ) -> String {
        let adapter = match self.providers.get(provider) {
            Some(a) => a,
            None => {
                warn!(provider, client_ip = %ctx.client_ip, "Return received for unknown provider");
                return self.redirect_to(
                    &self.fallback_return_url,
                    ReturnResult::failure("99", "invalid signature"),
                );
            }
        };

        if !adapter.verify_signature(&fields) {
            warn!(provider, client_ip = %ctx.client_ip, "Return signature verification failed");
            return self.redirect_to(
                &self.fallback_return_url,
                ReturnResult::failure("99", "invalid signature"),
            );
        }

        let callback = match adapter.parse_callback(&fields) {
            Ok(c) => c,
            Err(e) => {
                warn!(provider, error = %e, "Return payload malformed");
                return self.redirect_to(
                    &self.fallback_return_url,
                    ReturnResult::failure("99", "invalid signature"),
                );
            }
        };

        let payment = match self.store.find_payment_by_reference(&callback.txn_ref).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!(provider, txn_ref = %callback.txn_ref, "Return references unknown payment");
                return self.redirect_to(
                    &self.fallback_return_url,
                    ReturnResult::failure("11", "payment not found"),
                );
            }
            Err(e) => {
                warn!(provider, error = %e, "Store lookup failed on return path");
                return self.redirect_to(
                    &self.fallback_return_url,
                    ReturnResult::failure("99", "internal error"),
                );
            }
        };

        let merchant_return_url = match self.store.find_merchant(&payment.merchant_id).await {
            Ok(Some(m)) => m.return_url,
            _ => self.fallback_return_url.clone(),
        };

        let result = if callback.success {
            // 出站签名回带给前端, 供其与落地页参数对账
            let signature = self
                .store
                .find_signature_by_payment(payment.id)
                .await
                .ok()
                .flatten()
                .map(|s| s.sign_value);

            info!(payment_id = %payment.id, order_id = %payment.order_id, "Return path reports success");
            ReturnResult {
                status: "00",
                message: "success",
                order_id: Some(payment.order_id),
                payment_id: Some(payment.id),
                amount: Some(payment.required_amount),
                signature,
            }
        } else {
            info!(payment_id = %payment.id, message = %callback.message, "Return path reports failure");
            ReturnResult {
                status: "10",
                message: "payment failed",
                order_id: Some(payment.order_id),
                payment_id: Some(payment.id),
                amount: Some(payment.required_amount),
                signature: None,
            }
        };

        self.redirect_to(&merchant_return_url, result)
    }

    fn redirect_to(&self, base: &str, result: ReturnResult) -> String {
        let query = serde_urlencoded::to_string(&result).unwrap_or_default();
        format!("{}?{}", base.trim_end_matches('/'), query)
    }
}
