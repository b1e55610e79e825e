use crate::domain::enums::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod vnpay;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("amount not representable in minor units")]
    AmountOutOfRange,
}

/// 构造出站跳转 URL 所需的规范字段集
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub merchant_code: String,
    pub order_id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub order_info: String,
    pub locale: String,
    pub client_ip: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RedirectIntent {
    pub url: String,
    /// 拼入 URL 的签名值, 同时写入签名审计记录
    pub signature: String,
}

/// 入站回调 (浏览器返回与服务器通知共用同一字段族) 解析结果
#[derive(Debug, Clone)]
pub struct ProviderCallback {
    pub txn_ref: String,
    pub amount_minor: i64,
    pub success: bool,
    pub provider_txn_no: Option<String>,
    pub message: String,
}

/// 支付网关适配器公共接口。
/// URL 构造与回调解析都是纯函数, 意向创建期间不发生网络调用。
pub trait ProviderAdapter: Send + Sync {
    /// 注册键, 与支付目的地的短名匹配
    fn short_name(&self) -> &'static str;

    /// 构造带签名的跳转 URL
    fn build_redirect(&self, request: &RedirectRequest) -> Result<RedirectIntent, AdapterError>;

    /// 校验入站字段集的签名; 只给出布尔结论
    fn verify_signature(&self, fields: &BTreeMap<String, String>) -> bool;

    /// 解析入站回调字段 (签名校验之后调用)
    fn parse_callback(&self, fields: &BTreeMap<String, String>) -> Result<ProviderCallback, AdapterError>;
}

/// 适配器注册表, 按目的地短名解析; 新增网关只需注册, 不触碰结算流程
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.short_name().to_string(), adapter);
    }

    pub fn get(&self, short_name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(short_name).cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
