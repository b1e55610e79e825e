use crate::adapters::{
    AdapterError, ProviderAdapter, ProviderCallback, RedirectIntent, RedirectRequest,
};
use crate::domain::money::to_minor_units;
use crate::signing;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const SHORT_NAME: &str = "vnpay";
const SIGN_FIELD: &str = "vnp_SecureHash";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

fn default_version() -> String {
    "2.1.0".to_string()
}

fn default_locale() -> String {
    "vn".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct VnpayConfig {
    pub base_url: String,
    /// HMAC 共享密钥; 来自配置而不是数据库, 签名校验不依赖任何存储访问
    pub secret: String,
    /// 本服务的浏览器返回端点
    pub return_url: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

pub struct VnpayAdapter {
    config: VnpayConfig,
}

impl VnpayAdapter {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    fn describe_response_code(code: &str) -> &'static str {
        match code {
            "00" => "approved",
            "07" => "held for suspected fraud",
            "09" => "card not registered for online banking",
            "10" => "authentication failed",
            "11" => "payment window expired",
            "12" => "card or account locked",
            "13" => "wrong one-time password",
            "24" => "customer cancelled",
            "51" => "insufficient funds",
            "65" => "daily limit exceeded",
            "75" => "bank under maintenance",
            _ => "declined",
        }
    }
}

impl ProviderAdapter for VnpayAdapter {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    fn build_redirect(&self, request: &RedirectRequest) -> Result<RedirectIntent, AdapterError> {
        let amount_minor = to_minor_units(request.amount).ok_or(AdapterError::AmountOutOfRange)?;

        let locale = if request.locale.is_empty() {
            self.config.locale.clone()
        } else {
            request.locale.clone()
        };

        let mut fields = BTreeMap::new();
        fields.insert("vnp_Version".to_string(), self.config.version.clone());
        fields.insert("vnp_Command".to_string(), "pay".to_string());
        fields.insert("vnp_TmnCode".to_string(), request.merchant_code.clone());
        fields.insert("vnp_Amount".to_string(), amount_minor.to_string());
        fields.insert("vnp_CurrCode".to_string(), request.currency.to_string());
        fields.insert("vnp_TxnRef".to_string(), request.payment_id.to_string());
        fields.insert("vnp_OrderInfo".to_string(), request.order_info.clone());
        fields.insert("vnp_OrderType".to_string(), "other".to_string());
        fields.insert("vnp_Locale".to_string(), locale);
        fields.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        fields.insert("vnp_IpAddr".to_string(), request.client_ip.clone());
        fields.insert(
            "vnp_CreateDate".to_string(),
            request.created_at.format(DATE_FORMAT).to_string(),
        );

        let query = signing::canonical_query(&fields, SIGN_FIELD);
        let signature = signing::hmac_sha512_hex(&self.config.secret, &query);
        let url = format!(
            "{}?{}&{}={}",
            self.config.base_url, query, SIGN_FIELD, signature
        );

        Ok(RedirectIntent { url, signature })
    }

    fn verify_signature(&self, fields: &BTreeMap<String, String>) -> bool {
        signing::verify_fields(fields, SIGN_FIELD, &self.config.secret)
    }

    fn parse_callback(&self, fields: &BTreeMap<String, String>) -> Result<ProviderCallback, AdapterError> {
        let txn_ref = fields
            .get("vnp_TxnRef")
            .filter(|v| !v.is_empty())
            .ok_or(AdapterError::MissingField("vnp_TxnRef"))?
            .clone();

        let amount_minor = fields
            .get("vnp_Amount")
            .ok_or(AdapterError::MissingField("vnp_Amount"))?
            .parse::<i64>()
            .map_err(|e| AdapterError::InvalidField {
                field: "vnp_Amount",
                reason: e.to_string(),
            })?;

        let response_code = fields.get("vnp_ResponseCode").map(String::as_str).unwrap_or("");
        // 通知通道同时带交易状态; 浏览器返回通道可能缺省, 缺省时以响应码为准
        let status_ok = fields
            .get("vnp_TransactionStatus")
            .map(|s| s == "00")
            .unwrap_or(true);
        let success = response_code == "00" && status_ok;

        Ok(ProviderCallback {
            txn_ref,
            amount_minor,
            success,
            provider_txn_no: fields.get("vnp_TransactionNo").cloned(),
            message: Self::describe_response_code(response_code).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enums::Currency;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn adapter() -> VnpayAdapter {
        VnpayAdapter::new(VnpayConfig {
            base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            secret: "test_secret".to_string(),
            return_url: "https://shop.test/api/v1/callbacks/vnpay/return".to_string(),
            version: default_version(),
            locale: default_locale(),
        })
    }

    fn request() -> RedirectRequest {
        RedirectRequest {
            merchant_code: "SHOP01".to_string(),
            order_id: Uuid::new_v4(),
            payment_id: Uuid::new_v4(),
            amount: dec!(200000),
            currency: Currency::VND,
            order_info: "khoa hoc lap trinh".to_string(),
            locale: String::new(),
            client_ip: "203.0.113.7".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn redirect_url_carries_minor_units_and_trailing_signature() {
        let req = request();
        let intent = adapter().build_redirect(&req).unwrap();

        assert!(intent.url.contains("vnp_Amount=20000000"));
        assert!(intent.url.contains("vnp_CreateDate=20250301103000"));
        assert!(intent.url.contains(&format!("vnp_TxnRef={}", req.payment_id)));
        assert!(intent.url.ends_with(&format!("&vnp_SecureHash={}", intent.signature)));
    }

    #[test]
    fn redirect_signature_verifies_with_own_codec() {
        let intent = adapter().build_redirect(&request()).unwrap();

        // 把 URL 查询串还原成字段集, 走入站校验路径
        let query = intent.url.split_once('?').unwrap().1;
        let fields: BTreeMap<String, String> = serde_urlencoded::from_str(query).unwrap();
        assert!(adapter().verify_signature(&fields));
    }

    #[test]
    fn notification_outcome_requires_both_codes() {
        let a = adapter();
        let mut fields = BTreeMap::new();
        fields.insert("vnp_TxnRef".to_string(), "ref-1".to_string());
        fields.insert("vnp_Amount".to_string(), "20000000".to_string());
        fields.insert("vnp_ResponseCode".to_string(), "00".to_string());
        fields.insert("vnp_TransactionStatus".to_string(), "00".to_string());

        assert!(a.parse_callback(&fields).unwrap().success);

        fields.insert("vnp_TransactionStatus".to_string(), "02".to_string());
        assert!(!a.parse_callback(&fields).unwrap().success);

        fields.insert("vnp_TransactionStatus".to_string(), "00".to_string());
        fields.insert("vnp_ResponseCode".to_string(), "24".to_string());
        let parsed = a.parse_callback(&fields).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.message, "customer cancelled");
    }

    #[test]
    fn callback_without_reference_is_rejected() {
        let mut fields = BTreeMap::new();
        fields.insert("vnp_Amount".to_string(), "100".to_string());
        assert!(matches!(
            adapter().parse_callback(&fields),
            Err(AdapterError::MissingField("vnp_TxnRef"))
        ));
    }
}
