//! 规范化签名原语: 过滤空值, 按键字节序排序, URL 编码, 连接, HMAC-SHA512。
//! 出站构造与入站校验共用同一条路径。

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::BTreeMap;

type HmacSha512 = Hmac<Sha512>;

/// 规范化连接: 跳过签名字段与空值, 其余按键的字节序输出
/// `key1=value1&key2=value2&...`, 键和值都做百分号编码
pub fn canonical_query(fields: &BTreeMap<String, String>, sign_field: &str) -> String {
    let mut query = String::new();

    for (key, value) in fields {
        // 空值字段整体省略, 不编码成空串
        if key == sign_field || value.is_empty() {
            continue;
        }

        if !query.is_empty() {
            query.push('&');
        }

        query.push_str(&urlencoding::encode(key));
        query.push('=');
        query.push_str(&urlencoding::encode(value));
    }

    query
}

/// HMAC-SHA512, 摘要输出为小写十六进制
pub fn hmac_sha512_hex(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// 对字段集合生成签名值
pub fn sign_fields(fields: &BTreeMap<String, String>, sign_field: &str, secret: &str) -> String {
    hmac_sha512_hex(secret, &canonical_query(fields, sign_field))
}

/// 校验入站字段集合的签名: 剔除签名字段后重算, 大小写不敏感比较。
/// 只返回布尔值, 不暴露具体哪个字段不匹配。
pub fn verify_fields(fields: &BTreeMap<String, String>, sign_field: &str, secret: &str) -> bool {
    let provided = match fields.get(sign_field) {
        Some(sign) if !sign.is_empty() => sign,
        _ => return false,
    };

    let calculated = sign_fields(fields, sign_field, secret);
    calculated.eq_ignore_ascii_case(provided)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGN_FIELD: &str = "vnp_SecureHash";
    const SECRET: &str = "test_secret";

    fn sample_fields() -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("vnp_TmnCode".to_string(), "M2023001".to_string());
        fields.insert("vnp_Amount".to_string(), "20000000".to_string());
        fields.insert("vnp_TxnRef".to_string(), "ORDER123".to_string());
        fields.insert("vnp_OrderInfo".to_string(), "thanh toan khoa hoc".to_string());
        fields
    }

    #[test]
    fn canonical_query_sorts_and_encodes() {
        let query = canonical_query(&sample_fields(), SIGN_FIELD);
        assert_eq!(
            query,
            "vnp_Amount=20000000&vnp_OrderInfo=thanh%20toan%20khoa%20hoc&vnp_TmnCode=M2023001&vnp_TxnRef=ORDER123"
        );
    }

    #[test]
    fn empty_values_are_omitted_not_encoded() {
        let mut fields = sample_fields();
        fields.insert("vnp_BankCode".to_string(), String::new());
        let with_empty = canonical_query(&fields, SIGN_FIELD);
        let without = canonical_query(&sample_fields(), SIGN_FIELD);
        assert_eq!(with_empty, without);
    }

    #[test]
    fn signing_is_insertion_order_independent() {
        // BTreeMap 本身有序, 这里验证不同插入顺序得到同一签名
        let forward = sample_fields();
        let mut reversed = BTreeMap::new();
        for (k, v) in sample_fields().into_iter().rev() {
            reversed.insert(k, v);
        }
        assert_eq!(
            sign_fields(&forward, SIGN_FIELD, SECRET),
            sign_fields(&reversed, SIGN_FIELD, SECRET)
        );
    }

    #[test]
    fn verify_roundtrip_and_case_insensitive() {
        let mut fields = sample_fields();
        let sign = sign_fields(&fields, SIGN_FIELD, SECRET);
        fields.insert(SIGN_FIELD.to_string(), sign.to_uppercase());
        assert!(verify_fields(&fields, SIGN_FIELD, SECRET));
    }

    #[test]
    fn flipping_one_hex_char_fails_verification() {
        let mut fields = sample_fields();
        let mut sign = sign_fields(&fields, SIGN_FIELD, SECRET);
        let first = sign.remove(0);
        let flipped = if first == 'a' { 'b' } else { 'a' };
        sign.insert(0, flipped);
        fields.insert(SIGN_FIELD.to_string(), sign);
        assert!(!verify_fields(&fields, SIGN_FIELD, SECRET));
    }

    #[test]
    fn tampered_field_fails_verification() {
        let mut fields = sample_fields();
        let sign = sign_fields(&fields, SIGN_FIELD, SECRET);
        fields.insert(SIGN_FIELD.to_string(), sign);
        fields.insert("vnp_Amount".to_string(), "1".to_string());
        assert!(!verify_fields(&fields, SIGN_FIELD, SECRET));
    }

    #[test]
    fn missing_signature_fails() {
        assert!(!verify_fields(&sample_fields(), SIGN_FIELD, SECRET));
    }
}
