use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// 换算为线上最小货币单位 (金额 × 100)。
/// 先放大再四舍五入 (远离零), 而不是先截断小数再放大。
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// 入站通知的最小单位金额是否与应付金额一致。
/// 校验与出站换算共用同一条舍入路径: 网关回显的正是出站 URL 里的整数
pub fn minor_units_match(minor: i64, required: Decimal) -> bool {
    to_minor_units(required) == Some(minor)
}
