//! 精确的 UI 数量换算
//!
//! `raw / 10^decimals` 先按十进制字符串移位小数点，再解析为 f64，
//! 结果是十进制值最接近的 f64，不引入二进制除法误差。

/// 十进制字符串形式，例如 `(1_500_000_000, 9) -> "1.500000000"`
pub fn format_ui_amount(amount_raw: u128, decimals: u8) -> String {
    let digits = amount_raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    if digits.len() > decimals {
        let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", int_part, frac_part)
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    }
}

pub fn convert_to_ui_amount(amount_raw: u128, decimals: u8) -> f64 {
    format_ui_amount(amount_raw, decimals).parse().unwrap_or_default()
}

/// 有符号差值（余额变化）取绝对值后换算
pub fn signed_to_ui_amount(delta: i128, decimals: u8) -> f64 {
    convert_to_ui_amount(delta.unsigned_abs(), decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_amount_is_exact() {
        assert_eq!(convert_to_ui_amount(1_500_000_000, 9), 1.5);
        assert_eq!(convert_to_ui_amount(50_000_000, 6), 50.0);
        assert_eq!(convert_to_ui_amount(1, 9), 0.000000001);
        assert_eq!(convert_to_ui_amount(123, 0), 123.0);
        assert_eq!(convert_to_ui_amount(0, 6), 0.0);
        // 0.1 + 0.2 类误差不应出现
        assert_eq!(convert_to_ui_amount(300_000, 6), 0.3);
    }

    #[test]
    fn test_format_ui_amount() {
        assert_eq!(format_ui_amount(1_500_000_000, 9), "1.500000000");
        assert_eq!(format_ui_amount(42, 6), "0.000042");
        assert_eq!(format_ui_amount(7, 0), "7");
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_to_ui_amount(-2_000_000_000, 9), 2.0);
        assert_eq!(signed_to_ui_amount(i128::MIN, 0), 170141183460469231731687303715884105728.0);
    }
}
