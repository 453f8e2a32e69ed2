//! Arbitrary-precision hex encoding helpers. Every monetary field is `0x` +
//! lowercase hex of a non-negative integer; the zero value is `"0x0"`.

use num_bigint::BigUint;

/// Parses a `0x`-prefixed (or bare) hex string into a [`BigUint`]. An empty
/// string is treated as zero, the convention used for absent fee/amount
/// fields.
pub fn parse_hex(value: &str) -> anyhow::Result<BigUint> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(BigUint::from(0u32));
    }
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() {
        return Ok(BigUint::from(0u32));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| anyhow::anyhow!("invalid hex integer: {value}"))
}

/// Encodes a [`BigUint`] as `0x` + lowercase hex, with the zero value
/// rendered as `"0x0"` rather than `"0x"`.
pub fn to_hex(value: &BigUint) -> String {
    if value == &BigUint::from(0u32) {
        return "0x0".to_string();
    }
    format!("0x{}", value.to_str_radix(16))
}

/// Sums a sequence of hex-encoded amounts using arbitrary-precision
/// arithmetic, returning the hex-encoded total. Used for the block-level
/// aggregate sums (`transaction_fees`, `transaction_amount`,
/// `internal_transaction_amount`).
pub fn sum_hex<'a>(values: impl IntoIterator<Item = &'a str>) -> anyhow::Result<String> {
    let mut total = BigUint::from(0u32);
    for value in values {
        total += parse_hex(value)?;
    }
    Ok(to_hex(&total))
}

/// Computes `step_price * step_used` in arbitrary precision and returns the
/// hex-encoded fee. The naive 64-bit product overflows for mainnet values;
/// this is the correctness fix the transformer relies on.
pub fn multiply_hex(step_price: &str, step_used: &str) -> anyhow::Result<String> {
    let price = parse_hex(step_price)?;
    let used = parse_hex(step_used)?;
    Ok(to_hex(&(price * used)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(parse_hex("").unwrap(), BigUint::from(0u32));
        assert_eq!(to_hex(&BigUint::from(0u32)), "0x0");
    }

    #[test]
    fn large_fees_sum_without_overflowing_u64() {
        // Two fees of 0xffffffffffffffff each must sum without wrapping u64.
        let total = sum_hex(["0xffffffffffffffff", "0xffffffffffffffff"]).unwrap();
        assert_eq!(total, "0x1fffffffffffffffe");
    }

    #[test]
    fn multiply_hex_does_not_overflow_u64() {
        // step_price * step_used both near u64::MAX would overflow a naive
        // 64-bit multiplication; bigint multiplication must not.
        let fee = multiply_hex("0xffffffffffffffff", "0xff").unwrap();
        let expected = to_hex(&(BigUint::parse_bytes(b"ffffffffffffffff", 16).unwrap()
            * BigUint::parse_bytes(b"ff", 16).unwrap()));
        assert_eq!(fee, expected);
    }

    #[test]
    fn bare_hex_without_prefix_parses() {
        assert_eq!(parse_hex("10").unwrap(), BigUint::from(16u32));
    }
}
