//! Conversion of human-readable ether amounts into wei.
//!
//! Accepts `"<integer>"` (already in wei) or `"<decimal> <unit>"` using the
//! standard Ethereum denomination names. Integer-only arithmetic throughout.

use alloy::primitives::U256;

use crate::AdmissionError;

/// Number of decimal places between `unit` and wei, case-insensitive.
pub fn unit_decimals(unit: &str) -> Option<usize> {
    let decimals = match unit.to_ascii_lowercase().as_str() {
        "wei" => 0,
        "kwei" | "babbage" | "femtoether" => 3,
        "mwei" | "lovelace" | "picoether" => 6,
        "gwei" | "shannon" | "nanoether" | "nano" => 9,
        "szabo" | "microether" | "micro" => 12,
        "finney" | "milliether" | "milli" => 15,
        "ether" => 18,
        "kether" | "grand" => 21,
        "mether" => 24,
        "gether" => 27,
        "tether" => 30,
        _ => return None,
    };
    Some(decimals)
}

/// Normalize `amount` to the smallest denomination.
///
/// `"1"` and `"1 wei"` both yield 1; `"0.5 ether"` yields 5 * 10^17.
/// Amounts finer than one wei are rejected rather than truncated.
pub fn to_smallest_unit(amount: &str) -> Result<U256, AdmissionError> {
    let invalid = |reason: &str| AdmissionError::InvalidAmount(format!("'{amount}': {reason}"));

    let mut parts = amount.split_whitespace();
    let (number, unit) = match (parts.next(), parts.next(), parts.next()) {
        (Some(number), None, None) => (number, "wei"),
        (Some(number), Some(unit), None) => (number, unit),
        _ => return Err(invalid("expected '<number>' or '<number> <unit>'")),
    };

    let decimals = unit_decimals(unit).ok_or_else(|| invalid("unknown unit"))?;
    scale_decimal(number, decimals).map_err(invalid)
}

fn scale_decimal(number: &str, decimals: usize) -> Result<U256, &'static str> {
    let (integer_part, fractional_part) = number.split_once('.').unwrap_or((number, ""));

    if integer_part.is_empty() && fractional_part.is_empty() {
        return Err("no numeric content");
    }
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(integer_part) || !is_digits(fractional_part) {
        return Err("not a decimal number");
    }

    let fractional_part = fractional_part.trim_end_matches('0');
    if fractional_part.len() > decimals {
        return Err("finer than the smallest unit");
    }

    let digits = format!("{integer_part}{fractional_part:0<decimals$}");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| "overflow")
}
