//! Major/minor currency unit conversion
//!
//! All stored and compared amounts are integer minor units (kobo for NGN).
//! Decimal input is accepted only at the edge and converted exactly.

use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use std::str::FromStr;

/// Minor units per major unit
pub const MINOR_UNITS: i64 = 100;

/// Largest accepted power of ten once trailing zeros are stripped
const MIN_SCALE: i64 = -12;

/// Parse a major-unit decimal such as `"100.00"` into minor units.
///
/// More than two fractional digits is rejected rather than rounded. The
/// exponent and magnitude are bounded before scaling, so exponent notation
/// like `1e50000000` is refused without expanding the number.
pub fn major_to_minor(amount: &BigDecimal) -> Result<i64, String> {
    let (digits, scale) = amount.normalized().as_bigint_and_exponent();
    if !(MIN_SCALE..=2).contains(&scale) {
        return Err(if scale > 2 {
            "Ensure that there are no more than 2 decimal places.".to_string()
        } else {
            "A valid number is required.".to_string()
        });
    }
    if digits.bits() > 63 {
        return Err("Amount is out of range.".to_string());
    }

    (amount.clone() * BigDecimal::from(MINOR_UNITS))
        .with_scale(0)
        .to_i64()
        .ok_or_else(|| "Amount is out of range.".to_string())
}

/// Parse a major-unit amount given as a JSON string or number
pub fn parse_major(value: &serde_json::Value) -> Result<i64, String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => return Err("This field is required.".to_string()),
        _ => return Err("A valid number is required.".to_string()),
    };

    let decimal =
        BigDecimal::from_str(&text).map_err(|_| "A valid number is required.".to_string())?;
    major_to_minor(&decimal)
}

/// Render minor units as a two-decimal major-unit string
pub fn format_minor(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!(
        "{}{}.{:02}",
        sign,
        abs / MINOR_UNITS as u64,
        abs % MINOR_UNITS as u64
    )
}
