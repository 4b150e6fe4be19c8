//! Minor-unit money conversion at the decimal boundary.
//!
//! The ledger only ever stores integer minor units (cents, paise). Callers
//! that accept decimal input from a form convert it here before posting.
//!
//! Rounding rule: **round half up** on the first dropped digit. With a scale
//! of 2, `"10.005"` becomes `1001` and `"10.0049"` becomes `1000`.

use crate::error::{DomainError, DomainResult};

/// Largest supported scale (decimal places of the minor unit).
pub const MAX_SCALE: u32 = 4;

/// Parse a non-negative decimal string into minor units.
///
/// Accepts an optional leading `+`, digits, an optional `.` and fraction
/// digits. Thousands separators, exponents and negative values are rejected.
pub fn parse_minor_units(input: &str, scale: u32) -> DomainResult<u64> {
    if scale > MAX_SCALE {
        return Err(DomainError::validation(format!(
            "scale {scale} exceeds maximum of {MAX_SCALE}"
        )));
    }

    let trimmed = input.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned.starts_with('-') {
        return Err(DomainError::validation("amount must not be negative"));
    }

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(DomainError::validation(format!("'{input}' is not a decimal amount")));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::validation(format!("'{input}' is not a decimal amount")));
    }

    let overflow = || DomainError::validation(format!("'{input}' is too large"));
    let factor = 10u64.pow(scale);

    let mut units: u64 = 0;
    for b in whole.bytes() {
        units = units
            .checked_mul(10)
            .and_then(|u| u.checked_add(u64::from(b - b'0')))
            .ok_or_else(overflow)?;
    }
    units = units.checked_mul(factor).ok_or_else(overflow)?;

    let digits = fraction.as_bytes();
    let mut frac: u64 = 0;
    for i in 0..scale as usize {
        let d = digits.get(i).map(|b| u64::from(b - b'0')).unwrap_or(0);
        frac = frac * 10 + d;
    }
    units = units.checked_add(frac).ok_or_else(overflow)?;

    if let Some(&next) = digits.get(scale as usize) {
        if next >= b'5' {
            units = units.checked_add(1).ok_or_else(overflow)?;
        }
    }

    Ok(units)
}

/// Render minor units as a decimal string with exactly `scale` places.
pub fn format_minor_units(amount: u64, scale: u32) -> String {
    if scale == 0 {
        return amount.to_string();
    }
    let factor = 10u64.pow(scale.min(MAX_SCALE));
    format!(
        "{}.{:0width$}",
        amount / factor,
        amount % factor,
        width = scale.min(MAX_SCALE) as usize
    )
}
