//! Decimal amount conversion
//!
//! All conversions to smallest units truncate toward zero and are done with
//! integer arithmetic on the decimal string, so a user is never asked to
//! authorize more than they typed.

use crate::errors::FlowError;

/// 10^exp, or None past u128 range (mints may declare up to 255 decimals)
fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

// u64::MAX has 20 digits
const MAX_RAW_DIGITS: usize = 20;

/// Parse a human-unit amount ("1.5", "0.000001") into smallest units (floor)
pub fn parse_ui_amount(input: &str, decimals: u8) -> Result<u64, FlowError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FlowError::invalid_amount("amount is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(FlowError::invalid_amount(format!(
            "amount must be positive: {}",
            trimmed
        )));
    }

    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(FlowError::invalid_amount(format!(
            "not a decimal number: {}",
            input.trim()
        )));
    }

    let overflow = || FlowError::invalid_amount(format!("amount too large: {}", input.trim()));

    // Smallest units are the integer digits followed by exactly `decimals`
    // fraction digits; anything past the asset's precision is dropped (floor)
    let mut digits: String = int_part.to_string();
    digits.extend(frac_part.chars().take(decimals as usize));
    let padding = (decimals as usize).saturating_sub(frac_part.len());

    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() + padding > MAX_RAW_DIGITS {
        return Err(overflow());
    }

    let mut raw = significant.to_string();
    raw.extend(std::iter::repeat('0').take(padding));
    raw.parse::<u64>().map_err(|_| overflow())
}

/// Exact decimal rendering with all `decimals` places ("250.000000")
pub fn format_raw_amount(raw: u64, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let decimals = decimals as usize;
    let digits = format!("{:0>width$}", raw, width = decimals + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
    format!("{}.{}", int_part, frac_part)
}

/// Rendering with a fixed number of places, truncating extra precision
pub fn format_raw_amount_fixed(raw: u64, decimals: u8, places: u32) -> String {
    let full = format_raw_amount(raw, decimals);
    let (int_part, frac_part) = full.split_once('.').unwrap_or((full.as_str(), ""));
    if places == 0 {
        return int_part.to_string();
    }
    let mut frac: String = frac_part.chars().take(places as usize).collect();
    while frac.len() < places as usize {
        frac.push('0');
    }
    format!("{}.{}", int_part, frac)
}

/// Rendering without trailing zeros ("2.5", "3")
pub fn format_raw_amount_trimmed(raw: u64, decimals: u8) -> String {
    let full = format_raw_amount(raw, decimals);
    if !full.contains('.') {
        return full;
    }
    full.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Output after worst-case slippage: out * (10000 - bps) / 10000, floored
pub fn minimum_received(out_raw: u64, slippage_bps: u16) -> u64 {
    let bps = slippage_bps.min(10_000) as u128;
    ((out_raw as u128 * (10_000 - bps)) / 10_000) as u64
}

/// Destination units received per one source unit, with `places` decimals
pub fn exchange_rate(
    in_raw: u64,
    in_decimals: u8,
    out_raw: u64,
    out_decimals: u8,
    places: u32,
) -> Option<String> {
    if in_raw == 0 {
        return None;
    }

    // rate * 10^places = out_raw * 10^in_dec * 10^places / (in_raw * 10^out_dec)
    let numerator = (out_raw as u128)
        .checked_mul(pow10(in_decimals as u32)?)?
        .checked_mul(pow10(places)?)?;
    let denominator = (in_raw as u128).checked_mul(pow10(out_decimals as u32)?)?;
    let scaled = numerator / denominator;

    if places == 0 {
        return Some(scaled.to_string());
    }
    let divisor = pow10(places)?;
    Some(format!(
        "{}.{:0width$}",
        scaled / divisor,
        scaled % divisor,
        width = places as usize
    ))
}
