use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Numerator of the position-size formula.
const RISK_NUMERATOR: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Sp1,
    Nq1,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Sp1, Mode::Nq1];

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Sp1 => "SP1!",
            Mode::Nq1 => "NQ1!",
        }
    }

    pub fn divisor(&self) -> f64 {
        match self {
            Mode::Sp1 => 102.0,
            Mode::Nq1 => 79.52,
        }
    }

    pub fn toggled(&self) -> Mode {
        match self {
            Mode::Sp1 => Mode::Nq1,
            Mode::Nq1 => Mode::Sp1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_end_matches('!').to_ascii_uppercase();
        match normalized.as_str() {
            "SP1" => Ok(Mode::Sp1),
            "NQ1" => Ok(Mode::Nq1),
            _ => Err(format!("unknown mode `{}` (use SP1! or NQ1!)", s.trim())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("invalid point input `{0}`")]
    InvalidInput(String),
}

/// Computes `500 / (point * divisor)` for the given mode.
///
/// Zero and unparsable input are rejected. Negative and infinite points are
/// passed through unchanged.
pub fn calculate(mode: Mode, point_text: &str) -> Result<f64, CalcError> {
    let point = parse_point(point_text)?;
    Ok(position_size(mode, point))
}

/// The formula applied to an already parsed point.
pub fn position_size(mode: Mode, point: f64) -> f64 {
    RISK_NUMERATOR / (point * mode.divisor())
}

/// Parses the longest numeric prefix of `text`, skipping leading whitespace.
pub fn parse_point(text: &str) -> Result<f64, CalcError> {
    let invalid = || CalcError::InvalidInput(text.to_string());
    let value = parse_numeric_prefix(text).ok_or_else(invalid)?;
    if value == 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

fn parse_numeric_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut idx = 0;
    let negative = bytes.first() == Some(&b'-');
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        idx = 1;
    }
    if trimmed[idx..].starts_with("Infinity") {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut mantissa_digits = idx - int_start;
    if idx < bytes.len() && bytes[idx] == b'.' {
        idx += 1;
        let frac_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        mantissa_digits += idx - frac_start;
    }
    if mantissa_digits == 0 {
        return None;
    }
    let mut end = idx;
    if idx < bytes.len() && matches!(bytes[idx], b'e' | b'E') {
        let mut exp = idx + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_digits_start = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits_start {
            end = exp;
        }
    }
    trimmed[..end].parse::<f64>().ok()
}

/// Formats a result with one decimal place, rounding ties away from zero.
/// Magnitudes of 1e21 and above fall back to the exponent form.
pub fn format_result(value: f64) -> String {
    if !value.is_finite() || value.abs() >= 1e21 {
        return number_to_string(value);
    }
    let magnitude = value.abs();
    // Exact ties at one decimal are the odd multiples of 0.25.
    let quarters = magnitude * 4.0;
    let rounded = if quarters.fract() == 0.0 && quarters % 2.0 == 1.0 {
        (magnitude * 10.0).ceil() / 10.0
    } else {
        magnitude
    };
    let formatted = format!("{:.1}", rounded);
    if value < 0.0 {
        format!("-{formatted}")
    } else {
        formatted
    }
}

/// Formats a point the way it was shown in the input, without a trailing `.0`.
pub fn format_point(value: f64) -> String {
    number_to_string(value)
}

/// Shortest round-trip form, switching to `1e+21` / `1e-7` style exponents
/// outside `[1e-6, 1e21)`.
fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{value}");
    }
    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}
