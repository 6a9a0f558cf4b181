//! Loose coercion of extracted text into typed cell values.
//!
//! Reports mix `1.234.567,89`, `1,234,567.89` and `1 234` styles, so numbers
//! are read leniently: when both `.` and `,` are present the separator that
//! appears first is taken as the thousands separator and removed, the other
//! becomes the decimal point.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::matching::normalize_word;
use crate::model::Value;

/// Declared type of an output column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Text,
    Integer,
    Decimal,
    /// Percentage, stored as a fraction (`2,5%` is `0.025`)
    Percent,
    Date,
    /// ISO-4217-shaped three-letter code
    Currency,
    Flag,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Percent => "percent",
            ValueKind::Date => "date",
            ValueKind::Currency => "currency",
            ValueKind::Flag => "flag",
        };
        f.write_str(name)
    }
}

/// A cell whose text cannot be read as its declared kind.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot read {text:?} as {kind}")]
pub struct CoerceError {
    pub kind: ValueKind,
    pub text: String,
}

type CoerceResult<T> = std::result::Result<T, CoerceError>;

const DATE_FORMATS: &[(&str, bool)] = &[
    ("%Y-%m-%d", true),
    ("%d/%m/%Y", true),
    ("%d/%m/%y", false),
    ("%m-%d-%Y", true),
    ("%d-%m-%y", false),
];

/// Coerce `text` into a value of the given kind.
pub fn coerce(kind: ValueKind, text: &str) -> CoerceResult<Value> {
    let fail = || CoerceError {
        kind,
        text: text.to_string(),
    };
    match kind {
        ValueKind::Text => {
            let s = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if s.is_empty() {
                Err(fail())
            } else {
                Ok(Value::Text(s))
            }
        }
        ValueKind::Integer => to_int(text).map(Value::Integer).ok_or_else(fail),
        ValueKind::Decimal => to_float(text).map(Value::Decimal).ok_or_else(fail),
        ValueKind::Percent => perc_to_float(text).map(Value::Decimal).ok_or_else(fail),
        ValueKind::Date => to_date(text).map(Value::Date).ok_or_else(fail),
        ValueKind::Currency => to_currency(text).map(Value::Text).ok_or_else(fail),
        ValueKind::Flag => to_flag(text).map(Value::Flag).ok_or_else(fail),
    }
}

/// Read a decimal number, tolerating thousands separators.
pub fn to_float(text: &str) -> Option<f64> {
    let (negative, data) = prepare_numeric(text)?;
    let data = if is_thousands_grouped(&data, 2) {
        data.replace('.', "")
    } else {
        data
    };
    let value: f64 = data.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Read an integer, tolerating thousands separators and a zero fractional part.
pub fn to_int(text: &str) -> Option<i64> {
    let (negative, data) = prepare_numeric(text)?;
    let data = if is_thousands_grouped(&data, 1) {
        data.replace('.', "")
    } else {
        data
    };
    let int_part = match data.split_once('.') {
        Some((int_part, mantissa)) => {
            if !mantissa.chars().all(|c| c == '0') {
                return None;
            }
            int_part.to_string()
        }
        None => data,
    };
    let value: i64 = int_part.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Read a percentage as a fraction; a trailing `%` sign is optional.
pub fn perc_to_float(text: &str) -> Option<f64> {
    let data = normalize_word(text).replace('%', "");
    to_float(&data).map(|f| f / 100.0)
}

/// Read a date in one of the supported layouts.
pub fn to_date(text: &str) -> Option<NaiveDate> {
    let data = normalize_word(text);
    DATE_FORMATS.iter().find_map(|(fmt, four_digit_year)| {
        NaiveDate::parse_from_str(&data, fmt)
            .ok()
            .filter(|d| !four_digit_year || d.year() >= 1000)
    })
}

/// Read a three-letter currency code, uppercased.
pub fn to_currency(text: &str) -> Option<String> {
    let code = normalize_word(text).to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

/// Read a yes/no flag. A lone `x` (a ticked box) counts as yes.
pub fn to_flag(text: &str) -> Option<bool> {
    let word = normalize_word(text).to_lowercase();
    if word == "x" {
        return Some(true);
    }
    crate::config::parse_bool(&word)
}

/// Normalize a numeric string to digits and at most one `.`; returns the sign separately.
fn prepare_numeric(text: &str) -> Option<(bool, String)> {
    let mut data = normalize_word(text);
    let negative = data.starts_with('-') || (data.starts_with('(') && data.ends_with(')'));
    if !is_plain_number(&data) {
        log::debug!("Forcing numeric read of {:?}", data);
        data.retain(|c| c.is_ascii_digit() || c == '.' || c == ',');
    }
    if data.is_empty() {
        return None;
    }

    if let (Some(dot), Some(comma)) = (data.find('.'), data.find(',')) {
        let thousands = if dot < comma { '.' } else { ',' };
        data.retain(|c| c != thousands);
    }
    Some((negative, data.replace(',', ".")))
}

/// `^\d+([.,]\d+)*$`
fn is_plain_number(s: &str) -> bool {
    !s.is_empty()
        && s.split(|c: char| c == '.' || c == ',')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// `^[1-9]\d{0,2}(\.\d{3}){min_groups,}$`
fn is_thousands_grouped(s: &str, min_groups: usize) -> bool {
    let mut parts = s.split('.');
    let head = match parts.next() {
        Some(h) => h,
        None => return false,
    };
    if head.is_empty() || head.len() > 3 || head.starts_with('0') {
        return false;
    }
    if !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut groups = 0;
    for part in parts {
        if part.len() != 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        groups += 1;
    }
    groups >= min_groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_float() {
        assert_eq!(to_float("1.234.567,89"), Some(1234567.89));
        assert_eq!(to_float("1,234,567.89"), Some(1234567.89));
        assert_eq!(to_float("12,5"), Some(12.5));
        assert_eq!(to_float(" 1 234,5 "), Some(1234.5));
        // a single dot group stays a decimal point
        assert_eq!(to_float("1.234"), Some(1.234));
        assert_eq!(to_float("1.234.567"), Some(1234567.0));
        assert_eq!(to_float("-3,5"), Some(-3.5));
        assert_eq!(to_float("n/a"), None);
    }

    #[test]
    fn test_to_int() {
        assert_eq!(to_int("1.234"), Some(1234));
        assert_eq!(to_int("1.234.567"), Some(1234567));
        assert_eq!(to_int("10,00"), Some(10));
        assert_eq!(to_int("10,50"), None);
        assert_eq!(to_int("EUR 5.000"), Some(5000));
    }

    #[test]
    fn test_perc_to_float() {
        assert_eq!(perc_to_float("2,5%"), Some(0.025));
        assert_eq!(perc_to_float("50"), Some(0.5));
        assert_eq!(perc_to_float("%"), None);
    }

    #[test]
    fn test_to_date() {
        let d = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        assert_eq!(to_date("2025-07-02"), Some(d));
        assert_eq!(to_date("02/07/2025"), Some(d));
        assert_eq!(to_date("02/07/25"), Some(d));
        assert_eq!(to_date("07-02-2025"), Some(d));
        assert_eq!(to_date("02-07-25"), Some(d));
        assert_eq!(to_date("July 2nd"), None);
    }

    #[test]
    fn test_to_currency_and_flag() {
        assert_eq!(to_currency(" eur "), Some("EUR".to_string()));
        assert_eq!(to_currency("EURO"), None);
        assert_eq!(to_flag("Yes"), Some(true));
        assert_eq!(to_flag("x"), Some(true));
        assert_eq!(to_flag("off"), Some(false));
        assert_eq!(to_flag("maybe"), None);
    }

    #[test]
    fn test_coerce_errors_carry_kind() {
        let err = coerce(ValueKind::Integer, "abc").unwrap_err();
        assert_eq!(err.kind, ValueKind::Integer);
        assert_eq!(err.to_string(), "cannot read \"abc\" as integer");
        assert_eq!(
            coerce(ValueKind::Text, "  ENI   SPA ").unwrap(),
            Value::Text("ENI SPA".into())
        );
    }
}
