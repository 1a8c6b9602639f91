//! Cell normalisation and per-column type resolution.

use std::collections::BTreeSet;

use crate::data::model::{DType, Scalar};

/// Trim strings, turn null tokens and non-finite floats into `Null`, and
/// fold `-0.0` into `0.0`.
pub(crate) fn normalize_cell(value: Scalar, trim: bool, null_tokens: &[String]) -> Scalar {
    match value {
        Scalar::String(s) => {
            let text = if trim { s.trim() } else { s.as_str() };
            if null_tokens.iter().any(|token| token == text) {
                Scalar::Null
            } else if text.len() != s.len() {
                Scalar::String(text.to_string())
            } else {
                Scalar::String(s)
            }
        }
        Scalar::Float(f) if !f.is_finite() => Scalar::Null,
        Scalar::Float(f) => Scalar::Float(positive_zero(f)),
        other => other,
    }
}

/// Pick the dtype a column should be coerced to.
///
/// `declared` is only consulted when the column holds no non-null value.
pub(crate) fn resolve_dtype(declared: DType, values: &[Scalar]) -> DType {
    let observed: BTreeSet<DType> = values.iter().filter_map(Scalar::dtype).collect();
    match observed.len() {
        0 if declared == DType::Mixed => DType::Float,
        0 => declared,
        1 => observed.into_iter().next().unwrap_or(declared),
        _ if observed.iter().all(|d| d.is_numeric()) => DType::Float,
        _ => {
            let candidates: BTreeSet<DType> = values
                .iter()
                .filter(|v| !v.is_null())
                .map(candidate_dtype)
                .collect();
            if candidates.iter().all(|d| *d == DType::Bool) {
                DType::Bool
            } else if candidates.iter().all(|d| *d == DType::Integer) {
                DType::Integer
            } else if candidates.iter().all(|d| d.is_numeric()) {
                DType::Float
            } else {
                DType::String
            }
        }
    }
}

/// The narrowest dtype a single value could be read as.
fn candidate_dtype(value: &Scalar) -> DType {
    match value {
        Scalar::String(s) => {
            if parse_bool_word(s).is_some() {
                DType::Bool
            } else if s.parse::<i64>().is_ok() {
                DType::Integer
            } else if parse_finite(s).is_some() {
                DType::Float
            } else {
                DType::String
            }
        }
        other => other.dtype().unwrap_or(DType::String),
    }
}

fn parse_bool_word(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(positive_zero)
}

fn positive_zero(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Convert a value to `target`. `None` means the value is malformed for
/// that dtype. Nulls always pass through.
pub(crate) fn coerce(value: &Scalar, target: DType) -> Option<Scalar> {
    if value.is_null() {
        return Some(Scalar::Null);
    }
    match target {
        DType::Integer => match value {
            Scalar::Integer(i) => Some(Scalar::Integer(*i)),
            Scalar::Float(f) => float_to_integer(*f).map(Scalar::Integer),
            Scalar::Bool(b) => Some(Scalar::Integer(i64::from(*b))),
            Scalar::String(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| parse_finite(s).and_then(float_to_integer))
                .map(Scalar::Integer),
            Scalar::Null => Some(Scalar::Null),
        },
        DType::Float => match value {
            Scalar::Integer(i) => Some(Scalar::Float(*i as f64)),
            Scalar::Float(f) => Some(Scalar::Float(*f)),
            Scalar::Bool(b) => Some(Scalar::Float(if *b { 1.0 } else { 0.0 })),
            Scalar::String(s) => parse_finite(s).map(Scalar::Float),
            Scalar::Null => Some(Scalar::Null),
        },
        DType::Bool => match value {
            Scalar::Bool(b) => Some(Scalar::Bool(*b)),
            Scalar::Integer(0) => Some(Scalar::Bool(false)),
            Scalar::Integer(1) => Some(Scalar::Bool(true)),
            Scalar::String(s) => match s.as_str() {
                "1" => Some(Scalar::Bool(true)),
                "0" => Some(Scalar::Bool(false)),
                other => parse_bool_word(other).map(Scalar::Bool),
            },
            _ => None,
        },
        DType::String | DType::Mixed => match value {
            Scalar::String(s) => Some(Scalar::String(s.clone())),
            other => Some(Scalar::String(other.to_string())),
        },
    }
}
