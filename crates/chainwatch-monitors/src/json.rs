//! Field extraction from gateway responses.
//!
//! Gateways disagree on whether numbers are JSON numbers or strings
//! (`"height": "1234"`), so every accessor accepts both.

use serde_json::Value;

/// Value at `pointer`. An empty pointer is the document itself.
pub fn lookup<'a>(doc: &'a Value, pointer: &str) -> Option<&'a Value> {
    doc.pointer(pointer)
}

/// Numeric value of a number, numeric string or boolean.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Non-negative integer value of a number or numeric string.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Largest magnitude below which every integer is exact in an `f64`.
const EXACT_F64_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Text of a string or number, for labels and raw amounts.
///
/// Integers above `u64` arrive as floats and print in exponent form, so
/// floats at or beyond 2^53 are refused rather than rendered inexactly.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .filter(|f| f.abs() < EXACT_F64_LIMIT)
            .map(|_| n.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn f64_at(doc: &Value, pointer: &str) -> Option<f64> {
    lookup(doc, pointer).and_then(as_f64)
}

pub fn u64_at(doc: &Value, pointer: &str) -> Option<u64> {
    lookup(doc, pointer).and_then(as_u64)
}

pub fn text_at(doc: &Value, pointer: &str) -> Option<String> {
    lookup(doc, pointer).and_then(as_text)
}

/// Replace every `{key}` in `template` with `value`.
pub fn fill(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{key}}}"), value)
}
