//! Typed accessors over loosely shaped upstream JSON.

use serde_json::{Map, Value};

use super::ExtractionFailure;

/// Short name of a JSON value's type, for error messages.
pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn as_object<'a>(
    value: &'a Value,
    field: &str,
) -> Result<&'a Map<String, Value>, ExtractionFailure> {
    value.as_object().ok_or_else(|| ExtractionFailure::WrongType {
        field: field.to_string(),
        found: kind(value),
    })
}

/// Required member of an object. `null` counts as missing.
pub(crate) fn required<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Value, ExtractionFailure> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(ExtractionFailure::MissingField(key.to_string())),
        Some(v) => Ok(v),
    }
}

pub(crate) fn required_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a [Value], ExtractionFailure> {
    let value = required(obj, key)?;
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ExtractionFailure::WrongType {
            field: key.to_string(),
            found: kind(value),
        })
}

pub(crate) fn required_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ExtractionFailure> {
    let value = required(obj, key)?;
    value.as_str().ok_or_else(|| ExtractionFailure::WrongType {
        field: key.to_string(),
        found: kind(value),
    })
}

/// Integer view of a number or numeric string; floats are truncated toward zero.
pub(crate) fn to_int(value: &Value, field: &str) -> Result<i64, ExtractionFailure> {
    let wrong = || ExtractionFailure::WrongType {
        field: field.to_string(),
        found: kind(value),
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(ExtractionFailure::Overflow(field.to_string()))
            } else {
                n.as_f64()
                    .ok_or_else(wrong)
                    .and_then(|f| truncate(f, field))
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(i);
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => truncate(f, field),
                _ => Err(wrong()),
            }
        }
        _ => Err(wrong()),
    }
}

fn truncate(f: f64, field: &str) -> Result<i64, ExtractionFailure> {
    let t = f.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(ExtractionFailure::Overflow(field.to_string()));
    }
    Ok(t as i64)
}

/// `entry[side][field]`, 0 when the side or the field is absent.
pub(crate) fn leg_int(
    entry: &Map<String, Value>,
    side: &str,
    field: &str,
) -> Result<i64, ExtractionFailure> {
    let Some(leg) = entry.get(side).and_then(Value::as_object) else {
        return Ok(0);
    };
    match leg.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => to_int(v, &format!("{side}.{field}")),
    }
}

pub(crate) fn checked_sum(
    acc: i64,
    add: i64,
    column: &str,
) -> Result<i64, ExtractionFailure> {
    acc.checked_add(add)
        .ok_or_else(|| ExtractionFailure::Overflow(column.to_string()))
}
