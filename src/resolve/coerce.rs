//! Literal type inference for raw attribute values.
//!
//! Raw text (from a phrase, a snapshot or a config file) becomes a typed
//! [`Value`] so it can be matched against attributes of any value type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::Value;

/// Timestamp layouts accepted, tried in order.
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Infer the literal type of `raw`.
///
/// Order: finite number (integral → `Long`, else `Double`), timestamp,
/// bounded integer, boolean (any case), string.
pub fn coerce(raw: &str) -> Value {
    if let Some(v) = coerce_number(raw) {
        return v;
    }
    if let Some(dt) = coerce_datetime(raw) {
        return Value::DateTime(dt);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Long(i);
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    Value::String(raw.to_owned())
}

fn coerce_number(raw: &str) -> Option<Value> {
    let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() != 0.0 {
        return Some(Value::Double(f));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::Long(i));
    }
    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::Long(f as i64))
    } else {
        Some(Value::Double(f))
    }
}

fn coerce_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
