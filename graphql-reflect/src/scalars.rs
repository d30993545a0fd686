//! Scalar coercions.
//!
//! A [`Coercion`] is the serialize / parse-value / parse-literal triple behind a scalar type.
//! Besides the GraphQL built-ins, [`Scalars::new`] registers the temporal scalars (`DateTime`,
//! `Date`, `Duration`, `Timezone`) and the 64-bit integer scalar `Long`.

use std::str::FromStr;
use std::sync::Arc;

use apollo_compiler::ast::Value as AstValue;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::SecondsFormat;
use chrono::TimeDelta;
use chrono::Utc;
use chrono_tz::Tz;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json_bytes::Value as JsonValue;

use crate::error::CoercionError;
use crate::error::json_kind;
use crate::meta::ClassName;
use crate::meta::Value;

/// Converts between application values and their wire representation.
pub trait Coercion: Send + Sync {
    /// The scalar's schema name.
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Whether GraphQL itself defines the scalar, in which case no definition is emitted.
    fn is_built_in(&self) -> bool {
        false
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError>;

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError>;

    fn parse_literal(&self, input: &AstValue) -> Result<Value, CoercionError> {
        let json = literal_to_json(input)
            .ok_or_else(|| CoercionError::new(self.name(), "variables are not literals"))?;
        self.parse_value(&json)
    }
}

/// Scalar coercions by class name.
#[derive(Clone)]
pub struct Scalars {
    coercions: IndexMap<ClassName, Arc<dyn Coercion>>,
}

impl Default for Scalars {
    fn default() -> Self {
        Self::new()
    }
}

impl Scalars {
    pub fn new() -> Self {
        let mut scalars = Scalars {
            coercions: IndexMap::new(),
        };
        scalars.register("String", StringCoercion);
        scalars.register("Boolean", BooleanCoercion);
        scalars.register("Int", IntCoercion);
        scalars.register("Float", FloatCoercion);
        scalars.register("ID", IdCoercion);
        scalars.register("Long", LongCoercion);
        scalars.register("DateTime", DateTimeCoercion);
        scalars.register("Date", DateCoercion);
        scalars.register("Duration", DurationCoercion);
        scalars.register("Timezone", TimezoneCoercion);
        scalars
    }

    pub fn register(&mut self, class: impl Into<ClassName>, coercion: impl Coercion + 'static) {
        self.coercions.insert(class.into(), Arc::new(coercion));
    }

    pub fn get(&self, class: &str) -> Option<&Arc<dyn Coercion>> {
        self.coercions.get(class)
    }

    pub fn contains(&self, class: &str) -> bool {
        self.coercions.contains_key(class)
    }
}

pub(crate) fn literal_to_json(value: &AstValue) -> Option<JsonValue> {
    Some(match value {
        AstValue::Null => JsonValue::Null,
        AstValue::Variable(_) => return None,
        AstValue::Boolean(b) => JsonValue::Bool(*b),
        AstValue::String(s) => JsonValue::String(s.as_str().into()),
        AstValue::Enum(name) => JsonValue::String(name.as_str().into()),
        AstValue::Int(i) => JsonValue::Number(serde_json::from_str(i.as_str()).ok()?),
        AstValue::Float(f) => JsonValue::Number(serde_json::from_str(f.as_str()).ok()?),
        AstValue::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| literal_to_json(item))
                .collect::<Option<_>>()?,
        ),
        AstValue::Object(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(name, value)| Some((name.as_str().into(), literal_to_json(value)?)))
                .collect::<Option<_>>()?,
        ),
    })
}

fn unexpected(scalar: &str, value: &Value) -> CoercionError {
    CoercionError::new(scalar, format!("unexpected value {value:?}"))
}

fn unexpected_input(scalar: &str, input: &JsonValue) -> CoercionError {
    CoercionError::new(scalar, format!("unexpected {} input", json_kind(input)))
}

struct StringCoercion;

impl Coercion for StringCoercion {
    fn name(&self) -> &str {
        "String"
    }

    fn is_built_in(&self) -> bool {
        true
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::String(s) => Ok(JsonValue::String(s.as_str().into())),
            Value::Enum(e) => Ok(JsonValue::String(e.constant.as_ref().into())),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::String(s) => Ok(Value::String(s.as_str().to_string())),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

struct BooleanCoercion;

impl Coercion for BooleanCoercion {
    fn name(&self) -> &str {
        "Boolean"
    }

    fn is_built_in(&self) -> bool {
        true
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::Boolean(b) => Ok(JsonValue::Bool(*b)),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

struct IntCoercion;

impl Coercion for IntCoercion {
    fn name(&self) -> &str {
        "Int"
    }

    fn is_built_in(&self) -> bool {
        true
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::Int(i) if i32::try_from(*i).is_ok() => Ok(JsonValue::Number((*i).into())),
            Value::Int(i) => Err(CoercionError::new(self.name(), format!("{i} overflows Int"))),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        input
            .as_i64()
            .filter(|i| i32::try_from(*i).is_ok())
            .map(Value::Int)
            .ok_or_else(|| unexpected_input(self.name(), input))
    }
}

struct FloatCoercion;

impl Coercion for FloatCoercion {
    fn name(&self) -> &str {
        "Float"
    }

    fn is_built_in(&self) -> bool {
        true
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        let float = match value {
            Value::Float(f) => *f,
            Value::Int(i) => *i as f64,
            other => return Err(unexpected(self.name(), other)),
        };
        serde_json::Number::from_f64(float)
            .map(JsonValue::Number)
            .ok_or_else(|| CoercionError::new(self.name(), format!("{float} is not finite")))
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        input
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| unexpected_input(self.name(), input))
    }
}

struct IdCoercion;

impl Coercion for IdCoercion {
    fn name(&self) -> &str {
        "ID"
    }

    fn is_built_in(&self) -> bool {
        true
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::String(s) => Ok(JsonValue::String(s.as_str().into())),
            Value::Int(i) => Ok(JsonValue::String(i.to_string().into())),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::String(s) => Ok(Value::String(s.as_str().to_string())),
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

/// 64-bit integers, accepted from any numeric or numeric-string input that is an exact integer.
struct LongCoercion;

impl LongCoercion {
    fn parse_text(&self, text: &str) -> Result<Value, CoercionError> {
        let decimal = Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|e| CoercionError::new(self.name(), format!("'{text}' is not a number: {e}")))?;
        if !decimal.fract().is_zero() {
            return Err(CoercionError::new(
                self.name(),
                format!("'{text}' has a fractional part"),
            ));
        }
        decimal
            .to_i64()
            .map(Value::Int)
            .ok_or_else(|| CoercionError::new(self.name(), format!("'{text}' overflows Long")))
    }
}

impl Coercion for LongCoercion {
    fn name(&self) -> &str {
        "Long"
    }

    fn description(&self) -> Option<&str> {
        Some("A 64-bit signed integer")
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::Int(i) => Ok(JsonValue::Number((*i).into())),
            Value::String(s) => self.parse_text(s).and_then(|v| self.serialize(&v)),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::Number(n) => self.parse_text(&n.to_string()),
            JsonValue::String(s) => self.parse_text(s.as_str()),
            other => Err(unexpected_input(self.name(), other)),
        }
    }

    fn parse_literal(&self, input: &AstValue) -> Result<Value, CoercionError> {
        match input {
            AstValue::Int(i) => self.parse_text(i.as_str()),
            AstValue::Float(f) => self.parse_text(f.as_str()),
            AstValue::String(s) => self.parse_text(s),
            _ => Err(CoercionError::new(self.name(), "expected a numeric literal")),
        }
    }
}

/// ISO-8601 instants, also accepting epoch milliseconds on input.
struct DateTimeCoercion;

impl Coercion for DateTimeCoercion {
    fn name(&self) -> &str {
        "DateTime"
    }

    fn description(&self) -> Option<&str> {
        Some("An ISO-8601 instant")
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::DateTime(instant) => Ok(JsonValue::String(
                instant
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                    .into(),
            )),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s.as_str())
                .map(|instant| Value::DateTime(instant.with_timezone(&Utc)))
                .map_err(|e| CoercionError::new(self.name(), e.to_string())),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(Value::DateTime)
                .ok_or_else(|| {
                    CoercionError::new(self.name(), format!("{n} is not a valid epoch millis"))
                }),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

/// ISO-8601 calendar dates.
struct DateCoercion;

impl Coercion for DateCoercion {
    fn name(&self) -> &str {
        "Date"
    }

    fn description(&self) -> Option<&str> {
        Some("An ISO-8601 date")
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::Date(date) => Ok(JsonValue::String(date.format("%Y-%m-%d").to_string().into())),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::String(s) => NaiveDate::parse_from_str(s.as_str(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| CoercionError::new(self.name(), e.to_string())),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

/// ISO-8601 durations (`PnDTnHnMn.nS`).
struct DurationCoercion;

impl Coercion for DurationCoercion {
    fn name(&self) -> &str {
        "Duration"
    }

    fn description(&self) -> Option<&str> {
        Some("An ISO-8601 duration")
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::Duration(duration) => Ok(JsonValue::String(format_duration(*duration).into())),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::String(s) => parse_duration(s.as_str())
                .map(Value::Duration)
                .ok_or_else(|| {
                    CoercionError::new(self.name(), format!("'{}' is not an ISO-8601 duration", s.as_str()))
                }),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

const NANOS_PER_SECOND: i128 = 1_000_000_000;

pub(crate) fn parse_duration(text: &str) -> Option<TimeDelta> {
    let (negative, rest) = match text.trim().as_bytes().first()? {
        b'-' => (true, &text.trim()[1..]),
        b'+' => (false, &text.trim()[1..]),
        _ => (false, text.trim()),
    };
    let rest = rest.strip_prefix(['P', 'p'])?;
    let (days, time) = match rest.find(['T', 't']) {
        Some(index) => (&rest[..index], Some(&rest[index + 1..])),
        None => (rest, None),
    };

    let mut nanos: i128 = 0;
    let mut components = 0;
    if !days.is_empty() {
        let count = days.strip_suffix(['D', 'd'])?;
        nanos += count.parse::<i128>().ok()? * 86_400 * NANOS_PER_SECOND;
        components += 1;
    }
    if let Some(mut time) = time {
        if time.is_empty() {
            return None;
        }
        for (unit, seconds) in [('H', 3_600), ('M', 60)] {
            if let Some(index) = time.find([unit, unit.to_ascii_lowercase()]) {
                nanos += time[..index].parse::<i128>().ok()? * seconds * NANOS_PER_SECOND;
                time = &time[index + 1..];
                components += 1;
            }
        }
        if !time.is_empty() {
            let seconds = time.strip_suffix(['S', 's'])?;
            nanos += parse_seconds(seconds)?;
            components += 1;
        }
    }
    if components == 0 {
        return None;
    }
    if negative {
        nanos = -nanos;
    }

    let magnitude = nanos.abs();
    let delta = TimeDelta::new(
        i64::try_from(magnitude / NANOS_PER_SECOND).ok()?,
        u32::try_from(magnitude % NANOS_PER_SECOND).ok()?,
    )?;
    Some(if nanos < 0 { -delta } else { delta })
}

fn parse_seconds(text: &str) -> Option<i128> {
    let (whole, fraction) = match text.find(['.', ',']) {
        Some(index) => (&text[..index], &text[index + 1..]),
        None => (text, ""),
    };
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let negative = whole.starts_with('-');
    let whole_nanos = whole.parse::<i128>().ok()? * NANOS_PER_SECOND;
    let fraction_nanos = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse::<i128>().ok()?
    };
    Some(if negative {
        whole_nanos - fraction_nanos
    } else {
        whole_nanos + fraction_nanos
    })
}

pub(crate) fn format_duration(duration: TimeDelta) -> String {
    if duration.is_zero() {
        return "PT0S".to_string();
    }
    let sign = if duration < TimeDelta::zero() { "-" } else { "" };
    let duration = duration.abs();
    let total = duration.num_seconds();
    let (hours, minutes, seconds) = (total / 3_600, (total % 3_600) / 60, total % 60);
    let nanos = duration.subsec_nanos();

    let mut out = format!("{sign}PT");
    if hours != 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes != 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds != 0 || nanos != 0 {
        out.push_str(&seconds.to_string());
        if nanos != 0 {
            let fraction = format!("{nanos:09}");
            out.push('.');
            out.push_str(fraction.trim_end_matches('0'));
        }
        out.push('S');
    }
    out
}

/// IANA zone ids.
struct TimezoneCoercion;

impl Coercion for TimezoneCoercion {
    fn name(&self) -> &str {
        "Timezone"
    }

    fn description(&self) -> Option<&str> {
        Some("An IANA time zone id")
    }

    fn serialize(&self, value: &Value) -> Result<JsonValue, CoercionError> {
        match value {
            Value::Timezone(zone) => Ok(JsonValue::String(zone.name().into())),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn parse_value(&self, input: &JsonValue) -> Result<Value, CoercionError> {
        match input {
            JsonValue::String(s) => s
                .as_str()
                .parse::<Tz>()
                .map(Value::Timezone)
                .map_err(|e| CoercionError::new(self.name(), e.to_string())),
            other => Err(unexpected_input(self.name(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ast::FloatValue;
    use apollo_compiler::ast::IntValue;
    use serde_json_bytes::json;

    use super::*;

    fn long() -> Arc<dyn Coercion> {
        Scalars::new().get("Long").unwrap().clone()
    }

    #[test]
    fn long_accepts_exact_integers() {
        let long = long();
        for input in [json!("42"), json!(42), json!(42.0)] {
            let parsed = long.parse_value(&input).unwrap();
            assert_eq!(parsed, Value::Int(42), "{input:?}");
            let serialized = long.serialize(&parsed).unwrap();
            assert_eq!(long.parse_value(&serialized).unwrap(), Value::Int(42));
        }
    }

    #[test]
    fn long_rejects_fractions_and_overflow() {
        let long = long();
        assert!(long.parse_value(&json!(42.5)).is_err());
        assert!(long.parse_value(&json!("42.5")).is_err());
        assert!(long.parse_value(&json!("9223372036854775808")).is_err());
        assert!(long.parse_value(&json!(true)).is_err());
    }

    #[test]
    fn long_literals() {
        let long = long();
        assert_eq!(
            long.parse_literal(&AstValue::Int(IntValue::new_parsed("9007199254740993")))
                .unwrap(),
            Value::Int(9_007_199_254_740_993)
        );
        assert_eq!(
            long.parse_literal(&AstValue::Float(FloatValue::new_parsed("42.0")))
                .unwrap(),
            Value::Int(42)
        );
        assert!(
            long.parse_literal(&AstValue::Float(FloatValue::new_parsed("42.5")))
                .is_err()
        );
    }

    #[test]
    fn date_time_accepts_iso_and_epoch_millis() {
        let scalars = Scalars::new();
        let date_time = scalars.get("DateTime").unwrap();
        let from_iso = date_time
            .parse_value(&json!("2024-03-01T10:15:30+01:00"))
            .unwrap();
        let from_millis = date_time.parse_value(&json!(1709284530000_i64)).unwrap();
        assert_eq!(from_iso, from_millis);
        assert_eq!(
            date_time.serialize(&from_iso).unwrap(),
            json!("2024-03-01T09:15:30Z")
        );
        assert!(date_time.parse_value(&json!("yesterday")).is_err());
    }

    #[test]
    fn date_round_trips() {
        let scalars = Scalars::new();
        let date = scalars.get("Date").unwrap();
        let parsed = date.parse_value(&json!("2024-02-29")).unwrap();
        assert_eq!(date.serialize(&parsed).unwrap(), json!("2024-02-29"));
        assert!(date.parse_value(&json!("2023-02-29")).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(
            parse_duration("PT8H6M12.345S"),
            TimeDelta::new(8 * 3600 + 6 * 60 + 12, 345_000_000)
        );
        assert_eq!(parse_duration("P2D"), Some(TimeDelta::days(2)));
        assert_eq!(parse_duration("-PT15M"), Some(-TimeDelta::minutes(15)));
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("8 hours"), None);

        assert_eq!(format_duration(TimeDelta::zero()), "PT0S");
        assert_eq!(format_duration(TimeDelta::days(2)), "PT48H");
        assert_eq!(
            format_duration(TimeDelta::new(29_172, 345_000_000).unwrap()),
            "PT8H6M12.345S"
        );
        assert_eq!(format_duration(-TimeDelta::minutes(15)), "-PT15M");
    }

    #[test]
    fn timezones() {
        let scalars = Scalars::new();
        let timezone = scalars.get("Timezone").unwrap();
        let parsed = timezone.parse_value(&json!("Pacific/Auckland")).unwrap();
        assert_eq!(parsed, Value::Timezone(chrono_tz::Pacific::Auckland));
        assert_eq!(timezone.serialize(&parsed).unwrap(), json!("Pacific/Auckland"));
        assert!(timezone.parse_value(&json!("Mars/Olympus_Mons")).is_err());
    }

    #[test]
    fn int_stays_in_range() {
        let scalars = Scalars::new();
        let int = scalars.get("Int").unwrap();
        assert_eq!(int.parse_value(&json!(7)).unwrap(), Value::Int(7));
        assert!(int.parse_value(&json!(3_000_000_000_i64)).is_err());
        assert!(int.serialize(&Value::Int(3_000_000_000)).is_err());
    }
}
