//! Value coercions for DATE/JSON/INT/BOOL/FLOAT
//!
//! Dates are rendered in UTC. DATE arguments are `U` (unix seconds), `u`
//! (unix millis, the default), `c` (ISO-8601) or a dayjs-style pattern such
//! as `YYYY-MM-DD HH:mm:ss`. Text inside `[...]` is emitted literally.

use super::query::{Format, FormatKind};
use crate::types::{parse_number, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Apply a format to a value. Failed coercions produce `Null`.
pub fn apply(format: &Format, value: &Value) -> Value {
    match format.kind {
        FormatKind::Bool => to_bool(value),
        FormatKind::Int => to_int(value),
        FormatKind::Float => to_float(value),
        FormatKind::Json => to_json(value),
        FormatKind::Date => match parse_timestamp(value) {
            Some(ts) => render_timestamp(&ts, format.args.as_deref()),
            None => Value::Null,
        },
    }
}

fn to_bool(value: &Value) -> Value {
    let b = match value {
        Value::Bool(b) => *b,
        Value::Text(s) => s == "true" || s == "1",
        Value::Integer(i) => *i == 1,
        Value::Float(f) => *f == 1.0,
        _ => false,
    };
    Value::Bool(b)
}

fn to_int(value: &Value) -> Value {
    match value {
        Value::Integer(_) | Value::Float(_) => value.clone(),
        Value::Text(s) => leading_integer(s).map(Value::Integer).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn to_float(value: &Value) -> Value {
    match value {
        Value::Integer(_) | Value::Float(_) => value.clone(),
        Value::Text(s) => leading_float(s).map(Value::Float).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn to_json(value: &Value) -> Value {
    match value {
        Value::Text(s) => serde_json::from_str::<serde_json::Value>(s)
            .map(Value::from)
            .unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// `"42abc"` -> 42, `"  -7"` -> -7
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    s[..end].parse().ok()
}

/// Longest numeric prefix, `"3.5kg"` -> 3.5
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Some(f) = parse_number(s) {
        return Some(f);
    }
    (1..s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

/// Interpret a value as an instant: numbers are epoch millis, text is
/// RFC 3339, `YYYY-MM-DD[ HH:mm:ss]` or numeric millis.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Integer(ms) => Utc.timestamp_millis_opt(*ms).single(),
        Value::Float(ms) if ms.is_finite() => Utc.timestamp_millis_opt(*ms as i64).single(),
        Value::Text(s) => parse_timestamp_text(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    parse_number(s).and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
}

/// Render an instant for a DATE format argument (or NOW argument)
pub fn render_timestamp(ts: &DateTime<Utc>, args: Option<&str>) -> Value {
    match args {
        None | Some("u") => Value::Integer(ts.timestamp_millis()),
        Some("U") => Value::Integer(ts.timestamp()),
        Some("c") => Value::Text(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Some(pattern) => Value::Text(render_pattern(ts, pattern)),
    }
}

// Longest tokens first so `MMMM` wins over `MM`
const TOKENS: &[&str] = &[
    "YYYY", "MMMM", "dddd", "SSS", "MMM", "ddd", "YY", "MM", "DD", "dd", "HH", "hh", "mm", "ss",
    "ZZ", "M", "D", "d", "H", "h", "m", "s", "A", "a", "Z", "X", "x",
];

/// dayjs-style pattern rendering
pub fn render_pattern(ts: &DateTime<Utc>, pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }
        match TOKENS.iter().find(|token| rest.starts_with(*token)) {
            Some(token) => {
                out.push_str(&render_token(ts, token));
                rest = &rest[token.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}

fn render_token(ts: &DateTime<Utc>, token: &str) -> String {
    let spec = match token {
        "YYYY" => "%Y",
        "YY" => "%y",
        "MMMM" => "%B",
        "MMM" => "%b",
        "MM" => "%m",
        "M" => "%-m",
        "DD" => "%d",
        "D" => "%-d",
        "dddd" => "%A",
        "ddd" => "%a",
        "dd" => return ts.format("%a").to_string().chars().take(2).collect(),
        "d" => return ts.weekday().num_days_from_sunday().to_string(),
        "HH" => "%H",
        "H" => "%-H",
        "hh" => "%I",
        "h" => "%-I",
        "mm" => "%M",
        "m" => "%-M",
        "ss" => "%S",
        "s" => "%-S",
        "SSS" => "%3f",
        "A" => "%p",
        "a" => "%P",
        "Z" => "%:z",
        "ZZ" => "%z",
        "X" => return ts.timestamp().to_string(),
        "x" => return ts.timestamp_millis().to_string(),
        other => return other.to_string(),
    };
    ts.format(spec).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_render_pattern() {
        let ts = instant();
        assert_eq!(render_pattern(&ts, "YYYY-MM-DD HH:mm:ss"), "2024-03-05 14:07:09");
        assert_eq!(render_pattern(&ts, "D/M/YY h:mm A"), "5/3/24 2:07 PM");
        assert_eq!(render_pattern(&ts, "dddd, MMMM D"), "Tuesday, March 5");
        assert_eq!(render_pattern(&ts, "[Day] d"), "Day 2");
    }

    #[test]
    fn test_render_timestamp_tokens() {
        let ts = instant();
        assert_eq!(render_timestamp(&ts, None), Value::Integer(1_709_647_629_000));
        assert_eq!(render_timestamp(&ts, Some("U")), Value::Integer(1_709_647_629));
        assert_eq!(
            render_timestamp(&ts, Some("c")),
            Value::from("2024-03-05T14:07:09.000Z")
        );
    }

    #[test]
    fn test_date_format_parses_text_and_millis() {
        let format = Format::with_args(FormatKind::Date, "YYYY-MM-DD");
        assert_eq!(apply(&format, &Value::from("2024-03-05T14:07:09Z")), Value::from("2024-03-05"));
        assert_eq!(apply(&format, &Value::Integer(1_709_647_629_000)), Value::from("2024-03-05"));
        assert_eq!(apply(&format, &Value::from("2024-03-05")), Value::from("2024-03-05"));
        assert_eq!(apply(&format, &Value::from("not a date")), Value::Null);
    }

    #[test]
    fn test_scalar_formats() {
        let bool_fmt = Format::new(FormatKind::Bool);
        assert_eq!(apply(&bool_fmt, &Value::from("true")), Value::Bool(true));
        assert_eq!(apply(&bool_fmt, &Value::from("1")), Value::Bool(true));
        assert_eq!(apply(&bool_fmt, &Value::Integer(1)), Value::Bool(true));
        assert_eq!(apply(&bool_fmt, &Value::from("yes")), Value::Bool(false));
        assert_eq!(apply(&bool_fmt, &Value::Bool(true)), Value::Bool(true));

        let int_fmt = Format::new(FormatKind::Int);
        assert_eq!(apply(&int_fmt, &Value::from("42abc")), Value::Integer(42));
        assert_eq!(apply(&int_fmt, &Value::from("abc")), Value::Null);
        assert_eq!(apply(&int_fmt, &Value::Float(2.5)), Value::Float(2.5));

        let float_fmt = Format::new(FormatKind::Float);
        assert_eq!(apply(&float_fmt, &Value::from("3.5kg")), Value::Float(3.5));

        let json_fmt = Format::new(FormatKind::Json);
        let parsed = apply(&json_fmt, &Value::from(r#"{"a": [1]}"#));
        assert_eq!(parsed.get_path("a.0"), Some(&Value::Integer(1)));
        assert_eq!(apply(&json_fmt, &Value::from("{broken")), Value::Null);
    }
}
