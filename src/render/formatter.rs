//! Value formatting
//!
//! Turns typed values into display text using a field's render hints. The full
//! form is used for table cells and forms; the compact form is a fallback when
//! the full text of a list element does not fit.

use crate::event::{
    RecordedObject, Value, TYPE_CLASS, TYPE_CLASS_LOADER, TYPE_METHOD, TYPE_STACK_FRAME,
    TYPE_STACK_TRACE, TYPE_THREAD, TYPE_THREAD_GROUP,
};
use crate::query::{Field, TimeKind, UnitKind};
use chrono::{DateTime, TimeDelta, Utc};

const BYTE_UNITS: &[&str] = &["bytes", "kB", "MB", "GB", "TB", "PB"];
const BIT_UNITS: &[&str] = &["bits", "kbit", "Mbit", "Gbit", "Tbit", "Pbit"];

/// Full text of a value
pub fn format(field: &Field, value: &Value) -> String {
    format_value(field, value, false)
}

/// Short text of a value
pub fn format_compact(field: &Field, value: &Value) -> String {
    format_value(field, value, true)
}

/// One text per line for values that span several lines in a cell
pub fn format_lines(field: &Field, value: &Value, compact: bool) -> Vec<String> {
    match value {
        Value::Array(values) => values
            .iter()
            .map(|v| format_value(field, v, compact))
            .collect(),
        Value::Object(o) if o.is(TYPE_STACK_TRACE) => frames(o)
            .iter()
            .map(|frame| format_value(field, frame, compact))
            .collect(),
        other => vec![format_value(field, other, compact)],
    }
}

fn format_value(field: &Field, value: &Value, compact: bool) -> String {
    match value {
        Value::Null => field.missing_text.clone(),
        Value::Boolean(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Instant(t) => format_instant(t, field.ms_precision),
        Value::Duration(d) => format_duration(d),
        Value::Long(v) => format_number(field, *v as f64, Some(*v)),
        Value::Double(v) => format_number(field, *v, None),
        Value::Object(o) => format_object(o, compact),
        Value::Array(values) => values
            .iter()
            .map(|v| format_value(field, v, compact))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn format_number(field: &Field, value: f64, integral: Option<i64>) -> String {
    if field.time == TimeKind::Span {
        if let Some(nanos) = integral {
            return format_duration(&TimeDelta::nanoseconds(nanos));
        }
    }
    match field.unit {
        UnitKind::Percentage => format!("{:.2}%", value * 100.0),
        UnitKind::MemoryAddress => match integral {
            Some(address) => format!("0x{:08X}", address),
            None => format!("{}", value),
        },
        UnitKind::Bytes => format_amount(value, BYTE_UNITS, ""),
        UnitKind::BytesPerSecond => format_amount(value, BYTE_UNITS, "/s"),
        UnitKind::Bits => format_amount(value, BIT_UNITS, ""),
        UnitKind::BitsPerSecond => format_amount(value, BIT_UNITS, "/s"),
        UnitKind::None => match integral {
            Some(v) => v.to_string(),
            None => format_fraction(value),
        },
    }
}

fn format_fraction(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{:.0}", value);
    }
    format!("{:.2}", value)
}

/// Amount with a 1024-based unit, e.g. `1.5 MB`
pub fn format_amount(value: f64, units: &[&str], suffix: &str) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let mut scaled = value;
    let mut unit = 0;
    while scaled.abs() >= 1024.0 && unit + 1 < units.len() {
        scaled /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}{}", scaled.round() as i64, units[0], suffix)
    } else {
        format!("{:.1} {}{}", scaled, units[unit], suffix)
    }
}

/// Length of time with an adaptive unit
pub fn format_duration(duration: &TimeDelta) -> String {
    if *duration == TimeDelta::MAX {
        return "Indefinite".to_string();
    }
    let nanos = match duration.num_nanoseconds() {
        Some(nanos) => nanos,
        None => return format!("{} h", duration.num_hours()),
    };
    let sign = if nanos < 0 { "-" } else { "" };
    let n = nanos.unsigned_abs() as f64;
    if n < 1_000.0 {
        format!("{}{} ns", sign, n)
    } else if n < 1_000_000.0 {
        format!("{}{:.1} us", sign, n / 1_000.0)
    } else if n < 1_000_000_000.0 {
        format!("{}{:.1} ms", sign, n / 1_000_000.0)
    } else if n < 60_000_000_000.0 {
        format!("{}{:.1} s", sign, n / 1_000_000_000.0)
    } else {
        let seconds = duration.num_seconds().unsigned_abs();
        let (hours, minutes, seconds) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
        if hours > 0 {
            format!("{}{} h {} min", sign, hours, minutes)
        } else {
            format!("{}{} min {} s", sign, minutes, seconds)
        }
    }
}

/// Time of day, optionally with milliseconds
pub fn format_instant(time: &DateTime<Utc>, ms_precision: bool) -> String {
    if ms_precision {
        time.format("%H:%M:%S%.3f").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

fn format_object(object: &RecordedObject, compact: bool) -> String {
    match object.type_name.as_str() {
        TYPE_THREAD | TYPE_CLASS_LOADER | TYPE_THREAD_GROUP => object.display_name(),
        TYPE_CLASS => {
            let name = object.display_name();
            if compact {
                simple_class_name(&name).to_string()
            } else {
                name
            }
        }
        TYPE_METHOD => format_method(object, compact),
        TYPE_STACK_FRAME => {
            let method = object
                .get_object("method")
                .map(|m| format_method(m, compact))
                .unwrap_or_default();
            match object.get_long("lineNumber") {
                Some(line) if !compact && line >= 0 => format!("{} line: {}", method, line),
                _ => method,
            }
        }
        TYPE_STACK_TRACE => frames(object)
            .iter()
            .map(|f| match f {
                Value::Object(frame) => format_object(frame, compact),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => {
            if object.fields.is_empty() {
                return object.type_name.clone();
            }
            object
                .fields
                .iter()
                .map(|(name, value)| match value {
                    Value::Object(o) => format!("{}={}", name, format_object(o, compact)),
                    other => format!("{}={}", name, other),
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

fn frames(trace: &RecordedObject) -> &[Value] {
    trace.get("frames").and_then(Value::as_array).unwrap_or(&[])
}

fn simple_class_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn format_method(method: &RecordedObject, compact: bool) -> String {
    let class = method
        .get_object("type")
        .map(|c| c.display_name())
        .unwrap_or_default();
    let name = method.get_str("name").unwrap_or("");
    if compact {
        return format!("{}.{}()", simple_class_name(&class), name);
    }
    let parameters = method
        .get_str("descriptor")
        .and_then(decode_parameters)
        .map(|p| p.join(", "))
        .unwrap_or_default();
    format!("{}.{}({})", class, name, parameters)
}

/// Parameter types of a JVM method descriptor, e.g. `(ILjava/lang/String;)V`
pub fn decode_parameters(descriptor: &str) -> Option<Vec<String>> {
    let inner = descriptor.strip_prefix('(')?;
    let end = inner.find(')')?;
    let mut chars = inner[..end].chars();
    let mut parameters = Vec::new();
    let mut dimensions = 0;

    while let Some(c) = chars.next() {
        let base = match c {
            '[' => {
                dimensions += 1;
                continue;
            }
            'B' => "byte".to_string(),
            'C' => "char".to_string(),
            'D' => "double".to_string(),
            'F' => "float".to_string(),
            'I' => "int".to_string(),
            'J' => "long".to_string(),
            'S' => "short".to_string(),
            'Z' => "boolean".to_string(),
            'L' => {
                let class: String = chars.by_ref().take_while(|c| *c != ';').collect();
                class.replace('/', ".")
            }
            _ => return None,
        };
        parameters.push(format!("{}{}", base, "[]".repeat(dimensions)));
        dimensions = 0;
    }

    Some(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::NumericKind;

    fn field() -> Field {
        Field::constant("x", Value::Null)
    }

    fn method() -> RecordedObject {
        RecordedObject::new(TYPE_METHOD)
            .with("type", RecordedObject::new(TYPE_CLASS).with("name", "java.util.HashMap"))
            .with("name", "putVal")
            .with("descriptor", "(ILjava/lang/Object;[[BZ)V")
    }

    #[test]
    fn test_missing_text() {
        let mut f = field();
        assert_eq!(format(&f, &Value::Null), "N/A");
        f.missing_text = String::new();
        assert_eq!(format(&f, &Value::Null), "");
    }

    #[test]
    fn test_units() {
        let mut f = field();
        f.numeric = NumericKind::Integral;
        f.unit = UnitKind::Bytes;
        assert_eq!(format(&f, &Value::Long(512)), "512 bytes");
        assert_eq!(format(&f, &Value::Long(1536)), "1.5 kB");
        f.unit = UnitKind::BytesPerSecond;
        assert_eq!(format(&f, &Value::Long(3 * 1024 * 1024)), "3.0 MB/s");
        f.unit = UnitKind::Percentage;
        assert_eq!(format(&f, &Value::Double(0.1234)), "12.34%");
        f.unit = UnitKind::MemoryAddress;
        assert_eq!(format(&f, &Value::Long(0xBEEF)), "0x0000BEEF");
    }

    #[test]
    fn test_numbers() {
        let f = field();
        assert_eq!(format(&f, &Value::Long(-42)), "-42");
        assert_eq!(format(&f, &Value::Double(2.5)), "2.50");
        assert_eq!(format(&f, &Value::Double(3.0)), "3");
    }

    #[test]
    fn test_durations() {
        assert_eq!(format_duration(&TimeDelta::nanoseconds(250)), "250 ns");
        assert_eq!(format_duration(&TimeDelta::microseconds(1500)), "1.5 ms");
        assert_eq!(format_duration(&TimeDelta::milliseconds(2500)), "2.5 s");
        assert_eq!(format_duration(&TimeDelta::seconds(125)), "2 min 5 s");
        assert_eq!(format_duration(&TimeDelta::seconds(7320)), "2 h 2 min");
        assert_eq!(format_duration(&TimeDelta::MAX), "Indefinite");

        let mut f = field();
        f.time = TimeKind::Span;
        assert_eq!(format(&f, &Value::Long(2_000_000)), "2.0 ms");
    }

    #[test]
    fn test_instants() {
        let time = DateTime::from_timestamp(1_705_329_342, 123_000_000).unwrap();
        let mut f = field();
        assert_eq!(format(&f, &Value::Instant(time)), "14:35:42");
        f.ms_precision = true;
        assert_eq!(format(&f, &Value::Instant(time)), "14:35:42.123");
    }

    #[test]
    fn test_methods_and_frames() {
        let f = field();
        let method = method();
        assert_eq!(
            format(&f, &method.clone().into()),
            "java.util.HashMap.putVal(int, java.lang.Object, byte[][], boolean)"
        );
        assert_eq!(format_compact(&f, &method.clone().into()), "HashMap.putVal()");

        let frame: Value = RecordedObject::new(TYPE_STACK_FRAME)
            .with("method", method)
            .with("lineNumber", 631i64)
            .into();
        assert!(format(&f, &frame).ends_with("boolean) line: 631"));
        assert_eq!(format_compact(&f, &frame), "HashMap.putVal()");

        let trace: Value = RecordedObject::new(TYPE_STACK_TRACE)
            .with("frames", vec![frame.clone(), frame])
            .into();
        assert_eq!(format_lines(&f, &trace, true), vec!["HashMap.putVal()", "HashMap.putVal()"]);
    }

    #[test]
    fn test_decode_parameters() {
        assert_eq!(decode_parameters("()V"), Some(vec![]));
        assert_eq!(
            decode_parameters("(J[Ljava/lang/String;)I"),
            Some(vec!["long".to_string(), "java.lang.String[]".to_string()])
        );
        assert_eq!(decode_parameters("V"), None);
        assert_eq!(decode_parameters("(Q)V"), None);
    }

    #[test]
    fn test_arrays() {
        let f = field();
        let values = Value::Array(vec![Value::from("a"), Value::Null, Value::Long(3)]);
        assert_eq!(format(&f, &values), "a, N/A, 3");
        assert_eq!(format_lines(&f, &values, false), vec!["a", "N/A", "3"]);
    }
}
