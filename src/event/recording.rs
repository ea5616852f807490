//! JSON recordings
//!
//! A recording file declares its event types and lists events in encounter order:
//!
//! ```text
//! {
//!   "types":  [ { "id": 1, "name": "jdk.GarbageCollection", "fields": [...] } ],
//!   "events": [ { "type": "jdk.GarbageCollection", "values": { "gcId": 7, ... } } ]
//! }
//! ```
//!
//! Values are converted using the field descriptors: timestamps accept RFC 3339
//! text or epoch nanoseconds, timespans accept nanoseconds, structured values are
//! JSON objects with an optional `"$id"` identity.

use crate::event::error::{RecordingError, RecordingResult};
use crate::event::types::{EventType, ValueDescriptor, TYPE_STRING};
use crate::event::value::{RecordedEvent, RecordedObject, Value};
use crate::event::EventSource;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

#[derive(Deserialize)]
struct RecordingFile {
    #[serde(default)]
    types: Vec<EventType>,
    #[serde(default)]
    events: Vec<EventEntry>,
}

#[derive(Deserialize)]
struct EventEntry {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    values: Map<String, JsonValue>,
}

/// An in-memory recording that can be replayed as an event source
#[derive(Debug, Clone, Default)]
pub struct Recording {
    types: Vec<Arc<EventType>>,
    events: Vec<RecordedEvent>,
}

impl Recording {
    /// Create a recording from already decoded types and events
    pub fn new(types: Vec<Arc<EventType>>, events: Vec<RecordedEvent>) -> Self {
        Self { types, events }
    }

    /// Load a recording from a JSON file
    pub fn open(path: impl AsRef<Path>) -> RecordingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let recording = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.display(),
            types = recording.types.len(),
            events = recording.events.len(),
            "Loaded recording"
        );
        Ok(recording)
    }

    /// Decode a recording from JSON text
    pub fn from_json(text: &str) -> RecordingResult<Self> {
        let file: RecordingFile = serde_json::from_str(text)?;
        let types: Vec<Arc<EventType>> = file.types.into_iter().map(Arc::new).collect();

        let mut by_name: HashMap<&str, &Arc<EventType>> = HashMap::new();
        for t in &types {
            by_name.insert(t.name.as_str(), t);
        }

        let mut events = Vec::with_capacity(file.events.len());
        for entry in &file.events {
            let event_type = by_name
                .get(entry.type_name.as_str())
                .copied()
                .or_else(|| types.iter().find(|t| t.simple_name() == entry.type_name))
                .ok_or_else(|| RecordingError::UnknownEventType(entry.type_name.clone()))?;
            events.push(decode_event(event_type, &entry.values)?);
        }

        Ok(Self::new(types, events))
    }

    /// Decoded events in encounter order
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Declared event types
    pub fn types(&self) -> &[Arc<EventType>] {
        &self.types
    }

    /// Earliest event start time
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.events.iter().filter_map(RecordedEvent::start_time).min()
    }

    /// Latest event end time
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.events.iter().filter_map(RecordedEvent::end_time).max()
    }
}

impl EventSource for Recording {
    fn event_types(&self) -> Vec<Arc<EventType>> {
        self.types.clone()
    }

    fn replay(&mut self, sink: &mut dyn FnMut(&RecordedEvent)) -> RecordingResult<()> {
        for event in &self.events {
            sink(event);
        }
        Ok(())
    }
}

fn decode_event(
    event_type: &Arc<EventType>,
    values: &Map<String, JsonValue>,
) -> RecordingResult<RecordedEvent> {
    let mut decoded = Vec::with_capacity(event_type.fields.len());
    for descriptor in &event_type.fields {
        let value = match values.get(&descriptor.name) {
            Some(json) => convert(descriptor, json)?,
            None => Value::Null,
        };
        decoded.push(value);
    }
    Ok(RecordedEvent::new(Arc::clone(event_type), decoded))
}

fn convert(descriptor: &ValueDescriptor, json: &JsonValue) -> RecordingResult<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    if descriptor.array {
        let items = json
            .as_array()
            .ok_or_else(|| invalid(descriptor, "expected an array"))?;
        return items
            .iter()
            .map(|item| convert_element(descriptor, item))
            .collect::<RecordingResult<Vec<_>>>()
            .map(Value::Array);
    }
    convert_element(descriptor, json)
}

fn convert_element(descriptor: &ValueDescriptor, json: &JsonValue) -> RecordingResult<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let annotations = &descriptor.annotations;
    if annotations.timestamp {
        return match json {
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| Value::Instant(t.with_timezone(&Utc)))
                .map_err(|e| invalid(descriptor, &e.to_string())),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(|nanos| {
                    DateTime::from_timestamp(
                        nanos.div_euclid(NANOS_PER_SECOND),
                        nanos.rem_euclid(NANOS_PER_SECOND) as u32,
                    )
                })
                .map(Value::Instant)
                .ok_or_else(|| invalid(descriptor, "expected epoch nanoseconds")),
            _ => Err(invalid(descriptor, "expected a timestamp")),
        };
    }
    if annotations.timespan {
        return json
            .as_i64()
            .map(|nanos| Value::Duration(TimeDelta::nanoseconds(nanos)))
            .ok_or_else(|| invalid(descriptor, "expected nanoseconds"));
    }

    match descriptor.type_name.as_str() {
        "boolean" => json
            .as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| invalid(descriptor, "expected a boolean")),
        "char" => json
            .as_str()
            .and_then(|s| s.chars().next())
            .map(Value::Char)
            .ok_or_else(|| invalid(descriptor, "expected a character")),
        "byte" | "short" | "int" | "long" => json
            .as_i64()
            .or_else(|| json.as_u64().map(|v| v as i64))
            .map(Value::Long)
            .ok_or_else(|| invalid(descriptor, "expected an integer")),
        "float" | "double" => match json {
            // JSON has no literal for NaN or infinities
            JsonValue::String(s) => s
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| invalid(descriptor, &e.to_string())),
            _ => json
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| invalid(descriptor, "expected a number")),
        },
        TYPE_STRING => Ok(match json {
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }),
        _ => match json {
            JsonValue::Object(map) => convert_object(descriptor, map),
            other => Ok(infer(other)),
        },
    }
}

fn convert_object(
    descriptor: &ValueDescriptor,
    map: &Map<String, JsonValue>,
) -> RecordingResult<Value> {
    let mut object = RecordedObject::new(descriptor.type_name.clone());
    for (key, json) in map {
        if key == "$id" {
            object.id = json.as_u64();
            continue;
        }
        let value = match descriptor.find(key) {
            Some(field) => convert(field, json)?,
            None => infer(json),
        };
        object.fields.push((key.clone(), value));
    }
    Ok(Value::from(object))
}

/// Convert JSON without a descriptor
fn infer(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => Value::Long(v),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(infer).collect()),
        JsonValue::Object(map) => {
            let type_name = map
                .get("$type")
                .and_then(JsonValue::as_str)
                .unwrap_or("object");
            let mut object = RecordedObject::new(type_name);
            for (key, json) in map {
                match key.as_str() {
                    "$type" => {}
                    "$id" => object.id = json.as_u64(),
                    _ => object.fields.push((key.clone(), infer(json))),
                }
            }
            Value::from(object)
        }
    }
}

fn invalid(descriptor: &ValueDescriptor, message: &str) -> RecordingError {
    RecordingError::InvalidValue {
        field: descriptor.name.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::TYPE_THREAD;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RECORDING: &str = r#"{
        "types": [
            {
                "id": 1,
                "name": "jdk.ThreadSleep",
                "fields": [
                    { "name": "startTime", "typeName": "long", "annotations": { "timestamp": true } },
                    { "name": "duration", "typeName": "long", "annotations": { "timespan": true } },
                    { "name": "eventThread", "typeName": "java.lang.Thread",
                      "fields": [ { "name": "javaName", "typeName": "java.lang.String" } ] },
                    { "name": "load", "typeName": "double" }
                ]
            }
        ],
        "events": [
            { "type": "jdk.ThreadSleep", "values": {
                "startTime": "2024-01-15T14:35:42Z",
                "duration": 2000000,
                "eventThread": { "$id": 12, "javaName": "main" },
                "load": "NaN"
            } },
            { "type": "ThreadSleep", "values": { "startTime": 1705329342000000000 } }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let recording = Recording::from_json(RECORDING).unwrap();
        assert_eq!(recording.types().len(), 1);
        assert_eq!(recording.events().len(), 2);

        let first = &recording.events()[0];
        assert_eq!(first.duration(), TimeDelta::milliseconds(2));
        let thread = first.get("eventThread").unwrap().as_object().unwrap();
        assert_eq!(thread.id, Some(12));
        assert!(thread.is(TYPE_THREAD));
        assert!(matches!(first.get("load"), Some(Value::Double(v)) if v.is_nan()));

        let second = &recording.events()[1];
        assert_eq!(second.start_time(), first.start_time());
        assert_eq!(second.get("duration"), Some(&Value::Null));
    }

    #[test]
    fn test_time_bounds() {
        let recording = Recording::from_json(RECORDING).unwrap();
        let start = recording.start_time().unwrap();
        let end = recording.end_time().unwrap();
        assert_eq!(end - start, TimeDelta::milliseconds(2));
    }

    #[test]
    fn test_unknown_type() {
        let json = r#"{ "types": [], "events": [ { "type": "jdk.Nope", "values": {} } ] }"#;
        let result = Recording::from_json(json);
        assert!(matches!(result, Err(RecordingError::UnknownEventType(_))));
    }

    #[test]
    fn test_invalid_value() {
        let json = r#"{
            "types": [ { "id": 1, "name": "a.B", "fields": [ { "name": "count", "typeName": "int" } ] } ],
            "events": [ { "type": "a.B", "values": { "count": "many" } } ]
        }"#;
        let result = Recording::from_json(json);
        assert!(matches!(result, Err(RecordingError::InvalidValue { .. })));
    }

    #[test]
    fn test_open_and_replay() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(RECORDING.as_bytes()).unwrap();

        let mut recording = Recording::open(file.path()).unwrap();
        let mut seen = 0;
        recording.replay(&mut |_| seen += 1).unwrap();
        assert_eq!(seen, 2);
        assert_eq!(recording.event_types().len(), 1);
    }
}
