//! Recorded values and events
//!
//! - `Value`: a typed field value read from an event
//! - `RecordedObject`: a structured value (thread, class, method, frame, ...)
//! - `RecordedEvent`: one event instance with values in schema field order

use crate::event::types::{
    EventType, TYPE_CLASS, TYPE_CLASS_LOADER, TYPE_METHOD, TYPE_STACK_FRAME, TYPE_THREAD,
    TYPE_THREAD_GROUP,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A typed value read from an event field
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Missing value
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// Single character
    Char(char),
    /// Any integral number
    Long(i64),
    /// Any floating point number
    Double(f64),
    /// Text
    String(String),
    /// Point in time
    Instant(DateTime<Utc>),
    /// Length of time
    Duration(TimeDelta),
    /// Structured value
    Object(Arc<RecordedObject>),
    /// Sequence of values
    Array(Vec<Value>),
}

impl Value {
    /// Check for a missing value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric value as f64, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral value, if this is a long
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Structured value, if this is an object
    pub fn as_object(&self) -> Option<&Arc<RecordedObject>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Elements, if this is an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Whether the value is an integral number
    pub fn is_integral(&self) -> bool {
        matches!(self, Value::Long(_))
    }

    /// Whether the value is a number that is not NaN or infinite
    pub fn is_finite_number(&self) -> bool {
        match self {
            Value::Long(_) => true,
            Value::Double(v) => v.is_finite(),
            _ => false,
        }
    }

    /// Natural ordering between comparable values of compatible kinds
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Long(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Long(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Instant(a), Value::Instant(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Compare against a literal from a WHERE condition
    pub fn matches_literal(&self, literal: &str) -> bool {
        match self {
            Value::Null => literal == "null",
            Value::Boolean(b) => literal.parse::<bool>().map(|l| l == *b).unwrap_or(false),
            Value::Long(v) => literal.parse::<i64>().map(|l| l == *v).unwrap_or(false),
            Value::Double(v) => literal.parse::<f64>().map(|l| l == *v).unwrap_or(false),
            Value::String(s) => s == literal,
            _ => self.to_string() == literal,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Instant(a), Value::Instant(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Char(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Instant(v) => v.hash(state),
            Value::Duration(v) => v.hash(state),
            Value::Object(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Instant(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Duration(v) => match v.num_nanoseconds() {
                Some(nanos) => write!(f, "{} ns", nanos),
                None => write!(f, "{} s", v.num_seconds()),
            },
            Value::Object(o) => write!(f, "{}", o.display_name()),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Instant(v)
    }
}

impl From<TimeDelta> for Value {
    fn from(v: TimeDelta) -> Self {
        Value::Duration(v)
    }
}

impl From<RecordedObject> for Value {
    fn from(v: RecordedObject) -> Self {
        Value::Object(Arc::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// A structured value such as a thread, class, method or stack frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordedObject {
    /// Type name, e.g. `java.lang.Thread`
    pub type_name: String,
    /// Identity of the object in the recording, if it has one
    pub id: Option<u64>,
    /// Field values by name
    pub fields: Vec<(String, Value)>,
}

impl RecordedObject {
    /// Create an object with no fields
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            fields: Vec::new(),
        }
    }

    /// Builder method: set identity
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Builder method: add a field value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text field
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Get an integral field
    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Get a structured field
    pub fn get_object(&self, name: &str) -> Option<&Arc<RecordedObject>> {
        self.get(name).and_then(Value::as_object)
    }

    /// Read a dotted path relative to this object
    pub fn value(&self, path: &str) -> Value {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match (self.get(head), rest) {
            (Some(value), None) => value.clone(),
            (Some(Value::Object(o)), Some(rest)) => o.value(rest),
            _ => Value::Null,
        }
    }

    /// Whether the object is of the given type
    pub fn is(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    /// Short human readable name used for matching and compact text
    pub fn display_name(&self) -> String {
        match self.type_name.as_str() {
            TYPE_THREAD => self
                .get_str("javaName")
                .or_else(|| self.get_str("osName"))
                .unwrap_or("")
                .to_string(),
            TYPE_CLASS => self.get_str("name").unwrap_or("").to_string(),
            TYPE_CLASS_LOADER | TYPE_THREAD_GROUP => match self.get_str("name") {
                Some(name) => name.to_string(),
                None => self
                    .get_object("type")
                    .map(|c| c.display_name())
                    .unwrap_or_default(),
            },
            TYPE_METHOD => {
                let class = self
                    .get_object("type")
                    .map(|c| c.display_name())
                    .unwrap_or_default();
                format!("{}.{}", class, self.get_str("name").unwrap_or(""))
            }
            TYPE_STACK_FRAME => self
                .get_object("method")
                .map(|m| m.display_name())
                .unwrap_or_default(),
            _ => self.type_name.clone(),
        }
    }
}

/// One recorded event
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    event_type: Arc<EventType>,
    values: Vec<Value>,
}

impl RecordedEvent {
    /// Create an event from values in schema field order
    ///
    /// Missing trailing values are filled with `Value::Null`.
    pub fn new(event_type: Arc<EventType>, mut values: Vec<Value>) -> Self {
        values.resize(event_type.fields.len(), Value::Null);
        Self { event_type, values }
    }

    /// Start building an event by field name
    pub fn builder(event_type: Arc<EventType>) -> EventBuilder {
        let values = vec![Value::Null; event_type.fields.len()];
        EventBuilder { event_type, values }
    }

    /// The schema of this event
    pub fn event_type(&self) -> &Arc<EventType> {
        &self.event_type
    }

    /// Values in schema field order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get a top-level field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.event_type
            .field_index(name)
            .and_then(|index| self.values.get(index))
    }

    /// Read a dotted path, e.g. `eventThread.javaName`
    pub fn value(&self, path: &str) -> Value {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match (self.get(head), rest) {
            (Some(value), None) => value.clone(),
            (Some(Value::Object(o)), Some(rest)) => o.value(rest),
            _ => Value::Null,
        }
    }

    /// Start time of the event
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self.get("startTime") {
            Some(Value::Instant(t)) => Some(*t),
            _ => None,
        }
    }

    /// Duration of the event, zero for instant events
    pub fn duration(&self) -> TimeDelta {
        match self.get("duration") {
            Some(Value::Duration(d)) => *d,
            _ => TimeDelta::zero(),
        }
    }

    /// End time of the event
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.start_time()
            .map(|start| start.checked_add_signed(self.duration()).unwrap_or(start))
    }
}

/// Builder for events by field name
#[derive(Debug)]
pub struct EventBuilder {
    event_type: Arc<EventType>,
    values: Vec<Value>,
}

impl EventBuilder {
    /// Set a top-level field; unknown names are ignored
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Some(index) = self.event_type.field_index(name) {
            self.values[index] = value.into();
        }
        self
    }

    /// Build the event
    pub fn build(self) -> RecordedEvent {
        RecordedEvent {
            event_type: self.event_type,
            values: self.values,
        }
    }
}
