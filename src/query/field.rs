//! Output fields
//!
//! A [`Field`] is one column of a query result: how to read its value from an
//! event, which role it plays in aggregation, and how it should be rendered.

use crate::event::{RecordedEvent, Value};
use crate::query::ast::{Aggregator, SortOrder};
use crate::query::filtered_type::{getter, Getter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizontal alignment of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

/// Numeric representation of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericKind {
    #[default]
    None,
    Integral,
    Fractional,
}

/// Time interpretation of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeKind {
    #[default]
    None,
    /// Point in time
    Instant,
    /// Length of time
    Span,
}

/// Unit used when rendering a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitKind {
    #[default]
    None,
    Bytes,
    Bits,
    BytesPerSecond,
    BitsPerSecond,
    Percentage,
    MemoryAddress,
}

/// Where overflowing text is cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncate {
    Beginning,
    #[default]
    End,
}

impl std::str::FromStr for Truncate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginning" => Ok(Truncate::Beginning),
            "end" => Ok(Truncate::End),
            other => Err(format!("expected 'beginning' or 'end', found '{}'", other)),
        }
    }
}

/// One column of a query result
#[derive(Clone)]
pub struct Field {
    /// Index of the owning type in the resolution, `None` for fields that
    /// span every type
    pub type_index: Option<usize>,
    /// Symbolic name, e.g. `eventThread.javaName`
    pub name: String,
    /// Header label
    pub label: String,
    /// Longer description
    pub description: Option<String>,
    /// Reads the value from an event
    pub getter: Getter,
    /// Type name of the value, e.g. `long` or `java.lang.Thread`
    pub data_type: String,
    /// Value is an array
    pub array: bool,
    /// Aggregation role
    pub aggregator: Aggregator,
    /// Value is part of the grouping key
    pub grouper: bool,
    /// Requested ordering, if the field is sorted on
    pub orderer: Option<SortOrder>,
    /// Field is rendered
    pub visible: bool,
    /// Position in the row
    pub index: usize,
    /// Per-type fields merged into this one
    pub source_fields: Vec<Field>,

    pub alignment: Alignment,
    pub numeric: NumericKind,
    pub time: TimeKind,
    pub unit: UnitKind,
    /// Sort by rendered text instead of by value
    pub lexical_sort: bool,
    /// Column does not grow beyond its preferred width
    pub fixed_width: bool,
    /// Render as a fraction of the column total
    pub normalized: bool,
    pub truncate: Truncate,
    /// Maximum number of lines in a cell
    pub cell_height: usize,
    /// Text shown for null
    pub missing_text: String,
    /// Timestamps include milliseconds
    pub ms_precision: bool,
}

impl Field {
    /// Field owned by one type, reading values with `getter`
    pub fn new(type_index: Option<usize>, name: impl Into<String>, getter: Getter) -> Self {
        let name = name.into();
        Self {
            type_index,
            label: name.clone(),
            name,
            description: None,
            getter,
            data_type: String::new(),
            array: false,
            aggregator: Aggregator::Missing,
            grouper: false,
            orderer: None,
            visible: false,
            index: 0,
            source_fields: Vec::new(),
            alignment: Alignment::Left,
            numeric: NumericKind::None,
            time: TimeKind::None,
            unit: UnitKind::None,
            lexical_sort: false,
            fixed_width: false,
            normalized: false,
            truncate: Truncate::End,
            cell_height: 1,
            missing_text: "N/A".to_string(),
            ms_precision: false,
        }
    }

    /// Field with the same value for every event
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        Self::new(None, name, getter(move |_| value.clone()))
    }

    /// Read the value for an event delivered under the type at `type_index`
    pub fn value(&self, event: &RecordedEvent, type_index: usize) -> Value {
        if self.source_fields.is_empty() {
            return match self.type_index {
                Some(owner) if owner != type_index => Value::Null,
                _ => (self.getter)(event),
            };
        }
        self.source_fields
            .iter()
            .find(|f| f.type_index == Some(type_index))
            .map(|f| (f.getter)(event))
            .unwrap_or(Value::Null)
    }

    /// Whether the field plays an aggregating role
    pub fn is_aggregated(&self) -> bool {
        self.aggregator != Aggregator::Missing
    }

    /// Whether values of this field are lengths of time
    pub fn is_timespan(&self) -> bool {
        self.time == TimeKind::Span
    }

    /// Whether values of this field are points in time
    pub fn is_timestamp(&self) -> bool {
        self.time == TimeKind::Instant
    }

    /// Whether values of this field are numbers
    pub fn is_numeric(&self) -> bool {
        self.numeric != NumericKind::None
    }

    /// Whether the field sorts largest first unless told otherwise
    pub fn descending_by_default(&self) -> bool {
        self.is_timespan() || self.unit == UnitKind::Percentage
    }

    /// Whether two per-type fields can share one column without conversion
    pub fn same_kind(&self, other: &Field) -> bool {
        self.data_type == other.data_type
            && self.array == other.array
            && self.time == other.time
            && self.unit == other.unit
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("type_index", &self.type_index)
            .field("data_type", &self.data_type)
            .field("aggregator", &self.aggregator)
            .field("grouper", &self.grouper)
            .field("visible", &self.visible)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, ValueDescriptor};
    use std::sync::Arc;

    #[test]
    fn test_value_by_owner() {
        let event_type = Arc::new(EventType::new(1, "a.A").field(ValueDescriptor::new("x", "long")));
        let event = RecordedEvent::builder(event_type).set("x", 5i64).build();

        let field = Field::new(Some(0), "x", Arc::new(|e: &RecordedEvent| e.value("x")));
        assert_eq!(field.value(&event, 0), Value::Long(5));
        assert_eq!(field.value(&event, 1), Value::Null);

        let constant = Field::constant("*", Value::Long(1));
        assert_eq!(constant.value(&event, 3), Value::Long(1));
    }

    #[test]
    fn test_value_from_source_fields() {
        let event_type = Arc::new(EventType::new(1, "a.A").field(ValueDescriptor::new("x", "long")));
        let event = RecordedEvent::builder(event_type).set("x", 5i64).build();

        let mut union = Field::constant("x", Value::Null);
        union.source_fields = vec![
            Field::new(Some(0), "x", Arc::new(|_: &RecordedEvent| Value::Long(1))),
            Field::new(Some(1), "x", Arc::new(|e: &RecordedEvent| e.value("x"))),
        ];
        assert_eq!(union.value(&event, 0), Value::Long(1));
        assert_eq!(union.value(&event, 1), Value::Long(5));
        assert_eq!(union.value(&event, 2), Value::Null);
    }

    #[test]
    fn test_default_direction() {
        let mut field = Field::constant("d", Value::Null);
        assert!(!field.descending_by_default());
        field.time = TimeKind::Span;
        assert!(field.descending_by_default());
        field.time = TimeKind::None;
        field.unit = UnitKind::Percentage;
        assert!(field.descending_by_default());
    }
}
