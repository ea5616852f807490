//! Field construction
//!
//! Builds [`Field`]s for one event type from field paths, deriving render and
//! aggregation hints from descriptor annotations. Also provides the synthetic
//! fields that are computed from other values rather than read directly.

use crate::event::{
    AmountUnit, EventType, RecordedEvent, Value, ValueDescriptor, TYPE_STACK_FRAME, TYPE_STRING,
};
use crate::query::ast::{Aggregator, Property};
use crate::query::field::{Alignment, Field, NumericKind, TimeKind, Truncate, UnitKind};
use crate::query::filtered_type::{getter, Getter};
use std::collections::HashMap;
use std::sync::Arc;

/// Wildcards expand structured fields this many levels deep
const MAX_DEPTH: usize = 2;

const TOP_FRAME: &str = "stackTrace.topFrame";
const TOP_APPLICATION_FRAME: &str = "stackTrace.topApplicationFrame";
const NOT_INIT_FRAME: &str = "stackTrace.notInit";
const END_TIME: &str = "endTime";
const EVENT_TYPE_LABEL: &str = "eventType.label";
const EVENT_TYPE_NAME: &str = "eventType.name";

/// Lookup tables shared by the fields of one resolution
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    type_labels: Arc<HashMap<i64, String>>,
}

impl Lookups {
    /// Build lookup tables from the available event types
    pub fn new(types: &[Arc<EventType>]) -> Self {
        let type_labels = types
            .iter()
            .map(|t| (t.id as i64, t.display_label()))
            .collect();
        Self {
            type_labels: Arc::new(type_labels),
        }
    }

    /// Label of the event type with the given id
    pub fn type_label(&self, id: i64) -> Option<&str> {
        self.type_labels.get(&id).map(String::as_str)
    }
}

/// Builds fields for one event type
pub struct FieldBuilder<'a> {
    event_type: &'a Arc<EventType>,
    type_index: usize,
    lookups: &'a Lookups,
}

impl<'a> FieldBuilder<'a> {
    pub fn new(event_type: &'a Arc<EventType>, type_index: usize, lookups: &'a Lookups) -> Self {
        Self {
            event_type,
            type_index,
            lookups,
        }
    }

    /// Build the field for a dotted path, or a synthetic field
    pub fn build(&self, path: &str) -> Option<Field> {
        if let Some(field) = self.synthetic(path) {
            return Some(field);
        }

        let descriptor = self.event_type.descriptor(path)?;
        let read: Getter = match (path.contains('.'), self.event_type.field_index(path)) {
            (false, Some(index)) => {
                getter(move |e| e.values().get(index).cloned().unwrap_or_default())
            }
            _ => {
                let path = path.to_string();
                getter(move |e| e.value(&path))
            }
        };

        let mut field = Field::new(Some(self.type_index), path, read);
        field.label = descriptor.display_label();
        field.description = descriptor.description.clone();
        configure_descriptor(&mut field, descriptor);
        Some(field)
    }

    /// Every field of the type, expanding structured values
    pub fn build_all(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        for descriptor in &self.event_type.fields {
            self.expand(descriptor, descriptor.name.clone(), 1, &mut fields);
        }
        fields
    }

    fn expand(&self, descriptor: &ValueDescriptor, path: String, depth: usize, out: &mut Vec<Field>) {
        let expandable = !descriptor.fields.is_empty()
            && !descriptor.is_leaf_type()
            && !descriptor.array
            && depth < MAX_DEPTH;
        if !expandable {
            if let Some(field) = self.build(&path) {
                out.push(field);
            }
            return;
        }
        for child in &descriptor.fields {
            let child_path = format!("{}.{}", path, child.name);
            self.expand(child, child_path, depth + 1, out);
        }
    }

    /// Names that can be used to refer to fields of this type
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for descriptor in &self.event_type.fields {
            names.push(descriptor.name.clone());
            for child in &descriptor.fields {
                names.push(format!("{}.{}", descriptor.name, child.name));
            }
        }
        for name in [
            TOP_FRAME,
            TOP_APPLICATION_FRAME,
            NOT_INIT_FRAME,
            END_TIME,
            EVENT_TYPE_LABEL,
            EVENT_TYPE_NAME,
        ] {
            if self.synthetic(name).is_some() {
                names.push(name.to_string());
            }
        }
        names
    }

    fn synthetic(&self, path: &str) -> Option<Field> {
        let has_stack_trace = self.event_type.find("stackTrace").is_some();
        let (label, read, data_type): (&str, Getter, &str) = match path {
            TOP_FRAME if has_stack_trace => (
                "Top Frame",
                getter(|e| frame_where(e, |_| true)),
                TYPE_STACK_FRAME,
            ),
            TOP_APPLICATION_FRAME if has_stack_trace => (
                "Top Application Frame",
                getter(|e| frame_where(e, is_application_frame)),
                TYPE_STACK_FRAME,
            ),
            NOT_INIT_FRAME if has_stack_trace => (
                "Top Non-Constructor Frame",
                getter(|e| frame_where(e, is_not_constructor)),
                TYPE_STACK_FRAME,
            ),
            END_TIME if self.event_type.find("startTime").is_some() => {
                let mut field = Field::new(
                    Some(self.type_index),
                    path,
                    getter(|e| e.end_time().map(Value::Instant).unwrap_or_default()),
                );
                field.label = "End Time".to_string();
                configure_descriptor(&mut field, &ValueDescriptor::new(path, "long").timestamp());
                return Some(field);
            }
            EVENT_TYPE_LABEL => (
                "Event Type",
                getter(|e| Value::String(e.event_type().display_label())),
                TYPE_STRING,
            ),
            EVENT_TYPE_NAME => (
                "Event Type Name",
                getter(|e| Value::String(e.event_type().name.clone())),
                TYPE_STRING,
            ),
            "id" if self.event_type.name.ends_with("ActiveSetting") => {
                let lookups = self.lookups.clone();
                (
                    "Event Type",
                    getter(move |e| match e.get("id") {
                        Some(Value::Long(id)) => match lookups.type_label(*id) {
                            Some(label) => Value::String(label.to_string()),
                            None => Value::String(id.to_string()),
                        },
                        _ => Value::Null,
                    }),
                    TYPE_STRING,
                )
            }
            _ => return None,
        };

        let mut field = Field::new(Some(self.type_index), path, read);
        field.label = label.to_string();
        configure_descriptor(&mut field, &ValueDescriptor::new(path, data_type));
        Some(field)
    }
}

fn frame_where(event: &RecordedEvent, accept: impl Fn(&Value) -> bool) -> Value {
    let frames = match event.get("stackTrace") {
        Some(Value::Object(trace)) => trace.get("frames").and_then(Value::as_array),
        _ => None,
    };
    frames
        .and_then(|frames| frames.iter().find(|f| accept(*f)))
        .cloned()
        .unwrap_or_default()
}

fn is_application_frame(frame: &Value) -> bool {
    let loader = frame
        .as_object()
        .map(|f| f.value("method.type.classLoader"))
        .unwrap_or_default();
    match loader {
        Value::Object(loader) => loader.get_str("name") != Some("bootstrap"),
        _ => false,
    }
}

fn is_not_constructor(frame: &Value) -> bool {
    frame
        .as_object()
        .map(|f| f.value("method.name"))
        .and_then(|name| name.as_str().map(|n| n != "<init>"))
        .unwrap_or(false)
}

/// Derive render hints from a descriptor
pub fn configure_descriptor(field: &mut Field, descriptor: &ValueDescriptor) {
    field.data_type = descriptor.type_name.clone();
    field.array = descriptor.array;
    let annotations = &descriptor.annotations;

    if descriptor.is_numeric() {
        field.numeric = if descriptor.is_integral() {
            NumericKind::Integral
        } else {
            NumericKind::Fractional
        };
        field.alignment = Alignment::Right;
        field.fixed_width = true;
    }
    if matches!(descriptor.type_name.as_str(), "boolean" | "char") {
        field.fixed_width = true;
    }

    if annotations.timestamp {
        field.time = TimeKind::Instant;
        field.numeric = NumericKind::None;
        field.alignment = Alignment::Left;
        field.fixed_width = true;
    } else if annotations.timespan {
        field.time = TimeKind::Span;
        field.numeric = NumericKind::None;
        field.alignment = Alignment::Right;
        field.fixed_width = true;
    }

    field.unit = match (annotations.data_amount, annotations.frequency) {
        (Some(AmountUnit::Bytes), false) => UnitKind::Bytes,
        (Some(AmountUnit::Bytes), true) => UnitKind::BytesPerSecond,
        (Some(AmountUnit::Bits), false) => UnitKind::Bits,
        (Some(AmountUnit::Bits), true) => UnitKind::BitsPerSecond,
        (None, _) if annotations.percentage => UnitKind::Percentage,
        (None, _) if annotations.memory_address => UnitKind::MemoryAddress,
        (None, _) => UnitKind::None,
    };

    if descriptor.is_leaf_type() || descriptor.array {
        field.lexical_sort = true;
        field.fixed_width = false;
        field.alignment = Alignment::Left;
    }
}

/// Attach an aggregator, normalizing hints and rewriting the label
pub fn configure_aggregator(field: &mut Field, aggregator: Aggregator) {
    field.aggregator = aggregator;
    let label = field.label.clone();
    field.label = match aggregator {
        Aggregator::Missing => label,
        Aggregator::Average => format!("Avg. {}", label),
        Aggregator::Count => "Count".to_string(),
        Aggregator::Difference => format!("Diff. {}", label),
        Aggregator::First => format!("First {}", label),
        Aggregator::Last | Aggregator::LastBatch => format!("Last {}", label),
        Aggregator::List | Aggregator::Set => format!("{}s", label),
        Aggregator::Maximum => format!("Max. {}", label),
        Aggregator::Median => format!("Median {}", label),
        Aggregator::Minimum => format!("Min. {}", label),
        Aggregator::P90 => format!("P90 {}", label),
        Aggregator::P95 => format!("P95 {}", label),
        Aggregator::P99 => format!("P99 {}", label),
        Aggregator::P999 => format!("P99.9 {}", label),
        Aggregator::StandardDeviation => format!("Std. Dev. {}", label),
        Aggregator::Sum => format!("Total {}", label),
        Aggregator::Unique => format!("Unique {}", label),
    };

    match aggregator {
        Aggregator::Count | Aggregator::Unique => {
            field.data_type = "long".to_string();
            field.array = false;
            field.numeric = NumericKind::Integral;
            field.time = TimeKind::None;
            field.unit = UnitKind::None;
            field.alignment = Alignment::Right;
            field.lexical_sort = false;
            field.fixed_width = true;
        }
        Aggregator::Difference if field.is_timestamp() => {
            field.time = TimeKind::Span;
            field.alignment = Alignment::Right;
        }
        Aggregator::Average
        | Aggregator::StandardDeviation
        | Aggregator::Median
        | Aggregator::P90
        | Aggregator::P95
        | Aggregator::P99
        | Aggregator::P999
            if field.is_numeric() =>
        {
            field.numeric = NumericKind::Fractional;
            if field.unit == UnitKind::MemoryAddress {
                field.unit = UnitKind::None;
            }
        }
        Aggregator::List | Aggregator::Set => {
            field.array = true;
            field.lexical_sort = true;
            field.fixed_width = false;
            field.alignment = Alignment::Left;
        }
        _ => {}
    }
}

/// Apply a FORMAT property
pub fn apply_property(field: &mut Field, property: Property) {
    match property {
        Property::None => {}
        Property::Normalized => field.normalized = true,
        Property::TruncateBeginning => field.truncate = Truncate::Beginning,
        Property::TruncateEnd => field.truncate = Truncate::End,
        Property::CellHeight(height) => field.cell_height = height,
        Property::MissingWhitespace => field.missing_text = String::new(),
        Property::MsPrecision => field.ms_precision = true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        Annotations, RecordedObject, TYPE_CLASS, TYPE_CLASS_LOADER, TYPE_METHOD,
        TYPE_STACK_TRACE, TYPE_THREAD,
    };
    use chrono::{DateTime, TimeDelta};

    fn allocation_type() -> Arc<EventType> {
        Arc::new(
            EventType::new(10, "jdk.ObjectAllocationSample")
                .label("Object Allocation Sample")
                .field(ValueDescriptor::new("startTime", "long").timestamp())
                .field(ValueDescriptor::new("duration", "long").timespan())
                .field(
                    ValueDescriptor::new("eventThread", TYPE_THREAD)
                        .field(ValueDescriptor::new("javaName", TYPE_STRING)),
                )
                .field(ValueDescriptor::new("stackTrace", TYPE_STACK_TRACE))
                .field(
                    ValueDescriptor::new("weight", "long").annotations(Annotations {
                        data_amount: Some(AmountUnit::Bytes),
                        ..Annotations::default()
                    }),
                )
                .field(
                    ValueDescriptor::new("gc", "jdk.types.GcInfo")
                        .field(ValueDescriptor::new("heapUsed", "long"))
                        .field(
                            ValueDescriptor::new("region", "jdk.types.Region")
                                .field(ValueDescriptor::new("start", "long")),
                        ),
                ),
        )
    }

    fn frame(class: &str, loader: Option<&str>, method: &str) -> Value {
        let mut class = RecordedObject::new(TYPE_CLASS).with("name", class);
        if let Some(loader) = loader {
            class = class.with("classLoader", RecordedObject::new(TYPE_CLASS_LOADER).with("name", loader));
        }
        let method = RecordedObject::new(TYPE_METHOD).with("type", class).with("name", method);
        RecordedObject::new(TYPE_STACK_FRAME)
            .with("method", method)
            .with("lineNumber", 10i64)
            .into()
    }

    #[test]
    fn test_hints_from_annotations() {
        let event_type = allocation_type();
        let lookups = Lookups::default();
        let builder = FieldBuilder::new(&event_type, 0, &lookups);

        let start = builder.build("startTime").unwrap();
        assert_eq!(start.time, TimeKind::Instant);
        assert_eq!(start.alignment, Alignment::Left);
        assert_eq!(start.label, "Start Time");

        let duration = builder.build("duration").unwrap();
        assert_eq!(duration.time, TimeKind::Span);
        assert_eq!(duration.alignment, Alignment::Right);

        let weight = builder.build("weight").unwrap();
        assert_eq!(weight.unit, UnitKind::Bytes);
        assert_eq!(weight.numeric, NumericKind::Integral);
        assert!(weight.fixed_width);

        let thread = builder.build("eventThread").unwrap();
        assert!(thread.lexical_sort);
        assert!(!thread.fixed_width);

        let name = builder.build("eventThread.javaName").unwrap();
        assert_eq!(name.label, "Java Name");
        assert!(builder.build("eventThread.osName").is_none());
    }

    #[test]
    fn test_wildcard_expansion() {
        let event_type = allocation_type();
        let lookups = Lookups::default();
        let names: Vec<String> = FieldBuilder::new(&event_type, 0, &lookups)
            .build_all()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "startTime",
                "duration",
                "eventThread",
                "stackTrace",
                "weight",
                "gc.heapUsed",
                "gc.region",
            ]
        );
    }

    #[test]
    fn test_synthetic_frames() {
        let event_type = allocation_type();
        let lookups = Lookups::default();
        let builder = FieldBuilder::new(&event_type, 0, &lookups);

        let trace = RecordedObject::new(TYPE_STACK_TRACE).with(
            "frames",
            vec![
                frame("java.util.ArrayList", None, "<init>"),
                frame("java.util.ArrayList", Some("bootstrap"), "add"),
                frame("com.example.App", Some("app"), "<init>"),
                frame("com.example.App", Some("app"), "run"),
            ],
        );
        let event = RecordedEvent::builder(Arc::clone(&event_type))
            .set("stackTrace", trace)
            .build();

        let method_of = |path: &str| {
            let value = builder.build(path).unwrap().value(&event, 0);
            let frame = value.as_object().unwrap().clone();
            frame.value("method.name").to_string()
        };
        assert_eq!(method_of("stackTrace.topFrame"), "<init>");
        assert_eq!(method_of("stackTrace.notInit"), "add");
        assert_eq!(method_of("stackTrace.topApplicationFrame"), "<init>");

        let empty = RecordedEvent::builder(Arc::clone(&event_type)).build();
        assert_eq!(builder.build("stackTrace.topFrame").unwrap().value(&empty, 0), Value::Null);
    }

    #[test]
    fn test_synthetic_end_time_and_type() {
        let event_type = allocation_type();
        let lookups = Lookups::default();
        let builder = FieldBuilder::new(&event_type, 0, &lookups);
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let event = RecordedEvent::builder(Arc::clone(&event_type))
            .set("startTime", start)
            .set("duration", TimeDelta::seconds(2))
            .build();

        let end = builder.build("endTime").unwrap();
        assert!(end.is_timestamp());
        assert_eq!(end.value(&event, 0), Value::Instant(start + TimeDelta::seconds(2)));

        let label = builder.build("eventType.label").unwrap();
        assert_eq!(label.value(&event, 0), Value::from("Object Allocation Sample"));
        assert!(builder.field_names().contains(&"stackTrace.topFrame".to_string()));
    }

    #[test]
    fn test_lookup_field() {
        let setting = Arc::new(
            EventType::new(20, "jdk.ActiveSetting").field(ValueDescriptor::new("id", "long")),
        );
        let lookups = Lookups::new(&[Arc::clone(&setting), allocation_type()]);
        let builder = FieldBuilder::new(&setting, 0, &lookups);
        let field = builder.build("id").unwrap();

        let known = RecordedEvent::builder(Arc::clone(&setting)).set("id", 10i64).build();
        let unknown = RecordedEvent::builder(setting).set("id", 99i64).build();
        assert_eq!(field.value(&known, 0), Value::from("Object Allocation Sample"));
        assert_eq!(field.value(&unknown, 0), Value::from("99"));
    }

    #[test]
    fn test_configure_aggregator() {
        let event_type = allocation_type();
        let lookups = Lookups::default();
        let builder = FieldBuilder::new(&event_type, 0, &lookups);

        let mut count = builder.build("duration").unwrap();
        configure_aggregator(&mut count, Aggregator::Count);
        assert_eq!(count.label, "Count");
        assert_eq!(count.numeric, NumericKind::Integral);
        assert_eq!(count.time, TimeKind::None);

        let mut diff = builder.build("startTime").unwrap();
        configure_aggregator(&mut diff, Aggregator::Difference);
        assert_eq!(diff.label, "Diff. Start Time");
        assert!(diff.is_timespan());

        let mut avg = builder.build("weight").unwrap();
        configure_aggregator(&mut avg, Aggregator::Average);
        assert_eq!(avg.label, "Avg. Weight");
        assert_eq!(avg.numeric, NumericKind::Fractional);

        let mut threads = builder.build("eventThread").unwrap();
        configure_aggregator(&mut threads, Aggregator::Set);
        assert_eq!(threads.label, "Event Threads");
        assert!(threads.array);
    }

    #[test]
    fn test_apply_property() {
        let mut field = Field::constant("x", Value::Null);
        apply_property(&mut field, Property::CellHeight(4));
        apply_property(&mut field, Property::TruncateBeginning);
        apply_property(&mut field, Property::MissingWhitespace);
        assert_eq!(field.cell_height, 4);
        assert_eq!(field.truncate, Truncate::Beginning);
        assert_eq!(field.missing_text, "");
    }
}
