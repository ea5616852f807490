//! Event types scoped by equality filters

use crate::event::{EventType, RecordedEvent, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Reads a value from an event
pub type Getter = Arc<dyn Fn(&RecordedEvent) -> Value + Send + Sync>;

/// Wrap a closure as a [`Getter`]
pub fn getter<F>(f: F) -> Getter
where
    F: Fn(&RecordedEvent) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An equality condition bound to a field of one event type
#[derive(Clone)]
pub struct Filter {
    /// Field path as written in the query
    pub field: String,
    /// Literal the value must match
    pub value: String,
    getter: Getter,
}

impl Filter {
    /// Create a filter reading the field with `getter`
    pub fn new(field: impl Into<String>, value: impl Into<String>, getter: Getter) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            getter,
        }
    }

    /// Whether the event's field value equals the literal
    pub fn matches(&self, event: &RecordedEvent) -> bool {
        (self.getter)(event).matches_literal(&self.value)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("field", &self.field)
            .field("value", &self.value)
            .finish()
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.value == other.value
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.value.hash(state);
    }
}

/// An event type together with the filters its events must pass
#[derive(Debug, Clone)]
pub struct FilteredType {
    event_type: Arc<EventType>,
    filters: Vec<Filter>,
}

impl FilteredType {
    /// Wrap an event type without filters
    pub fn new(event_type: Arc<EventType>) -> Self {
        Self {
            event_type,
            filters: Vec::new(),
        }
    }

    /// Add an equality filter
    pub fn add_filter(&mut self, filter: Filter) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }

    pub fn event_type(&self) -> &Arc<EventType> {
        &self.event_type
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether the event is of this type and passes every filter
    pub fn matches(&self, event: &RecordedEvent) -> bool {
        event.event_type().id == self.event_type.id && self.filters.iter().all(|f| f.matches(event))
    }
}

impl PartialEq for FilteredType {
    fn eq(&self, other: &Self) -> bool {
        self.event_type.id == other.event_type.id && self.filters == other.filters
    }
}

impl Eq for FilteredType {}

impl Hash for FilteredType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_type.id.hash(state);
        self.filters.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ValueDescriptor;
    use std::collections::HashSet;

    fn gc_type() -> Arc<EventType> {
        Arc::new(
            EventType::new(1, "jdk.GarbageCollection")
                .field(ValueDescriptor::new("name", "java.lang.String")),
        )
    }

    fn name_filter(value: &str) -> Filter {
        Filter::new("name", value, Arc::new(|e: &RecordedEvent| e.value("name")))
    }

    #[test]
    fn test_matches() {
        let event_type = gc_type();
        let mut filtered = FilteredType::new(Arc::clone(&event_type));
        filtered.add_filter(name_filter("G1 Young"));

        let young = RecordedEvent::builder(Arc::clone(&event_type))
            .set("name", "G1 Young")
            .build();
        let old = RecordedEvent::builder(event_type).set("name", "G1 Old").build();
        assert!(filtered.matches(&young));
        assert!(!filtered.matches(&old));
    }

    #[test]
    fn test_identity_includes_filters() {
        let mut a = FilteredType::new(gc_type());
        let mut b = FilteredType::new(gc_type());
        assert_eq!(a, b);

        a.add_filter(name_filter("G1 Young"));
        a.add_filter(name_filter("G1 Young"));
        assert_eq!(a.filters().len(), 1);
        assert_ne!(a, b);

        b.add_filter(name_filter("G1 Young"));
        let set: HashSet<FilteredType> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
