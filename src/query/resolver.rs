//! Query resolution
//!
//! Binds a parsed [`Query`] to the available event types. Resolution runs in a
//! fixed order:
//!
//! 1. FROM: source names to event types, with aliases
//! 2. SELECT: expressions to visible fields, `*` to every field
//! 3. GROUP BY: grouping roles, or an implicit single group when SELECT
//!    aggregates without GROUP BY
//! 4. WHERE: equality filters attached to the owning types
//! 5. ORDER BY: ordering roles
//! 6. COLUMN and FORMAT: label and render overrides on visible fields
//!
//! A field name may be qualified by a full type name (`jdk.GC.name`), a simple
//! type name (`GC.name`), an alias (`g.name`) or a bracketed list of types
//! (`[A|B].name`). Unqualified names are looked up in every source type, and a
//! name found in several types becomes one column over all of them.

use crate::event::{EventType, Value, TYPE_STRING};
use crate::query::ast::{Aggregator, Expression, Query, SortOrder};
use crate::query::error::{QueryError, QueryResult};
use crate::query::field::{Alignment, Field, NumericKind, TimeKind, UnitKind};
use crate::query::field_builder::{apply_property, configure_aggregator, FieldBuilder, Lookups};
use crate::query::filtered_type::{getter, Filter, FilteredType};
use crate::query::suggest;
use crate::render::formatter;
use std::collections::HashMap;
use std::sync::Arc;

/// A query bound to event types
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Source types with their filters; a field's `type_index` points here
    pub types: Vec<FilteredType>,
    /// Output fields; visible fields first, in SELECT order
    pub fields: Vec<Field>,
    /// Field indices with their requested direction
    pub order_by: Vec<(usize, SortOrder)>,
    /// Events are aggregated into groups rather than listed
    pub grouped: bool,
    /// Grouping was added because SELECT aggregates without GROUP BY
    pub implicit: bool,
}

/// Resolve a query against the available event types
pub fn resolve(query: &Query, available: &[Arc<EventType>]) -> QueryResult<Resolution> {
    QueryResolver::new(query, available).resolve()
}

/// Fields found for one name, one per type that has it
struct Matches {
    fields: Vec<Field>,
}

/// Resolves one query
pub struct QueryResolver<'a> {
    query: &'a Query,
    available: &'a [Arc<EventType>],
    lookups: Lookups,
    types: Vec<FilteredType>,
    type_aliases: HashMap<String, Vec<usize>>,
    field_aliases: HashMap<String, usize>,
    fields: Vec<Field>,
}

impl<'a> QueryResolver<'a> {
    pub fn new(query: &'a Query, available: &'a [Arc<EventType>]) -> Self {
        Self {
            query,
            available,
            lookups: Lookups::new(available),
            types: Vec::new(),
            type_aliases: HashMap::new(),
            field_aliases: HashMap::new(),
            fields: Vec::new(),
        }
    }

    pub fn resolve(mut self) -> QueryResult<Resolution> {
        self.resolve_from()?;
        self.resolve_select()?;
        let implicit = self.resolve_group_by()?;
        self.resolve_where()?;
        let order_by = self.resolve_order_by()?;
        self.resolve_column()?;
        self.resolve_format()?;

        let grouped = implicit || !self.query.group_by.is_empty();
        tracing::debug!(
            types = self.types.len(),
            fields = self.fields.len(),
            grouped,
            implicit,
            "Resolved query"
        );

        Ok(Resolution {
            types: self.types,
            fields: self.fields,
            order_by,
            grouped,
            implicit,
        })
    }

    fn resolve_from(&mut self) -> QueryResult<()> {
        let query = self.query;
        let available = self.available;
        for source in &query.from {
            let mut matches: Vec<&Arc<EventType>> = available
                .iter()
                .filter(|t| t.name == source.name)
                .collect();
            if matches.is_empty() {
                matches = available
                    .iter()
                    .filter(|t| t.simple_name() == source.name)
                    .collect();
            }
            if matches.is_empty() {
                let names = available
                    .iter()
                    .flat_map(|t| [t.name.as_str(), t.simple_name()]);
                return Err(QueryError::UnknownType {
                    name: source.name.clone(),
                    suggestion: suggest::closest(&source.name, names),
                });
            }
            if source.alias.is_some() && matches.len() > 1 {
                return Err(QueryError::validation(format!(
                    "Alias can only refer to a single event type, '{}' matches {}",
                    source.name,
                    matches.len()
                )));
            }

            let mut indices = Vec::new();
            for event_type in matches {
                let index = match self.types.iter().position(|t| t.event_type().id == event_type.id) {
                    Some(index) => index,
                    None => {
                        self.types.push(FilteredType::new(Arc::clone(event_type)));
                        self.types.len() - 1
                    }
                };
                indices.push(index);
            }
            if let Some(alias) = &source.alias {
                self.type_aliases.insert(alias.clone(), indices);
            }
        }
        Ok(())
    }

    fn resolve_select(&mut self) -> QueryResult<()> {
        let query = self.query;
        if query.select.is_empty() {
            return self.resolve_wildcard();
        }
        for expression in &query.select {
            let mut field = self.resolve_expression(expression)?;
            field.visible = true;
            if let Some(alias) = &expression.alias {
                self.field_aliases.insert(alias.clone(), self.fields.len());
            }
            self.push(field);
        }
        Ok(())
    }

    fn resolve_wildcard(&mut self) -> QueryResult<()> {
        let mut by_name: Vec<(String, Vec<Field>)> = Vec::new();
        for (index, filtered) in self.types.iter().enumerate() {
            let builder = FieldBuilder::new(filtered.event_type(), index, &self.lookups);
            for field in builder.build_all() {
                match by_name.iter_mut().find(|(name, _)| *name == field.name) {
                    Some((_, fields)) => fields.push(field),
                    None => by_name.push((field.name.clone(), vec![field])),
                }
            }
        }
        for (name, fields) in by_name {
            let mut field = merge(&name, fields);
            field.visible = true;
            self.push(field);
        }
        Ok(())
    }

    fn resolve_expression(&self, expression: &Expression) -> QueryResult<Field> {
        if expression.name == "*" && expression.aggregator == Aggregator::Count {
            let mut field = Field::constant("*", Value::Long(1));
            configure_aggregator(&mut field, Aggregator::Count);
            return Ok(field);
        }

        let matches = self.resolve_name(&expression.name)?;
        let mut field = merge(&expression.name, matches.fields);
        validate_aggregator(&field, expression.aggregator)?;
        configure_aggregator(&mut field, expression.aggregator);
        Ok(field)
    }

    fn resolve_group_by(&mut self) -> QueryResult<bool> {
        let query = self.query;
        if query.group_by.is_empty() {
            if !query.has_aggregation() {
                return Ok(false);
            }
            let mut field = Field::constant("", Value::Null);
            field.grouper = true;
            self.push(field);
            return Ok(true);
        }

        for name in &query.group_by {
            if let Some(&index) = self.field_aliases.get(name) {
                if self.fields[index].is_aggregated() {
                    return Err(QueryError::validation(format!(
                        "Cannot group by '{}', it is an aggregated field",
                        name
                    )));
                }
                self.fields[index].grouper = true;
                continue;
            }
            match self
                .fields
                .iter()
                .position(|f| f.visible && !f.is_aggregated() && f.name == *name)
            {
                Some(index) => self.fields[index].grouper = true,
                None => {
                    let matches = self.resolve_name(name)?;
                    let mut field = merge(name, matches.fields);
                    field.grouper = true;
                    self.push(field);
                }
            }
        }
        Ok(false)
    }

    fn resolve_where(&mut self) -> QueryResult<()> {
        let query = self.query;
        for condition in &query.conditions {
            let matches = self.resolve_name(&condition.field)?;
            // Types without the field stay unfiltered
            for field in &matches.fields {
                if let Some(index) = field.type_index {
                    self.types[index].add_filter(Filter::new(
                        condition.field.clone(),
                        condition.value.clone(),
                        field.getter.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn resolve_order_by(&mut self) -> QueryResult<Vec<(usize, SortOrder)>> {
        let query = self.query;
        let mut order_by = Vec::new();
        for element in &query.order_by {
            let index = match self.field_aliases.get(&element.name) {
                Some(&index) => index,
                None => match self
                    .fields
                    .iter()
                    .position(|f| f.visible && f.name == element.name)
                {
                    Some(index) => index,
                    None => {
                        let matches = self.resolve_name(&element.name)?;
                        self.push(merge(&element.name, matches.fields));
                        self.fields.len() - 1
                    }
                },
            };
            self.fields[index].orderer = Some(element.order);
            order_by.push((index, element.order));
        }
        Ok(order_by)
    }

    fn resolve_column(&mut self) -> QueryResult<()> {
        let query = self.query;
        let columns = &query.column;
        if columns.is_empty() {
            return Ok(());
        }
        let visible = self.visible_count();
        if columns.len() != visible {
            return Err(QueryError::validation(format!(
                "Number of labels in COLUMN ({}) doesn't match number of fields in SELECT ({})",
                columns.len(),
                visible
            )));
        }
        for (field, label) in self.fields.iter_mut().filter(|f| f.visible).zip(columns) {
            field.label = label.clone();
        }
        Ok(())
    }

    fn resolve_format(&mut self) -> QueryResult<()> {
        let query = self.query;
        let formatters = &query.format;
        if formatters.is_empty() {
            return Ok(());
        }
        let visible = self.visible_count();
        if formatters.len() != visible {
            return Err(QueryError::validation(format!(
                "Number of formatters in FORMAT ({}) doesn't match number of fields in SELECT ({})",
                formatters.len(),
                visible
            )));
        }
        for (field, formatter) in self.fields.iter_mut().filter(|f| f.visible).zip(formatters) {
            for property in &formatter.properties {
                apply_property(field, *property);
            }
        }
        Ok(())
    }

    fn visible_count(&self) -> usize {
        self.fields.iter().filter(|f| f.visible).count()
    }

    fn push(&mut self, mut field: Field) {
        field.index = self.fields.len();
        self.fields.push(field);
    }

    /// Types a name is scoped to, and the field path within them
    fn scope<'n>(&self, name: &'n str) -> (Vec<usize>, &'n str) {
        if let Some(rest) = name.strip_prefix('[') {
            if let Some((list, path)) = rest.split_once("].") {
                let scope = list
                    .split('|')
                    .flat_map(|t| self.types_named(t.trim()))
                    .collect();
                return (scope, path);
            }
        }

        let by_full_name: Vec<usize> = self
            .types
            .iter()
            .enumerate()
            .filter(|(_, t)| qualified(name, &t.event_type().name).is_some())
            .map(|(i, _)| i)
            .collect();
        if let Some(&first) = by_full_name.first() {
            let type_name = &self.types[first].event_type().name;
            if let Some(path) = qualified(name, type_name) {
                return (by_full_name, path);
            }
        }

        if let Some((head, path)) = name.split_once('.') {
            if let Some(indices) = self.type_aliases.get(head) {
                return (indices.clone(), path);
            }
            let by_simple_name: Vec<usize> = self
                .types
                .iter()
                .enumerate()
                .filter(|(_, t)| t.event_type().simple_name() == head)
                .map(|(i, _)| i)
                .collect();
            if !by_simple_name.is_empty() {
                return (by_simple_name, path);
            }
        }

        ((0..self.types.len()).collect(), name)
    }

    fn types_named(&self, name: &str) -> Vec<usize> {
        if let Some(indices) = self.type_aliases.get(name) {
            return indices.clone();
        }
        self.types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.event_type().name == name || t.event_type().simple_name() == name)
            .map(|(i, _)| i)
            .collect()
    }

    fn resolve_name(&self, name: &str) -> QueryResult<Matches> {
        let (scope, path) = self.scope(name);
        let fields: Vec<Field> = scope
            .iter()
            .filter_map(|&index| {
                FieldBuilder::new(self.types[index].event_type(), index, &self.lookups).build(path)
            })
            .collect();

        if fields.is_empty() {
            let candidates: Vec<String> = scope
                .iter()
                .flat_map(|&index| {
                    FieldBuilder::new(self.types[index].event_type(), index, &self.lookups)
                        .field_names()
                })
                .collect();
            return Err(QueryError::UnknownField {
                name: name.to_string(),
                suggestion: suggest::closest(path, candidates.iter().map(String::as_str)),
            });
        }
        Ok(Matches { fields })
    }
}

fn qualified<'n>(name: &'n str, type_name: &str) -> Option<&'n str> {
    name.strip_prefix(type_name)?.strip_prefix('.')
}

/// Combine per-type fields into one column
fn merge(name: &str, mut fields: Vec<Field>) -> Field {
    if fields.len() == 1 {
        let mut field = fields.remove(0);
        field.name = name.to_string();
        return field;
    }

    let first = fields[0].clone();
    let same_kind = fields.iter().all(|f| f.same_kind(&first));
    let mut union = first;
    union.name = name.to_string();
    union.type_index = None;
    union.getter = getter(|_| Value::Null);

    if same_kind {
        union.source_fields = fields;
        return union;
    }

    union.source_fields = fields.into_iter().map(as_text).collect();
    union.data_type = TYPE_STRING.to_string();
    union.array = false;
    union.numeric = NumericKind::None;
    union.time = TimeKind::None;
    union.unit = UnitKind::None;
    union.alignment = Alignment::Left;
    union.lexical_sort = true;
    union.fixed_width = false;
    union
}

/// Wrap a field so it yields formatted text
fn as_text(field: Field) -> Field {
    let source = field.clone();
    let mut text = field;
    text.getter = getter(move |e| match (source.getter)(e) {
        Value::Null => Value::Null,
        value => Value::String(formatter::format(&source, &value)),
    });
    text
}

fn validate_aggregator(field: &Field, aggregator: Aggregator) -> QueryResult<()> {
    let valid = match aggregator {
        Aggregator::Sum
        | Aggregator::Average
        | Aggregator::StandardDeviation
        | Aggregator::Median
        | Aggregator::P90
        | Aggregator::P95
        | Aggregator::P99
        | Aggregator::P999 => field.is_numeric() || field.is_timespan(),
        Aggregator::Difference => {
            field.is_numeric() || field.is_timespan() || field.is_timestamp()
        }
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(QueryError::validation(format!(
            "Aggregator {} can't be used with '{}' of type {}",
            aggregator.query_name(),
            field.name,
            field.data_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RecordedEvent, ValueDescriptor, TYPE_THREAD};
    use crate::query::parser::parse_query;

    fn types() -> Vec<Arc<EventType>> {
        let thread = || {
            ValueDescriptor::new("eventThread", TYPE_THREAD)
                .field(ValueDescriptor::new("javaName", TYPE_STRING))
        };
        vec![
            Arc::new(
                EventType::new(1, "jdk.GarbageCollection")
                    .field(ValueDescriptor::new("startTime", "long").timestamp())
                    .field(ValueDescriptor::new("duration", "long").timespan())
                    .field(ValueDescriptor::new("gcId", "int"))
                    .field(ValueDescriptor::new("name", TYPE_STRING))
                    .field(
                        ValueDescriptor::new("when", "jdk.types.GCWhen")
                            .field(ValueDescriptor::new("cause", TYPE_STRING)),
                    ),
            ),
            Arc::new(
                EventType::new(2, "jdk.ThreadSleep")
                    .field(ValueDescriptor::new("startTime", "long").timestamp())
                    .field(ValueDescriptor::new("duration", "long").timespan())
                    .field(thread())
                    .field(ValueDescriptor::new("time", "long").timespan()),
            ),
            Arc::new(
                EventType::new(3, "jdk.ThreadPark")
                    .field(ValueDescriptor::new("startTime", "long").timestamp())
                    .field(ValueDescriptor::new("duration", "long").timespan())
                    .field(thread())
                    .field(ValueDescriptor::new("name", "int")),
            ),
            Arc::new(EventType::new(4, "other.ThreadPark")),
        ]
    }

    fn resolve_text(text: &str) -> QueryResult<Resolution> {
        let query = parse_query(text)?;
        resolve(&query, &types())
    }

    #[test]
    fn test_simple_and_full_names() {
        let resolution = resolve_text("SELECT gcId FROM GarbageCollection").unwrap();
        assert_eq!(resolution.types.len(), 1);
        assert_eq!(resolution.fields.len(), 1);
        assert!(!resolution.grouped);

        let resolution = resolve_text("SELECT gcId FROM jdk.GarbageCollection").unwrap();
        assert_eq!(resolution.types[0].event_type().id, 1);
    }

    #[test]
    fn test_unknown_type_suggestion() {
        let error = resolve_text("SELECT * FROM GarbageColection").unwrap_err();
        assert!(matches!(
            error,
            QueryError::UnknownType { suggestion: Some(ref s), .. } if s == "GarbageCollection"
        ));
    }

    #[test]
    fn test_unknown_field_suggestion() {
        let error = resolve_text("SELECT stratTime FROM GarbageCollection").unwrap_err();
        assert_eq!(
            error,
            QueryError::UnknownField {
                name: "stratTime".to_string(),
                suggestion: Some("startTime".to_string()),
            }
        );
        assert!(error.to_string().contains("Did you mean 'startTime'?"));
    }

    #[test]
    fn test_alias_on_multiple_types() {
        let error = resolve_text("SELECT * FROM ThreadPark AS p").unwrap_err();
        assert!(matches!(error, QueryError::Validation(_)));
    }

    #[test]
    fn test_union_of_types() {
        let resolution =
            resolve_text("SELECT duration FROM jdk.ThreadSleep, jdk.ThreadPark").unwrap();
        let field = &resolution.fields[0];
        assert_eq!(field.source_fields.len(), 2);
        assert_eq!(field.time, TimeKind::Span);
        assert!(!field.lexical_sort);
    }

    #[test]
    fn test_union_of_mixed_kinds_is_text() {
        let resolution =
            resolve_text("SELECT name FROM jdk.GarbageCollection, jdk.ThreadPark").unwrap();
        let field = &resolution.fields[0];
        assert_eq!(field.data_type, TYPE_STRING);
        assert!(field.lexical_sort);

        let park = Arc::clone(resolution.types[1].event_type());
        let event = RecordedEvent::builder(park).set("name", 7i64).build();
        assert_eq!(field.value(&event, 1), Value::from("7"));
    }

    #[test]
    fn test_qualified_names() {
        let resolution = resolve_text(
            "SELECT s.time, ThreadPark.name, [jdk.ThreadSleep|jdk.ThreadPark].duration \
             FROM jdk.ThreadSleep AS s, jdk.ThreadPark",
        )
        .unwrap();
        assert_eq!(resolution.fields[0].type_index, Some(0));
        assert_eq!(resolution.fields[1].type_index, Some(1));
        assert_eq!(resolution.fields[2].source_fields.len(), 2);
    }

    #[test]
    fn test_implicit_grouping() {
        let resolution = resolve_text("SELECT COUNT(*), SUM(duration) FROM GarbageCollection").unwrap();
        assert!(resolution.grouped);
        assert!(resolution.implicit);
        assert_eq!(resolution.fields.len(), 3);
        assert!(resolution.fields[2].grouper);
        assert!(!resolution.fields[2].visible);
        assert_eq!(resolution.fields[0].label, "Count");
    }

    #[test]
    fn test_group_by_hidden_field() {
        let resolution =
            resolve_text("SELECT COUNT(*) FROM ThreadSleep GROUP BY eventThread.javaName").unwrap();
        assert!(resolution.grouped);
        assert!(!resolution.implicit);
        let grouper = &resolution.fields[1];
        assert!(grouper.grouper && !grouper.visible);
        assert_eq!(grouper.name, "eventThread.javaName");
    }

    #[test]
    fn test_group_by_aggregate_alias() {
        let error =
            resolve_text("SELECT COUNT(*) AS c FROM GarbageCollection GROUP BY c").unwrap_err();
        assert!(matches!(error, QueryError::Validation(_)));
    }

    #[test]
    fn test_aggregator_validation() {
        let error = resolve_text("SELECT AVG(name) FROM GarbageCollection").unwrap_err();
        assert!(error.to_string().contains("AVG"));
        assert!(resolve_text("SELECT DIFF(startTime) FROM GarbageCollection").is_ok());
        assert!(resolve_text("SELECT AVG(duration) FROM GarbageCollection").is_ok());
    }

    #[test]
    fn test_where_attaches_filters() {
        let resolution =
            resolve_text("SELECT * FROM GarbageCollection WHERE name = 'G1 Young'").unwrap();
        assert_eq!(resolution.types[0].filters().len(), 1);

        let gc = Arc::clone(resolution.types[0].event_type());
        let young = RecordedEvent::builder(Arc::clone(&gc)).set("name", "G1 Young").build();
        let old = RecordedEvent::builder(gc).set("name", "G1 Old").build();
        assert!(resolution.types[0].matches(&young));
        assert!(!resolution.types[0].matches(&old));
    }

    #[test]
    fn test_order_by_alias_and_hidden() {
        let resolution = resolve_text(
            "SELECT name, MAX(duration) AS longest FROM GarbageCollection \
             GROUP BY name ORDER BY longest DESC, gcId",
        )
        .unwrap();
        assert_eq!(
            resolution.order_by,
            vec![(1, SortOrder::Descending), (2, SortOrder::None)]
        );
        assert!(!resolution.fields[2].visible);
        assert!(resolution.fields[0].grouper);
    }

    #[test]
    fn test_column_and_format() {
        let resolution = resolve_text(
            "COLUMN 'Id', 'Pause' FORMAT none, normalized SELECT gcId, duration FROM GarbageCollection",
        )
        .unwrap();
        assert_eq!(resolution.fields[0].label, "Id");
        assert!(resolution.fields[1].normalized);

        let error =
            resolve_text("COLUMN 'Id' SELECT gcId, duration FROM GarbageCollection").unwrap_err();
        assert!(matches!(error, QueryError::Validation(_)));
    }

    #[test]
    fn test_wildcard_expands_nested_fields() {
        let resolution = resolve_text("SELECT * FROM GarbageCollection").unwrap();
        let names: Vec<&str> = resolution.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["startTime", "duration", "gcId", "name", "when.cause"]);
        assert!(resolution.fields.iter().all(|f| f.visible));

        let resolution = resolve_text("SELECT * FROM ThreadSleep").unwrap();
        assert_eq!(resolution.fields[2].name, "eventThread");
    }
}
