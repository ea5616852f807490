//! Query Executor
//!
//! Runs any number of queries over one pass of an event stream:
//! 1. Schema snapshot from the event source
//! 2. Resolution of each query (failures are independent)
//! 3. Routing of each event to the queries reading its type
//! 4. One result table per accepted query
//!
//! # Execution Pipeline
//!
//! ```text
//! Query → Resolve → Route → Filter → Aggregate → Sort → Table
//! ```

use crate::event::{EventSource, EventType, RecordedEvent, RecordingResult, Value, ValueDescriptor};
use crate::query::ast::{Aggregator, Query};
use crate::query::error::{QueryError, QueryResult};
use crate::query::field::{Alignment, Field, NumericKind};
use crate::query::parser::parse_query;
use crate::query::run::QueryRun;
use crate::query::sorter;
use crate::query::suggest;
use crate::query::table::{Row, Table};
use crate::render::formatter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Query executor
#[derive(Default)]
pub struct QueryExecutor {
    /// Available event types
    types: Vec<Arc<EventType>>,
    /// Accepted queries
    runs: Vec<QueryRun>,
    /// Event type id to the queries reading it
    routes: HashMap<u64, Vec<usize>>,
    /// Events seen per event type id
    event_counts: HashMap<u64, usize>,
}

impl QueryExecutor {
    /// Create an executor with no schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the schema snapshot; queries are resolved against it
    pub fn on_metadata(&mut self, types: Vec<Arc<EventType>>) {
        tracing::debug!(types = types.len(), "Received event types");
        self.types = types;
    }

    /// Available event types
    pub fn types(&self) -> &[Arc<EventType>] {
        &self.types
    }

    /// Parse and add a query, returning its position among accepted queries
    pub fn add_query_str(&mut self, text: &str) -> QueryResult<usize> {
        let query = parse_query(text).inspect_err(|e| {
            tracing::warn!(query = %text, error = %e, "Rejected query");
        })?;
        self.add_query(query)
    }

    /// Add a parsed query, returning its position among accepted queries
    pub fn add_query(&mut self, query: Query) -> QueryResult<usize> {
        let run = QueryRun::new(query.clone(), &self.types).inspect_err(|e| {
            tracing::warn!(query = %query, error = %e, "Rejected query");
        })?;

        let position = self.runs.len();
        for filtered in run.types() {
            let routes = self.routes.entry(filtered.event_type().id).or_default();
            if !routes.contains(&position) {
                routes.push(position);
            }
        }
        tracing::debug!(query = %query, position, "Accepted query");
        self.runs.push(run);
        Ok(position)
    }

    /// Deliver one event to the queries reading its type
    pub fn on_event(&mut self, event: &RecordedEvent) {
        let id = event.event_type().id;
        *self.event_counts.entry(id).or_default() += 1;
        if let Some(routes) = self.routes.get(&id) {
            for position in routes {
                self.runs[*position].add(event);
            }
        }
    }

    /// Replay a source through every accepted query
    pub fn execute<S: EventSource + ?Sized>(&mut self, source: &mut S) -> RecordingResult<()> {
        let start = Instant::now();
        if self.types.is_empty() {
            self.on_metadata(source.event_types());
        }
        source.replay(&mut |event| self.on_event(event))?;
        tracing::debug!(
            events = self.event_counts.values().sum::<usize>(),
            queries = self.runs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stream completed"
        );
        Ok(())
    }

    /// Number of events seen for a type
    pub fn event_count(&self, event_type: &EventType) -> usize {
        self.event_counts.get(&event_type.id).copied().unwrap_or(0)
    }

    /// Complete every accepted query, in the order they were added
    pub fn finish(self) -> Vec<Table> {
        self.runs.into_iter().map(QueryRun::complete).collect()
    }

    /// Table of available event types with their event counts
    pub fn show_events(&self) -> Table {
        let rows = self
            .types
            .iter()
            .map(|t| {
                vec![
                    Value::from(t.name.as_str()),
                    Value::from(t.display_label()),
                    Value::Long(self.event_count(t) as i64),
                ]
            })
            .collect();
        let mut table = listing(&[("name", "Event Type"), ("label", "Label"), ("count", "Count")], rows);
        table.fields[2].numeric = NumericKind::Integral;
        table.fields[2].alignment = Alignment::Right;
        table.order_by = vec![(0, Default::default())];
        sorter::sort(&mut table);
        table.query = "SHOW EVENTS".to_string();
        table
    }

    /// Table of the fields of one event type
    pub fn show_fields(&self, name: &str) -> QueryResult<Table> {
        let event_type = self
            .types
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.types.iter().find(|t| t.simple_name() == name))
            .ok_or_else(|| QueryError::UnknownType {
                name: name.to_string(),
                suggestion: suggest::closest(
                    name,
                    self.types.iter().flat_map(|t| [t.name.as_str(), t.simple_name()]),
                ),
            })?;

        let mut rows = Vec::new();
        for descriptor in &event_type.fields {
            rows.push(field_row(&descriptor.name, descriptor));
            if !descriptor.is_leaf_type() && !descriptor.array {
                for child in &descriptor.fields {
                    rows.push(field_row(&format!("{}.{}", descriptor.name, child.name), child));
                }
            }
        }
        let mut table = listing(&[("name", "Field"), ("type", "Type"), ("label", "Label")], rows);
        table.query = format!("SHOW FIELDS {}", event_type.name);
        Ok(table)
    }
}

fn field_row(path: &str, descriptor: &ValueDescriptor) -> Vec<Value> {
    let mut type_name = descriptor.type_name.clone();
    if descriptor.array {
        type_name.push_str("[]");
    }
    vec![
        Value::from(path),
        Value::from(type_name),
        Value::from(descriptor.display_label()),
    ]
}

/// Table over literal rows, for listings that are not queries
fn listing(columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> Table {
    let fields: Vec<Field> = columns
        .iter()
        .enumerate()
        .map(|(index, (name, label))| {
            let mut field = Field::constant(*name, Value::Null);
            field.label = label.to_string();
            field.index = index;
            field.visible = true;
            field.aggregator = Aggregator::Missing;
            field
        })
        .collect();
    let rows = rows
        .into_iter()
        .map(|values| {
            let mut row = Row::new(values);
            let texts = fields
                .iter()
                .map(|f| formatter::format(f, row.value(f.index)))
                .collect();
            row.set_texts(texts);
            row
        })
        .collect();
    let mut table = Table::new(fields, Vec::new());
    table.rows = rows;
    table
}
