//! Execution of one resolved query
//!
//! A [`QueryRun`] receives events, routes each to the first source type it
//! matches, and either aggregates it or keeps one row per event. Completing
//! the run normalizes, formats, sorts and limits the rows into a [`Table`].

use crate::event::{EventType, RecordedEvent, Value};
use crate::query::ast::Query;
use crate::query::error::QueryResult;
use crate::query::field::{Field, NumericKind, TimeKind, UnitKind};
use crate::query::filtered_type::FilteredType;
use crate::query::histogram::Histogram;
use crate::query::resolver::{resolve, Resolution};
use crate::query::sorter;
use crate::query::table::{Row, Table};
use crate::render::formatter;
use std::sync::Arc;

/// A query accepting events
pub struct QueryRun {
    query: Query,
    resolution: Resolution,
    histogram: Option<Histogram>,
    rows: Vec<Row>,
    events: usize,
}

impl QueryRun {
    /// Resolve a query against the available types
    pub fn new(query: Query, types: &[Arc<EventType>]) -> QueryResult<Self> {
        let resolution = resolve(&query, types)?;
        let histogram = resolution
            .grouped
            .then(|| Histogram::new(&resolution.fields, resolution.implicit));
        Ok(Self {
            query,
            resolution,
            histogram,
            rows: Vec::new(),
            events: 0,
        })
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Source types with their filters
    pub fn types(&self) -> &[FilteredType] {
        &self.resolution.types
    }

    /// Number of events that passed the filters
    pub fn event_count(&self) -> usize {
        self.events
    }

    /// Add an event; events of other types or failing a filter are ignored
    pub fn add(&mut self, event: &RecordedEvent) {
        let Some(type_index) = self.resolution.types.iter().position(|t| t.matches(event)) else {
            return;
        };
        self.events += 1;
        match &mut self.histogram {
            Some(histogram) => histogram.add(event, type_index),
            None => self.rows.push(Row::new(
                self.resolution
                    .fields
                    .iter()
                    .map(|f| f.value(event, type_index))
                    .collect(),
            )),
        }
    }

    /// Produce the result table
    pub fn complete(self) -> Table {
        let Self {
            query,
            resolution,
            histogram,
            rows,
            events,
        } = self;

        let mut rows = match histogram {
            Some(histogram) => histogram.to_rows(),
            None => rows,
        };
        let mut fields = resolution.fields;
        for field in fields.iter_mut().filter(|f| f.normalized) {
            normalize(field, &mut rows);
        }
        for row in &mut rows {
            let texts = fields
                .iter()
                .map(|f| formatter::format(f, row.value(f.index)))
                .collect();
            row.set_texts(texts);
        }

        let mut table = Table::new(fields, resolution.order_by);
        table.rows = rows;
        table.query = query.to_string();
        sorter::sort(&mut table);
        if let Some(limit) = query.limit {
            table.rows.truncate(limit);
        }

        tracing::debug!(events, rows = table.rows.len(), "Query completed");
        table
    }
}

fn magnitude(value: &Value) -> Option<f64> {
    match value {
        Value::Duration(d) => d.num_nanoseconds().map(|n| n as f64),
        other => other.as_f64().filter(|v| v.is_finite()),
    }
}

/// Replace a column by each value's share of the column total
fn normalize(field: &mut Field, rows: &mut [Row]) {
    let total: f64 = rows.iter().filter_map(|r| magnitude(r.value(field.index))).sum();
    for row in rows.iter_mut() {
        let share = match magnitude(row.value(field.index)) {
            Some(v) if total != 0.0 => Value::Double(v / total),
            _ => Value::Null,
        };
        row.set_value(field.index, share);
    }
    field.unit = UnitKind::Percentage;
    field.numeric = NumericKind::Fractional;
    field.time = TimeKind::None;
    field.lexical_sort = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ValueDescriptor, TYPE_STRING};
    use crate::query::parser::parse_query;
    use chrono::{DateTime, TimeDelta};

    fn gc_type() -> Arc<EventType> {
        Arc::new(
            EventType::new(1, "jdk.GarbageCollection")
                .field(ValueDescriptor::new("startTime", "long").timestamp())
                .field(ValueDescriptor::new("duration", "long").timespan())
                .field(ValueDescriptor::new("gcId", "int"))
                .field(ValueDescriptor::new("name", TYPE_STRING)),
        )
    }

    fn gc(name: &str, gc_id: i64, millis: i64) -> RecordedEvent {
        RecordedEvent::builder(gc_type())
            .set("startTime", DateTime::from_timestamp(gc_id, 0).unwrap())
            .set("duration", TimeDelta::milliseconds(millis))
            .set("gcId", gc_id)
            .set("name", name)
            .build()
    }

    fn run(text: &str, events: &[RecordedEvent]) -> Table {
        let mut run = QueryRun::new(parse_query(text).unwrap(), &[gc_type()]).unwrap();
        for event in events {
            run.add(event);
        }
        run.complete()
    }

    fn events() -> Vec<RecordedEvent> {
        vec![
            gc("Young", 1, 10),
            gc("Old", 2, 100),
            gc("Young", 3, 30),
            gc("Young", 4, 20),
        ]
    }

    #[test]
    fn test_rows_per_event() {
        let table = run("SELECT gcId, name FROM GarbageCollection", &events());
        assert_eq!(table.len(), 4);
        assert_eq!(table.rows[0].value(0), &Value::Long(1));
        assert_eq!(table.rows[0].text(1), "Young");
    }

    #[test]
    fn test_grouped_and_sorted() {
        let table = run(
            "SELECT name, COUNT(*), SUM(duration) FROM GarbageCollection GROUP BY name",
            &events(),
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].value(0), &Value::from("Old"));
        assert_eq!(table.rows[1].value(1), &Value::Long(3));
        assert_eq!(table.rows[1].value(2), &Value::Duration(TimeDelta::milliseconds(60)));
    }

    #[test]
    fn test_count_without_events() {
        let table = run("SELECT COUNT(*) FROM GarbageCollection", &[]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].value(0), &Value::Long(0));
        assert_eq!(table.rows[0].text(0), "0");
    }

    #[test]
    fn test_filter_and_limit() {
        let table = run(
            "SELECT gcId FROM GarbageCollection WHERE name = 'Young' ORDER BY gcId DESC LIMIT 2",
            &events(),
        );
        let ids: Vec<&Value> = table.rows.iter().map(|r| r.value(0)).collect();
        assert_eq!(ids, vec![&Value::Long(4), &Value::Long(3)]);
    }

    #[test]
    fn test_filter_leaves_types_without_the_field() {
        let sleep_type = Arc::new(
            EventType::new(2, "jdk.ThreadSleep")
                .field(ValueDescriptor::new("startTime", "long").timestamp())
                .field(ValueDescriptor::new("duration", "long").timespan()),
        );
        let query = parse_query("SELECT gcId FROM GarbageCollection, ThreadSleep WHERE name = 'Young'")
            .unwrap();
        let mut run = QueryRun::new(query, &[gc_type(), Arc::clone(&sleep_type)]).unwrap();
        assert_eq!(run.types()[0].filters().len(), 1);
        assert!(run.types()[1].filters().is_empty());

        run.add(&gc("Young", 1, 10));
        run.add(&gc("Old", 2, 10));
        run.add(
            &RecordedEvent::builder(sleep_type)
                .set("duration", TimeDelta::milliseconds(5))
                .build(),
        );
        assert_eq!(run.event_count(), 2);

        let table = run.complete();
        assert_eq!(table.len(), 2);
        let ids: Vec<&Value> = table.rows.iter().map(|r| r.value(0)).collect();
        assert!(ids.contains(&&Value::Long(1)));
        assert!(ids.contains(&&Value::Null));
    }

    #[test]
    fn test_normalized_column() {
        let table = run(
            "FORMAT none, normalized SELECT name, SUM(duration) FROM GarbageCollection GROUP BY name",
            &events(),
        );
        let young = table
            .rows
            .iter()
            .find(|r| r.value(0) == &Value::from("Young"))
            .unwrap();
        assert_eq!(young.value(1), &Value::Double(60.0 / 160.0));
        assert_eq!(young.text(1), "37.50%");
        assert_eq!(table.fields[1].unit, UnitKind::Percentage);
    }
}
