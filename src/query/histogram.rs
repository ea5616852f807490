//! Grouped aggregation
//!
//! A [`Histogram`] keeps one bucket of [`Function`]s per distinct grouping
//! key. Buckets are created on first sight and keep insertion order.
//!
//! Structured values are keyed by identity rather than content: objects with
//! an id by `(type, id)`, stack traces by their frames, frames by method, line,
//! bytecode index and frame type, and thread groups by name and parent name.

use crate::event::{
    RecordedEvent, RecordedObject, Value, TYPE_STACK_FRAME, TYPE_STACK_TRACE, TYPE_THREAD_GROUP,
};
use crate::query::ast::Aggregator;
use crate::query::field::Field;
use crate::query::function::{self, Function};
use crate::query::table::Row;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Normalized grouping key of one value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Value(Value),
    Identity {
        type_name: String,
        id: u64,
    },
    Frame {
        method: Box<LookupKey>,
        line: Option<i64>,
        bytecode_index: Option<i64>,
        kind: Option<String>,
    },
    StackTrace(Vec<LookupKey>),
    ThreadGroup {
        name: Option<String>,
        parent: Option<String>,
    },
    List(Vec<LookupKey>),
}

impl LookupKey {
    fn of(value: &Value) -> Self {
        match value {
            Value::Object(object) => Self::of_object(object),
            Value::Array(values) => Self::List(values.iter().map(Self::of).collect()),
            other => Self::Value(other.clone()),
        }
    }

    fn of_object(object: &Arc<RecordedObject>) -> Self {
        match object.type_name.as_str() {
            TYPE_STACK_TRACE => Self::StackTrace(
                object
                    .get("frames")
                    .and_then(Value::as_array)
                    .unwrap_or(&[])
                    .iter()
                    .map(Self::of)
                    .collect(),
            ),
            TYPE_STACK_FRAME => Self::Frame {
                method: Box::new(object.get("method").map(Self::of).unwrap_or(Self::Value(Value::Null))),
                line: object.get_long("lineNumber"),
                bytecode_index: object.get_long("bytecodeIndex"),
                kind: object.get_str("type").map(str::to_string),
            },
            TYPE_THREAD_GROUP => Self::ThreadGroup {
                name: object.get_str("name").map(str::to_string),
                parent: object
                    .get_object("parent")
                    .and_then(|p| p.get_str("name"))
                    .map(str::to_string),
            },
            _ => match object.id {
                Some(id) => Self::Identity {
                    type_name: object.type_name.clone(),
                    id,
                },
                None => Self::Value(Value::Object(Arc::clone(object))),
            },
        }
    }
}

struct Bucket {
    functions: Vec<Box<dyn Function>>,
}

impl Bucket {
    fn new(fields: &[Field]) -> Self {
        Self {
            functions: fields.iter().map(function::create).collect(),
        }
    }

    fn row(&self) -> Row {
        Row::new(self.functions.iter().map(|f| f.result()).collect())
    }
}

/// Buckets of aggregation functions keyed by the grouping fields
pub struct Histogram {
    fields: Vec<Field>,
    groupers: Vec<usize>,
    buckets: Vec<Bucket>,
    index: HashMap<Vec<LookupKey>, usize>,
    last_end_time: Option<DateTime<Utc>>,
    last_batch: Vec<usize>,
    implicit: bool,
}

impl Histogram {
    /// Create a histogram over `fields`. With `implicit` grouping an empty
    /// input still yields one row.
    pub fn new(fields: &[Field], implicit: bool) -> Self {
        Self {
            fields: fields.to_vec(),
            groupers: fields
                .iter()
                .filter(|f| f.grouper)
                .map(|f| f.index)
                .collect(),
            buckets: Vec::new(),
            index: HashMap::new(),
            last_end_time: None,
            last_batch: fields
                .iter()
                .filter(|f| f.aggregator == Aggregator::LastBatch)
                .map(|f| f.index)
                .collect(),
            implicit,
        }
    }

    /// Add an event delivered under the type at `type_index`
    pub fn add(&mut self, event: &RecordedEvent, type_index: usize) {
        let values: Vec<Value> = self
            .fields
            .iter()
            .map(|f| f.value(event, type_index))
            .collect();
        let key: Vec<LookupKey> = self
            .groupers
            .iter()
            .map(|i| LookupKey::of(&values[*i]))
            .collect();

        let end_time = event.end_time();
        if end_time.is_some() {
            self.last_end_time = end_time;
        }

        let position = match self.index.get(&key) {
            Some(position) => *position,
            None => {
                self.buckets.push(Bucket::new(&self.fields));
                let position = self.buckets.len() - 1;
                self.index.insert(key, position);
                position
            }
        };

        for (function, value) in self.buckets[position].functions.iter_mut().zip(&values) {
            function.add_at(value, end_time);
        }
    }

    /// Number of distinct groups seen
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// One row per group, without groups whose last batch is stale
    pub fn to_rows(&self) -> Vec<Row> {
        if self.buckets.is_empty() && self.implicit {
            return vec![Bucket::new(&self.fields).row()];
        }
        self.buckets
            .iter()
            .filter(|bucket| self.in_last_batch(bucket))
            .map(Bucket::row)
            .collect()
    }

    fn in_last_batch(&self, bucket: &Bucket) -> bool {
        self.last_batch
            .iter()
            .all(|i| bucket.functions[*i].batch_time() == self.last_end_time)
    }
}
