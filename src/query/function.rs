//! Aggregation functions
//!
//! Each [`Aggregator`] maps to a streaming accumulator. Values are fed one at a
//! time with [`Function::add`]; [`Function::result`] reads the aggregate.
//!
//! Numeric functions skip null and non-finite values. COUNT counts everything,
//! and functions that saw no usable value return `Value::Null`, except COUNT
//! and UNIQUE which return zero.

use crate::event::Value;
use crate::query::ast::Aggregator;
use crate::query::field::{Field, NumericKind};
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A streaming accumulator
pub trait Function: Send {
    /// Feed one value
    fn add(&mut self, value: &Value);

    /// Feed one value together with the end time of the event it came from
    fn add_at(&mut self, value: &Value, _end_time: Option<DateTime<Utc>>) {
        self.add(value);
    }

    /// Aggregate of the values fed so far
    fn result(&self) -> Value;

    /// End time of the event behind the result, for LAST_BATCH
    fn batch_time(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Create the accumulator for a field's aggregator
pub fn create(field: &Field) -> Box<dyn Function> {
    let timespan = field.is_timespan();
    match field.aggregator {
        Aggregator::Missing => Box::new(FirstNonNull::default()),
        Aggregator::First => Box::new(First::default()),
        Aggregator::Last => Box::new(Last::default()),
        Aggregator::LastBatch => Box::new(LastBatch::default()),
        Aggregator::Count => Box::new(Count::default()),
        Aggregator::Unique => Box::new(Unique::default()),
        Aggregator::Sum if timespan => Box::new(DurationSum::default()),
        Aggregator::Sum if field.numeric == NumericKind::Integral => Box::new(LongSum::default()),
        Aggregator::Sum => Box::new(DoubleSum::default()),
        Aggregator::Average if timespan => Box::new(DurationAverage::default()),
        Aggregator::Average => Box::new(DoubleAverage::default()),
        Aggregator::Difference => Box::new(Difference::default()),
        Aggregator::Minimum => Box::new(Extreme::new(Ordering::Less)),
        Aggregator::Maximum => Box::new(Extreme::new(Ordering::Greater)),
        Aggregator::Median => Box::new(Quantile::new(None)),
        Aggregator::P90 | Aggregator::P95 | Aggregator::P99 | Aggregator::P999 => {
            Box::new(Quantile::new(field.aggregator.percentile()))
        }
        Aggregator::StandardDeviation => Box::new(StandardDeviation::new(timespan)),
        Aggregator::List => Box::new(List::default()),
        Aggregator::Set => Box::new(Set::default()),
    }
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn nanos(duration: &TimeDelta) -> i128 {
    duration.num_seconds() as i128 * NANOS_PER_SECOND + duration.subsec_nanos() as i128
}

fn from_nanos(nanos: i128) -> Value {
    let seconds = nanos.div_euclid(NANOS_PER_SECOND);
    let rest = nanos.rem_euclid(NANOS_PER_SECOND) as i64;
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|s| s.checked_add(&TimeDelta::nanoseconds(rest)))
        .map(Value::Duration)
        .unwrap_or(Value::Null)
}

#[derive(Default)]
struct FirstNonNull {
    value: Option<Value>,
}

impl Function for FirstNonNull {
    fn add(&mut self, value: &Value) {
        if self.value.is_none() && !value.is_null() {
            self.value = Some(value.clone());
        }
    }

    fn result(&self) -> Value {
        self.value.clone().unwrap_or_default()
    }
}

#[derive(Default)]
struct First {
    value: Option<Value>,
}

impl Function for First {
    fn add(&mut self, value: &Value) {
        if self.value.is_none() {
            self.value = Some(value.clone());
        }
    }

    fn result(&self) -> Value {
        self.value.clone().unwrap_or_default()
    }
}

#[derive(Default)]
struct Last {
    value: Value,
}

impl Function for Last {
    fn add(&mut self, value: &Value) {
        self.value = value.clone();
    }

    fn result(&self) -> Value {
        self.value.clone()
    }
}

#[derive(Default)]
struct LastBatch {
    value: Value,
    end_time: Option<DateTime<Utc>>,
}

impl Function for LastBatch {
    fn add(&mut self, value: &Value) {
        self.value = value.clone();
    }

    fn add_at(&mut self, value: &Value, end_time: Option<DateTime<Utc>>) {
        self.value = value.clone();
        self.end_time = end_time;
    }

    fn result(&self) -> Value {
        self.value.clone()
    }

    fn batch_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }
}

#[derive(Default)]
struct Count {
    count: i64,
}

impl Function for Count {
    fn add(&mut self, _value: &Value) {
        self.count += 1;
    }

    fn result(&self) -> Value {
        Value::Long(self.count)
    }
}

#[derive(Default)]
struct Unique {
    values: HashSet<Value>,
}

impl Function for Unique {
    fn add(&mut self, value: &Value) {
        if !self.values.contains(value) {
            self.values.insert(value.clone());
        }
    }

    fn result(&self) -> Value {
        Value::Long(self.values.len() as i64)
    }
}

#[derive(Default)]
struct LongSum {
    sum: i64,
    seen: bool,
}

impl Function for LongSum {
    fn add(&mut self, value: &Value) {
        match value {
            Value::Long(v) => {
                self.sum = self.sum.wrapping_add(*v);
                self.seen = true;
            }
            Value::Double(v) if v.is_finite() => {
                self.sum = self.sum.wrapping_add(*v as i64);
                self.seen = true;
            }
            _ => {}
        }
    }

    fn result(&self) -> Value {
        if self.seen {
            Value::Long(self.sum)
        } else {
            Value::Null
        }
    }
}

#[derive(Default)]
struct DoubleSum {
    sum: f64,
    seen: bool,
}

impl Function for DoubleSum {
    fn add(&mut self, value: &Value) {
        if let Some(v) = finite(value) {
            self.sum += v;
            self.seen = true;
        }
    }

    fn result(&self) -> Value {
        if self.seen {
            Value::Double(self.sum)
        } else {
            Value::Null
        }
    }
}

/// Seconds and nanoseconds are summed separately
#[derive(Default)]
struct DurationSum {
    seconds: i128,
    nanos: i128,
    seen: bool,
}

impl DurationSum {
    fn add_duration(&mut self, value: &Value) {
        if let Value::Duration(d) = value {
            self.seconds += d.num_seconds() as i128;
            self.nanos += d.subsec_nanos() as i128;
            self.seen = true;
        }
    }

    fn total_nanos(&self) -> i128 {
        self.seconds * NANOS_PER_SECOND + self.nanos
    }
}

impl Function for DurationSum {
    fn add(&mut self, value: &Value) {
        self.add_duration(value);
    }

    fn result(&self) -> Value {
        if self.seen {
            from_nanos(self.total_nanos())
        } else {
            Value::Null
        }
    }
}

#[derive(Default)]
struct DurationAverage {
    sum: DurationSum,
    count: i128,
}

impl Function for DurationAverage {
    fn add(&mut self, value: &Value) {
        if matches!(value, Value::Duration(_)) {
            self.sum.add_duration(value);
            self.count += 1;
        }
    }

    fn result(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        from_nanos(self.sum.total_nanos() / self.count)
    }
}

#[derive(Default)]
struct DoubleAverage {
    sum: f64,
    count: u64,
}

impl Function for DoubleAverage {
    fn add(&mut self, value: &Value) {
        if let Some(v) = finite(value) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn result(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        Value::Double(self.sum / self.count as f64)
    }
}

/// Last value minus first value
#[derive(Default)]
struct Difference {
    first: Option<Value>,
    last: Option<Value>,
}

impl Function for Difference {
    fn add(&mut self, value: &Value) {
        let usable = match value {
            Value::Long(_) | Value::Instant(_) | Value::Duration(_) => true,
            Value::Double(v) => v.is_finite(),
            _ => false,
        };
        if !usable {
            return;
        }
        if self.first.is_none() {
            self.first = Some(value.clone());
        } else {
            self.last = Some(value.clone());
        }
    }

    fn result(&self) -> Value {
        let first = match &self.first {
            Some(first) => first,
            None => return Value::Null,
        };
        let last = match (&self.last, first) {
            (Some(last), _) => last,
            (None, Value::Instant(_)) => return Value::Duration(TimeDelta::MAX),
            (None, _) => first,
        };
        match (first, last) {
            (Value::Long(a), Value::Long(b)) => Value::Long(b.wrapping_sub(*a)),
            (Value::Instant(a), Value::Instant(b)) => Value::Duration(b.signed_duration_since(*a)),
            (Value::Duration(a), Value::Duration(b)) => from_nanos(nanos(b) - nanos(a)),
            _ => match (first.as_f64(), last.as_f64()) {
                (Some(a), Some(b)) => Value::Double(b - a),
                _ => Value::Null,
            },
        }
    }
}

/// Minimum or maximum by natural ordering
struct Extreme {
    keep: Ordering,
    value: Option<Value>,
}

impl Extreme {
    fn new(keep: Ordering) -> Self {
        Self { keep, value: None }
    }
}

impl Function for Extreme {
    fn add(&mut self, value: &Value) {
        if value.is_null() || matches!(value, Value::Double(v) if !v.is_finite()) {
            return;
        }
        let replace = match &self.value {
            None => true,
            Some(current) => value.compare(current) == Some(self.keep),
        };
        if replace {
            self.value = Some(value.clone());
        }
    }

    fn result(&self) -> Value {
        self.value.clone().unwrap_or_default()
    }
}

/// Median, or a percentile when `rank` is set
struct Quantile {
    rank: Option<f64>,
    numbers: Vec<f64>,
    durations: Vec<i128>,
}

impl Quantile {
    fn new(rank: Option<f64>) -> Self {
        Self {
            rank,
            numbers: Vec::new(),
            durations: Vec::new(),
        }
    }

    fn select(&self, sorted: &[f64]) -> Option<f64> {
        let n = sorted.len();
        if n == 0 {
            return None;
        }
        match self.rank {
            None if n % 2 == 1 => Some(sorted[n / 2]),
            None => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
            Some(p) => {
                let position = (n as f64 + 1.0) * p - 1.0;
                if position < 0.0 {
                    return Some(sorted[0]);
                }
                if position >= (n - 1) as f64 {
                    return Some(sorted[n - 1]);
                }
                let lower = position.floor() as usize;
                let fraction = position - lower as f64;
                Some(sorted[lower] + fraction * (sorted[lower + 1] - sorted[lower]))
            }
        }
    }
}

impl Function for Quantile {
    fn add(&mut self, value: &Value) {
        match value {
            Value::Duration(d) => self.durations.push(nanos(d)),
            _ => {
                if let Some(v) = finite(value) {
                    self.numbers.push(v);
                }
            }
        }
    }

    fn result(&self) -> Value {
        if !self.durations.is_empty() {
            let mut sorted: Vec<f64> = self.durations.iter().map(|d| *d as f64).collect();
            sorted.sort_by(f64::total_cmp);
            return self
                .select(&sorted)
                .map(|n| from_nanos(n.round() as i128))
                .unwrap_or_default();
        }
        let mut sorted = self.numbers.clone();
        sorted.sort_by(f64::total_cmp);
        self.select(&sorted).map(Value::Double).unwrap_or_default()
    }
}

/// Population standard deviation using Welford's method
struct StandardDeviation {
    timespan: bool,
    count: u64,
    mean: f64,
    m2: f64,
}

impl StandardDeviation {
    fn new(timespan: bool) -> Self {
        Self {
            timespan,
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }
}

impl Function for StandardDeviation {
    fn add(&mut self, value: &Value) {
        let x = match value {
            Value::Duration(d) => nanos(d) as f64,
            _ => match finite(value) {
                Some(x) => x,
                None => return,
            },
        };
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn result(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        let deviation = (self.m2 / self.count as f64).sqrt();
        if self.timespan {
            from_nanos(deviation.round() as i128)
        } else {
            Value::Double(deviation)
        }
    }
}

#[derive(Default)]
struct List {
    values: Vec<Value>,
}

impl Function for List {
    fn add(&mut self, value: &Value) {
        self.values.push(value.clone());
    }

    fn result(&self) -> Value {
        Value::Array(self.values.clone())
    }
}

/// Distinct values in first-seen order
#[derive(Default)]
struct Set {
    seen: HashSet<Value>,
    values: Vec<Value>,
}

impl Function for Set {
    fn add(&mut self, value: &Value) {
        if self.seen.insert(value.clone()) {
            self.values.push(value.clone());
        }
    }

    fn result(&self) -> Value {
        Value::Array(self.values.clone())
    }
}
