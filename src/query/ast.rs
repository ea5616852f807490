//! Query Abstract Syntax Tree
//!
//! Defines the AST for the event query language, a restricted SQL-like
//! language over recorded events.
//!
//! # Example Queries
//!
//! ```text
//! SELECT * FROM GarbageCollection
//! SELECT AVG(duration), COUNT(*) FROM ThreadSleep GROUP BY eventThread
//! COLUMN 'Thread', 'Total' SELECT eventThread, SUM(duration) AS d
//!   FROM ThreadPark WHERE parkedClass = 'java.lang.Object'
//!   GROUP BY eventThread ORDER BY d DESC LIMIT 10
//! ```

use std::fmt;

/// A parsed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Label overrides, one per select expression
    pub column: Vec<String>,
    /// Render overrides, one per select expression
    pub format: Vec<Formatter>,
    /// Select expressions; empty means `*`
    pub select: Vec<Expression>,
    /// Event types to read
    pub from: Vec<Source>,
    /// Equality conditions, all must hold
    pub conditions: Vec<Condition>,
    /// Grouping fields
    pub group_by: Vec<String>,
    /// Ordering fields, first dominates
    pub order_by: Vec<OrderElement>,
    /// Maximum number of rows
    pub limit: Option<usize>,
}

impl Query {
    /// Start building a query reading from an event type
    pub fn builder(from: &str) -> QueryBuilder {
        QueryBuilder::new(from)
    }

    /// Whether any select expression uses an aggregator
    pub fn has_aggregation(&self) -> bool {
        self.select
            .iter()
            .any(|e| e.aggregator != Aggregator::Missing)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.column.is_empty() {
            let labels: Vec<String> = self.column.iter().map(|c| quote(c)).collect();
            write!(f, "COLUMN {} ", labels.join(", "))?;
        }
        if !self.format.is_empty() {
            write!(f, "FORMAT {} ", join(&self.format, ", "))?;
        }
        if self.select.is_empty() {
            write!(f, "SELECT *")?;
        } else {
            write!(f, "SELECT {}", join(&self.select, ", "))?;
        }
        write!(f, " FROM {}", join(&self.from, ", "))?;
        if !self.conditions.is_empty() {
            write!(f, " WHERE {}", join(&self.conditions, " AND "))?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", self.group_by.join(", "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join(&self.order_by, ", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

fn quote(text: &str) -> String {
    format!("'{}'", text)
}

/// A top-level command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a query
    Query(Query),
    /// List available event types
    ShowEvents,
    /// List the fields of an event type
    ShowFields(String),
}

/// Aggregation applied to a select expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aggregator {
    /// No aggregator: first non-null value
    #[default]
    Missing,
    /// Arithmetic mean
    Average,
    /// Number of values, including null
    Count,
    /// Last value minus first value
    Difference,
    /// First value, including null
    First,
    /// Last value, including null
    Last,
    /// Last value, only if it belongs to the most recent batch
    LastBatch,
    /// All values in order
    List,
    /// Largest value
    Maximum,
    /// Middle value
    Median,
    /// Smallest value
    Minimum,
    /// 90th percentile
    P90,
    /// 95th percentile
    P95,
    /// 99th percentile
    P99,
    /// 99.9th percentile
    P999,
    /// Distinct values in first-seen order
    Set,
    /// Population standard deviation
    StandardDeviation,
    /// Total
    Sum,
    /// Number of distinct values
    Unique,
}

impl Aggregator {
    /// Every aggregator usable in a query
    pub const ALL: &'static [Aggregator] = &[
        Self::Average,
        Self::Count,
        Self::Difference,
        Self::First,
        Self::Last,
        Self::LastBatch,
        Self::List,
        Self::Maximum,
        Self::Median,
        Self::Minimum,
        Self::P90,
        Self::P95,
        Self::P99,
        Self::P999,
        Self::Set,
        Self::StandardDeviation,
        Self::Sum,
        Self::Unique,
    ];

    /// Name used in query text
    pub fn query_name(&self) -> &'static str {
        match self {
            Self::Missing => "",
            Self::Average => "AVG",
            Self::Count => "COUNT",
            Self::Difference => "DIFF",
            Self::First => "FIRST",
            Self::Last => "LAST",
            Self::LastBatch => "LAST_BATCH",
            Self::List => "LIST",
            Self::Maximum => "MAX",
            Self::Median => "MEDIAN",
            Self::Minimum => "MIN",
            Self::P90 => "P90",
            Self::P95 => "P95",
            Self::P99 => "P99",
            Self::P999 => "P999",
            Self::Set => "SET",
            Self::StandardDeviation => "STDEV",
            Self::Sum => "SUM",
            Self::Unique => "UNIQUE",
        }
    }

    /// Parse a query name, case-insensitively
    pub fn from_query_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.query_name().eq_ignore_ascii_case(name))
    }

    /// Percentile rank for the Pxx family
    pub fn percentile(&self) -> Option<f64> {
        match self {
            Self::P90 => Some(0.90),
            Self::P95 => Some(0.95),
            Self::P99 => Some(0.99),
            Self::P999 => Some(0.999),
            _ => None,
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_name())
    }
}

/// A select expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Field name, or `*` under COUNT
    pub name: String,
    /// Optional alias
    pub alias: Option<String>,
    /// Aggregation function
    pub aggregator: Aggregator,
}

impl Expression {
    /// Plain field expression
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            aggregator: Aggregator::Missing,
        }
    }

    /// Aggregated field expression
    pub fn aggregate(aggregator: Aggregator, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            aggregator,
        }
    }

    /// Builder method: set alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.aggregator {
            Aggregator::Missing => write!(f, "{}", self.name)?,
            aggregator => write!(f, "{}({})", aggregator, self.name)?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// An event type in the FROM clause
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Full or simple type name
    pub name: String,
    /// Optional alias
    pub alias: Option<String>,
}

impl Source {
    /// Source without alias
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Builder method: set alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// An equality condition in the WHERE clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    /// Field name
    pub field: String,
    /// Literal the field value must match
    pub value: String,
}

impl Condition {
    /// Create a condition
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, quote(&self.value))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Direction chosen from the field
    #[default]
    None,
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// An element of the ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderElement {
    /// Field name or alias
    pub name: String,
    /// Direction
    pub order: SortOrder,
}

impl OrderElement {
    /// Create an order element
    pub fn new(name: impl Into<String>, order: SortOrder) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

impl fmt::Display for OrderElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::None => write!(f, "{}", self.name),
            SortOrder::Ascending => write!(f, "{} ASC", self.name),
            SortOrder::Descending => write!(f, "{} DESC", self.name),
        }
    }
}

/// A render override property in the FORMAT clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Keep defaults
    None,
    /// Value divided by the column total, shown as a percentage
    Normalized,
    /// Cut overflowing text at the start
    TruncateBeginning,
    /// Cut overflowing text at the end
    TruncateEnd,
    /// Maximum number of lines per cell
    CellHeight(usize),
    /// Render null as empty text
    MissingWhitespace,
    /// Timestamps with milliseconds
    MsPrecision,
}

impl Property {
    /// Parse a property as written in query text
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        match lower.as_str() {
            "none" => Some(Self::None),
            "normalized" => Some(Self::Normalized),
            "truncate-beginning" => Some(Self::TruncateBeginning),
            "truncate-end" => Some(Self::TruncateEnd),
            "missing:whitespace" => Some(Self::MissingWhitespace),
            "ms-precision" => Some(Self::MsPrecision),
            _ => lower
                .strip_prefix("cell-height:")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .map(Self::CellHeight),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Normalized => write!(f, "normalized"),
            Self::TruncateBeginning => write!(f, "truncate-beginning"),
            Self::TruncateEnd => write!(f, "truncate-end"),
            Self::CellHeight(n) => write!(f, "cell-height:{}", n),
            Self::MissingWhitespace => write!(f, "missing:whitespace"),
            Self::MsPrecision => write!(f, "ms-precision"),
        }
    }
}

/// Render overrides for one column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatter {
    /// Properties applied in order
    pub properties: Vec<Property>,
}

impl Formatter {
    /// Create a formatter from properties
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }
}

impl fmt::Display for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.properties.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", join(&self.properties, ";"))
    }
}

/// Builder for constructing queries programmatically
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Create a builder reading from one event type
    pub fn new(from: &str) -> Self {
        Self {
            query: Query {
                from: vec![Source::new(from)],
                ..Query::default()
            },
        }
    }

    /// Add another source
    pub fn from(mut self, source: Source) -> Self {
        self.query.from.push(source);
        self
    }

    /// Add a select expression
    pub fn select(mut self, expression: Expression) -> Self {
        self.query.select.push(expression);
        self
    }

    /// Add a column label
    pub fn column(mut self, label: impl Into<String>) -> Self {
        self.query.column.push(label.into());
        self
    }

    /// Add a column formatter
    pub fn format(mut self, formatter: Formatter) -> Self {
        self.query.format.push(formatter);
        self
    }

    /// Add an equality condition
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.conditions.push(Condition::new(field, value));
        self
    }

    /// Add a grouping field
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.query.group_by.push(field.into());
        self
    }

    /// Add an ordering field
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.query.order_by.push(OrderElement::new(field, order));
        self
    }

    /// Set a limit on rows
    pub fn limit(mut self, n: usize) -> Self {
        self.query.limit = Some(n);
        self
    }

    /// Build the query
    pub fn build(self) -> Query {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder_basic() {
        let query = Query::builder("jdk.GarbageCollection").build();

        assert!(query.select.is_empty());
        assert_eq!(query.from[0].name, "jdk.GarbageCollection");
        assert!(!query.has_aggregation());
        assert_eq!(query.to_string(), "SELECT * FROM jdk.GarbageCollection");
    }

    #[test]
    fn test_query_display() {
        let query = Query::builder("ThreadSleep")
            .column("Thread")
            .column("Total")
            .format(Formatter::default())
            .format(Formatter::new(vec![
                Property::TruncateBeginning,
                Property::CellHeight(3),
            ]))
            .select(Expression::field("eventThread"))
            .select(Expression::aggregate(Aggregator::Sum, "duration").alias("d"))
            .filter("eventThread.javaName", "main")
            .group_by("eventThread")
            .order_by("d", SortOrder::Descending)
            .limit(5)
            .build();

        assert!(query.has_aggregation());
        assert_eq!(
            query.to_string(),
            "COLUMN 'Thread', 'Total' FORMAT none, truncate-beginning;cell-height:3 \
             SELECT eventThread, SUM(duration) AS d FROM ThreadSleep \
             WHERE eventThread.javaName = 'main' GROUP BY eventThread ORDER BY d DESC LIMIT 5"
        );
    }

    #[test]
    fn test_aggregator_names() {
        assert_eq!(Aggregator::from_query_name("avg"), Some(Aggregator::Average));
        assert_eq!(Aggregator::from_query_name("Last_Batch"), Some(Aggregator::LastBatch));
        assert_eq!(Aggregator::from_query_name("STDEV"), Some(Aggregator::StandardDeviation));
        assert_eq!(Aggregator::from_query_name("mean"), None);
        assert_eq!(Aggregator::from_query_name(""), None);
        for aggregator in Aggregator::ALL {
            assert_eq!(Aggregator::from_query_name(aggregator.query_name()), Some(*aggregator));
        }
    }

    #[test]
    fn test_percentiles() {
        assert_eq!(Aggregator::P999.percentile(), Some(0.999));
        assert_eq!(Aggregator::Median.percentile(), None);
    }

    #[test]
    fn test_property_parse() {
        assert_eq!(Property::parse("cell-height:4"), Some(Property::CellHeight(4)));
        assert_eq!(Property::parse("cell-height:0"), None);
        assert_eq!(Property::parse("Truncate-End"), Some(Property::TruncateEnd));
        assert_eq!(Property::parse("missing:whitespace"), Some(Property::MissingWhitespace));
        assert_eq!(Property::parse("bold"), None);
    }
}
