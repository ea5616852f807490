//! Event Query Engine
//!
//! Provides a SQL-like query language over recorded events:
//!
//! - **AST**: Query abstract syntax tree types
//! - **Parser**: Parse query strings into AST
//! - **Resolver**: Bind queries to event types and build output fields
//! - **Aggregation**: Streaming functions grouped by a histogram
//! - **Executor**: Run queries over one pass of an event stream
//!
//! # Query Language
//!
//! ```text
//! [COLUMN 'label' [, 'label2', ...]]
//! [FORMAT property[;property] [, ...]]
//! SELECT * | expression [AS alias] [, ...]
//! FROM type [AS alias] [, type2, ...]
//! [WHERE field = 'value' [AND ...]]
//! [GROUP BY field [, ...]]
//! [ORDER BY field [ASC|DESC] [, ...]]
//! [LIMIT n]
//! ```
//!
//! # Examples
//!
//! ## Using Query Builder
//!
//! ```rust,ignore
//! use eventview::query::{Aggregator, Expression, Query};
//!
//! let query = Query::builder("jdk.GarbageCollection")
//!     .select(Expression::field("name"))
//!     .select(Expression::aggregate(Aggregator::Maximum, "longestPause"))
//!     .group_by("name")
//!     .build();
//!
//! executor.add_query(query)?;
//! ```
//!
//! ## Using Query String
//!
//! ```rust,ignore
//! let mut executor = QueryExecutor::new();
//! executor.on_metadata(recording.event_types());
//! executor.add_query_str(
//!     "SELECT eventThread, SUM(duration) FROM ThreadSleep GROUP BY eventThread",
//! )?;
//! executor.execute(&mut recording)?;
//! let tables = executor.finish();
//! ```

mod ast;
mod error;
mod executor;
mod field;
mod field_builder;
mod filtered_type;
mod function;
mod histogram;
mod parser;
mod resolver;
mod run;
mod sorter;
mod suggest;
mod table;
mod tokenizer;

pub use ast::{
    Aggregator, Command, Condition, Expression, Formatter, OrderElement, Property, Query,
    QueryBuilder, SortOrder, Source,
};
pub use error::{QueryError, QueryResult};
pub use executor::QueryExecutor;
pub use field::{Alignment, Field, NumericKind, TimeKind, Truncate, UnitKind};
pub use field_builder::{FieldBuilder, Lookups};
pub use filtered_type::{getter, Filter, FilteredType, Getter};
pub use function::{create as create_function, Function};
pub use histogram::Histogram;
pub use parser::{parse_command, parse_query, QueryParser};
pub use resolver::{resolve, QueryResolver, Resolution};
pub use run::QueryRun;
pub use sorter::sort;
pub use suggest::{closest, edit_distance};
pub use table::{Row, Table};
