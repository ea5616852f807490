//! # Eventview
//!
//! Analytic queries over recorded telemetry events - a restricted SQL-like
//! language with streaming aggregation and fixed-width text output.
//!
//! ## Features
//!
//! - **Query language**: SELECT, FROM, WHERE, GROUP BY, ORDER BY and LIMIT with
//!   COLUMN and FORMAT overrides
//! - **Schema resolution**: qualified, aliased and wildcard field names across
//!   several event types, with spelling suggestions
//! - **Streaming aggregation**: counts, sums, averages, percentiles, standard
//!   deviation, lists and sets, grouped in one pass
//! - **Rendering**: width-negotiated tables and single-record forms
//! - **Views**: named queries, built in or configured
//!
//! ## Modules
//!
//! - [`event`]: Event types, values and JSON recordings
//! - [`query`]: Query language parser, resolver and executor
//! - [`render`]: Table and form output
//! - [`view`]: Named views
//! - [`config`]: Configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventview::event::{EventSource, Recording};
//! use eventview::query::QueryExecutor;
//! use eventview::config::RenderConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut recording = Recording::open("recording.json")?;
//!
//!     let mut executor = QueryExecutor::new();
//!     executor.on_metadata(recording.event_types());
//!     executor.add_query_str(
//!         "SELECT name, COUNT(*), MAX(duration) FROM GarbageCollection GROUP BY name",
//!     )?;
//!     executor.execute(&mut recording)?;
//!
//!     for table in executor.finish() {
//!         eventview::render::print_table(&mut std::io::stdout(), &table, &RenderConfig::default())?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod event;
pub mod query;
pub mod render;
pub mod view;

// Re-export top-level types for convenience
pub use event::{
    EventSource, EventType, RecordedEvent, RecordedObject, Recording, RecordingError,
    RecordingResult, Value, ValueDescriptor,
};

pub use query::{
    parse_command, parse_query, Command, Query, QueryError, QueryExecutor, QueryResult, Table,
};

pub use config::{Config, ConfigError, LoggingConfig, RenderConfig};

pub use view::{ViewCatalog, ViewDefinition, ViewError};
