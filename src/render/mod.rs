//! Text Rendering
//!
//! Prints query results as fixed-width text:
//!
//! - **Formatter**: values to display text using field render hints
//! - **Cell**: fitting values into a column, one or more lines
//! - **Table**: column width negotiation and table layout
//! - **Form**: a single record as `Label: value` lines
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventview::render;
//!
//! let tables = executor.finish();
//! render::print_table(&mut std::io::stdout(), &tables[0], &config.render)?;
//! ```

pub mod cell;
pub mod form;
pub mod formatter;
pub mod table;

pub use table::TableRenderer;

use crate::config::RenderConfig;
use crate::query::Table;
use std::io::{self, Write};

/// Print the title and timespan configured for a view
pub fn print_heading(out: &mut dyn Write, config: &RenderConfig) -> io::Result<()> {
    let mut printed = false;
    if config.show_title {
        if let Some(title) = &config.title {
            writeln!(out, "{}", title)?;
            printed = true;
        }
    }
    if config.show_timespan {
        if let (Some(start), Some(end)) = (config.start_time, config.end_time) {
            writeln!(
                out,
                "Timespan: {} - {}",
                formatter::format_instant(&start, false),
                formatter::format_instant(&end, false)
            )?;
            printed = true;
        }
    }
    if printed {
        writeln!(out)?;
    }
    Ok(())
}

/// Print a table, preceded by its heading
pub fn print_table(out: &mut dyn Write, table: &Table, config: &RenderConfig) -> io::Result<()> {
    print_heading(out, config)?;
    TableRenderer::new(table, config).render(out)
}

/// Print the first row of a table as a form, preceded by its heading
pub fn print_form(out: &mut dyn Write, table: &Table, config: &RenderConfig) -> io::Result<()> {
    print_heading(out, config)?;
    form::render(table, config, out)
}
