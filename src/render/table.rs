//! Table rendering
//!
//! Column widths are negotiated before anything is printed. Every column gets
//! its minimum width first; remaining space goes, one character at a time in
//! turn, to columns below their preferred width, then to variable-width
//! columns, and only when every column is fixed-width, to all of them.

use crate::config::RenderConfig;
use crate::query::{Field, Table};
use crate::render::cell::{char_count, fit, pad, Cell};
use crate::render::formatter;
use std::io::{self, Write};

/// Total width when none is configured
const MAX_PREFERRED_WIDTH: usize = 160;

#[derive(Debug, Clone)]
struct Column<'a> {
    field: &'a Field,
    minimum: usize,
    preferred: usize,
    width: usize,
}

/// Renders a result table as fixed-width text
pub struct TableRenderer<'a> {
    table: &'a Table,
    config: &'a RenderConfig,
    columns: Vec<Column<'a>>,
}

impl<'a> TableRenderer<'a> {
    pub fn new(table: &'a Table, config: &'a RenderConfig) -> Self {
        let columns = table
            .visible_fields()
            .map(|field| {
                let mut header = char_count(&field.label);
                if config.verbose {
                    header = header.max(char_count(&field.name));
                }
                let longest = table
                    .rows
                    .iter()
                    .map(|row| longest_line(field, row.value(field.index), row.text(field.index)))
                    .max()
                    .unwrap_or(0);
                Column {
                    field,
                    minimum: header + 1,
                    preferred: header.max(longest) + 1,
                    width: 0,
                }
            })
            .collect();
        Self {
            table,
            config,
            columns,
        }
    }

    /// Width of the whole table
    pub fn width(&self) -> usize {
        self.config.width.unwrap_or_else(|| {
            self.columns
                .iter()
                .map(|c| c.preferred)
                .sum::<usize>()
                .min(MAX_PREFERRED_WIDTH)
        })
    }

    /// Negotiated width of each visible column, separator included
    pub fn column_widths(&mut self) -> Option<Vec<usize>> {
        let width = self.width();
        let minimum: usize = self.columns.iter().map(|c| c.minimum).sum();
        if minimum > width {
            return None;
        }
        for column in &mut self.columns {
            column.width = column.minimum;
        }

        let mut remaining = width - minimum;
        remaining = distribute(&mut self.columns, remaining, |c| c.width < c.preferred);
        remaining = distribute(&mut self.columns, remaining, |c| !c.field.fixed_width);
        if self.columns.iter().all(|c| c.field.fixed_width) {
            distribute(&mut self.columns, remaining, |_| true);
        }
        Some(self.columns.iter().map(|c| c.width).collect())
    }

    /// Write the table
    pub fn render(mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.config.verbose {
            writeln!(out, "{}", self.table.query)?;
            writeln!(out)?;
        }
        if self.table.is_empty() {
            writeln!(out, "No events found.")?;
            return Ok(());
        }
        if self.column_widths().is_none() {
            writeln!(
                out,
                "Too many columns to fit width {}. Use a larger width or select fewer fields.",
                self.width()
            )?;
            return Ok(());
        }

        self.write_header(out)?;
        for row in &self.table.rows {
            let cells: Vec<Cell> = self
                .columns
                .iter()
                .map(|c| {
                    Cell::new(
                        c.field,
                        row.value(c.field.index),
                        c.width - 1,
                        self.config.cell_height.unwrap_or(c.field.cell_height),
                        self.config.truncate.unwrap_or(c.field.truncate),
                    )
                })
                .collect();
            let height = cells.iter().map(Cell::height).max().unwrap_or(1);
            for line in 0..height {
                let text: Vec<String> = cells
                    .iter()
                    .zip(&self.columns)
                    .map(|(cell, c)| cell.line(line, c.width - 1, c.field.alignment))
                    .collect();
                writeln!(out, "{}", text.join(" ").trim_end())?;
            }
        }
        Ok(())
    }

    fn write_header(&self, out: &mut dyn Write) -> io::Result<()> {
        let labels: Vec<String> = self
            .columns
            .iter()
            .map(|c| self.header_cell(&c.field.label, c))
            .collect();
        writeln!(out, "{}", labels.join(" ").trim_end())?;

        if self.config.verbose {
            let names: Vec<String> = self
                .columns
                .iter()
                .map(|c| self.header_cell(&c.field.name, c))
                .collect();
            writeln!(out, "{}", names.join(" ").trim_end())?;
        }

        let rules: Vec<String> = self.columns.iter().map(|c| "-".repeat(c.width - 1)).collect();
        writeln!(out, "{}", rules.join(" "))
    }

    fn header_cell(&self, text: &str, column: &Column) -> String {
        let truncate = self.config.truncate.unwrap_or(column.field.truncate);
        pad(&fit(text, column.width - 1, truncate), column.width - 1, column.field.alignment)
    }
}

/// Hand out one character at a time to the columns accepted by `accept`
fn distribute(columns: &mut [Column], mut remaining: usize, accept: impl Fn(&Column) -> bool) -> usize {
    while remaining > 0 {
        let mut progressed = false;
        for column in columns.iter_mut() {
            if remaining == 0 {
                break;
            }
            if accept(column) {
                column.width += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    remaining
}

fn longest_line(field: &Field, value: &crate::event::Value, text: &str) -> usize {
    if field.cell_height > 1 {
        return formatter::format_lines(field, value, false)
            .iter()
            .map(|l| char_count(l))
            .max()
            .unwrap_or(0);
    }
    char_count(text)
}
