//! Single-record form rendering

use crate::config::RenderConfig;
use crate::query::{Alignment, Table};
use crate::render::cell::{char_count, pad, Cell};
use std::io::{self, Write};

/// Value width when no total width is configured
const DEFAULT_VALUE_WIDTH: usize = 100;

/// Write the first row of a table as `Label: value` lines
pub fn render(table: &Table, config: &RenderConfig, out: &mut dyn Write) -> io::Result<()> {
    if config.verbose {
        writeln!(out, "{}", table.query)?;
        writeln!(out)?;
    }
    let Some(row) = table.rows.first() else {
        writeln!(out, "No events found.")?;
        return Ok(());
    };

    let labels: Vec<String> = table
        .visible_fields()
        .map(|f| {
            if config.verbose {
                format!("{} ({})", f.label, f.name)
            } else {
                f.label.clone()
            }
        })
        .collect();
    let label_width = labels.iter().map(|l| char_count(l)).max().unwrap_or(0);
    let value_width = config
        .width
        .map(|w| w.saturating_sub(label_width + 2).max(1))
        .unwrap_or(DEFAULT_VALUE_WIDTH);

    for (field, label) in table.visible_fields().zip(&labels) {
        let cell = Cell::new(
            field,
            row.value(field.index),
            value_width,
            config.cell_height.unwrap_or(field.cell_height),
            config.truncate.unwrap_or(field.truncate),
        );
        for line in 0..cell.height() {
            let text = cell.line(line, value_width, Alignment::Left);
            let prefix = if line == 0 {
                format!("{}:", pad(label, label_width, Alignment::Right))
            } else {
                " ".repeat(label_width + 1)
            };
            writeln!(out, "{} {}", prefix, text.trim_end())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Value;
    use crate::query::{Field, Row};

    fn table() -> Table {
        let fields = ["Name", "Heap Used", "Threads"]
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let mut field = Field::constant(label.to_lowercase().replace(' ', ""), Value::Null);
                field.label = label.to_string();
                field.index = index;
                field.visible = true;
                field
            })
            .collect();
        let mut table = Table::new(fields, Vec::new());
        table.rows.push(Row::new(vec![
            Value::from("G1"),
            Value::Long(12),
            Value::Array(vec!["main".into(), "worker".into()]),
        ]));
        table
    }

    fn render_text(table: &Table, config: &RenderConfig) -> String {
        let mut out = Vec::new();
        render(table, config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_form_lines() {
        let mut table = table();
        table.fields[2].cell_height = 2;
        let output = render_text(&table, &RenderConfig::default());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "     Name: G1",
                "Heap Used: 12",
                "  Threads: main",
                "           worker",
            ]
        );
    }

    #[test]
    fn test_form_verbose_and_empty() {
        let config = RenderConfig {
            verbose: true,
            ..RenderConfig::default()
        };
        let output = render_text(&table(), &config);
        assert!(output.contains("Heap Used (heapused): 12"));
        assert!(output.contains("Threads (threads): main, worker"));

        let mut empty = table();
        empty.rows.clear();
        assert_eq!(render_text(&empty, &RenderConfig::default()), "No events found.\n");
    }
}
