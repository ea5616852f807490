//! Table cells
//!
//! A cell holds the lines of one value laid out for a column width. List,
//! set and stack trace values take one line per element up to the cell
//! height; elements that do not fit fall back to their compact text before
//! being truncated.

use crate::event::Value;
use crate::query::{Aggregator, Alignment, Field, Truncate};
use crate::render::formatter;

const ELLIPSIS: &str = "...";

/// The lines of one value, fitted to a width
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    lines: Vec<String>,
}

impl Cell {
    /// Lay out a value in `width` characters and at most `height` lines
    pub fn new(field: &Field, value: &Value, width: usize, height: usize, truncate: Truncate) -> Self {
        let height = height.max(1);
        if height == 1 || !is_multiline(value) {
            let text = formatter::format(field, value);
            let text = if char_count(&text) > width {
                formatter::format_compact(field, value)
            } else {
                text
            };
            return Self {
                lines: vec![fit(&text, width, truncate)],
            };
        }

        let mut elements = formatter::format_lines(field, value, false);
        let compact = formatter::format_lines(field, value, true);
        for (element, short) in elements.iter_mut().zip(compact) {
            if char_count(element) > width {
                *element = short;
            }
        }
        if field.aggregator == Aggregator::Set {
            elements.sort();
        }

        let mut lines: Vec<String> = Vec::new();
        let overflow = elements.len() > height;
        let shown = if overflow { height - 1 } else { elements.len() };
        for element in elements.into_iter().take(shown) {
            lines.push(fit(&element, width, truncate));
        }
        if overflow {
            lines.push(fit(ELLIPSIS, width, truncate));
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self { lines }
    }

    /// Number of lines
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    /// One line padded to `width`, blank past the last line
    pub fn line(&self, index: usize, width: usize, alignment: Alignment) -> String {
        let text = self.lines.get(index).map(String::as_str).unwrap_or("");
        pad(text, width, alignment)
    }
}

fn is_multiline(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(o) => o.is(crate::event::TYPE_STACK_TRACE),
        _ => false,
    }
}

pub(crate) fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Cut text to `width` characters, marking the cut with an ellipsis
pub fn fit(text: &str, width: usize, truncate: Truncate) -> String {
    let length = char_count(text);
    if length <= width {
        return text.to_string();
    }
    if width <= ELLIPSIS.len() {
        return ".".repeat(width);
    }
    let keep = width - ELLIPSIS.len();
    match truncate {
        Truncate::End => {
            let head: String = text.chars().take(keep).collect();
            format!("{}{}", head, ELLIPSIS)
        }
        Truncate::Beginning => {
            let tail: String = text.chars().skip(length - keep).collect();
            format!("{}{}", ELLIPSIS, tail)
        }
    }
}

/// Pad text to `width` characters
pub fn pad(text: &str, width: usize, alignment: Alignment) -> String {
    match alignment {
        Alignment::Left => format!("{:<width$}", text, width = width),
        Alignment::Right => format!("{:>width$}", text, width = width),
    }
}
