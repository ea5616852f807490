//! Query results

use crate::event::Value;
use crate::query::ast::SortOrder;
use crate::query::field::Field;

/// One result row: a value per field, and its rendered text once formatted
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    texts: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            texts: Vec::new(),
        }
    }

    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn set_value(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Rendered text of a value, empty before formatting
    pub fn text(&self, index: usize) -> &str {
        self.texts.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn set_texts(&mut self, texts: Vec<String>) {
        self.texts = texts;
    }
}

/// Fields and rows produced by one query
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Every field, including hidden groupers and sort keys
    pub fields: Vec<Field>,
    pub rows: Vec<Row>,
    /// Field indices with their requested direction
    pub order_by: Vec<(usize, SortOrder)>,
    /// Canonical text of the query
    pub query: String,
}

impl Table {
    pub fn new(fields: Vec<Field>, order_by: Vec<(usize, SortOrder)>) -> Self {
        Self {
            fields,
            order_by,
            ..Self::default()
        }
    }

    /// Fields that are rendered, in output order
    pub fn visible_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.visible)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
