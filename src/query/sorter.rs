//! Row ordering
//!
//! Rows are sorted by the ORDER BY keys, applied from the last key to the
//! first with a stable sort so the first key dominates. Without ORDER BY the
//! table is sorted on one default key: the first aggregated field, else the
//! first grouping field, else the leftmost visible field.

use crate::event::Value;
use crate::query::ast::SortOrder;
use crate::query::field::Field;
use crate::query::table::{Row, Table};
use std::cmp::Ordering;

/// Sort the rows of a table in place
pub fn sort(table: &mut Table) {
    let keys = if table.order_by.is_empty() {
        default_key(&table.fields).into_iter().collect()
    } else {
        table.order_by.clone()
    };

    for (index, order) in keys.iter().rev() {
        let Some(field) = table.fields.get(*index) else {
            continue;
        };
        let descending = match order {
            SortOrder::Ascending => false,
            SortOrder::Descending => true,
            SortOrder::None => field.descending_by_default(),
        };
        table.rows.sort_by(|a, b| {
            let ordering = compare(field, a, b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn default_key(fields: &[Field]) -> Option<(usize, SortOrder)> {
    let field = fields
        .iter()
        .find(|f| f.is_aggregated())
        .or_else(|| fields.iter().find(|f| f.grouper && f.visible))
        .or_else(|| fields.iter().find(|f| f.visible))?;
    Some((field.index, SortOrder::None))
}

fn compare(field: &Field, a: &Row, b: &Row) -> Ordering {
    if field.lexical_sort {
        return a.text(field.index).cmp(b.text(field.index));
    }
    total_order(a.value(field.index), b.value(field.index))
}

/// Values of different kinds order by kind, nulls first
fn total_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        _ => a
            .compare(b)
            .unwrap_or_else(|| rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string()))),
    }
}

/// Kind order for values that don't compare, keeping the comparator total
fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Long(_) | Value::Double(_) => 2,
        Value::Duration(_) => 3,
        Value::Instant(_) => 4,
        Value::Char(_) | Value::String(_) => 5,
        Value::Object(_) => 6,
        Value::Array(_) => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::Aggregator;
    use crate::query::field::TimeKind;
    use chrono::TimeDelta;

    fn field(index: usize, name: &str) -> Field {
        let mut field = Field::constant(name, Value::Null);
        field.index = index;
        field.visible = true;
        field
    }

    fn table(fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Table {
        let mut table = Table::new(fields, Vec::new());
        table.rows = rows.into_iter().map(Row::new).collect();
        table
    }

    fn column(table: &Table, index: usize) -> Vec<Value> {
        table.rows.iter().map(|r| r.value(index).clone()).collect()
    }

    #[test]
    fn test_explicit_keys() {
        let mut t = table(
            vec![field(0, "a"), field(1, "b")],
            vec![
                vec![Value::Long(1), Value::Long(1)],
                vec![Value::Long(2), Value::Long(2)],
                vec![Value::Long(1), Value::Long(3)],
            ],
        );
        t.order_by = vec![(0, SortOrder::Ascending), (1, SortOrder::Descending)];
        sort(&mut t);
        assert_eq!(column(&t, 1), vec![Value::Long(3), Value::Long(1), Value::Long(2)]);
    }

    #[test]
    fn test_default_key_prefers_aggregate() {
        let mut total = field(1, "total");
        total.aggregator = Aggregator::Sum;
        total.time = TimeKind::Span;
        let mut t = table(
            vec![field(0, "name"), total],
            vec![
                vec![Value::from("a"), Value::Duration(TimeDelta::seconds(1))],
                vec![Value::from("b"), Value::Duration(TimeDelta::seconds(5))],
                vec![Value::from("c"), Value::Null],
            ],
        );
        sort(&mut t);
        assert_eq!(column(&t, 0), vec![Value::from("b"), Value::from("a"), Value::from("c")]);
    }

    #[test]
    fn test_default_key_leftmost_visible() {
        let mut hidden = field(0, "hidden");
        hidden.visible = false;
        let mut t = table(
            vec![hidden, field(1, "name")],
            vec![
                vec![Value::Long(1), Value::from("b")],
                vec![Value::Long(2), Value::from("a")],
            ],
        );
        sort(&mut t);
        assert_eq!(column(&t, 1), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_lexical_sort_uses_text() {
        let mut name = field(0, "thread");
        name.lexical_sort = true;
        let mut t = table(vec![name], vec![vec![Value::Null], vec![Value::Null]]);
        t.rows[0].set_texts(vec!["worker".to_string()]);
        t.rows[1].set_texts(vec!["main".to_string()]);
        sort(&mut t);
        assert_eq!(t.rows[0].text(0), "main");
    }
}
