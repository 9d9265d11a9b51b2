//! Row sorting
//!
//! Sorts positional rows by one or more columns, deterministically.

use std::cmp::Ordering;

use serde_json::Value;

use crate::planner::SortDirection;

/// Sorts rows of values
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts rows by `(position, direction)` keys in priority order.
    ///
    /// Sort is stable; nulls sort first ascending and last descending.
    pub fn sort(rows: &mut [Vec<Value>], keys: &[(usize, SortDirection)]) {
        if keys.is_empty() {
            return;
        }
        rows.sort_by(|a, b| Self::compare_rows(a, b, keys));
    }

    fn compare_rows(a: &[Value], b: &[Value], keys: &[(usize, SortDirection)]) -> Ordering {
        for (pos, direction) in keys {
            let ordering = Self::compare_values(a.get(*pos), b.get(*pos));
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Total order over JSON values.
    ///
    /// Ordering rules:
    /// - absent = null < bool < number < string
    /// - For same types, natural ordering
    pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.unwrap_or(&Value::Null);
        let b = b.unwrap_or(&Value::Null);

        let type_order = |v: &Value| -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            }
        };

        let (a_type, b_type) = (type_order(a), type_order(b));
        if a_type != b_type {
            return a_type.cmp(&b_type);
        }

        match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                    return xi.cmp(&yi);
                }
                let xf = x.as_f64().unwrap_or(0.0);
                let yf = y.as_f64().unwrap_or(0.0);
                xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![json!("c"), json!(30)],
            vec![json!("a"), json!(20)],
            vec![json!("b"), json!(20)],
            vec![json!("d"), Value::Null],
        ]
    }

    fn first_column(rows: &[Vec<Value>]) -> Vec<&str> {
        rows.iter().map(|r| r[0].as_str().unwrap_or("")).collect()
    }

    #[test]
    fn test_sort_ascending_nulls_first() {
        let mut rows = rows();
        ResultSorter::sort(&mut rows, &[(1, SortDirection::Asc)]);
        assert_eq!(first_column(&rows), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_sort_descending_nulls_last() {
        let mut rows = rows();
        ResultSorter::sort(&mut rows, &[(1, SortDirection::Desc)]);
        assert_eq!(first_column(&rows), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_sort_multiple_keys() {
        let mut rows = rows();
        ResultSorter::sort(&mut rows, &[(1, SortDirection::Asc), (0, SortDirection::Desc)]);
        assert_eq!(first_column(&rows), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_sort_stable() {
        let mut rows = vec![
            vec![json!("x"), json!(1)],
            vec![json!("y"), json!(1)],
            vec![json!("z"), json!(1)],
        ];
        ResultSorter::sort(&mut rows, &[(1, SortDirection::Asc)]);
        assert_eq!(first_column(&rows), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_mixed_numbers() {
        assert_eq!(
            ResultSorter::compare_values(Some(&json!(2)), Some(&json!(2.5))),
            Ordering::Less
        );
        assert_eq!(ResultSorter::compare_values(None, Some(&Value::Null)), Ordering::Equal);
    }
}
