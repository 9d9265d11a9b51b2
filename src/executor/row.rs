//! Output rows

use serde::Serialize;
use serde_json::Value;

/// A row handed to the caller.
///
/// A one-column row shape yields the bare value; callers see `Scalar`
/// instead of a one-element list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputRow {
    Scalar(Value),
    Columns(Vec<Value>),
}

impl OutputRow {
    /// Wraps row values, collapsing a single column
    pub fn from_values(mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            if let Some(value) = values.pop() {
                return OutputRow::Scalar(value);
            }
        }
        OutputRow::Columns(values)
    }

    /// Row values in column order
    pub fn into_values(self) -> Vec<Value> {
        match self {
            OutputRow::Scalar(value) => vec![value],
            OutputRow::Columns(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OutputRow::Scalar(_) => 1,
            OutputRow::Columns(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            OutputRow::Scalar(value) if index == 0 => Some(value),
            OutputRow::Scalar(_) => None,
            OutputRow::Columns(values) => values.get(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_column_collapses() {
        let row = OutputRow::from_values(vec![json!("a1")]);
        assert_eq!(row, OutputRow::Scalar(json!("a1")));
        assert_eq!(row.get(0), Some(&json!("a1")));
        assert_eq!(row.into_values(), vec![json!("a1")]);
    }

    #[test]
    fn test_multi_column() {
        let row = OutputRow::from_values(vec![json!("a1"), json!(1)]);
        assert_eq!(row.len(), 2);
        assert_eq!(serde_json::to_value(&row).unwrap(), json!(["a1", 1]));
    }

    #[test]
    fn test_scalar_serializes_bare() {
        let row = OutputRow::from_values(vec![json!(5)]);
        assert_eq!(serde_json::to_value(&row).unwrap(), json!(5));
    }
}
