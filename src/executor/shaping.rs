//! Result row shaping
//!
//! Reorders and renames row columns into the caller's expected shape. Pure
//! and stateless.

use serde_json::Value;

use crate::planner::{OutputColumn, RowLayout};

use super::errors::{ExecutorError, ExecutorResult};
use super::row::OutputRow;

/// Picks `projected` positions out of a raw row.
///
/// An identity projection returns the row unchanged.
pub fn shape(raw: Vec<Value>, projected: &[usize]) -> OutputRow {
    if is_identity(projected, raw.len()) {
        return OutputRow::from_values(raw);
    }
    let values = projected
        .iter()
        .map(|pos| raw.get(*pos).cloned().unwrap_or(Value::Null))
        .collect();
    OutputRow::from_values(values)
}

fn is_identity(projected: &[usize], width: usize) -> bool {
    projected.len() == width && projected.iter().enumerate().all(|(i, p)| i == *p)
}

/// Shapes rows of one layout into named output columns
#[derive(Debug, Clone)]
pub struct RowShaper {
    positions: Vec<usize>,
    names: Vec<String>,
}

impl RowShaper {
    /// Resolves every output column against the layout
    pub fn new(layout: &RowLayout, output: &[OutputColumn]) -> ExecutorResult<Self> {
        let mut positions = Vec::with_capacity(output.len());
        let mut names = Vec::with_capacity(output.len());
        for column in output {
            let pos = layout.position(column.column).ok_or_else(|| {
                ExecutorError::row_shape(format!(
                    "output column '{}' is missing from the row layout",
                    column.name
                ))
            })?;
            positions.push(pos);
            names.push(column.name.clone());
        }
        Ok(Self { positions, names })
    }

    /// Output column names, aliases applied
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn shape(&self, raw: Vec<Value>) -> OutputRow {
        shape(raw, &self.positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ColumnRef;
    use serde_json::json;

    #[test]
    fn test_identity_round_trip() {
        let raw = vec![json!("a1"), json!("b1"), json!(1)];
        let shaped = shape(raw.clone(), &[0, 1, 2]);
        assert_eq!(shaped.into_values(), raw);
    }

    #[test]
    fn test_reorder_and_collapse() {
        let raw = vec![json!("a1"), json!("b1"), json!(1)];
        assert_eq!(
            shape(raw.clone(), &[2, 0]),
            OutputRow::Columns(vec![json!(1), json!("a1")])
        );
        assert_eq!(shape(raw, &[1]), OutputRow::Scalar(json!("b1")));
    }

    #[test]
    fn test_shaper_applies_aliases() {
        let layout = RowLayout::new(vec![ColumnRef::Field(0), ColumnRef::Aggregate(0)]);
        let output = vec![
            OutputColumn {
                column: ColumnRef::Aggregate(0),
                name: "EXPR$1".into(),
            },
            OutputColumn {
                column: ColumnRef::Field(0),
                name: "fielda".into(),
            },
        ];
        let shaper = RowShaper::new(&layout, &output).unwrap();
        assert_eq!(shaper.column_names(), &["EXPR$1".to_string(), "fielda".to_string()]);
        assert_eq!(
            shaper.shape(vec![json!("a1"), json!(3)]),
            OutputRow::Columns(vec![json!(3), json!("a1")])
        );
    }

    #[test]
    fn test_shaper_rejects_missing_column() {
        let layout = RowLayout::new(vec![ColumnRef::Field(0)]);
        let output = vec![OutputColumn {
            column: ColumnRef::Field(1),
            name: "fieldb".into(),
        }];
        assert!(RowShaper::new(&layout, &output).is_err());
    }
}
