//! Local evaluation of residual operations
//!
//! Applies what the remote could not execute, in pipeline order: filter,
//! aggregation, sort, limit. Input rows are already converted, so a
//! multi-valued field contributes its first element here.

use std::collections::HashMap;

use serde_json::Value;

use crate::catalog::FieldCatalogEntry;
use crate::planner::{ColumnRef, ResidualAggregation, ResidualOps, RowLayout};

use super::aggregate::Accumulator;
use super::errors::{ExecutorError, ExecutorResult};
use super::filters::PredicateFilter;
use super::sorter::ResultSorter;

/// Evaluates residual operations over materialized rows
pub struct ResidualExecutor<'a> {
    fields: &'a [FieldCatalogEntry],
}

impl<'a> ResidualExecutor<'a> {
    pub fn new(fields: &'a [FieldCatalogEntry]) -> Self {
        Self { fields }
    }

    /// Returns the resulting rows and their layout
    pub fn apply(
        &self,
        mut rows: Vec<Vec<Value>>,
        layout: &RowLayout,
        residual: &ResidualOps,
    ) -> ExecutorResult<(Vec<Vec<Value>>, RowLayout)> {
        let mut layout = layout.clone();

        if let Some(predicate) = &residual.filter {
            let positions: Vec<Option<usize>> = (0..self.fields.len())
                .map(|idx| layout.position(ColumnRef::Field(idx)))
                .collect();
            rows.retain(|row| {
                let lookup = |idx: usize| positions.get(idx).copied().flatten().and_then(|p| row.get(p));
                PredicateFilter::matches(predicate, &lookup)
            });
        }

        if let Some(aggregation) = &residual.aggregation {
            rows = self.aggregate(rows, &layout, aggregation)?;
            layout = aggregation.layout();
        }

        if !residual.sort.is_empty() {
            let keys = residual
                .sort
                .iter()
                .map(|key| {
                    layout
                        .position(key.column)
                        .map(|pos| (pos, key.direction))
                        .ok_or_else(|| ExecutorError::row_shape("sort column is missing from the row layout"))
                })
                .collect::<ExecutorResult<Vec<_>>>()?;
            ResultSorter::sort(&mut rows, &keys);
        }

        if let Some(limit) = residual.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok((rows, layout))
    }

    fn aggregate(
        &self,
        rows: Vec<Vec<Value>>,
        layout: &RowLayout,
        aggregation: &ResidualAggregation,
    ) -> ExecutorResult<Vec<Vec<Value>>> {
        let locate = |idx: usize| {
            layout
                .position(ColumnRef::Field(idx))
                .ok_or_else(|| ExecutorError::row_shape(format!("field {} is missing from the row layout", idx)))
        };
        let key_positions = aggregation
            .group_keys
            .iter()
            .map(|g| locate(*g))
            .collect::<ExecutorResult<Vec<_>>>()?;
        let arg_positions = aggregation
            .aggregates
            .iter()
            .map(|a| a.arg.map(locate).transpose())
            .collect::<ExecutorResult<Vec<_>>>()?;

        let fresh = || -> Vec<Accumulator> {
            aggregation
                .aggregates
                .iter()
                .map(|a| Accumulator::for_aggregate(a, self.fields))
                .collect()
        };

        let mut order: Vec<(String, Vec<Value>)> = Vec::new();
        let mut groups: HashMap<String, Vec<Accumulator>> = HashMap::new();

        // A global aggregation yields one row even over no input
        if key_positions.is_empty() {
            order.push((String::new(), Vec::new()));
            groups.insert(String::new(), fresh());
        }

        for row in &rows {
            let key: Vec<Value> = key_positions
                .iter()
                .map(|p| row.get(*p).cloned().unwrap_or(Value::Null))
                .collect();
            let id = if key.is_empty() {
                String::new()
            } else {
                Value::Array(key.clone()).to_string()
            };
            let accumulators = groups.entry(id.clone()).or_insert_with(|| {
                order.push((id, key));
                fresh()
            });
            for (acc, pos) in accumulators.iter_mut().zip(&arg_positions) {
                acc.update(pos.and_then(|p| row.get(p)));
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|(id, mut key)| {
                let accumulators = groups.get(&id)?;
                key.extend(accumulators.iter().map(Accumulator::finish));
                Some(key)
            })
            .collect())
    }
}
