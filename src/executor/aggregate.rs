//! Aggregate accumulation
//!
//! One accumulator per aggregate call and group. Nulls are ignored by every
//! function except the row count. SUM over no values is zero; MIN, MAX and
//! AVG over no values are null.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::catalog::{FieldCatalogEntry, LogicalType};
use crate::planner::{AggFunction, AggregateSpec};

use super::sorter::ResultSorter;

/// Running state of one aggregate call
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggFunction,
    distinct: bool,
    counts_rows: bool,
    arg_type: LogicalType,
    count: u64,
    int_sum: Option<i64>,
    float_sum: f64,
    extreme: Option<Value>,
    seen: HashSet<String>,
}

impl Accumulator {
    /// Accumulator for `function`. `counts_rows` selects `COUNT(*)`.
    pub fn new(function: AggFunction, distinct: bool, counts_rows: bool, arg_type: LogicalType) -> Self {
        Self {
            function,
            distinct,
            counts_rows,
            arg_type,
            count: 0,
            int_sum: Some(0),
            float_sum: 0.0,
            extreme: None,
            seen: HashSet::new(),
        }
    }

    /// Accumulator for an aggregate call over the given source fields
    pub fn for_aggregate(spec: &AggregateSpec, fields: &[FieldCatalogEntry]) -> Self {
        let arg_type = spec
            .arg
            .and_then(|idx| fields.get(idx))
            .map(|f| f.logical_type)
            .unwrap_or(LogicalType::Any);
        Self::new(spec.function, spec.distinct, spec.arg.is_none(), arg_type)
    }

    /// Feeds one row; `value` is the argument value, ignored by `COUNT(*)`
    pub fn update(&mut self, value: Option<&Value>) {
        if self.counts_rows {
            self.count += 1;
            return;
        }
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return;
        };
        if self.distinct && !self.seen.insert(value.to_string()) {
            return;
        }

        match self.function {
            AggFunction::Count => self.count += 1,
            AggFunction::Sum | AggFunction::Avg => {
                let Value::Number(n) = value else {
                    return;
                };
                self.count += 1;
                self.float_sum += n.as_f64().unwrap_or(0.0);
                self.int_sum = match (self.int_sum, n.as_i64()) {
                    (Some(acc), Some(v)) => acc.checked_add(v),
                    _ => None,
                };
            }
            AggFunction::Min | AggFunction::Max => {
                let replace = match &self.extreme {
                    None => true,
                    Some(current) => {
                        let ordering = ResultSorter::compare_values(Some(value), Some(current));
                        if self.function == AggFunction::Min {
                            ordering.is_lt()
                        } else {
                            ordering.is_gt()
                        }
                    }
                };
                if replace {
                    self.extreme = Some(value.clone());
                }
            }
        }
    }

    /// Final value
    pub fn finish(&self) -> Value {
        match self.function {
            AggFunction::Count => json!(self.count),
            AggFunction::Sum => match self.int_sum {
                Some(sum) if self.count > 0 => json!(sum),
                _ if self.count > 0 => json!(self.float_sum),
                _ if self.arg_type == LogicalType::Integer => json!(0),
                _ => json!(0.0),
            },
            AggFunction::Avg if self.count == 0 => Value::Null,
            AggFunction::Avg => json!(self.float_sum / self.count as f64),
            AggFunction::Min | AggFunction::Max => self.extreme.clone().unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(function: AggFunction, distinct: bool, counts_rows: bool, values: &[Value]) -> Value {
        let mut acc = Accumulator::new(function, distinct, counts_rows, LogicalType::Integer);
        for v in values {
            acc.update(Some(v));
        }
        acc.finish()
    }

    #[test]
    fn test_count_rows_vs_non_null() {
        let values = vec![json!("a"), Value::Null, json!("b")];
        assert_eq!(run(AggFunction::Count, false, true, &values), json!(3));
        assert_eq!(run(AggFunction::Count, false, false, &values), json!(2));
    }

    #[test]
    fn test_sum_empty_is_zero() {
        assert_eq!(run(AggFunction::Sum, false, false, &[]), json!(0));
        assert_eq!(run(AggFunction::Sum, false, false, &[Value::Null]), json!(0));
        let mut acc = Accumulator::new(AggFunction::Sum, false, false, LogicalType::Float);
        acc.update(None);
        assert_eq!(acc.finish(), json!(0.0));
    }

    #[test]
    fn test_sum_integer_and_float() {
        assert_eq!(run(AggFunction::Sum, false, false, &[json!(1), json!(2)]), json!(3));
        assert_eq!(run(AggFunction::Sum, false, false, &[json!(1), json!(2.5)]), json!(3.5));
    }

    #[test]
    fn test_min_max_avg() {
        let values = vec![json!(3), json!(1), Value::Null, json!(2)];
        assert_eq!(run(AggFunction::Min, false, false, &values), json!(1));
        assert_eq!(run(AggFunction::Max, false, false, &values), json!(3));
        assert_eq!(run(AggFunction::Avg, false, false, &values), json!(2.0));
        assert_eq!(run(AggFunction::Avg, false, false, &[]), Value::Null);
        assert_eq!(run(AggFunction::Min, false, false, &[]), Value::Null);
    }

    #[test]
    fn test_distinct() {
        let values = vec![json!("a1"), json!("a1"), json!("a2"), Value::Null];
        assert_eq!(run(AggFunction::Count, true, false, &values), json!(2));
        let numbers = vec![json!(2), json!(2), json!(3)];
        assert_eq!(run(AggFunction::Sum, true, false, &numbers), json!(5));
        assert_eq!(run(AggFunction::Avg, true, false, &numbers), json!(2.5));
    }
}
