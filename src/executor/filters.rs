//! Predicate evaluation
//!
//! Two evaluators share one comparison rule:
//! - `evaluate` applies a relational predicate to a converted row with
//!   three-valued logic: any comparison involving null is unknown, and only
//!   rows evaluating to true pass.
//! - `term_matches` applies a pushed filter term to a raw document value the
//!   way the remote store does: a list matches when any element matches,
//!   and a missing or null value never matches.
//!
//! No type coercion: a string never equals a number.

use std::cmp::Ordering;

use serde_json::Value;

use crate::planner::{FilterTerm, Operand, Predicate};

/// Evaluates predicates against rows and documents
pub struct PredicateFilter;

impl PredicateFilter {
    /// True when the predicate is true for the row
    pub fn matches<'v, F>(predicate: &Predicate, lookup: &F) -> bool
    where
        F: Fn(usize) -> Option<&'v Value>,
    {
        Self::evaluate(predicate, lookup) == Some(true)
    }

    /// Three-valued evaluation; `None` is unknown
    pub fn evaluate<'v, F>(predicate: &Predicate, lookup: &F) -> Option<bool>
    where
        F: Fn(usize) -> Option<&'v Value>,
    {
        match predicate {
            Predicate::Compare { op, left, right } => {
                let l = Self::operand(left, lookup)?;
                let r = Self::operand(right, lookup)?;
                match Self::compare_scalars(l, r) {
                    Some(ordering) => Some(op.holds(ordering)),
                    None => Some(false),
                }
            }
            Predicate::And(terms) => {
                let mut unknown = false;
                for term in terms {
                    match Self::evaluate(term, lookup) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Predicate::Or(terms) => {
                let mut unknown = false;
                for term in terms {
                    match Self::evaluate(term, lookup) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::Not(inner) => Self::evaluate(inner, lookup).map(|b| !b),
            Predicate::IsNull(operand) => {
                Some(Self::operand(operand, lookup).is_none())
            }
        }
    }

    /// Operand value, `None` when null or absent
    fn operand<'a, 'v: 'a, F>(operand: &'a Operand, lookup: &F) -> Option<&'a Value>
    where
        F: Fn(usize) -> Option<&'v Value>,
    {
        let value = match operand {
            Operand::Field(idx) => lookup(*idx)?,
            Operand::Literal(v) => v,
        };
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    /// Remote-store matching of one pushed term against a document value
    pub fn term_matches(value: Option<&Value>, term: &FilterTerm) -> bool {
        match value {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => items.iter().any(|item| Self::scalar_matches(item, term)),
            Some(v) => Self::scalar_matches(v, term),
        }
    }

    fn scalar_matches(value: &Value, term: &FilterTerm) -> bool {
        if value.is_null() {
            return false;
        }
        match Self::compare_scalars(value, &term.value) {
            Some(ordering) => term.op.holds(ordering),
            None => false,
        }
    }

    /// Orders two scalars of the same kind; `None` for mismatched kinds
    pub fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                    return Some(xi.cmp(&yi));
                }
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CompareOp;
    use serde_json::json;

    fn row_matches(predicate: &Predicate, row: &[Value]) -> bool {
        PredicateFilter::matches(predicate, &|idx| row.get(idx))
    }

    #[test]
    fn test_equality_no_coercion() {
        let row = vec![json!(123)];
        assert!(row_matches(&Predicate::eq(0, json!(123)), &row));
        assert!(!row_matches(&Predicate::eq(0, json!("123")), &row));
    }

    #[test]
    fn test_ranges() {
        let row = vec![json!(25)];
        assert!(row_matches(&Predicate::gte(0, json!(18)), &row));
        assert!(row_matches(&Predicate::lte(0, json!(25)), &row));
        assert!(!row_matches(&Predicate::gt(0, json!(25)), &row));
        assert!(!row_matches(&Predicate::lt(0, json!(25.0)), &row));
    }

    #[test]
    fn test_null_comparisons_unknown() {
        let row = vec![Value::Null, json!("x")];
        assert!(!row_matches(&Predicate::eq(0, json!("x")), &row));
        assert!(!row_matches(&Predicate::not_eq(0, json!("x")), &row));
        assert!(!row_matches(&Predicate::negate(Predicate::eq(0, json!("x"))), &row));
        assert!(row_matches(&Predicate::is_null(0), &row));
        assert!(!row_matches(&Predicate::is_null(1), &row));
    }

    #[test]
    fn test_three_valued_connectives() {
        let row = vec![Value::Null, json!("x")];
        let unknown = Predicate::eq(0, json!("a"));
        let truth = Predicate::eq(1, json!("x"));
        let falsity = Predicate::eq(1, json!("y"));

        assert!(row_matches(&Predicate::or(vec![unknown.clone(), truth.clone()]), &row));
        assert!(!row_matches(&Predicate::and(vec![unknown.clone(), truth]), &row));
        assert_eq!(
            PredicateFilter::evaluate(&Predicate::and(vec![unknown.clone(), falsity.clone()]), &|i| row.get(i)),
            Some(false)
        );
        assert_eq!(
            PredicateFilter::evaluate(&Predicate::or(vec![unknown, falsity]), &|i| row.get(i)),
            None
        );
    }

    #[test]
    fn test_field_to_field() {
        let row = vec![json!("a1"), json!("a1"), json!("b1")];
        assert!(row_matches(&Predicate::fields(0, CompareOp::Eq, 1), &row));
        assert!(!row_matches(&Predicate::fields(0, CompareOp::Eq, 2), &row));
    }

    #[test]
    fn test_term_matches_any_element() {
        let term = FilterTerm {
            field: "tags".into(),
            op: CompareOp::Eq,
            value: json!("b2"),
        };
        assert!(PredicateFilter::term_matches(Some(&json!(["b1", "b2"])), &term));
        assert!(!PredicateFilter::term_matches(Some(&json!(["b1"])), &term));
        assert!(!PredicateFilter::term_matches(None, &term));
        assert!(!PredicateFilter::term_matches(Some(&Value::Null), &term));
    }

    #[test]
    fn test_not_equal_term_excludes_missing() {
        let term = FilterTerm {
            field: "fielda".into(),
            op: CompareOp::NotEq,
            value: json!("a1"),
        };
        assert!(PredicateFilter::term_matches(Some(&json!("a2")), &term));
        assert!(!PredicateFilter::term_matches(Some(&json!("a1")), &term));
        assert!(!PredicateFilter::term_matches(None, &term));
    }
}
