//! Push-down planner
//!
//! Decides how much of a plan fragment the remote store executes natively
//! and translates that portion into remote query and metric primitives.
//!
//! # Rules
//!
//! - A filter is pushed whole or not at all
//! - A residual stage blocks push-down of every later stage
//! - Aggregation is never partially pushed
//! - Sort and limit are pushed together or kept together
//! - Multi-valued fields are never filtered, grouped, aggregated or sorted
//!   remotely

mod ast;
mod errors;
mod explain;
mod metric;
mod predicate;
mod pushdown;
mod spec;

pub use ast::{
    AggFunction, AggregateSpec, ColumnRef, CompareOp, Operand, PlanFragment, Predicate,
    ProjectedColumn, SortDirection, SortKey,
};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use explain::ExplainPlan;
pub use metric::{MetricKind, MetricTranslator, RemoteMetric};
pub use predicate::{escape_field, render_literal, FilterTerm, PredicateTranslator, RemoteFilter, Translation};
pub use pushdown::{
    OutputColumn, PushdownPlan, PushdownPlanner, ResidualAggregation, ResidualOps, RowLayout,
};
pub use spec::{ReadColumn, RemoteQuerySpec, RemoteSort};
