//! Executor: streaming results and local evaluation
//!
//! # Execution Flow
//!
//! 1. Open a cursor for the remote spec
//! 2. Pull tuples lazily and convert them to typed rows
//! 3. Apply residual operations, if any, over the materialized rows
//! 4. Shape rows into the caller's column order
//!
//! # Invariants
//!
//! - A read failure is an error, never end of stream
//! - A cursor is closed exactly once and never reused
//! - Multi-valued values are reduced to their first element

mod aggregate;
mod convert;
mod cursor;
mod errors;
mod filters;
mod residual;
mod row;
mod shaping;
mod sorter;

pub use aggregate::Accumulator;
pub use convert::{convert_tuple, convert_value};
pub use cursor::{CursorState, ResultCursor, StreamingAdapter};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use filters::PredicateFilter;
pub use residual::ResidualExecutor;
pub use row::OutputRow;
pub use shaping::{shape, RowShaper};
pub use sorter::ResultSorter;
