//! docbridge - push-down query adapter for remote document stores
//!
//! Sits between a relational execution engine and a search-engine style
//! document store. Given a plan fragment it decides what the store can run
//! natively, translates that part into the store's query and metric
//! primitives, streams the results back as typed rows, and evaluates the
//! rest locally.

pub mod catalog;
pub mod config;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod remote;
pub mod table;

pub use table::{QueryError, QueryResult, QueryRows, TableHandle};
