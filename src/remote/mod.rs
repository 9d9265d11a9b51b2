//! Remote document store interface
//!
//! The adapter talks to the store through [`RemoteStore`], which accepts a
//! [`RemoteQuerySpec`] and answers with a [`TupleStream`]. Connection and
//! session management live behind the trait.
//!
//! [`MemoryStore`] executes specs in-process and backs the test suites.

mod errors;
mod memory;
mod request;
mod stream;

pub use errors::RemoteError;
pub use memory::MemoryStore;
pub use request::RemoteRequest;
pub use stream::{JsonTupleStream, Tuple, TupleStream};

use crate::planner::RemoteQuerySpec;

/// Executes query specs against the remote store
pub trait RemoteStore: Send + Sync {
    /// Issues the query and returns its result stream.
    ///
    /// Fails when the store rejects the query spec or cannot be reached.
    fn open_stream(&self, spec: &RemoteQuerySpec) -> Result<Box<dyn TupleStream>, RemoteError>;
}
