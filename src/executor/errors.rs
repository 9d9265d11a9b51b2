//! Executor error types
//!
//! Error codes:
//! - BRIDGE_REMOTE_QUERY_FAILED (ERROR)
//! - BRIDGE_STREAM_READ_FAILED (ERROR)
//! - BRIDGE_ROW_SHAPE (ERROR)
//! - BRIDGE_CURSOR_CLOSED (FATAL)
//!
//! A stream read failure is never reported as exhaustion.

use std::fmt;

use crate::remote::RemoteError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed, the caller may issue a new query
    Error,
    /// Misuse of a cursor; the caller has a bug
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Executor error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Remote rejected the query or could not be reached
    RemoteQueryFailed,
    /// I/O failure while reading the result stream
    StreamReadFailed,
    /// Row layout does not provide a required column
    RowShape,
    /// Operation on a closed cursor
    CursorClosed,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::RemoteQueryFailed => "BRIDGE_REMOTE_QUERY_FAILED",
            ExecutorErrorCode::StreamReadFailed => "BRIDGE_STREAM_READ_FAILED",
            ExecutorErrorCode::RowShape => "BRIDGE_ROW_SHAPE",
            ExecutorErrorCode::CursorClosed => "BRIDGE_CURSOR_CLOSED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::CursorClosed => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error with context
#[derive(Debug, Clone)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
    source: Option<RemoteError>,
}

impl ExecutorError {
    /// Create a remote query error
    pub fn remote_query(collection: &str, source: RemoteError) -> Self {
        Self {
            code: ExecutorErrorCode::RemoteQueryFailed,
            message: format!("query on '{}' failed: {}", collection, source),
            source: Some(source),
        }
    }

    /// Create a stream read error
    pub fn stream_read(collection: &str, source: RemoteError) -> Self {
        Self {
            code: ExecutorErrorCode::StreamReadFailed,
            message: format!("reading results of '{}' failed: {}", collection, source),
            source: Some(source),
        }
    }

    /// Create a row shape error
    pub fn row_shape(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::RowShape,
            message: reason.into(),
            source: None,
        }
    }

    /// Create a cursor closed error
    pub fn cursor_closed(cursor_id: &str) -> Self {
        Self {
            code: ExecutorErrorCode::CursorClosed,
            message: format!("cursor {} is closed", cursor_id),
            source: None,
        }
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Underlying remote failure, if any
    pub fn remote(&self) -> Option<&RemoteError> {
        self.source.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.code.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
