//! Tuple streams
//!
//! The remote store answers a query with a stream of JSON tuples terminated
//! by an end marker:
//!
//! ```text
//! {"fielda":"a1","fieldb":"b1"}
//! {"fielda":"a2","fieldb":"b2"}
//! {"EOF":true}
//! ```
//!
//! A stream that ends without the marker was cut off and is an error, not
//! an empty tail. A tuple carrying `EXCEPTION` reports a remote failure.

use std::io::BufRead;

use serde_json::{Map, Value};

use super::errors::RemoteError;

/// One result tuple keyed by field name or metric identifier
pub type Tuple = Map<String, Value>;

/// Forward-only stream of tuples
pub trait TupleStream: Send {
    /// Next tuple, or `None` once the end marker was read
    fn read(&mut self) -> Result<Option<Tuple>, RemoteError>;

    /// Releases the underlying connection. Idempotent.
    fn close(&mut self);
}

/// Tuple stream decoded from line-delimited JSON
pub struct JsonTupleStream<R> {
    reader: Option<R>,
    line: String,
    finished: bool,
}

impl<R: BufRead + Send> JsonTupleStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            line: String::new(),
            finished: false,
        }
    }

    fn decode(line: &str) -> Result<Option<Tuple>, RemoteError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| RemoteError::Protocol(format!("invalid tuple: {}", e)))?;
        let Value::Object(tuple) = value else {
            return Err(RemoteError::Protocol("tuple is not a JSON object".to_string()));
        };
        if let Some(exception) = tuple.get("EXCEPTION") {
            let message = exception
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| exception.to_string());
            return Err(RemoteError::Rejected(message));
        }
        if tuple.get("EOF").and_then(Value::as_bool) == Some(true) {
            return Ok(None);
        }
        Ok(Some(tuple))
    }
}

impl<R: BufRead + Send> TupleStream for JsonTupleStream<R> {
    fn read(&mut self) -> Result<Option<Tuple>, RemoteError> {
        if self.finished {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(RemoteError::Transport("stream is closed".to_string()));
        };

        loop {
            self.line.clear();
            let read = reader.read_line(&mut self.line)?;
            if read == 0 {
                return Err(RemoteError::Protocol(
                    "stream ended without EOF marker".to_string(),
                ));
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let decoded = Self::decode(trimmed)?;
            if decoded.is_none() {
                self.finished = true;
            }
            return Ok(decoded);
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
