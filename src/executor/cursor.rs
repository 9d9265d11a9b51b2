//! Streaming result cursor
//!
//! # Lifecycle
//!
//! ```text
//! open ──► Open ──advance──► Open (row) ──► Exhausted ──┐
//!            │                                           ├─close─► Closed
//!            └──────── read failure ──► Errored ─────────┘
//! ```
//!
//! - `advance` on an exhausted cursor keeps returning `false`
//! - `advance` on an errored cursor keeps failing with the same read error
//! - every operation on a closed cursor fails with `CursorClosed`
//! - `close` is idempotent; dropping an open cursor aborts the stream
//!   without draining it

use serde_json::Value;
use uuid::Uuid;

use crate::observability::{log_event_with_fields, AdapterMetrics, Event};
use crate::planner::{ReadColumn, RemoteQuerySpec};
use crate::remote::{RemoteError, RemoteStore, TupleStream};

use super::convert::convert_tuple;
use super::errors::{ExecutorError, ExecutorResult};
use super::row::OutputRow;

/// Cursor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Open,
    Exhausted,
    Errored,
    Closed,
}

impl CursorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorState::Open => "OPEN",
            CursorState::Exhausted => "EXHAUSTED",
            CursorState::Errored => "ERRORED",
            CursorState::Closed => "CLOSED",
        }
    }
}

/// Opens result cursors against a remote store
pub struct StreamingAdapter<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteStore + ?Sized> StreamingAdapter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Issues the query spec and returns a cursor positioned before the first row
    pub fn open(&self, spec: &RemoteQuerySpec) -> ExecutorResult<ResultCursor> {
        let metrics = AdapterMetrics::global();
        let stream = match self.store.open_stream(spec) {
            Ok(stream) => stream,
            Err(err) => {
                metrics.increment_cursors_rejected();
                log_event_with_fields(
                    Event::CursorRejected,
                    &[("collection", &spec.collection), ("reason", &err.to_string())],
                );
                return Err(ExecutorError::remote_query(&spec.collection, err));
            }
        };

        let cursor = ResultCursor::new(spec, stream);
        metrics.increment_cursors_opened();
        log_event_with_fields(
            Event::CursorOpened,
            &[
                ("collection", &spec.collection),
                ("cursor_id", &cursor.id_string()),
            ],
        );
        Ok(cursor)
    }
}

/// Forward-only, single-use cursor over a remote result stream
pub struct ResultCursor {
    id: Uuid,
    collection: String,
    stream: Option<Box<dyn TupleStream>>,
    columns: Vec<ReadColumn>,
    limit: Option<u64>,
    /// Row emitted when a global aggregation streams no tuple
    empty_defaults: Option<Vec<Value>>,
    delivered: u64,
    state: CursorState,
    current: Option<Vec<Value>>,
    failure: Option<RemoteError>,
    failure_reported: bool,
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("id", &self.id)
            .field("collection", &self.collection)
            .field("stream", &self.stream.as_ref().map(|_| "<stream>"))
            .field("columns", &self.columns)
            .field("limit", &self.limit)
            .field("empty_defaults", &self.empty_defaults)
            .field("delivered", &self.delivered)
            .field("state", &self.state)
            .field("current", &self.current)
            .field("failure", &self.failure)
            .field("failure_reported", &self.failure_reported)
            .finish()
    }
}

impl ResultCursor {
    fn new(spec: &RemoteQuerySpec, stream: Box<dyn TupleStream>) -> Self {
        let empty_defaults = spec
            .is_global_aggregation()
            .then(|| spec.metrics.iter().map(|m| m.empty_value()).collect());
        Self {
            id: Uuid::new_v4(),
            collection: spec.collection.clone(),
            stream: Some(stream),
            columns: spec.columns(),
            limit: spec.limit,
            empty_defaults,
            delivered: 0,
            state: CursorState::Open,
            current: None,
            failure: None,
            failure_reported: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn id_string(&self) -> String {
        self.id.to_string()
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Columns of each row, in order
    pub fn columns(&self) -> &[ReadColumn] {
        &self.columns
    }

    /// Moves to the next row.
    ///
    /// Returns `true` with the current row populated, `false` once the
    /// stream is cleanly exhausted.
    pub fn advance(&mut self) -> ExecutorResult<bool> {
        match self.state {
            CursorState::Closed => return Err(ExecutorError::cursor_closed(&self.id_string())),
            CursorState::Exhausted => return Ok(false),
            CursorState::Errored => {
                let err = self
                    .failure
                    .clone()
                    .unwrap_or_else(|| RemoteError::Protocol("stream failed".to_string()));
                return Err(ExecutorError::stream_read(&self.collection, err));
            }
            CursorState::Open => {}
        }

        if let Some(limit) = self.limit {
            if self.delivered >= limit {
                self.finish("limit");
                return Ok(false);
            }
        }

        let read = match self.stream.as_mut() {
            Some(stream) => stream.read(),
            None => Ok(None),
        };

        match read {
            Ok(Some(tuple)) => {
                self.current = Some(convert_tuple(&tuple, &self.columns));
                self.delivered += 1;
                AdapterMetrics::global().increment_rows_streamed();
                Ok(true)
            }
            Ok(None) => {
                if self.delivered == 0 {
                    if let Some(defaults) = self.empty_defaults.take() {
                        self.current = Some(defaults);
                        self.delivered += 1;
                        return Ok(true);
                    }
                }
                self.finish("end of stream");
                Ok(false)
            }
            Err(err) => {
                self.state = CursorState::Errored;
                self.current = None;
                self.failure = Some(err.clone());
                self.release();
                AdapterMetrics::global().increment_stream_errors();
                log_event_with_fields(
                    Event::CursorFailed,
                    &[
                        ("cursor_id", &self.id_string()),
                        ("error", &err.to_string()),
                    ],
                );
                Err(ExecutorError::stream_read(&self.collection, err))
            }
        }
    }

    fn finish(&mut self, reason: &str) {
        self.state = CursorState::Exhausted;
        self.current = None;
        self.release();
        log_event_with_fields(
            Event::CursorExhausted,
            &[
                ("cursor_id", &self.id_string()),
                ("reason", reason),
                ("rows", &self.delivered.to_string()),
            ],
        );
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }

    /// Values of the current row; `None` before the first `advance`, after
    /// exhaustion or failure. Fails with `CursorClosed` once closed.
    pub fn current(&self) -> ExecutorResult<Option<&[Value]>> {
        self.ensure_not_closed()?;
        Ok(self.current.as_deref())
    }

    /// Current row with single-column collapse applied
    pub fn current_row(&self) -> ExecutorResult<Option<OutputRow>> {
        self.ensure_not_closed()?;
        Ok(self.current.clone().map(OutputRow::from_values))
    }

    fn ensure_not_closed(&self) -> ExecutorResult<()> {
        if self.state == CursorState::Closed {
            return Err(ExecutorError::cursor_closed(&self.id_string()));
        }
        Ok(())
    }

    /// Advances and returns a copy of the new current row
    pub fn next_values(&mut self) -> ExecutorResult<Option<Vec<Value>>> {
        if self.advance()? {
            Ok(self.current.clone())
        } else {
            Ok(None)
        }
    }

    /// Releases the stream. Safe in any state, idempotent.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        if self.state == CursorState::Open {
            log_event_with_fields(Event::CursorAborted, &[("cursor_id", &self.id_string())]);
        }
        self.release();
        self.current = None;
        self.state = CursorState::Closed;
        log_event_with_fields(
            Event::CursorClosed,
            &[
                ("cursor_id", &self.id_string()),
                ("rows", &self.delivered.to_string()),
            ],
        );
    }
}

impl Iterator for ResultCursor {
    type Item = ExecutorResult<OutputRow>;

    /// Yields rows until exhaustion; a read failure is yielded once, then
    /// iteration ends
    fn next(&mut self) -> Option<Self::Item> {
        if self.state == CursorState::Errored && self.failure_reported {
            return None;
        }
        match self.advance() {
            Ok(true) => self.current_row().transpose(),
            Ok(false) => None,
            Err(err) => {
                self.failure_reported = true;
                Some(Err(err))
            }
        }
    }
}

impl Drop for ResultCursor {
    fn drop(&mut self) {
        self.close();
    }
}
