//! Cursor Lifecycle Tests
//!
//! Streams are opened once, closed exactly once, and read failures are
//! surfaced as errors rather than end of stream.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docbridge::catalog::{FieldCatalogEntry, RemoteFieldInfo};
use docbridge::executor::{CursorState, ExecutorErrorCode, OutputRow, StreamingAdapter};
use docbridge::planner::RemoteQuerySpec;
use docbridge::remote::{
    JsonTupleStream, MemoryStore, RemoteError, RemoteStore, Tuple, TupleStream,
};
use serde_json::json;

// =============================================================================
// Helper Types
// =============================================================================

/// Serves a fixed line-delimited JSON body and counts closes
struct WireStore {
    body: String,
    closes: Arc<AtomicUsize>,
}

struct CountingStream {
    inner: JsonTupleStream<Cursor<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
}

impl TupleStream for CountingStream {
    fn read(&mut self) -> Result<Option<Tuple>, RemoteError> {
        self.inner.read()
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

impl RemoteStore for WireStore {
    fn open_stream(&self, _spec: &RemoteQuerySpec) -> Result<Box<dyn TupleStream>, RemoteError> {
        Ok(Box::new(CountingStream {
            inner: JsonTupleStream::new(Cursor::new(self.body.clone().into_bytes())),
            closes: self.closes.clone(),
        }))
    }
}

fn wire(body: &str) -> WireStore {
    WireStore {
        body: body.to_string(),
        closes: Arc::new(AtomicUsize::new(0)),
    }
}

fn search_spec() -> RemoteQuerySpec {
    RemoteQuerySpec::search(
        "test",
        vec![FieldCatalogEntry::string("fielda"), FieldCatalogEntry::integer("fieldc")],
    )
}

// =============================================================================
// Wire Stream
// =============================================================================

/// Tuples are converted to the declared logical types.
#[test]
fn test_wire_stream_converts_rows() {
    let store = wire("{\"fielda\":\"a1\",\"fieldc\":\"7\"}\n{\"fielda\":[\"a2\",\"a3\"]}\n{\"EOF\":true}\n");
    let rows: Vec<OutputRow> = StreamingAdapter::new(&store)
        .open(&search_spec())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        rows,
        vec![
            OutputRow::Columns(vec![json!("a1"), json!(7)]),
            OutputRow::Columns(vec![json!("a2"), serde_json::Value::Null]),
        ]
    );
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}

/// A stream cut off before its EOF marker is a failure, not a short result.
#[test]
fn test_truncated_stream_is_error() {
    let store = wire("{\"fielda\":\"a1\",\"fieldc\":1}\n");
    let mut cursor = StreamingAdapter::new(&store).open(&search_spec()).unwrap();

    assert!(cursor.advance().unwrap());
    let err = cursor.advance().unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::StreamReadFailed);
    assert!(matches!(err.remote(), Some(RemoteError::Protocol(_))));
    assert_eq!(cursor.state(), CursorState::Errored);

    // Sticky
    let again = cursor.advance().unwrap_err();
    assert_eq!(again.code(), ExecutorErrorCode::StreamReadFailed);
}

#[test]
fn test_exception_tuple_is_error() {
    let store = wire("{\"EXCEPTION\":\"undefined field fieldz\",\"EOF\":true}\n");
    let mut cursor = StreamingAdapter::new(&store).open(&search_spec()).unwrap();

    let err = cursor.advance().unwrap_err();
    assert!(matches!(err.remote(), Some(RemoteError::Rejected(_))));
}

// =============================================================================
// Close and Drop
// =============================================================================

/// Closing twice releases the stream once.
#[test]
fn test_close_is_idempotent() {
    let store = wire("{\"fielda\":\"a1\",\"fieldc\":1}\n{\"EOF\":true}\n");
    let mut cursor = StreamingAdapter::new(&store).open(&search_spec()).unwrap();

    cursor.close();
    cursor.close();
    assert_eq!(cursor.state(), CursorState::Closed);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);

    let err = cursor.advance().unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::CursorClosed);
    assert!(err.is_fatal());
    assert_eq!(
        cursor.current().unwrap_err().code(),
        ExecutorErrorCode::CursorClosed
    );
    drop(cursor);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}

/// Dropping an open cursor aborts the stream without draining it.
#[test]
fn test_drop_aborts_open_stream() {
    let store = MemoryStore::new().with_collection(
        "test",
        vec![
            RemoteFieldInfo::new("fielda", Some("string")),
            RemoteFieldInfo::new("fieldc", Some("plong")),
        ],
        (0..100).map(|i| json!({"fielda": format!("a{}", i), "fieldc": i})).collect(),
    );
    {
        let mut cursor = StreamingAdapter::new(&store).open(&search_spec()).unwrap();
        assert!(cursor.advance().unwrap());
    }
    assert_eq!(store.streams_opened(), 1);
    assert_eq!(store.streams_closed(), 1);
}

/// A failed open never leaves a stream behind.
#[test]
fn test_rejected_open() {
    let store = MemoryStore::new().fail_on_open(RemoteError::CollectionNotFound("test".into()));
    let err = StreamingAdapter::new(&store).open(&search_spec()).unwrap_err();

    assert_eq!(err.code(), ExecutorErrorCode::RemoteQueryFailed);
    assert_eq!(store.streams_opened(), 0);
}

// =============================================================================
// Limits
// =============================================================================

/// The cursor stops at the pushed limit even if the store sends more.
#[test]
fn test_limit_enforced_client_side() {
    let store = wire("{\"fielda\":\"a1\"}\n{\"fielda\":\"a2\"}\n{\"fielda\":\"a3\"}\n{\"EOF\":true}\n");
    let mut spec = search_spec();
    spec.limit = Some(2);

    let mut cursor = StreamingAdapter::new(&store).open(&spec).unwrap();
    assert!(cursor.advance().unwrap());
    assert!(cursor.advance().unwrap());
    assert!(!cursor.advance().unwrap());
    assert_eq!(cursor.state(), CursorState::Exhausted);
    assert!(!cursor.advance().unwrap());
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}
