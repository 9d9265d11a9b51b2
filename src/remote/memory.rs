//! In-process reference store
//!
//! Executes a [`RemoteQuerySpec`] natively over JSON documents, the way the
//! remote search engine does:
//! - pushed terms match a list field when any element matches
//! - searches without a sort keep insertion order
//! - grouped aggregation yields one tuple per bucket; a global aggregation
//!   over no documents yields no tuple at all
//!
//! Failure injection covers rejected requests and mid-stream read errors.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::catalog::{MetadataService, RemoteFieldInfo};
use crate::executor::{Accumulator, PredicateFilter, ResultSorter};
use crate::planner::{AggFunction, MetricKind, RemoteMetric, RemoteQuerySpec, RemoteSort, SortDirection};

use super::errors::RemoteError;
use super::stream::{Tuple, TupleStream};
use super::RemoteStore;

struct MemoryCollection {
    fields: Vec<RemoteFieldInfo>,
    docs: Vec<Tuple>,
}

#[derive(Default)]
struct StoreStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Reference remote store holding collections in memory
#[derive(Default)]
pub struct MemoryStore {
    collections: HashMap<String, MemoryCollection>,
    open_failure: Option<RemoteError>,
    read_failure: Option<(usize, RemoteError)>,
    ignore_row_limit: bool,
    stats: Arc<StoreStats>,
    last_spec: Mutex<Option<RemoteQuerySpec>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection. Documents that are not JSON objects are skipped.
    pub fn with_collection(
        mut self,
        name: impl Into<String>,
        fields: Vec<RemoteFieldInfo>,
        docs: Vec<Value>,
    ) -> Self {
        let docs = docs
            .into_iter()
            .filter_map(|doc| match doc {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.collections
            .insert(name.into(), MemoryCollection { fields, docs });
        self
    }

    /// Every `open_stream` fails with `err`
    pub fn fail_on_open(mut self, err: RemoteError) -> Self {
        self.open_failure = Some(err);
        self
    }

    /// Streams fail with `err` once `reads` tuples were delivered
    pub fn fail_after_reads(mut self, reads: usize, err: RemoteError) -> Self {
        self.read_failure = Some((reads, err));
        self
    }

    /// Search requests return every match regardless of `rows`, like an
    /// export handler
    pub fn ignoring_row_limit(mut self) -> Self {
        self.ignore_row_limit = true;
        self
    }

    pub fn streams_opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    pub fn streams_closed(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    /// Spec of the most recent `open_stream` call
    pub fn last_spec(&self) -> Option<RemoteQuerySpec> {
        self.last_spec.lock().ok().and_then(|guard| guard.clone())
    }

    fn validate(collection: &MemoryCollection, spec: &RemoteQuerySpec) -> Result<(), RemoteError> {
        let known = |name: &str| collection.fields.iter().any(|f| f.name == name);
        let referenced = spec
            .selected_fields
            .iter()
            .chain(spec.buckets.iter())
            .map(|f| f.name.as_str())
            .chain(spec.metrics.iter().filter_map(|m| m.field.as_deref()))
            .chain(spec.filter.iter().flat_map(|f| f.terms().iter().map(|t| t.field.as_str())));
        for name in referenced {
            if !known(name) {
                return Err(RemoteError::Rejected(format!("undefined field {}", name)));
            }
        }
        Ok(())
    }

    fn execute(&self, collection: &MemoryCollection, spec: &RemoteQuerySpec) -> Vec<Tuple> {
        let matching: Vec<&Tuple> = collection
            .docs
            .iter()
            .filter(|doc| match &spec.filter {
                None => true,
                Some(filter) => filter
                    .terms()
                    .iter()
                    .all(|term| PredicateFilter::term_matches(doc.get(&term.field), term)),
            })
            .collect();

        if spec.is_aggregation() {
            let mut tuples = Self::aggregate(spec, &matching);
            tuples.sort_by(|a, b| compare_tuples(a, b, &spec.sort));
            if let Some(limit) = spec.limit {
                tuples.truncate(limit as usize);
            }
            return tuples;
        }

        let mut matching = matching;
        matching.sort_by(|a, b| compare_tuples(a, b, &spec.sort));
        let mut tuples: Vec<Tuple> = matching
            .into_iter()
            .map(|doc| {
                spec.selected_fields
                    .iter()
                    .filter_map(|f| doc.get(&f.name).map(|v| (f.name.clone(), v.clone())))
                    .collect()
            })
            .collect();
        if let (Some(limit), false) = (spec.limit, self.ignore_row_limit) {
            tuples.truncate(limit as usize);
        }
        tuples
    }

    fn aggregate(spec: &RemoteQuerySpec, docs: &[&Tuple]) -> Vec<Tuple> {
        let mut order: Vec<Vec<Value>> = Vec::new();
        let mut groups: HashMap<String, Vec<Accumulator>> = HashMap::new();

        for doc in docs {
            let key: Vec<Value> = spec
                .buckets
                .iter()
                .map(|b| doc.get(&b.name).cloned().unwrap_or(Value::Null))
                .collect();
            let id = Value::Array(key.clone()).to_string();
            let accumulators = groups.entry(id).or_insert_with(|| {
                order.push(key);
                spec.metrics.iter().map(accumulator_for).collect()
            });
            for (acc, metric) in accumulators.iter_mut().zip(&spec.metrics) {
                acc.update(metric.field.as_ref().and_then(|f| doc.get(f)));
            }
        }

        order
            .into_iter()
            .filter_map(|key| {
                let id = Value::Array(key.clone()).to_string();
                let accumulators = groups.get(&id)?;
                let mut tuple = Tuple::new();
                for (bucket, value) in spec.buckets.iter().zip(key) {
                    tuple.insert(bucket.name.clone(), value);
                }
                for (metric, acc) in spec.metrics.iter().zip(accumulators) {
                    tuple.insert(metric.identifier(), acc.finish());
                }
                Some(tuple)
            })
            .collect()
    }
}

fn accumulator_for(metric: &RemoteMetric) -> Accumulator {
    let (function, distinct) = match metric.kind {
        MetricKind::RowCount | MetricKind::NonNullCount => (AggFunction::Count, false),
        MetricKind::CountDistinct => (AggFunction::Count, true),
        MetricKind::Sum => (AggFunction::Sum, false),
        MetricKind::Min => (AggFunction::Min, false),
        MetricKind::Max => (AggFunction::Max, false),
        MetricKind::Mean => (AggFunction::Avg, false),
    };
    Accumulator::new(
        function,
        distinct,
        metric.kind == MetricKind::RowCount,
        metric.value_type,
    )
}

fn compare_tuples(a: &Tuple, b: &Tuple, sort: &[RemoteSort]) -> std::cmp::Ordering {
    for key in sort {
        let ordering = ResultSorter::compare_values(a.get(&key.key), b.get(&key.key));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering.is_ne() {
            return ordering;
        }
    }
    std::cmp::Ordering::Equal
}

impl RemoteStore for MemoryStore {
    fn open_stream(&self, spec: &RemoteQuerySpec) -> Result<Box<dyn TupleStream>, RemoteError> {
        if let Ok(mut guard) = self.last_spec.lock() {
            *guard = Some(spec.clone());
        }
        if let Some(err) = &self.open_failure {
            return Err(err.clone());
        }
        let collection = self
            .collections
            .get(&spec.collection)
            .ok_or_else(|| RemoteError::CollectionNotFound(spec.collection.clone()))?;
        Self::validate(collection, spec)?;

        let tuples = self.execute(collection, spec);
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryStream {
            tuples: tuples.into(),
            delivered: 0,
            read_failure: self.read_failure.clone(),
            stats: Arc::clone(&self.stats),
            closed: false,
        }))
    }
}

impl MetadataService for MemoryStore {
    fn field_metadata(&self, collection: &str) -> Result<Vec<RemoteFieldInfo>, RemoteError> {
        self.collections
            .get(collection)
            .map(|c| c.fields.clone())
            .ok_or_else(|| RemoteError::CollectionNotFound(collection.to_string()))
    }
}

struct MemoryStream {
    tuples: VecDeque<Tuple>,
    delivered: usize,
    read_failure: Option<(usize, RemoteError)>,
    stats: Arc<StoreStats>,
    closed: bool,
}

impl TupleStream for MemoryStream {
    fn read(&mut self) -> Result<Option<Tuple>, RemoteError> {
        if self.closed {
            return Err(RemoteError::Transport("stream is closed".to_string()));
        }
        if let Some((after, err)) = &self.read_failure {
            if self.delivered >= *after {
                return Err(err.clone());
            }
        }
        let next = self.tuples.pop_front();
        if next.is_some() {
            self.delivered += 1;
        }
        Ok(next)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.tuples.clear();
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldCatalogEntry, LogicalType};
    use crate::planner::{CompareOp, FilterTerm, RemoteFilter};
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new().with_collection(
            "test",
            vec![
                RemoteFieldInfo::new("fielda", Some("string")),
                RemoteFieldInfo::new("tags", Some("string")).with_multi_valued(true),
                RemoteFieldInfo::new("n", Some("plong")),
            ],
            vec![
                json!({"fielda": "a1", "tags": ["t1", "t2"], "n": 3}),
                json!({"fielda": "a2", "tags": ["t2"], "n": 1}),
                json!({"fielda": "a1", "n": 2}),
                json!({"n": 5}),
            ],
        )
    }

    fn drain(stream: &mut Box<dyn TupleStream>) -> Vec<Tuple> {
        let mut out = Vec::new();
        while let Some(t) = stream.read().unwrap() {
            out.push(t);
        }
        out
    }

    fn term(field: &str, value: Value) -> RemoteFilter {
        RemoteFilter::new(vec![FilterTerm {
            field: field.into(),
            op: CompareOp::Eq,
            value,
        }])
    }

    #[test]
    fn test_search_keeps_insertion_order() {
        let store = store();
        let mut spec = RemoteQuerySpec::search("test", vec![FieldCatalogEntry::string("fielda")]);
        spec.filter = Some(term("fielda", json!("a1")));
        let mut stream = store.open_stream(&spec).unwrap();
        let tuples = drain(&mut stream);
        assert_eq!(tuples.len(), 2);
        assert!(tuples.iter().all(|t| t["fielda"] == "a1"));
        assert_eq!(store.last_spec(), Some(spec));
    }

    #[test]
    fn test_multi_valued_any_match() {
        let store = store();
        let mut spec = RemoteQuerySpec::search("test", vec![FieldCatalogEntry::string("fielda")]);
        spec.filter = Some(term("tags", json!("t2")));
        let mut stream = store.open_stream(&spec).unwrap();
        assert_eq!(drain(&mut stream).len(), 2);
    }

    #[test]
    fn test_grouped_metrics() {
        let store = store();
        let bucket = FieldCatalogEntry::string("fielda");
        let mut spec = RemoteQuerySpec::search("test", vec![bucket.clone()]);
        spec.buckets = vec![bucket];
        spec.metrics = vec![
            RemoteMetric {
                kind: MetricKind::RowCount,
                field: None,
                value_type: LogicalType::Integer,
            },
            RemoteMetric {
                kind: MetricKind::Sum,
                field: Some("n".into()),
                value_type: LogicalType::Integer,
            },
        ];
        spec.sort = vec![RemoteSort {
            key: "count(*)".into(),
            direction: SortDirection::Desc,
        }];
        let mut stream = store.open_stream(&spec).unwrap();
        let tuples = drain(&mut stream);
        assert_eq!(tuples.len(), 3);
        assert_eq!(tuples[0]["fielda"], "a1");
        assert_eq!(tuples[0]["count(*)"], 2);
        assert_eq!(tuples[0]["sum(n)"], 5);
    }

    #[test]
    fn test_global_aggregation_over_nothing_is_empty() {
        let store = store();
        let mut spec = RemoteQuerySpec::search("test", vec![]);
        spec.filter = Some(term("fielda", json!("zz")));
        spec.metrics = vec![RemoteMetric {
            kind: MetricKind::RowCount,
            field: None,
            value_type: LogicalType::Integer,
        }];
        let mut stream = store.open_stream(&spec).unwrap();
        assert!(drain(&mut stream).is_empty());
    }

    #[test]
    fn test_row_limit_handling() {
        let mut spec = RemoteQuerySpec::search("test", vec![FieldCatalogEntry::integer("n")]);
        spec.limit = Some(1);

        let mut stream = store().open_stream(&spec).unwrap();
        assert_eq!(drain(&mut stream).len(), 1);

        let mut stream = store().ignoring_row_limit().open_stream(&spec).unwrap();
        assert_eq!(drain(&mut stream).len(), 4);
    }

    #[test]
    fn test_unknown_collection_and_field() {
        let store = store();
        let spec = RemoteQuerySpec::search("nope", vec![]);
        assert!(matches!(store.open_stream(&spec), Err(RemoteError::CollectionNotFound(_))));

        let spec = RemoteQuerySpec::search("test", vec![FieldCatalogEntry::string("zzz")]);
        assert!(matches!(store.open_stream(&spec), Err(RemoteError::Rejected(_))));
        assert_eq!(store.streams_opened(), 0);
    }

    #[test]
    fn test_failure_injection_and_close_accounting() {
        let store = store().fail_after_reads(1, RemoteError::Transport("reset".into()));
        let spec = RemoteQuerySpec::search("test", vec![FieldCatalogEntry::string("fielda")]);
        let mut stream = store.open_stream(&spec).unwrap();
        assert!(stream.read().unwrap().is_some());
        assert!(stream.read().is_err());
        assert!(stream.read().is_err());
        stream.close();
        stream.close();
        drop(stream);
        assert_eq!(store.streams_opened(), 1);
        assert_eq!(store.streams_closed(), 1);

        let failing = MemoryStore::new().fail_on_open(RemoteError::Rejected("bad".into()));
        assert!(failing.open_stream(&spec).is_err());
    }

    #[test]
    fn test_metadata() {
        let store = store();
        assert_eq!(store.field_metadata("test").unwrap().len(), 3);
        assert!(store.field_metadata("nope").is_err());
    }
}
