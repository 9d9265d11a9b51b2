//! Table handle over one remote collection
//!
//! Fetches the field catalog once and runs plan fragments through planning,
//! streaming, residual evaluation and row shaping.

use std::sync::Arc;
use std::vec;

use serde_json::Value;
use thiserror::Error;

use crate::catalog::{CatalogResult, FieldCatalog, MetadataService, SchemaInspector};
use crate::config::AdapterConfig;
use crate::executor::{
    ExecutorError, ExecutorResult, OutputRow, ResidualExecutor, ResultCursor, RowShaper,
    StreamingAdapter,
};
use crate::planner::{ExplainPlan, PlanFragment, PlannerError, PlannerResult, PushdownPlan, PushdownPlanner};
use crate::remote::{RemoteRequest, RemoteStore};

/// Query failures
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Result type for table queries
pub type QueryResult<T> = Result<T, QueryError>;

/// Handle on one remote collection
pub struct TableHandle {
    catalog: Arc<FieldCatalog>,
    store: Arc<dyn RemoteStore>,
    config: AdapterConfig,
}

impl TableHandle {
    /// Fetches the collection's catalog and binds it to `store`
    pub fn open<M: MetadataService + ?Sized>(
        metadata: &M,
        store: Arc<dyn RemoteStore>,
        collection: &str,
        config: AdapterConfig,
    ) -> CatalogResult<Self> {
        let catalog = SchemaInspector::new(metadata).fetch_catalog(collection)?;
        Ok(Self {
            catalog: Arc::new(catalog),
            store,
            config,
        })
    }

    pub fn catalog(&self) -> &Arc<FieldCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Bare scan over every field, the starting point for fragments
    pub fn fragment(&self) -> PlanFragment {
        PlanFragment::scan(self.catalog.entries().to_vec())
    }

    pub fn plan(&self, fragment: &PlanFragment) -> PlannerResult<PushdownPlan> {
        PushdownPlanner::new(self.catalog.collection(), &self.config.capabilities).plan(fragment)
    }

    pub fn explain(&self, fragment: &PlanFragment) -> ExplainPlan {
        match self.plan(fragment) {
            Ok(plan) => ExplainPlan::from_plan(&plan),
            Err(err) => ExplainPlan::from_error(&err),
        }
    }

    /// Remote request a fragment would issue
    pub fn request(&self, fragment: &PlanFragment) -> PlannerResult<RemoteRequest> {
        Ok(self.plan(fragment)?.remote.to_request(&self.config))
    }

    /// Plans and executes a fragment.
    ///
    /// Rows stream lazily when nothing is residual; otherwise the remote
    /// result is materialized and the residual operations applied first.
    pub fn query(&self, fragment: &PlanFragment) -> QueryResult<QueryRows> {
        let plan = self.plan(fragment)?;
        let mut cursor = StreamingAdapter::new(self.store.as_ref()).open(&plan.remote)?;

        if plan.is_fully_pushed() {
            let shaper = RowShaper::new(&plan.layout, &plan.output)?;
            return Ok(QueryRows {
                shaper,
                source: RowSource::Streaming(cursor),
            });
        }

        let mut rows = Vec::new();
        while let Some(values) = cursor.next_values()? {
            rows.push(values);
        }
        cursor.close();

        let (rows, layout) = ResidualExecutor::new(&plan.source_fields).apply(rows, &plan.layout, &plan.residual)?;
        let shaper = RowShaper::new(&layout, &plan.output)?;
        Ok(QueryRows {
            shaper,
            source: RowSource::Materialized(rows.into_iter()),
        })
    }

    /// `select *`
    pub fn scan(&self) -> QueryResult<QueryRows> {
        self.query(&self.fragment())
    }
}

enum RowSource {
    Streaming(ResultCursor),
    Materialized(vec::IntoIter<Vec<Value>>),
}

/// Rows of an executed fragment
pub struct QueryRows {
    shaper: RowShaper,
    source: RowSource,
}

impl QueryRows {
    /// Output column names, aliases applied
    pub fn column_names(&self) -> &[String] {
        self.shaper.column_names()
    }

    /// True when rows are pulled from the remote on demand
    pub fn is_streaming(&self) -> bool {
        matches!(self.source, RowSource::Streaming(_))
    }

    /// Stops streaming and releases the remote stream
    pub fn close(&mut self) {
        if let RowSource::Streaming(cursor) = &mut self.source {
            cursor.close();
        }
    }
}

impl Iterator for QueryRows {
    type Item = ExecutorResult<OutputRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            RowSource::Streaming(cursor) => match cursor.next()? {
                Ok(row) => Some(Ok(self.shaper.shape(row.into_values()))),
                Err(err) => Some(Err(err)),
            },
            RowSource::Materialized(rows) => rows.next().map(|row| Ok(self.shaper.shape(row))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RemoteFieldInfo;
    use crate::planner::{ColumnRef, CompareOp, Predicate};
    use crate::remote::MemoryStore;
    use serde_json::json;

    fn table() -> (Arc<MemoryStore>, TableHandle) {
        let store = Arc::new(
            MemoryStore::new().with_collection(
                "test",
                vec![
                    RemoteFieldInfo::new("fielda", Some("string")),
                    RemoteFieldInfo::new("fieldb", Some("string")),
                ],
                vec![
                    json!({"fielda": "a1", "fieldb": "a1"}),
                    json!({"fielda": "a2", "fieldb": "b2"}),
                ],
            ),
        );
        let handle = TableHandle::open(
            store.as_ref(),
            store.clone(),
            "test",
            AdapterConfig::default(),
        )
        .unwrap();
        (store, handle)
    }

    #[test]
    fn test_open_missing_collection() {
        let store = Arc::new(MemoryStore::new());
        let result = TableHandle::open(store.as_ref(), store.clone(), "nope", AdapterConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_streams() {
        let (_, table) = table();
        let rows = table.scan().unwrap();
        assert!(rows.is_streaming());
        assert_eq!(rows.column_names(), &["fielda".to_string(), "fieldb".to_string()]);
        let rows: Vec<OutputRow> = rows.collect::<ExecutorResult<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_residual_query_materializes() {
        let (store, table) = table();
        let fragment = table
            .fragment()
            .with_filter(Predicate::fields(0, CompareOp::Eq, 1))
            .project(ColumnRef::Field(0));
        let rows = table.query(&fragment).unwrap();
        assert!(!rows.is_streaming());
        let rows: Vec<OutputRow> = rows.collect::<ExecutorResult<Vec<_>>>().unwrap();
        assert_eq!(rows, vec![OutputRow::Scalar(json!("a1"))]);
        assert_eq!(store.streams_closed(), 1);
    }

    #[test]
    fn test_request_and_explain() {
        let (_, table) = table();
        let fragment = table.fragment().with_filter(Predicate::eq(0, json!("a1")));
        let request = table.request(&fragment).unwrap();
        assert_eq!(request.param("q"), Some("fielda:\"a1\""));
        assert!(table.explain(&fragment).accepted);

        let bad = table.fragment().project(ColumnRef::Field(7));
        assert!(!table.explain(&bad).accepted);
        assert!(matches!(table.query(&bad), Err(QueryError::Planner(_))));
    }
}
