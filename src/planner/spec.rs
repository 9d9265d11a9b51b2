//! Remote query specification
//!
//! The wire contract between the planner and the remote store. Built fresh
//! per execution and never mutated after it is issued.

use crate::catalog::{FieldCatalogEntry, LogicalType};
use crate::config::AdapterConfig;
use crate::remote::RemoteRequest;

use super::ast::SortDirection;
use super::metric::RemoteMetric;
use super::predicate::RemoteFilter;

/// Remote sort key: a field name, or a metric identifier for aggregations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSort {
    pub key: String,
    pub direction: SortDirection,
}

impl RemoteSort {
    pub fn render(&self) -> String {
        format!("{} {}", self.key, self.direction.as_str())
    }
}

/// One column of the tuples the remote returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadColumn {
    /// Tuple key
    pub key: String,
    pub logical_type: LogicalType,
    pub multi_valued: bool,
}

/// Query executed natively by the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteQuerySpec {
    pub collection: String,
    /// Fields returned per tuple. Equal to `buckets` for aggregations.
    pub selected_fields: Vec<FieldCatalogEntry>,
    pub filter: Option<RemoteFilter>,
    /// Grouping fields
    pub buckets: Vec<FieldCatalogEntry>,
    pub metrics: Vec<RemoteMetric>,
    pub sort: Vec<RemoteSort>,
    pub limit: Option<u64>,
}

impl RemoteQuerySpec {
    /// Plain search over a collection
    pub fn search(collection: impl Into<String>, selected_fields: Vec<FieldCatalogEntry>) -> Self {
        Self {
            collection: collection.into(),
            selected_fields,
            filter: None,
            buckets: Vec::new(),
            metrics: Vec::new(),
            sort: Vec::new(),
            limit: None,
        }
    }

    /// True when the remote groups or computes metrics
    pub fn is_aggregation(&self) -> bool {
        !self.buckets.is_empty() || !self.metrics.is_empty()
    }

    /// Aggregation over all rows, without buckets
    pub fn is_global_aggregation(&self) -> bool {
        self.buckets.is_empty() && !self.metrics.is_empty()
    }

    /// Columns the cursor reads from each tuple, in row order
    pub fn columns(&self) -> Vec<ReadColumn> {
        let fields = if self.is_aggregation() {
            &self.buckets
        } else {
            &self.selected_fields
        };
        let mut columns: Vec<ReadColumn> = fields
            .iter()
            .map(|f| ReadColumn {
                key: f.name.clone(),
                logical_type: f.logical_type,
                multi_valued: f.multi_valued,
            })
            .collect();
        columns.extend(self.metrics.iter().map(|m| ReadColumn {
            key: m.identifier(),
            logical_type: m.value_type,
            multi_valued: false,
        }));
        columns
    }

    fn query_string(&self, config: &AdapterConfig) -> String {
        self.filter
            .as_ref()
            .map(RemoteFilter::to_query_string)
            .unwrap_or_else(|| config.match_all_query.clone())
    }

    /// Renders the request in the remote store's syntax.
    ///
    /// Searches go to the export handler with `q`, `fl`, `sort` and `rows`.
    /// Aggregations become a `facet` (with buckets) or `stats` (global)
    /// streaming expression on the stream handler.
    pub fn to_request(&self, config: &AdapterConfig) -> RemoteRequest {
        let q = self.query_string(config);

        if !self.is_aggregation() {
            let fl = if self.selected_fields.is_empty() {
                "_version_".to_string()
            } else {
                join_names(&self.selected_fields)
            };
            let sort = if self.sort.is_empty() {
                config.default_sort.clone()
            } else {
                self.render_sort()
            };
            let mut request = RemoteRequest::new(&config.export_handler)
                .with_param("q", q)
                .with_param("fl", fl)
                .with_param("sort", sort);
            if let Some(limit) = self.limit {
                request = request.with_param("rows", limit.to_string());
            }
            return request;
        }

        let mut metrics: Vec<String> = self.metrics.iter().map(RemoteMetric::identifier).collect();
        let mut args = vec![self.collection.clone(), format!("q={}", quote_expr(&q))];

        if self.buckets.is_empty() {
            args.append(&mut metrics);
            let expr = format!("stats({})", args.join(", "));
            return RemoteRequest::new(&config.stream_handler).with_param("expr", expr);
        }

        if metrics.is_empty() {
            metrics.push("count(*)".to_string());
        }
        let bucket_sorts = if self.sort.is_empty() {
            format!("{} desc", metrics[0])
        } else {
            self.render_sort().replace(", ", ",")
        };
        args.push(format!("buckets={}", quote_expr(&join_names(&self.buckets))));
        args.push(format!("bucketSorts={}", quote_expr(&bucket_sorts)));
        args.push(format!("bucketSizeLimit={}", config.bucket_size_limit));
        if let Some(limit) = self.limit {
            args.push(format!("rows={}", limit));
        }
        args.append(&mut metrics);
        let expr = format!("facet({})", args.join(", "));
        RemoteRequest::new(&config.stream_handler).with_param("expr", expr)
    }

    fn render_sort(&self) -> String {
        let keys: Vec<String> = self.sort.iter().map(RemoteSort::render).collect();
        keys.join(", ")
    }
}

fn join_names(fields: &[FieldCatalogEntry]) -> String {
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    names.join(",")
}

fn quote_expr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ast::CompareOp;
    use crate::planner::metric::MetricKind;
    use crate::planner::predicate::FilterTerm;
    use serde_json::json;

    fn count_rows() -> RemoteMetric {
        RemoteMetric {
            kind: MetricKind::RowCount,
            field: None,
            value_type: LogicalType::Integer,
        }
    }

    #[test]
    fn test_search_request_defaults() {
        let spec = RemoteQuerySpec::search("test", vec![FieldCatalogEntry::string("fielda")]);
        let request = spec.to_request(&AdapterConfig::default());
        assert_eq!(request.handler, "/export");
        assert_eq!(request.param("q"), Some("*:*"));
        assert_eq!(request.param("fl"), Some("fielda"));
        assert_eq!(request.param("sort"), Some("_version_ desc"));
        assert_eq!(request.param("rows"), None);
    }

    #[test]
    fn test_search_request_with_filter_sort_limit() {
        let mut spec = RemoteQuerySpec::search(
            "test",
            vec![FieldCatalogEntry::string("fielda"), FieldCatalogEntry::integer("fieldc")],
        );
        spec.filter = Some(RemoteFilter::new(vec![FilterTerm {
            field: "fielda".into(),
            op: CompareOp::Eq,
            value: json!("a1"),
        }]));
        spec.sort = vec![RemoteSort {
            key: "fieldc".into(),
            direction: SortDirection::Desc,
        }];
        spec.limit = Some(2);

        let request = spec.to_request(&AdapterConfig::default());
        assert_eq!(request.param("q"), Some("fielda:\"a1\""));
        assert_eq!(request.param("fl"), Some("fielda,fieldc"));
        assert_eq!(request.param("sort"), Some("fieldc desc"));
        assert_eq!(request.param("rows"), Some("2"));
    }

    #[test]
    fn test_global_aggregation_is_stats() {
        let mut spec = RemoteQuerySpec::search("test", vec![]);
        spec.metrics = vec![count_rows()];
        assert!(spec.is_global_aggregation());

        let request = spec.to_request(&AdapterConfig::default());
        assert_eq!(request.handler, "/stream");
        assert_eq!(request.param("expr"), Some("stats(test, q=\"*:*\", count(*))"));
    }

    #[test]
    fn test_grouped_aggregation_is_facet() {
        let bucket = FieldCatalogEntry::string("fielda");
        let mut spec = RemoteQuerySpec::search("test", vec![bucket.clone()]);
        spec.buckets = vec![bucket];
        spec.metrics = vec![count_rows()];
        spec.sort = vec![RemoteSort {
            key: "count(*)".into(),
            direction: SortDirection::Desc,
        }];
        spec.limit = Some(2);

        let request = spec.to_request(&AdapterConfig::default());
        assert_eq!(
            request.param("expr"),
            Some(
                "facet(test, q=\"*:*\", buckets=\"fielda\", bucketSorts=\"count(*) desc\", \
                 bucketSizeLimit=10000, rows=2, count(*))"
            )
        );
        let columns: Vec<String> = spec.columns().into_iter().map(|c| c.key).collect();
        assert_eq!(columns, vec!["fielda", "count(*)"]);
    }

    #[test]
    fn test_filter_quoted_inside_expression() {
        let mut spec = RemoteQuerySpec::search("test", vec![]);
        spec.metrics = vec![count_rows()];
        spec.filter = Some(RemoteFilter::new(vec![FilterTerm {
            field: "fielda".into(),
            op: CompareOp::Eq,
            value: json!("a1"),
        }]));
        let request = spec.to_request(&AdapterConfig::default());
        assert_eq!(
            request.param("expr"),
            Some("stats(test, q=\"fielda:\\\"a1\\\"\", count(*))")
        );
    }
}
