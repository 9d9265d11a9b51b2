//! Push-down planning
//!
//! Splits a plan fragment into the part the remote store executes natively
//! and the residual operations evaluated locally. Pipeline order is filter,
//! aggregation, sort/limit. A residual stage blocks push-down of every stage
//! after it: rows that still need local filtering cannot be aggregated,
//! sorted or limited remotely.

use std::collections::BTreeSet;

use crate::catalog::FieldCatalogEntry;
use crate::config::RemoteCapabilities;
use crate::observability::{log_event_with_fields, AdapterMetrics, Event};

use super::ast::{AggregateSpec, ColumnRef, PlanFragment, Predicate, SortKey};
use super::errors::{PlannerError, PlannerResult};
use super::metric::{MetricTranslator, RemoteMetric};
use super::predicate::{PredicateTranslator, Translation};
use super::spec::{RemoteQuerySpec, RemoteSort};

/// Column order of a row at some point of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowLayout {
    columns: Vec<ColumnRef>,
}

impl RowLayout {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Row position of a logical column
    pub fn position(&self, column: ColumnRef) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }
}

/// Aggregation evaluated locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualAggregation {
    pub group_keys: Vec<usize>,
    pub aggregates: Vec<AggregateSpec>,
}

impl ResidualAggregation {
    /// Layout of aggregated rows: group keys, then aggregates
    pub fn layout(&self) -> RowLayout {
        let mut columns: Vec<ColumnRef> = self.group_keys.iter().map(|g| ColumnRef::Field(*g)).collect();
        columns.extend((0..self.aggregates.len()).map(ColumnRef::Aggregate));
        RowLayout::new(columns)
    }
}

/// Operations left for local evaluation, in pipeline order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResidualOps {
    pub filter: Option<Predicate>,
    pub aggregation: Option<ResidualAggregation>,
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
}

impl ResidualOps {
    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
            && self.aggregation.is_none()
            && self.sort.is_empty()
            && self.limit.is_none()
    }
}

/// Named output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub column: ColumnRef,
    pub name: String,
}

/// Result of push-down planning
#[derive(Debug, Clone, PartialEq)]
pub struct PushdownPlan {
    /// Query executed by the remote store
    pub remote: RemoteQuerySpec,
    /// Operations evaluated locally
    pub residual: ResidualOps,
    /// Layout of rows read from the remote
    pub layout: RowLayout,
    /// Columns returned to the caller
    pub output: Vec<OutputColumn>,
    /// Source fields of the fragment
    pub source_fields: Vec<FieldCatalogEntry>,
}

impl PushdownPlan {
    /// True when nothing is evaluated locally
    pub fn is_fully_pushed(&self) -> bool {
        self.residual.is_empty()
    }

    /// Layout of rows after residual operations
    pub fn final_layout(&self) -> RowLayout {
        match &self.residual.aggregation {
            Some(aggregation) => aggregation.layout(),
            None => self.layout.clone(),
        }
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.output.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Plans push-down for fragments over one collection
pub struct PushdownPlanner<'a> {
    collection: &'a str,
    capabilities: &'a RemoteCapabilities,
}

impl<'a> PushdownPlanner<'a> {
    pub fn new(collection: &'a str, capabilities: &'a RemoteCapabilities) -> Self {
        Self {
            collection,
            capabilities,
        }
    }

    /// Plans a fragment.
    ///
    /// Fails only for malformed fragments; anything the remote cannot
    /// execute becomes a residual operation.
    pub fn plan(&self, fragment: &PlanFragment) -> PlannerResult<PushdownPlan> {
        Self::validate(fragment)?;

        let metrics = AdapterMetrics::global();
        metrics.increment_queries_planned();

        let fields = &fragment.source_fields;
        let mut residual = ResidualOps::default();

        // Filter
        let mut filter = None;
        if let Some(predicate) = &fragment.predicate {
            match PredicateTranslator::new(fields).translate(predicate) {
                Translation::Translated(pushed) => {
                    metrics.increment_filters_pushed();
                    filter = Some(pushed);
                }
                Translation::NotTranslatable(reason) => {
                    metrics.increment_filters_residual();
                    self.log_residual(Event::ResidualFilter, &reason);
                    residual.filter = Some(predicate.clone());
                }
            }
        }

        // Aggregation
        let mut buckets = Vec::new();
        let mut remote_metrics = Vec::new();
        let mut aggregation_pushed = false;
        if fragment.has_aggregation() {
            let attempt = if residual.filter.is_some() {
                Err("filter is evaluated locally".to_string())
            } else {
                self.translate_aggregation(fragment)
            };
            match attempt {
                Ok((b, m)) => {
                    metrics.increment_aggregations_pushed();
                    buckets = b;
                    remote_metrics = m;
                    aggregation_pushed = true;
                }
                Err(reason) => {
                    metrics.increment_aggregations_residual();
                    self.log_residual(Event::ResidualAggregation, &reason);
                    residual.aggregation = Some(ResidualAggregation {
                        group_keys: fragment.group_keys.iter().copied().collect(),
                        aggregates: fragment.aggregates.clone(),
                    });
                }
            }
        }

        // Sort and limit travel together
        let mut sort = Vec::new();
        let mut limit = None;
        if !fragment.sort_keys.is_empty() || fragment.limit.is_some() {
            let attempt = if residual.filter.is_some() || residual.aggregation.is_some() {
                Err("upstream operations are evaluated locally".to_string())
            } else {
                Self::translate_sort(fragment, &remote_metrics)
            };
            match attempt {
                Ok(pushed) => {
                    sort = pushed;
                    limit = fragment.limit;
                }
                Err(reason) => {
                    self.log_residual(Event::ResidualSortLimit, &reason);
                    residual.sort = fragment.sort_keys.clone();
                    residual.limit = fragment.limit;
                }
            }
        }

        let output = Self::output_columns(fragment);

        let layout = if aggregation_pushed {
            let mut columns: Vec<ColumnRef> =
                fragment.group_keys.iter().map(|g| ColumnRef::Field(*g)).collect();
            columns.extend((0..fragment.aggregates.len()).map(ColumnRef::Aggregate));
            RowLayout::new(columns)
        } else {
            let needed = Self::needed_fields(&residual, &output);
            RowLayout::new(needed.into_iter().map(ColumnRef::Field).collect())
        };

        let selected_fields = if aggregation_pushed {
            buckets.clone()
        } else {
            layout
                .columns()
                .iter()
                .filter_map(|c| match c {
                    ColumnRef::Field(idx) => fields.get(*idx).cloned(),
                    ColumnRef::Aggregate(_) => None,
                })
                .collect()
        };

        let remote = RemoteQuerySpec {
            collection: self.collection.to_string(),
            selected_fields,
            filter,
            buckets,
            metrics: remote_metrics,
            sort,
            limit,
        };

        log_event_with_fields(
            Event::PlanCreated,
            &[
                ("collection", self.collection),
                ("fully_pushed", if residual.is_empty() { "true" } else { "false" }),
                ("columns", &remote.columns().len().to_string()),
            ],
        );

        Ok(PushdownPlan {
            remote,
            residual,
            layout,
            output,
            source_fields: fields.clone(),
        })
    }

    fn log_residual(&self, event: Event, reason: &str) {
        log_event_with_fields(event, &[("collection", self.collection), ("reason", reason)]);
    }

    fn validate(fragment: &PlanFragment) -> PlannerResult<()> {
        let count = fragment.source_fields.len();
        let check_field = |idx: usize, role: &str| {
            if idx < count {
                Ok(())
            } else {
                Err(PlannerError::invalid_plan(format!(
                    "{} references field index {} but the collection has {} fields",
                    role, idx, count
                )))
            }
        };

        if let Some(predicate) = &fragment.predicate {
            let mut referenced = BTreeSet::new();
            predicate.collect_fields(&mut referenced);
            for idx in referenced {
                check_field(idx, "filter")?;
            }
        }
        for idx in &fragment.group_keys {
            check_field(*idx, "group key")?;
        }
        for aggregate in &fragment.aggregates {
            if let Some(idx) = aggregate.arg {
                check_field(idx, "aggregate")?;
            }
        }

        let columns = fragment
            .sort_keys
            .iter()
            .map(|k| (k.column, "sort key"))
            .chain(fragment.projection.iter().map(|p| (p.column, "projection")));
        for (column, role) in columns {
            match column {
                ColumnRef::Field(idx) => {
                    check_field(idx, role)?;
                    if fragment.has_aggregation() && !fragment.group_keys.contains(&idx) {
                        return Err(PlannerError::invalid_plan(format!(
                            "{} references field '{}' which is neither grouped nor aggregated",
                            role, fragment.source_fields[idx].name
                        )));
                    }
                }
                ColumnRef::Aggregate(idx) if idx >= fragment.aggregates.len() => {
                    return Err(PlannerError::invalid_plan(format!(
                        "{} references aggregate {} but the fragment has {}",
                        role,
                        idx,
                        fragment.aggregates.len()
                    )));
                }
                ColumnRef::Aggregate(_) => {}
            }
        }
        Ok(())
    }

    fn translate_aggregation(
        &self,
        fragment: &PlanFragment,
    ) -> Result<(Vec<FieldCatalogEntry>, Vec<RemoteMetric>), String> {
        let fields = &fragment.source_fields;
        let mut buckets = Vec::with_capacity(fragment.group_keys.len());
        for idx in &fragment.group_keys {
            let entry = &fields[*idx];
            if entry.multi_valued {
                return Err(format!("group key '{}' is multi-valued", entry.name));
            }
            buckets.push(entry.clone());
        }

        let translator = MetricTranslator::new(fields, self.capabilities);
        let metrics = fragment
            .aggregates
            .iter()
            .map(|spec| translator.translate(spec))
            .collect::<PlannerResult<Vec<_>>>()
            .map_err(|e| e.message().to_string())?;
        Ok((buckets, metrics))
    }

    fn translate_sort(
        fragment: &PlanFragment,
        remote_metrics: &[RemoteMetric],
    ) -> Result<Vec<RemoteSort>, String> {
        fragment
            .sort_keys
            .iter()
            .map(|key| {
                let name = match key.column {
                    ColumnRef::Field(idx) => {
                        let entry = &fragment.source_fields[idx];
                        if entry.multi_valued {
                            return Err(format!("sort key '{}' is multi-valued", entry.name));
                        }
                        entry.name.clone()
                    }
                    ColumnRef::Aggregate(idx) => remote_metrics
                        .get(idx)
                        .map(RemoteMetric::identifier)
                        .ok_or_else(|| format!("aggregate {} is not computed remotely", idx))?,
                };
                Ok(RemoteSort {
                    key: name,
                    direction: key.direction,
                })
            })
            .collect()
    }

    fn output_columns(fragment: &PlanFragment) -> Vec<OutputColumn> {
        let named = |column: ColumnRef| OutputColumn {
            column,
            name: fragment.column_name(column),
        };

        if !fragment.projection.is_empty() {
            return fragment
                .projection
                .iter()
                .map(|p| OutputColumn {
                    column: p.column,
                    name: p
                        .alias
                        .clone()
                        .unwrap_or_else(|| fragment.column_name(p.column)),
                })
                .collect();
        }
        if fragment.has_aggregation() {
            return fragment
                .group_keys
                .iter()
                .map(|g| named(ColumnRef::Field(*g)))
                .chain((0..fragment.aggregates.len()).map(|i| named(ColumnRef::Aggregate(i))))
                .collect();
        }
        (0..fragment.source_fields.len())
            .map(|i| named(ColumnRef::Field(i)))
            .collect()
    }

    /// Source fields the remote must return when aggregation is not pushed
    fn needed_fields(residual: &ResidualOps, output: &[OutputColumn]) -> BTreeSet<usize> {
        let mut needed = BTreeSet::new();
        if let Some(predicate) = &residual.filter {
            predicate.collect_fields(&mut needed);
        }
        if let Some(aggregation) = &residual.aggregation {
            needed.extend(aggregation.group_keys.iter().copied());
            needed.extend(aggregation.aggregates.iter().filter_map(|a| a.arg));
            return needed;
        }
        for key in &residual.sort {
            if let ColumnRef::Field(idx) = key.column {
                needed.insert(idx);
            }
        }
        for column in output {
            if let ColumnRef::Field(idx) = column.column {
                needed.insert(idx);
            }
        }
        needed
    }
}
