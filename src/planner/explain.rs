//! Explain output for push-down plans
//!
//! Deterministic, human-readable. Remote parts use the store's own syntax;
//! residual parts use field names.

use std::fmt;

use super::ast::{ColumnRef, SortKey};
use super::errors::PlannerError;
use super::pushdown::PushdownPlan;

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainPlan {
    /// Whether planning succeeded
    pub accepted: bool,
    pub collection: Option<String>,
    /// Remote query string (if a filter was pushed)
    pub remote_filter: Option<String>,
    pub selected_fields: Vec<String>,
    pub buckets: Vec<String>,
    pub metrics: Vec<String>,
    pub remote_sort: Vec<String>,
    pub remote_limit: Option<u64>,
    /// Residual operations, in pipeline order
    pub residual: Vec<String>,
    pub output: Vec<String>,
    pub rejection_reason: Option<String>,
    pub rejection_code: Option<String>,
}

impl ExplainPlan {
    pub fn from_plan(plan: &PushdownPlan) -> Self {
        let remote = &plan.remote;
        let fields = &plan.source_fields;
        let column_name = |column: ColumnRef| match column {
            ColumnRef::Field(idx) => fields
                .get(idx)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("${}", idx)),
            ColumnRef::Aggregate(idx) => plan
                .residual
                .aggregation
                .as_ref()
                .and_then(|a| a.aggregates.get(idx))
                .map(|a| a.display_name(fields))
                .unwrap_or_else(|| format!("agg${}", idx)),
        };
        let sort_desc = |keys: &[SortKey]| -> String {
            let parts: Vec<String> = keys
                .iter()
                .map(|k| format!("{} {}", column_name(k.column), k.direction.as_str()))
                .collect();
            parts.join(", ")
        };

        let mut residual = Vec::new();
        if let Some(filter) = &plan.residual.filter {
            residual.push(format!("Filter: {}", filter.describe(fields)));
        }
        if let Some(aggregation) = &plan.residual.aggregation {
            let groups: Vec<String> = aggregation
                .group_keys
                .iter()
                .map(|g| column_name(ColumnRef::Field(*g)))
                .collect();
            let calls: Vec<String> = aggregation
                .aggregates
                .iter()
                .map(|a| a.display_name(fields))
                .collect();
            residual.push(format!(
                "Aggregate: group=[{}] calls=[{}]",
                groups.join(", "),
                calls.join(", ")
            ));
        }
        if !plan.residual.sort.is_empty() {
            residual.push(format!("Sort: {}", sort_desc(&plan.residual.sort)));
        }
        if let Some(limit) = plan.residual.limit {
            residual.push(format!("Limit: {}", limit));
        }

        Self {
            accepted: true,
            collection: Some(remote.collection.clone()),
            remote_filter: remote.filter.as_ref().map(|f| f.to_query_string()),
            selected_fields: remote.selected_fields.iter().map(|f| f.name.clone()).collect(),
            buckets: remote.buckets.iter().map(|f| f.name.clone()).collect(),
            metrics: remote.metrics.iter().map(|m| m.identifier()).collect(),
            remote_sort: remote.sort.iter().map(|s| s.render()).collect(),
            remote_limit: remote.limit,
            residual,
            output: plan.output.iter().map(|c| c.name.clone()).collect(),
            rejection_reason: None,
            rejection_code: None,
        }
    }

    /// Explain output for a rejected fragment
    pub fn from_error(err: &PlannerError) -> Self {
        Self {
            accepted: false,
            collection: None,
            remote_filter: None,
            selected_fields: Vec::new(),
            buckets: Vec::new(),
            metrics: Vec::new(),
            remote_sort: Vec::new(),
            remote_limit: None,
            residual: Vec::new(),
            output: Vec::new(),
            rejection_reason: Some(err.message().to_string()),
            rejection_code: Some(err.code().code().to_string()),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        if let Some(collection) = &self.collection {
            writeln!(f, "Collection: {}", collection)?;
        }
        writeln!(f, "Remote:")?;
        writeln!(
            f,
            "  Query: {}",
            self.remote_filter.as_deref().unwrap_or("(match all)")
        )?;
        if !self.selected_fields.is_empty() {
            writeln!(f, "  Fields: {}", self.selected_fields.join(", "))?;
        }
        if !self.buckets.is_empty() {
            writeln!(f, "  Buckets: {}", self.buckets.join(", "))?;
        }
        if !self.metrics.is_empty() {
            writeln!(f, "  Metrics: {}", self.metrics.join(", "))?;
        }
        if !self.remote_sort.is_empty() {
            writeln!(f, "  Sort: {}", self.remote_sort.join(", "))?;
        }
        if let Some(limit) = self.remote_limit {
            writeln!(f, "  Limit: {}", limit)?;
        }
        if self.residual.is_empty() {
            writeln!(f, "Residual: none")?;
        } else {
            writeln!(f, "Residual:")?;
            for op in &self.residual {
                writeln!(f, "  - {}", op)?;
            }
        }
        writeln!(f, "Output: {}", self.output.join(", "))?;
        Ok(())
    }
}
