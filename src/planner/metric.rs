//! Aggregate to remote metric translation
//!
//! `COUNT()` counts rows and `COUNT(f)` counts non-null values of `f`; they
//! map to different metrics. SUM over no input is zero, never null.

use std::fmt;

use serde_json::{json, Value};

use crate::catalog::{FieldCatalogEntry, LogicalType};
use crate::config::RemoteCapabilities;

use super::ast::{AggFunction, AggregateSpec};
use super::errors::{PlannerError, PlannerResult};

/// Native remote metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    RowCount,
    NonNullCount,
    Sum,
    Min,
    Max,
    Mean,
    CountDistinct,
}

/// A metric the remote store computes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetric {
    pub kind: MetricKind,
    /// Argument field; `None` only for `RowCount`
    pub field: Option<String>,
    /// Type of the metric's result column
    pub value_type: LogicalType,
}

impl RemoteMetric {
    /// Metric expression, also the tuple key its value is returned under
    pub fn identifier(&self) -> String {
        let field = self.field.as_deref().unwrap_or("*");
        match self.kind {
            MetricKind::RowCount => "count(*)".to_string(),
            MetricKind::NonNullCount => format!("count({})", field),
            MetricKind::Sum => format!("sum({})", field),
            MetricKind::Min => format!("min({})", field),
            MetricKind::Max => format!("max({})", field),
            MetricKind::Mean => format!("avg({})", field),
            MetricKind::CountDistinct => format!("countDist({})", field),
        }
    }

    /// Value of the metric over an empty input
    pub fn empty_value(&self) -> Value {
        match self.kind {
            MetricKind::RowCount | MetricKind::NonNullCount | MetricKind::CountDistinct => json!(0),
            MetricKind::Sum if self.value_type == LogicalType::Integer => json!(0),
            MetricKind::Sum => json!(0.0),
            MetricKind::Min | MetricKind::Max | MetricKind::Mean => Value::Null,
        }
    }
}

impl fmt::Display for RemoteMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Maps aggregate calls to remote metrics
pub struct MetricTranslator<'a> {
    fields: &'a [FieldCatalogEntry],
    capabilities: &'a RemoteCapabilities,
}

impl<'a> MetricTranslator<'a> {
    pub fn new(fields: &'a [FieldCatalogEntry], capabilities: &'a RemoteCapabilities) -> Self {
        Self {
            fields,
            capabilities,
        }
    }

    pub fn translate(&self, spec: &AggregateSpec) -> PlannerResult<RemoteMetric> {
        let name = spec.display_name(self.fields);
        let unsupported = |reason: &str| PlannerError::unsupported_aggregate(name.clone(), reason);

        let Some(arg) = spec.arg else {
            return match (spec.function, spec.distinct) {
                (AggFunction::Count, false) => Ok(RemoteMetric {
                    kind: MetricKind::RowCount,
                    field: None,
                    value_type: LogicalType::Integer,
                }),
                (AggFunction::Count, true) => Err(unsupported("DISTINCT needs an argument")),
                _ => Err(unsupported("requires exactly one field argument")),
            };
        };

        let entry = self
            .fields
            .get(arg)
            .ok_or_else(|| PlannerError::invalid_plan(format!("aggregate argument index {} out of range", arg)))?;

        if entry.multi_valued {
            return Err(unsupported("argument is multi-valued"));
        }

        let field = Some(entry.name.clone());
        let kind = match (spec.function, spec.distinct) {
            (AggFunction::Count, false) => MetricKind::NonNullCount,
            (AggFunction::Count, true) if self.capabilities.count_distinct => {
                MetricKind::CountDistinct
            }
            (AggFunction::Count, true) => {
                return Err(unsupported("remote store has no distinct-count metric"))
            }
            (AggFunction::Min, _) => MetricKind::Min,
            (AggFunction::Max, _) => MetricKind::Max,
            (AggFunction::Sum, true) | (AggFunction::Avg, true) => {
                return Err(unsupported("no native DISTINCT form"))
            }
            (AggFunction::Sum, false) | (AggFunction::Avg, false)
                if !entry.logical_type.is_numeric() =>
            {
                return Err(unsupported("argument is not numeric"))
            }
            (AggFunction::Sum, false) => MetricKind::Sum,
            (AggFunction::Avg, false) => MetricKind::Mean,
        };

        let value_type = match kind {
            MetricKind::RowCount | MetricKind::NonNullCount | MetricKind::CountDistinct => {
                LogicalType::Integer
            }
            MetricKind::Sum if entry.logical_type == LogicalType::Integer => LogicalType::Integer,
            MetricKind::Sum | MetricKind::Mean => LogicalType::Float,
            MetricKind::Min | MetricKind::Max => entry.logical_type,
        };

        Ok(RemoteMetric {
            kind,
            field,
            value_type,
        })
    }
}
