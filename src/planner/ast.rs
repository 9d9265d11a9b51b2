//! Plan fragment structures
//!
//! A plan fragment is the already-decomposed slice of a relational plan that
//! sits on top of one remote collection: scan, optional filter, optional
//! aggregation, optional sort/limit, and the projection the caller expects.
//! Field references are indices into `source_fields`.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use crate::catalog::FieldCatalogEntry;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// Operator with its operands swapped: `a < b` == `b > a`
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    /// Applies the operator to an ordering of left against right
    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::NotEq => ordering != Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::LtEq => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::GtEq => ordering != Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Comparison operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Source field by index
    Field(usize),
    /// Literal value
    Literal(Value),
}

/// Relational predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    IsNull(Operand),
}

impl Predicate {
    /// `field <op> literal`
    pub fn compare(field: usize, op: CompareOp, value: Value) -> Self {
        Predicate::Compare {
            op,
            left: Operand::Field(field),
            right: Operand::Literal(value),
        }
    }

    pub fn eq(field: usize, value: Value) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn not_eq(field: usize, value: Value) -> Self {
        Self::compare(field, CompareOp::NotEq, value)
    }

    pub fn lt(field: usize, value: Value) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn lte(field: usize, value: Value) -> Self {
        Self::compare(field, CompareOp::LtEq, value)
    }

    pub fn gt(field: usize, value: Value) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn gte(field: usize, value: Value) -> Self {
        Self::compare(field, CompareOp::GtEq, value)
    }

    /// `left <op> right` between two fields
    pub fn fields(left: usize, op: CompareOp, right: usize) -> Self {
        Predicate::Compare {
            op,
            left: Operand::Field(left),
            right: Operand::Field(right),
        }
    }

    pub fn and(terms: Vec<Predicate>) -> Self {
        Predicate::And(terms)
    }

    pub fn or(terms: Vec<Predicate>) -> Self {
        Predicate::Or(terms)
    }

    pub fn negate(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn is_null(field: usize) -> Self {
        Predicate::IsNull(Operand::Field(field))
    }

    /// Adds every field index this predicate reads to `out`
    pub fn collect_fields(&self, out: &mut BTreeSet<usize>) {
        fn operand(op: &Operand, out: &mut BTreeSet<usize>) {
            if let Operand::Field(idx) = op {
                out.insert(*idx);
            }
        }
        match self {
            Predicate::Compare { left, right, .. } => {
                operand(left, out);
                operand(right, out);
            }
            Predicate::And(terms) | Predicate::Or(terms) => {
                for term in terms {
                    term.collect_fields(out);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(out),
            Predicate::IsNull(op) => operand(op, out),
        }
    }

    /// Renders the predicate with field names, for explain output
    pub fn describe(&self, fields: &[FieldCatalogEntry]) -> String {
        let operand = |op: &Operand| match op {
            Operand::Field(idx) => fields
                .get(*idx)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("${}", idx)),
            Operand::Literal(v) => v.to_string(),
        };
        match self {
            Predicate::Compare { op, left, right } => {
                format!("{} {} {}", operand(left), op, operand(right))
            }
            Predicate::And(terms) => join_terms(terms, " AND ", fields),
            Predicate::Or(terms) => join_terms(terms, " OR ", fields),
            Predicate::Not(inner) => format!("NOT ({})", inner.describe(fields)),
            Predicate::IsNull(op) => format!("{} IS NULL", operand(op)),
        }
    }
}

fn join_terms(terms: &[Predicate], sep: &str, fields: &[FieldCatalogEntry]) -> String {
    let parts: Vec<String> = terms
        .iter()
        .map(|t| format!("({})", t.describe(fields)))
        .collect();
    parts.join(sep)
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunction::Count => "count",
            AggFunction::Sum => "sum",
            AggFunction::Min => "min",
            AggFunction::Max => "max",
            AggFunction::Avg => "avg",
        }
    }
}

/// One aggregate call.
///
/// `COUNT` without an argument counts rows; `COUNT(f)` counts non-null
/// values of `f`. The two are never interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateSpec {
    pub function: AggFunction,
    pub arg: Option<usize>,
    pub distinct: bool,
}

impl AggregateSpec {
    pub fn new(function: AggFunction, arg: Option<usize>) -> Self {
        Self {
            function,
            arg,
            distinct: false,
        }
    }

    /// `COUNT(*)`
    pub fn count_rows() -> Self {
        Self::new(AggFunction::Count, None)
    }

    /// `COUNT(field)`
    pub fn count(field: usize) -> Self {
        Self::new(AggFunction::Count, Some(field))
    }

    pub fn sum(field: usize) -> Self {
        Self::new(AggFunction::Sum, Some(field))
    }

    pub fn min(field: usize) -> Self {
        Self::new(AggFunction::Min, Some(field))
    }

    pub fn max(field: usize) -> Self {
        Self::new(AggFunction::Max, Some(field))
    }

    pub fn avg(field: usize) -> Self {
        Self::new(AggFunction::Avg, Some(field))
    }

    /// DISTINCT-qualified copy
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Display name such as `count(*)` or `sum(DISTINCT fieldc)`
    pub fn display_name(&self, fields: &[FieldCatalogEntry]) -> String {
        let arg = match self.arg {
            None => "*".to_string(),
            Some(idx) => fields
                .get(idx)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("${}", idx)),
        };
        if self.distinct {
            format!("{}(DISTINCT {})", self.function.as_str(), arg)
        } else {
            format!("{}({})", self.function.as_str(), arg)
        }
    }
}

/// Reference to a column of the fragment's logical output.
///
/// Before aggregation only `Field` is meaningful. After aggregation a
/// `Field` must be a group key and `Aggregate` indexes `aggregates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnRef {
    Field(usize),
    Aggregate(usize),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }
}

/// Output column with optional alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedColumn {
    pub column: ColumnRef,
    pub alias: Option<String>,
}

/// Decomposed plan fragment over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct PlanFragment {
    /// Fields of the scanned collection, in catalog order
    pub source_fields: Vec<FieldCatalogEntry>,
    /// Filter (optional)
    pub predicate: Option<Predicate>,
    /// Grouping fields
    pub group_keys: BTreeSet<usize>,
    /// Aggregate calls in output order
    pub aggregates: Vec<AggregateSpec>,
    /// Sort keys in priority order
    pub sort_keys: Vec<SortKey>,
    /// Row limit (optional)
    pub limit: Option<u64>,
    /// Output columns. Empty means every source field, or group keys then
    /// aggregates when the fragment aggregates.
    pub projection: Vec<ProjectedColumn>,
}

impl PlanFragment {
    /// Bare scan over the given fields
    pub fn scan(source_fields: Vec<FieldCatalogEntry>) -> Self {
        Self {
            source_fields,
            predicate: None,
            group_keys: BTreeSet::new(),
            aggregates: Vec::new(),
            sort_keys: Vec::new(),
            limit: None,
            projection: Vec::new(),
        }
    }

    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn group_by(mut self, field: usize) -> Self {
        self.group_keys.insert(field);
        self
    }

    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    pub fn order_by(mut self, key: SortKey) -> Self {
        self.sort_keys.push(key);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Appends an output column
    pub fn project(mut self, column: ColumnRef) -> Self {
        self.projection.push(ProjectedColumn {
            column,
            alias: None,
        });
        self
    }

    /// Appends an aliased output column
    pub fn project_as(mut self, column: ColumnRef, alias: impl Into<String>) -> Self {
        self.projection.push(ProjectedColumn {
            column,
            alias: Some(alias.into()),
        });
        self
    }

    /// True when the fragment groups or aggregates
    pub fn has_aggregation(&self) -> bool {
        !self.group_keys.is_empty() || !self.aggregates.is_empty()
    }

    /// Default name of a logical column
    pub fn column_name(&self, column: ColumnRef) -> String {
        match column {
            ColumnRef::Field(idx) => self
                .source_fields
                .get(idx)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("${}", idx)),
            ColumnRef::Aggregate(idx) => self
                .aggregates
                .get(idx)
                .map(|a| a.display_name(&self.source_fields))
                .unwrap_or_else(|| format!("agg${}", idx)),
        }
    }
}
