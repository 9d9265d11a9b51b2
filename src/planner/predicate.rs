//! Predicate translation into the remote query syntax
//!
//! Only conjunctions of field-vs-literal comparisons are pushed. Anything
//! else is reported as not translatable and evaluated locally in full; a
//! filter tree is never split between remote and local evaluation.
//!
//! Term literals are always emitted as quoted phrases, so remote query syntax
//! inside a literal such as `(a1 a2)` is matched verbatim. Only numeric range
//! bounds are left bare.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::catalog::{FieldCatalogEntry, LogicalType};

use super::ast::{CompareOp, Operand, Predicate};

/// One pushed comparison: `field <op> value`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl FilterTerm {
    /// Renders the term as a remote query clause
    pub fn render(&self) -> String {
        let field = escape_field(&self.field);
        match self.op {
            CompareOp::Eq => format!("{}:{}", field, render_literal(&self.value)),
            CompareOp::NotEq => {
                let value = render_literal(&self.value);
                format!("({}:[* TO *] -{}:{})", field, field, value)
            }
            CompareOp::Lt => format!("{}:{{* TO {}}}", field, render_bound(&self.value)),
            CompareOp::LtEq => format!("{}:[* TO {}]", field, render_bound(&self.value)),
            CompareOp::Gt => format!("{}:{{{} TO *}}", field, render_bound(&self.value)),
            CompareOp::GtEq => format!("{}:[{} TO *]", field, render_bound(&self.value)),
        }
    }
}

/// Filter executed by the remote store: a conjunction of terms
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteFilter {
    terms: Vec<FilterTerm>,
}

impl RemoteFilter {
    pub fn new(terms: Vec<FilterTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    /// Query string in the remote syntax, terms joined with AND
    pub fn to_query_string(&self) -> String {
        let clauses: Vec<String> = self.terms.iter().map(FilterTerm::render).collect();
        clauses.join(" AND ")
    }
}

impl fmt::Display for RemoteFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query_string())
    }
}

/// Outcome of predicate translation
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Translated(RemoteFilter),
    NotTranslatable(String),
}

impl Translation {
    pub fn is_translated(&self) -> bool {
        matches!(self, Translation::Translated(_))
    }
}

/// Translates relational predicates against one field catalog
pub struct PredicateTranslator<'a> {
    fields: &'a [FieldCatalogEntry],
}

impl<'a> PredicateTranslator<'a> {
    pub fn new(fields: &'a [FieldCatalogEntry]) -> Self {
        Self { fields }
    }

    /// Translates the whole predicate or nothing
    pub fn translate(&self, predicate: &Predicate) -> Translation {
        let mut terms = Vec::new();
        match self.collect(predicate, &mut terms) {
            Ok(()) if terms.is_empty() => {
                Translation::NotTranslatable("empty conjunction".to_string())
            }
            Ok(()) => Translation::Translated(RemoteFilter::new(terms)),
            Err(reason) => Translation::NotTranslatable(reason),
        }
    }

    fn collect(&self, predicate: &Predicate, terms: &mut Vec<FilterTerm>) -> Result<(), String> {
        match predicate {
            Predicate::And(children) => {
                for child in children {
                    self.collect(child, terms)?;
                }
                Ok(())
            }
            Predicate::Compare { op, left, right } => {
                terms.push(self.comparison(*op, left, right)?);
                Ok(())
            }
            Predicate::Or(_) => Err("disjunction".to_string()),
            Predicate::Not(_) => Err("negation".to_string()),
            Predicate::IsNull(_) => Err("null test".to_string()),
        }
    }

    fn comparison(&self, op: CompareOp, left: &Operand, right: &Operand) -> Result<FilterTerm, String> {
        let (field_idx, op, literal) = match (left, right) {
            (Operand::Field(idx), Operand::Literal(v)) => (*idx, op, v),
            (Operand::Literal(v), Operand::Field(idx)) => (*idx, op.flip(), v),
            (Operand::Field(_), Operand::Field(_)) => {
                return Err("field-to-field comparison".to_string())
            }
            (Operand::Literal(_), Operand::Literal(_)) => {
                return Err("literal-to-literal comparison".to_string())
            }
        };

        let entry = self
            .fields
            .get(field_idx)
            .ok_or_else(|| format!("unknown field index {}", field_idx))?;

        if entry.multi_valued {
            return Err(format!("multi-valued field '{}'", entry.name));
        }
        match literal {
            Value::Null => return Err("null literal".to_string()),
            Value::Array(_) | Value::Object(_) => return Err("non-scalar literal".to_string()),
            _ => {}
        }
        if !literal_fits(entry.logical_type, literal) {
            return Err(format!(
                "literal {} does not fit {} field '{}'",
                literal, entry.logical_type, entry.name
            ));
        }

        Ok(FilterTerm {
            field: entry.name.clone(),
            op,
            value: literal.clone(),
        })
    }
}

fn literal_fits(logical_type: LogicalType, literal: &Value) -> bool {
    match logical_type {
        LogicalType::String => literal.is_string(),
        LogicalType::Integer | LogicalType::Float => literal.is_number(),
        LogicalType::Any => true,
    }
}

fn plain_identifier() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Field name as accepted by the remote query parser
pub fn escape_field(name: &str) -> String {
    if plain_identifier().is_match(name) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if !(ch.is_ascii_alphanumeric() || ch == '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Literal in term position as an opaque quoted value.
///
/// Numbers are quoted too: a bare `-3` would parse as a prohibit clause.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

/// Literal as a range bound; strings quoted, numbers bare
fn render_bound(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => render_literal(other),
    }
}

fn quote(s: &str) -> String {
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
