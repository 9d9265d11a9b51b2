//! Field catalog types
//!
//! The remote store may be schemaless, so logical types are hints. Columns
//! typed ANY carry whatever value the store returned.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{CatalogError, CatalogResult};

/// Logical column type inferred from remote metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalType {
    String,
    Integer,
    Float,
    Any,
}

impl LogicalType {
    /// Maps a remote field type name to a logical type.
    ///
    /// Unknown or absent hints map to ANY.
    pub fn from_type_hint(hint: Option<&str>) -> Self {
        let Some(hint) = hint else {
            return LogicalType::Any;
        };
        match hint.to_ascii_lowercase().as_str() {
            "string" | "strings" | "text" | "text_general" | "text_en" | "text_ws" => {
                LogicalType::String
            }
            "int" | "long" | "pint" | "plong" | "tint" | "tlong" | "pints" | "plongs"
            | "integer" => LogicalType::Integer,
            "float" | "double" | "pfloat" | "pdouble" | "tfloat" | "tdouble" | "pfloats"
            | "pdoubles" => LogicalType::Float,
            _ => LogicalType::Any,
        }
    }

    /// Returns true for INTEGER and FLOAT
    pub fn is_numeric(&self) -> bool {
        matches!(self, LogicalType::Integer | LogicalType::Float)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "STRING",
            LogicalType::Integer => "INTEGER",
            LogicalType::Float => "FLOAT",
            LogicalType::Any => "ANY",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One field of a remote collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalogEntry {
    /// Field name as known to the remote store
    pub name: String,
    /// Inferred logical type
    pub logical_type: LogicalType,
    /// Remote metadata flags the field as holding a list of values
    pub multi_valued: bool,
    /// False only when remote metadata marks the field required
    pub nullable: bool,
}

impl FieldCatalogEntry {
    /// Create a single-valued, nullable entry
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            multi_valued: false,
            nullable: true,
        }
    }

    /// Single-valued STRING entry
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::String)
    }

    /// Single-valued INTEGER entry
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Integer)
    }

    /// Single-valued FLOAT entry
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Float)
    }

    /// Marks the entry multi-valued
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Marks the entry required (non-nullable)
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Immutable field catalog of one collection.
///
/// Field names are unique; order is the remote metadata order and defines
/// the field indices plan fragments refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    collection: String,
    entries: Vec<FieldCatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl FieldCatalog {
    /// Builds a catalog, rejecting duplicate field names
    pub fn new(
        collection: impl Into<String>,
        entries: Vec<FieldCatalogEntry>,
    ) -> CatalogResult<Self> {
        let collection = collection.into();
        let mut by_name = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_name.insert(entry.name.clone(), idx).is_some() {
                return Err(CatalogError::duplicate_field(&collection, &entry.name));
            }
        }
        Ok(Self {
            collection,
            entries,
            by_name,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn entries(&self) -> &[FieldCatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a field index
    pub fn get(&self, index: usize) -> Option<&FieldCatalogEntry> {
        self.entries.get(index)
    }

    /// Field index for a name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Entry for a name
    pub fn field(&self, name: &str) -> Option<&FieldCatalogEntry> {
        self.index_of(name).map(|idx| &self.entries[idx])
    }

    /// Field names in index order
    pub fn field_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
