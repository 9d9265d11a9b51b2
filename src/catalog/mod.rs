//! Schema inspection for remote collections
//!
//! Queries remote metadata once per table handle and builds an immutable
//! field catalog: name, logical type, multi-valuedness, nullability.
//!
//! # Rules
//!
//! - Field names are unique within a catalog
//! - Multi-valued only when metadata says so explicitly
//! - Unknown types are ANY; consumers coerce at read time

mod errors;
mod inspector;
mod types;

pub use errors::{CatalogError, CatalogResult};
pub use inspector::{MetadataService, RemoteFieldInfo, SchemaInspector};
pub use types::{FieldCatalog, FieldCatalogEntry, LogicalType};
