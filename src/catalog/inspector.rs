//! Schema inspector
//!
//! Builds a [`FieldCatalog`] from remote field metadata. A field is
//! multi-valued only when the metadata says so explicitly; a missing flag
//! means single-valued.

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event};
use crate::remote::RemoteError;

use super::errors::{CatalogError, CatalogResult};
use super::types::{FieldCatalog, FieldCatalogEntry, LogicalType};

/// Field metadata as reported by the remote store's schema endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFieldInfo {
    pub name: String,
    /// Remote type name, absent for schemaless fields
    #[serde(rename = "type", default)]
    pub type_hint: Option<String>,
    #[serde(rename = "multiValued", default)]
    pub multi_valued: Option<bool>,
    #[serde(default)]
    pub required: Option<bool>,
}

impl RemoteFieldInfo {
    pub fn new(name: impl Into<String>, type_hint: Option<&str>) -> Self {
        Self {
            name: name.into(),
            type_hint: type_hint.map(str::to_string),
            multi_valued: None,
            required: None,
        }
    }

    pub fn with_multi_valued(mut self, multi_valued: bool) -> Self {
        self.multi_valued = Some(multi_valued);
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    fn to_entry(&self) -> FieldCatalogEntry {
        FieldCatalogEntry {
            name: self.name.clone(),
            logical_type: LogicalType::from_type_hint(self.type_hint.as_deref()),
            multi_valued: self.multi_valued.unwrap_or(false),
            nullable: !self.required.unwrap_or(false),
        }
    }
}

/// Read-only metadata service for remote collections.
///
/// Connection management and collection discovery live behind this trait.
pub trait MetadataService {
    /// Field metadata for a collection, in the remote's declared order
    fn field_metadata(&self, collection: &str) -> Result<Vec<RemoteFieldInfo>, RemoteError>;
}

/// Builds field catalogs from remote metadata
pub struct SchemaInspector<'a, M: MetadataService + ?Sized> {
    metadata: &'a M,
}

impl<'a, M: MetadataService + ?Sized> SchemaInspector<'a, M> {
    pub fn new(metadata: &'a M) -> Self {
        Self { metadata }
    }

    /// Fetches and builds the catalog of a collection.
    ///
    /// Any metadata failure, including a missing collection, is reported as
    /// `MetadataUnavailable`.
    pub fn fetch_catalog(&self, collection: &str) -> CatalogResult<FieldCatalog> {
        let infos = self.metadata.field_metadata(collection).map_err(|e| {
            log_event_with_fields(
                Event::CatalogUnavailable,
                &[("collection", collection), ("reason", &e.to_string())],
            );
            CatalogError::metadata_unavailable(collection, e.to_string())
        })?;

        let entries = infos.iter().map(RemoteFieldInfo::to_entry).collect();
        let catalog = FieldCatalog::new(collection, entries).inspect_err(|e| {
            log_event_with_fields(
                Event::CatalogUnavailable,
                &[("collection", collection), ("reason", &e.to_string())],
            );
        })?;

        log_event_with_fields(
            Event::CatalogFetched,
            &[
                ("collection", collection),
                ("fields", &catalog.len().to_string()),
            ],
        );
        Ok(catalog)
    }
}
