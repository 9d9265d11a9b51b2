//! Catalog error types
//!
//! Error codes:
//! - BRIDGE_METADATA_UNAVAILABLE (FATAL to table setup, not retried)

use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Remote metadata call failed, the collection is missing, or the
    /// metadata violates catalog invariants
    #[error("[FATAL] BRIDGE_METADATA_UNAVAILABLE: metadata for '{collection}' unavailable: {reason}")]
    MetadataUnavailable { collection: String, reason: String },
}

impl CatalogError {
    /// Create a metadata unavailable error
    pub fn metadata_unavailable(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogError::MetadataUnavailable {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn duplicate_field(collection: &str, field: &str) -> Self {
        Self::metadata_unavailable(collection, format!("duplicate field '{}'", field))
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::MetadataUnavailable { .. } => "BRIDGE_METADATA_UNAVAILABLE",
        }
    }

    /// Collection the error refers to
    pub fn collection(&self) -> &str {
        match self {
            CatalogError::MetadataUnavailable { collection, .. } => collection,
        }
    }
}
