//! core::metadata
//!
//! Per-repository policy metadata.
//!
//! # Modules
//!
//! - [`schema`] - Metadata schema types (v1)
//!
//! Storage lives in [`crate::core::store`]: one JSON document per repo key,
//! owned by the state store.

pub mod schema;

pub use schema::{
    parse_metadata, AutoPushMode, MetadataError, PushAccess, RepoMetadata, Visibility,
    METADATA_KIND, SCHEMA_VERSION,
};
