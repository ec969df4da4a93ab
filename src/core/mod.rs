//! core
//!
//! Core domain types, schemas, and persistence for repofleet.
//!
//! # Modules
//!
//! - [`types`] - Strong types: RepoKey, ReasonSet, OperationInProgress, etc.
//! - [`record`] - Observed state of one working copy
//! - [`metadata`] - Per-repository policy metadata schema
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for fleet state
//! - [`ops`] - Cross-process fleet lock
//! - [`store`] - Machine snapshot and metadata persistence
//! - [`naming`] - Hosted repository naming rules
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Reason sets are ordered and deduplicated by construction

pub mod config;
pub mod metadata;
pub mod naming;
pub mod ops;
pub mod paths;
pub mod record;
pub mod store;
pub mod types;
