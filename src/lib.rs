//! repofleet - keep a fleet of local git clones syncable
//!
//! repofleet watches every git clone under a set of named catalogs,
//! records why a repository cannot be synchronized safely, and offers
//! remediation actions that are re-checked, executed step by step and
//! revalidated.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to fix)
//! - [`fix`] - Remediation engine: eligibility, plans, execution
//! - [`scan`] - Catalog discovery and repository observation
//! - [`risk`] - Risk profile of uncommitted changes
//! - [`core`] - Domain types, config, metadata and state storage
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - GitHub client behind the `Forge` trait
//! - [`telemetry`] - Diagnostic logging setup
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. Fleet state is only loaded and persisted under the fleet lock
//! 2. An action is re-checked against fresh state before it runs
//! 3. Sync probes never touch the caller's branch, index or working tree
//! 4. A failed step stops execution; nothing is rolled back silently

pub mod cli;
pub mod core;
pub mod fix;
pub mod forge;
pub mod git;
pub mod risk;
pub mod scan;
pub mod telemetry;
pub mod ui;
