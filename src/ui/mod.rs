//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`prompts`] - Interactive confirmation
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All user-facing output and prompts go through this module so quiet and
//! non-interactive modes are honored in one place.

pub mod output;
pub mod prompts;
