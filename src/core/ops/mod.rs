//! core::ops
//!
//! Cross-process coordination.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive fleet lock
//!
//! # Architecture
//!
//! Every load-modify-persist cycle (loading the fleet for `fix`, executing
//! one action, revalidating, rescanning) runs while holding the fleet lock.
//! Acquisition is scoped: the guard releases on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use repofleet::core::ops::lock::FleetLock;
//!
//! let lock = FleetLock::acquire(&paths)?;
//! let snapshot = store.load_snapshot(&machine)?;
//! // ...
//! store.save_snapshot(&snapshot)?;
//! drop(lock);
//! ```

pub mod lock;

pub use lock::{FleetLock, LockError};
