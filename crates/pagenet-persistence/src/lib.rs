//! pagenet-persistence: durable state snapshots.
//!
//! One JSON document holds every repository collection. The same
//! document serves two purposes: the state file written to disk between
//! restarts, and the byte payload exchanged during cluster state
//! transfer.

pub mod snapshot;

pub use snapshot::{PersistenceError, SavePolicy, StateSnapshot, StateStore};
