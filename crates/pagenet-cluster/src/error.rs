//! Error types for cluster operations.
//!
//! Recoverable failures are response codes ([`crate::CommandResponse`]),
//! never errors. The variants here are the conditions under which a node
//! must stop instead of continuing to serve a replica it cannot vouch
//! for.

use pagenet_persistence::PersistenceError;

use crate::transport::TransportError;

/// Conditions that halt the node process.
#[derive(Debug, thiserror::Error)]
pub enum FatalClusterError {
    /// Bootstrap could not establish the node identity or the first
    /// administrator account.
    #[error("bootstrap failed: {operation} was not accepted")]
    Bootstrap { operation: &'static str },

    /// A minority-subgroup node believed it held quorum during a merge:
    /// two independently quorate clusters collided and neither side can
    /// be picked silently.
    #[error("merged while holding quorum in a minority subgroup")]
    MergedQuorumConflict,

    /// The bounded state-transfer retry budget ran out.
    #[error("state transfer from '{member}' failed after {attempts} attempts: {last_error}")]
    StateTransferExhausted {
        member: String,
        attempts: u32,
        last_error: TransportError,
    },

    /// A received snapshot parsed or validated incorrectly; installing
    /// it would mean serving unverifiable state.
    #[error("received state snapshot rejected: {0}")]
    SnapshotRejected(#[from] PersistenceError),

    /// The initial state could not be obtained when joining an existing
    /// cluster.
    #[error("could not obtain initial state from the cluster: {0}")]
    InitialStateUnavailable(TransportError),
}
