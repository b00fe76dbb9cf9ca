//! pagenet-cluster: replicated state coordination.
//!
//! This crate keeps a set of peer nodes agreeing on the shared paging
//! configuration well enough to avoid split-brain corruption while
//! tolerating churn:
//!
//! - **Commands**: a closed catalogue of typed write operations,
//!   broadcast to every member and applied independently by each.
//! - **Quorum**: a strict majority of non-suspended nodes reporting
//!   ONLINE gates configuration writes.
//! - **Membership**: transport views drive node statuses; merges pick
//!   the majority subgroup and pull full state onto the minority side.
//! - **Bootstrap**: the first member of a fresh cluster creates its own
//!   node record and the default administrator.
//!
//! Replication is deliberately weak: a broadcast succeeds only if every
//! member answers OK, but members that answered OK keep the mutation
//! even when the overall broadcast fails. There is no cross-member
//! commit protocol; replica digests exist so operators can detect the
//! divergence this allows.

pub mod applier;
pub mod bootstrap;
pub mod command;
pub mod error;
pub mod manager;
pub mod membership;
pub mod transport;

pub use applier::{CommandApplier, EventHooks, NoHooks};
pub use bootstrap::{bootstrap_first_member, BootstrapConfig};
pub use command::{Command, CommandResponse};
pub use error::FatalClusterError;
pub use manager::{ClusterManager, NodeKeyAuthenticator};
pub use membership::{refresh_quorum, MembershipCoordinator, Quorum};
pub use transport::{
    ClusterAuthenticator, GroupTransport, LoopbackTransport, MemberResponse, TransportError,
    TransportEvent,
};
