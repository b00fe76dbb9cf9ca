//! Contract with the external group-communication layer.
//!
//! The cluster core never speaks a wire protocol itself. It requires a
//! transport that provides reliable ordered multicast with synchronous
//! call-and-collect semantics, view/suspect/merge notifications, and
//! bulk state transfer — and nothing more. A merge notification is
//! always followed by a view-accepted notification carrying the
//! combined view, in that order, on a single event-delivery thread.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::applier::CommandApplier;
use crate::command::{Command, CommandResponse};

/// Membership notifications delivered by the transport, in delivery
/// order and never coalesced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A stable membership list. Authoritative.
    ViewAccepted(Vec<String>),
    /// A member looks unreachable but has not yet been dropped from the
    /// view. Advisory.
    Suspect(String),
    /// Previously separate views are converging; each inner list is one
    /// subgroup, in the order the transport reports them.
    Merge(Vec<Vec<String>>),
}

/// The outcome one member reported for a broadcast command. `None`
/// means the member did not answer within the timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberResponse {
    pub member: String,
    pub response: Option<CommandResponse>,
}

impl MemberResponse {
    pub fn is_ok(&self) -> bool {
        self.response == Some(CommandResponse::Ok)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("no member named '{0}' in the current view")]
    UnknownMember(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Failed(String),
}

/// Handle to the group-communication layer.
///
/// `broadcast` blocks until every reachable member responded or the
/// timeout elapsed; a member that missed the deadline appears in the
/// result with `response: None`.
pub trait GroupTransport: Send + Sync {
    /// The local member's identity within the group.
    fn local_name(&self) -> &str;

    /// Members of the current view, including the local one.
    fn members(&self) -> Vec<String>;

    /// Synchronous call-and-collect. `destinations: None` addresses the
    /// whole view.
    fn broadcast(
        &self,
        destinations: Option<&[String]>,
        command: &Command,
        timeout: Duration,
    ) -> Result<Vec<MemberResponse>, TransportError>;

    /// Network address of a member, if the transport knows it.
    fn physical_address(&self, member: &str) -> Option<SocketAddr>;

    /// Fetches a full state snapshot from the named member.
    fn request_state(&self, member: &str, timeout: Duration) -> Result<Bytes, TransportError>;

    fn is_connected(&self) -> bool;

    fn close(&self);
}

/// Per-connection authentication hook invoked by the transport when a
/// member joins: the joining side presents the shared cluster secret,
/// the receiving side checks it against replicated state.
pub trait ClusterAuthenticator: Send + Sync {
    fn authenticate(&self, remote_identity: &str, token: &str) -> bool;
}

/// Transport for a cluster of one: every broadcast is delivered to the
/// local applier only. Used by a standalone node and as the base case
/// in tests — the contract behaves identically whether the view has one
/// member or twenty.
pub struct LoopbackTransport {
    local_name: String,
    applier: Arc<CommandApplier>,
    connected: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(local_name: impl Into<String>, applier: Arc<CommandApplier>) -> Self {
        Self {
            local_name: local_name.into(),
            applier,
            connected: AtomicBool::new(true),
        }
    }
}

impl GroupTransport for LoopbackTransport {
    fn local_name(&self) -> &str {
        &self.local_name
    }

    fn members(&self) -> Vec<String> {
        vec![self.local_name.clone()]
    }

    fn broadcast(
        &self,
        _destinations: Option<&[String]>,
        command: &Command,
        _timeout: Duration,
    ) -> Result<Vec<MemberResponse>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        Ok(vec![MemberResponse {
            member: self.local_name.clone(),
            response: Some(self.applier.apply(command)),
        }])
    }

    fn physical_address(&self, _member: &str) -> Option<SocketAddr> {
        None
    }

    fn request_state(&self, member: &str, _timeout: Duration) -> Result<Bytes, TransportError> {
        // a single-member view has nobody to fetch from
        Err(TransportError::UnknownMember(member.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
