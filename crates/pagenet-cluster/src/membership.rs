//! Membership tracking, quorum, and partition resolution.
//!
//! Transport events drive a per-node status machine over the replicated
//! node collection: view-accepted transitions are authoritative,
//! suspects are advisory, merges trigger majority-side selection and —
//! on the minority side — a full state transfer. Events arrive on one
//! delivery thread in transport order and are never coalesced.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use pagenet_core::model::{normalize_name, NodeStatus};
use pagenet_core::repository::Repository;
use pagenet_core::SharedRepository;
use pagenet_persistence::{StateSnapshot, StateStore};

use crate::error::FatalClusterError;
use crate::transport::{GroupTransport, TransportError, TransportEvent};

/// Bound on state-transfer retries during merge resolution.
pub const STATE_TRANSFER_ATTEMPTS: u32 = 6;

/// Per-attempt timeout for a state-transfer fetch.
pub const STATE_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// The node-local quorum flag.
///
/// Starts `true`: a node creating a brand-new cluster has no node
/// records yet, and its bootstrap writes must pass the quorum gate.
/// [`refresh_quorum`] takes over as soon as any node is ONLINE.
#[derive(Debug)]
pub struct Quorum {
    holds: AtomicBool,
}

impl Quorum {
    pub fn new() -> Self {
        Self {
            holds: AtomicBool::new(true),
        }
    }

    pub fn holds(&self) -> bool {
        self.holds.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, value: bool) {
        self.holds.store(value, Ordering::SeqCst);
    }
}

impl Default for Quorum {
    fn default() -> Self {
        Self::new()
    }
}

/// Recomputes the quorum flag from the node collection.
///
/// Quorum holds iff a strict majority of the non-suspended population
/// is ONLINE. With zero ONLINE nodes the flag is left untouched: that
/// state means the cluster is shutting down or this node has not
/// bootstrapped yet, not that a partition was lost.
pub fn refresh_quorum(repo: &Repository, quorum: &Quorum) -> bool {
    let active = repo
        .nodes
        .values()
        .filter(|n| n.status != NodeStatus::Suspended)
        .count();
    let online = repo
        .nodes
        .values()
        .filter(|n| n.status == NodeStatus::Online)
        .count();

    if online == 0 {
        debug!("no online nodes, quorum flag unchanged");
        return quorum.holds();
    }

    let holds = online > active / 2;
    if holds != quorum.holds() {
        if holds {
            info!(online, active, "cluster has quorum");
        } else {
            warn!(online, active, "cluster has no quorum");
        }
    }
    quorum.set(holds);
    holds
}

/// Selects the majority subgroup of a merge: the largest view wins,
/// ties go to the first-reported subgroup. The tie-break mirrors the
/// transport's report order — arbitrary, but deterministic for any
/// given merge event.
pub fn majority_subgroup(subgroups: &[Vec<String>]) -> &Vec<String> {
    let mut majority = &subgroups[0];
    for subgroup in subgroups {
        if subgroup.len() > majority.len() {
            majority = subgroup;
        }
    }
    majority
}

/// Consumes transport membership events and keeps node statuses, the
/// quorum flag, and — across partitions — the repository itself in
/// line with what the transport reports.
pub struct MembershipCoordinator {
    repository: SharedRepository,
    quorum: Arc<Quorum>,
    local_name: String,
    store: Option<StateStore>,
}

impl MembershipCoordinator {
    pub fn new(
        repository: SharedRepository,
        quorum: Arc<Quorum>,
        local_name: impl Into<String>,
        store: Option<StateStore>,
    ) -> Self {
        Self {
            repository,
            quorum,
            local_name: local_name.into(),
            store,
        }
    }

    /// Handles one transport event. An `Err` is fatal: the caller must
    /// halt the process rather than continue on unverifiable state.
    pub fn handle_event(
        &self,
        transport: &dyn GroupTransport,
        event: &TransportEvent,
    ) -> Result<(), FatalClusterError> {
        match event {
            TransportEvent::ViewAccepted(members) => {
                self.view_accepted(transport, members);
                Ok(())
            }
            TransportEvent::Suspect(member) => {
                self.suspect(member);
                Ok(())
            }
            TransportEvent::Merge(subgroups) => self.merge(transport, subgroups),
        }
    }

    /// Serves this node's snapshot to a member requesting state
    /// transfer.
    pub fn serve_state(&self) -> Result<Vec<u8>, FatalClusterError> {
        let repo = self.repository.read();
        Ok(StateSnapshot::of(&repo).to_bytes()?)
    }

    fn view_accepted(&self, transport: &dyn GroupTransport, members: &[String]) {
        info!(view = ?members, "new view accepted");
        let mut repo = self.repository.write();

        for member in members {
            let address = transport.physical_address(member);
            match repo.node_mut(member) {
                Some(node) => {
                    if let Some(address) = address {
                        node.address = Some(address);
                    }
                    if node.status != NodeStatus::Online {
                        info!(
                            "node '{member}' changed status from {} to online",
                            node.status
                        );
                        node.status = NodeStatus::Online;
                    }
                }
                // the first node of a fresh cluster adds itself during
                // bootstrap, right after this view
                None => warn!("unknown node in view: {member}"),
            }
        }

        let member_keys: BTreeSet<String> = members.iter().map(|m| normalize_name(m)).collect();
        for (key, node) in repo.nodes.iter_mut() {
            if node.status == NodeStatus::Online && !member_keys.contains(key) {
                warn!("node '{}' left the view, status unknown", node.name);
                node.status = NodeStatus::Unknown;
            }
        }

        refresh_quorum(&repo, &self.quorum);

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&repo) {
                error!("failed to write state file after view change: {e}");
            }
        }
    }

    /// Advisory only: the authoritative transition happens when the
    /// next view excludes the member.
    fn suspect(&self, member: &str) {
        warn!("node '{member}' is suspected");
        let mut repo = self.repository.write();
        let mut changed = false;
        if let Some(node) = repo.node_mut(member) {
            if node.status != NodeStatus::Unknown {
                node.status = NodeStatus::Unknown;
                changed = true;
            }
        }
        if changed {
            refresh_quorum(&repo, &self.quorum);
        }
    }

    fn merge(
        &self,
        transport: &dyn GroupTransport,
        subgroups: &[Vec<String>],
    ) -> Result<(), FatalClusterError> {
        if subgroups.is_empty() {
            return Ok(());
        }
        info!(subgroups = subgroups.len(), "merge in progress");

        let majority = majority_subgroup(subgroups);
        let local_key = normalize_name(&self.local_name);
        if majority.iter().any(|m| normalize_name(m) == local_key) {
            info!("in majority subgroup, local state is authoritative");
            return Ok(());
        }

        if self.quorum.holds() {
            // two quorate clusters collided: no side can be picked
            // without silently discarding committed writes
            error!("minority subgroup holds quorum, refusing to merge");
            return Err(FatalClusterError::MergedQuorumConflict);
        }

        let Some(representative) = majority.first() else {
            return Ok(());
        };
        info!("in minority subgroup, fetching state from '{representative}'");
        self.fetch_and_install(transport, representative)
    }

    pub(crate) fn fetch_and_install(
        &self,
        transport: &dyn GroupTransport,
        member: &str,
    ) -> Result<(), FatalClusterError> {
        let mut last_error = TransportError::NotConnected;
        for attempt in 1..=STATE_TRANSFER_ATTEMPTS {
            match transport.request_state(member, STATE_TRANSFER_TIMEOUT) {
                Ok(bytes) => return self.install(&bytes),
                Err(e) => {
                    warn!(attempt, "state transfer from '{member}' failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(FatalClusterError::StateTransferExhausted {
            member: member.to_string(),
            attempts: STATE_TRANSFER_ATTEMPTS,
            last_error,
        })
    }

    /// Replaces the local repository with a received snapshot.
    ///
    /// `from_bytes` re-resolves and re-validates every cross-reference;
    /// a snapshot that fails is rejected and the node halts instead of
    /// serving it.
    fn install(&self, bytes: &[u8]) -> Result<(), FatalClusterError> {
        let snapshot = StateSnapshot::from_bytes(bytes)?;
        self.repository.replace(snapshot.repository);

        let repo = self.repository.read();
        refresh_quorum(&repo, &self.quorum);
        info!(digest = %repo.digest(), "installed state from majority subgroup");

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&repo) {
                error!("failed to persist installed state: {e}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use bytes::Bytes;
    use pagenet_core::test_fixtures as fx;

    use crate::command::Command;
    use crate::transport::MemberResponse;

    /// Transport double with scripted state-transfer outcomes.
    struct ScriptedTransport {
        local: String,
        /// Outcomes popped front-first on each `request_state` call.
        state_results: Mutex<Vec<Result<Vec<u8>, ()>>>,
    }

    impl ScriptedTransport {
        fn new(local: &str, state_results: Vec<Result<Vec<u8>, ()>>) -> Self {
            Self {
                local: local.into(),
                state_results: Mutex::new(state_results),
            }
        }
    }

    impl GroupTransport for ScriptedTransport {
        fn local_name(&self) -> &str {
            &self.local
        }

        fn members(&self) -> Vec<String> {
            vec![self.local.clone()]
        }

        fn broadcast(
            &self,
            _destinations: Option<&[String]>,
            _command: &Command,
            _timeout: Duration,
        ) -> Result<Vec<MemberResponse>, TransportError> {
            Ok(Vec::new())
        }

        fn physical_address(&self, _member: &str) -> Option<SocketAddr> {
            Some("127.0.0.1:7733".parse().unwrap())
        }

        fn request_state(
            &self,
            _member: &str,
            timeout: Duration,
        ) -> Result<Bytes, TransportError> {
            let mut results = self.state_results.lock().unwrap();
            if results.is_empty() {
                return Err(TransportError::Timeout(timeout));
            }
            match results.remove(0) {
                Ok(bytes) => Ok(Bytes::from(bytes)),
                Err(()) => Err(TransportError::Timeout(timeout)),
            }
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn close(&self) {}
    }

    fn coordinator(nodes: &[(&str, NodeStatus)]) -> (MembershipCoordinator, Arc<Quorum>) {
        let mut repo = Repository::new();
        repo.put_user(fx::user("admin", true));
        for (name, status) in nodes {
            let mut node = fx::node(name);
            node.status = *status;
            repo.put_node(node);
        }
        let quorum = Arc::new(Quorum::new());
        let coordinator = MembershipCoordinator::new(
            SharedRepository::new(repo),
            Arc::clone(&quorum),
            "aachen",
            None,
        );
        // seed the flag from the initial population
        refresh_quorum(&coordinator.repository.read(), &quorum);
        (coordinator, quorum)
    }

    #[test]
    fn quorum_formula_over_status_populations() {
        use NodeStatus::{Online, Suspended, Unknown};
        let cases: &[(&[NodeStatus], bool)] = &[
            (&[Online], true),
            (&[Online, Online], true),
            (&[Online, Unknown], false),
            (&[Online, Online, Unknown], true),
            (&[Online, Unknown, Unknown], false),
            (&[Online, Suspended], true),
            (&[Online, Suspended, Unknown], false),
            (&[Online, Online, Suspended, Unknown], true),
        ];
        for (statuses, expected) in cases {
            let mut repo = Repository::new();
            for (i, status) in statuses.iter().enumerate() {
                let mut node = fx::node(&format!("node-{i}"));
                node.status = *status;
                repo.put_node(node);
            }
            let quorum = Quorum::new();
            assert_eq!(
                refresh_quorum(&repo, &quorum),
                *expected,
                "population {statuses:?}"
            );
        }
    }

    #[test]
    fn zero_online_leaves_the_flag_untouched() {
        let mut repo = Repository::new();
        let mut node = fx::node("aachen");
        node.status = NodeStatus::Suspended;
        repo.put_node(node);

        let quorum = Quorum::new();
        assert!(refresh_quorum(&repo, &quorum));
        quorum.set(false);
        assert!(!refresh_quorum(&repo, &quorum));
    }

    #[test]
    fn view_accepted_transitions_statuses_both_ways() {
        let (coordinator, quorum) = coordinator(&[
            ("aachen", NodeStatus::Suspended),
            ("berlin", NodeStatus::Online),
            ("munich", NodeStatus::Unknown),
        ]);
        let transport = ScriptedTransport::new("aachen", vec![]);

        // berlin fell out of the view; aachen and munich rejoined
        coordinator
            .handle_event(
                &transport,
                &TransportEvent::ViewAccepted(vec!["aachen".into(), "munich".into()]),
            )
            .unwrap();

        let repo = coordinator.repository.read();
        assert_eq!(repo.node("aachen").unwrap().status, NodeStatus::Online);
        assert_eq!(repo.node("munich").unwrap().status, NodeStatus::Online);
        assert_eq!(repo.node("berlin").unwrap().status, NodeStatus::Unknown);
        assert!(repo.node("aachen").unwrap().address.is_some());
        drop(repo);

        // 2 of 3 active online
        assert!(quorum.holds());
    }

    #[test]
    fn suspect_is_advisory_and_recomputes_quorum() {
        let (coordinator, quorum) =
            coordinator(&[("aachen", NodeStatus::Online), ("berlin", NodeStatus::Online)]);
        let transport = ScriptedTransport::new("aachen", vec![]);
        assert!(quorum.holds());

        coordinator
            .handle_event(&transport, &TransportEvent::Suspect("berlin".into()))
            .unwrap();

        assert_eq!(
            coordinator.repository.read().node("berlin").unwrap().status,
            NodeStatus::Unknown
        );
        assert!(!quorum.holds());

        // suspects for unknown members are ignored
        coordinator
            .handle_event(&transport, &TransportEvent::Suspect("ghost".into()))
            .unwrap();
    }

    #[test]
    fn majority_selection_prefers_size_then_first_reported() {
        let two = vec!["a".to_string(), "b".to_string()];
        let one = vec!["c".to_string()];
        assert_eq!(majority_subgroup(&[two.clone(), one.clone()]), &two);
        assert_eq!(majority_subgroup(&[one.clone(), two.clone()]), &two);

        let other_two = vec!["x".to_string(), "y".to_string()];
        assert_eq!(majority_subgroup(&[two.clone(), other_two.clone()]), &two);
        assert_eq!(majority_subgroup(&[other_two.clone(), two]), &other_two);
    }

    #[test]
    fn merge_in_majority_subgroup_is_a_no_op() {
        let (coordinator, _) =
            coordinator(&[("aachen", NodeStatus::Online), ("berlin", NodeStatus::Online)]);
        let transport = ScriptedTransport::new("aachen", vec![]);

        let digest_before = coordinator.repository.read().digest();
        coordinator
            .handle_event(
                &transport,
                &TransportEvent::Merge(vec![
                    vec!["aachen".into(), "berlin".into()],
                    vec!["munich".into()],
                ]),
            )
            .unwrap();
        assert_eq!(coordinator.repository.read().digest(), digest_before);
    }

    #[test]
    fn minority_with_quorum_is_fatal() {
        let (coordinator, quorum) = coordinator(&[("aachen", NodeStatus::Online)]);
        assert!(quorum.holds());
        let transport = ScriptedTransport::new("aachen", vec![]);

        let err = coordinator
            .handle_event(
                &transport,
                &TransportEvent::Merge(vec![
                    vec!["berlin".into(), "munich".into()],
                    vec!["aachen".into()],
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, FatalClusterError::MergedQuorumConflict));
    }

    #[test]
    fn minority_without_quorum_installs_majority_state() {
        let (coordinator, quorum) = coordinator(&[
            ("aachen", NodeStatus::Online),
            ("berlin", NodeStatus::Unknown),
            ("munich", NodeStatus::Unknown),
        ]);
        assert!(!quorum.holds());

        // the majority side knows an extra user
        let mut majority_repo = Repository::new();
        majority_repo.put_user(fx::user("admin", true));
        majority_repo.put_user(fx::user("carol", false));
        majority_repo.put_node(fx::node("berlin"));
        majority_repo.put_node(fx::node("munich"));
        let bytes = StateSnapshot::of(&majority_repo).to_bytes().unwrap();

        // first attempt fails, second succeeds: the bounded retry covers it
        let transport = ScriptedTransport::new("aachen", vec![Err(()), Ok(bytes)]);

        coordinator
            .handle_event(
                &transport,
                &TransportEvent::Merge(vec![
                    vec!["berlin".into(), "munich".into()],
                    vec!["aachen".into()],
                ]),
            )
            .unwrap();

        let repo = coordinator.repository.read();
        assert!(repo.user("carol").is_some());
        assert_eq!(repo.digest(), majority_repo.digest());
    }

    #[test]
    fn state_transfer_retry_budget_is_bounded() {
        let (coordinator, _) = coordinator(&[
            ("aachen", NodeStatus::Online),
            ("berlin", NodeStatus::Unknown),
            ("munich", NodeStatus::Unknown),
        ]);
        // every attempt times out
        let transport = ScriptedTransport::new("aachen", vec![]);

        let err = coordinator
            .handle_event(
                &transport,
                &TransportEvent::Merge(vec![
                    vec!["berlin".into(), "munich".into()],
                    vec!["aachen".into()],
                ]),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FatalClusterError::StateTransferExhausted {
                attempts: STATE_TRANSFER_ATTEMPTS,
                ..
            }
        ));
    }

    #[test]
    fn invalid_snapshot_is_rejected_not_installed() {
        let (coordinator, _) = coordinator(&[
            ("aachen", NodeStatus::Online),
            ("berlin", NodeStatus::Unknown),
            ("munich", NodeStatus::Unknown),
        ]);
        let digest_before = coordinator.repository.read().digest();

        let transport =
            ScriptedTransport::new("aachen", vec![Ok(b"not a snapshot".to_vec())]);
        let err = coordinator
            .handle_event(
                &transport,
                &TransportEvent::Merge(vec![
                    vec!["berlin".into(), "munich".into()],
                    vec!["aachen".into()],
                ]),
            )
            .unwrap_err();

        assert!(matches!(err, FatalClusterError::SnapshotRejected(_)));
        assert_eq!(coordinator.repository.read().digest(), digest_before);
    }
}
