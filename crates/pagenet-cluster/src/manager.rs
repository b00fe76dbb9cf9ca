//! The cluster manager façade.
//!
//! Owns the transport handle and wires the applier and membership
//! coordinator together. External collaborators — the REST layer, the
//! scheduler, the transmission layer — only ever see this type:
//! `broadcast_command` is the single write path, `repository` the read
//! path, `is_quorum` the gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use pagenet_core::auth;
use pagenet_core::model::{NewsList, NodeStatus, Transmitter};
use pagenet_core::normalize_name;
use pagenet_core::SharedRepository;
use pagenet_persistence::StateStore;

use crate::applier::{CommandApplier, EventHooks};
use crate::command::Command;
use crate::error::FatalClusterError;
use crate::membership::{refresh_quorum, MembershipCoordinator, Quorum};
use crate::transport::{ClusterAuthenticator, GroupTransport, MemberResponse, TransportEvent};

/// Façade over one node's replication machinery.
pub struct ClusterManager {
    transport: Arc<dyn GroupTransport>,
    applier: Arc<CommandApplier>,
    membership: MembershipCoordinator,
    repository: SharedRepository,
    quorum: Arc<Quorum>,
    hooks: Arc<dyn EventHooks>,
    store: Option<StateStore>,
    response_timeout: Duration,
    stopping: AtomicBool,
}

impl ClusterManager {
    /// Wires the node together and connects it to the group.
    ///
    /// `make_transport` receives the fully constructed applier so the
    /// transport can deliver incoming broadcasts to it — the same
    /// circularity the original resolves by registering a dispatcher on
    /// the channel.
    pub fn connect<F>(
        local_name: impl Into<String>,
        repository: SharedRepository,
        hooks: Arc<dyn EventHooks>,
        store: Option<StateStore>,
        response_timeout: Duration,
        make_transport: F,
    ) -> Arc<Self>
    where
        F: FnOnce(Arc<CommandApplier>) -> Arc<dyn GroupTransport>,
    {
        let local_name = local_name.into();
        prepare_repository(&repository);

        let quorum = Arc::new(Quorum::new());
        let applier = Arc::new(CommandApplier::new(
            repository.clone(),
            Arc::clone(&quorum),
            local_name.clone(),
            Arc::clone(&hooks),
            store.clone(),
        ));
        let transport = make_transport(Arc::clone(&applier));
        let membership = MembershipCoordinator::new(
            repository.clone(),
            Arc::clone(&quorum),
            local_name,
            store.clone(),
        );

        Arc::new(Self {
            transport,
            applier,
            membership,
            repository,
            quorum,
            hooks,
            store,
            response_timeout,
            stopping: AtomicBool::new(false),
        })
    }

    pub fn local_name(&self) -> &str {
        self.transport.local_name()
    }

    pub fn applier(&self) -> &Arc<CommandApplier> {
        &self.applier
    }

    /// Read access to the replicated model, lock handle included.
    pub fn repository(&self) -> SharedRepository {
        self.repository.clone()
    }

    /// Recomputes and returns the quorum flag.
    pub fn is_quorum(&self) -> bool {
        refresh_quorum(&self.repository.read(), &self.quorum)
    }

    /// Broadcasts a command to every reachable member and reports
    /// success only if every member answered OK.
    ///
    /// There is no rollback: members that answered OK have applied the
    /// mutation even when the overall result is `false`. Operators can
    /// compare replica digests ([`pagenet_core::Repository::digest`])
    /// to detect the divergence this can leave behind.
    pub fn broadcast_command(&self, command: &Command) -> bool {
        if !self.transport.is_connected() {
            warn!(
                op = command.name(),
                "cannot broadcast, transport is not connected"
            );
            return false;
        }

        match self
            .transport
            .broadcast(None, command, self.response_timeout)
        {
            Ok(responses) => {
                let success = !responses.is_empty() && responses.iter().all(MemberResponse::is_ok);
                if !success {
                    let summary: Vec<String> = responses
                        .iter()
                        .map(|r| match r.response {
                            Some(response) => format!("{}={response}", r.member),
                            None => format!("{}=no response", r.member),
                        })
                        .collect();
                    error!(op = command.name(), ?summary, "broadcast not accepted everywhere");
                }
                success
            }
            Err(e) => {
                error!(op = command.name(), "broadcast failed: {e}");
                false
            }
        }
    }

    /// Transmitters managed by this node, for the device layer.
    pub fn local_node_transmitters(&self) -> Vec<Transmitter> {
        let repo = self.repository.read();
        repo.transmitters_of_node(self.local_name())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Forwards a membership event from the transport's delivery
    /// thread. A fatal error obliges the caller to halt the process.
    pub fn handle_transport_event(&self, event: &TransportEvent) -> Result<(), FatalClusterError> {
        self.membership.handle_event(self.transport.as_ref(), event)
    }

    /// Serves this node's snapshot when a peer requests state transfer.
    pub fn serve_state(&self) -> Result<Vec<u8>, FatalClusterError> {
        self.membership.serve_state()
    }

    /// Whether this node is currently the only member of the view —
    /// the cluster-creation case that triggers bootstrap.
    pub fn is_sole_member(&self) -> bool {
        let local_key = normalize_name(self.local_name());
        self.transport
            .members()
            .iter()
            .all(|m| normalize_name(m) == local_key)
    }

    /// Fetches the cluster state when joining an existing group.
    ///
    /// A no-op when this node is the sole member — that is the
    /// cluster-creation case handled by bootstrap.
    pub fn synchronize_initial_state(&self) -> Result<(), FatalClusterError> {
        let local_key = normalize_name(self.local_name());
        let members = self.transport.members();
        let Some(peer) = members
            .iter()
            .find(|m| normalize_name(m) != local_key)
        else {
            return Ok(());
        };
        info!("joining existing cluster, fetching state from '{peer}'");
        self.membership
            .fetch_and_install(self.transport.as_ref(), peer)
    }

    /// The shared-secret check the transport invokes per connecting
    /// member.
    pub fn authenticator(&self) -> NodeKeyAuthenticator {
        NodeKeyAuthenticator {
            repository: self.repository.clone(),
        }
    }

    /// Cooperative shutdown: disconnect local devices, announce
    /// SUSPENDED to the group, close the transport, write the state
    /// file one last time.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopping cluster manager");

        for transmitter in self.local_node_transmitters() {
            self.hooks.transmitter_released(&transmitter);
        }

        let announce = Command::UpdateNodeStatus {
            node_name: self.local_name().to_string(),
            status: NodeStatus::Suspended,
        };
        if !self.broadcast_command(&announce) {
            warn!("could not announce suspended status to the group");
        }

        self.transport.close();

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.repository.read()) {
                error!("failed to write state file on shutdown: {e}");
            }
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

/// Rejoin hygiene, run once before connecting: node statuses reflect a
/// past view and reset to SUSPENDED until the transport reports
/// otherwise, and every rubric gets its news list in case an older
/// state file predates one.
fn prepare_repository(repository: &SharedRepository) {
    let mut repo = repository.write();
    for node in repo.nodes.values_mut() {
        node.status = NodeStatus::Suspended;
    }
    let rubric_keys: Vec<String> = repo.rubrics.keys().cloned().collect();
    for key in rubric_keys {
        repo.news.entry(key).or_insert_with(NewsList::new);
    }
}

/// Authenticates connecting members against the hashed shared secret
/// stored on their node record.
pub struct NodeKeyAuthenticator {
    repository: SharedRepository,
}

impl ClusterAuthenticator for NodeKeyAuthenticator {
    fn authenticate(&self, remote_identity: &str, token: &str) -> bool {
        let repo = self.repository.read();
        let Some(node) = repo.node(remote_identity) else {
            warn!("authentication of '{remote_identity}' failed: unknown node");
            return false;
        };
        let Some(key) = &node.key else {
            warn!("authentication of '{remote_identity}' failed: node has no key");
            return false;
        };
        if !auth::verify_password(token, key) {
            warn!("authentication of '{remote_identity}' failed: wrong key");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagenet_core::test_fixtures as fx;
    use pagenet_core::Repository;

    use crate::applier::NoHooks;
    use crate::transport::LoopbackTransport;

    fn manager_with(repo: Repository) -> Arc<ClusterManager> {
        ClusterManager::connect(
            "aachen",
            SharedRepository::new(repo),
            Arc::new(NoHooks),
            None,
            Duration::from_secs(1),
            |applier| Arc::new(LoopbackTransport::new("aachen", applier)),
        )
    }

    #[test]
    fn prepare_resets_statuses_and_registers_news_lists() {
        let mut repo = Repository::new();
        repo.put_user(fx::user("admin", true));
        repo.put_node(fx::node("aachen"));
        repo.put_node(fx::node("berlin"));
        repo.put_transmitter(fx::transmitter("tx-west", "aachen"));
        repo.put_transmitter_group(fx::transmitter_group("west", &["tx-west"], "admin"));
        // a rubric persisted without its news list
        repo.put_rubric(fx::rubric("dx-news", 1, &["west"], "admin"));

        let manager = manager_with(repo);
        let repo = manager.repository();
        let guard = repo.read();
        assert!(guard
            .nodes
            .values()
            .all(|n| n.status == NodeStatus::Suspended));
        assert!(guard.news_list("dx-news").is_some());
    }

    #[test]
    fn broadcast_command_requires_every_ok() {
        let mut repo = Repository::new();
        repo.put_user(fx::user("admin", true));
        let manager = manager_with(repo);

        assert!(manager.broadcast_command(&Command::PutUser(fx::user("carol", false))));
        // validation failure on the single member fails the broadcast
        assert!(!manager.broadcast_command(&Command::PutCallSign(fx::call_sign(
            "dl1abc", "ghost"
        ))));
    }

    #[test]
    fn local_node_transmitters_filters_by_owner() {
        let mut repo = Repository::new();
        repo.put_user(fx::user("admin", true));
        repo.put_node(fx::node("aachen"));
        repo.put_node(fx::node("berlin"));
        repo.put_transmitter(fx::transmitter("tx-west", "AACHEN"));
        repo.put_transmitter(fx::transmitter("tx-east", "berlin"));

        let manager = manager_with(repo);
        let local = manager.local_node_transmitters();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "tx-west");
    }

    #[test]
    fn authenticator_checks_the_stored_node_key() {
        let mut repo = Repository::new();
        let mut node = fx::node("berlin");
        node.key = Some(auth::hash_password("cluster-secret"));
        repo.put_node(node);

        let manager = manager_with(repo);
        let authenticator = manager.authenticator();
        assert!(authenticator.authenticate("berlin", "cluster-secret"));
        assert!(!authenticator.authenticate("berlin", "wrong"));
        assert!(!authenticator.authenticate("ghost", "cluster-secret"));

        let mut keyless = fx::node("munich");
        keyless.key = None;
        manager.repository().write().put_node(keyless);
        assert!(!authenticator.authenticate("munich", "cluster-secret"));
    }

    #[test]
    fn stop_announces_suspension_and_closes_the_transport() {
        let mut repo = Repository::new();
        repo.put_user(fx::user("admin", true));
        repo.put_node(fx::node("aachen"));
        let manager = manager_with(repo);

        // bring the node online first, as a view would
        manager
            .applier()
            .apply(&Command::UpdateNodeStatus {
                node_name: "aachen".into(),
                status: NodeStatus::Online,
            });

        manager.stop();
        assert!(manager.is_stopping());
        assert_eq!(
            manager.repository().read().node("aachen").unwrap().status,
            NodeStatus::Suspended
        );
        // closed transport refuses further broadcasts
        assert!(!manager.broadcast_command(&Command::PutUser(fx::user("carol", false))));
        // stop is idempotent
        manager.stop();
    }

    #[test]
    fn synchronize_initial_state_is_a_no_op_for_a_sole_member() {
        let manager = manager_with(Repository::new());
        assert!(manager.synchronize_initial_state().is_ok());
    }
}
