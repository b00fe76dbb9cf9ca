//! The in-memory aggregate holding all replicated entities.
//!
//! One [`Repository`] per node, guarded by a single reader-writer lock
//! ([`SharedRepository`]). Collections are `BTreeMap`s keyed by the
//! normalized entity name so serialisation order — and therefore the
//! replica digest — is deterministic.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::to_hex;
use crate::model::{
    normalize_name, Call, CallSign, CoreStatistics, NewsList, Node, Rubric, Transmitter,
    TransmitterGroup, User,
};

/// All replicated collections plus process-local statistics.
///
/// Pure data: no networking, no locking. Mutation happens through the
/// command applier, which owns the single write-lock acquisition per
/// operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub users: BTreeMap<String, User>,
    pub call_signs: BTreeMap<String, CallSign>,
    pub nodes: BTreeMap<String, Node>,
    pub transmitters: BTreeMap<String, Transmitter>,
    pub transmitter_groups: BTreeMap<String, TransmitterGroup>,
    pub rubrics: BTreeMap<String, Rubric>,
    /// News lists keyed by the owning rubric's name.
    pub news: BTreeMap<String, NewsList>,
    /// Posted calls in arrival order. No identity, no keyed lookup.
    pub calls: Vec<Call>,
    #[serde(skip)]
    pub statistics: CoreStatistics,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    // -- keyed accessors --
    //
    // put replaces any prior value under the same normalized key; get and
    // remove normalize the lookup name. One trio per collection rather
    // than a generic map wrapper: the call sites read better and the
    // collections are few.

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.get(&normalize_name(name))
    }

    pub fn put_user(&mut self, user: User) -> Option<User> {
        self.users.insert(normalize_name(&user.name), user)
    }

    pub fn call_sign(&self, name: &str) -> Option<&CallSign> {
        self.call_signs.get(&normalize_name(name))
    }

    pub fn put_call_sign(&mut self, call_sign: CallSign) -> Option<CallSign> {
        self.call_signs
            .insert(normalize_name(&call_sign.name), call_sign)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(&normalize_name(name))
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(&normalize_name(name))
    }

    pub fn put_node(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(normalize_name(&node.name), node)
    }

    pub fn transmitter(&self, name: &str) -> Option<&Transmitter> {
        self.transmitters.get(&normalize_name(name))
    }

    pub fn transmitter_mut(&mut self, name: &str) -> Option<&mut Transmitter> {
        self.transmitters.get_mut(&normalize_name(name))
    }

    pub fn put_transmitter(&mut self, transmitter: Transmitter) -> Option<Transmitter> {
        self.transmitters
            .insert(normalize_name(&transmitter.name), transmitter)
    }

    pub fn transmitter_group(&self, name: &str) -> Option<&TransmitterGroup> {
        self.transmitter_groups.get(&normalize_name(name))
    }

    pub fn put_transmitter_group(&mut self, group: TransmitterGroup) -> Option<TransmitterGroup> {
        self.transmitter_groups
            .insert(normalize_name(&group.name), group)
    }

    pub fn rubric(&self, name: &str) -> Option<&Rubric> {
        self.rubrics.get(&normalize_name(name))
    }

    pub fn put_rubric(&mut self, rubric: Rubric) -> Option<Rubric> {
        self.rubrics.insert(normalize_name(&rubric.name), rubric)
    }

    pub fn news_list(&self, rubric_name: &str) -> Option<&NewsList> {
        self.news.get(&normalize_name(rubric_name))
    }

    pub fn news_list_mut(&mut self, rubric_name: &str) -> Option<&mut NewsList> {
        self.news.get_mut(&normalize_name(rubric_name))
    }

    /// Transmitters whose owning node matches `node_name`.
    pub fn transmitters_of_node(&self, node_name: &str) -> Vec<&Transmitter> {
        let key = normalize_name(node_name);
        self.transmitters
            .values()
            .filter(|t| normalize_name(&t.node_name) == key)
            .collect()
    }

    /// SHA-256 over the canonical JSON serialisation of all collections.
    ///
    /// Two replicas that applied the same mutations hold the same digest;
    /// operators compare digests to detect divergence after partial
    /// replication failures. Statistics are excluded (process-local).
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).expect("repository serialisation is infallible");
        to_hex(&Sha256::digest(&bytes))
    }
}

/// The repository behind the node-wide reader-writer lock.
///
/// Lock poisoning is recovered rather than propagated: a panicking
/// writer leaves state of uncertain consistency, which the error
/// taxonomy already accounts for via `InternalError`.
#[derive(Debug, Clone, Default)]
pub struct SharedRepository(Arc<RwLock<Repository>>);

impl SharedRepository {
    pub fn new(repository: Repository) -> Self {
        Self(Arc::new(RwLock::new(repository)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Repository> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Repository> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the whole repository, e.g. after a state transfer.
    ///
    /// Statistics survive the swap — they count work done by this
    /// process, not state owned by the cluster.
    pub fn replace(&self, mut repository: Repository) {
        let mut guard = self.write();
        repository.statistics = guard.statistics;
        *guard = repository;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeStatus;

    fn test_node(name: &str) -> Node {
        Node::new(name, 50.78, 6.06)
    }

    #[test]
    fn put_is_case_insensitive_replace() {
        let mut repo = Repository::new();
        repo.put_node(test_node("Aachen"));
        let mut replacement = test_node("AACHEN");
        replacement.status = NodeStatus::Online;
        let old = repo.put_node(replacement);

        assert!(old.is_some());
        assert_eq!(repo.nodes.len(), 1);
        assert_eq!(repo.node("aachen").unwrap().status, NodeStatus::Online);
    }

    #[test]
    fn lookup_normalizes_name() {
        let mut repo = Repository::new();
        repo.put_node(test_node("aachen"));
        assert!(repo.node(" Aachen ").is_some());
        assert!(repo.node("berlin").is_none());
    }

    #[test]
    fn transmitters_of_node_matches_case_insensitively() {
        let mut repo = Repository::new();
        let mut t = crate::test_fixtures::transmitter("t1", "Aachen");
        t.node_name = "AACHEN".into();
        repo.put_transmitter(t);
        repo.put_transmitter(crate::test_fixtures::transmitter("t2", "berlin"));

        let local = repo.transmitters_of_node("aachen");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "t1");
    }

    #[test]
    fn digest_is_stable_and_tracks_content() {
        let mut a = Repository::new();
        let mut b = Repository::new();
        a.put_node(test_node("aachen"));
        b.put_node(test_node("aachen"));
        assert_eq!(a.digest(), b.digest());

        b.put_node(test_node("berlin"));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn digest_ignores_statistics() {
        let mut a = Repository::new();
        let b = Repository::new();
        a.statistics.calls = 17;
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn replace_keeps_local_statistics() {
        let shared = SharedRepository::default();
        shared.write().statistics.calls = 3;

        let mut incoming = Repository::new();
        incoming.put_node(test_node("aachen"));
        shared.replace(incoming);

        let guard = shared.read();
        assert_eq!(guard.statistics.calls, 3);
        assert!(guard.node("aachen").is_some());
    }
}
