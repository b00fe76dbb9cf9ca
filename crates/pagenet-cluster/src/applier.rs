//! Replicated write execution.
//!
//! Every member runs the same applier against its own repository. The
//! contract per mutating command: quorum pre-check, argument check,
//! one write-lock acquisition for validate + mutate + cascade, optional
//! persistence, response code. Side effects toward the device layer
//! fire through [`EventHooks`] after the lock is released and only when
//! the mutation fully succeeded.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use pagenet_core::cascade;
use pagenet_core::model::{
    normalize_name, Activation, Call, CallSign, News, NewsList, Node, NodeStatus, Rubric,
    Transmitter, TransmitterGroup, User,
};
use pagenet_core::repository::Repository;
use pagenet_core::validate::Validate;
use pagenet_core::SharedRepository;
use pagenet_persistence::StateStore;

use crate::command::{Command, CommandResponse};
use crate::membership::{refresh_quorum, Quorum};

/// Side effects toward external collaborators (the transmission/device
/// layer). Default implementations do nothing, so collaborators
/// override only the events they care about.
pub trait EventHooks: Send + Sync {
    /// A call was posted and should be transmitted.
    fn call_posted(&self, _call: &Call) {}

    /// A news item entered a rubric's slot ring.
    fn news_posted(&self, _news: &News) {}

    /// An activation should be transmitted.
    fn activation_posted(&self, _activation: &Activation) {}

    /// A rubric was created or replaced.
    fn rubric_changed(&self, _rubric: &Rubric) {}

    /// The local node now manages this transmitter: connect the device.
    fn transmitter_assigned(&self, _transmitter: &Transmitter) {}

    /// The local node no longer manages this transmitter: disconnect
    /// the device.
    fn transmitter_released(&self, _transmitter: &Transmitter) {}

    /// Push all rubric labels to a locally managed transmitter.
    fn rubric_names_requested(&self, _transmitter: &Transmitter, _rubrics: &[Rubric]) {}
}

/// Hooks that ignore every event.
pub struct NoHooks;

impl EventHooks for NoHooks {}

/// Executes one named write operation against the local repository.
pub struct CommandApplier {
    repository: SharedRepository,
    quorum: Arc<Quorum>,
    local_node: String,
    hooks: Arc<dyn EventHooks>,
    store: Option<StateStore>,
}

impl CommandApplier {
    pub fn new(
        repository: SharedRepository,
        quorum: Arc<Quorum>,
        local_node: impl Into<String>,
        hooks: Arc<dyn EventHooks>,
        store: Option<StateStore>,
    ) -> Self {
        Self {
            repository,
            quorum,
            local_node: local_node.into(),
            hooks,
            store,
        }
    }

    pub fn repository(&self) -> &SharedRepository {
        &self.repository
    }

    /// Applies a command and returns the local outcome.
    ///
    /// The quorum check is a pre-check, not a guarantee — quorum can be
    /// lost between this check and the mutation. Peers make the same
    /// check independently.
    pub fn apply(&self, command: &Command) -> CommandResponse {
        let response = if command.quorum_sensitive() && !self.quorum.holds() {
            CommandResponse::NoQuorum
        } else {
            self.execute(command)
        };

        match response {
            CommandResponse::Ok => info!(op = command.name(), "{response}"),
            CommandResponse::InternalError => error!(op = command.name(), "{response}"),
            _ => warn!(op = command.name(), "{response}"),
        }
        response
    }

    fn execute(&self, command: &Command) -> CommandResponse {
        match command {
            Command::PutNode(node) => self.put_node(node),
            Command::DeleteNode(name) => self.delete_node(name),
            Command::PutUser(user) => self.put_user(user),
            Command::DeleteUser(name) => self.delete_user(name),
            Command::PutCallSign(call_sign) => self.put_call_sign(call_sign),
            Command::DeleteCallSign(name) => self.delete_call_sign(name),
            Command::PutTransmitter(transmitter) => self.put_transmitter(transmitter),
            Command::DeleteTransmitter(name) => self.delete_transmitter(name),
            Command::UpdateTransmitterStatus(updated) => self.update_transmitter_status(updated),
            Command::PutTransmitterGroup(group) => self.put_transmitter_group(group),
            Command::DeleteTransmitterGroup(name) => self.delete_transmitter_group(name),
            Command::PutRubric(rubric) => self.put_rubric(rubric),
            Command::DeleteRubric(name) => self.delete_rubric(name),
            Command::PostCall(call) => self.post_call(call),
            Command::PostNews(news) => self.post_news(news),
            Command::PostActivation(activation) => self.post_activation(activation),
            Command::UpdateNodeStatus { node_name, status } => {
                self.update_node_status(node_name, *status)
            }
            Command::SendRubricNames(name) => self.send_rubric_names(name),
        }
    }

    // -- helpers --

    fn is_local(&self, node_name: &str) -> bool {
        normalize_name(node_name) == normalize_name(&self.local_node)
    }

    /// Persists per the configured policy. A persistence failure after
    /// a committed mutation is an internal error: the caller must treat
    /// this replica's durable state as possibly behind its memory.
    fn persisted(&self, repo: &Repository) -> CommandResponse {
        let Some(store) = &self.store else {
            return CommandResponse::Ok;
        };
        match store.save_if_immediate(repo) {
            Ok(()) => CommandResponse::Ok,
            Err(e) => {
                error!("failed to persist state after mutation: {e}");
                CommandResponse::InternalError
            }
        }
    }

    /// Fires device-disconnect hooks for cascade-removed transmitters
    /// that the local node manages. Call after releasing the lock.
    fn release_local_transmitters(&self, removed: &[Transmitter]) {
        for transmitter in removed {
            if self.is_local(&transmitter.node_name) {
                self.hooks.transmitter_released(transmitter);
            }
        }
    }

    fn check_name(name: &str) -> Result<(), CommandResponse> {
        if name.trim().is_empty() {
            return Err(CommandResponse::BadRequest);
        }
        Ok(())
    }

    // -- node --

    fn put_node(&self, node: &Node) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = node.validate(&repo) {
            warn!("putNode rejected: {e}");
            return CommandResponse::ValidationError;
        }
        repo.put_node(node.clone());
        refresh_quorum(&repo, &self.quorum);
        self.persisted(&repo)
    }

    fn delete_node(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let mut repo = self.repository.write();
        let Some((_, report)) = cascade::delete_node(&mut repo, name) else {
            return CommandResponse::BadRequest;
        };
        refresh_quorum(&repo, &self.quorum);
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            self.release_local_transmitters(&report.transmitters);
        }
        response
    }

    fn update_node_status(&self, node_name: &str, status: NodeStatus) -> CommandResponse {
        if let Err(response) = Self::check_name(node_name) {
            return response;
        }
        let mut repo = self.repository.write();
        let Some(node) = repo.node_mut(node_name) else {
            return CommandResponse::BadRequest;
        };
        let old = node.status;
        node.status = status;
        if old != status {
            info!("node '{node_name}' changed status from {old} to {status}");
        }
        refresh_quorum(&repo, &self.quorum);
        self.persisted(&repo)
    }

    // -- user --

    fn put_user(&self, user: &User) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = user.validate(&repo) {
            warn!("putUser rejected: {e}");
            return CommandResponse::ValidationError;
        }
        repo.put_user(user.clone());
        self.persisted(&repo)
    }

    fn delete_user(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let mut repo = self.repository.write();
        let Some((_, report)) = cascade::delete_user(&mut repo, name) else {
            return CommandResponse::BadRequest;
        };
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            self.release_local_transmitters(&report.transmitters);
        }
        response
    }

    // -- call sign --

    fn put_call_sign(&self, call_sign: &CallSign) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = call_sign.validate(&repo) {
            warn!("putCallSign rejected: {e}");
            return CommandResponse::ValidationError;
        }
        repo.put_call_sign(call_sign.clone());
        self.persisted(&repo)
    }

    fn delete_call_sign(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let mut repo = self.repository.write();
        if cascade::delete_call_sign(&mut repo, name).is_none() {
            return CommandResponse::BadRequest;
        }
        self.persisted(&repo)
    }

    // -- transmitter --

    fn put_transmitter(&self, transmitter: &Transmitter) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = transmitter.validate(&repo) {
            warn!("putTransmitter rejected: {e}");
            return CommandResponse::ValidationError;
        }
        let old = repo.put_transmitter(transmitter.clone());
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            // a replaced device may have moved away from this node
            if let Some(old) = old {
                if self.is_local(&old.node_name) {
                    self.hooks.transmitter_released(&old);
                }
            }
            if self.is_local(&transmitter.node_name) {
                self.hooks.transmitter_assigned(transmitter);
            }
        }
        response
    }

    fn delete_transmitter(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let mut repo = self.repository.write();
        let Some((transmitter, report)) = cascade::delete_transmitter(&mut repo, name) else {
            return CommandResponse::BadRequest;
        };
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            if self.is_local(&transmitter.node_name) {
                self.hooks.transmitter_released(&transmitter);
            }
            self.release_local_transmitters(&report.transmitters);
        }
        response
    }

    /// Device-reported fields only; everything else on the transmitter
    /// record stays as configured.
    fn update_transmitter_status(&self, updated: &Transmitter) -> CommandResponse {
        let mut repo = self.repository.write();
        let Some(existing) = repo.transmitter_mut(&updated.name) else {
            return CommandResponse::BadRequest;
        };
        existing.status = updated.status;
        existing.address = updated.address;
        existing.device_type = updated.device_type.clone();
        existing.device_version = updated.device_version.clone();
        self.persisted(&repo)
    }

    // -- transmitter group --

    fn put_transmitter_group(&self, group: &TransmitterGroup) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = group.validate(&repo) {
            warn!("putTransmitterGroup rejected: {e}");
            return CommandResponse::ValidationError;
        }
        repo.put_transmitter_group(group.clone());
        self.persisted(&repo)
    }

    fn delete_transmitter_group(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let mut repo = self.repository.write();
        if cascade::delete_transmitter_group(&mut repo, name).is_none() {
            return CommandResponse::BadRequest;
        }
        self.persisted(&repo)
    }

    // -- rubric --

    fn put_rubric(&self, rubric: &Rubric) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = rubric.validate(&repo) {
            warn!("putRubric rejected: {e}");
            return CommandResponse::ValidationError;
        }
        let key = normalize_name(&rubric.name);
        repo.put_rubric(rubric.clone());
        // the rubric's news list is created alongside it, kept on replace
        repo.news.entry(key).or_insert_with(NewsList::new);
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            self.hooks.rubric_changed(rubric);
        }
        response
    }

    fn delete_rubric(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let mut repo = self.repository.write();
        if cascade::delete_rubric(&mut repo, name).is_none() {
            return CommandResponse::BadRequest;
        }
        self.persisted(&repo)
    }

    // -- messages --

    fn post_call(&self, call: &Call) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = call.validate(&repo) {
            warn!("postCall rejected: {e}");
            return CommandResponse::ValidationError;
        }
        repo.calls.push(call.clone());
        repo.statistics.calls += 1;
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            self.hooks.call_posted(call);
        }
        response
    }

    fn post_news(&self, news: &News) -> CommandResponse {
        let mut repo = self.repository.write();
        if let Err(e) = news.validate(&repo) {
            warn!("postNews rejected: {e}");
            return CommandResponse::ValidationError;
        }
        let Some(list) = repo.news_list_mut(&news.rubric_name) else {
            // no rubric, no slot ring to post into
            return CommandResponse::BadRequest;
        };
        list.add(news.clone());
        repo.statistics.news += 1;
        let response = self.persisted(&repo);
        drop(repo);

        if response.is_ok() {
            self.hooks.news_posted(news);
        }
        response
    }

    fn post_activation(&self, activation: &Activation) -> CommandResponse {
        let repo = self.repository.read();
        if let Err(e) = activation.validate(&repo) {
            warn!("postActivation rejected: {e}");
            return CommandResponse::ValidationError;
        }
        drop(repo);

        self.hooks.activation_posted(activation);
        CommandResponse::Ok
    }

    /// Pure lookup under the read lock; only the node owning the device
    /// acts, every other member answers OK without side effects.
    fn send_rubric_names(&self, name: &str) -> CommandResponse {
        if let Err(response) = Self::check_name(name) {
            return response;
        }
        let repo = self.repository.read();
        let Some(transmitter) = repo.transmitter(name) else {
            return CommandResponse::BadRequest;
        };
        if !self.is_local(&transmitter.node_name) {
            return CommandResponse::Ok;
        }
        let transmitter = transmitter.clone();

        let tx_key = normalize_name(name);
        let group_keys: BTreeSet<String> = repo
            .transmitter_groups
            .iter()
            .filter(|(_, g)| {
                g.transmitter_names
                    .iter()
                    .any(|t| normalize_name(t) == tx_key)
            })
            .map(|(key, _)| key.clone())
            .collect();
        let rubrics: Vec<Rubric> = repo
            .rubrics
            .values()
            .filter(|r| {
                r.transmitter_group_names
                    .iter()
                    .any(|g| group_keys.contains(&normalize_name(g)))
            })
            .cloned()
            .collect();
        drop(repo);

        self.hooks.rubric_names_requested(&transmitter, &rubrics);
        CommandResponse::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use pagenet_core::test_fixtures as fx;

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    impl RecordingHooks {
        fn recorded(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl EventHooks for RecordingHooks {
        fn call_posted(&self, call: &Call) {
            self.record(format!("call:{}", call.text));
        }
        fn news_posted(&self, news: &News) {
            self.record(format!("news:{}", news.text));
        }
        fn activation_posted(&self, activation: &Activation) {
            self.record(format!("activation:{}", activation.number));
        }
        fn rubric_changed(&self, rubric: &Rubric) {
            self.record(format!("rubric:{}", rubric.name));
        }
        fn transmitter_assigned(&self, transmitter: &Transmitter) {
            self.record(format!("assigned:{}", transmitter.name));
        }
        fn transmitter_released(&self, transmitter: &Transmitter) {
            self.record(format!("released:{}", transmitter.name));
        }
        fn rubric_names_requested(&self, transmitter: &Transmitter, rubrics: &[Rubric]) {
            self.record(format!("rubric-names:{}:{}", transmitter.name, rubrics.len()));
        }
    }

    struct Fixture {
        applier: CommandApplier,
        hooks: Arc<RecordingHooks>,
        quorum: Arc<Quorum>,
    }

    /// Applier for node "aachen" over a repository that already holds
    /// the admin user and both cluster nodes.
    fn fixture() -> Fixture {
        let mut repo = Repository::new();
        repo.put_user(fx::user("admin", true));
        repo.put_node(fx::node("aachen"));
        repo.put_node(fx::node("berlin"));

        let hooks = Arc::new(RecordingHooks::default());
        let quorum = Arc::new(Quorum::new());
        let applier = CommandApplier::new(
            SharedRepository::new(repo),
            Arc::clone(&quorum),
            "aachen",
            Arc::clone(&hooks) as Arc<dyn EventHooks>,
            None,
        );
        Fixture {
            applier,
            hooks,
            quorum,
        }
    }

    #[test]
    fn quorum_gate_rejects_before_any_mutation() {
        let fx_ = fixture();
        fx_.quorum.set(false);

        let response = fx_.applier.apply(&Command::PutUser(fx::user("carol", false)));
        assert_eq!(response, CommandResponse::NoQuorum);
        assert!(fx_.applier.repository().read().user("carol").is_none());

        // posting stays available without quorum
        fx_.quorum.set(true);
        fx_.applier
            .apply(&Command::PutCallSign(fx::call_sign("dl1abc", "admin")));
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        fx_.applier
            .apply(&Command::PutTransmitterGroup(fx::transmitter_group(
                "west",
                &["tx-west"],
                "admin",
            )));
        fx_.quorum.set(false);
        let response = fx_
            .applier
            .apply(&Command::PostCall(fx::call(&["dl1abc"], &["west"], "admin")));
        assert_eq!(response, CommandResponse::Ok);
    }

    #[test]
    fn validation_failure_leaves_repository_unchanged() {
        let fx_ = fixture();
        let response = fx_
            .applier
            .apply(&Command::PutCallSign(fx::call_sign("dl1abc", "ghost")));
        assert_eq!(response, CommandResponse::ValidationError);
        assert!(fx_.applier.repository().read().call_sign("dl1abc").is_none());
    }

    #[test]
    fn empty_and_unknown_delete_names_are_bad_requests() {
        let fx_ = fixture();
        assert_eq!(
            fx_.applier.apply(&Command::DeleteUser("  ".into())),
            CommandResponse::BadRequest
        );
        assert_eq!(
            fx_.applier.apply(&Command::DeleteUser("nobody".into())),
            CommandResponse::BadRequest
        );
        assert_eq!(
            fx_.applier.apply(&Command::DeleteTransmitter("none".into())),
            CommandResponse::BadRequest
        );
    }

    #[test]
    fn put_transmitter_connects_local_devices_only() {
        let fx_ = fixture();
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-east", "berlin",
        )));

        assert_eq!(fx_.hooks.recorded(), ["assigned:tx-west"]);
    }

    #[test]
    fn replacing_a_transmitter_releases_the_old_local_device() {
        let fx_ = fixture();
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        // the device moves to berlin: aachen must disconnect it
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "berlin",
        )));

        assert_eq!(
            fx_.hooks.recorded(),
            ["assigned:tx-west", "released:tx-west"]
        );
    }

    #[test]
    fn delete_transmitter_cascades_and_disconnects() {
        let fx_ = fixture();
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        fx_.applier
            .apply(&Command::PutTransmitterGroup(fx::transmitter_group(
                "west",
                &["tx-west"],
                "admin",
            )));

        let response = fx_
            .applier
            .apply(&Command::DeleteTransmitter("tx-west".into()));
        assert_eq!(response, CommandResponse::Ok);

        let repo = fx_.applier.repository().read();
        assert!(repo.transmitter("tx-west").is_none());
        assert!(repo.transmitter_group("west").is_none());
        drop(repo);
        assert!(fx_
            .hooks
            .recorded()
            .contains(&"released:tx-west".to_string()));
    }

    #[test]
    fn put_rubric_creates_its_news_list() {
        let fx_ = fixture();
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        fx_.applier
            .apply(&Command::PutTransmitterGroup(fx::transmitter_group(
                "west",
                &["tx-west"],
                "admin",
            )));
        let response = fx_
            .applier
            .apply(&Command::PutRubric(fx::rubric("dx-news", 1, &["west"], "admin")));
        assert_eq!(response, CommandResponse::Ok);
        assert!(fx_.applier.repository().read().news_list("dx-news").is_some());
    }

    #[test]
    fn post_news_without_rubric_is_a_bad_request() {
        let fx_ = fixture();
        let response = fx_
            .applier
            .apply(&Command::PostNews(fx::news("dx-news", "hello", "admin")));
        assert_eq!(response, CommandResponse::BadRequest);
    }

    #[test]
    fn posting_increments_statistics() {
        let fx_ = fixture();
        fx_.applier
            .apply(&Command::PutCallSign(fx::call_sign("dl1abc", "admin")));
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        fx_.applier
            .apply(&Command::PutTransmitterGroup(fx::transmitter_group(
                "west",
                &["tx-west"],
                "admin",
            )));
        fx_.applier
            .apply(&Command::PutRubric(fx::rubric("dx-news", 1, &["west"], "admin")));

        fx_.applier
            .apply(&Command::PostCall(fx::call(&["dl1abc"], &["west"], "admin")));
        fx_.applier
            .apply(&Command::PostNews(fx::news("dx-news", "hello", "admin")));
        fx_.applier
            .apply(&Command::PostActivation(fx::activation(1234, &["west"])));

        let repo = fx_.applier.repository().read();
        assert_eq!(repo.statistics.calls, 1);
        assert_eq!(repo.statistics.news, 1);
        assert_eq!(repo.calls.len(), 1);
        drop(repo);

        let recorded = fx_.hooks.recorded();
        assert!(recorded.contains(&"call:cq cq".to_string()));
        assert!(recorded.contains(&"news:hello".to_string()));
        assert!(recorded.contains(&"activation:1234".to_string()));
    }

    #[test]
    fn update_transmitter_status_syncs_device_fields_only() {
        let fx_ = fixture();
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));

        let mut reported = fx::transmitter("tx-west", "aachen");
        reported.status = pagenet_core::TransmitterStatus::Online;
        reported.device_type = Some("skyper-tx".into());
        reported.power = 500.0; // device cannot change configured power

        let response = fx_
            .applier
            .apply(&Command::UpdateTransmitterStatus(reported));
        assert_eq!(response, CommandResponse::Ok);

        let repo = fx_.applier.repository().read();
        let t = repo.transmitter("tx-west").unwrap();
        assert_eq!(t.status, pagenet_core::TransmitterStatus::Online);
        assert_eq!(t.device_type.as_deref(), Some("skyper-tx"));
        assert_eq!(t.power, 10.0);
    }

    #[test]
    fn update_node_status_recomputes_quorum() {
        let fx_ = fixture();
        assert!(fx_.quorum.holds());

        // 1 of 2 online is not a strict majority
        let response = fx_.applier.apply(&Command::UpdateNodeStatus {
            node_name: "berlin".into(),
            status: NodeStatus::Unknown,
        });
        assert_eq!(response, CommandResponse::Ok);
        assert!(!fx_.quorum.holds());

        // suspending it shrinks the active population back to 1: 1 of 1
        fx_.applier.apply(&Command::UpdateNodeStatus {
            node_name: "berlin".into(),
            status: NodeStatus::Suspended,
        });
        assert!(fx_.quorum.holds());
    }

    #[test]
    fn send_rubric_names_only_acts_on_the_owning_node() {
        let fx_ = fixture();
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-west", "aachen",
        )));
        fx_.applier.apply(&Command::PutTransmitter(fx::transmitter(
            "tx-east", "berlin",
        )));
        fx_.applier
            .apply(&Command::PutTransmitterGroup(fx::transmitter_group(
                "west",
                &["tx-west"],
                "admin",
            )));
        fx_.applier
            .apply(&Command::PutRubric(fx::rubric("dx-news", 1, &["west"], "admin")));

        assert_eq!(
            fx_.applier
                .apply(&Command::SendRubricNames("tx-east".into())),
            CommandResponse::Ok
        );
        assert_eq!(
            fx_.applier
                .apply(&Command::SendRubricNames("tx-west".into())),
            CommandResponse::Ok
        );
        assert_eq!(
            fx_.applier.apply(&Command::SendRubricNames("none".into())),
            CommandResponse::BadRequest
        );

        let recorded = fx_.hooks.recorded();
        let pushes: Vec<_> = recorded
            .iter()
            .filter(|e| e.starts_with("rubric-names:"))
            .collect();
        assert_eq!(pushes, ["rubric-names:tx-west:1"]);
    }
}
