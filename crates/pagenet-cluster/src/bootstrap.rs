//! First-member bootstrap.
//!
//! Runs exactly once, when a node connects and finds itself the sole
//! member of the group: the cluster is being created, not joined. The
//! node record and the default administrator are established as
//! replicated writes through the command applier — a one-member
//! broadcast, but the same validation path every later write takes.

use tracing::{info, warn};

use pagenet_core::auth::hash_password;
use pagenet_core::model::{Node, NodeStatus, User};

use crate::command::Command;
use crate::error::FatalClusterError;
use crate::manager::ClusterManager;

/// Name and password of the administrator account created on a fresh
/// cluster. Operators are expected to change the password first thing.
pub const DEFAULT_ADMIN_NAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";
const DEFAULT_ADMIN_MAIL: &str = "admin@pagenet.local";

/// Locally supplied parameters for the first node.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Plaintext shared cluster secret; stored only as a salted hash.
    pub secret: String,
}

/// Establishes the node identity and first administrator on a
/// single-member cluster. Every failure is fatal — the process must
/// not serve without a bootstrapped identity and an admin account.
pub fn bootstrap_first_member(
    manager: &ClusterManager,
    config: &BootstrapConfig,
) -> Result<(), FatalClusterError> {
    warn!("creating a new cluster: check the configuration and restart if you meant to join an existing one");

    let repository = manager.repository();
    let (node_exists, user_missing) = {
        let repo = repository.read();
        (
            repo.node(manager.local_name()).is_some(),
            repo.users.is_empty(),
        )
    };

    if user_missing {
        create_first_user(manager)?;
    }

    if node_exists {
        refresh_own_node(manager);
    } else {
        create_own_node(manager, config)?;
    }

    Ok(())
}

fn create_first_user(manager: &ClusterManager) -> Result<(), FatalClusterError> {
    info!("creating first user '{DEFAULT_ADMIN_NAME}'");
    let user = User {
        name: DEFAULT_ADMIN_NAME.to_string(),
        hash: hash_password(DEFAULT_ADMIN_PASSWORD),
        mail: DEFAULT_ADMIN_MAIL.to_string(),
        admin: true,
    };
    if !manager.broadcast_command(&Command::PutUser(user)) {
        return Err(FatalClusterError::Bootstrap { operation: "putUser" });
    }
    info!("first user created");
    Ok(())
}

fn create_own_node(
    manager: &ClusterManager,
    config: &BootstrapConfig,
) -> Result<(), FatalClusterError> {
    info!("creating first node '{}'", manager.local_name());
    let node = Node {
        name: manager.local_name().to_string(),
        address: None,
        latitude: config.latitude,
        longitude: config.longitude,
        status: NodeStatus::Online,
        key: Some(hash_password(&config.secret)),
    };
    if !manager.broadcast_command(&Command::PutNode(node)) {
        return Err(FatalClusterError::Bootstrap { operation: "putNode" });
    }
    info!("first node created");
    Ok(())
}

/// Rejoin after restart: the node record survived in the state file,
/// only its status is stale.
fn refresh_own_node(manager: &ClusterManager) {
    let repository = manager.repository();
    let mut repo = repository.write();
    if let Some(node) = repo.node_mut(manager.local_name()) {
        node.status = NodeStatus::Online;
        info!("node '{}' back online", node.name);
    }
}
