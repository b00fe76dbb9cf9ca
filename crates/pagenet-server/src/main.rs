//! pagenet node process.
//!
//! Wires the state file, the repository, and the cluster manager
//! together, bootstraps a fresh cluster when this node is the sole
//! member, and drains cooperatively on ctrl-c.
//!
//! The group-communication transport is an external collaborator. This
//! binary runs the loopback transport — a view of one — which covers
//! standalone operation; a networked transport plugs into the same
//! `GroupTransport` contract without touching anything here.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use pagenet_cluster::{
    bootstrap_first_member, BootstrapConfig, ClusterManager, LoopbackTransport, NoHooks,
    TransportEvent,
};
use pagenet_core::SharedRepository;
use pagenet_persistence::{SavePolicy, StateStore};

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(name = "pagenet-server", about = "pagenet control-plane node")]
struct Args {
    /// path to TOML configuration file
    #[arg(short = 'c', long, env = "PAGENET_CONFIG")]
    config: Option<PathBuf>,

    /// print default configuration as TOML and exit
    #[arg(long)]
    config_template: bool,

    /// this node's cluster identity (3 to 20 characters)
    #[arg(long, env = "PAGENET_NODE_NAME")]
    node_name: Option<String>,

    /// geographic latitude of this node
    #[arg(long, env = "PAGENET_LATITUDE")]
    latitude: Option<f64>,

    /// geographic longitude of this node
    #[arg(long, env = "PAGENET_LONGITUDE")]
    longitude: Option<f64>,

    /// path of the persisted state document
    #[arg(long, env = "PAGENET_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// shared cluster secret
    #[arg(long, env = "PAGENET_CLUSTER_SECRET")]
    cluster_secret: Option<String>,

    /// path to a file containing the cluster secret (alternative to
    /// --cluster-secret). the file contents are trimmed of trailing
    /// whitespace
    #[arg(long, env = "PAGENET_CLUSTER_SECRET_FILE")]
    cluster_secret_file: Option<PathBuf>,

    /// broadcast response timeout in milliseconds
    #[arg(long, env = "PAGENET_RESPONSE_TIMEOUT_MS")]
    response_timeout_ms: Option<u64>,

    /// defer state-file writes to membership events and shutdown
    /// instead of saving after every mutation
    #[arg(long, env = "PAGENET_DEFERRED_SAVE")]
    deferred_save: bool,
}

/// Applies CLI overrides. Only `Some` values take effect, preserving
/// the resolution order defaults → TOML file → env vars → CLI flags.
fn apply_args(cfg: &mut ServerConfig, args: &Args) {
    if let Some(ref name) = args.node_name {
        cfg.node_name = name.clone();
    }
    if let Some(latitude) = args.latitude {
        cfg.latitude = latitude;
    }
    if let Some(longitude) = args.longitude {
        cfg.longitude = longitude;
    }
    if let Some(ref path) = args.state_file {
        cfg.state_file = path.to_string_lossy().into_owned();
    }
    if let Some(ref secret) = args.cluster_secret {
        cfg.cluster_secret = secret.clone();
    }
    if let Some(timeout) = args.response_timeout_ms {
        cfg.response_timeout_ms = timeout;
    }
    if args.deferred_save {
        cfg.save_policy = SavePolicy::Deferred;
    }
}

/// Prints `msg` to stderr and exits with code 1.
fn exit_err(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

/// Resolves the cluster secret from the config value or a secret file.
/// The two sources are mutually exclusive.
fn resolve_secret(cfg: &mut ServerConfig, args: &Args) {
    if !cfg.cluster_secret.is_empty() && args.cluster_secret_file.is_some() {
        exit_err("error: --cluster-secret and --cluster-secret-file are mutually exclusive");
    }
    if let Some(ref path) = args.cluster_secret_file {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let secret = contents.trim_end().to_string();
                if secret.is_empty() {
                    exit_err(format!(
                        "error: --cluster-secret-file is empty: {}",
                        path.display()
                    ));
                }
                cfg.cluster_secret = secret;
            }
            Err(e) => exit_err(format!(
                "error: failed to read --cluster-secret-file '{}': {e}",
                path.display()
            )),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagenet=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.config_template {
        match ServerConfig::default().to_toml() {
            Ok(toml) => {
                println!("{toml}");
                std::process::exit(0);
            }
            Err(e) => exit_err(format!("failed to generate config template: {e}")),
        }
    }

    let mut cfg = match args.config {
        Some(ref path) => match ServerConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => exit_err(format!("error: {e}")),
        },
        None => ServerConfig::default(),
    };
    apply_args(&mut cfg, &args);
    resolve_secret(&mut cfg, &args);
    if let Err(e) = cfg.validate() {
        exit_err(format!("error: {e}"));
    }

    let store = StateStore::new(&cfg.state_file, cfg.save_policy);
    let repository = match store.load() {
        Ok(repository) => repository,
        Err(e) => exit_err(format!("error: {e}")),
    };

    let node_name = cfg.node_name.clone();
    let manager = ClusterManager::connect(
        node_name.clone(),
        SharedRepository::new(repository),
        Arc::new(NoHooks),
        Some(store),
        Duration::from_millis(cfg.response_timeout_ms),
        |applier| Arc::new(LoopbackTransport::new(node_name, applier)),
    );

    // the loopback transport delivers its single-member view here, the
    // same way a networked transport would on its event thread
    let view = TransportEvent::ViewAccepted(vec![cfg.node_name.clone()]);
    if let Err(e) = manager.handle_transport_event(&view) {
        error!("fatal: {e}");
        std::process::exit(1);
    }

    if let Err(e) = manager.synchronize_initial_state() {
        error!("fatal: {e}");
        std::process::exit(1);
    }

    if manager.is_sole_member() {
        let bootstrap = BootstrapConfig {
            latitude: cfg.latitude,
            longitude: cfg.longitude,
            secret: cfg.cluster_secret.clone(),
        };
        if let Err(e) = bootstrap_first_member(&manager, &bootstrap) {
            error!("fatal: {e}");
            std::process::exit(1);
        }
    }

    info!(
        node = %cfg.node_name,
        cluster = %cfg.cluster_name,
        quorum = manager.is_quorum(),
        "node running, ctrl-c to stop"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }

    info!("shutting down");
    manager.stop();
}
