//! The replicated command catalogue.
//!
//! A closed enum of write operations with strongly typed payloads —
//! the wire form of "one broadcasted call, one deterministic local
//! handler". Every member that receives a command runs the exact same
//! match arm in the applier.

use serde::{Deserialize, Serialize};

use pagenet_core::model::{
    Activation, Call, CallSign, News, Node, NodeStatus, Rubric, Transmitter, TransmitterGroup,
    User,
};

/// One replicated write operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    PutNode(Node),
    DeleteNode(String),
    PutUser(User),
    DeleteUser(String),
    PutCallSign(CallSign),
    DeleteCallSign(String),
    PutTransmitter(Transmitter),
    DeleteTransmitter(String),
    /// Syncs device-reported fields onto an existing transmitter.
    UpdateTransmitterStatus(Transmitter),
    PutTransmitterGroup(TransmitterGroup),
    DeleteTransmitterGroup(String),
    PutRubric(Rubric),
    DeleteRubric(String),
    PostCall(Call),
    PostNews(News),
    PostActivation(Activation),
    /// Announces a node status change, e.g. the SUSPENDED broadcast
    /// during a graceful shutdown.
    UpdateNodeStatus { node_name: String, status: NodeStatus },
    /// Asks the node owning the named transmitter to push all rubric
    /// labels to it.
    SendRubricNames(String),
}

impl Command {
    /// Operation name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::PutNode(_) => "putNode",
            Command::DeleteNode(_) => "deleteNode",
            Command::PutUser(_) => "putUser",
            Command::DeleteUser(_) => "deleteUser",
            Command::PutCallSign(_) => "putCallSign",
            Command::DeleteCallSign(_) => "deleteCallSign",
            Command::PutTransmitter(_) => "putTransmitter",
            Command::DeleteTransmitter(_) => "deleteTransmitter",
            Command::UpdateTransmitterStatus(_) => "updateTransmitterStatus",
            Command::PutTransmitterGroup(_) => "putTransmitterGroup",
            Command::DeleteTransmitterGroup(_) => "deleteTransmitterGroup",
            Command::PutRubric(_) => "putRubric",
            Command::DeleteRubric(_) => "deleteRubric",
            Command::PostCall(_) => "postCall",
            Command::PostNews(_) => "postNews",
            Command::PostActivation(_) => "postActivation",
            Command::UpdateNodeStatus { .. } => "updateNodeStatus",
            Command::SendRubricNames(_) => "sendRubricNames",
        }
    }

    /// Whether the applier rejects this command while quorum is absent.
    ///
    /// Message posting and status synchronisation stay available on a
    /// minority side — they don't change the shared configuration, only
    /// append to it or mirror device state.
    pub fn quorum_sensitive(&self) -> bool {
        !matches!(
            self,
            Command::PostCall(_)
                | Command::PostNews(_)
                | Command::PostActivation(_)
                | Command::UpdateNodeStatus { .. }
                | Command::UpdateTransmitterStatus(_)
                | Command::SendRubricNames(_)
        )
    }
}

/// Per-member outcome of applying a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandResponse {
    Ok,
    /// Malformed or missing argument; nothing was changed.
    BadRequest,
    /// A structural or cross-reference constraint failed; nothing was
    /// changed.
    ValidationError,
    /// The quorum pre-check failed; nothing was changed.
    NoQuorum,
    /// An unexpected failure mid-mutation. The local replica's state is
    /// of uncertain consistency relative to its peers.
    InternalError,
}

impl CommandResponse {
    pub fn is_ok(self) -> bool {
        self == CommandResponse::Ok
    }
}

impl std::fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandResponse::Ok => write!(f, "OK"),
            CommandResponse::BadRequest => write!(f, "BAD_REQUEST"),
            CommandResponse::ValidationError => write!(f, "VALIDATION_ERROR"),
            CommandResponse::NoQuorum => write!(f, "NO_QUORUM"),
            CommandResponse::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}
