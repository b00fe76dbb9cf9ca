//! pagenet-core: the replicated configuration model.
//!
//! Owns the entity records, the repository aggregate with its single
//! reader-writer lock, cascading referential integrity, validation, and
//! secret hashing. No networking — the cluster layer drives every
//! mutation through this crate.

pub mod auth;
pub mod cascade;
pub mod model;
pub mod repository;
pub mod test_fixtures;
pub mod validate;

pub use cascade::CascadeReport;
pub use model::{
    normalize_name, Activation, AntennaType, Call, CallSign, CoreStatistics, News, NewsList, Node,
    NodeStatus, Pager, Rubric, Transmitter, TransmitterGroup, TransmitterStatus, User,
};
pub use repository::{Repository, SharedRepository};
pub use validate::{Validate, ValidationError};
