//! Structural and cross-reference validation.
//!
//! Two layers, applied together: per-field constraints (bounds, ranges,
//! non-empty collections) and repository-backed reference checks — a
//! name-set field is valid only if every name currently resolves in the
//! referenced collection. Callers must hold the repository lock they
//! will mutate under, so the checked state is the state the mutation
//! commits against.

use std::collections::{BTreeMap, BTreeSet};

use crate::auth;
use crate::model::{
    normalize_name, Activation, Call, CallSign, News, Node, Pager, Rubric, Transmitter,
    TransmitterGroup, User, PAGER_MAX_NUMBER,
};
use crate::repository::Repository;

/// A violated constraint. Names the offending field so callers can map
/// the failure to a client-visible message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Constraint { field: &'static str, reason: String },

    #[error("{field}: no {entity} named '{name}'")]
    UnknownReference {
        field: &'static str,
        entity: &'static str,
        name: String,
    },
}

impl ValidationError {
    fn constraint(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Constraint {
            field,
            reason: reason.into(),
        }
    }
}

/// Validation against the current repository state.
pub trait Validate {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError>;
}

// -- field helpers --

fn check_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let len = value.trim().len();
    if !(3..=20).contains(&len) {
        return Err(ValidationError::constraint(
            field,
            format!("name must be 3 to 20 characters, got {len}"),
        ));
    }
    Ok(())
}

fn check_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    if value.len() < min || value.len() > max {
        return Err(ValidationError::constraint(
            field,
            format!("length must be {min} to {max}, got {}", value.len()),
        ));
    }
    Ok(())
}

fn check_non_empty(field: &'static str, names: &BTreeSet<String>) -> Result<(), ValidationError> {
    if names.is_empty() {
        return Err(ValidationError::constraint(
            field,
            "must contain at least one name",
        ));
    }
    Ok(())
}

fn check_refs<T>(
    field: &'static str,
    entity: &'static str,
    names: &BTreeSet<String>,
    collection: &BTreeMap<String, T>,
) -> Result<(), ValidationError> {
    check_non_empty(field, names)?;
    for name in names {
        if !collection.contains_key(&normalize_name(name)) {
            return Err(ValidationError::UnknownReference {
                field,
                entity,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    field: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::constraint(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
    Ok(())
}

// -- entity impls --

impl Validate for Node {
    fn validate(&self, _repo: &Repository) -> Result<(), ValidationError> {
        check_name("node.name", &self.name)?;
        check_range("node.latitude", self.latitude, -90.0, 90.0)?;
        check_range("node.longitude", self.longitude, -180.0, 180.0)?;
        if let Some(key) = &self.key {
            if !auth::is_encoded_hash(key) {
                return Err(ValidationError::constraint(
                    "node.key",
                    "must be a salted hash, not a plaintext secret",
                ));
            }
        }
        Ok(())
    }
}

impl Validate for User {
    fn validate(&self, _repo: &Repository) -> Result<(), ValidationError> {
        check_name("user.name", &self.name)?;
        if !auth::is_encoded_hash(&self.hash) {
            return Err(ValidationError::constraint(
                "user.hash",
                format!("must be a {}-character salted hash", auth::HASH_LEN),
            ));
        }
        check_len("user.mail", &self.mail, 3, 64)?;
        if !self.mail.contains('@') {
            return Err(ValidationError::constraint(
                "user.mail",
                "not a mail address",
            ));
        }
        Ok(())
    }
}

impl Validate for Pager {
    fn validate(&self, _repo: &Repository) -> Result<(), ValidationError> {
        check_range("pager.number", self.number, 0, PAGER_MAX_NUMBER)?;
        check_name("pager.name", &self.name)
    }
}

impl Validate for CallSign {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError> {
        check_name("callSign.name", &self.name)?;
        check_len("callSign.description", &self.description, 0, 60)?;
        if self.pagers.is_empty() {
            return Err(ValidationError::constraint(
                "callSign.pagers",
                "must contain at least one pager",
            ));
        }
        for pager in &self.pagers {
            pager.validate(repo)?;
        }
        check_refs("callSign.ownerNames", "user", &self.owner_names, &repo.users)
    }
}

impl Validate for Transmitter {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError> {
        check_name("transmitter.name", &self.name)?;
        check_range("transmitter.latitude", self.latitude, -90.0, 90.0)?;
        check_range("transmitter.longitude", self.longitude, -180.0, 180.0)?;
        check_range("transmitter.power", self.power, 0.0, 200.0)?;
        if self.timeslot.is_empty() || !self.timeslot.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::constraint(
                "transmitter.timeslot",
                "must be a non-empty string of hex digits",
            ));
        }
        if repo.node(&self.node_name).is_none() {
            return Err(ValidationError::UnknownReference {
                field: "transmitter.nodeName",
                entity: "node",
                name: self.node_name.clone(),
            });
        }
        check_range(
            "transmitter.antennaAboveGroundLevel",
            self.antenna_above_ground_level,
            0,
            1000,
        )?;
        check_range("transmitter.antennaDirection", self.antenna_direction, 0, 359)?;
        check_range("transmitter.antennaGainDbi", self.antenna_gain_dbi, -50.0, 80.0)?;
        check_refs(
            "transmitter.ownerNames",
            "user",
            &self.owner_names,
            &repo.users,
        )
    }
}

impl Validate for TransmitterGroup {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError> {
        check_name("transmitterGroup.name", &self.name)?;
        check_len("transmitterGroup.description", &self.description, 0, 60)?;
        check_refs(
            "transmitterGroup.transmitterNames",
            "transmitter",
            &self.transmitter_names,
            &repo.transmitters,
        )?;
        check_refs(
            "transmitterGroup.ownerNames",
            "user",
            &self.owner_names,
            &repo.users,
        )
    }
}

impl Validate for Rubric {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError> {
        check_name("rubric.name", &self.name)?;
        check_range("rubric.number", self.number, 1, 95)?;
        check_len("rubric.label", &self.label, 1, 11)?;
        check_refs(
            "rubric.transmitterGroupNames",
            "transmitterGroup",
            &self.transmitter_group_names,
            &repo.transmitter_groups,
        )?;
        check_refs("rubric.ownerNames", "user", &self.owner_names, &repo.users)
    }
}

impl Validate for News {
    fn validate(&self, _repo: &Repository) -> Result<(), ValidationError> {
        check_len("news.text", &self.text, 1, 80)?;
        check_range("news.number", self.number, 0, 10)?;
        if self.rubric_name.trim().is_empty() {
            return Err(ValidationError::constraint(
                "news.rubricName",
                "must not be empty",
            ));
        }
        if self.owner_name.trim().is_empty() {
            return Err(ValidationError::constraint(
                "news.ownerName",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

impl Validate for Call {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError> {
        check_len("call.text", &self.text, 1, 80)?;
        check_refs(
            "call.callSignNames",
            "callSign",
            &self.call_sign_names,
            &repo.call_signs,
        )?;
        check_refs(
            "call.transmitterGroupNames",
            "transmitterGroup",
            &self.transmitter_group_names,
            &repo.transmitter_groups,
        )?;
        if repo.user(&self.owner_name).is_none() {
            return Err(ValidationError::UnknownReference {
                field: "call.ownerName",
                entity: "user",
                name: self.owner_name.clone(),
            });
        }
        Ok(())
    }
}

impl Validate for Activation {
    fn validate(&self, repo: &Repository) -> Result<(), ValidationError> {
        check_range("activation.number", self.number, 0, PAGER_MAX_NUMBER)?;
        check_refs(
            "activation.transmitterGroupNames",
            "transmitterGroup",
            &self.transmitter_group_names,
            &repo.transmitter_groups,
        )
    }
}

/// Re-validates every entity in the repository.
///
/// Used to vet a repository assembled from external bytes — a loaded
/// state file or a received state-transfer snapshot — before it is
/// allowed to serve reads.
pub fn validate_repository(repo: &Repository) -> Result<(), ValidationError> {
    for node in repo.nodes.values() {
        node.validate(repo)?;
    }
    for user in repo.users.values() {
        user.validate(repo)?;
    }
    for call_sign in repo.call_signs.values() {
        call_sign.validate(repo)?;
    }
    for transmitter in repo.transmitters.values() {
        transmitter.validate(repo)?;
    }
    for group in repo.transmitter_groups.values() {
        group.validate(repo)?;
    }
    for rubric in repo.rubrics.values() {
        rubric.validate(repo)?;
    }
    for call in repo.calls.iter() {
        call.validate(repo)?;
    }
    Ok(())
}
