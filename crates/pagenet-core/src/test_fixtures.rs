//! Entity constructors for tests.
//!
//! Shared by the unit tests in this crate and the integration tests of
//! downstream crates, so every test builds entities that pass structural
//! validation unless it deliberately breaks one field.

use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::auth::hash_password;
use crate::model::{
    Activation, AntennaType, Call, CallSign, News, Node, NodeStatus, Pager, Rubric, Transmitter,
    TransmitterGroup, TransmitterStatus, User,
};

pub fn owners(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

pub fn timestamp() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_717_243_200).expect("valid timestamp")
}

pub fn node(name: &str) -> Node {
    let mut node = Node::new(name, 50.78, 6.06);
    node.status = NodeStatus::Online;
    node.key = Some(hash_password("secret"));
    node
}

pub fn user(name: &str, admin: bool) -> User {
    User {
        name: name.into(),
        hash: hash_password("password"),
        mail: format!("{name}@example.org"),
        admin,
    }
}

pub fn call_sign(name: &str, owner: &str) -> CallSign {
    CallSign {
        name: name.into(),
        description: String::new(),
        numeric: false,
        pagers: vec![Pager {
            number: 1234,
            name: "skyper".into(),
            numeric: false,
        }],
        owner_names: owners(&[owner]),
    }
}

pub fn transmitter(name: &str, node_name: &str) -> Transmitter {
    Transmitter {
        name: name.into(),
        latitude: 50.78,
        longitude: 6.06,
        power: 10.0,
        node_name: node_name.into(),
        address: None,
        timeslot: "0123".into(),
        owner_names: owners(&["admin"]),
        device_type: None,
        device_version: None,
        status: TransmitterStatus::Offline,
        antenna_type: AntennaType::Omni,
        antenna_above_ground_level: 20,
        antenna_direction: 0,
        antenna_gain_dbi: 2.0,
    }
}

pub fn transmitter_group(name: &str, transmitters: &[&str], owner: &str) -> TransmitterGroup {
    TransmitterGroup {
        name: name.into(),
        description: String::new(),
        transmitter_names: owners(transmitters),
        owner_names: owners(&[owner]),
    }
}

pub fn rubric(name: &str, number: u8, groups: &[&str], owner: &str) -> Rubric {
    Rubric {
        name: name.into(),
        number,
        label: name.chars().take(11).collect(),
        transmitter_group_names: owners(groups),
        owner_names: owners(&[owner]),
    }
}

pub fn news(rubric_name: &str, text: &str, owner: &str) -> News {
    News {
        text: text.into(),
        rubric_name: rubric_name.into(),
        number: 0,
        timestamp: timestamp(),
        owner_name: owner.into(),
    }
}

pub fn call(call_signs: &[&str], groups: &[&str], owner: &str) -> Call {
    Call {
        text: "cq cq".into(),
        call_sign_names: owners(call_signs),
        transmitter_group_names: owners(groups),
        emergency: false,
        timestamp: timestamp(),
        owner_name: owner.into(),
    }
}

pub fn activation(number: u32, groups: &[&str]) -> Activation {
    Activation {
        number,
        transmitter_group_names: owners(groups),
        timestamp: timestamp(),
    }
}
