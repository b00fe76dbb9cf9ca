//! Cascading deletes over the entity reference graph.
//!
//! Deleting an entity must never leave a dangling name reference at any
//! point a reader can observe, so every delete walks the graph of
//! dependents in a fixed order: an entity whose owner or member set
//! would become empty is deleted recursively, otherwise the reference is
//! removed from the set. Callers hold the repository write lock for the
//! whole walk — partial cascade states are invisible to readers.
//!
//! The walk order per entity:
//!
//! - user      → call signs, calls, news, rubrics, groups, transmitters
//! - transmitter → transmitter groups (→ rubrics, calls)
//! - group     → rubrics (→ news lists), calls
//! - rubric    → its news list
//! - call sign → calls
//! - node      → its transmitters, in full (a transmitter belongs to
//!   exactly one node, so there is no reference-shrink case)

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{normalize_name, CallSign, Node, Rubric, Transmitter, TransmitterGroup, User};
use crate::repository::Repository;

/// Everything a cascade removed besides the entity it was asked to
/// delete. The command applier uses `transmitters` to disconnect
/// devices owned by the local node.
#[derive(Debug, Default, PartialEq)]
pub struct CascadeReport {
    pub call_signs: Vec<String>,
    pub transmitter_groups: Vec<String>,
    pub rubrics: Vec<String>,
    pub transmitters: Vec<Transmitter>,
    pub calls_removed: usize,
    pub news_removed: usize,
}

/// Deletes a user and every entity that would be left ownerless.
pub fn delete_user(repo: &mut Repository, name: &str) -> Option<(User, CascadeReport)> {
    let key = normalize_name(name);
    repo.users.contains_key(&key).then_some(())?;

    let mut report = CascadeReport::default();

    // call signs: delete when this user is the sole owner, else shrink
    for cs_name in shrink_sets(&mut repo.call_signs, &key, |cs| &mut cs.owner_names) {
        remove_call_sign(repo, &cs_name, &mut report);
    }

    // calls and news are single-owner: remove outright
    let before = repo.calls.len();
    repo.calls
        .retain(|call| normalize_name(&call.owner_name) != key);
    report.calls_removed += before - repo.calls.len();
    for list in repo.news.values_mut() {
        report.news_removed += list.remove_owned_by(&key);
    }

    for rubric_name in shrink_sets(&mut repo.rubrics, &key, |r| &mut r.owner_names) {
        remove_rubric(repo, &rubric_name, &mut report);
    }

    for group_name in shrink_sets(&mut repo.transmitter_groups, &key, |g| &mut g.owner_names) {
        remove_transmitter_group(repo, &group_name, &mut report);
    }

    for transmitter_name in shrink_sets(&mut repo.transmitters, &key, |t| &mut t.owner_names) {
        remove_transmitter(repo, &transmitter_name, &mut report);
    }

    let user = repo.users.remove(&key)?;
    Some((user, report))
}

/// Deletes a transmitter, cascading into groups that reference it.
pub fn delete_transmitter(
    repo: &mut Repository,
    name: &str,
) -> Option<(Transmitter, CascadeReport)> {
    let key = normalize_name(name);
    repo.transmitters.contains_key(&key).then_some(())?;

    let mut report = CascadeReport::default();
    cascade_transmitter_removal(repo, &key, &mut report);

    let transmitter = repo.transmitters.remove(&key)?;
    Some((transmitter, report))
}

/// Deletes a transmitter group, cascading into rubrics and calls.
pub fn delete_transmitter_group(
    repo: &mut Repository,
    name: &str,
) -> Option<(TransmitterGroup, CascadeReport)> {
    let key = normalize_name(name);
    repo.transmitter_groups.contains_key(&key).then_some(())?;

    let mut report = CascadeReport::default();
    cascade_group_removal(repo, &key, &mut report);

    let group = repo.transmitter_groups.remove(&key)?;
    Some((group, report))
}

/// Deletes a rubric together with its news list.
pub fn delete_rubric(repo: &mut Repository, name: &str) -> Option<(Rubric, CascadeReport)> {
    let key = normalize_name(name);
    let rubric = repo.rubrics.remove(&key)?;

    let mut report = CascadeReport::default();
    if let Some(list) = repo.news.remove(&key) {
        report.news_removed += list.len();
    }
    Some((rubric, report))
}

/// Deletes a call sign, cascading into calls that reference it.
pub fn delete_call_sign(repo: &mut Repository, name: &str) -> Option<(CallSign, CascadeReport)> {
    let key = normalize_name(name);
    repo.call_signs.contains_key(&key).then_some(())?;

    let mut report = CascadeReport::default();
    cascade_call_sign_removal(repo, &key, &mut report);

    let call_sign = repo.call_signs.remove(&key)?;
    Some((call_sign, report))
}

/// Deletes a node and every transmitter it owns.
pub fn delete_node(repo: &mut Repository, name: &str) -> Option<(Node, CascadeReport)> {
    let key = normalize_name(name);
    repo.nodes.contains_key(&key).then_some(())?;

    let mut report = CascadeReport::default();
    let owned: Vec<String> = repo
        .transmitters
        .values()
        .filter(|t| normalize_name(&t.node_name) == key)
        .map(|t| t.name.clone())
        .collect();
    for transmitter_name in owned {
        remove_transmitter(repo, &transmitter_name, &mut report);
    }

    let node = repo.nodes.remove(&key)?;
    Some((node, report))
}

// -- internal walk steps --
//
// The public entry points remove the root entity themselves; these
// helpers remove *dependents* by name and recurse further down.

fn remove_call_sign(repo: &mut Repository, name: &str, report: &mut CascadeReport) {
    let key = normalize_name(name);
    cascade_call_sign_removal(repo, &key, report);
    if repo.call_signs.remove(&key).is_some() {
        report.call_signs.push(key);
    }
}

fn remove_rubric(repo: &mut Repository, name: &str, report: &mut CascadeReport) {
    let key = normalize_name(name);
    if let Some(list) = repo.news.remove(&key) {
        report.news_removed += list.len();
    }
    if repo.rubrics.remove(&key).is_some() {
        report.rubrics.push(key);
    }
}

fn remove_transmitter_group(repo: &mut Repository, name: &str, report: &mut CascadeReport) {
    let key = normalize_name(name);
    cascade_group_removal(repo, &key, report);
    if repo.transmitter_groups.remove(&key).is_some() {
        report.transmitter_groups.push(key);
    }
}

fn remove_transmitter(repo: &mut Repository, name: &str, report: &mut CascadeReport) {
    let key = normalize_name(name);
    cascade_transmitter_removal(repo, &key, report);
    if let Some(transmitter) = repo.transmitters.remove(&key) {
        report.transmitters.push(transmitter);
    }
}

/// Removes `key` from every group's member set, deleting groups for
/// which it was the last member.
fn cascade_transmitter_removal(repo: &mut Repository, key: &str, report: &mut CascadeReport) {
    for group_name in shrink_sets(&mut repo.transmitter_groups, key, |g| {
        &mut g.transmitter_names
    }) {
        remove_transmitter_group(repo, &group_name, report);
    }
}

/// Removes `key` from rubrics and calls referencing the group.
fn cascade_group_removal(repo: &mut Repository, key: &str, report: &mut CascadeReport) {
    for rubric_name in shrink_sets(&mut repo.rubrics, key, |r| &mut r.transmitter_group_names) {
        remove_rubric(repo, &rubric_name, report);
    }

    report.calls_removed += shrink_calls(repo, key, |call| &mut call.transmitter_group_names);
}

/// Removes `key` from calls referencing the call sign.
fn cascade_call_sign_removal(repo: &mut Repository, key: &str, report: &mut CascadeReport) {
    report.calls_removed += shrink_calls(repo, key, |call| &mut call.call_sign_names);
}

/// The delete-or-shrink rule over one keyed collection: removes `key`
/// from each entity's name set and returns the keys of entities whose
/// set only held `key` — those must be deleted by the caller.
fn shrink_sets<V>(
    map: &mut BTreeMap<String, V>,
    key: &str,
    set_of: impl Fn(&mut V) -> &mut BTreeSet<String>,
) -> Vec<String> {
    let mut doomed = Vec::new();
    for (entity_key, value) in map.iter_mut() {
        let set = set_of(value);
        let Some(member) = set.iter().find(|m| normalize_name(m) == key).cloned() else {
            continue;
        };
        if set.len() == 1 {
            doomed.push(entity_key.clone());
        } else {
            set.remove(&member);
        }
    }
    doomed
}

/// The delete-or-shrink rule over the call collection. Returns the
/// number of calls removed.
fn shrink_calls(
    repo: &mut Repository,
    key: &str,
    set_of: impl Fn(&mut crate::model::Call) -> &mut BTreeSet<String>,
) -> usize {
    let before = repo.calls.len();
    let mut kept = Vec::with_capacity(before);
    for mut call in std::mem::take(&mut repo.calls) {
        let set = set_of(&mut call);
        let member = set.iter().find(|m| normalize_name(m) == key).cloned();
        match member {
            // last reference: the call goes away with it
            Some(_) if set.len() == 1 => {}
            Some(member) => {
                set.remove(&member);
                kept.push(call);
            }
            None => kept.push(call),
        }
    }
    repo.calls = kept;
    before - repo.calls.len()
}
