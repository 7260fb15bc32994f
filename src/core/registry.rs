// src/core/registry.rs

//! # Entity Registry
//!
//! A plain keyed store of named entities (layers), plus the ID-collision policy that
//! commands apply *before* touching the store. Keeping the policy outside the store makes
//! it reusable by every command that creates an entity.

use crate::core::status::{CommandStatus, Phase, Severity};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Keyed collection where each ID maps to at most one entity.
#[derive(Debug, Clone)]
pub struct EntityRegistry<E> {
    entries: BTreeMap<String, E>,
}

impl<E> Default for EntityRegistry<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<E> EntityRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.entries.get(id)
    }

    /// Installs `entity` under `id` unconditionally, returning any entity it displaced.
    /// Collision policy is the caller's business; see [`put_with_policy`].
    pub fn put(&mut self, id: impl Into<String>, entity: E) -> Option<E> {
        self.entries.insert(id.into(), entity)
    }

    /// Removes and returns the entity, if any.
    pub fn free(&mut self, id: &str) -> Option<E> {
        self.entries.remove(id)
    }

    /// IDs in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What to do when a new entity's ID is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdCollisionPolicy {
    /// Discard the old entity silently.
    #[default]
    Replace,
    /// Discard the old entity and log a WARNING.
    ReplaceAndWarn,
    /// Keep the old entity and log a WARNING.
    Warn,
    /// Keep the old entity and log a FAILURE.
    Fail,
}

impl IdCollisionPolicy {
    /// Accepted spellings of the `IfIDExists` parameter.
    pub const CHOICES: &'static [&'static str] = &["Replace", "ReplaceAndWarn", "Warn", "Fail"];

    /// Whether the new entity gets installed, and the severity to log if any.
    /// Only meaningful when the ID is already present.
    pub fn on_collision(self) -> (bool, Option<Severity>) {
        match self {
            Self::Replace => (true, None),
            Self::ReplaceAndWarn => (true, Some(Severity::Warning)),
            Self::Warn => (false, Some(Severity::Warning)),
            Self::Fail => (false, Some(Severity::Failure)),
        }
    }
}

impl fmt::Display for IdCollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Replace => "Replace",
            Self::ReplaceAndWarn => "ReplaceAndWarn",
            Self::Warn => "Warn",
            Self::Fail => "Fail",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not an ID-collision policy (expected Replace, ReplaceAndWarn, Warn or Fail).")]
pub struct UnknownPolicy(pub String);

impl FromStr for IdCollisionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::CHOICES
            .iter()
            .zip([Self::Replace, Self::ReplaceAndWarn, Self::Warn, Self::Fail])
            .find(|(label, _)| label.eq_ignore_ascii_case(s.trim()))
            .map(|(_, policy)| policy)
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

/// Installs `entity` under `id`, applying `policy` when the ID is taken and logging the
/// outcome into `status` for `phase`. Returns `true` if the entity was installed.
pub fn put_with_policy<E>(
    registry: &mut EntityRegistry<E>,
    id: &str,
    entity: E,
    policy: IdCollisionPolicy,
    status: &mut CommandStatus,
    phase: Phase,
) -> bool {
    if !registry.exists(id) {
        registry.put(id, entity);
        return true;
    }

    let (install, severity) = policy.on_collision();
    if let Some(severity) = severity {
        let (message, recommendation) = if install {
            (
                format!("Layer ID '{}' already exists and was replaced.", id),
                "Use a different ID or IfIDExists=Replace to silence this warning.",
            )
        } else {
            (
                format!("Layer ID '{}' already exists; the new layer was not kept.", id),
                "Use a different ID or set IfIDExists=Replace.",
            )
        };
        log::debug!("ID collision on '{}' under policy {}", id, policy);
        status.add_record(phase, severity, message, recommendation);
    }

    if install {
        registry.put(id, entity);
    }
    install
}
