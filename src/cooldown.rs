//! Per-server and per-user rate limits for handler invocations.
//!
//! `check` and `record` are separate steps around execution. Two
//! invocations that overlap between them can both pass; the store does
//! not reserve a slot at check time. Records are never pruned and live
//! for the whole process.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::definition::{CooldownSpec, HandlerDefinition, HandlerKind};

/// Who triggered an invocation, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationContext {
    pub user_id: u64,
    pub guild_id: Option<u64>,
}

impl InvocationContext {
    pub fn new(user_id: u64, guild_id: Option<u64>) -> Self {
        Self { user_id, guild_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    Ready,
    /// Time left on the most restrictive failing scope.
    Remaining(Duration),
}

impl CooldownStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CooldownStatus::Ready)
    }

    /// Human readable wait, rounded up to whole seconds.
    pub fn describe(&self) -> Option<String> {
        match self {
            CooldownStatus::Ready => None,
            CooldownStatus::Remaining(wait) => {
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                Some(humantime::format_duration(Duration::from_secs(secs)).to_string())
            }
        }
    }
}

/// Last invocation times of one handler.
#[derive(Debug, Default, Clone)]
pub struct CooldownRecord {
    pub servers: HashMap<u64, DateTime<Utc>>,
    pub users: HashMap<u64, DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct CooldownStore {
    records: Mutex<HashMap<HandlerKind, HashMap<String, CooldownRecord>>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, definition: &HandlerDefinition, invocation: &InvocationContext) -> CooldownStatus {
        self.check_at(definition, invocation, Utc::now())
    }

    pub fn check_at(
        &self,
        definition: &HandlerDefinition,
        invocation: &InvocationContext,
        now: DateTime<Utc>,
    ) -> CooldownStatus {
        let Some(spec) = active_spec(definition) else {
            return CooldownStatus::Ready;
        };

        let records = self.records.lock();
        let Some(record) = records
            .get(&definition.kind)
            .and_then(|by_name| by_name.get(&definition.name))
        else {
            return CooldownStatus::Ready;
        };

        let server_wait = match (spec.servers, invocation.guild_id) {
            (Some(window), Some(guild_id)) => record
                .servers
                .get(&guild_id)
                .and_then(|last| remaining(window, *last, now)),
            _ => None,
        };
        let user_wait = spec.users.and_then(|window| {
            record
                .users
                .get(&invocation.user_id)
                .and_then(|last| remaining(window, *last, now))
        });

        match server_wait.max(user_wait) {
            Some(wait) => CooldownStatus::Remaining(wait),
            None => CooldownStatus::Ready,
        }
    }

    /// Stamps the declared scopes after a successful execution.
    pub fn record(&self, definition: &HandlerDefinition, invocation: &InvocationContext) {
        self.record_at(definition, invocation, Utc::now())
    }

    pub fn record_at(
        &self,
        definition: &HandlerDefinition,
        invocation: &InvocationContext,
        now: DateTime<Utc>,
    ) {
        let Some(spec) = active_spec(definition) else {
            return;
        };

        let mut records = self.records.lock();
        let record = records
            .entry(definition.kind)
            .or_default()
            .entry(definition.name.clone())
            .or_default();

        if let (Some(_), Some(guild_id)) = (spec.servers, invocation.guild_id) {
            record.servers.insert(guild_id, now);
        }
        if spec.users.is_some() {
            record.users.insert(invocation.user_id, now);
        }
    }

    #[cfg(test)]
    pub(crate) fn record_for(&self, kind: HandlerKind, name: &str) -> Option<CooldownRecord> {
        self.records.lock().get(&kind)?.get(name).cloned()
    }
}

fn active_spec(definition: &HandlerDefinition) -> Option<CooldownSpec> {
    definition.cooldown.filter(|spec| !spec.is_empty())
}

fn remaining(window_secs: u64, last: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let window = i64::try_from(window_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    let elapsed = (now - last).max(TimeDelta::zero());
    if elapsed >= window {
        return None;
    }
    (window - elapsed).to_std().ok()
}
