//! Everything plugins have registered with the host, keyed back to the owner.

use std::collections::BTreeMap;

use tracing::debug;

use plughost_types::{CommandSpec, HostError, TimerId, TimerSpec};

use crate::autocomplete::AutocompleteIndex;

/// A command and the plugin it routes to.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub owner: String,
    pub spec: CommandSpec,
}

/// A timer registration. Tick statistics live in the scheduler.
#[derive(Debug, Clone)]
pub struct TimerEntry {
    pub id: TimerId,
    pub owner: String,
    pub spec: TimerSpec,
}

/// What [`Registry::unregister_all`] removed.
#[derive(Debug, Default)]
pub struct Purged {
    pub commands: usize,
    pub timers: Vec<TimerId>,
    pub windows: usize,
    pub features: usize,
}

/// Command, timer, completion, window and feature registrations.
#[derive(Debug, Default)]
pub struct Registry {
    commands: BTreeMap<String, RegisteredCommand>,
    timers: Vec<TimerEntry>,
    windows: BTreeMap<String, String>,
    features: BTreeMap<String, Vec<String>>,
    completions: AutocompleteIndex,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ──────────────────── Commands ────────────────────

    /// Add `spec` under `owner`. Re-registering one's own command replaces it;
    /// taking another plugin's name fails and leaves the existing mapping alone.
    pub fn register_command(&mut self, owner: &str, spec: CommandSpec) -> Result<(), HostError> {
        spec.validate()?;
        if let Some(existing) = self.commands.get(&spec.name) {
            if existing.owner != owner {
                return Err(HostError::NameConflict {
                    command: spec.name,
                    owner: existing.owner.clone(),
                });
            }
        }

        self.completions.add_command(&spec.name);
        self.commands.insert(
            spec.name.clone(),
            RegisteredCommand {
                owner: owner.to_string(),
                spec,
            },
        );
        Ok(())
    }

    pub fn lookup_command(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.get(name)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    // ──────────────────── Timers ────────────────────

    pub fn register_timer(&mut self, entry: TimerEntry) {
        self.timers.push(entry);
    }

    /// Timers in registration order.
    pub fn list_timers(&self) -> &[TimerEntry] {
        &self.timers
    }

    // ──────────────────── Completions ────────────────────

    pub fn add_completions(&mut self, owner: &str, key: &str, items: Vec<String>) {
        self.completions.add(owner, key, items);
    }

    pub fn remove_completions(&mut self, owner: &str, key: &str, items: &[String]) {
        self.completions.remove(owner, key, items);
    }

    pub fn clear_completions(&mut self, owner: &str, key: &str) {
        self.completions.clear(owner, key);
    }

    pub fn lookup_completions(&self, key: &str) -> Option<Vec<String>> {
        self.completions.candidates(key)
    }

    pub fn completions(&self) -> &AutocompleteIndex {
        &self.completions
    }

    // ──────────────────── Windows ────────────────────

    /// Claim `tag` for `owner`. Succeeds if the tag is free or already theirs.
    pub fn claim_window(&mut self, owner: &str, tag: &str) -> bool {
        match self.windows.get(tag) {
            Some(current) => current == owner,
            None => {
                self.windows.insert(tag.to_string(), owner.to_string());
                true
            }
        }
    }

    pub fn window_owner(&self, tag: &str) -> Option<&str> {
        self.windows.get(tag).map(String::as_str)
    }

    // ──────────────────── Disco features ────────────────────

    pub fn add_feature(&mut self, owner: &str, feature: &str) {
        let features = self.features.entry(owner.to_string()).or_default();
        if !features.iter().any(|f| f == feature) {
            features.push(feature.to_string());
        }
    }

    /// Every advertised feature, deduplicated across plugins and sorted.
    pub fn features(&self) -> Vec<String> {
        let mut all: Vec<String> = self.features.values().flatten().cloned().collect();
        all.sort();
        all.dedup();
        all
    }

    // ──────────────────── Purge ────────────────────

    /// Remove every registration owned by `owner`.
    pub fn unregister_all(&mut self, owner: &str) -> Purged {
        let mut purged = Purged::default();

        let names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, c)| c.owner == owner)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.commands.remove(name);
            self.completions.remove_command(name);
        }
        purged.commands = names.len();

        self.timers.retain(|t| {
            if t.owner == owner {
                purged.timers.push(t.id);
                false
            } else {
                true
            }
        });

        let before = self.windows.len();
        self.windows.retain(|_, o| o != owner);
        purged.windows = before - self.windows.len();

        purged.features = self.features.remove(owner).map_or(0, |f| f.len());

        self.completions.remove_owner(owner);

        debug!(
            plugin = owner,
            commands = purged.commands,
            timers = purged.timers.len(),
            windows = purged.windows,
            features = purged.features,
            "Registrations purged"
        );
        purged
    }
}
