//! Completion candidates keyed by command or `"<command> <subcommand>"` path.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct KeyEntry {
    /// Candidates in first-insertion order.
    candidates: Vec<Candidate>,
    /// Plugins that have added to this key.
    owners: BTreeSet<String>,
}

#[derive(Debug)]
struct Candidate {
    value: String,
    owners: BTreeSet<String>,
}

/// Prefix-keyed completion store used by the line editor.
#[derive(Debug, Default)]
pub struct AutocompleteIndex {
    keys: BTreeMap<String, KeyEntry>,
    commands: BTreeSet<String>,
}

impl AutocompleteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `items` into `key`. Existing candidates are not duplicated.
    pub fn add<I>(&mut self, owner: &str, key: &str, items: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self.keys.entry(key.to_string()).or_default();
        entry.owners.insert(owner.to_string());
        for item in items {
            match entry.candidates.iter_mut().find(|c| c.value == item) {
                Some(existing) => {
                    existing.owners.insert(owner.to_string());
                }
                None => entry.candidates.push(Candidate {
                    value: item,
                    owners: BTreeSet::from([owner.to_string()]),
                }),
            }
        }
    }

    /// Withdraw `owner`'s claim on the named candidates. A candidate goes once
    /// no plugin claims it. The key stays, possibly empty.
    pub fn remove(&mut self, owner: &str, key: &str, items: &[String]) {
        if let Some(entry) = self.keys.get_mut(key) {
            entry.candidates.retain_mut(|c| {
                if items.contains(&c.value) {
                    c.owners.remove(owner);
                }
                !c.owners.is_empty()
            });
        }
    }

    /// Withdraw every candidate `owner` added under `key`.
    pub fn clear(&mut self, owner: &str, key: &str) {
        if let Some(entry) = self.keys.get_mut(key) {
            entry.candidates.retain_mut(|c| {
                c.owners.remove(owner);
                !c.owners.is_empty()
            });
        }
    }

    /// Candidates for `key` in insertion order, or `None` if the key was never added.
    pub fn candidates(&self, key: &str) -> Option<Vec<String>> {
        self.keys
            .get(key)
            .map(|entry| entry.candidates.iter().map(|c| c.value.clone()).collect())
    }

    pub fn add_command(&mut self, name: &str) {
        self.commands.insert(name.to_string());
    }

    pub fn remove_command(&mut self, name: &str) {
        self.commands.remove(name);
    }

    /// Drop everything only `owner` contributed.
    pub fn remove_owner(&mut self, owner: &str) {
        self.keys.retain(|_, entry| {
            entry.candidates.retain_mut(|c| {
                c.owners.remove(owner);
                !c.owners.is_empty()
            });
            entry.owners.remove(owner);
            !entry.owners.is_empty()
        });
    }

    /// Complete a partially typed line.
    ///
    /// A lone `/prefix` completes against command names. Otherwise the longest
    /// key followed by a space that prefixes `input` supplies the candidates.
    pub fn complete(&self, input: &str) -> Vec<String> {
        if input.starts_with('/') && !input.contains(char::is_whitespace) {
            return self
                .commands
                .iter()
                .filter(|name| name.starts_with(input))
                .cloned()
                .collect();
        }

        let Some((key, entry)) = self
            .keys
            .iter()
            .filter(|(key, _)| {
                input.len() > key.len()
                    && input.starts_with(key.as_str())
                    && input[key.len()..].starts_with(' ')
            })
            .max_by_key(|(key, _)| key.len())
        else {
            return Vec::new();
        };

        let partial = input[key.len()..].trim_start();
        entry
            .candidates
            .iter()
            .filter(|c| c.value.starts_with(partial))
            .map(|c| format!("{key} {}", c.value))
            .collect()
    }
}
