//! Dispatch registries for event-driven triggers.
//!
//! Rebuilt from scratch at every reload. A key may map to several
//! scenarios; registering the same scenario twice under one key is a no-op.

use std::collections::HashMap;
use std::hash::Hash;

use uuid::Uuid;

use flexauto_core::types::{BotCommand, KeyCombo};

#[derive(Debug)]
pub struct DispatchRegistry<K> {
    entries: HashMap<K, Vec<Uuid>>,
}

impl<K> Default for DispatchRegistry<K> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K: Eq + Hash> DispatchRegistry<K> {
    /// Returns false when the pair was already registered.
    pub fn register(&mut self, key: K, scenario_id: Uuid) -> bool {
        let ids = self.entries.entry(key).or_default();
        if ids.contains(&scenario_id) {
            return false;
        }
        ids.push(scenario_id);
        true
    }

    pub fn lookup(&self, key: &K) -> Vec<Uuid> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key combination → scenarios.
pub type HotkeyRegistry = DispatchRegistry<KeyCombo>;

/// Normalized command text → scenarios.
pub type CommandRegistry = DispatchRegistry<String>;

/// Keep the first entry for every command, preserving order.
pub fn dedupe_menu(entries: Vec<BotCommand>) -> Vec<BotCommand> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.command.clone()))
        .collect()
}
