//! Mode set: ordered condition-to-value rules producing mode variables that
//! gate behavior activity.

/// Mode entries and their declaration text.
pub mod entry;

use indexmap::IndexMap;
use tracing::debug;

pub use entry::{ModeDeclaration, ModeEntry};

use crate::{
    error::HelmError,
    state::{StateStore, StateValue},
};

/// Ordered list of mode entries, evaluated once per cycle.
#[derive(Debug, Clone, Default)]
pub struct ModeSet {
    entries: Vec<ModeEntry>,
    results: IndexMap<String, String>,
}

impl ModeSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry; evaluation follows insertion order.
    pub fn add_entry(&mut self, entry: ModeEntry) {
        self.entries.push(entry);
    }

    /// Parses and appends a declaration block.
    pub fn add_declaration(&mut self, block: &str) -> Result<(), HelmError> {
        self.add_entry(ModeEntry::parse(block)?);
        Ok(())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of the variables referenced by every entry, for subscription.
    #[must_use]
    pub fn condition_vars(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.entries {
            for name in entry.condition_vars() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn bind_all(&mut self, name: &str, value: &StateValue) {
        for entry in &mut self.entries {
            entry.bind(name, value);
        }
    }

    /// Runs one pass over the entries and writes the results to the store.
    ///
    /// Every referenced variable is bound into every entry before any entry
    /// is read. A value produced by an entry is bound into all entries at
    /// once, so later entries in the same pass see it; earlier entries never
    /// see later output. When two entries write the same variable the later
    /// one wins.
    pub fn evaluate(&mut self, store: &mut dyn StateStore) -> &IndexMap<String, String> {
        self.results.clear();
        for entry in &mut self.entries {
            entry.clear_bindings();
        }

        for name in self.condition_vars() {
            if let Some(text) = store.text(&name) {
                self.bind_all(&name, &StateValue::Text(text));
            }
            if let Some(number) = store.number(&name) {
                self.bind_all(&name, &StateValue::Number(number));
            }
        }

        for index in 0..self.entries.len() {
            let Some(value) = self.entries[index].resolve() else {
                continue;
            };
            let var = self.entries[index].var().to_string();
            self.bind_all(&var, &StateValue::Text(value.clone()));
            self.results.insert(var, value);
        }

        for (var, value) in &self.results {
            store.set(var, StateValue::Text(value.clone()));
        }
        debug!(summary = %self.summary(), "mode set evaluated");
        &self.results
    }

    /// Results of the most recent evaluation.
    #[must_use]
    pub fn results(&self) -> &IndexMap<String, String> {
        &self.results
    }

    /// Results as `VAR,VALUE:VAR,VALUE`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.results
            .iter()
            .map(|(var, value)| format!("{var},{value}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}
