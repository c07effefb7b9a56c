//! Shared state store: the key/value snapshot every cycle reads.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A numeric or textual state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Numeric value.
    Number(f64),
    /// Textual value.
    Text(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Key/value contract between the helm and whatever feeds it.
///
/// Queries are typed: a key holding text is not found by [`number`], and a
/// key holding a number is not found by [`text`]. Absent and stale keys are
/// indistinguishable.
///
/// [`number`]: StateStore::number
/// [`text`]: StateStore::text
pub trait StateStore {
    /// Numeric value of a key.
    fn number(&self, name: &str) -> Option<f64>;
    /// Textual value of a key.
    fn text(&self, name: &str) -> Option<String>;
    /// Stores a value, replacing any previous value of either type.
    fn set(&mut self, name: &str, value: StateValue);
    /// Current helm time in seconds.
    fn current_time(&self) -> f64;
}

/// In-memory state store.
#[derive(Debug, Clone, Default)]
pub struct StateBuffer {
    values: IndexMap<String, StateValue>,
    time: f64,
}

impl StateBuffer {
    /// Creates an empty buffer at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the helm clock.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Raw value of a key.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StateValue> {
        self.values.get(name)
    }

    /// Removes a key, making it not-found until refreshed.
    pub fn invalidate(&mut self, name: &str) -> Option<StateValue> {
        self.values.shift_remove(name)
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of every key and value, in first-insertion order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, StateValue> {
        self.values.clone()
    }
}

impl StateStore for StateBuffer {
    fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(StateValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(StateValue::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: StateValue) {
        self.values.insert(name.to_string(), value);
    }

    fn current_time(&self) -> f64 {
        self.time
    }
}
