use serde::{Deserialize, Serialize};

use crate::{
    config::parse_assignments,
    error::HelmError,
    logic::{all_hold, LogicCondition},
    state::StateValue,
};

/// Textual form of a mode entry, as declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDeclaration {
    /// Mode variable written when the entry fires.
    pub var: String,
    /// Value written when every condition holds.
    pub value: String,
    /// Value written when the conditions fail and the else-conditions hold.
    pub else_value: Option<String>,
    /// Label prepended as `prefix:value`.
    pub prefix: Option<String>,
    /// Conditions that must all hold.
    pub conditions: Vec<String>,
    /// Conditions gating the else-value.
    pub else_conditions: Vec<String>,
}

/// One condition-to-value rule of a [`ModeSet`](super::ModeSet).
#[derive(Debug, Clone, PartialEq)]
pub struct ModeEntry {
    var: String,
    value: String,
    else_value: Option<String>,
    prefix: Option<String>,
    conditions: Vec<LogicCondition>,
    else_conditions: Vec<LogicCondition>,
}

impl ModeEntry {
    /// Creates an unconditional entry.
    #[must_use]
    pub fn new(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: value.into(),
            else_value: None,
            prefix: None,
            conditions: Vec::new(),
            else_conditions: Vec::new(),
        }
    }

    /// Adds a condition that must hold for the value to be written.
    pub fn with_condition(mut self, text: &str) -> Result<Self, HelmError> {
        self.conditions.push(LogicCondition::parse(text)?);
        Ok(self)
    }

    /// Sets the else-value.
    #[must_use]
    pub fn with_else_value(mut self, value: impl Into<String>) -> Self {
        self.else_value = Some(value.into());
        self
    }

    /// Adds a condition gating the else-value.
    pub fn with_else_condition(mut self, text: &str) -> Result<Self, HelmError> {
        self.else_conditions.push(LogicCondition::parse(text)?);
        Ok(self)
    }

    /// Sets the label prepended to any written value.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Builds an entry from a declaration, parsing every condition.
    pub fn from_declaration(declaration: &ModeDeclaration) -> Result<Self, HelmError> {
        if declaration.var.trim().is_empty() || declaration.value.trim().is_empty() {
            return Err(HelmError::Block("mode entry needs `var` and `value`".into()));
        }
        let parse_all = |texts: &[String]| {
            texts
                .iter()
                .map(|text| LogicCondition::parse(text))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            var: declaration.var.trim().to_string(),
            value: declaration.value.trim().to_string(),
            else_value: declaration.else_value.clone(),
            prefix: declaration.prefix.clone(),
            conditions: parse_all(&declaration.conditions)?,
            else_conditions: parse_all(&declaration.else_conditions)?,
        })
    }

    /// Parses `key = value` declaration text.
    pub fn parse(block: &str) -> Result<Self, HelmError> {
        let mut declaration = ModeDeclaration::default();
        for (key, value) in parse_assignments(block)? {
            match key.as_str() {
                "var" => declaration.var = value,
                "value" => declaration.value = value,
                "elsevalue" => declaration.else_value = Some(value),
                "prefix" => declaration.prefix = Some(value),
                "condition" => declaration.conditions.push(value),
                "elsecondition" => declaration.else_conditions.push(value),
                _ => {
                    return Err(HelmError::UnknownParam {
                        owner: "mode declaration".into(),
                        param: key,
                    })
                }
            }
        }
        Self::from_declaration(&declaration)
    }

    /// Mode variable this entry writes.
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }

    /// Variables referenced by any of the entry's conditions.
    #[must_use]
    pub fn condition_vars(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for condition in self.conditions.iter().chain(&self.else_conditions) {
            for name in condition.var_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub(crate) fn bind(&mut self, name: &str, value: &StateValue) {
        for condition in self.conditions.iter_mut().chain(&mut self.else_conditions) {
            condition.bind(name, value);
        }
    }

    pub(crate) fn clear_bindings(&mut self) {
        for condition in self.conditions.iter_mut().chain(&mut self.else_conditions) {
            condition.clear_bindings();
        }
    }

    /// Value this entry contributes under the current bindings, with the
    /// prefix applied, or `None` when it contributes nothing.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        let chosen = if all_hold(&self.conditions) {
            self.value.as_str()
        } else if all_hold(&self.else_conditions) {
            self.else_value.as_deref()?
        } else {
            return None;
        };
        Some(match &self.prefix {
            Some(prefix) => format!("{prefix}:{chosen}"),
            None => chosen.to_string(),
        })
    }
}
