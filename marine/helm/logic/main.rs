//! Boolean/relational conditions over named state variables.
//!
//! A condition is parsed once at configuration time into an index-addressed
//! node arena and re-bound with live values every cycle. Operands of `and`
//! and `or` must be parenthesized (or negated-parenthesized), which removes
//! any question of precedence.

mod node;
mod parse;

use std::str::FromStr;

use node::{evaluate, Binding, Node, NodeId};
use parse::{Connective, Leaf};

use crate::{
    error::HelmError,
    state::{StateStore, StateValue},
};

/// A parsed, syntax-checked logic condition.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicCondition {
    raw: String,
    nodes: Vec<Node>,
    root: NodeId,
}

struct Builder<'a> {
    raw: &'a str,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn fail(&self, reason: impl Into<String>) -> HelmError {
        HelmError::Condition {
            expr: self.raw.to_string(),
            reason: reason.into(),
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn leaf(&mut self, leaf: Leaf) -> NodeId {
        self.push(match leaf {
            Leaf::Variable(name) => Node::Variable {
                name,
                binding: Binding::Unset,
            },
            Leaf::Number(value) => Node::Number(value),
            Leaf::Literal(text) => Node::Literal(text),
        })
    }

    fn expression(&mut self, text: &str) -> Result<NodeId, HelmError> {
        let text = parse::strip_global_parens(text);
        if text.is_empty() {
            return Err(self.fail("empty expression"));
        }

        if let Some((connective, operands)) =
            parse::split_connective(text).map_err(|reason| self.fail(reason))?
        {
            if let Some(bad) = operands
                .iter()
                .find(|op| !parse::is_global_parens(op) && !parse::is_global_not_parens(op))
            {
                return Err(self.fail(format!("operand `{bad}` must be parenthesized")));
            }
            let mut joined = self.expression(operands[0])?;
            for operand in &operands[1..] {
                let next = self.expression(operand)?;
                joined = self.push(match connective {
                    Connective::And => Node::And(joined, next),
                    Connective::Or => Node::Or(joined, next),
                });
            }
            return Ok(joined);
        }

        if let Some(body) = parse::strip_not(text) {
            if !parse::is_global_parens(body) {
                return Err(self.fail("`not` must be followed by a parenthesized expression"));
            }
            let inner = self.expression(body)?;
            return Ok(self.push(Node::Not(inner)));
        }

        let (relation, left, right) = parse::split_relation(text)
            .ok_or_else(|| self.fail(format!("no relation in `{text}`")))?;
        let left = parse::left_leaf(left)
            .ok_or_else(|| self.fail(format!("`{left}` is not a variable name")))?;
        let right = parse::right_leaf(right)
            .ok_or_else(|| self.fail(format!("`{right}` is not a valid operand")))?;
        let left = self.leaf(left);
        let right = self.leaf(right);
        Ok(self.push(Node::Compare {
            relation,
            left,
            right,
        }))
    }
}

impl LogicCondition {
    /// Parses and syntax-checks a condition. On failure nothing is kept.
    pub fn parse(text: &str) -> Result<Self, HelmError> {
        let mut builder = Builder {
            raw: text,
            nodes: Vec::new(),
        };
        let root = builder.expression(text)?;
        Ok(Self {
            raw: text.trim().to_string(),
            nodes: builder.nodes,
            root,
        })
    }

    /// Original condition text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Referenced variables, deduplicated, in order of appearance.
    #[must_use]
    pub fn var_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for node in &self.nodes {
            if let Node::Variable { name, .. } = node {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Binds a value into every leaf naming `name`. A leaf already bound
    /// with the other value type this cycle keeps its binding.
    pub fn bind(&mut self, name: &str, value: &StateValue) {
        for node in &mut self.nodes {
            let Node::Variable {
                name: leaf,
                binding,
            } = node
            else {
                continue;
            };
            if leaf.as_str() != name {
                continue;
            }
            let type_locked = matches!(
                (value, &*binding),
                (StateValue::Text(_), Binding::Number(_))
                    | (StateValue::Number(_), Binding::Text(_))
            );
            if type_locked {
                continue;
            }
            *binding = match value {
                StateValue::Text(text) => Binding::Text(text.clone()),
                StateValue::Number(number) => Binding::Number(*number),
            };
        }
    }

    /// Binds a textual value.
    pub fn set_text(&mut self, name: &str, value: &str) {
        self.bind(name, &StateValue::Text(value.to_string()));
    }

    /// Binds a numeric value.
    pub fn set_number(&mut self, name: &str, value: f64) {
        self.bind(name, &StateValue::Number(value));
    }

    /// Forgets every binding; called at the start of each cycle.
    pub fn clear_bindings(&mut self) {
        for node in &mut self.nodes {
            if let Node::Variable { binding, .. } = node {
                *binding = Binding::Unset;
            }
        }
    }

    /// Clears bindings and re-binds every referenced variable found in the
    /// store.
    pub fn bind_from(&mut self, store: &dyn StateStore) {
        self.clear_bindings();
        for name in self.var_names() {
            if let Some(text) = store.text(&name) {
                self.bind(&name, &StateValue::Text(text));
            }
            if let Some(number) = store.number(&name) {
                self.bind(&name, &StateValue::Number(number));
            }
        }
    }

    /// Evaluates against the current bindings. Comparisons touching an
    /// unbound variable are false.
    #[must_use]
    pub fn eval(&self) -> bool {
        evaluate(&self.nodes, self.root)
    }
}

impl FromStr for LogicCondition {
    type Err = HelmError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

/// Evaluates every condition; an empty list holds.
#[must_use]
pub fn all_hold(conditions: &[LogicCondition]) -> bool {
    conditions.iter().all(LogicCondition::eval)
}
