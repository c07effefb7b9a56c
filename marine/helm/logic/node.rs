use std::cmp::Ordering;

/// Index of a node inside a condition's arena.
pub type NodeId = usize;

/// Relational operator of a comparison node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `=` or `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Relation {
    /// Operators in match order: two-character symbols first.
    pub(crate) const SYMBOLS: [(&'static str, Self); 7] = [
        ("!=", Self::Ne),
        ("<=", Self::Le),
        (">=", Self::Ge),
        ("==", Self::Eq),
        ("=", Self::Eq),
        ("<", Self::Lt),
        (">", Self::Gt),
    ];

    fn holds(self, ordering: Option<Ordering>) -> bool {
        let Some(ordering) = ordering else {
            return false;
        };
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Value bound into a variable leaf for the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Nothing bound yet this cycle.
    Unset,
    /// Bound with text.
    Text(String),
    /// Bound with a number.
    Number(f64),
}

/// Arena node of a parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Negation.
    Not(NodeId),
    /// Conjunction.
    And(NodeId, NodeId),
    /// Disjunction.
    Or(NodeId, NodeId),
    /// Relational comparison of two leaves.
    Compare {
        /// Operator.
        relation: Relation,
        /// Left leaf, always a variable.
        left: NodeId,
        /// Right leaf.
        right: NodeId,
    },
    /// Variable leaf.
    Variable {
        /// Variable name.
        name: String,
        /// Value bound this cycle.
        binding: Binding,
    },
    /// Numeric literal leaf.
    Number(f64),
    /// String literal leaf, possibly still quoted.
    Literal(String),
}

enum Operand<'a> {
    Text(&'a str),
    Number(f64),
}

fn strip_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn operand(node: &Node) -> Option<Operand<'_>> {
    match node {
        Node::Variable {
            binding: Binding::Text(text),
            ..
        }
        | Node::Literal(text) => Some(Operand::Text(text)),
        Node::Variable {
            binding: Binding::Number(value),
            ..
        }
        | Node::Number(value) => Some(Operand::Number(*value)),
        _ => None,
    }
}

fn compare(relation: Relation, left: &Operand<'_>, right: &Operand<'_>) -> bool {
    match (left, right) {
        (Operand::Text(l), Operand::Text(r)) => {
            relation.holds(Some(strip_quotes(l).cmp(strip_quotes(r))))
        }
        (Operand::Number(l), Operand::Number(r)) => relation.holds(l.partial_cmp(r)),
        (Operand::Text(l), Operand::Number(r)) => strip_quotes(l)
            .parse::<f64>()
            .is_ok_and(|l| relation.holds(l.partial_cmp(r))),
        (Operand::Number(l), Operand::Text(r)) => strip_quotes(r)
            .parse::<f64>()
            .is_ok_and(|r| relation.holds(l.partial_cmp(&r))),
    }
}

/// Evaluates the subtree rooted at `id`. Unbound variables make their
/// comparison false.
pub fn evaluate(nodes: &[Node], id: NodeId) -> bool {
    match &nodes[id] {
        Node::Not(inner) => !evaluate(nodes, *inner),
        Node::And(left, right) => evaluate(nodes, *left) && evaluate(nodes, *right),
        Node::Or(left, right) => evaluate(nodes, *left) || evaluate(nodes, *right),
        Node::Compare {
            relation,
            left,
            right,
        } => match (operand(&nodes[*left]), operand(&nodes[*right])) {
            (Some(l), Some(r)) => compare(*relation, &l, &r),
            _ => false,
        },
        Node::Variable { .. } | Node::Number(_) | Node::Literal(_) => false,
    }
}
