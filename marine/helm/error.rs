//! Error taxonomy for the helm.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad class of a [`HelmError`], deciding how the caller reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Rejected at load time, never partially applied.
    Config,
    /// A runtime input is missing; the affected behavior abstains.
    Input,
    /// No complete decision could be produced this cycle.
    Arbitration,
    /// Internal bookkeeping broke; indicates a defect.
    Invariant,
}

/// Errors surfaced by the helm.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HelmError {
    /// A logic condition failed to parse or failed its syntax check.
    #[error("malformed condition `{expr}`: {reason}")]
    Condition {
        /// Raw condition text.
        expr: String,
        /// What was wrong with it.
        reason: String,
    },
    /// A decision domain entry is invalid.
    #[error("invalid domain: {0}")]
    Domain(String),
    /// A behavior or mode block carries an unknown key.
    #[error("unknown parameter `{param}` for {owner}")]
    UnknownParam {
        /// Behavior or block that rejected the key.
        owner: String,
        /// Offending key.
        param: String,
    },
    /// A recognized key carries an invalid value.
    #[error("invalid value `{value}` for parameter `{param}`")]
    InvalidParam {
        /// Parameter key.
        param: String,
        /// Rejected value.
        value: String,
    },
    /// A mode or behavior block is incomplete or malformed.
    #[error("malformed block: {0}")]
    Block(String),
    /// No constructor is registered for a behavior kind.
    #[error("unknown behavior kind `{0}`")]
    UnknownBehavior(String),
    /// A mandatory runtime variable was not found in the state store.
    #[error("missing input `{0}`")]
    MissingInput(String),
    /// The cycle produced no complete decision.
    #[error("no complete decision: {0}")]
    Arbitration(String),
    /// Dimensions of domain, region, or cell size disagree.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// A partition map no longer tiles its domain.
    #[error("partition coverage violated: {0}")]
    Coverage(String),
}

impl HelmError {
    /// Taxonomy class of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Condition { .. }
            | Self::Domain(_)
            | Self::UnknownParam { .. }
            | Self::InvalidParam { .. }
            | Self::Block(_)
            | Self::UnknownBehavior(_) => ErrorClass::Config,
            Self::MissingInput(_) => ErrorClass::Input,
            Self::Arbitration(_) => ErrorClass::Arbitration,
            Self::DimensionMismatch(_) | Self::Coverage(_) => ErrorClass::Invariant,
        }
    }

    pub(crate) fn invalid(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParam {
            param: param.into(),
            value: value.into(),
        }
    }
}
