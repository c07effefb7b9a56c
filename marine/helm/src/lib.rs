#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Marine helm core: condition-gated behaviors vote every control cycle with
//! piecewise preference functions over a discretized decision domain, and
//! the arbitration engine couples the votes into one decision.

/// Behavior abstraction, common parameters, and behavior kinds.
#[path = "../behavior/main.rs"]
pub mod behavior;

/// Settings file loading.
#[path = "../config.rs"]
pub mod config;

/// Decision domain axes.
#[path = "../domain.rs"]
pub mod domain;

/// Arbitration engine and decision reports.
#[path = "../engine/main.rs"]
pub mod engine;

/// Error taxonomy.
#[path = "../error.rs"]
pub mod error;

/// Partition maps, refinement, and coupling of preference functions.
#[path = "../function/main.rs"]
pub mod function;

/// Logic condition parsing and evaluation.
#[path = "../logic/main.rs"]
pub mod logic;

/// Mode declarations and the mode set.
#[path = "../modes/main.rs"]
pub mod modes;

/// Runtime wiring settings, behaviors, engine, and telemetry.
#[path = "../main.rs"]
pub mod orchestration_entry;

/// Shared state store.
#[path = "../state.rs"]
pub mod state;

/// Telemetry helpers.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use behavior::{
    Behavior, BehaviorCore, BehaviorFactory, BehaviorOutcome, BehaviorSet, LifecycleState, Posting,
};
pub use config::{BehaviorBlock, HelmSettings};
pub use domain::{DecisionDomain, DomainAxis};
pub use engine::{DecisionReport, HaltReason, HelmEngine};
pub use error::{ErrorClass, HelmError};
pub use function::{
    coupler::Coupler, peak::PeakFunction, reflector::Reflector, IvpFunction, PartitionMap,
};
pub use logic::LogicCondition;
pub use modes::{ModeDeclaration, ModeEntry, ModeSet};
pub use orchestration_entry::HelmRuntime;
pub use state::{StateBuffer, StateStore, StateValue};
pub use telemetry::{HelmTelemetry, HelmTelemetryBuilder};
