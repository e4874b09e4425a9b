//! Counterfactual decision twin for a battery-swap support center.
//!
//! Two entry points:
//!   - `pipeline::Pipeline::analyze` evaluates one support call: extract the
//!     agent's decision, run auto-QA, compare it against counterfactuals in
//!     the micro digital twin, and explain the result.
//!   - `engine::simulate_network` runs the 24-hour network simulator with
//!     optional what-if interventions.

pub mod auto_qa;
pub mod clock;
pub mod config;
pub mod counterfactual;
pub mod decision;
pub mod decision_extractor;
pub mod demand_subsystem;
pub mod digital_twin;
pub mod engine;
pub mod error;
pub mod event;
pub mod insight;
pub mod intervention;
pub mod pipeline;
pub mod queue_math;
pub mod rng;
pub mod service_subsystem;
pub mod snapshot;
pub mod station;
pub mod store;
pub mod subsystem;
pub mod transcript;
pub mod types;
