//! The event bus for network runs.
//!
//! RULE: Subsystems communicate ONLY through events.
//! The service subsystem learns about demand from `DemandArrived`
//! events, never by reading the demand subsystem.

use crate::types::{Hour, RunId, StationId};
use serde::{Deserialize, Serialize};

/// Every event emitted during a network run.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TwinEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
        stations: usize,
    },
    InterventionApplied {
        index: usize,
        description: String,
    },
    HourStarted {
        hour: Hour,
    },
    HourCompleted {
        hour: Hour,
    },

    // ── Demand events ──────────────────────────────
    DemandArrived {
        hour: Hour,
        station_id: StationId,
        arrivals: u32,
    },

    // ── Service events ─────────────────────────────
    SwapsServed {
        hour: Hour,
        station_id: StationId,
        served: u32,
        queue_length: u32,
        inventory_ready: u32,
    },
    SwapsLost {
        hour: Hour,
        station_id: StationId,
        lost: u32,
    },
}

impl TwinEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }      => "run_initialized",
            Self::InterventionApplied { .. } => "intervention_applied",
            Self::HourStarted { .. }         => "hour_started",
            Self::HourCompleted { .. }       => "hour_completed",
            Self::DemandArrived { .. }       => "demand_arrived",
            Self::SwapsServed { .. }         => "swaps_served",
            Self::SwapsLost { .. }           => "swaps_lost",
        }
    }
}

/// One row of a run's in-memory event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventLogEntry {
    pub seq: u64,
    pub run_id: RunId,
    pub hour: Hour,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized TwinEvent
}
