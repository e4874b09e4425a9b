//! Shared primitive types used across the twin.

/// One simulated hour of the network day, 0..=23.
pub type Hour = u32;

/// Stable catalog identifier of a swap station ("A", "BS-001", ...).
pub type StationId = String;

/// Identifier of an analysed support call.
pub type CallId = String;

/// The canonical network-run identifier.
pub type RunId = String;

/// Number of hours in one network simulation run.
pub const HOURS_PER_DAY: Hour = 24;
