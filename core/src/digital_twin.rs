//! Micro digital twin. One decision in, one projected outcome out.
//!
//! Pure read-and-project over a `LoadSnapshot`: the actual decision and
//! every counterfactual are evaluated against the same baseline load.
//! Nothing here mutates the snapshot, so outcomes never cascade.

use crate::{
    decision::{Decision, DecisionParams, EscalationAction, ResponseStyle, SafetyAdvice},
    error::{TwinError, TwinResult},
    queue_math::{self, Clarity, Coordinate, RiskLevel},
    station::{LoadSnapshot, StationRegistry},
    types::StationId,
};
use serde::{Deserialize, Serialize};

// ── Handling delays (minutes) ────────────────────────────────────────────────

const ESCALATION_HANDOFF_MINUTES: f64 = 3.0;
const MINUTES_PER_TURN: f64 = 1.5;
const UNRESOLVED_MINUTES: f64 = 8.0;
const CLARIFYING_TURN_MINUTES: f64 = 1.0;
const VAGUE_CONFUSION_MINUTES: f64 = 4.0;
const REMOTE_UNLOCK_MINUTES: f64 = 10.0;
const DEFAULT_TECHNICIAN_MINUTES: f64 = 60.0;

// ── Ranking weights (fixed order: wait, congestion, repeat call) ─────────────

const WAIT_WEIGHT: f64 = 1.0;
const CONGESTION_WEIGHT: f64 = 0.1;
const REPEAT_CALL_WEIGHT: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulatedOutcome {
    pub option: String,
    pub decision: Decision,
    pub is_actual: bool,
    pub station_id: StationId,
    /// Queue wait plus handling delay.
    pub expected_wait_minutes: f64,
    pub queue_wait_minutes: f64,
    pub handling_minutes: f64,
    pub congestion_risk: RiskLevel,
    pub repeat_call_risk: RiskLevel,
    pub load_ratio: f64,
    /// Drive time from the driver's origin, when known. Not part of the wait.
    pub travel_minutes: Option<f64>,
    pub description: String,
    /// Lower is better.
    pub score: f64,
}

pub fn outcome_score(wait_minutes: f64, congestion: RiskLevel, repeat_call: RiskLevel) -> f64 {
    wait_minutes * WAIT_WEIGHT
        + congestion.rank() as f64 * CONGESTION_WEIGHT
        + repeat_call.rank() as f64 * REPEAT_CALL_WEIGHT
}

pub struct MicroTwin<'a> {
    registry: &'a StationRegistry,
    snapshot: &'a LoadSnapshot,
}

impl<'a> MicroTwin<'a> {
    pub fn new(registry: &'a StationRegistry, snapshot: &'a LoadSnapshot) -> Self {
        Self { registry, snapshot }
    }

    /// Project `decision` onto its target station.
    ///
    /// Fails with `StationNotFound` when the decision names a station that
    /// is not in the registry snapshot.
    pub fn simulate(
        &self,
        decision: &Decision,
        driver_origin: Option<Coordinate>,
    ) -> TwinResult<SimulatedOutcome> {
        let station_id = target_station(decision);
        let station = self.registry.require(station_id)?;
        let load = self
            .snapshot
            .get(station_id)
            .ok_or_else(|| TwinError::station_not_found(station_id))?;

        let queue_wait = queue_math::expected_wait(
            load.queue_length,
            station.service_rate(),
            station.swap_bays,
        );
        let handling = handling_minutes(decision);
        let wait = (queue_wait + handling).max(0.0);

        let congestion = load.congestion_risk();
        let clarity = effective_clarity(decision);
        let repeat_call = queue_math::repeat_call_probability(wait, clarity);

        let origin = driver_origin.or(decision.driver_origin());
        let travel = origin.map(|o| queue_math::travel_minutes(o, station.location));

        log::debug!(
            "micro twin: {} at {} wait={wait:.1} congestion={congestion} repeat={repeat_call}",
            decision.label(),
            station.id
        );

        Ok(SimulatedOutcome {
            option: decision.label(),
            decision: decision.clone(),
            is_actual: false,
            station_id: station.id.clone(),
            expected_wait_minutes: wait,
            queue_wait_minutes: queue_wait,
            handling_minutes: handling,
            congestion_risk: congestion,
            repeat_call_risk: repeat_call,
            load_ratio: load.load_ratio(),
            travel_minutes: travel,
            description: describe(decision, &station.name),
            score: outcome_score(wait, congestion, repeat_call),
        })
    }
}

fn target_station(decision: &Decision) -> &str {
    decision.routed_station().unwrap_or(&decision.station_ref)
}

fn handling_minutes(decision: &Decision) -> f64 {
    match &decision.params {
        DecisionParams::StationRouting { .. } => 0.0,
        DecisionParams::EscalationTiming { action, turns_before_escalation } => match action {
            EscalationAction::Immediate => ESCALATION_HANDOFF_MINUTES,
            EscalationAction::Delayed => {
                ESCALATION_HANDOFF_MINUTES + MINUTES_PER_TURN * *turns_before_escalation as f64
            }
            EscalationAction::None => UNRESOLVED_MINUTES,
        },
        DecisionParams::ResponseStructure { style } => match style {
            ResponseStyle::Direct     => 0.0,
            ResponseStyle::Clarifying => CLARIFYING_TURN_MINUTES,
            ResponseStyle::Vague      => VAGUE_CONFUSION_MINUTES,
        },
        DecisionParams::TechnicalSafety { advice, stated_wait_minutes } => match advice {
            SafetyAdvice::DispatchTechnician => {
                stated_wait_minutes.unwrap_or(DEFAULT_TECHNICIAN_MINUTES).max(0.0)
            }
            SafetyAdvice::RemoteEscalation  => REMOTE_UNLOCK_MINUTES,
            SafetyAdvice::RedirectToStation => 0.0,
        },
    }
}

/// Vague wording and deferred escalation both leave the driver unsure.
fn effective_clarity(decision: &Decision) -> Clarity {
    match &decision.params {
        DecisionParams::ResponseStructure { style: ResponseStyle::Vague } => Clarity::Vague,
        DecisionParams::EscalationTiming { action: EscalationAction::Delayed, .. } => {
            Clarity::Vague
        }
        _ => decision.clarity,
    }
}

fn describe(decision: &Decision, station_name: &str) -> String {
    match &decision.params {
        DecisionParams::StationRouting { .. } => format!("Driver routed to {station_name}"),
        DecisionParams::EscalationTiming { action, turns_before_escalation } => match action {
            EscalationAction::Immediate => "Escalate to supervisor on first report".into(),
            EscalationAction::Delayed => {
                format!("Escalation after {turns_before_escalation} turns")
            }
            EscalationAction::None => "Agent handles the issue without escalating".into(),
        },
        DecisionParams::ResponseStructure { style } => match style {
            ResponseStyle::Direct     => "Agent gives one concrete instruction".into(),
            ResponseStyle::Clarifying => "Ask driver preference before instructing".into(),
            ResponseStyle::Vague      => "Agent gives hedged, non-committal guidance".into(),
        },
        DecisionParams::TechnicalSafety { advice, .. } => match advice {
            SafetyAdvice::DispatchTechnician => {
                format!("Driver waits at {station_name} for a field technician")
            }
            SafetyAdvice::RemoteEscalation => "Supervisor attempts remote unlock".into(),
            SafetyAdvice::RedirectToStation => format!("Driver redirected to {station_name}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwinConfig;

    fn fixtures() -> (StationRegistry, LoadSnapshot) {
        let registry = StationRegistry::new(TwinConfig::default_test().stations).unwrap();
        let snapshot = LoadSnapshot::from_registry(&registry);
        (registry, snapshot)
    }

    #[test]
    fn routing_to_congested_station_is_slow_and_high_risk() {
        let (registry, snapshot) = fixtures();
        let twin = MicroTwin::new(&registry, &snapshot);
        let out = twin.simulate(&Decision::routing("A", None), None).unwrap();
        assert_eq!(out.congestion_risk, RiskLevel::High);
        assert!((out.expected_wait_minutes - 22.5).abs() < 1e-9);
        assert_eq!(out.repeat_call_risk, RiskLevel::High);
    }

    #[test]
    fn unknown_station_is_an_error() {
        let (registry, snapshot) = fixtures();
        let twin = MicroTwin::new(&registry, &snapshot);
        let err = twin.simulate(&Decision::routing("Z", None), None).unwrap_err();
        assert!(matches!(err, TwinError::StationNotFound { .. }));
    }

    #[test]
    fn vague_response_raises_repeat_call_risk() {
        let (registry, snapshot) = fixtures();
        let twin = MicroTwin::new(&registry, &snapshot);
        let direct = twin.simulate(&Decision::response(ResponseStyle::Direct, "B"), None).unwrap();
        let vague = twin.simulate(&Decision::response(ResponseStyle::Vague, "B"), None).unwrap();
        assert!(vague.repeat_call_risk > direct.repeat_call_risk);
    }

    #[test]
    fn simulation_does_not_touch_snapshot() {
        let (registry, snapshot) = fixtures();
        let before = snapshot.clone();
        let twin = MicroTwin::new(&registry, &snapshot);
        twin.simulate(&Decision::routing("B", None), None).unwrap();
        assert_eq!(before, snapshot);
    }
}
