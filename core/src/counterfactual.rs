//! Counterfactual comparator.
//!
//! Generates the alternatives for a decision type, runs the actual and every
//! alternative through the micro twin against the SAME baseline snapshot,
//! then ranks them.
//!
//! RULES:
//!   - The actual outcome is always outcomes[0] with is_actual = true.
//!   - Ranking is by `outcome_score` (wait, then congestion, then repeat call).
//!   - The actual wins ties. "No better option" is a valid result.
//!   - An alternative that names an unknown station is excluded and logged;
//!     the comparison carries on without it.

use crate::{
    config::DecisionRules,
    decision::{Decision, DecisionParams, EscalationAction, ResponseStyle, SafetyAdvice},
    digital_twin::{MicroTwin, SimulatedOutcome},
    error::{TwinError, TwinResult},
    queue_math::{self, Coordinate},
    station::{LoadSnapshot, Station, StationRegistry},
    types::StationId,
};
use serde::{Deserialize, Serialize};

/// Load-ratio penalty, in km-equivalents, when ranking alternative stations.
const LOAD_DISTANCE_PENALTY_KM: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Improvement {
    pub option: String,
    pub wait_reduction_minutes: f64,
    /// Clamped to >= 0; 0 when the actual wait is already 0.
    pub wait_reduction_pct: f64,
    pub congestion_downgraded: bool,
    pub repeat_call_downgraded: bool,
    pub is_improvement: bool,
}

impl Improvement {
    fn between(actual: &SimulatedOutcome, alternative: &SimulatedOutcome) -> Self {
        let reduction = actual.expected_wait_minutes - alternative.expected_wait_minutes;
        let pct = if actual.expected_wait_minutes > 0.0 {
            (reduction / actual.expected_wait_minutes * 100.0).max(0.0)
        } else {
            0.0
        };
        Self {
            option: alternative.option.clone(),
            wait_reduction_minutes: reduction,
            wait_reduction_pct: pct,
            congestion_downgraded: alternative.congestion_risk < actual.congestion_risk,
            repeat_call_downgraded: alternative.repeat_call_risk < actual.repeat_call_risk,
            is_improvement: alternative.score < actual.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExcludedAlternative {
    pub option: String,
    pub station_id: StationId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    /// Actual first, then alternatives in generation order.
    pub outcomes: Vec<SimulatedOutcome>,
    /// One per alternative, aligned with outcomes[1..].
    pub improvements: Vec<Improvement>,
    /// Index into `outcomes`. 0 means the actual decision was best.
    pub best: usize,
    pub excluded: Vec<ExcludedAlternative>,
}

impl ComparisonResult {
    pub fn actual(&self) -> &SimulatedOutcome {
        &self.outcomes[0]
    }

    pub fn best_outcome(&self) -> &SimulatedOutcome {
        &self.outcomes[self.best]
    }

    pub fn best_is_actual(&self) -> bool {
        self.best == 0
    }

    /// Improvement of the best alternative, `None` when the actual won.
    pub fn best_improvement(&self) -> Option<&Improvement> {
        self.best.checked_sub(1).and_then(|i| self.improvements.get(i))
    }

    pub fn alternatives(&self) -> &[SimulatedOutcome] {
        &self.outcomes[1..]
    }
}

pub struct Comparator<'a> {
    registry: &'a StationRegistry,
    snapshot: &'a LoadSnapshot,
    rules: &'a DecisionRules,
    driver_origin: Option<Coordinate>,
}

impl<'a> Comparator<'a> {
    pub fn new(
        registry: &'a StationRegistry,
        snapshot: &'a LoadSnapshot,
        rules: &'a DecisionRules,
        driver_origin: Option<Coordinate>,
    ) -> Self {
        Self { registry, snapshot, rules, driver_origin }
    }

    /// Generate the alternatives for `actual` and rank everything.
    pub fn compare(&self, actual: &Decision) -> TwinResult<ComparisonResult> {
        let alternatives = self.generate_alternatives(actual);
        self.compare_with(actual, alternatives)
    }

    /// Rank `actual` against an explicit list of alternatives.
    ///
    /// Fails only if the actual decision itself cannot be simulated.
    pub fn compare_with(
        &self,
        actual: &Decision,
        alternatives: Vec<Decision>,
    ) -> TwinResult<ComparisonResult> {
        let twin = MicroTwin::new(self.registry, self.snapshot);

        let mut actual_outcome = twin.simulate(actual, self.driver_origin)?;
        actual_outcome.is_actual = true;

        let mut outcomes = vec![actual_outcome];
        let mut excluded = Vec::new();

        for alternative in alternatives {
            match twin.simulate(&alternative, self.driver_origin) {
                Ok(outcome) => outcomes.push(outcome),
                Err(TwinError::StationNotFound { station_id }) => {
                    log::warn!(
                        "counterfactual: excluding '{}', station {station_id} not found",
                        alternative.label()
                    );
                    excluded.push(ExcludedAlternative {
                        option: alternative.label(),
                        reason: format!("station {station_id} not found"),
                        station_id,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let improvements: Vec<Improvement> = outcomes[1..]
            .iter()
            .map(|alt| Improvement::between(&outcomes[0], alt))
            .collect();

        let mut best = 0;
        for (i, outcome) in outcomes.iter().enumerate().skip(1) {
            if outcome.score < outcomes[best].score {
                best = i;
            }
        }

        log::debug!(
            "counterfactual: {} alternatives, {} excluded, best='{}'",
            outcomes.len() - 1,
            excluded.len(),
            outcomes[best].option
        );

        Ok(ComparisonResult { outcomes, improvements, best, excluded })
    }

    /// Deterministic alternatives for the actual decision's type.
    pub fn generate_alternatives(&self, actual: &Decision) -> Vec<Decision> {
        let alternatives = match &actual.params {
            DecisionParams::StationRouting { station_id, .. } => {
                self.routing_alternatives(station_id)
            }
            DecisionParams::EscalationTiming { action, .. } => {
                escalation_alternatives(*action, &actual.station_ref)
            }
            DecisionParams::ResponseStructure { style } => {
                response_alternatives(*style, &actual.station_ref)
            }
            DecisionParams::TechnicalSafety { advice, stated_wait_minutes } => {
                self.technical_alternatives(*advice, *stated_wait_minutes, &actual.station_ref)
            }
        };
        alternatives
            .into_iter()
            .filter(|alt| alt.params != actual.params || alt.station_ref != actual.station_ref)
            .collect()
    }

    fn routing_alternatives(&self, actual_station: &str) -> Vec<Decision> {
        let anchor = self.anchor(actual_station);
        let mut alternatives: Vec<Decision> = self
            .safe_stations(anchor, actual_station)
            .into_iter()
            .take(self.rules.max_station_alternatives)
            .map(|s| Decision::routing(s.id.clone(), self.driver_origin).with_rule("safe_station"))
            .collect();
        alternatives.push(
            Decision::response(ResponseStyle::Clarifying, actual_station)
                .with_rule("clarify_first"),
        );
        alternatives
    }

    fn technical_alternatives(
        &self,
        actual: SafetyAdvice,
        stated_wait_minutes: Option<f64>,
        station_ref: &str,
    ) -> Vec<Decision> {
        let mut alternatives = Vec::new();
        if actual != SafetyAdvice::RemoteEscalation {
            alternatives.push(
                Decision::technical(SafetyAdvice::RemoteEscalation, None, station_ref)
                    .with_rule("remote_unlock"),
            );
        }
        if actual != SafetyAdvice::RedirectToStation {
            let anchor = self.anchor(station_ref);
            if let Some(safe) = self.safe_stations(anchor, station_ref).into_iter().next() {
                alternatives.push(
                    Decision::technical(SafetyAdvice::RedirectToStation, None, safe.id.clone())
                        .with_rule("redirect_safe_station"),
                );
            }
        }
        if actual != SafetyAdvice::DispatchTechnician && alternatives.len() < 2 {
            alternatives.push(
                Decision::technical(SafetyAdvice::DispatchTechnician, stated_wait_minutes, station_ref)
                    .with_rule("dispatch_technician"),
            );
        }
        alternatives
    }

    /// Driver origin, else the reference station's own location.
    fn anchor(&self, station_id: &str) -> Option<Coordinate> {
        self.driver_origin
            .or_else(|| self.registry.get(station_id).map(|s| s.location))
    }

    /// Stations other than `exclude` at or below the safe load ratio,
    /// best first: distance + load penalty, ties to lower id.
    fn safe_stations(&self, anchor: Option<Coordinate>, exclude: &str) -> Vec<&'a Station> {
        let limit = self.rules.safe_alternative_ratio;
        let snapshot = self.snapshot;
        let mut ranked: Vec<(f64, &'a Station)> = self
            .registry
            .stations()
            .iter()
            .filter(|s| s.id != exclude)
            .filter_map(|s| {
                let ratio = snapshot.load_ratio(&s.id)?;
                if ratio > limit {
                    return None;
                }
                let km = anchor.map_or(0.0, |a| queue_math::distance_km(a, s.location));
                Some((km + LOAD_DISTANCE_PENALTY_KM * ratio, s))
            })
            .collect();
        ranked.sort_by(|(ka, a), (kb, b)| ka.total_cmp(kb).then_with(|| a.id.cmp(&b.id)));
        ranked.into_iter().map(|(_, s)| s).collect()
    }
}

fn escalation_alternatives(actual: EscalationAction, station_ref: &str) -> Vec<Decision> {
    let mut alternatives = Vec::new();
    if actual != EscalationAction::Immediate {
        alternatives.push(
            Decision::escalation(EscalationAction::Immediate, 0, station_ref)
                .with_rule("escalate_immediately"),
        );
    }
    if actual != EscalationAction::None {
        alternatives.push(
            Decision::escalation(EscalationAction::None, 0, station_ref)
                .with_rule("no_escalation"),
        );
    }
    alternatives
}

fn response_alternatives(actual: ResponseStyle, station_ref: &str) -> Vec<Decision> {
    [ResponseStyle::Direct, ResponseStyle::Clarifying]
        .into_iter()
        .filter(|style| *style != actual)
        .map(|style| {
            let rule = match style {
                ResponseStyle::Clarifying => "clarify_first",
                _ => "direct_instruction",
            };
            Decision::response(style, station_ref).with_rule(rule)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwinConfig;

    fn fixtures() -> (StationRegistry, LoadSnapshot, DecisionRules) {
        let config = TwinConfig::default_test();
        let registry = StationRegistry::new(config.stations).unwrap();
        let snapshot = LoadSnapshot::from_registry(&registry);
        (registry, snapshot, config.rules)
    }

    #[test]
    fn vague_response_gets_both_alternatives() {
        let alts = response_alternatives(ResponseStyle::Vague, "B");
        assert_eq!(alts.len(), 2);
    }

    #[test]
    fn routing_alternatives_skip_congested_stations() {
        let (registry, snapshot, rules) = fixtures();
        let cmp = Comparator::new(&registry, &snapshot, &rules, None);
        let alts = cmp.generate_alternatives(&Decision::routing("A", None));
        let routed: Vec<&str> = alts.iter().filter_map(|d| d.routed_station()).collect();
        assert!(!routed.contains(&"A"));
        assert!(!routed.contains(&"C"), "C sits at 75% load");
        assert!(alts.iter().any(|d| d.matched_rule == "clarify_first"));
    }

    #[test]
    fn unknown_alternative_is_excluded_not_fatal() {
        let (registry, snapshot, rules) = fixtures();
        let cmp = Comparator::new(&registry, &snapshot, &rules, None);
        let result = cmp
            .compare_with(
                &Decision::routing("A", None),
                vec![Decision::routing("ZZ", None), Decision::routing("B", None)],
            )
            .unwrap();
        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].station_id, "ZZ");
    }
}
