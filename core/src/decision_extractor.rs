//! Decision extractor: transcript → exactly one `Decision`.
//!
//! RULE ORDER (fixed, documented, never reordered):
//!   1. technical_fault      → TechnicalSafety
//!   2. escalation           → EscalationTiming
//!   3. station_instruction  → StationRouting
//!   4. response_shape       → ResponseStructure
//!   5. default (catch-all)  → ResponseStructure / Direct, low confidence
//!
//! The first rule whose predicate holds builds the decision. Extraction
//! never fails: an empty or unrecognisable transcript gets the default.

use crate::{
    config::DecisionRules,
    decision::{Decision, DecisionType, EscalationAction, ResponseStyle, SafetyAdvice},
    queue_math::{Clarity, Coordinate},
    station::{Station, StationRegistry},
    transcript::{contains_any, Transcript},
};
use regex::Regex;
use std::sync::LazyLock;

pub const FAULT_WORDS: &[&str] = &[
    "stuck", "locking", "dock", "not working", "scanner", "spark", "smoke",
    "overheat", "fire", "jammed",
];
pub const TECHNICIAN_WORDS: &[&str] = &[
    "technician", "field team", "mechanic", "safety reason", "for safety",
];
pub const ESCALATION_WORDS: &[&str] = &[
    "escalat", "supervisor", "manager", "transfer", "senior",
];
pub const DELAY_CUES: &[&str] = &["later", "wait", "try first", "see if"];
pub const INSTRUCTION_VERBS: &[&str] = &[
    "go to", "head to", "route", "send you", "visit", "drive to", "driving to",
    "go there", "please go",
];
pub const HEDGE_PHRASES: &[&str] = &[
    "maybe", "i think", "probably", "not sure", "guess", "i don't know",
    "just try", "might work",
];
pub const QUESTION_CUES: &[&str] = &[
    "?", "would you like", "do you prefer", "which station", "can you tell",
];

static DURATION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(?:\s*(?:-|to)\s*(\d+(?:\.\d+)?))?\s*(hours?|hrs?|minutes?|mins?)\b").ok()
});

/// Largest duration stated in `text`, in minutes. Ranges take the upper
/// bound: "1-2 hours" → 120.
pub fn stated_wait_minutes(text: &str) -> Option<f64> {
    let re = DURATION_RE.as_ref()?;
    re.captures_iter(&text.to_lowercase())
        .filter_map(|caps| {
            let low: f64 = caps.get(1)?.as_str().parse().ok()?;
            let high = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(low);
            let unit = caps.get(3)?.as_str();
            let factor = if unit.starts_with('h') { 60.0 } else { 1.0 };
            Some(high.max(low) * factor)
        })
        .max_by(f64::total_cmp)
}

/// Everything a rule may look at.
pub struct ExtractionContext<'a> {
    pub transcript: &'a Transcript,
    pub registry: &'a StationRegistry,
    pub rules: &'a DecisionRules,
    pub driver_origin: Option<Coordinate>,
    agent_text: String,
    full_text: String,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(
        transcript: &'a Transcript,
        registry: &'a StationRegistry,
        rules: &'a DecisionRules,
        driver_origin: Option<Coordinate>,
    ) -> Self {
        Self {
            agent_text: transcript.agent_text(),
            full_text: transcript.full_text(),
            transcript,
            registry,
            rules,
            driver_origin,
        }
    }

    pub fn agent_text(&self) -> &str {
        &self.agent_text
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn clarity(&self) -> Clarity {
        if contains_any(&self.agent_text, HEDGE_PHRASES) {
            Clarity::Vague
        } else {
            Clarity::Clear
        }
    }

    /// First station mentioned on the call, else nearest to the driver,
    /// else the lowest-id station.
    pub fn reference_station(&self) -> &'a Station {
        if let Some(station) = self.registry.mentions_in(&self.full_text).into_iter().next() {
            return station;
        }
        self.driver_origin
            .and_then(|origin| self.registry.nearest(origin))
            .unwrap_or_else(|| self.registry.default_station())
    }
}

pub struct ExtractionRule {
    pub name: &'static str,
    pub decision_type: DecisionType,
    pub applies: fn(&ExtractionContext) -> bool,
    pub extract: fn(&ExtractionContext) -> Decision,
}

/// The rule table, in priority order.
pub const RULES: &[ExtractionRule] = &[
    ExtractionRule {
        name: "technical_fault",
        decision_type: DecisionType::TechnicalSafety,
        applies: |ctx| {
            contains_any(ctx.full_text(), FAULT_WORDS)
                && contains_any(ctx.agent_text(), TECHNICIAN_WORDS)
        },
        extract: extract_technical,
    },
    ExtractionRule {
        name: "escalation",
        decision_type: DecisionType::EscalationTiming,
        applies: |ctx| contains_any(ctx.agent_text(), ESCALATION_WORDS),
        extract: extract_escalation,
    },
    ExtractionRule {
        name: "station_instruction",
        decision_type: DecisionType::StationRouting,
        applies: |ctx| routing_instruction(ctx).is_some(),
        extract: extract_routing,
    },
    ExtractionRule {
        name: "response_shape",
        decision_type: DecisionType::ResponseStructure,
        applies: |ctx| !ctx.agent_text().trim().is_empty(),
        extract: extract_response,
    },
];

/// Classify the transcript and rebuild the agent's decision.
pub fn extract(ctx: &ExtractionContext) -> Decision {
    for rule in RULES {
        if (rule.applies)(ctx) {
            let decision = (rule.extract)(ctx).with_rule(rule.name);
            debug_assert_eq!(decision.decision_type, rule.decision_type);
            log::debug!(
                "decision extractor: rule={} type={:?} station_ref={}",
                rule.name,
                decision.decision_type,
                decision.station_ref
            );
            return decision;
        }
    }
    log::warn!("decision extractor: no rule matched, falling back to default decision");
    default_decision(ctx)
}

fn default_decision(ctx: &ExtractionContext) -> Decision {
    Decision::response(ResponseStyle::Direct, ctx.reference_station().id.clone())
        .with_rule("default")
        .low_confidence()
}

fn extract_technical(ctx: &ExtractionContext) -> Decision {
    let agent = ctx.agent_text();
    let advice = if contains_any(agent, &["technician", "field team", "mechanic"]) {
        SafetyAdvice::DispatchTechnician
    } else if contains_any(agent, ESCALATION_WORDS) || agent.contains("unlock") {
        SafetyAdvice::RemoteEscalation
    } else {
        SafetyAdvice::RedirectToStation
    };
    // A redirect targets the station the agent sent the driver to, not the
    // faulty one the driver reported.
    let target = match advice {
        SafetyAdvice::RedirectToStation => {
            routing_instruction(ctx).unwrap_or_else(|| ctx.reference_station())
        }
        _ => ctx.reference_station(),
    };
    Decision::technical(advice, stated_wait_minutes(agent), target.id.clone())
        .with_clarity(ctx.clarity())
}

fn extract_escalation(ctx: &ExtractionContext) -> Decision {
    let turn = ctx
        .transcript
        .first_agent_turn_with(ESCALATION_WORDS)
        .unwrap_or(0);
    let lead_in = ctx.transcript.agent_text_before(ESCALATION_WORDS);
    let delayed = turn > ctx.rules.late_escalation_turns || contains_any(&lead_in, DELAY_CUES);
    let action = if delayed { EscalationAction::Delayed } else { EscalationAction::Immediate };
    let clarity = if delayed { Clarity::Vague } else { ctx.clarity() };
    Decision::escalation(action, turn, ctx.reference_station().id.clone()).with_clarity(clarity)
}

/// The station the agent told the driver to go to, from the last agent
/// turn that pairs an instruction verb with a station mention.
fn routing_instruction<'a>(ctx: &ExtractionContext<'a>) -> Option<&'a Station> {
    let turns: Vec<(usize, String)> = ctx.transcript.agent_turns().collect();
    turns.iter().rev().find_map(|(_, text)| {
        let verb_pos = INSTRUCTION_VERBS
            .iter()
            .filter_map(|v| text.find(v))
            .min()?;
        ctx.registry
            .mentions_in(&text[verb_pos..])
            .into_iter()
            .next()
            .or_else(|| ctx.registry.mentions_in(text).into_iter().next())
    })
}

fn extract_routing(ctx: &ExtractionContext) -> Decision {
    let station = routing_instruction(ctx).unwrap_or_else(|| ctx.reference_station());
    Decision::routing(station.id.clone(), ctx.driver_origin).with_clarity(ctx.clarity())
}

fn extract_response(ctx: &ExtractionContext) -> Decision {
    let agent = ctx.agent_text();
    let style = if contains_any(agent, HEDGE_PHRASES) {
        ResponseStyle::Vague
    } else if contains_any(agent, QUESTION_CUES) && !contains_any(agent, INSTRUCTION_VERBS) {
        ResponseStyle::Clarifying
    } else {
        ResponseStyle::Direct
    };
    Decision::response(style, ctx.reference_station().id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_take_upper_bound() {
        assert_eq!(stated_wait_minutes("it might take 1-2 hours"), Some(120.0));
        assert_eq!(stated_wait_minutes("about 20 minutes or 1 hour"), Some(60.0));
        assert_eq!(stated_wait_minutes("no numbers here"), None);
    }

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["technical_fault", "escalation", "station_instruction", "response_shape"]
        );
    }
}
