//! Auto-QA analyzer.
//!
//! Runs a fixed battery of independent checks over the transcript and the
//! extracted decision:
//!   1. SOP deviation       (routed station ≠ policy station)
//!   2. Risky routing       (routed station load ratio > 0.8)
//!   3. Late escalation     (turns / stated wait / delay cues before escalating)
//!   4. Incomplete explanation (hedging, or neither instruction nor question)
//!
//! Each check is a pure function returning at most one finding with a
//! confidence in [0, 1]. Findings may co-occur; none means a clean call.

use crate::{
    config::DecisionRules,
    decision::Decision,
    decision_extractor::{
        stated_wait_minutes, DELAY_CUES, ESCALATION_WORDS, HEDGE_PHRASES, INSTRUCTION_VERBS,
        QUESTION_CUES, TECHNICIAN_WORDS,
    },
    queue_math::{self, Coordinate},
    station::{LoadSnapshot, StationRegistry},
    transcript::{contains_any, count_matches, Transcript},
};
use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

const CONGESTION_WORDS: &[&str] = &[
    "busy", "crowded", "long queue", "queue", "stuck", "rush", "full", "waiting",
];
const CONCRETE_INSTRUCTIONS: &[&str] = &[
    "please", "you should", "you need to", "restart", "press", "scan",
    "raising a ticket", "i will", "i am sending", "i have raised",
];

const SOP_BASE_CONFIDENCE: f64 = 0.65;
const RISKY_BASE_CONFIDENCE: f64 = 0.6;
const LATE_BASE_CONFIDENCE: f64 = 0.6;
const EXPLANATION_BASE_CONFIDENCE: f64 = 0.55;
const MAX_RULE_CONFIDENCE: f64 = 0.95;

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    SopDeviation,
    RiskyRouting,
    LateEscalation,
    IncompleteExplanation,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SopDeviation          => "sop_deviation",
            Self::RiskyRouting          => "risky_routing",
            Self::LateEscalation        => "late_escalation",
            Self::IncompleteExplanation => "incomplete_explanation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaFinding {
    pub issue: IssueType,
    pub issue_detected: bool,
    pub confidence: f64,
    pub reason: String,
}

impl QaFinding {
    fn detected(issue: IssueType, confidence: f64, reason: String) -> Self {
        Self {
            issue,
            issue_detected: true,
            confidence: confidence.clamp(0.0, 1.0),
            reason,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QaReport {
    pub findings: Vec<QaFinding>,
    /// The transcript gave too little to judge; results are defaults.
    pub low_confidence: bool,
}

impl QaReport {
    pub fn issue_detected(&self) -> bool {
        self.findings.iter().any(|f| f.issue_detected)
    }

    /// Highest-confidence finding; earlier checks win ties.
    pub fn top_finding(&self) -> Option<&QaFinding> {
        self.findings
            .iter()
            .rev()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    pub fn has(&self, issue: IssueType) -> bool {
        self.findings.iter().any(|f| f.issue == issue)
    }
}

/// Inputs every check may read.
pub struct QaContext<'a> {
    pub transcript: &'a Transcript,
    pub decision: &'a Decision,
    pub registry: &'a StationRegistry,
    pub snapshot: &'a LoadSnapshot,
    pub rules: &'a DecisionRules,
    pub driver_origin: Option<Coordinate>,
}

type Check = fn(&QaContext) -> Option<QaFinding>;

/// The battery, in reporting order.
const CHECKS: &[(IssueType, Check)] = &[
    (IssueType::SopDeviation, check_sop_deviation),
    (IssueType::RiskyRouting, check_risky_routing),
    (IssueType::LateEscalation, check_late_escalation),
    (IssueType::IncompleteExplanation, check_incomplete_explanation),
];

pub fn analyze(ctx: &QaContext) -> QaReport {
    if ctx.transcript.is_empty() {
        log::warn!("auto-qa: empty transcript, no checks run");
        return QaReport { findings: Vec::new(), low_confidence: true };
    }

    let findings: Vec<QaFinding> = CHECKS
        .iter()
        .filter_map(|(issue, check)| {
            let finding = check(ctx);
            if let Some(f) = &finding {
                log::debug!("auto-qa: {} confidence={:.2}", issue.as_str(), f.confidence);
            }
            finding
        })
        .collect();

    QaReport { findings, low_confidence: ctx.decision.low_confidence }
}

// ── Checks ───────────────────────────────────────────────────────────────────

fn check_sop_deviation(ctx: &QaContext) -> Option<QaFinding> {
    let routed_id = ctx.decision.routed_station()?;
    let origin = ctx.driver_origin.or(ctx.decision.driver_origin())?;
    let routed = ctx.registry.get(routed_id)?;

    let threshold = ctx.rules.sop_load_threshold;
    let policy = ctx.registry.nearest_where(origin, |s| {
        ctx.snapshot.load_ratio(&s.id).is_some_and(|r| r < threshold)
    })?;
    if policy.id == routed.id {
        return None;
    }

    let extra_km = (queue_math::distance_km(origin, routed.location)
        - queue_math::distance_km(origin, policy.location))
    .max(0.0);
    let routed_ratio = ctx.snapshot.load_ratio(&routed.id).unwrap_or(0.0);
    let mut confidence = SOP_BASE_CONFIDENCE + 0.05 * extra_km;
    if routed_ratio >= threshold {
        confidence += 0.10;
    }

    Some(QaFinding::detected(
        IssueType::SopDeviation,
        confidence.min(MAX_RULE_CONFIDENCE),
        format!(
            "Agent routed to Station {} but SOP recommends Station {} (nearest under {:.0}% load)",
            routed.id,
            policy.id,
            threshold * 100.0
        ),
    ))
}

fn check_risky_routing(ctx: &QaContext) -> Option<QaFinding> {
    let routed_id = ctx.decision.routed_station()?;
    let ratio = ctx.snapshot.load_ratio(routed_id)?;
    if ratio <= ctx.rules.risky_load_ratio {
        return None;
    }

    let mut confidence = RISKY_BASE_CONFIDENCE + 2.0 * (ratio - ctx.rules.risky_load_ratio);
    if contains_any(&ctx.transcript.full_text(), CONGESTION_WORDS) {
        confidence += 0.10;
    }

    Some(QaFinding::detected(
        IssueType::RiskyRouting,
        confidence,
        format!(
            "Agent routed driver to Station {routed_id} which is congested ({:.0}% load)",
            ratio * 100.0
        ),
    ))
}

fn check_late_escalation(ctx: &QaContext) -> Option<QaFinding> {
    let mut escalation_words: Vec<&str> = ESCALATION_WORDS.to_vec();
    escalation_words.extend_from_slice(TECHNICIAN_WORDS);
    let turn = ctx.transcript.first_agent_turn_with(&escalation_words)?;

    let agent_text = ctx.transcript.agent_text();
    let overshoot = turn.saturating_sub(ctx.rules.late_escalation_turns);
    let delay_cue = contains_any(
        &ctx.transcript.agent_text_before(&escalation_words),
        DELAY_CUES,
    );
    let long_wait = stated_wait_minutes(&agent_text)
        .filter(|m| *m > ctx.rules.long_wait_minutes);

    if overshoot == 0 && !delay_cue && long_wait.is_none() {
        return None;
    }

    let mut confidence = LATE_BASE_CONFIDENCE + 0.05 * overshoot as f64;
    let mut reasons = Vec::new();
    if overshoot > 0 {
        reasons.push(format!("escalated only after {turn} turns"));
    }
    if delay_cue {
        confidence += 0.10;
        reasons.push("deferred escalation".to_string());
    }
    if let Some(minutes) = long_wait {
        confidence += 0.10;
        reasons.push(format!("left driver facing a {minutes:.0} min wait"));
    }

    Some(QaFinding::detected(
        IssueType::LateEscalation,
        confidence.min(MAX_RULE_CONFIDENCE),
        format!("Late escalation: {}", reasons.join(", ")),
    ))
}

fn check_incomplete_explanation(ctx: &QaContext) -> Option<QaFinding> {
    let agent_text = ctx.transcript.agent_text();
    if agent_text.trim().is_empty() {
        return None;
    }

    let hedges = count_matches(&agent_text, HEDGE_PHRASES);
    let has_instruction = contains_any(&agent_text, INSTRUCTION_VERBS)
        || contains_any(&agent_text, CONCRETE_INSTRUCTIONS);
    let has_question = contains_any(&agent_text, QUESTION_CUES);

    if hedges > 0 {
        return Some(QaFinding::detected(
            IssueType::IncompleteExplanation,
            (EXPLANATION_BASE_CONFIDENCE + 0.1 * hedges as f64).min(MAX_RULE_CONFIDENCE),
            "Agent gave vague or hedged instructions".to_string(),
        ));
    }
    if !has_instruction && !has_question {
        return Some(QaFinding::detected(
            IssueType::IncompleteExplanation,
            EXPLANATION_BASE_CONFIDENCE,
            "Agent gave neither a concrete instruction nor a clarifying question".to_string(),
        ));
    }
    None
}
