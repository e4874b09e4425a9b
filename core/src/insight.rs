//! Plain-language insight for supervisors, built from the QA report and
//! the counterfactual comparison.

use crate::{
    auto_qa::QaReport,
    counterfactual::ComparisonResult,
    decision::{DecisionParams, EscalationAction, ResponseStyle, SafetyAdvice},
    digital_twin::SimulatedOutcome,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub issue_summary: String,
    pub recommendation: String,
    pub impact_summary: String,
    pub simulation_narrative: String,
    pub formatted_output: String,
}

impl Insight {
    pub fn generate(qa: &QaReport, comparison: &ComparisonResult) -> Self {
        let issue_summary = issue_summary(qa);
        let recommendation = recommendation(comparison);
        let impact_summary = impact_summary(comparison);
        let simulation_narrative = narrative(comparison);
        let formatted_output = format_output(
            &issue_summary,
            &recommendation,
            &impact_summary,
            comparison,
        );
        Self {
            issue_summary,
            recommendation,
            impact_summary,
            simulation_narrative,
            formatted_output,
        }
    }
}

fn issue_summary(qa: &QaReport) -> String {
    match qa.top_finding() {
        Some(top) if qa.findings.len() > 1 => {
            format!("{} (+{} more issue(s))", top.reason, qa.findings.len() - 1)
        }
        Some(top) => top.reason.clone(),
        None if qa.low_confidence => {
            "Not enough transcript content to evaluate the call".to_string()
        }
        None => "No QA issues detected".to_string(),
    }
}

fn recommendation(comparison: &ComparisonResult) -> String {
    if comparison.best_is_actual() {
        return "The agent's decision was optimal under current station load".to_string();
    }
    let best = comparison.best_outcome();
    match &best.decision.params {
        DecisionParams::StationRouting { station_id, .. } => format!(
            "Route the driver to Station {station_id} instead of Station {}",
            comparison.actual().station_id
        ),
        DecisionParams::EscalationTiming { action, .. } => match action {
            EscalationAction::Immediate => {
                "Escalate to a supervisor as soon as the issue is reported".to_string()
            }
            EscalationAction::None => "Resolve the issue on the call without escalating".to_string(),
            EscalationAction::Delayed => "Escalate after first-line troubleshooting".to_string(),
        },
        DecisionParams::ResponseStructure { style } => match style {
            ResponseStyle::Clarifying => {
                "Ask the driver a clarifying question before giving instructions".to_string()
            }
            _ => "Give the driver one clear, concrete instruction".to_string(),
        },
        DecisionParams::TechnicalSafety { advice, .. } => match advice {
            SafetyAdvice::RemoteEscalation => {
                "Escalate for a remote unlock before dispatching a technician".to_string()
            }
            SafetyAdvice::RedirectToStation => format!(
                "Redirect the driver to Station {} while the dock is serviced",
                best.station_id
            ),
            SafetyAdvice::DispatchTechnician => "Dispatch a field technician".to_string(),
        },
    }
}

fn impact_summary(comparison: &ComparisonResult) -> String {
    let Some(improvement) = comparison.best_improvement() else {
        return "No alternative improves on the actual outcome".to_string();
    };
    let mut effects = Vec::new();
    if improvement.wait_reduction_pct > 0.0 {
        effects.push(format!("reduce wait time by {:.0}%", improvement.wait_reduction_pct));
    }
    if improvement.congestion_downgraded {
        effects.push("lower congestion risk".to_string());
    }
    if improvement.repeat_call_downgraded {
        effects.push("lower repeat-call risk".to_string());
    }
    if effects.is_empty() {
        return "This would give a marginally better outcome".to_string();
    }
    format!("This would likely {}.", effects.join(", "))
}

fn narrative(comparison: &ComparisonResult) -> String {
    let actual = comparison.actual();
    let mut text = format!("Actual: {}", outcome_sentence(actual));
    if comparison.best_is_actual() {
        text.push_str(&format!(
            " None of the {} alternative(s) did better.",
            comparison.alternatives().len()
        ));
    } else {
        text.push_str(&format!(" Best: {}", outcome_sentence(comparison.best_outcome())));
    }
    text
}

fn outcome_sentence(outcome: &SimulatedOutcome) -> String {
    format!(
        "{}, expected wait {:.1} min ({} congestion, {} repeat-call risk).",
        outcome.description,
        outcome.expected_wait_minutes,
        outcome.congestion_risk,
        outcome.repeat_call_risk
    )
}

fn format_output(
    issue: &str,
    recommendation: &str,
    impact: &str,
    comparison: &ComparisonResult,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Issue: {issue}");
    let _ = writeln!(out, "Recommendation: {recommendation}");
    let _ = writeln!(out, "Impact: {impact}");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<32} {:>10} {:>11} {:>11}",
        "Option", "Wait(min)", "Congestion", "RepeatCall"
    );
    for (i, outcome) in comparison.outcomes.iter().enumerate() {
        let marker = match (outcome.is_actual, i == comparison.best) {
            (true, true)  => " [actual, best]",
            (true, false) => " [actual]",
            (false, true) => " [best]",
            _ => "",
        };
        let _ = writeln!(
            out,
            "{:<32} {:>10.1} {:>11} {:>11}{marker}",
            outcome.option,
            outcome.expected_wait_minutes,
            outcome.congestion_risk.to_string(),
            outcome.repeat_call_risk.to_string(),
        );
    }
    for excluded in &comparison.excluded {
        let _ = writeln!(out, "(excluded) {}: {}", excluded.option, excluded.reason);
    }
    out
}
