//! The agent decision under evaluation.
//!
//! Closed set of decision types. There is no "unknown": extraction always
//! lands on one of these four, falling back to `ResponseStructure`.

use crate::{
    queue_math::{Clarity, Coordinate},
    types::StationId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecisionType {
    StationRouting,
    EscalationTiming,
    ResponseStructure,
    TechnicalSafety,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StationRouting    => "StationRouting",
            Self::EscalationTiming  => "EscalationTiming",
            Self::ResponseStructure => "ResponseStructure",
            Self::TechnicalSafety   => "TechnicalSafety",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    Immediate,
    Delayed,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    /// A concrete instruction.
    Direct,
    /// A question to pin down the driver's need first.
    Clarifying,
    /// Hedged or non-committal.
    Vague,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAdvice {
    DispatchTechnician,
    RemoteEscalation,
    RedirectToStation,
}

/// Decision-specific parameters, one variant per decision type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionParams {
    StationRouting {
        station_id: StationId,
        driver_origin: Option<Coordinate>,
    },
    EscalationTiming {
        action: EscalationAction,
        /// Turns elapsed before the agent escalated (0 when it never did).
        turns_before_escalation: usize,
    },
    ResponseStructure {
        style: ResponseStyle,
    },
    TechnicalSafety {
        advice: SafetyAdvice,
        stated_wait_minutes: Option<f64>,
    },
}

impl DecisionParams {
    pub fn decision_type(&self) -> DecisionType {
        match self {
            Self::StationRouting { .. }    => DecisionType::StationRouting,
            Self::EscalationTiming { .. }  => DecisionType::EscalationTiming,
            Self::ResponseStructure { .. } => DecisionType::ResponseStructure,
            Self::TechnicalSafety { .. }   => DecisionType::TechnicalSafety,
        }
    }
}

/// One extracted (or counterfactual) decision. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub decision_type: DecisionType,
    pub params: DecisionParams,
    /// Station the call is about. For routing this is the routed station;
    /// for other types it anchors the queue projection.
    pub station_ref: StationId,
    pub clarity: Clarity,
    /// Set when extraction fell back to a default.
    pub low_confidence: bool,
    /// Name of the extraction rule (or counterfactual generator) that built it.
    pub matched_rule: String,
}

impl Decision {
    pub fn new(params: DecisionParams, station_ref: impl Into<StationId>) -> Self {
        Self {
            decision_type: params.decision_type(),
            params,
            station_ref: station_ref.into(),
            clarity: Clarity::Clear,
            low_confidence: false,
            matched_rule: String::new(),
        }
    }

    pub fn routing(station_id: impl Into<StationId>, driver_origin: Option<Coordinate>) -> Self {
        let station_id = station_id.into();
        Self::new(
            DecisionParams::StationRouting { station_id: station_id.clone(), driver_origin },
            station_id,
        )
    }

    pub fn escalation(
        action: EscalationAction,
        turns_before_escalation: usize,
        station_ref: impl Into<StationId>,
    ) -> Self {
        Self::new(DecisionParams::EscalationTiming { action, turns_before_escalation }, station_ref)
    }

    pub fn response(style: ResponseStyle, station_ref: impl Into<StationId>) -> Self {
        let mut decision = Self::new(DecisionParams::ResponseStructure { style }, station_ref);
        if style == ResponseStyle::Vague {
            decision.clarity = Clarity::Vague;
        }
        decision
    }

    pub fn technical(
        advice: SafetyAdvice,
        stated_wait_minutes: Option<f64>,
        station_ref: impl Into<StationId>,
    ) -> Self {
        Self::new(DecisionParams::TechnicalSafety { advice, stated_wait_minutes }, station_ref)
    }

    pub fn with_clarity(mut self, clarity: Clarity) -> Self {
        self.clarity = clarity;
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.matched_rule = rule.into();
        self
    }

    pub fn low_confidence(mut self) -> Self {
        self.low_confidence = true;
        self
    }

    /// Station the decision routes to, if it is a routing decision.
    pub fn routed_station(&self) -> Option<&str> {
        match &self.params {
            DecisionParams::StationRouting { station_id, .. } => Some(station_id),
            _ => None,
        }
    }

    pub fn driver_origin(&self) -> Option<Coordinate> {
        match &self.params {
            DecisionParams::StationRouting { driver_origin, .. } => *driver_origin,
            _ => None,
        }
    }

    /// Short human label used as the outcome's option name.
    pub fn label(&self) -> String {
        match &self.params {
            DecisionParams::StationRouting { station_id, .. } => {
                format!("Route to Station {station_id}")
            }
            DecisionParams::EscalationTiming { action, .. } => match action {
                EscalationAction::Immediate => "Escalate immediately".into(),
                EscalationAction::Delayed   => "Delayed escalation".into(),
                EscalationAction::None      => "No escalation".into(),
            },
            DecisionParams::ResponseStructure { style } => match style {
                ResponseStyle::Direct     => "Direct instruction".into(),
                ResponseStyle::Clarifying => "Ask clarifying question".into(),
                ResponseStyle::Vague      => "Vague response".into(),
            },
            DecisionParams::TechnicalSafety { advice, .. } => match advice {
                SafetyAdvice::DispatchTechnician => "Dispatch field technician".into(),
                SafetyAdvice::RemoteEscalation   => "Escalate for remote unlock".into(),
                SafetyAdvice::RedirectToStation  => {
                    format!("Redirect to Station {}", self.station_ref)
                }
            },
        }
    }
}
