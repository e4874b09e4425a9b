//! Per-call analysis pipeline.
//!
//! ORDER (fixed):
//!   1. Materialise a fresh LoadSnapshot from the registry
//!   2. Extract the agent's decision
//!   3. Auto-QA checks
//!   4. Counterfactual comparison (micro twin per option)
//!   5. Insight text
//!
//! The registry is read-only and shared; the snapshot belongs to this call
//! alone. Running `analyze` twice on the same input yields equal reports.

use crate::{
    auto_qa::{self, QaContext, QaReport},
    config::{DecisionRules, TwinConfig},
    counterfactual::{Comparator, ComparisonResult},
    decision::Decision,
    decision_extractor::{self, ExtractionContext},
    error::TwinResult,
    insight::Insight,
    queue_math::Coordinate,
    station::{LoadSnapshot, StationRegistry},
    transcript::Transcript,
    types::CallId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub call_id: CallId,
    pub driver_origin: Option<Coordinate>,
    pub qa: QaReport,
    pub decision: Decision,
    pub comparison: ComparisonResult,
    pub insight: Insight,
}

impl AnalysisReport {
    pub fn flagged(&self) -> bool {
        self.qa.issue_detected()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Arc<StationRegistry>,
    rules: DecisionRules,
}

impl Pipeline {
    pub fn new(registry: Arc<StationRegistry>) -> Self {
        Self::with_rules(registry, DecisionRules::default())
    }

    pub fn with_rules(registry: Arc<StationRegistry>, rules: DecisionRules) -> Self {
        Self { registry, rules }
    }

    pub fn from_config(config: &TwinConfig) -> TwinResult<Self> {
        let registry = StationRegistry::new(config.stations.clone())?;
        Ok(Self::with_rules(Arc::new(registry), config.rules.clone()))
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &DecisionRules {
        &self.rules
    }

    pub fn analyze(
        &self,
        transcript: &Transcript,
        call_id: impl Into<CallId>,
        driver_origin: Option<Coordinate>,
    ) -> TwinResult<AnalysisReport> {
        let call_id = call_id.into();
        let registry = self.registry.as_ref();
        let snapshot = LoadSnapshot::from_registry(registry);

        let extraction = ExtractionContext::new(transcript, registry, &self.rules, driver_origin);
        let decision = decision_extractor::extract(&extraction);

        let qa = auto_qa::analyze(&QaContext {
            transcript,
            decision: &decision,
            registry,
            snapshot: &snapshot,
            rules: &self.rules,
            driver_origin,
        });

        let comparison = Comparator::new(registry, &snapshot, &self.rules, driver_origin)
            .compare(&decision)?;
        let insight = Insight::generate(&qa, &comparison);

        log::info!(
            "call {call_id}: decision={} findings={} best='{}'",
            decision.decision_type.as_str(),
            qa.findings.len(),
            comparison.best_outcome().option
        );

        Ok(AnalysisReport { call_id, driver_origin, qa, decision, comparison, insight })
    }
}
