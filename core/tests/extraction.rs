use swaptwin_core::{
    auto_qa::{self, IssueType, QaContext},
    config::{DecisionRules, TwinConfig},
    decision::{
        Decision, DecisionParams, DecisionType, EscalationAction, ResponseStyle, SafetyAdvice,
    },
    decision_extractor::{extract, ExtractionContext},
    queue_math::Coordinate,
    station::{LoadSnapshot, StationRegistry},
    transcript::Transcript,
};

fn registry() -> StationRegistry {
    StationRegistry::new(TwinConfig::default_test().stations).unwrap()
}

fn decide(raw: &str, origin: Option<Coordinate>) -> Decision {
    let registry = registry();
    let rules = DecisionRules::default();
    let transcript = Transcript::parse(raw);
    extract(&ExtractionContext::new(&transcript, &registry, &rules, origin))
}

/// A fault with a technician mention is technical even when a supervisor is named.
#[test]
fn technical_fault_outranks_escalation() {
    let d = decide(
        "Driver: The scanner is not working and my battery is jammed.
         Agent: I will ask my supervisor and send a technician.",
        None,
    );
    assert_eq!(d.decision_type, DecisionType::TechnicalSafety);
    assert_eq!(d.matched_rule, "technical_fault");
}

/// Escalation wording beats a station instruction in the same turn.
#[test]
fn escalation_outranks_routing() {
    let d = decide(
        "Agent: I will transfer you to my supervisor right away, then go to Station B.",
        None,
    );
    assert!(matches!(
        d.params,
        DecisionParams::EscalationTiming { action: EscalationAction::Immediate, turns_before_escalation: 0 }
    ));
}

/// A locality name resolves to its station.
#[test]
fn routing_recognises_locality_names() {
    let d = decide(
        "Driver: Where should I swap?
         Agent: Head to Rajouri Garden, the queue there is short.",
        None,
    );
    assert_eq!(d.routed_station(), Some("B"));
}

/// When the agent changes the instruction, the last one counts.
#[test]
fn last_instruction_wins() {
    let d = decide(
        "Agent: Go to Station A.
         Driver: It is full there.
         Agent: Sorry, please go to Station D instead.",
        None,
    );
    assert_eq!(d.routed_station(), Some("D"));
}

/// A question with no instruction is clarifying and anchors on the nearest station.
#[test]
fn question_without_instruction_is_clarifying() {
    let d = decide(
        "Driver: I need a swap.
         Agent: Would you like the nearest station or the least busy one?",
        Some(Coordinate::new(28.5280, 77.2650)),
    );
    assert!(matches!(
        d.params,
        DecisionParams::ResponseStructure { style: ResponseStyle::Clarifying }
    ));
    // No station named: falls back to the one nearest the driver.
    assert_eq!(d.station_ref, "C");
}

/// Deferring before the escalation marks it delayed.
#[test]
fn delay_cue_makes_escalation_late() {
    let d = decide(
        "Driver: My swap failed.
         Agent: Try first restarting the app, I can escalate later.",
        None,
    );
    assert!(matches!(
        d.params,
        DecisionParams::EscalationTiming { action: EscalationAction::Delayed, .. }
    ));
}

/// Waiting on the line after an immediate escalation is not a deferral.
#[test]
fn delay_cue_after_escalation_keeps_it_immediate() {
    let raw = "Driver: I was charged twice.
               Agent: I am escalating this to my supervisor right now, please wait on the line.";
    let d = decide(raw, None);
    assert!(matches!(
        d.params,
        DecisionParams::EscalationTiming { action: EscalationAction::Immediate, turns_before_escalation: 1 }
    ));

    let registry = registry();
    let rules = DecisionRules::default();
    let snapshot = LoadSnapshot::from_registry(&registry);
    let transcript = Transcript::parse(raw);
    let report = auto_qa::analyze(&QaContext {
        transcript: &transcript,
        decision: &d,
        registry: &registry,
        snapshot: &snapshot,
        rules: &rules,
        driver_origin: None,
    });
    assert!(!report.has(IssueType::LateEscalation));
}

/// A safety redirect targets the station the agent sends the driver to.
#[test]
fn safety_redirect_targets_the_instructed_station() {
    let d = decide(
        "Driver: My battery is stuck in the dock at Station C.
         Agent: For safety reasons do not pull it, please go to Station B instead.",
        None,
    );
    assert!(matches!(
        d.params,
        DecisionParams::TechnicalSafety { advice: SafetyAdvice::RedirectToStation, .. }
    ));
    assert_eq!(d.station_ref, "B");
}

/// A technician dispatch stays at the station the driver reported.
#[test]
fn technician_dispatch_stays_at_reported_station() {
    let d = decide(
        "Driver: My battery is stuck in the dock at Station C.
         Agent: For safety do not pull it, a technician will come, or go to Station B.",
        None,
    );
    assert!(matches!(
        d.params,
        DecisionParams::TechnicalSafety { advice: SafetyAdvice::DispatchTechnician, .. }
    ));
    assert_eq!(d.station_ref, "C");
}

/// Risky routing and a hedged explanation are both reported on one call.
#[test]
fn qa_checks_are_independent() {
    let registry = registry();
    let rules = DecisionRules::default();
    let snapshot = LoadSnapshot::from_registry(&registry);
    let transcript = Transcript::parse(
        "Agent: Maybe go to Station A, I think it is probably fine.
         Driver: The queue there is long.",
    );
    let decision = extract(&ExtractionContext::new(&transcript, &registry, &rules, None));
    let report = auto_qa::analyze(&QaContext {
        transcript: &transcript,
        decision: &decision,
        registry: &registry,
        snapshot: &snapshot,
        rules: &rules,
        driver_origin: None,
    });

    assert!(report.has(IssueType::RiskyRouting));
    assert!(report.has(IssueType::IncompleteExplanation));
    assert!(report.findings.iter().all(|f| (0.0..=1.0).contains(&f.confidence)));
    let top = report.top_finding().unwrap();
    assert!(report.findings.iter().all(|f| f.confidence <= top.confidence));
}
