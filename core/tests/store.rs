use std::sync::Arc;
use swaptwin_core::{
    config::TwinConfig,
    engine::simulate_network,
    intervention::Intervention,
    pipeline::Pipeline,
    queue_math::Coordinate,
    station::StationRegistry,
    store::AnalysisStore,
    transcript::Transcript,
};

fn store() -> AnalysisStore {
    let store = AnalysisStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn pipeline() -> Pipeline {
    let config = TwinConfig::default_test();
    Pipeline::with_rules(Arc::new(StationRegistry::new(config.stations).unwrap()), config.rules)
}

const FLAGGED: &str = "
    Agent: Please go to Station A, it is close.
    Driver: Okay.
";

const CLEAN: &str = "
    Agent: Please go to Station B in Rajouri Garden, a battery is ready.
    Driver: Thanks.
";

/// Stats count distinct calls, flagged calls, and findings per issue.
#[test]
fn aggregates_count_flagged_calls_and_issues() {
    let s = store();
    let p = pipeline();
    let origin = Some(Coordinate::new(28.6412, 77.1205));

    s.append_analysis(&p.analyze(&Transcript::parse(FLAGGED), "call-1", None).unwrap()).unwrap();
    s.append_analysis(&p.analyze(&Transcript::parse(FLAGGED), "call-1", None).unwrap()).unwrap();
    s.append_analysis(&p.analyze(&Transcript::parse(CLEAN), "call-2", origin).unwrap()).unwrap();

    let stats = s.aggregated_stats().unwrap();
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.flagged_calls, 1);
    assert_eq!(stats.issue_counts.get("risky_routing"), Some(&2));
    assert!(stats.avg_wait_reduction_pct > 0.0);
    assert_eq!(s.flagged_calls().unwrap(), vec!["call-1".to_string()]);
}

/// A stored report reads back equal to the one written.
#[test]
fn stored_report_reads_back_unchanged() {
    let s = store();
    let report = pipeline().analyze(&Transcript::parse(FLAGGED), "call-9", None).unwrap();
    let entry_id = s.append_analysis(&report).unwrap();

    let stored = s.analyses_for_call("call-9").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].entry_id, entry_id);
    assert_eq!(stored[0].report, report);
    assert!(s.analyses_for_call("missing").unwrap().is_empty());
}

/// A fresh store reports no calls, no findings and a 0% flagged share.
#[test]
fn empty_store_has_zeroed_stats() {
    let stats = store().aggregated_stats().unwrap();
    assert_eq!(stats.total_calls, 0);
    assert_eq!(stats.flagged_calls, 0);
    assert!(stats.issue_counts.is_empty());
    assert_eq!(stats.flagged_share_pct(), 0.0);
}

/// A saved network run is counted and reads back with its interventions.
#[test]
fn network_runs_are_saved() {
    let s = store();
    let interventions = vec![Intervention::ShiftDemand { factor: 1.5, hour_window: (8, 22) }];
    let result = simulate_network(&TwinConfig::default_test().stations, &interventions).unwrap();
    s.save_network_run(&result, &interventions).unwrap();

    assert_eq!(s.network_run_count().unwrap(), 1);
    let record = s.network_run(&result.run_id).unwrap().unwrap();
    assert_eq!(record.total_lost_swaps, result.total_lost_swaps);
    assert_eq!(record.interventions, interventions);
    assert!(s.network_run("nope").unwrap().is_none());
}

/// Running migrations twice is harmless.
#[test]
fn migrate_is_repeatable() {
    let s = store();
    s.migrate().unwrap();
}
