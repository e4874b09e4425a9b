//! Two engines, same seed, same interventions.
//! They must produce byte-identical event logs.

use swaptwin_core::{
    config::{NetworkConfig, TwinConfig},
    engine::NetworkEngine,
    intervention::Intervention,
};

fn noisy_config(seed: u64) -> NetworkConfig {
    NetworkConfig { demand_jitter: 0.25, seed, ..Default::default() }
}

fn run_log(seed: u64) -> Vec<String> {
    let catalog = TwinConfig::default_test().stations;
    let interventions = [Intervention::ShiftDemand { factor: 1.2, hour_window: (17, 21) }];
    let mut engine = NetworkEngine::build(
        format!("det-test-{seed}"),
        &catalog,
        &interventions,
        &noisy_config(seed),
    )
    .expect("build engine");
    engine.run().expect("run");
    engine.event_log().iter().map(|e| e.payload.clone()).collect()
}

/// Two runs with the same seed and inputs log the same events in the same order.
#[test]
fn same_seed_produces_identical_event_logs() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let log_a = run_log(SEED);
    let log_b = run_log(SEED);

    assert_eq!(log_a.len(), log_b.len(), "event log lengths differ");
    for (i, (a, b)) in log_a.iter().zip(log_b.iter()).enumerate() {
        assert_eq!(a, b, "event log diverged at entry {i}:\n  A: {a}\n  B: {b}");
    }
}

/// With jitter on, a different seed changes hourly arrivals.
#[test]
fn different_seeds_change_demand() {
    let demand = |seed| -> Vec<String> {
        run_log(seed)
            .into_iter()
            .filter(|p| p.contains("\"demand_arrived\""))
            .map(|p| p.replace(&format!("det-test-{seed}"), ""))
            .collect()
    };
    assert_ne!(demand(42), demand(99), "seed is not being used");
}

/// The log opens with run_initialized, then one intervention_applied per intervention, then hour 0.
#[test]
fn run_log_starts_with_initialisation_and_interventions() {
    let catalog = TwinConfig::default_test().stations;
    let mut engine = NetworkEngine::build(
        "log-test".into(),
        &catalog,
        &[Intervention::ModifyChargers { station_id: "B".into(), new_count: 6 }],
        &NetworkConfig::default(),
    )
    .unwrap();
    engine.run().unwrap();

    let types: Vec<&str> = engine.event_log().iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(&types[..3], &["run_initialized", "intervention_applied", "hour_started"]);
    assert_eq!(types.last(), Some(&"hour_completed"));
    assert!(engine.events_for_hour(23).any(|e| e.event_type == "hour_completed"));
    assert!(engine.clock.is_finished());
}
