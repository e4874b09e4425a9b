use swaptwin_core::{
    config::{NetworkConfig, TwinConfig},
    engine::{simulate_network, simulate_network_with},
    error::TwinError,
    intervention::Intervention,
    queue_math::Coordinate,
    station::Station,
};

fn catalog() -> Vec<Station> {
    TwinConfig::default_test().stations
}

fn surge() -> Intervention {
    Intervention::ShiftDemand { factor: 1.5, hour_window: (8, 22) }
}

fn station_e() -> Station {
    Station {
        id: "E".into(),
        name: "Station E - Subhash Nagar".into(),
        location: Coordinate::new(28.6400, 77.1050),
        capacity: 12,
        avg_service_minutes: 4.0,
        swap_bays: 3,
        initial_inventory: None,
        baseline_load: 0,
        demand_weight: 1.0,
        aliases: vec![],
    }
}

/// A baseline run has 24 hourly snapshots covering every station.
#[test]
fn baseline_covers_every_hour_and_station() {
    let result = simulate_network(&catalog(), &[]).unwrap();
    assert_eq!(result.hours.len(), 24);
    for (i, snapshot) in result.hours.iter().enumerate() {
        assert_eq!(snapshot.hour as usize, i);
        assert_eq!(snapshot.stations.len(), 4);
        for load in snapshot.stations.values() {
            assert!(load.occupied_slots <= load.capacity);
        }
    }
    assert_eq!(result.stations.len(), 4);
    assert!(result.total_swaps > 0);
}

/// A 1.5x surge over hours 8 to 22 loses strictly more swaps.
#[test]
fn demand_surge_strictly_increases_lost_swaps() {
    let baseline = simulate_network(&catalog(), &[]).unwrap();
    let surged = simulate_network(&catalog(), &[surge()]).unwrap();
    assert!(
        surged.total_lost_swaps > baseline.total_lost_swaps,
        "surge {} vs baseline {}",
        surged.total_lost_swaps,
        baseline.total_lost_swaps
    );
}

/// Hours before the surge match baseline; arrivals after it match baseline.
#[test]
fn surge_leaves_hours_before_window_untouched() {
    let baseline = simulate_network(&catalog(), &[]).unwrap();
    let surged = simulate_network(&catalog(), &[surge()]).unwrap();

    for hour in 0..8 {
        assert_eq!(baseline.hours[hour].stations, surged.hours[hour].stations, "hour {hour}");
    }
    // Queues carry over past the window, but demand itself does not shift.
    for hour in 22..24 {
        for (id, load) in &baseline.hours[hour].stations {
            assert_eq!(load.arrivals, surged.hours[hour].stations[id].arrivals, "hour {hour} {id}");
        }
    }
    assert!(surged.hours[8].total_arrivals() > baseline.hours[8].total_arrivals());
}

/// An added station takes part in the run and serves swaps.
#[test]
fn adding_a_station_adds_capacity() {
    let baseline = simulate_network(&catalog(), &[]).unwrap();
    let expanded = simulate_network(
        &catalog(),
        &[Intervention::AddStation { station: station_e() }],
    )
    .unwrap();

    assert_eq!(expanded.stations.len(), 5);
    assert!(expanded.stations["E"].swaps > 0);
    assert!(expanded.total_swaps > baseline.total_swaps);
    assert_eq!(baseline.stations["A"], expanded.stations["A"]);
}

/// Raising Station A to 20 chargers cuts its lost swaps.
#[test]
fn more_chargers_cut_losses_at_that_station() {
    let baseline = simulate_network(&catalog(), &[]).unwrap();
    let upgraded = simulate_network(
        &catalog(),
        &[Intervention::ModifyChargers { station_id: "A".into(), new_count: 20 }],
    )
    .unwrap();

    assert!(baseline.stations["A"].lost_swaps > 0);
    assert!(upgraded.stations["A"].lost_swaps < baseline.stations["A"].lost_swaps);
    assert_eq!(upgraded.hours[0].stations["A"].capacity, 20);
}

/// Any invalid intervention rejects the run before hour 0.
#[test]
fn invalid_interventions_reject_the_whole_run() {
    let cases = vec![
        Intervention::ModifyChargers { station_id: "ZZ".into(), new_count: 4 },
        Intervention::ModifyChargers { station_id: "A".into(), new_count: -3 },
        Intervention::AddStation { station: catalog()[1].clone() },
        Intervention::ShiftDemand { factor: -1.0, hour_window: (8, 22) },
        Intervention::ShiftDemand { factor: 1.5, hour_window: (22, 8) },
        Intervention::ShiftDemand { factor: 1.5, hour_window: (0, 25) },
    ];
    for bad in cases {
        let err = simulate_network(&catalog(), &[surge(), bad.clone()]).unwrap_err();
        assert!(
            matches!(err, TwinError::InvalidInterventionConfig { .. }),
            "{bad:?} gave {err}"
        );
    }
}

/// A malformed demand curve is a config error.
#[test]
fn invalid_network_config_is_rejected() {
    let config = NetworkConfig { demand_curve_hourly: vec![0.5; 12], ..Default::default() };
    let err = simulate_network_with(&catalog(), &[], &config).unwrap_err();
    assert!(matches!(err, TwinError::Config { .. }));
}

/// Per-station summaries add up to the hourly snapshots.
#[test]
fn summaries_agree_with_hourly_totals() {
    let result = simulate_network(&catalog(), &[surge()]).unwrap();
    let lost: u64 = result.lost_by_hour().iter().sum();
    assert_eq!(lost, result.total_lost_swaps);
    let last = result.hours.last().unwrap();
    let served: u64 = last.stations.values().map(|s| s.swaps_served).sum();
    assert_eq!(served, result.total_swaps);
}
