//! Hourly snapshots and end-of-run aggregation for network runs.

use crate::{
    station::StationLoadState,
    types::{Hour, RunId, StationId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of every station at the end of one hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlySnapshot {
    pub hour: Hour,
    pub stations: BTreeMap<StationId, StationLoadState>,
}

impl HourlySnapshot {
    pub fn lost_this_hour(&self, previous: Option<&HourlySnapshot>) -> u64 {
        self.stations
            .iter()
            .map(|(id, s)| {
                let before = previous
                    .and_then(|p| p.stations.get(id))
                    .map_or(0, |p| p.swaps_lost);
                s.swaps_lost.saturating_sub(before)
            })
            .sum()
    }

    pub fn total_arrivals(&self) -> u64 {
        self.stations.values().map(|s| s.arrivals as u64).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StationSummary {
    pub swaps: u64,
    pub lost_swaps: u64,
    pub avg_wait_minutes: f64,
    pub avg_utilization_pct: f64,
    pub peak_queue: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSimulationResult {
    pub run_id: RunId,
    pub seed: u64,
    /// Hours 0..=23 in order.
    pub hours: Vec<HourlySnapshot>,
    pub total_swaps: u64,
    pub total_lost_swaps: u64,
    /// Mean expected wait over every station-hour.
    pub avg_wait_minutes: f64,
    pub stations: BTreeMap<StationId, StationSummary>,
}

impl NetworkSimulationResult {
    pub fn aggregate(run_id: RunId, seed: u64, hours: Vec<HourlySnapshot>) -> Self {
        let mut stations: BTreeMap<StationId, StationSummary> = BTreeMap::new();
        let mut samples: BTreeMap<&str, u32> = BTreeMap::new();
        let mut wait_sum = 0.0;
        let mut wait_samples = 0u32;

        for snapshot in &hours {
            for (id, load) in &snapshot.stations {
                let summary = stations.entry(id.clone()).or_default();
                summary.avg_wait_minutes += load.expected_wait_minutes;
                summary.avg_utilization_pct += load.charger_utilization_pct;
                summary.peak_queue = summary.peak_queue.max(load.queue_length);
                *samples.entry(id.as_str()).or_default() += 1;
                wait_sum += load.expected_wait_minutes;
                wait_samples += 1;
            }
        }

        // Cumulative counters: the last hour holds the run totals.
        if let Some(last) = hours.last() {
            for (id, load) in &last.stations {
                if let Some(summary) = stations.get_mut(id) {
                    summary.swaps = load.swaps_served;
                    summary.lost_swaps = load.swaps_lost;
                }
            }
        }
        for (id, summary) in stations.iter_mut() {
            let n = samples.get(id.as_str()).copied().unwrap_or(0);
            if n > 0 {
                summary.avg_wait_minutes /= n as f64;
                summary.avg_utilization_pct /= n as f64;
            }
        }

        let total_swaps = stations.values().map(|s| s.swaps).sum();
        let total_lost_swaps = stations.values().map(|s| s.lost_swaps).sum();
        let avg_wait_minutes = if wait_samples > 0 {
            wait_sum / wait_samples as f64
        } else {
            0.0
        };

        Self {
            run_id,
            seed,
            hours,
            total_swaps,
            total_lost_swaps,
            avg_wait_minutes,
            stations,
        }
    }

    pub fn hour(&self, hour: Hour) -> Option<&HourlySnapshot> {
        self.hours.iter().find(|h| h.hour == hour)
    }

    /// Lost swaps per hour, network-wide.
    pub fn lost_by_hour(&self) -> Vec<u64> {
        self.hours
            .iter()
            .enumerate()
            .map(|(i, h)| h.lost_this_hour(i.checked_sub(1).and_then(|p| self.hours.get(p))))
            .collect()
    }
}
