//! Station catalog and per-run load state.
//!
//! Two state scopes, never merged:
//!   - `StationRegistry` is the long-lived, read-only catalog. It may be
//!     shared across threads and analyses.
//!   - `LoadSnapshot` / `StationLoadState` are materialised fresh for one
//!     analysis or one network run and owned by it. Nothing outside that
//!     run can observe or mutate them.

use crate::{
    error::{TwinError, TwinResult},
    queue_math::{self, Coordinate, RiskLevel},
    types::StationId,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

static STATION_REF_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(?:station|stn)\s*#?\s*([a-z0-9][a-z0-9-]*)\b").ok());

fn default_swap_bays() -> u32 { 2 }
fn default_demand_weight() -> f64 { 1.0 }

/// Immutable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub location: Coordinate,
    /// Chargers / service slots.
    pub capacity: u32,
    /// Minutes one bay needs for one swap.
    pub avg_service_minutes: f64,
    #[serde(default = "default_swap_bays")]
    pub swap_bays: u32,
    #[serde(default)]
    pub initial_inventory: Option<u32>,
    /// Synthetic "live" queue read by the micro twin.
    #[serde(default)]
    pub baseline_load: u32,
    /// Scales the network demand curve for this station.
    #[serde(default = "default_demand_weight")]
    pub demand_weight: f64,
    /// Extra lowercase place names drivers and agents use for the station.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Station {
    /// Swaps per minute per bay.
    pub fn service_rate(&self) -> f64 {
        if self.avg_service_minutes > 0.0 {
            1.0 / self.avg_service_minutes
        } else {
            0.0
        }
    }

    /// "Station B - Rajouri Garden" -> "rajouri garden".
    pub fn locality(&self) -> Option<String> {
        self.name
            .split_once(" - ")
            .map(|(_, place)| place.trim().to_lowercase())
            .filter(|place| !place.is_empty())
    }

    fn place_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locality().into_iter().collect();
        names.extend(self.aliases.iter().map(|a| a.to_lowercase()));
        names
    }

    pub fn validate(&self) -> TwinResult<()> {
        if self.id.trim().is_empty() {
            return Err(TwinError::Config { reason: "station id must not be empty".into() });
        }
        if !(self.avg_service_minutes.is_finite() && self.avg_service_minutes > 0.0) {
            return Err(TwinError::Config {
                reason: format!("station {} has non-positive service time", self.id),
            });
        }
        if !(self.demand_weight.is_finite() && self.demand_weight >= 0.0) {
            return Err(TwinError::Config {
                reason: format!("station {} has invalid demand weight", self.id),
            });
        }
        Ok(())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StationRegistry {
    /// Sorted by id.
    stations: Vec<Station>,
}

impl StationRegistry {
    pub fn new(mut stations: Vec<Station>) -> TwinResult<Self> {
        if stations.is_empty() {
            return Err(TwinError::Config { reason: "station catalog is empty".into() });
        }
        let mut seen = HashSet::new();
        for station in &stations {
            station.validate()?;
            if !seen.insert(station.id.clone()) {
                return Err(TwinError::Config {
                    reason: format!("duplicate station id {}", station.id),
                });
            }
        }
        stations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { stations })
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn require(&self, id: &str) -> TwinResult<&Station> {
        self.get(id).ok_or_else(|| TwinError::station_not_found(id))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Lowest-id station; the conservative fallback reference.
    pub fn default_station(&self) -> &Station {
        // Non-empty by construction.
        &self.stations[0]
    }

    /// Nearest station to `origin` among those accepted by `filter`.
    /// Ties resolve to the lower id.
    pub fn nearest_where<F>(&self, origin: Coordinate, filter: F) -> Option<&Station>
    where
        F: Fn(&Station) -> bool,
    {
        self.stations
            .iter()
            .filter(|s| filter(s))
            .map(|s| (queue_math::distance_km(origin, s.location), s))
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)))
            .map(|(_, s)| s)
    }

    pub fn nearest(&self, origin: Coordinate) -> Option<&Station> {
        self.nearest_where(origin, |_| true)
    }

    /// Every station mentioned in `text`, in order of first mention.
    /// Matches "station B" / "stn 402" style ids and locality names.
    pub fn mentions_in(&self, text: &str) -> Vec<&Station> {
        let lower = text.to_lowercase();
        let mut hits: Vec<(usize, &Station)> = Vec::new();

        if let Some(re) = STATION_REF_RE.as_ref() {
            for caps in re.captures_iter(&lower) {
                let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else { continue };
                if let Some(station) =
                    self.stations.iter().find(|s| s.id.eq_ignore_ascii_case(id.as_str()))
                {
                    hits.push((whole.start(), station));
                }
            }
        }

        for station in &self.stations {
            for place in station.place_names() {
                if let Some(pos) = lower.find(&place) {
                    hits.push((pos, station));
                }
            }
        }

        hits.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| a.id.cmp(&b.id)));
        let mut seen = HashSet::new();
        hits.into_iter()
            .filter(|(_, s)| seen.insert(s.id.as_str()))
            .map(|(_, s)| s)
            .collect()
    }
}

// ── Load state ───────────────────────────────────────────────────────────────

/// Load of one station at one instant of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationLoadState {
    pub station_id: StationId,
    /// Capacity in effect for this run (after interventions).
    pub capacity: u32,
    pub queue_length: u32,
    /// Chargers busy this hour. Never above `capacity`.
    pub occupied_slots: u32,
    pub arrivals: u32,
    pub served_this_hour: u32,
    pub swaps_served: u64,
    pub swaps_lost: u64,
    pub charger_utilization_pct: f64,
    pub expected_wait_minutes: f64,
    pub inventory_ready: u32,
    pub inventory_depleted: u32,
}

impl StationLoadState {
    /// Zeroed state at the start of a network run.
    pub fn fresh(station: &Station) -> Self {
        Self {
            station_id: station.id.clone(),
            capacity: station.capacity,
            queue_length: 0,
            occupied_slots: 0,
            arrivals: 0,
            served_this_hour: 0,
            swaps_served: 0,
            swaps_lost: 0,
            charger_utilization_pct: 0.0,
            expected_wait_minutes: 0.0,
            inventory_ready: station.initial_inventory.unwrap_or(station.capacity),
            inventory_depleted: 0,
        }
    }

    /// The configured "live" load the micro twin reads.
    pub fn live(station: &Station) -> Self {
        let queue_length = station.baseline_load;
        Self {
            queue_length,
            expected_wait_minutes: queue_math::expected_wait(
                queue_length,
                station.service_rate(),
                station.swap_bays,
            ),
            ..Self::fresh(station)
        }
    }

    pub fn load_ratio(&self) -> f64 {
        queue_math::load_ratio(self.queue_length, self.capacity)
    }

    pub fn congestion_risk(&self) -> RiskLevel {
        queue_math::congestion_risk(self.queue_length, self.capacity)
    }
}

/// Per-analysis copy of every station's live load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSnapshot {
    loads: BTreeMap<StationId, StationLoadState>,
}

impl LoadSnapshot {
    pub fn from_registry(registry: &StationRegistry) -> Self {
        let loads = registry
            .stations()
            .iter()
            .map(|s| (s.id.clone(), StationLoadState::live(s)))
            .collect();
        Self { loads }
    }

    pub fn get(&self, station_id: &str) -> Option<&StationLoadState> {
        self.loads.get(station_id)
    }

    pub fn load_ratio(&self, station_id: &str) -> Option<f64> {
        self.get(station_id).map(StationLoadState::load_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwinConfig;

    fn registry() -> StationRegistry {
        StationRegistry::new(TwinConfig::default_test().stations).unwrap()
    }

    #[test]
    fn mentions_match_ids_and_localities_in_order() {
        let reg = registry();
        let found = reg.mentions_in("Go to Rajouri Garden, not station a");
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn unknown_station_numbers_are_ignored() {
        let reg = registry();
        assert!(reg.mentions_in("station id is 402").is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut stations = TwinConfig::default_test().stations;
        stations.push(stations[0].clone());
        assert!(StationRegistry::new(stations).is_err());
    }

    #[test]
    fn live_state_uses_baseline_load() {
        let reg = registry();
        let snap = LoadSnapshot::from_registry(&reg);
        let a = snap.get("A").unwrap();
        assert_eq!(a.queue_length, 9);
        assert_eq!(a.congestion_risk(), RiskLevel::High);
    }
}
