use crate::{
    queue_math::Coordinate,
    station::Station,
    types::HOURS_PER_DAY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ── Network calibration ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Normalised 0–1 demand per hour of day. Exactly 24 entries.
    pub demand_curve_hourly: Vec<f64>,
    /// Arrivals per hour at a weight-1.0 station when the curve is 1.0.
    pub peak_arrivals_per_hour: f64,
    /// Minutes a charger needs to recharge one battery.
    pub charge_minutes: f64,
    /// Waiting buffer as a multiple of capacity; beyond it drivers are lost.
    pub queue_buffer_factor: f64,
    /// Relative demand noise in [0, 1). 0 disables randomness entirely.
    #[serde(default)]
    pub demand_jitter: f64,
    #[serde(default)]
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            demand_curve_hourly: vec![
                0.15, 0.10, 0.08, 0.08, 0.10, 0.20, 0.35, 0.55, // 00–07
                0.80, 0.95, 0.85, 0.65, 0.55, 0.50, 0.50, 0.55, // 08–15
                0.65, 0.85, 1.00, 0.95, 0.75, 0.50, 0.35, 0.25, // 16–23
            ],
            peak_arrivals_per_hour: 24.0,
            charge_minutes: 60.0,
            queue_buffer_factor: 1.0,
            demand_jitter: 0.0,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.demand_curve_hourly.len() != HOURS_PER_DAY as usize {
            anyhow::bail!(
                "demand_curve_hourly must have {HOURS_PER_DAY} entries, got {}",
                self.demand_curve_hourly.len()
            );
        }
        if self.demand_curve_hourly.iter().any(|v| !v.is_finite() || *v < 0.0) {
            anyhow::bail!("demand_curve_hourly entries must be finite and non-negative");
        }
        if !(self.peak_arrivals_per_hour.is_finite() && self.peak_arrivals_per_hour >= 0.0) {
            anyhow::bail!("peak_arrivals_per_hour must be non-negative");
        }
        if !(self.charge_minutes.is_finite() && self.charge_minutes > 0.0) {
            anyhow::bail!("charge_minutes must be positive");
        }
        if !(self.queue_buffer_factor.is_finite() && self.queue_buffer_factor >= 0.0) {
            anyhow::bail!("queue_buffer_factor must be non-negative");
        }
        if !(0.0..1.0).contains(&self.demand_jitter) {
            anyhow::bail!("demand_jitter must be in [0, 1)");
        }
        Ok(())
    }
}

// ── Decision rules ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRules {
    /// SOP: route to the nearest station under this load ratio.
    pub sop_load_threshold: f64,
    /// Routing to a station above this ratio is risky.
    pub risky_load_ratio: f64,
    /// Counterfactual stations must be at or under this ratio.
    pub safe_alternative_ratio: f64,
    /// Escalating after more turns than this is late.
    pub late_escalation_turns: usize,
    /// A stated wait above this many minutes before escalation is late.
    pub long_wait_minutes: f64,
    /// Maximum station alternatives offered for a routing decision.
    pub max_station_alternatives: usize,
}

impl Default for DecisionRules {
    fn default() -> Self {
        Self {
            sop_load_threshold: 0.8,
            risky_load_ratio: 0.8,
            safe_alternative_ratio: 0.5,
            late_escalation_turns: 4,
            long_wait_minutes: 30.0,
            max_station_alternatives: 2,
        }
    }
}

// ── Files ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct StationCatalogFile {
    stations: Vec<Station>,
}

/// Fully loaded twin configuration.
#[derive(Debug, Clone)]
pub struct TwinConfig {
    pub stations: Vec<Station>,
    pub network: NetworkConfig,
    pub rules: DecisionRules,
}

impl TwinConfig {
    /// Load from a data directory containing `stations.json`,
    /// `network.json` and, optionally, `qa_rules.json`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let dir = Path::new(data_dir);

        let catalog_path = dir.join("stations.json");
        let content = std::fs::read_to_string(&catalog_path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", catalog_path.display()))?;
        let catalog: StationCatalogFile = serde_json::from_str(&content)?;
        validate_catalog(&catalog.stations)
            .map_err(|e| anyhow::anyhow!("{}: {e}", catalog_path.display()))?;

        let network_path = dir.join("network.json");
        let network_content = std::fs::read_to_string(&network_path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", network_path.display()))?;
        let network: NetworkConfig = serde_json::from_str(&network_content)?;
        network
            .validate()
            .map_err(|e| anyhow::anyhow!("{}: {e}", network_path.display()))?;

        let rules_path = dir.join("qa_rules.json");
        let rules = if rules_path.exists() {
            let rules_content = std::fs::read_to_string(&rules_path)?;
            serde_json::from_str(&rules_content)?
        } else {
            log::info!("{} not found, using default decision rules", rules_path.display());
            DecisionRules::default()
        };

        log::debug!(
            "loaded {} stations from {}",
            catalog.stations.len(),
            catalog_path.display()
        );

        Ok(Self { stations: catalog.stations, network, rules })
    }

    /// Config with hardcoded defaults for use in unit tests.
    ///
    /// Stations A–D around west Delhi. A is nearly full, B is nearly empty
    /// and ~2.4 km from A, C is busy and far away, D is quiet and close to A.
    pub fn default_test() -> Self {
        let stations = vec![
            Station {
                id: "A".into(),
                name: "Station A - Tilak Nagar".into(),
                location: Coordinate::new(28.6366, 77.0965),
                capacity: 10,
                avg_service_minutes: 5.0,
                swap_bays: 2,
                initial_inventory: Some(10),
                baseline_load: 9,
                demand_weight: 1.2,
                aliases: vec!["tilak nagar".into()],
            },
            Station {
                id: "B".into(),
                name: "Station B - Rajouri Garden".into(),
                location: Coordinate::new(28.6415, 77.1209),
                capacity: 12,
                avg_service_minutes: 4.5,
                swap_bays: 3,
                initial_inventory: Some(12),
                baseline_load: 2,
                demand_weight: 0.9,
                aliases: vec!["rajouri".into()],
            },
            Station {
                id: "C".into(),
                name: "Station C - Okhla Phase 3".into(),
                location: Coordinate::new(28.5272, 77.2644),
                capacity: 8,
                avg_service_minutes: 5.5,
                swap_bays: 2,
                initial_inventory: Some(8),
                baseline_load: 6,
                demand_weight: 1.0,
                aliases: vec!["okhla".into()],
            },
            Station {
                id: "D".into(),
                name: "Station D - Mayapuri".into(),
                location: Coordinate::new(28.6289, 77.1132),
                capacity: 15,
                avg_service_minutes: 4.0,
                swap_bays: 3,
                initial_inventory: Some(15),
                baseline_load: 4,
                demand_weight: 0.8,
                aliases: vec![],
            },
        ];

        Self {
            stations,
            network: NetworkConfig::default(),
            rules: DecisionRules::default(),
        }
    }
}

fn validate_catalog(stations: &[Station]) -> anyhow::Result<()> {
    if stations.is_empty() {
        anyhow::bail!("station catalog is empty");
    }
    let mut seen = HashSet::new();
    for station in stations {
        if !seen.insert(station.id.as_str()) {
            anyhow::bail!("duplicate station id {}", station.id);
        }
        station.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_network_config_is_valid() {
        NetworkConfig::default().validate().unwrap();
    }

    #[test]
    fn short_demand_curve_rejected() {
        let cfg = NetworkConfig { demand_curve_hourly: vec![0.5; 12], ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn repo_data_dir_loads() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let cfg = TwinConfig::load(dir).unwrap();
        assert_eq!(cfg.stations.len(), 4);
        assert_eq!(cfg.network.demand_curve_hourly.len(), 24);
        assert_eq!(cfg.rules, DecisionRules::default());
    }
}
