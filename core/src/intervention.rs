//! What-if interventions for the network simulator.
//!
//! Interventions are applied in list order to a `NetworkPlan` before hour 0
//! and never change mid-run. Any invalid entry rejects the whole run with
//! `InvalidInterventionConfig` before a single hour is simulated.

use crate::{
    error::{TwinError, TwinResult},
    station::Station,
    types::{Hour, StationId, HOURS_PER_DAY},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intervention {
    /// Multiply demand in every station for hours in `[start, end)`.
    ShiftDemand {
        factor: f64,
        hour_window: (Hour, Hour),
    },
    AddStation {
        station: Station,
    },
    /// Set a station's charger count. Signed so a negative value from
    /// JSON input reaches validation instead of failing to parse.
    ModifyChargers {
        station_id: StationId,
        new_count: i64,
    },
}

impl Intervention {
    pub fn describe(&self) -> String {
        match self {
            Self::ShiftDemand { factor, hour_window: (start, end) } => {
                format!("demand x{factor} for hours {start}..{end}")
            }
            Self::AddStation { station } => format!("add station {}", station.id),
            Self::ModifyChargers { station_id, new_count } => {
                format!("set station {station_id} chargers to {new_count}")
            }
        }
    }
}

/// Demand multiplier over a half-open hour window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DemandShift {
    pub factor: f64,
    pub start: Hour,
    pub end: Hour,
}

impl DemandShift {
    pub fn covers(&self, hour: Hour) -> bool {
        (self.start..self.end).contains(&hour)
    }
}

/// Station catalog and demand shifts as in effect for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPlan {
    /// Sorted by station id.
    pub stations: Vec<Station>,
    pub shifts: Vec<DemandShift>,
}

impl NetworkPlan {
    pub fn from_catalog(catalog: &[Station]) -> TwinResult<Self> {
        if catalog.is_empty() {
            return Err(TwinError::Config { reason: "station catalog is empty".into() });
        }
        for station in catalog {
            station.validate()?;
        }
        let mut stations = catalog.to_vec();
        stations.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = stations.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(TwinError::Config {
                reason: format!("duplicate station id {}", pair[0].id),
            });
        }
        Ok(Self { stations, shifts: Vec::new() })
    }

    /// Catalog plus every intervention, in order.
    pub fn build(catalog: &[Station], interventions: &[Intervention]) -> TwinResult<Self> {
        let mut plan = Self::from_catalog(catalog)?;
        for (index, intervention) in interventions.iter().enumerate() {
            plan.apply(intervention).map_err(|e| match e {
                TwinError::InvalidInterventionConfig { reason } => {
                    TwinError::invalid_intervention(format!("intervention #{index}: {reason}"))
                }
                other => other,
            })?;
        }
        Ok(plan)
    }

    pub fn apply(&mut self, intervention: &Intervention) -> TwinResult<()> {
        match intervention {
            Intervention::ShiftDemand { factor, hour_window: (start, end) } => {
                if !factor.is_finite() || *factor < 0.0 {
                    return Err(TwinError::invalid_intervention(format!(
                        "demand factor must be finite and non-negative, got {factor}"
                    )));
                }
                if start >= end || *end > HOURS_PER_DAY {
                    return Err(TwinError::invalid_intervention(format!(
                        "hour window [{start}, {end}) must satisfy start < end <= {HOURS_PER_DAY}"
                    )));
                }
                self.shifts.push(DemandShift { factor: *factor, start: *start, end: *end });
            }
            Intervention::AddStation { station } => {
                if self.station(&station.id).is_some() {
                    return Err(TwinError::invalid_intervention(format!(
                        "station {} already exists",
                        station.id
                    )));
                }
                station.validate().map_err(|e| match e {
                    TwinError::Config { reason } => TwinError::invalid_intervention(reason),
                    other => other,
                })?;
                let at = self.stations.partition_point(|s| s.id < station.id);
                self.stations.insert(at, station.clone());
            }
            Intervention::ModifyChargers { station_id, new_count } => {
                let count = u32::try_from(*new_count).map_err(|_| {
                    TwinError::invalid_intervention(format!(
                        "charger count for station {station_id} must be between 0 and {}, got {new_count}",
                        u32::MAX
                    ))
                })?;
                let station = self
                    .stations
                    .iter_mut()
                    .find(|s| &s.id == station_id)
                    .ok_or_else(|| {
                        TwinError::invalid_intervention(format!("unknown station {station_id}"))
                    })?;
                station.capacity = count;
            }
        }
        Ok(())
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// Product of every shift covering `hour`.
    pub fn demand_factor(&self, hour: Hour) -> f64 {
        self.shifts
            .iter()
            .filter(|s| s.covers(hour))
            .map(|s| s.factor)
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwinConfig;

    fn catalog() -> Vec<Station> {
        TwinConfig::default_test().stations
    }

    #[test]
    fn shift_window_is_half_open() {
        let plan = NetworkPlan::build(
            &catalog(),
            &[Intervention::ShiftDemand { factor: 1.5, hour_window: (8, 22) }],
        )
        .unwrap();
        assert_eq!(plan.demand_factor(7), 1.0);
        assert_eq!(plan.demand_factor(8), 1.5);
        assert_eq!(plan.demand_factor(21), 1.5);
        assert_eq!(plan.demand_factor(22), 1.0);
    }

    #[test]
    fn interventions_apply_in_list_order() {
        let mut extra = catalog()[0].clone();
        extra.id = "E".into();
        let plan = NetworkPlan::build(
            &catalog(),
            &[
                Intervention::AddStation { station: extra },
                Intervention::ModifyChargers { station_id: "E".into(), new_count: 20 },
            ],
        )
        .unwrap();
        assert_eq!(plan.station("E").map(|s| s.capacity), Some(20));
    }

    #[test]
    fn zero_chargers_allowed_negative_rejected() {
        let ok = NetworkPlan::build(
            &catalog(),
            &[Intervention::ModifyChargers { station_id: "A".into(), new_count: 0 }],
        );
        assert!(ok.is_ok());
        let err = NetworkPlan::build(
            &catalog(),
            &[Intervention::ModifyChargers { station_id: "A".into(), new_count: -1 }],
        )
        .unwrap_err();
        assert!(matches!(err, TwinError::InvalidInterventionConfig { .. }));
    }
}
