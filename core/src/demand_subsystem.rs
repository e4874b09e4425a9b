use crate::{
    config::NetworkConfig,
    error::{TwinError, TwinResult},
    event::TwinEvent,
    intervention::NetworkPlan,
    rng::SubsystemRng,
    subsystem::NetworkSubsystem,
    types::{Hour, StationId},
};

/// Per-station demand scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandProfile {
    pub station_id: StationId,
    pub weight: f64,
}

/// Hourly arrivals per station:
/// `round(curve[h] × peak × weight × shift(h) × jitter)`.
pub struct DemandSubsystem {
    pub profiles: Vec<DemandProfile>,
    curve: Vec<f64>,
    peak_arrivals_per_hour: f64,
    jitter: f64,
    /// Shift factor per hour, precomputed from the plan.
    hour_factors: Vec<f64>,
}

impl DemandSubsystem {
    pub fn new(plan: &NetworkPlan, config: &NetworkConfig) -> Self {
        let profiles = plan
            .stations
            .iter()
            .map(|s| DemandProfile { station_id: s.id.clone(), weight: s.demand_weight })
            .collect();
        let hour_factors = (0..config.demand_curve_hourly.len() as Hour)
            .map(|h| plan.demand_factor(h))
            .collect();
        Self {
            profiles,
            curve: config.demand_curve_hourly.clone(),
            peak_arrivals_per_hour: config.peak_arrivals_per_hour,
            jitter: config.demand_jitter,
            hour_factors,
        }
    }

    /// Expected (noise-free) arrivals for one station in one hour.
    pub fn expected_arrivals(&self, hour: Hour, weight: f64) -> f64 {
        let idx = hour as usize;
        let curve = self.curve.get(idx).copied().unwrap_or(0.0);
        let shift = self.hour_factors.get(idx).copied().unwrap_or(1.0);
        curve * self.peak_arrivals_per_hour * weight * shift
    }
}

impl NetworkSubsystem for DemandSubsystem {
    fn name(&self) -> &'static str { "demand" }

    fn update(
        &mut self,
        hour: Hour,
        _events_in: &[TwinEvent],
        rng: &mut SubsystemRng,
    ) -> TwinResult<Vec<TwinEvent>> {
        if hour as usize >= self.curve.len() {
            return Err(TwinError::Config {
                reason: format!("no demand curve entry for hour {hour}"),
            });
        }

        let mut events = Vec::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            let mut demand = self.expected_arrivals(hour, profile.weight);
            // Draw even when demand is zero: the stream position must not
            // depend on demand shifts.
            if self.jitter > 0.0 {
                demand *= rng.jitter(self.jitter);
            }
            let arrivals = demand.max(0.0).round() as u32;
            events.push(TwinEvent::DemandArrived {
                hour,
                station_id: profile.station_id.clone(),
                arrivals,
            });
        }

        log::debug!(
            "hour={hour} demand: {} arrivals across {} stations",
            events
                .iter()
                .map(|e| match e {
                    TwinEvent::DemandArrived { arrivals, .. } => *arrivals as u64,
                    _ => 0,
                })
                .sum::<u64>(),
            self.profiles.len()
        );

        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
