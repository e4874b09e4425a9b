//! Swap service for every station in a network run.
//!
//! ORDER per station, per hour (fixed):
//!   1. Charge depleted batteries (at most capacity × 60 / charge_minutes)
//!   2. Enqueue this hour's arrivals (from DemandArrived events)
//!   3. Serve min(queue, bay throughput, ready batteries)
//!   4. Trim the queue to its buffer; overflow is lost, never negative
//!   5. Recompute utilisation and expected wait

use crate::{
    config::NetworkConfig,
    error::TwinResult,
    event::TwinEvent,
    intervention::NetworkPlan,
    queue_math,
    rng::SubsystemRng,
    station::{Station, StationLoadState},
    subsystem::NetworkSubsystem,
    types::{Hour, StationId},
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ServicedStation {
    pub station: Station,
    pub state: StationLoadState,
}

impl ServicedStation {
    fn new(station: &Station) -> Self {
        Self { station: station.clone(), state: StationLoadState::fresh(station) }
    }

    /// Swaps the bays can complete in one hour.
    fn bay_throughput(&self) -> u32 {
        let per_hour = self.station.swap_bays as f64 * 60.0 * self.station.service_rate();
        per_hour.floor() as u32
    }

    /// Chargers a station can turn over in one hour.
    fn charge_throughput(&self, charge_minutes: f64) -> u32 {
        (self.state.capacity as f64 * 60.0 / charge_minutes).floor() as u32
    }

    fn queue_buffer(&self, factor: f64) -> u32 {
        (self.state.capacity as f64 * factor).ceil() as u32
    }

    /// Advance one hour. Returns (served, lost).
    fn step(&mut self, arrivals: u32, config: &NetworkConfig) -> (u32, u32) {
        let charge_cap = self.charge_throughput(config.charge_minutes);
        let bay_cap = self.bay_throughput();
        let buffer = self.queue_buffer(config.queue_buffer_factor);
        let s = &mut self.state;

        s.occupied_slots = s.inventory_depleted.min(s.capacity);
        let charged = s.inventory_depleted.min(charge_cap);
        s.inventory_depleted -= charged;
        s.inventory_ready += charged;

        s.arrivals = arrivals;
        s.queue_length = s.queue_length.saturating_add(arrivals);

        let served = s.queue_length.min(bay_cap).min(s.inventory_ready);
        s.queue_length -= served;
        s.inventory_ready -= served;
        s.inventory_depleted += served;
        s.served_this_hour = served;
        s.swaps_served += served as u64;

        let lost = s.queue_length.saturating_sub(buffer);
        s.queue_length -= lost;
        s.swaps_lost += lost as u64;

        s.charger_utilization_pct = if s.capacity > 0 {
            s.occupied_slots as f64 / s.capacity as f64 * 100.0
        } else {
            0.0
        };
        s.expected_wait_minutes = queue_math::expected_wait(
            s.queue_length,
            self.station.service_rate(),
            self.station.swap_bays,
        );

        (served, lost)
    }
}

pub struct ServiceSubsystem {
    pub stations: BTreeMap<StationId, ServicedStation>,
    config: NetworkConfig,
}

impl ServiceSubsystem {
    pub fn new(plan: &NetworkPlan, config: &NetworkConfig) -> Self {
        let stations = plan
            .stations
            .iter()
            .map(|s| (s.id.clone(), ServicedStation::new(s)))
            .collect();
        Self { stations, config: config.clone() }
    }

    /// Current load of every station, keyed by id.
    pub fn loads(&self) -> BTreeMap<StationId, StationLoadState> {
        self.stations
            .iter()
            .map(|(id, s)| (id.clone(), s.state.clone()))
            .collect()
    }
}

impl NetworkSubsystem for ServiceSubsystem {
    fn name(&self) -> &'static str { "service" }

    fn update(
        &mut self,
        hour: Hour,
        events_in: &[TwinEvent],
        _rng: &mut SubsystemRng,
    ) -> TwinResult<Vec<TwinEvent>> {
        let mut arrivals: BTreeMap<&str, u32> = BTreeMap::new();
        for event in events_in {
            if let TwinEvent::DemandArrived { hour: h, station_id, arrivals: n } = event {
                if *h == hour {
                    *arrivals.entry(station_id.as_str()).or_default() += n;
                }
            }
        }

        let mut events = Vec::new();
        for (id, station) in &mut self.stations {
            let incoming = arrivals.get(id.as_str()).copied().unwrap_or(0);
            let (served, lost) = station.step(incoming, &self.config);

            events.push(TwinEvent::SwapsServed {
                hour,
                station_id: id.clone(),
                served,
                queue_length: station.state.queue_length,
                inventory_ready: station.state.inventory_ready,
            });
            if lost > 0 {
                log::debug!("hour={hour} station {id}: {lost} drivers lost to full queue");
                events.push(TwinEvent::SwapsLost { hour, station_id: id.clone(), lost });
            }
        }
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwinConfig;

    fn station_a() -> ServicedStation {
        let station = TwinConfig::default_test().stations.remove(0);
        ServicedStation::new(&station)
    }

    #[test]
    fn occupied_never_exceeds_capacity() {
        let config = NetworkConfig::default();
        let mut a = station_a();
        for _ in 0..6 {
            a.step(40, &config);
            assert!(a.state.occupied_slots <= a.state.capacity);
            assert!(a.state.queue_length <= a.queue_buffer(config.queue_buffer_factor));
        }
        assert!(a.state.swaps_lost > 0);
    }

    #[test]
    fn served_limited_by_ready_batteries() {
        let config = NetworkConfig::default();
        let mut a = station_a();
        // 10 ready at start, 24/h bay throughput.
        let (served, _) = a.step(20, &config);
        assert_eq!(served, 10);
        // 10 depleted recharge next hour.
        let (served, _) = a.step(0, &config);
        assert_eq!(served, 10);
    }

    #[test]
    fn zero_chargers_stop_recharging() {
        let config = NetworkConfig::default();
        let mut a = station_a();
        a.state.capacity = 0;
        a.step(10, &config);
        let (served, lost) = a.step(10, &config);
        assert_eq!(served, 0);
        assert_eq!(lost, 10);
        assert_eq!(a.state.charger_utilization_pct, 0.0);
    }
}
