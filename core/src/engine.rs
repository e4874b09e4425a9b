//! The 24-hour network simulation engine.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Demand subsystem   (emits DemandArrived per station)
//!   2. Service subsystem  (charges, serves, records lost swaps)
//!
//! RULES:
//!   - Interventions are validated and applied in `build`, before hour 0.
//!   - Subsystems execute in registration order, every hour.
//!   - Subsystems talk only through events; the engine reads the service
//!     subsystem's state once per hour to take the snapshot.
//!   - All randomness flows through the RngBank.
//!   - Every event is appended to the run's in-memory event log.
//!   - The run owns its station state. The station catalog is only read.

use crate::{
    clock::HourClock,
    config::NetworkConfig,
    demand_subsystem::DemandSubsystem,
    error::{TwinError, TwinResult},
    event::{EventLogEntry, TwinEvent},
    intervention::{Intervention, NetworkPlan},
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    service_subsystem::ServiceSubsystem,
    snapshot::{HourlySnapshot, NetworkSimulationResult},
    station::Station,
    subsystem::NetworkSubsystem,
    types::{Hour, RunId},
};

pub struct NetworkEngine {
    pub run_id: RunId,
    pub clock: HourClock,
    seed: u64,
    plan: NetworkPlan,
    interventions: Vec<Intervention>,
    subsystems: Vec<(SubsystemSlot, Box<dyn NetworkSubsystem>, SubsystemRng)>,
    event_log: Vec<EventLogEntry>,
    hours: Vec<HourlySnapshot>,
}

impl NetworkEngine {
    /// Validate everything and wire the subsystems. Nothing is simulated
    /// until `run` or `step`.
    pub fn build(
        run_id: RunId,
        catalog: &[Station],
        interventions: &[Intervention],
        config: &NetworkConfig,
    ) -> TwinResult<Self> {
        config
            .validate()
            .map_err(|e| TwinError::Config { reason: e.to_string() })?;
        let plan = NetworkPlan::build(catalog, interventions)?;

        let rng_bank = RngBank::new(config.seed);
        let mut engine = Self {
            clock: HourClock::new(run_id.clone()),
            run_id,
            seed: config.seed,
            interventions: interventions.to_vec(),
            subsystems: Vec::new(),
            event_log: Vec::new(),
            hours: Vec::new(),
            plan,
        };

        // EXECUTION ORDER: fixed, documented, never reordered.
        let demand = DemandSubsystem::new(&engine.plan, config);
        let service = ServiceSubsystem::new(&engine.plan, config);
        engine.register(&rng_bank, SubsystemSlot::Demand, Box::new(demand));
        engine.register(&rng_bank, SubsystemSlot::Service, Box::new(service));
        Ok(engine)
    }

    fn register(&mut self, bank: &RngBank, slot: SubsystemSlot, subsystem: Box<dyn NetworkSubsystem>) {
        self.subsystems.push((slot, subsystem, bank.for_subsystem(slot)));
    }

    pub fn plan(&self) -> &NetworkPlan {
        &self.plan
    }

    /// Simulate one hour. Returns that hour's events, or `None` once the
    /// day is finished.
    pub fn step(&mut self) -> TwinResult<Option<Vec<TwinEvent>>> {
        if self.clock.next_hour == 0 && self.event_log.is_empty() {
            self.record_start()?;
        }
        let Some(hour) = self.clock.advance() else {
            return Ok(None);
        };

        let started = TwinEvent::HourStarted { hour };
        self.append("engine", hour, &started)?;
        let mut hour_events = vec![started];

        // Each subsystem sees every event emitted so far this hour.
        for (_, subsystem, rng) in &mut self.subsystems {
            let new_events = subsystem.update(hour, &hour_events, rng)?;
            for event in &new_events {
                let entry = log_entry(
                    &self.run_id,
                    self.event_log.len() as u64,
                    hour,
                    subsystem.name(),
                    event,
                )?;
                self.event_log.push(entry);
            }
            hour_events.extend(new_events);
        }

        let completed = TwinEvent::HourCompleted { hour };
        self.append("engine", hour, &completed)?;
        hour_events.push(completed);

        self.take_snapshot(hour);
        Ok(Some(hour_events))
    }

    /// Run every remaining hour and aggregate.
    pub fn run(&mut self) -> TwinResult<NetworkSimulationResult> {
        while self.step()?.is_some() {}
        let result = NetworkSimulationResult::aggregate(
            self.run_id.clone(),
            self.seed,
            self.hours.clone(),
        );
        log::info!(
            "run {}: {} swaps, {} lost, avg wait {:.1} min",
            self.run_id,
            result.total_swaps,
            result.total_lost_swaps,
            result.avg_wait_minutes
        );
        Ok(result)
    }

    pub fn event_log(&self) -> &[EventLogEntry] {
        &self.event_log
    }

    pub fn events_for_hour(&self, hour: Hour) -> impl Iterator<Item = &EventLogEntry> {
        self.event_log.iter().filter(move |e| e.hour == hour)
    }

    pub fn service(&self) -> Option<&ServiceSubsystem> {
        self.subsystems
            .iter()
            .find_map(|(_, sub, _)| sub.as_any().downcast_ref::<ServiceSubsystem>())
    }

    fn record_start(&mut self) -> TwinResult<()> {
        let init = TwinEvent::RunInitialized {
            run_id: self.run_id.clone(),
            seed: self.seed,
            stations: self.plan.stations.len(),
        };
        self.append("engine", 0, &init)?;
        let applied: Vec<TwinEvent> = self
            .interventions
            .iter()
            .enumerate()
            .map(|(index, i)| TwinEvent::InterventionApplied {
                index,
                description: i.describe(),
            })
            .collect();
        for event in &applied {
            self.append("engine", 0, event)?;
        }
        Ok(())
    }

    fn append(&mut self, subsystem: &str, hour: Hour, event: &TwinEvent) -> TwinResult<()> {
        let entry = log_entry(&self.run_id, self.event_log.len() as u64, hour, subsystem, event)?;
        self.event_log.push(entry);
        Ok(())
    }

    fn take_snapshot(&mut self, hour: Hour) {
        let stations = self.service().map(ServiceSubsystem::loads).unwrap_or_default();
        self.hours.push(HourlySnapshot { hour, stations });
    }
}

fn log_entry(
    run_id: &str,
    seq: u64,
    hour: Hour,
    subsystem: &str,
    event: &TwinEvent,
) -> TwinResult<EventLogEntry> {
    Ok(EventLogEntry {
        seq,
        run_id: run_id.to_string(),
        hour,
        subsystem: subsystem.to_string(),
        event_type: event.type_name().to_string(),
        payload: serde_json::to_string(event)?,
    })
}

/// One 24-hour run with the default network calibration.
pub fn simulate_network(
    catalog: &[Station],
    interventions: &[Intervention],
) -> TwinResult<NetworkSimulationResult> {
    simulate_network_with(catalog, interventions, &NetworkConfig::default())
}

pub fn simulate_network_with(
    catalog: &[Station],
    interventions: &[Intervention],
    config: &NetworkConfig,
) -> TwinResult<NetworkSimulationResult> {
    let run_id = uuid::Uuid::new_v4().to_string();
    NetworkEngine::build(run_id, catalog, interventions, config)?.run()
}
