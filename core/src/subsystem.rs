//! Subsystem trait for the network simulator.
//!
//! RULE: Every network subsystem implements NetworkSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every hour.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    error::TwinResult,
    event::TwinEvent,
    rng::SubsystemRng,
    types::Hour,
};
use std::any::Any;

pub trait NetworkSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per simulated hour by the engine.
    ///
    /// - `hour`:      the hour being simulated (0..=23)
    /// - `events_in`: events emitted by earlier subsystems this hour
    /// - `rng`:       this subsystem's deterministic RNG stream
    ///
    /// Returns new events to append to the hour's log.
    fn update(
        &mut self,
        hour: Hour,
        events_in: &[TwinEvent],
        rng: &mut SubsystemRng,
    ) -> TwinResult<Vec<TwinEvent>>;

    /// For downcasting in the engine and tests.
    fn as_any(&self) -> &dyn Any;
}
