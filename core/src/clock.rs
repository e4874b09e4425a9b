//! Hour clock for a single network run: hours 0..=23, then finished.

use crate::types::{Hour, RunId, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourClock {
    pub run_id: RunId,
    /// Next hour to simulate. Equals HOURS_PER_DAY once the run is done.
    pub next_hour: Hour,
}

impl HourClock {
    pub fn new(run_id: RunId) -> Self {
        Self { run_id, next_hour: 0 }
    }

    /// Claim the next hour, or `None` once the day is over.
    pub fn advance(&mut self) -> Option<Hour> {
        if self.is_finished() {
            return None;
        }
        let hour = self.next_hour;
        self.next_hour += 1;
        Some(hour)
    }

    pub fn is_finished(&self) -> bool {
        self.next_hour >= HOURS_PER_DAY
    }

    pub fn hours_elapsed(&self) -> Hour {
        self.next_hour
    }
}
