//! Geo and queue math shared by the micro twin and the network simulator.
//!
//! RULE: every wait figure in the crate comes from `expected_wait`.
//! The micro twin and the hourly network step both call it, so a
//! single-call projection and a network snapshot with the same queue,
//! bays and service time always agree.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;
const CITY_SPEED_KMH: f64 = 40.0;
const MAX_TRAVEL_MINUTES: f64 = 15.0;

/// Returned when a non-empty queue has no service capacity at all.
pub const WAIT_CEILING_MINUTES: f64 = 240.0;

/// Load ratio above which a station is High congestion.
pub const HIGH_CONGESTION_RATIO: f64 = 0.8;
/// Load ratio above which a station is Medium congestion.
pub const MEDIUM_CONGESTION_RATIO: f64 = 0.5;

/// Wait above which a driver is likely to call back.
pub const HIGH_REPEAT_WAIT_MINUTES: f64 = 15.0;
pub const MEDIUM_REPEAT_WAIT_MINUTES: f64 = 5.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Three-level ordinal used for congestion and repeat-call risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low    => 1,
            Self::Medium => 2,
            Self::High   => 3,
        }
    }

    /// One level worse, saturating at High.
    pub fn raised(self) -> Self {
        match self {
            Self::Low    => Self::Medium,
            Self::Medium => Self::High,
            Self::High   => Self::High,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low    => "Low",
            Self::Medium => "Medium",
            Self::High   => "High",
        };
        f.write_str(s)
    }
}

/// How clearly the agent told the driver what to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Clarity {
    #[default]
    Clear,
    Vague,
}

/// Great-circle distance in kilometres (Haversine).
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Driving time at city speed, capped for intra-city trips.
pub fn travel_minutes(from: Coordinate, to: Coordinate) -> f64 {
    (distance_km(from, to) / CITY_SPEED_KMH * 60.0).min(MAX_TRAVEL_MINUTES)
}

/// Expected minutes a newly arriving driver waits before being served.
///
/// Queue-clearing approximation of an M/M/c queue: the driver waits for
/// everyone ahead to be served by `servers` parallel bays, each completing
/// `service_rate` swaps per minute.
///
/// - 0 when the queue is empty.
/// - Non-decreasing in `queue_length`.
/// - Non-increasing in `servers` and `service_rate`.
pub fn expected_wait(queue_length: u32, service_rate: f64, servers: u32) -> f64 {
    if queue_length == 0 {
        return 0.0;
    }
    let throughput = servers as f64 * service_rate;
    if !throughput.is_finite() || throughput <= 0.0 {
        return WAIT_CEILING_MINUTES;
    }
    (queue_length as f64 / throughput).min(WAIT_CEILING_MINUTES)
}

/// Congestion from the load-to-capacity ratio. Thresholds are contract
/// constants: strictly above 0.8 is High, strictly above 0.5 is Medium.
pub fn congestion_risk(load: u32, capacity: u32) -> RiskLevel {
    if capacity == 0 {
        return if load == 0 { RiskLevel::Low } else { RiskLevel::High };
    }
    risk_from_ratio(load as f64 / capacity as f64)
}

pub fn risk_from_ratio(ratio: f64) -> RiskLevel {
    if ratio > HIGH_CONGESTION_RATIO {
        RiskLevel::High
    } else if ratio > MEDIUM_CONGESTION_RATIO {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Load ratio with the zero-capacity case pinned to "full".
pub fn load_ratio(load: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return if load == 0 { 0.0 } else { 1.0 };
    }
    load as f64 / capacity as f64
}

/// Likelihood the driver calls back, from wait time and instruction clarity.
pub fn repeat_call_probability(wait_minutes: f64, clarity: Clarity) -> RiskLevel {
    let base = if wait_minutes > HIGH_REPEAT_WAIT_MINUTES {
        RiskLevel::High
    } else if wait_minutes > MEDIUM_REPEAT_WAIT_MINUTES {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    match clarity {
        Clarity::Clear => base,
        Clarity::Vague => base.raised(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_zero_for_same_point() {
        let p = Coordinate::new(28.6366, 77.0965);
        assert!(distance_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn haversine_matches_known_distance() {
        // One degree of latitude is ~111.2 km everywhere.
        let d = distance_km(Coordinate::new(10.0, 20.0), Coordinate::new(11.0, 20.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn travel_time_is_capped() {
        let far = travel_minutes(Coordinate::new(28.0, 77.0), Coordinate::new(29.0, 77.0));
        assert_eq!(far, 15.0);
    }

    #[test]
    fn wait_ceiling_without_servers() {
        assert_eq!(expected_wait(3, 0.2, 0), WAIT_CEILING_MINUTES);
        assert_eq!(expected_wait(0, 0.2, 0), 0.0);
    }

    #[test]
    fn raised_saturates() {
        assert_eq!(RiskLevel::High.raised(), RiskLevel::High);
        assert_eq!(RiskLevel::Low.raised(), RiskLevel::Medium);
    }
}
