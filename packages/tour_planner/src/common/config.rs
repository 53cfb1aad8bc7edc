//! This module contains the configuration used across the package. The
//! PlannerConfig struct is read once from the environment at startup, while
//! RoutingProfile and SpeedModel are used directly by the planning code.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ROUTING_URL: &str = "https://api.openrouteservice.org";

/// Sets the mode of travel requested from the external directions service.
/// The internal path network is the same for every profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingProfile {
    #[default]
    FootHiking,
    FootWalking,
    CyclingMountain,
    CyclingRegular,
}

impl RoutingProfile {
    /// The name of the profile as it appears in directions API paths
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingProfile::FootHiking => "foot-hiking",
            RoutingProfile::FootWalking => "foot-walking",
            RoutingProfile::CyclingMountain => "cycling-mountain",
            RoutingProfile::CyclingRegular => "cycling-regular",
        }
    }
}

impl FromStr for RoutingProfile {
    type Err = String;

    fn from_str(input: &str) -> Result<RoutingProfile, Self::Err> {
        match input {
            "foot-hiking" | "hiking" => Ok(RoutingProfile::FootHiking),
            "foot-walking" | "walking" => Ok(RoutingProfile::FootWalking),
            "cycling-mountain" => Ok(RoutingProfile::CyclingMountain),
            "cycling-regular" => Ok(RoutingProfile::CyclingRegular),
            other => Err(format!("Unknown routing profile '{other}'")),
        }
    }
}

impl fmt::Display for RoutingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimates how long it takes to walk a path segment. Time spent is the
/// horizontal distance at a flat walking pace, plus a penalty for every
/// meter climbed and a smaller one for every meter descended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedModel {
    pub horizontal_speed_mps: f64,
    pub ascent_s_per_m: f64,
    pub descent_s_per_m: f64,
}

impl Default for SpeedModel {
    fn default() -> Self {
        SpeedModel::from_rates(4.0, 300.0, 500.0)
    }
}

impl SpeedModel {
    /// Create a speed model from hourly rates: km/h on the flat, and meters
    /// of ascent/descent covered per hour
    pub fn from_rates(
        walk_kmh: f64,
        ascent_m_per_h: f64,
        descent_m_per_h: f64,
    ) -> SpeedModel {
        SpeedModel {
            horizontal_speed_mps: walk_kmh * 1000.0 / 3600.0,
            ascent_s_per_m: 3600.0 / ascent_m_per_h,
            descent_s_per_m: 3600.0 / descent_m_per_h,
        }
    }

    /// Duration in seconds for a segment with the provided horizontal
    /// distance and elevation changes (all in meters)
    pub fn estimate_duration(
        &self,
        distance: f64,
        gain: f64,
        loss: f64,
    ) -> f64 {
        distance / self.horizontal_speed_mps
            + gain * self.ascent_s_per_m
            + loss * self.descent_s_per_m
    }
}

/// Process level settings, read from the environment when the server starts
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub bind_addr: SocketAddr,
    pub geodata_path: PathBuf,
    pub routing_url: String,
    pub routing_api_key: Option<String>,
    pub routing_timeout: Duration,
    pub match_tolerance_m: f64,
    pub speed: SpeedModel,
}

/// Parse a value with the provided lookup, falling back to the default if it
/// is missing or can't be parsed
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(val) => val,
            Err(_) => {
                tracing::warn!(
                    "Ignoring invalid {key}={raw:?}, using {default:?}"
                );
                default
            }
        },
        None => default,
    }
}

fn positive_or<F>(lookup: &F, key: &str, default: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    let val = parse_or(lookup, key, default);
    if val.is_finite() && val > 0.0 {
        val
    } else {
        tracing::warn!("{key} must be positive, using {default}");
        default
    }
}

impl PlannerConfig {
    pub fn from_env() -> PlannerConfig {
        PlannerConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup, which allows it to be
    /// populated without touching the process environment
    pub fn from_lookup<F>(lookup: F) -> PlannerConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_addr = SocketAddr::from(([0, 0, 0, 0], 8000));

        let speed = SpeedModel::from_rates(
            positive_or(&lookup, "TOUR_PLANNER_WALK_SPEED_KMH", 4.0),
            positive_or(&lookup, "TOUR_PLANNER_ASCENT_M_PER_H", 300.0),
            positive_or(&lookup, "TOUR_PLANNER_DESCENT_M_PER_H", 500.0),
        );

        PlannerConfig {
            bind_addr: parse_or(
                &lookup,
                "TOUR_PLANNER_BIND_ADDR",
                default_addr,
            ),
            geodata_path: lookup("TOUR_PLANNER_GEODATA")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/paths.geojson")),
            routing_url: lookup("TOUR_PLANNER_ROUTING_URL")
                .unwrap_or_else(|| DEFAULT_ROUTING_URL.to_string()),
            routing_api_key: lookup("TOUR_PLANNER_ROUTING_API_KEY")
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            routing_timeout: Duration::from_secs(parse_or(
                &lookup,
                "TOUR_PLANNER_ROUTING_TIMEOUT_SECS",
                15_u64,
            )),
            match_tolerance_m: positive_or(
                &lookup,
                "TOUR_PLANNER_MATCH_TOLERANCE_M",
                25.0,
            ),
            speed,
        }
    }
}
