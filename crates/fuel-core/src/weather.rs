//! Weather-driven ARA and approach fuel classification.
//!
//! A rig needs ARA fuel when its `ranking2` is 5 or 8 (or the feed flags it
//! explicitly); an airport needs approach fuel when `ranking2` is 5 or 10.
//! Every location is counted once, however many forecast segments mention it.

use crate::models::{stop_positions, Waypoint, WeatherSegment};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// `ranking2` values that put a rig below ARA minima.
pub const ARA_RANKINGS: [i32; 2] = [5, 8];
/// `ranking2` values that put an airport below approach minima.
pub const APPROACH_RANKINGS: [i32; 2] = [5, 10];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherFuelConfig {
    pub ara_fuel_default: f64,
    pub approach_fuel_default: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherFuelKind {
    Ara,
    Approach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherFuelTrigger {
    pub location_code: String,
    pub kind: WeatherFuelKind,
    pub ranking2: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherFuelAnalysis {
    pub ara_fuel: f64,
    pub approach_fuel: f64,
    pub ara_locations: Vec<String>,
    pub approach_locations: Vec<String>,
    pub triggers: Vec<WeatherFuelTrigger>,
}

impl WeatherFuelAnalysis {
    pub fn total(&self) -> f64 {
        self.ara_fuel + self.approach_fuel
    }
}

pub fn requires_ara(segment: &WeatherSegment) -> bool {
    segment.is_rig && (segment.ara_required || ARA_RANKINGS.contains(&segment.ranking2))
}

pub fn requires_approach(segment: &WeatherSegment) -> bool {
    !segment.is_rig
        && (segment.approach_required || APPROACH_RANKINGS.contains(&segment.ranking2))
}

/// Weather classification folded per location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationWeather {
    pub location_code: String,
    pub is_rig: bool,
    /// Ranking of the segment that triggered (or the first one seen)
    pub ranking2: i32,
    pub ara_required: bool,
    pub approach_required: bool,
    pub explicit_flag: bool,
}

/// Case-insensitive lookup of weather segments by location code.
#[derive(Debug, Clone, Default)]
pub struct WeatherLookup {
    by_code: HashMap<String, LocationWeather>,
}

impl WeatherLookup {
    pub fn new(segments: &[WeatherSegment]) -> Self {
        let mut by_code: HashMap<String, LocationWeather> = HashMap::new();
        for segment in segments {
            let code = segment.location_code.trim();
            if code.is_empty() {
                continue;
            }
            let ara = requires_ara(segment);
            let approach = requires_approach(segment);
            let explicit = segment.ara_required || segment.approach_required;
            by_code
                .entry(code.to_uppercase())
                .and_modify(|entry| {
                    // A later segment only wins if it adds a requirement.
                    if (ara && !entry.ara_required) || (approach && !entry.approach_required) {
                        entry.ranking2 = segment.ranking2;
                        entry.explicit_flag = explicit;
                    }
                    entry.ara_required |= ara;
                    entry.approach_required |= approach;
                })
                .or_insert_with(|| LocationWeather {
                    location_code: code.to_string(),
                    is_rig: segment.is_rig,
                    ranking2: segment.ranking2,
                    ara_required: ara,
                    approach_required: approach,
                    explicit_flag: explicit,
                });
        }
        Self { by_code }
    }

    pub fn get(&self, location: &str) -> Option<&LocationWeather> {
        self.by_code.get(&location.trim().to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Stateless classifier over forecast segments and the current route.
pub struct WeatherFuelAnalyzer;

impl WeatherFuelAnalyzer {
    /// Total ARA/approach fuel demanded by the weather at the route's stops.
    pub fn analyze(
        segments: &[WeatherSegment],
        waypoints: &[Waypoint],
        config: &WeatherFuelConfig,
    ) -> WeatherFuelAnalysis {
        let lookup = WeatherLookup::new(segments);
        let mut analysis = WeatherFuelAnalysis::default();
        if lookup.is_empty() {
            return analysis;
        }

        let mut seen: HashSet<String> = HashSet::new();
        for idx in stop_positions(waypoints) {
            let name = &waypoints[idx].name;
            if !seen.insert(name.trim().to_uppercase()) {
                continue;
            }
            let Some(weather) = lookup.get(name) else {
                continue;
            };

            if weather.ara_required {
                analysis.ara_locations.push(name.clone());
                analysis.triggers.push(WeatherFuelTrigger {
                    location_code: name.clone(),
                    kind: WeatherFuelKind::Ara,
                    ranking2: weather.ranking2,
                    reason: trigger_reason(weather, WeatherFuelKind::Ara),
                });
            }
            if weather.approach_required {
                analysis.approach_locations.push(name.clone());
                analysis.triggers.push(WeatherFuelTrigger {
                    location_code: name.clone(),
                    kind: WeatherFuelKind::Approach,
                    ranking2: weather.ranking2,
                    reason: trigger_reason(weather, WeatherFuelKind::Approach),
                });
            }
        }

        analysis.ara_fuel = analysis.ara_locations.len() as f64 * config.ara_fuel_default;
        analysis.approach_fuel =
            analysis.approach_locations.len() as f64 * config.approach_fuel_default;
        analysis
    }
}

fn trigger_reason(weather: &LocationWeather, kind: WeatherFuelKind) -> String {
    let (site, fuel) = match kind {
        WeatherFuelKind::Ara => ("rig", "ARA"),
        WeatherFuelKind::Approach => ("airport", "approach"),
    };
    if weather.explicit_flag {
        format!(
            "{} ({site}): {fuel} fuel flagged as required by forecast",
            weather.location_code
        )
    } else {
        format!(
            "{} ({site}): ranking2 {} requires {fuel} fuel",
            weather.location_code, weather.ranking2
        )
    }
}
