//! Geographic search corridors for fuel-stop candidates.

use crate::error::FuelError;
use crate::models::Waypoint;
use crate::platforms::Platform;
use crate::spatial::GeoPoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorOptions {
    /// Number of sample points between departure and target
    pub sample_count: usize,
    /// Lateral search radius around each sample (nm)
    pub max_off_track_nm: f64,
    /// Candidates closer than this to the departure are useless as fuel stops (nm)
    pub min_from_start_nm: f64,
}

impl Default for CorridorOptions {
    fn default() -> Self {
        Self {
            sample_count: 10,
            max_off_track_nm: 10.0,
            min_from_start_nm: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorSample {
    pub point: GeoPoint,
    pub radius_nm: f64,
    pub distance_from_start_nm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCorridor {
    pub departure: GeoPoint,
    pub target: GeoPoint,
    /// Target is an alternate split point rather than the final destination
    pub toward_split_point: bool,
    pub length_nm: f64,
    pub max_off_track_nm: f64,
    pub min_from_start_nm: f64,
    pub samples: Vec<CorridorSample>,
}

impl SearchCorridor {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        if self.departure.distance_nm(point) < self.min_from_start_nm {
            return false;
        }
        self.samples
            .iter()
            .any(|sample| sample.point.distance_nm(point) <= sample.radius_nm)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorridorSearcher {
    options: CorridorOptions,
}

impl CorridorSearcher {
    pub fn new(options: CorridorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CorridorOptions {
        &self.options
    }

    /// Sample the great circle from the first waypoint toward the split point
    /// (or the last waypoint when there is none).
    pub fn create_search_corridor(
        &self,
        waypoints: &[Waypoint],
        split_point: Option<GeoPoint>,
    ) -> Result<SearchCorridor, FuelError> {
        let departure = waypoints
            .first()
            .map(Waypoint::point)
            .ok_or_else(|| FuelError::invalid("corridor.waypoints", "route has no departure"))?;
        let toward_split_point = split_point.is_some();
        let target = match split_point {
            Some(point) => point,
            None if waypoints.len() >= 2 => waypoints[waypoints.len() - 1].point(),
            None => {
                return Err(FuelError::invalid(
                    "corridor.waypoints",
                    "need a destination or split point",
                ))
            }
        };
        if !departure.is_valid() || !target.is_valid() {
            return Err(FuelError::invalid(
                "corridor.waypoints",
                "departure or target has invalid coordinates",
            ));
        }

        let length_nm = departure.distance_nm(&target);
        let course = departure.bearing_to(&target);
        let count = self.options.sample_count.max(1);

        let samples = (1..=count)
            .map(|i| {
                let distance = length_nm * i as f64 / count as f64;
                CorridorSample {
                    point: departure.offset(distance, course),
                    radius_nm: self.options.max_off_track_nm,
                    distance_from_start_nm: distance,
                }
            })
            .filter(|sample| sample.distance_from_start_nm >= self.options.min_from_start_nm)
            .collect::<Vec<_>>();

        tracing::debug!(
            "Search corridor: {:.1} nm, {} of {} samples kept",
            length_nm,
            samples.len(),
            count
        );

        Ok(SearchCorridor {
            departure,
            target,
            toward_split_point,
            length_nm,
            max_off_track_nm: self.options.max_off_track_nm,
            min_from_start_nm: self.options.min_from_start_nm,
            samples,
        })
    }

    pub fn is_platform_in_corridor(platform: &Platform, corridor: &SearchCorridor) -> bool {
        corridor.contains(&platform.point())
    }
}
