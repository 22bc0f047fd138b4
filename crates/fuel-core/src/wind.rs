//! Pluggable wind correction for leg times.

use crate::error::FuelError;
use crate::models::Weather;
use crate::spatial::GeoPoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPerformance {
    pub ground_speed_kt: f64,
    pub time_hr: f64,
}

impl LegPerformance {
    pub fn still_air(distance_nm: f64, cruise_speed_kt: f64) -> Self {
        Self {
            ground_speed_kt: cruise_speed_kt,
            time_hr: distance_nm / cruise_speed_kt,
        }
    }
}

/// External wind model. Implementations must be pure.
pub trait WindCalculator: Send + Sync {
    fn leg_performance(
        &self,
        from: &GeoPoint,
        to: &GeoPoint,
        cruise_speed_kt: f64,
        weather: &Weather,
    ) -> Result<LegPerformance, FuelError>;
}

/// Ground speed from the along-track wind component only.
#[derive(Debug, Clone, Copy)]
pub struct HeadwindCalculator {
    /// Ground speed never drops below this share of cruise speed
    pub min_ground_speed_ratio: f64,
}

impl Default for HeadwindCalculator {
    fn default() -> Self {
        Self {
            min_ground_speed_ratio: 0.25,
        }
    }
}

impl WindCalculator for HeadwindCalculator {
    fn leg_performance(
        &self,
        from: &GeoPoint,
        to: &GeoPoint,
        cruise_speed_kt: f64,
        weather: &Weather,
    ) -> Result<LegPerformance, FuelError> {
        if cruise_speed_kt <= 0.0 {
            return Err(FuelError::Computation(
                "wind correction needs a positive cruise speed".into(),
            ));
        }
        let distance_nm = from.distance_nm(to);
        if distance_nm <= f64::EPSILON {
            return Ok(LegPerformance::still_air(0.0, cruise_speed_kt));
        }

        let course = from.bearing_to(to);
        // Wind direction is where it blows from; a positive component is a headwind.
        let headwind =
            weather.wind_speed_kt * (weather.wind_direction_deg.to_radians() - course).cos();
        let ground_speed_kt =
            (cruise_speed_kt - headwind).max(cruise_speed_kt * self.min_ground_speed_ratio);

        Ok(LegPerformance {
            ground_speed_kt,
            time_hr: distance_nm / ground_speed_kt,
        })
    }
}
