//! Leg-by-leg distance, time and fuel for a route.

use crate::error::FuelError;
use crate::models::{Aircraft, Waypoint, Weather};
use crate::wind::{LegPerformance, WindCalculator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegStats {
    pub from: String,
    pub to: String,
    pub distance_nm: f64,
    pub course_deg: f64,
    pub ground_speed_kt: f64,
    pub time_hr: f64,
    pub fuel_lbs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStats {
    pub total_distance_nm: f64,
    pub total_time_hr: f64,
    /// `HH:MM`
    pub estimated_time: String,
    pub trip_fuel_lbs: f64,
    pub wind_adjusted: bool,
    pub legs: Vec<LegStats>,
}

/// Performance of one leg, wind-adjusted when both a model and weather are present.
pub fn leg_stats(
    from: &Waypoint,
    to: &Waypoint,
    aircraft: &Aircraft,
    weather: Option<&Weather>,
    wind: Option<&dyn WindCalculator>,
) -> Result<LegStats, FuelError> {
    let a = from.point();
    let b = to.point();
    let distance_nm = a.distance_nm(&b);
    let performance = match (wind, weather) {
        (Some(wind), Some(weather)) => {
            wind.leg_performance(&a, &b, aircraft.cruise_speed_kt, weather)?
        }
        _ => LegPerformance::still_air(distance_nm, aircraft.cruise_speed_kt),
    };
    if !performance.time_hr.is_finite() || performance.time_hr < 0.0 {
        return Err(FuelError::Computation(format!(
            "leg {} -> {} produced an invalid time",
            from.name, to.name
        )));
    }

    Ok(LegStats {
        from: from.name.clone(),
        to: to.name.clone(),
        distance_nm,
        course_deg: a.bearing_to(&b).to_degrees().rem_euclid(360.0),
        ground_speed_kt: performance.ground_speed_kt,
        time_hr: performance.time_hr,
        fuel_lbs: performance.time_hr * aircraft.fuel_burn_lbs_hr,
    })
}

pub fn calculate_route_stats(
    waypoints: &[Waypoint],
    aircraft: &Aircraft,
    weather: Option<&Weather>,
    wind: Option<&dyn WindCalculator>,
) -> Result<RouteStats, FuelError> {
    let legs = waypoints
        .windows(2)
        .map(|pair| leg_stats(&pair[0], &pair[1], aircraft, weather, wind))
        .collect::<Result<Vec<_>, _>>()?;

    let total_distance_nm = legs.iter().map(|leg| leg.distance_nm).sum();
    let total_time_hr: f64 = legs.iter().map(|leg| leg.time_hr).sum();
    let trip_fuel_lbs = legs.iter().map(|leg| leg.fuel_lbs).sum();

    Ok(RouteStats {
        total_distance_nm,
        total_time_hr,
        estimated_time: format_hours(total_time_hr),
        trip_fuel_lbs,
        wind_adjusted: wind.is_some() && weather.is_some(),
        legs,
    })
}

pub fn format_hours(hours: f64) -> String {
    let total_minutes = (hours.max(0.0) * 60.0).round() as u64;
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WaypointRole;
    use crate::wind::HeadwindCalculator;

    fn aircraft() -> Aircraft {
        Aircraft {
            registration: None,
            cruise_speed_kt: 145.0,
            fuel_burn_lbs_hr: 1100.0,
            max_passengers: 19,
            max_takeoff_weight_lbs: 26_500.0,
            empty_weight_lbs: 15_500.0,
            max_fuel_lbs: 5_000.0,
            max_payload_lbs: 6_000.0,
        }
    }

    fn route() -> Vec<Waypoint> {
        vec![
            Waypoint::new("A", 0.0, 0.0, WaypointRole::Departure),
            Waypoint::new("B", 0.0, 1.0, WaypointRole::Intermediate),
            Waypoint::new("C", 0.0, 2.0, WaypointRole::Destination),
        ]
    }

    #[test]
    fn still_air_totals() {
        let stats = calculate_route_stats(&route(), &aircraft(), None, None).unwrap();
        assert_eq!(stats.legs.len(), 2);
        assert!((stats.total_distance_nm - 120.08).abs() < 0.1);
        let expected_fuel = stats.total_distance_nm / 145.0 * 1100.0;
        assert!((stats.trip_fuel_lbs - expected_fuel).abs() < 1e-6);
        assert!(!stats.wind_adjusted);
        assert!((stats.legs[0].course_deg - 90.0).abs() < 0.1);
    }

    #[test]
    fn wind_needs_weather_to_apply() {
        let calc = HeadwindCalculator::default();
        let stats = calculate_route_stats(&route(), &aircraft(), None, Some(&calc)).unwrap();
        assert!(!stats.wind_adjusted);

        let weather = Weather {
            wind_speed_kt: 25.0,
            wind_direction_deg: 90.0,
            visibility_sm: None,
            ceiling_ft: None,
        };
        let windy = calculate_route_stats(&route(), &aircraft(), Some(&weather), Some(&calc)).unwrap();
        assert!(windy.wind_adjusted);
        assert!(windy.total_time_hr > stats.total_time_hr);
    }

    #[test]
    fn hours_format() {
        assert_eq!(format_hours(1.5), "01:30");
        assert_eq!(format_hours(0.0), "00:00");
    }
}
