//! Per-stop fuel and passenger cards.
//!
//! The master manager hands a [`StopCardRequest`] to whatever
//! [`StopCardCalculator`] it was built with. [`DirectStopCardCalculator`] is
//! the still-air implementation used by default.

use crate::error::FuelError;
use crate::models::{Aircraft, EffectiveFuelValues, Waypoint};
use crate::route::leg_stats;
use crate::segments::{DepartureInputs, SegmentAnalysis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCard {
    /// Index into the landing-stop list
    pub index: usize,
    /// Index into the full waypoint list
    pub waypoint_index: usize,
    pub stop_name: String,
    pub is_departure: bool,
    pub is_destination: bool,
    pub is_refuel_stop: bool,
    /// Distance to the next landing stop
    pub leg_distance_nm: f64,
    pub leg_time_hr: f64,
    pub leg_fuel_lbs: f64,
    /// Flight fuel to the next refuel stop or the destination
    pub trip_fuel: f64,
    pub contingency_fuel: f64,
    pub taxi_fuel: f64,
    pub reserve_fuel: f64,
    pub extra_fuel: f64,
    pub ara_fuel: f64,
    pub approach_fuel: f64,
    pub deck_fuel: f64,
    /// Fuel on board when leaving this stop
    pub total_fuel: f64,
    pub exceeds_max_fuel: bool,
    pub available_payload_lbs: f64,
    pub max_passengers: u32,
}

/// Everything a stop-card calculator may read. Borrowed from the manager state.
#[derive(Debug, Clone, Copy)]
pub struct StopCardRequest<'a> {
    pub waypoints: &'a [Waypoint],
    /// Positions of the landing stops in `waypoints`
    pub stop_positions: &'a [usize],
    pub aircraft: &'a Aircraft,
    pub fuel_values: &'a EffectiveFuelValues,
    pub segments: &'a SegmentAnalysis,
}

pub trait StopCardCalculator: Send + Sync {
    fn calculate(&self, request: &StopCardRequest<'_>) -> Result<Vec<StopCard>, FuelError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectStopCardCalculator;

impl DirectStopCardCalculator {
    /// Still-air legs between consecutive landing stops, summed over any
    /// waypoint-only points in between.
    fn stop_legs(request: &StopCardRequest<'_>) -> Result<Vec<(f64, f64, f64)>, FuelError> {
        request
            .stop_positions
            .windows(2)
            .map(|pair| {
                let mut leg = (0.0, 0.0, 0.0);
                for k in pair[0]..pair[1] {
                    let stats = leg_stats(
                        &request.waypoints[k],
                        &request.waypoints[k + 1],
                        request.aircraft,
                        None,
                        None,
                    )?;
                    leg.0 += stats.distance_nm;
                    leg.1 += stats.time_hr;
                    leg.2 += stats.fuel_lbs;
                }
                Ok(leg)
            })
            .collect()
    }
}

impl StopCardCalculator for DirectStopCardCalculator {
    fn calculate(&self, request: &StopCardRequest<'_>) -> Result<Vec<StopCard>, FuelError> {
        let stop_count = request.stop_positions.len();
        if stop_count < 2 {
            return Err(FuelError::InsufficientData(
                "stop cards need at least two landing stops".into(),
            ));
        }
        if request.segments.stop_count() != stop_count {
            return Err(FuelError::Computation(format!(
                "segment analysis covers {} stops, route has {}",
                request.segments.stop_count(),
                stop_count
            )));
        }

        let legs = Self::stop_legs(request)?;
        let values = request.fuel_values;
        let aircraft = request.aircraft;
        let last = stop_count - 1;
        let mut cards = Vec::with_capacity(stop_count);

        for index in 0..stop_count {
            let waypoint_index = request.stop_positions[index];
            let is_destination = index == last;
            let (leg_distance_nm, leg_time_hr, leg_fuel_lbs) =
                legs.get(index).copied().unwrap_or_default();

            // Fuel runs until the next refuel stop or the end of the route.
            let fuel_until = request
                .segments
                .refuel_indices
                .iter()
                .copied()
                .find(|&r| r > index)
                .unwrap_or(last);
            let trip_fuel: f64 = legs[index.min(fuel_until)..fuel_until]
                .iter()
                .map(|leg| leg.2)
                .sum();

            let contingency_fuel = values.contingency_for_trip(trip_fuel);
            let taxi_fuel = if index == 0 { values.taxi_fuel } else { 0.0 };
            let reserve_fuel = values.reserve_for_trip(trip_fuel);
            let extra_fuel = if is_destination { 0.0 } else { values.extra_fuel };

            let summary = request
                .segments
                .fuel_summary_for_stop(
                    index,
                    &DepartureInputs {
                        leg_trip_fuel: trip_fuel,
                        reserve_fuel,
                        extra_fuel,
                    },
                )
                .ok_or_else(|| {
                    FuelError::Computation(format!("no segment owns stop {index}"))
                })?;
            let carried = summary.departure_requirements;

            let total_fuel = carried.total + contingency_fuel + taxi_fuel;
            let available_payload_lbs =
                (aircraft.available_payload(total_fuel) - values.cargo_weight_lbs).max(0.0);
            let by_weight = if values.passenger_weight_lbs > 0.0 {
                (available_payload_lbs / values.passenger_weight_lbs).floor() as u32
            } else {
                aircraft.max_passengers
            };

            cards.push(StopCard {
                index,
                waypoint_index,
                stop_name: request.waypoints[waypoint_index].name.clone(),
                is_departure: index == 0,
                is_destination,
                is_refuel_stop: summary.is_refuel_stop,
                leg_distance_nm,
                leg_time_hr,
                leg_fuel_lbs,
                trip_fuel,
                contingency_fuel,
                taxi_fuel,
                reserve_fuel,
                extra_fuel,
                ara_fuel: carried.ara_fuel,
                approach_fuel: carried.approach_fuel,
                deck_fuel: carried.deck_fuel,
                total_fuel,
                exceeds_max_fuel: total_fuel > aircraft.max_fuel_lbs,
                available_payload_lbs,
                max_passengers: by_weight.min(aircraft.max_passengers),
            });
        }

        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{stop_positions, landing_stops, ReserveType, WaypointRole};
    use crate::spatial::GeoPoint;

    fn aircraft() -> Aircraft {
        Aircraft {
            registration: Some("G-OFSH".into()),
            cruise_speed_kt: 145.0,
            fuel_burn_lbs_hr: 1100.0,
            max_passengers: 19,
            max_takeoff_weight_lbs: 26_500.0,
            empty_weight_lbs: 17_000.0,
            max_fuel_lbs: 5_000.0,
            max_payload_lbs: 8_000.0,
        }
    }

    fn values() -> EffectiveFuelValues {
        EffectiveFuelValues {
            taxi_fuel: 50.0,
            reserve_fuel: 600.0,
            reserve_type: ReserveType::Fixed,
            contingency_percent: 10.0,
            contingency_alternate_percent: 0.0,
            deck_time_per_stop_min: 0.0,
            deck_fuel_flow_lbs_hr: 400.0,
            passenger_weight_lbs: 220.0,
            cargo_weight_lbs: 0.0,
            extra_fuel: 0.0,
            ara_fuel_default: 200.0,
            approach_fuel_default: 200.0,
            ara_fuel: 0.0,
            approach_fuel: 0.0,
        }
    }

    /// A -> B -> C, 40 nm then 35 nm due north.
    fn route() -> Vec<Waypoint> {
        let a = GeoPoint::new(57.0, 1.0);
        let b = a.offset(40.0, 0.0);
        let c = b.offset(35.0, 0.0);
        vec![
            Waypoint::new("A", a.lat, a.lon, WaypointRole::Departure),
            Waypoint::new("B", b.lat, b.lon, WaypointRole::Intermediate),
            Waypoint::new("C", c.lat, c.lon, WaypointRole::Destination),
        ]
    }

    fn cards(waypoints: &[Waypoint], refuels: &[usize], values: &EffectiveFuelValues) -> Vec<StopCard> {
        let positions = stop_positions(waypoints);
        let stops = landing_stops(waypoints);
        let segments = SegmentAnalysis::build(&stops, refuels, &[], values);
        let ac = aircraft();
        DirectStopCardCalculator
            .calculate(&StopCardRequest {
                waypoints,
                stop_positions: &positions,
                aircraft: &ac,
                fuel_values: values,
                segments: &segments,
            })
            .unwrap()
    }

    #[test]
    fn departure_card_matches_hand_calculation() {
        let cards = cards(&route(), &[], &values());
        assert_eq!(cards.len(), 3);
        let dep = &cards[0];
        assert!((dep.trip_fuel - 569.0).abs() < 1.5, "trip {}", dep.trip_fuel);
        assert!((dep.contingency_fuel - 57.0).abs() < 1.0);
        assert!((dep.total_fuel - 1276.0).abs() < 2.0, "total {}", dep.total_fuel);
        assert_eq!(dep.taxi_fuel, 50.0);
        assert!((dep.leg_distance_nm - 40.0).abs() < 0.01);
    }

    #[test]
    fn refuel_stop_restarts_trip_fuel() {
        let cards = cards(&route(), &[1], &values());
        let dep = &cards[0];
        let mid = &cards[1];
        assert!(mid.is_refuel_stop);
        // A only carries the A -> B leg now.
        assert!((dep.trip_fuel - 40.0 / 145.0 * 1100.0).abs() < 1.0);
        assert!((mid.trip_fuel - 35.0 / 145.0 * 1100.0).abs() < 1.0);
        assert_eq!(mid.taxi_fuel, 0.0);
    }

    #[test]
    fn destination_card_carries_nothing_forward() {
        let cards = cards(&route(), &[], &values());
        let dest = cards.last().unwrap();
        assert!(dest.is_destination);
        assert_eq!(dest.trip_fuel, 0.0);
        assert_eq!(dest.leg_distance_nm, 0.0);
    }

    #[test]
    fn payload_and_passengers_follow_fuel() {
        let mut heavy = values();
        heavy.cargo_weight_lbs = 500.0;
        let cards = cards(&route(), &[], &heavy);
        let dep = &cards[0];
        // Structural payload limit binds before takeoff weight here.
        let expected = (26_500.0 - 17_000.0 - dep.total_fuel).min(8_000.0) - 500.0;
        assert_eq!(expected, 7_500.0);
        assert!((dep.available_payload_lbs - expected).abs() < 1e-6);
        assert_eq!(dep.max_passengers, 19, "seats bind before weight");
        assert!(!dep.exceeds_max_fuel);
    }

    #[test]
    fn waypoint_only_points_fold_into_the_leg() {
        let mut wps = route();
        let via = wps[0].point().offset(20.0, 0.3);
        wps.insert(1, Waypoint::new("VIA", via.lat, via.lon, WaypointRole::WaypointOnly));
        let cards = cards(&wps, &[], &values());
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[1].waypoint_index, 2);
        assert!(cards[0].leg_distance_nm > 40.0);
    }
}
