//! Fuel segmentation at refuel boundaries.
//!
//! A route of `n` stops with refuel stops `R` is cut into `|R| + 1` segments.
//! Each refuel index closes one segment and opens the next, so adjacent
//! segments share exactly one stop. A refuel stop is a hard reset: summaries
//! taken there only look at what lies ahead of it.

use crate::models::{EffectiveFuelValues, Waypoint, WeatherSegment};
use crate::weather::WeatherLookup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-location fuel figures used while classifying stops.
pub trait StopFuelSettings {
    fn ara_fuel_for(&self, location: &str) -> f64;
    fn approach_fuel_for(&self, location: &str) -> f64;
    fn deck_fuel_for(&self, location: &str) -> f64;
}

impl StopFuelSettings for EffectiveFuelValues {
    fn ara_fuel_for(&self, _location: &str) -> f64 {
        self.ara_fuel_default
    }

    fn approach_fuel_for(&self, _location: &str) -> f64 {
        self.approach_fuel_default
    }

    fn deck_fuel_for(&self, _location: &str) -> f64 {
        self.deck_fuel_per_stop()
    }
}

/// Fuel attributed to one stop inside a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStopFuel {
    pub stop_index: usize,
    pub location: String,
    pub ara_fuel: f64,
    pub approach_fuel: f64,
    pub deck_fuel: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub id: String,
    pub start_index: usize,
    /// Inclusive
    pub end_index: usize,
    /// Segment starts at a refuel stop
    pub is_refuel_segment: bool,
    pub ara_fuel: f64,
    pub approach_fuel: f64,
    pub ara_locations: Vec<String>,
    pub approach_locations: Vec<String>,
    pub deck_fuel_by_location: BTreeMap<String, f64>,
    pub stops: Vec<SegmentStopFuel>,
}

impl FlightSegment {
    pub fn contains(&self, stop_index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&stop_index)
    }

    pub fn deck_fuel(&self) -> f64 {
        self.deck_fuel_by_location.values().sum()
    }

    pub fn requirements(&self) -> FuelRequirements {
        FuelRequirements::new(self.ara_fuel, self.approach_fuel, self.deck_fuel())
    }

    /// Requirements of stops strictly after `stop_index`.
    pub fn requirements_after(&self, stop_index: usize) -> FuelRequirements {
        self.stops
            .iter()
            .filter(|stop| stop.stop_index > stop_index)
            .fold(FuelRequirements::default(), |acc, stop| {
                acc.plus(&FuelRequirements::new(
                    stop.ara_fuel,
                    stop.approach_fuel,
                    stop.deck_fuel,
                ))
            })
    }
}

/// Weather and deck fuel still to be carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelRequirements {
    pub ara_fuel: f64,
    pub approach_fuel: f64,
    pub deck_fuel: f64,
    pub total: f64,
}

impl FuelRequirements {
    pub fn new(ara_fuel: f64, approach_fuel: f64, deck_fuel: f64) -> Self {
        let ara_fuel = ara_fuel.max(0.0);
        let approach_fuel = approach_fuel.max(0.0);
        let deck_fuel = deck_fuel.max(0.0);
        Self {
            ara_fuel,
            approach_fuel,
            deck_fuel,
            total: ara_fuel + approach_fuel + deck_fuel,
        }
    }

    pub fn plus(&self, other: &FuelRequirements) -> Self {
        Self::new(
            self.ara_fuel + other.ara_fuel,
            self.approach_fuel + other.approach_fuel,
            self.deck_fuel + other.deck_fuel,
        )
    }
}

/// Externally supplied figures for the leg leaving a stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartureInputs {
    pub leg_trip_fuel: f64,
    pub reserve_fuel: f64,
    pub extra_fuel: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartureRequirements {
    pub trip_fuel: f64,
    pub reserve_fuel: f64,
    pub extra_fuel: f64,
    pub ara_fuel: f64,
    pub approach_fuel: f64,
    pub deck_fuel: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopFuelSummary {
    pub stop_index: usize,
    pub stop_name: String,
    pub segment_id: String,
    pub is_refuel_stop: bool,
    pub remaining_requirements: FuelRequirements,
    pub departure_requirements: DepartureRequirements,
}

/// Segments of one route plus the queries over them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnalysis {
    pub segments: Vec<FlightSegment>,
    pub refuel_indices: Vec<usize>,
    pub stop_names: Vec<String>,
}

impl SegmentAnalysis {
    pub fn build(
        stops: &[Waypoint],
        refuel_indices: &[usize],
        weather_segments: &[WeatherSegment],
        settings: &impl StopFuelSettings,
    ) -> Self {
        let refuels = normalize_refuel_indices(refuel_indices, stops.len());
        let lookup = WeatherLookup::new(weather_segments);
        let segments = segment_ranges(stops.len(), &refuels)
            .into_iter()
            .enumerate()
            .map(|(n, (start, end))| {
                SegmentEngine::calculate_segment_fuel_requirements(
                    n, start, end, stops, &refuels, &lookup, settings,
                )
            })
            .collect();

        Self {
            segments,
            refuel_indices: refuels,
            stop_names: stops.iter().map(|stop| stop.name.clone()).collect(),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stop_names.len()
    }

    pub fn is_refuel_stop(&self, stop_index: usize) -> bool {
        self.refuel_indices.binary_search(&stop_index).is_ok()
    }

    /// Segment that owns `stop_index`; a refuel stop belongs to the segment it opens.
    pub fn segment_for_stop(&self, stop_index: usize) -> Option<&FlightSegment> {
        if self.is_refuel_stop(stop_index) {
            return self
                .segments
                .iter()
                .find(|segment| segment.start_index == stop_index);
        }
        self.segments
            .iter()
            .find(|segment| segment.contains(stop_index))
    }

    /// ARA/approach/deck fuel still ahead of `stop_index`.
    pub fn remaining_requirements(&self, stop_index: usize) -> Option<FuelRequirements> {
        let owner = self.segment_for_stop(stop_index)?;

        if self.is_refuel_stop(stop_index) {
            // Fresh baseline: nothing upstream of the refuel counts.
            let fresh = self
                .segments
                .iter()
                .filter(|segment| segment.start_index >= stop_index)
                .fold(FuelRequirements::default(), |acc, segment| {
                    acc.plus(&segment.requirements())
                });
            return Some(fresh);
        }

        let following = self
            .segments
            .iter()
            .filter(|segment| segment.start_index > owner.start_index)
            .fold(FuelRequirements::default(), |acc, segment| {
                acc.plus(&segment.requirements())
            });
        Some(owner.requirements_after(stop_index).plus(&following))
    }

    /// Requirements across every segment of the flight.
    pub fn total_requirements(&self) -> FuelRequirements {
        self.segments
            .iter()
            .fold(FuelRequirements::default(), |acc, segment| {
                acc.plus(&segment.requirements())
            })
    }

    pub fn fuel_summary_for_stop(
        &self,
        stop_index: usize,
        inputs: &DepartureInputs,
    ) -> Option<StopFuelSummary> {
        let owner = self.segment_for_stop(stop_index)?;
        let remaining = self.remaining_requirements(stop_index)?;

        // The first stop carries fuel for the whole plan.
        let carried = if stop_index == 0 {
            self.total_requirements()
        } else {
            remaining
        };

        let trip_fuel = inputs.leg_trip_fuel.max(0.0);
        let reserve_fuel = inputs.reserve_fuel.max(0.0);
        let extra_fuel = inputs.extra_fuel.max(0.0);
        let departure = DepartureRequirements {
            trip_fuel,
            reserve_fuel,
            extra_fuel,
            ara_fuel: carried.ara_fuel,
            approach_fuel: carried.approach_fuel,
            deck_fuel: carried.deck_fuel,
            total: trip_fuel + reserve_fuel + extra_fuel + carried.total,
        };

        Some(StopFuelSummary {
            stop_index,
            stop_name: self.stop_names[stop_index].clone(),
            segment_id: owner.id.clone(),
            is_refuel_stop: self.is_refuel_stop(stop_index),
            remaining_requirements: remaining,
            departure_requirements: departure,
        })
    }
}

/// Sorted, deduplicated refuel indices that can actually split the route.
///
/// The departure and the final destination never split a route.
pub fn normalize_refuel_indices(refuel_indices: &[usize], stop_count: usize) -> Vec<usize> {
    let mut refuels: Vec<usize> = refuel_indices
        .iter()
        .copied()
        .filter(|&idx| idx > 0 && idx + 1 < stop_count)
        .collect();
    refuels.sort_unstable();
    refuels.dedup();
    refuels
}

/// Inclusive `(start, end)` index ranges, one per segment.
pub fn segment_ranges(stop_count: usize, sorted_refuels: &[usize]) -> Vec<(usize, usize)> {
    if stop_count == 0 {
        return Vec::new();
    }
    let mut ranges = Vec::with_capacity(sorted_refuels.len() + 1);
    let mut start = 0;
    for &refuel in sorted_refuels {
        ranges.push((start, refuel));
        start = refuel;
    }
    ranges.push((start, stop_count - 1));
    ranges
}

/// Holds the most recent segmentation of a route.
#[derive(Debug, Clone, Default)]
pub struct SegmentEngine {
    analysis: Option<SegmentAnalysis>,
}

impl SegmentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze_flight_segments(
        &mut self,
        stops: &[Waypoint],
        refuel_indices: &[usize],
        weather_segments: &[WeatherSegment],
        settings: &impl StopFuelSettings,
    ) -> &SegmentAnalysis {
        let analysis = SegmentAnalysis::build(stops, refuel_indices, weather_segments, settings);
        self.analysis.insert(analysis)
    }

    pub fn analysis(&self) -> Option<&SegmentAnalysis> {
        self.analysis.as_ref()
    }

    pub fn segments(&self) -> &[FlightSegment] {
        self.analysis
            .as_ref()
            .map(|analysis| analysis.segments.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_fuel_summary_for_stop(
        &self,
        stop_index: usize,
        inputs: &DepartureInputs,
    ) -> Option<StopFuelSummary> {
        self.analysis
            .as_ref()?
            .fuel_summary_for_stop(stop_index, inputs)
    }

    /// Classify every stop of one segment and total its requirements.
    ///
    /// The leading stop of a segment that opens at a refuel is skipped: it
    /// was already counted as the trailing stop of the previous segment.
    pub fn calculate_segment_fuel_requirements(
        ordinal: usize,
        start_index: usize,
        end_index: usize,
        stops: &[Waypoint],
        sorted_refuels: &[usize],
        lookup: &WeatherLookup,
        settings: &impl StopFuelSettings,
    ) -> FlightSegment {
        let opens_at_refuel = sorted_refuels.binary_search(&start_index).is_ok();
        let last_stop = stops.len().saturating_sub(1);

        let mut segment = FlightSegment {
            id: format!("segment-{ordinal}"),
            start_index,
            end_index,
            is_refuel_segment: opens_at_refuel,
            ara_fuel: 0.0,
            approach_fuel: 0.0,
            ara_locations: Vec::new(),
            approach_locations: Vec::new(),
            deck_fuel_by_location: BTreeMap::new(),
            stops: Vec::new(),
        };

        for stop_index in start_index..=end_index.min(last_stop) {
            if stop_index == start_index && opens_at_refuel {
                continue;
            }
            let name = &stops[stop_index].name;
            let mut entry = SegmentStopFuel {
                stop_index,
                location: name.clone(),
                ara_fuel: 0.0,
                approach_fuel: 0.0,
                deck_fuel: 0.0,
            };

            if let Some(weather) = lookup.get(name) {
                let already_ara = contains_ignore_case(&segment.ara_locations, name);
                let already_approach = contains_ignore_case(&segment.approach_locations, name);
                if weather.is_rig && weather.ara_required && !already_ara {
                    entry.ara_fuel = settings.ara_fuel_for(name).max(0.0);
                    segment.ara_locations.push(name.clone());
                }
                if !weather.is_rig && weather.approach_required && !already_approach {
                    entry.approach_fuel = settings.approach_fuel_for(name).max(0.0);
                    segment.approach_locations.push(name.clone());
                }
            }

            if stop_index > 0 && stop_index < last_stop {
                entry.deck_fuel = settings.deck_fuel_for(name).max(0.0);
                if entry.deck_fuel > 0.0 {
                    *segment
                        .deck_fuel_by_location
                        .entry(name.clone())
                        .or_insert(0.0) += entry.deck_fuel;
                }
            }

            segment.ara_fuel += entry.ara_fuel;
            segment.approach_fuel += entry.approach_fuel;
            segment.stops.push(entry);
        }

        segment
    }
}

fn contains_ignore_case(list: &[String], name: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WaypointRole;

    struct Flat {
        ara: f64,
        approach: f64,
        deck: f64,
    }

    impl StopFuelSettings for Flat {
        fn ara_fuel_for(&self, _location: &str) -> f64 {
            self.ara
        }
        fn approach_fuel_for(&self, _location: &str) -> f64 {
            self.approach
        }
        fn deck_fuel_for(&self, _location: &str) -> f64 {
            self.deck
        }
    }

    const SETTINGS: Flat = Flat {
        ara: 200.0,
        approach: 150.0,
        deck: 0.0,
    };

    fn stops(names: &[&str]) -> Vec<Waypoint> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Waypoint::new(*name, 57.0 + i as f64 * 0.1, 1.0, WaypointRole::Intermediate))
            .collect()
    }

    fn rig(code: &str, ranking2: i32) -> WeatherSegment {
        WeatherSegment {
            location_code: code.to_string(),
            is_rig: true,
            ranking2,
            ara_required: false,
            approach_required: false,
        }
    }

    fn airport(code: &str, ranking2: i32) -> WeatherSegment {
        WeatherSegment {
            is_rig: false,
            ..rig(code, ranking2)
        }
    }

    #[test]
    fn segments_partition_stops_at_refuels() {
        assert_eq!(segment_ranges(6, &[2, 4]), vec![(0, 2), (2, 4), (4, 5)]);
        assert_eq!(segment_ranges(3, &[]), vec![(0, 2)]);
        assert!(segment_ranges(0, &[]).is_empty());
    }

    #[test]
    fn refuel_indices_are_sorted_and_filtered() {
        assert_eq!(normalize_refuel_indices(&[4, 2, 2, 0, 5, 9], 6), vec![2, 4]);
    }

    #[test]
    fn analysis_produces_one_more_segment_than_refuels() {
        let route = stops(&["A", "B", "C", "D", "E"]);
        let analysis = SegmentAnalysis::build(&route, &[3, 1], &[], &SETTINGS);
        assert_eq!(analysis.segments.len(), 3);
        assert_eq!(analysis.segments[0].start_index, 0);
        for pair in analysis.segments.windows(2) {
            assert_eq!(pair[0].end_index, pair[1].start_index);
            assert!(analysis.is_refuel_stop(pair[0].end_index));
        }
        assert_eq!(analysis.segments.last().unwrap().end_index, 4);
        assert!(analysis.segments[1].is_refuel_segment);
        assert!(!analysis.segments[0].is_refuel_segment);
    }

    #[test]
    fn refuel_stop_summary_ignores_upstream_segments() {
        let route = stops(&["A", "RIG1", "B", "RIG2", "C"]);
        let weather = vec![rig("RIG1", 8), rig("RIG2", 5), airport("C", 10)];
        let analysis = SegmentAnalysis::build(&route, &[2], &weather, &SETTINGS);

        let at_refuel = analysis.remaining_requirements(2).unwrap();
        assert_eq!(at_refuel.ara_fuel, 200.0, "only RIG2 lies ahead");
        assert_eq!(at_refuel.approach_fuel, 150.0);

        let at_departure = analysis.remaining_requirements(0).unwrap();
        assert_eq!(at_departure.ara_fuel, 400.0);
    }

    #[test]
    fn non_refuel_stop_carries_forward_only() {
        let route = stops(&["A", "RIG1", "RIG2", "C"]);
        let weather = vec![rig("RIG1", 8), rig("RIG2", 8)];
        let analysis = SegmentAnalysis::build(&route, &[], &weather, &SETTINGS);

        assert_eq!(analysis.remaining_requirements(1).unwrap().ara_fuel, 200.0);
        assert_eq!(analysis.remaining_requirements(2).unwrap().ara_fuel, 0.0);
        assert_eq!(analysis.remaining_requirements(3).unwrap().total, 0.0);
    }

    #[test]
    fn first_stop_departure_covers_whole_plan() {
        let route = stops(&["A", "RIG1", "B", "RIG2", "C"]);
        let weather = vec![rig("RIG1", 8), rig("RIG2", 8)];
        let analysis = SegmentAnalysis::build(&route, &[2], &weather, &SETTINGS);
        let inputs = DepartureInputs {
            leg_trip_fuel: 300.0,
            reserve_fuel: 600.0,
            extra_fuel: 50.0,
        };

        let first = analysis.fuel_summary_for_stop(0, &inputs).unwrap();
        assert_eq!(first.departure_requirements.ara_fuel, 400.0);
        assert_eq!(first.departure_requirements.total, 300.0 + 600.0 + 50.0 + 400.0);

        let refuel = analysis.fuel_summary_for_stop(2, &inputs).unwrap();
        assert!(refuel.is_refuel_stop);
        assert_eq!(refuel.segment_id, "segment-1");
        assert_eq!(refuel.departure_requirements.ara_fuel, 200.0);
    }

    #[test]
    fn deck_fuel_only_at_intermediate_stops() {
        let settings = Flat {
            ara: 0.0,
            approach: 0.0,
            deck: 33.0,
        };
        let route = stops(&["A", "B", "C", "D"]);
        let analysis = SegmentAnalysis::build(&route, &[], &[], &settings);
        let segment = &analysis.segments[0];
        assert_eq!(segment.deck_fuel_by_location.len(), 2);
        assert!((segment.deck_fuel() - 66.0).abs() < 1e-9);
        assert!((analysis.remaining_requirements(1).unwrap().deck_fuel - 33.0).abs() < 1e-9);
    }

    #[test]
    fn remaining_is_never_negative() {
        let settings = Flat {
            ara: -50.0,
            approach: -10.0,
            deck: -1.0,
        };
        let route = stops(&["A", "RIG1", "B"]);
        let analysis = SegmentAnalysis::build(&route, &[1], &[rig("RIG1", 8)], &settings);
        for idx in 0..route.len() {
            assert!(analysis.remaining_requirements(idx).unwrap().total >= 0.0);
        }
    }

    #[test]
    fn engine_keeps_last_analysis() {
        let mut engine = SegmentEngine::new();
        assert!(engine.get_fuel_summary_for_stop(0, &DepartureInputs::default()).is_none());
        engine.analyze_flight_segments(&stops(&["A", "B", "C"]), &[1], &[], &SETTINGS);
        assert_eq!(engine.segments().len(), 2);
        assert!(engine.get_fuel_summary_for_stop(5, &DepartureInputs::default()).is_none());
        assert!(engine.get_fuel_summary_for_stop(1, &DepartureInputs::default()).is_some());
    }
}
