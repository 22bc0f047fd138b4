//! Scoring and ranking of fuel-stop candidates.
//!
//! Weights are tunable. The contract is the direction of each term: more
//! passenger gain raises a score; more route deviation or more distance from
//! the split point lowers it.

use crate::models::{Aircraft, Waypoint};
use crate::platforms::Platform;
use crate::spatial::{insertion_detour_nm, GeoPoint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Positive starting score for every candidate
    pub base_score: f64,
    /// Bonus per passenger gained
    pub passenger_gain_weight: f64,
    /// Penalty per nm between candidate and split point
    pub split_distance_penalty_per_nm: f64,
    /// Penalty per nm of added route distance
    pub deviation_penalty_per_nm: f64,
    /// Bonus per 100 lbs of fuel saved
    pub fuel_savings_bonus_per_100_lbs: f64,
    pub fuel_savings_bonus_cap: f64,
    /// Upper bound on passengers a single stop can plausibly free up
    pub max_passenger_gain: u32,
    /// Floor on deviation when computing fuel efficiency (nm)
    pub deviation_epsilon_nm: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            base_score: 100.0,
            passenger_gain_weight: 50.0,
            split_distance_penalty_per_nm: 1.0,
            deviation_penalty_per_nm: 2.0,
            fuel_savings_bonus_per_100_lbs: 5.0,
            fuel_savings_bonus_cap: 30.0,
            max_passenger_gain: 5,
            deviation_epsilon_nm: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationCandidate {
    pub platform: Platform,
    pub route_deviation_nm: f64,
    pub distance_from_split_point_nm: f64,
    pub fuel_savings_lbs: f64,
    pub passenger_gain: u32,
    pub fuel_efficiency: f64,
    pub score: f64,
    /// Position in the waypoint list where the stop would be inserted
    pub insertion_index: usize,
}

/// Context shared by every candidate of one scoring run.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub waypoints: &'a [Waypoint],
    /// Split point or final destination
    pub target: GeoPoint,
    pub aircraft: &'a Aircraft,
    pub passenger_weight_lbs: f64,
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationScorer {
    weights: ScoringWeights,
}

impl OptimizationScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Cheapest place to insert `point`: `(insertion_index, added_nm)`.
    pub fn best_insertion(waypoints: &[Waypoint], point: &GeoPoint) -> Option<(usize, f64)> {
        waypoints
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let detour = insertion_detour_nm(&pair[0].point(), point, &pair[1].point());
                (i + 1, detour)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Fuel no longer carried from the departure when refuelling at `point`.
    ///
    /// Rough estimate: the still-air fuel for the distance from the
    /// candidate to the target, less the fuel burned on the detour.
    pub fn estimate_fuel_savings(
        aircraft: &Aircraft,
        point: &GeoPoint,
        target: &GeoPoint,
        deviation_nm: f64,
    ) -> f64 {
        let beyond = aircraft.trip_fuel(point.distance_nm(target));
        let detour = aircraft.trip_fuel(deviation_nm);
        (beyond - detour).max(0.0)
    }

    pub fn passenger_gain(&self, fuel_savings_lbs: f64, context: &ScoringContext<'_>) -> u32 {
        if context.passenger_weight_lbs <= 0.0 {
            return 0;
        }
        let raw = (fuel_savings_lbs / context.passenger_weight_lbs).floor().max(0.0) as u32;
        raw.min(context.aircraft.max_passengers)
            .min(self.weights.max_passenger_gain)
    }

    pub fn score_candidate(
        &self,
        platform: &Platform,
        context: &ScoringContext<'_>,
    ) -> Option<OptimizationCandidate> {
        let point = platform.point();
        let (insertion_index, route_deviation_nm) =
            Self::best_insertion(context.waypoints, &point)?;
        let distance_from_split_point_nm = point.distance_nm(&context.target);
        let fuel_savings_lbs = Self::estimate_fuel_savings(
            context.aircraft,
            &point,
            &context.target,
            route_deviation_nm,
        );
        let passenger_gain = self.passenger_gain(fuel_savings_lbs, context);
        let fuel_efficiency =
            fuel_savings_lbs / route_deviation_nm.max(self.weights.deviation_epsilon_nm);

        let w = &self.weights;
        let fuel_bonus = (fuel_savings_lbs / 100.0 * w.fuel_savings_bonus_per_100_lbs)
            .min(w.fuel_savings_bonus_cap);
        let score = w.base_score + passenger_gain as f64 * w.passenger_gain_weight
            - distance_from_split_point_nm * w.split_distance_penalty_per_nm
            - route_deviation_nm * w.deviation_penalty_per_nm
            + fuel_bonus;

        Some(OptimizationCandidate {
            platform: platform.clone(),
            route_deviation_nm,
            distance_from_split_point_nm,
            fuel_savings_lbs,
            passenger_gain,
            fuel_efficiency,
            score,
            insertion_index,
        })
    }

    /// Score every platform and sort best first.
    pub fn rank(
        &self,
        platforms: &[Platform],
        context: &ScoringContext<'_>,
    ) -> Vec<OptimizationCandidate> {
        let mut candidates: Vec<OptimizationCandidate> = platforms
            .iter()
            .filter_map(|platform| self.score_candidate(platform, context))
            .collect();
        candidates.sort_by(compare_candidates);
        candidates
    }
}

/// Descending score; ties go to the smaller deviation, then the name.
fn compare_candidates(a: &OptimizationCandidate, b: &OptimizationCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.route_deviation_nm.total_cmp(&b.route_deviation_nm))
        .then_with(|| a.platform.name.cmp(&b.platform.name))
}
