//! Fuel-stop suggestions for payload-limited routes.
//!
//! When a stop cannot lift its passengers because of fuel weight (while the
//! seats are there), a refuel somewhere ahead lets the aircraft leave with
//! less fuel. The optimizer looks for fuel-capable platforms in a corridor
//! toward the split point, ranks them and returns at most a couple of
//! suggestions. It never edits the route; accepting a suggestion is handed to
//! an external callback.

use crate::config::EngineConfig;
use crate::corridor::{CorridorSearcher, SearchCorridor};
use crate::master::FuelCalculations;
use crate::models::{Aircraft, Waypoint, WaypointRole};
use crate::platforms::{Platform, PlatformEvaluator};
use crate::scoring::{OptimizationCandidate, OptimizationScorer, ScoringContext};
use crate::spatial::GeoPoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Load requested at one landing stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLoad {
    /// Index into the landing-stop list
    pub index: usize,
    /// Index into the waypoint list
    pub waypoint_index: usize,
    pub name: String,
    #[serde(alias = "requestedPassengers")]
    pub requested_passengers: u32,
    /// Explicit passenger weight; passengers × standard weight when absent
    #[serde(default, alias = "requestedWeight")]
    pub requested_weight_lbs: Option<f64>,
    #[serde(alias = "availablePayload")]
    pub available_payload_lbs: f64,
    #[serde(alias = "availableSeats")]
    pub available_seats: u32,
    #[serde(default)]
    pub is_destination: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightData {
    pub waypoints: Vec<Waypoint>,
    pub stops: Vec<StopLoad>,
    pub aircraft: Aircraft,
    #[serde(default, alias = "platformCollections")]
    pub platform_collections: Vec<Vec<Value>>,
    #[serde(default, alias = "splitPoint")]
    pub split_point: Option<GeoPoint>,
    #[serde(alias = "passengerWeight")]
    pub passenger_weight_lbs: f64,
}

impl FlightData {
    /// Build optimizer input from a finished calculation.
    ///
    /// `requested_passengers[i]` is the load wanted out of landing stop `i`;
    /// missing entries mean nobody boards there.
    pub fn from_stop_cards(
        waypoints: &[Waypoint],
        aircraft: &Aircraft,
        calculations: &FuelCalculations,
        requested_passengers: &[u32],
        platform_collections: Vec<Vec<Value>>,
        split_point: Option<GeoPoint>,
    ) -> Self {
        let stops = calculations
            .stop_cards
            .iter()
            .map(|card| StopLoad {
                index: card.index,
                waypoint_index: card.waypoint_index,
                name: card.stop_name.clone(),
                requested_passengers: requested_passengers.get(card.index).copied().unwrap_or(0),
                requested_weight_lbs: None,
                available_payload_lbs: card.available_payload_lbs,
                available_seats: aircraft.max_passengers,
                is_destination: card.is_destination,
            })
            .collect();

        Self {
            waypoints: waypoints.to_vec(),
            stops,
            aircraft: aircraft.clone(),
            platform_collections,
            split_point,
            passenger_weight_lbs: calculations.final_fuel_values.passenger_weight_lbs,
        }
    }

    pub fn requested_weight(&self, stop: &StopLoad) -> f64 {
        stop.requested_weight_lbs
            .unwrap_or(stop.requested_passengers as f64 * self.passenger_weight_lbs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverloadedStop {
    pub index: usize,
    pub waypoint_index: usize,
    pub name: String,
    pub requested_passengers: u32,
    pub requested_weight_lbs: f64,
    pub available_payload_lbs: f64,
    pub excess_weight_lbs: f64,
    /// Passengers that would have to stay behind
    pub passengers_over: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverloadAnalysis {
    pub has_overload: bool,
    /// Weight-limited stops a fuel stop could help
    pub overloaded_stops: Vec<OverloadedStop>,
    /// Stops short on seats; adding fuel capacity cannot fix these
    pub seat_limited_stops: Vec<usize>,
    pub total_excess_weight_lbs: f64,
}

impl OverloadAnalysis {
    /// Largest excess; the earliest stop wins a tie.
    pub fn worst(&self) -> Option<&OverloadedStop> {
        self.overloaded_stops.iter().fold(None, |best, stop| match best {
            Some(b) if b.excess_weight_lbs >= stop.excess_weight_lbs => Some(b),
            _ => Some(stop),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationFailure {
    NoPassengerOverload,
    NoPlatformData,
    NoViableCandidates,
    InvalidRoute,
}

impl OptimizationFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            OptimizationFailure::NoPassengerOverload => "no_passenger_overload",
            OptimizationFailure::NoPlatformData => "no_platform_data",
            OptimizationFailure::NoViableCandidates => "no_viable_candidates",
            OptimizationFailure::InvalidRoute => "invalid_route",
        }
    }
}

impl fmt::Display for OptimizationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A ranked platform plus what a route editor needs to insert it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelStopSuggestion {
    /// 1-based rank
    pub rank: usize,
    pub insertion_index: usize,
    pub waypoint: Waypoint,
    pub candidate: OptimizationCandidate,
    pub description: String,
}

impl FuelStopSuggestion {
    fn from_candidate(rank: usize, candidate: OptimizationCandidate) -> Self {
        let platform = &candidate.platform;
        let description = format!(
            "Refuel at {} (+{:.1} nm, ~{:.0} lbs lighter, +{} pax)",
            platform.name,
            candidate.route_deviation_nm,
            candidate.fuel_savings_lbs,
            candidate.passenger_gain
        );
        Self {
            rank,
            insertion_index: candidate.insertion_index,
            waypoint: Waypoint::new(
                platform.name.clone(),
                platform.lat,
                platform.lng,
                WaypointRole::Intermediate,
            ),
            candidate,
            description,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.candidate.platform
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub success: bool,
    pub overload_analysis: OverloadAnalysis,
    pub suggestions: Vec<FuelStopSuggestion>,
    pub corridor_used: Option<SearchCorridor>,
    /// Fuel-capable operational platforms inside the corridor
    pub candidates_considered: usize,
    pub failure: Option<OptimizationFailure>,
}

impl OptimizationOutcome {
    fn failed(
        failure: OptimizationFailure,
        overload_analysis: OverloadAnalysis,
        corridor_used: Option<SearchCorridor>,
    ) -> Self {
        tracing::info!("Fuel stop optimization found nothing: {}", failure);
        Self {
            success: false,
            overload_analysis,
            suggestions: Vec::new(),
            corridor_used,
            candidates_considered: 0,
            failure: Some(failure),
        }
    }

    pub fn failure_reason(&self) -> Option<&'static str> {
        self.failure.as_ref().map(OptimizationFailure::reason)
    }
}

#[derive(Debug, Clone)]
pub struct FuelStopOptimizer {
    corridor: CorridorSearcher,
    scorer: OptimizationScorer,
    max_suggestions: usize,
}

impl Default for FuelStopOptimizer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl FuelStopOptimizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            corridor: CorridorSearcher::new(config.corridor),
            scorer: OptimizationScorer::new(config.scoring),
            max_suggestions: config.max_suggestions,
        }
    }

    /// Weight-limited, seat-feasible stops. The destination never counts.
    pub fn analyze_passenger_overload(&self, data: &FlightData) -> OverloadAnalysis {
        let last = data.stops.iter().map(|s| s.index).max();
        let mut analysis = OverloadAnalysis::default();

        for stop in &data.stops {
            if stop.is_destination || Some(stop.index) == last {
                continue;
            }
            if stop.requested_passengers > stop.available_seats {
                analysis.seat_limited_stops.push(stop.index);
                continue;
            }
            let requested_weight_lbs = data.requested_weight(stop);
            let excess_weight_lbs = requested_weight_lbs - stop.available_payload_lbs;
            if excess_weight_lbs <= 0.0 {
                continue;
            }
            let passengers_over = if data.passenger_weight_lbs > 0.0 {
                (excess_weight_lbs / data.passenger_weight_lbs).ceil() as u32
            } else {
                0
            };
            analysis.total_excess_weight_lbs += excess_weight_lbs;
            analysis.overloaded_stops.push(OverloadedStop {
                index: stop.index,
                waypoint_index: stop.waypoint_index,
                name: stop.name.clone(),
                requested_passengers: stop.requested_passengers,
                requested_weight_lbs,
                available_payload_lbs: stop.available_payload_lbs,
                excess_weight_lbs,
                passengers_over: passengers_over.min(stop.requested_passengers),
            });
        }

        analysis.has_overload = !analysis.overloaded_stops.is_empty();
        analysis
    }

    pub fn suggest_fuel_stops(&self, data: &FlightData) -> OptimizationOutcome {
        if data.waypoints.len() < 2 {
            return OptimizationOutcome::failed(
                OptimizationFailure::InvalidRoute,
                OverloadAnalysis::default(),
                None,
            );
        }

        let analysis = self.analyze_passenger_overload(data);
        let Some(worst) = analysis.worst() else {
            return OptimizationOutcome::failed(OptimizationFailure::NoPassengerOverload, analysis, None);
        };
        let Some(route_ahead) = data.waypoints.get(worst.waypoint_index..) else {
            return OptimizationOutcome::failed(OptimizationFailure::InvalidRoute, analysis, None);
        };

        let corridor = match self.corridor.create_search_corridor(route_ahead, data.split_point) {
            Ok(corridor) => corridor,
            Err(err) => {
                tracing::warn!("Could not build search corridor from {}: {}", worst.name, err);
                return OptimizationOutcome::failed(OptimizationFailure::InvalidRoute, analysis, None);
            }
        };

        let platforms = PlatformEvaluator::merge_collections(&data.platform_collections);
        if platforms.is_empty() {
            return OptimizationOutcome::failed(
                OptimizationFailure::NoPlatformData,
                analysis,
                Some(corridor),
            );
        }

        let eligible: Vec<Platform> = platforms
            .into_iter()
            .filter(|p| p.has_fuel && p.is_operational)
            .filter(|p| CorridorSearcher::is_platform_in_corridor(p, &corridor))
            .collect();

        let context = ScoringContext {
            waypoints: &data.waypoints,
            target: corridor.target,
            aircraft: &data.aircraft,
            passenger_weight_lbs: data.passenger_weight_lbs,
        };
        let ranked = self.scorer.rank(&eligible, &context);
        if ranked.is_empty() {
            return OptimizationOutcome::failed(
                OptimizationFailure::NoViableCandidates,
                analysis,
                Some(corridor),
            );
        }

        let suggestions: Vec<FuelStopSuggestion> = ranked
            .into_iter()
            .take(self.max_suggestions)
            .enumerate()
            .map(|(i, candidate)| FuelStopSuggestion::from_candidate(i + 1, candidate))
            .collect();

        tracing::info!(
            "Fuel stop optimization: {} suggestion(s) from {} candidate(s) for {}",
            suggestions.len(),
            eligible.len(),
            worst.name
        );

        OptimizationOutcome {
            success: true,
            candidates_considered: eligible.len(),
            overload_analysis: analysis,
            suggestions,
            corridor_used: Some(corridor),
            failure: None,
        }
    }
}

pub type InsertStopCallback = Arc<dyn Fn(&FuelStopSuggestion) + Send + Sync>;

/// Runs the optimizer and routes accepted suggestions to the route editor.
pub struct FuelStopOptimizationManager {
    optimizer: FuelStopOptimizer,
    on_insert: Option<InsertStopCallback>,
    last_outcome: Option<OptimizationOutcome>,
}

impl fmt::Debug for FuelStopOptimizationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuelStopOptimizationManager")
            .field("optimizer", &self.optimizer)
            .field("has_insert_callback", &self.on_insert.is_some())
            .field("last_outcome", &self.last_outcome.as_ref().map(|o| o.success))
            .finish()
    }
}

impl Default for FuelStopOptimizationManager {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl FuelStopOptimizationManager {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            optimizer: FuelStopOptimizer::new(config),
            on_insert: None,
            last_outcome: None,
        }
    }

    pub fn with_insert_callback(
        mut self,
        callback: impl Fn(&FuelStopSuggestion) + Send + Sync + 'static,
    ) -> Self {
        self.on_insert = Some(Arc::new(callback));
        self
    }

    pub fn optimizer(&self) -> &FuelStopOptimizer {
        &self.optimizer
    }

    pub fn suggest_fuel_stops(&mut self, data: &FlightData) -> OptimizationOutcome {
        let outcome = self.optimizer.suggest_fuel_stops(data);
        self.last_outcome = Some(outcome.clone());
        outcome
    }

    pub fn last_outcome(&self) -> Option<&OptimizationOutcome> {
        self.last_outcome.as_ref()
    }

    /// Forward a suggestion to the insertion callback. Returns false when no
    /// callback is registered.
    pub fn accept_suggestion(&self, suggestion: &FuelStopSuggestion) -> bool {
        let Some(on_insert) = &self.on_insert else {
            tracing::warn!(
                "No stop insertion handler; ignoring suggestion {}",
                suggestion.platform().name
            );
            return false;
        };
        tracing::info!(
            "Inserting fuel stop {} at waypoint {}",
            suggestion.platform().name,
            suggestion.insertion_index
        );
        on_insert(suggestion);
        true
    }

    /// Accept the suggestion with the given rank from the last outcome.
    pub fn accept_ranked(&self, rank: usize) -> bool {
        let suggestion = self
            .last_outcome
            .as_ref()
            .and_then(|outcome| outcome.suggestions.iter().find(|s| s.rank == rank));
        match suggestion {
            Some(suggestion) => self.accept_suggestion(suggestion),
            None => false,
        }
    }
}
