//! Canonical fuel state and the calculation pipeline.
//!
//! `MasterFuelManager` owns policy, weather, route, aircraft and user
//! overrides. Every accepted update marks the cached result stale (it stays
//! readable), queues a notification and, once the minimum inputs are present,
//! recomputes synchronously. At most one calculation runs at a time; a
//! reentrant call gets the cached result back, and inputs that changed while a
//! pass was running are picked up by another pass before it returns.

use crate::config::EngineConfig;
use crate::error::FuelError;
use crate::models::{
    stop_positions, Aircraft, EffectiveFuelValues, FuelPolicy, PolicySettings, UserOverrides,
    Waypoint, Weather, WeatherSegment,
};
use crate::notify::{
    FuelEventKind, FuelNotification, NotificationQueue, Subscription, SubscriptionId,
};
use crate::route::{calculate_route_stats, RouteStats};
use crate::segments::{DepartureInputs, SegmentAnalysis, StopFuelSummary};
use crate::stop_cards::{DirectStopCardCalculator, StopCard, StopCardCalculator, StopCardRequest};
use crate::weather::{WeatherFuelAnalysis, WeatherFuelAnalyzer, WeatherFuelConfig};
use crate::wind::{HeadwindCalculator, WindCalculator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of one pipeline run. Shared read-only through `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelCalculations {
    pub stop_cards: Vec<StopCard>,
    pub route_stats: RouteStats,
    pub final_fuel_values: EffectiveFuelValues,
    pub segments: SegmentAnalysis,
    pub weather_fuel: WeatherFuelAnalysis,
    pub timestamp: DateTime<Utc>,
}

impl FuelCalculations {
    pub fn departure_card(&self) -> Option<&StopCard> {
        self.stop_cards.first()
    }
}

/// Snapshot of everything the manager holds.
#[derive(Debug, Clone, Default)]
pub struct FuelState {
    pub policy: Option<FuelPolicy>,
    pub policy_settings: Option<PolicySettings>,
    pub weather: Option<Weather>,
    pub weather_segments: Vec<WeatherSegment>,
    pub weather_fuel: Option<WeatherFuelAnalysis>,
    pub waypoints: Vec<Waypoint>,
    pub aircraft: Option<Aircraft>,
    /// Indices into the landing-stop list
    pub refuel_stops: Vec<usize>,
    pub overrides: UserOverrides,
    pub calculations: Option<Arc<FuelCalculations>>,
    /// Inputs changed since `calculations` was produced
    pub stale: bool,
    pub calculation_in_progress: bool,
    generation: u64,
}

impl FuelState {
    /// Aircraft with speed and burn, two waypoints and an extracted policy.
    pub fn has_minimum_data(&self) -> bool {
        self.missing_data().is_none()
    }

    fn missing_data(&self) -> Option<&'static str> {
        match &self.aircraft {
            None => return Some("no aircraft"),
            Some(ac) if ac.cruise_speed_kt <= 0.0 || ac.fuel_burn_lbs_hr <= 0.0 => {
                return Some("aircraft lacks cruise speed or fuel burn")
            }
            Some(_) => {}
        }
        if self.waypoints.len() < 2 {
            return Some("fewer than two waypoints");
        }
        if self.policy_settings.is_none() {
            return Some("no fuel policy");
        }
        None
    }
}

/// Inputs copied out of the state so collaborators run without the lock.
struct CalculationInputs {
    policy_settings: PolicySettings,
    overrides: UserOverrides,
    weather: Option<Weather>,
    weather_segments: Vec<WeatherSegment>,
    waypoints: Vec<Waypoint>,
    aircraft: Aircraft,
    refuel_stops: Vec<usize>,
}

impl CalculationInputs {
    fn capture(state: &FuelState) -> Result<Self, FuelError> {
        if let Some(missing) = state.missing_data() {
            return Err(FuelError::InsufficientData(missing.to_string()));
        }
        let (Some(policy_settings), Some(aircraft)) = (&state.policy_settings, &state.aircraft)
        else {
            return Err(FuelError::InsufficientData("incomplete state".into()));
        };
        Ok(Self {
            policy_settings: policy_settings.clone(),
            overrides: state.overrides.clone(),
            weather: state.weather.clone(),
            weather_segments: state.weather_segments.clone(),
            waypoints: state.waypoints.clone(),
            aircraft: aircraft.clone(),
            refuel_stops: state.refuel_stops.clone(),
        })
    }
}

/// Clears the in-progress flag on every exit path.
struct InProgressGuard<'a>(&'a AtomicBool);

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MasterFuelManager {
    state: Mutex<FuelState>,
    in_progress: AtomicBool,
    notifications: NotificationQueue,
    stop_cards: Arc<dyn StopCardCalculator>,
    wind: Option<Arc<dyn WindCalculator>>,
    config: EngineConfig,
}

impl fmt::Debug for MasterFuelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterFuelManager")
            .field("in_progress", &self.in_progress.load(Ordering::Acquire))
            .field("notifications", &self.notifications)
            .field("wind", &self.wind.is_some())
            .finish()
    }
}

impl Default for MasterFuelManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MasterFuelManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(FuelState::default()),
            in_progress: AtomicBool::new(false),
            notifications: NotificationQueue::new(config.subscriber_stagger()),
            stop_cards: Arc::new(DirectStopCardCalculator),
            wind: Some(Arc::new(HeadwindCalculator::default())),
            config,
        }
    }

    pub fn with_stop_card_calculator(mut self, calculator: Arc<dyn StopCardCalculator>) -> Self {
        self.stop_cards = calculator;
        self
    }

    /// `None` disables wind correction of route statistics.
    pub fn with_wind_calculator(mut self, calculator: Option<Arc<dyn WindCalculator>>) -> Self {
        self.wind = calculator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, FuelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- updates ----

    pub fn update_fuel_policy(&self, policy: FuelPolicy) -> Result<(), FuelError> {
        let settings = policy
            .validate()
            .and_then(|_| PolicySettings::from_policy(&policy))
            .map_err(|err| reject("fuel policy", err))?;
        self.apply(FuelEventKind::PolicyUpdated, move |state| {
            state.policy = Some(policy);
            state.policy_settings = Some(settings);
        });
        Ok(())
    }

    pub fn update_weather(&self, weather: Weather) -> Result<(), FuelError> {
        weather.validate().map_err(|err| reject("weather", err))?;
        self.apply(FuelEventKind::WeatherUpdated, move |state| {
            state.weather = Some(weather);
        });
        Ok(())
    }

    pub fn update_weather_segments(&self, segments: Vec<WeatherSegment>) -> Result<(), FuelError> {
        for segment in &segments {
            segment
                .validate()
                .map_err(|err| reject("weather segments", err))?;
        }
        self.apply(FuelEventKind::WeatherSegmentsUpdated, move |state| {
            state.weather_segments = segments;
        });
        Ok(())
    }

    pub fn update_waypoints(&self, waypoints: Vec<Waypoint>) -> Result<(), FuelError> {
        for waypoint in &waypoints {
            waypoint.validate().map_err(|err| reject("waypoints", err))?;
        }
        self.apply(FuelEventKind::WaypointsUpdated, move |state| {
            state.waypoints = waypoints;
        });
        Ok(())
    }

    pub fn update_aircraft(&self, aircraft: Aircraft) -> Result<(), FuelError> {
        aircraft.validate().map_err(|err| reject("aircraft", err))?;
        self.apply(FuelEventKind::AircraftUpdated, move |state| {
            state.aircraft = Some(aircraft);
        });
        Ok(())
    }

    /// Refuel stops as landing-stop indices. Neither the departure nor the
    /// destination can be one.
    pub fn update_refuel_stops(&self, mut refuel_stops: Vec<usize>) -> Result<(), FuelError> {
        let stop_count = stop_positions(&self.lock_state().waypoints).len();
        if let Some(&bad) = refuel_stops
            .iter()
            .find(|&&idx| idx == 0 || (stop_count >= 2 && idx + 1 >= stop_count))
        {
            return Err(reject(
                "refuel stops",
                FuelError::invalid(
                    "refuel_stops",
                    format!("{bad} is not an intermediate stop of a {stop_count}-stop route"),
                ),
            ));
        }
        refuel_stops.sort_unstable();
        refuel_stops.dedup();
        self.apply(FuelEventKind::RefuelStopsUpdated, move |state| {
            state.refuel_stops = refuel_stops;
        });
        Ok(())
    }

    /// Merge user overrides over the ones already applied.
    pub fn apply_user_overrides(&self, overrides: UserOverrides) -> Result<(), FuelError> {
        overrides
            .validate()
            .map_err(|err| reject("user overrides", err))?;
        self.apply(FuelEventKind::OverridesApplied, move |state| {
            state.overrides.merge(&overrides);
        });
        Ok(())
    }

    pub fn clear_user_overrides(&self) {
        self.apply(FuelEventKind::OverridesApplied, |state| {
            state.overrides = UserOverrides::default();
        });
    }

    fn apply(&self, kind: FuelEventKind, update: impl FnOnce(&mut FuelState)) {
        let ready = {
            let mut state = self.lock_state();
            update(&mut state);
            state.generation += 1;
            state.stale = true;
            state.has_minimum_data()
        };
        self.notify_subscribers(kind, None);
        if ready {
            self.calculate_all_fuel();
        }
    }

    // ---- calculation ----

    pub fn calculate_all_fuel(&self) -> Option<Arc<FuelCalculations>> {
        let Some(_guard) = InProgressGuard::acquire(&self.in_progress) else {
            tracing::debug!("Fuel calculation already running; returning cached result");
            return self.get_calculations();
        };

        let max_passes = self.config.max_recalculation_passes.max(1);
        let mut pass = 0;
        loop {
            pass += 1;
            let (inputs, generation) = {
                let state = self.lock_state();
                match CalculationInputs::capture(&state) {
                    Ok(inputs) => (inputs, state.generation),
                    Err(err) => {
                        tracing::debug!("Skipping fuel calculation: {}", err);
                        return None;
                    }
                }
            };

            let calculations = match self.run_pipeline(&inputs) {
                Ok(calculations) => Arc::new(calculations),
                Err(err) => {
                    tracing::error!("Fuel calculation failed: {}", err);
                    return None;
                }
            };

            let mut state = self.lock_state();
            if state.generation != generation && pass < max_passes {
                tracing::debug!("Inputs changed during calculation pass {}; recomputing", pass);
                continue;
            }
            state.weather_fuel = Some(calculations.weather_fuel.clone());
            state.calculations = Some(Arc::clone(&calculations));
            state.stale = state.generation != generation;
            drop(state);

            tracing::info!(
                "Fuel calculated: {} stops, {:.1} nm, departure fuel {:.0} lbs",
                calculations.stop_cards.len(),
                calculations.route_stats.total_distance_nm,
                calculations.departure_card().map(|c| c.total_fuel).unwrap_or_default()
            );
            self.notify_subscribers(FuelEventKind::CalculationsUpdated, Some(Arc::clone(&calculations)));
            return Some(calculations);
        }
    }

    fn run_pipeline(&self, inputs: &CalculationInputs) -> Result<FuelCalculations, FuelError> {
        let positions = stop_positions(&inputs.waypoints);
        let stops: Vec<Waypoint> = positions
            .iter()
            .map(|&idx| inputs.waypoints[idx].clone())
            .collect();

        // (1) effective values: policy, then overrides, then weather additions
        let base = EffectiveFuelValues::from_policy(&inputs.policy_settings)
            .with_overrides(&inputs.overrides);
        let weather_fuel = WeatherFuelAnalyzer::analyze(
            &inputs.weather_segments,
            &inputs.waypoints,
            &WeatherFuelConfig {
                ara_fuel_default: base.ara_fuel_default,
                approach_fuel_default: base.approach_fuel_default,
            },
        );
        let final_fuel_values = EffectiveFuelValues {
            ara_fuel: weather_fuel.ara_fuel,
            approach_fuel: weather_fuel.approach_fuel,
            ..base
        };
        let segments = SegmentAnalysis::build(
            &stops,
            &inputs.refuel_stops,
            &inputs.weather_segments,
            &final_fuel_values,
        );

        // (2) per-stop cards
        let stop_cards = self
            .stop_cards
            .calculate(&StopCardRequest {
                waypoints: &inputs.waypoints,
                stop_positions: &positions,
                aircraft: &inputs.aircraft,
                fuel_values: &final_fuel_values,
                segments: &segments,
            })
            .map_err(|err| collaborator_failure("stop card calculator", err))?;

        // (3) route totals
        let route_stats = calculate_route_stats(
            &inputs.waypoints,
            &inputs.aircraft,
            inputs.weather.as_ref(),
            self.wind.as_deref(),
        )
        .map_err(|err| collaborator_failure("route statistics", err))?;

        Ok(FuelCalculations {
            stop_cards,
            route_stats,
            final_fuel_values,
            segments,
            weather_fuel,
            timestamp: Utc::now(),
        })
    }

    // ---- reads ----

    /// Last good result, even when stale.
    pub fn get_calculations(&self) -> Option<Arc<FuelCalculations>> {
        self.lock_state().calculations.clone()
    }

    pub fn get_current_state(&self) -> FuelState {
        let mut snapshot = self.lock_state().clone();
        snapshot.calculation_in_progress = self.in_progress.load(Ordering::Acquire);
        snapshot
    }

    pub fn is_stale(&self) -> bool {
        self.lock_state().stale
    }

    pub fn is_calculating(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Summary for a landing stop, derived from the cached calculation.
    ///
    /// Departure trip fuel covers only the leg leaving this stop; reserve
    /// follows from that leg.
    pub fn get_fuel_summary_for_stop(&self, stop_index: usize) -> Option<StopFuelSummary> {
        let calculations = self.get_calculations()?;
        let card = calculations.stop_cards.get(stop_index)?;
        let leg_trip_fuel = card.leg_fuel_lbs;
        calculations.segments.fuel_summary_for_stop(
            stop_index,
            &DepartureInputs {
                leg_trip_fuel,
                reserve_fuel: calculations.final_fuel_values.reserve_for_trip(leg_trip_fuel),
                extra_fuel: card.extra_fuel,
            },
        )
    }

    // ---- subscribers ----

    pub fn subscribe(
        &self,
        name: impl Into<String>,
        callback: impl Fn(&FuelNotification) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifications.subscribe(name, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifications.unsubscribe(id)
    }

    /// Queue a notification; delivery happens on the next flush.
    pub fn notify_subscribers(&self, kind: FuelEventKind, calculations: Option<Arc<FuelCalculations>>) {
        self.notifications.enqueue(kind, calculations);
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.pending_len()
    }

    pub fn flush_notifications(&self) -> usize {
        self.notifications.flush()
    }
}

fn reject(what: &str, err: FuelError) -> FuelError {
    tracing::warn!("Ignoring {} update: {}", what, err);
    err
}

fn collaborator_failure(what: &str, err: FuelError) -> FuelError {
    match err {
        FuelError::Computation(_) => err,
        other => FuelError::Computation(format!("{what}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReserveType, WaypointRole};
    use crate::spatial::GeoPoint;
    use std::sync::Weak;

    fn policy() -> FuelPolicy {
        FuelPolicy {
            id: Some("NS-STD".into()),
            name: Some("North Sea standard".into()),
            taxi_fuel: 50.0,
            reserve_fuel: 600.0,
            reserve_type: ReserveType::Fixed,
            contingency_legs_percent: 10.0,
            contingency_alternate_percent: 5.0,
            deck_fuel_time_min: 0.0,
            deck_fuel_flow_lbs_hr: None,
            ara_fuel_default: 200.0,
            approach_fuel_default: 200.0,
        }
    }

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

    fn airport(code: &str, ranking2: i32) -> WeatherSegment {
        WeatherSegment {
            location_code: code.into(),
            is_rig: false,
            ranking2,
            ara_required: false,
            approach_required: false,
        }
    }

    fn ready_manager() -> MasterFuelManager {
        let manager = MasterFuelManager::default();
        manager.update_fuel_policy(policy()).unwrap();
        manager.update_aircraft(aircraft()).unwrap();
        manager.update_waypoints(route()).unwrap();
        manager
    }

    #[test]
    fn nothing_is_calculated_without_minimum_data() {
        let manager = MasterFuelManager::default();
        manager.update_fuel_policy(policy()).unwrap();
        manager.update_aircraft(aircraft()).unwrap();
        assert!(manager.get_calculations().is_none());
        assert!(manager.calculate_all_fuel().is_none());
        assert!(manager.is_stale());
    }

    #[test]
    fn update_triggers_calculation_once_ready() {
        let manager = ready_manager();
        let calc = manager.get_calculations().unwrap();
        assert_eq!(calc.stop_cards.len(), 3);
        assert!((calc.stop_cards[0].total_fuel - 1276.0).abs() < 2.0);
        assert!(!manager.is_stale());
    }

    #[test]
    fn repeated_reads_return_the_same_result() {
        let manager = ready_manager();
        let first = manager.get_calculations().unwrap();
        let second = manager.get_calculations().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalid_update_keeps_prior_state() {
        let manager = ready_manager();
        let before = manager.get_calculations().unwrap();

        let mut broken = aircraft();
        broken.cruise_speed_kt = f64::NAN;
        let err = manager.update_aircraft(broken).unwrap_err();
        assert!(matches!(err, FuelError::InvalidInput { .. }));

        let after = manager.get_calculations().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(manager.get_current_state().aircraft, Some(aircraft()));
    }

    #[test]
    fn losing_minimum_data_keeps_last_result_visible() {
        let manager = ready_manager();
        manager.update_waypoints(Vec::new()).unwrap();
        assert!(manager.get_calculations().is_some());
        assert!(manager.is_stale());
    }

    #[test]
    fn refuel_stops_are_validated_and_reset_summaries() {
        let manager = ready_manager();
        assert!(manager.update_refuel_stops(vec![0]).is_err());
        assert!(manager.update_refuel_stops(vec![2]).is_err());

        manager
            .update_weather_segments(vec![airport("A", 10), airport("C", 10)])
            .unwrap();
        manager.update_refuel_stops(vec![1]).unwrap();

        let summary = manager.get_fuel_summary_for_stop(1).unwrap();
        assert!(summary.is_refuel_stop);
        assert_eq!(summary.remaining_requirements.approach_fuel, 200.0);
        // the departure still carries A's approach fuel plus C's
        let departure = manager.get_fuel_summary_for_stop(0).unwrap();
        assert_eq!(departure.departure_requirements.approach_fuel, 400.0);
    }

    #[test]
    fn overrides_flow_into_effective_values() {
        let manager = ready_manager();
        manager
            .apply_user_overrides(UserOverrides {
                extra_fuel: Some(150.0),
                ..UserOverrides::default()
            })
            .unwrap();
        let calc = manager.get_calculations().unwrap();
        assert_eq!(calc.final_fuel_values.extra_fuel, 150.0);
        assert!((calc.stop_cards[0].total_fuel - 1426.0).abs() < 2.0);

        manager.clear_user_overrides();
        let calc = manager.get_calculations().unwrap();
        assert_eq!(calc.final_fuel_values.extra_fuel, 0.0);
    }

    #[test]
    fn notifications_coalesce_until_flushed() {
        let manager = ready_manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.subscribe("panel", move |n: &FuelNotification| {
            sink.lock().unwrap().push((n.kind, n.calculations.is_some()));
        });

        manager.flush_notifications();
        let kinds: Vec<FuelEventKind> = seen.lock().unwrap().iter().map(|e| e.0).collect();
        // queued before subscribing, delivered once each in arrival order
        assert_eq!(
            kinds,
            vec![
                FuelEventKind::PolicyUpdated,
                FuelEventKind::AircraftUpdated,
                FuelEventKind::WaypointsUpdated,
                FuelEventKind::CalculationsUpdated,
            ]
        );
        assert!(seen.lock().unwrap()[3].1);
        assert_eq!(manager.pending_notifications(), 0);
    }

    #[test]
    fn departure_summary_counts_only_the_next_leg() {
        let a = GeoPoint::new(57.0, 1.0);
        let b = a.offset(40.0, 0.0);
        let c = b.offset(35.0, 0.0);
        let d = c.offset(30.0, 0.0);
        let waypoints = vec![
            Waypoint::new("A", a.lat, a.lon, WaypointRole::Departure),
            Waypoint::new("B", b.lat, b.lon, WaypointRole::Intermediate),
            Waypoint::new("C", c.lat, c.lon, WaypointRole::Intermediate),
            Waypoint::new("D", d.lat, d.lon, WaypointRole::Destination),
        ];
        let manager = MasterFuelManager::default();
        manager
            .update_fuel_policy(FuelPolicy {
                reserve_type: ReserveType::Percentage,
                reserve_fuel: 10.0,
                ..policy()
            })
            .unwrap();
        manager.update_aircraft(aircraft()).unwrap();
        manager.update_waypoints(waypoints).unwrap();

        let calc = manager.get_calculations().unwrap();
        let card = &calc.stop_cards[1];
        let b_to_c = 35.0 / 145.0 * 1100.0;
        assert!((card.leg_fuel_lbs - b_to_c).abs() < 1.0);
        // the card still carries fuel through to the destination
        assert!(card.trip_fuel > card.leg_fuel_lbs + 100.0);

        let summary = manager.get_fuel_summary_for_stop(1).unwrap();
        let departure = summary.departure_requirements;
        assert_eq!(departure.trip_fuel, card.leg_fuel_lbs);
        assert!((departure.reserve_fuel - card.leg_fuel_lbs * 0.1).abs() < 1e-9);
    }

    #[test]
    fn subscription_handle_unsubscribes() {
        let manager = ready_manager();
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        let handle = manager.subscribe("counter", move |_: &FuelNotification| {
            *sink.lock().unwrap() += 1;
        });
        manager.flush_notifications();
        let delivered = *count.lock().unwrap();
        assert!(delivered > 0);

        assert!(handle.unsubscribe());
        manager.notify_subscribers(FuelEventKind::WeatherUpdated, None);
        manager.flush_notifications();
        assert_eq!(*count.lock().unwrap(), delivered);
    }

    /// Calls back into the manager while it is calculating.
    struct ReentrantCards {
        manager: Mutex<Weak<MasterFuelManager>>,
        reentrant_results: Mutex<Vec<bool>>,
        mutate_once: AtomicBool,
    }

    impl StopCardCalculator for ReentrantCards {
        fn calculate(&self, request: &StopCardRequest<'_>) -> Result<Vec<StopCard>, FuelError> {
            if let Some(manager) = self.manager.lock().unwrap().upgrade() {
                let nested = manager.calculate_all_fuel();
                self.reentrant_results.lock().unwrap().push(nested.is_some());
                if self.mutate_once.swap(false, Ordering::SeqCst) {
                    manager
                        .apply_user_overrides(UserOverrides {
                            extra_fuel: Some(100.0),
                            ..UserOverrides::default()
                        })
                        .unwrap();
                }
            }
            DirectStopCardCalculator.calculate(request)
        }
    }

    #[test]
    fn reentrant_calls_get_cached_result_and_changes_are_picked_up() {
        let cards = Arc::new(ReentrantCards {
            manager: Mutex::new(Weak::new()),
            reentrant_results: Mutex::new(Vec::new()),
            mutate_once: AtomicBool::new(false),
        });
        let manager = Arc::new(
            MasterFuelManager::default().with_stop_card_calculator(cards.clone()),
        );
        *cards.manager.lock().unwrap() = Arc::downgrade(&manager);

        manager.update_fuel_policy(policy()).unwrap();
        manager.update_aircraft(aircraft()).unwrap();
        manager.update_waypoints(route()).unwrap();
        // first calculation: nothing cached yet
        assert_eq!(cards.reentrant_results.lock().unwrap().as_slice(), &[false]);

        cards.mutate_once.store(true, Ordering::SeqCst);
        let result = manager.calculate_all_fuel().unwrap();
        assert_eq!(result.final_fuel_values.extra_fuel, 100.0);
        assert!(!manager.is_stale());
        assert!(!manager.is_calculating());
    }

    #[test]
    fn failing_collaborator_releases_the_guard() {
        struct Broken;
        impl StopCardCalculator for Broken {
            fn calculate(&self, _: &StopCardRequest<'_>) -> Result<Vec<StopCard>, FuelError> {
                Err(FuelError::invalid("geometry", "missing"))
            }
        }

        let manager = MasterFuelManager::default().with_stop_card_calculator(Arc::new(Broken));
        manager.update_fuel_policy(policy()).unwrap();
        manager.update_aircraft(aircraft()).unwrap();
        manager.update_waypoints(route()).unwrap();
        assert!(manager.get_calculations().is_none());
        assert!(!manager.is_calculating());
        assert!(manager.calculate_all_fuel().is_none());
    }

    #[test]
    fn wind_can_be_disabled() {
        let manager = MasterFuelManager::default().with_wind_calculator(None);
        manager.update_fuel_policy(policy()).unwrap();
        manager.update_aircraft(aircraft()).unwrap();
        manager
            .update_weather(Weather {
                wind_speed_kt: 30.0,
                wind_direction_deg: 0.0,
                visibility_sm: None,
                ceiling_ft: None,
            })
            .unwrap();
        manager.update_waypoints(route()).unwrap();
        let calc = manager.get_calculations().unwrap();
        assert!(!calc.route_stats.wind_adjusted);
    }
}
