//! Single-writer store for fuel settings and user overrides.
//!
//! Three layers feed every read: global settings, per-location overrides
//! keyed `"{stop}_{fuelType}"`, and per-segment extra fuel keyed by segment
//! id. Writing zero (or nothing) removes an override instead of storing it.
//! Subscribers are called synchronously after every mutation.

use crate::models::{deck_fuel_lbs, FuelPolicy, ReserveType, Waypoint, WeatherSegment};
use crate::segments::{
    DepartureInputs, FlightSegment, SegmentEngine, StopFuelSettings, StopFuelSummary,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Per-location fuel quantities a user may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuelType {
    #[serde(rename = "araFuel")]
    AraFuel,
    #[serde(rename = "approachFuel")]
    ApproachFuel,
    #[serde(rename = "deckTime")]
    DeckTime,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::AraFuel => "araFuel",
            FuelType::ApproachFuel => "approachFuel",
            FuelType::DeckTime => "deckTime",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn location_override_key(stop_name: &str, fuel_type: FuelType) -> String {
    format!("{stop_name}_{fuel_type}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalFuelSettings {
    pub extra_fuel: f64,
    pub taxi_fuel: f64,
    pub deck_time_per_stop_min: f64,
    pub deck_fuel_flow_lbs_hr: f64,
    pub passenger_weight_lbs: f64,
    pub cargo_weight_lbs: f64,
    pub contingency_fuel_percent: f64,
    pub reserve_method: ReserveType,
    pub reserve_fuel: f64,
    pub ara_fuel_default: f64,
    pub approach_fuel_default: f64,
}

impl Default for GlobalFuelSettings {
    fn default() -> Self {
        Self {
            extra_fuel: 0.0,
            taxi_fuel: 50.0,
            deck_time_per_stop_min: 5.0,
            deck_fuel_flow_lbs_hr: 400.0,
            passenger_weight_lbs: 220.0,
            cargo_weight_lbs: 0.0,
            contingency_fuel_percent: 10.0,
            reserve_method: ReserveType::Fixed,
            reserve_fuel: 600.0,
            ara_fuel_default: 200.0,
            approach_fuel_default: 200.0,
        }
    }
}

/// Partial update of the global settings; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub extra_fuel: Option<f64>,
    pub taxi_fuel: Option<f64>,
    pub deck_time_per_stop_min: Option<f64>,
    pub deck_fuel_flow_lbs_hr: Option<f64>,
    pub passenger_weight_lbs: Option<f64>,
    pub cargo_weight_lbs: Option<f64>,
    pub contingency_fuel_percent: Option<f64>,
    pub reserve_method: Option<ReserveType>,
    pub reserve_fuel: Option<f64>,
    pub ara_fuel_default: Option<f64>,
    pub approach_fuel_default: Option<f64>,
}

impl GlobalFuelSettings {
    fn apply(&mut self, patch: &SettingsPatch) -> bool {
        let before = self.clone();
        let numeric = [
            ("extra_fuel", &mut self.extra_fuel, patch.extra_fuel),
            ("taxi_fuel", &mut self.taxi_fuel, patch.taxi_fuel),
            (
                "deck_time_per_stop_min",
                &mut self.deck_time_per_stop_min,
                patch.deck_time_per_stop_min,
            ),
            ("deck_fuel_flow_lbs_hr", &mut self.deck_fuel_flow_lbs_hr, patch.deck_fuel_flow_lbs_hr),
            ("passenger_weight_lbs", &mut self.passenger_weight_lbs, patch.passenger_weight_lbs),
            ("cargo_weight_lbs", &mut self.cargo_weight_lbs, patch.cargo_weight_lbs),
            (
                "contingency_fuel_percent",
                &mut self.contingency_fuel_percent,
                patch.contingency_fuel_percent,
            ),
            ("reserve_fuel", &mut self.reserve_fuel, patch.reserve_fuel),
            ("ara_fuel_default", &mut self.ara_fuel_default, patch.ara_fuel_default),
            ("approach_fuel_default", &mut self.approach_fuel_default, patch.approach_fuel_default),
        ];
        for (field, slot, value) in numeric {
            match value {
                Some(value) if value.is_finite() && value >= 0.0 => *slot = value,
                Some(value) => {
                    tracing::warn!(
                        "Ignoring settings patch {}: {} is not a usable amount",
                        field,
                        value
                    );
                }
                None => {}
            }
        }
        if let Some(method) = patch.reserve_method {
            self.reserve_method = method;
        }
        *self != before
    }
}

/// Immutable merged view handed to readers; built fresh on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub global: GlobalFuelSettings,
    pub location_overrides: BTreeMap<String, f64>,
    pub segment_overrides: BTreeMap<String, f64>,
}

impl EffectiveSettings {
    fn location_value(&self, location: &str, fuel_type: FuelType) -> Option<f64> {
        self.location_overrides
            .get(&location_override_key(location, fuel_type))
            .copied()
    }

    pub fn deck_time_for(&self, location: &str) -> f64 {
        self.location_value(location, FuelType::DeckTime)
            .unwrap_or(self.global.deck_time_per_stop_min)
    }

    /// Segment extra fuel if overridden, else the global figure.
    pub fn extra_fuel_for_segment(&self, segment_id: &str) -> f64 {
        self.segment_overrides
            .get(segment_id)
            .copied()
            .unwrap_or(self.global.extra_fuel)
    }

    pub fn reserve_for_trip(&self, trip_fuel: f64) -> f64 {
        match self.global.reserve_method {
            ReserveType::Fixed => self.global.reserve_fuel,
            ReserveType::Percentage => trip_fuel * self.global.reserve_fuel / 100.0,
        }
    }
}

impl StopFuelSettings for EffectiveSettings {
    fn ara_fuel_for(&self, location: &str) -> f64 {
        self.location_value(location, FuelType::AraFuel)
            .unwrap_or(self.global.ara_fuel_default)
    }

    fn approach_fuel_for(&self, location: &str) -> f64 {
        self.location_value(location, FuelType::ApproachFuel)
            .unwrap_or(self.global.approach_fuel_default)
    }

    fn deck_fuel_for(&self, location: &str) -> f64 {
        deck_fuel_lbs(self.deck_time_for(location), self.global.deck_fuel_flow_lbs_hr)
    }
}

/// What changed in the input store.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    SettingsChanged,
    LocationOverrideChanged { key: String, value: Option<f64> },
    SegmentOverrideChanged { segment_id: String, value: Option<f64> },
    OverridesReset,
    FlightDataUpdated { segment_count: usize },
    LegTripFuelUpdated,
}

pub type InputListener = Arc<dyn Fn(&InputEvent) + Send + Sync>;

/// Route inputs of the last `update_flight_data`, kept for re-segmentation.
#[derive(Debug, Clone, Default)]
struct FlightInputs {
    stops: Vec<Waypoint>,
    refuel_indices: Vec<usize>,
    weather_segments: Vec<WeatherSegment>,
}

#[derive(Default)]
pub struct FuelInputManager {
    global: GlobalFuelSettings,
    location_overrides: BTreeMap<String, f64>,
    segment_overrides: BTreeMap<String, f64>,
    engine: SegmentEngine,
    flight: Option<FlightInputs>,
    leg_trip_fuel: Vec<f64>,
    listeners: Vec<(u64, InputListener)>,
    next_listener_id: u64,
}

impl fmt::Debug for FuelInputManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuelInputManager")
            .field("global", &self.global)
            .field("location_overrides", &self.location_overrides)
            .field("segment_overrides", &self.segment_overrides)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl FuelInputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(global: GlobalFuelSettings) -> Self {
        Self {
            global,
            ..Self::default()
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&InputEvent) + Send + Sync + 'static) -> u64 {
        self.next_listener_id += 1;
        let id = self.next_listener_id;
        let listener: InputListener = Arc::new(listener);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify(&self, event: InputEvent) {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    pub fn global_settings(&self) -> &GlobalFuelSettings {
        &self.global
    }

    pub fn update_global_settings(&mut self, patch: &SettingsPatch) {
        if self.global.apply(patch) {
            tracing::debug!("Global fuel settings updated");
            self.resegment();
        }
        self.notify(InputEvent::SettingsChanged);
    }

    /// Set or clear a per-location override. `None` or zero removes it.
    pub fn set_location_override(&mut self, stop_name: &str, fuel_type: FuelType, value: Option<f64>) {
        let key = location_override_key(stop_name, fuel_type);
        let value = value.filter(|v| v.is_finite() && *v > 0.0);
        match value {
            Some(v) => {
                self.location_overrides.insert(key.clone(), v);
            }
            None => {
                self.location_overrides.remove(&key);
            }
        }
        self.resegment();
        self.notify(InputEvent::LocationOverrideChanged { key, value });
    }

    /// Set or clear extra fuel for one segment. `None` or zero removes it.
    pub fn set_segment_override(&mut self, segment_id: &str, extra_fuel: Option<f64>) {
        let value = extra_fuel.filter(|v| v.is_finite() && *v > 0.0);
        match value {
            Some(v) => {
                self.segment_overrides.insert(segment_id.to_string(), v);
            }
            None => {
                self.segment_overrides.remove(segment_id);
            }
        }
        self.resegment();
        self.notify(InputEvent::SegmentOverrideChanged {
            segment_id: segment_id.to_string(),
            value,
        });
    }

    pub fn reset_overrides(&mut self) {
        self.location_overrides.clear();
        self.segment_overrides.clear();
        self.resegment();
        self.notify(InputEvent::OverridesReset);
    }

    pub fn location_overrides(&self) -> &BTreeMap<String, f64> {
        &self.location_overrides
    }

    pub fn segment_overrides(&self) -> &BTreeMap<String, f64> {
        &self.segment_overrides
    }

    /// Merge all three layers into a new value; sources are not touched.
    pub fn get_effective_settings(&self) -> EffectiveSettings {
        EffectiveSettings {
            global: self.global.clone(),
            location_overrides: self.location_overrides.clone(),
            segment_overrides: self.segment_overrides.clone(),
        }
    }

    /// Re-segment the route. Policy ARA/approach defaults seed the global layer.
    pub fn update_flight_data(
        &mut self,
        stops: &[Waypoint],
        refuel_indices: &[usize],
        weather_segments: &[WeatherSegment],
        policy: Option<&FuelPolicy>,
    ) {
        if let Some(policy) = policy {
            self.global.ara_fuel_default = policy.ara_fuel_default;
            self.global.approach_fuel_default = policy.approach_fuel_default;
        }
        self.flight = Some(FlightInputs {
            stops: stops.to_vec(),
            refuel_indices: refuel_indices.to_vec(),
            weather_segments: weather_segments.to_vec(),
        });
        let segment_count = self.resegment();
        tracing::debug!(
            "Flight data updated: {} stops, {} segments",
            stops.len(),
            segment_count
        );
        self.notify(InputEvent::FlightDataUpdated { segment_count });
    }

    /// Rebuild the segment analysis from the stored route and the current
    /// effective settings. Returns the segment count.
    fn resegment(&mut self) -> usize {
        let Some(flight) = &self.flight else {
            return 0;
        };
        let settings = self.get_effective_settings();
        self.engine
            .analyze_flight_segments(
                &flight.stops,
                &flight.refuel_indices,
                &flight.weather_segments,
                &settings,
            )
            .segments
            .len()
    }

    /// Trip fuel of the leg leaving each stop, supplied by the stop-card calculation.
    pub fn update_leg_trip_fuel(&mut self, leg_trip_fuel: Vec<f64>) {
        self.leg_trip_fuel = leg_trip_fuel;
        self.notify(InputEvent::LegTripFuelUpdated);
    }

    pub fn segments(&self) -> &[FlightSegment] {
        self.engine.segments()
    }

    pub fn get_fuel_summary_for_stop(&self, stop_index: usize) -> Option<StopFuelSummary> {
        let settings = self.get_effective_settings();
        let analysis = self.engine.analysis()?;
        let segment = analysis.segment_for_stop(stop_index)?;
        let leg_trip_fuel = self.leg_trip_fuel.get(stop_index).copied().unwrap_or(0.0);
        let inputs = DepartureInputs {
            leg_trip_fuel,
            reserve_fuel: settings.reserve_for_trip(leg_trip_fuel),
            extra_fuel: settings.extra_fuel_for_segment(&segment.id),
        };
        analysis.fuel_summary_for_stop(stop_index, &inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WaypointRole;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn route() -> Vec<Waypoint> {
        vec![
            Waypoint::new("A", 57.0, 1.0, WaypointRole::Departure),
            Waypoint::new("RIG1", 57.3, 1.3, WaypointRole::Intermediate),
            Waypoint::new("B", 57.6, 1.6, WaypointRole::Intermediate),
            Waypoint::new("C", 57.9, 1.9, WaypointRole::Destination),
        ]
    }

    fn rig_weather() -> Vec<WeatherSegment> {
        vec![WeatherSegment {
            location_code: "RIG1".into(),
            is_rig: true,
            ranking2: 8,
            ara_required: false,
            approach_required: false,
        }]
    }

    #[test]
    fn zero_override_removes_entry() {
        let mut manager = FuelInputManager::new();
        manager.set_location_override("RIG1", FuelType::AraFuel, Some(300.0));
        assert_eq!(manager.location_overrides().get("RIG1_araFuel"), Some(&300.0));

        manager.set_location_override("RIG1", FuelType::AraFuel, Some(0.0));
        assert!(manager.location_overrides().is_empty());

        manager.set_segment_override("segment-0", Some(100.0));
        manager.set_segment_override("segment-0", None);
        assert!(manager.segment_overrides().is_empty());
    }

    #[test]
    fn effective_settings_do_not_alias_sources() {
        let mut manager = FuelInputManager::new();
        manager.set_location_override("B", FuelType::DeckTime, Some(12.0));
        let mut snapshot = manager.get_effective_settings();
        snapshot.location_overrides.clear();
        snapshot.global.extra_fuel = 999.0;

        let fresh = manager.get_effective_settings();
        assert_eq!(fresh.deck_time_for("B"), 12.0);
        assert_eq!(fresh.global.extra_fuel, 0.0);
    }

    #[test]
    fn reads_reflect_latest_mutation() {
        let mut manager = FuelInputManager::new();
        assert_eq!(manager.get_effective_settings().ara_fuel_for("RIG1"), 200.0);
        manager.set_location_override("RIG1", FuelType::AraFuel, Some(350.0));
        assert_eq!(manager.get_effective_settings().ara_fuel_for("RIG1"), 350.0);
        assert_eq!(manager.get_effective_settings().ara_fuel_for("RIG2"), 200.0);
    }

    #[test]
    fn every_mutation_notifies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut manager = FuelInputManager::new();
        let id = manager.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.update_global_settings(&SettingsPatch {
            extra_fuel: Some(100.0),
            ..Default::default()
        });
        manager.set_location_override("A", FuelType::DeckTime, Some(3.0));
        manager.set_segment_override("segment-0", Some(50.0));
        manager.update_flight_data(&route(), &[], &[], None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        assert!(manager.unsubscribe(id));
        manager.reset_overrides();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn summary_uses_segment_extra_fuel_and_location_overrides() {
        let mut manager = FuelInputManager::with_settings(GlobalFuelSettings {
            deck_time_per_stop_min: 0.0,
            ..GlobalFuelSettings::default()
        });
        manager.set_location_override("RIG1", FuelType::AraFuel, Some(275.0));
        manager.set_segment_override("segment-1", Some(120.0));
        manager.update_flight_data(&route(), &[2], &rig_weather(), None);
        manager.update_leg_trip_fuel(vec![300.0, 250.0, 200.0]);

        let departure = manager.get_fuel_summary_for_stop(0).unwrap();
        assert_eq!(departure.departure_requirements.ara_fuel, 275.0);
        assert_eq!(departure.departure_requirements.extra_fuel, 0.0);
        assert_eq!(departure.departure_requirements.reserve_fuel, 600.0);

        let refuel = manager.get_fuel_summary_for_stop(2).unwrap();
        assert!(refuel.is_refuel_stop);
        assert_eq!(refuel.remaining_requirements.ara_fuel, 0.0);
        assert_eq!(refuel.departure_requirements.extra_fuel, 120.0);
        assert_eq!(refuel.departure_requirements.trip_fuel, 200.0);
    }

    #[test]
    fn overrides_after_segmentation_reach_summaries() {
        let mut manager = FuelInputManager::new();
        manager.update_flight_data(&route(), &[], &rig_weather(), None);
        manager.update_leg_trip_fuel(vec![300.0, 250.0, 200.0]);
        let before = manager.get_fuel_summary_for_stop(0).unwrap();
        assert_eq!(before.departure_requirements.ara_fuel, 200.0);

        manager.set_location_override("RIG1", FuelType::AraFuel, Some(500.0));
        manager.set_segment_override("segment-0", Some(77.0));
        let after = manager.get_fuel_summary_for_stop(0).unwrap();
        assert_eq!(after.departure_requirements.ara_fuel, 500.0);
        assert_eq!(after.departure_requirements.extra_fuel, 77.0);
        assert_eq!(manager.segments()[0].ara_fuel, 500.0);

        manager.reset_overrides();
        let reset = manager.get_fuel_summary_for_stop(0).unwrap();
        assert_eq!(reset.departure_requirements.ara_fuel, 200.0);
    }

    #[test]
    fn settings_change_after_segmentation_reaches_summaries() {
        let mut manager = FuelInputManager::new();
        manager.update_flight_data(&route(), &[], &rig_weather(), None);
        manager.update_global_settings(&SettingsPatch {
            ara_fuel_default: Some(260.0),
            ..Default::default()
        });
        let summary = manager.get_fuel_summary_for_stop(0).unwrap();
        assert_eq!(summary.departure_requirements.ara_fuel, 260.0);
    }

    #[test]
    fn unusable_patch_values_are_ignored() {
        let mut manager = FuelInputManager::new();
        manager.update_global_settings(&SettingsPatch {
            taxi_fuel: Some(-5.0),
            reserve_fuel: Some(f64::NAN),
            extra_fuel: Some(40.0),
            ..Default::default()
        });
        let global = manager.global_settings();
        assert_eq!(global.taxi_fuel, 50.0);
        assert_eq!(global.reserve_fuel, 600.0);
        assert_eq!(global.extra_fuel, 40.0);
    }

    #[test]
    fn policy_seeds_weather_defaults() {
        let policy = FuelPolicy {
            id: None,
            name: None,
            taxi_fuel: 50.0,
            reserve_fuel: 600.0,
            reserve_type: ReserveType::Fixed,
            contingency_legs_percent: 10.0,
            contingency_alternate_percent: 0.0,
            deck_fuel_time_min: 0.0,
            deck_fuel_flow_lbs_hr: None,
            ara_fuel_default: 180.0,
            approach_fuel_default: 90.0,
        };
        let mut manager = FuelInputManager::new();
        manager.update_flight_data(&route(), &[], &rig_weather(), Some(&policy));
        assert_eq!(manager.segments()[0].ara_fuel, 180.0);
    }
}
