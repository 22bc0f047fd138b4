//! Core data models for the fuel engine.

use crate::error::{require_non_negative, require_positive, FuelError};
use crate::spatial::GeoPoint;
use serde::{Deserialize, Serialize};

const DEFAULT_DECK_FUEL_FLOW_LBS_HR: f64 = 400.0;
const DEFAULT_PASSENGER_WEIGHT_LBS: f64 = 220.0;

/// How the reserve figure of a policy is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReserveType {
    /// Reserve is a fixed amount in lbs
    #[default]
    Fixed,
    /// Reserve is a percentage of trip fuel
    Percentage,
}

/// Authoritative fuel defaults from the operator's fuel policy.
///
/// Replaced wholesale on every policy update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPolicy {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "taxiFuel")]
    pub taxi_fuel: f64,
    #[serde(alias = "reserveFuel")]
    pub reserve_fuel: f64,
    #[serde(default, alias = "reserveType")]
    pub reserve_type: ReserveType,
    #[serde(default, alias = "contingencyFuelLegs")]
    pub contingency_legs_percent: f64,
    #[serde(default, alias = "contingencyFuelAlternate")]
    pub contingency_alternate_percent: f64,
    /// Minutes on deck per intermediate stop
    #[serde(default, alias = "deckFuelTime")]
    pub deck_fuel_time_min: f64,
    #[serde(default, alias = "deckFuelFlow")]
    pub deck_fuel_flow_lbs_hr: Option<f64>,
    #[serde(default, alias = "araFuelDefault")]
    pub ara_fuel_default: f64,
    #[serde(default, alias = "approachFuelDefault")]
    pub approach_fuel_default: f64,
}

impl FuelPolicy {
    pub fn validate(&self) -> Result<(), FuelError> {
        require_non_negative("policy.taxi_fuel", self.taxi_fuel)?;
        require_non_negative("policy.reserve_fuel", self.reserve_fuel)?;
        require_non_negative("policy.contingency_legs_percent", self.contingency_legs_percent)?;
        require_non_negative(
            "policy.contingency_alternate_percent",
            self.contingency_alternate_percent,
        )?;
        require_non_negative("policy.deck_fuel_time_min", self.deck_fuel_time_min)?;
        if let Some(flow) = self.deck_fuel_flow_lbs_hr {
            require_non_negative("policy.deck_fuel_flow_lbs_hr", flow)?;
        }
        require_non_negative("policy.ara_fuel_default", self.ara_fuel_default)?;
        require_non_negative("policy.approach_fuel_default", self.approach_fuel_default)?;
        if self.reserve_type == ReserveType::Percentage && self.reserve_fuel > 100.0 {
            return Err(FuelError::invalid(
                "policy.reserve_fuel",
                "percentage reserve above 100%",
            ));
        }
        Ok(())
    }
}

/// Numeric settings extracted from a validated policy; the base layer of every merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub taxi_fuel: f64,
    pub reserve_fuel: f64,
    pub reserve_type: ReserveType,
    pub contingency_percent: f64,
    pub contingency_alternate_percent: f64,
    pub deck_time_per_stop_min: f64,
    pub deck_fuel_flow_lbs_hr: f64,
    pub ara_fuel_default: f64,
    pub approach_fuel_default: f64,
}

impl PolicySettings {
    pub fn from_policy(policy: &FuelPolicy) -> Result<Self, FuelError> {
        policy.validate()?;
        Ok(Self {
            taxi_fuel: policy.taxi_fuel,
            reserve_fuel: policy.reserve_fuel,
            reserve_type: policy.reserve_type,
            contingency_percent: policy.contingency_legs_percent,
            contingency_alternate_percent: policy.contingency_alternate_percent,
            deck_time_per_stop_min: policy.deck_fuel_time_min,
            deck_fuel_flow_lbs_hr: policy
                .deck_fuel_flow_lbs_hr
                .unwrap_or(DEFAULT_DECK_FUEL_FLOW_LBS_HR),
            ara_fuel_default: policy.ara_fuel_default,
            approach_fuel_default: policy.approach_fuel_default,
        })
    }
}

/// User-entered values layered over the policy.
///
/// `None` means "use the policy value".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserOverrides {
    #[serde(default, alias = "extraFuel")]
    pub extra_fuel: Option<f64>,
    #[serde(default, alias = "taxiFuel")]
    pub taxi_fuel: Option<f64>,
    #[serde(default, alias = "reserveFuel")]
    pub reserve_fuel: Option<f64>,
    #[serde(default, alias = "reserveType")]
    pub reserve_type: Option<ReserveType>,
    #[serde(default, alias = "contingencyFuelPercent")]
    pub contingency_percent: Option<f64>,
    #[serde(default, alias = "deckTimePerStop")]
    pub deck_time_per_stop_min: Option<f64>,
    #[serde(default, alias = "deckFuelFlow")]
    pub deck_fuel_flow_lbs_hr: Option<f64>,
    #[serde(default, alias = "passengerWeight")]
    pub passenger_weight_lbs: Option<f64>,
    #[serde(default, alias = "cargoWeight")]
    pub cargo_weight_lbs: Option<f64>,
    #[serde(default, alias = "araFuel")]
    pub ara_fuel_default: Option<f64>,
    #[serde(default, alias = "approachFuel")]
    pub approach_fuel_default: Option<f64>,
}

impl UserOverrides {
    pub fn validate(&self) -> Result<(), FuelError> {
        let fields = [
            ("overrides.extra_fuel", self.extra_fuel),
            ("overrides.taxi_fuel", self.taxi_fuel),
            ("overrides.reserve_fuel", self.reserve_fuel),
            ("overrides.contingency_percent", self.contingency_percent),
            ("overrides.deck_time_per_stop_min", self.deck_time_per_stop_min),
            ("overrides.deck_fuel_flow_lbs_hr", self.deck_fuel_flow_lbs_hr),
            ("overrides.passenger_weight_lbs", self.passenger_weight_lbs),
            ("overrides.cargo_weight_lbs", self.cargo_weight_lbs),
            ("overrides.ara_fuel_default", self.ara_fuel_default),
            ("overrides.approach_fuel_default", self.approach_fuel_default),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                require_non_negative(field, value)?;
            }
        }
        Ok(())
    }

    /// Layer `other` on top of `self`; fields absent in `other` are kept.
    pub fn merge(&mut self, other: &UserOverrides) {
        fn take<T: Copy>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }
        take(&mut self.extra_fuel, other.extra_fuel);
        take(&mut self.taxi_fuel, other.taxi_fuel);
        take(&mut self.reserve_fuel, other.reserve_fuel);
        take(&mut self.reserve_type, other.reserve_type);
        take(&mut self.contingency_percent, other.contingency_percent);
        take(&mut self.deck_time_per_stop_min, other.deck_time_per_stop_min);
        take(&mut self.deck_fuel_flow_lbs_hr, other.deck_fuel_flow_lbs_hr);
        take(&mut self.passenger_weight_lbs, other.passenger_weight_lbs);
        take(&mut self.cargo_weight_lbs, other.cargo_weight_lbs);
        take(&mut self.ara_fuel_default, other.ara_fuel_default);
        take(&mut self.approach_fuel_default, other.approach_fuel_default);
    }
}

/// Policy merged with overrides and weather-derived additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveFuelValues {
    pub taxi_fuel: f64,
    pub reserve_fuel: f64,
    pub reserve_type: ReserveType,
    pub contingency_percent: f64,
    pub contingency_alternate_percent: f64,
    pub deck_time_per_stop_min: f64,
    pub deck_fuel_flow_lbs_hr: f64,
    pub passenger_weight_lbs: f64,
    pub cargo_weight_lbs: f64,
    pub extra_fuel: f64,
    pub ara_fuel_default: f64,
    pub approach_fuel_default: f64,
    /// Weather-driven ARA total for the route
    pub ara_fuel: f64,
    /// Weather-driven approach total for the route
    pub approach_fuel: f64,
}

impl EffectiveFuelValues {
    pub fn from_policy(settings: &PolicySettings) -> Self {
        Self {
            taxi_fuel: settings.taxi_fuel,
            reserve_fuel: settings.reserve_fuel,
            reserve_type: settings.reserve_type,
            contingency_percent: settings.contingency_percent,
            contingency_alternate_percent: settings.contingency_alternate_percent,
            deck_time_per_stop_min: settings.deck_time_per_stop_min,
            deck_fuel_flow_lbs_hr: settings.deck_fuel_flow_lbs_hr,
            passenger_weight_lbs: DEFAULT_PASSENGER_WEIGHT_LBS,
            cargo_weight_lbs: 0.0,
            extra_fuel: 0.0,
            ara_fuel_default: settings.ara_fuel_default,
            approach_fuel_default: settings.approach_fuel_default,
            ara_fuel: 0.0,
            approach_fuel: 0.0,
        }
    }

    /// Returns a copy with `overrides` applied.
    pub fn with_overrides(&self, overrides: &UserOverrides) -> Self {
        Self {
            taxi_fuel: overrides.taxi_fuel.unwrap_or(self.taxi_fuel),
            reserve_fuel: overrides.reserve_fuel.unwrap_or(self.reserve_fuel),
            reserve_type: overrides.reserve_type.unwrap_or(self.reserve_type),
            contingency_percent: overrides.contingency_percent.unwrap_or(self.contingency_percent),
            deck_time_per_stop_min: overrides
                .deck_time_per_stop_min
                .unwrap_or(self.deck_time_per_stop_min),
            deck_fuel_flow_lbs_hr: overrides
                .deck_fuel_flow_lbs_hr
                .unwrap_or(self.deck_fuel_flow_lbs_hr),
            passenger_weight_lbs: overrides
                .passenger_weight_lbs
                .unwrap_or(self.passenger_weight_lbs),
            cargo_weight_lbs: overrides.cargo_weight_lbs.unwrap_or(self.cargo_weight_lbs),
            extra_fuel: overrides.extra_fuel.unwrap_or(self.extra_fuel),
            ara_fuel_default: overrides.ara_fuel_default.unwrap_or(self.ara_fuel_default),
            approach_fuel_default: overrides
                .approach_fuel_default
                .unwrap_or(self.approach_fuel_default),
            ..self.clone()
        }
    }

    /// Reserve in lbs for a given trip fuel.
    pub fn reserve_for_trip(&self, trip_fuel: f64) -> f64 {
        match self.reserve_type {
            ReserveType::Fixed => self.reserve_fuel,
            ReserveType::Percentage => trip_fuel * self.reserve_fuel / 100.0,
        }
    }

    pub fn contingency_for_trip(&self, trip_fuel: f64) -> f64 {
        trip_fuel * self.contingency_percent / 100.0
    }

    pub fn deck_fuel_per_stop(&self) -> f64 {
        deck_fuel_lbs(self.deck_time_per_stop_min, self.deck_fuel_flow_lbs_hr)
    }
}

/// Fuel burned on deck: minutes × lbs/hr.
pub fn deck_fuel_lbs(deck_time_min: f64, deck_fuel_flow_lbs_hr: f64) -> f64 {
    (deck_time_min / 60.0 * deck_fuel_flow_lbs_hr).max(0.0)
}

/// Current route weather used by the wind collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    #[serde(alias = "windSpeed")]
    pub wind_speed_kt: f64,
    /// Direction the wind blows from, degrees true
    #[serde(alias = "windDirection")]
    pub wind_direction_deg: f64,
    #[serde(default, alias = "visibility")]
    pub visibility_sm: Option<f64>,
    #[serde(default, alias = "ceiling", alias = "cloudCeiling")]
    pub ceiling_ft: Option<f64>,
}

impl Weather {
    pub fn validate(&self) -> Result<(), FuelError> {
        require_non_negative("weather.wind_speed_kt", self.wind_speed_kt)?;
        if !self.wind_direction_deg.is_finite()
            || !(0.0..=360.0).contains(&self.wind_direction_deg)
        {
            return Err(FuelError::invalid(
                "weather.wind_direction_deg",
                format!("{} outside 0..=360", self.wind_direction_deg),
            ));
        }
        Ok(())
    }
}

/// Per-location weather classification from the forecast feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSegment {
    #[serde(alias = "locationCode", alias = "airportIcao")]
    pub location_code: String,
    #[serde(alias = "isRig")]
    pub is_rig: bool,
    pub ranking2: i32,
    #[serde(default, alias = "araRequired")]
    pub ara_required: bool,
    #[serde(default, alias = "approachRequired")]
    pub approach_required: bool,
}

impl WeatherSegment {
    pub fn validate(&self) -> Result<(), FuelError> {
        if self.location_code.trim().is_empty() {
            return Err(FuelError::invalid("weather_segment.location_code", "empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointRole {
    Departure,
    /// Landing stop between departure and destination
    #[default]
    Intermediate,
    Destination,
    /// Navigation point only, no landing
    #[serde(alias = "waypoint")]
    WaypointOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
    #[serde(default)]
    pub role: WaypointRole,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64, role: WaypointRole) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
            role,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn validate(&self) -> Result<(), FuelError> {
        if !self.point().is_valid() {
            return Err(FuelError::invalid(
                "waypoint",
                format!("{} has invalid coordinates ({}, {})", self.name, self.lat, self.lon),
            ));
        }
        Ok(())
    }
}

/// Indices (into `waypoints`) of the landing stops.
///
/// The first and last waypoint always count as stops, whatever their role.
pub fn stop_positions(waypoints: &[Waypoint]) -> Vec<usize> {
    let last = waypoints.len().saturating_sub(1);
    waypoints
        .iter()
        .enumerate()
        .filter(|(idx, wp)| *idx == 0 || *idx == last || wp.role != WaypointRole::WaypointOnly)
        .map(|(idx, _)| idx)
        .collect()
}

/// Landing stops cloned out of a waypoint list.
pub fn landing_stops(waypoints: &[Waypoint]) -> Vec<Waypoint> {
    stop_positions(waypoints)
        .into_iter()
        .map(|idx| waypoints[idx].clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    #[serde(default)]
    pub registration: Option<String>,
    #[serde(alias = "cruiseSpeed")]
    pub cruise_speed_kt: f64,
    #[serde(alias = "fuelBurn")]
    pub fuel_burn_lbs_hr: f64,
    #[serde(alias = "maxPassengers")]
    pub max_passengers: u32,
    #[serde(alias = "maxTakeoffWeight")]
    pub max_takeoff_weight_lbs: f64,
    #[serde(alias = "emptyWeight")]
    pub empty_weight_lbs: f64,
    #[serde(alias = "maxFuel")]
    pub max_fuel_lbs: f64,
    #[serde(alias = "maxPayload")]
    pub max_payload_lbs: f64,
}

impl Aircraft {
    pub fn validate(&self) -> Result<(), FuelError> {
        require_positive("aircraft.cruise_speed_kt", self.cruise_speed_kt)?;
        require_positive("aircraft.fuel_burn_lbs_hr", self.fuel_burn_lbs_hr)?;
        require_non_negative("aircraft.max_takeoff_weight_lbs", self.max_takeoff_weight_lbs)?;
        require_non_negative("aircraft.empty_weight_lbs", self.empty_weight_lbs)?;
        require_non_negative("aircraft.max_fuel_lbs", self.max_fuel_lbs)?;
        require_non_negative("aircraft.max_payload_lbs", self.max_payload_lbs)?;
        Ok(())
    }

    /// Fuel burned flying `distance_nm` in still air.
    pub fn trip_fuel(&self, distance_nm: f64) -> f64 {
        distance_nm / self.cruise_speed_kt * self.fuel_burn_lbs_hr
    }

    /// Payload left after `fuel_lbs` is loaded, bounded by the structural payload limit.
    pub fn available_payload(&self, fuel_lbs: f64) -> f64 {
        let by_weight = self.max_takeoff_weight_lbs - self.empty_weight_lbs - fuel_lbs;
        by_weight.min(self.max_payload_lbs).max(0.0)
    }
}
