//! Planning scenarios: one flight's worth of engine inputs.

use anyhow::{Context, Result};
use fuel_core::spatial::offset_by_bearing;
use fuel_core::{
    Aircraft, FuelPolicy, GeoPoint, ReserveType, UserOverrides, Waypoint, WaypointRole, Weather,
    WeatherSegment,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

/// Aberdeen heliport
const ABERDEEN_LAT: f64 = 57.2019;
const ABERDEEN_LON: f64 = -2.1978;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub policy: FuelPolicy,
    pub aircraft: Aircraft,
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default, alias = "weatherSegments")]
    pub weather_segments: Vec<WeatherSegment>,
    /// Landing-stop indices
    #[serde(default, alias = "refuelStops")]
    pub refuel_stops: Vec<usize>,
    #[serde(default)]
    pub overrides: Option<UserOverrides>,
    /// Passengers boarding at each landing stop
    #[serde(default, alias = "requestedPassengers")]
    pub requested_passengers: Vec<u32>,
    #[serde(default, alias = "platformCollections")]
    pub platform_collections: Vec<Vec<Value>>,
    #[serde(default, alias = "splitPoint")]
    pub split_point: Option<GeoPoint>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn wants_optimization(&self) -> bool {
        self.requested_passengers.iter().any(|&p| p > 0)
    }
}

fn waypoint_at(name: &str, distance_nm: f64, bearing_deg: f64, role: WaypointRole) -> Waypoint {
    let (lat, lon) =
        offset_by_bearing(ABERDEEN_LAT, ABERDEEN_LON, distance_nm, bearing_deg.to_radians());
    Waypoint::new(name, lat, lon, role)
}

fn platform_at(record: Value, distance_nm: f64, bearing_deg: f64) -> Value {
    let (lat, lon) =
        offset_by_bearing(ABERDEEN_LAT, ABERDEEN_LON, distance_nm, bearing_deg.to_radians());
    let mut record = record;
    if let Some(obj) = record.as_object_mut() {
        obj.insert("lat".into(), json!(lat));
        obj.insert("lng".into(), json!(lon));
    }
    record
}

/// Aberdeen out to two production rigs, with a heavy departure load.
///
/// - ALPHA is forecast below ARA minima (listed twice by the feed)
/// - 18 passengers leave Aberdeen; fuel weight leaves room for fewer
pub fn create_north_sea_scenario() -> Scenario {
    let waypoints = vec![
        Waypoint::new("EGPD", ABERDEEN_LAT, ABERDEEN_LON, WaypointRole::Departure),
        waypoint_at("ALPHA", 70.0, 62.0, WaypointRole::Intermediate),
        waypoint_at("KITTY", 105.0, 61.0, WaypointRole::WaypointOnly),
        waypoint_at("BRAVO", 140.0, 60.0, WaypointRole::Destination),
    ];

    let platform_collections = vec![
        vec![
            platform_at(json!({"id": "FTC", "name": "Forties Charlie", "hasFuel": true}), 95.0, 61.5),
            platform_at(json!({"id": "NEL", "name": "Nelson", "platformType": "Production Platform"}), 120.0, 59.0),
        ],
        vec![
            platform_at(json!({"platformId": "BRA-OLD", "platformName": "Brent Spar", "fuelCapacity": 9000, "status": "Decommissioned"}), 100.0, 60.5),
            platform_at(json!({"platformId": "WT-7", "platformName": "Hywind 7", "type": "Wind Turbine"}), 80.0, 61.0),
        ],
    ];

    Scenario {
        name: "north_sea".to_string(),
        policy: FuelPolicy {
            id: Some("NS-STD".into()),
            name: Some("North Sea standard".into()),
            taxi_fuel: 50.0,
            reserve_fuel: 600.0,
            reserve_type: ReserveType::Fixed,
            contingency_legs_percent: 10.0,
            contingency_alternate_percent: 5.0,
            deck_fuel_time_min: 5.0,
            deck_fuel_flow_lbs_hr: Some(400.0),
            ara_fuel_default: 200.0,
            approach_fuel_default: 200.0,
        },
        aircraft: Aircraft {
            registration: Some("G-NSEA".into()),
            cruise_speed_kt: 145.0,
            fuel_burn_lbs_hr: 1100.0,
            max_passengers: 19,
            max_takeoff_weight_lbs: 26_500.0,
            empty_weight_lbs: 21_000.0,
            max_fuel_lbs: 5_000.0,
            max_payload_lbs: 6_000.0,
        },
        waypoints,
        weather: Some(Weather {
            wind_speed_kt: 25.0,
            wind_direction_deg: 240.0,
            visibility_sm: Some(6.0),
            ceiling_ft: Some(1_200.0),
        }),
        weather_segments: vec![
            rig("ALPHA", 8),
            rig("ALPHA", 8),
            rig("BRAVO", 3),
        ],
        refuel_stops: Vec::new(),
        overrides: None,
        requested_passengers: vec![18, 2, 0],
        platform_collections,
        split_point: None,
    }
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
