//! Normalisation of heterogeneous platform records.
//!
//! Platform data arrives from several collections with no shared schema.
//! Everything field-name specific lives here; downstream code only ever sees
//! the canonical [`Platform`].

use crate::spatial::GeoPoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

const LAT_FIELDS: [&str; 4] = ["lat", "latitude", "Lat", "LATITUDE"];
const LON_FIELDS: [&str; 6] = ["lng", "lon", "long", "longitude", "Lng", "LONGITUDE"];
const NAME_FIELDS: [&str; 5] = ["name", "platformName", "platform_name", "title", "label"];
const ID_FIELDS: [&str; 4] = ["id", "platformId", "platform_id", "code"];
const FUEL_FLAG_FIELDS: [&str; 7] = [
    "hasFuel",
    "has_fuel",
    "fuelAvailable",
    "fuel_available",
    "refuelCapable",
    "refuel_capable",
    "fuelService",
];
const FUEL_CAPACITY_FIELDS: [&str; 4] = [
    "fuelCapacity",
    "fuel_capacity",
    "fuelStorage",
    "fuel_storage",
];
const TYPE_FIELDS: [&str; 5] = ["platformType", "platform_type", "type", "facilityType", "category"];
const STATUS_FIELDS: [&str; 3] = ["status", "operationalStatus", "operational_status"];
const ACTIVE_FLAG_FIELDS: [&str; 5] = ["active", "isActive", "is_active", "operational", "isOperational"];

const FUEL_CAPABLE_TYPES: [&str; 5] = ["oil rig", "rig", "drilling", "production", "fpso"];
const INACTIVE_STATUSES: [&str; 4] = ["inactive", "decommissioned", "maintenance", "closed"];

/// Canonical platform shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub fuel_capacity: Option<f64>,
    pub has_fuel: bool,
    pub is_operational: bool,
    pub platform_type: Option<String>,
}

impl Platform {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Stateless checks and projection over raw platform records.
pub struct PlatformEvaluator;

impl PlatformEvaluator {
    pub fn has_fuel_capability(record: &Value) -> bool {
        if FUEL_FLAG_FIELDS
            .iter()
            .any(|field| record.get(field).and_then(Value::as_bool) == Some(true))
        {
            return true;
        }
        if fuel_capacity(record).is_some_and(|capacity| capacity > 0.0) {
            return true;
        }
        platform_type(record).is_some_and(|kind| is_fuel_capable_type(&kind))
    }

    pub fn is_operational(record: &Value) -> bool {
        if ACTIVE_FLAG_FIELDS
            .iter()
            .any(|field| record.get(field).and_then(Value::as_bool) == Some(false))
        {
            return false;
        }
        let inactive = STATUS_FIELDS
            .iter()
            .filter_map(|field| record.get(field).and_then(Value::as_str))
            .any(|status| {
                let status = status.to_lowercase();
                INACTIVE_STATUSES.iter().any(|bad| status.contains(bad))
            });
        !inactive
    }

    pub fn has_valid_coordinates(record: &Value) -> bool {
        coordinates(record).is_some()
    }

    pub fn normalize_platform(record: &Value) -> Option<Platform> {
        let point = coordinates(record)?;
        let name = first_string(record, &NAME_FIELDS);
        let id = first_string(record, &ID_FIELDS)
            .or_else(|| first_number(record, &ID_FIELDS).map(|n| format!("{n}")))
            .or_else(|| name.clone())
            .unwrap_or_else(|| format!("{:.4},{:.4}", point.lat, point.lon));
        Some(Platform {
            name: name.unwrap_or_else(|| id.clone()),
            id,
            lat: point.lat,
            lng: point.lon,
            fuel_capacity: fuel_capacity(record),
            has_fuel: Self::has_fuel_capability(record),
            is_operational: Self::is_operational(record),
            platform_type: platform_type(record),
        })
    }

    /// Normalise every collection and drop duplicates.
    ///
    /// Records are the same platform when they share an id, or a name at the
    /// same rounded position.
    pub fn merge_collections(collections: &[Vec<Value>]) -> Vec<Platform> {
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_sites: HashSet<(String, i64, i64)> = HashSet::new();
        let mut platforms = Vec::new();
        let mut rejected = 0usize;

        for record in collections.iter().flatten() {
            let Some(platform) = Self::normalize_platform(record) else {
                rejected += 1;
                continue;
            };
            let site = (
                platform.name.to_uppercase(),
                (platform.lat * 1000.0).round() as i64,
                (platform.lng * 1000.0).round() as i64,
            );
            if !seen_ids.insert(platform.id.clone()) || !seen_sites.insert(site) {
                continue;
            }
            platforms.push(platform);
        }

        if rejected > 0 {
            tracing::debug!("Skipped {} platform records without usable coordinates", rejected);
        }
        platforms
    }
}

fn is_fuel_capable_type(kind: &str) -> bool {
    let kind = kind.to_lowercase();
    kind.split(|c: char| !c.is_alphanumeric())
        .any(|word| FUEL_CAPABLE_TYPES.contains(&word))
        || kind.contains("oil rig")
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn first_number(record: &Value, fields: &[&str]) -> Option<f64> {
    fields
        .iter()
        .find_map(|field| record.get(field).and_then(number))
}

fn first_string(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        record
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn fuel_capacity(record: &Value) -> Option<f64> {
    first_number(record, &FUEL_CAPACITY_FIELDS)
}

fn platform_type(record: &Value) -> Option<String> {
    first_string(record, &TYPE_FIELDS)
}

/// Position from flat fields, a `coordinates` pair or a GeoJSON `geometry`.
fn coordinates(record: &Value) -> Option<GeoPoint> {
    let flat = first_number(record, &LAT_FIELDS).zip(first_number(record, &LON_FIELDS));
    let point = flat
        .map(|(lat, lon)| GeoPoint::new(lat, lon))
        .or_else(|| geojson_pair(record.get("coordinates")?))
        .or_else(|| geojson_pair(record.get("geometry")?.get("coordinates")?))?;
    point.is_valid().then_some(point)
}

/// GeoJSON order: `[lon, lat]`.
fn geojson_pair(value: &Value) -> Option<GeoPoint> {
    let pair = value.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    Some(GeoPoint::new(number(&pair[1])?, number(&pair[0])?))
}
