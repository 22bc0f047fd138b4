pub mod config;
pub mod corridor;
pub mod error;
pub mod inputs;
pub mod loops;
pub mod master;
pub mod models;
pub mod notify;
pub mod optimizer;
pub mod platforms;
pub mod route;
pub mod scoring;
pub mod segments;
pub mod spatial;
pub mod stop_cards;
pub mod weather;
pub mod wind;

pub use config::EngineConfig;
pub use corridor::{CorridorOptions, CorridorSearcher, SearchCorridor};
pub use error::FuelError;
pub use inputs::{EffectiveSettings, FuelInputManager, FuelType, GlobalFuelSettings, SettingsPatch};
pub use master::{FuelCalculations, FuelState, MasterFuelManager};
pub use models::{
    Aircraft, EffectiveFuelValues, FuelPolicy, ReserveType, UserOverrides, Waypoint,
    WaypointRole, Weather, WeatherSegment,
};
pub use notify::{FuelEventKind, FuelNotification, Subscription, SubscriptionId};
pub use optimizer::{
    FlightData, FuelStopOptimizationManager, FuelStopOptimizer, FuelStopSuggestion,
    OptimizationFailure, OptimizationOutcome, OverloadAnalysis, StopLoad,
};
pub use platforms::{Platform, PlatformEvaluator};
pub use route::{LegStats, RouteStats};
pub use scoring::{OptimizationCandidate, OptimizationScorer, ScoringWeights};
pub use segments::{FlightSegment, FuelRequirements, SegmentAnalysis, SegmentEngine, StopFuelSummary};
pub use spatial::{haversine_nm, GeoPoint};
pub use stop_cards::{DirectStopCardCalculator, StopCard, StopCardCalculator, StopCardRequest};
pub use weather::{WeatherFuelAnalysis, WeatherFuelAnalyzer};
pub use wind::{HeadwindCalculator, WindCalculator};
