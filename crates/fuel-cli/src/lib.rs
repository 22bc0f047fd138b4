//! Fuel CLI - scenario loading and reporting for the `fuel_plan` binary.

pub mod plan;
pub mod scenario;

pub use plan::{run_scenario, PlanReport};
pub use scenario::{create_north_sea_scenario, Scenario};
