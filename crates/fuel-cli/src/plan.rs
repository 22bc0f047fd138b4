//! Run one scenario through the engine and collect what it produced.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use fuel_core::loops::notification_loop::spawn_notification_loop;
use fuel_core::{
    EngineConfig, FlightData, FuelCalculations, FuelNotification, FuelStopOptimizationManager,
    MasterFuelManager, OptimizationOutcome, StopFuelSummary,
};
use serde::Serialize;

use crate::scenario::Scenario;

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub scenario: String,
    pub calculations: FuelCalculations,
    pub stop_summaries: Vec<StopFuelSummary>,
    pub optimization: Option<OptimizationOutcome>,
    pub notifications_delivered: usize,
}

pub async fn run_scenario(scenario: &Scenario, config: &EngineConfig) -> Result<PlanReport> {
    let manager = Arc::new(MasterFuelManager::new(config.clone()));

    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = Arc::clone(&delivered);
        manager.subscribe("fuel_plan", move |n: &FuelNotification| {
            tracing::debug!("Notification {} (cycle {})", n.kind, n.sequence);
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }
    let (pump, shutdown) = spawn_notification_loop(&manager);

    tracing::info!("Planning scenario '{}'", scenario.name);
    manager.update_fuel_policy(scenario.policy.clone())?;
    manager.update_aircraft(scenario.aircraft.clone())?;
    if let Some(weather) = &scenario.weather {
        manager.update_weather(weather.clone())?;
    }
    manager.update_weather_segments(scenario.weather_segments.clone())?;
    manager.update_waypoints(scenario.waypoints.clone())?;
    if !scenario.refuel_stops.is_empty() {
        manager.update_refuel_stops(scenario.refuel_stops.clone())?;
    }
    if let Some(overrides) = &scenario.overrides {
        manager.apply_user_overrides(overrides.clone())?;
    }

    let calculations = manager
        .get_calculations()
        .context("no fuel calculation produced; check aircraft, policy and waypoints")?;

    let stop_summaries = (0..calculations.stop_cards.len())
        .filter_map(|stop| manager.get_fuel_summary_for_stop(stop))
        .collect();

    let optimization = if scenario.wants_optimization() {
        let data = FlightData::from_stop_cards(
            &scenario.waypoints,
            &scenario.aircraft,
            &calculations,
            &scenario.requested_passengers,
            scenario.platform_collections.clone(),
            scenario.split_point,
        );
        let mut optimizer = FuelStopOptimizationManager::new(config);
        Some(optimizer.suggest_fuel_stops(&data))
    } else {
        None
    };

    // Give the pump one window to deliver, then stop it.
    tokio::time::sleep(config.notification_window()).await;
    shutdown.send(()).ok();
    pump.await.context("notification loop failed")?;
    manager.flush_notifications();

    Ok(PlanReport {
        scenario: scenario.name.clone(),
        calculations: (*calculations).clone(),
        stop_summaries,
        optimization,
        notifications_delivered: delivered.load(Ordering::Relaxed),
    })
}
