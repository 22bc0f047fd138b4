//! Engine configuration from defaults, JSON or environment.

use crate::corridor::CorridorOptions;
use crate::scoring::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window between notification flushes (ms)
    pub notification_window_ms: u64,
    /// Ordinal spacing recorded between subscriber deliveries (ms)
    pub subscriber_stagger_ms: u64,
    /// Re-runs allowed when inputs change while a calculation is running
    pub max_recalculation_passes: usize,
    pub corridor: CorridorOptions,
    pub scoring: ScoringWeights,
    /// Suggestions returned per optimization run
    pub max_suggestions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notification_window_ms: 50,
            subscriber_stagger_ms: 10,
            max_recalculation_passes: 3,
            corridor: CorridorOptions::default(),
            scoring: ScoringWeights::default(),
            max_suggestions: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            notification_window_ms: env_or("FUEL_NOTIFY_WINDOW_MS", defaults.notification_window_ms),
            subscriber_stagger_ms: env_or("FUEL_SUBSCRIBER_STAGGER_MS", defaults.subscriber_stagger_ms),
            max_recalculation_passes: defaults.max_recalculation_passes,
            corridor: CorridorOptions {
                sample_count: env_or("FUEL_CORRIDOR_SAMPLES", defaults.corridor.sample_count),
                max_off_track_nm: env_or(
                    "FUEL_CORRIDOR_MAX_OFF_TRACK_NM",
                    defaults.corridor.max_off_track_nm,
                ),
                min_from_start_nm: env_or(
                    "FUEL_CORRIDOR_MIN_FROM_START_NM",
                    defaults.corridor.min_from_start_nm,
                ),
            },
            scoring: defaults.scoring,
            max_suggestions: env_or("FUEL_MAX_SUGGESTIONS", defaults.max_suggestions),
        }
    }

    pub fn notification_window(&self) -> Duration {
        Duration::from_millis(self.notification_window_ms.max(1))
    }

    pub fn subscriber_stagger(&self) -> Duration {
        Duration::from_millis(self.subscriber_stagger_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_suggestions": 1, "corridor": {"max_off_track_nm": 15}}"#)
                .unwrap();
        assert_eq!(config.max_suggestions, 1);
        assert_eq!(config.corridor.max_off_track_nm, 15.0);
        assert_eq!(config.corridor.sample_count, 10);
        assert_eq!(config.notification_window_ms, 50);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        assert_eq!(env_or("FUEL_TEST_UNSET_VARIABLE", 7usize), 7);
    }
}
