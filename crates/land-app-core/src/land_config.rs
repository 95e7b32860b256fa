// SPDX-License-Identifier: Apache-2.0
//! Per-Land runtime settings, persisted through
//! [`crate::ConfigService`] the same way any other named JSON-blob
//! preference is persisted.

use std::time::Duration;

use land_sync::{AdaptiveConfig, DirtyTrackingMode};
use serde::{Deserialize, Serialize};

/// Serializable mirror of [`DirtyTrackingMode`] (which carries no `serde`
/// impls of its own, since `land-sync` has no on-disk representation of
/// its own settings).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DirtyTrackingSetting {
    /// See [`DirtyTrackingMode::Enabled`].
    Enabled,
    /// See [`DirtyTrackingMode::Disabled`].
    Disabled,
    /// See [`DirtyTrackingMode::Adaptive`].
    Adaptive {
        /// Consecutive outperforming ticks required before switching.
        sample_count: u32,
        /// Margin required to disable dirty tracking.
        off_margin: f64,
        /// Margin required to re-enable dirty tracking.
        on_margin: f64,
    },
}

impl Default for DirtyTrackingSetting {
    fn default() -> Self {
        Self::Enabled
    }
}

impl DirtyTrackingSetting {
    /// Convert to the runtime type `land-sync` actually consumes.
    #[must_use]
    pub const fn to_mode(self) -> DirtyTrackingMode {
        match self {
            Self::Enabled => DirtyTrackingMode::Enabled,
            Self::Disabled => DirtyTrackingMode::Disabled,
            Self::Adaptive {
                sample_count,
                off_margin,
                on_margin,
            } => DirtyTrackingMode::Adaptive(AdaptiveConfig {
                sample_count,
                off_margin,
                on_margin,
            }),
        }
    }
}

/// Persisted, per-`LandType` runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandConfig {
    /// Milliseconds between scheduled ticks. `0` means event-driven only
    /// (no timer; ticks only run on `request_sync_now`).
    pub tick_interval_ms: u64,
    /// How many ticks elapse, at most, between forced heartbeat syncs.
    /// `0` disables the heartbeat.
    pub state_sync_every_ticks: u32,
    /// Seconds a Land may sit with zero joined players before its Keeper
    /// terminates itself.
    pub idle_timeout_secs: u64,
    /// Maximum concurrently joined players. `0` means uncapped.
    pub max_players: u32,
    /// Whether an unauthenticated client may join as a guest.
    pub allow_guest_mode: bool,
    /// Whether `Realm::route` may create a new instance on join rather
    /// than requiring a pre-registered `LandID`.
    pub allow_auto_create_on_join: bool,
    /// Dirty-tracking strategy for the Sync Engine.
    pub dirty_tracking: DirtyTrackingSetting,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            state_sync_every_ticks: 20,
            idle_timeout_secs: 300,
            max_players: 0,
            allow_guest_mode: false,
            allow_auto_create_on_join: false,
            dirty_tracking: DirtyTrackingSetting::Enabled,
        }
    }
}

impl LandConfig {
    /// The configured tick interval as a [`Duration`], or `None` for a
    /// purely event-driven Land.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_ms > 0).then(|| Duration::from_millis(self.tick_interval_ms))
    }

    /// The configured idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// The configured player cap, or `None` if uncapped.
    #[must_use]
    pub const fn max_players(&self) -> Option<u32> {
        if self.max_players == 0 {
            None
        } else {
            Some(self.max_players)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tick_interval_means_event_driven() {
        let mut config = LandConfig::default();
        config.tick_interval_ms = 0;
        assert!(config.tick_interval().is_none());
    }

    #[test]
    fn default_round_trips_through_json() {
        let config = LandConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: LandConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.tick_interval_ms, config.tick_interval_ms);
    }

    #[test]
    fn zero_max_players_means_uncapped() {
        let config = LandConfig::default();
        assert_eq!(config.max_players(), None);
    }
}
