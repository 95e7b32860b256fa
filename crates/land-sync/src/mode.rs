// SPDX-License-Identifier: Apache-2.0
//! The three sync modes and the dirty-tracking on/off/adaptive setting.

/// Which strategy produced a given player's [`crate::PlayerUpdate`] this
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Emit the recorded patches verbatim. Smallest payload, used only
    /// when every dirty field was covered by at least one patch.
    Incremental,
    /// Rebuild and diff only the subtrees rooted at this tick's dirty
    /// paths against the player's last-acknowledged snapshot.
    DirtySnapshotDiff,
    /// Diff the whole state tree against the player's last-acknowledged
    /// snapshot. Used for first sync, forced resync, and whenever dirty
    /// tracking is disabled.
    FullDiff,
}

/// Whether dirty-bit tracking (and therefore the incremental/
/// dirty-snapshot-diff modes) is available at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyTrackingMode {
    /// Always available; mode selection runs the full decision tree.
    Enabled,
    /// Never available; every dirty tick falls back to full diff.
    Disabled,
    /// Starts enabled, and flips on/off based on which mode would have
    /// emitted fewer bytes over a run of consecutive ticks.
    Adaptive(AdaptiveConfig),
}

/// Tunables for the adaptive dirty-tracking switch: it disables dirty
/// tracking after a configurable number of consecutive ticks where
/// dirty-snapshot-diff outperforms incremental in bytes emitted, and
/// re-enables it once the opposite holds for that many ticks in a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    /// Consecutive outperforming ticks required before switching.
    pub sample_count: u32,
    /// Fraction (0.0-1.0) by which dirty-snapshot-diff bytes must beat
    /// incremental bytes, on a tick where both were measurable, for that
    /// tick to count toward disabling dirty tracking.
    pub off_margin: f64,
    /// Symmetric margin for incremental beating dirty-snapshot-diff,
    /// counting toward re-enabling dirty tracking.
    pub on_margin: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            sample_count: 20,
            off_margin: 0.10,
            on_margin: 0.10,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct AdaptiveState {
    enabled: bool,
    off_streak: u32,
    on_streak: u32,
}

impl AdaptiveState {
    pub(crate) fn new() -> Self {
        Self {
            enabled: true,
            off_streak: 0,
            on_streak: 0,
        }
    }

    pub(crate) const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Fold in one tick's byte comparison. `incremental_bytes` and
    /// `snapshot_bytes` are only meaningful when both modes were actually
    /// computable this tick (i.e. coverage held); callers should not call
    /// this otherwise.
    pub(crate) fn observe(&mut self, incremental_bytes: usize, snapshot_bytes: usize, cfg: AdaptiveConfig) {
        let incremental_bytes = incremental_bytes as f64;
        let snapshot_bytes = snapshot_bytes as f64;
        if incremental_bytes <= 0.0 {
            return;
        }
        let snapshot_wins = snapshot_bytes < incremental_bytes * (1.0 - cfg.off_margin);
        let incremental_wins = incremental_bytes < snapshot_bytes * (1.0 - cfg.on_margin);

        if snapshot_wins {
            self.off_streak += 1;
            self.on_streak = 0;
        } else if incremental_wins {
            self.on_streak += 1;
            self.off_streak = 0;
        } else {
            self.off_streak = 0;
            self.on_streak = 0;
        }

        if self.enabled && self.off_streak >= cfg.sample_count {
            self.enabled = false;
            self.off_streak = 0;
            tracing::debug!("adaptive sync: disabling dirty tracking");
        } else if !self.enabled && self.on_streak >= cfg.sample_count {
            self.enabled = true;
            self.on_streak = 0;
            tracing::debug!("adaptive sync: re-enabling dirty tracking");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_state_disables_after_sample_count_of_snapshot_wins() {
        let cfg = AdaptiveConfig {
            sample_count: 3,
            off_margin: 0.1,
            on_margin: 0.1,
        };
        let mut state = AdaptiveState::new();
        assert!(state.enabled());
        for _ in 0..3 {
            state.observe(1000, 100, cfg);
        }
        assert!(!state.enabled());
    }

    #[test]
    fn adaptive_state_reenables_after_sample_count_of_incremental_wins() {
        let cfg = AdaptiveConfig {
            sample_count: 2,
            off_margin: 0.1,
            on_margin: 0.1,
        };
        let mut state = AdaptiveState::new();
        for _ in 0..2 {
            state.observe(1000, 100, cfg);
        }
        assert!(!state.enabled());
        for _ in 0..2 {
            state.observe(100, 1000, cfg);
        }
        assert!(state.enabled());
    }
}
