//! Level system
//!
//! Eight levels over a strictly increasing XP threshold table. Level `n`
//! (1-based) starts at `thresholds[n - 1]` total XP; level 1 starts at 0.
//! Negative totals sit at level 1.

use crate::config::{ConfigError, LevelConfig};
use serde::{Deserialize, Serialize};

/// Number of levels
pub const LEVEL_COUNT: usize = 8;

/// Validated XP-to-level mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<u64>,
    titles: Vec<String>,
}

impl LevelTable {
    /// Build from configuration
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] unless there are exactly eight thresholds,
    /// the first is 0, they strictly increase, and titles (if any) match
    pub fn from_config(config: &LevelConfig) -> Result<Self, ConfigError> {
        let thresholds = &config.thresholds;
        if thresholds.len() != LEVEL_COUNT {
            return Err(ConfigError::Invalid(format!(
                "levels.thresholds needs {LEVEL_COUNT} entries, got {}",
                thresholds.len()
            )));
        }
        if thresholds[0] != 0 {
            return Err(ConfigError::Invalid("levels.thresholds must start at 0".into()));
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid(
                "levels.thresholds must be strictly increasing".into(),
            ));
        }
        if !config.titles.is_empty() && config.titles.len() != LEVEL_COUNT {
            return Err(ConfigError::Invalid(format!(
                "levels.titles needs {LEVEL_COUNT} entries, got {}",
                config.titles.len()
            )));
        }

        Ok(Self {
            thresholds: thresholds.clone(),
            titles: config.titles.clone(),
        })
    }

    /// Highest level
    #[inline]
    #[must_use]
    pub fn max_level(&self) -> u8 {
        LEVEL_COUNT as u8
    }

    /// Level reached with `total_xp`
    #[must_use]
    pub fn level_for_xp(&self, total_xp: i64) -> u8 {
        let xp = u64::try_from(total_xp).unwrap_or(0);
        let reached = self.thresholds.iter().take_while(|&&t| t <= xp).count();
        // thresholds[0] == 0, so at least one level is always reached
        reached.max(1) as u8
    }

    /// Total XP at which `level` starts; `None` outside `1..=8`
    #[inline]
    #[must_use]
    pub fn xp_required_for_level(&self, level: u8) -> Option<u64> {
        let idx = usize::from(level).checked_sub(1)?;
        self.thresholds.get(idx).copied()
    }

    /// Title of a level, `"Level N"` when none configured
    #[must_use]
    pub fn title(&self, level: u8) -> String {
        usize::from(level)
            .checked_sub(1)
            .and_then(|idx| self.titles.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("Level {level}"))
    }

    /// Level and progress toward the next one
    #[must_use]
    pub fn progress(&self, total_xp: i64) -> LevelProgress {
        let level = self.level_for_xp(total_xp);
        let xp = u64::try_from(total_xp).unwrap_or(0);
        let current_level_xp = self.xp_required_for_level(level).unwrap_or(0);
        let next_level_xp = self.xp_required_for_level(level.saturating_add(1));

        let xp_into_level = xp.saturating_sub(current_level_xp);
        let (xp_to_next, progress) = match next_level_xp {
            Some(next) => {
                let span = next - current_level_xp;
                let fraction = xp_into_level as f64 / span as f64;
                (next.saturating_sub(xp), fraction.clamp(0.0, 1.0))
            }
            None => (0, 1.0),
        };

        LevelProgress {
            level,
            title: self.title(level),
            total_xp,
            current_level_xp,
            next_level_xp,
            xp_into_level,
            xp_to_next,
            progress,
        }
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        let config = LevelConfig::default();
        Self {
            thresholds: config.thresholds,
            titles: config.titles,
        }
    }
}

/// Where a user stands on the level ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Current level (1-based)
    pub level: u8,
    /// Level title
    pub title: String,
    /// Total XP
    pub total_xp: i64,
    /// XP at which the current level started
    pub current_level_xp: u64,
    /// XP at which the next level starts; `None` at max level
    pub next_level_xp: Option<u64>,
    /// XP earned since reaching the current level
    pub xp_into_level: u64,
    /// XP still missing for the next level
    pub xp_to_next: u64,
    /// Fraction of the current level completed (0.0 - 1.0)
    pub progress: f64,
}

impl LevelProgress {
    /// Whether the top level is reached
    #[inline]
    #[must_use]
    pub fn is_max_level(&self) -> bool {
        self.next_level_xp.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_boundaries() {
        let table = LevelTable::default();
        assert_eq!(table.level_for_xp(0), 1);
        assert_eq!(table.level_for_xp(99), 1);
        assert_eq!(table.level_for_xp(100), 2);
        assert_eq!(table.level_for_xp(3599), 7);
        assert_eq!(table.level_for_xp(3600), 8);
        assert_eq!(table.level_for_xp(1_000_000), 8);
        assert_eq!(table.level_for_xp(-50), 1);
    }

    #[test]
    fn xp_required_inverse() {
        let table = LevelTable::default();
        assert_eq!(table.xp_required_for_level(1), Some(0));
        assert_eq!(table.xp_required_for_level(8), Some(3600));
        assert_eq!(table.xp_required_for_level(0), None);
        assert_eq!(table.xp_required_for_level(9), None);
        for level in 1..=8u8 {
            let xp = table.xp_required_for_level(level).unwrap();
            assert_eq!(table.level_for_xp(xp as i64), level);
        }
    }

    #[test]
    fn progress_mid_level() {
        let p = LevelTable::default().progress(175);
        assert_eq!(p.level, 2);
        assert_eq!(p.title, "Sketcher");
        assert_eq!(p.current_level_xp, 100);
        assert_eq!(p.next_level_xp, Some(250));
        assert_eq!(p.xp_into_level, 75);
        assert_eq!(p.xp_to_next, 75);
        assert!((p.progress - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_at_max_level() {
        let p = LevelTable::default().progress(5000);
        assert!(p.is_max_level());
        assert_eq!(p.xp_to_next, 0);
        assert!((p.progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn table_validation() {
        let mut config = LevelConfig::default();
        config.thresholds[3] = config.thresholds[2];
        assert!(LevelTable::from_config(&config).is_err());

        let mut config = LevelConfig::default();
        config.thresholds[0] = 5;
        assert!(LevelTable::from_config(&config).is_err());

        let mut config = LevelConfig::default();
        config.titles.clear();
        let table = LevelTable::from_config(&config).unwrap();
        assert_eq!(table.title(3), "Level 3");
    }

    proptest! {
        #[test]
        fn prop_level_is_monotonic(a in -1000i64..10_000, b in -1000i64..10_000) {
            let table = LevelTable::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(table.level_for_xp(lo) <= table.level_for_xp(hi));
        }

        #[test]
        fn prop_progress_in_unit_interval(xp in -1000i64..10_000) {
            let p = LevelTable::default().progress(xp);
            prop_assert!((0.0..=1.0).contains(&p.progress));
            prop_assert!((1..=8).contains(&p.level));
        }
    }
}
