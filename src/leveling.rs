// 📈 Leveling Curve + Level Resolver
// Closed-form XP curve → lookup table → binary search

use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Highest level tabulated by default
pub const DEFAULT_MAX_LEVEL: u32 = 100;

// ============================================================================
// ERRORS
// ============================================================================

/// Invalid arguments to the curve or the resolver.
///
/// These are caller bugs, not irregular game data, so they fail fast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelingError {
    #[error("level must be >= 1, got {0}")]
    LevelBelowMinimum(u32),

    #[error("experience must be non-negative, got {0}")]
    NegativeExperience(i64),

    #[error("leveling table must contain at least one level")]
    EmptyTable,

    #[error("leveling curve decreases after level {level}: {previous} xp -> {next} xp")]
    NonMonotonic { level: u32, previous: u64, next: u64 },
}

// ============================================================================
// CURVE
// ============================================================================

/// Total XP needed to *reach* `level`.
///
/// `10 * floor(64 * (2^(0.145 L) - 2^0.145) / (2^0.29 - 2^0.145))`
pub fn threshold_for_level(level: u32) -> Result<u64, LevelingError> {
    if level < 1 {
        return Err(LevelingError::LevelBelowMinimum(level));
    }

    let k1 = 2f64.powf(0.145);
    let k2 = 2f64.powf(0.29);
    let a = 2f64.powf(0.145 * level as f64);

    let steps = (64.0 * ((a - k1) / (k2 - k1))).floor();
    Ok(10 * steps.max(0.0) as u64)
}

// ============================================================================
// TABLE
// ============================================================================

/// Minimum cumulative XP per level, levels `1..=max_level`.
///
/// Built once and read-only afterwards. Construction verifies the curve is
/// non-decreasing so the resolver's binary search is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelingTable {
    // thresholds[i] is the threshold of level i + 1
    thresholds: Vec<u64>,
}

impl LevelingTable {
    /// Tabulate the curve for levels `1..=max_level`
    pub fn build(max_level: u32) -> Result<Self, LevelingError> {
        if max_level < 1 {
            return Err(LevelingError::EmptyTable);
        }

        let thresholds = (1..=max_level)
            .map(threshold_for_level)
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_thresholds(thresholds)
    }

    /// Wrap precomputed thresholds (index 0 = level 1), rejecting tables that
    /// decrease anywhere.
    pub fn from_thresholds(thresholds: Vec<u64>) -> Result<Self, LevelingError> {
        if thresholds.is_empty() {
            return Err(LevelingError::EmptyTable);
        }

        for (i, pair) in thresholds.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(LevelingError::NonMonotonic {
                    level: i as u32 + 1,
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }

        Ok(LevelingTable { thresholds })
    }

    /// The memoized default 100-level table
    pub fn standard() -> &'static LevelingTable {
        static STANDARD: OnceLock<LevelingTable> = OnceLock::new();
        STANDARD.get_or_init(|| {
            // The curve constants are fixed; `tests::test_standard_table_is_monotonic`
            // pins this construction.
            LevelingTable::build(DEFAULT_MAX_LEVEL).expect("standard leveling curve is monotonic")
        })
    }

    /// Highest tabulated level
    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    /// Threshold for `level`, `None` outside `1..=max_level`
    pub fn threshold(&self, level: u32) -> Option<u64> {
        if level < 1 {
            return None;
        }
        self.thresholds.get(level as usize - 1).copied()
    }

    /// `(level, threshold)` pairs in level order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.thresholds
            .iter()
            .enumerate()
            .map(|(i, xp)| (i as u32 + 1, *xp))
    }

    /// Greatest level whose threshold is <= `xp`.
    ///
    /// 0 below the first threshold; clamps to `max_level()` past the last one.
    pub fn level_for(&self, xp: u64) -> u32 {
        // Number of thresholds <= xp == the level reached
        self.thresholds.partition_point(|threshold| *threshold <= xp) as u32
    }
}

/// Resolve a raw experience value against `table`.
pub fn level_from_experience(xp: i64, table: &LevelingTable) -> Result<u32, LevelingError> {
    if xp < 0 {
        return Err(LevelingError::NegativeExperience(xp));
    }
    Ok(table.level_for(xp as u64))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_first_levels() {
        assert_eq!(threshold_for_level(1).unwrap(), 0);
        assert_eq!(threshold_for_level(2).unwrap(), 640);
        assert_eq!(threshold_for_level(3).unwrap(), 1340);
        assert_eq!(threshold_for_level(4).unwrap(), 2130);
    }

    #[test]
    fn test_threshold_level_zero_fails_fast() {
        assert_eq!(
            threshold_for_level(0),
            Err(LevelingError::LevelBelowMinimum(0))
        );
    }

    #[test]
    fn test_standard_table_is_monotonic() {
        let table = LevelingTable::build(DEFAULT_MAX_LEVEL).unwrap();
        assert_eq!(table.max_level(), 100);
        assert_eq!(table.threshold(1), Some(0));

        for l1 in 1..=100 {
            for l2 in (l1 + 1)..=100 {
                assert!(
                    table.threshold(l1).unwrap() <= table.threshold(l2).unwrap(),
                    "threshold({}) should not exceed threshold({})",
                    l1,
                    l2
                );
            }
        }
    }

    #[test]
    fn test_exact_at_thresholds() {
        let table = LevelingTable::standard();

        for level in 1..=100 {
            let xp = table.threshold(level).unwrap() as i64;
            assert_eq!(level_from_experience(xp, table).unwrap(), level);
        }
    }

    #[test]
    fn test_one_below_threshold() {
        let table = LevelingTable::standard();

        for level in 2..=100 {
            let xp = table.threshold(level).unwrap() as i64 - 1;
            assert_eq!(
                level_from_experience(xp, table).unwrap(),
                level - 1,
                "xp {} should still be level {}",
                xp,
                level - 1
            );
        }
    }

    #[test]
    fn test_clamps_above_max_level() {
        let table = LevelingTable::standard();
        let top = table.threshold(100).unwrap() as i64;

        assert_eq!(level_from_experience(top + 1, table).unwrap(), 100);
        assert_eq!(level_from_experience(i64::MAX, table).unwrap(), 100);
    }

    #[test]
    fn test_negative_experience_fails_fast() {
        let table = LevelingTable::standard();
        assert_eq!(
            level_from_experience(-1, table),
            Err(LevelingError::NegativeExperience(-1))
        );
    }

    #[test]
    fn test_below_first_threshold_is_level_zero() {
        let table = LevelingTable::from_thresholds(vec![100, 200, 300]).unwrap();
        assert_eq!(table.level_for(99), 0);
        assert_eq!(table.level_for(100), 1);
        assert_eq!(table.level_for(250), 2);
    }

    #[test]
    fn test_plateau_is_accepted() {
        let table = LevelingTable::from_thresholds(vec![0, 50, 50, 90]).unwrap();
        assert_eq!(table.level_for(50), 3);
        assert_eq!(table.level_for(49), 1);
    }

    #[test]
    fn test_non_monotonic_table_rejected() {
        let result = LevelingTable::from_thresholds(vec![0, 100, 90]);
        assert_eq!(
            result,
            Err(LevelingError::NonMonotonic {
                level: 2,
                previous: 100,
                next: 90
            })
        );
    }

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(LevelingTable::build(0), Err(LevelingError::EmptyTable));
        assert_eq!(
            LevelingTable::from_thresholds(Vec::new()),
            Err(LevelingError::EmptyTable)
        );
    }

    #[test]
    fn test_small_table_clamps_to_its_own_max() {
        let table = LevelingTable::build(10).unwrap();
        let beyond = threshold_for_level(50).unwrap() as i64;
        assert_eq!(level_from_experience(beyond, &table).unwrap(), 10);
    }
}
