//! Experience thresholds and kill-reward scaling.

use serde::{Deserialize, Serialize};

/// Cumulative XP required to reach each level.
///
/// `thresholds[0]` is level 1 and should be zero. Thresholds are expected to
/// be non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XpTable {
    /// XP needed for level `i + 1`.
    pub thresholds: Vec<u64>,
}

impl XpTable {
    /// Creates a table from thresholds.
    #[must_use]
    pub fn new(thresholds: Vec<u64>) -> Self {
        Self { thresholds }
    }

    /// Highest level in the table (at least 1).
    #[must_use]
    pub fn max_level(&self) -> u32 {
        (self.thresholds.len() as u32).max(1)
    }

    /// XP needed to reach a level; 0 for levels below 1 or an empty table.
    #[must_use]
    pub fn level_xp(&self, level: u32) -> u64 {
        if level == 0 {
            return 0;
        }
        let i = (level as usize - 1).min(self.thresholds.len().saturating_sub(1));
        self.thresholds.get(i).copied().unwrap_or(0)
    }

    /// Level reached with an XP total.
    #[must_use]
    pub fn level_from_xp(&self, xp: u64) -> u32 {
        let reached = self.thresholds.iter().take_while(|t| **t <= xp).count() as u32;
        reached.max(1)
    }
}

/// Supplies the kill-reward multiplier for an enemy/hero level pair.
pub trait XpScaling {
    /// Multiplier (1.0 = unscaled).
    fn multiplier(&self, table: Option<usize>, enemy_level: u32, hero_level: u32) -> f32;
}

/// Per-table mapping from level difference (enemy − hero) to percent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XpScalingTable {
    tables: Vec<Vec<(i32, f32)>>,
}

impl XpScalingTable {
    /// Creates an empty set of tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table of `(level difference, percent)` pairs and returns its ID.
    pub fn add_table(&mut self, mut entries: Vec<(i32, f32)>) -> usize {
        entries.sort_by_key(|(diff, _)| *diff);
        self.tables.push(entries);
        self.tables.len() - 1
    }

    /// Exact difference if listed, the nearest end outside the listed range,
    /// otherwise the greatest listed difference below it.
    fn lookup(&self, table: usize, diff: i32) -> Option<f32> {
        let entries = self.tables.get(table)?;
        let (first, last) = (entries.first()?, entries.last()?);
        if diff <= first.0 {
            return Some(first.1);
        }
        if diff >= last.0 {
            return Some(last.1);
        }
        entries
            .iter()
            .rev()
            .find(|(d, _)| *d <= diff)
            .map(|(_, pct)| *pct)
    }
}

impl XpScaling for XpScalingTable {
    fn multiplier(&self, table: Option<usize>, enemy_level: u32, hero_level: u32) -> f32 {
        let Some(table) = table else {
            return 1.0;
        };
        let diff = enemy_level as i32 - hero_level as i32;
        self.lookup(table, diff).map_or(1.0, |pct| pct / 100.0)
    }
}
