//! Save snapshots.
//!
//! A flat set of named scalars: `level`, `xp`, `hp`, `mp`, allocated primary
//! stats as `primary.<id>` and starting values as `stat.<key>`.

use crate::block::StatBlock;
use crate::layout::{CoreStat, StatLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use vigil_common::ContentError;

const PRIMARY_PREFIX: &str = "primary.";
const STAT_PREFIX: &str = "stat.";

/// Named scalar values captured from a stat block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatSnapshot(BTreeMap<String, f32>);

impl StatSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the persistent state of a block.
    #[must_use]
    pub fn capture(block: &StatBlock, layout: &StatLayout) -> Self {
        let mut values = BTreeMap::new();
        values.insert("level".to_string(), block.level as f32);
        values.insert("xp".to_string(), block.xp as f32);
        values.insert("hp".to_string(), block.hp);
        values.insert("mp".to_string(), block.mp);

        for i in 0..layout.primary_count() {
            if let Some(id) = layout.primary_id(i) {
                values.insert(format!("{PRIMARY_PREFIX}{id}"), block.primary_allocated(i) as f32);
            }
        }
        for slot in 0..layout.slot_count() {
            if let Some(key) = layout.key(slot) {
                values.insert(format!("{STAT_PREFIX}{key}"), block.starting()[slot]);
            }
        }
        Self(values)
    }

    /// Value for a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f32> {
        self.0.get(name).copied()
    }

    /// Sets a value.
    pub fn insert(&mut self, name: impl Into<String>, value: f32) {
        self.0.insert(name.into(), value);
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Restores a block from this snapshot.
    ///
    /// Health and mana are restored last, after stats are recomputed, and are
    /// clamped to the new maxima. Unknown names are skipped and returned.
    pub fn apply(&self, block: &mut StatBlock, layout: &StatLayout) -> Vec<ContentError> {
        let mut errors = Vec::new();
        let (mut hp, mut mp) = (None, None);

        for (name, &value) in &self.0 {
            match name.as_str() {
                "level" => block.level = (value.max(1.0)) as u32,
                "xp" => block.xp = value.max(0.0) as u64,
                "hp" => hp = Some(value),
                "mp" => mp = Some(value),
                other => {
                    if let Some(id) = other.strip_prefix(PRIMARY_PREFIX) {
                        match layout.primary_index(id) {
                            Some(i) => block.set_primary(i, value as i32),
                            None => errors.push(ContentError::UnknownPrimaryStat(id.to_string())),
                        }
                    } else if let Some(key) = other.strip_prefix(STAT_PREFIX) {
                        match layout.index_of(key) {
                            Some(slot) => block.set_starting(slot, value),
                            None => errors.push(ContentError::UnknownStat(key.to_string())),
                        }
                    } else {
                        errors.push(ContentError::UnknownStat(other.to_string()));
                    }
                },
            }
        }

        block.apply_effects();
        if let Some(hp) = hp {
            block.hp = hp.clamp(0.0, block.get(CoreStat::HpMax));
        }
        if let Some(mp) = mp {
            block.mp = mp.clamp(0.0, block.get(CoreStat::MpMax));
        }

        for error in &errors {
            warn!("Save snapshot for '{}': {error}", block.name);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::layout_with_damage;

    #[test]
    fn test_capture_restores_into_fresh_block() {
        let layout = layout_with_damage();
        let mut block = StatBlock::new(&layout);
        block.set_starting(CoreStat::HpMax.slot(), 40.0);
        block.set_starting(StatLayout::damage_max_slot(0), 6.0);
        block.set_primary(1, 5);
        block.level = 4;
        block.xp = 350;
        block.apply_effects();
        block.hp = 25.0;

        let snapshot = StatSnapshot::capture(&block, &layout);
        assert_eq!(snapshot.get("level"), Some(4.0));
        assert_eq!(snapshot.get("stat.hp"), Some(40.0));
        assert_eq!(snapshot.len(), 4 + layout.primary_count() + layout.slot_count());

        let mut restored = StatBlock::new(&layout);
        assert!(snapshot.apply(&mut restored, &layout).is_empty());
        assert_eq!(restored.level, 4);
        assert_eq!(restored.xp, 350);
        assert_eq!(restored.primary_allocated(1), 5);
        assert_eq!(restored.current(), block.current());
        assert!((restored.hp - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let layout = layout_with_damage();
        let mut block = StatBlock::new(&layout);
        let mut snapshot = StatSnapshot::new();
        snapshot.insert("stat.luck", 3.0);
        snapshot.insert("primary.charisma", 3.0);
        snapshot.insert("gold", 100.0);
        snapshot.insert("hp", 500.0);

        let errors = snapshot.apply(&mut block, &layout);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ContentError::UnknownStat("luck".into())));
        assert!(errors.contains(&ContentError::UnknownPrimaryStat("charisma".into())));
        assert!((block.hp - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_snapshot_is_flat_toml() {
        let mut snapshot = StatSnapshot::new();
        snapshot.insert("level", 3.0);
        snapshot.insert("stat.hp", 12.5);
        let text = toml::to_string(&snapshot).expect("serialize");
        assert!(text.contains("level = 3"));
        let back: StatSnapshot = toml::from_str(&text).expect("parse");
        assert_eq!(back.get("stat.hp"), Some(12.5));
    }
}
