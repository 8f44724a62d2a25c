//! Stat slot layout.
//!
//! Every per-entity numeric vector shares one index space:
//!
//! ```text
//! [ core stats | dmg0 min, dmg0 max, dmg1 min, ... | resist0, resist1, ... ]
//! ```
//!
//! The layout is built once per session from the content configuration and
//! shared by reference; every [`StatVec`] it allocates has the same length.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use vigil_common::LayoutError;

// ============================================================================
// Core Stats
// ============================================================================

/// Fixed stats present regardless of content configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreStat {
    /// Maximum health.
    HpMax,
    /// Health regenerated per minute.
    HpRegen,
    /// Maximum mana.
    MpMax,
    /// Mana regenerated per minute.
    MpRegen,
    /// Hit chance.
    Accuracy,
    /// Dodge chance.
    Avoidance,
    /// Minimum damage absorbed.
    AbsorbMin,
    /// Maximum damage absorbed.
    AbsorbMax,
    /// Critical hit chance.
    Crit,
    /// Bonus experience percent.
    XpGain,
    /// Bonus currency percent.
    CurrencyFind,
    /// Bonus item drop percent.
    ItemFind,
    /// Stealth percent.
    Stealth,
    /// Resistance to being interrupted.
    Poise,
    /// Chance to reflect missiles.
    ReflectChance,
    /// Percent of melee damage returned.
    ReturnDamage,
    /// Percent of damage stolen as health.
    HpSteal,
    /// Percent of damage stolen as mana.
    MpSteal,
}

impl CoreStat {
    /// Number of core stats.
    pub const COUNT: usize = 18;

    /// All core stats in slot order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::HpMax,
        Self::HpRegen,
        Self::MpMax,
        Self::MpRegen,
        Self::Accuracy,
        Self::Avoidance,
        Self::AbsorbMin,
        Self::AbsorbMax,
        Self::Crit,
        Self::XpGain,
        Self::CurrencyFind,
        Self::ItemFind,
        Self::Stealth,
        Self::Poise,
        Self::ReflectChance,
        Self::ReturnDamage,
        Self::HpSteal,
        Self::MpSteal,
    ];

    /// Authoring key for this stat.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::HpMax => "hp",
            Self::HpRegen => "hp_regen",
            Self::MpMax => "mp",
            Self::MpRegen => "mp_regen",
            Self::Accuracy => "accuracy",
            Self::Avoidance => "avoidance",
            Self::AbsorbMin => "absorb_min",
            Self::AbsorbMax => "absorb_max",
            Self::Crit => "crit",
            Self::XpGain => "xp_gain",
            Self::CurrencyFind => "currency_find",
            Self::ItemFind => "item_find",
            Self::Stealth => "stealth",
            Self::Poise => "poise",
            Self::ReflectChance => "reflect_chance",
            Self::ReturnDamage => "return_damage",
            Self::HpSteal => "hp_steal",
            Self::MpSteal => "mp_steal",
        }
    }

    /// Slot offset.
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }
}

// ============================================================================
// Content configuration
// ============================================================================

/// A damage type contributing a min and a max slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTypeDef {
    /// Identifier.
    pub id: String,
    /// Display name key.
    pub name: String,
    /// Key of the minimum slot (e.g. `dmg_melee_min`).
    pub min: String,
    /// Key of the maximum slot.
    pub max: String,
}

/// An element contributing one resistance slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDef {
    /// Identifier.
    pub id: String,
    /// Display name key.
    pub name: String,
    /// Key of the resistance slot (e.g. `fire_resist`).
    pub resist_id: String,
}

/// A player-allocatable primary stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryStatDef {
    /// Identifier.
    pub id: String,
    /// Display name key.
    pub name: String,
}

/// Content configuration the layout is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLayoutConfig {
    /// Damage types, in slot order.
    pub damage_types: Vec<DamageTypeDef>,
    /// Elements, in slot order.
    pub elements: Vec<ElementDef>,
    /// Primary stats, in allocation order.
    pub primary_stats: Vec<PrimaryStatDef>,
}

// ============================================================================
// Layout
// ============================================================================

/// Session-wide mapping between stat names and slot offsets.
#[derive(Debug, Clone)]
pub struct StatLayout {
    config: StatLayoutConfig,
    slot_count: usize,
    keys: Vec<String>,
    by_key: AHashMap<String, usize>,
    damage_by_id: AHashMap<String, usize>,
    element_by_id: AHashMap<String, usize>,
    primary_by_id: AHashMap<String, usize>,
}

impl StatLayout {
    /// Builds the layout.
    ///
    /// Duplicate or empty slot keys make the content unusable and are
    /// reported as structural errors.
    pub fn new(config: StatLayoutConfig) -> Result<Self, LayoutError> {
        let mut keys: Vec<String> = CoreStat::ALL.iter().map(|s| s.key().to_string()).collect();
        for dt in &config.damage_types {
            if dt.min.is_empty() || dt.max.is_empty() {
                return Err(LayoutError::EmptyKey(format!("damage type '{}'", dt.id)));
            }
            keys.push(dt.min.clone());
            keys.push(dt.max.clone());
        }
        for element in &config.elements {
            if element.resist_id.is_empty() {
                return Err(LayoutError::EmptyKey(format!("element '{}'", element.id)));
            }
            keys.push(element.resist_id.clone());
        }

        let mut by_key = AHashMap::with_capacity(keys.len());
        for (slot, key) in keys.iter().enumerate() {
            if by_key.insert(key.clone(), slot).is_some() {
                return Err(LayoutError::DuplicateKey(key.clone()));
            }
        }

        let damage_by_id = config
            .damage_types
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        let element_by_id = config
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        let mut primary_by_id = AHashMap::new();
        for (i, p) in config.primary_stats.iter().enumerate() {
            if p.id.is_empty() {
                return Err(LayoutError::EmptyKey(format!("primary stat {i}")));
            }
            if primary_by_id.insert(p.id.clone(), i).is_some() {
                return Err(LayoutError::DuplicateKey(p.id.clone()));
            }
        }

        Ok(Self {
            slot_count: keys.len(),
            config,
            keys,
            by_key,
            damage_by_id,
            element_by_id,
            primary_by_id,
        })
    }

    /// Total number of slots: core + 2 × damage types + elements.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of damage types.
    #[must_use]
    pub fn damage_type_count(&self) -> usize {
        self.config.damage_types.len()
    }

    /// Number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.config.elements.len()
    }

    /// Number of primary stats.
    #[must_use]
    pub fn primary_count(&self) -> usize {
        self.config.primary_stats.len()
    }

    /// The configuration this layout was built from.
    #[must_use]
    pub fn config(&self) -> &StatLayoutConfig {
        &self.config
    }

    /// Slot for a stat key (core, damage min/max, or resistance).
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    /// Key of a slot.
    #[must_use]
    pub fn key(&self, slot: usize) -> Option<&str> {
        self.keys.get(slot).map(String::as_str)
    }

    /// Index of a damage type by ID.
    #[must_use]
    pub fn damage_type_index(&self, id: &str) -> Option<usize> {
        self.damage_by_id.get(id).copied()
    }

    /// Index of an element by ID.
    #[must_use]
    pub fn element_index(&self, id: &str) -> Option<usize> {
        self.element_by_id.get(id).copied()
    }

    /// Index of a primary stat by ID.
    #[must_use]
    pub fn primary_index(&self, id: &str) -> Option<usize> {
        self.primary_by_id.get(id).copied()
    }

    /// ID of a primary stat by index.
    #[must_use]
    pub fn primary_id(&self, index: usize) -> Option<&str> {
        self.config.primary_stats.get(index).map(|p| p.id.as_str())
    }

    /// Minimum slot of a damage type.
    #[must_use]
    pub const fn damage_min_slot(damage_type: usize) -> usize {
        CoreStat::COUNT + damage_type * 2
    }

    /// Maximum slot of a damage type.
    #[must_use]
    pub const fn damage_max_slot(damage_type: usize) -> usize {
        CoreStat::COUNT + damage_type * 2 + 1
    }

    /// Resistance slot of an element.
    #[must_use]
    pub fn resist_slot(&self, element: usize) -> usize {
        CoreStat::COUNT + self.damage_type_count() * 2 + element
    }

    /// Allocates a zeroed vector of this layout's length.
    #[must_use]
    pub fn zeroed(&self) -> StatVec {
        StatVec::filled(self.slot_count, 0.0)
    }
}

// ============================================================================
// StatVec
// ============================================================================

/// One value per stat slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatVec(Vec<f32>);

impl StatVec {
    /// Creates a vector with every slot set to `value`.
    #[must_use]
    pub fn filled(len: usize, value: f32) -> Self {
        Self(vec![value; len])
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value at a slot, or 0 when out of range.
    #[must_use]
    pub fn get(&self, slot: usize) -> f32 {
        self.0.get(slot).copied().unwrap_or(0.0)
    }

    /// Sets a slot; out-of-range writes are ignored.
    pub fn set(&mut self, slot: usize, value: f32) {
        if let Some(v) = self.0.get_mut(slot) {
            *v = value;
        }
    }

    /// Resets every slot to `value`.
    pub fn fill(&mut self, value: f32) {
        self.0.fill(value);
    }

    /// Iterates slot values in order.
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.0.iter()
    }

    /// Raw slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Index<usize> for StatVec {
    type Output = f32;

    fn index(&self, slot: usize) -> &f32 {
        &self.0[slot]
    }
}

impl IndexMut<usize> for StatVec {
    fn index_mut(&mut self, slot: usize) -> &mut f32 {
        &mut self.0[slot]
    }
}

impl Index<CoreStat> for StatVec {
    type Output = f32;

    fn index(&self, stat: CoreStat) -> &f32 {
        &self.0[stat.slot()]
    }
}

impl IndexMut<CoreStat> for StatVec {
    fn index_mut(&mut self, stat: CoreStat) -> &mut f32 {
        &mut self.0[stat.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StatLayoutConfig {
        StatLayoutConfig {
            damage_types: vec![
                DamageTypeDef {
                    id: "melee".into(),
                    name: "Melee".into(),
                    min: "dmg_melee_min".into(),
                    max: "dmg_melee_max".into(),
                },
                DamageTypeDef {
                    id: "ment".into(),
                    name: "Mental".into(),
                    min: "dmg_ment_min".into(),
                    max: "dmg_ment_max".into(),
                },
            ],
            elements: vec![ElementDef {
                id: "fire".into(),
                name: "Fire".into(),
                resist_id: "fire_resist".into(),
            }],
            primary_stats: vec![PrimaryStatDef {
                id: "physical".into(),
                name: "Physical".into(),
            }],
        }
    }

    #[test]
    fn test_slot_count() {
        let layout = StatLayout::new(config()).expect("layout");
        assert_eq!(layout.slot_count(), CoreStat::COUNT + 2 * 2 + 1);
        assert_eq!(layout.zeroed().len(), layout.slot_count());
    }

    #[test]
    fn test_index_lookup() {
        let layout = StatLayout::new(config()).expect("layout");
        assert_eq!(layout.index_of("hp"), Some(CoreStat::HpMax.slot()));
        assert_eq!(layout.index_of("mp_steal"), Some(CoreStat::MpSteal.slot()));
        assert_eq!(layout.index_of("dmg_melee_min"), Some(StatLayout::damage_min_slot(0)));
        assert_eq!(layout.index_of("dmg_ment_max"), Some(StatLayout::damage_max_slot(1)));
        assert_eq!(layout.index_of("fire_resist"), Some(layout.resist_slot(0)));
        assert_eq!(layout.index_of("nonsense"), None);
        assert_eq!(layout.primary_index("physical"), Some(0));
        assert_eq!(layout.primary_index("mental"), None);
        assert_eq!(layout.element_index("fire"), Some(0));
        assert_eq!(layout.damage_type_index("ment"), Some(1));
    }

    #[test]
    fn test_duplicate_key_is_fatal() {
        let mut cfg = config();
        cfg.elements[0].resist_id = "hp".into();
        assert_eq!(
            StatLayout::new(cfg).err(),
            Some(LayoutError::DuplicateKey("hp".into()))
        );
    }

    #[test]
    fn test_empty_key_is_fatal() {
        let mut cfg = config();
        cfg.damage_types[1].max = String::new();
        assert!(matches!(StatLayout::new(cfg), Err(LayoutError::EmptyKey(_))));
    }

    #[test]
    fn test_core_keys_roundtrip() {
        let layout = StatLayout::new(StatLayoutConfig::default()).expect("layout");
        for stat in CoreStat::ALL {
            assert_eq!(layout.index_of(stat.key()), Some(stat.slot()));
            assert_eq!(layout.key(stat.slot()), Some(stat.key()));
        }
    }

    #[test]
    fn test_stat_vec_out_of_range() {
        let mut v = StatVec::filled(3, 1.0);
        v.set(10, 5.0);
        assert_eq!(v.get(10), 0.0);
        assert_eq!(v.iter().sum::<f32>(), 3.0);
    }
}
