//! Power definitions as seen by the stat core.
//!
//! The power subsystem itself lives elsewhere; this module holds the subset
//! of a power's static definition that stat blocks read, the [`PowerLookup`]
//! seam through which they read it, and the closed enumerations (AI trigger,
//! combat style, damage source) that content names resolve to at load time.

use crate::effects::{Effect, EffectKind, EffectSource};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use vigil_common::{ContentError, PowerId};

// ============================================================================
// Source Type
// ============================================================================

/// Who is responsible for a power, effect, or hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceType {
    /// The player character.
    Hero,
    /// Environment or self-inflicted.
    #[default]
    Neutral,
    /// A hostile entity.
    Enemy,
    /// A friendly non-player entity.
    Ally,
}

// ============================================================================
// Power Definition
// ============================================================================

/// Broad power category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerKind {
    /// Instant effect at a target location.
    #[default]
    Fixed,
    /// Projectile.
    Missile,
    /// Repeating chain of hazards.
    Repeater,
    /// Creates a summoned entity.
    Spawn,
    /// Changes the caster into another creature.
    Transform,
    /// Defensive stance.
    Block,
}

/// How many summons a spawn power may keep alive at once.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SpawnLimit {
    /// No cap.
    #[default]
    Unlimited,
    /// A fixed cap.
    Fixed {
        /// Maximum live summons.
        count: u32,
    },
    /// `count` summons for every `ratio` points of a primary stat.
    Stat {
        /// Summons granted per `ratio` points.
        count: f32,
        /// Primary points per `count` summons.
        ratio: f32,
        /// Primary stat index.
        primary: usize,
    },
}

/// One effect a power applies to its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerEffect {
    /// What the effect does.
    pub kind: EffectKind,
    /// Magnitude, meaning depends on kind.
    pub magnitude: f32,
    /// Duration in frames; `None` lasts until removed.
    pub duration: Option<u32>,
    /// Frames between periodic firings.
    #[serde(default = "default_interval")]
    pub interval: u32,
}

fn default_interval() -> u32 {
    1
}

impl PowerEffect {
    /// Creates the live effect for a target.
    #[must_use]
    pub fn instantiate(&self, source: EffectSource) -> Effect {
        Effect::new(self.kind, self.magnitude, self.duration)
            .with_interval(self.interval)
            .with_source(source)
    }
}

/// The parts of a power definition stat blocks consult.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerDef {
    /// Identifier.
    pub id: PowerId,
    /// Display name.
    pub name: String,
    /// Category.
    pub kind: PowerKind,
    /// Mana cost.
    pub requires_mp: f32,
    /// Health cost; the caster must have strictly more unless sacrificing.
    pub requires_hp: f32,
    /// Allows paying the health cost down to zero.
    pub sacrifice: bool,
    /// Always-on power.
    pub passive: bool,
    /// Only usable as a replacement for another power.
    pub meta_power: bool,
    /// Live summons required to cast.
    pub requires_spawns: u32,
    /// Summon cap for spawn powers.
    pub spawn_limit: SpawnLimit,
    /// Reverts a transformation.
    pub untransform: bool,
    /// Equipment flags the caster must carry.
    pub requires_flags: Vec<String>,
    /// Also applies to party members.
    pub buff_party: bool,
    /// Restricts party buffs to summons of this power.
    pub buff_party_power: PowerId,
    /// Power triggered after a passive power activates.
    pub post_power: PowerId,
    /// Cooldown in frames.
    pub cooldown: u32,
    /// Effects applied to the target.
    pub effects: Vec<PowerEffect>,
}

impl PowerDef {
    /// Creates an empty definition.
    #[must_use]
    pub fn new(id: PowerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_kind(mut self, kind: PowerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the summon cap.
    #[must_use]
    pub fn with_spawn_limit(mut self, limit: SpawnLimit) -> Self {
        self.spawn_limit = limit;
        self
    }

    /// Sets the required live summon count.
    #[must_use]
    pub fn with_required_spawns(mut self, count: u32) -> Self {
        self.requires_spawns = count;
        self
    }

    /// Sets mana and health costs.
    #[must_use]
    pub fn with_costs(mut self, mp: f32, hp: f32) -> Self {
        self.requires_mp = mp;
        self.requires_hp = hp;
        self
    }

    /// Adds an effect.
    #[must_use]
    pub fn with_effect(mut self, effect: PowerEffect) -> Self {
        self.effects.push(effect);
        self
    }

    /// True for powers that create summons.
    #[must_use]
    pub fn is_spawn(&self) -> bool {
        self.kind == PowerKind::Spawn
    }
}

/// Resolves power IDs to definitions.
pub trait PowerLookup {
    /// Definition for an ID, if known.
    fn power(&self, id: PowerId) -> Option<&PowerDef>;
}

/// In-memory power table.
#[derive(Debug, Default)]
pub struct PowerTable {
    powers: AHashMap<PowerId, PowerDef>,
}

impl PowerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a definition.
    pub fn insert(&mut self, def: PowerDef) {
        self.powers.insert(def.id, def);
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }
}

impl PowerLookup for PowerTable {
    fn power(&self, id: PowerId) -> Option<&PowerDef> {
        self.powers.get(&id)
    }
}

// ============================================================================
// AI Triggers
// ============================================================================

/// Situation in which an entity may autonomously use a power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiTrigger {
    /// Target within melee range.
    Melee,
    /// Target within ranged distance.
    Ranged,
    /// Summoning allies toward a beacon.
    Beacon,
    /// After being hit.
    OnHit,
    /// On death.
    OnDeath,
    /// On first dropping below half health.
    OnHalfDead,
    /// On entering combat.
    OnJoinCombat,
    /// While affected by a debuff.
    OnDebuff,
    /// Follow-up of a passive power.
    PassivePost,
}

impl FromStr for AiTrigger {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "melee" => Self::Melee,
            "ranged" => Self::Ranged,
            "beacon" => Self::Beacon,
            "on_hit" => Self::OnHit,
            "on_death" => Self::OnDeath,
            "on_half_dead" => Self::OnHalfDead,
            "on_join_combat" => Self::OnJoinCombat,
            "on_debuff" => Self::OnDebuff,
            "passive_post" => Self::PassivePost,
            other => return Err(ContentError::UnknownTrigger(other.to_string())),
        })
    }
}

/// How an entity engages the hero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombatStyle {
    /// Fights when the hero comes near.
    #[default]
    Default,
    /// Always in combat.
    Aggressive,
    /// Only fights when attacked.
    Passive,
}

impl FromStr for CombatStyle {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "default" => Self::Default,
            "aggressive" => Self::Aggressive,
            "passive" => Self::Passive,
            other => return Err(ContentError::UnknownCombatStyle(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_parse() {
        assert_eq!("on_half_dead".parse::<AiTrigger>(), Ok(AiTrigger::OnHalfDead));
        assert_eq!(
            "sometimes".parse::<AiTrigger>(),
            Err(ContentError::UnknownTrigger("sometimes".into()))
        );
    }

    #[test]
    fn test_combat_style_parse() {
        assert_eq!("passive".parse::<CombatStyle>(), Ok(CombatStyle::Passive));
        assert!("grumpy".parse::<CombatStyle>().is_err());
    }

    #[test]
    fn test_power_table_lookup() {
        let mut table = PowerTable::new();
        table.insert(PowerDef::new(PowerId::new(4), "Raise Dead").with_kind(PowerKind::Spawn));
        let def = table.power(PowerId::new(4)).expect("power");
        assert!(def.is_spawn());
        assert!(table.power(PowerId::new(5)).is_none());
    }
}
