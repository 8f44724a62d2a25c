//! Collaborator interfaces.
//!
//! Stat blocks never reach for global state; everything outside the stat
//! core (campaign statuses, loot, collision, localization, power definitions)
//! is injected per call through a [`CombatContext`].

use crate::events::CombatEventBus;
use crate::layout::StatLayout;
use crate::power::PowerLookup;
use crate::settings::CombatSettings;
use crate::template::HeroConfig;
use crate::xp::{XpScaling, XpTable};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use vigil_common::{EntityHandle, ItemId, Position, StatusId};

// ============================================================================
// Campaign
// ============================================================================

/// Story status tracking and XP rewards.
pub trait CampaignTracker {
    /// Registers a status name and returns its ID.
    fn register_status(&mut self, name: &str) -> StatusId;
    /// True if a status is set.
    fn check_status(&self, id: StatusId) -> bool;
    /// Sets a status.
    fn set_status(&mut self, id: StatusId);
    /// Grants XP to the player.
    fn reward_xp(&mut self, amount: f32, show_message: bool);
}

// ============================================================================
// Loot
// ============================================================================

/// One possible drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    /// Item dropped.
    pub item: ItemId,
    /// Drop chance in percent.
    pub chance: f32,
    /// Minimum quantity.
    pub count_min: u32,
    /// Maximum quantity.
    pub count_max: u32,
}

/// Everything the loot subsystem needs to generate a defeated entity's drops.
#[derive(Debug, Clone, Copy)]
pub struct LootRequest<'a> {
    /// Entity defeated.
    pub entity: Option<EntityHandle>,
    /// Where it fell.
    pub pos: Position,
    /// Level of the defeated entity.
    pub level: u32,
    /// Possible drops.
    pub table: &'a [LootEntry],
    /// Number of rolls (min, max).
    pub count: (u32, u32),
    /// Guaranteed quest drop, if any.
    pub quest_loot: ItemId,
}

/// Loot generation.
pub trait LootService {
    /// Generates drops for a defeated entity.
    fn add_enemy_loot(&mut self, request: &LootRequest<'_>);
    /// Parses one authored loot line.
    fn parse_loot(&mut self, line: &str) -> Option<LootEntry>;
    /// Forgets an entity that still has drops pending.
    fn remove_from_enemies_dropping_loot(&mut self, entity: EntityHandle);
}

// ============================================================================
// Collision
// ============================================================================

/// How an entity moves through the collision map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementType {
    /// Blocked by walls and water.
    #[default]
    Normal,
    /// Crosses water and pits.
    Flying,
    /// Passes through everything.
    Intangible,
}

/// Which entities an entity collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollideType {
    /// Non-hero collision.
    #[default]
    Normal,
    /// Hero collision.
    Hero,
}

impl CollideType {
    /// Collision class for an entity.
    #[must_use]
    pub const fn for_entity(hero: bool) -> Self {
        if hero {
            Self::Hero
        } else {
            Self::Normal
        }
    }
}

/// Minimal collision surface used for knockback and charge movement.
pub trait CollisionMap {
    /// Marks a tile as occupied.
    fn block(&mut self, pos: Position, ally: bool);
    /// Frees an occupied tile.
    fn unblock(&mut self, pos: Position);
    /// Attempts a displacement, updating `pos` as far as allowed.
    fn move_entity(
        &mut self,
        pos: &mut Position,
        delta: Vec2,
        movement: MovementType,
        collide: CollideType,
    ) -> bool;
}

// ============================================================================
// Messages
// ============================================================================

/// Localized display strings.
pub trait MessageLookup {
    /// Resolves a message key.
    fn get(&self, key: &str) -> String;
    /// Resolves a message key and fills `{}` placeholders in order.
    fn format(&self, key: &str, args: &[&str]) -> String;
}

// ============================================================================
// Context
// ============================================================================

/// What other entities need to know about the hero this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeroSnapshot {
    /// Hero level.
    pub level: u32,
    /// Hero alive.
    pub alive: bool,
}

impl Default for HeroSnapshot {
    fn default() -> Self {
        Self {
            level: 1,
            alive: true,
        }
    }
}

/// Services and session data passed into every stat block operation.
pub struct CombatContext<'a> {
    /// Session settings.
    pub settings: &'a CombatSettings,
    /// Stat slot layout.
    pub layout: &'a StatLayout,
    /// Power definitions.
    pub powers: &'a dyn PowerLookup,
    /// Campaign statuses and XP rewards.
    pub campaign: &'a mut dyn CampaignTracker,
    /// Loot generation.
    pub loot: &'a mut dyn LootService,
    /// Collision map.
    pub collision: &'a mut dyn CollisionMap,
    /// Display strings.
    pub messages: &'a dyn MessageLookup,
    /// Kill-reward scaling.
    pub xp_scaling: &'a dyn XpScaling,
    /// Level thresholds.
    pub xp_table: &'a XpTable,
    /// Hero stat configuration, applied once per hero.
    pub hero_config: Option<&'a HeroConfig>,
    /// Event sink.
    pub events: &'a CombatEventBus,
    /// Hero state this frame.
    pub hero: HeroSnapshot,
}
