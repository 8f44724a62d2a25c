//! Per-entity stat block.
//!
//! This module provides:
//! - The [`StatBlock`] record (identity, stat vectors, resources, lifecycle,
//!   AI and loot data, summon links)
//! - The recompute pipeline (`calc_base`, `apply_effects`, `recalc`)
//! - The per-frame `logic` step
//!
//! Damage resolution lives in [`crate::combat`]; summon graph maintenance
//! lives in [`crate::arena`].

use crate::ai::AiPower;
use crate::effects::{EffectKind, EffectSet};
use crate::events::CombatEvent;
use crate::layout::{CoreStat, StatLayout, StatVec};
use crate::power::{CombatStyle, SourceType};
use crate::services::{CollideType, CombatContext, LootEntry, MessageLookup, MovementType};
use crate::timer::{Timer, TimerReset};
use crate::xp::XpTable;
use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::f32::consts::FRAC_1_SQRT_2;
use tracing::{debug, trace, warn};
use vigil_common::{ContentError, EntityHandle, ItemId, PowerId, Position, StatusId, TileRect};

/// X step per facing direction.
pub const DIRECTION_DELTA_X: [f32; 8] = [-1.0, -1.0, -1.0, 0.0, 1.0, 1.0, 1.0, 0.0];
/// Y step per facing direction.
pub const DIRECTION_DELTA_Y: [f32; 8] = [1.0, 0.0, -1.0, -1.0, -1.0, 0.0, 1.0, 1.0];
/// Speed scale per facing direction (diagonals are normalized).
pub const SPEED_MULTIPLIER: [f32; 8] = [
    FRAC_1_SQRT_2,
    1.0,
    FRAC_1_SQRT_2,
    1.0,
    FRAC_1_SQRT_2,
    1.0,
    FRAC_1_SQRT_2,
    1.0,
];

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Idle.
    #[default]
    Stance,
    /// Walking.
    Move,
    /// Using a power.
    Attack,
    /// Flinching after a hit.
    Hit,
    /// Dead.
    Dead,
    /// Dead from a critical hit.
    CritDead,
}

impl EntityState {
    /// True for both death states.
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Dead | Self::CritDead)
    }
}

/// Flat min/max pair contributed by equipment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageRange {
    /// Minimum.
    pub min: f32,
    /// Maximum.
    pub max: f32,
}

/// What a frame of [`StatBlock::logic`] asks the owner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// Health reached zero since the last frame.
    pub death_triggered: bool,
    /// Health is zero; owned summons must be force-killed.
    pub cascade_summons: bool,
    /// Effective primary stats changed.
    pub stats_changed: bool,
}

// ============================================================================
// StatBlock
// ============================================================================

/// Everything the simulation tracks numerically about one entity.
#[derive(Debug, Clone)]
pub struct StatBlock {
    // === Identity ===
    /// Display name.
    pub name: String,
    /// Class message key.
    pub character_class: String,
    /// Subclass message key.
    pub character_subclass: String,
    /// Player-controlled.
    pub hero: bool,
    /// Fights for the hero.
    pub hero_ally: bool,
    /// Fights for an enemy summoner.
    pub enemy_ally: bool,
    /// Non-combatant.
    pub npc: bool,
    /// Uses humanoid equipment.
    pub humanoid: bool,
    /// Living creature.
    pub lifeform: bool,
    /// Disposition currently reversed by an effect.
    pub converted: bool,
    /// Arena handle, once stored.
    pub handle: Option<EntityHandle>,
    /// Content categories.
    pub categories: Vec<String>,
    /// Position in tiles.
    pub pos: Position,
    /// Facing, 0..8.
    pub direction: u8,

    // === Progression ===
    /// Level, at least 1 after recalc.
    pub level: u32,
    /// Total experience.
    pub xp: u64,
    /// Kill-reward scaling table.
    pub xp_scaling_table: Option<usize>,
    /// Stat points granted per level.
    pub stat_points_per_level: u32,
    /// Power points granted per level.
    pub power_points_per_level: u32,
    /// Stat points available over a full playthrough.
    pub max_spendable_stat_points: u32,
    /// Cap on any one primary stat.
    pub max_points_per_stat: u32,
    hero_stats_loaded: bool,

    // === Stat vectors ===
    starting: StatVec,
    base: StatVec,
    current: StatVec,
    per_level: StatVec,
    per_primary: Vec<StatVec>,
    primary: Vec<i32>,
    primary_starting: Vec<i32>,
    primary_additional: Vec<i32>,
    item_base_damage: Vec<DamageRange>,
    item_base_absorb: DamageRange,
    resist_offset: usize,

    // === Resources ===
    /// Live health.
    pub hp: f32,
    /// Live mana.
    pub mp: f32,
    prev_maxhp: f32,
    prev_maxmp: f32,
    prev_hp: f32,
    prev_mp: f32,

    /// Active effects.
    pub effects: EffectSet,

    // === Lifecycle ===
    /// Not yet dead (death is applied one frame after hp reaches zero).
    pub alive: bool,
    /// Lying as a corpse.
    pub corpse: bool,
    /// Lifecycle state.
    pub cur_state: EntityState,
    /// Time left in the current state.
    pub state_timer: Timer,
    /// Currently transformed.
    pub transformed: bool,
    /// Frames left in the transformation.
    pub transform_duration: u32,
    /// Engaged with the hero.
    pub in_combat: bool,
    /// Critical kills use the critical death state.
    pub critdie_enabled: bool,
    /// Primary stats changed since the UI last looked.
    pub refresh_stats: bool,
    pub(crate) defeat_resolved: bool,

    // === Movement ===
    /// Current speed.
    pub speed: f32,
    /// Unmodified speed.
    pub speed_default: f32,
    /// Speed of an active charge, 0 when not charging.
    pub charge_speed: f32,
    /// Where a knockback came from.
    pub knockback_srcpos: Position,
    /// Where a knockback pushes towards.
    pub knockback_destpos: Position,
    /// Movement class, refreshed every frame.
    pub movement_type: MovementType,
    /// Crosses water and pits.
    pub flying: bool,
    /// Passes through walls.
    pub intangible: bool,
    /// Turns to face targets.
    pub facing: bool,

    // === AI ===
    /// Distance at which the hero is noticed.
    pub threat_range: f32,
    /// Distance at which the hero is lost.
    pub threat_range_far: f32,
    /// Distance kept while fleeing.
    pub flee_range: f32,
    /// Engagement style.
    pub combat_style: CombatStyle,
    /// Percent chance to pursue.
    pub chance_pursue: u32,
    /// Percent chance to flee.
    pub chance_flee: u32,
    /// Melee reach in tiles.
    pub melee_range: f32,
    /// Autonomously usable powers.
    pub powers_ai: Vec<AiPower>,
    /// Always-on powers.
    pub powers_passive: Vec<PowerId>,
    /// Per-power cooldowns for the hero.
    pub power_cooldowns: AHashMap<PowerId, Timer>,
    /// Global cooldown.
    pub cooldown: Timer,
    /// Invulnerability after a hit.
    pub cooldown_hit: Timer,
    /// Patrol route.
    pub waypoints: VecDeque<Position>,
    /// Pause at each waypoint.
    pub waypoint_timer: Timer,
    /// Wandering bounds.
    pub wander_area: TileRect,
    /// Wanders inside `wander_area`.
    pub wandering: bool,
    /// Flee duration.
    pub flee_timer: Timer,
    /// Delay between flee attempts.
    pub flee_cooldown_timer: Timer,
    /// Delay before turning.
    pub turn_delay: Timer,
    /// Hide the health bar.
    pub suppress_hp: bool,
    /// Power used in place of the default attack.
    pub power_filter: Vec<PowerId>,

    // === Loot and campaign ===
    /// Possible drops.
    pub loot_table: Vec<LootEntry>,
    /// Number of loot rolls (min, max).
    pub loot_count: (u32, u32),
    /// Set when defeated.
    pub defeat_status: StatusId,
    /// Set the first time the entity is converted.
    pub convert_status: StatusId,
    /// Quest loot requires this status.
    pub quest_loot_requires_status: StatusId,
    /// Quest loot requires this status to be unset.
    pub quest_loot_requires_not_status: StatusId,
    /// Quest drop.
    pub quest_loot_id: ItemId,
    /// Dropped on the first defeat only.
    pub first_defeat_loot: ItemId,
    /// Flags granted by equipment.
    pub equip_flags: BTreeSet<String>,

    // === Summons ===
    /// Entities this one summoned.
    pub summons: Vec<EntityHandle>,
    /// Entity that summoned this one.
    pub summoner: Option<EntityHandle>,
    /// Power that summoned this entity.
    pub summoned_power: PowerId,
    pub(crate) party_buffs: VecDeque<PowerId>,
}

impl StatBlock {
    /// Creates a blank level-1 stat block sized for a layout.
    #[must_use]
    pub fn new(layout: &StatLayout) -> Self {
        let primaries = layout.primary_count();
        let mut block = Self {
            name: String::new(),
            character_class: String::new(),
            character_subclass: String::new(),
            hero: false,
            hero_ally: false,
            enemy_ally: false,
            npc: false,
            humanoid: false,
            lifeform: true,
            converted: false,
            handle: None,
            categories: Vec::new(),
            pos: Position::default(),
            direction: 0,

            level: 1,
            xp: 0,
            xp_scaling_table: None,
            stat_points_per_level: 1,
            power_points_per_level: 1,
            max_spendable_stat_points: 0,
            max_points_per_stat: 0,
            hero_stats_loaded: false,

            starting: layout.zeroed(),
            base: layout.zeroed(),
            current: layout.zeroed(),
            per_level: layout.zeroed(),
            per_primary: vec![layout.zeroed(); primaries],
            primary: vec![1; primaries],
            primary_starting: vec![1; primaries],
            primary_additional: vec![0; primaries],
            item_base_damage: vec![DamageRange::default(); layout.damage_type_count()],
            item_base_absorb: DamageRange::default(),
            resist_offset: layout.resist_slot(0),

            hp: 0.0,
            mp: 0.0,
            prev_maxhp: 1.0,
            prev_maxmp: 1.0,
            prev_hp: 0.0,
            prev_mp: 0.0,

            effects: EffectSet::new(layout),

            alive: true,
            corpse: false,
            cur_state: EntityState::Stance,
            state_timer: Timer::default(),
            transformed: false,
            transform_duration: 0,
            in_combat: false,
            critdie_enabled: false,
            refresh_stats: false,
            defeat_resolved: false,

            speed: 0.1,
            speed_default: 0.1,
            charge_speed: 0.0,
            knockback_srcpos: Position::default(),
            knockback_destpos: Position::default(),
            movement_type: MovementType::Normal,
            flying: false,
            intangible: false,
            facing: true,

            threat_range: 0.0,
            threat_range_far: 0.0,
            flee_range: 0.0,
            combat_style: CombatStyle::Default,
            chance_pursue: 0,
            chance_flee: 0,
            melee_range: 1.0,
            powers_ai: Vec::new(),
            powers_passive: Vec::new(),
            power_cooldowns: AHashMap::new(),
            cooldown: Timer::default(),
            cooldown_hit: Timer::default(),
            waypoints: VecDeque::new(),
            waypoint_timer: Timer::default(),
            wander_area: TileRect::default(),
            wandering: false,
            flee_timer: Timer::default(),
            flee_cooldown_timer: Timer::default(),
            turn_delay: Timer::default(),
            suppress_hp: false,
            power_filter: Vec::new(),

            loot_table: Vec::new(),
            loot_count: (0, 0),
            defeat_status: StatusId::NONE,
            convert_status: StatusId::NONE,
            quest_loot_requires_status: StatusId::NONE,
            quest_loot_requires_not_status: StatusId::NONE,
            quest_loot_id: ItemId::NONE,
            first_defeat_loot: ItemId::NONE,
            equip_flags: BTreeSet::new(),

            summons: Vec::new(),
            summoner: None,
            summoned_power: PowerId::NONE,
            party_buffs: VecDeque::new(),
        };
        block.apply_effects();
        block
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current value of a core stat.
    #[must_use]
    pub fn get(&self, stat: CoreStat) -> f32 {
        self.current[stat]
    }

    /// Current value of any slot (0 when out of range).
    #[must_use]
    pub fn get_slot(&self, slot: usize) -> f32 {
        self.current.get(slot)
    }

    /// Current resistance to an element.
    #[must_use]
    pub fn resist(&self, element: usize) -> f32 {
        self.current.get(self.resist_offset + element)
    }

    /// Current minimum damage of a damage type.
    #[must_use]
    pub fn damage_min(&self, damage_type: usize) -> f32 {
        self.current.get(StatLayout::damage_min_slot(damage_type))
    }

    /// Current maximum damage of a damage type.
    #[must_use]
    pub fn damage_max(&self, damage_type: usize) -> f32 {
        self.current.get(StatLayout::damage_max_slot(damage_type))
    }

    /// Effective primary stat (allocated plus effect bonus).
    #[must_use]
    pub fn get_primary(&self, index: usize) -> i32 {
        self.primary.get(index).copied().unwrap_or(0)
            + self.primary_additional.get(index).copied().unwrap_or(0)
    }

    /// Allocated primary stat, without effect bonuses.
    #[must_use]
    pub fn primary_allocated(&self, index: usize) -> i32 {
        self.primary.get(index).copied().unwrap_or(0)
    }

    /// Starting primary stat.
    #[must_use]
    pub fn primary_starting(&self, index: usize) -> i32 {
        self.primary_starting.get(index).copied().unwrap_or(0)
    }

    /// Number of primary stats.
    #[must_use]
    pub fn primary_count(&self) -> usize {
        self.primary.len()
    }

    /// Starting values.
    #[must_use]
    pub fn starting(&self) -> &StatVec {
        &self.starting
    }

    /// Values after level, primary and equipment scaling.
    #[must_use]
    pub fn base(&self) -> &StatVec {
        &self.base
    }

    /// Values after effects.
    #[must_use]
    pub fn current(&self) -> &StatVec {
        &self.current
    }

    /// Growth per level.
    #[must_use]
    pub fn per_level(&self) -> &StatVec {
        &self.per_level
    }

    /// Growth per point of a primary stat.
    #[must_use]
    pub fn per_primary(&self, index: usize) -> Option<&StatVec> {
        self.per_primary.get(index)
    }

    /// Sets a starting value.
    pub fn set_starting(&mut self, slot: usize, value: f32) {
        self.starting.set(slot, value);
    }

    /// Sets growth per level.
    pub fn set_per_level(&mut self, slot: usize, value: f32) {
        self.per_level.set(slot, value);
    }

    /// Sets growth per point of a primary stat.
    pub fn set_per_primary(&mut self, primary: usize, slot: usize, value: f32) {
        if let Some(v) = self.per_primary.get_mut(primary) {
            v.set(slot, value);
        }
    }

    /// Sets a primary stat and its starting value.
    pub fn set_primary_starting(&mut self, index: usize, value: i32) {
        if let (Some(p), Some(s)) = (self.primary.get_mut(index), self.primary_starting.get_mut(index)) {
            *p = value;
            *s = value;
        }
    }

    /// Sets an allocated primary stat.
    pub fn set_primary(&mut self, index: usize, value: i32) {
        if let Some(p) = self.primary.get_mut(index) {
            *p = value;
        }
    }

    /// Sets the equipment damage bonus for a damage type.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::DamageTypeOutOfRange`] and leaves the bonuses
    /// untouched when the index is outside the layout.
    pub fn set_item_base_damage(
        &mut self,
        damage_type: usize,
        range: DamageRange,
    ) -> Result<(), ContentError> {
        let count = self.item_base_damage.len();
        let slot = self
            .item_base_damage
            .get_mut(damage_type)
            .ok_or(ContentError::DamageTypeOutOfRange {
                index: damage_type,
                count,
            })?;
        *slot = range;
        Ok(())
    }

    /// Sets the equipment absorb bonus.
    pub fn set_item_base_absorb(&mut self, range: DamageRange) {
        self.item_base_absorb = range;
    }

    /// Removes all equipment bonuses.
    pub fn clear_item_bonuses(&mut self) {
        self.item_base_damage.fill(DamageRange::default());
        self.item_base_absorb = DamageRange::default();
    }

    // ------------------------------------------------------------------------
    // Recompute
    // ------------------------------------------------------------------------

    /// Rebuilds `base` from starting values, level, primaries and equipment.
    ///
    /// Levels and primary points below 1 contribute nothing.
    pub fn calc_base(&mut self) {
        let lev0 = self.level.saturating_sub(1) as f32;
        for i in 0..self.base.len() {
            self.base[i] = self.starting[i] + lev0 * self.per_level[i];
        }

        let primaries: Vec<f32> = (0..self.per_primary.len())
            .map(|j| (self.get_primary(j) - 1).max(0) as f32)
            .collect();
        for (per_primary, points) in self.per_primary.iter().zip(primaries) {
            for i in 0..self.base.len() {
                self.base[i] += points * per_primary[i];
            }
        }

        for (d, item) in self.item_base_damage.iter().enumerate() {
            let (min_slot, max_slot) = (StatLayout::damage_min_slot(d), StatLayout::damage_max_slot(d));
            let min = (self.base[min_slot] + item.min).max(0.0);
            let max = (self.base[max_slot] + item.max).max(min);
            self.base[min_slot] = min;
            self.base[max_slot] = max;
        }

        let abs_min = (self.base[CoreStat::AbsorbMin] + self.item_base_absorb.min).max(0.0);
        let abs_max = (self.base[CoreStat::AbsorbMax] + self.item_base_absorb.max).max(abs_min);
        self.base[CoreStat::AbsorbMin] = abs_min;
        self.base[CoreStat::AbsorbMax] = abs_max;
    }

    /// Rebuilds `current` from `base` and the effect aggregates.
    ///
    /// Returns true if effects changed the effective primary stats.
    pub fn apply_effects(&mut self) -> bool {
        self.prev_maxhp = self.get(CoreStat::HpMax).max(1.0);
        self.prev_maxmp = self.get(CoreStat::MpMax).max(1.0);
        self.prev_hp = self.hp;
        self.prev_mp = self.mp;

        let mut drift = false;
        for (j, additional) in self.primary_additional.iter_mut().enumerate() {
            let bonus = self.effects.bonus_primary.get(j).copied().unwrap_or(0);
            if *additional != bonus {
                drift = true;
            }
            *additional = bonus;
        }
        if drift {
            self.refresh_stats = true;
        }

        self.calc_base();

        for i in 0..self.current.len() {
            self.current[i] =
                (self.base[i] + self.effects.bonus.get(i)) * self.effects.bonus_multiplier.get(i);
        }

        self.current[CoreStat::HpMax] = self.current[CoreStat::HpMax].max(1.0);
        self.current[CoreStat::MpMax] = self.current[CoreStat::MpMax].max(1.0);

        self.hp = self.hp.min(self.get(CoreStat::HpMax));
        self.mp = self.mp.min(self.get(CoreStat::MpMax));

        self.speed = self.speed_default;
        drift
    }

    /// Full refresh after a level, equipment, or allocation change.
    ///
    /// For the hero this also applies the hero configuration once and derives
    /// the level from experience. Health and mana are refilled.
    pub fn recalc(&mut self, ctx: &CombatContext<'_>) {
        if self.hero {
            if !self.hero_stats_loaded {
                self.load_hero_stats(ctx);
            }
            self.refresh_stats = true;
            self.clamp_xp(ctx.xp_table);
            self.level = ctx.xp_table.level_from_xp(self.xp);
        }

        self.level = self.level.max(1);
        self.apply_effects();

        self.hp = self.get(CoreStat::HpMax);
        self.mp = self.get(CoreStat::MpMax);
    }

    fn load_hero_stats(&mut self, ctx: &CombatContext<'_>) {
        self.cooldown
            .set_duration(ctx.settings.frames_from_millis(ctx.settings.global_cooldown_ms));
        self.cooldown.reset(TimerReset::End);

        if let Some(config) = ctx.hero_config {
            for error in config.stats.apply(self, ctx.layout) {
                warn!("Hero stats: {error}");
            }
            self.stat_points_per_level = config.stat_points_per_level;
            self.power_points_per_level = config.power_points_per_level;
        }

        self.max_spendable_stat_points = ctx.xp_table.max_level() * self.stat_points_per_level;
        self.max_points_per_stat = ctx
            .hero_config
            .and_then(|c| c.max_points_per_stat)
            .filter(|n| *n > 0)
            .unwrap_or(self.max_spendable_stat_points / 4 + 1);
        self.hero_stats_loaded = true;
        debug!(
            "Loaded hero stats: {} spendable, {} per stat",
            self.max_spendable_stat_points, self.max_points_per_stat
        );
    }

    /// Adds experience, capped at the max-level threshold.
    pub fn add_xp(&mut self, amount: u64, table: &XpTable) {
        self.xp = self.xp.saturating_add(amount);
        self.clamp_xp(table);
    }

    fn clamp_xp(&mut self, table: &XpTable) {
        self.xp = self.xp.min(table.level_xp(table.max_level()));
    }

    // ------------------------------------------------------------------------
    // Per-frame logic
    // ------------------------------------------------------------------------

    /// Advances one simulation frame.
    ///
    /// Party buffs queued by this entity are broadcast by the arena before
    /// this runs. Everything here touches only this entity and the
    /// collaborators in `ctx`.
    pub fn logic(&mut self, ctx: &mut CombatContext<'_>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        self.alive = !(self.hp <= 0.0 && !self.effects.death_pending() && !self.effects.revive);

        self.effects.tick();
        let drift = self.apply_effects();
        if self.hero && drift {
            outcome.stats_changed = true;
            ctx.events.publish(CombatEvent::StatsChanged {
                entity: self.handle,
            });
        }

        // keep the hp/mp ratio when the maximum moves
        let max_hp = self.get(CoreStat::HpMax);
        let max_mp = self.get(CoreStat::MpMax);
        if (self.prev_maxhp - max_hp).abs() > f32::EPSILON {
            self.hp = (self.prev_hp / self.prev_maxhp) * max_hp;
        }
        if (self.prev_maxmp - max_mp).abs() > f32::EPSILON {
            self.mp = (self.prev_mp / self.prev_maxmp) * max_mp;
        }

        self.cooldown.tick();
        for ai in &mut self.powers_ai {
            ai.cooldown.tick();
        }
        for timer in self.power_cooldowns.values_mut() {
            timer.tick();
        }

        self.regenerate(ctx);

        self.transform_duration = self.transform_duration.saturating_sub(1);

        self.apply_damage_over_time(ctx);

        self.cooldown_hit.tick();

        if self.effects.stun {
            self.state_timer.reset(TimerReset::End);
            self.charge_speed = 0.0;
        }
        self.state_timer.tick();

        self.apply_heal_over_time(ctx);

        self.movement_type = if self.intangible {
            MovementType::Intangible
        } else if self.flying {
            MovementType::Flying
        } else {
            MovementType::Normal
        };

        if self.hp <= 0.0 && !self.summons.is_empty() {
            outcome.cascade_summons = true;
        }

        self.apply_forced_movement(ctx);

        self.waypoint_timer.tick();

        if self.hp <= 0.0 && self.effects.revive {
            self.revive(ctx);
        }

        if !self.hero && self.effects.convert != self.converted {
            self.toggle_conversion(ctx);
        }

        outcome.death_triggered = self.effects.take_triggered_death();
        outcome
    }

    fn regenerate(&mut self, ctx: &CombatContext<'_>) {
        let max_hp = self.get(CoreStat::HpMax);
        if self.hp <= max_hp && self.hp > 0.0 {
            let per_frame = if !self.in_combat && !self.hero_ally && !self.hero && ctx.hero.alive {
                let seconds = ctx.settings.out_of_combat_regen_seconds.max(f32::EPSILON);
                ctx.settings.per_frame(max_hp / seconds)
            } else {
                ctx.settings.per_frame(self.get(CoreStat::HpRegen) / 60.0)
            };
            self.hp = (self.hp + per_frame).clamp(0.0, max_hp);
        }

        let max_mp = self.get(CoreStat::MpMax);
        if self.mp <= max_mp && self.hp > 0.0 {
            let per_frame = ctx.settings.per_frame(self.get(CoreStat::MpRegen) / 60.0);
            self.mp = (self.mp + per_frame).clamp(0.0, max_mp);
        }
    }

    fn apply_damage_over_time(&mut self, ctx: &mut CombatContext<'_>) {
        if self.effects.damage > 0.0 && self.hp > 0.0 {
            let amount = self.effects.damage;
            let source = self.effects.damage_source_type(EffectKind::Damage);
            trace!("'{}' takes {amount} damage over time", self.name);
            self.take_damage(amount, false, source, ctx);
            ctx.events.publish(CombatEvent::Damaged {
                entity: self.handle,
                pos: self.pos,
                amount,
            });
        }
        if self.effects.damage_percent > 0.0 && self.hp > 0.0 {
            let amount = self.get(CoreStat::HpMax) * self.effects.damage_percent / 100.0;
            let source = self.effects.damage_source_type(EffectKind::DamagePercent);
            self.take_damage(amount, false, source, ctx);
            ctx.events.publish(CombatEvent::Damaged {
                entity: self.handle,
                pos: self.pos,
                amount,
            });
        }
        if self.effects.death_sentence {
            let amount = self.get(CoreStat::HpMax);
            self.take_damage(amount, false, SourceType::Neutral, ctx);
        }
    }

    fn apply_heal_over_time(&mut self, ctx: &CombatContext<'_>) {
        let max_hp = self.get(CoreStat::HpMax);
        let max_mp = self.get(CoreStat::MpMax);
        let heals = [
            (self.effects.hpot, "+{} HP", true),
            (max_hp * self.effects.hpot_percent / 100.0, "+{} HP", true),
            (self.effects.mpot, "+{} MP", false),
            (max_mp * self.effects.mpot_percent / 100.0, "+{} MP", false),
        ];
        for (amount, key, health) in heals {
            if amount <= 0.0 {
                continue;
            }
            let number = format_combat_number(amount);
            let text = ctx.messages.format(key, &[number.as_str()]);
            ctx.events.publish(CombatEvent::Healed {
                entity: self.handle,
                pos: self.pos,
                text,
            });
            if health {
                self.hp = (self.hp + amount).min(max_hp);
            } else {
                self.mp = (self.mp + amount).min(max_mp);
            }
        }
    }

    fn apply_forced_movement(&mut self, ctx: &mut CombatContext<'_>) {
        let delta = if self.effects.knockback_speed != 0.0 {
            let theta = self.knockback_srcpos.theta_to(self.knockback_destpos);
            Vec2::new(theta.cos(), theta.sin()) * self.effects.knockback_speed
        } else if self.charge_speed != 0.0 {
            let dir = usize::from(self.direction % 8);
            let speed = self.charge_speed * SPEED_MULTIPLIER[dir];
            Vec2::new(speed * DIRECTION_DELTA_X[dir], speed * DIRECTION_DELTA_Y[dir])
        } else {
            return;
        };

        ctx.collision.unblock(self.pos);
        ctx.collision.move_entity(
            &mut self.pos,
            delta,
            self.movement_type,
            CollideType::for_entity(self.hero),
        );
        ctx.collision.block(self.pos, self.hero_ally);
    }

    fn revive(&mut self, ctx: &CombatContext<'_>) {
        self.hp = self.get(CoreStat::HpMax);
        self.alive = true;
        self.corpse = false;
        self.cur_state = EntityState::Stance;
        self.defeat_resolved = false;
        debug!("'{}' revived", self.name);
        ctx.events.publish(CombatEvent::Revived {
            entity: self.handle,
        });
    }

    fn toggle_conversion(&mut self, ctx: &mut CombatContext<'_>) {
        self.converted = !self.converted;
        self.hero_ally = !self.hero_ally;
        if self.converted
            && self.convert_status.is_valid()
            && !ctx.campaign.check_status(self.convert_status)
        {
            ctx.campaign.set_status(self.convert_status);
        }
        debug!("'{}' converted (ally: {})", self.name, self.hero_ally);
        ctx.events.publish(CombatEvent::Converted {
            entity: self.handle,
            allied: self.hero_ally,
        });
    }

    // ------------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------------

    /// Queues a party buff for broadcast on the next arena frame.
    pub fn queue_party_buff(&mut self, power: PowerId) {
        self.party_buffs.push_back(power);
    }

    /// Class shown in compact UI.
    #[must_use]
    pub fn short_class(&self, messages: &dyn MessageLookup) -> String {
        if self.character_subclass.is_empty() {
            messages.get(&self.character_class)
        } else {
            messages.get(&self.character_subclass)
        }
    }

    /// Class shown in the character sheet.
    #[must_use]
    pub fn long_class(&self, messages: &dyn MessageLookup) -> String {
        if self.character_subclass.is_empty() || self.character_class == self.character_subclass {
            messages.get(&self.character_class)
        } else {
            format!(
                "{} / {}",
                messages.get(&self.character_class),
                messages.get(&self.character_subclass)
            )
        }
    }

    /// Sets a square wander area of side `2r + 1` around the current tile.
    pub fn set_wander_area(&mut self, radius: i32) {
        let (x, y) = self.pos.tile();
        self.wander_area = TileRect {
            x: x - radius,
            y: y - radius,
            w: radius * 2 + 1,
            h: radius * 2 + 1,
        };
    }
}

fn format_combat_number(value: f32) -> String {
    if (value - value.round()).abs() < 0.05 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Effect;
    use crate::testing::{FakeWorld, layout_with_damage};
    use proptest::prelude::*;

    const HP: usize = CoreStat::HpMax.slot();

    fn leveled_block() -> (StatLayout, StatBlock) {
        let layout = layout_with_damage();
        let mut block = StatBlock::new(&layout);
        block.set_starting(HP, 50.0);
        block.set_per_level(HP, 10.0);
        block.level = 3;
        (layout, block)
    }

    #[test]
    fn test_vectors_share_layout_length() {
        let layout = layout_with_damage();
        let block = StatBlock::new(&layout);
        let n = layout.slot_count();
        assert_eq!(block.starting().len(), n);
        assert_eq!(block.base().len(), n);
        assert_eq!(block.current().len(), n);
        assert_eq!(block.per_level().len(), n);
        assert_eq!(block.per_primary(0).map(StatVec::len), Some(n));
    }

    #[test]
    fn test_level_scaling_example() {
        let (layout, mut block) = leveled_block();
        let mut world = FakeWorld::new(layout.clone());
        let ctx = world.ctx();
        block.recalc(&ctx);
        assert!((block.base()[HP] - 70.0).abs() < f32::EPSILON);
        assert!((block.get(CoreStat::HpMax) - 70.0).abs() < f32::EPSILON);
        assert!((block.hp - 70.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_primary_scaling_skips_first_point() {
        let (_, mut block) = leveled_block();
        block.level = 1;
        block.set_per_primary(0, HP, 5.0);
        block.set_primary_starting(0, 1);
        block.calc_base();
        assert!((block.base()[HP] - 50.0).abs() < f32::EPSILON);
        block.set_primary(0, 4);
        block.calc_base();
        assert!((block.base()[HP] - 65.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_item_damage_floors() {
        let layout = layout_with_damage();
        let mut block = StatBlock::new(&layout);
        block.set_starting(StatLayout::damage_min_slot(0), 2.0);
        block.set_starting(StatLayout::damage_max_slot(0), 4.0);
        block
            .set_item_base_damage(0, DamageRange { min: -10.0, max: -10.0 })
            .expect("melee");
        assert_eq!(
            block.set_item_base_damage(7, DamageRange { min: 1.0, max: 1.0 }),
            Err(ContentError::DamageTypeOutOfRange { index: 7, count: 2 })
        );
        block.set_item_base_absorb(DamageRange { min: 3.0, max: 1.0 });
        block.calc_base();
        assert!(block.base()[StatLayout::damage_min_slot(0)].abs() < f32::EPSILON);
        assert!(block.base()[StatLayout::damage_max_slot(0)].abs() < f32::EPSILON);
        assert!((block.base()[CoreStat::AbsorbMin] - 3.0).abs() < f32::EPSILON);
        assert!((block.base()[CoreStat::AbsorbMax] - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_negative_bonus_keeps_max_at_one() {
        let (_, mut block) = leveled_block();
        block.effects.add_effect(Effect::new(EffectKind::Bonus { slot: HP }, -500.0, None));
        block.apply_effects();
        assert!((block.get(CoreStat::HpMax) - 1.0).abs() < f32::EPSILON);
        assert!((block.get(CoreStat::MpMax) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_apply_effects_idempotent() {
        let (_, mut block) = leveled_block();
        block.effects.add_effect(Effect::new(EffectKind::Bonus { slot: HP }, 5.0, None));
        block.effects.add_effect(Effect::new(EffectKind::Multiplier { slot: HP }, 1.5, None));
        block.apply_effects();
        let first = block.current().clone();
        block.apply_effects();
        assert_eq!(block.current(), &first);
        assert!((block.get(CoreStat::HpMax) - 112.5).abs() < 1e-4);
    }

    #[test]
    fn test_primary_drift_flags_refresh() {
        let (_, mut block) = leveled_block();
        assert!(!block.apply_effects());
        block.effects.add_effect(Effect::new(EffectKind::PrimaryBonus { primary: 0 }, 2.0, None));
        assert!(block.apply_effects());
        assert!(block.refresh_stats);
        assert_eq!(block.get_primary(0), 3);
        assert!(!block.apply_effects());
    }

    #[test]
    fn test_ratio_preserved_on_max_change() {
        let (layout, mut block) = leveled_block();
        block.set_starting(HP, 100.0);
        block.set_per_level(HP, 0.0);
        block.in_combat = true;
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.hp = 50.0;
        block.effects.add_effect(Effect::new(EffectKind::Bonus { slot: HP }, 100.0, None));
        block.logic(&mut ctx);
        assert!((block.get(CoreStat::HpMax) - 200.0).abs() < f32::EPSILON);
        assert!((block.hp - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_combat_regen() {
        let (layout, mut block) = leveled_block();
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.hp = 10.0;
        block.logic(&mut ctx);
        // full heal over five seconds at 60 fps
        assert!((block.hp - (10.0 + 70.0 / 300.0)).abs() < 1e-3);

        block.in_combat = true;
        let before = block.hp;
        block.logic(&mut ctx);
        assert!((block.hp - before).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mana_regen() {
        let (layout, mut block) = leveled_block();
        block.set_starting(CoreStat::MpMax.slot(), 100.0);
        block.set_starting(CoreStat::MpRegen.slot(), 360.0);
        block.in_combat = true;
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.mp = 0.0;
        block.logic(&mut ctx);
        assert!((block.mp - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_heal_over_time_clamps_and_reports() {
        let (layout, mut block) = leveled_block();
        block.in_combat = true;
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.hp = 65.0;
        block.effects.add_effect(Effect::new(EffectKind::HealOverTime, 20.0, Some(1)));
        block.logic(&mut ctx);
        assert!((block.hp - 70.0).abs() < f32::EPSILON);
        let events = ctx.events.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            CombatEvent::Healed { text, .. } if text == "+20 HP"
        )));
    }

    #[test]
    fn test_stun_stops_charge() {
        let (layout, mut block) = leveled_block();
        block.charge_speed = 0.5;
        block.state_timer.set_duration(10);
        block.effects.add_effect(Effect::new(EffectKind::Stun, 0.0, Some(5)));
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.logic(&mut ctx);
        assert!(block.charge_speed.abs() < f32::EPSILON);
        assert!(block.state_timer.is_end());
    }

    #[test]
    fn test_charge_moves_along_facing() {
        let (layout, mut block) = leveled_block();
        block.pos = Position::new(5.0, 5.0);
        block.direction = 5;
        block.charge_speed = 0.5;
        block.in_combat = true;
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.logic(&mut ctx);
        assert!((block.pos.x - 5.5).abs() < 1e-5);
        assert!((block.pos.y - 5.0).abs() < 1e-5);
        drop(ctx);
        assert_eq!(world.collision.blocked, vec![(Position::new(5.5, 5.0), false)]);
    }

    #[test]
    fn test_knockback_pushes_away() {
        let (layout, mut block) = leveled_block();
        block.pos = Position::new(2.0, 2.0);
        block.knockback_srcpos = Position::new(1.0, 2.0);
        block.knockback_destpos = Position::new(2.0, 2.0);
        block.effects.add_effect(Effect::new(EffectKind::Knockback, 0.25, Some(2)));
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.logic(&mut ctx);
        assert!((block.pos.x - 2.25).abs() < 1e-5);
        assert!((block.pos.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_movement_type_priority() {
        let (layout, mut block) = leveled_block();
        block.flying = true;
        block.intangible = true;
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.logic(&mut ctx);
        assert_eq!(block.movement_type, MovementType::Intangible);
        block.intangible = false;
        block.logic(&mut ctx);
        assert_eq!(block.movement_type, MovementType::Flying);
    }

    #[test]
    fn test_revive_restores() {
        let (layout, mut block) = leveled_block();
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.take_damage(500.0, false, SourceType::Hero, &mut ctx);
        assert_eq!(block.cur_state, EntityState::Dead);
        block.effects.add_effect(Effect::new(EffectKind::Revive, 0.0, Some(3)));
        block.corpse = true;
        block.logic(&mut ctx);
        assert!(block.alive);
        assert!(!block.corpse);
        assert_eq!(block.cur_state, EntityState::Stance);
        assert!((block.hp - 70.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_death_sentence_kills_when_timer_ends() {
        let (layout, mut block) = leveled_block();
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block
            .effects
            .add_effect(Effect::new(EffectKind::DeathSentence, 0.0, Some(2)));

        let outcome = block.logic(&mut ctx);
        assert!(!outcome.death_triggered);
        assert!((block.hp - 70.0).abs() < f32::EPSILON);
        let outcome = block.logic(&mut ctx);
        assert!(outcome.death_triggered);
        assert!(block.hp <= 0.0);
    }

    #[test]
    fn test_death_deferred_one_frame() {
        let (layout, mut block) = leveled_block();
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        block.take_damage(500.0, false, SourceType::Hero, &mut ctx);
        let outcome = block.logic(&mut ctx);
        assert!(outcome.death_triggered);
        assert!(block.alive);
        let outcome = block.logic(&mut ctx);
        assert!(!outcome.death_triggered);
        assert!(!block.alive);
    }

    #[test]
    fn test_conversion_toggles_and_records_status() {
        let (layout, mut block) = leveled_block();
        let mut world = FakeWorld::new(layout);
        block.convert_status = world.campaign.register("converted_goblin");
        let mut ctx = world.ctx();
        block.recalc(&ctx);
        let id = block.effects.add_effect(Effect::new(EffectKind::Convert, 0.0, None));
        block.logic(&mut ctx);
        assert!(block.converted);
        assert!(block.hero_ally);
        assert!(ctx.campaign.check_status(block.convert_status));

        block.effects.remove_effect(id);
        block.logic(&mut ctx);
        assert!(!block.converted);
        assert!(!block.hero_ally);
    }

    #[test]
    fn test_hero_never_converts() {
        let (layout, mut block) = leveled_block();
        block.hero = true;
        block.effects.add_effect(Effect::new(EffectKind::Convert, 0.0, None));
        let mut world = FakeWorld::new(layout);
        let mut ctx = world.ctx();
        block.logic(&mut ctx);
        assert!(!block.converted);
    }

    #[test]
    fn test_hero_recalc_uses_xp_table() {
        let (layout, mut block) = leveled_block();
        block.hero = true;
        block.xp = 1_000_000;
        let mut world = FakeWorld::new(layout);
        let ctx = world.ctx();
        block.recalc(&ctx);
        assert_eq!(block.xp, 600);
        assert_eq!(block.level, 4);
        assert_eq!(block.max_spendable_stat_points, 4 * block.stat_points_per_level);
        assert_eq!(block.max_points_per_stat, block.max_spendable_stat_points / 4 + 1);
        assert!(block.cooldown.is_end());
        assert_eq!(block.cooldown.duration(), 4);
    }

    #[test]
    fn test_add_xp_clamps() {
        let (layout, mut block) = leveled_block();
        let world = FakeWorld::new(layout);
        block.add_xp(250, &world.xp_table);
        assert_eq!(block.xp, 250);
        block.add_xp(10_000, &world.xp_table);
        assert_eq!(block.xp, 600);
    }

    #[test]
    fn test_class_names() {
        let (layout, mut block) = leveled_block();
        let world = FakeWorld::new(layout);
        block.character_class = "Warrior".into();
        assert_eq!(block.short_class(&world.messages), "Warrior");
        assert_eq!(block.long_class(&world.messages), "Warrior");
        block.character_subclass = "Knight".into();
        assert_eq!(block.short_class(&world.messages), "Knight");
        assert_eq!(block.long_class(&world.messages), "Warrior / Knight");
    }

    #[test]
    fn test_wander_area() {
        let (_, mut block) = leveled_block();
        block.pos = Position::new(10.6, 4.2);
        block.set_wander_area(2);
        assert_eq!(block.wander_area, TileRect { x: 8, y: 2, w: 5, h: 5 });
    }

    proptest! {
        #[test]
        fn prop_calc_base_pure(
            start in -100.0f32..100.0,
            per_level in -10.0f32..10.0,
            per_primary in -5.0f32..5.0,
            level in 0u32..50,
            primary in -3i32..20,
        ) {
            let (_, mut block) = leveled_block();
            block.set_starting(HP, start);
            block.set_per_level(HP, per_level);
            block.set_per_primary(0, HP, per_primary);
            block.set_primary(0, primary);
            block.level = level;
            block.calc_base();
            let first = block.base().clone();
            block.calc_base();
            prop_assert_eq!(block.base(), &first);
        }

        #[test]
        fn prop_max_resources_at_least_one(bonus in -1000.0f32..1000.0, mult in -2.0f32..2.0) {
            let (_, mut block) = leveled_block();
            block.effects.add_effect(Effect::new(EffectKind::Bonus { slot: HP }, bonus, None));
            block.effects.add_effect(Effect::new(EffectKind::Multiplier { slot: CoreStat::MpMax.slot() }, mult, None));
            block.apply_effects();
            prop_assert!(block.get(CoreStat::HpMax) >= 1.0);
            prop_assert!(block.get(CoreStat::MpMax) >= 1.0);
        }
    }
}
