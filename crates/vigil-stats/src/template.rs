//! Content templates.
//!
//! Authored entity and hero definitions are plain serde types. Building a
//! [`StatBlock`] resolves every stat, primary stat, power, trigger and status
//! name once; names that do not resolve are reported as [`ContentError`]s and
//! skipped, never fatal.

use crate::ai::AiPower;
use crate::block::StatBlock;
use crate::layout::{CoreStat, StatLayout};
use crate::power::{AiTrigger, CombatStyle};
use crate::services::CombatContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vigil_common::{ContentError, ItemId, PowerId, StatusId};

// ============================================================================
// Stat lines
// ============================================================================

/// `stat` / `stat_per_level` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatValue {
    /// Slot key.
    pub stat: String,
    /// Value.
    pub value: f32,
}

/// `stat_per_primary` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryStatValue {
    /// Primary stat ID.
    pub primary: String,
    /// Slot key.
    pub stat: String,
    /// Value per point.
    pub value: f32,
}

/// Starting primary stat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryValue {
    /// Primary stat ID.
    pub primary: String,
    /// Starting points.
    pub value: i32,
}

/// Stat lines shared by entity templates and the hero configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLines {
    /// Starting values.
    pub stat: Vec<StatValue>,
    /// Growth per level.
    pub stat_per_level: Vec<StatValue>,
    /// Growth per primary point.
    pub stat_per_primary: Vec<PrimaryStatValue>,
    /// Starting primary stats.
    pub primary: Vec<PrimaryValue>,
}

impl StatLines {
    /// Writes every resolvable line into `block`.
    ///
    /// Returns the lines that were skipped.
    pub fn apply(&self, block: &mut StatBlock, layout: &StatLayout) -> Vec<ContentError> {
        let mut errors = Vec::new();
        let slot = |key: &str, errors: &mut Vec<ContentError>| {
            let found = layout.index_of(key);
            if found.is_none() {
                errors.push(ContentError::UnknownStat(key.to_string()));
            }
            found
        };
        let primary = |id: &str, errors: &mut Vec<ContentError>| {
            let found = layout.primary_index(id);
            if found.is_none() {
                errors.push(ContentError::UnknownPrimaryStat(id.to_string()));
            }
            found
        };

        for line in &self.stat {
            if let Some(i) = slot(&line.stat, &mut errors) {
                block.set_starting(i, line.value);
            }
        }
        for line in &self.stat_per_level {
            if let Some(i) = slot(&line.stat, &mut errors) {
                block.set_per_level(i, line.value);
            }
        }
        for line in &self.stat_per_primary {
            let Some(p) = primary(&line.primary, &mut errors) else {
                continue;
            };
            if let Some(i) = slot(&line.stat, &mut errors) {
                block.set_per_primary(p, i, line.value);
            }
        }
        for line in &self.primary {
            let Some(p) = primary(&line.primary, &mut errors) else {
                continue;
            };
            if line.value < 1 {
                errors.push(ContentError::InvalidValue {
                    key: line.primary.clone(),
                    reason: format!("primary stats start at 1, got {}", line.value),
                });
                continue;
            }
            block.set_primary_starting(p, line.value);
        }
        errors
    }
}

// ============================================================================
// Hero
// ============================================================================

/// Hero stat configuration, applied on the hero's first recalc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroConfig {
    /// Base stat lines.
    #[serde(flatten)]
    pub stats: StatLines,
    /// Primary points gained per level.
    pub stat_points_per_level: u32,
    /// Power points gained per level.
    pub power_points_per_level: u32,
    /// Allocation cap per primary stat; derived when absent.
    pub max_points_per_stat: Option<u32>,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            stats: StatLines::default(),
            stat_points_per_level: 1,
            power_points_per_level: 1,
            max_points_per_stat: None,
        }
    }
}

// ============================================================================
// Entity templates
// ============================================================================

/// `power` entry of an entity template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiPowerLine {
    /// Trigger name (`melee`, `on_hit`, ...).
    pub trigger: String,
    /// Power used.
    pub power: PowerId,
    /// Percent chance.
    pub chance: u32,
}

/// `quest_loot` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestLoot {
    /// Status that must be set.
    pub requires_status: String,
    /// Status that must not be set.
    pub requires_not_status: String,
    /// Item dropped.
    pub item: ItemId,
}

/// Authored definition of an enemy, ally or NPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTemplate {
    /// Display name.
    pub name: String,
    /// Starting level; 0 means 1.
    pub level: u32,
    /// Experience.
    pub xp: u64,
    /// Index of the XP scaling table.
    pub xp_scaling: Option<usize>,
    /// Stat lines.
    #[serde(flatten)]
    pub stats: StatLines,

    /// AI powers.
    pub powers: Vec<AiPowerLine>,
    /// Passive powers.
    pub passive_powers: Vec<PowerId>,
    /// Loot lines, parsed by the loot service.
    pub loot: Vec<String>,
    /// Min and max drop count.
    pub loot_count: Option<(u32, u32)>,
    /// Status set on defeat.
    pub defeat_status: Option<String>,
    /// Status set on conversion.
    pub convert_status: Option<String>,
    /// Conditional quest drop.
    pub quest_loot: Option<QuestLoot>,
    /// Item dropped on the first defeat.
    pub first_defeat_loot: Option<ItemId>,

    /// Engage distance.
    pub threat_range: f32,
    /// Stop-pursuit distance; twice the engage distance when absent.
    pub threat_range_far: Option<f32>,
    /// Flee distance; half the engage distance when absent.
    pub flee_range: Option<f32>,
    /// Combat style name.
    pub combat_style: Option<String>,
    /// Percent chance to pursue.
    pub chance_pursue: u32,
    /// Percent chance to flee.
    pub chance_flee: u32,
    /// Melee reach.
    pub melee_range: Option<f32>,
    /// Speed in tiles per second.
    pub speed: Option<f32>,

    /// Moves over gaps.
    pub flying: bool,
    /// Moves through walls.
    pub intangible: bool,
    /// Turns to face its target.
    pub facing: Option<bool>,
    /// Humanoid traits.
    pub humanoid: bool,
    /// Living creature.
    pub lifeform: Option<bool>,
    /// Hide the health bar.
    pub suppress_hp: bool,
    /// Can die critically.
    pub critdie: bool,

    /// Attack cooldown (ms).
    pub cooldown_ms: Option<u32>,
    /// Cooldown after being hit (ms).
    pub cooldown_hit_ms: Option<u32>,
    /// Pause at each waypoint (ms).
    pub waypoint_pause_ms: Option<u32>,
    /// Time to turn toward a target (ms).
    pub turn_delay_ms: Option<u32>,
    /// Minimum flee time (ms).
    pub flee_duration_ms: Option<u32>,
    /// Wait between flee attempts (ms).
    pub flee_cooldown_ms: Option<u32>,

    /// Content categories.
    pub categories: Vec<String>,
    /// Powers this entity may not use.
    pub power_filter: Vec<PowerId>,
}

impl EntityTemplate {
    /// Parses a TOML template.
    pub fn parse(source: &str) -> Result<Self, ContentError> {
        toml::from_str(source).map_err(|e| ContentError::InvalidValue {
            key: "template".into(),
            reason: e.to_string(),
        })
    }

    /// Builds a ready-to-store stat block.
    ///
    /// Health and mana start at the starting maxima. Every skipped entry is
    /// logged and returned.
    pub fn build(&self, ctx: &mut CombatContext<'_>) -> (StatBlock, Vec<ContentError>) {
        let mut block = StatBlock::new(ctx.layout);
        let mut errors = self.stats.apply(&mut block, ctx.layout);

        block.name.clone_from(&self.name);
        block.level = self.level.max(1);
        block.xp = self.xp;
        block.xp_scaling_table = self.xp_scaling;
        block.categories.clone_from(&self.categories);
        block.power_filter.clone_from(&self.power_filter);

        self.build_powers(&mut block, ctx, &mut errors);
        self.build_rewards(&mut block, ctx, &mut errors);
        self.build_behavior(&mut block, ctx, &mut errors);

        for error in &errors {
            warn!("Entity '{}': {error}", self.name);
        }

        block.hp = block.starting()[CoreStat::HpMax];
        block.mp = block.starting()[CoreStat::MpMax];
        block.apply_effects();
        debug!("Built '{}' at level {}", block.name, block.level);
        (block, errors)
    }

    fn build_powers(
        &self,
        block: &mut StatBlock,
        ctx: &CombatContext<'_>,
        errors: &mut Vec<ContentError>,
    ) {
        for line in &self.powers {
            if ctx.powers.power(line.power).is_none() {
                errors.push(ContentError::UnknownPower(line.power.raw()));
                continue;
            }
            match line.trigger.parse::<AiTrigger>() {
                Ok(trigger) => block
                    .powers_ai
                    .push(AiPower::new(trigger, line.power, line.chance.min(100))),
                Err(e) => errors.push(e),
            }
        }

        for power in &self.passive_powers {
            let Some(def) = ctx.powers.power(*power) else {
                errors.push(ContentError::UnknownPower(power.raw()));
                continue;
            };
            block.powers_passive.push(*power);
            if def.post_power.is_valid() {
                block
                    .powers_ai
                    .push(AiPower::new(AiTrigger::PassivePost, def.post_power, 0));
            }
        }
    }

    fn build_rewards(
        &self,
        block: &mut StatBlock,
        ctx: &mut CombatContext<'_>,
        errors: &mut Vec<ContentError>,
    ) {
        for line in &self.loot {
            match ctx.loot.parse_loot(line) {
                Some(entry) => block.loot_table.push(entry),
                None => errors.push(ContentError::InvalidValue {
                    key: "loot".into(),
                    reason: format!("cannot parse '{line}'"),
                }),
            }
        }

        if let Some((min, max)) = self.loot_count {
            block.loot_count = if min == 0 && max == 0 {
                (0, 0)
            } else {
                let min = min.max(1);
                (min, max.max(min))
            };
        }

        let mut status = |name: &str| {
            if name.is_empty() {
                StatusId::NONE
            } else {
                ctx.campaign.register_status(name)
            }
        };
        if let Some(name) = &self.defeat_status {
            block.defeat_status = status(name);
        }
        if let Some(name) = &self.convert_status {
            block.convert_status = status(name);
        }
        if let Some(quest) = &self.quest_loot {
            block.quest_loot_requires_status = status(&quest.requires_status);
            block.quest_loot_requires_not_status = status(&quest.requires_not_status);
            block.quest_loot_id = quest.item;
        }
        if let Some(item) = self.first_defeat_loot {
            block.first_defeat_loot = item;
        }
    }

    fn build_behavior(
        &self,
        block: &mut StatBlock,
        ctx: &CombatContext<'_>,
        errors: &mut Vec<ContentError>,
    ) {
        let settings = ctx.settings;

        block.threat_range = self.threat_range;
        block.threat_range_far = self.threat_range_far.unwrap_or(self.threat_range * 2.0);
        block.flee_range = self.flee_range.unwrap_or(self.threat_range / 2.0);
        if let Some(style) = &self.combat_style {
            match style.parse::<CombatStyle>() {
                Ok(style) => block.combat_style = style,
                Err(e) => errors.push(e),
            }
        }
        block.chance_pursue = self.chance_pursue.min(100);
        block.chance_flee = self.chance_flee.min(100);
        if let Some(range) = self.melee_range {
            block.melee_range = range;
        }
        if let Some(speed) = self.speed {
            block.speed_default = settings.per_frame(speed);
            block.speed = block.speed_default;
        }

        block.flying = self.flying;
        block.intangible = self.intangible;
        block.facing = self.facing.unwrap_or(true);
        block.humanoid = self.humanoid;
        block.lifeform = self.lifeform.unwrap_or(true);
        block.suppress_hp = self.suppress_hp;
        block.critdie_enabled = self.critdie;

        let frames = |ms: Option<u32>, default: u32| settings.frames_from_millis(ms.unwrap_or(default));
        if let Some(ms) = self.cooldown_ms {
            block.cooldown.set_duration(settings.frames_from_millis(ms));
        }
        if let Some(ms) = self.cooldown_hit_ms {
            block.cooldown_hit.set_duration(settings.frames_from_millis(ms));
        }
        block
            .waypoint_timer
            .set_duration(frames(self.waypoint_pause_ms, settings.waypoint_pause_ms));
        block.turn_delay.set_duration(frames(self.turn_delay_ms, 0));
        block
            .flee_timer
            .set_duration(frames(self.flee_duration_ms, settings.flee_duration_ms));
        block
            .flee_cooldown_timer
            .set_duration(frames(self.flee_cooldown_ms, settings.flee_cooldown_ms));
    }
}
