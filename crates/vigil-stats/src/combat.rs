//! Damage and death resolution.
//!
//! This module provides:
//! - `StatBlock::take_damage` (shield absorption, health loss, death)
//! - Kill rewards: XP, defeat statuses, quest and first-defeat loot
//! - Player death handling according to [`PlayerDeathPolicy`]

use crate::block::{EntityState, StatBlock};
use crate::events::CombatEvent;
use crate::layout::CoreStat;
use crate::power::SourceType;
use crate::services::{CombatContext, LootRequest};
use crate::settings::PlayerDeathPolicy;
use tracing::debug;
use vigil_common::ItemId;

/// Result of a single [`StatBlock::take_damage`] call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageOutcome {
    /// Damage soaked by shields.
    pub absorbed: f32,
    /// Damage subtracted from health.
    pub dealt: f32,
    /// Health reached zero.
    pub killed: bool,
}

impl StatBlock {
    /// Applies incoming damage.
    ///
    /// Shields absorb first; the rest comes off health, floored at zero. At
    /// zero health the death is flagged for the next frame and rewards are
    /// granted once per defeat. Non-positive amounts are not rejected.
    pub fn take_damage(
        &mut self,
        amount: f32,
        crit: bool,
        source: SourceType,
        ctx: &mut CombatContext<'_>,
    ) -> DamageOutcome {
        let dealt = self.effects.damage_shields(amount);
        let absorbed = amount - dealt;
        self.hp -= dealt;

        if self.hp > 0.0 {
            return DamageOutcome {
                absorbed,
                dealt,
                killed: false,
            };
        }

        self.hp = 0.0;
        self.effects.trigger_death();

        if self.hero {
            self.resolve_hero_death(crit, ctx);
        } else {
            self.resolve_defeat(crit, source, ctx);
        }

        DamageOutcome {
            absorbed,
            dealt,
            killed: true,
        }
    }

    fn resolve_hero_death(&mut self, crit: bool, ctx: &mut CombatContext<'_>) {
        match ctx.settings.player_death {
            PlayerDeathPolicy::Respawn => {
                self.hp = self.get(CoreStat::HpMax);
                self.cur_state = EntityState::Hit;
                debug!("Hero fell and was restored");
                ctx.events.publish(CombatEvent::Respawned {
                    entity: self.handle,
                });
            },
            PlayerDeathPolicy::Permadeath => {
                let first = !std::mem::replace(&mut self.defeat_resolved, true);
                self.enter_death_state(crit, ctx);
                if first {
                    debug!("Hero died");
                    ctx.events.publish(CombatEvent::Died {
                        entity: self.handle,
                        critical: self.cur_state == EntityState::CritDead,
                    });
                }
            },
        }
    }

    fn resolve_defeat(&mut self, crit: bool, source: SourceType, ctx: &mut CombatContext<'_>) {
        let first = !std::mem::replace(&mut self.defeat_resolved, true);

        if first && (!self.hero_ally || self.converted) {
            self.grant_rewards(source, ctx);
        }

        self.enter_death_state(crit, ctx);

        if first {
            debug!("'{}' defeated ({:?})", self.name, self.cur_state);
            ctx.events.publish(CombatEvent::Died {
                entity: self.handle,
                critical: self.cur_state == EntityState::CritDead,
            });
        }
    }

    fn enter_death_state(&mut self, crit: bool, ctx: &mut CombatContext<'_>) {
        self.cur_state = if crit && self.critdie_enabled {
            EntityState::CritDead
        } else {
            EntityState::Dead
        };
        ctx.collision.unblock(self.pos);
    }

    fn grant_rewards(&self, source: SourceType, ctx: &mut CombatContext<'_>) {
        let campaign = &mut *ctx.campaign;
        let mut quest_loot = self.quest_loot_id;

        // quest loot only drops while its quest is active
        if self.quest_loot_requires_status.is_valid() {
            let active = campaign.check_status(self.quest_loot_requires_status)
                && !(self.quest_loot_requires_not_status.is_valid()
                    && campaign.check_status(self.quest_loot_requires_not_status));
            if !active {
                quest_loot = ItemId::NONE;
            }
        }

        if self.first_defeat_loot.is_valid()
            && !(self.defeat_status.is_valid() && campaign.check_status(self.defeat_status))
        {
            quest_loot = self.first_defeat_loot;
        }

        if self.defeat_status.is_valid() {
            campaign.set_status(self.defeat_status);
        }

        let mut multiplier = if source == SourceType::Ally {
            ctx.settings.party_exp_percentage / 100.0
        } else {
            1.0
        };
        multiplier *= ctx
            .xp_scaling
            .multiplier(self.xp_scaling_table, self.level, ctx.hero.level);
        campaign.reward_xp(self.xp as f32 * multiplier, false);

        ctx.loot.add_enemy_loot(&LootRequest {
            entity: self.handle,
            pos: self.pos,
            level: self.level,
            table: &self.loot_table,
            count: self.loot_count,
            quest_loot,
        });
    }
}
