//! AI power selection and power-use checks.
//!
//! This module provides:
//! - [`AiPower`] entries carried by every non-hero stat block
//! - Trigger-driven selection with chance, cooldown and summon gating
//! - The hero's [`EntityArena::can_use_power`] check
//! - Applying a power's effects to a block

use crate::arena::EntityArena;
use crate::block::StatBlock;
use crate::effects::EffectSource;
use crate::power::{AiTrigger, PowerDef, PowerLookup, SourceType};
use crate::timer::Timer;
use serde::{Deserialize, Serialize};
use tracing::trace;
use vigil_common::{EntityHandle, PowerId};

/// One power an AI-controlled entity may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPower {
    /// When the power is considered.
    pub trigger: AiTrigger,
    /// Power used.
    pub power: PowerId,
    /// Percent chance, 0..=100.
    pub chance: u32,
    /// Per-entry cooldown.
    #[serde(default)]
    pub cooldown: Timer,
}

impl AiPower {
    /// Creates an entry with no cooldown.
    #[must_use]
    pub fn new(trigger: AiTrigger, power: PowerId, chance: u32) -> Self {
        Self {
            trigger,
            power,
            chance,
            cooldown: Timer::default(),
        }
    }

    /// Sets the cooldown length; the entry starts ready.
    #[must_use]
    pub fn with_cooldown(mut self, frames: u32) -> Self {
        self.cooldown = Timer::new(frames);
        self
    }
}

/// A selected AI power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiPick {
    /// Index into the entity's `powers_ai`.
    pub slot: usize,
    /// Power to use.
    pub power: PowerId,
}

impl EntityArena {
    /// Picks a power for `trigger`, or `None` if nothing qualifies.
    ///
    /// One roll in `0..100` is shared by every entry; an entry qualifies when
    /// the roll does not exceed its chance. Survivors are picked uniformly.
    pub fn ai_power(
        &self,
        handle: EntityHandle,
        trigger: AiTrigger,
        powers: &dyn PowerLookup,
        rng: &mut fastrand::Rng,
    ) -> Option<AiPick> {
        let roll = rng.u32(0..100);
        let candidates = self.ai_candidates(handle, trigger, powers, roll);
        if candidates.is_empty() {
            return None;
        }
        let slot = candidates[rng.usize(0..candidates.len())];
        let power = self.get(handle)?.powers_ai.get(slot)?.power;
        trace!("{handle} picked power {} for {trigger:?}", power.raw());
        Some(AiPick { slot, power })
    }

    /// Indices of the AI entries that qualify for `trigger` given `roll`.
    #[must_use]
    pub fn ai_candidates(
        &self,
        handle: EntityHandle,
        trigger: AiTrigger,
        powers: &dyn PowerLookup,
        roll: u32,
    ) -> Vec<usize> {
        let Some(block) = self.get(handle) else {
            return Vec::new();
        };

        block
            .powers_ai
            .iter()
            .enumerate()
            .filter(|(_, ai)| ai.trigger == trigger && roll <= ai.chance && ai.cooldown.is_end())
            .filter(|(_, ai)| {
                powers.power(ai.power).is_some_and(|def| {
                    !(def.is_spawn() && self.summon_limit_reached(handle, def))
                        && self.check_required_spawns(handle, def.requires_spawns)
                })
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// True if `handle` may use `power` right now.
    ///
    /// Only the hero is gated; other living entities rely on their AI
    /// selection instead. Transformed heroes only need the mana.
    #[must_use]
    pub fn can_use_power(
        &self,
        handle: EntityHandle,
        power: PowerId,
        allow_passive: bool,
        powers: &dyn PowerLookup,
    ) -> bool {
        let (Some(block), Some(def)) = (self.get(handle), powers.power(power)) else {
            return false;
        };

        if !block.alive {
            return false;
        }
        if !block.hero {
            return true;
        }
        if block.transformed {
            return block.mp >= def.requires_mp;
        }

        block.mp >= def.requires_mp
            && (!def.passive || allow_passive)
            && !def.meta_power
            && (!block.effects.stun || (allow_passive && def.passive))
            && (def.sacrifice || block.hp > def.requires_hp)
            && self.check_required_spawns(handle, def.requires_spawns)
            && !(def.is_spawn() && self.summon_limit_reached(handle, def))
            && !def.untransform
            && def.requires_flags.iter().all(|f| block.equip_flags.contains(f))
            && (!def.buff_party || self.has_party_members(handle))
    }
}

impl StatBlock {
    /// Cooldown timer for a power.
    ///
    /// The hero tracks cooldowns per power; other entities use the first AI
    /// entry for that power.
    #[must_use]
    pub fn power_cooldown(&self, power: PowerId) -> Option<&Timer> {
        if self.hero {
            self.power_cooldowns.get(&power)
        } else {
            self.powers_ai
                .iter()
                .find(|ai| ai.power == power)
                .map(|ai| &ai.cooldown)
        }
    }

    /// Starts a power's cooldown.
    pub fn set_power_cooldown(&mut self, power: PowerId, frames: u32) {
        if self.hero {
            self.power_cooldowns.entry(power).or_default().set_duration(frames);
        } else {
            if let Some(ai) = self.powers_ai.iter_mut().find(|ai| ai.power == power) {
                ai.cooldown.set_duration(frames);
            }
        }
    }

    /// Applies every effect of `def` to this block.
    ///
    /// Current stats are not recomputed here; the next `logic` pass does it so
    /// health and mana keep their ratio when a maximum changes. Returns the
    /// number of effects added.
    pub fn apply_power_effects(&mut self, def: &PowerDef, source_type: SourceType) -> usize {
        let source = EffectSource::new(def.id, source_type);
        for effect in &def.effects {
            self.effects.add_effect(effect.instantiate(source));
        }
        def.effects.len()
    }
}
