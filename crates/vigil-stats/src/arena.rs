//! Entity arena and summon graph.
//!
//! Stat blocks are stored in generational slots and refer to each other
//! (summoner, summons) only by [`EntityHandle`]. A handle whose generation
//! no longer matches its slot resolves to nothing, so a removed entity can
//! never be reached through a stale link.
//!
//! Cross-entity mutation (summon cascade kills, party buff broadcast) always
//! collects its victims or targets first and mutates afterwards.

use crate::block::StatBlock;
use crate::combat::DamageOutcome;
use crate::events::CombatEvent;
use crate::layout::CoreStat;
use crate::power::{PowerDef, SourceType, SpawnLimit};
use crate::services::{CombatContext, HeroSnapshot};
use tracing::{debug, warn};
use vigil_common::{EntityHandle, PowerId};

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    block: Option<StatBlock>,
}

/// Owner of every live stat block.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    hero: Option<EntityHandle>,
    len: usize,
}

impl EntityArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no entities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a block and returns its handle.
    ///
    /// The first hero inserted becomes the arena's hero.
    pub fn insert(&mut self, mut block: StatBlock) -> EntityHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            },
        };
        let slot = &mut self.slots[index as usize];
        let handle = EntityHandle::new(index, slot.generation);
        block.handle = Some(handle);
        if block.hero && self.hero.is_none() {
            self.hero = Some(handle);
        }
        slot.block = Some(block);
        self.len += 1;
        handle
    }

    /// Block for a handle, if still live.
    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&StatBlock> {
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.block.as_ref())
    }

    /// Mutable block for a handle, if still live.
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut StatBlock> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.block.as_mut())
    }

    /// True if the handle refers to a live block.
    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Snapshot of all live handles in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<EntityHandle> {
        self.iter().map(|(h, _)| h).collect()
    }

    /// Iterates live blocks in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &StatBlock)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.block
                .as_ref()
                .map(|b| (EntityHandle::new(i as u32, s.generation), b))
        })
    }

    /// The hero, if one is stored.
    #[must_use]
    pub fn hero(&self) -> Option<EntityHandle> {
        self.hero.filter(|h| self.contains(*h))
    }

    /// Hero level and liveness for this frame.
    #[must_use]
    pub fn hero_snapshot(&self) -> HeroSnapshot {
        self.hero()
            .and_then(|h| self.get(h))
            .map_or_else(HeroSnapshot::default, |hero| HeroSnapshot {
                level: hero.level,
                alive: hero.hp > 0.0,
            })
    }

    // ========================================================================
    // Summon graph
    // ========================================================================

    /// Stores a block as a summon of `summoner`.
    ///
    /// Returns `None` (and stores nothing) if the summoner is gone.
    pub fn spawn_summon(
        &mut self,
        summoner: EntityHandle,
        mut block: StatBlock,
        power: PowerId,
    ) -> Option<EntityHandle> {
        if !self.contains(summoner) {
            warn!("Summon '{}' has no live summoner {summoner}", block.name);
            return None;
        }
        block.summoner = Some(summoner);
        block.summoned_power = power;
        let handle = self.insert(block);
        if let Some(parent) = self.get_mut(summoner) {
            parent.summons.push(handle);
        }
        Some(handle)
    }

    /// Force-kills every summon of `handle`, recursively, and empties its list.
    ///
    /// The killing blow covers max health plus any shields, so nothing absorbs it.
    ///
    /// Returns the number of summons killed at all depths. Each list is taken
    /// before its members are processed, so a re-entered cascade finds it
    /// empty.
    pub fn remove_summons(&mut self, handle: EntityHandle, ctx: &mut CombatContext<'_>) -> usize {
        let victims = match self.get_mut(handle) {
            Some(block) => std::mem::take(&mut block.summons),
            None => return 0,
        };
        if victims.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for victim in &victims {
            let Some(summon) = self.get_mut(*victim) else {
                continue;
            };
            let lethal = summon.get(CoreStat::HpMax) + summon.effects.shield_amount();
            summon.take_damage(lethal, false, SourceType::Neutral, ctx);
            summon.summoner = None;
            removed += 1 + self.remove_summons(*victim, ctx);
        }

        debug!("{handle} lost {removed} summons");
        ctx.events.publish(CombatEvent::SummonsRemoved {
            entity: Some(handle),
            count: victims.len(),
        });
        removed
    }

    /// Detaches `handle` from its summoner and cascades to its own summons.
    pub fn remove_from_summons(&mut self, handle: EntityHandle, ctx: &mut CombatContext<'_>) {
        let summoner = self.get_mut(handle).and_then(|b| b.summoner.take());
        if let Some(parent) = summoner.and_then(|s| self.get_mut(s)) {
            parent.summons.retain(|h| *h != handle);
        }
        self.remove_summons(handle, ctx);
    }

    /// Destroys an entity.
    ///
    /// Detaches it from the summon graph, kills its summons, and tells the
    /// loot subsystem to forget it before the slot is freed.
    pub fn remove(&mut self, handle: EntityHandle, ctx: &mut CombatContext<'_>) -> Option<StatBlock> {
        if !self.contains(handle) {
            return None;
        }
        self.remove_from_summons(handle, ctx);
        ctx.loot.remove_from_enemies_dropping_loot(handle);

        let slot = &mut self.slots[handle.index() as usize];
        let mut block = slot.block.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.len -= 1;
        if self.hero == Some(handle) {
            self.hero = None;
        }
        block.handle = None;
        Some(block)
    }

    /// True once `handle` has as many live summons from `power` as allowed.
    ///
    /// Unlimited powers never reach a cap; capped powers always allow at
    /// least one summon.
    #[must_use]
    pub fn summon_limit_reached(&self, handle: EntityHandle, power: &PowerDef) -> bool {
        let Some(block) = self.get(handle) else {
            return false;
        };

        let cap = match power.spawn_limit {
            SpawnLimit::Unlimited => return false,
            SpawnLimit::Fixed { count } => count as i64,
            SpawnLimit::Stat {
                count,
                ratio,
                primary,
            } => {
                let stat = if primary < block.primary_count() {
                    block.get_primary(primary) as f32
                } else {
                    1.0
                };
                if ratio > 0.0 {
                    (count * (stat / ratio)) as i64
                } else {
                    count as i64
                }
            },
        }
        .max(1);

        let live = block
            .summons
            .iter()
            .filter_map(|h| self.get(*h))
            .filter(|s| s.summoned_power == power.id && !s.cur_state.is_dead())
            .count() as i64;
        live >= cap
    }

    /// True if `handle` has at least `required` summons with health left.
    #[must_use]
    pub fn check_required_spawns(&self, handle: EntityHandle, required: u32) -> bool {
        if required == 0 {
            return true;
        }
        let Some(block) = self.get(handle) else {
            return false;
        };
        let live = block
            .summons
            .iter()
            .filter_map(|h| self.get(*h))
            .filter(|s| s.hp > 0.0)
            .count();
        live >= required as usize
    }

    // ========================================================================
    // Party
    // ========================================================================

    fn is_party_member(caster: EntityHandle, caster_is_hero: bool, member: &StatBlock) -> bool {
        member.hp > 0.0
            && ((member.hero_ally && caster_is_hero)
                || (member.enemy_ally && member.summoner == Some(caster)))
    }

    /// True if `handle` has any living party member.
    #[must_use]
    pub fn has_party_members(&self, handle: EntityHandle) -> bool {
        let Some(caster) = self.get(handle) else {
            return false;
        };
        self.iter()
            .any(|(h, m)| h != handle && Self::is_party_member(handle, caster.hero, m))
    }

    /// Applies every party buff queued by `handle` to its party members.
    pub fn broadcast_party_buffs(&mut self, handle: EntityHandle, ctx: &CombatContext<'_>) {
        let (queue, caster_is_hero) = match self.get_mut(handle) {
            Some(block) if !block.party_buffs.is_empty() => {
                (std::mem::take(&mut block.party_buffs), block.hero)
            },
            _ => return,
        };
        let source_type = if caster_is_hero {
            SourceType::Hero
        } else {
            SourceType::Enemy
        };
        let powers = ctx.powers;

        for power in queue {
            let Some(def) = powers.power(power) else {
                warn!("Party buff uses unknown power {}", power.raw());
                continue;
            };
            let targets: Vec<EntityHandle> = self
                .iter()
                .filter(|(h, m)| {
                    *h != handle
                        && Self::is_party_member(handle, caster_is_hero, m)
                        && (!def.buff_party_power.is_valid()
                            || def.buff_party_power == m.summoned_power)
                })
                .map(|(h, _)| h)
                .collect();

            debug!("{handle} broadcasts '{}' to {} members", def.name, targets.len());
            for target in targets {
                if let Some(member) = self.get_mut(target) {
                    member.apply_power_effects(def, source_type);
                    ctx.events.publish(CombatEvent::PartyBuffApplied {
                        source: handle,
                        target,
                        power,
                    });
                }
            }
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Applies damage to a stored entity.
    pub fn take_damage(
        &mut self,
        handle: EntityHandle,
        amount: f32,
        crit: bool,
        source: SourceType,
        ctx: &mut CombatContext<'_>,
    ) -> Option<DamageOutcome> {
        let block = self.get_mut(handle)?;
        Some(block.take_damage(amount, crit, source, ctx))
    }

    /// Runs one frame for every entity.
    ///
    /// Returns the handles whose death was triggered since the last frame.
    pub fn logic(&mut self, ctx: &mut CombatContext<'_>) -> Vec<EntityHandle> {
        ctx.hero = self.hero_snapshot();
        let mut deaths = Vec::new();

        for handle in self.handles() {
            self.broadcast_party_buffs(handle, ctx);
            let Some(block) = self.get_mut(handle) else {
                continue;
            };
            let outcome = block.logic(ctx);
            if outcome.cascade_summons {
                self.remove_summons(handle, ctx);
            }
            if outcome.death_triggered {
                deaths.push(handle);
            }
        }
        deaths
    }
}
