//! Timed modifiers attached to one entity.
//!
//! This module provides:
//! - Effect kinds (flat and multiplicative stat bonuses, over-time damage and
//!   healing, shields, boolean statuses)
//! - The per-entity [`EffectSet`] with frame ticking and aggregation
//! - Shield absorption

use crate::layout::{StatLayout, StatVec};
use crate::power::SourceType;
use serde::{Deserialize, Serialize};
use vigil_common::PowerId;

// ============================================================================
// Effect
// ============================================================================

/// What an effect does while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Adds `magnitude` to a stat slot.
    Bonus {
        /// Target slot.
        slot: usize,
    },
    /// Multiplies a stat slot by `magnitude`.
    Multiplier {
        /// Target slot.
        slot: usize,
    },
    /// Adds `magnitude` points to a primary stat.
    PrimaryBonus {
        /// Primary stat index.
        primary: usize,
    },
    /// Deals `magnitude` damage each firing.
    Damage,
    /// Deals `magnitude` percent of max health each firing.
    DamagePercent,
    /// Restores `magnitude` health each firing.
    HealOverTime,
    /// Restores `magnitude` percent of max health each firing.
    HealPercent,
    /// Restores `magnitude` mana each firing.
    ManaOverTime,
    /// Restores `magnitude` percent of max mana each firing.
    ManaPercent,
    /// Absorbs up to `magnitude` incoming damage.
    Shield,
    /// Pushes the entity at `magnitude` tiles per frame.
    Knockback,
    /// Prevents acting.
    Stun,
    /// Resurrects on death.
    Revive,
    /// Flips ally/enemy disposition while active.
    Convert,
    /// Kills when its duration runs out, or at the next tick if untimed.
    DeathSentence,
}

impl EffectKind {
    /// True for kinds that fire on an interval.
    #[must_use]
    pub const fn is_periodic(self) -> bool {
        matches!(
            self,
            Self::Damage
                | Self::DamagePercent
                | Self::HealOverTime
                | Self::HealPercent
                | Self::ManaOverTime
                | Self::ManaPercent
        )
    }
}

/// Where an effect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectSource {
    /// Power that applied the effect.
    pub power: PowerId,
    /// Side responsible.
    pub source_type: SourceType,
}

impl EffectSource {
    /// Creates a source.
    #[must_use]
    pub const fn new(power: PowerId, source_type: SourceType) -> Self {
        Self { power, source_type }
    }
}

/// One active modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Unique ID within its set (assigned on insert).
    pub id: u32,
    /// What the effect does.
    pub kind: EffectKind,
    /// Origin.
    pub source: EffectSource,
    /// Strength, meaning depends on kind.
    pub magnitude: f32,
    /// Frames left; `None` is permanent.
    pub remaining: Option<u32>,
    /// Frames between periodic firings.
    pub interval: u32,
    /// Frames since the effect was added.
    pub elapsed: u32,
}

impl Effect {
    /// Creates an effect.
    #[must_use]
    pub fn new(kind: EffectKind, magnitude: f32, duration: Option<u32>) -> Self {
        Self {
            id: 0,
            kind,
            source: EffectSource::default(),
            magnitude,
            remaining: duration,
            interval: 1,
            elapsed: 0,
        }
    }

    /// Sets the origin.
    #[must_use]
    pub fn with_source(mut self, source: EffectSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the firing interval (at least one frame).
    #[must_use]
    pub fn with_interval(mut self, frames: u32) -> Self {
        self.interval = frames.max(1);
        self
    }

    /// True once the duration ran out or a shield is depleted.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == Some(0) || (self.kind == EffectKind::Shield && self.magnitude <= 0.0)
    }

    /// Advances one frame, returning whether a periodic effect fires.
    fn tick(&mut self) -> bool {
        let fires = if self.kind.is_periodic() {
            self.elapsed += 1;
            (self.elapsed - 1) % self.interval.max(1) == 0
        } else {
            self.elapsed += 1;
            false
        };
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        fires
    }
}

// ============================================================================
// Effect Set
// ============================================================================

/// All active effects on one entity plus their aggregates.
///
/// The aggregates always reflect exactly the effects currently held: they are
/// rebuilt after every insertion, removal, and tick.
#[derive(Debug, Clone)]
pub struct EffectSet {
    effects: Vec<Effect>,
    next_id: u32,

    /// Sum of flat bonuses per slot.
    pub bonus: StatVec,
    /// Product of multipliers per slot (1.0 where none apply).
    pub bonus_multiplier: StatVec,
    /// Sum of primary stat bonuses.
    pub bonus_primary: Vec<i32>,

    /// Damage fired this frame.
    pub damage: f32,
    /// Percent-of-max damage fired this frame.
    pub damage_percent: f32,
    /// Healing fired this frame.
    pub hpot: f32,
    /// Percent-of-max healing fired this frame.
    pub hpot_percent: f32,
    /// Mana fired this frame.
    pub mpot: f32,
    /// Percent-of-max mana fired this frame.
    pub mpot_percent: f32,

    /// Any stun active.
    pub stun: bool,
    /// Any revive active.
    pub revive: bool,
    /// Any convert active.
    pub convert: bool,
    /// A death sentence came due this frame.
    pub death_sentence: bool,
    /// Combined knockback speed.
    pub knockback_speed: f32,

    triggered_death: bool,
}

impl EffectSet {
    /// Creates an empty set sized for a layout.
    #[must_use]
    pub fn new(layout: &StatLayout) -> Self {
        Self {
            effects: Vec::new(),
            next_id: 1,
            bonus: layout.zeroed(),
            bonus_multiplier: StatVec::filled(layout.slot_count(), 1.0),
            bonus_primary: vec![0; layout.primary_count()],
            damage: 0.0,
            damage_percent: 0.0,
            hpot: 0.0,
            hpot_percent: 0.0,
            mpot: 0.0,
            mpot_percent: 0.0,
            stun: false,
            revive: false,
            convert: false,
            death_sentence: false,
            knockback_speed: 0.0,
            triggered_death: false,
        }
    }

    /// Adds an effect and returns its ID.
    ///
    /// Effects of the same kind from different sources stack.
    pub fn add_effect(&mut self, mut effect: Effect) -> u32 {
        effect.id = self.next_id;
        self.next_id += 1;
        let id = effect.id;
        self.effects.push(effect);
        self.aggregate();
        id
    }

    /// Removes an effect by ID.
    pub fn remove_effect(&mut self, id: u32) -> bool {
        let len = self.effects.len();
        self.effects.retain(|e| e.id != id);
        if self.effects.len() == len {
            false
        } else {
            self.aggregate();
            true
        }
    }

    /// Removes every effect applied by a power.
    pub fn remove_from_power(&mut self, power: PowerId) {
        let len = self.effects.len();
        self.effects.retain(|e| e.source.power != power);
        if self.effects.len() != len {
            self.aggregate();
        }
    }

    /// Removes everything, including a pending death trigger.
    pub fn clear(&mut self) {
        self.effects.clear();
        self.triggered_death = false;
        self.aggregate();
        self.clear_frame();
    }

    /// Active effects.
    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    /// Number of active effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True if no effects are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Advances one frame.
    ///
    /// Fires periodic effects into the per-frame accumulators, counts down
    /// durations, drops expired effects, and rebuilds the aggregates. A death
    /// sentence is flagged for the frame its countdown reaches zero and then
    /// dropped.
    pub fn tick(&mut self) {
        self.clear_frame();

        for effect in &mut self.effects {
            let fires = effect.tick();
            let due = matches!(effect.remaining, None | Some(0));
            if effect.kind == EffectKind::DeathSentence && due {
                effect.remaining = Some(0);
                self.death_sentence = true;
            }
            if !fires {
                continue;
            }
            let m = effect.magnitude;
            match effect.kind {
                EffectKind::Damage => self.damage += m,
                EffectKind::DamagePercent => self.damage_percent += m,
                EffectKind::HealOverTime => self.hpot += m,
                EffectKind::HealPercent => self.hpot_percent += m,
                EffectKind::ManaOverTime => self.mpot += m,
                EffectKind::ManaPercent => self.mpot_percent += m,
                _ => {},
            }
        }

        self.effects.retain(|e| !e.is_expired());
        self.aggregate();
    }

    /// Absorbs damage with active shields and returns what gets through.
    ///
    /// Shields are drained in the order they were applied; empty shields are
    /// removed.
    pub fn damage_shields(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 {
            return amount;
        }
        let mut remaining = amount;
        for effect in &mut self.effects {
            if effect.kind != EffectKind::Shield || remaining <= 0.0 {
                continue;
            }
            let absorbed = effect.magnitude.min(remaining);
            effect.magnitude -= absorbed;
            remaining -= absorbed;
        }
        let len = self.effects.len();
        self.effects.retain(|e| !e.is_expired());
        if self.effects.len() != len {
            self.aggregate();
        }
        remaining
    }

    /// Total shield strength left.
    #[must_use]
    pub fn shield_amount(&self) -> f32 {
        self.effects
            .iter()
            .filter(|e| e.kind == EffectKind::Shield)
            .map(|e| e.magnitude)
            .sum()
    }

    /// Side responsible for the first active effect of a kind.
    #[must_use]
    pub fn damage_source_type(&self, kind: EffectKind) -> SourceType {
        self.effects
            .iter()
            .find(|e| e.kind == kind)
            .map_or(SourceType::Neutral, |e| e.source.source_type)
    }

    /// Marks that health reached zero.
    pub fn trigger_death(&mut self) {
        self.triggered_death = true;
    }

    /// True while a death is waiting to be handled.
    #[must_use]
    pub fn death_pending(&self) -> bool {
        self.triggered_death
    }

    /// Consumes the pending death flag.
    pub fn take_triggered_death(&mut self) -> bool {
        std::mem::take(&mut self.triggered_death)
    }

    fn clear_frame(&mut self) {
        self.damage = 0.0;
        self.damage_percent = 0.0;
        self.hpot = 0.0;
        self.hpot_percent = 0.0;
        self.mpot = 0.0;
        self.mpot_percent = 0.0;
        self.death_sentence = false;
    }

    fn aggregate(&mut self) {
        self.bonus.fill(0.0);
        self.bonus_multiplier.fill(1.0);
        self.bonus_primary.fill(0);
        self.stun = false;
        self.revive = false;
        self.convert = false;
        self.knockback_speed = 0.0;

        for effect in &self.effects {
            match effect.kind {
                EffectKind::Bonus { slot } => {
                    let v = self.bonus.get(slot) + effect.magnitude;
                    self.bonus.set(slot, v);
                },
                EffectKind::Multiplier { slot } => {
                    let v = self.bonus_multiplier.get(slot) * effect.magnitude;
                    self.bonus_multiplier.set(slot, v);
                },
                EffectKind::PrimaryBonus { primary } => {
                    if let Some(p) = self.bonus_primary.get_mut(primary) {
                        *p += effect.magnitude as i32;
                    }
                },
                EffectKind::Stun => self.stun = true,
                EffectKind::Revive => self.revive = true,
                EffectKind::Convert => self.convert = true,
                EffectKind::Knockback => self.knockback_speed += effect.magnitude,
                _ => {},
            }
        }
    }
}
