//! # Vigil Stats
//!
//! Per-entity attributes and combat resolution.
//!
//! This crate provides:
//! - Stat layout (core stats, damage types, elements, primary stats)
//! - Timed effects and their per-frame aggregates
//! - `StatBlock` recompute pipeline and per-frame logic
//! - Damage, death and kill rewards
//! - Entity arena with summon ownership and party buffs
//! - AI power selection and power-use checks
//! - Content templates, XP tables and save snapshots
//! - Combat settings and the combat event bus

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ai;
pub mod arena;
pub mod block;
pub mod combat;
pub mod effects;
pub mod events;
pub mod layout;
pub mod messages;
pub mod power;
pub mod services;
pub mod settings;
pub mod snapshot;
pub mod template;
pub mod timer;
pub mod xp;

#[cfg(test)]
mod testing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ai::*;
    pub use crate::arena::*;
    pub use crate::block::*;
    pub use crate::combat::*;
    pub use crate::effects::*;
    pub use crate::events::*;
    pub use crate::layout::*;
    pub use crate::messages::*;
    pub use crate::power::*;
    pub use crate::services::*;
    pub use crate::settings::*;
    pub use crate::snapshot::*;
    pub use crate::template::*;
    pub use crate::timer::*;
    pub use crate::xp::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{layout_with_damage, FakeWorld};
    use vigil_common::{PowerId, Position};

    #[test]
    fn test_summoner_fight_end_to_end() {
        let layout = layout_with_damage();
        let mut world = FakeWorld::new(layout.clone());
        world.powers.insert(
            PowerDef::new(PowerId::new(3), "Raise Skeleton")
                .with_kind(PowerKind::Spawn)
                .with_spawn_limit(SpawnLimit::Fixed { count: 2 }),
        );
        let necromancer = EntityTemplate::parse(
            r#"
name = "Necromancer"
level = 3
stat = [{ stat = "hp", value = 30.0 }]

[[powers]]
trigger = "beacon"
power = 3
chance = 100
"#,
        )
        .expect("necromancer");
        let mut skeleton = EntityTemplate {
            name: "Skeleton".into(),
            ..EntityTemplate::default()
        };
        skeleton.stats.stat.push(StatValue {
            stat: "hp".into(),
            value: 10.0,
        });

        let mut ctx = world.ctx();
        let mut arena = EntityArena::new();
        let (block, errors) = necromancer.build(&mut ctx);
        assert!(errors.is_empty());
        let boss = arena.insert(block);
        let mut rng = fastrand::Rng::with_seed(3);

        let mut raised = Vec::new();
        while let Some(pick) = arena.ai_power(boss, AiTrigger::Beacon, ctx.powers, &mut rng) {
            let (mut minion, _) = skeleton.build(&mut ctx);
            minion.pos = Position::new(1.0, 1.0);
            raised.push(arena.spawn_summon(boss, minion, pick.power).expect("spawn"));
            assert!(raised.len() <= 2);
        }
        assert_eq!(raised.len(), 2);

        arena.take_damage(boss, 100.0, false, SourceType::Hero, &mut ctx);
        let deaths = arena.logic(&mut ctx);
        assert_eq!(deaths, vec![boss, raised[0], raised[1]]);
        for minion in &raised {
            assert!(arena.get(*minion).expect("minion").cur_state.is_dead());
        }

        let events = ctx.events.drain();
        assert!(events.contains(&CombatEvent::SummonsRemoved {
            entity: Some(boss),
            count: 2,
        }));
        drop(ctx);
        assert_eq!(world.campaign.rewards.len(), 3);
    }
}
