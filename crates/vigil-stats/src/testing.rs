//! In-memory collaborators for unit tests.

use crate::events::CombatEventBus;
use crate::layout::{DamageTypeDef, ElementDef, PrimaryStatDef, StatLayout, StatLayoutConfig};
use crate::messages::MessageCatalog;
use crate::power::PowerTable;
use crate::services::{
    CampaignTracker, CollideType, CollisionMap, CombatContext, HeroSnapshot, LootEntry,
    LootRequest, LootService, MovementType,
};
use crate::settings::CombatSettings;
use crate::template::HeroConfig;
use crate::xp::{XpScalingTable, XpTable};
use ahash::AHashSet;
use glam::Vec2;
use vigil_common::{EntityHandle, ItemId, Position, StatusId};

/// Two damage types, two elements and four primary stats.
pub fn layout_with_damage() -> StatLayout {
    let damage = |id: &str| DamageTypeDef {
        id: id.into(),
        name: id.into(),
        min: format!("dmg_{id}_min"),
        max: format!("dmg_{id}_max"),
    };
    let element = |id: &str| ElementDef {
        id: id.into(),
        name: id.into(),
        resist_id: format!("{id}_resist"),
    };
    let primary = |id: &str| PrimaryStatDef {
        id: id.into(),
        name: id.into(),
    };
    StatLayout::new(StatLayoutConfig {
        damage_types: vec![damage("melee"), damage("ment")],
        elements: vec![element("fire"), element("ice")],
        primary_stats: ["physical", "mental", "offense", "defense"]
            .into_iter()
            .map(primary)
            .collect(),
    })
    .expect("test layout")
}

#[derive(Debug, Default)]
pub struct FakeCampaign {
    names: Vec<String>,
    set: AHashSet<StatusId>,
    pub rewards: Vec<(f32, bool)>,
    pub set_calls: usize,
}

impl FakeCampaign {
    pub fn register(&mut self, name: &str) -> StatusId {
        self.register_status(name)
    }
}

impl CampaignTracker for FakeCampaign {
    fn register_status(&mut self, name: &str) -> StatusId {
        let index = match self.names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            },
        };
        StatusId::new(index as u32 + 1)
    }

    fn check_status(&self, id: StatusId) -> bool {
        self.set.contains(&id)
    }

    fn set_status(&mut self, id: StatusId) {
        self.set_calls += 1;
        self.set.insert(id);
    }

    fn reward_xp(&mut self, amount: f32, show_message: bool) {
        self.rewards.push((amount, show_message));
    }
}

#[derive(Debug, Default)]
pub struct FakeLoot {
    pub drops: Vec<(Option<EntityHandle>, ItemId)>,
    pub removed: Vec<EntityHandle>,
}

impl LootService for FakeLoot {
    fn add_enemy_loot(&mut self, request: &LootRequest<'_>) {
        self.drops.push((request.entity, request.quest_loot));
    }

    /// Reads `item,chance[,min,max]`.
    fn parse_loot(&mut self, line: &str) -> Option<LootEntry> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let item = fields.first()?.parse().ok()?;
        let chance = fields.get(1)?.parse().ok()?;
        let count_min = fields.get(2).map_or(Some(1), |f| f.parse().ok())?;
        let count_max = fields.get(3).map_or(Some(count_min), |f| f.parse().ok())?;
        Some(LootEntry {
            item: ItemId::new(item),
            chance,
            count_min,
            count_max,
        })
    }

    fn remove_from_enemies_dropping_loot(&mut self, entity: EntityHandle) {
        self.removed.push(entity);
    }
}

#[derive(Debug, Default)]
pub struct FakeCollision {
    pub blocked: Vec<(Position, bool)>,
    pub unblocked: Vec<Position>,
}

impl CollisionMap for FakeCollision {
    fn block(&mut self, pos: Position, ally: bool) {
        self.blocked.push((pos, ally));
    }

    fn unblock(&mut self, pos: Position) {
        self.blocked.retain(|(p, _)| *p != pos);
        self.unblocked.push(pos);
    }

    fn move_entity(
        &mut self,
        pos: &mut Position,
        delta: Vec2,
        _movement: MovementType,
        _collide: CollideType,
    ) -> bool {
        *pos = Position::from(pos.to_vec2() + delta);
        true
    }
}

/// Owns one of every collaborator and lends them out as a context.
pub struct FakeWorld {
    pub settings: CombatSettings,
    pub layout: StatLayout,
    pub powers: PowerTable,
    pub campaign: FakeCampaign,
    pub loot: FakeLoot,
    pub collision: FakeCollision,
    pub messages: MessageCatalog,
    pub xp_scaling: XpScalingTable,
    pub xp_table: XpTable,
    pub hero_config: Option<HeroConfig>,
    pub events: CombatEventBus,
}

impl FakeWorld {
    pub fn new(layout: StatLayout) -> Self {
        Self {
            settings: CombatSettings::default(),
            layout,
            powers: PowerTable::new(),
            campaign: FakeCampaign::default(),
            loot: FakeLoot::default(),
            collision: FakeCollision::default(),
            messages: MessageCatalog::new(),
            xp_scaling: XpScalingTable::new(),
            xp_table: XpTable::new(vec![0, 100, 300, 600]),
            hero_config: None,
            events: CombatEventBus::default(),
        }
    }

    pub fn ctx(&mut self) -> CombatContext<'_> {
        CombatContext {
            settings: &self.settings,
            layout: &self.layout,
            powers: &self.powers,
            campaign: &mut self.campaign,
            loot: &mut self.loot,
            collision: &mut self.collision,
            messages: &self.messages,
            xp_scaling: &self.xp_scaling,
            xp_table: &self.xp_table,
            hero_config: self.hero_config.as_ref(),
            events: &self.events,
            hero: HeroSnapshot::default(),
        }
    }
}
