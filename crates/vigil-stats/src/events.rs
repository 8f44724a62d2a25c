//! Combat event bus.
//!
//! Stat blocks report combat text and state changes here instead of calling
//! into presentation code. Publishing never blocks and never affects the
//! simulation; a full bus drops events.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use vigil_common::{EntityHandle, PowerId, Position};

/// Something observable that happened to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Damage over time landed
    Damaged {
        /// Entity hurt
        entity: Option<EntityHandle>,
        /// Where it stands
        pos: Position,
        /// Damage before shields
        amount: f32,
    },
    /// Health or mana restored over time
    Healed {
        /// Entity healed
        entity: Option<EntityHandle>,
        /// Where it stands
        pos: Position,
        /// Combat text
        text: String,
    },
    /// Health reached zero
    Died {
        /// Entity that died
        entity: Option<EntityHandle>,
        /// Killed by a critical hit with critical death enabled
        critical: bool,
    },
    /// The hero reached zero health and was restored
    Respawned {
        /// Hero entity
        entity: Option<EntityHandle>,
    },
    /// Brought back by a revive effect
    Revived {
        /// Entity revived
        entity: Option<EntityHandle>,
    },
    /// Disposition flipped
    Converted {
        /// Entity converted
        entity: Option<EntityHandle>,
        /// Now fighting for the hero
        allied: bool,
    },
    /// Primary stats changed through effects
    StatsChanged {
        /// Entity affected
        entity: Option<EntityHandle>,
    },
    /// Summons were force-killed
    SummonsRemoved {
        /// Summoner
        entity: Option<EntityHandle>,
        /// Number of direct summons killed
        count: usize,
    },
    /// A party buff reached a member
    PartyBuffApplied {
        /// Caster
        source: EntityHandle,
        /// Party member
        target: EntityHandle,
        /// Power broadcast
        power: PowerId,
    },
}

/// Bounded, non-blocking queue of combat events.
#[derive(Debug)]
pub struct CombatEventBus {
    sender: Sender<CombatEvent>,
    receiver: Receiver<CombatEvent>,
    capacity: usize,
}

impl Default for CombatEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl CombatEventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
