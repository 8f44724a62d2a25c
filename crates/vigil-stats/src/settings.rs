//! Combat settings.
//!
//! Tunables shared by every stat block in a session. Settings can be loaded
//! from and saved to a TOML file; a missing or unreadable file yields the
//! defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, warn};
use vigil_common::SettingsError;

/// Settings file name.
pub const SETTINGS_FILE: &str = "combat.toml";

/// What happens when the player-controlled entity reaches zero health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerDeathPolicy {
    /// Restore health and enter the hit state; the hero never stays dead.
    #[default]
    Respawn,
    /// Resolve death like any other entity (no rewards or loot).
    Permadeath,
}

/// Session-wide combat settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSettings {
    /// Simulation frames per second
    pub max_frames_per_sec: u32,
    /// Percent of kill XP granted when an ally lands the killing blow
    pub party_exp_percentage: f32,
    /// Seconds for an idle, out-of-combat enemy to regenerate to full
    pub out_of_combat_regen_seconds: f32,
    /// Player death handling
    pub player_death: PlayerDeathPolicy,
    /// Hero global cooldown between powers (ms)
    pub global_cooldown_ms: u32,
    /// Default pause at each waypoint (ms)
    pub waypoint_pause_ms: u32,
    /// Default flee duration (ms)
    pub flee_duration_ms: u32,
    /// Default flee cooldown (ms)
    pub flee_cooldown_ms: u32,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            max_frames_per_sec: 60,
            party_exp_percentage: 100.0,
            out_of_combat_regen_seconds: 5.0,
            player_death: PlayerDeathPolicy::Respawn,
            global_cooldown_ms: 66,
            waypoint_pause_ms: 1000,
            flee_duration_ms: 1000,
            flee_cooldown_ms: 1000,
        }
    }
}

impl CombatSettings {
    /// Load settings from a path.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Combat settings not found, using defaults");
            return Self::default();
        }
        match Self::try_load_from(path) {
            Ok(settings) => {
                info!("Loaded combat settings from {}", path.display());
                settings
            },
            Err(e) => {
                warn!("Failed to load combat settings: {e}");
                Self::default()
            },
        }
    }

    /// Load settings from a path, reporting failures.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self =
            toml::from_str(&contents).map_err(|e| SettingsError::Serialization(e.to_string()))?;
        settings.validate();
        Ok(settings)
    }

    /// Save settings to a path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved combat settings to {}", path.display());
        Ok(())
    }

    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.max_frames_per_sec = self.max_frames_per_sec.clamp(1, 1000);
        self.party_exp_percentage = self.party_exp_percentage.max(0.0);
        self.out_of_combat_regen_seconds = self.out_of_combat_regen_seconds.max(0.0);
    }

    /// Converts milliseconds to whole frames, rounding up.
    #[must_use]
    pub fn frames_from_millis(&self, ms: u32) -> u32 {
        let fps = u64::from(self.max_frames_per_sec.max(1));
        ((u64::from(ms) * fps).div_ceil(1000)) as u32
    }

    /// Converts a per-second rate to a per-frame amount.
    #[must_use]
    pub fn per_frame(&self, per_second: f32) -> f32 {
        per_second / self.max_frames_per_sec.max(1) as f32
    }
}
