//! Per-tick inputs and outputs exchanged with the brain.

mod decision;
mod interaction;

pub use decision::*;
pub use interaction::*;

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Side length of the square visual field.
pub const VISUAL_FIELD_SIZE: usize = 16;

/// Number of audio spectrum bins.
pub const AUDIO_BINS: usize = 32;

/// Width of the fused sensory channel vector.
pub const CHANNEL_COUNT: usize = 512;

/// Contiguous block of the sensory channel vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensoryRegion {
    /// 16x16 visual grid, row-major.
    Vision,
    /// Audio spectrum bins.
    Audio,
    /// Signals about the player and the social situation.
    Social,
    /// Needs and goals.
    Internal,
    /// Location, time and derived summaries.
    Context,
}

impl SensoryRegion {
    pub const ALL: [SensoryRegion; 5] = [
        SensoryRegion::Vision,
        SensoryRegion::Audio,
        SensoryRegion::Social,
        SensoryRegion::Internal,
        SensoryRegion::Context,
    ];

    pub fn range(self) -> Range<usize> {
        match self {
            SensoryRegion::Vision => 0..256,
            SensoryRegion::Audio => 256..288,
            SensoryRegion::Social => 288..320,
            SensoryRegion::Internal => 320..352,
            SensoryRegion::Context => 352..CHANNEL_COUNT,
        }
    }

    /// Region that owns a channel index.
    pub fn of_channel(channel: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.range().contains(&channel))
    }
}

/// Raw sensory input for one tick, produced by the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorySnapshot {
    /// Brightness/salience per cell, [0, 1].
    pub visual_field: [[f32; VISUAL_FIELD_SIZE]; VISUAL_FIELD_SIZE],
    pub player_visible: f32,
    /// Normalized distance, 0 = adjacent.
    pub player_distance: f32,
    pub player_facing: f32,

    /// Energy per frequency bin, low frequencies first.
    pub audio_spectrum: [f32; AUDIO_BINS],
    pub player_speaking: f32,
    pub combat_sounds: f32,
    pub ambient_threat: f32,

    pub player_emotional_state: f32,
    pub conversation_context: f32,
    pub social_pressure: f32,
    pub intimacy: f32,

    pub hunger: f32,
    pub energy: f32,
    pub health: f32,
    pub goal_priority: f32,

    pub location_type: f32,
    pub time_of_day: f32,
    pub weather: f32,
    pub familiarity: f32,
}

impl Default for SensorySnapshot {
    fn default() -> Self {
        Self {
            visual_field: [[0.0; VISUAL_FIELD_SIZE]; VISUAL_FIELD_SIZE],
            player_visible: 0.0,
            player_distance: 1.0,
            player_facing: 0.0,
            audio_spectrum: [0.0; AUDIO_BINS],
            player_speaking: 0.0,
            combat_sounds: 0.0,
            ambient_threat: 0.0,
            player_emotional_state: 0.0,
            conversation_context: 0.0,
            social_pressure: 0.0,
            intimacy: 0.0,
            hunger: 0.0,
            energy: 1.0,
            health: 1.0,
            goal_priority: 0.0,
            location_type: 0.0,
            time_of_day: 0.5,
            weather: 0.0,
            familiarity: 0.5,
        }
    }
}

impl SensorySnapshot {
    /// An empty scene: nobody around, nothing to hear.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Place the player in view at the given normalized distance.
    pub fn with_player(mut self, distance: f32) -> Self {
        self.player_visible = 1.0;
        self.player_distance = distance.clamp(0.0, 1.0);
        self.player_facing = 1.0;
        let center = VISUAL_FIELD_SIZE / 2;
        self.visual_field[center][center] = 1.0;
        self
    }

    /// Fill the low end of the spectrum with combat noise.
    pub fn with_combat(mut self, loudness: f32) -> Self {
        let loudness = loudness.clamp(0.0, 1.0);
        self.combat_sounds = loudness;
        for bin in self.audio_spectrum.iter_mut().take(AUDIO_BINS / 4) {
            *bin = loudness;
        }
        self
    }

    /// True if any field holds NaN or an infinity.
    pub fn has_non_finite(&self) -> bool {
        let scalars = [
            self.player_visible,
            self.player_distance,
            self.player_facing,
            self.player_speaking,
            self.combat_sounds,
            self.ambient_threat,
            self.player_emotional_state,
            self.conversation_context,
            self.social_pressure,
            self.intimacy,
            self.hunger,
            self.energy,
            self.health,
            self.goal_priority,
            self.location_type,
            self.time_of_day,
            self.weather,
            self.familiarity,
        ];
        self.visual_field.iter().flatten().any(|v| !v.is_finite())
            || self.audio_spectrum.iter().any(|v| !v.is_finite())
            || scalars.iter().any(|v| !v.is_finite())
    }
}
