//! Affect vector layout.

use serde::{Deserialize, Serialize};

/// Components of the 32-wide affect vector.
///
/// Basic emotions come first, then personality traits, relationship
/// counters, situational context and remembered impressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Emotion {
    // Basic emotions, [0, 1]
    Trust = 0,
    Fear,
    Anger,
    #[default]
    Joy,
    Curiosity,
    Respect,
    Affection,
    Loneliness,

    // Personality traits, [-1, 1]
    Extraversion,
    Agreeableness,
    Conscientiousness,
    Neuroticism,
    Openness,

    // Relationship history counters
    PositiveInteractions,
    NegativeInteractions,
    SharedVictories,
    Betrayals,
    GiftsReceived,
    FavorsDone,
    /// Seconds spent in conversation.
    TimeTogether,

    // Situational context
    LocationFamiliarity,
    SocialSetting,
    ThreatLevel,
    PlayerMood,
    RelationshipStatus,
    SharedGoalProgress,

    // Remembered impressions
    FirstMeetingQuality,
    LastInteractionQuality,
    StrongestPositiveMemory,
    StrongestNegativeMemory,
    PlayerCombatStyle,
    PlayerPreferences,
}

/// Declared value range of an affect component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffectRange {
    /// [0, 1]
    Unit,
    /// [-1, 1]
    Signed,
    /// [0, +inf)
    Counter,
}

impl AffectRange {
    pub fn bounds(self) -> (f32, f32) {
        match self {
            AffectRange::Unit => (0.0, 1.0),
            AffectRange::Signed => (-1.0, 1.0),
            AffectRange::Counter => (0.0, f32::INFINITY),
        }
    }

    pub fn clamp(self, value: f32) -> f32 {
        let (lo, hi) = self.bounds();
        value.clamp(lo, hi)
    }

    pub fn contains(self, value: f32) -> bool {
        let (lo, hi) = self.bounds();
        value >= lo && value <= hi
    }
}

impl Emotion {
    /// Width of the affect vector.
    pub const COUNT: usize = 32;

    /// Number of basic emotions at the head of the vector.
    pub const BASIC_COUNT: usize = 8;

    pub const ALL: [Emotion; Self::COUNT] = [
        Emotion::Trust,
        Emotion::Fear,
        Emotion::Anger,
        Emotion::Joy,
        Emotion::Curiosity,
        Emotion::Respect,
        Emotion::Affection,
        Emotion::Loneliness,
        Emotion::Extraversion,
        Emotion::Agreeableness,
        Emotion::Conscientiousness,
        Emotion::Neuroticism,
        Emotion::Openness,
        Emotion::PositiveInteractions,
        Emotion::NegativeInteractions,
        Emotion::SharedVictories,
        Emotion::Betrayals,
        Emotion::GiftsReceived,
        Emotion::FavorsDone,
        Emotion::TimeTogether,
        Emotion::LocationFamiliarity,
        Emotion::SocialSetting,
        Emotion::ThreatLevel,
        Emotion::PlayerMood,
        Emotion::RelationshipStatus,
        Emotion::SharedGoalProgress,
        Emotion::FirstMeetingQuality,
        Emotion::LastInteractionQuality,
        Emotion::StrongestPositiveMemory,
        Emotion::StrongestNegativeMemory,
        Emotion::PlayerCombatStyle,
        Emotion::PlayerPreferences,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn range(self) -> AffectRange {
        match self.index() {
            0..=7 => AffectRange::Unit,
            13..=19 => AffectRange::Counter,
            _ => AffectRange::Signed,
        }
    }

    pub fn is_basic(self) -> bool {
        self.index() < Self::BASIC_COUNT
    }

    /// Whether the component drifts back toward its baseline.
    ///
    /// Only basic emotions and traits do. Counters accumulate, context is
    /// overwritten every tick and impressions are kept until replaced.
    pub fn decays(self) -> bool {
        self.index() <= Emotion::Openness.index()
    }
}

/// How an agent regards the player, read off its relationship level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Opinion {
    Hostile,
    Distrustful,
    #[default]
    Neutral,
    Friendly,
    Devoted,
}

impl Opinion {
    /// Bucket a relationship level in [-1, 1]. NaN reads as neutral.
    pub fn from_level(level: f32) -> Self {
        match level {
            l if l < -0.5 => Opinion::Hostile,
            l if l < -0.15 => Opinion::Distrustful,
            l if l <= 0.15 => Opinion::Neutral,
            l if l <= 0.5 => Opinion::Friendly,
            l if l > 0.5 => Opinion::Devoted,
            _ => Opinion::Neutral,
        }
    }

    /// One line the agent would say about the player.
    pub fn describe(self) -> &'static str {
        match self {
            Opinion::Hostile => "I want nothing to do with them.",
            Opinion::Distrustful => "I keep an eye on that one.",
            Opinion::Neutral => "I hardly know them.",
            Opinion::Friendly => "Good company, that one.",
            Opinion::Devoted => "I would follow them anywhere.",
        }
    }
}

impl std::fmt::Display for Opinion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Opinion::Hostile => "hostile",
            Opinion::Distrustful => "distrustful",
            Opinion::Neutral => "neutral",
            Opinion::Friendly => "friendly",
            Opinion::Devoted => "devoted",
        })
    }
}
