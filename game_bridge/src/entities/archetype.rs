//! Personality archetypes.

use serde::{Deserialize, Serialize};

use crate::mechanics::{ActionKind, Emotion};
use crate::perception::SensoryRegion;

/// Personality archetype chosen when an agent is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Archetype {
    /// Brave, direct, loyal.
    #[default]
    Warrior,
    /// Curious, analytical, patient.
    Scholar,
    /// Social, opportunistic, practical.
    Merchant,
    /// Independent, clever, mistrustful.
    Rogue,
    /// Protective, dutiful, conservative.
    Guardian,
    /// Adventurous, free-spirited, restless.
    Wanderer,
    /// Intuitive, philosophical, mysterious.
    Mystic,
    /// Methodical, perfectionist, humble.
    Craftsman,
}

/// Basic emotions followed by the five personality traits.
type Template = [f32; 13];

impl Archetype {
    pub const ALL: [Archetype; 8] = [
        Archetype::Warrior,
        Archetype::Scholar,
        Archetype::Merchant,
        Archetype::Rogue,
        Archetype::Guardian,
        Archetype::Wanderer,
        Archetype::Mystic,
        Archetype::Craftsman,
    ];

    fn template(self) -> Template {
        //     trust fear anger joy  cur  resp aff  lone | extra agree consc neuro open
        match self {
            Archetype::Warrior => [0.7, 0.2, 0.6, 0.5, 0.3, 0.8, 0.4, 0.3, 0.6, 0.5, 0.8, -0.6, 0.2],
            Archetype::Scholar => [0.5, 0.4, 0.2, 0.6, 0.9, 0.7, 0.5, 0.4, -0.2, 0.3, 0.9, -0.3, 0.9],
            Archetype::Merchant => [0.6, 0.3, 0.3, 0.8, 0.6, 0.5, 0.6, 0.2, 0.8, 0.7, 0.6, -0.4, 0.5],
            Archetype::Rogue => [0.3, 0.5, 0.4, 0.4, 0.7, 0.4, 0.3, 0.6, -0.3, -0.5, 0.3, 0.2, 0.8],
            Archetype::Guardian => [0.8, 0.3, 0.5, 0.6, 0.2, 0.9, 0.7, 0.4, 0.2, 0.8, 0.9, -0.7, -0.4],
            Archetype::Wanderer => [0.5, 0.2, 0.3, 0.8, 0.9, 0.5, 0.4, 0.5, 0.5, 0.4, -0.3, -0.5, 0.9],
            Archetype::Mystic => [0.4, 0.3, 0.2, 0.7, 0.8, 0.6, 0.5, 0.6, -0.5, 0.2, 0.4, 0.1, 0.9],
            Archetype::Craftsman => [0.7, 0.4, 0.3, 0.6, 0.5, 0.8, 0.6, 0.5, -0.1, 0.6, 0.9, -0.2, 0.3],
        }
    }

    /// Baseline affect vector; everything past the traits starts at zero.
    pub fn baseline(self) -> [f32; Emotion::COUNT] {
        let mut baseline = [0.0; Emotion::COUNT];
        let template = self.template();
        baseline[..template.len()].copy_from_slice(&template);
        baseline
    }

    /// Baseline value of one affect component.
    pub fn trait_value(self, emotion: Emotion) -> f32 {
        self.baseline()[emotion.index()]
    }

    /// Sensory region this archetype watches from the start, with its initial attention.
    pub fn attention_focus(self) -> (SensoryRegion, f32) {
        match self {
            Archetype::Warrior => (SensoryRegion::Audio, 0.8),
            Archetype::Scholar => (SensoryRegion::Context, 0.9),
            Archetype::Merchant => (SensoryRegion::Social, 0.9),
            Archetype::Rogue => (SensoryRegion::Vision, 0.7),
            Archetype::Guardian => (SensoryRegion::Social, 0.8),
            Archetype::Wanderer => (SensoryRegion::Context, 0.7),
            Archetype::Mystic => (SensoryRegion::Internal, 0.9),
            Archetype::Craftsman => (SensoryRegion::Vision, 0.8),
        }
    }

    /// Multiplier applied to novelty boosts inside a region.
    pub fn region_bias(self, region: SensoryRegion) -> f32 {
        if self.attention_focus().0 == region {
            1.5
        } else {
            1.0
        }
    }

    /// Multiplicative preferences applied to the action distribution.
    pub fn action_biases(self) -> &'static [(ActionKind, f32)] {
        match self {
            Archetype::Warrior => &[
                (ActionKind::AttackMelee, 1.5),
                (ActionKind::Defend, 1.3),
                (ActionKind::Retreat, 0.5),
            ],
            Archetype::Scholar => &[
                (ActionKind::AskQuestion, 1.8),
                (ActionKind::RecallMemory, 1.5),
                (ActionKind::AttackMelee, 0.3),
            ],
            Archetype::Merchant => &[
                (ActionKind::OfferTrade, 1.6),
                (ActionKind::GreetFriendly, 1.4),
                (ActionKind::AttackMelee, 0.2),
            ],
            Archetype::Rogue => &[
                (ActionKind::Retreat, 1.4),
                (ActionKind::AttackRanged, 1.3),
                (ActionKind::GreetFriendly, 0.7),
            ],
            Archetype::Guardian => &[
                (ActionKind::Defend, 1.6),
                (ActionKind::GreetNeutral, 1.2),
                (ActionKind::AttackRanged, 0.8),
            ],
            Archetype::Wanderer => &[
                (ActionKind::RecallMemory, 1.4),
                (ActionKind::TellStory, 1.3),
                (ActionKind::Defend, 0.7),
            ],
            Archetype::Mystic => &[
                (ActionKind::ExpressEmotion, 1.5),
                (ActionKind::AskQuestion, 1.2),
                (ActionKind::AttackMelee, 0.4),
            ],
            Archetype::Craftsman => &[
                (ActionKind::OfferTrade, 1.3),
                (ActionKind::GreetFriendly, 1.1),
                (ActionKind::AttackRanged, 0.8),
            ],
        }
    }

    /// Whether the sound of combat lifts this archetype's mood instead of scaring it.
    pub fn relishes_combat(self) -> bool {
        self == Archetype::Warrior
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanics::AffectRange;

    #[test]
    fn test_baselines_respect_declared_ranges() {
        for archetype in Archetype::ALL {
            let baseline = archetype.baseline();
            for emotion in Emotion::ALL {
                assert!(
                    emotion.range().contains(baseline[emotion.index()]),
                    "{archetype} {emotion:?} out of range"
                );
            }
            assert_eq!(baseline[Emotion::TimeTogether.index()], 0.0);
        }
    }

    #[test]
    fn test_template_values() {
        assert!((Archetype::Scholar.trait_value(Emotion::Curiosity) - 0.9).abs() < 0.001);
        assert!((Archetype::Guardian.trait_value(Emotion::Neuroticism) + 0.7).abs() < 0.001);
        assert_eq!(AffectRange::Signed, Emotion::Openness.range());
    }

    #[test]
    fn test_region_bias() {
        assert_eq!(Archetype::Warrior.region_bias(SensoryRegion::Audio), 1.5);
        assert_eq!(Archetype::Warrior.region_bias(SensoryRegion::Social), 1.0);
    }

    #[test]
    fn test_every_archetype_has_biases() {
        for archetype in Archetype::ALL {
            assert_eq!(archetype.action_biases().len(), 3);
            assert!(archetype.action_biases().iter().all(|(_, m)| *m > 0.0));
        }
    }
}
