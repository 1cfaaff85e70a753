//! Interaction context supplied alongside each sensory snapshot.

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};

/// Maximum length of the shared-experience phrase.
pub const EXPERIENCE_PHRASE_CAPACITY: usize = 128;

/// What is going on between the agent and the player right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionContext {
    pub in_conversation: bool,
    /// Seconds since the conversation began.
    pub conversation_duration: f32,
    /// Perceived tone of the player, -1 (hostile) to 1 (friendly).
    pub player_tone: f32,
    /// Perceived danger, [0, 1].
    pub threat_level: f32,
    /// The agent is alone with the player.
    pub private_setting: bool,
    pub urgency: f32,
    pub shared_goal_alignment: f32,
    /// Short phrase used by story and recall lines, e.g. "crossed the marsh".
    pub recent_shared_experience: ArrayString<EXPERIENCE_PHRASE_CAPACITY>,
}

impl Default for InteractionContext {
    fn default() -> Self {
        Self {
            in_conversation: false,
            conversation_duration: 0.0,
            player_tone: 0.0,
            threat_level: 0.0,
            private_setting: false,
            urgency: 0.0,
            shared_goal_alignment: 0.0,
            recent_shared_experience: ArrayString::new(),
        }
    }
}

impl InteractionContext {
    /// No conversation, no threat.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A warm conversation with the player.
    pub fn friendly() -> Self {
        Self {
            in_conversation: true,
            player_tone: 0.8,
            ..Self::default()
        }
    }

    /// A conversation where the player is openly hostile.
    pub fn hostile() -> Self {
        Self {
            in_conversation: true,
            player_tone: -0.8,
            ..Self::default()
        }
    }

    pub fn with_threat(mut self, threat: f32) -> Self {
        self.threat_level = threat.clamp(0.0, 1.0);
        self
    }

    /// Set the shared-experience phrase, truncating at a character boundary.
    pub fn with_shared_experience(mut self, phrase: &str) -> Self {
        self.recent_shared_experience.clear();
        for ch in phrase.chars() {
            if self.recent_shared_experience.try_push(ch).is_err() {
                break;
            }
        }
        self
    }

    /// Friendly enough to count as a positive interaction.
    pub fn is_positive(&self) -> bool {
        self.in_conversation && self.player_tone > 0.5
    }

    /// Hostile enough to count as a negative interaction.
    pub fn is_negative(&self) -> bool {
        self.in_conversation && self.player_tone < -0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_classification() {
        assert!(InteractionContext::friendly().is_positive());
        assert!(!InteractionContext::friendly().is_negative());
        assert!(InteractionContext::hostile().is_negative());
        assert!(!InteractionContext::idle().is_positive());
    }

    #[test]
    fn test_shared_experience_truncates() {
        let long = "x".repeat(EXPERIENCE_PHRASE_CAPACITY + 40);
        let ctx = InteractionContext::idle().with_shared_experience(&long);
        assert_eq!(ctx.recent_shared_experience.len(), EXPERIENCE_PHRASE_CAPACITY);

        let ctx = InteractionContext::friendly().with_shared_experience("crossed the marsh");
        assert_eq!(ctx.recent_shared_experience.as_str(), "crossed the marsh");
    }
}
