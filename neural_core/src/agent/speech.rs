//! Template speech lines.

use game_bridge::{ActionDecision, ActionKind, Emotion, InteractionContext};

use super::affect::AffectState;

fn shared_experience(context: &InteractionContext) -> &str {
    if context.recent_shared_experience.is_empty() {
        "first met"
    } else {
        context.recent_shared_experience.as_str()
    }
}

/// Fill `decision.speech` for the chosen action. Silent actions clear it.
pub fn compose(decision: &mut ActionDecision, affect: &AffectState, context: &InteractionContext) {
    decision.speech.clear();
    let line = match decision.action {
        ActionKind::GreetFriendly => {
            if affect.get(Emotion::Joy) > 0.7 {
                "Hello there, friend! What brings you here?"
            } else if affect.get(Emotion::Trust) > 0.6 {
                "Good to see you again."
            } else {
                "Greetings."
            }
        }
        ActionKind::GreetNeutral => "Hello.",
        ActionKind::GreetHostile => {
            if affect.get(Emotion::Anger) > 0.7 {
                "What do you want?"
            } else if affect.get(Emotion::Fear) > 0.6 {
                "Stay back..."
            } else {
                "I don't have time for this."
            }
        }
        ActionKind::TellStory => {
            decision.push_speech("Let me tell you about the time we ");
            decision.push_speech(shared_experience(context));
            "..."
        }
        ActionKind::AskQuestion => {
            if affect.get(Emotion::Curiosity) > 0.7 {
                "I've been wondering... what do you think about recent events?"
            } else {
                "How have you been?"
            }
        }
        ActionKind::ExpressEmotion => match decision.dominant_emotion {
            Emotion::Joy => "I'm feeling quite happy today!",
            Emotion::Fear => "Something doesn't feel right...",
            Emotion::Anger => "This is frustrating!",
            Emotion::Loneliness => "It's good to have someone to talk to.",
            _ => "I'm feeling... complicated.",
        },
        ActionKind::Defend => "Stay behind me!",
        ActionKind::Retreat => "I'm getting out of here!",
        ActionKind::OfferTrade => "I have some items that might interest you.",
        ActionKind::AcceptTrade => "You have a deal.",
        ActionKind::DeclineTrade => "I'll have to pass.",
        ActionKind::RecallMemory => {
            decision.push_speech("That reminds me of when we ");
            decision.push_speech(shared_experience(context));
            " together."
        }
        ActionKind::ShareExperience => {
            decision.push_speech("Remember when we ");
            decision.push_speech(shared_experience(context));
            "?"
        }
        _ => "",
    };
    decision.push_speech(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_bridge::Archetype;

    fn speak(action: ActionKind, archetype: Archetype, context: &InteractionContext) -> String {
        let mut decision = ActionDecision::new();
        decision.action = action;
        let affect = AffectState::new(archetype);
        decision.dominant_emotion = affect.dominant().0;
        compose(&mut decision, &affect, context);
        decision.speech.to_string()
    }

    #[test]
    fn test_greeting_depends_on_mood() {
        let idle = InteractionContext::idle();
        assert_eq!(
            speak(ActionKind::GreetFriendly, Archetype::Merchant, &idle),
            "Hello there, friend! What brings you here?"
        );
        assert_eq!(
            speak(ActionKind::GreetFriendly, Archetype::Guardian, &idle),
            "Good to see you again."
        );
        assert_eq!(speak(ActionKind::GreetFriendly, Archetype::Rogue, &idle), "Greetings.");
    }

    #[test]
    fn test_story_uses_shared_experience() {
        let context = InteractionContext::friendly().with_shared_experience("crossed the marsh");
        assert_eq!(
            speak(ActionKind::TellStory, Archetype::Wanderer, &context),
            "Let me tell you about the time we crossed the marsh..."
        );
        assert_eq!(
            speak(ActionKind::RecallMemory, Archetype::Wanderer, &InteractionContext::idle()),
            "That reminds me of when we first met together."
        );
    }

    #[test]
    fn test_silent_actions() {
        let idle = InteractionContext::idle();
        assert!(speak(ActionKind::None, Archetype::Warrior, &idle).is_empty());
        assert!(speak(ActionKind::MoveNorth, Archetype::Warrior, &idle).is_empty());
    }

    #[test]
    fn test_long_phrase_is_truncated() {
        let long = "x".repeat(200);
        let context = InteractionContext::idle().with_shared_experience(&long);
        let line = speak(ActionKind::TellStory, Archetype::Scholar, &context);
        assert!(line.len() <= game_bridge::SPEECH_CAPACITY);
    }
}
