//! Rule-based behavior used when the controller cannot run.

use game_bridge::{ActionDecision, ActionKind, InteractionContext};

use super::sense::Percept;

/// Pick a conservative action without touching any learned state.
///
/// Danger wins over conversation: a threatened agent backs away at full
/// speed, an addressed agent answers with a neutral greeting, and anything
/// else idles. The decision is flagged as degraded.
pub fn rule_based(percept: &Percept, context: &InteractionContext, decision: &mut ActionDecision) {
    let threatened = percept.threat > 0.5 || percept.combat > 0.5;
    let addressed = context.in_conversation || percept.player_speaking;
    let (action, speed) = if threatened {
        (ActionKind::Retreat, 1.0)
    } else if addressed {
        (ActionKind::GreetNeutral, 0.0)
    } else {
        (ActionKind::None, 0.0)
    };

    decision.action = action;
    decision.confidence = 1.0;
    decision.intensity = if threatened { 1.0 } else { 0.5 };
    decision.movement = [0.0; 2];
    decision.speed = speed;
    decision.memory_write_signal = 0.0;
    decision.learning_rate = 0.0;
    decision.degraded = true;
}
