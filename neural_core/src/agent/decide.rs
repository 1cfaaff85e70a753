//! Decide stage: turn controller output into an action and control signals.
//!
//! The first [`ActionKind::COUNT`] units of the final layer are action
//! logits; the next [`SIGNAL_COUNT`] are continuous signals.

use game_bridge::{ActionKind, Archetype};

use crate::kernels::Kernels;

/// Continuous signals following the action logits.
pub const SIGNAL_COUNT: usize = 6;

/// Final-layer units the decision reads.
pub const READOUT_WIDTH: usize = ActionKind::COUNT + SIGNAL_COUNT;

/// Upper bound of the learning-rate signal.
pub const MAX_LEARNING_RATE: f32 = 0.1;

/// Continuous outputs of one decision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signals {
    /// Each axis in [-1, 1].
    pub movement: [f32; 2],
    pub speed: f32,
    pub memory_write: f32,
    pub learning_rate: f32,
    pub intensity: f32,
}

fn unit(h: f32) -> f32 {
    ((h + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Map the signal units (each in (-1, 1)) onto their ranges.
pub fn read_signals(readout: &[f32]) -> Signals {
    let s = &readout[ActionKind::COUNT..READOUT_WIDTH];
    Signals {
        movement: [s[0].clamp(-1.0, 1.0), s[1].clamp(-1.0, 1.0)],
        speed: unit(s[2]),
        memory_write: unit(s[3]),
        learning_rate: unit(s[4]) * MAX_LEARNING_RATE,
        intensity: unit(s[5]),
    }
}

/// Build the action distribution into `probs`.
///
/// Softmax over scaled logits, then the archetype's multiplicative biases,
/// then the affordance mask: without an interlocutor, actions that need one
/// get zero mass. The result is renormalized, so it always sums to one.
pub fn action_distribution(
    kernels: &dyn Kernels,
    readout: &[f32],
    logit_scale: f32,
    archetype: Archetype,
    has_interlocutor: bool,
    probs: &mut [f32],
) {
    for (p, h) in probs.iter_mut().zip(&readout[..ActionKind::COUNT]) {
        *p = h * logit_scale;
    }
    kernels.softmax(probs);
    for &(action, bias) in archetype.action_biases() {
        probs[action.index()] *= bias;
    }
    if !has_interlocutor {
        for action in ActionKind::ALL {
            if action.needs_interlocutor() {
                probs[action.index()] = 0.0;
            }
        }
    }
    let total: f32 = probs.iter().sum();
    if total > 0.0 && total.is_finite() {
        for p in probs.iter_mut() {
            *p /= total;
        }
    } else {
        probs.fill(0.0);
        probs[ActionKind::None.index()] = 1.0;
    }
}

/// Pick the first action whose cumulative probability reaches `u`.
///
/// Zero-probability actions are never picked, even at `u == 0`. Rounding can
/// leave the cumulative sum just below `u`; the most likely action is chosen
/// then. Ties go to the lower index.
pub fn sample(probs: &[f32], u: f32) -> ActionKind {
    let mut cumulative = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cumulative += p;
        if *p > 0.0 && u <= cumulative {
            return ActionKind::from_index(i).unwrap_or_default();
        }
    }
    most_likely(probs)
}

pub fn most_likely(probs: &[f32]) -> ActionKind {
    let mut best = (0, f32::NEG_INFINITY);
    for (i, &p) in probs.iter().enumerate() {
        if p > best.1 {
            best = (i, p);
        }
    }
    ActionKind::from_index(best.0).unwrap_or_default()
}

/// Gradient of `log probs[action]` with respect to the final hidden vector.
///
/// Biases and the mask act as fixed offsets on the logits, so the gradient
/// on logit `j` is `onehot_j − probs_j`, scaled by the logit scale. Signal
/// units and any extra units get zero.
pub fn policy_gradient(probs: &[f32], action: ActionKind, logit_scale: f32, d_hidden: &mut [f32]) {
    d_hidden.fill(0.0);
    for (j, (d, p)) in d_hidden.iter_mut().zip(probs).enumerate() {
        let target = if j == action.index() { 1.0 } else { 0.0 };
        *d = logit_scale * (target - p);
    }
}
