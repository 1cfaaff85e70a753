//! The decision record handed back to the game every tick.

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};

use super::CHANNEL_COUNT;
use crate::mechanics::{ActionKind, Emotion};

/// Maximum length of a speech line.
pub const SPEECH_CAPACITY: usize = 256;

/// Everything the agent decided during one tick.
///
/// The record is allocated once per agent and overwritten in place, so the
/// attention snapshot never reallocates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub action: ActionKind,
    /// Probability assigned to the chosen action, [0, 1].
    pub confidence: f32,
    /// How forcefully to perform the action, [0, 1].
    pub intensity: f32,
    /// Desired heading, each axis in [-1, 1].
    pub movement: [f32; 2],
    pub speed: f32,
    pub speech: ArrayString<SPEECH_CAPACITY>,
    pub dominant_emotion: Emotion,
    /// Strength of the dominant emotion.
    pub emotional_tone: f32,
    /// Per-channel attention after this tick.
    pub attention: Vec<f32>,
    pub memory_write_signal: f32,
    pub learning_rate: f32,
    /// An experience was stored this tick.
    pub memory_written: bool,
    /// The rule-based fallback produced this decision.
    pub degraded: bool,
    /// The tick exceeded its time budget.
    pub over_budget: bool,
    /// Agent-local tick number that produced this record.
    pub tick: u64,
}

impl Default for ActionDecision {
    fn default() -> Self {
        Self {
            action: ActionKind::None,
            confidence: 0.0,
            intensity: 0.0,
            movement: [0.0; 2],
            speed: 0.0,
            speech: ArrayString::new(),
            dominant_emotion: Emotion::Joy,
            emotional_tone: 0.0,
            attention: vec![0.0; CHANNEL_COUNT],
            memory_write_signal: 0.0,
            learning_rate: 0.0,
            memory_written: false,
            degraded: false,
            over_budget: false,
            tick: 0,
        }
    }
}

impl ActionDecision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the speech line, truncating at a character boundary.
    pub fn set_speech(&mut self, line: &str) {
        self.speech.clear();
        self.push_speech(line);
    }

    /// Append to the speech line, dropping whatever does not fit.
    pub fn push_speech(&mut self, fragment: &str) {
        for ch in fragment.chars() {
            if self.speech.try_push(ch).is_err() {
                break;
            }
        }
    }

    /// Mean attention over a channel range.
    pub fn mean_attention(&self, range: std::ops::Range<usize>) -> f32 {
        let len = range.len();
        if len == 0 {
            return 0.0;
        }
        self.attention[range].iter().sum::<f32>() / len as f32
    }
}
