//! Attend stage: novelty-driven attention and working memory.

use game_bridge::{Archetype, Emotion, SensoryRegion, CHANNEL_COUNT};

use crate::config::AgentConfig;
use crate::error::NeuralResult;
use crate::kernels::{Tensor, TensorArena};

use super::sense::Percept;

/// Working-memory slots; each summarizes four adjacent channels.
pub const WORKING_MEMORY_SLOTS: usize = CHANNEL_COUNT / 4;

/// Floor applied to the per-tick novelty score.
pub const MIN_NOVELTY: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct AttentionState {
    attention: Tensor,
    expectation: Tensor,
    working_memory: Tensor,
    novelty: f32,
}

impl AttentionState {
    pub fn new_in(arena: &mut TensorArena, archetype: Archetype) -> NeuralResult<Self> {
        let mut state = Self {
            attention: arena.alloc_vector(CHANNEL_COUNT)?,
            expectation: arena.alloc_vector(CHANNEL_COUNT)?,
            working_memory: arena.alloc_vector(WORKING_MEMORY_SLOTS)?,
            novelty: MIN_NOVELTY,
        };
        state.reset(archetype);
        Ok(state)
    }

    /// Back to the archetype's initial focus with no expectations.
    pub fn reset(&mut self, archetype: Archetype) {
        self.attention.zero();
        self.expectation.zero();
        self.working_memory.zero();
        self.novelty = MIN_NOVELTY;
        let (region, level) = archetype.attention_focus();
        self.attention.values_mut()[region.range()].fill(level);
    }

    pub fn attention(&self) -> &[f32] {
        self.attention.values()
    }

    pub fn expectation(&self) -> &[f32] {
        self.expectation.values()
    }

    pub fn working_memory(&self) -> &[f32] {
        self.working_memory.values()
    }

    /// Mean novelty of the latest update, at least [`MIN_NOVELTY`].
    pub fn novelty(&self) -> f32 {
        self.novelty
    }

    pub fn is_finite(&self) -> bool {
        self.attention.is_finite() && self.expectation.is_finite() && self.working_memory.is_finite()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [f32], &mut [f32], &mut [f32]) {
        (
            self.attention.values_mut(),
            self.expectation.values_mut(),
            self.working_memory.values_mut(),
        )
    }

    /// Decay, boost novel channels, apply player overrides, then roll the
    /// expectation and working memory forward.
    pub fn update(
        &mut self,
        channels: &[f32],
        percept: &Percept,
        in_conversation: bool,
        archetype: Archetype,
        config: &AgentConfig,
    ) {
        let curiosity = archetype.trait_value(Emotion::Curiosity);
        let attention = self.attention.values_mut();
        let expectation = self.expectation.values_mut();

        let mut novelty_total = 0.0;
        for region in SensoryRegion::ALL {
            let bias = archetype.region_bias(region);
            for i in region.range() {
                attention[i] *= config.attention_decay;
                let novelty = (channels[i] - expectation[i]).abs();
                novelty_total += novelty.min(1.0);
                if novelty > config.novelty_threshold {
                    attention[i] = (attention[i] + novelty * curiosity * bias).min(1.0);
                }
            }
        }

        if percept.player_visible {
            for a in &mut attention[SensoryRegion::Vision.range()] {
                *a = a.max(0.8);
            }
            for a in &mut attention[SensoryRegion::Social.range()] {
                *a = a.max(0.9);
            }
        } else if !in_conversation {
            for a in &mut attention[SensoryRegion::Social.range()] {
                *a *= 0.5;
            }
        }
        if percept.player_speaking {
            for a in &mut attention[SensoryRegion::Audio.range()] {
                *a = a.max(0.95);
            }
        }

        for (e, c) in expectation.iter_mut().zip(channels) {
            *e += config.expectation_rate * (c - *e);
        }

        let rate = config.working_memory_rate;
        for (slot, w) in self.working_memory.values_mut().iter_mut().enumerate() {
            let quad = slot * 4..slot * 4 + 4;
            let sample: f32 = channels[quad.clone()]
                .iter()
                .zip(&attention[quad])
                .map(|(c, a)| c * a)
                .sum::<f32>()
                / 4.0;
            *w += rate * (sample - *w);
        }

        self.novelty = (novelty_total / CHANNEL_COUNT as f32).max(MIN_NOVELTY);
    }

    /// Write `channels ⊙ attention` into `out`.
    pub fn attend(&self, channels: &[f32], out: &mut [f32]) {
        for ((o, c), a) in out.iter_mut().zip(channels).zip(self.attention.values()) {
            *o = c * a;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(archetype: Archetype) -> AttentionState {
        let mut arena = TensorArena::new(4096);
        AttentionState::new_in(&mut arena, archetype).unwrap()
    }

    #[test]
    fn test_initial_focus() {
        let s = state(Archetype::Warrior);
        assert!(s.attention()[SensoryRegion::Audio.range()].iter().all(|a| *a == 0.8));
        assert!(s.attention()[SensoryRegion::Social.range()].iter().all(|a| *a == 0.0));
    }

    #[test]
    fn test_attention_decays_without_novelty() {
        let mut s = state(Archetype::Warrior);
        let channels = vec![0.0; CHANNEL_COUNT];
        s.update(&channels, &Percept::default(), false, Archetype::Warrior, &AgentConfig::default());
        assert!((s.attention()[SensoryRegion::Audio.range().start] - 0.76).abs() < 1e-6);
        assert_eq!(s.novelty(), MIN_NOVELTY);
    }

    #[test]
    fn test_novel_channel_gains_attention() {
        let mut s = state(Archetype::Scholar);
        let mut channels = vec![0.0; CHANNEL_COUNT];
        channels[10] = 1.0;
        s.update(&channels, &Percept::default(), false, Archetype::Scholar, &AgentConfig::default());
        assert!((s.attention()[10] - 0.9).abs() < 1e-6);
        assert_eq!(s.attention()[11], 0.0);
        assert!((s.expectation()[10] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_focus_region_boost() {
        let mut channels = vec![0.0; CHANNEL_COUNT];
        let audio = SensoryRegion::Audio.range().start;
        let social = SensoryRegion::Social.range().start;
        channels[audio] = 0.5;
        channels[social] = 0.5;
        let mut s = state(Archetype::Merchant);
        s.parts_mut().0.fill(0.0);
        s.update(&channels, &Percept::default(), true, Archetype::Merchant, &AgentConfig::default());
        assert!(s.attention()[social] > s.attention()[audio]);
    }

    #[test]
    fn test_player_overrides() {
        let mut s = state(Archetype::Mystic);
        let percept = Percept {
            player_visible: true,
            player_speaking: true,
            ..Percept::default()
        };
        let channels = vec![0.0; CHANNEL_COUNT];
        s.update(&channels, &percept, false, Archetype::Mystic, &AgentConfig::default());
        let at_least = |region: SensoryRegion, level: f32| {
            s.attention()[region.range()].iter().all(|a| *a >= level)
        };
        assert!(at_least(SensoryRegion::Social, 0.9));
        assert!(at_least(SensoryRegion::Vision, 0.8));
        assert!(at_least(SensoryRegion::Audio, 0.95));
    }

    #[test]
    fn test_working_memory_tracks_attended_quads() {
        let mut s = state(Archetype::Rogue);
        let channels = vec![1.0; CHANNEL_COUNT];
        for _ in 0..5 {
            s.update(&channels, &Percept::default(), true, Archetype::Rogue, &AgentConfig::default());
        }
        assert!(s.working_memory().iter().all(|w| *w > 0.0 && *w <= 1.0));
        assert!(s.is_finite());
    }
}
