//! Sense stage: fuse the game's inputs into one channel vector.

use game_bridge::{
    Archetype, Emotion, InteractionContext, SensoryRegion, SensorySnapshot, AUDIO_BINS,
    CHANNEL_COUNT, VISUAL_FIELD_SIZE,
};

/// Flags derived while encoding, used by later stages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Percept {
    pub player_visible: bool,
    pub player_speaking: bool,
    /// Low-band audio energy, [0, 1].
    pub combat: f32,
    /// Strongest threat cue, [0, 1].
    pub threat: f32,
}

impl Percept {
    /// Someone is around to talk or trade with.
    pub fn has_interlocutor(&self, context: &InteractionContext) -> bool {
        self.player_visible || context.in_conversation
    }
}

fn finite(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Encode a snapshot into `channels` (length [`CHANNEL_COUNT`]).
///
/// Layout: the raw visual grid, the audio spectrum, social signals, needs
/// plus the agent's basic emotions, then situational context. Personality
/// then scales whole regions: extraverts amplify social channels, neurotic
/// agents amplify loud audio and open agents amplify context.
pub fn encode(
    snapshot: &SensorySnapshot,
    context: &InteractionContext,
    archetype: Archetype,
    affect: &[f32],
    channels: &mut [f32],
) -> Percept {
    debug_assert_eq!(channels.len(), CHANNEL_COUNT);
    channels.fill(0.0);

    let center = (VISUAL_FIELD_SIZE / 2) as f32;
    let mut player_weight = 0.0;
    for (y, row) in snapshot.visual_field.iter().enumerate() {
        for (x, &pixel) in row.iter().enumerate() {
            let pixel = finite(pixel);
            channels[y * VISUAL_FIELD_SIZE + x] = pixel;
            let (dx, dy) = (x as f32 - center, y as f32 - center);
            let center_weight = 1.0 - 0.1 * (dx * dx + dy * dy).sqrt();
            if pixel > 0.8 && center_weight > 0.7 {
                player_weight += pixel;
            }
        }
    }

    let audio = SensoryRegion::Audio.range();
    let (mut low, mut mid) = (0.0, 0.0);
    for (i, &bin) in snapshot.audio_spectrum.iter().enumerate() {
        let bin = finite(bin);
        channels[audio.start + i] = bin;
        if i < AUDIO_BINS / 4 {
            low += bin;
        } else if i < AUDIO_BINS * 3 / 4 {
            mid += bin;
        }
    }

    let percept = Percept {
        player_visible: finite(snapshot.player_visible) > 0.5 || player_weight > 0.5,
        player_speaking: finite(snapshot.player_speaking) > 0.5 || mid > 0.3,
        combat: (low / (AUDIO_BINS / 4) as f32).max(finite(snapshot.combat_sounds)).clamp(0.0, 1.0),
        threat: finite(snapshot.ambient_threat)
            .max(finite(context.threat_level))
            .clamp(0.0, 1.0),
    };

    let visible = if percept.player_visible { 1.0 } else { 0.0 };
    let social = [
        visible,
        visible * (1.0 - finite(snapshot.player_distance)),
        finite(snapshot.player_facing),
        if percept.player_speaking { 1.0 } else { 0.0 },
        finite(snapshot.player_emotional_state),
        finite(snapshot.conversation_context),
        finite(snapshot.social_pressure),
        finite(snapshot.intimacy),
        if context.in_conversation { 1.0 } else { 0.0 },
        finite(context.player_tone),
        (finite(context.conversation_duration) / 60.0).tanh(),
        if context.private_setting { 1.0 } else { 0.0 },
        finite(context.urgency),
        finite(context.shared_goal_alignment),
    ];
    let start = SensoryRegion::Social.range().start;
    channels[start..start + social.len()].copy_from_slice(&social);

    let needs = [
        finite(snapshot.hunger),
        finite(snapshot.energy),
        finite(snapshot.health),
        finite(snapshot.goal_priority),
    ];
    let start = SensoryRegion::Internal.range().start;
    channels[start..start + needs.len()].copy_from_slice(&needs);
    let feelings = &affect[..Emotion::BASIC_COUNT];
    channels[start + needs.len()..start + needs.len() + feelings.len()].copy_from_slice(feelings);

    let situation = [
        finite(snapshot.location_type),
        finite(snapshot.time_of_day),
        finite(snapshot.weather),
        finite(snapshot.familiarity),
        percept.threat,
        percept.combat,
    ];
    let start = SensoryRegion::Context.range().start;
    channels[start..start + situation.len()].copy_from_slice(&situation);

    let extraversion = archetype.trait_value(Emotion::Extraversion);
    let neuroticism = archetype.trait_value(Emotion::Neuroticism);
    let openness = archetype.trait_value(Emotion::Openness);
    for c in &mut channels[SensoryRegion::Social.range()] {
        *c *= 1.0 + 0.5 * extraversion;
    }
    for c in &mut channels[SensoryRegion::Audio.range()] {
        if *c > 0.5 {
            *c *= 1.0 + 0.3 * neuroticism;
        }
    }
    for c in &mut channels[SensoryRegion::Context.range()] {
        *c *= 1.0 + 0.4 * openness;
    }
    percept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_default(snapshot: &SensorySnapshot, context: &InteractionContext) -> (Vec<f32>, Percept) {
        let mut channels = vec![0.0; CHANNEL_COUNT];
        let affect = Archetype::Scholar.baseline();
        let percept = encode(snapshot, context, Archetype::Scholar, &affect, &mut channels);
        (channels, percept)
    }

    #[test]
    fn test_quiet_scene() {
        let (channels, percept) = encode_default(&SensorySnapshot::quiet(), &InteractionContext::idle());
        assert!(!percept.player_visible);
        assert!(!percept.player_speaking);
        assert_eq!(percept.combat, 0.0);
        assert!(channels[SensoryRegion::Social.range()].iter().all(|c| *c == 0.0));
        assert!(channels.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_player_detected_from_visual_field() {
        let mut snapshot = SensorySnapshot::quiet();
        snapshot.visual_field[8][8] = 1.0;
        let (channels, percept) = encode_default(&snapshot, &InteractionContext::idle());
        assert!(percept.player_visible);
        assert_eq!(channels[8 * VISUAL_FIELD_SIZE + 8], 1.0);
        assert!(channels[SensoryRegion::Social.range().start] > 0.0);
    }

    #[test]
    fn test_combat_audio() {
        let snapshot = SensorySnapshot::quiet().with_combat(0.9);
        let (_, percept) = encode_default(&snapshot, &InteractionContext::idle());
        assert!((percept.combat - 0.9).abs() < 1e-6);
        assert!(!percept.player_speaking);
    }

    #[test]
    fn test_non_finite_inputs_are_zeroed() {
        let mut snapshot = SensorySnapshot::quiet();
        snapshot.health = f32::NAN;
        snapshot.audio_spectrum[3] = f32::INFINITY;
        let (channels, _) = encode_default(&snapshot, &InteractionContext::idle());
        assert!(channels.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_extraversion_scales_social_channels() {
        let snapshot = SensorySnapshot::quiet().with_player(0.0);
        let context = InteractionContext::idle();
        let affect = Archetype::Merchant.baseline();
        let mut merchant = vec![0.0; CHANNEL_COUNT];
        let mut scholar = vec![0.0; CHANNEL_COUNT];
        encode(&snapshot, &context, Archetype::Merchant, &affect, &mut merchant);
        encode(&snapshot, &context, Archetype::Scholar, &affect, &mut scholar);
        let first = SensoryRegion::Social.range().start;
        assert!(merchant[first] > scholar[first]);
    }
}
