//! Affect dynamics: the Feel stage.

use serde::{Deserialize, Serialize};

use game_bridge::{Archetype, Emotion, InteractionContext, Opinion, SensorySnapshot};

/// Seconds without interaction before loneliness starts to grow.
pub const LONELINESS_DELAY: f32 = 60.0;

/// Trust at which an agent trusts the player.
pub const TRUST_THRESHOLD: f32 = 0.6;

/// Affection at which an agent likes the player.
pub const LIKE_THRESHOLD: f32 = 0.5;

/// Shrink `value` by `rate` per second over `dt`, never past zero.
fn ease(value: &mut f32, rate: f32, dt: f32) {
    *value *= 1.0 - (rate * dt).min(1.0);
}

/// What the world looked like to the agent this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stimulus {
    pub in_conversation: bool,
    /// Perceived tone of the interlocutor, [-1, 1].
    pub tone: f32,
    /// Strongest threat cue from either input, [0, 1].
    pub threat: f32,
    /// Low-band audio energy, [0, 1].
    pub combat: f32,
    pub private_setting: bool,
    pub familiarity: f32,
    pub player_mood: f32,
    pub shared_goal: f32,
}

impl Stimulus {
    pub fn new(snapshot: &SensorySnapshot, context: &InteractionContext, combat: f32) -> Self {
        Self {
            in_conversation: context.in_conversation,
            tone: context.player_tone,
            threat: snapshot.ambient_threat.max(context.threat_level),
            combat,
            private_setting: context.private_setting,
            familiarity: snapshot.familiarity,
            player_mood: snapshot.player_emotional_state,
            shared_goal: context.shared_goal_alignment,
        }
    }
}

/// The 32-component affect vector and its personality baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectState {
    values: Vec<f32>,
    baseline: Vec<f32>,
    /// Seconds since the last conversation ended.
    since_interaction: f32,
    was_in_conversation: bool,
    met_player: bool,
}

impl AffectState {
    pub fn new(archetype: Archetype) -> Self {
        let baseline = archetype.baseline().to_vec();
        Self {
            values: baseline.clone(),
            baseline,
            since_interaction: 0.0,
            was_in_conversation: false,
            met_player: false,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn baseline(&self) -> &[f32] {
        &self.baseline
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.values[emotion.index()]
    }

    pub fn basic(&self) -> &[f32] {
        &self.values[..Emotion::BASIC_COUNT]
    }

    pub fn since_interaction(&self) -> f32 {
        self.since_interaction
    }

    /// Strongest basic emotion. Joy wins when nothing is above zero.
    pub fn dominant(&self) -> (Emotion, f32) {
        let mut best = (Emotion::Joy, 0.0);
        for (i, &v) in self.basic().iter().enumerate() {
            if v > best.1 {
                best = (Emotion::ALL[i], v);
            }
        }
        best
    }

    pub fn reset(&mut self) {
        self.values.copy_from_slice(&self.baseline);
        self.since_interaction = 0.0;
        self.was_in_conversation = false;
        self.met_player = false;
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Standing with the player in [-1, 1].
    ///
    /// Half comes from warmth (mean of trust, affection and respect, mapped
    /// to [-1, 1]), half from the interaction history in
    /// [`Emotion::RelationshipStatus`].
    pub fn relationship_level(&self) -> f32 {
        let warmth = (self.get(Emotion::Trust)
            + self.get(Emotion::Affection)
            + self.get(Emotion::Respect))
            / 3.0;
        (0.5 * (2.0 * warmth - 1.0) + 0.5 * self.get(Emotion::RelationshipStatus)).clamp(-1.0, 1.0)
    }

    /// Shift the relationship by `change`, clamped to [-1, 1].
    ///
    /// Trust and affection move immediately and fade back toward the
    /// baseline like any basic emotion. The change is also booked as a
    /// fractional positive or negative interaction, which does not fade.
    /// Non-finite changes are ignored.
    pub fn modify_relationship(&mut self, change: f32) {
        if !change.is_finite() {
            return;
        }
        let change = change.clamp(-1.0, 1.0);
        self.add(Emotion::Trust, 0.5 * change);
        self.add(Emotion::Affection, 0.3 * change);
        if change > 0.0 {
            self.add(Emotion::PositiveInteractions, change);
        } else {
            self.add(Emotion::NegativeInteractions, -change);
        }
        self.refresh_status();
        self.clamp();
    }

    pub fn trusts_player(&self) -> bool {
        let trust = self.get(Emotion::Trust);
        trust >= TRUST_THRESHOLD && trust > self.get(Emotion::Fear)
    }

    pub fn likes_player(&self) -> bool {
        let affection = self.get(Emotion::Affection);
        affection >= LIKE_THRESHOLD && affection > self.get(Emotion::Anger)
    }

    pub fn opinion(&self) -> Opinion {
        Opinion::from_level(self.relationship_level())
    }

    fn refresh_status(&mut self) {
        let positive = self.get(Emotion::PositiveInteractions);
        let negative = self.get(Emotion::NegativeInteractions);
        self.set(Emotion::RelationshipStatus, ((positive - negative) / 5.0).tanh());
    }

    fn add(&mut self, emotion: Emotion, delta: f32) {
        self.values[emotion.index()] += delta;
    }

    fn ease(&mut self, emotion: Emotion, rate: f32, dt: f32) {
        ease(&mut self.values[emotion.index()], rate, dt);
    }

    fn set(&mut self, emotion: Emotion, value: f32) {
        self.values[emotion.index()] = value;
    }

    /// Advance affect by `dt` seconds.
    ///
    /// `retention` is the fraction of the distance to baseline kept per
    /// second. Counters never decay. Every component ends inside its
    /// declared range.
    pub fn feel(&mut self, archetype: Archetype, stimulus: &Stimulus, retention: f32, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let keep = retention.powf(dt);
        for (i, emotion) in Emotion::ALL.iter().enumerate() {
            if emotion.decays() {
                let b = self.baseline[i];
                self.values[i] = b + (self.values[i] - b) * keep;
            }
        }

        let started = stimulus.in_conversation && !self.was_in_conversation;
        if stimulus.in_conversation {
            if stimulus.tone > 0.5 {
                self.add(Emotion::Trust, 0.2 * dt);
                self.add(Emotion::Affection, 0.1 * dt);
                self.add(Emotion::Joy, 0.3 * dt);
                self.ease(Emotion::Fear, 0.6, dt);
                self.ease(Emotion::Anger, 1.2, dt);
                self.ease(Emotion::Loneliness, 3.0, dt);
            } else if stimulus.tone < -0.5 {
                self.add(Emotion::Fear, 0.3 * dt);
                self.add(Emotion::Anger, 0.2 * dt);
                self.ease(Emotion::Trust, 3.0, dt);
                self.ease(Emotion::Affection, 1.8, dt);
            }
            self.ease(Emotion::Loneliness, 6.0, dt);
            self.add(Emotion::TimeTogether, dt);
            self.since_interaction = 0.0;

            if started {
                if stimulus.tone > 0.5 {
                    self.add(Emotion::PositiveInteractions, 1.0);
                } else if stimulus.tone < -0.5 {
                    self.add(Emotion::NegativeInteractions, 1.0);
                }
                if !self.met_player {
                    self.set(Emotion::FirstMeetingQuality, stimulus.tone);
                    self.met_player = true;
                }
            }
            self.set(Emotion::LastInteractionQuality, stimulus.tone);
            if stimulus.tone > self.get(Emotion::StrongestPositiveMemory) {
                self.set(Emotion::StrongestPositiveMemory, stimulus.tone);
            }
            if stimulus.tone < self.get(Emotion::StrongestNegativeMemory) {
                self.set(Emotion::StrongestNegativeMemory, stimulus.tone);
            }
        } else {
            self.since_interaction += dt;
            if self.since_interaction > LONELINESS_DELAY {
                self.add(Emotion::Loneliness, 0.06 * dt);
            }
        }
        self.was_in_conversation = stimulus.in_conversation;

        if stimulus.combat > 0.5 {
            self.add(Emotion::Fear, 0.3 * dt);
            if archetype.relishes_combat() {
                self.add(Emotion::Joy, 0.12 * dt);
            } else {
                self.add(Emotion::Fear, 0.18 * dt);
            }
        }
        if stimulus.threat > 0.7 {
            self.add(Emotion::Fear, 0.24 * dt);
            self.ease(Emotion::Trust, 1.2, dt);
        }

        self.set(Emotion::LocationFamiliarity, stimulus.familiarity);
        self.set(Emotion::SocialSetting, if stimulus.private_setting { 1.0 } else { 0.0 });
        self.set(Emotion::ThreatLevel, stimulus.threat);
        self.set(Emotion::PlayerMood, stimulus.player_mood);
        self.refresh_status();
        self.set(Emotion::SharedGoalProgress, stimulus.shared_goal);

        self.clamp();
    }

    fn clamp(&mut self) {
        for (v, emotion) in self.values.iter_mut().zip(Emotion::ALL) {
            *v = if v.is_nan() { 0.0 } else { emotion.range().clamp(*v) };
        }
    }
}
