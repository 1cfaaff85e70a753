//! Agent orchestrator: one brain-driven NPC and its per-tick cycle.
//!
//! Every tick runs six stages in a fixed order:
//!
//! - **Sense**: fuse the snapshot and interaction context into channels
//! - **Attend**: decay, boost novel channels, update working memory
//! - **Recall**: query associative memory and fold the match into the
//!   long-term context
//! - **Decide**: one controller step, then a biased, masked action draw
//! - **Feel**: move affect toward baseline and apply contextual nudges
//! - **Remember**: store an experience when the write signal is strong
//!   enough, and consolidate every few writes
//!
//! All per-tick buffers are allocated against the agent's arena at spawn.
//! Consolidation passes are the only ticks that allocate.

mod affect;
mod attention;
pub mod decide;
pub mod fallback;
pub mod sense;
pub mod speech;

pub use affect::*;
pub use attention::*;
pub use decide::{Signals, READOUT_WIDTH, SIGNAL_COUNT};

use std::sync::Arc;
use std::time::Instant;

use game_bridge::{
    ActionDecision, ActionKind, AgentId, AgentProfile, Emotion, InteractionContext, Opinion,
    SensorySnapshot, CHANNEL_COUNT,
};

use crate::config::{ConsolidationConfig, EngineConfig};
use crate::consolidation::{Consolidator, FisherAccumulator, PenaltyReport};
use crate::controller::{ControllerBinding, ControllerParams, ParameterView, StatePools};
use crate::error::{expect_len, NeuralError, NeuralResult};
use crate::kernels::{Kernels, NumericGuard, Tensor, TensorArena};
use crate::memory::AssociativeMemory;
use crate::persistence::{AgentSnapshot, SNAPSHOT_VERSION};
use crate::pool::SlotHandle;
use crate::sampler::CounterRng;
use crate::system::SharedContext;

use sense::Percept;

/// Channels averaged into one pooled sensory value.
pub const POOL_GROUP: usize = 32;

/// Pooled sensory summary stored with each experience.
pub const POOLED_WIDTH: usize = CHANNEL_COUNT / POOL_GROUP;

/// Pooled senses plus basic emotions: the part of an experience a query matches.
pub const SENSED_WIDTH: usize = POOLED_WIDTH + Emotion::BASIC_COUNT;

/// Sensed state, action one-hot, basic-emotion delta and confidence.
pub const EXPERIENCE_WIDTH: usize = SENSED_WIDTH + ActionKind::COUNT + Emotion::BASIC_COUNT + 1;

/// Ticks averaged by [`TickStats::mean_us`].
pub const STATS_WINDOW: usize = 64;

/// Controller input width for a given memory width: attended senses,
/// working memory, long-term context and the full affect vector.
pub fn controller_input_width(memory_width: usize) -> usize {
    CHANNEL_COUNT + WORKING_MEMORY_SLOTS + memory_width + Emotion::COUNT
}

/// Average `channels` over consecutive groups of [`POOL_GROUP`].
pub fn pool_channels(channels: &[f32], pooled: &mut [f32]) {
    for (p, group) in pooled.iter_mut().zip(channels.chunks(POOL_GROUP)) {
        *p = group.iter().sum::<f32>() / group.len() as f32;
    }
}

/// Tick timing, measured with a monotonic clock.
#[derive(Debug, Clone, PartialEq)]
pub struct TickStats {
    last_us: u64,
    overruns: u64,
    window: [u64; STATS_WINDOW],
    cursor: usize,
    filled: usize,
}

impl Default for TickStats {
    fn default() -> Self {
        Self {
            last_us: 0,
            overruns: 0,
            window: [0; STATS_WINDOW],
            cursor: 0,
            filled: 0,
        }
    }
}

impl TickStats {
    pub fn last_us(&self) -> u64 {
        self.last_us
    }

    /// Mean over the latest [`STATS_WINDOW`] ticks.
    pub fn mean_us(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        self.window[..self.filled].iter().sum::<u64>() as f32 / self.filled as f32
    }

    /// Ticks that exceeded the budget.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Record one tick; returns whether it went over `budget_us`.
    fn record(&mut self, elapsed_us: u64, budget_us: u64) -> bool {
        self.last_us = elapsed_us;
        self.window[self.cursor] = elapsed_us;
        self.cursor = (self.cursor + 1) % STATS_WINDOW;
        self.filled = (self.filled + 1).min(STATS_WINDOW);
        let over = elapsed_us > budget_us;
        if over {
            self.overruns += 1;
        }
        over
    }
}

/// What an agent borrows from its system for one tick.
pub struct TickEnv<'a> {
    pub kernels: &'a dyn Kernels,
    pub guard: NumericGuard,
    pub pools: &'a mut StatePools,
    pub shared: &'a SharedContext,
    pub config: &'a EngineConfig,
}

/// A brain-driven NPC.
#[derive(Debug)]
pub struct Agent {
    profile: AgentProfile,
    binding: ControllerBinding,
    controller: Option<Arc<ControllerParams>>,
    /// One recurrent state slot per controller layer.
    handles: Vec<SlotHandle>,
    arena: TensorArena,

    memory: AssociativeMemory,
    affect: AffectState,
    attention: AttentionState,

    // Scratch, reused every tick.
    channels: Tensor,
    attended: Tensor,
    input: Tensor,
    output: Tensor,
    probs: Tensor,
    d_hidden: Tensor,
    query: Tensor,
    recalled: Tensor,
    gossip: Tensor,
    long_term_context: Tensor,
    /// Latest experience; doubles as the gossip outbox.
    experience: Tensor,

    rng: CounterRng,
    consolidator: Consolidator,
    accumulator: FisherAccumulator,
    writes_since_consolidation: u32,
    importance_sum: f32,
    pending_gossip: Option<f32>,
    /// Parameter deltas staged by `reinforce`.
    updates: Vec<(usize, f32)>,

    decision: ActionDecision,
    ticks: u64,
    stats: TickStats,
}

impl Agent {
    /// Build an agent, drawing one state slot per controller layer.
    ///
    /// Slots are returned to `pools` if anything later in construction fails.
    pub fn spawn(
        profile: AgentProfile,
        binding: ControllerBinding,
        shared: &Arc<ControllerParams>,
        pools: &mut StatePools,
        config: &EngineConfig,
    ) -> NeuralResult<Self> {
        let controller = match binding {
            ControllerBinding::Detached => None,
            ControllerBinding::Shared | ControllerBinding::PerAgent => Some(Arc::clone(shared)),
        };
        let mut arena = TensorArena::new(config.system.arena_floats);
        let handles = match &controller {
            Some(params) => pools.acquire(params, &mut arena)?,
            None => Vec::new(),
        };
        match Self::assemble(profile, binding, controller, &handles, arena, config) {
            Ok(agent) => {
                tracing::info!(
                    agent = %agent.profile.id,
                    name = %agent.profile.name,
                    archetype = %agent.profile.archetype,
                    ?binding,
                    "Spawned agent"
                );
                Ok(agent)
            }
            Err(err) => {
                pools.release(&handles);
                Err(err)
            }
        }
    }

    fn assemble(
        profile: AgentProfile,
        binding: ControllerBinding,
        controller: Option<Arc<ControllerParams>>,
        handles: &[SlotHandle],
        mut arena: TensorArena,
        config: &EngineConfig,
    ) -> NeuralResult<Self> {
        let mode = config.controller.output_mode;
        let width = config.memory.width;
        let (output_len, final_hidden, parameter_count) = match controller.as_deref() {
            Some(params) => (
                params.output_size(mode),
                params.final_layer().hidden_size(),
                params.parameter_count(),
            ),
            None => (READOUT_WIDTH, READOUT_WIDTH, 0),
        };
        let archetype = profile.archetype;
        let rng = CounterRng::new(profile.id.seed());

        Ok(Self {
            memory: AssociativeMemory::new_in(&mut arena, &config.memory)?,
            affect: AffectState::new(archetype),
            attention: AttentionState::new_in(&mut arena, archetype)?,
            channels: arena.alloc_vector(CHANNEL_COUNT)?,
            attended: arena.alloc_vector(CHANNEL_COUNT)?,
            input: arena.alloc_vector(controller_input_width(width))?,
            output: arena.alloc_vector(output_len)?,
            probs: arena.alloc_vector(ActionKind::COUNT)?,
            d_hidden: arena.alloc_vector(final_hidden)?,
            query: arena.alloc_vector(width)?,
            recalled: arena.alloc_vector(width)?,
            gossip: arena.alloc_vector(width)?,
            long_term_context: arena.alloc_vector(width)?,
            experience: arena.alloc_vector(width)?,
            rng,
            consolidator: Consolidator::new(parameter_count, &config.consolidation),
            accumulator: FisherAccumulator::new(parameter_count),
            writes_since_consolidation: 0,
            importance_sum: 0.0,
            pending_gossip: None,
            updates: Vec::new(),
            decision: ActionDecision::new(),
            ticks: 0,
            stats: TickStats::default(),
            profile,
            binding,
            controller,
            handles: handles.to_vec(),
            arena,
        })
    }

    /// Give the agent's state slots back.
    pub fn release(&self, pools: &mut StatePools) {
        pools.release(&self.handles);
    }

    pub fn id(&self) -> AgentId {
        self.profile.id
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn binding(&self) -> ControllerBinding {
        self.binding
    }

    /// Parameters this agent decides with, if any.
    pub fn controller(&self) -> Option<&ControllerParams> {
        self.controller.as_deref()
    }

    pub fn affect(&self) -> &AffectState {
        &self.affect
    }

    /// Standing with the player in [-1, 1]. See [`AffectState::relationship_level`].
    pub fn relationship_level(&self) -> f32 {
        self.affect.relationship_level()
    }

    /// Shift the relationship from outside the tick, e.g. after a quest
    /// outcome. Returns the new level.
    pub fn modify_relationship(&mut self, change: f32) -> f32 {
        self.affect.modify_relationship(change);
        tracing::debug!(agent = %self.profile.id, change, "Relationship modified");
        self.affect.relationship_level()
    }

    pub fn trusts_player(&self) -> bool {
        self.affect.trusts_player()
    }

    pub fn likes_player(&self) -> bool {
        self.affect.likes_player()
    }

    pub fn opinion_of_player(&self) -> Opinion {
        self.affect.opinion()
    }

    pub fn attention(&self) -> &AttentionState {
        &self.attention
    }

    pub fn memory(&self) -> &AssociativeMemory {
        &self.memory
    }

    pub fn consolidator(&self) -> &Consolidator {
        &self.consolidator
    }

    pub fn long_term_context(&self) -> &[f32] {
        self.long_term_context.values()
    }

    /// The latest decision.
    pub fn decision(&self) -> &ActionDecision {
        &self.decision
    }

    /// Probabilities behind the latest neural decision.
    pub fn action_probabilities(&self) -> &[f32] {
        self.probs.values()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Floats this agent has drawn from its arena.
    pub fn arena_used(&self) -> usize {
        self.arena.used()
    }

    /// Run one full tick and return the decision.
    ///
    /// Never fails: a missing controller, corrupted recurrent state or a
    /// failed forward pass all produce a rule-based decision flagged as
    /// degraded.
    pub fn tick(
        &mut self,
        env: TickEnv<'_>,
        snapshot: &SensorySnapshot,
        context: &InteractionContext,
        dt: f32,
    ) -> &ActionDecision {
        let started = Instant::now();
        let TickEnv {
            kernels,
            guard,
            pools,
            shared,
            config,
        } = env;
        let archetype = self.profile.archetype;
        self.ticks += 1;

        // Sense
        let percept = sense::encode(
            snapshot,
            context,
            archetype,
            self.affect.values(),
            self.channels.values_mut(),
        );

        // Attend
        self.attention.update(
            self.channels.values(),
            &percept,
            context.in_conversation,
            archetype,
            &config.agent,
        );
        self.attention
            .attend(self.channels.values(), self.attended.values_mut());

        // Recall
        self.recall(kernels, shared, config);

        // Decide
        let was_degraded = self.decision.degraded;
        if !self.decide(kernels, guard, pools, &percept, context, config) {
            if !was_degraded {
                tracing::warn!(agent = %self.profile.id, "Entering degraded mode");
            }
            fallback::rule_based(&percept, context, &mut self.decision);
        }

        // Feel
        let stimulus = Stimulus::new(snapshot, context, percept.combat);
        self.affect
            .feel(archetype, &stimulus, config.agent.affect_retention, dt);

        // Remember
        self.decision.memory_written = self.remember(pools, config);

        let (emotion, tone) = self.affect.dominant();
        self.decision.dominant_emotion = emotion;
        self.decision.emotional_tone = tone;
        self.decision
            .attention
            .copy_from_slice(self.attention.attention());
        self.decision.tick = self.ticks;
        speech::compose(&mut self.decision, &self.affect, context);

        let elapsed_us = started.elapsed().as_micros() as u64;
        let budget_us = config.agent.tick_budget_us;
        self.decision.over_budget = self.stats.record(elapsed_us, budget_us);
        if self.decision.over_budget {
            tracing::debug!(agent = %self.profile.id, elapsed_us, budget_us, "Tick over budget");
            if self.stats.overruns() == 1 {
                tracing::warn!(agent = %self.profile.id, elapsed_us, budget_us, "Tick budget exceeded");
            }
        }
        &self.decision
    }

    /// Query memory and fold the match into the long-term context.
    fn recall(&mut self, kernels: &dyn Kernels, shared: &SharedContext, config: &EngineConfig) {
        let query = self.query.values_mut();
        query.fill(0.0);
        pool_channels(self.attended.values(), &mut query[..POOLED_WIDTH]);
        query[POOLED_WIDTH..SENSED_WIDTH].copy_from_slice(self.affect.basic());

        let retention = config.agent.context_retention;
        let context = self.long_term_context.values_mut();
        match self.memory.read(kernels, query, self.recalled.values_mut()) {
            Ok(_) => {
                for (c, r) in context.iter_mut().zip(self.recalled.values()) {
                    *c = retention * *c + (1.0 - retention) * r;
                }
            }
            Err(err) => tracing::warn!(agent = %self.profile.id, error = %err, "Memory read failed"),
        }

        let Some(gossip) = shared.gossip() else {
            return;
        };
        let weight = config.system.gossip_weight;
        match gossip.recall(kernels, query, self.gossip.values_mut()) {
            Ok(outcome) if outcome.heads_used > 0 => {
                for (c, g) in context.iter_mut().zip(self.gossip.values()) {
                    *c = (1.0 - weight) * *c + weight * g;
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(agent = %self.profile.id, error = %err, "Gossip recall failed"),
        }
    }

    /// Neural decision. Returns false when the caller must fall back.
    fn decide(
        &mut self,
        kernels: &dyn Kernels,
        guard: NumericGuard,
        pools: &mut StatePools,
        percept: &Percept,
        context: &InteractionContext,
        config: &EngineConfig,
    ) -> bool {
        let Some(controller) = self.controller.as_deref() else {
            return false;
        };
        if !pools.is_finite(&self.handles) {
            tracing::warn!(agent = %self.profile.id, "Controller state corrupted, resetting");
            if let Err(err) = pools.reset(&self.handles) {
                tracing::warn!(agent = %self.profile.id, error = %err, "Controller state reset failed");
            }
            return false;
        }

        let input = self.input.values_mut();
        let mut start = 0;
        for part in [
            self.attended.values(),
            self.attention.working_memory(),
            self.long_term_context.values(),
            self.affect.values(),
        ] {
            input[start..start + part.len()].copy_from_slice(part);
            start += part.len();
        }

        let mode = config.controller.output_mode;
        let output = self.output.values_mut();
        if let Err(err) =
            controller.forward(kernels, guard, pools, &self.handles, input, mode, output)
        {
            tracing::warn!(agent = %self.profile.id, error = %err, "Controller forward failed");
            return false;
        }

        let output = self.output.values();
        let readout = &output[output.len() - controller.final_layer().hidden_size()..];
        decide::action_distribution(
            kernels,
            readout,
            config.controller.logit_scale,
            self.profile.archetype,
            percept.has_interlocutor(context),
            self.probs.values_mut(),
        );
        let signals = decide::read_signals(readout);
        let action = decide::sample(self.probs.values(), self.rng.next_unit());

        let decision = &mut self.decision;
        decision.action = action;
        decision.confidence = self.probs.values()[action.index()];
        decision.intensity = signals.intensity;
        decision.movement = signals.movement;
        decision.speed = signals.speed;
        decision.memory_write_signal = signals.memory_write;
        decision.learning_rate = signals.learning_rate;
        decision.degraded = false;
        true
    }

    /// Store this tick as an experience if the write signal clears the
    /// threshold. Returns whether memory changed.
    ///
    /// The write signal is the experience's importance; memory stores it
    /// with strength `importance × novelty`.
    fn remember(&mut self, pools: &StatePools, config: &EngineConfig) -> bool {
        self.pending_gossip = None;
        let importance = self.decision.memory_write_signal;
        if self.decision.degraded || !(importance > config.agent.write_threshold) {
            return false;
        }

        let experience = self.experience.values_mut();
        let query = self.query.values();
        experience.fill(0.0);
        experience[..SENSED_WIDTH].copy_from_slice(&query[..SENSED_WIDTH]);
        experience[SENSED_WIDTH + self.decision.action.index()] = 1.0;
        let delta_at = SENSED_WIDTH + ActionKind::COUNT;
        for (i, now) in self.affect.basic().iter().enumerate() {
            experience[delta_at + i] = now - query[POOLED_WIDTH + i];
        }
        experience[EXPERIENCE_WIDTH - 1] = self.decision.confidence;

        let strength = importance * self.attention.novelty();
        match self.memory.write(experience, strength) {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(agent = %self.profile.id, error = %err, "Memory write failed");
                return false;
            }
        }
        self.pending_gossip = Some(importance);
        self.writes_since_consolidation += 1;
        self.importance_sum += importance;

        if let Some(controller) = self.controller.as_deref() {
            let d_hidden = self.d_hidden.values_mut();
            decide::policy_gradient(
                self.probs.values(),
                self.decision.action,
                config.controller.logit_scale,
                d_hidden,
            );
            let accumulator = &mut self.accumulator;
            match controller.for_each_final_gradient(pools, &self.handles, d_hidden, |i, g| {
                accumulator.add(i, g)
            }) {
                Ok(()) => accumulator.end_sample(),
                Err(err) => {
                    tracing::warn!(agent = %self.profile.id, error = %err, "Fisher sample failed")
                }
            }
        }

        let interval = config.consolidation.interval;
        if interval > 0 && self.writes_since_consolidation >= interval {
            self.consolidate(&config.consolidation);
        }
        true
    }

    /// Snapshot the parameters as a task weighted by recent Fisher samples.
    fn consolidate(&mut self, config: &ConsolidationConfig) {
        if let Some(controller) = self.controller.as_deref() {
            if !self.accumulator.is_empty() {
                let fisher = self.accumulator.finish(config.min_fisher, config.max_density);
                let importance = self.importance_sum / self.writes_since_consolidation.max(1) as f32;
                let name = format!(
                    "{} #{}",
                    self.profile.name,
                    self.consolidator.consolidations() + 1
                );
                match self.consolidator.consolidate(
                    name,
                    controller.flatten(),
                    fisher,
                    importance,
                    self.ticks,
                ) {
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(agent = %self.profile.id, error = %err, "Consolidation failed")
                    }
                }
            }
        }
        self.accumulator.reset();
        self.writes_since_consolidation = 0;
        self.importance_sum = 0.0;
    }

    /// Experience staged for the shared gossip board this tick, with its importance.
    pub fn take_gossip(&mut self) -> Option<(&[f32], f32)> {
        let importance = self.pending_gossip.take()?;
        Some((self.experience.values(), importance))
    }

    /// Return to the freshly spawned state. Learned parameters and
    /// consolidated tasks survive; everything driven by experience does not.
    pub fn reset(&mut self, pools: &mut StatePools) -> NeuralResult<()> {
        pools.reset(&self.handles)?;
        let archetype = self.profile.archetype;
        self.affect.reset();
        self.attention.reset(archetype);
        self.long_term_context.zero();
        self.memory.clear();
        self.accumulator.reset();
        self.rng.rewind();
        self.writes_since_consolidation = 0;
        self.importance_sum = 0.0;
        self.pending_gossip = None;
        self.decision = ActionDecision::new();
        self.ticks = 0;
        tracing::debug!(agent = %self.profile.id, "Reset agent");
        Ok(())
    }

    /// Visit `(flat index, ∂ log p(action) / ∂θ)` for the latest neural
    /// decision. Only final-layer parameters are visited.
    pub fn for_each_policy_gradient(
        &mut self,
        pools: &StatePools,
        logit_scale: f32,
        visit: impl FnMut(usize, f32),
    ) -> NeuralResult<()> {
        let Some(controller) = self.controller.as_deref() else {
            return Err(NeuralError::config("agent has no controller"));
        };
        let d_hidden = self.d_hidden.values_mut();
        decide::policy_gradient(self.probs.values(), self.decision.action, logit_scale, d_hidden);
        controller.for_each_final_gradient(pools, &self.handles, d_hidden, visit)
    }

    /// Nudge the parameters toward the latest action in proportion to
    /// `reward`, against the consolidation penalty.
    ///
    /// Shared parameters are copied on the first update and the agent
    /// becomes [`ControllerBinding::PerAgent`]. After a degraded tick only
    /// the penalty pull applies.
    pub fn reinforce(
        &mut self,
        pools: &StatePools,
        config: &EngineConfig,
        reward: f32,
    ) -> NeuralResult<PenaltyReport> {
        if self.controller.is_none() {
            return Err(NeuralError::config("detached agents have no parameters to adapt"));
        }
        let step = config.agent.adaptation_rate;
        let mut updates = std::mem::take(&mut self.updates);
        updates.clear();
        if self.ticks > 0 && !self.decision.degraded && reward.is_finite() {
            let scale = step * reward;
            self.for_each_policy_gradient(pools, config.controller.logit_scale, |i, g| {
                updates.push((i, scale * g))
            })?;
        }

        let Some(controller) = self.controller.as_mut() else {
            return Err(NeuralError::config("detached agents have no parameters to adapt"));
        };
        self.consolidator
            .for_each_penalty_gradient(&**controller, |i, g| updates.push((i, -step * g)));
        if !updates.is_empty() {
            let params = Arc::make_mut(controller);
            for &(index, delta) in &updates {
                params.add_to_parameter(index, delta);
            }
            if self.binding == ControllerBinding::Shared {
                self.binding = ControllerBinding::PerAgent;
                tracing::info!(agent = %self.profile.id, "Controller copied for adaptation");
            }
        }
        self.updates = updates;
        Ok(self.consolidator.penalty(&**controller))
    }

    /// Current consolidation penalty on this agent's parameters.
    pub fn penalty(&self) -> PenaltyReport {
        match self.controller.as_deref() {
            Some(params) => self.consolidator.penalty(params),
            None => PenaltyReport::default(),
        }
    }

    /// Capture everything needed to resume this agent later.
    pub fn snapshot(&self, pools: &StatePools) -> NeuralResult<AgentSnapshot> {
        let controller = self.controller.as_deref();
        let parameters = match (self.binding, controller) {
            (ControllerBinding::PerAgent, Some(params)) => Some(params.flatten()),
            _ => None,
        };
        Ok(AgentSnapshot {
            version: SNAPSHOT_VERSION,
            profile: self.profile.clone(),
            binding: self.binding,
            input_size: controller.map_or(0, ControllerParams::input_size),
            hidden_sizes: controller.map(ControllerParams::hidden_sizes).unwrap_or_default(),
            parameter_count: self.consolidator.parameter_count(),
            parameters,
            states: pools.records(&self.handles)?,
            affect: self.affect.clone(),
            attention: self.attention.attention().to_vec(),
            expectation: self.attention.expectation().to_vec(),
            working_memory: self.attention.working_memory().to_vec(),
            long_term_context: self.long_term_context.values().to_vec(),
            sampler: self.rng,
            ticks: self.ticks,
            memory: self.memory.to_record(),
            consolidator: self.consolidator.to_record(),
            accumulator: self.accumulator.to_record(),
            writes_since_consolidation: self.writes_since_consolidation,
            importance_sum: self.importance_sum,
        })
    }

    /// Overwrite this agent's state from a snapshot of the same shape.
    pub fn restore(&mut self, snapshot: AgentSnapshot, pools: &mut StatePools) -> NeuralResult<()> {
        expect_len("affect", Emotion::COUNT, snapshot.affect.values().len())?;
        expect_len("affect baseline", Emotion::COUNT, snapshot.affect.baseline().len())?;
        expect_len("attention", CHANNEL_COUNT, snapshot.attention.len())?;
        expect_len("expectation", CHANNEL_COUNT, snapshot.expectation.len())?;
        expect_len("working memory", WORKING_MEMORY_SLOTS, snapshot.working_memory.len())?;
        expect_len(
            "long-term context",
            self.long_term_context.len(),
            snapshot.long_term_context.len(),
        )?;

        if let Some(parameters) = &snapshot.parameters {
            let Some(controller) = self.controller.as_mut() else {
                return Err(NeuralError::config("snapshot carries parameters for a detached agent"));
            };
            Arc::make_mut(controller).load_flat(parameters)?;
        }
        pools.restore(&self.handles, &snapshot.states)?;
        self.memory.restore(&snapshot.memory)?;
        self.consolidator.restore(snapshot.consolidator)?;
        self.accumulator.restore(&snapshot.accumulator)?;

        let (attention, expectation, working_memory) = self.attention.parts_mut();
        attention.copy_from_slice(&snapshot.attention);
        expectation.copy_from_slice(&snapshot.expectation);
        working_memory.copy_from_slice(&snapshot.working_memory);
        self.long_term_context
            .values_mut()
            .copy_from_slice(&snapshot.long_term_context);
        self.affect = snapshot.affect;
        self.rng = snapshot.sampler;
        self.ticks = snapshot.ticks;
        self.writes_since_consolidation = snapshot.writes_since_consolidation;
        self.importance_sum = snapshot.importance_sum;
        self.pending_gossip = None;
        self.decision = ActionDecision::new();
        self.decision.tick = snapshot.ticks;
        Ok(())
    }
}
