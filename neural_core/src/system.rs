//! The agent system: every agent plus the resources they share.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use game_bridge::{ActionDecision, AgentId, AgentProfile, InteractionContext, SensorySnapshot};

use crate::agent::{controller_input_width, Agent, TickEnv};
use crate::config::EngineConfig;
use crate::consolidation::PenaltyReport;
use crate::controller::{ControllerBinding, ControllerParams, StatePools};
use crate::error::{NeuralError, NeuralResult};
use crate::kernels::{select_kernels, Kernels, NumericGuard};
use crate::memory::{MemoryRecord, SharedMemory};
use crate::persistence::AgentSnapshot;
use crate::pool::{SlotHandle, SlotPool};

/// Cross-agent state, handed to each agent's tick explicitly.
///
/// Agents only read it while ticking. Publishing happens between agent
/// updates, so the order agents run in within a frame is the only thing
/// that decides who sees what.
///
/// None of it belongs to an agent. [`AgentSystem::reset`] and
/// [`AgentSystem::save`] leave it alone; see [`AgentSystem::clear_gossip`]
/// and [`AgentSystem::gossip_record`].
#[derive(Debug, Default)]
pub struct SharedContext {
    gossip: Option<SharedMemory>,
}

impl SharedContext {
    pub fn new(gossip: Option<SharedMemory>) -> Self {
        Self { gossip }
    }

    pub fn gossip(&self) -> Option<&SharedMemory> {
        self.gossip.as_ref()
    }

    pub fn gossip_mut(&mut self) -> Option<&mut SharedMemory> {
        self.gossip.as_mut()
    }
}

/// Input for one agent in a batched frame update.
#[derive(Debug, Clone, Copy)]
pub struct AgentFrame<'a> {
    pub id: AgentId,
    pub snapshot: &'a SensorySnapshot,
    pub context: &'a InteractionContext,
}

/// Owns every agent and the resources they share.
#[derive(Debug)]
pub struct AgentSystem {
    config: EngineConfig,
    kernels: &'static dyn Kernels,
    guard: NumericGuard,
    controller: Arc<ControllerParams>,
    pools: StatePools,
    agents: SlotPool<Agent>,
    index: HashMap<AgentId, SlotHandle>,
    shared: SharedContext,
}

impl AgentSystem {
    /// Validate the config, pick kernels and build the shared controller.
    pub fn new(config: EngineConfig) -> NeuralResult<Self> {
        config.validate()?;
        let kernels = select_kernels(config.kernels.backend);
        let guard = NumericGuard::new(config.kernels.numeric_policy);
        let controller = ControllerParams::new(
            controller_input_width(config.memory.width),
            &config.controller,
        )?;
        let capacity = config.system.max_agents;
        let pools = StatePools::new(controller.layers().len(), capacity);

        let gossip = if config.system.gossip_slots > 0 {
            let mut board = config.memory.clone();
            board.slots = config.system.gossip_slots;
            Some(SharedMemory::new(&board, config.system.gossip_threshold)?)
        } else {
            None
        };

        tracing::info!(
            kernels = kernels.name(),
            capacity,
            gossip = gossip.is_some(),
            "Agent system ready"
        );
        Ok(Self {
            kernels,
            guard,
            controller: Arc::new(controller),
            pools,
            agents: SlotPool::with_capacity("agent pool", capacity),
            index: HashMap::new(),
            shared: SharedContext::new(gossip),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kernels(&self) -> &'static dyn Kernels {
        self.kernels
    }

    /// Parameters shared by every agent bound to them.
    pub fn shared_controller(&self) -> &ControllerParams {
        &self.controller
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.agents.capacity()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.index.keys().copied()
    }

    pub fn shared_context(&self) -> &SharedContext {
        &self.shared
    }

    pub fn shared_context_mut(&mut self) -> &mut SharedContext {
        &mut self.shared
    }

    /// Spawn with the configured default binding.
    pub fn spawn(&mut self, profile: AgentProfile) -> NeuralResult<AgentId> {
        let binding = self.config.controller.binding;
        self.spawn_with(profile, binding)
    }

    pub fn spawn_with(
        &mut self,
        profile: AgentProfile,
        binding: ControllerBinding,
    ) -> NeuralResult<AgentId> {
        let id = profile.id;
        if self.index.contains_key(&id) {
            return Err(NeuralError::DuplicateAgent(id));
        }
        if self.agents.is_full() {
            return Err(NeuralError::exhausted("agent pool", self.agents.capacity()));
        }
        let agent = Agent::spawn(
            profile,
            binding,
            &self.controller,
            &mut self.pools,
            &self.config,
        )?;
        let handle = self.agents.insert(agent)?;
        self.index.insert(id, handle);
        Ok(id)
    }

    /// Remove an agent and return its state slots to the pools.
    pub fn despawn(&mut self, id: AgentId) -> NeuralResult<()> {
        let handle = self.index.remove(&id).ok_or(NeuralError::UnknownAgent(id))?;
        let agent = self.agents.remove(handle)?;
        agent.release(&mut self.pools);
        tracing::info!(agent = %id, "Despawned agent");
        Ok(())
    }

    fn handle(&self, id: AgentId) -> NeuralResult<SlotHandle> {
        self.index.get(&id).copied().ok_or(NeuralError::UnknownAgent(id))
    }

    pub fn agent(&self, id: AgentId) -> NeuralResult<&Agent> {
        self.agents.get(self.handle(id)?)
    }

    /// Run one tick for one agent, then publish its experience to the
    /// gossip board if it staged one.
    pub fn tick(
        &mut self,
        id: AgentId,
        snapshot: &SensorySnapshot,
        context: &InteractionContext,
        dt: f32,
    ) -> NeuralResult<&ActionDecision> {
        let handle = self.handle(id)?;
        let agent = self.agents.get_mut(handle)?;
        let env = TickEnv {
            kernels: self.kernels,
            guard: self.guard,
            pools: &mut self.pools,
            shared: &self.shared,
            config: &self.config,
        };
        agent.tick(env, snapshot, context, dt);

        if let (Some((record, importance)), Some(gossip)) =
            (agent.take_gossip(), self.shared.gossip_mut())
        {
            if let Err(err) = gossip.publish(record, importance) {
                tracing::warn!(agent = %id, error = %err, "Gossip publish failed");
            }
        }
        Ok(agent.decision())
    }

    /// Tick a batch of agents in order. Every id is checked before any
    /// agent runs, so an unknown id leaves all agents untouched.
    pub fn update_all(&mut self, frames: &[AgentFrame<'_>], dt: f32) -> NeuralResult<()> {
        for frame in frames {
            self.handle(frame.id)?;
        }
        for frame in frames {
            self.tick(frame.id, frame.snapshot, frame.context, dt)?;
        }
        Ok(())
    }

    /// Return an agent to its freshly spawned state.
    ///
    /// The gossip board is shared and is not touched. With gossip enabled,
    /// an agent replays its earlier decisions exactly only once the board
    /// is back in the state it had at spawn, e.g. via [`Self::clear_gossip`].
    pub fn reset(&mut self, id: AgentId) -> NeuralResult<()> {
        let handle = self.handle(id)?;
        self.agents.get_mut(handle)?.reset(&mut self.pools)
    }

    /// Empty the gossip board, if there is one.
    pub fn clear_gossip(&mut self) {
        if let Some(gossip) = self.shared.gossip_mut() {
            gossip.clear();
            tracing::debug!("Cleared gossip board");
        }
    }

    /// Contents of the gossip board, to save next to agent snapshots.
    pub fn gossip_record(&self) -> Option<MemoryRecord> {
        self.shared.gossip().map(SharedMemory::to_record)
    }

    /// Replace the gossip board's contents.
    pub fn restore_gossip(&mut self, record: &MemoryRecord) -> NeuralResult<()> {
        match self.shared.gossip_mut() {
            Some(gossip) => gossip.restore(record),
            None => Err(NeuralError::config("gossip board is disabled")),
        }
    }

    /// Reward or punish the agent's latest decision. See [`Agent::reinforce`].
    pub fn reinforce(&mut self, id: AgentId, reward: f32) -> NeuralResult<PenaltyReport> {
        let handle = self.handle(id)?;
        self.agents
            .get_mut(handle)?
            .reinforce(&self.pools, &self.config, reward)
    }

    /// Shift an agent's relationship with the player; returns the new level.
    pub fn modify_relationship(&mut self, id: AgentId, change: f32) -> NeuralResult<f32> {
        let handle = self.handle(id)?;
        Ok(self.agents.get_mut(handle)?.modify_relationship(change))
    }

    pub fn penalty(&self, id: AgentId) -> NeuralResult<PenaltyReport> {
        Ok(self.agent(id)?.penalty())
    }

    pub fn save(&self, id: AgentId) -> NeuralResult<AgentSnapshot> {
        let snapshot = self.agent(id)?.snapshot(&self.pools)?;
        tracing::debug!(agent = %id, ticks = snapshot.ticks, "Saved agent");
        Ok(snapshot)
    }

    /// Spawn an agent from a snapshot taken by a compatible system.
    ///
    /// The snapshot must match this system's version and controller shape.
    /// Nothing is spawned if any check or the restore itself fails.
    pub fn load(&mut self, snapshot: AgentSnapshot) -> NeuralResult<AgentId> {
        snapshot.check_compatible(&self.controller)?;
        let id = self.spawn_with(snapshot.profile.clone(), snapshot.binding)?;
        let handle = self.handle(id)?;
        let restored = self
            .agents
            .get_mut(handle)
            .and_then(|agent| agent.restore(snapshot, &mut self.pools));
        if let Err(err) = restored {
            self.despawn(id)?;
            return Err(err);
        }
        tracing::info!(agent = %id, "Loaded agent");
        Ok(id)
    }

    pub fn save_to_path(&self, id: AgentId, path: impl AsRef<Path>) -> NeuralResult<()> {
        self.save(id)?.write_to_path(path)
    }

    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> NeuralResult<AgentId> {
        let snapshot = AgentSnapshot::read_from_path(path)?;
        self.load(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{KernelBackend, NumericPolicy};
    use game_bridge::Archetype;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.kernels.backend = KernelBackend::Scalar;
        config.kernels.numeric_policy = NumericPolicy::Sanitize;
        config.memory.slots = 16;
        config.system.max_agents = 2;
        config
    }

    fn gossiping() -> EngineConfig {
        let mut config = config();
        config.system.gossip_slots = 8;
        config.system.gossip_threshold = 0.0;
        config.agent.write_threshold = -1.0;
        config
    }

    fn run(system: &mut AgentSystem, id: AgentId, ticks: usize) -> Vec<ActionDecision> {
        let quiet = SensorySnapshot::quiet();
        let visited = SensorySnapshot::quiet().with_player(0.4);
        (0..ticks)
            .map(|t| {
                let (snapshot, context) = if t % 3 == 0 {
                    (&visited, InteractionContext::friendly())
                } else {
                    (&quiet, InteractionContext::idle())
                };
                let mut decision = system.tick(id, snapshot, &context, 0.016).unwrap().clone();
                decision.over_budget = false;
                decision
            })
            .collect()
    }

    #[test]
    fn test_spawn_and_despawn() {
        let mut system = AgentSystem::new(config()).unwrap();
        let id = system.spawn(AgentProfile::new("Edda", Archetype::Craftsman)).unwrap();
        assert!(system.contains(id));
        assert_eq!(system.len(), 1);
        system.despawn(id).unwrap();
        assert!(system.is_empty());
        assert!(matches!(system.despawn(id), Err(NeuralError::UnknownAgent(_))));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut system = AgentSystem::new(config()).unwrap();
        system.spawn(AgentProfile::new("A", Archetype::Warrior)).unwrap();
        system.spawn(AgentProfile::new("B", Archetype::Scholar)).unwrap();
        let err = system
            .spawn(AgentProfile::new("C", Archetype::Mystic))
            .unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(system.len(), 2);
    }

    #[test]
    fn test_despawn_frees_state_slots() {
        let mut system = AgentSystem::new(config()).unwrap();
        let a = system.spawn(AgentProfile::new("A", Archetype::Warrior)).unwrap();
        system.spawn(AgentProfile::new("B", Archetype::Scholar)).unwrap();
        system.despawn(a).unwrap();
        assert!(system.spawn(AgentProfile::new("C", Archetype::Mystic)).is_ok());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut system = AgentSystem::new(config()).unwrap();
        let profile = AgentProfile::new("Twin", Archetype::Rogue);
        system.spawn(profile.clone()).unwrap();
        assert!(matches!(system.spawn(profile), Err(NeuralError::DuplicateAgent(_))));
    }

    #[test]
    fn test_detached_agents_use_no_state_slots() {
        let mut system = AgentSystem::new(config()).unwrap();
        let id = system
            .spawn_with(AgentProfile::new("Golem", Archetype::Guardian), ControllerBinding::Detached)
            .unwrap();
        let decision = system
            .tick(id, &SensorySnapshot::quiet(), &InteractionContext::friendly(), 0.016)
            .unwrap();
        assert!(decision.degraded);
        assert_eq!(decision.action, game_bridge::ActionKind::GreetNeutral);
        assert_eq!(system.pools.in_use(), 0);
    }

    #[test]
    fn test_update_all_checks_ids_first() {
        let mut system = AgentSystem::new(config()).unwrap();
        let id = system.spawn(AgentProfile::new("A", Archetype::Wanderer)).unwrap();
        let snapshot = SensorySnapshot::quiet();
        let context = InteractionContext::idle();
        let frames = [
            AgentFrame { id, snapshot: &snapshot, context: &context },
            AgentFrame { id: AgentId::new(), snapshot: &snapshot, context: &context },
        ];
        assert!(matches!(system.update_all(&frames, 0.016), Err(NeuralError::UnknownAgent(_))));
        assert_eq!(system.agent(id).unwrap().ticks(), 0);

        system.update_all(&frames[..1], 0.016).unwrap();
        assert_eq!(system.agent(id).unwrap().ticks(), 1);
    }

    #[test]
    fn test_gossip_reaches_other_agents() {
        let mut system = AgentSystem::new(gossiping()).unwrap();
        let id = system.spawn(AgentProfile::new("Teller", Archetype::Merchant)).unwrap();
        let decision = system
            .tick(id, &SensorySnapshot::quiet().with_player(0.3), &InteractionContext::friendly(), 0.016)
            .unwrap();
        assert!(decision.memory_written);
        let gossip = system.shared_context().gossip().unwrap();
        assert_eq!(gossip.published(), 1);
        assert_eq!(gossip.analyze().occupied, 1);
    }

    #[test]
    fn test_gossip_is_opt_in() {
        let system = AgentSystem::new(EngineConfig::default()).unwrap();
        assert!(system.shared_context().gossip().is_none());
        assert!(system.gossip_record().is_none());
    }

    #[test]
    fn test_default_config_reset_replays() {
        let mut config = EngineConfig::default();
        config.kernels.numeric_policy = NumericPolicy::Sanitize;
        let mut system = AgentSystem::new(config).unwrap();
        let id = system.spawn(AgentProfile::new("Fenna", Archetype::Rogue)).unwrap();
        let first = run(&mut system, id, 120);
        system.reset(id).unwrap();
        assert_eq!(run(&mut system, id, 120), first);
    }

    #[test]
    fn test_reset_with_cleared_gossip_replays() {
        let mut system = AgentSystem::new(gossiping()).unwrap();
        let id = system.spawn(AgentProfile::new("Teller", Archetype::Merchant)).unwrap();
        let first = run(&mut system, id, 30);
        assert!(system.shared_context().gossip().unwrap().published() > 0);

        system.reset(id).unwrap();
        system.clear_gossip();
        assert_eq!(system.shared_context().gossip().unwrap().analyze().occupied, 0);
        assert_eq!(run(&mut system, id, 30), first);
    }

    #[test]
    fn test_saved_gossip_continues_identically() {
        let mut original = AgentSystem::new(gossiping()).unwrap();
        let id = original.spawn(AgentProfile::new("Teller", Archetype::Merchant)).unwrap();
        run(&mut original, id, 20);
        let snapshot = original.save(id).unwrap();
        let board = original.gossip_record().unwrap();

        let mut restored = AgentSystem::new(gossiping()).unwrap();
        restored.load(snapshot).unwrap();
        restored.restore_gossip(&board).unwrap();
        assert_eq!(run(&mut restored, id, 20), run(&mut original, id, 20));
    }

    #[test]
    fn test_restore_gossip_needs_a_board() {
        let mut with_board = AgentSystem::new(gossiping()).unwrap();
        let record = with_board.gossip_record().unwrap();
        with_board.restore_gossip(&record).unwrap();
        let mut without = AgentSystem::new(config()).unwrap();
        assert!(matches!(without.restore_gossip(&record), Err(NeuralError::Config(_))));
    }

    #[test]
    fn test_relationship_change_survives_save() {
        let mut system = AgentSystem::new(config()).unwrap();
        let id = system.spawn(AgentProfile::new("Orla", Archetype::Wanderer)).unwrap();
        let before = system.agent(id).unwrap().relationship_level();
        let after = system.modify_relationship(id, 0.8).unwrap();
        assert!(after > before);

        let snapshot = system.save(id).unwrap();
        system.despawn(id).unwrap();
        system.load(snapshot).unwrap();
        assert_eq!(system.agent(id).unwrap().relationship_level(), after);
        assert!(matches!(
            system.modify_relationship(AgentId::new(), 0.1),
            Err(NeuralError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_unknown_agent_errors() {
        let mut system = AgentSystem::new(config()).unwrap();
        let ghost = AgentId::new();
        assert!(matches!(system.reset(ghost), Err(NeuralError::UnknownAgent(_))));
        assert!(matches!(system.save(ghost), Err(NeuralError::UnknownAgent(_))));
        assert!(system
            .tick(ghost, &SensorySnapshot::quiet(), &InteractionContext::idle(), 0.016)
            .is_err());
    }
}
