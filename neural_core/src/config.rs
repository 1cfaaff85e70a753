//! Engine configuration.
//!
//! Every section has defaults, so a TOML file only needs the values it
//! overrides:
//!
//! ```toml
//! [controller]
//! hidden_sizes = [96, 64]
//!
//! [memory]
//! slots = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::agent::{EXPERIENCE_WIDTH, READOUT_WIDTH};
use crate::consolidation::PrunePolicy;
use crate::controller::{ControllerBinding, OutputMode};
use crate::error::{NeuralError, NeuralResult};
use crate::kernels::{KernelBackend, NumericPolicy};
use crate::memory::{SimilarityMetric, MAX_READ_HEADS};

/// Top-level configuration for an [`AgentSystem`](crate::AgentSystem).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kernels: KernelConfig,
    pub controller: ControllerConfig,
    pub memory: MemoryConfig,
    pub consolidation: ConsolidationConfig,
    pub agent: AgentConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Kernel implementation, chosen once at startup.
    pub backend: KernelBackend,
    /// What to do when a NaN or infinity shows up.
    pub numeric_policy: NumericPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Hidden width of each stacked layer, input side first.
    pub hidden_sizes: Vec<usize>,
    pub output_mode: OutputMode,
    /// Multiplier turning hidden activations into action logits.
    pub logit_scale: f32,
    /// Seed for deterministic weight initialization.
    pub init_seed: u64,
    pub forget_bias: f32,
    /// Default parameter ownership for newly spawned agents.
    pub binding: ControllerBinding,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64],
            output_mode: OutputMode::FinalLayer,
            logit_scale: 4.0,
            init_seed: 0x5eed_0f_c0_27e7,
            forget_bias: 0.1,
            binding: ControllerBinding::Shared,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Number of slots (N).
    pub slots: usize,
    /// Width of each slot (M).
    pub width: usize,
    /// Top-k matches blended per read. Zero disables reads.
    pub read_heads: usize,
    /// Geometric usage decay applied to every other slot on write.
    pub usage_decay: f32,
    /// Usage above which a slot counts as saturated.
    pub saturation: f32,
    pub metric: SimilarityMetric,
    /// Softmax sharpness for blending read heads.
    pub sharpness: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            slots: 128,
            width: 64,
            read_heads: 4,
            usage_decay: 0.95,
            saturation: 0.99,
            metric: SimilarityMetric::Cosine,
            sharpness: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub max_tasks: usize,
    pub lambda: f32,
    pub min_lambda: f32,
    pub max_lambda: f32,
    /// Applied to lambda on every adaptation step.
    pub lambda_decay: f32,
    /// Fisher values at or below this are dropped.
    pub min_fisher: f32,
    /// Largest fraction of parameters a Fisher table may keep.
    pub max_density: f32,
    /// Memory writes between consolidation passes. Zero disables them.
    pub interval: u32,
    pub prune_policy: PrunePolicy,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_tasks: 16,
            lambda: 400.0,
            min_lambda: 1.0,
            max_lambda: 10_000.0,
            lambda_decay: 0.99,
            min_fisher: 1e-8,
            max_density: 0.1,
            interval: 32,
            prune_policy: PrunePolicy::LeastImportant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Memory-write signal needed to store an experience.
    pub write_threshold: f32,
    /// Per-tick time budget in microseconds.
    pub tick_budget_us: u64,
    /// Attention retained per tick.
    pub attention_decay: f32,
    /// Deviation from expectation that counts as novel.
    pub novelty_threshold: f32,
    /// Learning rate of the rolling per-channel expectation.
    pub expectation_rate: f32,
    pub working_memory_rate: f32,
    /// Share of the long-term context kept when folding in a recall.
    pub context_retention: f32,
    /// Fraction of the distance to baseline affect kept per second.
    pub affect_retention: f32,
    /// Step size used by reward-driven adaptation.
    pub adaptation_rate: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            write_threshold: 0.5,
            tick_budget_us: 800,
            attention_decay: 0.95,
            novelty_threshold: 0.1,
            expectation_rate: 0.1,
            working_memory_rate: 0.1,
            context_retention: 0.7,
            affect_retention: 0.9,
            adaptation_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Agents (and controller state slots per layer) the system can hold.
    pub max_agents: usize,
    /// Float budget of each agent's arena.
    pub arena_floats: usize,
    /// Slots in the shared gossip memory. Zero, the default, disables it.
    ///
    /// Gossip is state outside any one agent, so with it enabled an agent
    /// only replays exactly after a reset if the board is cleared as well.
    pub gossip_slots: usize,
    /// Experience importance needed to publish into gossip memory.
    pub gossip_threshold: f32,
    /// Weight of a gossip recall folded into the long-term context.
    pub gossip_weight: f32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_agents: 16,
            arena_floats: 1 << 20,
            gossip_slots: 0,
            gossip_threshold: 0.6,
            gossip_weight: 0.1,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> NeuralResult<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> NeuralResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> NeuralResult<String> {
        toml::to_string(self).map_err(|e| NeuralError::config(e.to_string()))
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> NeuralResult<()> {
        let controller = &self.controller;
        let Some(&last) = controller.hidden_sizes.last() else {
            return Err(NeuralError::config("controller needs at least one layer"));
        };
        if controller.hidden_sizes.contains(&0) {
            return Err(NeuralError::config("controller layers must be non-empty"));
        }
        if last < READOUT_WIDTH {
            return Err(NeuralError::config(format!(
                "final controller layer has {last} units, needs at least {READOUT_WIDTH}"
            )));
        }
        if !(controller.logit_scale > 0.0) {
            return Err(NeuralError::config("logit_scale must be positive"));
        }

        let memory = &self.memory;
        if memory.width < EXPERIENCE_WIDTH {
            return Err(NeuralError::config(format!(
                "memory width {} is narrower than an experience record ({EXPERIENCE_WIDTH})",
                memory.width
            )));
        }
        if memory.read_heads > MAX_READ_HEADS {
            return Err(NeuralError::config(format!(
                "at most {MAX_READ_HEADS} read heads are supported"
            )));
        }
        if !(0.0..=1.0).contains(&memory.usage_decay) || !(0.0..=1.0).contains(&memory.saturation)
        {
            return Err(NeuralError::config("memory decay and saturation must lie in [0, 1]"));
        }

        let consolidation = &self.consolidation;
        if !(consolidation.max_density > 0.0 && consolidation.max_density <= 1.0) {
            return Err(NeuralError::config("max_density must lie in (0, 1]"));
        }
        if consolidation.min_lambda > consolidation.max_lambda || consolidation.min_lambda < 0.0 {
            return Err(NeuralError::config("lambda range is inverted or negative"));
        }
        if consolidation.max_tasks == 0 {
            return Err(NeuralError::config("consolidator needs at least one task slot"));
        }

        let agent = &self.agent;
        for (name, value) in [
            ("attention_decay", agent.attention_decay),
            ("expectation_rate", agent.expectation_rate),
            ("working_memory_rate", agent.working_memory_rate),
            ("context_retention", agent.context_retention),
            ("affect_retention", agent.affect_retention),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NeuralError::config(format!("{name} must lie in [0, 1]")));
            }
        }

        if self.system.max_agents == 0 {
            return Err(NeuralError::config("system must allow at least one agent"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.slots, 128);
        assert_eq!(config.consolidation.max_tasks, 16);
        assert_eq!(config.agent.tick_budget_us, 800);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [controller]
            hidden_sizes = [48, 32]

            [memory]
            slots = 32
            metric = "dot"
            "#,
        )
        .unwrap();
        assert_eq!(config.controller.hidden_sizes, vec![48, 32]);
        assert_eq!(config.memory.slots, 32);
        assert_eq!(config.memory.metric, SimilarityMetric::Dot);
        assert_eq!(config.memory.width, 64);
        assert_eq!(config.system.max_agents, 16);
    }

    #[test]
    fn test_rejects_narrow_final_layer() {
        let result = EngineConfig::from_toml_str("[controller]\nhidden_sizes = [64, 8]\n");
        assert!(matches!(result, Err(NeuralError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_density() {
        let mut config = EngineConfig::default();
        config.consolidation.max_density = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_too_many_read_heads() {
        let mut config = EngineConfig::default();
        config.memory.read_heads = MAX_READ_HEADS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let result = EngineConfig::from_toml_str("[memory\nslots = ");
        assert!(matches!(result, Err(NeuralError::ConfigParse(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        let back = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.toml");
        std::fs::write(&path, "[agent]\nwrite_threshold = 0.25\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert!((config.agent.write_threshold - 0.25).abs() < 0.001);
    }
}
