//! # Neural Core
//!
//! The real-time brain behind every NPC. This crate takes the fixed-shape
//! inputs defined in `game_bridge`, runs one decision cycle per agent per
//! tick, and hands back an action decision.
//!
//! ## Core Components
//!
//! - **kernels**: Arena-backed tensors and interchangeable scalar/lane kernels
//! - **controller**: Stacked gated-recurrent cells with pooled per-agent state
//! - **memory**: Content-addressable slot memory with usage-based allocation
//! - **consolidation**: Sparse Fisher penalty against catastrophic forgetting
//! - **agent**: The six-stage Sense → Attend → Recall → Decide → Feel → Remember cycle
//! - **system**: Owns agents, state pools and the shared gossip board
//! - **persistence**: Versioned per-agent snapshots
//!
//! ## Design Philosophy
//!
//! - **Bounded**: Capacities are fixed at spawn; running out is an explicit error
//! - **Deterministic**: Sampling is counter-based, so a reset agent replays exactly
//! - **Shielding**: Internal faults degrade to rule-based behavior instead of reaching the game loop

pub mod agent;
pub mod config;
pub mod consolidation;
pub mod controller;
pub mod error;
pub mod kernels;
pub mod memory;
pub mod persistence;
pub mod pool;
pub mod sampler;
pub mod system;

pub use agent::{Agent, AffectState, AttentionState, TickStats};
pub use config::*;
pub use consolidation::*;
pub use controller::*;
pub use error::*;
pub use kernels::*;
pub use memory::*;
pub use persistence::*;
pub use pool::*;
pub use sampler::*;
pub use system::*;
