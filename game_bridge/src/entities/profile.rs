//! Agent profile definitions.

use serde::{Deserialize, Serialize};

use super::{AgentId, Archetype};

/// Static description of an agent, supplied by the game at spawn time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub archetype: Archetype,
    pub background: Option<String>,
}

impl AgentProfile {
    /// Create a new profile with a fresh id.
    pub fn new(name: impl Into<String>, archetype: Archetype) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            archetype,
            background: None,
        }
    }

    /// Use a caller-chosen id instead of a random one.
    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }
}
