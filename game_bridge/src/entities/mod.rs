//! Agent identity and archetype definitions.

mod archetype;
mod profile;

pub use archetype::*;
pub use profile::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for every brain-driven agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new random agent ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an agent ID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a nil agent ID (useful for defaults).
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Fold the 128-bit id into a 64-bit seed.
    pub fn seed(&self) -> u64 {
        let bits = self.0.as_u128();
        (bits as u64) ^ ((bits >> 64) as u64)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_stable_for_same_uuid() {
        let uuid = Uuid::from_u128(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210);
        let a = AgentId::from_uuid(uuid);
        let b = AgentId::from_uuid(uuid);
        assert_eq!(a.seed(), b.seed());
        assert_eq!(a.seed(), 0x0123_4567_89ab_cdef ^ 0xfedc_ba98_7654_3210);
    }

    #[test]
    fn test_nil_id() {
        assert_eq!(AgentId::nil().seed(), 0);
        assert_eq!(AgentId::nil().to_string(), "00000000-0000-0000-0000-000000000000");
    }
}
