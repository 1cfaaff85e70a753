//! Action and affect vocabularies shared by the game and the brain.

mod emotion;

pub use emotion::*;

use serde::{Deserialize, Serialize};

/// Every discrete action an agent can choose.
///
/// The discriminant doubles as the index into the action-probability
/// distribution, so the order here is part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ActionKind {
    #[default]
    None = 0,

    // Movement
    MoveNorth,
    MoveSouth,
    MoveEast,
    MoveWest,

    // Social
    GreetFriendly,
    GreetNeutral,
    GreetHostile,
    TellStory,
    AskQuestion,
    ExpressEmotion,

    // Combat
    AttackMelee,
    AttackRanged,
    Defend,
    Retreat,

    // Trade
    OfferTrade,
    AcceptTrade,
    DeclineTrade,

    // Memory
    RecallMemory,
    StoreMemory,
    ShareExperience,
}

/// Broad grouping of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCategory {
    Idle,
    Movement,
    Social,
    Combat,
    Trade,
    Memory,
}

impl ActionKind {
    /// Number of actions, including `None`.
    pub const COUNT: usize = 21;

    /// All actions in distribution order.
    pub const ALL: [ActionKind; Self::COUNT] = [
        ActionKind::None,
        ActionKind::MoveNorth,
        ActionKind::MoveSouth,
        ActionKind::MoveEast,
        ActionKind::MoveWest,
        ActionKind::GreetFriendly,
        ActionKind::GreetNeutral,
        ActionKind::GreetHostile,
        ActionKind::TellStory,
        ActionKind::AskQuestion,
        ActionKind::ExpressEmotion,
        ActionKind::AttackMelee,
        ActionKind::AttackRanged,
        ActionKind::Defend,
        ActionKind::Retreat,
        ActionKind::OfferTrade,
        ActionKind::AcceptTrade,
        ActionKind::DeclineTrade,
        ActionKind::RecallMemory,
        ActionKind::StoreMemory,
        ActionKind::ShareExperience,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up an action by its distribution index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn category(self) -> ActionCategory {
        match self {
            ActionKind::None => ActionCategory::Idle,
            ActionKind::MoveNorth
            | ActionKind::MoveSouth
            | ActionKind::MoveEast
            | ActionKind::MoveWest => ActionCategory::Movement,
            ActionKind::GreetFriendly
            | ActionKind::GreetNeutral
            | ActionKind::GreetHostile
            | ActionKind::TellStory
            | ActionKind::AskQuestion
            | ActionKind::ExpressEmotion => ActionCategory::Social,
            ActionKind::AttackMelee
            | ActionKind::AttackRanged
            | ActionKind::Defend
            | ActionKind::Retreat => ActionCategory::Combat,
            ActionKind::OfferTrade | ActionKind::AcceptTrade | ActionKind::DeclineTrade => {
                ActionCategory::Trade
            }
            ActionKind::RecallMemory | ActionKind::StoreMemory | ActionKind::ShareExperience => {
                ActionCategory::Memory
            }
        }
    }

    /// Actions that only make sense with someone to address.
    ///
    /// Trade and sharing an experience need a counterpart just like greetings do.
    pub fn needs_interlocutor(self) -> bool {
        matches!(
            self.category(),
            ActionCategory::Social | ActionCategory::Trade
        ) || self == ActionKind::ShareExperience
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
