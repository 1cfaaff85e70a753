//! # Game Bridge
//!
//! The contract between the game and the NPC brain. Everything here is plain,
//! fixed-shape data: who an agent is, what it perceives each tick and what it
//! decided to do. This crate contains no neural logic.

pub mod entities;
pub mod mechanics;
pub mod perception;

pub use entities::*;
pub use mechanics::*;
pub use perception::*;
