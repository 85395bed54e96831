//! Pending decisions: player choices, playable options, and block descriptors.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// Choices
// ---------------------------------------------------------------------------

/// What kind of decision a [`Choices`] prompt represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    /// Opening-hand replacement.
    Mulligan,
    /// Discover, choose-one and similar prompts.
    General,
}

/// A pending choice offered to one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choices {
    pub kind: ChoiceKind,
    /// Entity that caused the prompt, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EntityId>,
    /// Entities the player may pick from.
    pub entities: Vec<EntityId>,
    /// Minimum number of picks.
    #[serde(default)]
    pub min: u32,
    /// Maximum number of picks.
    #[serde(default)]
    pub max: u32,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Kind of an available action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Pass,
    EndTurn,
    Power,
}

/// One action the active player may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOption {
    /// Position in the server's option list.
    pub index: u32,
    pub kind: OptionKind,
    /// Entity performing the action (`None` for end turn / pass).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityId>,
    /// Valid targets, empty when untargeted.
    #[serde(default)]
    pub targets: Vec<EntityId>,
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Annotation for the block currently being resolved (an attack, a played
/// card, a triggered effect). Purely informational; the UI uses it to draw
/// arrows and highlights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub entity: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityId>,
    /// Raw block type from the protocol.
    pub kind: i64,
}
