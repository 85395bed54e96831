//! The immutable [`GameState`] snapshot.
//!
//! A snapshot describes the whole game at one instant. Every field is held
//! behind an [`Arc`], so deriving a new snapshot from an old one copies a
//! handful of pointers and only the field being edited is cloned
//! (`Arc::make_mut`). Snapshots themselves are handed around as
//! `Arc<GameState>`: mutators that change nothing return the *same* `Arc`,
//! which lets consumers detect "nothing happened" with [`Arc::ptr_eq`]
//! instead of a deep comparison.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tavern_state::prelude::*;
//!
//! let state = Arc::new(GameState::new());
//! assert_eq!(state.time(), None);
//!
//! let started = IncrementTime::default().apply_to(&state);
//! assert_eq!(started.time(), Some(0.0));
//!
//! // A zero-delta increment on a timed snapshot is a no-op.
//! let same = IncrementTime::new(0.0).apply_to(&started);
//! assert!(Arc::ptr_eq(&same, &started));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::choice::{Choices, Descriptor, GameOption};
use crate::entity::{Entity, EntityId, GameTag, PlayerId, Zone};

// ---------------------------------------------------------------------------
// GameStateDiff
// ---------------------------------------------------------------------------

/// One tag change made since the previous moment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameStateDiff {
    pub entity: EntityId,
    pub tag: GameTag,
    pub previous: i64,
    pub current: i64,
}

// ---------------------------------------------------------------------------
// EntityTree
// ---------------------------------------------------------------------------

/// Structural placement of entities: controller -> zone -> entities.
///
/// The tree is derived from each entity's `CONTROLLER` and `ZONE` tags and is
/// kept in sync by the mutators that touch those tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTree {
    zones: BTreeMap<PlayerId, BTreeMap<Zone, BTreeSet<EntityId>>>,
}

impl EntityTree {
    /// Entities one player holds in one zone, in id order.
    pub fn zone(&self, player: PlayerId, zone: Zone) -> impl Iterator<Item = EntityId> + '_ {
        self.zones
            .get(&player)
            .and_then(|zones| zones.get(&zone))
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Number of entities placed in the tree.
    pub fn len(&self) -> usize {
        self.zones
            .values()
            .flat_map(|zones| zones.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(&mut self, entity: &Entity) {
        self.zones
            .entry(entity.controller())
            .or_default()
            .entry(entity.zone())
            .or_default()
            .insert(entity.id);
    }

    /// Remove an entity from the slot its tags place it in. Empty branches
    /// are pruned so that structurally equal trees compare equal.
    pub(crate) fn remove(&mut self, entity: &Entity) {
        let controller = entity.controller();
        let zone = entity.zone();
        let Some(zones) = self.zones.get_mut(&controller) else {
            return;
        };
        if let Some(ids) = zones.get_mut(&zone) {
            ids.remove(&entity.id);
            if ids.is_empty() {
                zones.remove(&zone);
            }
        }
        if zones.is_empty() {
            self.zones.remove(&controller);
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Full game state at one instant.
///
/// Two snapshots compare equal iff every field is equal. The entity tree is
/// derived data and is skipped when serializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameState {
    pub(crate) entities: Arc<BTreeMap<EntityId, Arc<Entity>>>,
    #[serde(skip)]
    pub(crate) entity_tree: Arc<EntityTree>,
    pub(crate) options: Arc<BTreeMap<u32, GameOption>>,
    pub(crate) option_tree: Arc<BTreeMap<EntityId, Vec<GameOption>>>,
    pub(crate) time: Option<f64>,
    pub(crate) choices: Arc<BTreeMap<PlayerId, Choices>>,
    pub(crate) descriptors: Arc<Vec<Descriptor>>,
    pub(crate) diffs: Arc<BTreeSet<GameStateDiff>>,
}

impl GameState {
    /// An empty game with no elapsed time.
    pub fn new() -> Self {
        Self::default()
    }

    // -- accessors ----------------------------------------------------------

    pub fn entities(&self) -> &BTreeMap<EntityId, Arc<Entity>> {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        self.entities.get(&id)
    }

    /// The game entity, once it has been created.
    pub fn game(&self) -> Option<&Arc<Entity>> {
        self.entity(EntityId::GAME)
    }

    pub fn entity_tree(&self) -> &EntityTree {
        &self.entity_tree
    }

    /// Available options keyed by their server index.
    pub fn options(&self) -> &BTreeMap<u32, GameOption> {
        &self.options
    }

    /// Available options grouped by the entity that performs them.
    pub fn option_tree(&self) -> &BTreeMap<EntityId, Vec<GameOption>> {
        &self.option_tree
    }

    /// Elapsed time, `None` until the first time step is observed.
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn choices(&self) -> &BTreeMap<PlayerId, Choices> {
        &self.choices
    }

    pub fn choice(&self, player: PlayerId) -> Option<&Choices> {
        self.choices.get(&player)
    }

    /// Block annotations, innermost last.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Tag changes made since time last advanced.
    pub fn diffs(&self) -> &BTreeSet<GameStateDiff> {
        &self.diffs
    }

    /// Current turn, read from the game entity. `None` before the game
    /// entity exists; `0` while it exists but no turn has started.
    pub fn turn(&self) -> Option<i64> {
        self.game().map(|game| game.tag(GameTag::TURN))
    }

    /// BLAKE3 hex digest of the serialized snapshot.
    ///
    /// Two reconstructions of the same replay produce the same digest, which
    /// makes this useful for regression fixtures.
    pub fn state_hash(&self) -> Result<String, serde_json::Error> {
        let json_bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json_bytes).to_hex().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: u32, controller: i64, zone: i64) -> Entity {
        Entity::new(EntityId(id))
            .with_tag(GameTag::CONTROLLER, controller)
            .with_tag(GameTag::ZONE, zone)
    }

    #[test]
    fn new_state_is_empty_and_untimed() {
        let state = GameState::new();
        assert!(state.entities().is_empty());
        assert!(state.entity_tree().is_empty());
        assert_eq!(state.time(), None);
        assert_eq!(state.turn(), None);
    }

    #[test]
    fn tree_insert_and_remove_prunes_branches() {
        let mut tree = EntityTree::default();
        let a = card(10, 1, 3);
        let b = card(11, 1, 3);
        tree.insert(&a);
        tree.insert(&b);
        assert_eq!(
            tree.zone(PlayerId(1), Zone::Hand).collect::<Vec<_>>(),
            vec![EntityId(10), EntityId(11)]
        );

        tree.remove(&a);
        tree.remove(&b);
        assert!(tree.is_empty());
        assert_eq!(tree, EntityTree::default());
    }

    #[test]
    fn remove_of_unplaced_entity_is_harmless() {
        let mut tree = EntityTree::default();
        tree.remove(&card(5, 2, 1));
        assert!(tree.is_empty());
    }

    #[test]
    fn turn_reads_game_entity() {
        let mut state = GameState::new();
        let game = Entity::new(EntityId::GAME).with_tag(GameTag::TURN, 4);
        Arc::make_mut(&mut state.entities).insert(EntityId::GAME, Arc::new(game));
        assert_eq!(state.turn(), Some(4));
    }

    #[test]
    fn state_hash_is_stable_and_sensitive() {
        let a = GameState::new();
        let mut b = GameState::new();
        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
        assert_eq!(a.state_hash().unwrap().len(), 64);

        b.time = Some(3.0);
        assert_ne!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }
}
