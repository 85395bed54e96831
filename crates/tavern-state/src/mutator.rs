//! Mutators: pure edits that turn one [`GameState`] into the next.
//!
//! Every mutator is a small immutable value carrying only the parameters of
//! its edit. [`GameStateMutator::apply_to`] never fails. When the edit does
//! not change anything, or when it targets something that does not exist,
//! the input `Arc` is returned as-is; consumers rely on [`Arc::ptr_eq`] to
//! detect that nothing happened. Invalid targets are logged with
//! `tracing::warn!` and absorbed.
//!
//! Decoders that serialize their output use the [`Mutation`] enum, which
//! wraps every concrete mutator behind a `"type"` tag:
//!
//! ```
//! use tavern_state::mutator::Mutation;
//!
//! let line = r#"{"type":"tag_change","entity":1,"tag":20,"value":3}"#;
//! let mutation: Mutation = serde_json::from_str(line).unwrap();
//! assert!(matches!(mutation, Mutation::TagChange(_)));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::choice::{Choices, Descriptor, GameOption};
use crate::entity::{Entity, EntityId, GameTag, PlayerId};
use crate::state::{GameState, GameStateDiff};

// ---------------------------------------------------------------------------
// GameStateMutator
// ---------------------------------------------------------------------------

/// A pure transform from one snapshot to the next.
pub trait GameStateMutator {
    /// Apply the edit. Returns `Arc::clone(state)` when nothing changed.
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState>;
}

/// Shallow copy of a snapshot: clones the `Arc` fields only.
fn derive(state: &Arc<GameState>) -> GameState {
    GameState::clone(state)
}

/// Replace an entity, keeping the tree and diff set in step with its tags.
fn replace_entity(next: &mut GameState, old: &Entity, new: Entity) {
    let placement_changed =
        old.controller() != new.controller() || old.zone() != new.zone();

    let changed: Vec<GameStateDiff> = new
        .tags
        .iter()
        .filter(|(tag, value)| old.get_tag(**tag) != Some(**value))
        .map(|(tag, value)| GameStateDiff {
            entity: new.id,
            tag: *tag,
            previous: old.tag(*tag),
            current: *value,
        })
        .collect();
    if !changed.is_empty() {
        Arc::make_mut(&mut next.diffs).extend(changed);
    }

    if placement_changed {
        let tree = Arc::make_mut(&mut next.entity_tree);
        tree.remove(old);
        tree.insert(&new);
    }
    Arc::make_mut(&mut next.entities).insert(new.id, Arc::new(new));
}

// ---------------------------------------------------------------------------
// IncrementTime
// ---------------------------------------------------------------------------

/// Advance elapsed time by `delta`.
///
/// The first increment on an untimed snapshot initializes time to `0`
/// regardless of `delta`. Any actual change of time clears the diff set,
/// since diffs only describe the latest moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementTime {
    #[serde(default = "IncrementTime::default_delta")]
    pub delta: f64,
}

impl IncrementTime {
    pub fn new(delta: f64) -> Self {
        Self { delta }
    }

    fn default_delta() -> f64 {
        1.0
    }
}

impl Default for IncrementTime {
    fn default() -> Self {
        Self::new(Self::default_delta())
    }
}

impl GameStateMutator for IncrementTime {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        if self.delta == 0.0 && state.time.is_some() {
            return Arc::clone(state);
        }

        let time = match state.time {
            None => 0.0,
            Some(time) => time + self.delta,
        };
        if state.time == Some(time) {
            return Arc::clone(state);
        }

        let mut next = derive(state);
        next.time = Some(time);
        next.diffs = Arc::default();
        Arc::new(next)
    }
}

// ---------------------------------------------------------------------------
// SetChoices / ClearChoices
// ---------------------------------------------------------------------------

/// Replace one player's pending choice. Last write wins; always yields a
/// new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetChoices {
    pub player: PlayerId,
    pub choices: Choices,
}

impl GameStateMutator for SetChoices {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        let mut next = derive(state);
        Arc::make_mut(&mut next.choices).insert(self.player, self.choices.clone());
        Arc::new(next)
    }
}

/// Drop one player's pending choice and reset the option tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearChoices {
    pub player: PlayerId,
}

impl GameStateMutator for ClearChoices {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        if !self.player.is_valid() {
            warn!(player = self.player.0, "clear_choices: missing player");
            return Arc::clone(state);
        }
        if !state.choices.contains_key(&self.player) {
            return Arc::clone(state);
        }

        let mut next = derive(state);
        Arc::make_mut(&mut next.choices).remove(&self.player);
        next.option_tree = Arc::default();
        Arc::new(next)
    }
}

// ---------------------------------------------------------------------------
// Entity mutators
// ---------------------------------------------------------------------------

/// Create an entity, or overwrite it wholesale if the id is already known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddEntity {
    pub entity: Entity,
}

impl GameStateMutator for AddEntity {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        if !self.entity.id.is_valid() {
            warn!("add_entity: entity id 0 is not assignable");
            return Arc::clone(state);
        }

        let mut next = derive(state);
        match state.entity(self.entity.id) {
            Some(existing) if **existing == self.entity => return Arc::clone(state),
            Some(existing) => replace_entity(&mut next, existing, self.entity.clone()),
            None => {
                Arc::make_mut(&mut next.entity_tree).insert(&self.entity);
                Arc::make_mut(&mut next.entities)
                    .insert(self.entity.id, Arc::new(self.entity.clone()));
            }
        }
        Arc::new(next)
    }
}

/// Set a single tag on an existing entity.
///
/// Records a [`GameStateDiff`] and re-parents the entity in the tree when
/// `ZONE` or `CONTROLLER` changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagChange {
    pub entity: EntityId,
    pub tag: GameTag,
    pub value: i64,
}

impl GameStateMutator for TagChange {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        let Some(existing) = state.entity(self.entity) else {
            warn!(entity = self.entity.0, tag = self.tag.0, "tag_change: unknown entity");
            return Arc::clone(state);
        };
        if existing.get_tag(self.tag) == Some(self.value) {
            return Arc::clone(state);
        }

        let updated = Entity::clone(existing).with_tag(self.tag, self.value);
        let mut next = derive(state);
        replace_entity(&mut next, existing, updated);
        Arc::new(next)
    }
}

/// Reveal an entity: set its card id and merge in the revealed tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowEntity {
    pub entity: EntityId,
    pub card_id: String,
    #[serde(default)]
    pub tags: BTreeMap<GameTag, i64>,
}

impl GameStateMutator for ShowEntity {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        let Some(existing) = state.entity(self.entity) else {
            warn!(entity = self.entity.0, "show_entity: unknown entity");
            return Arc::clone(state);
        };

        let mut revealed = Entity::clone(existing).with_card_id(self.card_id.clone());
        revealed
            .tags
            .extend(self.tags.iter().map(|(tag, value)| (*tag, *value)));
        if revealed == **existing {
            return Arc::clone(state);
        }

        let mut next = derive(state);
        replace_entity(&mut next, existing, revealed);
        Arc::new(next)
    }
}

/// Forget an entity entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveEntity {
    pub entity: EntityId,
}

impl GameStateMutator for RemoveEntity {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        let Some(existing) = state.entity(self.entity) else {
            warn!(entity = self.entity.0, "remove_entity: unknown entity");
            return Arc::clone(state);
        };

        let mut next = derive(state);
        Arc::make_mut(&mut next.entity_tree).remove(existing);
        Arc::make_mut(&mut next.entities).remove(&self.entity);
        Arc::new(next)
    }
}

// ---------------------------------------------------------------------------
// Option mutators
// ---------------------------------------------------------------------------

/// Replace the available options and rebuild the option tree from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOptions {
    pub options: Vec<GameOption>,
}

impl GameStateMutator for SetOptions {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        let options: BTreeMap<u32, GameOption> = self
            .options
            .iter()
            .map(|option| (option.index, option.clone()))
            .collect();

        let mut tree: BTreeMap<EntityId, Vec<GameOption>> = BTreeMap::new();
        for option in options.values() {
            if let Some(entity) = option.entity {
                tree.entry(entity).or_default().push(option.clone());
            }
        }

        if *state.options == options && *state.option_tree == tree {
            return Arc::clone(state);
        }

        let mut next = derive(state);
        next.options = Arc::new(options);
        next.option_tree = Arc::new(tree);
        Arc::new(next)
    }
}

/// Remove all options, e.g. once the active player has acted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearOptions {}

impl GameStateMutator for ClearOptions {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        if state.options.is_empty() && state.option_tree.is_empty() {
            return Arc::clone(state);
        }

        let mut next = derive(state);
        next.options = Arc::default();
        next.option_tree = Arc::default();
        Arc::new(next)
    }
}

// ---------------------------------------------------------------------------
// Descriptor mutators
// ---------------------------------------------------------------------------

/// Enter a block: push its annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushDescriptor {
    pub descriptor: Descriptor,
}

impl GameStateMutator for PushDescriptor {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        let mut next = derive(state);
        Arc::make_mut(&mut next.descriptors).push(self.descriptor.clone());
        Arc::new(next)
    }
}

/// Leave the innermost block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopDescriptor {}

impl GameStateMutator for PopDescriptor {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        if state.descriptors.is_empty() {
            warn!("pop_descriptor: no open block");
            return Arc::clone(state);
        }

        let mut next = derive(state);
        Arc::make_mut(&mut next.descriptors).pop();
        Arc::new(next)
    }
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Any mutator, in a form a decoder can serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    IncrementTime(IncrementTime),
    SetChoices(SetChoices),
    ClearChoices(ClearChoices),
    AddEntity(AddEntity),
    TagChange(TagChange),
    ShowEntity(ShowEntity),
    RemoveEntity(RemoveEntity),
    SetOptions(SetOptions),
    ClearOptions(ClearOptions),
    PushDescriptor(PushDescriptor),
    PopDescriptor(PopDescriptor),
}

impl GameStateMutator for Mutation {
    fn apply_to(&self, state: &Arc<GameState>) -> Arc<GameState> {
        match self {
            Mutation::IncrementTime(m) => m.apply_to(state),
            Mutation::SetChoices(m) => m.apply_to(state),
            Mutation::ClearChoices(m) => m.apply_to(state),
            Mutation::AddEntity(m) => m.apply_to(state),
            Mutation::TagChange(m) => m.apply_to(state),
            Mutation::ShowEntity(m) => m.apply_to(state),
            Mutation::RemoveEntity(m) => m.apply_to(state),
            Mutation::SetOptions(m) => m.apply_to(state),
            Mutation::ClearOptions(m) => m.apply_to(state),
            Mutation::PushDescriptor(m) => m.apply_to(state),
            Mutation::PopDescriptor(m) => m.apply_to(state),
        }
    }
}

macro_rules! impl_from_mutator {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Mutation {
                fn from(m: $variant) -> Self {
                    Mutation::$variant(m)
                }
            }
        )*
    };
}

impl_from_mutator!(
    IncrementTime,
    SetChoices,
    ClearChoices,
    AddEntity,
    TagChange,
    ShowEntity,
    RemoveEntity,
    SetOptions,
    ClearOptions,
    PushDescriptor,
    PopDescriptor,
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::{ChoiceKind, OptionKind};
    use crate::entity::Zone;

    fn empty() -> Arc<GameState> {
        Arc::new(GameState::new())
    }

    fn mulligan() -> Choices {
        Choices {
            kind: ChoiceKind::Mulligan,
            source: None,
            entities: vec![EntityId(20), EntityId(21), EntityId(22)],
            min: 0,
            max: 3,
        }
    }

    fn with_card(state: &Arc<GameState>, id: u32, controller: i64, zone: i64) -> Arc<GameState> {
        AddEntity {
            entity: Entity::new(EntityId(id))
                .with_tag(GameTag::CONTROLLER, controller)
                .with_tag(GameTag::ZONE, zone),
        }
        .apply_to(state)
    }

    // -- IncrementTime ------------------------------------------------------

    #[test]
    fn first_increment_initializes_to_zero() {
        let state = IncrementTime::new(5.0).apply_to(&empty());
        assert_eq!(state.time(), Some(0.0));
    }

    #[test]
    fn zero_delta_on_untimed_state_still_initializes() {
        let state = IncrementTime::new(0.0).apply_to(&empty());
        assert_eq!(state.time(), Some(0.0));
    }

    #[test]
    fn zero_delta_on_timed_state_is_identity() {
        let timed = IncrementTime::default().apply_to(&empty());
        let same = IncrementTime::new(0.0).apply_to(&timed);
        assert!(Arc::ptr_eq(&timed, &same));
    }

    #[test]
    fn increment_adds_delta_and_clears_diffs() {
        let s = IncrementTime::default().apply_to(&empty());
        let s = with_card(&s, 10, 1, 2);
        let s = TagChange { entity: EntityId(10), tag: GameTag::ZONE, value: 3 }.apply_to(&s);
        assert_eq!(s.diffs().len(), 1);

        let later = IncrementTime::new(2.5).apply_to(&s);
        assert_eq!(later.time(), Some(2.5));
        assert!(later.diffs().is_empty());
        // the old snapshot is untouched
        assert_eq!(s.diffs().len(), 1);
    }

    // -- choices ------------------------------------------------------------

    #[test]
    fn set_choices_always_produces_new_state() {
        let set = SetChoices { player: PlayerId(1), choices: mulligan() };
        let a = set.apply_to(&empty());
        let b = set.apply_to(&a);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
        assert_eq!(b.choice(PlayerId(1)), Some(&mulligan()));
    }

    #[test]
    fn clear_choices_twice_is_identity_second_time() {
        let s = SetChoices { player: PlayerId(2), choices: mulligan() }.apply_to(&empty());
        let clear = ClearChoices { player: PlayerId(2) };
        let once = clear.apply_to(&s);
        assert!(once.choice(PlayerId(2)).is_none());
        let twice = clear.apply_to(&once);
        assert!(Arc::ptr_eq(&once, &twice));
    }

    #[test]
    fn clear_choices_without_player_is_noop() {
        let s = SetChoices { player: PlayerId(1), choices: mulligan() }.apply_to(&empty());
        let same = ClearChoices { player: PlayerId(0) }.apply_to(&s);
        assert!(Arc::ptr_eq(&s, &same));
    }

    #[test]
    fn clear_choices_resets_option_tree() {
        let s = SetOptions {
            options: vec![GameOption {
                index: 1,
                kind: OptionKind::Power,
                entity: Some(EntityId(30)),
                targets: vec![],
            }],
        }
        .apply_to(&empty());
        let s = SetChoices { player: PlayerId(1), choices: mulligan() }.apply_to(&s);
        assert!(!s.option_tree().is_empty());

        let cleared = ClearChoices { player: PlayerId(1) }.apply_to(&s);
        assert!(cleared.option_tree().is_empty());
        // the flat option list is left alone
        assert_eq!(cleared.options().len(), 1);
    }

    // -- entities -----------------------------------------------------------

    #[test]
    fn add_entity_places_it_in_tree() {
        let s = with_card(&empty(), 10, 1, 3);
        assert_eq!(
            s.entity_tree().zone(PlayerId(1), Zone::Hand).collect::<Vec<_>>(),
            vec![EntityId(10)]
        );
    }

    #[test]
    fn add_identical_entity_is_identity() {
        let s = with_card(&empty(), 10, 1, 3);
        let same = with_card(&s, 10, 1, 3);
        assert!(Arc::ptr_eq(&s, &same));
    }

    #[test]
    fn add_entity_with_zero_id_is_noop() {
        let s = empty();
        let same = AddEntity { entity: Entity::new(EntityId(0)) }.apply_to(&s);
        assert!(Arc::ptr_eq(&s, &same));
    }

    #[test]
    fn zone_change_reparents_and_records_diff() {
        let s = with_card(&empty(), 10, 1, 3);
        let played = TagChange { entity: EntityId(10), tag: GameTag::ZONE, value: 1 }.apply_to(&s);

        let tree = played.entity_tree();
        assert_eq!(tree.zone(PlayerId(1), Zone::Hand).count(), 0);
        assert_eq!(tree.zone(PlayerId(1), Zone::Play).collect::<Vec<_>>(), vec![EntityId(10)]);
        assert!(played.diffs().contains(&GameStateDiff {
            entity: EntityId(10),
            tag: GameTag::ZONE,
            previous: 3,
            current: 1,
        }));
    }

    #[test]
    fn tag_change_to_same_value_is_identity() {
        let s = with_card(&empty(), 10, 1, 3);
        let same = TagChange { entity: EntityId(10), tag: GameTag::ZONE, value: 3 }.apply_to(&s);
        assert!(Arc::ptr_eq(&s, &same));
    }

    #[test]
    fn tag_change_on_unknown_entity_is_noop() {
        let s = with_card(&empty(), 10, 1, 3);
        let same = TagChange { entity: EntityId(99), tag: GameTag::ZONE, value: 1 }.apply_to(&s);
        assert!(Arc::ptr_eq(&s, &same));
    }

    #[test]
    fn show_entity_reveals_card() {
        let s = with_card(&empty(), 10, 2, 2);
        let mut tags = BTreeMap::new();
        tags.insert(GameTag::ZONE, 3);
        let shown = ShowEntity { entity: EntityId(10), card_id: "CS2_029".into(), tags }.apply_to(&s);

        let e = shown.entity(EntityId(10)).unwrap();
        assert_eq!(e.card_id.as_deref(), Some("CS2_029"));
        assert_eq!(e.zone(), Zone::Hand);
        assert_eq!(shown.entity_tree().zone(PlayerId(2), Zone::Hand).count(), 1);

        let again = ShowEntity { entity: EntityId(10), card_id: "CS2_029".into(), tags: BTreeMap::new() }
            .apply_to(&shown);
        assert!(Arc::ptr_eq(&shown, &again));
    }

    #[test]
    fn remove_entity_drops_it_from_tree() {
        let s = with_card(&empty(), 10, 1, 1);
        let removed = RemoveEntity { entity: EntityId(10) }.apply_to(&s);
        assert!(removed.entity(EntityId(10)).is_none());
        assert!(removed.entity_tree().is_empty());

        let again = RemoveEntity { entity: EntityId(10) }.apply_to(&removed);
        assert!(Arc::ptr_eq(&removed, &again));
    }

    // -- options and descriptors --------------------------------------------

    #[test]
    fn set_options_groups_by_entity_and_is_idempotent() {
        let set = SetOptions {
            options: vec![
                GameOption { index: 0, kind: OptionKind::EndTurn, entity: None, targets: vec![] },
                GameOption {
                    index: 1,
                    kind: OptionKind::Power,
                    entity: Some(EntityId(40)),
                    targets: vec![EntityId(4), EntityId(6)],
                },
            ],
        };
        let s = set.apply_to(&empty());
        assert_eq!(s.options().len(), 2);
        assert_eq!(s.option_tree().len(), 1);
        assert!(Arc::ptr_eq(&s, &set.apply_to(&s)));

        let cleared = ClearOptions::default().apply_to(&s);
        assert!(cleared.options().is_empty());
        assert!(Arc::ptr_eq(&cleared, &ClearOptions::default().apply_to(&cleared)));
    }

    #[test]
    fn descriptors_behave_as_a_stack() {
        let d = |kind| Descriptor { entity: EntityId(8), target: None, kind };
        let s = PushDescriptor { descriptor: d(1) }.apply_to(&empty());
        let s = PushDescriptor { descriptor: d(7) }.apply_to(&s);
        assert_eq!(s.descriptors().last().map(|d| d.kind), Some(7));

        let s = PopDescriptor::default().apply_to(&s);
        let s = PopDescriptor::default().apply_to(&s);
        assert!(s.descriptors().is_empty());
        assert!(Arc::ptr_eq(&s, &PopDescriptor::default().apply_to(&s)));
    }

    // -- Mutation -----------------------------------------------------------

    #[test]
    fn mutation_json_dispatches_to_mutator() {
        let lines = [
            r#"{"type":"add_entity","entity":{"id":1,"tags":{"20":0}}}"#,
            r#"{"type":"increment_time"}"#,
            r#"{"type":"tag_change","entity":1,"tag":20,"value":1}"#,
            r#"{"type":"clear_options"}"#,
        ];
        let mut state = empty();
        for line in lines {
            let mutation: Mutation = serde_json::from_str(line).unwrap();
            state = mutation.apply_to(&state);
        }
        assert_eq!(state.time(), Some(0.0));
        assert_eq!(state.turn(), Some(1));
    }

    #[test]
    fn show_entity_json_merges_string_keyed_tags() {
        let add: Mutation =
            serde_json::from_str(r#"{"type":"add_entity","entity":{"id":12,"tags":{"50":1}}}"#)
                .unwrap();
        let show: Mutation = serde_json::from_str(
            r#"{"type":"show_entity","entity":12,"card_id":"EX1_001","tags":{"49":1}}"#,
        )
        .unwrap();

        let state = show.apply_to(&add.apply_to(&empty()));
        let card = state.entity(EntityId(12)).unwrap();
        assert_eq!(card.card_id.as_deref(), Some("EX1_001"));
        assert_eq!(card.zone(), Zone::Play);
        assert_eq!(card.controller(), PlayerId(1));
        assert_eq!(
            state.entity_tree().zone(PlayerId(1), Zone::Play).collect::<Vec<_>>(),
            vec![EntityId(12)]
        );
    }

    #[test]
    fn increment_time_delta_defaults_to_one() {
        let m: Mutation = serde_json::from_str(r#"{"type":"increment_time"}"#).unwrap();
        assert_eq!(m, Mutation::from(IncrementTime::default()));
    }
}
