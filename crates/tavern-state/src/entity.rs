//! Entities, players, and the tag vocabulary.
//!
//! Every object in a game -- the game itself, the players, every card -- is an
//! [`Entity`]: an [`EntityId`] plus a bag of integer tags keyed by
//! [`GameTag`]. Zone placement and controller are tags like any other; the
//! structural view of them lives in [`EntityTree`](crate::state::EntityTree).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Identifier of an entity as assigned by the game server.
///
/// `0` is never assigned and is treated as "no entity".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The game entity always carries id 1.
    pub const GAME: EntityId = EntityId(1);

    /// Whether this id can refer to an entity at all.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A player slot (1 or 2 in a normal game). `0` means "no player".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// Whether this id names a player.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GameTag
// ---------------------------------------------------------------------------

/// Numeric tag key. Only the tags the timeline itself interprets get a
/// named constant; everything else passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GameTag(pub u32);

impl GameTag {
    /// Current turn number, carried by the game entity.
    pub const TURN: GameTag = GameTag(20);
    /// Zone the entity currently sits in (see [`Zone`]).
    pub const ZONE: GameTag = GameTag(49);
    /// Player controlling the entity.
    pub const CONTROLLER: GameTag = GameTag(50);
    /// Kind of card (game, player, hero, minion, ...).
    pub const CARDTYPE: GameTag = GameTag(202);
    /// Slot within the zone.
    pub const ZONE_POSITION: GameTag = GameTag(263);
}

// ---------------------------------------------------------------------------
// Numeric id decoding
// ---------------------------------------------------------------------------

/// Accepts a `u32` written either as a number or as a decimal string.
///
/// JSON object keys are always strings, and a tagged [`Mutation`] buffers
/// its input before decoding, so a tag map like `{"20": 1}` reaches the key
/// type as the string `"20"`.
///
/// [`Mutation`]: crate::mutator::Mutation
struct NumericIdVisitor(&'static str);

impl<'de> Visitor<'de> for NumericIdVisitor {
    type Value = u32;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as an unsigned integer or a numeric string", self.0)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
        u32::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
        u32::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
        v.trim()
            .parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

macro_rules! impl_numeric_id_deserialize {
    ($($ty:ident => $what:literal),* $(,)?) => {
        $(
            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    deserializer.deserialize_any(NumericIdVisitor($what)).map($ty)
                }
            }
        )*
    };
}

impl_numeric_id_deserialize!(
    EntityId => "an entity id",
    PlayerId => "a player id",
    GameTag => "a game tag",
);

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// Where an entity lives, decoded from its [`GameTag::ZONE`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    /// No zone (tag absent or 0).
    Invalid,
    Play,
    Deck,
    Hand,
    Graveyard,
    RemovedFromGame,
    SetAside,
    Secret,
    /// A value this crate does not know about, kept verbatim.
    Other(i64),
}

impl Zone {
    /// Decode a raw zone tag value.
    pub fn from_tag(value: i64) -> Self {
        match value {
            0 => Zone::Invalid,
            1 => Zone::Play,
            2 => Zone::Deck,
            3 => Zone::Hand,
            4 => Zone::Graveyard,
            5 => Zone::RemovedFromGame,
            6 => Zone::SetAside,
            7 => Zone::Secret,
            other => Zone::Other(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An immutable entity value.
///
/// Updates go through the `with_*` builders, which return a new value and leave
/// `self` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Server-assigned id.
    pub id: EntityId,
    /// Card identifier, `None` while the card is hidden from the viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    /// Tag values. Absent tags read as `0`.
    #[serde(default)]
    pub tags: BTreeMap<GameTag, i64>,
}

impl Entity {
    /// A hidden entity with no tags.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            card_id: None,
            tags: BTreeMap::new(),
        }
    }

    /// Builder: set a tag.
    pub fn with_tag(mut self, tag: GameTag, value: i64) -> Self {
        self.tags.insert(tag, value);
        self
    }

    /// Builder: set the card id.
    pub fn with_card_id(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = Some(card_id.into());
        self
    }

    /// Read a tag, defaulting to `0` when absent.
    pub fn tag(&self, tag: GameTag) -> i64 {
        self.tags.get(&tag).copied().unwrap_or(0)
    }

    /// Read a tag only if it was ever set.
    pub fn get_tag(&self, tag: GameTag) -> Option<i64> {
        self.tags.get(&tag).copied()
    }

    pub fn zone(&self) -> Zone {
        Zone::from_tag(self.tag(GameTag::ZONE))
    }

    /// Controlling player. Values outside `u32` are treated as no player.
    pub fn controller(&self) -> PlayerId {
        PlayerId(u32::try_from(self.tag(GameTag::CONTROLLER)).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_tags_read_as_zero() {
        let e = Entity::new(EntityId(4));
        assert_eq!(e.tag(GameTag::TURN), 0);
        assert_eq!(e.get_tag(GameTag::TURN), None);
        assert_eq!(e.zone(), Zone::Invalid);
        assert!(!e.controller().is_valid());
    }

    #[test]
    fn builders_set_zone_and_controller() {
        let e = Entity::new(EntityId(12))
            .with_tag(GameTag::ZONE, 3)
            .with_tag(GameTag::CONTROLLER, 2)
            .with_card_id("EX1_001");
        assert_eq!(e.zone(), Zone::Hand);
        assert_eq!(e.controller(), PlayerId(2));
        assert_eq!(e.card_id.as_deref(), Some("EX1_001"));
    }

    #[test]
    fn unknown_zone_kept_verbatim() {
        assert_eq!(Zone::from_tag(42), Zone::Other(42));
    }

    #[test]
    fn zero_ids_are_invalid() {
        assert!(!EntityId(0).is_valid());
        assert!(EntityId::GAME.is_valid());
        assert!(!PlayerId(0).is_valid());
        assert_eq!(format!("{:?}", EntityId(7)), "EntityId(7)");
    }

    #[test]
    fn entity_json_uses_plain_numbers() {
        let e = Entity::new(EntityId(3)).with_tag(GameTag::ZONE, 1);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["id"], serde_json::json!(3));
        assert_eq!(json["tags"]["49"], serde_json::json!(1));
        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn ids_decode_from_numbers_and_numeric_strings() {
        assert_eq!(serde_json::from_str::<GameTag>("20").unwrap(), GameTag::TURN);
        assert_eq!(serde_json::from_str::<GameTag>("\"49\"").unwrap(), GameTag::ZONE);
        assert_eq!(serde_json::from_str::<EntityId>("\"7\"").unwrap(), EntityId(7));
        assert_eq!(serde_json::from_str::<PlayerId>("2").unwrap(), PlayerId(2));
        assert!(serde_json::from_str::<GameTag>("\"turn\"").is_err());
        assert!(serde_json::from_str::<EntityId>("-1").is_err());
        assert!(serde_json::from_str::<EntityId>("4294967296").is_err());
    }

    #[test]
    fn tag_keys_survive_buffered_decoding() {
        // Untagged/internally tagged enums decode through a buffer, which
        // hands map keys over as strings.
        #[derive(Deserialize)]
        #[serde(tag = "type")]
        enum Wrapped {
            Entity { entity: Entity },
        }

        let json = r#"{"type":"Entity","entity":{"id":1,"tags":{"20":3,"49":1}}}"#;
        let Wrapped::Entity { entity } = serde_json::from_str(json).unwrap();
        assert_eq!(entity.id, EntityId::GAME);
        assert_eq!(entity.tag(GameTag::TURN), 3);
        assert_eq!(entity.zone(), Zone::Play);
    }
}
