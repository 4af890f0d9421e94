#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tilegate movement gate.
//!
//! This crate defines the value types that connect the map loader, the
//! per-map caches, the entity spatial index and the collision pipeline.
//! Producers of movement (input handling, NPC AI) build a
//! [`MovementRequest`] and receive a [`MoveDecision`] carrying a stable
//! [`BlockReason`] code. Load-time problems in map data surface as
//! [`ConfigurationError`] values and never reach a movement query.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace applied to behavior identifiers that omit one.
pub const DEFAULT_SCRIPT_NAMESPACE: &str = "base:tilebehavior:";

/// Identifier of a loaded map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(u32);

impl MapId {
    /// Creates a new map identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// Unique identifier assigned to an entity by the component store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Vertical layer tag carried by tiles and movers.
///
/// Level 0 is the wildcard ("unspecified") and level 15 marks overhead
/// bridge decks. Values above 15 cannot be represented; loaded data that
/// contains them is rejected as a [`ConfigurationError`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Elevation(u8);

impl Elevation {
    /// Wildcard elevation matching every other elevation.
    pub const WILDCARD: Self = Self(0);
    /// Overhead elevation used by bridges and decks.
    pub const OVERHEAD: Self = Self(15);
    /// Highest representable elevation level.
    pub const MAX_LEVEL: u8 = 15;
    /// Number of distinct elevation levels.
    pub const LEVELS: usize = Self::MAX_LEVEL as usize + 1;

    /// Creates an elevation, returning `None` when `level` exceeds [`Self::MAX_LEVEL`].
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX_LEVEL {
            Some(Self(level))
        } else {
            None
        }
    }

    /// Validates a raw elevation read from map data at the provided cell.
    pub fn checked(map: MapId, x: u32, y: u32, level: u8) -> Result<Self, ConfigurationError> {
        Self::new(level).ok_or(ConfigurationError::ElevationOutOfRange {
            map,
            x,
            y,
            value: level,
        })
    }

    /// Raw elevation level in `0..=15`.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Index of the elevation suitable for per-level tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Reports whether this is the wildcard level.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD.0
    }

    /// Reports whether this is the overhead level.
    #[must_use]
    pub const fn is_overhead(&self) -> bool {
        self.0 == Self::OVERHEAD.0
    }

    /// Iterates every representable elevation in ascending order.
    pub fn all() -> impl Iterator<Item = Elevation> {
        (0..=Self::MAX_LEVEL).map(Elevation)
    }
}

/// Raw elevation value that does not fit in `0..=15`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("elevation {0} is outside 0..=15")]
pub struct ElevationOutOfRange(pub u8);

impl TryFrom<u8> for Elevation {
    type Error = ElevationOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ElevationOutOfRange(value))
    }
}

impl From<Elevation> for u8 {
    fn from(value: Elevation) -> Self {
        value.0
    }
}

/// Cardinal travel directions on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// All directions in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Column and row delta produced by one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::North => 0b0001,
            Self::East => 0b0010,
            Self::South => 0b0100,
            Self::West => 0b1000,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        })
    }
}

/// Compact set of travel directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectionSet(u8);

impl DirectionSet {
    /// Set containing no directions.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing every direction.
    #[must_use]
    pub const fn all() -> Self {
        Self(0b1111)
    }

    /// Set containing only `direction`.
    #[must_use]
    pub const fn single(direction: Direction) -> Self {
        Self(direction.bit())
    }

    /// Returns a copy of the set that also contains `direction`.
    #[must_use]
    pub const fn with(self, direction: Direction) -> Self {
        Self(self.0 | direction.bit())
    }

    /// Reports whether `direction` is part of the set.
    #[must_use]
    pub const fn contains(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Reports whether the set holds no directions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the contained directions in clockwise order.
    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL
            .into_iter()
            .filter(move |direction| self.contains(*direction))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<T: IntoIterator<Item = Direction>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, direction| set.with(direction))
    }
}

/// Fully qualified grid location including the vertical layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    map: MapId,
    x: u32,
    y: u32,
    elevation: Elevation,
}

impl GridCell {
    /// Creates a new grid cell.
    #[must_use]
    pub const fn new(map: MapId, x: u32, y: u32, elevation: Elevation) -> Self {
        Self {
            map,
            x,
            y,
            elevation,
        }
    }

    /// Manhattan distance between the planar coordinates of two cells.
    #[must_use]
    pub fn manhattan_distance(&self, other: &GridCell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Static passability code for a single tile.
///
/// Zero is passable; every other value blocks. Directional codes are kept
/// verbatim so that tooling can display them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollisionValue(u8);

impl CollisionValue {
    /// Value describing a freely passable tile.
    pub const PASSABLE: Self = Self(0);

    /// Wraps a raw collision byte.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw collision byte.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Reports whether the value blocks entry.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.0 != 0
    }
}

/// Namespaced identifier of an interaction script.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScriptId(String);

impl ScriptId {
    /// Parses a behavior identifier.
    ///
    /// Qualified identifiers (containing `:`) are kept as written. Bare
    /// names are normalized to `snake_case` and placed in
    /// [`DEFAULT_SCRIPT_NAMESPACE`], so `IceFloor` becomes
    /// `base:tilebehavior:ice_floor`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains(':') {
            return Self(trimmed.to_owned());
        }
        Self(format!("{DEFAULT_SCRIPT_NAMESPACE}{}", normalize_name(trimmed)))
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ScriptId {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ScriptId> for String {
    fn from(value: ScriptId) -> Self {
        value.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for character in name.chars() {
        if character.is_ascii_uppercase() {
            if previous.is_some_and(|prev| prev.is_ascii_lowercase() || prev.is_ascii_digit()) {
                normalized.push('_');
            }
            normalized.push(character.to_ascii_lowercase());
        } else if character.is_ascii_alphanumeric() {
            normalized.push(character);
        } else if character.is_whitespace() || character == '-' || character == '_' {
            normalized.push('_');
        }
        previous = Some(character);
    }

    let mut collapsed = String::with_capacity(normalized.len());
    for character in normalized.chars() {
        if character == '_' && (collapsed.is_empty() || collapsed.ends_with('_')) {
            continue;
        }
        collapsed.push(character);
    }
    while collapsed.ends_with('_') {
        let _ = collapsed.pop();
    }
    collapsed
}

/// Behavior family of a tile interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Tile that may only be entered while travelling in the listed directions.
    OneWay,
    /// Ledge entered by jumping in a single direction.
    JumpLedge,
    /// Bridge deck that may always be entered.
    Bridge,
    /// Behavior answered by an external interaction script.
    Custom,
}

/// Parameters attached to an interaction descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InteractionParameters {
    /// Travel directions permitted to enter the tile.
    pub directions: DirectionSet,
    /// Script answering queries for [`InteractionKind::Custom`] tiles.
    pub script: Option<ScriptId>,
}

/// Resolved interaction behavior for a tile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileInteractionDescriptor {
    /// Behavior family.
    pub kind: InteractionKind,
    /// Kind-specific parameters.
    pub parameters: InteractionParameters,
}

impl TileInteractionDescriptor {
    /// One-way tile entered only while travelling in `directions`.
    #[must_use]
    pub fn one_way(directions: DirectionSet) -> Self {
        Self {
            kind: InteractionKind::OneWay,
            parameters: InteractionParameters {
                directions,
                script: None,
            },
        }
    }

    /// Ledge entered only by jumping in `direction`.
    #[must_use]
    pub fn jump_ledge(direction: Direction) -> Self {
        Self {
            kind: InteractionKind::JumpLedge,
            parameters: InteractionParameters {
                directions: DirectionSet::single(direction),
                script: None,
            },
        }
    }

    /// Bridge deck that permits entry from every direction.
    #[must_use]
    pub fn bridge() -> Self {
        Self {
            kind: InteractionKind::Bridge,
            parameters: InteractionParameters {
                directions: DirectionSet::all(),
                script: None,
            },
        }
    }

    /// Tile whose behavior is answered by the named script.
    #[must_use]
    pub fn custom(script: ScriptId) -> Self {
        Self {
            kind: InteractionKind::Custom,
            parameters: InteractionParameters {
                directions: DirectionSet::empty(),
                script: Some(script),
            },
        }
    }

    /// Entry rule for built-in kinds; `None` for [`InteractionKind::Custom`].
    #[must_use]
    pub fn permits_builtin(&self, direction: Direction) -> Option<bool> {
        match self.kind {
            InteractionKind::Bridge => Some(true),
            InteractionKind::OneWay | InteractionKind::JumpLedge => {
                Some(self.parameters.directions.contains(direction))
            }
            InteractionKind::Custom => None,
        }
    }

    /// Forced jump direction for ledges; `None` for every other built-in kind.
    #[must_use]
    pub fn builtin_jump(&self) -> Option<Direction> {
        match self.kind {
            InteractionKind::JumpLedge => self.parameters.directions.iter().next(),
            _ => None,
        }
    }
}

/// Entity asking to move, resolved to its elevation once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mover {
    /// Player-controlled entity.
    Player {
        /// Identifier of the player entity.
        id: EntityId,
        /// Recorded elevation of the player.
        elevation: Elevation,
    },
    /// Scripted non-player character.
    Npc {
        /// Identifier of the NPC entity.
        id: EntityId,
        /// Recorded elevation of the NPC.
        elevation: Elevation,
    },
    /// Entity that does not track elevation.
    Generic {
        /// Identifier of the entity.
        id: EntityId,
    },
}

impl Mover {
    /// Identifier of the moving entity.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        match self {
            Self::Player { id, .. } | Self::Npc { id, .. } | Self::Generic { id } => *id,
        }
    }

    /// Recorded elevation; generic movers report the wildcard.
    #[must_use]
    pub const fn elevation(&self) -> Elevation {
        match self {
            Self::Player { elevation, .. } | Self::Npc { elevation, .. } => *elevation,
            Self::Generic { .. } => Elevation::WILDCARD,
        }
    }
}

/// Single-step movement request evaluated by the collision pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovementRequest {
    /// Entity asking to move.
    pub mover: Mover,
    /// Map on which the move happens.
    pub map: MapId,
    /// Column of the origin cell.
    pub from_x: u32,
    /// Row of the origin cell.
    pub from_y: u32,
    /// Column of the destination cell.
    pub to_x: i64,
    /// Row of the destination cell.
    pub to_y: i64,
    /// Mover elevation resolved when the request was built.
    pub elevation: Elevation,
    /// Direction of travel.
    pub direction: Direction,
}

impl MovementRequest {
    /// Builds a request for one step from `(x, y)` in `direction`.
    ///
    /// The destination may lie outside the map, including at negative
    /// coordinates; the bounds stage rejects those.
    #[must_use]
    pub fn step(mover: Mover, map: MapId, x: u32, y: u32, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            mover,
            map,
            from_x: x,
            from_y: y,
            to_x: i64::from(x) + i64::from(dx),
            to_y: i64::from(y) + i64::from(dy),
            elevation: mover.elevation(),
            direction,
        }
    }

    /// Destination as unsigned coordinates, or `None` when it is negative or too large.
    #[must_use]
    pub fn destination(&self) -> Option<(u32, u32)> {
        Some((u32::try_from(self.to_x).ok()?, u32::try_from(self.to_y).ok()?))
    }
}

/// Stage that rejected a movement request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockReason {
    /// A pre-check observer vetoed the move.
    Override,
    /// The destination lies outside the map.
    Bounds,
    /// The destination's interaction forbids entry from this direction.
    Interaction,
    /// The destination's static collision value is solid.
    Collision,
    /// The destination's elevation does not match the mover.
    Elevation,
    /// A solid entity occupies the destination.
    Entity,
}

impl BlockReason {
    /// Stable reason code reported to callers.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Override => "blocked-by-override",
            Self::Bounds => "blocked-by-bounds",
            Self::Interaction => "blocked-by-interaction",
            Self::Collision => "blocked-by-collision",
            Self::Elevation => "blocked-by-elevation",
            Self::Entity => "blocked-by-entity",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of a movement query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveDecision {
    /// Whether the move may proceed.
    pub allowed: bool,
    /// Rejecting stage when the move is blocked.
    pub reason: Option<BlockReason>,
    /// Forced jump reported by the destination tile for allowed moves.
    pub jump: Option<Direction>,
}

impl MoveDecision {
    /// Decision allowing the move.
    #[must_use]
    pub const fn allowed(jump: Option<Direction>) -> Self {
        Self {
            allowed: true,
            reason: None,
            jump,
        }
    }

    /// Decision blocking the move for `reason`.
    #[must_use]
    pub const fn blocked(reason: BlockReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            jump: None,
        }
    }

    /// Reason code: `allowed`, or the blocking stage's code.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self.reason {
            Some(reason) => reason.code(),
            None => "allowed",
        }
    }
}

/// Map data problems detected while a map is being activated.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A tile or layer elevation exceeds 15.
    #[error("{map}: elevation {value} at ({x}, {y}) is outside 0..=15")]
    ElevationOutOfRange {
        /// Offending map.
        map: MapId,
        /// Column of the offending cell.
        x: u32,
        /// Row of the offending cell.
        y: u32,
        /// Raw elevation value found in the data.
        value: u8,
    },
    /// A layer elevation exceeds 15.
    #[error("{map}: layer `{layer}` declares elevation {value}, outside 0..=15")]
    LayerElevationOutOfRange {
        /// Offending map.
        map: MapId,
        /// Name of the offending layer.
        layer: String,
        /// Raw elevation value found in the data.
        value: u8,
    },
    /// A tile reference falls outside every tileset id range.
    #[error("{map}: tile reference {gid} at ({x}, {y}) belongs to no tileset")]
    MissingTileset {
        /// Offending map.
        map: MapId,
        /// Column of the offending cell.
        x: u32,
        /// Row of the offending cell.
        y: u32,
        /// Global tile reference that could not be resolved.
        gid: u32,
    },
    /// A tile names an interaction script the host does not provide.
    #[error("{map}: interaction script `{script}` used at ({x}, {y}) does not exist")]
    MissingScript {
        /// Offending map.
        map: MapId,
        /// Column of the offending cell.
        x: u32,
        /// Row of the offending cell.
        y: u32,
        /// Identifier of the missing script.
        script: ScriptId,
    },
    /// A grid does not hold `width * height` entries.
    #[error("{map}: layer `{layer}` holds {actual} cells, expected {expected}")]
    GridSizeMismatch {
        /// Offending map.
        map: MapId,
        /// Name of the offending layer.
        layer: String,
        /// Cell count implied by the map dimensions.
        expected: usize,
        /// Cell count found in the data.
        actual: usize,
    },
    /// Two tilesets claim overlapping id ranges.
    #[error("{map}: tilesets `{first}` and `{second}` have overlapping id ranges")]
    OverlappingTilesets {
        /// Offending map.
        map: MapId,
        /// Name of the first tileset.
        first: String,
        /// Name of the second tileset.
        second: String,
    },
    /// A tileset or packed grid numbers its tiles from gid 0, the empty tile.
    #[error("{map}: `{owner}` starts at gid 0, which is reserved for empty cells")]
    ReservedFirstGid {
        /// Offending map.
        map: MapId,
        /// Tileset or layer whose numbering starts at zero.
        owner: String,
    },
    /// Two tilesets share a name.
    #[error("{map}: tileset `{name}` is declared more than once")]
    DuplicateTileset {
        /// Offending map.
        map: MapId,
        /// Repeated tileset name.
        name: String,
    },
    /// A map with the same identifier is already active.
    #[error("{map} is already loaded")]
    DuplicateMap {
        /// Offending map.
        map: MapId,
    },
    /// An operation referenced a map that is not loaded.
    #[error("{map} is not loaded")]
    UnknownMap {
        /// Offending map.
        map: MapId,
    },
}
