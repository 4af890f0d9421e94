#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Map and tileset definitions consumed by the tilegate caches.
//!
//! The loader collaborator hands the movement gate a [`MapDefinition`] per
//! map: per-elevation collision grids, tile layers holding global tile
//! references, and the tilesets those references point into. [`validate`]
//! checks the structural invariants before anything is cached so that
//! broken data is reported while the map is activated instead of during a
//! movement query.

mod bounds;
mod packed;

use std::collections::BTreeSet;

use serde::Deserialize;
use tilegate_core::{
    ConfigurationError, Direction, DirectionSet, Elevation, MapId, ScriptId,
    TileInteractionDescriptor,
};

pub use bounds::BoundsValidator;
pub use packed::PackedMetatile;

/// Tiled flag marking a horizontally flipped tile reference.
pub const FLIPPED_HORIZONTALLY: u32 = 0x8000_0000;
/// Tiled flag marking a vertically flipped tile reference.
pub const FLIPPED_VERTICALLY: u32 = 0x4000_0000;
/// Tiled flag marking a diagonally flipped tile reference.
pub const FLIPPED_DIAGONALLY: u32 = 0x2000_0000;

const FLIP_MASK: u32 = FLIPPED_HORIZONTALLY | FLIPPED_VERTICALLY | FLIPPED_DIAGONALLY;

/// Removes the flip flags from a tile reference, leaving the global id.
#[must_use]
pub const fn strip_flip_flags(raw: u32) -> u32 {
    raw & !FLIP_MASK
}

/// Complete description of one map as supplied by the loader.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MapDefinition {
    /// Identifier of the map.
    pub id: MapId,
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Row-major tile elevations; empty means every tile is at elevation 0.
    #[serde(default)]
    pub elevations: Vec<u8>,
    /// Static collision grids, one per elevation.
    #[serde(default)]
    pub collision_layers: Vec<CollisionLayerDefinition>,
    /// Tile layers holding global tile references, bottom to top.
    #[serde(default)]
    pub tile_layers: Vec<TileLayerDefinition>,
    /// Tilesets referenced by the tile layers.
    #[serde(default)]
    pub tilesets: Vec<TilesetDefinition>,
}

/// Static collision values for a single elevation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CollisionLayerDefinition {
    /// Elevation the layer applies to.
    pub elevation: u8,
    /// Row-major collision bytes.
    pub cells: Vec<u8>,
}

/// Layer of global tile references.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TileLayerDefinition {
    /// Human readable layer name used in error messages.
    pub name: String,
    /// Elevation the layer's interactions apply to.
    #[serde(default)]
    pub elevation: u8,
    /// Row-major global tile references; 0 is the empty tile.
    pub gids: Vec<u32>,
}

/// Tileset covering the id range `first_gid..first_gid + tile_count`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TilesetDefinition {
    /// Name of the tileset.
    pub name: String,
    /// First global id assigned to the tileset.
    pub first_gid: u32,
    /// Number of tiles in the tileset.
    pub tile_count: u32,
    /// Metadata for tiles that carry behavior; other tiles are plain.
    #[serde(default)]
    pub tiles: Vec<TileMetadata>,
}

impl TilesetDefinition {
    /// Reports whether `gid` falls within the tileset's id range.
    #[must_use]
    pub fn contains(&self, gid: u32) -> bool {
        gid >= self.first_gid && u64::from(gid) < self.end_gid()
    }

    /// Converts a global id into this tileset's local tile index.
    #[must_use]
    pub fn local_index(&self, gid: u32) -> Option<u32> {
        if self.contains(gid) {
            Some(gid - self.first_gid)
        } else {
            None
        }
    }

    /// Metadata record for the provided local tile index.
    #[must_use]
    pub fn metadata(&self, local_id: u32) -> Option<&TileMetadata> {
        self.tiles.iter().find(|tile| tile.local_id == local_id)
    }

    fn end_gid(&self) -> u64 {
        u64::from(self.first_gid) + u64::from(self.tile_count)
    }
}

/// Behavior metadata attached to a single tile.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TileMetadata {
    /// Index of the tile within its tileset.
    pub local_id: u32,
    /// Interaction carried by the tile, if any.
    #[serde(default)]
    pub interaction: Option<InteractionDefinition>,
}

/// Interaction behavior as authored in tileset data.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionDefinition {
    /// Tile entered only while travelling in one of `directions`.
    OneWay {
        /// Permitted travel directions.
        directions: Vec<Direction>,
    },
    /// Ledge entered by jumping in `direction`.
    JumpLedge {
        /// Jump direction.
        direction: Direction,
    },
    /// Bridge deck.
    Bridge,
    /// Behavior answered by an interaction script.
    Custom {
        /// Script identifier, normalized into the default namespace when bare.
        script: ScriptId,
    },
}

impl InteractionDefinition {
    /// Converts the authored form into the resolved descriptor.
    #[must_use]
    pub fn to_descriptor(&self) -> TileInteractionDescriptor {
        match self {
            Self::OneWay { directions } => {
                TileInteractionDescriptor::one_way(directions.iter().copied().collect::<DirectionSet>())
            }
            Self::JumpLedge { direction } => TileInteractionDescriptor::jump_ledge(*direction),
            Self::Bridge => TileInteractionDescriptor::bridge(),
            Self::Custom { script } => TileInteractionDescriptor::custom(script.clone()),
        }
    }
}

/// Result of following a tile reference into the tilesets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileLookup<'a> {
    /// The reference is the empty tile.
    Empty,
    /// No tileset covers the reference.
    Unassigned {
        /// Global id after flip flags were removed.
        gid: u32,
    },
    /// The reference resolved to a tile.
    Tile {
        /// Owning tileset.
        tileset: &'a TilesetDefinition,
        /// Local index within the tileset.
        local_id: u32,
        /// Metadata record, when the tile has one.
        metadata: Option<&'a TileMetadata>,
    },
}

impl MapDefinition {
    /// Number of cells implied by the map dimensions.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let cells = u64::from(self.width) * u64::from(self.height);
        usize::try_from(cells).unwrap_or(usize::MAX)
    }

    /// Planar coordinates of a row-major index.
    #[must_use]
    pub fn coordinates(&self, index: usize) -> (u32, u32) {
        let width = usize::try_from(self.width).unwrap_or(usize::MAX).max(1);
        let x = u32::try_from(index % width).unwrap_or(u32::MAX);
        let y = u32::try_from(index / width).unwrap_or(u32::MAX);
        (x, y)
    }

    /// Tileset whose id range contains `gid`.
    #[must_use]
    pub fn tileset_for_gid(&self, gid: u32) -> Option<&TilesetDefinition> {
        self.tilesets.iter().find(|tileset| tileset.contains(gid))
    }

    /// Follows a raw tile reference through the tilesets.
    #[must_use]
    pub fn lookup(&self, raw: u32) -> TileLookup<'_> {
        let gid = strip_flip_flags(raw);
        if gid == 0 {
            return TileLookup::Empty;
        }

        let Some(tileset) = self.tileset_for_gid(gid) else {
            return TileLookup::Unassigned { gid };
        };
        let Some(local_id) = tileset.local_index(gid) else {
            return TileLookup::Unassigned { gid };
        };

        TileLookup::Tile {
            tileset,
            local_id,
            metadata: tileset.metadata(local_id),
        }
    }
}

/// Checks the structural invariants of a map definition.
///
/// Grid sizes, elevation ranges, tileset id ranges and tile references are
/// checked in that order; the first problem found is returned. Script
/// references are checked by the interaction resolver, which owns the
/// script host.
pub fn validate(definition: &MapDefinition) -> Result<(), ConfigurationError> {
    let map = definition.id;
    let expected = definition.cell_count();

    if !definition.elevations.is_empty() && definition.elevations.len() != expected {
        return Err(ConfigurationError::GridSizeMismatch {
            map,
            layer: "elevations".to_owned(),
            expected,
            actual: definition.elevations.len(),
        });
    }
    for (index, level) in definition.elevations.iter().enumerate() {
        let (x, y) = definition.coordinates(index);
        let _ = Elevation::checked(map, x, y, *level)?;
    }

    for (position, layer) in definition.collision_layers.iter().enumerate() {
        let name = format!("collision[{position}]");
        if layer.cells.len() != expected {
            return Err(ConfigurationError::GridSizeMismatch {
                map,
                layer: name,
                expected,
                actual: layer.cells.len(),
            });
        }
        if Elevation::new(layer.elevation).is_none() {
            return Err(ConfigurationError::LayerElevationOutOfRange {
                map,
                layer: name,
                value: layer.elevation,
            });
        }
    }

    check_tileset_ranges(definition)?;

    for layer in &definition.tile_layers {
        if layer.gids.len() != expected {
            return Err(ConfigurationError::GridSizeMismatch {
                map,
                layer: layer.name.clone(),
                expected,
                actual: layer.gids.len(),
            });
        }
        if Elevation::new(layer.elevation).is_none() {
            return Err(ConfigurationError::LayerElevationOutOfRange {
                map,
                layer: layer.name.clone(),
                value: layer.elevation,
            });
        }
        for (index, raw) in layer.gids.iter().enumerate() {
            if let TileLookup::Unassigned { gid } = definition.lookup(*raw) {
                let (x, y) = definition.coordinates(index);
                return Err(ConfigurationError::MissingTileset { map, x, y, gid });
            }
        }
    }

    log::trace!(
        "{map}: validated {} collision layers and {} tile layers",
        definition.collision_layers.len(),
        definition.tile_layers.len()
    );
    Ok(())
}

fn check_tileset_ranges(definition: &MapDefinition) -> Result<(), ConfigurationError> {
    let mut ordered: Vec<&TilesetDefinition> = definition.tilesets.iter().collect();
    ordered.sort_by_key(|tileset| tileset.first_gid);

    let mut names = BTreeSet::new();
    for pair in ordered.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if first.end_gid() > u64::from(second.first_gid) {
            return Err(ConfigurationError::OverlappingTilesets {
                map: definition.id,
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }
    }
    for tileset in ordered {
        if tileset.first_gid == 0 {
            return Err(ConfigurationError::ReservedFirstGid {
                map: definition.id,
                owner: tileset.name.clone(),
            });
        }
        if !names.insert(tileset.name.as_str()) {
            return Err(ConfigurationError::DuplicateTileset {
                map: definition.id,
                name: tileset.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tileset(first_gid: u32, tile_count: u32) -> TilesetDefinition {
        TilesetDefinition {
            name: format!("set{first_gid}"),
            first_gid,
            tile_count,
            tiles: vec![TileMetadata {
                local_id: 2,
                interaction: Some(InteractionDefinition::Bridge),
            }],
        }
    }

    fn map_with_layer(gids: Vec<u32>) -> MapDefinition {
        MapDefinition {
            id: MapId::new(1),
            width: 2,
            height: 2,
            elevations: Vec::new(),
            collision_layers: Vec::new(),
            tile_layers: vec![TileLayerDefinition {
                name: "ground".to_owned(),
                elevation: 0,
                gids,
            }],
            tilesets: vec![tileset(1, 4)],
        }
    }

    #[test]
    fn lookup_walks_gid_to_metadata() {
        let map = map_with_layer(vec![0, 3, 1, 4]);

        assert_eq!(map.lookup(0), TileLookup::Empty);
        match map.lookup(3) {
            TileLookup::Tile {
                local_id, metadata, ..
            } => {
                assert_eq!(local_id, 2);
                assert!(metadata.is_some());
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
        match map.lookup(3 | FLIPPED_HORIZONTALLY | FLIPPED_DIAGONALLY) {
            TileLookup::Tile { local_id, .. } => assert_eq!(local_id, 2),
            other => panic!("flip flags must be ignored: {other:?}"),
        }
        assert_eq!(map.lookup(9), TileLookup::Unassigned { gid: 9 });
    }

    #[test]
    fn validate_reports_unassigned_reference_with_cell() {
        let map = map_with_layer(vec![0, 0, 0, 17]);

        assert_eq!(
            validate(&map),
            Err(ConfigurationError::MissingTileset {
                map: MapId::new(1),
                x: 1,
                y: 1,
                gid: 17,
            })
        );
    }

    #[test]
    fn validate_rejects_out_of_range_tile_elevation() {
        let mut map = map_with_layer(vec![0; 4]);
        map.elevations = vec![0, 3, 16, 0];

        assert_eq!(
            validate(&map),
            Err(ConfigurationError::ElevationOutOfRange {
                map: MapId::new(1),
                x: 0,
                y: 1,
                value: 16,
            })
        );
    }

    #[test]
    fn validate_rejects_mismatched_collision_grid() {
        let mut map = map_with_layer(vec![0; 4]);
        map.collision_layers.push(CollisionLayerDefinition {
            elevation: 3,
            cells: vec![0; 3],
        });

        assert!(matches!(
            validate(&map),
            Err(ConfigurationError::GridSizeMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_overlapping_tilesets() {
        let mut map = map_with_layer(vec![0; 4]);
        map.tilesets.push(tileset(4, 10));

        assert!(matches!(
            validate(&map),
            Err(ConfigurationError::OverlappingTilesets { .. })
        ));
    }

    #[test]
    fn validate_rejects_tilesets_starting_at_the_empty_gid() {
        let mut map = map_with_layer(vec![0; 4]);
        map.tilesets = vec![tileset(0, 1)];

        let error = validate(&map).expect_err("gid 0 is reserved");
        assert_eq!(
            error,
            ConfigurationError::ReservedFirstGid {
                map: MapId::new(1),
                owner: "set0".to_owned(),
            }
        );
        assert_eq!(
            error.to_string(),
            "map#1: `set0` starts at gid 0, which is reserved for empty cells"
        );
    }

    #[test]
    fn validate_rejects_repeated_tileset_names() {
        let mut map = map_with_layer(vec![0; 4]);
        let mut repeated = tileset(10, 4);
        repeated.name = "set1".to_owned();
        map.tilesets.push(repeated);

        let error = validate(&map).expect_err("names must be unique");
        assert_eq!(
            error,
            ConfigurationError::DuplicateTileset {
                map: MapId::new(1),
                name: "set1".to_owned(),
            }
        );
        assert_eq!(
            error.to_string(),
            "map#1: tileset `set1` is declared more than once"
        );
    }

    #[test]
    fn validate_accepts_well_formed_map() {
        let mut map = map_with_layer(vec![1, 2, 3, 4]);
        map.tilesets.push(tileset(5, 10));
        map.elevations = vec![0, 3, 3, 15];

        assert_eq!(validate(&map), Ok(()));
    }

    #[test]
    fn map_definitions_deserialize_from_toml() {
        let source = r#"
            id = 7
            width = 2
            height = 1
            elevations = [3, 3]

            [[collision_layers]]
            elevation = 3
            cells = [0, 1]

            [[tile_layers]]
            name = "ledges"
            elevation = 3
            gids = [1, 0]

            [[tilesets]]
            name = "outdoor"
            first_gid = 1
            tile_count = 8

            [[tilesets.tiles]]
            local_id = 0
            interaction = { kind = "jump_ledge", direction = "south" }
        "#;

        let map: MapDefinition = toml::from_str(source).expect("map parses");

        assert_eq!(map.id, MapId::new(7));
        assert_eq!(validate(&map), Ok(()));
        let interaction = map.tilesets[0].tiles[0]
            .interaction
            .as_ref()
            .expect("interaction present");
        assert_eq!(
            interaction.to_descriptor(),
            TileInteractionDescriptor::jump_ledge(Direction::South)
        );
    }
}
