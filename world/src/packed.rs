//! Decoding of packed 16-bit metatile grids.
//!
//! Each entry stores the metatile id in bits 0-9, a collision code in bits
//! 10-11 and the tile elevation in bits 12-15.

use std::collections::BTreeMap;

use tilegate_core::{ConfigurationError, MapId};

use crate::{CollisionLayerDefinition, MapDefinition, TileLayerDefinition, TilesetDefinition};

const METATILE_ID_MASK: u16 = 0x03FF;
const COLLISION_MASK: u16 = 0x0C00;
const COLLISION_SHIFT: u16 = 10;
const ELEVATION_MASK: u16 = 0xF000;
const ELEVATION_SHIFT: u16 = 12;

/// Single packed map entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PackedMetatile(u16);

impl PackedMetatile {
    /// Wraps a raw packed entry.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Metatile index within the map's tilesets.
    #[must_use]
    pub const fn metatile_id(&self) -> u16 {
        self.0 & METATILE_ID_MASK
    }

    /// Two-bit collision code.
    #[must_use]
    pub const fn collision(&self) -> u8 {
        ((self.0 & COLLISION_MASK) >> COLLISION_SHIFT) as u8
    }

    /// Four-bit tile elevation.
    #[must_use]
    pub const fn elevation(&self) -> u8 {
        ((self.0 & ELEVATION_MASK) >> ELEVATION_SHIFT) as u8
    }
}

impl MapDefinition {
    /// Builds a map from a packed metatile grid.
    ///
    /// One collision layer and one tile layer are produced per elevation
    /// present in the grid; each holds only the cells at its elevation.
    /// Tile references are `first_gid + metatile id`, so `first_gid` must
    /// not be zero.
    pub fn from_packed(
        id: MapId,
        width: u32,
        height: u32,
        entries: &[u16],
        first_gid: u32,
        tilesets: Vec<TilesetDefinition>,
    ) -> Result<Self, ConfigurationError> {
        let mut definition = Self {
            id,
            width,
            height,
            elevations: Vec::with_capacity(entries.len()),
            collision_layers: Vec::new(),
            tile_layers: Vec::new(),
            tilesets,
        };

        if first_gid == 0 {
            return Err(ConfigurationError::ReservedFirstGid {
                map: id,
                owner: "metatiles".to_owned(),
            });
        }
        let expected = definition.cell_count();
        if entries.len() != expected {
            return Err(ConfigurationError::GridSizeMismatch {
                map: id,
                layer: "metatiles".to_owned(),
                expected,
                actual: entries.len(),
            });
        }

        let mut per_elevation: BTreeMap<u8, (Vec<u8>, Vec<u32>)> = BTreeMap::new();
        for (index, raw) in entries.iter().enumerate() {
            let entry = PackedMetatile::new(*raw);
            let level = entry.elevation();
            definition.elevations.push(level);

            let (collision, gids) = per_elevation
                .entry(level)
                .or_insert_with(|| (vec![0; expected], vec![0; expected]));
            collision[index] = entry.collision();
            gids[index] = first_gid.saturating_add(u32::from(entry.metatile_id()));
        }

        for (level, (cells, gids)) in per_elevation {
            definition.collision_layers.push(CollisionLayerDefinition {
                elevation: level,
                cells,
            });
            definition.tile_layers.push(TileLayerDefinition {
                name: format!("metatiles@{level}"),
                elevation: level,
                gids,
            });
        }

        log::debug!(
            "{id}: decoded {} packed metatiles across {} elevations",
            entries.len(),
            definition.collision_layers.len()
        );
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_fields_are_extracted() {
        let entry = PackedMetatile::new(0x3_000 | 0x0800 | 0x0123);
        assert_eq!(entry.metatile_id(), 0x123);
        assert_eq!(entry.collision(), 2);
        assert_eq!(entry.elevation(), 3);
    }

    #[test]
    fn layers_are_split_per_elevation() {
        let entries = [0x3001, 0x3401, 0xF002, 0x0000];
        let tileset = TilesetDefinition {
            name: "general".to_owned(),
            first_gid: 1,
            tile_count: 1024,
            tiles: Vec::new(),
        };

        let map = MapDefinition::from_packed(MapId::new(4), 2, 2, &entries, 1, vec![tileset])
            .expect("packed grid decodes");

        assert_eq!(map.elevations, vec![3, 3, 15, 0]);
        let levels: Vec<u8> = map.collision_layers.iter().map(|layer| layer.elevation).collect();
        assert_eq!(levels, vec![0, 3, 15]);
        let level_three = &map.collision_layers[1];
        assert_eq!(level_three.cells, vec![0, 1, 0, 0]);
        assert_eq!(map.tile_layers[1].gids, vec![2, 2, 0, 0]);
        assert_eq!(map.tile_layers[2].gids, vec![0, 0, 3, 0]);
        assert_eq!(crate::validate(&map), Ok(()));
    }

    #[test]
    fn zero_first_gid_is_rejected() {
        let result = MapDefinition::from_packed(MapId::new(4), 1, 1, &[0x0000], 0, Vec::new());

        assert_eq!(
            result.map(|_| ()),
            Err(ConfigurationError::ReservedFirstGid {
                map: MapId::new(4),
                owner: "metatiles".to_owned(),
            })
        );
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let result = MapDefinition::from_packed(MapId::new(4), 3, 3, &[0; 4], 1, Vec::new());
        assert!(matches!(
            result,
            Err(ConfigurationError::GridSizeMismatch {
                expected: 9,
                actual: 4,
                ..
            })
        ));
    }
}
