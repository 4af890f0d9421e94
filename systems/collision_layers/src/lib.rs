#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-map, per-elevation cache of static collision values.
//!
//! Grids are flattened once when a map is loaded and never mutated
//! afterwards; a reload replaces the whole entry.

use std::collections::HashMap;

use tilegate_core::{CollisionValue, Elevation, MapId};
use tilegate_world::MapDefinition;

/// Static collision lookup shared by every movement query on a map.
#[derive(Debug, Default)]
pub struct CollisionLayerCache {
    maps: HashMap<MapId, MapCollision>,
}

impl CollisionLayerCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the collision grids for a validated map, replacing any previous entry.
    ///
    /// Several layers declared at the same elevation are merged cell by
    /// cell, keeping the highest code so that any blocking layer wins.
    pub fn load_map(&mut self, definition: &MapDefinition) {
        let mut collision = MapCollision::new(definition.width, definition.height);
        let cell_count = definition.cell_count();

        for layer in &definition.collision_layers {
            let Some(elevation) = Elevation::new(layer.elevation) else {
                continue;
            };
            let grid = collision.layers[elevation.index()]
                .get_or_insert_with(|| vec![CollisionValue::PASSABLE; cell_count]);
            for (slot, raw) in grid.iter_mut().zip(&layer.cells) {
                let value = CollisionValue::new(*raw);
                if value > *slot {
                    *slot = value;
                }
            }
        }

        log::debug!(
            "{}: cached collision for {} elevations",
            definition.id,
            collision.tracked_elevations()
        );
        let _ = self.maps.insert(definition.id, collision);
    }

    /// Drops the grids of an unloaded map.
    pub fn unload_map(&mut self, map: MapId) {
        let _ = self.maps.remove(&map);
    }

    /// Reports whether grids for `map` are cached.
    #[must_use]
    pub fn is_loaded(&self, map: MapId) -> bool {
        self.maps.contains_key(&map)
    }

    /// Collision value at `(x, y)` on the given elevation layer.
    ///
    /// Returns `None` for unknown maps, untracked elevations and cells
    /// outside the grid; callers treat that as passable.
    #[must_use]
    pub fn collision_value(
        &self,
        map: MapId,
        elevation: Elevation,
        x: u32,
        y: u32,
    ) -> Option<CollisionValue> {
        let collision = self.maps.get(&map)?;
        let index = collision.index(x, y)?;
        collision.layers[elevation.index()]
            .as_ref()
            .and_then(|grid| grid.get(index).copied())
    }
}

#[derive(Debug)]
struct MapCollision {
    width: u32,
    height: u32,
    layers: [Option<Vec<CollisionValue>>; Elevation::LEVELS],
}

impl MapCollision {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: std::array::from_fn(|_| None),
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = usize::try_from(y).ok()?;
        let column = usize::try_from(x).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    fn tracked_elevations(&self) -> usize {
        self.layers.iter().filter(|layer| layer.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilegate_world::CollisionLayerDefinition;

    fn level(value: u8) -> Elevation {
        Elevation::new(value).expect("valid elevation")
    }

    fn map(layers: Vec<CollisionLayerDefinition>) -> MapDefinition {
        MapDefinition {
            id: MapId::new(1),
            width: 3,
            height: 2,
            elevations: Vec::new(),
            collision_layers: layers,
            tile_layers: Vec::new(),
            tilesets: Vec::new(),
        }
    }

    #[test]
    fn overlapping_layers_keep_the_blocking_code() {
        let mut cache = CollisionLayerCache::new();
        cache.load_map(&map(vec![
            CollisionLayerDefinition {
                elevation: 3,
                cells: vec![0, 1, 0, 0, 0, 0],
            },
            CollisionLayerDefinition {
                elevation: 3,
                cells: vec![2, 0, 0, 0, 0, 0],
            },
        ]));

        assert_eq!(
            cache.collision_value(MapId::new(1), level(3), 0, 0),
            Some(CollisionValue::new(2))
        );
        assert_eq!(
            cache.collision_value(MapId::new(1), level(3), 1, 0),
            Some(CollisionValue::new(1))
        );
        assert_eq!(
            cache.collision_value(MapId::new(1), level(3), 2, 1),
            Some(CollisionValue::PASSABLE)
        );
    }

    #[test]
    fn reload_replaces_previous_grid() {
        let mut cache = CollisionLayerCache::new();
        cache.load_map(&map(vec![CollisionLayerDefinition {
            elevation: 0,
            cells: vec![1; 6],
        }]));
        cache.load_map(&map(vec![CollisionLayerDefinition {
            elevation: 4,
            cells: vec![1; 6],
        }]));

        assert_eq!(cache.collision_value(MapId::new(1), level(0), 0, 0), None);
        assert_eq!(
            cache.collision_value(MapId::new(1), level(4), 0, 0),
            Some(CollisionValue::new(1))
        );
    }
}
