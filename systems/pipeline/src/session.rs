use std::collections::HashMap;

use tilegate_core::{ConfigurationError, Elevation, MapId};
use tilegate_system_collision_layers::CollisionLayerCache;
use tilegate_system_interaction::{ScriptHost, TileInteractionResolver};
use tilegate_world::{self as world, BoundsValidator, MapDefinition};

/// Caches owned by the maps that are currently active.
///
/// Every cache is populated when a map loads and dropped when it unloads.
/// Nothing here changes while movement queries run.
#[derive(Debug, Default)]
pub struct MapSession {
    bounds: BoundsValidator,
    collision: CollisionLayerCache,
    interactions: TileInteractionResolver,
    elevations: HashMap<MapId, ElevationGrid>,
}

impl MapSession {
    /// Creates a session with no maps loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `definition` and activates it.
    ///
    /// Nothing is installed unless every check passes, so a failed load
    /// leaves the session exactly as it was.
    pub fn load_map(
        &mut self,
        definition: &MapDefinition,
        host: &dyn ScriptHost,
    ) -> Result<(), ConfigurationError> {
        let map = definition.id;
        if self.is_loaded(map) {
            return Err(ConfigurationError::DuplicateMap { map });
        }

        world::validate(definition)?;
        let elevations = ElevationGrid::from_definition(definition)?;
        self.interactions.load_map(definition, host)?;

        self.collision.load_map(definition);
        self.bounds
            .register(map, definition.width, definition.height);
        let _ = self.elevations.insert(map, elevations);

        log::info!(
            "{map}: loaded {}x{} map with {} collision and {} tile layers",
            definition.width,
            definition.height,
            definition.collision_layers.len(),
            definition.tile_layers.len()
        );
        Ok(())
    }

    /// Deactivates `map` and discards its caches.
    pub fn unload_map(&mut self, map: MapId) -> Result<(), ConfigurationError> {
        if self.elevations.remove(&map).is_none() {
            return Err(ConfigurationError::UnknownMap { map });
        }

        self.bounds.unregister(map);
        self.collision.unload_map(map);
        self.interactions.unload_map(map);
        log::info!("{map}: unloaded");
        Ok(())
    }

    /// Reports whether `map` is active.
    #[must_use]
    pub fn is_loaded(&self, map: MapId) -> bool {
        self.elevations.contains_key(&map)
    }

    /// Elevation of the tile at `(x, y)`, or `None` outside every loaded map.
    #[must_use]
    pub fn tile_elevation(&self, map: MapId, x: u32, y: u32) -> Option<Elevation> {
        self.elevations.get(&map)?.get(x, y)
    }

    /// Extent registry of the loaded maps.
    #[must_use]
    pub fn bounds(&self) -> &BoundsValidator {
        &self.bounds
    }

    /// Static collision grids of the loaded maps.
    #[must_use]
    pub fn collision(&self) -> &CollisionLayerCache {
        &self.collision
    }

    /// Resolved tile interactions of the loaded maps.
    #[must_use]
    pub fn interactions(&self) -> &TileInteractionResolver {
        &self.interactions
    }
}

#[derive(Debug)]
struct ElevationGrid {
    width: u32,
    height: u32,
    levels: Vec<Elevation>,
}

impl ElevationGrid {
    fn from_definition(definition: &MapDefinition) -> Result<Self, ConfigurationError> {
        let levels = definition
            .elevations
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let (x, y) = definition.coordinates(index);
                Elevation::checked(definition.id, x, y, *raw)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            width: definition.width,
            height: definition.height,
            levels,
        })
    }

    fn get(&self, x: u32, y: u32) -> Option<Elevation> {
        if x >= self.width || y >= self.height {
            return None;
        }
        if self.levels.is_empty() {
            return Some(Elevation::WILDCARD);
        }
        let index = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.levels.get(index).copied()
    }
}
