#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Resolution of grid cells to tile interaction descriptors.
//!
//! A cell is resolved by walking layer cell, tile reference, owning
//! tileset, local tile index and tile metadata. The walk happens once per
//! cell while the map loads; gameplay queries read the resulting table.
//! Custom interactions are answered by script instances obtained from a
//! [`ScriptHost`] once per identifier and reused for every query.

mod table;

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use tilegate_core::{
    ConfigurationError, Direction, Elevation, InteractionKind, MapId, ScriptId,
    TileInteractionDescriptor,
};
use tilegate_world::{MapDefinition, TileLayerDefinition, TileLookup};

pub use table::{TableScript, TableScriptHost};

/// Read-only behavior script attached to custom interaction tiles.
///
/// Implementations must not mutate game state: they are consulted in the
/// middle of a movement decision.
pub trait InteractionScript: fmt::Debug {
    /// Reports whether the tile may be entered while travelling in `direction`.
    fn can_enter_from(&self, direction: Direction) -> bool;

    /// Direction the mover is forced to jump after entering, if any.
    fn jump_direction(&self) -> Option<Direction>;
}

/// Source of interaction script instances keyed by identifier.
pub trait ScriptHost {
    /// Creates the script registered under `script`, or `None` when unknown.
    fn instantiate(&self, script: &ScriptId) -> Option<Box<dyn InteractionScript>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CellKey {
    x: u32,
    y: u32,
    elevation: Elevation,
}

#[derive(Debug, Default)]
struct MapInteractions {
    cells: HashMap<CellKey, TileInteractionDescriptor>,
    scripts: BTreeSet<ScriptId>,
}

/// Per-map table of resolved tile interactions.
#[derive(Debug, Default)]
pub struct TileInteractionResolver {
    maps: HashMap<MapId, MapInteractions>,
    scripts: HashMap<ScriptId, Box<dyn InteractionScript>>,
}

impl TileInteractionResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every tile layer cell of a validated map.
    ///
    /// Fails when a reference points outside every tileset or when a
    /// custom interaction names a script the host cannot provide. On
    /// failure the resolver is left exactly as it was.
    pub fn load_map(
        &mut self,
        definition: &MapDefinition,
        host: &dyn ScriptHost,
    ) -> Result<(), ConfigurationError> {
        let mut interactions = MapInteractions::default();
        let mut instantiated: HashMap<ScriptId, Box<dyn InteractionScript>> = HashMap::new();

        for layer in &definition.tile_layers {
            let Some(elevation) = Elevation::new(layer.elevation) else {
                return Err(ConfigurationError::LayerElevationOutOfRange {
                    map: definition.id,
                    layer: layer.name.clone(),
                    value: layer.elevation,
                });
            };

            for index in 0..layer.gids.len() {
                let (x, y) = definition.coordinates(index);
                let Some(descriptor) = resolve_cell(definition, layer, index, x, y)? else {
                    continue;
                };

                if let Some(script) = &descriptor.parameters.script {
                    if !self.scripts.contains_key(script) && !instantiated.contains_key(script) {
                        let instance = host.instantiate(script).ok_or_else(|| {
                            ConfigurationError::MissingScript {
                                map: definition.id,
                                x,
                                y,
                                script: script.clone(),
                            }
                        })?;
                        let _ = instantiated.insert(script.clone(), instance);
                    }
                    let _ = interactions.scripts.insert(script.clone());
                }

                let _ = interactions
                    .cells
                    .insert(CellKey { x, y, elevation }, descriptor);
            }
        }

        log::info!(
            "{}: resolved {} interaction cells using {} scripts",
            definition.id,
            interactions.cells.len(),
            interactions.scripts.len()
        );
        self.scripts.extend(instantiated);
        let _ = self.maps.insert(definition.id, interactions);
        self.release_unused_scripts();
        Ok(())
    }

    /// Drops the table of an unloaded map and any scripts only it used.
    pub fn unload_map(&mut self, map: MapId) {
        if self.maps.remove(&map).is_some() {
            self.release_unused_scripts();
        }
    }

    /// Reports whether a table for `map` is loaded.
    #[must_use]
    pub fn is_loaded(&self, map: MapId) -> bool {
        self.maps.contains_key(&map)
    }

    /// Number of live script instances.
    #[must_use]
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Interaction descriptor of the cell, if the cell has one.
    #[must_use]
    pub fn resolve(
        &self,
        map: MapId,
        x: u32,
        y: u32,
        elevation: Elevation,
    ) -> Option<&TileInteractionDescriptor> {
        self.maps
            .get(&map)?
            .cells
            .get(&CellKey { x, y, elevation })
    }

    /// Reports whether `descriptor` permits entry while travelling in `direction`.
    ///
    /// Custom descriptors whose script is not loaded deny entry.
    #[must_use]
    pub fn can_enter(&self, descriptor: &TileInteractionDescriptor, direction: Direction) -> bool {
        if let Some(permitted) = descriptor.permits_builtin(direction) {
            return permitted;
        }
        match self.script_for(descriptor) {
            Some(script) => script.can_enter_from(direction),
            None => {
                log::warn!(
                    "interaction script {:?} is not loaded; denying entry",
                    descriptor.parameters.script
                );
                false
            }
        }
    }

    /// Forced jump direction reported by `descriptor`.
    #[must_use]
    pub fn jump_direction(&self, descriptor: &TileInteractionDescriptor) -> Option<Direction> {
        match descriptor.kind {
            InteractionKind::Custom => self.script_for(descriptor)?.jump_direction(),
            _ => descriptor.builtin_jump(),
        }
    }

    fn script_for(&self, descriptor: &TileInteractionDescriptor) -> Option<&dyn InteractionScript> {
        let script = descriptor.parameters.script.as_ref()?;
        self.scripts.get(script).map(|instance| &**instance)
    }

    fn release_unused_scripts(&mut self) {
        let maps = &self.maps;
        self.scripts
            .retain(|script, _| maps.values().any(|map| map.scripts.contains(script)));
    }
}

fn resolve_cell(
    definition: &MapDefinition,
    layer: &TileLayerDefinition,
    index: usize,
    x: u32,
    y: u32,
) -> Result<Option<TileInteractionDescriptor>, ConfigurationError> {
    let Some(raw) = layer.gids.get(index).copied() else {
        return Ok(None);
    };

    match definition.lookup(raw) {
        TileLookup::Empty => Ok(None),
        TileLookup::Unassigned { gid } => Err(ConfigurationError::MissingTileset {
            map: definition.id,
            x,
            y,
            gid,
        }),
        TileLookup::Tile { metadata, .. } => Ok(metadata
            .and_then(|tile| tile.interaction.as_ref())
            .map(|interaction| interaction.to_descriptor())),
    }
}
