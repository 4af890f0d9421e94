use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::Path,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tilegate_core::{
    Direction, DirectionSet, Elevation, EntityId, MapId, Mover, MovementRequest, ScriptId,
};
use tilegate_system_interaction::{TableScript, TableScriptHost};
use tilegate_system_pipeline::OccupantFlags;
use tilegate_system_spatial_index::EntityPosition;
use tilegate_world::{MapDefinition, TilesetDefinition};

/// Complete tick description read from a scenario file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub(crate) maps: Vec<MapDefinition>,
    #[serde(default)]
    pub(crate) packed_maps: Vec<PackedMap>,
    #[serde(default)]
    pub(crate) scripts: Vec<ScriptEntry>,
    #[serde(default)]
    pub(crate) entities: Vec<EntityEntry>,
    #[serde(default)]
    pub(crate) vetoes: Vec<VetoEntry>,
    #[serde(default)]
    pub(crate) requests: Vec<RequestEntry>,
}

/// Map authored as a packed 16-bit metatile grid.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PackedMap {
    pub(crate) id: MapId,
    pub(crate) width: u32,
    pub(crate) height: u32,
    #[serde(default = "default_first_gid")]
    pub(crate) first_gid: u32,
    pub(crate) entries: Vec<u16>,
    #[serde(default)]
    pub(crate) tilesets: Vec<TilesetDefinition>,
}

const fn default_first_gid() -> u32 {
    1
}

/// Declarative interaction script.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptEntry {
    pub(crate) id: ScriptId,
    #[serde(default)]
    pub(crate) enter_from: Vec<Direction>,
    #[serde(default)]
    pub(crate) jump: Option<Direction>,
}

/// Kind of entity, deciding how its elevation is tracked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EntityKind {
    Player,
    Npc,
    #[default]
    Generic,
}

/// Entity placed in the tick's position snapshot.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntityEntry {
    pub(crate) id: EntityId,
    pub(crate) map: MapId,
    pub(crate) x: u32,
    pub(crate) y: u32,
    #[serde(default)]
    pub(crate) elevation: Elevation,
    #[serde(default)]
    pub(crate) solid: bool,
    #[serde(default)]
    pub(crate) pass_through: bool,
    #[serde(default)]
    pub(crate) kind: EntityKind,
}

impl EntityEntry {
    fn mover(&self) -> Mover {
        match self.kind {
            EntityKind::Player => Mover::Player {
                id: self.id,
                elevation: self.elevation,
            },
            EntityKind::Npc => Mover::Npc {
                id: self.id,
                elevation: self.elevation,
            },
            EntityKind::Generic => Mover::Generic { id: self.id },
        }
    }
}

/// Cell whose entry is vetoed by a pre-check observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct VetoEntry {
    pub(crate) map: MapId,
    pub(crate) x: u32,
    pub(crate) y: u32,
}

/// Single step requested by an entity.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RequestEntry {
    pub(crate) mover: EntityId,
    pub(crate) direction: Direction,
}

impl Scenario {
    /// Reads and parses the scenario file at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Parses scenario contents and checks cross references.
    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        scenario.check_references()?;
        Ok(scenario)
    }

    fn check_references(&self) -> Result<()> {
        let mut maps = BTreeSet::new();
        let map_ids = self
            .maps
            .iter()
            .map(|map| map.id)
            .chain(self.packed_maps.iter().map(|map| map.id));
        for id in map_ids {
            if !maps.insert(id) {
                bail!("scenario declares {id} more than once");
            }
        }

        let mut scripts = BTreeSet::new();
        for script in &self.scripts {
            if !scripts.insert(&script.id) {
                bail!("scenario declares script `{}` more than once", script.id);
            }
        }

        let mut entities = BTreeSet::new();
        for entity in &self.entities {
            if !entities.insert(entity.id) {
                bail!("scenario declares entity {} more than once", entity.id.get());
            }
            if !maps.contains(&entity.map) {
                bail!(
                    "entity {} is placed on {}, which the scenario does not declare",
                    entity.id.get(),
                    entity.map
                );
            }
        }

        for request in &self.requests {
            if !entities.contains(&request.mover) {
                bail!(
                    "request names entity {}, which the scenario does not declare",
                    request.mover.get()
                );
            }
        }
        Ok(())
    }

    /// Every map of the scenario, packed grids decoded.
    pub(crate) fn map_definitions(&self) -> Result<Vec<MapDefinition>> {
        let mut definitions = self.maps.clone();
        for packed in &self.packed_maps {
            let definition = MapDefinition::from_packed(
                packed.id,
                packed.width,
                packed.height,
                &packed.entries,
                packed.first_gid,
                packed.tilesets.clone(),
            )
            .with_context(|| format!("failed to decode packed {}", packed.id))?;
            definitions.push(definition);
        }
        Ok(definitions)
    }

    /// Script host answering for the scenario's declarative scripts.
    pub(crate) fn script_host(&self) -> TableScriptHost {
        let mut host = TableScriptHost::new();
        for script in &self.scripts {
            let enter_from: DirectionSet = script.enter_from.iter().copied().collect();
            host.register(script.id.clone(), TableScript::new(enter_from, script.jump));
        }
        host
    }

    /// Position snapshot of the tick.
    pub(crate) fn positions(&self) -> impl Iterator<Item = EntityPosition> + '_ {
        self.entities.iter().map(|entity| {
            EntityPosition::new(entity.id, entity.map, entity.x, entity.y, entity.elevation)
        })
    }

    /// Occupant flags of every entity.
    pub(crate) fn occupants(&self) -> HashMap<EntityId, OccupantFlags> {
        self.entities
            .iter()
            .map(|entity| {
                let flags = OccupantFlags {
                    solid: entity.solid,
                    pass_through: entity.pass_through,
                };
                (entity.id, flags)
            })
            .collect()
    }

    /// Movement requests in file order.
    pub(crate) fn movement_requests(&self) -> Result<Vec<MovementRequest>> {
        let entities: HashMap<EntityId, &EntityEntry> = self
            .entities
            .iter()
            .map(|entity| (entity.id, entity))
            .collect();

        self.requests
            .iter()
            .map(|request| {
                let entity = entities
                    .get(&request.mover)
                    .with_context(|| format!("unknown mover {}", request.mover.get()))?;
                Ok(MovementRequest::step(
                    entity.mover(),
                    entity.map,
                    entity.x,
                    entity.y,
                    request.direction,
                ))
            })
            .collect()
    }
}
