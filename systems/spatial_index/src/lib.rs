#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Position-keyed entity index rebuilt once per simulation tick.
//!
//! The index is repopulated wholesale from the component store's position
//! snapshot before any movement or interaction query runs in a tick, so
//! every query within the tick observes the same snapshot. Buckets are
//! kept sorted by entity identifier to make query results deterministic.

use std::collections::HashMap;

use tilegate_core::{Elevation, EntityId, GridCell, MapId};

/// Reported position of one entity in the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityPosition {
    /// Entity being placed.
    pub entity: EntityId,
    /// Cell the entity occupies.
    pub cell: GridCell,
}

impl EntityPosition {
    /// Creates a position record.
    #[must_use]
    pub const fn new(entity: EntityId, map: MapId, x: u32, y: u32, elevation: Elevation) -> Self {
        Self {
            entity,
            cell: GridCell::new(map, x, y, elevation),
        }
    }
}

/// Spatial index mapping cells to the entities standing on them.
#[derive(Debug, Default)]
pub struct EntitySpatialIndex {
    cells: HashMap<GridCell, Vec<EntityId>>,
    entity_count: usize,
    generation: u64,
}

impl EntitySpatialIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the index and repopulates it from `positions`.
    pub fn rebuild_from<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = EntityPosition>,
    {
        self.cells.clear();
        self.entity_count = 0;

        for position in positions {
            self.cells
                .entry(position.cell)
                .or_default()
                .push(position.entity);
            self.entity_count += 1;
        }
        for bucket in self.cells.values_mut() {
            bucket.sort_unstable();
        }

        self.generation = self.generation.wrapping_add(1);
        log::trace!(
            "spatial index generation {} holds {} entities in {} cells",
            self.generation,
            self.entity_count,
            self.cells.len()
        );
    }

    /// Number of positions recorded by the last rebuild.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_count
    }

    /// Reports whether the last rebuild recorded no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    /// Counter incremented by every rebuild.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entities at exactly `cell`, in ascending identifier order.
    #[must_use]
    pub fn entities_at(&self, cell: GridCell) -> &[EntityId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entities at `(x, y)` across every elevation, in ascending identifier order.
    #[must_use]
    pub fn entities_at_column(&self, map: MapId, x: u32, y: u32) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = Elevation::all()
            .flat_map(|elevation| {
                self.entities_at(GridCell::new(map, x, y, elevation))
                    .iter()
                    .copied()
            })
            .collect();
        found.sort_unstable();
        found
    }

    /// Entities on `elevation` within Manhattan distance `range` of the center.
    pub fn entities_in_range_into(
        &self,
        map: MapId,
        center_x: u32,
        center_y: u32,
        range: u32,
        elevation: Elevation,
        out: &mut Vec<EntityId>,
    ) {
        out.clear();
        let center = GridCell::new(map, center_x, center_y, elevation);
        let reach = i64::from(range);

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let (Ok(x), Ok(y)) = (
                    u32::try_from(i64::from(center_x) + dx),
                    u32::try_from(i64::from(center_y) + dy),
                ) else {
                    continue;
                };
                let candidate = GridCell::new(map, x, y, elevation);
                if center.manhattan_distance(&candidate) > range {
                    continue;
                }
                out.extend_from_slice(self.entities_at(candidate));
            }
        }
        out.sort_unstable();
    }

    /// Allocating form of [`Self::entities_in_range_into`].
    #[must_use]
    pub fn entities_in_range(
        &self,
        map: MapId,
        center_x: u32,
        center_y: u32,
        range: u32,
        elevation: Elevation,
    ) -> Vec<EntityId> {
        let mut found = Vec::new();
        self.entities_in_range_into(map, center_x, center_y, range, elevation, &mut found);
        found
    }
}
