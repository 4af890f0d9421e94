//! Map extent registry backing the first pipeline stage.

use std::collections::HashMap;

use tilegate_core::MapId;

/// Rejects coordinates outside the extents of the loaded maps.
#[derive(Clone, Debug, Default)]
pub struct BoundsValidator {
    extents: HashMap<MapId, (u32, u32)>,
}

impl BoundsValidator {
    /// Creates an empty validator that rejects every coordinate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the extents of a newly loaded map, replacing earlier ones.
    pub fn register(&mut self, map: MapId, width: u32, height: u32) {
        let _ = self.extents.insert(map, (width, height));
    }

    /// Forgets the extents of an unloaded map.
    pub fn unregister(&mut self, map: MapId) {
        let _ = self.extents.remove(&map);
    }

    /// Width and height of a registered map.
    #[must_use]
    pub fn extents(&self, map: MapId) -> Option<(u32, u32)> {
        self.extents.get(&map).copied()
    }

    /// Reports whether `(x, y)` lies within `[0, width) x [0, height)`.
    ///
    /// Unknown maps and negative coordinates are out of bounds.
    #[must_use]
    pub fn is_in_bounds(&self, map: MapId, x: i64, y: i64) -> bool {
        let Some((width, height)) = self.extents(map) else {
            return false;
        };
        (0..i64::from(width)).contains(&x) && (0..i64::from(height)).contains(&y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_cells_inside_the_extents() {
        let mut bounds = BoundsValidator::new();
        let map = MapId::new(2);
        bounds.register(map, 4, 3);

        assert!(bounds.is_in_bounds(map, 0, 0));
        assert!(bounds.is_in_bounds(map, 3, 2));
        assert!(!bounds.is_in_bounds(map, 4, 2));
        assert!(!bounds.is_in_bounds(map, 3, 3));
        assert!(!bounds.is_in_bounds(map, -1, 0));
        assert!(!bounds.is_in_bounds(map, 0, -1));
    }

    #[test]
    fn unknown_maps_fail_closed() {
        let mut bounds = BoundsValidator::new();
        assert!(!bounds.is_in_bounds(MapId::new(9), 0, 0));

        bounds.register(MapId::new(9), 1, 1);
        bounds.unregister(MapId::new(9));
        assert!(!bounds.is_in_bounds(MapId::new(9), 0, 0));
    }

    #[test]
    fn empty_maps_contain_no_cells() {
        let mut bounds = BoundsValidator::new();
        bounds.register(MapId::new(1), 0, 5);
        assert!(!bounds.is_in_bounds(MapId::new(1), 0, 0));
    }
}
