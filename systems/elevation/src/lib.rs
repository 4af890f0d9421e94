#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure predicate deciding whether a mover may stand on a tile's elevation.

use tilegate_core::Elevation;

/// Stateless elevation compatibility check.
#[derive(Clone, Copy, Debug, Default)]
pub struct ElevationMatcher;

impl ElevationMatcher {
    /// Reports whether a mover at `entity` may occupy a tile at `tile`.
    ///
    /// Rules, first match wins:
    /// 1. a wildcard mover (0) matches every tile;
    /// 2. a ground tile (0) accepts every mover;
    /// 3. an overhead tile (15) accepts every mover. The mover's recorded
    ///    elevation is not touched here; persisting it is left to whoever
    ///    finalizes the move;
    /// 4. otherwise the levels must be equal.
    #[must_use]
    pub const fn matches(entity: Elevation, tile: Elevation) -> bool {
        if entity.is_wildcard() || tile.is_wildcard() || tile.is_overhead() {
            return true;
        }
        entity.get() == tile.get()
    }
}
