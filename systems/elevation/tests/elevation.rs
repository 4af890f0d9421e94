use tilegate_core::Elevation;
use tilegate_system_elevation::ElevationMatcher;

#[test]
fn wildcard_mover_matches_every_tile() {
    for tile in Elevation::all() {
        assert!(
            ElevationMatcher::matches(Elevation::WILDCARD, tile),
            "wildcard mover must match tile elevation {}",
            tile.get()
        );
    }
}

#[test]
fn ground_tiles_accept_every_mover() {
    for mover in Elevation::all() {
        assert!(
            ElevationMatcher::matches(mover, Elevation::WILDCARD),
            "ground tile must accept mover elevation {}",
            mover.get()
        );
    }
}

#[test]
fn overhead_tiles_accept_every_mover_without_changing_it() {
    for mover in Elevation::all() {
        let recorded = mover;
        for _ in 0..3 {
            assert!(ElevationMatcher::matches(recorded, Elevation::OVERHEAD));
        }
        assert_eq!(recorded, mover, "matching must not alter the mover");
    }
}

#[test]
fn remaining_pairs_match_only_when_equal() {
    for mover in Elevation::all().filter(|level| !level.is_wildcard()) {
        for tile in Elevation::all().filter(|level| !level.is_wildcard() && !level.is_overhead()) {
            assert_eq!(
                ElevationMatcher::matches(mover, tile),
                mover == tile,
                "mover {} vs tile {}",
                mover.get(),
                tile.get()
            );
        }
    }
}
