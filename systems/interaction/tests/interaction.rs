use std::cell::Cell;

use tilegate_core::{
    ConfigurationError, Direction, DirectionSet, Elevation, InteractionKind, MapId, ScriptId,
};
use tilegate_system_interaction::{
    InteractionScript, ScriptHost, TableScript, TableScriptHost, TileInteractionResolver,
};
use tilegate_world::{
    InteractionDefinition, MapDefinition, TileLayerDefinition, TileMetadata, TilesetDefinition,
};

#[derive(Debug, Default)]
struct CountingHost {
    inner: TableScriptHost,
    instantiations: Cell<usize>,
}

impl ScriptHost for CountingHost {
    fn instantiate(&self, script: &ScriptId) -> Option<Box<dyn InteractionScript>> {
        self.instantiations.set(self.instantiations.get() + 1);
        self.inner.instantiate(script)
    }
}

fn level(value: u8) -> Elevation {
    Elevation::new(value).expect("valid elevation")
}

fn tileset() -> TilesetDefinition {
    TilesetDefinition {
        name: "behaviors".to_owned(),
        first_gid: 1,
        tile_count: 16,
        tiles: vec![
            TileMetadata {
                local_id: 0,
                interaction: Some(InteractionDefinition::Custom {
                    script: ScriptId::parse("ice"),
                }),
            },
            TileMetadata {
                local_id: 1,
                interaction: Some(InteractionDefinition::JumpLedge {
                    direction: Direction::South,
                }),
            },
            TileMetadata {
                local_id: 2,
                interaction: Some(InteractionDefinition::Bridge),
            },
            TileMetadata {
                local_id: 3,
                interaction: None,
            },
        ],
    }
}

fn map(id: u32, layers: Vec<TileLayerDefinition>) -> MapDefinition {
    MapDefinition {
        id: MapId::new(id),
        width: 3,
        height: 1,
        elevations: Vec::new(),
        collision_layers: Vec::new(),
        tile_layers: layers,
        tilesets: vec![tileset()],
    }
}

fn layer(name: &str, elevation: u8, gids: Vec<u32>) -> TileLayerDefinition {
    TileLayerDefinition {
        name: name.to_owned(),
        elevation,
        gids,
    }
}

fn ice_host() -> CountingHost {
    let mut inner = TableScriptHost::new();
    inner.register(
        ScriptId::parse("ice"),
        TableScript::new(
            DirectionSet::single(Direction::East).with(Direction::West),
            Some(Direction::East),
        ),
    );
    CountingHost {
        inner,
        instantiations: Cell::new(0),
    }
}

#[test]
fn custom_scripts_are_instantiated_once_per_identifier() {
    let host = ice_host();
    let mut resolver = TileInteractionResolver::new();

    resolver
        .load_map(&map(1, vec![layer("ground", 0, vec![1, 1, 1])]), &host)
        .expect("map loads");
    resolver
        .load_map(&map(2, vec![layer("ground", 0, vec![1, 0, 1])]), &host)
        .expect("second map loads");

    assert_eq!(host.instantiations.get(), 1, "script must be reused");
    assert_eq!(resolver.script_count(), 1);

    let descriptor = resolver
        .resolve(MapId::new(2), 2, 0, Elevation::WILDCARD)
        .expect("custom tile resolved");
    assert_eq!(descriptor.kind, InteractionKind::Custom);
    for _ in 0..4 {
        assert!(resolver.can_enter(descriptor, Direction::East));
        assert!(!resolver.can_enter(descriptor, Direction::North));
    }
    assert_eq!(resolver.jump_direction(descriptor), Some(Direction::East));
    assert_eq!(host.instantiations.get(), 1, "queries must not re-instantiate");
}

#[test]
fn missing_script_is_a_configuration_error() {
    let host = CountingHost::default();
    let mut resolver = TileInteractionResolver::new();

    let result = resolver.load_map(&map(1, vec![layer("ground", 0, vec![0, 0, 1])]), &host);

    assert_eq!(
        result,
        Err(ConfigurationError::MissingScript {
            map: MapId::new(1),
            x: 2,
            y: 0,
            script: ScriptId::parse("ice"),
        })
    );
    assert!(!resolver.is_loaded(MapId::new(1)));
    assert_eq!(resolver.script_count(), 0);
}

#[test]
fn topmost_layer_wins_at_the_same_elevation() {
    let mut resolver = TileInteractionResolver::new();
    let layers = vec![
        layer("ground", 2, vec![2, 2, 0]),
        layer("overlay", 2, vec![0, 3, 4]),
    ];

    resolver
        .load_map(&map(1, layers), &ice_host())
        .expect("map loads");

    let first = resolver
        .resolve(MapId::new(1), 0, 0, level(2))
        .expect("ground ledge");
    assert_eq!(first.kind, InteractionKind::JumpLedge);
    assert_eq!(resolver.jump_direction(first), Some(Direction::South));

    let second = resolver
        .resolve(MapId::new(1), 1, 0, level(2))
        .expect("overlay bridge");
    assert_eq!(second.kind, InteractionKind::Bridge);

    assert!(
        resolver.resolve(MapId::new(1), 2, 0, level(2)).is_none(),
        "tile without interaction resolves to nothing"
    );
}

#[test]
fn layers_only_answer_for_their_elevation() {
    let mut resolver = TileInteractionResolver::new();
    resolver
        .load_map(&map(1, vec![layer("deck", 15, vec![3, 0, 0])]), &ice_host())
        .expect("map loads");

    assert!(resolver.resolve(MapId::new(1), 0, 0, Elevation::OVERHEAD).is_some());
    assert!(resolver.resolve(MapId::new(1), 0, 0, level(3)).is_none());
}

#[test]
fn unloading_the_last_user_releases_scripts() {
    let host = ice_host();
    let mut resolver = TileInteractionResolver::new();
    resolver
        .load_map(&map(1, vec![layer("ground", 0, vec![1, 0, 0])]), &host)
        .expect("map loads");

    resolver.unload_map(MapId::new(1));

    assert!(!resolver.is_loaded(MapId::new(1)));
    assert_eq!(resolver.script_count(), 0);
}
