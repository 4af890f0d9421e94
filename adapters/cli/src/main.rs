#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that evaluates a scenario's movement requests.
//!
//! A scenario file declares maps, interaction scripts, an entity snapshot
//! and a list of single-step requests. The adapter activates every map,
//! rebuilds the spatial index once for the tick and prints one decision
//! per request. Moves are not applied, so every request sees the same
//! snapshot.

mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tilegate_core::{MoveDecision, MovementRequest};
use tilegate_system_pipeline::{CollisionPipeline, MapSession};
use tilegate_system_spatial_index::EntitySpatialIndex;

use crate::scenario::{Scenario, VetoEntry};

/// Command-line arguments accepted by the `tilegate` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tilegate",
    about = "Evaluates grid movement requests against map collision data"
)]
struct CliArgs {
    /// Scenario file describing maps, entities and requests.
    #[arg(long, value_name = "PATH")]
    scenario: PathBuf,
    /// Only activate the maps and report configuration errors.
    #[arg(long)]
    validate_only: bool,
    /// Log map activation and every blocked decision.
    #[arg(short, long)]
    verbose: bool,
}

/// Entry point for the tilegate command-line interface.
fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let scenario = Scenario::load(&args.scenario)?;
    for line in run(&scenario, args.validate_only)? {
        println!("{line}");
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run(scenario: &Scenario, validate_only: bool) -> Result<Vec<String>> {
    let host = scenario.script_host();
    let mut session = MapSession::new();
    let mut report = Vec::new();

    for definition in scenario.map_definitions()? {
        session
            .load_map(&definition, &host)
            .with_context(|| format!("failed to activate {}", definition.id))?;
        log::info!("activated {}", definition.id);
        report.push(format!(
            "{}: ok ({}x{})",
            definition.id, definition.width, definition.height
        ));
    }
    if validate_only {
        return Ok(report);
    }

    let mut index = EntitySpatialIndex::new();
    index.rebuild_from(scenario.positions());
    let occupants = scenario.occupants();

    let mut pipeline = CollisionPipeline::new();
    let vetoes = scenario.vetoes.clone();
    if !vetoes.is_empty() {
        pipeline.add_pre_check(move |event| {
            let request = event.request();
            if vetoes.iter().any(|veto| vetoes_request(veto, request)) {
                event.block();
            }
        });
    }

    let requests = scenario.movement_requests()?;
    log::info!(
        "evaluating {} requests against {} entities",
        requests.len(),
        index.len()
    );
    for request in &requests {
        let decision = pipeline.try_move(&session, &index, &occupants, request);
        report.push(describe(request, &decision));
    }
    Ok(report)
}

fn vetoes_request(veto: &VetoEntry, request: &MovementRequest) -> bool {
    veto.map == request.map
        && i64::from(veto.x) == request.to_x
        && i64::from(veto.y) == request.to_y
}

fn describe(request: &MovementRequest, decision: &MoveDecision) -> String {
    let line = format!(
        "entity {} {} ({}, {}) -> ({}, {}): {}",
        request.mover.id().get(),
        request.direction,
        request.from_x,
        request.from_y,
        request.to_x,
        request.to_y,
        decision.reason_code()
    );
    match decision.jump {
        Some(jump) => format!("{line} jump {jump}"),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
        [[maps]]
        id = 1
        width = 4
        height = 1

        [[maps.collision_layers]]
        elevation = 0
        cells = [0, 0, 0, 1]

        [[maps.tile_layers]]
        name = "behaviors"
        gids = [0, 1, 0, 0]

        [[maps.tilesets]]
        name = "behaviors"
        first_gid = 1
        tile_count = 1

        [[maps.tilesets.tiles]]
        local_id = 0
        interaction = { kind = "jump_ledge", direction = "east" }

        [[entities]]
        id = 1
        map = 1
        x = 0
        y = 0

        [[entities]]
        id = 2
        map = 1
        x = 2
        y = 0

        [[requests]]
        mover = 1
        direction = "east"

        [[requests]]
        mover = 2
        direction = "east"

        [[requests]]
        mover = 2
        direction = "west"
    "#;

    const VETO: &str = r#"
        [[vetoes]]
        map = 1
        x = 1
        y = 0
    "#;

    fn vetoed_scenario() -> Scenario {
        Scenario::from_toml_str(&format!("{SCENARIO}{VETO}")).expect("scenario parses")
    }

    #[test]
    fn vetoed_cells_block_before_other_stages() {
        let scenario = vetoed_scenario();

        let report = run(&scenario, false).expect("scenario runs");

        assert_eq!(
            report,
            vec![
                "map#1: ok (4x1)".to_owned(),
                "entity 1 east (0, 0) -> (1, 0): blocked-by-override".to_owned(),
                "entity 2 east (2, 0) -> (3, 0): blocked-by-collision".to_owned(),
                "entity 2 west (2, 0) -> (1, 0): blocked-by-override".to_owned(),
            ]
        );
    }

    #[test]
    fn ledges_report_jumps_without_vetoes() {
        let scenario = Scenario::from_toml_str(SCENARIO).expect("scenario parses");

        let report = run(&scenario, false).expect("scenario runs");

        assert_eq!(report[1], "entity 1 east (0, 0) -> (1, 0): allowed jump east");
        assert_eq!(report[3], "entity 2 west (2, 0) -> (1, 0): blocked-by-interaction");
    }

    #[test]
    fn validate_only_stops_after_activation() {
        let scenario = vetoed_scenario();

        let report = run(&scenario, true).expect("scenario validates");

        assert_eq!(report, vec!["map#1: ok (4x1)".to_owned()]);
    }

    #[test]
    fn configuration_errors_name_the_map() {
        let contents = SCENARIO.replace("gids = [0, 1, 0, 0]", "gids = [0, 1, 0, 7]");
        let scenario = Scenario::from_toml_str(&contents).expect("scenario parses");

        let error = run(&scenario, true).expect_err("unassigned reference");

        assert_eq!(error.to_string(), "failed to activate map#1");
        assert!(
            format!("{error:#}").contains("tile reference 7 at (3, 0)"),
            "unexpected error chain: {error:#}"
        );
    }
}
