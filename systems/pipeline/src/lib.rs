#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative movement gate combining every collision signal.
//!
//! [`CollisionPipeline::try_move`] evaluates a [`MovementRequest`] against
//! a fixed sequence of stages and stops at the first one that blocks:
//!
//! 1. pre-check observers, which may veto the move outright;
//! 2. map bounds;
//! 3. the destination's tile interaction (one-way tiles, ledges, bridges);
//! 4. static collision, skipped when an interaction already admitted the move;
//! 5. elevation compatibility between mover and destination tile;
//! 6. other entities occupying the destination.
//!
//! The pipeline only reads the [`MapSession`] caches and the tick's
//! [`EntitySpatialIndex`]; it never mutates game state.

mod session;

use std::{collections::HashMap, fmt};

use tilegate_core::{
    BlockReason, CollisionValue, Elevation, EntityId, GridCell, MoveDecision, MovementRequest,
    TileInteractionDescriptor,
};
use tilegate_system_elevation::ElevationMatcher;
use tilegate_system_spatial_index::EntitySpatialIndex;

pub use session::MapSession;

/// Stage of the movement pipeline, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Pre-check observers.
    Override,
    /// Map extents.
    Bounds,
    /// Destination tile interaction.
    Interaction,
    /// Static collision value.
    Collision,
    /// Elevation compatibility.
    Elevation,
    /// Entity occupancy.
    Entity,
}

impl Stage {
    /// Block reason reported when this stage rejects a move.
    #[must_use]
    pub const fn block_reason(self) -> BlockReason {
        match self {
            Self::Override => BlockReason::Override,
            Self::Bounds => BlockReason::Bounds,
            Self::Interaction => BlockReason::Interaction,
            Self::Collision => BlockReason::Collision,
            Self::Elevation => BlockReason::Elevation,
            Self::Entity => BlockReason::Entity,
        }
    }
}

/// Event handed to pre-check observers before any built-in stage runs.
#[derive(Debug)]
pub struct PreCheckEvent<'a> {
    request: &'a MovementRequest,
    force_block: bool,
}

impl<'a> PreCheckEvent<'a> {
    /// Request being evaluated.
    #[must_use]
    pub fn request(&self) -> &'a MovementRequest {
        self.request
    }

    /// Vetoes the move. Later observers still run.
    pub fn block(&mut self) {
        self.force_block = true;
    }

    /// Reports whether an observer has vetoed the move.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.force_block
    }
}

/// Observer invoked synchronously with every pre-check event.
pub type PreCheckObserver = Box<dyn FnMut(&mut PreCheckEvent<'_>)>;

/// Blocking behavior of an entity that may occupy a destination cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OccupantFlags {
    /// Entity blocks other movers.
    pub solid: bool,
    /// Entity lets other movers walk through it despite being solid.
    pub pass_through: bool,
}

impl OccupantFlags {
    /// Reports whether the occupant stops other movers.
    #[must_use]
    pub const fn blocks(&self) -> bool {
        self.solid && !self.pass_through
    }
}

/// Source of occupant flags for entities found in the spatial index.
///
/// Entities the lookup does not know never block.
pub trait OccupantLookup {
    /// Flags of `entity`, if it is known.
    fn occupant_flags(&self, entity: EntityId) -> Option<OccupantFlags>;
}

impl OccupantLookup for HashMap<EntityId, OccupantFlags> {
    fn occupant_flags(&self, entity: EntityId) -> Option<OccupantFlags> {
        self.get(&entity).copied()
    }
}

impl<F> OccupantLookup for F
where
    F: Fn(EntityId) -> Option<OccupantFlags>,
{
    fn occupant_flags(&self, entity: EntityId) -> Option<OccupantFlags> {
        self(entity)
    }
}

/// Fixed-order movement decision pipeline.
#[derive(Default)]
pub struct CollisionPipeline {
    observers: Vec<PreCheckObserver>,
}

impl fmt::Debug for CollisionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionPipeline")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl CollisionPipeline {
    /// Creates a pipeline without observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer; observers run in registration order.
    pub fn add_pre_check<F>(&mut self, observer: F)
    where
        F: FnMut(&mut PreCheckEvent<'_>) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Number of registered observers.
    #[must_use]
    pub fn pre_check_count(&self) -> usize {
        self.observers.len()
    }

    /// Decides whether `request` may proceed.
    pub fn try_move<O>(
        &mut self,
        session: &MapSession,
        index: &EntitySpatialIndex,
        occupants: &O,
        request: &MovementRequest,
    ) -> MoveDecision
    where
        O: OccupantLookup + ?Sized,
    {
        self.evaluate(session, index, occupants, request, |_| {})
    }

    /// Same as [`Self::try_move`], appending every stage entered to `trace`.
    pub fn try_move_traced<O>(
        &mut self,
        session: &MapSession,
        index: &EntitySpatialIndex,
        occupants: &O,
        request: &MovementRequest,
        trace: &mut Vec<Stage>,
    ) -> MoveDecision
    where
        O: OccupantLookup + ?Sized,
    {
        self.evaluate(session, index, occupants, request, |stage| trace.push(stage))
    }

    fn evaluate<O, R>(
        &mut self,
        session: &MapSession,
        index: &EntitySpatialIndex,
        occupants: &O,
        request: &MovementRequest,
        mut record: R,
    ) -> MoveDecision
    where
        O: OccupantLookup + ?Sized,
        R: FnMut(Stage),
    {
        let mut enter = |stage: Stage| {
            log::trace!("{}: {:?} stage for {:?}", request.map, stage, request.mover);
            record(stage);
        };

        enter(Stage::Override);
        let mut event = PreCheckEvent {
            request,
            force_block: false,
        };
        for observer in &mut self.observers {
            observer(&mut event);
        }
        if event.is_blocked() {
            return blocked(request, Stage::Override);
        }

        enter(Stage::Bounds);
        if !session
            .bounds()
            .is_in_bounds(request.map, request.to_x, request.to_y)
        {
            return blocked(request, Stage::Bounds);
        }
        let Some(((x, y), tile_elevation)) = request.destination().and_then(|(x, y)| {
            session
                .tile_elevation(request.map, x, y)
                .map(|elevation| ((x, y), elevation))
        }) else {
            return blocked(request, Stage::Bounds);
        };

        enter(Stage::Interaction);
        let interactions = session.interactions();
        let mut jump = None;
        let admitted = match interaction_at(session, request, x, y, tile_elevation) {
            Some(descriptor) => {
                if !interactions.can_enter(descriptor, request.direction) {
                    return blocked(request, Stage::Interaction);
                }
                jump = interactions.jump_direction(descriptor);
                true
            }
            None => false,
        };

        if !admitted {
            enter(Stage::Collision);
            if collision_at(session, request, x, y, tile_elevation)
                .is_some_and(|value| value.is_blocking())
            {
                return blocked(request, Stage::Collision);
            }
        }

        enter(Stage::Elevation);
        if !ElevationMatcher::matches(request.elevation, tile_elevation) {
            return blocked(request, Stage::Elevation);
        }

        enter(Stage::Entity);
        if occupied(index, occupants, request, x, y) {
            return blocked(request, Stage::Entity);
        }

        MoveDecision::allowed(jump)
    }
}

fn interaction_at<'s>(
    session: &'s MapSession,
    request: &MovementRequest,
    x: u32,
    y: u32,
    tile_elevation: Elevation,
) -> Option<&'s TileInteractionDescriptor> {
    let interactions = session.interactions();
    interactions
        .resolve(request.map, x, y, tile_elevation)
        .or_else(|| interactions.resolve(request.map, x, y, Elevation::WILDCARD))
}

fn collision_at(
    session: &MapSession,
    request: &MovementRequest,
    x: u32,
    y: u32,
    tile_elevation: Elevation,
) -> Option<CollisionValue> {
    let collision = session.collision();
    collision
        .collision_value(request.map, tile_elevation, x, y)
        .or_else(|| collision.collision_value(request.map, Elevation::WILDCARD, x, y))
}

fn occupied<O>(
    index: &EntitySpatialIndex,
    occupants: &O,
    request: &MovementRequest,
    x: u32,
    y: u32,
) -> bool
where
    O: OccupantLookup + ?Sized,
{
    let mover = request.mover.id();
    let blocks = |occupant: &EntityId| {
        *occupant != mover
            && occupants
                .occupant_flags(*occupant)
                .is_some_and(|flags| flags.blocks())
    };

    if request.elevation.is_wildcard() {
        return index.entities_at_column(request.map, x, y).iter().any(blocks);
    }
    [request.elevation, Elevation::WILDCARD]
        .into_iter()
        .flat_map(|elevation| index.entities_at(GridCell::new(request.map, x, y, elevation)))
        .any(blocks)
}

fn blocked(request: &MovementRequest, stage: Stage) -> MoveDecision {
    let decision = MoveDecision::blocked(stage.block_reason());
    log::debug!(
        "{}: {:?} moving {:?} from ({}, {}) to ({}, {}) {}",
        request.map,
        request.mover,
        request.direction,
        request.from_x,
        request.from_y,
        request.to_x,
        request.to_y,
        decision.reason_code()
    );
    decision
}
