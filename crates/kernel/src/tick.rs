//! Per-frame integration.
//!
//! Each tick applies the active tool, then standing gear behaviors, then
//! advances every entity's phase by its velocity.

use crate::entity::{Behavior, Entity};
use crate::error::WorldError;
use crate::propagate::get_acceleration_map;
use crate::world::World;
use gearbox_common::EntityId;

/// A force or friction tool currently pressed on a gear.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveTool {
    Force {
        gear_id: EntityId,
        magnitude: f64,
    },
    Friction {
        gear_id: EntityId,
        coefficient: f64,
        magnitude: f64,
    },
}

/// Input commands for a single tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInput {
    pub tool: Option<ActiveTool>,
}

/// Apply `force` at a gear for `elapsed` seconds.
///
/// The root accelerates by `force / mass`; every coupled entity
/// accelerates by the root's acceleration scaled through the ratio map.
pub fn apply_force(
    world: &mut World,
    gear_id: &EntityId,
    force: f64,
    elapsed: f64,
) -> Result<(), WorldError> {
    let mass = world.gear(gear_id)?.mass;
    apply_acceleration(world, gear_id, force / mass, elapsed)
}

/// Apply drag `-coefficient · velocity · magnitude` at a gear.
///
/// Drag never reverses the spin: a step that would overshoot brings the
/// whole network to rest instead.
pub fn apply_friction(
    world: &mut World,
    gear_id: &EntityId,
    coefficient: f64,
    magnitude: f64,
    elapsed: f64,
) -> Result<(), WorldError> {
    let gear = world.gear(gear_id)?;
    let velocity = gear.velocity;
    if velocity == 0.0 || elapsed <= 0.0 {
        return Ok(());
    }
    let force = -coefficient * velocity * magnitude;
    let mut acceleration = force / gear.mass;
    let next = velocity + acceleration * elapsed;
    if next == 0.0 || next.signum() != velocity.signum() {
        acceleration = -velocity / elapsed;
    }
    apply_acceleration(world, gear_id, acceleration, elapsed)
}

fn apply_acceleration(
    world: &mut World,
    root: &EntityId,
    acceleration: f64,
    elapsed: f64,
) -> Result<(), WorldError> {
    let map = get_acceleration_map(root, acceleration, world)?
        .ok_or_else(|| WorldError::InconsistentNetwork(root.clone()))?;
    for (id, a) in map {
        let entity = world
            .get_mut(&id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        entity.set_velocity(entity.velocity() + a * elapsed);
    }
    Ok(())
}

/// Advance the world by `elapsed` seconds.
pub fn tick(world: &mut World, input: &TickInput, elapsed: f64) -> Result<(), WorldError> {
    let _span = tracing::debug_span!("tick", tick = world.tick()).entered();

    match &input.tool {
        Some(ActiveTool::Force { gear_id, magnitude }) => {
            apply_force(world, gear_id, *magnitude, elapsed)?;
        }
        Some(ActiveTool::Friction {
            gear_id,
            coefficient,
            magnitude,
        }) => {
            apply_friction(world, gear_id, *coefficient, *magnitude, elapsed)?;
        }
        None => {}
    }

    let behaviors: Vec<(EntityId, Behavior)> = world
        .entities()
        .values()
        .filter_map(|e| {
            let g = e.as_gear()?;
            g.behavior.map(|b| (g.id.clone(), b))
        })
        .collect();
    for (id, behavior) in behaviors {
        match behavior {
            Behavior::Force { magnitude } => apply_force(world, &id, magnitude, elapsed)?,
            Behavior::Friction {
                coefficient,
                magnitude,
            } => apply_friction(world, &id, coefficient, magnitude, elapsed)?,
        }
    }

    let ids: Vec<EntityId> = world.entities().keys().cloned().collect();
    for id in ids {
        let Some(entity) = world.get_mut(&id) else {
            continue;
        };
        let step = entity.velocity() * elapsed;
        entity.set_phase(entity.phase() + step);
        if let Some(items) = entity.items_mut() {
            for item in items.iter_mut() {
                item.position = (item.position + step).clamp(0.0, 1.0);
            }
        }
    }

    world.advance_tick();
    Ok(())
}
