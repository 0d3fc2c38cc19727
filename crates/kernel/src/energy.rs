//! Kinetic energy bookkeeping for network merges.
//!
//! When a build joins sub-networks that are already spinning, the merged
//! network's velocity is solved from the energy the sub-networks carried in,
//! then pushed out to every member through the ratio map.

use crate::entity::Entity;
use crate::error::WorldError;
use crate::propagate::{AccelerationMap, EntityLookup, get_acceleration_map};
use crate::world::World;
use gearbox_common::EntityId;
use std::collections::{BTreeMap, BTreeSet};

/// Coefficient `k` such that energy = `k · velocity²`.
///
/// Gears are solid disks: `½·I·ω²` with `I = ½·m·r²`. Belts are point
/// masses moving at their linear speed.
pub fn inertia(entity: &Entity) -> f64 {
    match entity {
        Entity::Gear(g) => 0.25 * g.mass * f64::from(g.radius * g.radius),
        Entity::Belt(b) => 0.5 * b.mass,
        Entity::BeltIntersection(b) => 0.5 * b.mass,
    }
}

pub fn get_energy(entity: &Entity) -> f64 {
    let v = entity.velocity();
    inertia(entity) * v * v
}

/// Every entity reachable from `root` through connections, `root` included.
pub fn network_ids<L: EntityLookup + ?Sized>(
    root: &EntityId,
    entities: &L,
) -> Result<BTreeSet<EntityId>, WorldError> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root.clone()];
    while let Some(id) = stack.pop() {
        if seen.contains(&id) {
            continue;
        }
        let entity = entities
            .lookup(&id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        stack.extend(
            entity
                .connections()
                .iter()
                .filter(|c| !seen.contains(&c.entity_id))
                .map(|c| c.entity_id.clone()),
        );
        seen.insert(id);
    }
    Ok(seen)
}

/// Total energy of a set of entities. Missing ids contribute nothing.
pub fn network_energy<L: EntityLookup + ?Sized>(ids: &BTreeSet<EntityId>, entities: &L) -> f64 {
    ids.iter()
        .filter_map(|id| entities.lookup(id))
        .map(get_energy)
        .sum()
}

/// Energy carried into a merge by one pre-existing sub-network.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySource {
    /// The member through which the network touches the build.
    pub entity_id: EntityId,
    /// That member's velocity before the merge, for the spin sign.
    pub velocity: f64,
    pub energy: f64,
}

/// Gather the energy of every distinct pre-existing network the build
/// touches, looking at the root first, then the root's connections, then the
/// rest of the plan.
///
/// A network reached twice is counted once, at its first occurrence. This
/// is a simplification for loops that close on the same network and is kept
/// as is.
pub fn collect_energy_sources(
    world: &World,
    root: &EntityId,
    plan: &BTreeMap<EntityId, Entity>,
) -> Result<Vec<EnergySource>, WorldError> {
    let mut candidates: Vec<EntityId> = vec![root.clone()];
    if let Some(root_entity) = plan.get(root) {
        candidates.extend(root_entity.connections().iter().map(|c| c.entity_id.clone()));
    }
    for (id, entity) in plan {
        candidates.push(id.clone());
        candidates.extend(entity.connections().iter().map(|c| c.entity_id.clone()));
    }

    let mut counted = BTreeSet::new();
    let mut sources = Vec::new();
    for id in candidates {
        if counted.contains(&id) {
            continue;
        }
        let Some(entity) = world.get(&id) else {
            // Not built yet; it carries no energy.
            continue;
        };
        let members = network_ids(&id, world)?;
        let energy = network_energy(&members, world);
        sources.push(EnergySource {
            entity_id: id,
            velocity: entity.velocity(),
            energy,
        });
        counted.extend(members);
    }
    Ok(sources)
}

/// Solve the merged network's velocity at `root` from the energy carried in
/// by `sources` and propagate it to every connected entity.
///
/// Each source contributes its energy signed by its spin relative to the
/// root. With ratio `n_i` such that `v_i = n_i · v_root`, the root gets
/// `sign(E) · sqrt(|E| / Σ k_i · n_i²)`. Returns the root velocity.
pub fn distribute_energy(
    world: &mut World,
    root: &EntityId,
    sources: &[EnergySource],
) -> Result<f64, WorldError> {
    let ratios = get_acceleration_map(root, 1.0, world)?
        .ok_or_else(|| WorldError::InconsistentNetwork(root.clone()))?;

    let final_energy: f64 = sources
        .iter()
        .filter(|s| s.velocity != 0.0)
        .filter_map(|s| {
            let ratio = ratios.get(&s.entity_id)?;
            Some(ratio.signum() * s.velocity.signum() * s.energy)
        })
        .sum();

    let weight: f64 = ratios
        .iter()
        .filter_map(|(id, ratio)| world.get(id).map(|e| inertia(e) * ratio * ratio))
        .sum();

    let root_velocity = if final_energy == 0.0 || weight <= 0.0 {
        0.0
    } else {
        final_energy.signum() * (final_energy.abs() / weight).sqrt()
    };
    tracing::debug!(
        root = %root,
        final_energy,
        root_velocity,
        members = ratios.len(),
        "distributed network energy"
    );
    propagate_root_velocity(world, root, &ratios, root_velocity, true)?;
    Ok(root_velocity)
}

/// Set every mapped entity's velocity to `root_velocity · ratio`.
///
/// With `reset_angle`, phases are rewritten relative to the root's phase so
/// meshed teeth line up again after a topology change.
pub fn propagate_root_velocity(
    world: &mut World,
    root: &EntityId,
    ratios: &AccelerationMap,
    root_velocity: f64,
    reset_angle: bool,
) -> Result<(), WorldError> {
    let root_phase = world
        .get(root)
        .ok_or_else(|| WorldError::MissingEntity(root.clone()))?
        .phase();
    for (id, ratio) in ratios {
        let entity = world
            .get_mut(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        entity.set_velocity(root_velocity * ratio);
        if reset_angle && id != root {
            entity.set_phase(root_phase * ratio);
        }
    }
    Ok(())
}
