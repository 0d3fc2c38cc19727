//! Connection-graph propagation.
//!
//! A value applied at one entity (an acceleration, or a unit seed when
//! validating a build) must appear at every coupled entity scaled by the
//! product of multipliers along any path to it. Two paths that disagree
//! mean the topology cannot physically move.

use crate::entity::Entity;
use crate::error::WorldError;
use crate::world::World;
use gearbox_common::{EntityId, approx_eq};
use std::collections::{BTreeMap, BTreeSet};

/// Propagated value per reachable entity.
pub type AccelerationMap = BTreeMap<EntityId, f64>;

/// Read access to entities by id. Implemented by the world and by build-time
/// overlays so the propagator can run against proposed topologies.
pub trait EntityLookup {
    fn lookup(&self, id: &EntityId) -> Option<&Entity>;
}

impl EntityLookup for BTreeMap<EntityId, Entity> {
    fn lookup(&self, id: &EntityId) -> Option<&Entity> {
        self.get(id)
    }
}

impl EntityLookup for World {
    fn lookup(&self, id: &EntityId) -> Option<&Entity> {
        self.get(id)
    }
}

/// Patched entities layered over a base lookup. Patch entries win.
pub struct Overlay<'a, L: EntityLookup + ?Sized> {
    base: &'a L,
    patch: &'a BTreeMap<EntityId, Entity>,
}

impl<'a, L: EntityLookup + ?Sized> Overlay<'a, L> {
    pub fn new(base: &'a L, patch: &'a BTreeMap<EntityId, Entity>) -> Self {
        Self { base, patch }
    }
}

impl<L: EntityLookup + ?Sized> EntityLookup for Overlay<'_, L> {
    fn lookup(&self, id: &EntityId) -> Option<&Entity> {
        self.patch.get(id).or_else(|| self.base.lookup(id))
    }
}

/// Walk the connection graph from `root` and compute `seed` scaled by the
/// path multiplier at every reachable entity.
///
/// Returns `Ok(None)` when two paths reach the same entity with different
/// values. A dangling or one-sided connection is an `Err`.
pub fn get_acceleration_map<L: EntityLookup + ?Sized>(
    root: &EntityId,
    seed: f64,
    entities: &L,
) -> Result<Option<AccelerationMap>, WorldError> {
    if entities.lookup(root).is_none() {
        return Err(WorldError::MissingEntity(root.clone()));
    }

    // Ratios are walked with a unit seed so the consistency check does not
    // depend on the magnitude being propagated.
    let mut ratios = AccelerationMap::new();
    ratios.insert(root.clone(), 1.0);
    let mut visited = BTreeSet::new();
    let mut stack = vec![root.clone()];

    while let Some(tail_id) = stack.pop() {
        if !visited.insert(tail_id.clone()) {
            continue;
        }
        let tail = entities
            .lookup(&tail_id)
            .ok_or_else(|| WorldError::MissingEntity(tail_id.clone()))?;
        let tail_ratio = ratios[&tail_id];

        for conn in tail.connections() {
            let neighbor = entities
                .lookup(&conn.entity_id)
                .ok_or_else(|| WorldError::MissingEntity(conn.entity_id.clone()))?;
            let reciprocal = neighbor.connections().iter().any(|back| {
                back.entity_id == tail_id
                    && back.kind == conn.kind
                    && approx_eq(back.multiplier * conn.multiplier, 1.0)
            });
            if !reciprocal {
                return Err(WorldError::AsymmetricConnection {
                    from: tail_id.clone(),
                    to: conn.entity_id.clone(),
                });
            }

            let ratio = tail_ratio * conn.multiplier;
            match ratios.get(&conn.entity_id) {
                Some(&existing) => {
                    if !approx_eq(existing, ratio) {
                        tracing::debug!(
                            entity = %conn.entity_id,
                            existing,
                            ratio,
                            "inconsistent ratio in connection graph"
                        );
                        return Ok(None);
                    }
                }
                None => {
                    ratios.insert(conn.entity_id.clone(), ratio);
                    stack.push(conn.entity_id.clone());
                }
            }
        }
    }

    for value in ratios.values_mut() {
        *value *= seed;
    }
    Ok(Some(ratios))
}
