use gearbox_common::EntityId;
use gearbox_kernel::energy::{get_energy, network_energy, network_ids};
use gearbox_kernel::{Entity, World, WorldError};
use glam::IVec2;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("no entity with id {0}")]
    NotFound(EntityId),
    #[error(transparent)]
    World(#[from] WorldError),
}

/// World inspector for developer tooling.
///
/// Provides read-only queries against the world state for debugging and the
/// command-line front end.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(world: &World) -> Result<WorldSummary, InspectError> {
        let mut gears = 0;
        let mut belts = 0;
        for entity in world.entities().values() {
            match entity {
                Entity::Gear(_) => gears += 1,
                Entity::Belt(_) | Entity::BeltIntersection(_) => belts += 1,
            }
        }
        Ok(WorldSummary {
            tick: world.tick(),
            build_version: world.build_version(),
            gears,
            belts,
            tiles: world.tiles().len(),
            networks: Self::networks(world)?.len(),
            total_energy: world.entities().values().map(get_energy).sum(),
        })
    }

    pub fn inspect_entity(world: &World, id: &EntityId) -> Result<EntityInfo, InspectError> {
        let entity = world
            .get(id)
            .ok_or_else(|| InspectError::NotFound(id.clone()))?;
        let (kind, radius) = match entity {
            Entity::Gear(g) => ("gear", Some(g.radius)),
            Entity::Belt(_) => ("belt", None),
            Entity::BeltIntersection(_) => ("belt-intersection", None),
        };
        Ok(EntityInfo {
            id: id.clone(),
            kind,
            position: entity.position(),
            radius,
            velocity: entity.velocity(),
            phase: entity.phase(),
            energy: get_energy(entity),
            connections: entity
                .connections()
                .iter()
                .map(|c| (c.entity_id.clone(), c.multiplier))
                .collect(),
        })
    }

    /// Connected components of the connection graph, ordered by their
    /// smallest member id.
    pub fn networks(world: &World) -> Result<Vec<NetworkInfo>, InspectError> {
        let mut seen: BTreeSet<EntityId> = BTreeSet::new();
        let mut networks = Vec::new();
        for id in world.entities().keys() {
            if seen.contains(id) {
                continue;
            }
            let members = network_ids(id, world)?;
            let energy = network_energy(&members, world);
            seen.extend(members.iter().cloned());
            networks.push(NetworkInfo {
                root: id.clone(),
                members,
                energy,
            });
        }
        Ok(networks)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    pub tick: u64,
    pub build_version: u64,
    pub gears: usize,
    pub belts: usize,
    pub tiles: usize,
    pub networks: usize,
    pub total_energy: f64,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: tick={} build={} gears={} belts={} tiles={} networks={} energy={:.4}",
            self.tick,
            self.build_version,
            self.gears,
            self.belts,
            self.tiles,
            self.networks,
            self.total_energy
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: &'static str,
    pub position: IVec2,
    pub radius: Option<i32>,
    pub velocity: f64,
    pub phase: f64,
    pub energy: f64,
    pub connections: Vec<(EntityId, f64)>,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] pos=({}, {})",
            self.id, self.kind, self.position.x, self.position.y
        )?;
        if let Some(r) = self.radius {
            write!(f, " r={r}")?;
        }
        write!(
            f,
            " v={:.4} phase={:.4} energy={:.4} links={}",
            self.velocity,
            self.phase,
            self.energy,
            self.connections.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInfo {
    pub root: EntityId,
    pub members: BTreeSet<EntityId>,
    pub energy: f64,
}

impl fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "network.{} members={} energy={:.4}",
            self.root,
            self.members.len(),
            self.energy
        )
    }
}
