//! Gear build planning and commit.
//!
//! Planning produces a patch of entities (the new gear plus clones of every
//! neighbor it links to, each with the reverse connection appended) and
//! validates the patched topology with the propagator. Committing inserts
//! the new entities, swaps in the patched connection lists, and merges the
//! energy of every sub-network the build joined.

use crate::adjacency::gear_adjacent_connections;
use crate::error::BuildError;
use gearbox_common::{EntityId, normalize_angle};
use gearbox_kernel::energy::{collect_energy_sources, distribute_energy};
use gearbox_kernel::{
    Connection, ConnectionType, Entity, EntityLookup, GearEntity, MAX_GEAR_RADIUS, Overlay, SimConfig, World,
    WorldError, get_acceleration_map,
};
use glam::IVec2;
use std::collections::{BTreeMap, BTreeSet};

/// Why a planned build cannot be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildRejection {
    InvalidRadius,
    Overlap,
    /// The chain source is missing, not a gear, or not radius 1.
    ChainSource,
    ChainNotAligned,
    ChainTooClose,
    ChainToSelf,
    AlreadyChained,
    InconsistentRatio,
}

/// The set of entities a build adds or relinks, all mutually reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub id: String,
    pub entity_ids: BTreeSet<EntityId>,
    pub mass: f64,
    pub root_id: EntityId,
}

impl Network {
    pub(crate) fn new(root_id: EntityId, entity_ids: BTreeSet<EntityId>, patch: &BTreeMap<EntityId, Entity>) -> Self {
        let mass = entity_ids
            .iter()
            .filter_map(|id| patch.get(id))
            .map(Entity::mass)
            .sum();
        Self {
            id: format!("network.{root_id}"),
            entity_ids,
            mass,
            root_id,
        }
    }
}

/// A validated (or rejected) topology change, shared by gear and belt hands.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    /// New entities, and patched clones of existing ones.
    pub entities: BTreeMap<EntityId, Entity>,
    pub network: Option<Network>,
    pub valid: bool,
    pub rejection: Option<BuildRejection>,
    /// World build version the plan was computed against.
    pub build_version: u64,
}

impl BuildPlan {
    pub(crate) fn rejected(world: &World, reason: BuildRejection) -> Self {
        tracing::debug!(?reason, "build rejected");
        Self {
            entities: BTreeMap::new(),
            network: None,
            valid: false,
            rejection: Some(reason),
            build_version: world.build_version(),
        }
    }

    pub(crate) fn accepted(world: &World, entities: BTreeMap<EntityId, Entity>, network: Network) -> Self {
        Self {
            entities,
            network: Some(network),
            valid: true,
            rejection: None,
            build_version: world.build_version(),
        }
    }

    /// Validate `patch` over the world with a unit seed at `root`.
    pub(crate) fn check(
        world: &World,
        root: EntityId,
        patch: BTreeMap<EntityId, Entity>,
        members: BTreeSet<EntityId>,
    ) -> Result<Self, WorldError> {
        let overlay = Overlay::new(world, &patch);
        if get_acceleration_map(&root, 1.0, &overlay)?.is_none() {
            return Ok(Self::rejected(world, BuildRejection::InconsistentRatio));
        }
        let network = Network::new(root, members, &patch);
        Ok(Self::accepted(world, patch, network))
    }
}

/// In-progress gear placement.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildHand {
    pub position: IVec2,
    pub radius: i32,
    pub chain_from: Option<EntityId>,
    /// Display angle of the candidate, kept in step with its neighbors.
    pub preview_angle: f64,
    pub plan: BuildPlan,
}

impl BuildHand {
    pub fn valid(&self) -> bool {
        self.plan.valid
    }

    /// Re-derive the candidate's display angle from the live world.
    pub fn refresh_preview(&mut self, world: &World) {
        let Some(root) = self.plan.network.as_ref().map(|n| &n.root_id) else {
            return;
        };
        let phase = match world.get(root) {
            Some(existing) => Some(existing.phase()),
            None => Overlay::new(world, &self.plan.entities)
                .lookup(root)
                .and_then(|candidate| neighbor_phase(world, candidate)),
        };
        if let Some(phase) = phase {
            self.preview_angle = phase;
        }
    }
}

/// How the candidate relates to what already occupies its footprint.
enum Placement {
    Fresh,
    /// Layered concentric onto a larger gear.
    Attach(EntityId),
    /// Chain end landing on an existing radius-1 gear.
    ChainTarget(EntityId),
}

/// Plan placing a gear of `radius` with top-left at `position`, optionally
/// chained from an existing radius-1 gear. Never mutates the world.
pub fn get_build_hand(
    world: &World,
    position: IVec2,
    radius: i32,
    chain_from: Option<&EntityId>,
    config: &SimConfig,
) -> Result<BuildHand, WorldError> {
    let plan = plan_gear(world, position, radius, chain_from, config)?;
    let mut hand = BuildHand {
        position,
        radius,
        chain_from: chain_from.cloned(),
        preview_angle: 0.0,
        plan,
    };
    hand.refresh_preview(world);
    Ok(hand)
}

fn plan_gear(
    world: &World,
    position: IVec2,
    radius: i32,
    chain_from: Option<&EntityId>,
    config: &SimConfig,
) -> Result<BuildPlan, WorldError> {
    if !(1..=config.max_gear_radius.min(MAX_GEAR_RADIUS)).contains(&radius) {
        return Ok(BuildPlan::rejected(world, BuildRejection::InvalidRadius));
    }
    let candidate = GearEntity::new(position, radius);

    let intersecting: BTreeSet<EntityId> = candidate
        .footprint()
        .into_iter()
        .flat_map(|tile| world.occupants(tile))
        .collect();
    let placement = match intersecting.len() {
        0 => Placement::Fresh,
        1 => {
            let Some(Entity::Gear(other)) = intersecting.first().and_then(|id| world.get(id))
            else {
                return Ok(BuildPlan::rejected(world, BuildRejection::Overlap));
            };
            if chain_from.is_some() && radius == 1 && other.radius == 1 && other.position == position {
                Placement::ChainTarget(other.id.clone())
            } else if chain_from.is_none() && other.center == candidate.center && other.radius > radius {
                Placement::Attach(other.id.clone())
            } else {
                return Ok(BuildPlan::rejected(world, BuildRejection::Overlap));
            }
        }
        _ => return Ok(BuildPlan::rejected(world, BuildRejection::Overlap)),
    };

    let (mut root, existing_root) = match &placement {
        Placement::Fresh => (candidate, false),
        Placement::Attach(base) => {
            let mut g = candidate;
            g.connections
                .push(Connection::new(ConnectionType::Attach, base.clone(), 1.0));
            (g, false)
        }
        Placement::ChainTarget(id) => (world.gear(id)?.clone(), true),
    };
    let root_id = root.id.clone();
    let mut members = BTreeSet::from([root_id.clone()]);
    // Connections the root gains; the root may already carry others.
    let mut added: Vec<Connection> = Vec::new();
    if !existing_root {
        added.append(&mut root.connections);
        added.extend(gear_adjacent_connections(world, &root));
    }

    if let Some(src_id) = chain_from {
        let src = match world.get(src_id) {
            Some(Entity::Gear(g)) if g.radius == 1 => g,
            _ => return Ok(BuildPlan::rejected(world, BuildRejection::ChainSource)),
        };
        if radius != 1 {
            return Ok(BuildPlan::rejected(world, BuildRejection::ChainSource));
        }
        if src.id == root_id {
            return Ok(BuildPlan::rejected(world, BuildRejection::ChainToSelf));
        }
        let d = root.center - src.center;
        if d.x != 0 && d.y != 0 {
            return Ok(BuildPlan::rejected(world, BuildRejection::ChainNotAligned));
        }
        if d.x.abs() + d.y.abs() <= root.radius + src.radius {
            return Ok(BuildPlan::rejected(world, BuildRejection::ChainTooClose));
        }
        if root.connection_to(&src.id).is_some() || added.iter().any(|c| c.entity_id == src.id) {
            return Ok(BuildPlan::rejected(world, BuildRejection::AlreadyChained));
        }
        let ratio = f64::from(root.radius) / f64::from(src.radius);
        added.push(Connection::new(ConnectionType::Chain, src.id.clone(), ratio));
        members.insert(src.id.clone());
    }

    let mut patch: BTreeMap<EntityId, Entity> = BTreeMap::new();
    for conn in &added {
        let mut neighbor = world
            .get(&conn.entity_id)
            .cloned()
            .ok_or_else(|| WorldError::MissingEntity(conn.entity_id.clone()))?;
        neighbor.connections_mut().push(conn.reverse(&root_id));
        patch.insert(conn.entity_id.clone(), neighbor);
    }
    root.connections.extend(added);
    patch.insert(root_id.clone(), Entity::Gear(root));

    BuildPlan::check(world, root_id, patch, members)
}

/// Phase that lines `entity`'s teeth up with the first entity it connects
/// to that already exists in the world.
fn neighbor_phase(world: &World, entity: &Entity) -> Option<f64> {
    entity.connections().iter().find_map(|conn| {
        let neighbor = world.get(&conn.entity_id)?;
        Some(normalize_angle(neighbor.phase() / conn.multiplier))
    })
}

/// Insert a planned gear and claim its tiles.
pub fn build_gear(world: &mut World, gear: GearEntity) -> Result<(), WorldError> {
    tracing::trace!(id = %gear.id, radius = gear.radius, "build gear");
    world.insert_gear(gear)
}

/// Insert a planned belt or belt intersection and claim its tile.
pub fn build_belt(world: &mut World, belt: Entity) -> Result<(), WorldError> {
    tracing::trace!(id = %belt.id(), "build belt");
    world.insert_belt(belt)
}

/// Commit a valid plan.
///
/// New entities are inserted, existing ones get their patched connection
/// lists (their live phase and velocity are kept), then the merged
/// network's velocity is solved from the energy it carried in.
pub fn build(world: &mut World, plan: &BuildPlan) -> Result<(), BuildError> {
    let network = match (&plan.network, plan.valid) {
        (Some(network), true) => network,
        _ => return Err(BuildError::InvalidHand),
    };
    if plan.build_version != world.build_version() {
        return Err(BuildError::StaleHand {
            planned: plan.build_version,
            current: world.build_version(),
        });
    }
    let root = &network.root_id;
    let _span = tracing::debug_span!("build", network = %network.id, root = %root).entered();

    for (id, entity) in &plan.entities {
        if let Some(existing) = world.get(id) {
            if !existing.same_shape(entity) {
                return Err(WorldError::ShapeMismatch { id: id.clone() }.into());
            }
        }
    }
    let sources = collect_energy_sources(world, root, &plan.entities)?;
    let aligned_phase = match world.get(root) {
        Some(_) => None,
        None => plan.entities.get(root).and_then(|e| neighbor_phase(world, e)),
    };

    // Larger gears first so an attached gear always finds its base.
    let mut fresh: Vec<&Entity> = plan
        .entities
        .iter()
        .filter(|(id, _)| world.get(id).is_none())
        .map(|(_, e)| e)
        .collect();
    fresh.sort_by_key(|e| std::cmp::Reverse(e.as_gear().map_or(0, |g| g.radius)));
    let patched: Vec<(&EntityId, &Entity)> = plan
        .entities
        .iter()
        .filter(|(id, _)| world.get(id).is_some())
        .collect();

    for entity in fresh {
        match entity {
            Entity::Gear(g) => build_gear(world, g.clone())?,
            Entity::Belt(_) | Entity::BeltIntersection(_) => build_belt(world, entity.clone())?,
        }
    }
    for (id, entity) in patched {
        world.replace_connections(id, entity.connections().to_vec())?;
    }
    for id in plan.entities.keys() {
        world.check_connections(id)?;
    }

    if let (Some(phase), Some(entity)) = (aligned_phase, world.get_mut(root)) {
        entity.set_phase(phase);
    }
    distribute_energy(world, root, &sources)?;
    world.bump_build_version();
    tracing::info!(
        root = %root,
        entities = plan.entities.len(),
        build_version = world.build_version(),
        "build committed"
    );
    Ok(())
}
