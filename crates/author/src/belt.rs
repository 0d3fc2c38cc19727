//! Belt path planning.

use crate::adjacency::belt_gear_connections;
use crate::build::{BuildPlan, BuildRejection};
use gearbox_common::{Direction, EntityId};
use gearbox_kernel::{
    BeltEntity, BeltIntersectionEntity, Connection, ConnectionType, Entity, World, WorldError,
};
use glam::IVec2;
use std::collections::{BTreeMap, BTreeSet};

/// In-progress belt placement from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddBeltHand {
    pub start: IVec2,
    pub end: IVec2,
    pub plan: BuildPlan,
}

impl AddBeltHand {
    pub fn valid(&self) -> bool {
        self.plan.valid
    }
}

/// One tile of a belt path. `None` marks the turn tile.
type PathTile = (IVec2, Option<Direction>);

/// L-shaped path: the horizontal leg along `start.y`, then the vertical leg
/// along `end.x`. The corner is an intersection only when both legs exist.
fn belt_path(start: IVec2, end: IVec2) -> Vec<PathTile> {
    let d = end - start;
    let horizontal = Direction::from_delta(IVec2::new(d.x.signum(), 0));
    let vertical = Direction::from_delta(IVec2::new(0, d.y.signum()));

    let mut path = Vec::new();
    if let Some(dir) = horizontal {
        let mut pos = start;
        while pos.x != end.x {
            path.push((pos, Some(dir)));
            pos += dir.delta();
        }
    }
    let corner = IVec2::new(end.x, start.y);
    let corner_dir = match (horizontal, vertical) {
        (Some(_), Some(_)) => None,
        (Some(h), None) => Some(h),
        (None, Some(v)) => Some(v),
        (None, None) => Some(Direction::East),
    };
    path.push((corner, corner_dir));
    if let Some(dir) = vertical {
        let mut pos = corner + dir.delta();
        loop {
            path.push((pos, Some(dir)));
            if pos.y == end.y {
                break;
            }
            pos += dir.delta();
        }
    }
    path
}

fn path_entity((position, direction): PathTile) -> Entity {
    match direction {
        Some(dir) => Entity::Belt(BeltEntity::new(position, dir)),
        None => Entity::BeltIntersection(BeltIntersectionEntity::new(position)),
    }
}

/// Record `conn` on `owner` in the patch and the reverse edge on its target,
/// cloning the target from the world on first touch.
fn link(
    world: &World,
    patch: &mut BTreeMap<EntityId, Entity>,
    owner: &EntityId,
    conn: Connection,
) -> Result<(), WorldError> {
    let target = conn.entity_id.clone();
    if !patch.contains_key(&target) {
        let existing = world
            .get(&target)
            .cloned()
            .ok_or_else(|| WorldError::MissingEntity(target.clone()))?;
        patch.insert(target.clone(), existing);
    }
    let reverse = conn.reverse(owner);
    patch
        .get_mut(owner)
        .ok_or_else(|| WorldError::MissingEntity(owner.clone()))?
        .connections_mut()
        .push(conn);
    if let Some(other) = patch.get_mut(&target) {
        other.connections_mut().push(reverse);
    }
    Ok(())
}

/// Existing belt continuing the path at `at`, if it runs the same way.
fn continuation(world: &World, at: IVec2, along: &EntityId, direction: Direction) -> Option<EntityId> {
    let id = world.occupants(at).into_iter().next()?;
    match world.get(&id) {
        Some(Entity::Belt(belt)) if belt.direction == direction => Some(id),
        Some(Entity::Belt(_)) | Some(Entity::BeltIntersection(_)) => {
            tracing::debug!(path = %along, neighbor = %id, "unsupported belt merge, not linked");
            None
        }
        _ => None,
    }
}

/// Plan a belt path between two tiles. Never mutates the world.
pub fn get_add_belt_hand(world: &World, start: IVec2, end: IVec2) -> Result<AddBeltHand, WorldError> {
    let plan = plan_belt(world, start, end)?;
    Ok(AddBeltHand { start, end, plan })
}

fn plan_belt(world: &World, start: IVec2, end: IVec2) -> Result<BuildPlan, WorldError> {
    let path = belt_path(start, end);
    if path.iter().any(|(pos, _)| world.tile(*pos).is_some()) {
        return Ok(BuildPlan::rejected(world, BuildRejection::Overlap));
    }

    let entities: Vec<Entity> = path.iter().copied().map(path_entity).collect();
    let ids: Vec<EntityId> = entities.iter().map(|e| e.id().clone()).collect();
    let mut patch: BTreeMap<EntityId, Entity> =
        entities.into_iter().map(|e| (e.id().clone(), e)).collect();
    let mut members: BTreeSet<EntityId> = ids.iter().cloned().collect();

    for pair in ids.windows(2) {
        link(world, &mut patch, &pair[0], Connection::new(ConnectionType::Belt, pair[1].clone(), 1.0))?;
    }

    for (&(position, direction), id) in path.iter().zip(&ids) {
        let Some(direction) = direction else {
            continue;
        };
        for conn in belt_gear_connections(world, position, direction) {
            members.insert(conn.entity_id.clone());
            link(world, &mut patch, id, conn)?;
        }
    }

    if let (Some(&(first_pos, Some(first_dir))), Some(first_id)) = (path.first(), ids.first()) {
        if let Some(prev) = continuation(world, first_pos + first_dir.opposite().delta(), first_id, first_dir) {
            members.insert(prev.clone());
            link(world, &mut patch, first_id, Connection::new(ConnectionType::Belt, prev, 1.0))?;
        }
    }
    if let (Some(&(last_pos, Some(last_dir))), Some(last_id)) = (path.last(), ids.last()) {
        if let Some(next) = continuation(world, last_pos + last_dir.delta(), last_id, last_dir) {
            if !members.contains(&next) {
                members.insert(next.clone());
                link(world, &mut patch, last_id, Connection::new(ConnectionType::Belt, next, 1.0))?;
            }
        }
    }

    let Some(root) = ids.first().cloned() else {
        return Ok(BuildPlan::rejected(world, BuildRejection::Overlap));
    };
    BuildPlan::check(world, root, patch, members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build, get_build_hand};
    use gearbox_common::approx_eq;
    use gearbox_kernel::energy::get_energy;
    use gearbox_kernel::{SimConfig, TickInput, tick};
    use std::f64::consts::PI;

    fn place_gear(world: &mut World, x: i32, y: i32, radius: i32) -> EntityId {
        let hand = get_build_hand(world, IVec2::new(x, y), radius, None, &SimConfig::default()).unwrap();
        build(world, &hand.plan).unwrap();
        EntityId::gear(IVec2::new(x, y))
    }

    fn lay(world: &mut World, start: (i32, i32), end: (i32, i32)) -> AddBeltHand {
        let hand = get_add_belt_hand(world, IVec2::from(start), IVec2::from(end)).unwrap();
        assert!(hand.valid(), "{:?}", hand.plan.rejection);
        build(world, &hand.plan).unwrap();
        hand
    }

    #[test]
    fn straight_path_runs_one_direction() {
        let path = belt_path(IVec2::new(0, 0), IVec2::new(3, 0));
        assert_eq!(path.len(), 4);
        assert!(path.iter().all(|(_, d)| *d == Some(Direction::East)));
        let back = belt_path(IVec2::new(0, 0), IVec2::new(0, -2));
        assert_eq!(back.iter().map(|p| p.1).collect::<Vec<_>>(), vec![Some(Direction::North); 3]);
    }

    #[test]
    fn single_tile_path_faces_east() {
        assert_eq!(belt_path(IVec2::ONE, IVec2::ONE), vec![(IVec2::ONE, Some(Direction::East))]);
    }

    #[test]
    fn l_path_turns_through_an_intersection() {
        let mut world = World::new();
        lay(&mut world, (0, 0), (2, 2));
        assert_eq!(world.entity_count(), 5);
        let corner = EntityId::belt_intersection(IVec2::new(2, 0));
        let Some(Entity::BeltIntersection(turn)) = world.get(&corner) else {
            panic!("corner is not an intersection");
        };
        assert_eq!(turn.connections.len(), 2);
        assert!(turn.connections.iter().all(|c| c.kind == ConnectionType::Belt));
        let Some(Entity::Belt(down)) = world.get(&EntityId::belt(IVec2::new(2, 2))) else {
            panic!("missing vertical leg");
        };
        assert_eq!(down.direction, Direction::South);
        world.validate().unwrap();
    }

    #[test]
    fn path_over_gear_is_rejected() {
        let mut world = World::new();
        place_gear(&mut world, 0, 0, 1);
        let before = world.clone();
        let hand = get_add_belt_hand(&world, IVec2::new(-2, 1), IVec2::new(3, 1)).unwrap();
        assert_eq!(hand.plan.rejection, Some(BuildRejection::Overlap));
        assert_eq!(world, before);
    }

    #[test]
    fn belt_over_spinning_gear_shares_its_energy() {
        let mut world = World::new();
        let g = place_gear(&mut world, 0, 0, 1);
        world.gear_mut(&g).unwrap().velocity = 1.0;
        let before: f64 = world.entities().values().map(get_energy).sum();

        lay(&mut world, (0, -1), (1, -1));
        let gear = world.gear(&g).unwrap();
        assert_eq!(gear.connections.len(), 2);
        let expected = ((PI / 4.0) / (PI / 4.0 + 1.0)).sqrt();
        assert!(approx_eq(gear.velocity, expected));
        for x in [0, 1] {
            let belt = world.get(&EntityId::belt(IVec2::new(x, -1))).unwrap();
            assert!(approx_eq(belt.velocity(), expected));
        }
        let after: f64 = world.entities().values().map(get_energy).sum();
        assert!(approx_eq(before, after));
    }

    #[test]
    fn belt_wrapping_a_gear_corner_is_consistent() {
        let mut world = World::new();
        let g = place_gear(&mut world, 0, 0, 1);
        // Over the top eastward, then down the east side.
        lay(&mut world, (0, -1), (2, 1));
        assert_eq!(world.gear(&g).unwrap().connections.len(), 4);
        world.validate().unwrap();
    }

    #[test]
    fn belt_over_meshed_pair_is_inconsistent() {
        let mut world = World::new();
        place_gear(&mut world, 0, 0, 1);
        place_gear(&mut world, 2, 0, 1);
        let hand = get_add_belt_hand(&world, IVec2::new(0, -1), IVec2::new(3, -1)).unwrap();
        assert!(!hand.valid());
        assert_eq!(hand.plan.rejection, Some(BuildRejection::InconsistentRatio));
    }

    #[test]
    fn collinear_belt_is_extended() {
        let mut world = World::new();
        lay(&mut world, (0, 0), (0, 0));
        lay(&mut world, (1, 0), (3, 0));
        let head = world.get(&EntityId::belt(IVec2::new(0, 0))).unwrap();
        assert_eq!(
            head.connections(),
            &[Connection::new(ConnectionType::Belt, EntityId::belt(IVec2::new(1, 0)), 1.0)]
        );
        world.validate().unwrap();
    }

    #[test]
    fn crossing_belt_is_left_unlinked() {
        let mut world = World::new();
        lay(&mut world, (0, 0), (0, -1));
        lay(&mut world, (1, 0), (2, 0));
        let crossed = world.get(&EntityId::belt(IVec2::new(0, 0))).unwrap();
        assert_eq!(crossed.connections().len(), 1);
        assert_eq!(crossed.connections()[0].entity_id, EntityId::belt(IVec2::new(0, -1)));
        let side = world.get(&EntityId::belt(IVec2::new(1, 0))).unwrap();
        assert_eq!(side.connections().len(), 1);
    }

    #[test]
    fn driven_gear_moves_belt_items() {
        let mut world = World::new();
        let g = place_gear(&mut world, 0, 0, 1);
        lay(&mut world, (0, -1), (1, -1));
        let input = TickInput {
            tool: Some(gearbox_kernel::ActiveTool::Force {
                gear_id: g.clone(),
                magnitude: 10.0,
            }),
        };
        tick(&mut world, &input, 0.1).unwrap();
        let gear_v = world.gear(&g).unwrap().velocity;
        assert!(gear_v > 0.0);
        let belt = world.get(&EntityId::belt(IVec2::new(0, -1))).unwrap();
        assert!(approx_eq(belt.velocity(), gear_v));
        assert!(belt.phase() > 0.0);
    }
}
