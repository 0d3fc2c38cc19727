//! Edge detection between a gear footprint and its neighbors.
//!
//! A gear of radius `r` centered on lattice point `c` touches the outside
//! world at four tangent points, `c ± (r, 0)` and `c ± (0, r)`. Each tangent
//! point is a tile corner shared by two tiles just outside the footprint;
//! those are the only tiles that can hold a meshing gear or a rim belt.
//! Every side/orientation pairing is its own rule.

use gearbox_common::{Direction, EntityId};
use gearbox_kernel::{Connection, ConnectionType, Entity, GearEntity, World};
use glam::IVec2;
use std::collections::BTreeSet;

/// The two contact tiles outside each tangent point, tagged with the side.
pub fn edge_contact_tiles(gear: &GearEntity) -> [(Direction, IVec2); 8] {
    let c = gear.center;
    let r = gear.radius;
    [
        (Direction::North, IVec2::new(c.x - 1, c.y - r - 1)),
        (Direction::North, IVec2::new(c.x, c.y - r - 1)),
        (Direction::East, IVec2::new(c.x + r, c.y - 1)),
        (Direction::East, IVec2::new(c.x + r, c.y)),
        (Direction::South, IVec2::new(c.x - 1, c.y + r)),
        (Direction::South, IVec2::new(c.x, c.y + r)),
        (Direction::West, IVec2::new(c.x - r - 1, c.y - 1)),
        (Direction::West, IVec2::new(c.x - r - 1, c.y)),
    ]
}

/// Multiplier from `a` to `b` if their rims touch exactly on an axis.
///
/// Meshed teeth share rim speed and spin opposite ways:
/// `ω_b = -(r_a / r_b) · ω_a`.
pub fn mesh_multiplier(a: &GearEntity, b: &GearEntity) -> Option<f64> {
    let d = b.center - a.center;
    let reach = a.radius + b.radius;
    let touching = (d.y == 0 && d.x.abs() == reach) || (d.x == 0 && d.y.abs() == reach);
    touching.then(|| -f64::from(a.radius) / f64::from(b.radius))
}

/// Which side of `gear` a belt tile sits on, if one of its corners is a
/// tangent point of the gear.
pub fn belt_contact_side(gear: &GearEntity, belt: IVec2) -> Option<Direction> {
    let c = gear.center;
    let r = gear.radius;
    let on_column = belt.x == c.x - 1 || belt.x == c.x;
    let on_row = belt.y == c.y - 1 || belt.y == c.y;
    if on_column && belt.y == c.y - r - 1 {
        Some(Direction::North)
    } else if on_column && belt.y == c.y + r {
        Some(Direction::South)
    } else if on_row && belt.x == c.x + r {
        Some(Direction::East)
    } else if on_row && belt.x == c.x - r - 1 {
        Some(Direction::West)
    } else {
        None
    }
}

/// Sign of the belt's velocity per unit of clockwise rim speed.
///
/// A clockwise rim moves east along its top, south down its east side,
/// west along its bottom and north up its west side. A belt running toward
/// or away from the gear does not engage.
fn rim_sign(side: Direction, belt_direction: Direction) -> Option<f64> {
    match (side, belt_direction) {
        (Direction::North, Direction::East) => Some(1.0),
        (Direction::North, Direction::West) => Some(-1.0),
        (Direction::South, Direction::West) => Some(1.0),
        (Direction::South, Direction::East) => Some(-1.0),
        (Direction::East, Direction::South) => Some(1.0),
        (Direction::East, Direction::North) => Some(-1.0),
        (Direction::West, Direction::North) => Some(1.0),
        (Direction::West, Direction::South) => Some(-1.0),
        _ => None,
    }
}

/// Multiplier from `gear` to a belt segment touching its rim:
/// `v_belt = ±r · ω`.
pub fn gear_belt_multiplier(gear: &GearEntity, belt: IVec2, direction: Direction) -> Option<f64> {
    let side = belt_contact_side(gear, belt)?;
    let sign = rim_sign(side, direction)?;
    Some(sign * f64::from(gear.radius))
}

/// `Adjacent` connections a gear would form with existing gears and belts.
pub fn gear_adjacent_connections(world: &World, gear: &GearEntity) -> Vec<Connection> {
    let mut seen: BTreeSet<EntityId> = BTreeSet::new();
    let mut connections = Vec::new();
    for (_, tile) in edge_contact_tiles(gear) {
        for id in world.occupants(tile) {
            if id == gear.id || !seen.insert(id.clone()) {
                continue;
            }
            let multiplier = match world.get(&id) {
                Some(Entity::Gear(other)) => mesh_multiplier(gear, other),
                Some(Entity::Belt(belt)) => {
                    gear_belt_multiplier(gear, belt.position, belt.direction)
                }
                // Intersections have no orientation to engage with a rim.
                Some(Entity::BeltIntersection(_)) | None => None,
            };
            if let Some(m) = multiplier {
                connections.push(Connection::new(ConnectionType::Adjacent, id, m));
            }
        }
    }
    connections
}

/// `Adjacent` connections a belt segment would form with gears along its
/// two sides. Multipliers are belt to gear.
pub fn belt_gear_connections(world: &World, position: IVec2, direction: Direction) -> Vec<Connection> {
    let sides = if direction.is_horizontal() {
        [Direction::North, Direction::South]
    } else {
        [Direction::East, Direction::West]
    };
    let mut seen: BTreeSet<EntityId> = BTreeSet::new();
    let mut connections = Vec::new();
    for side in sides {
        for id in world.occupants(position + side.delta()) {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(Entity::Gear(gear)) = world.get(&id) else {
                continue;
            };
            if let Some(m) = gear_belt_multiplier(gear, position, direction) {
                connections.push(Connection::new(ConnectionType::Adjacent, id, 1.0 / m));
            }
        }
    }
    connections
}
