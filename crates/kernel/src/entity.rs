use gearbox_common::{Direction, EntityId, normalize_angle, wrap_unit};
use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mass of a single belt or belt-intersection tile.
pub const BELT_MASS: f64 = 1.0;

/// Largest radius a gear in a world may have.
pub const MAX_GEAR_RADIUS: i32 = 64;

/// How two entities are kinematically coupled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Meshed teeth, or a belt running along a gear's rim.
    Adjacent,
    /// Two radius-1 gears linked by a chain. Same spin direction.
    Chain,
    /// A smaller gear fixed concentric to a larger one.
    Attach,
    /// Consecutive belt segments.
    Belt,
}

/// A directed edge in the connection graph.
///
/// `multiplier` maps a velocity (or acceleration) on the owning entity to
/// the connected entity: `v_other = v_self * multiplier`. The connected
/// entity stores the same type with the reciprocal multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "type")]
    pub kind: ConnectionType,
    pub entity_id: EntityId,
    pub multiplier: f64,
}

impl Connection {
    pub fn new(kind: ConnectionType, entity_id: EntityId, multiplier: f64) -> Self {
        Self {
            kind,
            entity_id,
            multiplier,
        }
    }

    /// The edge the connected entity must store back to `owner`.
    pub fn reverse(&self, owner: &EntityId) -> Self {
        Self {
            kind: self.kind,
            entity_id: owner.clone(),
            multiplier: 1.0 / self.multiplier,
        }
    }
}

/// A continuous force or drag source attached to a gear by the configure tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Behavior {
    Force { magnitude: f64 },
    Friction { coefficient: f64, magnitude: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearEntity {
    pub id: EntityId,
    /// Top-left tile of the footprint.
    pub position: IVec2,
    /// Lattice point at `position + (radius, radius)`.
    pub center: IVec2,
    pub radius: i32,
    pub mass: f64,
    /// Rotation phase in radians, `[0, 2π)`.
    pub angle: f64,
    /// Angular velocity in radians per second. Positive is clockwise.
    pub velocity: f64,
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
}

impl GearEntity {
    /// A stationary, unconnected gear.
    pub fn new(position: IVec2, radius: i32) -> Self {
        Self {
            id: EntityId::gear(position),
            position,
            center: position + IVec2::splat(radius),
            radius,
            mass: gear_mass(radius),
            angle: 0.0,
            velocity: 0.0,
            connections: Vec::new(),
            behavior: None,
        }
    }

    /// Tiles covered by the gear: a `2r` by `2r` square.
    pub fn footprint(&self) -> Vec<IVec2> {
        let side = self.radius * 2;
        let mut tiles = Vec::with_capacity((side * side) as usize);
        for dy in 0..side {
            for dx in 0..side {
                tiles.push(self.position + IVec2::new(dx, dy));
            }
        }
        tiles
    }

    /// Whether `tile` falls inside the footprint.
    pub fn covers(&self, tile: IVec2) -> bool {
        let side = 2 * i64::from(self.radius);
        let within = |t: i32, p: i32| (0..side).contains(&(i64::from(t) - i64::from(p)));
        within(tile.x, self.position.x) && within(tile.y, self.position.y)
    }

    pub fn connection_to(&self, id: &EntityId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.entity_id == id)
    }
}

/// `π·r²`
pub fn gear_mass(radius: i32) -> f64 {
    PI * f64::from(radius * radius)
}

/// An object riding a belt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltItem {
    pub id: u32,
    /// Position along the segment in `0..=1`, measured in the belt's direction.
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltEntity {
    pub id: EntityId,
    pub position: IVec2,
    /// Travel direction. Positive velocity moves items this way.
    pub direction: Direction,
    pub connections: Vec<Connection>,
    /// Belt phase in `[0, 1)`.
    pub offset: f64,
    /// Linear speed in tiles per second.
    pub velocity: f64,
    pub items: Vec<BeltItem>,
    pub mass: f64,
}

impl BeltEntity {
    pub fn new(position: IVec2, direction: Direction) -> Self {
        Self {
            id: EntityId::belt(position),
            position,
            direction,
            connections: Vec::new(),
            offset: 0.0,
            velocity: 0.0,
            items: Vec::new(),
            mass: BELT_MASS,
        }
    }
}

/// The turn tile of a belt path. It has no orientation of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltIntersectionEntity {
    pub id: EntityId,
    pub position: IVec2,
    pub connections: Vec<Connection>,
    pub offset: f64,
    pub velocity: f64,
    pub items: Vec<BeltItem>,
    pub mass: f64,
}

impl BeltIntersectionEntity {
    pub fn new(position: IVec2) -> Self {
        Self {
            id: EntityId::belt_intersection(position),
            position,
            connections: Vec::new(),
            offset: 0.0,
            velocity: 0.0,
            items: Vec::new(),
            mass: BELT_MASS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entity {
    Gear(GearEntity),
    Belt(BeltEntity),
    BeltIntersection(BeltIntersectionEntity),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Gear(g) => &g.id,
            Entity::Belt(b) => &b.id,
            Entity::BeltIntersection(b) => &b.id,
        }
    }

    pub fn position(&self) -> IVec2 {
        match self {
            Entity::Gear(g) => g.position,
            Entity::Belt(b) => b.position,
            Entity::BeltIntersection(b) => b.position,
        }
    }

    pub fn connections(&self) -> &[Connection] {
        match self {
            Entity::Gear(g) => &g.connections,
            Entity::Belt(b) => &b.connections,
            Entity::BeltIntersection(b) => &b.connections,
        }
    }

    pub fn connections_mut(&mut self) -> &mut Vec<Connection> {
        match self {
            Entity::Gear(g) => &mut g.connections,
            Entity::Belt(b) => &mut b.connections,
            Entity::BeltIntersection(b) => &mut b.connections,
        }
    }

    pub fn mass(&self) -> f64 {
        match self {
            Entity::Gear(g) => g.mass,
            Entity::Belt(b) => b.mass,
            Entity::BeltIntersection(b) => b.mass,
        }
    }

    pub fn velocity(&self) -> f64 {
        match self {
            Entity::Gear(g) => g.velocity,
            Entity::Belt(b) => b.velocity,
            Entity::BeltIntersection(b) => b.velocity,
        }
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        match self {
            Entity::Gear(g) => g.velocity = velocity,
            Entity::Belt(b) => b.velocity = velocity,
            Entity::BeltIntersection(b) => b.velocity = velocity,
        }
    }

    /// Angle for gears, offset for belts.
    pub fn phase(&self) -> f64 {
        match self {
            Entity::Gear(g) => g.angle,
            Entity::Belt(b) => b.offset,
            Entity::BeltIntersection(b) => b.offset,
        }
    }

    /// Set the phase, wrapping it into the entity's range.
    pub fn set_phase(&mut self, phase: f64) {
        match self {
            Entity::Gear(g) => g.angle = normalize_angle(phase),
            Entity::Belt(b) => b.offset = wrap_unit(phase),
            Entity::BeltIntersection(b) => b.offset = wrap_unit(phase),
        }
    }

    /// Whether this entity claims `tile`.
    pub fn covers(&self, tile: IVec2) -> bool {
        match self {
            Entity::Gear(g) => g.covers(tile),
            Entity::Belt(b) => b.position == tile,
            Entity::BeltIntersection(b) => b.position == tile,
        }
    }

    /// Tiles this entity claims in the tile map.
    pub fn footprint(&self) -> Vec<IVec2> {
        match self {
            Entity::Gear(g) => g.footprint(),
            Entity::Belt(b) => vec![b.position],
            Entity::BeltIntersection(b) => vec![b.position],
        }
    }

    pub fn as_gear(&self) -> Option<&GearEntity> {
        match self {
            Entity::Gear(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_gear_mut(&mut self) -> Option<&mut GearEntity> {
        match self {
            Entity::Gear(g) => Some(g),
            _ => None,
        }
    }

    pub fn items_mut(&mut self) -> Option<&mut Vec<BeltItem>> {
        match self {
            Entity::Gear(_) => None,
            Entity::Belt(b) => Some(&mut b.items),
            Entity::BeltIntersection(b) => Some(&mut b.items),
        }
    }

    /// Same kind and same footprint. Connections and motion may differ.
    pub fn same_shape(&self, other: &Entity) -> bool {
        match (self, other) {
            (Entity::Gear(a), Entity::Gear(b)) => a.position == b.position && a.radius == b.radius,
            (Entity::Belt(a), Entity::Belt(b)) => {
                a.position == b.position && a.direction == b.direction
            }
            (Entity::BeltIntersection(a), Entity::BeltIntersection(b)) => a.position == b.position,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gear_footprint_is_square_of_side_two_r() {
        let g = GearEntity::new(IVec2::new(2, 3), 2);
        let tiles = g.footprint();
        assert_eq!(tiles.len(), 16);
        assert!(tiles.contains(&IVec2::new(2, 3)));
        assert!(tiles.contains(&IVec2::new(5, 6)));
        assert!(!tiles.contains(&IVec2::new(6, 6)));
        assert_eq!(g.center, IVec2::new(4, 5));
        assert!(tiles.iter().all(|&t| g.covers(t)));
        assert!(!g.covers(IVec2::new(6, 6)));
        assert!(!g.covers(IVec2::new(i32::MIN, 3)));
    }

    #[test]
    fn gear_mass_is_area() {
        assert!((gear_mass(1) - PI).abs() < 1e-12);
        assert!((gear_mass(3) - 9.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn reverse_connection_is_reciprocal() {
        let a = EntityId::gear(IVec2::ZERO);
        let c = Connection::new(ConnectionType::Adjacent, EntityId::gear(IVec2::new(2, 0)), -0.5);
        let r = c.reverse(&a);
        assert_eq!(r.entity_id, a);
        assert_eq!(r.multiplier, -2.0);
        assert_eq!(r.kind, ConnectionType::Adjacent);
    }

    #[test]
    fn set_phase_wraps_per_kind() {
        let mut gear = Entity::Gear(GearEntity::new(IVec2::ZERO, 1));
        gear.set_phase(-PI);
        assert!((gear.phase() - PI).abs() < 1e-12);

        let mut belt = Entity::Belt(BeltEntity::new(IVec2::ZERO, Direction::East));
        belt.set_phase(2.5);
        assert!((belt.phase() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn entity_serializes_with_type_tag() {
        let e = Entity::Gear(GearEntity::new(IVec2::new(0, 0), 1));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "Gear");
        assert_eq!(json["id"], "gear.0.0");
        assert!(json.get("behavior").is_none());
    }
}
