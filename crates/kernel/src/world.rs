use crate::entity::{
    BELT_MASS, Connection, ConnectionType, Entity, GearEntity, MAX_GEAR_RADIUS, gear_mass,
};
use crate::error::WorldError;
use gearbox_common::{EntityId, TileKey, approx_eq};
use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What occupies a tile.
///
/// A gear tile may additionally carry one smaller gear attached concentric
/// to the primary one. Belt tiles hold exactly one belt or intersection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Tile {
    Gear {
        gear_id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attached_gear_id: Option<EntityId>,
    },
    Belt {
        belt_id: EntityId,
    },
}

impl Tile {
    /// Every entity id on this tile, primary first.
    pub fn ids(&self) -> Vec<&EntityId> {
        match self {
            Tile::Gear {
                gear_id,
                attached_gear_id,
            } => std::iter::once(gear_id)
                .chain(attached_gear_id.as_ref())
                .collect(),
            Tile::Belt { belt_id } => vec![belt_id],
        }
    }
}

/// The authoritative gear world.
///
/// The tile map is derived from the entity map and kept in lockstep with it
/// by the insertion and removal operations below. Both use BTreeMap so
/// iteration and serialization order are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    tiles: BTreeMap<TileKey, Tile>,
    /// Bumped on every topology change.
    build_version: u64,
    tick: u64,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    pub fn tiles(&self) -> &BTreeMap<TileKey, Tile> {
        &self.tiles
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Monotonic counter of topology mutations.
    pub fn build_version(&self) -> u64 {
        self.build_version
    }

    /// Number of ticks integrated so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn bump_build_version(&mut self) {
        self.build_version += 1;
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn gear(&self, id: &EntityId) -> Result<&GearEntity, WorldError> {
        self.entities
            .get(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?
            .as_gear()
            .ok_or_else(|| WorldError::NotAGear(id.clone()))
    }

    pub fn gear_mut(&mut self, id: &EntityId) -> Result<&mut GearEntity, WorldError> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?
            .as_gear_mut()
            .ok_or_else(|| WorldError::NotAGear(id.clone()))
    }

    pub fn tile(&self, position: IVec2) -> Option<&Tile> {
        self.tiles.get(&TileKey::from(position))
    }

    /// Entity ids on a tile, primary first. Empty if the tile is free.
    pub fn occupants(&self, position: IVec2) -> Vec<EntityId> {
        self.tile(position)
            .map(|t| t.ids().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Insert a gear and claim its footprint.
    ///
    /// A gear carrying an `Attach` connection to a larger concentric gear is
    /// layered onto that gear's tiles and must find it as the sole occupant.
    /// Any other gear must find every footprint tile free.
    pub fn insert_gear(&mut self, gear: GearEntity) -> Result<(), WorldError> {
        if self.entities.contains_key(&gear.id) {
            return Err(WorldError::DuplicateEntity(gear.id));
        }
        let base = self.attach_base(&gear)?;
        let tiles = gear.footprint();

        // Check everything before claiming anything.
        for &pos in &tiles {
            let key = TileKey::from(pos);
            match (&base, self.tiles.get(&key)) {
                (None, None) => {}
                (None, Some(tile)) => {
                    return Err(WorldError::TileOccupied {
                        tile: key,
                        occupant: tile.ids()[0].clone(),
                    });
                }
                (
                    Some(base_id),
                    Some(Tile::Gear {
                        gear_id,
                        attached_gear_id: None,
                    }),
                ) if gear_id == base_id => {}
                (Some(base_id), _) => {
                    return Err(WorldError::TileMismatch {
                        tile: key,
                        expected: base_id.clone(),
                    });
                }
            }
        }

        for pos in tiles {
            let key = TileKey::from(pos);
            match &base {
                None => {
                    self.tiles.insert(
                        key,
                        Tile::Gear {
                            gear_id: gear.id.clone(),
                            attached_gear_id: None,
                        },
                    );
                }
                Some(_) => {
                    if let Some(Tile::Gear {
                        attached_gear_id, ..
                    }) = self.tiles.get_mut(&key)
                    {
                        *attached_gear_id = Some(gear.id.clone());
                    }
                }
            }
        }
        self.entities.insert(gear.id.clone(), Entity::Gear(gear));
        Ok(())
    }

    /// Insert a belt or belt intersection and claim its tile.
    pub fn insert_belt(&mut self, entity: Entity) -> Result<(), WorldError> {
        let id = entity.id().clone();
        if let Entity::Gear(_) = entity {
            return Err(WorldError::ShapeMismatch { id });
        }
        if self.entities.contains_key(&id) {
            return Err(WorldError::DuplicateEntity(id));
        }
        let key = TileKey::from(entity.position());
        if let Some(tile) = self.tiles.get(&key) {
            return Err(WorldError::TileOccupied {
                tile: key,
                occupant: tile.ids()[0].clone(),
            });
        }
        self.tiles.insert(key, Tile::Belt { belt_id: id.clone() });
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Replace the connection list of an existing entity.
    pub fn replace_connections(
        &mut self,
        id: &EntityId,
        connections: Vec<Connection>,
    ) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        *entity.connections_mut() = connections;
        Ok(())
    }

    /// Remove an entity, severing every inbound connection and freeing its
    /// tiles first. A gear that still has a gear attached to it cannot be
    /// removed; remove the attached gear first.
    pub fn remove(&mut self, id: &EntityId) -> Result<Entity, WorldError> {
        let entity = self
            .entities
            .get(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        let neighbors: Vec<EntityId> = entity
            .connections()
            .iter()
            .map(|c| c.entity_id.clone())
            .collect();
        let footprint = entity.footprint();

        for pos in &footprint {
            let key = TileKey::from(*pos);
            match self.tiles.get(&key) {
                Some(Tile::Gear {
                    gear_id,
                    attached_gear_id: None,
                })
                | Some(Tile::Gear {
                    attached_gear_id: Some(gear_id),
                    ..
                })
                | Some(Tile::Belt { belt_id: gear_id })
                    if gear_id == id => {}
                _ => {
                    return Err(WorldError::TileMismatch {
                        tile: key,
                        expected: id.clone(),
                    });
                }
            }
        }

        for neighbor in neighbors {
            if let Some(other) = self.entities.get_mut(&neighbor) {
                other.connections_mut().retain(|c| &c.entity_id != id);
            }
        }

        for pos in footprint {
            let key = TileKey::from(pos);
            let free = match self.tiles.get_mut(&key) {
                Some(Tile::Gear {
                    attached_gear_id, ..
                }) if attached_gear_id.as_ref() == Some(id) => {
                    *attached_gear_id = None;
                    false
                }
                _ => true,
            };
            if free {
                self.tiles.remove(&key);
            }
        }

        self.entities
            .remove(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))
    }

    /// Check an entity's connections: every target exists, stores the
    /// reciprocal edge, and satisfies the shape rule of the connection type.
    pub fn check_connections(&self, id: &EntityId) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        for conn in entity.connections() {
            let other = self
                .entities
                .get(&conn.entity_id)
                .ok_or_else(|| WorldError::MissingEntity(conn.entity_id.clone()))?;
            let reciprocal = other.connections().iter().any(|back| {
                &back.entity_id == id
                    && back.kind == conn.kind
                    && approx_eq(back.multiplier * conn.multiplier, 1.0)
            });
            if !reciprocal {
                return Err(WorldError::AsymmetricConnection {
                    from: id.clone(),
                    to: conn.entity_id.clone(),
                });
            }
            let shape_ok = match (conn.kind, entity, other) {
                (ConnectionType::Chain, Entity::Gear(a), Entity::Gear(b)) => {
                    a.radius == 1 && b.radius == 1
                }
                (ConnectionType::Attach, Entity::Gear(a), Entity::Gear(b)) => {
                    a.center == b.center && a.radius != b.radius
                }
                (ConnectionType::Chain | ConnectionType::Attach, _, _) => false,
                (ConnectionType::Belt, Entity::Gear(_), _)
                | (ConnectionType::Belt, _, Entity::Gear(_)) => false,
                _ => true,
            };
            if !shape_ok {
                return Err(WorldError::MismatchedConnectionRadius {
                    from: id.clone(),
                    to: conn.entity_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Full structural check of the world, used when loading a snapshot.
    ///
    /// Every entity's shape is checked before any footprint is walked.
    pub fn validate(&self) -> Result<(), WorldError> {
        for (id, entity) in &self.entities {
            if !well_formed(id, entity) {
                return Err(WorldError::ShapeMismatch { id: id.clone() });
            }
        }
        for (id, entity) in &self.entities {
            for pos in entity.footprint() {
                let key = TileKey::from(pos);
                let claimed = match (entity, self.tiles.get(&key)) {
                    (Entity::Gear(_), Some(tile @ Tile::Gear { .. })) => tile.ids().contains(&id),
                    (Entity::Belt(_) | Entity::BeltIntersection(_), Some(Tile::Belt { belt_id })) => {
                        belt_id == id
                    }
                    _ => false,
                };
                if !claimed {
                    return Err(WorldError::TileMismatch {
                        tile: key,
                        expected: id.clone(),
                    });
                }
            }
            self.check_connections(id)?;
        }
        for (key, tile) in &self.tiles {
            for id in tile.ids() {
                let covers = self
                    .entities
                    .get(id)
                    .is_some_and(|e| e.covers(key.position()));
                if !covers {
                    return Err(WorldError::TileMismatch {
                        tile: *key,
                        expected: id.clone(),
                    });
                }
            }
            if let Tile::Gear {
                gear_id,
                attached_gear_id: Some(attached),
            } = tile
            {
                if !self.is_attached(attached, gear_id) {
                    return Err(WorldError::TileMismatch {
                        tile: *key,
                        expected: gear_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// `small` sits concentric on the larger `base` and both store the
    /// `Attach` edge.
    fn is_attached(&self, small: &EntityId, base: &EntityId) -> bool {
        let (Ok(s), Ok(b)) = (self.gear(small), self.gear(base)) else {
            return false;
        };
        let attach = |from: &GearEntity, to: &EntityId| {
            from.connections
                .iter()
                .any(|c| c.kind == ConnectionType::Attach && &c.entity_id == to)
        };
        s.center == b.center && s.radius < b.radius && attach(s, base) && attach(b, small)
    }

    /// The gear this one attaches to, if it carries an `Attach` connection
    /// to a larger gear.
    fn attach_base(&self, gear: &GearEntity) -> Result<Option<EntityId>, WorldError> {
        for conn in &gear.connections {
            if conn.kind != ConnectionType::Attach {
                continue;
            }
            let Some(Entity::Gear(other)) = self.entities.get(&conn.entity_id) else {
                return Err(WorldError::MissingEntity(conn.entity_id.clone()));
            };
            if other.center != gear.center {
                return Err(WorldError::MismatchedConnectionRadius {
                    from: gear.id.clone(),
                    to: other.id.clone(),
                });
            }
            if other.radius > gear.radius {
                return Ok(Some(other.id.clone()));
            }
        }
        Ok(None)
    }
}

/// Id, extent and mass agree with the entity's shape. Radii outside
/// `1..=MAX_GEAR_RADIUS` and footprints past the edge of the grid are
/// rejected.
fn well_formed(id: &EntityId, entity: &Entity) -> bool {
    if entity.id() != id {
        return false;
    }
    match entity {
        Entity::Gear(g) => {
            (1..=MAX_GEAR_RADIUS).contains(&g.radius)
                && g.position.x.checked_add(2 * g.radius).is_some()
                && g.position.y.checked_add(2 * g.radius).is_some()
                && *id == EntityId::gear(g.position)
                && g.center == g.position + IVec2::splat(g.radius)
                && approx_eq(g.mass, gear_mass(g.radius))
        }
        Entity::Belt(b) => *id == EntityId::belt(b.position) && approx_eq(b.mass, BELT_MASS),
        Entity::BeltIntersection(b) => {
            *id == EntityId::belt_intersection(b.position) && approx_eq(b.mass, BELT_MASS)
        }
    }
}
