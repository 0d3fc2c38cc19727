//! Force, friction and configure tools.
//!
//! Force and friction hands only track which gear is under the pointer and
//! whether the button is held; the kernel applies them during a tick via
//! [`gearbox_kernel::ActiveTool`].

use crate::error::BuildError;
use gearbox_common::EntityId;
use gearbox_kernel::{Behavior, SimConfig, Tile, World};
use glam::IVec2;

/// The gear a pointer at `position` acts on. Attached gears sit on top.
pub fn gear_at(world: &World, position: IVec2) -> Option<EntityId> {
    match world.tile(position)? {
        Tile::Gear {
            attached_gear_id: Some(attached),
            ..
        } => Some(attached.clone()),
        Tile::Gear { gear_id, .. } => Some(gear_id.clone()),
        Tile::Belt { .. } => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyForceHand {
    pub gear_id: Option<EntityId>,
    pub magnitude: f64,
    pub active: bool,
}

impl ApplyForceHand {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            gear_id: None,
            magnitude: config.force_magnitude,
            active: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFrictionHand {
    pub gear_id: Option<EntityId>,
    pub coefficient: f64,
    pub magnitude: f64,
    pub active: bool,
}

impl ApplyFrictionHand {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            gear_id: None,
            coefficient: config.friction_coefficient,
            magnitude: config.friction_magnitude,
            active: false,
        }
    }
}

/// Retarget the force hand. A `None` position keeps the current target,
/// so a held button keeps pushing while the pointer is off the grid.
pub fn update_apply_force(world: &World, hand: &mut ApplyForceHand, position: Option<IVec2>, active: bool) {
    if let Some(pos) = position {
        hand.gear_id = gear_at(world, pos);
    }
    hand.active = active && hand.gear_id.is_some();
}

pub fn update_apply_friction(
    world: &World,
    hand: &mut ApplyFrictionHand,
    position: Option<IVec2>,
    active: bool,
) {
    if let Some(pos) = position {
        hand.gear_id = gear_at(world, pos);
    }
    hand.active = active && hand.gear_id.is_some();
}

/// Standing behavior editor for one gear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigureHand {
    pub gear_id: Option<EntityId>,
    /// `None` clears the gear's behavior.
    pub behavior: Option<Behavior>,
}

/// Point the configure hand at a gear and load its current behavior.
pub fn update_configure(world: &World, hand: &mut ConfigureHand, position: IVec2) {
    hand.gear_id = gear_at(world, position);
    hand.behavior = hand
        .gear_id
        .as_ref()
        .and_then(|id| world.gear(id).ok())
        .and_then(|g| g.behavior);
}

pub fn execute_configure(world: &mut World, hand: &ConfigureHand) -> Result<(), BuildError> {
    let Some(id) = &hand.gear_id else {
        return Err(BuildError::InvalidHand);
    };
    world.gear_mut(id)?.behavior = hand.behavior;
    tracing::info!(gear = %id, behavior = ?hand.behavior, "gear behavior configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbox_kernel::{BeltEntity, Connection, ConnectionType, Entity, GearEntity};
    use gearbox_common::Direction;

    fn world_with_attach() -> (World, EntityId, EntityId) {
        let mut world = World::new();
        let base = GearEntity::new(IVec2::ZERO, 2);
        let base_id = base.id.clone();
        world.insert_gear(base).unwrap();
        let mut small = GearEntity::new(IVec2::ONE, 1);
        let small_id = small.id.clone();
        small
            .connections
            .push(Connection::new(ConnectionType::Attach, base_id.clone(), 1.0));
        world.insert_gear(small).unwrap();
        world
            .replace_connections(
                &base_id,
                vec![Connection::new(ConnectionType::Attach, small_id.clone(), 1.0)],
            )
            .unwrap();
        (world, base_id, small_id)
    }

    #[test]
    fn pointer_prefers_attached_gear() {
        let (mut world, base, small) = world_with_attach();
        assert_eq!(gear_at(&world, IVec2::new(2, 2)), Some(small));
        assert_eq!(gear_at(&world, IVec2::new(3, 0)), Some(base));
        world
            .insert_belt(Entity::Belt(BeltEntity::new(IVec2::new(9, 0), Direction::East)))
            .unwrap();
        assert_eq!(gear_at(&world, IVec2::new(9, 0)), None);
        assert_eq!(gear_at(&world, IVec2::new(20, 0)), None);
    }

    #[test]
    fn force_hand_holds_target_off_grid() {
        let (world, base, _) = world_with_attach();
        let mut hand = ApplyForceHand::new(&SimConfig::default());
        assert_eq!(hand.magnitude, 100.0);
        update_apply_force(&world, &mut hand, Some(IVec2::new(0, 0)), true);
        assert!(hand.active);
        update_apply_force(&world, &mut hand, None, true);
        assert_eq!(hand.gear_id, Some(base));
        update_apply_force(&world, &mut hand, Some(IVec2::new(50, 50)), true);
        assert!(!hand.active);
    }

    #[test]
    fn friction_hand_releases() {
        let (world, _, small) = world_with_attach();
        let mut hand = ApplyFrictionHand::new(&SimConfig::default());
        update_apply_friction(&world, &mut hand, Some(IVec2::new(1, 2)), true);
        assert_eq!(hand.gear_id, Some(small));
        assert!(hand.active);
        update_apply_friction(&world, &mut hand, None, false);
        assert!(!hand.active);
    }

    #[test]
    fn configure_sets_and_clears_behavior() {
        let (mut world, base, _) = world_with_attach();
        let mut hand = ConfigureHand::default();
        update_configure(&world, &mut hand, IVec2::new(0, 3));
        assert_eq!(hand.gear_id, Some(base.clone()));
        assert_eq!(hand.behavior, None);

        hand.behavior = Some(Behavior::Force { magnitude: 5.0 });
        execute_configure(&mut world, &hand).unwrap();
        assert_eq!(world.gear(&base).unwrap().behavior, Some(Behavior::Force { magnitude: 5.0 }));

        update_configure(&world, &mut hand, IVec2::new(0, 3));
        assert_eq!(hand.behavior, Some(Behavior::Force { magnitude: 5.0 }));
        hand.behavior = None;
        execute_configure(&mut world, &hand).unwrap();
        assert_eq!(world.gear(&base).unwrap().behavior, None);
    }

    #[test]
    fn configure_without_target_is_invalid() {
        let mut world = World::new();
        assert!(matches!(
            execute_configure(&mut world, &ConfigureHand::default()),
            Err(BuildError::InvalidHand)
        ));
    }
}
