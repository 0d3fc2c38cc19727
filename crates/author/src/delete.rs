use crate::error::BuildError;
use gearbox_common::EntityId;
use gearbox_kernel::{Tile, World};
use glam::IVec2;

/// Deletion target under the pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteHand {
    pub position: IVec2,
    pub entity_id: Option<EntityId>,
    pub build_version: u64,
}

impl DeleteHand {
    pub fn valid(&self) -> bool {
        self.entity_id.is_some()
    }
}

/// Pick what deleting at `position` would remove. An attached gear sits on
/// top of its base and is picked first.
pub fn get_delete_hand(world: &World, position: IVec2) -> DeleteHand {
    let entity_id = match world.tile(position) {
        Some(Tile::Gear {
            attached_gear_id: Some(attached),
            ..
        }) => Some(attached.clone()),
        Some(Tile::Gear { gear_id, .. }) => Some(gear_id.clone()),
        Some(Tile::Belt { belt_id }) => Some(belt_id.clone()),
        None => None,
    };
    DeleteHand {
        position,
        entity_id,
        build_version: world.build_version(),
    }
}

/// Remove the hand's target. A base gear takes its attached gear with it.
///
/// Surviving entities keep their velocities; removing a link never injects
/// or redistributes energy.
pub fn execute_delete(world: &mut World, hand: &DeleteHand) -> Result<Vec<EntityId>, BuildError> {
    let Some(target) = &hand.entity_id else {
        return Err(BuildError::InvalidHand);
    };
    if hand.build_version != world.build_version() {
        return Err(BuildError::StaleHand {
            planned: hand.build_version,
            current: world.build_version(),
        });
    }

    let footprint = world
        .get(target)
        .map(|e| e.footprint())
        .unwrap_or_default();
    let attached = footprint.iter().find_map(|&pos| match world.tile(pos) {
        Some(Tile::Gear {
            gear_id,
            attached_gear_id: Some(attached),
        }) if gear_id == target => Some(attached.clone()),
        _ => None,
    });

    let mut removed = Vec::new();
    if let Some(attached) = attached {
        world.remove(&attached)?;
        removed.push(attached);
    }
    world.remove(target)?;
    removed.push(target.clone());
    world.bump_build_version();
    tracing::info!(
        removed = ?removed,
        build_version = world.build_version(),
        "entities deleted"
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belt::get_add_belt_hand;
    use crate::build::{build, get_build_hand};
    use gearbox_kernel::SimConfig;

    fn place(world: &mut World, x: i32, y: i32, radius: i32) -> EntityId {
        let hand = get_build_hand(world, IVec2::new(x, y), radius, None, &SimConfig::default()).unwrap();
        build(world, &hand.plan).unwrap();
        EntityId::gear(IVec2::new(x, y))
    }

    #[test]
    fn empty_tile_has_nothing_to_delete() {
        let mut world = World::new();
        let hand = get_delete_hand(&world, IVec2::new(3, 3));
        assert!(!hand.valid());
        assert!(matches!(execute_delete(&mut world, &hand), Err(BuildError::InvalidHand)));
    }

    #[test]
    fn delete_severs_neighbors_and_keeps_their_speed() {
        let mut world = World::new();
        let a = place(&mut world, 0, 0, 1);
        let b = place(&mut world, 2, 0, 1);
        world.gear_mut(&a).unwrap().velocity = 2.0;
        world.gear_mut(&b).unwrap().velocity = -2.0;

        let hand = get_delete_hand(&world, IVec2::new(3, 1));
        assert_eq!(hand.entity_id, Some(b.clone()));
        let removed = execute_delete(&mut world, &hand).unwrap();
        assert_eq!(removed, vec![b]);

        let a = world.gear(&a).unwrap();
        assert!(a.connections.is_empty());
        assert_eq!(a.velocity, 2.0);
        assert_eq!(world.tiles().len(), 4);
        world.validate().unwrap();
    }

    #[test]
    fn attached_gear_is_picked_before_base() {
        let mut world = World::new();
        let base = place(&mut world, 0, 0, 2);
        let small = place(&mut world, 1, 1, 1);
        assert_eq!(get_delete_hand(&world, IVec2::new(1, 1)).entity_id, Some(small));
        assert_eq!(get_delete_hand(&world, IVec2::new(0, 0)).entity_id, Some(base));
    }

    #[test]
    fn deleting_base_cascades_to_attached() {
        let mut world = World::new();
        let base = place(&mut world, 0, 0, 2);
        let small = place(&mut world, 1, 1, 1);
        let hand = get_delete_hand(&world, IVec2::new(0, 0));
        let removed = execute_delete(&mut world, &hand).unwrap();
        assert_eq!(removed, vec![small, base]);
        assert_eq!(world.entity_count(), 0);
        assert!(world.tiles().is_empty());
    }

    #[test]
    fn deleting_belt_frees_its_tile() {
        let mut world = World::new();
        let plan = get_add_belt_hand(&world, IVec2::ZERO, IVec2::new(2, 0)).unwrap().plan;
        build(&mut world, &plan).unwrap();
        let hand = get_delete_hand(&world, IVec2::new(1, 0));
        execute_delete(&mut world, &hand).unwrap();
        assert!(world.tile(IVec2::new(1, 0)).is_none());
        assert_eq!(world.entity_count(), 2);
        world.validate().unwrap();
    }

    #[test]
    fn stale_delete_is_refused() {
        let mut world = World::new();
        place(&mut world, 0, 0, 1);
        let hand = get_delete_hand(&world, IVec2::ZERO);
        place(&mut world, 5, 5, 1);
        assert!(matches!(execute_delete(&mut world, &hand), Err(BuildError::StaleHand { .. })));
        assert_eq!(world.entity_count(), 2);
    }
}
