use crate::belt::AddBeltHand;
use crate::build::BuildHand;
use crate::delete::DeleteHand;
use crate::tools::{ApplyForceHand, ApplyFrictionHand, ConfigureHand};
use gearbox_kernel::{ActiveTool, TickInput, World, WorldError};

/// The tool the user is holding and its in-progress state.
#[derive(Debug, Clone, PartialEq)]
pub enum Hand {
    Build(BuildHand),
    AddBelt(AddBeltHand),
    ApplyForce(ApplyForceHand),
    ApplyFriction(ApplyFrictionHand),
    Configure(ConfigureHand),
    Delete(DeleteHand),
}

impl Hand {
    /// The force or friction the hand presses on a gear this tick, if any.
    pub fn active_tool(&self) -> Option<ActiveTool> {
        match self {
            Hand::ApplyForce(h) if h.active => Some(ActiveTool::Force {
                gear_id: h.gear_id.clone()?,
                magnitude: h.magnitude,
            }),
            Hand::ApplyFriction(h) if h.active => Some(ActiveTool::Friction {
                gear_id: h.gear_id.clone()?,
                coefficient: h.coefficient,
                magnitude: h.magnitude,
            }),
            _ => None,
        }
    }
}

/// Advance the world one step with whatever the hand is doing, then keep a
/// build preview turning in step with the gears it would mesh with.
pub fn tick(world: &mut World, hand: Option<&mut Hand>, elapsed: f64) -> Result<(), WorldError> {
    let input = TickInput {
        tool: hand.as_deref().and_then(Hand::active_tool),
    };
    gearbox_kernel::tick(world, &input, elapsed)?;
    if let Some(Hand::Build(build)) = hand {
        build.refresh_preview(world);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build, get_build_hand};
    use crate::tools::update_apply_force;
    use gearbox_common::{EntityId, approx_eq, normalize_angle};
    use gearbox_kernel::SimConfig;
    use glam::IVec2;
    use std::f64::consts::PI;

    fn place(world: &mut World, x: i32, y: i32) -> EntityId {
        let hand = get_build_hand(world, IVec2::new(x, y), 1, None, &SimConfig::default()).unwrap();
        build(world, &hand.plan).unwrap();
        EntityId::gear(IVec2::new(x, y))
    }

    #[test]
    fn idle_hand_presses_nothing() {
        let cfg = SimConfig::default();
        let hand = Hand::ApplyForce(ApplyForceHand::new(&cfg));
        assert_eq!(hand.active_tool(), None);
        assert_eq!(Hand::Configure(ConfigureHand::default()).active_tool(), None);
    }

    #[test]
    fn held_force_hand_drives_the_network() {
        let cfg = SimConfig::default();
        let mut world = World::new();
        let a = place(&mut world, 0, 0);
        let b = place(&mut world, 2, 0);
        let mut force = ApplyForceHand::new(&cfg);
        update_apply_force(&world, &mut force, Some(IVec2::new(1, 1)), true);
        let mut hand = Hand::ApplyForce(force);

        tick(&mut world, Some(&mut hand), 1.0).unwrap();
        assert!(approx_eq(world.gear(&a).unwrap().velocity, 100.0 / PI));
        assert!(approx_eq(world.gear(&b).unwrap().velocity, -100.0 / PI));
    }

    #[test]
    fn build_preview_follows_spinning_neighbor() {
        let cfg = SimConfig::default();
        let mut world = World::new();
        let a = place(&mut world, 0, 0);
        world.gear_mut(&a).unwrap().velocity = 1.0;
        let preview = get_build_hand(&world, IVec2::new(2, 0), 1, None, &cfg).unwrap();
        let mut hand = Hand::Build(preview);

        tick(&mut world, Some(&mut hand), 0.5).unwrap();
        let Hand::Build(preview) = &hand else {
            panic!("hand changed kind");
        };
        assert!(approx_eq(preview.preview_angle, normalize_angle(-0.5)));
    }

    #[test]
    fn tick_without_hand_still_advances() {
        let mut world = World::new();
        tick(&mut world, None, 0.1).unwrap();
        assert_eq!(world.tick(), 1);
    }
}
