use crate::error::PersistError;
use gearbox_kernel::World;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current world snapshot schema.
pub const WORLD_SCHEMA_VERSION: u32 = 1;

/// A saved world with the metadata needed to trust it on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEnvelope {
    pub schema_version: u32,
    /// SHA-256 hex of the world's compact JSON encoding.
    pub digest: String,
    pub world: World,
}

impl WorldEnvelope {
    pub fn seal(world: &World) -> Result<Self, PersistError> {
        Ok(Self {
            schema_version: WORLD_SCHEMA_VERSION,
            digest: world_digest(world)?,
            world: world.clone(),
        })
    }

    /// Check schema, digest and world structure, in that order.
    pub fn open(self) -> Result<World, PersistError> {
        if self.schema_version != WORLD_SCHEMA_VERSION {
            return Err(PersistError::SchemaMismatch {
                file_version: self.schema_version,
                expected_version: WORLD_SCHEMA_VERSION,
            });
        }
        let actual = world_digest(&self.world)?;
        if actual != self.digest {
            return Err(PersistError::DigestMismatch {
                expected: self.digest,
                actual,
            });
        }
        self.world.validate()?;
        Ok(self.world)
    }
}

pub fn world_digest(world: &World) -> Result<String, PersistError> {
    let bytes = serde_json::to_vec(world)?;
    Ok(sha256_hex(&bytes))
}

pub fn save_world_json(world: &World) -> Result<String, PersistError> {
    let envelope = WorldEnvelope::seal(world)?;
    let json = serde_json::to_string_pretty(&envelope)?;
    tracing::info!(
        entities = world.entity_count(),
        build_version = world.build_version(),
        digest = %envelope.digest,
        "world saved"
    );
    Ok(json)
}

pub fn load_world_json(json: &str) -> Result<World, PersistError> {
    let envelope: WorldEnvelope = serde_json::from_str(json)?;
    let world = envelope.open()?;
    tracing::info!(entities = world.entity_count(), tick = world.tick(), "world loaded");
    Ok(world)
}

/// Load a saved world, falling back to an empty one if anything about the
/// save is off. The reason is logged.
pub fn load_or_default(json: &str) -> World {
    match load_world_json(json) {
        Ok(world) => world,
        Err(err) => {
            tracing::warn!(error = %err, "saved world rejected, starting empty");
            World::default()
        }
    }
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbox_author::{build, get_add_belt_hand, get_build_hand};
    use gearbox_kernel::{ActiveTool, SimConfig, TickInput, tick};
    use glam::IVec2;

    fn busy_world() -> World {
        let cfg = SimConfig::default();
        let mut world = World::new();
        for (pos, r) in [(IVec2::new(0, 0), 1), (IVec2::new(2, -1), 2), (IVec2::new(3, 0), 1)] {
            let hand = get_build_hand(&world, pos, r, None, &cfg).unwrap();
            assert!(hand.valid(), "{pos} r{r}: {:?}", hand.plan.rejection);
            build(&mut world, &hand.plan).unwrap();
        }
        let belt = get_add_belt_hand(&world, IVec2::new(0, -1), IVec2::new(1, -1)).unwrap();
        build(&mut world, &belt.plan).unwrap();
        let input = TickInput {
            tool: Some(ActiveTool::Force {
                gear_id: gearbox_common::EntityId::gear(IVec2::ZERO),
                magnitude: 7.3,
            }),
        };
        for _ in 0..17 {
            tick(&mut world, &input, cfg.tick_period()).unwrap();
        }
        world
    }

    #[test]
    fn save_load_is_exact() {
        let world = busy_world();
        let json = save_world_json(&world).unwrap();
        let loaded = load_world_json(&json).unwrap();
        assert_eq!(loaded, world);
        // A second save of the loaded world is byte identical.
        assert_eq!(save_world_json(&loaded).unwrap(), json);
    }

    #[test]
    fn tampered_world_fails_digest() {
        let world = busy_world();
        let mut envelope = WorldEnvelope::seal(&world).unwrap();
        envelope.world.bump_build_version();
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(matches!(
            load_world_json(&json),
            Err(PersistError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn newer_schema_is_refused() {
        let mut envelope = WorldEnvelope::seal(&World::new()).unwrap();
        envelope.schema_version = WORLD_SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(matches!(
            load_world_json(&json),
            Err(PersistError::SchemaMismatch { file_version: 2, .. })
        ));
    }

    #[test]
    fn structurally_broken_world_is_refused() {
        let world = busy_world();
        let mut value = serde_json::to_value(&world).unwrap();
        let tiles = value["tiles"].as_object_mut().unwrap();
        let first = tiles.keys().next().unwrap().clone();
        tiles.remove(&first);
        let broken: World = serde_json::from_value(value).unwrap();
        let envelope = WorldEnvelope {
            schema_version: WORLD_SCHEMA_VERSION,
            digest: world_digest(&broken).unwrap(),
            world: broken,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(matches!(load_world_json(&json), Err(PersistError::InvalidWorld(_))));
    }

    fn resealed(world: World) -> String {
        let envelope = WorldEnvelope {
            schema_version: WORLD_SCHEMA_VERSION,
            digest: world_digest(&world).unwrap(),
            world,
        };
        serde_json::to_string(&envelope).unwrap()
    }

    #[test]
    fn oversized_gear_resets_instead_of_panicking() {
        let mut world = World::new();
        world
            .insert_gear(gearbox_kernel::GearEntity::new(IVec2::ZERO, 1))
            .unwrap();
        let mut value = serde_json::to_value(&world).unwrap();
        value["entities"]["gear.0.0"]["radius"] = serde_json::json!(40_000);
        let hostile: World = serde_json::from_value(value).unwrap();
        let json = resealed(hostile);

        assert!(matches!(load_world_json(&json), Err(PersistError::InvalidWorld(_))));
        assert_eq!(load_or_default(&json), World::default());
    }

    #[test]
    fn overlapping_gear_posing_as_attached_is_refused() {
        let mut world = World::new();
        world
            .insert_gear(gearbox_kernel::GearEntity::new(IVec2::ZERO, 1))
            .unwrap();
        let mut value = serde_json::to_value(&world).unwrap();
        let mut intruder = value["entities"]["gear.0.0"].clone();
        intruder["id"] = serde_json::json!("gear.1.0");
        intruder["position"] = serde_json::json!([1, 0]);
        intruder["center"] = serde_json::json!([2, 1]);
        value["entities"]["gear.1.0"] = intruder;
        let tiles = &mut value["tiles"];
        for key in ["1.0", "1.1"] {
            tiles[key]["attached_gear_id"] = serde_json::json!("gear.1.0");
        }
        for key in ["2.0", "2.1"] {
            tiles[key] = serde_json::json!({ "type": "Gear", "gear_id": "gear.1.0" });
        }
        let hostile: World = serde_json::from_value(value).unwrap();
        let json = resealed(hostile);

        assert!(matches!(load_world_json(&json), Err(PersistError::InvalidWorld(_))));
        assert_eq!(load_or_default(&json).entity_count(), 0);
    }

    #[test]
    fn garbage_resets_to_empty_world() {
        let world = load_or_default("{ not json");
        assert_eq!(world, World::default());
        let good = save_world_json(&busy_world()).unwrap();
        assert_eq!(load_or_default(&good).entity_count(), 5);
    }
}
