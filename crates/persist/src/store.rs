//! File-backed world persistence.
//!
//! Layout inside the store directory:
//! ```text
//! store.meta.json   - schema version and save counter
//! world.json        - latest world envelope
//! ```
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-save leaves the previous world intact.

use crate::error::PersistError;
use crate::snapshot::{WORLD_SCHEMA_VERSION, load_world_json, save_world_json, sha256_hex};
use gearbox_kernel::World;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const META_FILE: &str = "store.meta.json";
const WORLD_FILE: &str = "world.json";

/// Metadata stored in `store.meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub world_schema_version: u32,
    pub save_count: u64,
    /// SHA-256 of the last `world.json` written.
    pub world_file_sha256: Option<String>,
}

/// A directory holding one saved world.
pub struct WorldStore {
    root: PathBuf,
    meta: StoreMeta,
}

impl WorldStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let meta_path = root.join(META_FILE);

        let meta = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.world_schema_version != WORLD_SCHEMA_VERSION {
                return Err(PersistError::SchemaMismatch {
                    file_version: meta.world_schema_version,
                    expected_version: WORLD_SCHEMA_VERSION,
                });
            }
            meta
        } else {
            let meta = StoreMeta {
                world_schema_version: WORLD_SCHEMA_VERSION,
                save_count: 0,
                world_file_sha256: None,
            };
            write_atomic(&meta_path, serde_json::to_string_pretty(&meta)?.as_bytes())?;
            meta
        };
        Ok(Self { root, meta })
    }

    pub fn save(&mut self, world: &World) -> Result<(), PersistError> {
        let json = save_world_json(world)?;
        write_atomic(&self.world_path(), json.as_bytes())?;
        self.meta.save_count += 1;
        self.meta.world_file_sha256 = Some(sha256_hex(json.as_bytes()));
        self.save_meta()
    }

    pub fn load(&self) -> Result<World, PersistError> {
        let path = self.world_path();
        if !path.exists() {
            return Err(PersistError::NoWorld);
        }
        let json = std::fs::read_to_string(path)?;
        self.verify_file(json.as_bytes())?;
        load_world_json(&json)
    }

    /// Check `world.json` against the hash recorded when it was written.
    pub fn verify_integrity(&self) -> Result<(), PersistError> {
        let data = std::fs::read(self.world_path())?;
        self.verify_file(&data)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    fn world_path(&self) -> PathBuf {
        self.root.join(WORLD_FILE)
    }

    fn verify_file(&self, data: &[u8]) -> Result<(), PersistError> {
        let Some(expected) = &self.meta.world_file_sha256 else {
            // Written by hand or by another tool; the envelope digest still applies.
            return Ok(());
        };
        let actual = sha256_hex(data);
        if &actual != expected {
            return Err(PersistError::DigestMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&self.meta)?;
        write_atomic(&self.root.join(META_FILE), json.as_bytes())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PersistError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
