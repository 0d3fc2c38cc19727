use glam::IVec2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for an entity in the world.
///
/// Ids are derived from the entity kind and its top-left tile, so two
/// entities can only share an id if they occupy the same footprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn gear(position: IVec2) -> Self {
        Self(format!("gear.{}.{}", position.x, position.y))
    }

    pub fn belt(position: IVec2) -> Self {
        Self(format!("belt.{}.{}", position.x, position.y))
    }

    pub fn belt_intersection(position: IVec2) -> Self {
        Self(format!("belt-intersection.{}.{}", position.x, position.y))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer tile coordinate used as the key of the tile map.
///
/// Serializes as `"x.y"` so a tile map is a plain JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub x: i32,
    pub y: i32,
}

impl TileKey {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn position(self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }
}

impl From<IVec2> for TileKey {
    fn from(v: IVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed tile key {0:?}, expected \"x.y\"")]
pub struct ParseTileKeyError(pub String);

impl FromStr for TileKey {
    type Err = ParseTileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTileKeyError(s.to_string());
        let (x, y) = s.split_once('.').ok_or_else(err)?;
        let x = x.parse().map_err(|_| err())?;
        let y = y.parse().map_err(|_| err())?;
        Ok(Self { x, y })
    }
}

impl Serialize for TileKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TileKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
