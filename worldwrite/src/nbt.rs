use std::collections::HashMap;

use fastnbt::Value;
use serde::{Deserialize, Serialize};

use crate::coords::BlockPos;

/// Structured payload bound to a block position, e.g. the contents of a container.
///
/// This is an NBT compound; encoding is delegated to `fastnbt` and is opaque to the write
/// pipeline, which only ever stamps a position into it before handing it to the world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachedData(HashMap<String, Value>);

impl AttachedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The block entity type this payload is for, or `""` if it doesn't say.
    pub fn id(&self) -> &str {
        match self.0.get("id") {
            Some(Value::String(id)) => id.as_str(),
            _ => "",
        }
    }

    /// A copy of this payload with the target position written into it, which is what the
    /// world expects to receive. A non-blank `id` is carried over as-is.
    pub fn stamped(&self, pos: BlockPos) -> AttachedData {
        let mut tag = self.clone();
        tag.insert("x", Value::Int(pos.x));
        tag.insert("y", Value::Int(pos.y));
        tag.insert("z", Value::Int(pos.z));
        let id = self.id();
        if !id.trim().is_empty() {
            tag.insert("id", Value::String(id.to_owned()));
        }
        tag
    }

    pub fn to_bytes(&self) -> fastnbt::error::Result<Vec<u8>> {
        fastnbt::to_bytes(self)
    }

    pub fn from_bytes(data: &[u8]) -> fastnbt::error::Result<Self> {
        fastnbt::from_bytes(data)
    }
}

impl From<HashMap<String, Value>> for AttachedData {
    fn from(value: HashMap<String, Value>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_adds_position() {
        let tag = AttachedData::new()
            .with("id", Value::String("minecraft:chest".into()))
            .with("CustomName", Value::String("loot".into()));
        let stamped = tag.stamped(BlockPos::new(-3, 64, 12));
        assert_eq!(stamped.get("x"), Some(&Value::Int(-3)));
        assert_eq!(stamped.get("y"), Some(&Value::Int(64)));
        assert_eq!(stamped.get("z"), Some(&Value::Int(12)));
        assert_eq!(stamped.id(), "minecraft:chest");
        assert_eq!(stamped.get("CustomName"), tag.get("CustomName"));
        // Source tag is untouched
        assert_eq!(tag.get("x"), None);
    }

    #[test]
    fn test_stamped_without_id() {
        let stamped = AttachedData::new().stamped(BlockPos::new(0, 0, 0));
        assert_eq!(stamped.id(), "");
        assert_eq!(stamped.get("id"), None);
        assert_eq!(stamped.len(), 3);
    }

    #[test]
    fn test_codec() {
        let tag = AttachedData::new()
            .with("id", Value::String("minecraft:furnace".into()))
            .with("BurnTime", Value::Short(200));
        let bytes = tag.to_bytes().unwrap();
        assert_eq!(AttachedData::from_bytes(&bytes).unwrap(), tag);
    }
}
