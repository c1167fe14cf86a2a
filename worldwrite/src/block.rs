use arcstr::ArcStr;

use crate::nbt::AttachedData;
use crate::proplist::PropList;
use crate::util::intern_str;

/// Host-independent description of a block: a kind name and its property assignment.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BlockState {
    pub name: ArcStr,
    pub properties: PropList,
}

impl BlockState {
    pub fn new<S: AsRef<str>>(name: S) -> BlockState {
        BlockState {
            name: intern_str(name),
            properties: PropList::new(),
        }
    }

    /// Get the name of the block without any namespace prefix, e.g. `chest` instead of
    /// `minecraft:chest`.
    pub fn short_name(&self) -> &str {
        let name = self.name.as_str();
        if let Some((_left, right)) = name.split_once(':') {
            right
        } else {
            name
        }
    }

    pub fn with_property<K: AsRef<str>, V: AsRef<str>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.as_ref(), value.as_ref());
        self
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }
}

impl std::fmt::Display for BlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if !self.properties.is_empty() {
            write!(f, "[{}]", self.properties)?;
        }
        Ok(())
    }
}

/// A block state plus the attached data that should end up in its block entity.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseBlock {
    pub state: BlockState,
    pub nbt: Option<AttachedData>,
}

impl BaseBlock {
    pub fn new(state: BlockState, nbt: Option<AttachedData>) -> Self {
        Self { state, nbt }
    }
}

impl From<BlockState> for BaseBlock {
    fn from(state: BlockState) -> Self {
        Self { state, nbt: None }
    }
}

impl std::fmt::Display for BaseBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(nbt) = &self.nbt {
            write!(f, " +{} tags", nbt.len())?;
        }
        Ok(())
    }
}

/// Anything that can be written at a position: a bare state, or a state with attached data.
pub trait BlockStateHolder {
    fn block_state(&self) -> &BlockState;

    fn attached_data(&self) -> Option<&AttachedData> {
        None
    }
}

impl BlockStateHolder for BlockState {
    fn block_state(&self) -> &BlockState {
        self
    }
}

impl BlockStateHolder for BaseBlock {
    fn block_state(&self) -> &BlockState {
        &self.state
    }

    fn attached_data(&self) -> Option<&AttachedData> {
        self.nbt.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastnbt::Value;

    #[test]
    fn test_block_state_display() {
        let fence = BlockState::new("minecraft:oak_fence")
            .with_property("north", "true")
            .with_property("east", "false");
        assert_eq!(fence.short_name(), "oak_fence");
        assert_eq!(fence.get_property("north"), Some("true"));
        assert_eq!(
            format!("{fence}"),
            "minecraft:oak_fence[east=false,north=true]"
        );
        assert_eq!(format!("{}", BlockState::new("stone")), "stone");
    }

    #[test]
    fn test_holder() {
        let chest = BlockState::new("minecraft:chest");
        assert!(chest.attached_data().is_none());

        let block = BaseBlock::new(
            chest.clone(),
            Some(AttachedData::new().with("id", Value::String("minecraft:chest".into()))),
        );
        assert_eq!(block.block_state(), &chest);
        assert_eq!(block.attached_data().map(|nbt| nbt.id()), Some("minecraft:chest"));
        assert!(block.attached_data().is_some());
        assert!(BaseBlock::from(chest).attached_data().is_none());
    }
}
