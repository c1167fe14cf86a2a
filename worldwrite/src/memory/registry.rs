use std::collections::HashMap;
use std::sync::Arc;

use arcstr::ArcStr;
use parking_lot::RwLock;

use crate::block::BlockState;
use crate::settings::{AIR, BlockKind, BlockKinds};
use crate::wna::{NativeAdapter, NativeBlockState};

#[derive(Debug)]
struct StateInfo {
    state: BlockState,
    kind: BlockKind,
}

/// An interned block state. Two handles are equal only if they came from the same registry entry.
#[derive(Clone)]
pub struct MemoryBlockState(Arc<StateInfo>);

impl MemoryBlockState {
    pub fn state(&self) -> &BlockState {
        &self.0.state
    }

    pub fn kind(&self) -> &BlockKind {
        &self.0.kind
    }
}

impl PartialEq for MemoryBlockState {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemoryBlockState {}

impl std::hash::Hash for MemoryBlockState {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state)
    }
}

impl std::fmt::Debug for MemoryBlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.state)
    }
}

impl NativeBlockState for MemoryBlockState {
    fn is_air(&self) -> bool {
        self.0.kind.air
    }

    fn has_block_entity(&self) -> bool {
        self.0.kind.block_entity.is_some()
    }

    fn is_same_block_type(&self, other: &Self) -> bool {
        self.0.state.name == other.0.state.name
    }
}

/// Every block state the in-memory world has seen, each stored exactly once.
pub struct BlockRegistry {
    kinds: HashMap<ArcStr, BlockKind>,
    states: RwLock<HashMap<BlockState, MemoryBlockState>>,
    air: MemoryBlockState,
}

impl BlockRegistry {
    pub fn new(kinds: &BlockKinds) -> Self {
        let kinds: HashMap<ArcStr, BlockKind> = kinds
            .iter()
            .map(|kind| (kind.name.clone(), kind.clone()))
            .collect();
        let air_state = BlockState::new(AIR);
        let air = MemoryBlockState(Arc::new(StateInfo {
            state: air_state.clone(),
            kind: kinds
                .get(AIR)
                .cloned()
                .unwrap_or_else(|| BlockKind {
                    air: true,
                    ..BlockKind::solid(air_state.name.clone())
                }),
        }));
        let states = HashMap::from([(air_state, air.clone())]);
        Self {
            kinds,
            states: RwLock::new(states),
            air,
        }
    }

    /// Behaviour of the kind called `name`; unknown kinds are plain solid blocks.
    pub fn kind(&self, name: &ArcStr) -> BlockKind {
        self.kinds
            .get(name)
            .cloned()
            .unwrap_or_else(|| BlockKind::solid(name.clone()))
    }

    pub fn get(&self, state: &BlockState) -> MemoryBlockState {
        if let Some(native) = self.states.read().get(state) {
            return native.clone();
        }
        self.states
            .write()
            .entry(state.clone())
            .or_insert_with(|| {
                MemoryBlockState(Arc::new(StateInfo {
                    state: state.clone(),
                    kind: self.kind(&state.name),
                }))
            })
            .clone()
    }

    pub fn air(&self) -> &MemoryBlockState {
        &self.air
    }

    /// Number of distinct states interned so far.
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "BlockRegistry[{} kinds, {} states]",
            self.kinds.len(),
            self.len()
        )
    }
}

#[derive(Clone, Debug)]
pub struct MemoryAdapter {
    registry: Arc<BlockRegistry>,
}

impl MemoryAdapter {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }
}

impl NativeAdapter for MemoryAdapter {
    type State = MemoryBlockState;

    fn to_native(&self, state: &BlockState) -> MemoryBlockState {
        self.registry.get(state)
    }

    fn from_native(&self, state: &MemoryBlockState) -> BlockState {
        state.state().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn adapter() -> MemoryAdapter {
        let settings = Settings::load_default().unwrap();
        MemoryAdapter::new(Arc::new(BlockRegistry::new(&settings.blocks)))
    }

    #[test]
    fn test_interning() {
        let adapter = adapter();
        let a = adapter.to_native(&BlockState::new("minecraft:chest").with_property("facing", "east"));
        let b = adapter.to_native(&BlockState::new("minecraft:chest").with_property("facing", "east"));
        let c = adapter.to_native(&BlockState::new("minecraft:chest").with_property("facing", "west"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_same_block_type(&c));
        assert!(a.has_block_entity());
        assert_eq!(adapter.from_native(&c).get_property("facing"), Some("west"));
        assert_eq!(&adapter.to_native(&BlockState::new(AIR)), adapter.registry().air());
    }

    #[test]
    fn test_kinds() {
        let adapter = adapter();
        assert!(adapter.to_native(&BlockState::new("minecraft:cave_air")).is_air());
        let unknown = adapter.to_native(&BlockState::new("example:mystery"));
        assert!(!unknown.is_air());
        assert!(!unknown.has_block_entity());
        assert_eq!(unknown.kind().light, 0);
        assert_eq!(
            adapter.to_native(&BlockState::new("minecraft:glowstone")).kind().light,
            15
        );
    }
}
