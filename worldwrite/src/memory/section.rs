use bitfields::bitfield;

use crate::coords::{BIndex, SECTION_BLOCK_COUNT};
use crate::memory::MemoryBlockState;
use crate::wna::{NativeBlockState, NativeChunkSection};

#[bitfield(u32)]
#[derive(Clone, Copy)]
struct BlockData {
    state_index: u16,
    #[bits(4)]
    block_light: u8,
    #[bits(12)]
    _reserved: u16,
}

/// A section as a palette of interned states plus one packed cell per block.
#[derive(Clone)]
pub struct MemorySection {
    palette: Vec<MemoryBlockState>,
    block_data: Box<[BlockData; SECTION_BLOCK_COUNT]>,
    non_air: usize,
}

impl MemorySection {
    /// A section filled with `air`.
    pub fn empty(air: MemoryBlockState) -> Self {
        assert!(air.is_air(), "{:?} is not air", air);
        Self {
            palette: vec![air],
            block_data: Box::new([BlockData::new(); SECTION_BLOCK_COUNT]),
            non_air: 0,
        }
    }

    pub fn non_air_count(&self) -> usize {
        self.non_air
    }

    pub fn block_light(&self, index: BIndex) -> u8 {
        self.block_data[index.to_flat_index()].block_light()
    }

    pub fn set_block_light(&mut self, index: BIndex, level: u8) {
        debug_assert!(level <= 15);
        self.block_data[index.to_flat_index()].set_block_light(level);
    }

    /// Whether both sections hold the same state at every position, ignoring palette layout
    /// and lighting.
    pub fn same_blocks(&self, other: &MemorySection) -> bool {
        (0..SECTION_BLOCK_COUNT)
            .map(BIndex::from_flat_index)
            .all(|index| self.block(index) == other.block(index))
    }

    fn palette_index(&mut self, state: &MemoryBlockState) -> u16 {
        if let Some(i) = self.palette.iter().position(|s| s == state) {
            return i as u16;
        }
        if self.palette.len() >= SECTION_BLOCK_COUNT {
            self.compact();
        }
        self.palette.push(state.clone());
        (self.palette.len() - 1) as u16
    }

    /// Drop palette entries no block refers to any more.
    fn compact(&mut self) {
        let mut remap = vec![None; self.palette.len()];
        let mut palette = Vec::with_capacity(self.palette.len());
        for data in self.block_data.iter_mut() {
            let old = data.state_index() as usize;
            let new = *remap[old].get_or_insert_with(|| {
                palette.push(self.palette[old].clone());
                (palette.len() - 1) as u16
            });
            data.set_state_index(new);
        }
        log::trace!(
            "compacted section palette {} -> {}",
            self.palette.len(),
            palette.len()
        );
        self.palette = palette;
    }
}

impl NativeChunkSection for MemorySection {
    type State = MemoryBlockState;

    fn block(&self, index: BIndex) -> MemoryBlockState {
        let data = self.block_data[index.to_flat_index()];
        self.palette[data.state_index() as usize].clone()
    }

    fn get_then_set_block(&mut self, index: BIndex, state: MemoryBlockState) -> MemoryBlockState {
        let old = self.block(index);
        if old == state {
            return old;
        }
        let state_index = self.palette_index(&state);
        self.block_data[index.to_flat_index()].set_state_index(state_index);
        match (old.is_air(), state.is_air()) {
            (true, false) => self.non_air += 1,
            (false, true) => self.non_air -= 1,
            _ => {}
        }
        old
    }

    fn is_only_air(&self) -> bool {
        self.non_air == 0
    }
}

impl std::fmt::Debug for MemorySection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "MemorySection[{} palette entries, {} non-air]",
            self.palette.len(),
            self.non_air
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockState;
    use crate::memory::BlockRegistry;
    use crate::settings::Settings;

    fn registry() -> BlockRegistry {
        BlockRegistry::new(&Settings::load_default().unwrap().blocks)
    }

    #[test]
    fn test_get_then_set() {
        let registry = registry();
        let stone = registry.get(&BlockState::new("minecraft:stone"));
        let mut section = MemorySection::empty(registry.air().clone());
        assert!(section.is_only_air());

        let index = BIndex::new(1, 2, 3);
        assert_eq!(&section.get_then_set_block(index, stone.clone()), registry.air());
        assert_eq!(section.block(index), stone);
        assert!(!section.is_only_air());
        assert_eq!(section.non_air_count(), 1);

        // Rewriting the same state keeps the count
        assert_eq!(section.get_then_set_block(index, stone.clone()), stone);
        assert_eq!(section.non_air_count(), 1);

        section.get_then_set_block(index, registry.air().clone());
        assert!(section.is_only_air());
    }

    #[test]
    fn test_copy_is_independent() {
        let registry = registry();
        let stone = registry.get(&BlockState::new("minecraft:stone"));
        let original = MemorySection::empty(registry.air().clone());
        let mut copy = original.copy();
        copy.get_then_set_block(BIndex::new(0, 0, 0), stone);
        assert!(original.is_only_air());
        assert!(!copy.is_only_air());
        assert!(!original.same_blocks(&copy));
    }

    #[test]
    fn test_palette_compaction() {
        let registry = registry();
        let mut section = MemorySection::empty(registry.air().clone());
        let index = BIndex::new(5, 5, 5);
        // Cycle one position through more states than a section has blocks
        for i in 0..(SECTION_BLOCK_COUNT + 10) {
            let state = registry.get(&BlockState::new("example:block").with_property("n", i.to_string()));
            section.get_then_set_block(index, state);
        }
        assert!(section.palette.len() <= SECTION_BLOCK_COUNT);
        let last = registry.get(
            &BlockState::new("example:block")
                .with_property("n", (SECTION_BLOCK_COUNT + 9).to_string()),
        );
        assert_eq!(section.block(index), last);
        assert_eq!(section.block(BIndex::new(0, 0, 0)), *registry.air());
        assert_eq!(section.non_air_count(), 1);
    }

    #[test]
    fn test_block_light() {
        let registry = registry();
        let mut section = MemorySection::empty(registry.air().clone());
        let index = BIndex::new(15, 0, 15);
        section.set_block_light(index, 14);
        assert_eq!(section.block_light(index), 14);
        assert_eq!(section.block_light(BIndex::new(0, 0, 0)), 0);
        // Light lives alongside the state without disturbing it
        assert_eq!(section.block(index), *registry.air());
    }
}
