use std::collections::BTreeMap;

use arcstr::ArcStr;
use bytes::Bytes;

use crate::coords::{BIndex, BlockPos, CCoords, CHUNK_COLUMN_COUNT, CHUNK_SIZE};
use crate::memory::{MemoryBlockState, MemorySection};
use crate::nbt::AttachedData;
use crate::wna::{
    BlockChange, ChunkSectionMask, NativeBlockState, NativeChunk, NativeChunkSection,
};

/// A block entity: its type, the state it is bound to, and its payload as encoded NBT.
#[derive(Clone, derive_more::Debug)]
pub struct BlockEntity {
    id: ArcStr,
    state: MemoryBlockState,
    #[debug("[.. {} bytes ..]", data.len())]
    data: Bytes,
}

impl BlockEntity {
    fn new(id: ArcStr, state: MemoryBlockState) -> Self {
        Self {
            id,
            state,
            data: Bytes::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &MemoryBlockState {
        &self.state
    }

    /// The last payload loaded into this entity, if any.
    pub fn data(&self) -> Option<AttachedData> {
        if self.data.is_empty() {
            return None;
        }
        AttachedData::from_bytes(&self.data).ok()
    }

    /// Replace the payload. A payload naming a different entity type is refused.
    pub(crate) fn load(&mut self, pos: BlockPos, tag: &AttachedData) -> bool {
        let id = tag.id();
        if !id.is_empty() && id != self.id.as_str() {
            log::debug!(
                "refusing {} data for {} block entity at {}",
                id,
                self.id,
                pos
            );
            return false;
        }
        match tag.to_bytes() {
            Ok(data) => {
                self.data = Bytes::from(data);
                true
            }
            Err(e) => {
                log::warn!("failed to encode block entity data at {}: {}", pos, e);
                false
            }
        }
    }
}

pub struct MemoryChunk {
    coords: CCoords,
    min_y: i32,
    ticking: bool,
    sections: Vec<MemorySection>,
    heightmap: [Option<i32>; CHUNK_COLUMN_COUNT],
    block_entities: BTreeMap<BlockPos, BlockEntity>,
    /// `(section index, now only air)` for each section whose air status changed.
    light_section_changes: Vec<(usize, bool)>,
    changed_sections: BTreeMap<usize, ChunkSectionMask>,
    physics_callbacks: usize,
    unsaved: bool,
}

impl MemoryChunk {
    pub fn new(
        coords: CCoords,
        min_y: i32,
        section_count: usize,
        ticking: bool,
        air: MemoryBlockState,
    ) -> Self {
        Self {
            coords,
            min_y,
            ticking,
            sections: vec![MemorySection::empty(air); section_count],
            heightmap: [None; CHUNK_COLUMN_COUNT],
            block_entities: BTreeMap::new(),
            light_section_changes: Vec::new(),
            changed_sections: BTreeMap::new(),
            physics_callbacks: 0,
            unsaved: false,
        }
    }

    pub fn set_ticking(&mut self, ticking: bool) {
        self.ticking = ticking;
    }

    fn section_for_y(&self, y: i32) -> usize {
        let index = (y - self.min_y).div_euclid(CHUNK_SIZE as i32);
        assert!(
            index >= 0 && (index as usize) < self.sections.len(),
            "y={} is outside the world's height",
            y
        );
        index as usize
    }

    /// Highest non-air block in local column `(x, z)`.
    pub fn height(&self, x: u32, z: u32) -> Option<i32> {
        self.heightmap[BIndex::new(x, 0, z).to_column_index()]
    }

    fn scan_column(&self, x: u32, z: u32, from_y: i32) -> Option<i32> {
        (self.min_y..=from_y)
            .rev()
            .find(|&y| !self.block_state(self.world_pos(x, y, z)).is_air())
    }

    fn update_column_height(&mut self, pos: BlockPos, state: &MemoryBlockState) {
        let local = pos.section_index();
        let column = local.to_column_index();
        let top = self.heightmap[column];
        if !state.is_air() {
            if top.is_none_or(|top| pos.y > top) {
                self.heightmap[column] = Some(pos.y);
            }
        } else if top == Some(pos.y) {
            self.heightmap[column] = self.scan_column(local.x, local.z, pos.y - 1);
        }
    }

    pub fn block_entity(&self, pos: BlockPos) -> Option<&BlockEntity> {
        self.block_entities.get(&pos)
    }

    pub(crate) fn block_entity_mut(&mut self, pos: BlockPos) -> Option<&mut BlockEntity> {
        self.block_entities.get_mut(&pos)
    }

    pub fn block_entities(&self) -> impl Iterator<Item = (&BlockPos, &BlockEntity)> {
        self.block_entities.iter()
    }

    fn init_block_entity(&mut self, pos: BlockPos, state: &MemoryBlockState) {
        let Some(id) = &state.kind().block_entity else {
            return;
        };
        match self.block_entities.get_mut(&pos) {
            Some(entity) if &entity.id == id => entity.state = state.clone(),
            _ => {
                self.block_entities
                    .insert(pos, BlockEntity::new(id.clone(), state.clone()));
            }
        }
    }

    pub fn block_light(&self, pos: BlockPos) -> u8 {
        self.sections[self.section_for_y(pos.y)].block_light(pos.section_index())
    }

    pub fn set_block_light(&mut self, pos: BlockPos, level: u8) {
        let index = self.section_for_y(pos.y);
        self.sections[index].set_block_light(pos.section_index(), level);
    }

    pub fn light_section_changes(&self) -> &[(usize, bool)] {
        &self.light_section_changes
    }

    pub fn changed_sections(&self) -> &BTreeMap<usize, ChunkSectionMask> {
        &self.changed_sections
    }

    /// Number of remove/place callbacks run by writes with the update flag.
    pub fn physics_callbacks(&self) -> usize {
        self.physics_callbacks
    }

    pub fn is_unsaved(&self) -> bool {
        self.unsaved
    }
}

impl NativeChunk for MemoryChunk {
    type State = MemoryBlockState;
    type Section = MemorySection;

    fn coords(&self) -> CCoords {
        self.coords
    }

    fn is_ticking(&self) -> bool {
        self.ticking
    }

    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section_block_y(&self, index: usize) -> i32 {
        self.min_y + (index as u32 * CHUNK_SIZE) as i32
    }

    fn block_state(&self, pos: BlockPos) -> MemoryBlockState {
        self.sections[self.section_for_y(pos.y)].block(pos.section_index())
    }

    fn set_block_state(
        &mut self,
        pos: BlockPos,
        state: MemoryBlockState,
        update: bool,
    ) -> BlockChange<MemoryBlockState> {
        debug_assert_eq!(pos.chunk_coords(), self.coords);
        let index = self.section_for_y(pos.y);
        let section = &mut self.sections[index];
        let was_only_air = section.is_only_air();
        if was_only_air && state.is_air() {
            return BlockChange::Unchanged;
        }
        let old = section.get_then_set_block(pos.section_index(), state.clone());
        if old == state {
            return BlockChange::Unchanged;
        }
        let only_air = section.is_only_air();

        self.update_column_height(pos, &state);
        if was_only_air != only_air {
            self.light_section_changes.push((index, only_air));
        }
        if !old.is_same_block_type(&state) {
            if update {
                self.physics_callbacks += 1;
            }
            if old.has_block_entity() {
                self.block_entities.remove(&pos);
            }
        }
        if update {
            self.physics_callbacks += 1;
        }
        if state.has_block_entity() {
            self.init_block_entity(pos, &state);
        }
        self.unsaved = true;
        BlockChange::Changed { previous: old }
    }

    fn mark_section_changed(&mut self, index: usize, changed: &ChunkSectionMask) {
        self.changed_sections
            .entry(index)
            .or_default()
            .union_with(changed);
    }

    fn update_heightmaps(&mut self) {
        let top = self.section_block_y(self.sections.len()) - 1;
        for column in 0..CHUNK_COLUMN_COUNT {
            let x = column as u32 % CHUNK_SIZE;
            let z = column as u32 / CHUNK_SIZE;
            self.heightmap[column] = self.scan_column(x, z, top);
        }
    }

    fn update_lighting_for_section_air_change(&mut self, index: usize, only_air: bool) {
        self.light_section_changes.push((index, only_air));
    }

    fn remove_block_entity(&mut self, x: u32, y: i32, z: u32) {
        let pos = self.world_pos(x, y, z);
        self.block_entities.remove(&pos);
        self.unsaved = true;
    }

    fn initialize_block_entity(&mut self, x: u32, y: i32, z: u32, state: &MemoryBlockState) {
        let pos = self.world_pos(x, y, z);
        self.init_block_entity(pos, state);
        self.unsaved = true;
    }

    fn chunk_section(&self, index: usize) -> &MemorySection {
        &self.sections[index]
    }

    fn replace_chunk_section(&mut self, index: usize, section: MemorySection) -> MemorySection {
        self.unsaved = true;
        std::mem::replace(&mut self.sections[index], section)
    }
}

impl std::fmt::Debug for MemoryChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemoryChunk")
            .field("coords", &self.coords)
            .field("ticking", &self.ticking)
            .field("sections", &self.sections.len())
            .field("block_entities", &self.block_entities.len())
            .field("unsaved", &self.unsaved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fastnbt::Value;

    use super::*;
    use crate::block::BlockState;
    use crate::memory::BlockRegistry;
    use crate::settings::Settings;

    struct Fixture {
        registry: Arc<BlockRegistry>,
        chunk: MemoryChunk,
    }

    impl Fixture {
        fn new() -> Self {
            let settings = Settings::load_default().unwrap();
            let registry = Arc::new(BlockRegistry::new(&settings.blocks));
            let chunk = MemoryChunk::new(
                CCoords::new(1, -1),
                settings.world.min_y,
                settings.world.section_count(),
                true,
                registry.air().clone(),
            );
            Self { registry, chunk }
        }

        fn state(&self, name: &str) -> MemoryBlockState {
            self.registry.get(&BlockState::new(name))
        }
    }

    #[test]
    fn test_set_block_state() {
        let mut f = Fixture::new();
        let stone = f.state("minecraft:stone");
        let pos = BlockPos::new(20, 70, -5);

        // Air into an all-air section is declined
        let air = f.registry.air().clone();
        assert_eq!(f.chunk.set_block_state(pos, air.clone(), true), BlockChange::Unchanged);
        assert!(!f.chunk.is_unsaved());

        let change = f.chunk.set_block_state(pos, stone.clone(), true);
        assert_eq!(change, BlockChange::Changed { previous: air.clone() });
        assert_eq!(f.chunk.block_state(pos), stone);
        assert_eq!(f.chunk.height(4, 11), Some(70));
        assert!(f.chunk.is_unsaved());
        assert_eq!(f.chunk.physics_callbacks(), 2);

        let index = f.chunk.section_for_y(70);
        assert_eq!(f.chunk.light_section_changes(), &[(index, false)]);

        assert_eq!(f.chunk.set_block_state(pos, stone.clone(), true), BlockChange::Unchanged);

        assert_eq!(
            f.chunk.set_block_state(pos, air, false),
            BlockChange::Changed { previous: stone }
        );
        assert_eq!(f.chunk.height(4, 11), None);
        assert_eq!(
            f.chunk.light_section_changes(),
            &[(index, false), (index, true)]
        );
    }

    #[test]
    fn test_heightmap_rescans_on_removal() {
        let mut f = Fixture::new();
        let stone = f.state("minecraft:stone");
        let low = BlockPos::new(16, -60, -16);
        let high = BlockPos::new(16, 100, -16);
        f.chunk.set_block_state(low, stone.clone(), false);
        f.chunk.set_block_state(high, stone.clone(), false);
        assert_eq!(f.chunk.height(0, 0), Some(100));
        f.chunk.set_block_state(high, f.registry.air().clone(), false);
        assert_eq!(f.chunk.height(0, 0), Some(-60));
    }

    #[test]
    fn test_block_entity_lifecycle() {
        let mut f = Fixture::new();
        let pos = BlockPos::new(31, 0, -1);
        let north = f.registry.get(&BlockState::new("minecraft:chest").with_property("facing", "north"));
        let south = f.registry.get(&BlockState::new("minecraft:chest").with_property("facing", "south"));

        f.chunk.set_block_state(pos, north, true);
        let entity = f.chunk.block_entity(pos).unwrap();
        assert_eq!(entity.id(), "minecraft:chest");
        assert!(entity.data().is_none());

        let tag = AttachedData::new().with("Lock", Value::String("key".into()));
        assert!(f.chunk.block_entity_mut(pos).unwrap().load(pos, &tag));

        // Same kind: the entity survives, rebound to the new state
        f.chunk.set_block_state(pos, south.clone(), true);
        let entity = f.chunk.block_entity(pos).unwrap();
        assert_eq!(entity.state(), &south);
        assert_eq!(entity.data().unwrap().get("Lock"), tag.get("Lock"));

        // Different kind with its own entity: replaced
        let furnace = f.state("minecraft:furnace");
        f.chunk.set_block_state(pos, furnace, true);
        let entity = f.chunk.block_entity(pos).unwrap();
        assert_eq!(entity.id(), "minecraft:furnace");
        assert!(entity.data().is_none());

        let stone = f.state("minecraft:stone");
        f.chunk.set_block_state(pos, stone, true);
        assert!(f.chunk.block_entity(pos).is_none());
    }

    #[test]
    fn test_load_refuses_other_entity_type() {
        let mut f = Fixture::new();
        let pos = BlockPos::new(16, 0, -16);
        let barrel = f.state("minecraft:barrel");
        f.chunk.set_block_state(pos, barrel, false);
        let entity = f.chunk.block_entity_mut(pos).unwrap();
        let tag = AttachedData::new().with("id", Value::String("minecraft:chest".into()));
        assert!(!entity.load(pos, &tag));
        assert!(entity.data().is_none());
        let tag = AttachedData::new().with("id", Value::String("minecraft:barrel".into()));
        assert!(entity.load(pos, &tag));
    }

    #[test]
    fn test_set_chunk_section() {
        let mut f = Fixture::new();
        let index = 4;
        let y = f.chunk.section_block_y(index);
        let old_chest = BlockPos::new(16, y, -16);
        let new_barrel = BlockPos::new(17, y + 3, -15);
        let untouched_chest = BlockPos::new(18, y, -16);
        let chest = f.state("minecraft:chest");
        f.chunk.set_block_state(old_chest, chest.clone(), false);
        f.chunk.set_block_state(untouched_chest, chest, false);

        let mut section = f.chunk.chunk_section(index).copy();
        section.get_then_set_block(old_chest.section_index(), f.state("minecraft:stone"));
        section.get_then_set_block(new_barrel.section_index(), f.state("minecraft:barrel"));
        section.get_then_set_block(untouched_chest.section_index(), f.registry.air().clone());
        let mask: ChunkSectionMask = [old_chest.section_index(), new_barrel.section_index()]
            .into_iter()
            .collect();

        let changes_before = f.chunk.light_section_changes().len();
        let old = f.chunk.set_chunk_section(index, section, &mask);
        assert_eq!(old.non_air_count(), 2);
        assert!(f.chunk.block_entity(old_chest).is_none());
        assert_eq!(f.chunk.block_entity(new_barrel).unwrap().id(), "minecraft:barrel");
        // Outside the mask nothing is reconciled
        assert!(f.chunk.block_entity(untouched_chest).is_some());
        // Section stayed non-air
        assert_eq!(f.chunk.light_section_changes().len(), changes_before);

        // Heightmaps are only brought up to date on request
        assert_eq!(f.chunk.height(1, 1), None);
        f.chunk.update_heightmaps();
        assert_eq!(f.chunk.height(1, 1), Some(y + 3));
        assert_eq!(f.chunk.height(2, 0), None);
    }

    #[test]
    fn test_set_chunk_section_air_transition() {
        let mut f = Fixture::new();
        let index = 10;
        let pos = BlockPos::new(20, f.chunk.section_block_y(index) + 8, -8);
        let mut section = f.chunk.chunk_section(index).copy();
        section.get_then_set_block(pos.section_index(), f.state("minecraft:stone"));
        let mask: ChunkSectionMask = [pos.section_index()].into_iter().collect();
        f.chunk.set_chunk_section(index, section, &mask);
        assert_eq!(f.chunk.light_section_changes(), &[(index, false)]);
    }

    #[test]
    #[should_panic(expected = "outside the world's height")]
    fn test_out_of_range_y() {
        let f = Fixture::new();
        f.chunk.block_state(BlockPos::new(16, 320, -16));
    }

    #[test]
    fn test_mark_section_changed() {
        let mut f = Fixture::new();
        let a: ChunkSectionMask = [BIndex::new(1, 1, 1)].into_iter().collect();
        let b: ChunkSectionMask = [BIndex::new(2, 2, 2)].into_iter().collect();
        f.chunk.mark_section_changed(3, &a);
        f.chunk.mark_section_changed(3, &b);
        assert_eq!(f.chunk.changed_sections().get(&3).map(|m| m.len()), Some(2));
    }
}
