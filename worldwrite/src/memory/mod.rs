/*
A host-independent world kept entirely in memory.

It implements the native access traits with the same observable rules a live server follows
(air-only sections decline air writes, block entities follow their block, heightmaps track the
highest non-air block) and records every world hook it receives in a `HookLog`, so the write
pipeline can be exercised and inspected without a server.
 */

mod chunk;
mod registry;
mod section;

pub use chunk::{BlockEntity, MemoryChunk};
pub use registry::{BlockRegistry, MemoryAdapter, MemoryBlockState};
pub use section::MemorySection;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::block::BlockState;
use crate::coords::{BlockPos, CCoords, CHUNK_SIZE};
use crate::nbt::AttachedData;
use crate::settings::Settings;
use crate::wna::{NativeAdapter, NativeBlockState, NativeChunk, NativeWorld};

/// Every world hook call received, in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HookLog {
    pub light_checks: Vec<BlockPos>,
    pub tile_entity_updates: Vec<BlockPos>,
    pub block_updates: Vec<BlockPos>,
    pub marked_changed: Vec<BlockPos>,
    /// Position and whether events were requested.
    pub neighbor_notifications: Vec<(BlockPos, bool)>,
    pub neighbor_updates: Vec<BlockPos>,
    /// Remove/place callbacks run through `update_block`.
    pub placements: Vec<BlockPos>,
    pub poi_changes: Vec<BlockPos>,
    /// Positions reshaped by a neighbour cascade.
    pub shape_updates: Vec<BlockPos>,
}

impl HookLog {
    pub fn is_empty(&self) -> bool {
        self.counts().iter().all(|(_, count)| *count == 0)
    }

    pub fn counts(&self) -> [(&'static str, usize); 9] {
        [
            ("light_checks", self.light_checks.len()),
            ("tile_entity_updates", self.tile_entity_updates.len()),
            ("block_updates", self.block_updates.len()),
            ("marked_changed", self.marked_changed.len()),
            ("neighbor_notifications", self.neighbor_notifications.len()),
            ("neighbor_updates", self.neighbor_updates.len()),
            ("placements", self.placements.len()),
            ("poi_changes", self.poi_changes.len()),
            ("shape_updates", self.shape_updates.len()),
        ]
    }
}

pub struct MemoryWorld {
    adapter: MemoryAdapter,
    min_y: i32,
    section_count: usize,
    chunks: HashMap<CCoords, MemoryChunk>,
    pois: BTreeSet<BlockPos>,
    hooks: HookLog,
}

impl MemoryWorld {
    pub fn new(settings: &Settings) -> Self {
        Self::with_registry(settings, Arc::new(BlockRegistry::new(&settings.blocks)))
    }

    /// A world interning its states in `registry`, so its native states compare equal to those
    /// of every other world sharing it.
    pub fn with_registry(settings: &Settings, registry: Arc<BlockRegistry>) -> Self {
        Self {
            adapter: MemoryAdapter::new(registry),
            min_y: settings.world.min_y,
            section_count: settings.world.section_count(),
            chunks: HashMap::new(),
            pois: BTreeSet::new(),
            hooks: HookLog::default(),
        }
    }

    /// Load an empty chunk at `coords`, or change the ticking state of one already loaded.
    pub fn load_chunk(&mut self, coords: CCoords, ticking: bool) -> &mut MemoryChunk {
        let chunk = self.chunks.entry(coords).or_insert_with(|| {
            MemoryChunk::new(
                coords,
                self.min_y,
                self.section_count,
                ticking,
                self.adapter.registry().air().clone(),
            )
        });
        chunk.set_ticking(ticking);
        chunk
    }

    pub fn is_loaded(&self, coords: CCoords) -> bool {
        self.chunks.contains_key(&coords)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &MemoryChunk> {
        self.chunks.values()
    }

    /// Whether `pos` is inside a loaded chunk and the world's height.
    pub fn contains(&self, pos: BlockPos) -> bool {
        let max_y = self.min_y + (self.section_count as u32 * CHUNK_SIZE) as i32;
        (self.min_y..max_y).contains(&pos.y) && self.is_loaded(pos.chunk_coords())
    }

    fn native_block(&self, pos: BlockPos) -> Option<MemoryBlockState> {
        self.contains(pos)
            .then(|| self.chunk(pos.chunk_coords()).block_state(pos))
    }

    /// The block at `pos`. Panics if its chunk isn't loaded.
    pub fn block_state(&self, pos: BlockPos) -> BlockState {
        let native = self.chunk(pos.chunk_coords()).block_state(pos);
        self.adapter.from_native(&native)
    }

    pub fn block_entity(&self, pos: BlockPos) -> Option<&BlockEntity> {
        self.chunks.get(&pos.chunk_coords())?.block_entity(pos)
    }

    pub fn block_light(&self, pos: BlockPos) -> u8 {
        self.chunk(pos.chunk_coords()).block_light(pos)
    }

    pub fn is_poi(&self, pos: BlockPos) -> bool {
        self.pois.contains(&pos)
    }

    pub fn hooks(&self) -> &HookLog {
        &self.hooks
    }

    pub fn take_hooks(&mut self) -> HookLog {
        std::mem::take(&mut self.hooks)
    }

    fn connects_to(&self, pos: BlockPos) -> bool {
        self.native_block(pos).is_some_and(|state| !state.is_air())
    }
}

impl NativeWorld for MemoryWorld {
    type State = MemoryBlockState;
    type Section = MemorySection;
    type Chunk = MemoryChunk;
    type Adapter = MemoryAdapter;

    fn adapter(&self) -> &MemoryAdapter {
        &self.adapter
    }

    fn section_index(&self, y: i32) -> usize {
        let index = (y - self.min_y).div_euclid(CHUNK_SIZE as i32);
        assert!(
            index >= 0 && (index as usize) < self.section_count,
            "y={} is outside the world's height",
            y
        );
        index as usize
    }

    fn y_for_section_index(&self, index: usize) -> i32 {
        self.min_y + (index as u32 * CHUNK_SIZE) as i32
    }

    fn chunk(&self, coords: CCoords) -> &MemoryChunk {
        self.chunks
            .get(&coords)
            .unwrap_or_else(|| panic!("chunk {} is not loaded", coords))
    }

    fn chunk_mut(&mut self, coords: CCoords) -> &mut MemoryChunk {
        self.chunks
            .get_mut(&coords)
            .unwrap_or_else(|| panic!("chunk {} is not loaded", coords))
    }

    fn update_from_neighbour_shapes(&self, state: &MemoryBlockState, pos: BlockPos) -> MemoryBlockState {
        if !state.kind().connects {
            return state.clone();
        }
        let mut shaped = state.state().clone();
        for (direction, neighbor) in [
            ("north", pos.north()),
            ("east", pos.east()),
            ("south", pos.south()),
            ("west", pos.west()),
        ] {
            let connected = if self.connects_to(neighbor) { "true" } else { "false" };
            shaped = shaped.with_property(direction, connected);
        }
        self.adapter.to_native(&shaped)
    }

    fn update_lighting_for_block(&mut self, pos: BlockPos) {
        self.hooks.light_checks.push(pos);
        let level = self.chunk(pos.chunk_coords()).block_state(pos).kind().light;
        self.chunk_mut(pos.chunk_coords()).set_block_light(pos, level);
    }

    fn update_tile_entity(&mut self, pos: BlockPos, tag: &AttachedData) -> bool {
        self.hooks.tile_entity_updates.push(pos);
        match self.chunk_mut(pos.chunk_coords()).block_entity_mut(pos) {
            Some(entity) => entity.load(pos, tag),
            None => false,
        }
    }

    fn notify_block_update(&mut self, pos: BlockPos, _old: &MemoryBlockState, _new: &MemoryBlockState) {
        self.hooks.block_updates.push(pos);
    }

    fn mark_block_changed(&mut self, pos: BlockPos) {
        self.hooks.marked_changed.push(pos);
    }

    fn notify_neighbors(
        &mut self,
        pos: BlockPos,
        _old: &MemoryBlockState,
        _new: &MemoryBlockState,
        events: bool,
    ) {
        self.hooks.neighbor_notifications.push((pos, events));
    }

    fn update_block(&mut self, pos: BlockPos, _old: &MemoryBlockState, _new: &MemoryBlockState) {
        self.hooks.placements.push(pos);
    }

    fn update_neighbors(
        &mut self,
        pos: BlockPos,
        _old: &MemoryBlockState,
        _new: &MemoryBlockState,
        recursion_limit: u32,
        _events: bool,
    ) {
        self.hooks.neighbor_updates.push(pos);
        let mut queue: VecDeque<(BlockPos, u32)> = pos
            .neighbors()
            .into_iter()
            .map(|neighbor| (neighbor, recursion_limit))
            .collect();
        while let Some((pos, remaining)) = queue.pop_front() {
            if remaining == 0 {
                continue;
            }
            let Some(current) = self.native_block(pos) else {
                continue;
            };
            let reshaped = self.update_from_neighbour_shapes(&current, pos);
            if reshaped == current {
                continue;
            }
            self.chunk_mut(pos.chunk_coords())
                .set_block_state(pos, reshaped, false);
            self.hooks.shape_updates.push(pos);
            queue.extend(
                pos.neighbors()
                    .into_iter()
                    .map(|neighbor| (neighbor, remaining - 1)),
            );
        }
    }

    fn on_block_state_change(&mut self, pos: BlockPos, old: &MemoryBlockState, new: &MemoryBlockState) {
        self.hooks.poi_changes.push(pos);
        if old.kind().poi {
            self.pois.remove(&pos);
        }
        if new.kind().poi {
            self.pois.insert(pos);
        }
    }
}

impl std::fmt::Debug for MemoryWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemoryWorld")
            .field("min_y", &self.min_y)
            .field("section_count", &self.section_count)
            .field("chunks", &self.chunks.len())
            .field("registry", self.adapter.registry())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::BIndex;
    use crate::wna::{ChunkSectionMask, NativeChunkSection};

    fn world() -> MemoryWorld {
        let mut world = MemoryWorld::new(&Settings::load_default().unwrap());
        world.load_chunk(CCoords::new(0, 0), true);
        world
    }

    fn native(world: &MemoryWorld, name: &str) -> MemoryBlockState {
        world.adapter().to_native(&BlockState::new(name))
    }

    #[test]
    fn test_section_index() {
        let world = world();
        assert_eq!(world.section_index(-64), 0);
        assert_eq!(world.section_index(-49), 0);
        assert_eq!(world.section_index(-48), 1);
        assert_eq!(world.section_index(319), 23);
        assert_eq!(world.y_for_section_index(4), 0);
    }

    #[test]
    #[should_panic(expected = "is not loaded")]
    fn test_unloaded_chunk() {
        let world = world();
        world.chunk(CCoords::new(5, 5));
    }

    #[test]
    fn test_connecting_shape() {
        let mut world = world();
        let pos = BlockPos::new(8, 64, 8);
        let stone = native(&world, "minecraft:stone");
        world
            .chunk_mut(pos.chunk_coords())
            .set_block_state(pos.west(), stone.clone(), false);

        let pane = native(&world, "minecraft:glass_pane");
        let shaped = world.update_from_neighbour_shapes(&pane, pos);
        let state = world.adapter().from_native(&shaped);
        assert_eq!(state.get_property("west"), Some("true"));
        assert_eq!(state.get_property("east"), Some("false"));

        // Non-connecting kinds are left alone
        assert_eq!(world.update_from_neighbour_shapes(&stone, pos), stone);

        // Unloaded neighbours don't connect
        let edge = BlockPos::new(0, 64, 8);
        let shaped = world.update_from_neighbour_shapes(&pane, edge);
        assert_eq!(world.adapter().from_native(&shaped).get_property("west"), Some("false"));
    }

    #[test]
    fn test_cascade_stays_within_limit() {
        let mut world = world();
        let fence = native(&world, "minecraft:oak_fence");
        for x in 1..10 {
            world
                .chunk_mut(CCoords::new(0, 0))
                .set_block_state(BlockPos::new(x, 64, 0), fence.clone(), false);
        }
        let air = world.adapter().registry().air().clone();
        world.update_neighbors(BlockPos::new(0, 64, 0), &air, &air, 3, false);
        assert_eq!(
            world.hooks().shape_updates,
            vec![
                BlockPos::new(1, 64, 0),
                BlockPos::new(2, 64, 0),
                BlockPos::new(3, 64, 0)
            ]
        );
        assert_eq!(world.block_state(BlockPos::new(4, 64, 0)), BlockState::new("minecraft:oak_fence"));
    }

    #[test]
    fn test_tile_entity_update_needs_entity() {
        let mut world = world();
        let pos = BlockPos::new(1, 1, 1);
        assert!(!world.update_tile_entity(pos, &AttachedData::new()));
        let chest = native(&world, "minecraft:chest");
        world.chunk_mut(pos.chunk_coords()).set_block_state(pos, chest, false);
        assert!(world.update_tile_entity(pos, &AttachedData::new().stamped(pos)));
        assert_eq!(world.hooks().tile_entity_updates, vec![pos, pos]);
    }

    #[test]
    fn test_shared_registry() {
        let settings = Settings::load_default().unwrap();
        let registry = Arc::new(BlockRegistry::new(&settings.blocks));
        let a = MemoryWorld::with_registry(&settings, registry.clone());
        let b = MemoryWorld::with_registry(&settings, registry);
        assert_eq!(native(&a, "minecraft:stone"), native(&b, "minecraft:stone"));
        assert_ne!(
            native(&a, "minecraft:stone"),
            native(&MemoryWorld::new(&settings), "minecraft:stone")
        );
    }

    #[test]
    fn test_hook_log() {
        let mut world = world();
        assert!(world.hooks().is_empty());
        world.mark_block_changed(BlockPos::new(0, 0, 0));
        assert!(!world.hooks().is_empty());
        let hooks = world.take_hooks();
        assert_eq!(hooks.marked_changed.len(), 1);
        assert!(world.hooks().is_empty());
    }

    #[test]
    fn test_section_replacement_through_world() {
        let mut world = world();
        let index = world.section_index(70);
        let chunk = world.chunk_mut(CCoords::new(0, 0));
        let mut section = chunk.chunk_section(index).copy();
        let barrel = native(&world, "minecraft:barrel");
        section.get_then_set_block(BIndex::new(0, 6, 0), barrel);
        let mask: ChunkSectionMask = [BIndex::new(0, 6, 0)].into_iter().collect();
        world
            .chunk_mut(CCoords::new(0, 0))
            .set_chunk_section(index, section, &mask);
        assert!(world.block_entity(BlockPos::new(0, 70, 0)).is_some());
    }
}
