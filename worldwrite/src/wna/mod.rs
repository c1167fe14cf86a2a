/*
Native world access.

These traits are the whole boundary between the write pipeline and a host world. A platform
binding implements them once; everything in `shared` and `buffer` is written against them and
never duplicated per platform.

Everything here runs on the thread that owns the live simulation. Nothing blocks, nothing is
retried, and a chunk is only touched while the host has it loaded.
 */

mod buffer;
mod mask;
mod shared;

pub use buffer::{CommitStats, SectionBuffer};
pub use mask::ChunkSectionMask;
pub use shared::{
    NEIGHBOR_UPDATE_LIMIT, apply_side_effects, apply_side_effects_no_lookups,
    mark_and_notify_block, post_chunk_section_replacement, set_block, update_tile_entity,
};

use crate::block::BlockState;
use crate::coords::{BIndex, BlockPos, CCoords};
use crate::nbt::AttachedData;

/// The host's internal block representation, compared by identity.
pub trait NativeBlockState: Clone + Eq + std::fmt::Debug {
    fn is_air(&self) -> bool;

    fn has_block_entity(&self) -> bool;

    /// Same block kind, regardless of property values.
    fn is_same_block_type(&self, other: &Self) -> bool;
}

/// Converts host-independent values into their native form.
pub trait NativeAdapter {
    type State: NativeBlockState;

    fn to_native(&self, state: &BlockState) -> Self::State;

    fn from_native(&self, state: &Self::State) -> BlockState;

    fn new_block_pos(&self, x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new(x, y, z)
    }
}

/// Outcome of storing a state in a chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockChange<S> {
    /// The stored state was replaced.
    Changed { previous: S },
    /// Nothing was stored: either the state was already there, or the chunk declined a no-op
    /// write (air into an all-air section).
    Unchanged,
}

impl<S> BlockChange<S> {
    pub fn is_changed(&self) -> bool {
        matches!(self, BlockChange::Changed { .. })
    }

    pub fn previous(self) -> Option<S> {
        match self {
            BlockChange::Changed { previous } => Some(previous),
            BlockChange::Unchanged => None,
        }
    }
}

/// A 16x16x16 grid of native states.
///
/// Indices are always in range; passing an out-of-range `BIndex` is a caller bug.
pub trait NativeChunkSection: Clone {
    type State: NativeBlockState;

    fn block(&self, index: BIndex) -> Self::State;

    /// Store `state`, returning what was there before. Never refuses.
    fn get_then_set_block(&mut self, index: BIndex, state: Self::State) -> Self::State;

    fn is_only_air(&self) -> bool;

    /// An owned copy that shares no mutable state with `self`.
    fn copy(&self) -> Self {
        self.clone()
    }
}

/// One loaded chunk column.
pub trait NativeChunk {
    type State: NativeBlockState;
    type Section: NativeChunkSection<State = Self::State>;

    fn coords(&self) -> CCoords;

    /// Whether this chunk is inside the active simulation radius.
    fn is_ticking(&self) -> bool;

    fn section_count(&self) -> usize;

    /// World Y of the bottom block of section `index`.
    fn section_block_y(&self, index: usize) -> i32;

    /// World position of the block at local column `(x, z)` and world height `y`.
    fn world_pos(&self, x: u32, y: i32, z: u32) -> BlockPos {
        let coords = self.coords();
        BlockPos::new(coords.block_x(x), y, coords.block_z(z))
    }

    fn block_state(&self, pos: BlockPos) -> Self::State;

    /// Store `state` at `pos`, maintaining heightmaps, section air status and block entities
    /// the way the host does. `update` enables the old/new block's remove/place callbacks.
    fn set_block_state(
        &mut self,
        pos: BlockPos,
        state: Self::State,
        update: bool,
    ) -> BlockChange<Self::State>;

    /// Queue the `changed` blocks of section `index` for sending to clients.
    fn mark_section_changed(&mut self, index: usize, changed: &ChunkSectionMask);

    fn update_heightmaps(&mut self);

    fn update_lighting_for_section_air_change(&mut self, index: usize, only_air: bool);

    /// Remove the block entity at local column `(x, z)`, world height `y`.
    fn remove_block_entity(&mut self, x: u32, y: i32, z: u32);

    /// Create the block entity `state` needs at local column `(x, z)`, world height `y`, or
    /// rebind the existing one to `state`.
    fn initialize_block_entity(&mut self, x: u32, y: i32, z: u32, state: &Self::State);

    fn chunk_section(&self, index: usize) -> &Self::Section;

    /// Install `section` at `index` and return the one it replaced, with no other bookkeeping.
    fn replace_chunk_section(&mut self, index: usize, section: Self::Section) -> Self::Section;

    /// Swap a whole section and reconcile block entities and lighting for the `modified`
    /// positions, without running the per-block pipeline. Heightmaps are left to the caller.
    fn set_chunk_section(
        &mut self,
        index: usize,
        section: Self::Section,
        modified: &ChunkSectionMask,
    ) -> Self::Section
    where
        Self: Sized,
    {
        let old = self.replace_chunk_section(index, section);
        post_chunk_section_replacement(self, index, &old, modified);
        old
    }
}

/// The chunk registry plus the hooks only the live simulation can perform.
///
/// Each hook is a pass-through; the write pipeline only decides which to call, and in what
/// order.
pub trait NativeWorld {
    type State: NativeBlockState;
    type Section: NativeChunkSection<State = Self::State>;
    type Chunk: NativeChunk<State = Self::State, Section = Self::Section>;
    type Adapter: NativeAdapter<State = Self::State>;

    fn adapter(&self) -> &Self::Adapter;

    /// Index into a chunk's section list for world height `y`.
    fn section_index(&self, y: i32) -> usize;

    /// World Y of the bottom block of section `index`.
    fn y_for_section_index(&self, index: usize) -> i32;

    /// The loaded chunk at `coords`. Panics if it isn't loaded.
    fn chunk(&self, coords: CCoords) -> &Self::Chunk;

    /// The loaded chunk at `coords`. Panics if it isn't loaded.
    fn chunk_mut(&mut self, coords: CCoords) -> &mut Self::Chunk;

    /// The form `state` would settle into at `pos`, given its current neighbours.
    fn update_from_neighbour_shapes(&self, state: &Self::State, pos: BlockPos) -> Self::State;

    fn update_lighting_for_block(&mut self, pos: BlockPos);

    /// Load `tag` into the block entity at `pos`. Returns `false` if there is no block entity
    /// there, or the payload could not be applied.
    fn update_tile_entity(&mut self, pos: BlockPos, tag: &AttachedData) -> bool;

    /// Full block update: wakes simulation/AI and syncs clients.
    fn notify_block_update(&mut self, pos: BlockPos, old: &Self::State, new: &Self::State);

    /// Client sync only.
    fn mark_block_changed(&mut self, pos: BlockPos);

    fn notify_neighbors(
        &mut self,
        pos: BlockPos,
        old: &Self::State,
        new: &Self::State,
        events: bool,
    );

    /// Run the old block's remove callback and the new block's place callback.
    fn update_block(&mut self, pos: BlockPos, old: &Self::State, new: &Self::State);

    /// Reshape neighbours of `pos`, cascading at most `recursion_limit` steps.
    fn update_neighbors(
        &mut self,
        pos: BlockPos,
        old: &Self::State,
        new: &Self::State,
        recursion_limit: u32,
        events: bool,
    );

    /// Point-of-interest bookkeeping.
    fn on_block_state_change(&mut self, pos: BlockPos, old: &Self::State, new: &Self::State);
}
