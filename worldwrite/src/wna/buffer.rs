use std::collections::BTreeMap;

use crate::block::{BaseBlock, BlockStateHolder};
use crate::coords::{BlockPos, CCoords};
use crate::nbt::AttachedData;
use crate::side_effect::{SideEffect, SideEffectSet};
use crate::wna::{
    ChunkSectionMask, NativeAdapter, NativeBlockState, NativeChunk, NativeChunkSection,
    NativeWorld, apply_side_effects_no_lookups, update_tile_entity,
};

struct BufferedSection<S> {
    section: S,
    modified: ChunkSectionMask,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommitStats {
    pub sections: usize,
    pub blocks: usize,
    /// Queued payloads the world accepted.
    pub block_entities: usize,
}

/// Collects block writes into private copies of the sections they touch, then installs each
/// section in one step on [`commit`](SectionBuffer::commit).
///
/// Side effects are deferred to commit time and applied per modified block, except that client
/// sync is sent once per section instead of once per block.
pub struct SectionBuffer<W: NativeWorld> {
    sections: BTreeMap<CCoords, BTreeMap<usize, BufferedSection<W::Section>>>,
    block_entities: BTreeMap<BlockPos, AttachedData>,
    side_effects: SideEffectSet,
}

impl<W: NativeWorld> SectionBuffer<W> {
    pub fn new(side_effects: SideEffectSet) -> Self {
        Self {
            sections: BTreeMap::new(),
            block_entities: BTreeMap::new(),
            side_effects,
        }
    }

    pub fn side_effects(&self) -> SideEffectSet {
        self.side_effects
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.block_entities.is_empty()
    }

    /// Buffer a write of `block` at `pos`. Returns `false` if the write is known to change
    /// nothing.
    pub fn set_block<B>(&mut self, world: &W, pos: BlockPos, block: &B) -> bool
    where
        B: BlockStateHolder + ?Sized,
    {
        let chunk_coords = pos.chunk_coords();
        let index = world.section_index(pos.y);
        let local = pos.section_index();
        let new_state = world.adapter().to_native(block.block_state());
        let tag = block.attached_data();

        match self
            .sections
            .get_mut(&chunk_coords)
            .and_then(|sections| sections.get_mut(&index))
        {
            Some(buffered) => {
                let old_state = buffered.section.get_then_set_block(local, new_state.clone());
                if tag.is_none() && old_state == new_state {
                    return false;
                }
                buffered.modified.set(local);
            }
            None => {
                if tag.is_none() {
                    let existing = world.chunk(chunk_coords).block_state(pos);
                    if existing == new_state && !existing.has_block_entity() {
                        return false;
                    }
                }
                let mut section = world.chunk(chunk_coords).chunk_section(index).copy();
                section.get_then_set_block(local, new_state);
                let mut modified = ChunkSectionMask::new();
                modified.set(local);
                self.sections
                    .entry(chunk_coords)
                    .or_default()
                    .insert(index, BufferedSection { section, modified });
            }
        }

        if let Some(tag) = tag {
            self.block_entities.insert(pos, tag.clone());
        }
        true
    }

    /// What `pos` will hold after commit, if it is in a buffered section.
    pub fn buffered_block(&self, world: &W, pos: BlockPos) -> Option<BaseBlock> {
        let index = world.section_index(pos.y);
        let buffered = self.sections.get(&pos.chunk_coords())?.get(&index)?;
        let state = buffered.section.block(pos.section_index());
        Some(BaseBlock::new(
            world.adapter().from_native(&state),
            self.block_entities.get(&pos).cloned(),
        ))
    }

    /// Install every buffered section, load queued payloads, then apply the deferred side
    /// effects. The buffer is empty afterwards.
    #[tracing::instrument(level = "debug", skip_all, fields(chunks = self.sections.len()))]
    pub fn commit(&mut self, world: &mut W) -> CommitStats {
        let mut stats = CommitStats::default();

        let mut replaced = Vec::new();
        for (chunk_coords, sections) in std::mem::take(&mut self.sections) {
            let chunk = world.chunk_mut(chunk_coords);
            for (index, buffered) in sections {
                let old = chunk.set_chunk_section(index, buffered.section, &buffered.modified);
                stats.sections += 1;
                stats.blocks += buffered.modified.len();
                replaced.push((chunk_coords, index, old, buffered.modified));
            }
            chunk.update_heightmaps();
        }

        for (pos, tag) in std::mem::take(&mut self.block_entities) {
            let pos = world.adapter().new_block_pos(pos.x, pos.y, pos.z);
            if update_tile_entity(world, &tag, pos) {
                stats.block_entities += 1;
            }
        }

        // Clients get one update per section rather than one per block
        let per_block = self.side_effects.with(SideEffect::Network, false);
        for (chunk_coords, index, old, modified) in replaced {
            if self.side_effects.should_apply(SideEffect::Network) {
                world.chunk_mut(chunk_coords).mark_section_changed(index, &modified);
            }
            if per_block.is_none() {
                continue;
            }
            let section_y = world.y_for_section_index(index);
            for local in modified.iter() {
                let chunk = world.chunk(chunk_coords);
                let pos = chunk.world_pos(local.x, section_y + local.y as i32, local.z);
                let new = chunk.chunk_section(index).block(local);
                apply_side_effects_no_lookups(world, per_block, pos, &old.block(local), &new);
            }
        }

        log::debug!(
            "committed {} sections, {} blocks, {} block entities",
            stats.sections,
            stats.blocks,
            stats.block_entities
        );
        stats
    }
}

impl<W: NativeWorld> Default for SectionBuffer<W> {
    fn default() -> Self {
        Self::new(SideEffectSet::defaults())
    }
}
