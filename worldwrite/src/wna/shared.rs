use crate::block::{BlockState, BlockStateHolder};
use crate::coords::BlockPos;
use crate::nbt::AttachedData;
use crate::side_effect::{SideEffect, SideEffectSet};
use crate::wna::{
    ChunkSectionMask, NativeAdapter, NativeBlockState, NativeChunk, NativeChunkSection,
    NativeWorld,
};

/// How far a neighbour shape cascade may travel from the block that started it. Large enough
/// for legitimate chains, small enough that a runaway cascade can't exhaust the stack.
pub const NEIGHBOR_UPDATE_LIMIT: u32 = 512;

/// Write `block` at `position`, then apply whichever `side_effects` are enabled.
///
/// Returns `true` if the stored state changed, or if attached data was applied to the block
/// entity. Rewriting the state that is already there, with no attached data, is a no-op that
/// returns `false` and triggers nothing.
pub fn set_block<W, B>(
    world: &mut W,
    position: BlockPos,
    block: &B,
    side_effects: SideEffectSet,
) -> bool
where
    W: NativeWorld,
    B: BlockStateHolder + ?Sized,
{
    let pos = world
        .adapter()
        .new_block_pos(position.x, position.y, position.z);
    let chunk_coords = pos.chunk_coords();

    // First set the block
    let old = world.chunk(chunk_coords).block_state(pos);
    let mut new_state = world.adapter().to_native(block.block_state());
    // Settle the state against its neighbours now, instead of fixing it with a second write
    if side_effects.should_apply(SideEffect::Validation) {
        new_state = world.update_from_neighbour_shapes(&new_state, pos);
    }
    let change = world.chunk_mut(chunk_coords).set_block_state(
        pos,
        new_state.clone(),
        side_effects.should_apply(SideEffect::Update),
    );
    let mut successful = change.is_changed();

    // An unchanged block may still need its block entity data replaced
    if successful || old == new_state {
        if let Some(tag) = block.attached_data() {
            successful |= update_tile_entity(world, tag, pos);
        }
    }

    if successful {
        if side_effects.should_apply(SideEffect::Lighting) {
            world.update_lighting_for_block(pos);
        }
        mark_and_notify_block(world, pos, &old, &new_state, side_effects);
    }

    log::trace!(
        "set_block {} {:?} -> {:?}: {}",
        pos,
        old,
        new_state,
        successful
    );
    successful
}

/// Stamp `pos` into `tag` and load it into the block entity there.
pub fn update_tile_entity<W: NativeWorld>(world: &mut W, tag: &AttachedData, pos: BlockPos) -> bool {
    let tag = tag.stamped(pos);
    world.update_tile_entity(pos, &tag)
}

/// Apply side effects for a block that was already written by some other path, e.g. a section
/// replacement. `previous` is what the block was before.
pub fn apply_side_effects<W: NativeWorld>(
    world: &mut W,
    side_effects: SideEffectSet,
    position: BlockPos,
    previous: &BlockState,
) {
    let pos = world
        .adapter()
        .new_block_pos(position.x, position.y, position.z);
    let old = world.adapter().to_native(previous);
    let new = world.chunk(pos.chunk_coords()).block_state(pos);
    apply_side_effects_no_lookups(world, side_effects, pos, &old, &new);
}

/// Like [`apply_side_effects`], for callers that already hold both native states.
pub fn apply_side_effects_no_lookups<W: NativeWorld>(
    world: &mut W,
    side_effects: SideEffectSet,
    pos: BlockPos,
    old: &W::State,
    new: &W::State,
) {
    if side_effects.should_apply(SideEffect::Update) {
        world.update_block(pos, old, new);
    }

    if side_effects.should_apply(SideEffect::Lighting) {
        world.update_lighting_for_block(pos);
    }

    mark_and_notify_block(world, pos, old, new, side_effects);
}

/// Notify clients, simulation, neighbours and point-of-interest tracking about a change that
/// is already stored, as far as `side_effects` allow.
pub fn mark_and_notify_block<W: NativeWorld>(
    world: &mut W,
    pos: BlockPos,
    old: &W::State,
    new: &W::State,
    side_effects: SideEffectSet,
) {
    if world.chunk(pos.chunk_coords()).is_ticking() {
        if side_effects.should_apply(SideEffect::EntityAi) {
            world.notify_block_update(pos, old, new);
        } else if side_effects.should_apply(SideEffect::Network) {
            // A full update already syncs clients, so this is only needed without one
            world.mark_block_changed(pos);
        }
    }

    if side_effects.should_apply(SideEffect::Neighbors) {
        let events = side_effects.should_apply(SideEffect::Events);
        world.notify_neighbors(pos, old, new, events);
        world.update_neighbors(pos, old, new, NEIGHBOR_UPDATE_LIMIT, events);
    }

    if side_effects.should_apply(SideEffect::PoiUpdate) {
        world.on_block_state_change(pos, old, new);
    }
}

/// Bring block entities and section lighting in line with a section that was just swapped in
/// at `index`, replacing `old`.
///
/// Only the `modified` positions are visited. Remove/place callbacks and heightmaps are not
/// run here; callers apply the `UPDATE` side effect and one heightmap pass afterwards if they
/// want them.
#[tracing::instrument(level = "debug", skip_all, fields(index = index, modified = modified.len()))]
pub fn post_chunk_section_replacement<C: NativeChunk>(
    chunk: &mut C,
    index: usize,
    old: &C::Section,
    modified: &ChunkSectionMask,
) {
    let section_y = chunk.section_block_y(index);
    for local in modified.iter() {
        let old_state = old.block(local);
        let new_state = chunk.chunk_section(index).block(local);
        let y = section_y + local.y as i32;

        if !old_state.is_same_block_type(&new_state) && old_state.has_block_entity() {
            chunk.remove_block_entity(local.x, y, local.z);
        }

        if new_state.has_block_entity() {
            chunk.initialize_block_entity(local.x, y, local.z, &new_state);
        }
    }

    // Section air status only changes once per replacement, however many blocks moved it
    let was_only_air = old.is_only_air();
    let only_air = chunk.chunk_section(index).is_only_air();
    if was_only_air != only_air {
        chunk.update_lighting_for_section_air_change(index, only_air);
    }
    log::debug!(
        "replaced section {} of chunk {}: {} blocks, only_air {} -> {}",
        index,
        chunk.coords(),
        modified.len(),
        was_only_air,
        only_air
    );
}
