/*
Coordinate notes:

- A chunk is a 16-wide column; chunk coordinates are block coordinates shifted right by 4.
- A section's blocks are ordered by (Y, Z, X), i.e. flat index = y << 8 | z << 4 | x.
 */

use std::cmp::Ordering;

pub const CHUNK_SIZE: u32 = 16;
pub const SECTION_BLOCK_COUNT: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;
pub const CHUNK_COLUMN_COUNT: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Global block coordinates.
#[derive(
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    derive_more::Debug,
    derive_more::Display,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::Sub,
    derive_more::SubAssign,
)]
#[debug("BlockPos({x}, {y}, {z})")]
#[display("<x={x} y={y} z={z}>")]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    #[inline]
    pub const fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    #[inline]
    pub const fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    #[inline]
    pub const fn north(self) -> Self {
        self.offset(0, 0, -1)
    }

    #[inline]
    pub const fn south(self) -> Self {
        self.offset(0, 0, 1)
    }

    #[inline]
    pub const fn east(self) -> Self {
        self.offset(1, 0, 0)
    }

    #[inline]
    pub const fn west(self) -> Self {
        self.offset(-1, 0, 0)
    }

    /// The six face-adjacent positions: west, east, below, above, north, south.
    pub const fn neighbors(self) -> [BlockPos; 6] {
        [
            self.west(),
            self.east(),
            self.down(),
            self.up(),
            self.north(),
            self.south(),
        ]
    }

    /// Coordinates of the chunk column containing this block.
    #[inline]
    pub const fn chunk_coords(self) -> CCoords {
        CCoords::new(self.x >> 4, self.z >> 4)
    }

    /// Index of this block within its 16x16x16 section.
    #[inline]
    pub const fn section_index(self) -> BIndex {
        BIndex::new(
            (self.x & 0xF) as u32,
            (self.y & 0xF) as u32,
            (self.z & 0xF) as u32,
        )
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl Ord for BlockPos {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.z, self.x).cmp(&(other.y, other.z, other.x))
    }
}

impl PartialOrd for BlockPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Global chunk coordinates.
#[derive(
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    derive_more::Debug,
    derive_more::Display,
    derive_more::Add,
    derive_more::Sub,
)]
#[debug("CCoords({x}, {z})")]
#[display("<x={x} z={z}>")]
pub struct CCoords {
    pub x: i32,
    pub z: i32,
}

impl CCoords {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World block X of the column at local `x` within this chunk.
    #[inline]
    pub const fn block_x(self, x: u32) -> i32 {
        self.x * CHUNK_SIZE as i32 + x as i32
    }

    /// World block Z of the column at local `z` within this chunk.
    #[inline]
    pub const fn block_z(self, z: u32) -> i32 {
        self.z * CHUNK_SIZE as i32 + z as i32
    }
}

impl From<(i32, i32)> for CCoords {
    fn from((x, z): (i32, i32)) -> Self {
        Self::new(x, z)
    }
}

impl Ord for CCoords {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.z, self.x).cmp(&(other.z, other.x))
    }
}

impl PartialOrd for CCoords {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 3D block index within a section, each component in `0..16`.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, derive_more::Debug, derive_more::Display)]
#[debug("BIndex({x}, {y}, {z})")]
#[display("<x={x} y={y} z={z}>")]
pub struct BIndex {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl BIndex {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub fn to_flat_index(self) -> usize {
        debug_assert!(
            self.x < CHUNK_SIZE && self.y < CHUNK_SIZE && self.z < CHUNK_SIZE,
            "not a valid section block index: {self}"
        );
        (self.y * CHUNK_SIZE * CHUNK_SIZE + self.z * CHUNK_SIZE + self.x) as usize
    }

    pub fn from_flat_index(index: usize) -> Self {
        assert!(
            index < SECTION_BLOCK_COUNT,
            "not a valid section block index"
        );
        let x = index & 0xF;
        let z = (index >> 4) & 0xF;
        let y = (index >> 8) & 0xF;
        Self::new(x as u32, y as u32, z as u32)
    }

    /// Index of this block's column within a chunk's 16x16 footprint.
    #[inline]
    pub fn to_column_index(self) -> usize {
        (self.z * CHUNK_SIZE + self.x) as usize
    }
}

impl Ord for BIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_flat_index().cmp(&other.to_flat_index())
    }
}

impl PartialOrd for BIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
