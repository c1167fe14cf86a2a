use crate::coords::{BIndex, SECTION_BLOCK_COUNT};

const WORDS: usize = SECTION_BLOCK_COUNT / u64::BITS as usize;

/// The set of positions touched inside one section, one bit per block.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ChunkSectionMask {
    bits: [u64; WORDS],
}

impl ChunkSectionMask {
    pub const fn new() -> Self {
        Self { bits: [0; WORDS] }
    }

    #[inline]
    fn locate(index: BIndex) -> (usize, u64) {
        let flat = index.to_flat_index();
        (flat / u64::BITS as usize, 1 << (flat % u64::BITS as usize))
    }

    pub fn set(&mut self, index: BIndex) {
        let (word, bit) = Self::locate(index);
        self.bits[word] |= bit;
    }

    pub fn union_with(&mut self, other: &ChunkSectionMask) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Set positions in `(Y, Z, X)` order.
    pub fn iter(&self) -> impl Iterator<Item = BIndex> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, word)| **word != 0)
            .flat_map(|(i, &word)| {
                let mut remaining = word;
                std::iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let bit = remaining.trailing_zeros() as usize;
                    remaining &= remaining - 1;
                    Some(BIndex::from_flat_index(i * u64::BITS as usize + bit))
                })
            })
    }
}

impl Default for ChunkSectionMask {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<BIndex> for ChunkSectionMask {
    fn from_iter<I: IntoIterator<Item = BIndex>>(iter: I) -> Self {
        let mut mask = Self::new();
        for index in iter {
            mask.set(index);
        }
        mask
    }
}

impl std::fmt::Debug for ChunkSectionMask {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ChunkSectionMask[{} set]", self.len())
    }
}
