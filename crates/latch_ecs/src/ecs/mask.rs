// mask.rs - Fixed-capacity component bitsets
//
// A mask is the identity key of an archetype and the operand of every query
// filter, so it is a small Copy value that hashes and compares cheaply.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::ecs::component::ComponentTypeId;

const WORDS: usize = 4;

/// Number of distinct component types a mask can describe.
pub const MAX_COMPONENT_TYPES: usize = WORDS * 64;

/// One bit per registered component type id.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentMask {
    words: [u64; WORDS],
}

impl ComponentMask {
    pub const EMPTY: Self = Self { words: [0; WORDS] };

    pub fn new() -> Self {
        Self::EMPTY
    }

    pub fn from_ids(ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        let mut mask = Self::EMPTY;
        for id in ids {
            mask.insert(id);
        }
        mask
    }

    #[inline]
    fn slot(id: ComponentTypeId) -> (usize, u64) {
        let index = id.index();
        (index / 64, 1u64 << (index % 64))
    }

    #[inline]
    pub fn insert(&mut self, id: ComponentTypeId) {
        let (word, bit) = Self::slot(id);
        self.words[word] |= bit;
    }

    #[inline]
    pub fn remove(&mut self, id: ComponentTypeId) {
        let (word, bit) = Self::slot(id);
        self.words[word] &= !bit;
    }

    #[inline]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        let (word, bit) = Self::slot(id);
        self.words[word] & bit != 0
    }

    /// Copy of this mask with `id` set.
    #[must_use]
    pub fn with(mut self, id: ComponentTypeId) -> Self {
        self.insert(id);
        self
    }

    /// Copy of this mask with `id` cleared.
    #[must_use]
    pub fn without(mut self, id: ComponentTypeId) -> Self {
        self.remove(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words) {
            *w |= o;
        }
        Self { words }
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words) {
            *w &= o;
        }
        Self { words }
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words) {
            *w &= !o;
        }
        Self { words }
    }

    /// `self & other == other`
    #[inline]
    pub fn contains_all(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(s, o)| s & o == *o)
    }

    /// `self & other != 0`
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(s, o)| s & o != 0)
    }

    /// Set ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros();
                bits &= bits - 1;
                Some(ComponentTypeId::new((word_index * 64) as u16 + bit as u16))
            })
        })
    }

    pub fn words(&self) -> &[u64; WORDS] {
        &self.words
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(&rhs)
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(&rhs)
    }
}

impl FromIterator<ComponentTypeId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.raw())).finish()
    }
}
