//! # Component Masks
//!
//! Growable bit-set indexed by [`ComponentId`]. One mask per live entity
//! records which components it holds; families keep three masks each for
//! their AllOf / NoneOf / AnyOf sets.
//!
//! 64 component types per `u64` word. Words are appended only when a bit
//! beyond the current length is set, so the common case (few component
//! types) stays a single word.

use super::component::ComponentId;

/// Growable bit-set over component ids.
///
/// Trailing zero words are insignificant: two masks with the same set bits
/// compare equal regardless of how many words each has grown to.
#[derive(Clone, Debug, Default)]
pub struct ComponentMask {
    /// 64 component bits per word.
    words: Vec<u64>,
}

impl ComponentMask {
    /// Creates an empty mask.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Builds a mask from a list of component ids.
    #[must_use]
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let mut mask = Self::new();
        for &id in ids {
            mask.insert(id);
        }
        mask
    }

    #[inline]
    const fn split(id: ComponentId) -> (usize, u64) {
        let index = id.index();
        (index / 64, 1u64 << (index % 64))
    }

    /// Sets the bit for `id`. Returns `true` if it was previously clear.
    #[inline]
    pub fn insert(&mut self, id: ComponentId) -> bool {
        let (word, bit) = Self::split(id);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_clear = self.words[word] & bit == 0;
        self.words[word] |= bit;
        was_clear
    }

    /// Clears the bit for `id`. Returns `true` if it was previously set.
    #[inline]
    pub fn remove(&mut self, id: ComponentId) -> bool {
        let (word, bit) = Self::split(id);
        match self.words.get_mut(word) {
            Some(w) if *w & bit != 0 => {
                *w &= !bit;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if the bit for `id` is set.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        let (word, bit) = Self::split(id);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Clears every bit, keeping the allocated words.
    #[inline]
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if every bit of `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.words.iter().enumerate().all(|(i, &bits)| {
            let ours = self.words.get(i).copied().unwrap_or(0);
            ours & bits == bits
        })
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Iterates over the set component ids in ascending order.
    #[must_use]
    pub fn iter(&self) -> MaskIter<'_> {
        MaskIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Significant words, with trailing zero words stripped.
    fn significant(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |last| last + 1);
        &self.words[..len]
    }
}

impl PartialEq for ComponentMask {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for ComponentMask {}

impl std::hash::Hash for ComponentMask {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

/// Iterator over the set bits of a [`ComponentMask`].
pub struct MaskIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for MaskIter<'_> {
    type Item = ComponentId;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                // Lowest set bit, then clear it
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1;
                return Some(ComponentId::from_index(self.word_idx * 64 + bit));
            }

            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
