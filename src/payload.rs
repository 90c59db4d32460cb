//! An owned, stack-allocated view of an entry's data words.

use crate::bin::MAX_DATA_WORDS;

/// Up to 15 32-bit data words, copied out of a table's column-major
/// storage. A key's data is never contiguous in memory -- it's stored
/// column-major, one word per cache line -- so reads hand back an owned
/// copy rather than a borrowed slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payload {
    len: usize,
    words: [u32; MAX_DATA_WORDS],
}

impl Payload {
    pub(crate) fn from_slice(words: &[u32]) -> Self {
        debug_assert!(words.len() <= MAX_DATA_WORDS);
        let mut buf = [0u32; MAX_DATA_WORDS];
        buf[..words.len()].copy_from_slice(words);
        Self { len: words.len(), words: buf }
    }
}

impl std::ops::Deref for Payload {
    type Target = [u32];
    fn deref(&self) -> &[u32] {
        &self.words[..self.len]
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", &self.words[..self.len])
    }
}
