//! The block header stored in front of every block.

use dataview::{DataView, Pod};

/// Link value meaning "no neighbor".
pub(crate) const NIL: usize = usize::MAX;

/// In-place record prefixing every block, free or allocated.
///
/// `size` is the aligned payload capacity that follows the header. `next` and
/// `prev` are byte offsets of the neighboring free blocks and are meaningful
/// only while the block is on the free list.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub(crate) struct BlockHeader {
    pub(crate) size: usize,
    pub(crate) next: usize,
    pub(crate) prev: usize,
}

impl BlockHeader {
    pub(crate) const fn unlinked(size: usize) -> Self {
        Self {
            size,
            next: NIL,
            prev: NIL,
        }
    }

    pub(crate) fn read(bytes: &[u8], offset: usize) -> Self {
        DataView::from(bytes).read(offset)
    }

    pub(crate) fn write(&self, bytes: &mut [u8], offset: usize) {
        DataView::from_mut(bytes).write(offset, self);
    }
}

/// Converts a stored link into an optional offset.
pub(crate) fn link(raw: usize) -> Option<usize> {
    (raw != NIL).then_some(raw)
}

/// Converts an optional offset into a stored link.
pub(crate) fn raw_link(offset: Option<usize>) -> usize {
    offset.unwrap_or(NIL)
}
