//! Read-only views of the free list for diagnostics.

use core::fmt;

use log::debug;

use crate::{
    Heap,
    free_list::{FreeBlock, FreeBlocks, FreeList},
};

/// Borrowed view of a heap's free list.
///
/// Displays one line per free block, head to tail. An uninitialized heap has
/// an empty view.
#[derive(Clone, Copy)]
pub struct FreeListView<'a> {
    list: Option<&'a FreeList>,
}

impl<'a> FreeListView<'a> {
    #[must_use]
    pub fn iter(&self) -> FreeBlocks<'a> {
        match self.list {
            Some(list) => list.iter(),
            None => FreeBlocks::empty(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.and_then(FreeList::head).is_none()
    }
}

impl<'a> IntoIterator for FreeListView<'a> {
    type Item = FreeBlock;
    type IntoIter = FreeBlocks<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for FreeListView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.iter() {
            writeln!(f, "{}", BlockFormat(&block))?;
        }
        Ok(())
    }
}

struct BlockFormat<'a>(&'a FreeBlock);

struct LinkFormat(Option<usize>);

impl fmt::Display for LinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(offset) => write!(f, "{offset:#x}"),
            None => f.write_str("nil"),
        }
    }
}

impl fmt::Display for BlockFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let block = self.0;
        write!(
            f,
            "free block: size={}, offset={:#x}, prev={}, next={}",
            block.size,
            block.offset,
            LinkFormat(block.prev),
            LinkFormat(block.next)
        )
    }
}

impl Heap {
    /// Returns a read-only view of the free list.
    #[must_use]
    pub fn free_list(&self) -> FreeListView<'_> {
        FreeListView { list: self.list() }
    }

    /// Logs every free block at debug level, head to tail.
    ///
    /// Compiles to nothing without `debug_assertions`.
    pub fn dump(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let view = self.free_list();
        debug!("free list: {} block(s)", view.len());
        for block in view {
            debug!("\t{}", BlockFormat(&block));
        }
    }
}
