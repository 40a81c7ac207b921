//! Heap sizing and alignment configuration.
//!
//! Every stored block size and the header size itself are rounded up to the
//! configured alignment boundary. The heap reserves `align(max_heap_size)`
//! bytes once and never grows.

use crate::header::BlockHeader;

/// Default alignment boundary in bytes.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Default total heap budget in bytes.
pub const DEFAULT_MAX_HEAP_SIZE: usize = 1024 * 1024;

/// The kinds of errors that can occur when validating a [`HeapConfig`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("alignment is not a power of two: alignment={alignment}")]
    AlignmentNotPowerOfTwo { alignment: usize },
    #[display("alignment is smaller than the block header alignment: alignment={alignment}, min={min}")]
    AlignmentTooSmall { alignment: usize, min: usize },
    #[display("heap cannot hold a single block: max_heap_size={max_heap_size}, min={min}")]
    HeapTooSmall { max_heap_size: usize, min: usize },
    #[display("heap size overflows when aligned: max_heap_size={max_heap_size}, alignment={alignment}")]
    HeapSizeOverflow {
        max_heap_size: usize,
        alignment: usize,
    },
}

/// Alignment boundary and heap budget of a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    alignment: usize,
    max_heap_size: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl HeapConfig {
    /// [`DEFAULT_ALIGNMENT`] and [`DEFAULT_MAX_HEAP_SIZE`].
    pub const DEFAULT: Self = Self {
        alignment: DEFAULT_ALIGNMENT,
        max_heap_size: DEFAULT_MAX_HEAP_SIZE,
    };

    /// Creates a validated configuration.
    ///
    /// The alignment must be a power of two no smaller than the natural
    /// alignment of a block header, and the aligned heap must have room for
    /// one header followed by one aligned payload unit.
    pub fn new(alignment: usize, max_heap_size: usize) -> Result<Self, ConfigError> {
        if !alignment.is_power_of_two() {
            return Err(ConfigError::AlignmentNotPowerOfTwo { alignment });
        }
        let min_alignment = align_of::<BlockHeader>();
        if alignment < min_alignment {
            return Err(ConfigError::AlignmentTooSmall {
                alignment,
                min: min_alignment,
            });
        }

        let config = Self {
            alignment,
            max_heap_size,
        };
        let Some(reserved) = config.align(max_heap_size) else {
            return Err(ConfigError::HeapSizeOverflow {
                max_heap_size,
                alignment,
            });
        };
        let min = config.header_size() + alignment;
        if reserved < min {
            return Err(ConfigError::HeapTooSmall { max_heap_size, min });
        }

        Ok(config)
    }

    #[must_use]
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    #[must_use]
    pub const fn max_heap_size(&self) -> usize {
        self.max_heap_size
    }

    /// Rounds `size` up to the alignment boundary, or `None` on overflow.
    #[must_use]
    pub const fn align(&self, size: usize) -> Option<usize> {
        size.checked_next_multiple_of(self.alignment)
    }

    /// Size of a block header rounded up to the alignment boundary.
    #[must_use]
    pub const fn header_size(&self) -> usize {
        size_of::<BlockHeader>().next_multiple_of(self.alignment)
    }

    /// Number of bytes reserved for the heap region.
    #[must_use]
    pub const fn reserved_bytes(&self) -> usize {
        // validated in `new`; `DEFAULT` is aligned by construction
        self.max_heap_size.next_multiple_of(self.alignment)
    }
}
