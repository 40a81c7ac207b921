//! The fixed byte region backing a heap.

use std::collections::TryReserveError;

use snafu::{ResultExt as _, Snafu};
use snafu_utils::{HasLocation, Location};

#[derive(Debug, Snafu)]
#[snafu(display("cannot reserve heap region: bytes={bytes}"))]
pub struct ReserveError {
    bytes: usize,
    #[snafu(implicit)]
    location: Location,
    source: TryReserveError,
}

impl HasLocation for ReserveError {
    fn location(&self) -> Location {
        self.location
    }
}

impl ReserveError {
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

/// A zero-filled byte range acquired once and never resized.
pub(crate) struct HeapRegion {
    bytes: Box<[u8]>,
}

impl HeapRegion {
    /// Reserves `bytes` bytes from the system allocator.
    ///
    /// Failure is reported instead of aborting the process.
    pub(crate) fn reserve(bytes: usize) -> Result<Self, ReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).context(ReserveSnafu { bytes })?;
        buf.resize(bytes, 0);
        Ok(Self {
            bytes: buf.into_boxed_slice(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
