//! Sliding receive buffer
//!
//! A fixed-capacity byte buffer whose live window is `data[offset..offset + count]`.
//! Bytes before `offset` have been consumed; bytes after the window are free
//! space for the next transport read.

use crate::connection::cancellable;
use rawsocket_core::error::FrameError;
use rawsocket_core::{Error, Result, TransportRead};
use tokio_util::sync::CancellationToken;

pub(crate) struct ReceiveBuffer {
    data: Box<[u8]>,
    offset: usize,
    count: usize,
}

impl ReceiveBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
            count: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Unconsumed bytes
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.count]
    }

    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.count);
        self.offset += n;
        self.count -= n;
        if self.count == 0 {
            self.offset = 0;
        }
    }

    /// Shift the live window to offset 0 if `min` bytes would not fit after it.
    fn make_room(&mut self, min: usize) {
        if self.offset + min > self.capacity() {
            self.data
                .copy_within(self.offset..self.offset + self.count, 0);
            self.offset = 0;
        }
    }

    /// Read from `reader` until at least `min` unconsumed bytes are buffered.
    pub(crate) async fn fill(
        &mut self,
        reader: &mut dyn TransportRead,
        min: usize,
        cancel: &CancellationToken,
        disposed: &CancellationToken,
    ) -> Result<()> {
        if self.count >= min {
            return Ok(());
        }
        if min > self.capacity() {
            return Err(FrameError::ExceedsReceiveBuffer {
                needed: min,
                capacity: self.capacity(),
            }
            .into());
        }

        self.make_room(min);
        while self.count < min {
            let start = self.offset + self.count;
            let n = cancellable(reader.read(&mut self.data[start..]), cancel, disposed).await?;
            if n == 0 {
                return Err(Error::UnexpectedEof {
                    needed: min,
                    have: self.count,
                });
            }
            self.count += n;
        }
        Ok(())
    }
}
