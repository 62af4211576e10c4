//! The storage backend trait.

use crate::error::StorageResult;

/// An append-only byte store with positional reads.
///
/// The record log writes one framed record per [`append`](Self::append)
/// call and replays the whole backend front to back on open. Backends must
/// therefore preserve bytes exactly and in append order.
///
/// # Invariants
///
/// - `append` returns the offset of the first byte written
/// - after `append` returns, `size()` has grown by exactly `data.len()`
/// - `read_at` returns the bytes previously appended at that offset
/// - `sync` makes every appended byte survive process termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range is not fully inside the backend, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to stable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Current size in bytes; also the offset of the next append.
    fn size(&self) -> StorageResult<u64>;

    /// Discards every byte at or after `new_size`.
    ///
    /// Recovery uses this to cut a torn trailing record off the log.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::TruncateBeyondEnd`](crate::StorageError::TruncateBeyondEnd)
    /// when `new_size` exceeds the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Reads the whole backend.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }
}
