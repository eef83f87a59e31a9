//! Read-only windows over a module's linear memory.
//!
//! A [`MemoryView`] borrows the module it was taken from, so it cannot outlive the
//! next `&mut` call into that module. Memory can grow (and move) during any such
//! call; callers take a fresh view afterwards instead of holding on to bytes.

use pixelport_core::{PortError, PortResult};

#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    data: &'a [u8],
}

impl<'a> MemoryView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Current size of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the little-endian `u32` stored at `address`.
    pub fn read_u32(&self, address: u32) -> PortResult<u32> {
        let bytes = self.bytes(address as u64, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(word))
    }

    /// Borrow `length` bytes starting at `offset`.
    pub fn bytes(&self, offset: u64, length: u64) -> PortResult<&'a [u8]> {
        let out_of_bounds = || PortError::OutOfBounds {
            offset,
            length,
            memory_size: self.data.len(),
        };
        let end = offset.checked_add(length).ok_or_else(out_of_bounds)?;
        if end > self.data.len() as u64 {
            return Err(out_of_bounds());
        }
        Ok(&self.data[offset as usize..end as usize])
    }
}
