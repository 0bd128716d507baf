//! Reusable read buffer for the verification loop.

use crate::error::{Result, VerifyError};

/// Owned byte region plus the count of bytes that currently hold payload.
///
/// The region only ever grows. Growing discards the valid-size marker, so
/// callers must repopulate the buffer after a resize that changed capacity.
#[derive(Debug)]
pub(crate) struct StorageBuffer {
    data: Vec<u8>,
    valid_size: usize,
}

impl StorageBuffer {
    /// Allocate a zeroed buffer of `size` bytes. A size of zero is allowed.
    pub(crate) fn initialize(size: usize) -> Result<Self> {
        let data = allocate(size, "unable to create raw buffer")?;
        Ok(Self {
            data,
            valid_size: 0,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Grow to at least `size` bytes; smaller or equal sizes are a no-op.
    pub(crate) fn resize(&mut self, size: usize) -> Result<()> {
        if size <= self.data.len() {
            return Ok(());
        }
        check_size(size, "invalid buffer size value exceeds maximum")?;
        let additional = size - self.data.len();
        self.data
            .try_reserve_exact(additional)
            .map_err(|err| VerifyError::Memory {
                message: "unable to reallocate read buffer".to_string(),
                source: Some(err),
            })?;
        self.data.resize(size, 0);
        self.valid_size = 0;
        Ok(())
    }

    /// Writable window of the first `len` bytes, for a source to read into.
    pub(crate) fn as_mut_slice(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.data.len());
        &mut self.data[..len]
    }

    pub(crate) fn set_valid_size(&mut self, size: usize) {
        debug_assert!(size <= self.data.len(), "valid size exceeds capacity");
        self.valid_size = size.min(self.data.len());
    }

    /// The payload currently held, with its length.
    pub(crate) fn get_data(&self) -> (&[u8], usize) {
        (&self.data[..self.valid_size], self.valid_size)
    }

    /// Release the storage. Consuming `self` rules out a second free.
    pub(crate) fn free(self) {
        drop(self);
    }
}

fn check_size(size: usize, message: &str) -> Result<()> {
    if size > isize::MAX as usize {
        return Err(VerifyError::Memory {
            message: message.to_string(),
            source: None,
        });
    }
    Ok(())
}

fn allocate(size: usize, message: &str) -> Result<Vec<u8>> {
    check_size(size, "invalid buffer size value exceeds maximum")?;
    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|err| VerifyError::Memory {
            message: message.to_string(),
            source: Some(err),
        })?;
    data.resize(size, 0);
    Ok(data)
}
