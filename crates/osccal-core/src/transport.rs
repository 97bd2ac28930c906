//! Byte transport to the MPSSE engine
//!
//! A backend opens the adapter, resets it, selects the interface and puts it
//! into MPSSE mode before handing it out as a [`Transport`]. From then on the
//! sequencer only writes command batches and reads back sampled bytes.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::Result;

/// Blocking write/read access to an MPSSE engine
pub trait Transport {
    /// Write a command batch
    ///
    /// Returns once the whole batch has been handed to the adapter.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes of sampled data
    ///
    /// Blocks until the buffer is full or the transfer fails.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Read exactly `len` bytes into a new buffer
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(&mut buf)?;
        Ok(buf)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }
}
