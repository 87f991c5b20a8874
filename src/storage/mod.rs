//! File primitives the configuration store runs on.
//!
//! [`ConfigFs`] is the only seam between the store and a concrete file
//! system. Names are flat file names relative to the store root.
//!
//! - [`DiskFs`]: a directory on the host file system.
//! - [`MemoryFs`]: an in-memory map with fault injection, for tests.

mod disk;
mod memory;

pub use disk::DiskFs;
pub use memory::{MemoryFs, WriteFault};

use std::io;

/// Flat file store used for configuration files and the save journal.
pub trait ConfigFs {
    /// Read a whole file.
    fn read(&mut self, name: &str) -> io::Result<Vec<u8>>;

    /// Replace a file, returning the number of bytes actually stored.
    ///
    /// A count below `data.len()` is a short write.
    fn write(&mut self, name: &str, data: &[u8]) -> io::Result<usize>;

    /// Append to a file, creating it when missing.
    fn append(&mut self, name: &str, data: &[u8]) -> io::Result<()>;

    /// True when `name` exists.
    fn exists(&self, name: &str) -> bool;

    /// Size in bytes, `None` when the file does not exist.
    fn size(&self, name: &str) -> Option<u64>;

    /// Delete a file.
    fn remove(&mut self, name: &str) -> io::Result<()>;
}

impl<T: ConfigFs + ?Sized> ConfigFs for &mut T {
    fn read(&mut self, name: &str) -> io::Result<Vec<u8>> {
        (**self).read(name)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> io::Result<usize> {
        (**self).write(name, data)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        (**self).append(name, data)
    }

    fn exists(&self, name: &str) -> bool {
        (**self).exists(name)
    }

    fn size(&self, name: &str) -> Option<u64> {
        (**self).size(name)
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        (**self).remove(name)
    }
}
