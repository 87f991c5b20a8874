use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

use super::ConfigFs;

/// One-shot fault applied to the next write of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFault {
    /// The write fails outright and nothing is stored.
    Fail,
    /// Only the first `n` bytes are stored.
    Short(usize),
    /// The write reports success but the byte at this offset is flipped.
    FlipByte(usize),
    /// The write reports success but these bytes are stored instead.
    Replace(Vec<u8>),
}

/// In-memory file store for tests.
///
/// Supports:
/// - one-shot write faults per file (failure, short write, silent corruption)
/// - persistent read failures per file
/// - write counters for asserting heal and rollback behavior
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
    write_faults: HashMap<String, Vec<WriteFault>>,
    unreadable: HashSet<String>,
    write_counts: HashMap<String, usize>,
}

impl MemoryFs {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without counting it as a write.
    pub fn with_file(mut self, name: &str, data: impl AsRef<[u8]>) -> Self {
        self.files.insert(name.to_string(), data.as_ref().to_vec());
        self
    }

    /// Queue a fault for the next write of `name`. Faults apply in order.
    pub fn inject_write_fault(&mut self, name: &str, fault: WriteFault) {
        self.write_faults
            .entry(name.to_string())
            .or_default()
            .push(fault);
    }

    /// Make every read of `name` fail until cleared.
    pub fn set_unreadable(&mut self, name: &str, unreadable: bool) {
        if unreadable {
            self.unreadable.insert(name.to_string());
        } else {
            self.unreadable.remove(name);
        }
    }

    /// Overwrite stored bytes directly (simulates external corruption).
    pub fn corrupt(&mut self, name: &str, offset: usize, bytes: &[u8]) {
        if let Some(data) = self.files.get_mut(name) {
            for (i, b) in bytes.iter().enumerate() {
                if let Some(slot) = data.get_mut(offset + i) {
                    *slot = *b;
                }
            }
        }
    }

    /// Stored bytes of `name`.
    pub fn contents(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Stored text of `name`, if it is valid UTF-8.
    pub fn contents_str(&self, name: &str) -> Option<&str> {
        self.contents(name).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Number of writes that reached `name`, including faulty ones.
    pub fn write_count(&self, name: &str) -> usize {
        self.write_counts.get(name).copied().unwrap_or(0)
    }

    fn next_fault(&mut self, name: &str) -> Option<WriteFault> {
        let queue = self.write_faults.get_mut(name)?;
        if queue.is_empty() {
            return None;
        }
        Some(queue.remove(0))
    }
}

impl ConfigFs for MemoryFs {
    fn read(&mut self, name: &str) -> io::Result<Vec<u8>> {
        if self.unreadable.contains(name) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected read failure on {}", name),
            ));
        }
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", name)))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> io::Result<usize> {
        *self.write_counts.entry(name.to_string()).or_default() += 1;
        match self.next_fault(name) {
            None => {
                self.files.insert(name.to_string(), data.to_vec());
                Ok(data.len())
            }
            Some(WriteFault::Fail) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected write failure on {}", name),
            )),
            Some(WriteFault::Short(n)) => {
                let n = n.min(data.len());
                self.files.insert(name.to_string(), data[..n].to_vec());
                Ok(n)
            }
            Some(WriteFault::FlipByte(offset)) => {
                let mut stored = data.to_vec();
                if let Some(b) = stored.get_mut(offset) {
                    *b ^= 0xFF;
                }
                self.files.insert(name.to_string(), stored);
                Ok(data.len())
            }
            Some(WriteFault::Replace(bytes)) => {
                self.files.insert(name.to_string(), bytes);
                Ok(data.len())
            }
        }
    }

    fn append(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        self.files
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn size(&self, name: &str) -> Option<u64> {
        self.files.get(name).map(|d| d.len() as u64)
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", name)))
    }
}
