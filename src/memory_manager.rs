use memmap::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// A memory manager to hide the underlying type of a graph file buffer.
pub enum MemoryManager {
    /// A memory buffer.
    Mem(Vec<u8>),
    /// A read-only memory mapped buffer.
    Mmap(Mmap),
    /// A memory mapped buffer.
    MmapMut(MmapMut),
}

impl MemoryManager {
    /// Reads the whole file into memory.
    pub fn read<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(MemoryManager::Mem(std::fs::read(path)?))
    }

    pub fn new_mmap<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            // Empty files cannot be mapped.
            return Ok(MemoryManager::Mem(Vec::new()));
        }
        Ok(MemoryManager::Mmap(unsafe { Mmap::map(&file)? }))
    }

    /// Creates (or truncates) the file at `path` with `size` bytes and maps it.
    pub fn new_mmap_mut<P: AsRef<Path>>(path: P, size: usize) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size as u64)?;
        if size == 0 {
            return Ok(MemoryManager::Mem(Vec::new()));
        }
        Ok(MemoryManager::MmapMut(unsafe { MmapMut::map_mut(&file)? }))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MemoryManager::Mem(vec) => vec.as_slice(),
            MemoryManager::Mmap(mmap) => &mmap[..],
            MemoryManager::MmapMut(mmap) => &mmap[..],
        }
    }

    /// Returns the writable bytes, or an error on a read-only mapping.
    pub fn as_bytes_mut(&mut self) -> std::io::Result<&mut [u8]> {
        match self {
            MemoryManager::Mem(vec) => Ok(vec.as_mut_slice()),
            MemoryManager::Mmap(_) => Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only mapping",
            )),
            MemoryManager::MmapMut(mmap) => Ok(&mut mmap[..]),
        }
    }

    /// Flushes outstanding writes to the backing file, if any.
    pub fn flush(&self) -> std::io::Result<()> {
        match self {
            MemoryManager::MmapMut(mmap) => mmap.flush(),
            _ => Ok(()),
        }
    }
}
