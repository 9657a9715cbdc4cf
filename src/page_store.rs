//! Page store (C3): a fixed-page-size file with a header block plus
//! appended blocks. The only component that accounts I/O cost; every
//! `read_block`/`write_block` is meant to be wrapped by a caller that
//! increments a `QueryContext` I/O counter (see `external.rs`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{AfnError, Result};

/// Minimum number of B+-leaf entries a page must be able to hold (§6,
/// `-B` flag constraint): configuration error otherwise.
pub const MIN_LEAF_CAPACITY: usize = 50;

/// Fixed-size page file: block 0 is reserved for the header (page size,
/// block count, and a small user-defined header payload); blocks
/// `1..block_count` are appended data blocks of exactly `page_size` bytes.
pub struct PageStore {
    file: File,
    path: PathBuf,
    page_size: usize,
    block_count: u64,
}

const HEADER_MAGIC: u32 = 0x5241_4C53; // "RALS"

impl PageStore {
    /// Creates a new page file, writing the reserved header block.
    pub fn create(path: impl AsRef<Path>, page_size: usize, user_header: &[u8]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if user_header.len() + 16 > page_size {
            return Err(AfnError::Config(format!(
                "page size {page_size} too small to hold the user header ({} bytes)",
                user_header.len()
            )));
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| AfnError::io("create", &path, e))?;

        let mut header = vec![0u8; page_size];
        header[0..4].copy_from_slice(&HEADER_MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&(page_size as u32).to_le_bytes());
        header[8..16].copy_from_slice(&0u64.to_le_bytes()); // block_count, patched on flush
        header[16..16 + user_header.len()].copy_from_slice(user_header);
        file.write_all(&header)
            .map_err(|e| AfnError::io("write", &path, e))?;
        file.flush().map_err(|e| AfnError::io("write", &path, e))?;

        Ok(Self {
            file,
            path,
            page_size,
            block_count: 0,
        })
    }

    /// Opens an existing page file, reading back the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| AfnError::io("open", &path, e))?;

        let mut probe = [0u8; 16];
        file.read_exact(&mut probe)
            .map_err(|e| AfnError::io("read", &path, e))?;
        let page_size = u32::from_le_bytes(probe[4..8].try_into().unwrap()) as usize;
        let block_count = u64::from_le_bytes(probe[8..16].try_into().unwrap());

        Ok(Self {
            file,
            path,
            page_size,
            block_count,
        })
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Reads back the `len` bytes of user-defined header payload written at
    /// `create` time (the region starting right after the 16-byte fixed
    /// header).
    pub fn read_user_header(&mut self, len: usize) -> Result<Vec<u8>> {
        if 16 + len > self.page_size {
            return Err(AfnError::Invariant(format!(
                "read_user_header: {len} bytes would overflow the header block"
            )));
        }
        let mut buf = vec![0u8; len];
        self.file
            .seek(SeekFrom::Start(16))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        self.file
            .read_exact(&mut buf)
            .map_err(|e| AfnError::io("read", &self.path, e))?;
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        Ok(buf)
    }

    fn offset_of(&self, block: u64) -> u64 {
        // block 0 is the header; data block `i` (1-based here) lives at (i+1)*page_size
        (block + 1) * self.page_size as u64
    }

    /// Appends `bytes` (must be exactly `page_size` long) as a new block,
    /// returning its block index.
    pub fn append_block(&mut self, bytes: &[u8]) -> Result<u64> {
        if bytes.len() != self.page_size {
            return Err(AfnError::Invariant(format!(
                "append_block: expected {} bytes, got {}",
                self.page_size,
                bytes.len()
            )));
        }
        let idx = self.block_count;
        let offset = self.offset_of(idx);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| AfnError::io("write", &self.path, e))?;
        self.block_count += 1;
        self.write_block_count()?;
        Ok(idx)
    }

    /// Reads block `idx` into `buf` (must be exactly `page_size` long).
    pub fn read_block(&mut self, idx: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.page_size {
            return Err(AfnError::Invariant(format!(
                "read_block: expected buffer of {} bytes, got {}",
                self.page_size,
                buf.len()
            )));
        }
        if idx >= self.block_count {
            return Err(AfnError::Invariant(format!(
                "read_block: block {idx} out of range (have {})",
                self.block_count
            )));
        }
        let offset = self.offset_of(idx);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        self.file
            .read_exact(buf)
            .map_err(|e| AfnError::io("read", &self.path, e))?;
        Ok(())
    }

    /// Overwrites an existing block `idx` with `bytes` (must be exactly
    /// `page_size` long).
    pub fn write_block(&mut self, idx: u64, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.page_size {
            return Err(AfnError::Invariant(format!(
                "write_block: expected {} bytes, got {}",
                self.page_size,
                bytes.len()
            )));
        }
        if idx >= self.block_count {
            return Err(AfnError::Invariant(format!(
                "write_block: block {idx} out of range (have {})",
                self.block_count
            )));
        }
        let offset = self.offset_of(idx);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| AfnError::io("write", &self.path, e))?;
        Ok(())
    }

    fn write_block_count(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(8))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        self.file
            .write_all(&self.block_count.to_le_bytes())
            .map_err(|e| AfnError::io("write", &self.path, e))?;
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| AfnError::io("seek", &self.path, e))?;
        Ok(())
    }
}
