use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info};

use crate::error::{Result, SegmentError};

/// A fixed-length byte region shared with the peer process.
///
/// Segments are mapped once and never grown or shrunk. A segment created by
/// this process from a path removes its backing file on drop; a segment
/// opened from an existing file leaves it in place.
pub struct Segment {
    map: MmapMut,
    path: Option<PathBuf>,
    cleanup_on_drop: bool,
}

impl Segment {
    /// Map an anonymous region of `len` bytes.
    ///
    /// Useful when both ends of the stream live in one process, and in tests.
    pub fn anonymous(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(SegmentError::EmptySegment);
        }
        let map = MmapMut::map_anon(len)?;
        debug!(len, "mapped anonymous segment");
        Ok(Self {
            map,
            path: None,
            cleanup_on_drop: false,
        })
    }

    /// Create a file of `len` bytes at `path` and map it read/write.
    ///
    /// A stale file at `path` is removed first.
    pub fn create(path: impl AsRef<Path>, len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if len == 0 {
            return Err(SegmentError::EmptySegment);
        }

        if path.exists() {
            debug!(?path, "removing stale segment file");
            std::fs::remove_file(&path).map_err(|e| SegmentError::Map {
                path: path.clone(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| SegmentError::Map {
                path: path.clone(),
                source: e,
            })?;
        file.set_len(len as u64).map_err(|e| SegmentError::Map {
            path: path.clone(),
            source: e,
        })?;

        // SAFETY: the file was created by this call with `create_new` and sized
        // to `len`, so no other mapping of it can exist yet.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }.map_err(|e| {
            SegmentError::Map {
                path: path.clone(),
                source: e,
            }
        })?;

        info!(?path, len, "created segment");

        Ok(Self {
            map,
            path: Some(path),
            cleanup_on_drop: true,
        })
    }

    /// Map an existing segment file at its current length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SegmentError::Map {
                path: path.clone(),
                source: e,
            })?;
        let len = file
            .metadata()
            .map_err(|e| SegmentError::Map {
                path: path.clone(),
                source: e,
            })?
            .len() as usize;
        if len == 0 {
            return Err(SegmentError::EmptySegment);
        }

        // SAFETY: the mapping length matches the file length observed above.
        // The peer owns the file's lifecycle and does not truncate it while mapped.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }.map_err(|e| {
            SegmentError::Map {
                path: path.clone(),
                source: e,
            }
        })?;

        debug!(?path, len, "opened segment");

        Ok(Self {
            map,
            path: Some(path),
            cleanup_on_drop: false,
        })
    }

    /// Segment length in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Always false: zero-length segments are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Backing file path, if the segment is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Control whether the backing file is removed when the segment drops.
    pub fn set_cleanup_on_drop(&mut self, cleanup: bool) {
        self.cleanup_on_drop = cleanup;
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check_bounds(offset, len)?;
        Ok(&self.map[offset..offset + len])
    }

    /// Copy `bytes` into the segment at `offset`.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_bounds(offset, bytes.len())?;
        self.map[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Flush outstanding writes to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.map.len() => Ok(()),
            _ => Err(SegmentError::OutOfBounds {
                offset,
                len,
                capacity: self.map.len(),
            }),
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if !self.cleanup_on_drop {
            return;
        }
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(?path, "removed segment file"),
                Err(err) => debug!(?path, error = %err, "segment file cleanup failed"),
            }
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("len", &self.map.len())
            .field("path", &self.path)
            .field("cleanup_on_drop", &self.cleanup_on_drop)
            .finish()
    }
}
