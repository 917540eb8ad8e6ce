//! Raw page-addressed file I/O (spec.md §4.2).
//!
//! `PageFile` maps a `PageId` onto a byte offset in a single underlying
//! `std::fs::File`; `PageFilePool` bounds how many of those handles may be
//! open for one index at a time, matching `EngineConfig::max_page_file_count`.

use common::{DbError, DbResult, PageId};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

/// A single open data file addressed in fixed-size pages.
pub struct PageFile {
    file: File,
    page_size: usize,
    path: PathBuf,
}

impl PageFile {
    /// Open (creating if absent) the file at `path` for page-addressed I/O.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|_| DbError::FileOpenFailed)?;
        Ok(PageFile { file, page_size, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read page `pid` into `buf`, which must be exactly `page_size` bytes.
    /// Reading a page past the current end of file yields a zero-filled
    /// buffer, matching a freshly allocated page.
    pub fn read_page(&mut self, pid: PageId, buf: &mut [u8]) -> DbResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = self.offset_of(pid);
        buf.iter_mut().for_each(|b| *b = 0);
        self.file.seek(SeekFrom::Start(offset))?;
        match self.file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `buf` (exactly `page_size` bytes) to page `pid`, extending the
    /// file with implicit zero pages if `pid` lies past the current end.
    pub fn write_page(&mut self, pid: PageId, buf: &[u8]) -> DbResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = self.offset_of(pid);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Flush the file's in-process buffers and `fsync` to durable storage.
    pub fn sync(&mut self) -> DbResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn offset_of(&self, pid: PageId) -> u64 {
        (pid.0 as u64) * (self.page_size as u64)
    }
}

impl Drop for PageFile {
    fn drop(&mut self) {
        let _ = self.file.sync_data();
    }
}

/// Bounded pool of [`PageFile`] handles for one index, so the number of
/// concurrently open file descriptors stays under
/// `EngineConfig::max_page_file_count` regardless of concurrent readers.
pub struct PageFilePool {
    path: PathBuf,
    page_size: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

struct PoolState {
    idle: Vec<PageFile>,
    checked_out: usize,
    capacity: usize,
}

/// A handle borrowed from a [`PageFilePool`]; returns itself to the pool on drop.
pub struct PooledPageFile<'a> {
    pool: &'a PageFilePool,
    file: Option<PageFile>,
}

impl<'a> std::ops::Deref for PooledPageFile<'a> {
    type Target = PageFile;
    fn deref(&self) -> &PageFile {
        self.file.as_ref().expect("file taken only on drop")
    }
}

impl<'a> std::ops::DerefMut for PooledPageFile<'a> {
    fn deref_mut(&mut self) -> &mut PageFile {
        self.file.as_mut().expect("file taken only on drop")
    }
}

impl<'a> Drop for PooledPageFile<'a> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            self.pool.release(file);
        }
    }
}

impl PageFilePool {
    pub fn new(path: impl AsRef<Path>, page_size: usize, capacity: usize) -> Self {
        PageFilePool {
            path: path.as_ref().to_path_buf(),
            page_size,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                checked_out: 0,
                capacity,
            }),
            available: Condvar::new(),
        }
    }

    /// Acquire a handle, opening a fresh one if the pool has capacity left
    /// and no idle handle is available, otherwise blocking until one frees up.
    pub fn acquire(&self) -> DbResult<PooledPageFile<'_>> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(file) = state.idle.pop() {
                state.checked_out += 1;
                return Ok(PooledPageFile { pool: self, file: Some(file) });
            }
            if state.checked_out < state.capacity {
                state.checked_out += 1;
                drop(state);
                let file = PageFile::open(&self.path, self.page_size)?;
                return Ok(PooledPageFile { pool: self, file: Some(file) });
            }
            state = self.available.wait(state).unwrap();
        }
    }

    fn release(&self, file: PageFile) {
        let mut state = self.state.lock().unwrap();
        state.checked_out -= 1;
        state.idle.push(file);
        self.available.notify_one();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
