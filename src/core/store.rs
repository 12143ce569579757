// Byte-range storage handles (file, mmap, memory) and the factories that open them.
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use memmap2::MmapMut;

use crate::core::error::{Error, ErrorKind};
use crate::core::span::Extent;

/// Positional read/write access to one backing file.
pub trait Store: Send {
    /// Fills `buf` from `offset`; bytes past the end of the backing data read as zero.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error>;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), Error>;

    fn sync(&mut self) -> Result<(), Error>;

    fn read_extent(&mut self, extent: Extent) -> Result<Vec<u8>, Error> {
        let first = extent.first();
        let mut out = vec![0u8; extent.len() as usize];
        let split = first.len() as usize;
        self.read_at(first.from, &mut out[..split])?;
        if let Some(second) = extent.second() {
            self.read_at(second.from, &mut out[split..])?;
        }
        Ok(out)
    }

    fn write_extent(&mut self, extent: Extent, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() as u64 != extent.len() {
            return Err(Error::new(ErrorKind::CorruptRange)
                .with_message(format!(
                    "extent holds {} bytes, got {}",
                    extent.len(),
                    bytes.len()
                ))
                .with_offset(extent.first().from));
        }
        let first = extent.first();
        let split = first.len() as usize;
        self.write_at(first.from, &bytes[..split])?;
        if let Some(second) = extent.second() {
            self.write_at(second.from, &bytes[split..])?;
        }
        Ok(())
    }
}

/// Opens stores by path so the engine and its iterators can share a backing file.
pub trait StoreFactory: Send + Sync {
    /// Opens (creating if needed) a store holding at least `len` bytes.
    fn open(&self, path: &Path, len: u64) -> Result<Box<dyn Store>, Error>;

    fn exists(&self, path: &Path) -> bool;

    /// Current length of the backing file, `None` when it does not exist.
    fn file_len(&self, path: &Path) -> Option<u64>;
}

fn io_error(path: &Path, err: io::Error) -> Error {
    let kind = match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    };
    Error::new(kind).with_path(path).with_source(err)
}

fn open_sized(path: &Path, len: u64) -> Result<File, Error> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| io_error(path, err))?;
    let actual = file
        .metadata()
        .map(|meta| meta.len())
        .map_err(|err| io_error(path, err))?;
    if actual < len {
        file.set_len(len).map_err(|err| io_error(path, err))?;
    }
    Ok(file)
}

pub struct FileStore {
    path: PathBuf,
    file: File,
}

impl Store for FileStore {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|err| io_error(&self.path, err).with_offset(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(io_error(&self.path, err).with_offset(offset)),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), Error> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|err| io_error(&self.path, err).with_offset(offset))?;
        self.file
            .write_all(buf)
            .map_err(|err| io_error(&self.path, err).with_offset(offset))
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.file.sync_data().map_err(|err| io_error(&self.path, err))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FileStoreFactory;

impl StoreFactory for FileStoreFactory {
    fn open(&self, path: &Path, len: u64) -> Result<Box<dyn Store>, Error> {
        let file = open_sized(path, len)?;
        Ok(Box::new(FileStore {
            path: path.to_path_buf(),
            file,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn file_len(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().map(|meta| meta.len())
    }
}

pub struct MmapStore {
    path: PathBuf,
    mmap: MmapMut,
}

impl MmapStore {
    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>, Error> {
        let start = usize::try_from(offset).ok();
        let end = start.and_then(|start| start.checked_add(len));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.mmap.len() => Ok(start..end),
            _ => Err(Error::new(ErrorKind::CorruptRange)
                .with_message("access beyond mapped region")
                .with_path(&self.path)
                .with_offset(offset)),
        }
    }
}

impl Store for MmapStore {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), Error> {
        let range = self.range(offset, buf.len())?;
        self.mmap[range].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.mmap.flush().map_err(|err| io_error(&self.path, err))
    }
}

/// Maps the whole backing file; every access must stay inside the requested length.
#[derive(Clone, Copy, Debug, Default)]
pub struct MmapStoreFactory;

impl StoreFactory for MmapStoreFactory {
    fn open(&self, path: &Path, len: u64) -> Result<Box<dyn Store>, Error> {
        if len == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("cannot map an empty file")
                .with_path(path));
        }
        let file = open_sized(path, len)?;
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(|err| io_error(path, err))? };
        Ok(Box::new(MmapStore {
            path: path.to_path_buf(),
            mmap,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn file_len(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().map(|meta| meta.len())
    }
}

type SharedBytes = Arc<Mutex<Vec<u8>>>;

pub struct MemoryStore {
    bytes: SharedBytes,
}

impl Store for MemoryStore {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let bytes = self.bytes.lock().map_err(|_| poisoned())?;
        let start = offset as usize;
        let available = bytes.len().saturating_sub(start).min(buf.len());
        if available > 0 {
            buf[..available].copy_from_slice(&bytes[start..start + available]);
        }
        buf[available..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), Error> {
        let mut bytes = self.bytes.lock().map_err(|_| poisoned())?;
        let start = offset as usize;
        let end = start + buf.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::new(ErrorKind::Io).with_message("memory store lock poisoned")
}

/// In-memory stores keyed by path; clones share the same files.
#[derive(Clone, Debug, Default)]
pub struct MemoryStoreFactory {
    files: Arc<Mutex<HashMap<PathBuf, SharedBytes>>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes currently stored under `path`.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().ok()?;
        let bytes = files.get(path)?.lock().ok()?;
        Some(bytes.clone())
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn open(&self, path: &Path, len: u64) -> Result<Box<dyn Store>, Error> {
        let mut files = self.files.lock().map_err(|_| poisoned())?;
        let bytes = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone();
        {
            let mut guard = bytes.lock().map_err(|_| poisoned())?;
            if (guard.len() as u64) < len {
                guard.resize(len as usize, 0);
            }
        }
        Ok(Box::new(MemoryStore { bytes }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn file_len(&self, path: &Path) -> Option<u64> {
        self.contents(path).map(|bytes| bytes.len() as u64)
    }
}
