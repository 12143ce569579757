//! Purpose: Disk-backed stack/queue/deque over one fixed-size circular data file.
//! Exports: `Engine`, `EngineOptions`, `EngineInfo`, `Durability`.
//! Role: Orchestrates allocator, record framing, data store, and ledger for every operation.
//! Invariants: Each push/pop either commits fully (data, ledger, counters) or rolls the allocator back.
//! Invariants: The ledger is rewritten as one 24-byte record after the data I/O of each commit.
//! Invariants: A reopen must use the capacity and framing recorded in the layout header.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::frame::{self, End, Framing, HEADER_LEN, Piece};
use crate::core::iter::SnapshotIter;
use crate::core::layout::{LAYOUT_LEN, LayoutHeader};
use crate::core::ledger::{LEDGER_LEN, Ledger, LedgerRecord};
use crate::core::lock::LockGuard;
use crate::core::paths::BufferPaths;
use crate::core::span::{self, CircularSpace, Direction, Extent};
use crate::core::store::{FileStoreFactory, Store, StoreFactory};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Leave flushing to the operating system.
    #[default]
    Fast,
    /// Sync the data file and ledger after every committed mutation.
    Flush,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub capacity: u64,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default)]
    pub durability: Durability,
}

impl EngineOptions {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            framing: Framing::Prefixed,
            durability: Durability::Fast,
        }
    }

    pub fn deque(capacity: u64) -> Self {
        Self::new(capacity).with_framing(Framing::Mirrored)
    }

    pub fn fixed(capacity: u64, record_len: u32) -> Self {
        Self::new(capacity).with_framing(Framing::Fixed { record_len })
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        let options: Self = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid engine options")
                .with_source(err)
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.capacity == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("capacity must be positive"));
        }
        if self.capacity > span::MAX_CAPACITY {
            return Err(Error::new(ErrorKind::Usage).with_message("capacity exceeds supported maximum"));
        }
        self.framing.validate()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EngineInfo {
    pub path: PathBuf,
    pub capacity: u64,
    pub framing: Framing,
    pub durability: Durability,
    pub size: u64,
    pub byte_length: u64,
    pub storage_length: u64,
    pub available_space: u64,
    pub start: u64,
    pub end: u64,
    pub mutation_count: u64,
}

pub struct Engine {
    paths: BufferPaths,
    options: EngineOptions,
    factory: Arc<dyn StoreFactory>,
    space: CircularSpace,
    data: Box<dyn Store>,
    ledger: Ledger,
    lock: Option<LockGuard>,
    mutations: Arc<AtomicU64>,
    size: u64,
    byte_length: u64,
}

impl Engine {
    pub fn open(path: impl AsRef<Path>, options: EngineOptions) -> Result<Self, Error> {
        Self::open_with(path, options, Arc::new(FileStoreFactory))
    }

    /// Opens (or creates) the buffer at `path` with stores produced by `factory`.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: EngineOptions,
        factory: Arc<dyn StoreFactory>,
    ) -> Result<Self, Error> {
        options.validate()?;
        let paths = BufferPaths::for_data(path);
        let lock = LockGuard::acquire(&paths.lock)?;

        let existed = factory.exists(&paths.data);
        if existed {
            check_geometry(&paths, &options, factory.as_ref())?;
        }
        let data = factory.open(&paths.data, options.capacity)?;
        let mut ledger = Ledger::new(factory.open(&paths.ledger, LEDGER_LEN as u64)?);

        let space = if existed {
            let record = ledger.load_all()?;
            CircularSpace::restore(options.capacity, record.start, record.end, record.size)
                .map_err(|err| err.with_path(&paths.ledger))?
        } else {
            let space = CircularSpace::new(options.capacity)?;
            ledger.store(LedgerRecord::default())?;
            space
        };
        let (size, byte_length) = record_totals(&space, options.framing)
            .map_err(|err| err.with_path(&paths.ledger))?;
        if !existed || !factory.exists(&paths.layout) {
            let mut layout = factory.open(&paths.layout, LAYOUT_LEN as u64)?;
            LayoutHeader::for_options(&options).store(layout.as_mut())?;
        }

        tracing::debug!(
            path = %paths.data.display(),
            capacity = options.capacity,
            framing = ?options.framing,
            existed,
            records = size,
            "opened ring buffer"
        );

        Ok(Self {
            paths,
            options,
            factory,
            space,
            data,
            ledger,
            lock: Some(lock),
            mutations: Arc::new(AtomicU64::new(0)),
            size,
            byte_length,
        })
    }

    pub fn push_front(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.push_at(End::Front, payload)
    }

    pub fn push_back(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.push_at(End::Back, payload)
    }

    pub fn pop_front(&mut self) -> Result<Vec<u8>, Error> {
        self.pop_at(End::Front)
    }

    pub fn pop_back(&mut self) -> Result<Vec<u8>, Error> {
        self.pop_at(End::Back)
    }

    pub fn peek_front(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.peek_at(End::Front)
    }

    pub fn peek_back(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.peek_at(End::Back)
    }

    /// Number of stored records.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Payload bytes, excluding headers.
    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    /// Arena bytes in use, headers included.
    pub fn storage_length(&self) -> u64 {
        self.space.length()
    }

    pub fn available_space(&self) -> u64 {
        self.space.available()
    }

    /// Largest payload a single push could still store.
    pub fn available_space_with_header_margin(&self) -> u64 {
        self.space
            .available()
            .saturating_sub(self.options.framing.overhead())
    }

    pub fn can_push(&self, payload_len: u64) -> bool {
        self.space
            .can_allocate(self.options.framing.stored_len(payload_len))
    }

    pub fn capacity(&self) -> u64 {
        self.space.capacity()
    }

    pub fn start(&self) -> u64 {
        self.space.start()
    }

    pub fn end(&self) -> u64 {
        self.space.end()
    }

    pub fn framing(&self) -> Framing {
        self.options.framing
    }

    pub fn header_size(&self) -> u64 {
        self.options.framing.overhead()
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn path(&self) -> &Path {
        &self.paths.data
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Acquire)
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            path: self.paths.data.clone(),
            capacity: self.capacity(),
            framing: self.options.framing,
            durability: self.options.durability,
            size: self.size,
            byte_length: self.byte_length,
            storage_length: self.storage_length(),
            available_space: self.available_space(),
            start: self.start(),
            end: self.end(),
            mutation_count: self.mutation_count(),
        }
    }

    /// Iterates from the front over a private copy of the current state.
    pub fn iter_forward(&self) -> Result<SnapshotIter, Error> {
        self.snapshot(Direction::Forward)
    }

    /// Iterates from the back; requires a framing with back-end headers.
    pub fn iter_backward(&self) -> Result<SnapshotIter, Error> {
        self.snapshot(Direction::Backward)
    }

    /// Syncs both files and removes the lock marker.
    pub fn close(self) -> Result<(), Error> {
        let Engine {
            paths,
            mut data,
            mut ledger,
            lock,
            ..
        } = self;
        data.sync()?;
        ledger.sync()?;
        if let Some(lock) = lock {
            lock.release()?;
        }
        tracing::debug!(path = %paths.data.display(), "closed ring buffer");
        Ok(())
    }

    fn snapshot(&self, direction: Direction) -> Result<SnapshotIter, Error> {
        let end = match direction {
            Direction::Forward => End::Front,
            Direction::Backward => End::Back,
        };
        self.check_readable(end)?;
        let store = self
            .factory
            .open(&self.paths.data, self.options.capacity)?;
        tracing::debug!(
            path = %self.paths.data.display(),
            ?direction,
            records = self.size,
            "opened snapshot iterator"
        );
        Ok(SnapshotIter::new(
            self.space,
            store,
            self.options.framing,
            end,
            Arc::clone(&self.mutations),
        ))
    }

    fn push_at(&mut self, end: End, payload: &[u8]) -> Result<(), Error> {
        let framing = self.options.framing;
        framing.check_payload(payload)?;
        let needed = framing.stored_len(payload.len() as u64);
        if !self.space.can_allocate(needed) {
            return Err(Error::new(ErrorKind::OutOfSpace)
                .with_message(format!(
                    "record needs {needed} bytes, {} available",
                    self.space.available()
                ))
                .with_path(&self.paths.data));
        }

        let checkpoint = self.space.checkpoint();
        let result = write_record(&mut self.space, self.data.as_mut(), framing, end, payload)
            .and_then(|()| self.persist());
        if let Err(err) = result {
            self.space.rollback(checkpoint);
            self.restore_ledger();
            tracing::warn!(op = "push", ?end, kind = ?err.kind(), %err, "rolled back");
            return Err(err);
        }

        self.size += 1;
        self.byte_length += payload.len() as u64;
        self.mutations.fetch_add(1, Ordering::AcqRel);
        span::debug_assert_space(&self.space);
        Ok(())
    }

    fn pop_at(&mut self, end: End) -> Result<Vec<u8>, Error> {
        self.check_readable(end)?;
        if self.space.is_empty() {
            return Err(Error::new(ErrorKind::Empty).with_path(&self.paths.data));
        }

        let checkpoint = self.space.checkpoint();
        let result = read_record(&mut self.space, self.data.as_mut(), self.options.framing, end)
            .and_then(|payload| self.persist().map(|()| payload));
        let payload = match result {
            Ok(payload) => payload,
            Err(err) => {
                self.space.rollback(checkpoint);
                self.restore_ledger();
                tracing::warn!(op = "pop", ?end, kind = ?err.kind(), %err, "rolled back");
                return Err(err);
            }
        };

        self.size -= 1;
        self.byte_length -= payload.len() as u64;
        self.mutations.fetch_add(1, Ordering::AcqRel);
        span::debug_assert_space(&self.space);
        Ok(payload)
    }

    fn peek_at(&mut self, end: End) -> Result<Option<Vec<u8>>, Error> {
        self.check_readable(end)?;
        if self.space.is_empty() {
            return Ok(None);
        }

        let checkpoint = self.space.checkpoint();
        let result = read_record(&mut self.space, self.data.as_mut(), self.options.framing, end);
        self.space.rollback(checkpoint);
        if let Err(err) = &result {
            tracing::warn!(op = "peek", ?end, kind = ?err.kind(), %err, "read failed");
        }
        result.map(Some)
    }

    fn check_readable(&self, end: End) -> Result<(), Error> {
        if end == End::Back && !self.options.framing.supports_back_reads() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("prefixed records can only be read from the front"));
        }
        Ok(())
    }

    fn ledger_record(&self) -> LedgerRecord {
        LedgerRecord {
            start: self.space.start(),
            size: self.space.size(),
            end: self.space.end(),
        }
    }

    /// Data reaches the disk before the ledger that points at it.
    fn persist(&mut self) -> Result<(), Error> {
        let flush = self.options.durability == Durability::Flush;
        if flush {
            self.data.sync()?;
        }
        let record = self.ledger_record();
        self.ledger.store(record)?;
        if flush {
            self.ledger.sync()?;
        }
        Ok(())
    }

    /// Rewrites the ledger from the rolled-back allocator after a failed commit.
    fn restore_ledger(&mut self) {
        let record = self.ledger_record();
        if let Err(err) = self.ledger.store(record) {
            tracing::error!(
                path = %self.paths.ledger.display(),
                kind = ?err.kind(),
                %err,
                "could not restore ledger after rollback"
            );
        }
    }
}

/// Refuses options whose capacity or framing differ from the ones the file was created with.
fn check_geometry(paths: &BufferPaths, options: &EngineOptions, factory: &dyn StoreFactory) -> Result<(), Error> {
    if let Some(len) = factory.file_len(&paths.data) {
        if len != options.capacity {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "data file holds {len} bytes, opened with capacity {}",
                    options.capacity
                ))
                .with_path(&paths.data));
        }
    }
    if factory.exists(&paths.layout) {
        let mut store = factory.open(&paths.layout, LAYOUT_LEN as u64)?;
        LayoutHeader::load(store.as_mut())
            .and_then(|header| header.check(options))
            .map_err(|err| err.with_path(&paths.layout))?;
    }
    Ok(())
}

/// Record count and payload bytes implied by the allocator's piece totals.
fn record_totals(space: &CircularSpace, framing: Framing) -> Result<(u64, u64), Error> {
    let pieces = framing.pieces_per_record();
    if space.size() % pieces != 0 {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "{} allocations do not form whole records of {pieces} pieces",
            space.size()
        )));
    }
    let records = space.size() / pieces;
    let byte_length = space
        .length()
        .checked_sub(records * framing.overhead())
        .ok_or_else(|| Error::new(ErrorKind::Corrupt).with_message("stored length smaller than headers"))?;
    if let Some(record_len) = framing.record_len() {
        if byte_length != records * u64::from(record_len) {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("stored length is not a multiple of the fixed record length"));
        }
    }
    Ok((records, byte_length))
}

fn allocate(space: &mut CircularSpace, end: End, amount: u64) -> Result<Extent, Error> {
    let extent = match end {
        End::Front => space.allocate_front(amount),
        End::Back => space.allocate_back(amount),
    };
    extent.ok_or_else(|| {
        Error::new(ErrorKind::CorruptRange)
            .with_message(format!("allocator refused {amount} bytes at the {end:?} end"))
    })
}

fn release(space: &mut CircularSpace, end: End, amount: u64) -> Result<Extent, Error> {
    let extent = match end {
        End::Front => space.release_front(amount),
        End::Back => space.release_back(amount),
    };
    extent.ok_or_else(|| {
        Error::new(ErrorKind::CorruptRange)
            .with_message(format!("cannot release {amount} bytes at the {end:?} end"))
    })
}

/// Allocates and writes every piece of one record at `end`.
fn write_record(
    space: &mut CircularSpace,
    store: &mut dyn Store,
    framing: Framing,
    end: End,
    payload: &[u8],
) -> Result<(), Error> {
    let header = frame::encode_header(payload.len() as u32);
    // Pieces nearest the existing data are allocated first.
    for piece in framing.pieces_from(end.opposite()) {
        let bytes: &[u8] = match piece {
            Piece::Header => &header,
            Piece::Payload => payload,
        };
        let extent = allocate(space, end, bytes.len() as u64)?;
        tracing::trace!(?piece, ?extent, "write");
        store.write_extent(extent, bytes)?;
    }
    Ok(())
}

/// Releases and reads one record at `end`. Shared by live pops, peeks, and iterators.
pub(crate) fn read_record(
    space: &mut CircularSpace,
    store: &mut dyn Store,
    framing: Framing,
    end: End,
) -> Result<Vec<u8>, Error> {
    let mut payload_len = framing.record_len().map(u64::from);
    let mut payload = None;
    for piece in framing.pieces_from(end) {
        match piece {
            Piece::Header => {
                let extent = release(space, end, HEADER_LEN)?;
                if payload_len.is_none() {
                    let len = u64::from(frame::decode_header(&store.read_extent(extent)?)?);
                    if len == 0 {
                        return Err(Error::new(ErrorKind::CorruptRange)
                            .with_message("zero-length record header")
                            .with_offset(extent.first().from));
                    }
                    payload_len = Some(len);
                }
            }
            Piece::Payload => {
                let len = payload_len.ok_or_else(|| {
                    Error::new(ErrorKind::CorruptRange).with_message("payload before its header")
                })?;
                let extent = release(space, end, len)?;
                tracing::trace!(?extent, "read");
                payload = Some(store.read_extent(extent)?);
            }
        }
    }
    payload.ok_or_else(|| Error::new(ErrorKind::CorruptRange).with_message("record has no payload"))
}
