// Position ledger: persisted (start, size, end) triple used to rebuild the allocator on reopen.
use crate::core::error::Error;
use crate::core::store::Store;

pub const LEDGER_LEN: usize = 24;

const START_AT: usize = 0;
const SIZE_AT: usize = 8;
const END_AT: usize = 16;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LedgerRecord {
    pub start: u64,
    pub size: u64,
    pub end: u64,
}

impl LedgerRecord {
    pub fn encode(&self) -> [u8; LEDGER_LEN] {
        let mut buf = [0u8; LEDGER_LEN];
        write_u64(&mut buf, START_AT, self.start);
        write_u64(&mut buf, SIZE_AT, self.size);
        write_u64(&mut buf, END_AT, self.end);
        buf
    }

    pub fn decode(buf: &[u8; LEDGER_LEN]) -> Self {
        Self {
            start: read_u64(buf, START_AT),
            size: read_u64(buf, SIZE_AT),
            end: read_u64(buf, END_AT),
        }
    }
}

pub struct Ledger {
    store: Box<dyn Store>,
}

impl Ledger {
    pub fn new(store: Box<dyn Store>) -> Self {
        Self { store }
    }

    pub fn load_all(&mut self) -> Result<LedgerRecord, Error> {
        let mut buf = [0u8; LEDGER_LEN];
        self.store.read_at(0, &mut buf)?;
        Ok(LedgerRecord::decode(&buf))
    }

    /// Rewrites the whole record with one positional write.
    pub fn store(&mut self, record: LedgerRecord) -> Result<(), Error> {
        self.store.write_at(0, &record.encode())
    }

    /// Rewrites bytes `[0, 16)` only.
    pub fn store_front(&mut self, start: u64, size: u64) -> Result<(), Error> {
        let mut buf = [0u8; 16];
        write_u64(&mut buf, START_AT, start);
        write_u64(&mut buf, SIZE_AT, size);
        self.store.write_at(START_AT as u64, &buf)
    }

    /// Rewrites bytes `[8, 24)` only.
    pub fn store_back(&mut self, end: u64, size: u64) -> Result<(), Error> {
        let mut buf = [0u8; 16];
        write_u64(&mut buf, 0, size);
        write_u64(&mut buf, 8, end);
        self.store.write_at(SIZE_AT as u64, &buf)
    }

    pub fn sync(&mut self) -> Result<(), Error> {
        self.store.sync()
    }
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(out)
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::{LEDGER_LEN, Ledger, LedgerRecord};
    use crate::core::store::{FileStoreFactory, StoreFactory};

    fn record(start: u64, size: u64, end: u64) -> LedgerRecord {
        LedgerRecord { start, size, end }
    }

    #[test]
    fn fresh_ledger_reads_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.ring.index");
        let mut ledger = Ledger::new(FileStoreFactory.open(&path, LEDGER_LEN as u64).expect("open"));
        assert_eq!(ledger.load_all().expect("load"), LedgerRecord::default());
        assert_eq!(ledger.load_all().expect("load"), LedgerRecord::default());
    }

    #[test]
    fn store_front_keeps_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.ring.index");
        let mut ledger = Ledger::new(FileStoreFactory.open(&path, LEDGER_LEN as u64).expect("open"));

        ledger.store_front(1, 2).expect("store");
        assert_eq!(ledger.load_all().expect("load"), record(1, 2, 0));

        ledger.store_front(u64::MAX, u64::MAX - 1).expect("store");
        assert_eq!(ledger.load_all().expect("load"), record(u64::MAX, u64::MAX - 1, 0));
    }

    #[test]
    fn store_back_keeps_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.ring.index");
        let mut ledger = Ledger::new(FileStoreFactory.open(&path, LEDGER_LEN as u64).expect("open"));

        ledger.store_back(2, 1).expect("store");
        assert_eq!(ledger.load_all().expect("load"), record(0, 1, 2));

        ledger.store_back(u64::MAX - 1, u64::MAX).expect("store");
        assert_eq!(ledger.load_all().expect("load"), record(0, u64::MAX, u64::MAX - 1));
    }

    #[test]
    fn record_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.ring.index");
        {
            let mut ledger =
                Ledger::new(FileStoreFactory.open(&path, LEDGER_LEN as u64).expect("open"));
            ledger.store_front(1, 2).expect("front");
            ledger.store_back(3, 2).expect("back");
            ledger.sync().expect("sync");
        }
        let mut ledger = Ledger::new(FileStoreFactory.open(&path, LEDGER_LEN as u64).expect("reopen"));
        assert_eq!(ledger.load_all().expect("load"), record(1, 2, 3));

        ledger.store(record(7, 8, 9)).expect("store");
        assert_eq!(ledger.load_all().expect("load"), record(7, 8, 9));
    }

    #[test]
    fn layout_is_big_endian() {
        let bytes = record(1, 2, 3).encode();
        assert_eq!(bytes[7], 1);
        assert_eq!(bytes[15], 2);
        assert_eq!(bytes[23], 3);
        assert_eq!(LedgerRecord::decode(&bytes), record(1, 2, 3));
    }
}
