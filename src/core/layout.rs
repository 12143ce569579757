// Layout header: capacity and framing recorded beside the data file so a reopen cannot misread it.
use crate::core::engine::EngineOptions;
use crate::core::error::{Error, ErrorKind};
use crate::core::frame::Framing;
use crate::core::store::Store;

pub const LAYOUT_LEN: usize = 24;

const MAGIC: [u8; 4] = *b"RSTK";
const VERSION: u32 = 1;

const TAG_PREFIXED: u32 = 1;
const TAG_MIRRORED: u32 = 2;
const TAG_FIXED: u32 = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LayoutHeader {
    pub capacity: u64,
    pub framing: Framing,
}

impl LayoutHeader {
    pub fn for_options(options: &EngineOptions) -> Self {
        Self {
            capacity: options.capacity,
            framing: options.framing,
        }
    }

    pub fn encode(&self) -> [u8; LAYOUT_LEN] {
        let (tag, record_len) = match self.framing {
            Framing::Prefixed => (TAG_PREFIXED, 0),
            Framing::Mirrored => (TAG_MIRRORED, 0),
            Framing::Fixed { record_len } => (TAG_FIXED, record_len),
        };
        let mut buf = [0u8; LAYOUT_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&VERSION.to_be_bytes());
        buf[8..16].copy_from_slice(&self.capacity.to_be_bytes());
        buf[16..20].copy_from_slice(&tag.to_be_bytes());
        buf[20..24].copy_from_slice(&record_len.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; LAYOUT_LEN]) -> Result<Self, Error> {
        if buf[0..4] != MAGIC {
            return Err(Error::new(ErrorKind::Corrupt).with_message("bad layout magic"));
        }
        if read_u32(buf, 4) != VERSION {
            return Err(Error::new(ErrorKind::Corrupt).with_message("unsupported layout version"));
        }
        let capacity = read_u64(buf, 8);
        let record_len = read_u32(buf, 20);
        let framing = match read_u32(buf, 16) {
            TAG_PREFIXED => Framing::Prefixed,
            TAG_MIRRORED => Framing::Mirrored,
            TAG_FIXED if record_len > 0 => Framing::Fixed { record_len },
            tag => {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message(format!("unknown framing tag {tag} (record_len {record_len})")));
            }
        };
        Ok(Self { capacity, framing })
    }

    /// Refuses options that would read the existing file with a different geometry.
    pub fn check(&self, options: &EngineOptions) -> Result<(), Error> {
        if self.capacity != options.capacity {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "buffer was created with capacity {}, opened with {}",
                self.capacity, options.capacity
            )));
        }
        if self.framing != options.framing {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "buffer was created with {:?} framing, opened with {:?}",
                self.framing, options.framing
            )));
        }
        Ok(())
    }

    pub fn load(store: &mut dyn Store) -> Result<Self, Error> {
        let mut buf = [0u8; LAYOUT_LEN];
        store.read_at(0, &mut buf)?;
        Self::decode(&buf)
    }

    pub fn store(&self, store: &mut dyn Store) -> Result<(), Error> {
        store.write_at(0, &self.encode())?;
        store.sync()
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(out)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::{LAYOUT_LEN, LayoutHeader};
    use crate::core::engine::EngineOptions;
    use crate::core::error::ErrorKind;
    use crate::core::frame::Framing;

    #[test]
    fn every_framing_survives_encoding() {
        for options in [
            EngineOptions::new(64),
            EngineOptions::deque(1 << 40),
            EngineOptions::fixed(96, 6),
        ] {
            let header = LayoutHeader::for_options(&options);
            let decoded = LayoutHeader::decode(&header.encode()).expect("decode");
            assert_eq!(decoded, header);
            decoded.check(&options).expect("same options");
        }
    }

    #[test]
    fn geometry_changes_are_refused() {
        let header = LayoutHeader::for_options(&EngineOptions::deque(64));
        let cases = [
            EngineOptions::new(64),
            EngineOptions::deque(128),
            EngineOptions::fixed(64, 4),
        ];
        for options in cases {
            let err = header.check(&options).expect_err("mismatch");
            assert_eq!(err.kind(), ErrorKind::Usage, "{options:?}");
        }
        let fixed = LayoutHeader::for_options(&EngineOptions::fixed(64, 4));
        let err = fixed
            .check(&EngineOptions::new(64).with_framing(Framing::Fixed { record_len: 8 }))
            .expect_err("width");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn damaged_header_is_corrupt() {
        let mut buf = LayoutHeader::for_options(&EngineOptions::new(64)).encode();
        buf[0] = b'X';
        assert_eq!(LayoutHeader::decode(&buf).expect_err("magic").kind(), ErrorKind::Corrupt);

        let mut buf = LayoutHeader::for_options(&EngineOptions::new(64)).encode();
        buf[19] = 9;
        assert_eq!(LayoutHeader::decode(&buf).expect_err("tag").kind(), ErrorKind::Corrupt);

        assert_eq!(
            LayoutHeader::decode(&[0u8; LAYOUT_LEN]).expect_err("blank").kind(),
            ErrorKind::Corrupt
        );
    }
}
