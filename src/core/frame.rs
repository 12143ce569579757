// Record framing: length headers, per-framing overhead, and header encode/decode.
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

pub const HEADER_LEN: u64 = 4;
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

/// How records are laid out in the arena.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Framing {
    /// `[len][payload]`: readable from the front only (stack and queue).
    #[default]
    Prefixed,
    /// `[len][payload][len]`: readable from both ends (deque).
    Mirrored,
    /// `[payload]` of a constant width: readable from both ends, no headers.
    Fixed { record_len: u32 },
}

impl Framing {
    /// Allocations the engine makes per record; the allocator counts each one.
    pub fn pieces_per_record(self) -> u64 {
        match self {
            Framing::Prefixed => 2,
            Framing::Mirrored => 3,
            Framing::Fixed { .. } => 1,
        }
    }

    /// Header bytes stored alongside each payload.
    pub fn overhead(self) -> u64 {
        match self {
            Framing::Prefixed => HEADER_LEN,
            Framing::Mirrored => HEADER_LEN * 2,
            Framing::Fixed { .. } => 0,
        }
    }

    pub fn supports_back_reads(self) -> bool {
        !matches!(self, Framing::Prefixed)
    }

    pub fn record_len(self) -> Option<u32> {
        match self {
            Framing::Fixed { record_len } => Some(record_len),
            _ => None,
        }
    }

    /// Arena bytes a payload of `payload_len` occupies.
    pub fn stored_len(self, payload_len: u64) -> u64 {
        payload_len + self.overhead()
    }

    pub fn validate(self) -> Result<(), Error> {
        if let Framing::Fixed { record_len: 0 } = self {
            return Err(Error::new(ErrorKind::Usage).with_message("fixed record length must be positive"));
        }
        Ok(())
    }

    /// Rejects payloads the framing cannot store.
    pub fn check_payload(self, payload: &[u8]) -> Result<(), Error> {
        if payload.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("payload must not be empty"));
        }
        if payload.len() as u64 > MAX_PAYLOAD_LEN {
            return Err(Error::new(ErrorKind::Usage).with_message("payload exceeds u32 length header"));
        }
        if let Framing::Fixed { record_len } = self {
            if payload.len() as u64 != u64::from(record_len) {
                return Err(Error::new(ErrorKind::InvalidRecordSize).with_message(format!(
                    "wrong record size {}, expected {record_len}",
                    payload.len()
                )));
            }
        }
        Ok(())
    }
}

/// One allocation inside a stored record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Piece {
    Header,
    Payload,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum End {
    Front,
    Back,
}

impl End {
    pub fn opposite(self) -> Self {
        match self {
            End::Front => End::Back,
            End::Back => End::Front,
        }
    }
}

impl Framing {
    /// Record pieces as laid out from the front of the arena towards the back.
    pub fn pieces(self) -> &'static [Piece] {
        match self {
            Framing::Prefixed => &[Piece::Header, Piece::Payload],
            Framing::Mirrored => &[Piece::Header, Piece::Payload, Piece::Header],
            Framing::Fixed { .. } => &[Piece::Payload],
        }
    }

    /// Pieces in the order they are met when working inward from `end`.
    pub fn pieces_from(self, end: End) -> impl Iterator<Item = Piece> {
        let pieces = self.pieces();
        let reversed = end == End::Back;
        (0..pieces.len()).map(move |i| {
            if reversed {
                pieces[pieces.len() - 1 - i]
            } else {
                pieces[i]
            }
        })
    }
}

pub fn encode_header(payload_len: u32) -> [u8; HEADER_LEN as usize] {
    payload_len.to_be_bytes()
}

pub fn decode_header(buf: &[u8]) -> Result<u32, Error> {
    let bytes: [u8; HEADER_LEN as usize] = buf
        .try_into()
        .map_err(|_| Error::new(ErrorKind::CorruptRange).with_message("length header is not 4 bytes"))?;
    Ok(u32::from_be_bytes(bytes))
}
