// Error taxonomy shared by the allocator, storage, and engine layers.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Usage,
    OutOfSpace,
    Empty,
    InvalidRecordSize,
    CorruptRange,
    Corrupt,
    ConcurrentMutation,
    LockHeld,
    Permission,
    Io,
}

impl ErrorKind {
    /// Whether the engine stays usable after an error of this kind.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Usage
                | ErrorKind::OutOfSpace
                | ErrorKind::Empty
                | ErrorKind::InvalidRecordSize
                | ErrorKind::ConcurrentMutation
        )
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    path: Option<PathBuf>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            path: None,
            offset: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};
    use std::error::Error as _;

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::CorruptRange)
            .with_message("header extent missing")
            .with_path("/tmp/data.ring")
            .with_offset(12);
        assert_eq!(
            err.to_string(),
            "CorruptRange: header extent missing (path: /tmp/data.ring) (offset: 12)"
        );
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::other("disk gone");
        let err = Error::new(ErrorKind::Io).with_source(io);
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "disk gone");
    }

    #[test]
    fn recoverable_kinds_are_stable() {
        let cases = [
            (ErrorKind::Usage, true),
            (ErrorKind::OutOfSpace, true),
            (ErrorKind::Empty, true),
            (ErrorKind::InvalidRecordSize, true),
            (ErrorKind::ConcurrentMutation, true),
            (ErrorKind::CorruptRange, false),
            (ErrorKind::Corrupt, false),
            (ErrorKind::LockHeld, false),
            (ErrorKind::Permission, false),
            (ErrorKind::Io, false),
        ];

        for (kind, recoverable) in cases {
            assert_eq!(kind.is_recoverable(), recoverable, "{kind:?}");
        }
    }
}
