//! Purpose: Side-file naming for a data file (ledger, layout header, and lock marker).
//! Exports: `BufferPaths`.
//! Invariants: Side files live next to the data file and append a fixed suffix to its name.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const LEDGER_SUFFIX: &str = ".index";
pub const LAYOUT_SUFFIX: &str = ".layout";
pub const LOCK_SUFFIX: &str = ".lock";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BufferPaths {
    pub data: PathBuf,
    pub ledger: PathBuf,
    pub layout: PathBuf,
    pub lock: PathBuf,
}

impl BufferPaths {
    pub fn for_data(data: impl AsRef<Path>) -> Self {
        let data = data.as_ref().to_path_buf();
        Self {
            ledger: with_suffix(&data, LEDGER_SUFFIX),
            layout: with_suffix(&data, LAYOUT_SUFFIX),
            lock: with_suffix(&data, LOCK_SUFFIX),
            data,
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::BufferPaths;
    use std::path::PathBuf;

    #[test]
    fn side_files_append_suffix() {
        let paths = BufferPaths::for_data("/var/lib/jobs.ring");
        assert_eq!(paths.data, PathBuf::from("/var/lib/jobs.ring"));
        assert_eq!(paths.ledger, PathBuf::from("/var/lib/jobs.ring.index"));
        assert_eq!(paths.layout, PathBuf::from("/var/lib/jobs.ring.layout"));
        assert_eq!(paths.lock, PathBuf::from("/var/lib/jobs.ring.lock"));
    }
}
