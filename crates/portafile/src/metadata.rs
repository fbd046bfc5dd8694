//! Live metadata queries for path-addressed files.
//!
//! Nothing is cached: every call is a fresh round-trip to the platform, so
//! two successive calls may disagree if something else touched the file.
//!
//! Timestamps are normalized to milliseconds since the Unix epoch. The
//! precision behind them is whatever the filesystem records (whole seconds
//! on some volumes), the unit is always milliseconds.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::permission::PermissionSet;
use crate::platform::{self, AccessMode};

/// Space statistics of the volume holding a file, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceStats {
    pub total: u64,
    pub free: u64,
    /// Free space available to unprivileged callers.
    pub usable: u64,
}

pub fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

pub fn is_directory(path: &Path) -> bool {
    path.is_dir()
}

pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

/// Dot prefix on unix-likes, hidden/system attribute on Windows.
pub fn is_hidden(path: &Path) -> bool {
    platform::is_hidden(path)
}

pub fn can_read(path: &Path) -> bool {
    platform::access(path, AccessMode::Read)
}

pub fn can_write(path: &Path) -> bool {
    platform::access(path, AccessMode::Write)
}

pub fn can_execute(path: &Path) -> bool {
    platform::access(path, AccessMode::Execute)
}

/// Size in bytes, 0 when the file is missing.
pub fn length(path: &Path) -> u64 {
    fs::metadata(path).map(|md| md.len()).unwrap_or(0)
}

/// Last modification in ms since the epoch, 0 when the file is missing.
pub fn last_modified(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|md| md.modified())
        .map(system_time_to_millis)
        .unwrap_or(0)
}

pub fn space(path: &Path) -> Result<SpaceStats> {
    platform::space(path)
}

/// Raw mode bits from stat.
pub fn mode(path: &Path) -> io::Result<u32> {
    platform::read_mode(path)
}

pub fn permissions(path: &Path) -> io::Result<PermissionSet> {
    Ok(PermissionSet::from_mode(mode(path)?))
}

/// Signed milliseconds relative to the epoch (negative before 1970).
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_defaults() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");
        assert!(!exists(&missing));
        assert!(!is_file(&missing));
        assert!(!is_directory(&missing));
        assert_eq!(length(&missing), 0);
        assert_eq!(last_modified(&missing), 0);
        assert!(permissions(&missing).is_err());
    }

    #[test]
    fn test_last_modified_in_millis() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("t");
        fs::write(&file, b"x").unwrap();

        let mtime = filetime::FileTime::from_unix_time(1_700_000_000, 250_000_000);
        filetime::set_file_mtime(&file, mtime).unwrap();

        let ms = last_modified(&file);
        // Second-granularity filesystems drop the 250ms
        assert!(ms == 1_700_000_000_250 || ms == 1_700_000_000_000, "got {ms}");
    }

    #[test]
    fn test_millis_conversions() {
        let after = UNIX_EPOCH + Duration::from_millis(1_234);
        assert_eq!(system_time_to_millis(after), 1_234);

        let before = UNIX_EPOCH - Duration::from_millis(500);
        assert_eq!(system_time_to_millis(before), -500);
    }

    #[test]
    fn test_hidden_by_name() {
        let temp = tempdir().unwrap();
        let dotfile = temp.path().join(".secret");
        fs::write(&dotfile, b"").unwrap();
        #[cfg(unix)]
        assert!(is_hidden(&dotfile));
        assert!(!is_hidden(&temp.path().join("visible")));
    }
}
