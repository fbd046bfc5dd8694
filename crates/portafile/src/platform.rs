//! Per-platform file primitives.
//!
//! The rest of the crate sees one set of functions:
//!
//! - `read_mode` / `write_mode`: stat and chmod equivalents
//! - `access`: effective-permission check for the calling process
//! - `is_hidden`: platform heuristic (dot prefix, or Win32 attributes)
//! - `space`: statvfs equivalent
//!
//! - **Unix**: `nix` for `access(2)` and `statvfs(2)`, std for stat/chmod
//! - **Windows**: synthesizes a mode from the read-only attribute
//! - **Other**: same as Windows minus attribute flags

use std::io;
use std::path::Path;

use crate::error::Result;
use crate::metadata::SpaceStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

#[cfg_attr(windows, allow(dead_code))]
fn dot_prefixed(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

// ============================================================================
// Unix
// ============================================================================

#[cfg(unix)]
mod imp {
    use super::*;
    use std::fs;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    use nix::sys::statvfs::statvfs;
    use nix::unistd::{access as nix_access, AccessFlags};

    pub fn read_mode(path: &Path) -> io::Result<u32> {
        // stat, not lstat: chmod follows symlinks, so the read side must too
        Ok(fs::metadata(path)?.mode())
    }

    pub fn write_mode(path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    pub fn access(path: &Path, mode: AccessMode) -> bool {
        let flags = match mode {
            AccessMode::Read => AccessFlags::R_OK,
            AccessMode::Write => AccessFlags::W_OK,
            AccessMode::Execute => AccessFlags::X_OK,
        };
        nix_access(path, flags).is_ok()
    }

    pub fn is_hidden(path: &Path) -> bool {
        dot_prefixed(path)
    }

    #[allow(clippy::unnecessary_cast)]
    pub fn space(path: &Path) -> Result<SpaceStats> {
        let st = statvfs(path)?;
        let unit = st.fragment_size() as u64;
        Ok(SpaceStats {
            total: st.blocks() as u64 * unit,
            free: st.blocks_free() as u64 * unit,
            usable: st.blocks_available() as u64 * unit,
        })
    }
}

// ============================================================================
// Everything else (Windows and friends)
// ============================================================================

#[cfg(not(unix))]
mod imp {
    use super::*;
    use std::fs;

    use crate::error::FileError;
    use crate::permission::{OWNER_WRITE_FILEMODE, PERMISSION_BITS};

    const READ_BITS: u32 = 0o444;
    const WRITE_BITS: u32 = 0o222;
    const EXEC_BITS: u32 = 0o111;

    #[cfg(windows)]
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    #[cfg(windows)]
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

    /// No mode bits here: readable always, writable unless the read-only
    /// attribute is set, executable for directories and launchable files.
    pub fn read_mode(path: &Path) -> io::Result<u32> {
        let md = fs::metadata(path)?;
        let mut mode = READ_BITS;
        if !md.permissions().readonly() {
            mode |= WRITE_BITS;
        }
        if md.is_dir() || is_launchable(path) {
            mode |= EXEC_BITS;
        }
        Ok(mode & PERMISSION_BITS)
    }

    /// Only the owner write bit survives the trip: it drives the read-only attribute.
    pub fn write_mode(path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(mode & OWNER_WRITE_FILEMODE == 0);
        fs::set_permissions(path, perms)
    }

    pub fn access(path: &Path, mode: AccessMode) -> bool {
        match fs::metadata(path) {
            Ok(md) => match mode {
                AccessMode::Read => true,
                AccessMode::Write => !md.permissions().readonly(),
                AccessMode::Execute => md.is_dir() || is_launchable(path),
            },
            Err(_) => false,
        }
    }

    fn is_launchable(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                matches!(
                    e.to_ascii_lowercase().as_str(),
                    "exe" | "bat" | "cmd" | "com"
                )
            })
            .unwrap_or(false)
    }

    #[cfg(windows)]
    pub fn is_hidden(path: &Path) -> bool {
        use std::os::windows::fs::MetadataExt;

        match fs::metadata(path) {
            Ok(md) => md.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0,
            Err(_) => false,
        }
    }

    #[cfg(not(windows))]
    pub fn is_hidden(path: &Path) -> bool {
        dot_prefixed(path)
    }

    pub fn space(_path: &Path) -> Result<SpaceStats> {
        Err(FileError::unsupported("space", "path"))
    }
}

pub use imp::{access, is_hidden, read_mode, space, write_mode};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dot_prefix() {
        assert!(dot_prefixed(Path::new("/tmp/.cache")));
        assert!(!dot_prefixed(Path::new("/tmp/cache")));
        assert!(!dot_prefixed(Path::new("/")));
    }

    #[test]
    fn test_read_mode_missing_file_errors() {
        let temp = tempdir().unwrap();
        assert!(read_mode(&temp.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_then_read_mode() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("f");
        std::fs::write(&file, b"x").unwrap();

        write_mode(&file, 0o640).unwrap();
        assert_eq!(read_mode(&file).unwrap() & 0o7777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_space_on_tempdir() {
        let temp = tempdir().unwrap();
        let stats = space(temp.path()).unwrap();
        assert!(stats.total > 0);
        assert!(stats.free <= stats.total);
        assert!(stats.usable <= stats.free);
    }

    #[test]
    fn test_access_on_missing_file() {
        let temp = tempdir().unwrap();
        assert!(!access(&temp.path().join("missing"), AccessMode::Read));
    }
}
