//! POSIX permission bits.
//!
//! Nine independent flags (owner, group, others crossed with read, write,
//! execute) and their two canonical serializations:
//!
//! ```text
//! rwxr-x---   <->   0o750
//! ```
//!
//! Conversion is a bijection over the 512 possible sets. Bits above bit 8
//! (file type, setuid, setgid, sticky) are ignored when decoding.

use std::fmt;
use std::str::FromStr;

use crate::error::{FileError, Result};

pub const OWNER_READ_FILEMODE: u32 = 0o400;
pub const OWNER_WRITE_FILEMODE: u32 = 0o200;
pub const OWNER_EXEC_FILEMODE: u32 = 0o100;
pub const GROUP_READ_FILEMODE: u32 = 0o040;
pub const GROUP_WRITE_FILEMODE: u32 = 0o020;
pub const GROUP_EXEC_FILEMODE: u32 = 0o010;
pub const OTHERS_READ_FILEMODE: u32 = 0o004;
pub const OTHERS_WRITE_FILEMODE: u32 = 0o002;
pub const OTHERS_EXEC_FILEMODE: u32 = 0o001;

/// Mask of the nine permission bits.
pub const PERMISSION_BITS: u32 = 0o777;

/// Who a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Owner,
    Group,
    Others,
}

/// What a permission allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    fn letter(self) -> char {
        match self {
            Access::Read => 'r',
            Access::Write => 'w',
            Access::Execute => 'x',
        }
    }
}

/// A single permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PosixPermission {
    OwnerRead,
    OwnerWrite,
    OwnerExecute,
    GroupRead,
    GroupWrite,
    GroupExecute,
    OthersRead,
    OthersWrite,
    OthersExecute,
}

impl PosixPermission {
    /// String order: owner triad, group triad, others triad.
    pub const ALL: [PosixPermission; 9] = [
        PosixPermission::OwnerRead,
        PosixPermission::OwnerWrite,
        PosixPermission::OwnerExecute,
        PosixPermission::GroupRead,
        PosixPermission::GroupWrite,
        PosixPermission::GroupExecute,
        PosixPermission::OthersRead,
        PosixPermission::OthersWrite,
        PosixPermission::OthersExecute,
    ];

    /// Bit order, least significant first.
    const BY_BIT: [PosixPermission; 9] = [
        PosixPermission::OthersExecute,
        PosixPermission::OthersWrite,
        PosixPermission::OthersRead,
        PosixPermission::GroupExecute,
        PosixPermission::GroupWrite,
        PosixPermission::GroupRead,
        PosixPermission::OwnerExecute,
        PosixPermission::OwnerWrite,
        PosixPermission::OwnerRead,
    ];

    pub const fn of(class: Class, access: Access) -> Self {
        match (class, access) {
            (Class::Owner, Access::Read) => PosixPermission::OwnerRead,
            (Class::Owner, Access::Write) => PosixPermission::OwnerWrite,
            (Class::Owner, Access::Execute) => PosixPermission::OwnerExecute,
            (Class::Group, Access::Read) => PosixPermission::GroupRead,
            (Class::Group, Access::Write) => PosixPermission::GroupWrite,
            (Class::Group, Access::Execute) => PosixPermission::GroupExecute,
            (Class::Others, Access::Read) => PosixPermission::OthersRead,
            (Class::Others, Access::Write) => PosixPermission::OthersWrite,
            (Class::Others, Access::Execute) => PosixPermission::OthersExecute,
        }
    }

    /// The file-mode bit this flag maps to.
    pub const fn mode_bit(self) -> u32 {
        match self {
            PosixPermission::OwnerRead => OWNER_READ_FILEMODE,
            PosixPermission::OwnerWrite => OWNER_WRITE_FILEMODE,
            PosixPermission::OwnerExecute => OWNER_EXEC_FILEMODE,
            PosixPermission::GroupRead => GROUP_READ_FILEMODE,
            PosixPermission::GroupWrite => GROUP_WRITE_FILEMODE,
            PosixPermission::GroupExecute => GROUP_EXEC_FILEMODE,
            PosixPermission::OthersRead => OTHERS_READ_FILEMODE,
            PosixPermission::OthersWrite => OTHERS_WRITE_FILEMODE,
            PosixPermission::OthersExecute => OTHERS_EXEC_FILEMODE,
        }
    }

    pub const fn class(self) -> Class {
        match self {
            PosixPermission::OwnerRead
            | PosixPermission::OwnerWrite
            | PosixPermission::OwnerExecute => Class::Owner,
            PosixPermission::GroupRead
            | PosixPermission::GroupWrite
            | PosixPermission::GroupExecute => Class::Group,
            PosixPermission::OthersRead
            | PosixPermission::OthersWrite
            | PosixPermission::OthersExecute => Class::Others,
        }
    }

    pub const fn access(self) -> Access {
        match self {
            PosixPermission::OwnerRead | PosixPermission::GroupRead | PosixPermission::OthersRead => {
                Access::Read
            }
            PosixPermission::OwnerWrite
            | PosixPermission::GroupWrite
            | PosixPermission::OthersWrite => Access::Write,
            PosixPermission::OwnerExecute
            | PosixPermission::GroupExecute
            | PosixPermission::OthersExecute => Access::Execute,
        }
    }
}

/// A set of [`PosixPermission`] flags.
///
/// Stored as the nine mode bits, so equality is bit equality.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PermissionSet {
    bits: u16,
}

impl PermissionSet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn all() -> Self {
        Self {
            bits: PERMISSION_BITS as u16,
        }
    }

    /// Decode a file mode. Bits above the nine permission bits are ignored.
    pub fn from_mode(mode: u32) -> Self {
        let mut set = Self::empty();
        for (i, flag) in PosixPermission::BY_BIT.iter().enumerate() {
            if (mode >> i) & 1 == 1 {
                set.insert(*flag);
            }
        }
        set
    }

    /// Encode as a file mode in `0..=0o777`.
    pub fn to_mode(self) -> u32 {
        self.iter().fold(0, |mode, flag| mode | flag.mode_bit())
    }

    pub fn contains(self, flag: PosixPermission) -> bool {
        u32::from(self.bits) & flag.mode_bit() != 0
    }

    pub fn insert(&mut self, flag: PosixPermission) {
        self.bits |= flag.mode_bit() as u16;
    }

    pub fn remove(&mut self, flag: PosixPermission) {
        self.bits &= !(flag.mode_bit() as u16);
    }

    pub fn set(&mut self, flag: PosixPermission, value: bool) {
        if value {
            self.insert(flag);
        } else {
            self.remove(flag);
        }
    }

    pub fn with(mut self, flag: PosixPermission) -> Self {
        self.insert(flag);
        self
    }

    pub fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Flags in string order.
    pub fn iter(self) -> impl Iterator<Item = PosixPermission> {
        PosixPermission::ALL
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }
}

impl FromIterator<PosixPermission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PosixPermission>>(iter: I) -> Self {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl Extend<PosixPermission> for PermissionSet {
    fn extend<I: IntoIterator<Item = PosixPermission>>(&mut self, iter: I) {
        for flag in iter {
            self.insert(flag);
        }
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in PosixPermission::ALL {
            let c = if self.contains(flag) {
                flag.access().letter()
            } else {
                '-'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionSet({} {:03o})", self, self.to_mode())
    }
}

impl FromStr for PermissionSet {
    type Err = FileError;

    /// Parse the 9-character `rwxrwxrwx` form. Every position must hold its
    /// own letter or `-`; nothing is coerced.
    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(FileError::InvalidFormat {
                input: s.to_string(),
                reason: format!("expected 9 characters, found {}", chars.len()),
            });
        }

        let mut set = Self::empty();
        for (pos, (c, flag)) in chars.iter().zip(PosixPermission::ALL).enumerate() {
            let expected = flag.access().letter();
            if *c == expected {
                set.insert(flag);
            } else if *c != '-' {
                return Err(FileError::InvalidFormat {
                    input: s.to_string(),
                    reason: format!(
                        "position {} must be '{}' or '-', found {:?}",
                        pos, expected, c
                    ),
                });
            }
        }
        Ok(set)
    }
}

/// Mode integer to permission set.
pub fn decode(mode: u32) -> PermissionSet {
    PermissionSet::from_mode(mode)
}

/// Permission set to mode integer.
pub fn encode(perms: PermissionSet) -> u32 {
    perms.to_mode()
}
