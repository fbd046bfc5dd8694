//! Read-modify-write permission changes.
//!
//! Every change reads the current mode, toggles the requested flags and
//! writes the full mode back. Bits outside the request (including
//! setuid/setgid/sticky) are carried over unchanged.

use std::path::Path;

use tracing::instrument;

use crate::error::Result;
use crate::permission::{Access, Class, PermissionSet, PosixPermission, PERMISSION_BITS};
use crate::platform;

/// setuid, setgid and sticky.
pub const SPECIAL_BITS: u32 = 0o7000;

/// One access bit flipped on or off, for the owner alone or for everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionChange {
    pub access: Access,
    pub value: bool,
    pub owner_only: bool,
}

impl PermissionChange {
    pub fn new(access: Access, value: bool, owner_only: bool) -> Self {
        Self {
            access,
            value,
            owner_only,
        }
    }

    /// Flags touched by this change. The owner flag is always among them.
    pub fn targets(&self) -> Vec<PosixPermission> {
        let classes: &[Class] = if self.owner_only {
            &[Class::Owner]
        } else {
            &[Class::Owner, Class::Group, Class::Others]
        };
        classes
            .iter()
            .map(|class| PosixPermission::of(*class, self.access))
            .collect()
    }

    pub fn apply(&self, mut perms: PermissionSet) -> PermissionSet {
        for flag in self.targets() {
            perms.set(flag, self.value);
        }
        perms
    }
}

/// Mode produced by applying `change` to `current`.
pub fn next_mode(current: u32, change: &PermissionChange) -> u32 {
    let perms = change.apply(PermissionSet::from_mode(current));
    (current & SPECIAL_BITS) | perms.to_mode()
}

/// Mode produced by clearing every write bit of `current`.
pub fn read_only_mode(current: u32) -> u32 {
    let cleared = [Class::Owner, Class::Group, Class::Others]
        .into_iter()
        .fold(PermissionSet::from_mode(current), |mut perms, class| {
            perms.remove(PosixPermission::of(class, Access::Write));
            perms
        });
    (current & SPECIAL_BITS) | cleared.to_mode()
}

/// Apply one access change to the file at `path`.
#[instrument(level = "debug", skip(change), fields(access = ?change.access, value = change.value))]
pub fn set_permission(path: &Path, change: PermissionChange) -> Result<()> {
    rewrite(path, |current| next_mode(current, &change))
}

/// Clear the write bit for owner, group and others.
#[instrument(level = "debug")]
pub fn set_read_only(path: &Path) -> Result<()> {
    rewrite(path, read_only_mode)
}

/// Replace the nine permission bits wholesale, keeping the special bits.
#[instrument(level = "debug", skip(perms))]
pub fn set_permissions(path: &Path, perms: PermissionSet) -> Result<()> {
    rewrite(path, |current| (current & SPECIAL_BITS) | perms.to_mode())
}

fn rewrite(path: &Path, next: impl FnOnce(u32) -> u32) -> Result<()> {
    let current = platform::read_mode(path)? & (SPECIAL_BITS | PERMISSION_BITS);
    let mode = next(current);
    if mode == current {
        portafile_config::log_perms_debug!(
            "Mode unchanged, skipping chmod",
            path = tracing::field::display(path.display())
        );
        return Ok(());
    }
    portafile_config::log_perms_debug!(
        "Writing mode",
        path = tracing::field::display(path.display()),
        from = tracing::field::display(format!("{current:o}")),
        to = tracing::field::display(format!("{mode:o}"))
    );
    platform::write_mode(path, mode)?;
    Ok(())
}
