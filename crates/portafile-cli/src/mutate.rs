//! Commands that change the filesystem or a provider's documents.
//!
//! Handle mutators answer with a plain `bool`; here a `false` becomes an
//! error naming the file so the exit status is meaningful.

use std::time::SystemTime;

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, ValueEnum};
use portafile::metadata::system_time_to_millis;
use portafile::{FileHandle, PermissionSet};
use portafile_config::log_cli_info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AccessArg {
    Read,
    Write,
    Execute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct PermArgs {
    #[arg(value_enum)]
    access: AccessArg,

    #[arg(value_enum)]
    state: Toggle,

    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Apply to group and others as well as the owner
    #[arg(long)]
    all_users: bool,
}

pub fn touch(handle: &FileHandle) -> Result<()> {
    if !handle.exists() {
        materialize(handle, false, false)?;
        log_cli_info!("Created file", file = tracing::field::display(handle));
        return Ok(());
    }

    let now = system_time_to_millis(SystemTime::now());
    match handle.set_last_modified(now) {
        Ok(true) => Ok(()),
        Ok(false) => bail!("Failed to update the timestamp of {handle}"),
        // Providers own their timestamps
        Err(e) if e.is_unsupported() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn mkdir(handle: &FileHandle, parents: bool) -> Result<()> {
    if handle.exists() {
        ensure!(parents && handle.is_directory(), "{handle} already exists");
        return Ok(());
    }
    materialize(handle, true, parents)?;
    log_cli_info!("Created directory", dir = tracing::field::display(handle));
    Ok(())
}

pub fn rm(handle: &FileHandle) -> Result<()> {
    ensure!(handle.exists(), "{handle} does not exist");
    ensure!(handle.delete(), "Failed to delete {handle}");
    Ok(())
}

pub fn mv(from: &FileHandle, to: &FileHandle) -> Result<()> {
    ensure!(from.exists(), "{from} does not exist");
    ensure!(from.rename_to(to), "Failed to rename {from} to {to}");
    Ok(())
}

pub fn chmod(handle: &FileHandle, perms: PermissionSet) -> Result<()> {
    applied(handle, handle.set_permissions(perms))
}

pub fn perm(handle: &FileHandle, args: &PermArgs) -> Result<()> {
    let value = args.state == Toggle::On;
    let owner_only = !args.all_users;
    let result = match args.access {
        AccessArg::Read => handle.set_readable(value, owner_only),
        AccessArg::Write => handle.set_writable(value, owner_only),
        AccessArg::Execute => handle.set_executable(value, owner_only),
    };
    applied(handle, result)
}

pub fn read_only(handle: &FileHandle) -> Result<()> {
    applied(handle, handle.set_read_only())
}

fn applied(handle: &FileHandle, result: portafile::Result<bool>) -> Result<()> {
    let changed = result.with_context(|| format!("Cannot change permissions of {handle}"))?;
    ensure!(changed, "Failed to change permissions of {handle}");
    Ok(())
}

/// Create the file or directory `handle` names.
///
/// Path handles create in place. Capability handles for missing documents
/// are only addresses, so creation goes through the parent's `child`.
fn materialize(handle: &FileHandle, directory: bool, parents: bool) -> Result<()> {
    match handle {
        FileHandle::Path(_) => {
            let created = match (directory, parents) {
                (true, true) => handle.mkdirs(),
                (true, false) => handle.mkdir(),
                (false, _) => handle.create_new_file(),
            };
            ensure!(created, "Failed to create {handle}");
        }
        FileHandle::Capability(cap) => {
            let parent = handle
                .parent_file()
                .with_context(|| format!("{handle} has no parent to create it in"))?;
            if parents && !parent.exists() {
                materialize(&parent, true, true)?;
            }
            parent
                .child(&cap.target_name(), directory, None)
                .with_context(|| format!("Failed to create {handle}"))?;
        }
    }
    Ok(())
}
