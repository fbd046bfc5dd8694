//! Read-only commands: `stat`, `ls`, `resolve`, `mode`.

use anyhow::{bail, Context, Result};
use clap::Args;
use portafile::{FileHandle, PermissionSet};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct StatArgs {
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Emit a JSON object instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    #[arg(value_name = "INPUT", default_value = ".")]
    pub input: String,

    /// Include entries whose name starts with a dot
    #[arg(short, long)]
    all: bool,

    /// Show kind and size next to each name
    #[arg(short, long)]
    long: bool,
}

/// Everything `stat` knows about one handle. `None` marks a query the
/// handle's variant cannot answer.
#[derive(Debug, Serialize)]
struct StatReport {
    path: String,
    variant: &'static str,
    exists: bool,
    kind: &'static str,
    length: u64,
    last_modified: i64,
    permissions: Option<String>,
    mode: Option<String>,
    can_read: Option<bool>,
    can_write: Option<bool>,
    can_execute: Option<bool>,
    hidden: Option<bool>,
    total_space: Option<u64>,
    free_space: Option<u64>,
    usable_space: Option<u64>,
}

impl StatReport {
    fn collect(handle: &FileHandle) -> Result<Self> {
        let exists = handle.exists();
        let mut report = StatReport {
            path: handle.path(),
            variant: handle.variant(),
            exists,
            kind: kind(handle),
            length: handle.length(),
            last_modified: handle.last_modified(),
            permissions: None,
            mode: None,
            can_read: None,
            can_write: None,
            can_execute: None,
            hidden: None,
            total_space: None,
            free_space: None,
            usable_space: None,
        };
        if !exists {
            return Ok(report);
        }

        if let Some(perms) = supported(handle.permissions())? {
            report.permissions = Some(perms.to_string());
            report.mode = Some(format!("{:04o}", perms.to_mode()));
        }
        report.can_read = supported(handle.can_read())?;
        report.can_write = supported(handle.can_write())?;
        report.can_execute = supported(handle.can_execute())?;
        report.hidden = supported(handle.is_hidden())?;
        report.total_space = supported(handle.total_space())?;
        report.free_space = supported(handle.free_space())?;
        report.usable_space = supported(handle.usable_space())?;
        Ok(report)
    }

    fn print(&self) {
        println!("  Path:      {}", self.path);
        println!("  Handle:    {}", self.variant);
        println!("  Kind:      {}", self.kind);
        if !self.exists {
            return;
        }
        println!("  Size:      {}", self.length);
        println!("  Modified:  {}", self.last_modified);
        match (&self.permissions, &self.mode) {
            (Some(perms), Some(mode)) => println!("  Access:    {perms} ({mode})"),
            _ => println!("  Access:    unsupported"),
        }
        println!(
            "  R/W/X:     {}/{}/{}",
            flag(self.can_read),
            flag(self.can_write),
            flag(self.can_execute)
        );
        println!("  Hidden:    {}", flag(self.hidden));
        match (self.total_space, self.free_space, self.usable_space) {
            (Some(total), Some(free), Some(usable)) => {
                println!("  Volume:    {total} total, {free} free, {usable} usable")
            }
            _ => println!("  Volume:    unsupported"),
        }
    }
}

pub fn stat(handle: &FileHandle, args: &StatArgs) -> Result<()> {
    let report = StatReport::collect(handle)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}

pub fn ls(handle: &FileHandle, args: &LsArgs) -> Result<()> {
    let mut entries = handle
        .list_files_filtered(|_, name| args.all || !name.starts_with('.'))
        .with_context(|| format!("{handle} is not a listable directory"))?;
    entries.sort_by_key(|entry| entry.name());

    for entry in entries {
        if args.long {
            let marker = if entry.is_directory() { 'd' } else { '-' };
            println!("{marker} {:>12} {}", entry.length(), entry.name());
        } else {
            println!("{}", entry.name());
        }
    }
    Ok(())
}

pub fn describe(handle: &FileHandle) -> Result<()> {
    println!("variant:   {}", handle.variant());
    println!("path:      {}", handle.path());
    println!("absolute:  {}", handle.absolute_path());
    match handle.canonical_path() {
        Ok(path) => println!("canonical: {path}"),
        Err(e) if e.is_unsupported() => println!("canonical: unsupported"),
        Err(e) => println!("canonical: unavailable ({e})"),
    }
    if let Some(parent) = handle.parent() {
        println!("parent:    {parent}");
    }
    Ok(())
}

/// Print the other form of a permission value.
pub fn mode(value: &str) -> Result<()> {
    if is_octal(value) {
        println!("{}", parse_mode(value)?);
    } else {
        println!("{:03o}", parse_mode(value)?.to_mode());
    }
    Ok(())
}

/// Accepts `754`, `0754`, `0o754` or `rwxr-xr--`.
pub fn parse_mode(value: &str) -> Result<PermissionSet> {
    if !is_octal(value) {
        return Ok(value.parse()?);
    }
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode = u32::from_str_radix(digits, 8)
        .with_context(|| format!("Invalid octal mode {value:?}"))?;
    if mode > 0o777 {
        bail!("Mode {value:?} carries bits beyond rwxrwxrwx");
    }
    Ok(PermissionSet::from_mode(mode))
}

fn is_octal(value: &str) -> bool {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| ('0'..='7').contains(&c))
}

fn kind(handle: &FileHandle) -> &'static str {
    if handle.is_directory() {
        "directory"
    } else if handle.is_file() {
        "file"
    } else if handle.exists() {
        "other"
    } else {
        "missing"
    }
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unsupported",
    }
}

/// Unsupported queries become `None`; real failures still surface.
fn supported<T>(result: portafile::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_unsupported() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
