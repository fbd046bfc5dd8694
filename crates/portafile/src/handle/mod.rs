//! File handles: one type over path-addressed files and
//! capability-addressed documents.
//!
//! A handle is a reference, not the file. It owns no OS resources, never
//! caches metadata and never changes after construction. Operations either
//! hand back a new handle or act on whatever the handle points at.
//!
//! Operations a variant cannot perform return [`FileError::Unsupported`];
//! mutators that can merely fail report `false` and log the cause at debug.
//!
//! [`FileError::Unsupported`]: crate::FileError::Unsupported

mod capability;
mod path;

pub use capability::CapabilityHandle;
pub use path::PathHandle;

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::permission::PermissionSet;
use crate::stream::{Sink, Source};

/// Forward a call to whichever variant is inside.
macro_rules! dispatch {
    ($self:ident.$method:ident($($arg:expr),*)) => {
        match $self {
            FileHandle::Path(h) => h.$method($($arg),*),
            FileHandle::Capability(h) => h.$method($($arg),*),
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileHandle {
    Path(PathHandle),
    Capability(CapabilityHandle),
}

impl FileHandle {
    pub fn as_path(&self) -> Option<&PathHandle> {
        match self {
            FileHandle::Path(h) => Some(h),
            FileHandle::Capability(_) => None,
        }
    }

    pub fn as_capability(&self) -> Option<&CapabilityHandle> {
        match self {
            FileHandle::Path(_) => None,
            FileHandle::Capability(h) => Some(h),
        }
    }

    /// Filesystem path, for path handles.
    pub fn as_std_path(&self) -> Option<&Path> {
        self.as_path().map(PathHandle::as_std_path)
    }

    pub fn variant(&self) -> &'static str {
        match self {
            FileHandle::Path(_) => "path",
            FileHandle::Capability(_) => "capability",
        }
    }

    // --- names and paths ---

    pub fn name(&self) -> String {
        dispatch!(self.name())
    }

    pub fn name_without_extension(&self) -> String {
        dispatch!(self.name_without_extension())
    }

    pub fn parent(&self) -> Option<String> {
        dispatch!(self.parent())
    }

    pub fn parent_file(&self) -> Option<FileHandle> {
        dispatch!(self.parent_file())
    }

    /// The path or URI as constructed.
    pub fn path(&self) -> String {
        dispatch!(self.path())
    }

    pub fn is_absolute(&self) -> bool {
        dispatch!(self.is_absolute())
    }

    pub fn absolute_path(&self) -> String {
        dispatch!(self.absolute_path())
    }

    pub fn absolute_file(&self) -> FileHandle {
        dispatch!(self.absolute_file())
    }

    pub fn canonical_path(&self) -> Result<String> {
        dispatch!(self.canonical_path())
    }

    pub fn canonical_file(&self) -> Result<FileHandle> {
        dispatch!(self.canonical_file())
    }

    // --- metadata ---

    pub fn can_read(&self) -> Result<bool> {
        dispatch!(self.can_read())
    }

    pub fn can_write(&self) -> Result<bool> {
        dispatch!(self.can_write())
    }

    pub fn can_execute(&self) -> Result<bool> {
        dispatch!(self.can_execute())
    }

    pub fn exists(&self) -> bool {
        dispatch!(self.exists())
    }

    pub fn is_directory(&self) -> bool {
        dispatch!(self.is_directory())
    }

    pub fn is_file(&self) -> bool {
        dispatch!(self.is_file())
    }

    pub fn is_hidden(&self) -> Result<bool> {
        dispatch!(self.is_hidden())
    }

    /// Milliseconds since the epoch, 0 when missing.
    pub fn last_modified(&self) -> i64 {
        dispatch!(self.last_modified())
    }

    /// Bytes, 0 when missing.
    pub fn length(&self) -> u64 {
        dispatch!(self.length())
    }

    pub fn total_space(&self) -> Result<u64> {
        dispatch!(self.total_space())
    }

    pub fn free_space(&self) -> Result<u64> {
        dispatch!(self.free_space())
    }

    pub fn usable_space(&self) -> Result<u64> {
        dispatch!(self.usable_space())
    }

    pub fn permissions(&self) -> Result<PermissionSet> {
        dispatch!(self.permissions())
    }

    // --- creation, deletion, listing ---

    pub fn create_new_file(&self) -> bool {
        dispatch!(self.create_new_file())
    }

    pub fn delete(&self) -> bool {
        dispatch!(self.delete())
    }

    pub fn delete_on_exit(&self) -> Result<()> {
        dispatch!(self.delete_on_exit())
    }

    /// `None` unless this is a directory that could be read.
    pub fn list(&self) -> Option<Vec<String>> {
        dispatch!(self.list())
    }

    pub fn list_filtered<F>(&self, filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&FileHandle, &str) -> bool,
    {
        dispatch!(self.list_filtered(filter))
    }

    pub fn list_files(&self) -> Option<Vec<FileHandle>> {
        dispatch!(self.list_files())
    }

    pub fn list_files_filtered<F>(&self, filter: F) -> Option<Vec<FileHandle>>
    where
        F: FnMut(&FileHandle, &str) -> bool,
    {
        dispatch!(self.list_files_filtered(filter))
    }

    pub fn list_files_matching<F>(&self, filter: F) -> Option<Vec<FileHandle>>
    where
        F: FnMut(&FileHandle) -> bool,
    {
        dispatch!(self.list_files_matching(filter))
    }

    pub fn mkdir(&self) -> bool {
        dispatch!(self.mkdir())
    }

    pub fn mkdirs(&self) -> bool {
        dispatch!(self.mkdirs())
    }

    pub fn rename_to(&self, dest: &FileHandle) -> bool {
        dispatch!(self.rename_to(dest))
    }

    // --- mutation ---

    pub fn set_last_modified(&self, time: i64) -> Result<bool> {
        dispatch!(self.set_last_modified(time))
    }

    /// Clears the write bit for owner, group and others.
    pub fn set_read_only(&self) -> Result<bool> {
        dispatch!(self.set_read_only())
    }

    pub fn set_writable(&self, value: bool, owner_only: bool) -> Result<bool> {
        dispatch!(self.set_writable(value, owner_only))
    }

    pub fn set_readable(&self, value: bool, owner_only: bool) -> Result<bool> {
        dispatch!(self.set_readable(value, owner_only))
    }

    pub fn set_executable(&self, value: bool, owner_only: bool) -> Result<bool> {
        dispatch!(self.set_executable(value, owner_only))
    }

    pub fn set_writable_for_owner(&self, value: bool) -> Result<bool> {
        self.set_writable(value, true)
    }

    pub fn set_readable_for_owner(&self, value: bool) -> Result<bool> {
        self.set_readable(value, true)
    }

    pub fn set_executable_for_owner(&self, value: bool) -> Result<bool> {
        self.set_executable(value, true)
    }

    /// Replace all nine permission bits at once.
    pub fn set_permissions(&self, perms: PermissionSet) -> Result<bool> {
        dispatch!(self.set_permissions(perms))
    }

    // --- streams ---

    pub fn open_input_stream(&self) -> Option<Source> {
        dispatch!(self.open_input_stream())
    }

    /// `append = false` truncates existing content.
    pub fn open_output_stream(&self, append: bool) -> Option<Sink> {
        dispatch!(self.open_output_stream(append))
    }

    /// Child called `name`. Path handles compose the path; capability
    /// handles look the child up and create it when missing, using
    /// `mime_type` (or the context default) for new documents.
    pub fn child(
        &self,
        name: &str,
        is_directory: bool,
        mime_type: Option<&str>,
    ) -> Option<FileHandle> {
        dispatch!(self.child(name, is_directory, mime_type))
    }
}

/// Text before the last `.`, or the whole name when it has none.
pub(crate) fn name_without_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) => name[..idx].to_string(),
        None => name.to_string(),
    }
}

impl PartialOrd for FileHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Path handles sort before capability handles.
impl Ord for FileHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FileHandle::Path(a), FileHandle::Path(b)) => a.cmp(b),
            (FileHandle::Capability(a), FileHandle::Capability(b)) => a.cmp(b),
            (FileHandle::Path(_), FileHandle::Capability(_)) => Ordering::Less,
            (FileHandle::Capability(_), FileHandle::Path(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl From<PathHandle> for FileHandle {
    fn from(h: PathHandle) -> Self {
        FileHandle::Path(h)
    }
}

impl From<CapabilityHandle> for FileHandle {
    fn from(h: CapabilityHandle) -> Self {
        FileHandle::Capability(h)
    }
}

impl From<PathBuf> for FileHandle {
    fn from(path: PathBuf) -> Self {
        FileHandle::Path(PathHandle::new(path))
    }
}

impl From<&Path> for FileHandle {
    fn from(path: &Path) -> Self {
        FileHandle::Path(PathHandle::new(path))
    }
}
