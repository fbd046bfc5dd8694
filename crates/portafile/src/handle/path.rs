use std::cmp::Ordering;
use std::fs::{self, OpenOptions};
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use filetime::FileTime;
use tracing::instrument;

use super::{name_without_extension, FileHandle};
use crate::context::CleanupRegistry;
use crate::error::{FileError, Result};
use crate::metadata;
use crate::mutator::{self, PermissionChange};
use crate::permission::{Access, PermissionSet};
use crate::stream::{Sink, Source};

/// A file addressed by a filesystem path.
///
/// Holds the path exactly as given. Equality, hashing and ordering use the
/// lexically normalized absolute form, so `a/./b` and `$PWD/a/b` compare
/// equal without touching the disk.
#[derive(Debug, Clone)]
pub struct PathHandle {
    path: PathBuf,
    cleanup: Option<Arc<CleanupRegistry>>,
}

impl PathHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cleanup: None,
        }
    }

    /// `parent` joined with `child`. Leading separators on `child` are
    /// dropped so it cannot replace the parent.
    pub fn from_parent_str(parent: &str, child: &str) -> Self {
        Self::new(join_child(Path::new(parent), child))
    }

    pub fn from_parent(parent: &PathHandle, child: &str) -> Self {
        Self {
            path: join_child(&parent.path, child),
            cleanup: parent.cleanup.clone(),
        }
    }

    pub(crate) fn with_cleanup(mut self, cleanup: Arc<CleanupRegistry>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    fn derive(&self, path: PathBuf) -> Self {
        Self {
            path,
            cleanup: self.cleanup.clone(),
        }
    }

    pub fn as_std_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }

    /// Last component, empty for roots.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn name_without_extension(&self) -> String {
        name_without_extension(&self.name())
    }

    pub fn parent(&self) -> Option<String> {
        self.parent_path()
            .map(|p| p.to_string_lossy().into_owned())
    }

    pub fn parent_file(&self) -> Option<FileHandle> {
        self.parent_path()
            .map(|p| FileHandle::Path(self.derive(p.to_path_buf())))
    }

    fn parent_path(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    pub fn path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn is_absolute(&self) -> bool {
        self.path.is_absolute()
    }

    pub fn absolute_path(&self) -> String {
        self.absolute().to_string_lossy().into_owned()
    }

    pub fn absolute_file(&self) -> FileHandle {
        FileHandle::Path(self.derive(self.absolute()))
    }

    fn absolute(&self) -> PathBuf {
        if self.path.is_absolute() {
            return self.path.clone();
        }
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(&self.path),
            Err(_) => self.path.clone(),
        }
    }

    /// Lexically normalized absolute path: the identity of this handle.
    pub(crate) fn identity(&self) -> PathBuf {
        normalize(&self.absolute())
    }

    /// Symlinks and `.`/`..` resolved against the live filesystem. A
    /// missing final component is allowed as long as its parent resolves.
    /// A broken symlink counts as missing and yields the link's own location.
    pub fn canonical_path(&self) -> Result<String> {
        Ok(self.canonical()?.to_string_lossy().into_owned())
    }

    pub fn canonical_file(&self) -> Result<FileHandle> {
        Ok(FileHandle::Path(self.derive(self.canonical()?)))
    }

    fn canonical(&self) -> Result<PathBuf> {
        match fs::canonicalize(&self.path) {
            Ok(path) => Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let absolute = self.absolute();
                let name = absolute
                    .file_name()
                    .ok_or_else(|| FileError::NotFound(self.path()))?;
                let parent = absolute
                    .parent()
                    .ok_or_else(|| FileError::NotFound(self.path()))?;
                Ok(fs::canonicalize(parent)?.join(name))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn can_read(&self) -> Result<bool> {
        Ok(metadata::can_read(&self.path))
    }

    pub fn can_write(&self) -> Result<bool> {
        Ok(metadata::can_write(&self.path))
    }

    pub fn can_execute(&self) -> Result<bool> {
        Ok(metadata::can_execute(&self.path))
    }

    pub fn exists(&self) -> bool {
        metadata::exists(&self.path)
    }

    pub fn is_directory(&self) -> bool {
        metadata::is_directory(&self.path)
    }

    pub fn is_file(&self) -> bool {
        metadata::is_file(&self.path)
    }

    pub fn is_hidden(&self) -> Result<bool> {
        Ok(metadata::is_hidden(&self.path))
    }

    pub fn last_modified(&self) -> i64 {
        metadata::last_modified(&self.path)
    }

    pub fn length(&self) -> u64 {
        metadata::length(&self.path)
    }

    pub fn total_space(&self) -> Result<u64> {
        Ok(metadata::space(&self.path)?.total)
    }

    pub fn free_space(&self) -> Result<u64> {
        Ok(metadata::space(&self.path)?.free)
    }

    pub fn usable_space(&self) -> Result<u64> {
        Ok(metadata::space(&self.path)?.usable)
    }

    pub fn permissions(&self) -> Result<PermissionSet> {
        Ok(metadata::permissions(&self.path)?)
    }

    pub fn create_new_file(&self) -> bool {
        report(
            "create_new_file",
            &self.path,
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
                .map(drop)
                .map_err(FileError::from),
        )
    }

    /// Files, symlinks and empty directories only.
    pub fn delete(&self) -> bool {
        let result = match fs::symlink_metadata(&self.path) {
            Ok(md) if md.is_dir() => fs::remove_dir(&self.path),
            Ok(_) => fs::remove_file(&self.path),
            Err(e) => Err(e),
        };
        report("delete", &self.path, result.map_err(FileError::from))
    }

    /// Remove this path when the owning context goes away.
    pub fn delete_on_exit(&self) -> Result<()> {
        let cleanup = self
            .cleanup
            .as_ref()
            .ok_or_else(|| FileError::unsupported("delete_on_exit", "detached path"))?;
        cleanup.schedule(self.absolute());
        Ok(())
    }

    /// Entry names in directory-iteration order, `None` unless this is a
    /// readable directory.
    pub fn list(&self) -> Option<Vec<String>> {
        self.list_filtered(|_, _| true)
    }

    pub fn list_filtered<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&FileHandle, &str) -> bool,
    {
        let dir = FileHandle::Path(self.clone());
        Some(
            self.entries()?
                .into_iter()
                .filter(|name| filter(&dir, name.as_str()))
                .collect(),
        )
    }

    pub fn list_files(&self) -> Option<Vec<FileHandle>> {
        self.list_files_filtered(|_, _| true)
    }

    pub fn list_files_filtered<F>(&self, mut filter: F) -> Option<Vec<FileHandle>>
    where
        F: FnMut(&FileHandle, &str) -> bool,
    {
        let dir = FileHandle::Path(self.clone());
        Some(
            self.entries()?
                .into_iter()
                .filter(|name| filter(&dir, name.as_str()))
                .map(|name| FileHandle::Path(self.derive(self.path.join(name))))
                .collect(),
        )
    }

    pub fn list_files_matching<F>(&self, mut filter: F) -> Option<Vec<FileHandle>>
    where
        F: FnMut(&FileHandle) -> bool,
    {
        Some(
            self.entries()?
                .into_iter()
                .map(|name| FileHandle::Path(self.derive(self.path.join(name))))
                .filter(|handle| filter(handle))
                .collect(),
        )
    }

    fn entries(&self) -> Option<Vec<String>> {
        let reader = match fs::read_dir(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                portafile_config::log_handle_debug!(
                    "Listing failed",
                    path = tracing::field::display(self.path.display()),
                    error = tracing::field::display(&e)
                );
                return None;
            }
        };
        Some(
            reader
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect(),
        )
    }

    /// False if the directory already exists or the parent is missing.
    pub fn mkdir(&self) -> bool {
        report(
            "mkdir",
            &self.path,
            fs::create_dir(&self.path).map_err(FileError::from),
        )
    }

    /// Like [`mkdir`](Self::mkdir) but creates missing parents. Still false
    /// when the directory was already there.
    pub fn mkdirs(&self) -> bool {
        if self.exists() {
            return false;
        }
        report(
            "mkdirs",
            &self.path,
            fs::create_dir_all(&self.path).map_err(FileError::from),
        )
    }

    /// A single `rename(2)`: atomic, or it fails. Moves across volumes
    /// fail instead of degrading to copy and delete.
    #[instrument(level = "debug", skip(self, dest), fields(from = %self.path.display(), to = %dest))]
    pub fn rename_to(&self, dest: &FileHandle) -> bool {
        let result = match dest {
            FileHandle::Path(target) => {
                fs::rename(&self.path, &target.path).map_err(FileError::from)
            }
            FileHandle::Capability(_) => Err(FileError::InvalidArgument(
                "cannot move a path onto a capability document".to_string(),
            )),
        };
        report("rename_to", &self.path, result)
    }

    pub fn set_last_modified(&self, time: i64) -> Result<bool> {
        if time < 0 {
            return Err(FileError::InvalidArgument(format!(
                "negative modification time {time}"
            )));
        }
        let nanos = (time.rem_euclid(1000) * 1_000_000) as u32;
        let mtime = FileTime::from_unix_time(time.div_euclid(1000), nanos);
        Ok(report(
            "set_last_modified",
            &self.path,
            filetime::set_file_mtime(&self.path, mtime).map_err(FileError::from),
        ))
    }

    pub fn set_read_only(&self) -> Result<bool> {
        Ok(report(
            "set_read_only",
            &self.path,
            mutator::set_read_only(&self.path),
        ))
    }

    pub fn set_writable(&self, value: bool, owner_only: bool) -> Result<bool> {
        self.change(Access::Write, value, owner_only)
    }

    pub fn set_readable(&self, value: bool, owner_only: bool) -> Result<bool> {
        self.change(Access::Read, value, owner_only)
    }

    pub fn set_executable(&self, value: bool, owner_only: bool) -> Result<bool> {
        self.change(Access::Execute, value, owner_only)
    }

    fn change(&self, access: Access, value: bool, owner_only: bool) -> Result<bool> {
        let change = PermissionChange::new(access, value, owner_only);
        Ok(report(
            "set_permission",
            &self.path,
            mutator::set_permission(&self.path, change),
        ))
    }

    pub fn set_permissions(&self, perms: PermissionSet) -> Result<bool> {
        Ok(report(
            "set_permissions",
            &self.path,
            mutator::set_permissions(&self.path, perms),
        ))
    }

    pub fn open_input_stream(&self) -> Option<Source> {
        match fs::File::open(&self.path) {
            Ok(file) => Some(Source::new(file)),
            Err(e) => {
                portafile_config::log_handle_debug!(
                    "Open for reading failed",
                    path = tracing::field::display(self.path.display()),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    /// Creates the file if needed. `append = false` truncates.
    pub fn open_output_stream(&self, append: bool) -> Option<Sink> {
        let opened = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(&self.path);
        match opened {
            Ok(file) => Some(Sink::new(file)),
            Err(e) => {
                portafile_config::log_handle_debug!(
                    "Open for writing failed",
                    path = tracing::field::display(self.path.display()),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    /// Pure path composition, `None` unless this is an existing directory.
    /// The MIME type means nothing to a filesystem and is ignored.
    pub fn child(
        &self,
        name: &str,
        _is_directory: bool,
        _mime_type: Option<&str>,
    ) -> Option<FileHandle> {
        if !self.is_directory() {
            return None;
        }
        Some(FileHandle::Path(Self::from_parent(self, name)))
    }
}

/// Collapse a mutator result to the boolean contract, keeping the cause in the log.
fn report(op: &str, path: &Path, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            portafile_config::log_handle_debug!(
                "Operation failed",
                op = op,
                path = tracing::field::display(path.display()),
                error = tracing::field::display(&e)
            );
            false
        }
    }
}

fn join_child(parent: &Path, child: &str) -> PathBuf {
    let child = child.trim_start_matches(|c: char| c == '/' || c == MAIN_SEPARATOR);
    if child.is_empty() {
        return parent.to_path_buf();
    }
    parent.join(child)
}

/// Drop `.` and fold `..` without consulting the filesystem. `..` never
/// climbs above the root.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_top = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_top {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl PartialEq for PathHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity().as_os_str() == other.identity().as_os_str()
    }
}

impl Eq for PathHandle {}

impl Hash for PathHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().as_os_str().hash(state)
    }
}

impl PartialOrd for PathHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Plain string order of the normalized path, not component order:
/// `/a-b` sorts before `/a/b`.
impl Ord for PathHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().as_os_str().cmp(other.identity().as_os_str())
    }
}

impl From<PathBuf> for PathHandle {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for PathHandle {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}
