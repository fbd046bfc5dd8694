use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use url::Url;

use super::{name_without_extension, FileHandle};
use crate::error::{FileError, Result};
use crate::permission::PermissionSet;
use crate::provider::{CapabilityProvider, DocumentInfo};
use crate::stream::{Sink, Source};

const VARIANT: &str = "capability";

/// A document reached through a [`CapabilityProvider`].
///
/// The URI is opaque: there is no path behind it, so anything that needs
/// one (space queries, mode bits, canonicalization, exit cleanup) fails
/// with [`FileError::Unsupported`]. Handles opened on a single document
/// (`tree = false`) have no parent and no children.
#[derive(Clone)]
pub struct CapabilityHandle {
    provider: Arc<dyn CapabilityProvider>,
    uri: String,
    tree: bool,
    default_mime_type: Arc<str>,
}

impl CapabilityHandle {
    /// Validate `uri` with `provider` and wrap it.
    pub fn new(provider: Arc<dyn CapabilityProvider>, uri: &str, tree: bool) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| FileError::invalid_uri(uri, e.to_string()))?;
        Self::from_url(provider, &url, tree)
    }

    pub(crate) fn from_url(
        provider: Arc<dyn CapabilityProvider>,
        url: &Url,
        tree: bool,
    ) -> Result<Self> {
        let uri = provider.resolve(url, tree)?;
        Ok(Self {
            provider,
            uri,
            tree,
            default_mime_type: Arc::from(portafile_config::DEFAULT_MIME_TYPE),
        })
    }

    /// MIME type used by [`child`](Self::child) when none is given.
    pub fn with_default_mime_type(mut self, mime_type: &str) -> Self {
        self.default_mime_type = Arc::from(mime_type);
        self
    }

    fn sibling(&self, uri: String) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            uri,
            tree: self.tree,
            default_mime_type: Arc::clone(&self.default_mime_type),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_tree(&self) -> bool {
        self.tree
    }

    pub fn provider(&self) -> &Arc<dyn CapabilityProvider> {
        &self.provider
    }

    /// One provider round-trip. Provider errors read as "missing".
    fn info(&self) -> Option<DocumentInfo> {
        match self.provider.stat(&self.uri) {
            Ok(info) => info,
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Stat failed",
                    uri = self.uri.as_str(),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    /// Display name, or the URI when the provider has none.
    pub fn name(&self) -> String {
        self.info()
            .and_then(|info| info.name)
            .unwrap_or_else(|| self.uri.clone())
    }

    /// Name for a document that may not exist yet: the provider's display
    /// name, else the last URI segment.
    pub fn target_name(&self) -> String {
        if let Some(name) = self.info().and_then(|info| info.name) {
            return name;
        }
        Url::parse(&self.uri)
            .ok()
            .and_then(|url| {
                url.path_segments()?
                    .rfind(|seg| !seg.is_empty())
                    .map(|seg| percent_decode_str(seg).decode_utf8_lossy().into_owned())
            })
            .unwrap_or_else(|| self.uri.clone())
    }

    pub fn name_without_extension(&self) -> String {
        name_without_extension(&self.name())
    }

    fn parent_uri(&self) -> Option<String> {
        if !self.tree {
            return None;
        }
        match self.provider.parent(&self.uri) {
            Ok(parent) => parent,
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Parent lookup failed",
                    uri = self.uri.as_str(),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    pub fn parent(&self) -> Option<String> {
        self.parent_uri()
    }

    pub fn parent_file(&self) -> Option<FileHandle> {
        self.parent_uri()
            .map(|uri| FileHandle::Capability(self.sibling(uri)))
    }

    pub fn path(&self) -> String {
        self.uri.clone()
    }

    pub fn is_absolute(&self) -> bool {
        false
    }

    pub fn absolute_path(&self) -> String {
        self.path()
    }

    pub fn absolute_file(&self) -> FileHandle {
        FileHandle::Capability(self.clone())
    }

    pub fn canonical_path(&self) -> Result<String> {
        Err(FileError::unsupported("canonical_path", VARIANT))
    }

    pub fn canonical_file(&self) -> Result<FileHandle> {
        Err(FileError::unsupported("canonical_file", VARIANT))
    }

    pub fn can_read(&self) -> Result<bool> {
        Ok(self.info().map(|i| i.can_read).unwrap_or(false))
    }

    pub fn can_write(&self) -> Result<bool> {
        Ok(self.info().map(|i| i.can_write).unwrap_or(false))
    }

    pub fn can_execute(&self) -> Result<bool> {
        Err(FileError::unsupported("can_execute", VARIANT))
    }

    pub fn exists(&self) -> bool {
        self.info().is_some()
    }

    pub fn is_directory(&self) -> bool {
        self.info().map(|i| i.is_directory()).unwrap_or(false)
    }

    pub fn is_file(&self) -> bool {
        self.info().map(|i| !i.is_directory()).unwrap_or(false)
    }

    /// Providers have no notion of hidden documents.
    pub fn is_hidden(&self) -> Result<bool> {
        Err(FileError::unsupported("is_hidden", VARIANT))
    }

    pub fn last_modified(&self) -> i64 {
        self.info().map(|i| i.last_modified).unwrap_or(0)
    }

    pub fn length(&self) -> u64 {
        self.info().map(|i| i.len).unwrap_or(0)
    }

    pub fn total_space(&self) -> Result<u64> {
        Err(FileError::unsupported("total_space", VARIANT))
    }

    pub fn free_space(&self) -> Result<u64> {
        Err(FileError::unsupported("free_space", VARIANT))
    }

    pub fn usable_space(&self) -> Result<u64> {
        Err(FileError::unsupported("usable_space", VARIANT))
    }

    pub fn permissions(&self) -> Result<PermissionSet> {
        Err(FileError::unsupported("permissions", VARIANT))
    }

    /// Documents come into being through [`child`](Self::child), so there
    /// is nothing left to create.
    pub fn create_new_file(&self) -> bool {
        true
    }

    pub fn delete(&self) -> bool {
        self.report("delete", self.provider.delete(&self.uri))
    }

    pub fn delete_on_exit(&self) -> Result<()> {
        Err(FileError::unsupported("delete_on_exit", VARIANT))
    }

    fn children(&self) -> Option<Vec<CapabilityHandle>> {
        if !self.tree || !self.is_directory() {
            return None;
        }
        match self.provider.children(&self.uri) {
            Ok(uris) => Some(uris.into_iter().map(|uri| self.sibling(uri)).collect()),
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Listing failed",
                    uri = self.uri.as_str(),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    pub fn list(&self) -> Option<Vec<String>> {
        self.list_filtered(|_, _| true)
    }

    pub fn list_filtered<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&FileHandle, &str) -> bool,
    {
        let dir = FileHandle::Capability(self.clone());
        Some(
            self.children()?
                .into_iter()
                .map(|child| child.name())
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
        let dir = FileHandle::Capability(self.clone());
        Some(
            self.children()?
                .into_iter()
                .filter(|child| filter(&dir, child.name().as_str()))
                .map(FileHandle::Capability)
                .collect(),
        )
    }

    pub fn list_files_matching<F>(&self, mut filter: F) -> Option<Vec<FileHandle>>
    where
        F: FnMut(&FileHandle) -> bool,
    {
        Some(
            self.children()?
                .into_iter()
                .map(FileHandle::Capability)
                .filter(|handle| filter(handle))
                .collect(),
        )
    }

    /// Directories are materialized by [`child`](Self::child); nothing to do.
    pub fn mkdir(&self) -> bool {
        true
    }

    pub fn mkdirs(&self) -> bool {
        true
    }

    /// Renames in place to the name of `dest`. Documents cannot move
    /// between directories or providers.
    pub fn rename_to(&self, dest: &FileHandle) -> bool {
        let name = match dest {
            FileHandle::Path(p) => p.name(),
            FileHandle::Capability(c) => c.target_name(),
        };
        let result = self.provider.rename(&self.uri, &name).map(|uri| {
            portafile_config::log_capability_debug!(
                "Renamed",
                from = self.uri.as_str(),
                to = uri.as_str()
            );
        });
        self.report("rename_to", result)
    }

    pub fn set_last_modified(&self, _time: i64) -> Result<bool> {
        Err(FileError::unsupported("set_last_modified", VARIANT))
    }

    pub fn set_read_only(&self) -> Result<bool> {
        Err(FileError::unsupported("set_read_only", VARIANT))
    }

    pub fn set_writable(&self, _value: bool, _owner_only: bool) -> Result<bool> {
        Err(FileError::unsupported("set_writable", VARIANT))
    }

    pub fn set_readable(&self, _value: bool, _owner_only: bool) -> Result<bool> {
        Err(FileError::unsupported("set_readable", VARIANT))
    }

    pub fn set_executable(&self, _value: bool, _owner_only: bool) -> Result<bool> {
        Err(FileError::unsupported("set_executable", VARIANT))
    }

    pub fn set_permissions(&self, _perms: PermissionSet) -> Result<bool> {
        Err(FileError::unsupported("set_permissions", VARIANT))
    }

    pub fn open_input_stream(&self) -> Option<Source> {
        match self.provider.open_read(&self.uri) {
            Ok(reader) => Some(Source::new(reader)),
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Open for reading failed",
                    uri = self.uri.as_str(),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    pub fn open_output_stream(&self, append: bool) -> Option<Sink> {
        match self.provider.open_write(&self.uri, append) {
            Ok(writer) => Some(Sink::new(writer)),
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Open for writing failed",
                    uri = self.uri.as_str(),
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    /// Existing child called `name`, or a new one created through the
    /// provider. `None` unless this is a directory in a tree.
    pub fn child(
        &self,
        name: &str,
        is_directory: bool,
        mime_type: Option<&str>,
    ) -> Option<FileHandle> {
        if !self.tree || !self.is_directory() {
            return None;
        }
        let found = self
            .provider
            .find_child(&self.uri, name)
            .and_then(|found| match found {
                Some(uri) => Ok(uri),
                None if is_directory => self.provider.create_directory(&self.uri, name),
                None => {
                    let mime = mime_type.unwrap_or(&*self.default_mime_type);
                    self.provider.create_document(&self.uri, mime, name)
                }
            });
        match found {
            Ok(uri) => Some(FileHandle::Capability(self.sibling(uri))),
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Child lookup failed",
                    uri = self.uri.as_str(),
                    name = name,
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    fn report(&self, op: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                portafile_config::log_capability_debug!(
                    "Operation failed",
                    op = op,
                    uri = self.uri.as_str(),
                    error = tracing::field::display(&e)
                );
                false
            }
        }
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("uri", &self.uri)
            .field("tree", &self.tree)
            .field("provider", &self.provider.scheme())
            .finish()
    }
}

impl PartialEq for CapabilityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for CapabilityHandle {}

impl Hash for CapabilityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state)
    }
}

impl PartialOrd for CapabilityHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CapabilityHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}
