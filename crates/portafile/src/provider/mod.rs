//! Capability providers: the document-access backends behind
//! capability handles.
//!
//! A provider hands out opaque URIs and answers questions about them. It
//! never exposes a filesystem path, so operations that need one (space
//! queries, mode bits, canonicalization) are simply not part of the trait.
//!
//! - [`TreeProvider`]: URIs mapped onto granted directories
//! - [`MemoryProvider`]: in-process document store

mod memory;
mod tree;

pub use memory::MemoryProvider;
pub use tree::TreeProvider;

use std::fmt;
use std::io::{Read, Write};

use url::Url;

use crate::error::Result;

/// Whether a document is a container of other documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Directory,
    Document,
}

/// What a provider knows about one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Display name. Providers may not have one, callers fall back to the URI.
    pub name: Option<String>,
    pub kind: DocumentKind,
    pub mime_type: Option<String>,
    pub len: u64,
    /// Milliseconds since the epoch, 0 when unknown.
    pub last_modified: i64,
    pub can_read: bool,
    pub can_write: bool,
}

impl DocumentInfo {
    pub fn is_directory(&self) -> bool {
        self.kind == DocumentKind::Directory
    }
}

/// A backend serving one URI scheme.
///
/// URIs passed in are the strings the provider itself produced (through
/// [`resolve`](CapabilityProvider::resolve) or one of the creating calls).
pub trait CapabilityProvider: Send + Sync + fmt::Debug {
    /// Scheme this provider answers for, without the trailing colon.
    fn scheme(&self) -> &str;

    /// Validate `uri` and return the form every later call will use.
    ///
    /// `tree` asks for a handle that can navigate to parents and children.
    fn resolve(&self, uri: &Url, tree: bool) -> Result<String>;

    /// `None` when the document does not exist (anymore).
    fn stat(&self, uri: &str) -> Result<Option<DocumentInfo>>;

    /// `None` at the top of a granted tree.
    fn parent(&self, uri: &str) -> Result<Option<String>>;

    fn children(&self, uri: &str) -> Result<Vec<String>>;

    fn find_child(&self, parent: &str, name: &str) -> Result<Option<String>> {
        for child in self.children(parent)? {
            let info = self.stat(&child)?;
            if info.and_then(|i| i.name).as_deref() == Some(name) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn create_document(&self, parent: &str, mime_type: &str, name: &str) -> Result<String>;

    fn create_directory(&self, parent: &str, name: &str) -> Result<String>;

    /// Rename in place. Returns the URI the document is reachable at afterwards.
    fn rename(&self, uri: &str, name: &str) -> Result<String>;

    /// Remove the document, and everything below it for directories.
    fn delete(&self, uri: &str) -> Result<()>;

    fn open_read(&self, uri: &str) -> Result<Box<dyn Read + Send>>;

    /// `append = false` truncates.
    fn open_write(&self, uri: &str, append: bool) -> Result<Box<dyn Write + Send>>;
}

/// Names a provider accepts for a new or renamed document.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(crate::error::FileError::InvalidArgument(format!(
            "invalid document name {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name(".hidden").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
