//! Directory-backed provider.
//!
//! `scheme://authority/a/b%20c` names `<root of authority>/a/b c`. Segments
//! are percent-encoded, empty segments are ignored and `.`/`..` are
//! rejected, so a URI can never name anything above its root. Symlinks that
//! lead out of the root are refused on access.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::instrument;
use url::Url;

use super::{validate_name, CapabilityProvider, DocumentInfo, DocumentKind};
use crate::error::{FileError, Result};
use crate::metadata;

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'\\')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub(crate) const DIRECTORY_MIME_TYPE: &str = "inode/directory";

#[derive(Debug)]
pub struct TreeProvider {
    scheme: String,
    roots: BTreeMap<String, PathBuf>,
}

/// A URI taken apart: which root, and the path below it.
struct Location {
    authority: String,
    segments: Vec<String>,
    root: PathBuf,
}

impl Location {
    fn path(&self) -> PathBuf {
        self.segments
            .iter()
            .fold(self.root.clone(), |path, seg| path.join(seg))
    }

    fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl TreeProvider {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            roots: BTreeMap::new(),
        }
    }

    pub fn with_root(mut self, authority: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.add_root(authority, dir);
        self
    }

    pub fn add_root(&mut self, authority: impl Into<String>, dir: impl Into<PathBuf>) {
        self.roots.insert(authority.into(), dir.into());
    }

    pub fn roots(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.roots.iter().map(|(a, d)| (a.as_str(), d.as_path()))
    }

    /// URI of the top of a granted tree.
    pub fn root_uri(&self, authority: &str) -> String {
        self.format_uri(authority, &[])
    }

    fn format_uri(&self, authority: &str, segments: &[String]) -> String {
        let encoded: Vec<String> = segments
            .iter()
            .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
            .collect();
        format!("{}://{}/{}", self.scheme, authority, encoded.join("/"))
    }

    fn locate_url(&self, url: &Url) -> Result<Location> {
        let input = url.as_str();
        if url.scheme() != self.scheme {
            return Err(FileError::invalid_uri(
                input,
                format!("scheme is not {}", self.scheme),
            ));
        }
        let authority = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FileError::invalid_uri(input, "missing authority"))?;
        let root = self
            .roots
            .get(authority)
            .ok_or_else(|| FileError::NotFound(format!("no granted root for {authority:?}")))?;

        let mut segments = Vec::new();
        for raw in url.path_segments().into_iter().flatten() {
            if raw.is_empty() {
                continue;
            }
            let seg = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|_| FileError::invalid_uri(input, "segment is not UTF-8"))?;
            if seg == "." || seg == ".." || seg.contains('/') || seg.contains('\\') {
                return Err(FileError::invalid_uri(
                    input,
                    format!("segment {seg:?} leaves the granted tree"),
                ));
            }
            segments.push(seg.into_owned());
        }

        Ok(Location {
            authority: authority.to_string(),
            segments,
            root: root.clone(),
        })
    }

    fn locate(&self, uri: &str) -> Result<Location> {
        let url = Url::parse(uri).map_err(|e| FileError::invalid_uri(uri, e.to_string()))?;
        self.locate_url(&url)
    }

    /// Filesystem path for `loc`, refusing symlinks that point outside the root.
    ///
    /// A missing path is checked through its deepest existing ancestor, so a
    /// new entry cannot be created under a link that leaves the tree. Dangling
    /// links in the missing tail are refused outright.
    fn contained_path(&self, loc: &Location) -> Result<PathBuf> {
        let path = loc.path();
        if loc.is_root() {
            return Ok(path);
        }
        let root = match loc.root.canonicalize() {
            Ok(root) => root,
            // Nothing below a missing root exists or can be created
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(path),
            Err(e) => return Err(e.into()),
        };

        let mut existing = path.clone();
        let mut missing = loc.segments.len();
        while missing > 0 && !existing.exists() {
            if fs::symlink_metadata(&existing).is_ok() {
                return Err(outside_root(&path));
            }
            existing.pop();
            missing -= 1;
        }
        if !existing.canonicalize()?.starts_with(&root) {
            return Err(outside_root(&path));
        }
        Ok(path)
    }

    fn child_location(&self, parent: &Location, name: &str) -> Location {
        let mut segments = parent.segments.clone();
        segments.push(name.to_string());
        Location {
            authority: parent.authority.clone(),
            segments,
            root: parent.root.clone(),
        }
    }

    fn directory(&self, uri: &str) -> Result<Location> {
        let loc = self.locate(uri)?;
        let path = self.contained_path(&loc)?;
        if !path.is_dir() {
            return Err(FileError::NotADirectory(uri.to_string()));
        }
        Ok(loc)
    }
}

fn outside_root(path: &Path) -> FileError {
    FileError::InvalidArgument(format!(
        "{} resolves outside its granted root",
        path.display()
    ))
}

impl CapabilityProvider for TreeProvider {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn resolve(&self, uri: &Url, _tree: bool) -> Result<String> {
        let loc = self.locate_url(uri)?;
        Ok(self.format_uri(&loc.authority, &loc.segments))
    }

    fn stat(&self, uri: &str) -> Result<Option<DocumentInfo>> {
        let loc = self.locate(uri)?;
        let path = self.contained_path(&loc)?;
        let md = match fs::metadata(&path) {
            Ok(md) => md,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let kind = if md.is_dir() {
            DocumentKind::Directory
        } else {
            DocumentKind::Document
        };
        let name = loc
            .segments
            .last()
            .cloned()
            .unwrap_or_else(|| loc.authority.clone());
        Ok(Some(DocumentInfo {
            name: Some(name),
            kind,
            mime_type: (kind == DocumentKind::Directory).then(|| DIRECTORY_MIME_TYPE.to_string()),
            len: if md.is_dir() { 0 } else { md.len() },
            last_modified: md
                .modified()
                .map(metadata::system_time_to_millis)
                .unwrap_or(0),
            can_read: metadata::can_read(&path),
            can_write: metadata::can_write(&path),
        }))
    }

    fn parent(&self, uri: &str) -> Result<Option<String>> {
        let mut loc = self.locate(uri)?;
        if loc.segments.pop().is_none() {
            return Ok(None);
        }
        Ok(Some(self.format_uri(&loc.authority, &loc.segments)))
    }

    #[instrument(level = "debug", skip(self))]
    fn children(&self, uri: &str) -> Result<Vec<String>> {
        let loc = self.directory(uri)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(loc.path())? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => portafile_config::log_capability_warn!(
                    "Skipping entry with a non UTF-8 name",
                    name = tracing::field::debug(&raw)
                ),
            }
        }
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| {
                let child = self.child_location(&loc, &name);
                self.format_uri(&child.authority, &child.segments)
            })
            .collect())
    }

    fn find_child(&self, parent: &str, name: &str) -> Result<Option<String>> {
        validate_name(name)?;
        let loc = self.directory(parent)?;
        let child = self.child_location(&loc, name);
        if self.contained_path(&child)?.exists() {
            Ok(Some(self.format_uri(&child.authority, &child.segments)))
        } else {
            Ok(None)
        }
    }

    #[instrument(level = "debug", skip(self))]
    fn create_document(&self, parent: &str, mime_type: &str, name: &str) -> Result<String> {
        validate_name(name)?;
        let loc = self.directory(parent)?;
        let child = self.child_location(&loc, name);
        let path = child.path();
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => FileError::AlreadyExists(path.display().to_string()),
                _ => e.into(),
            })?;
        Ok(self.format_uri(&child.authority, &child.segments))
    }

    #[instrument(level = "debug", skip(self))]
    fn create_directory(&self, parent: &str, name: &str) -> Result<String> {
        validate_name(name)?;
        let loc = self.directory(parent)?;
        let child = self.child_location(&loc, name);
        let path = child.path();
        fs::create_dir(&path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists(path.display().to_string()),
            _ => e.into(),
        })?;
        Ok(self.format_uri(&child.authority, &child.segments))
    }

    #[instrument(level = "debug", skip(self))]
    fn rename(&self, uri: &str, name: &str) -> Result<String> {
        validate_name(name)?;
        let mut loc = self.locate(uri)?;
        let from = self.contained_path(&loc)?;
        if loc.segments.pop().is_none() {
            return Err(FileError::InvalidArgument(
                "a granted root cannot be renamed".to_string(),
            ));
        }
        let target = self.child_location(&loc, name);
        let to = target.path();
        if to.exists() {
            return Err(FileError::AlreadyExists(to.display().to_string()));
        }
        fs::rename(&from, &to)?;
        Ok(self.format_uri(&target.authority, &target.segments))
    }

    #[instrument(level = "debug", skip(self))]
    fn delete(&self, uri: &str) -> Result<()> {
        let loc = self.locate(uri)?;
        if loc.is_root() {
            return Err(FileError::InvalidArgument(
                "a granted root cannot be deleted".to_string(),
            ));
        }
        let path = self.contained_path(&loc)?;
        if fs::symlink_metadata(&path)?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn open_read(&self, uri: &str) -> Result<Box<dyn Read + Send>> {
        let loc = self.locate(uri)?;
        let path = self.contained_path(&loc)?;
        Ok(Box::new(fs::File::open(path)?))
    }

    fn open_write(&self, uri: &str, append: bool) -> Result<Box<dyn Write + Send>> {
        let loc = self.locate(uri)?;
        let path = self.contained_path(&loc)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provider(root: &Path) -> TreeProvider {
        TreeProvider::new("content").with_root("sandbox", root)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_canonicalizes() {
        let temp = tempdir().unwrap();
        let p = provider(temp.path());
        assert_eq!(
            p.resolve(&url("content://sandbox"), true).unwrap(),
            "content://sandbox/"
        );
        assert_eq!(
            p.resolve(&url("content://sandbox//a//b%20c"), true).unwrap(),
            "content://sandbox/a/b%20c"
        );
    }

    #[test]
    fn test_resolve_rejects_foreign_uris() {
        let temp = tempdir().unwrap();
        let p = provider(temp.path());
        assert!(matches!(
            p.resolve(&url("content://elsewhere/a"), true),
            Err(FileError::NotFound(_))
        ));
        assert!(matches!(
            p.resolve(&url("other://sandbox/a"), true),
            Err(FileError::InvalidUri { .. })
        ));
        assert!(p.resolve(&url("content://sandbox/a%2Fb"), true).is_err());
    }

    #[test]
    fn test_dot_segments_cannot_escape() {
        let temp = tempdir().unwrap();
        let p = provider(temp.path());
        // The URL parser folds `..` before we see it, so this stays at the root
        let resolved = p.resolve(&url("content://sandbox/../../etc"), true).unwrap();
        assert_eq!(resolved, "content://sandbox/etc");
        assert!(p.stat(&resolved).unwrap().is_none());
    }

    #[test]
    fn test_create_list_rename_delete() {
        let temp = tempdir().unwrap();
        let p = provider(temp.path());
        let root = p.root_uri("sandbox");

        let dir = p.create_directory(&root, "docs").unwrap();
        let doc = p.create_document(&dir, "text/plain", "a b.txt").unwrap();
        assert_eq!(doc, "content://sandbox/docs/a%20b.txt");
        assert!(temp.path().join("docs/a b.txt").is_file());

        assert_eq!(p.children(&dir).unwrap(), vec![doc.clone()]);
        assert_eq!(p.find_child(&dir, "a b.txt").unwrap(), Some(doc.clone()));
        assert_eq!(p.find_child(&dir, "nope").unwrap(), None);
        assert_eq!(p.parent(&doc).unwrap(), Some(dir.clone()));
        assert_eq!(p.parent(&root).unwrap(), None);

        let renamed = p.rename(&doc, "b.txt").unwrap();
        assert_eq!(renamed, "content://sandbox/docs/b.txt");
        assert!(p.stat(&doc).unwrap().is_none());

        p.delete(&dir).unwrap();
        assert!(!temp.path().join("docs").exists());
        assert!(p.delete(&root).is_err());
    }

    #[test]
    fn test_stat_reports_document() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("n.txt"), b"12345").unwrap();
        let p = provider(temp.path());

        let info = p.stat("content://sandbox/n.txt").unwrap().unwrap();
        assert_eq!(info.name.as_deref(), Some("n.txt"));
        assert_eq!(info.kind, DocumentKind::Document);
        assert_eq!(info.len, 5);
        assert!(info.can_read);

        let root = p.stat("content://sandbox/").unwrap().unwrap();
        assert!(root.is_directory());
        assert_eq!(root.name.as_deref(), Some("sandbox"));
    }

    #[test]
    fn test_streams_truncate_and_append() {
        let temp = tempdir().unwrap();
        let p = provider(temp.path());
        let doc = p
            .create_document(&p.root_uri("sandbox"), "text/plain", "log")
            .unwrap();

        p.open_write(&doc, false).unwrap().write_all(b"first").unwrap();
        p.open_write(&doc, true).unwrap().write_all(b"+more").unwrap();
        let mut text = String::new();
        p.open_read(&doc).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "first+more");

        p.open_write(&doc, false).unwrap().write_all(b"x").unwrap();
        let mut text = String::new();
        p.open_read(&doc).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "x");
    }

    #[test]
    fn test_create_in_file_fails() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("plain"), b"").unwrap();
        let p = provider(temp.path());
        assert!(matches!(
            p.create_document("content://sandbox/plain", "text/plain", "x"),
            Err(FileError::NotADirectory(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_refused() {
        let temp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret"), b"s").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), temp.path().join("link"))
            .unwrap();

        let p = provider(temp.path());
        assert!(p.open_read("content://sandbox/link").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_leaf_under_outside_link_is_refused() {
        let temp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("planted"),
            temp.path().join("dangling"),
        )
        .unwrap();

        let p = provider(temp.path());
        assert!(p.open_write("content://sandbox/link/escaped.txt", false).is_err());
        assert!(p.open_write("content://sandbox/link/deep/x", false).is_err());
        assert!(p.stat("content://sandbox/link/escaped.txt").is_err());
        assert!(p.find_child("content://sandbox/link", "escaped.txt").is_err());
        assert!(p.open_write("content://sandbox/dangling", false).is_err());
        assert!(!outside.path().join("escaped.txt").exists());
        assert!(!outside.path().join("planted").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_links_inside_root_are_followed() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("alias")).unwrap();

        let p = provider(temp.path());
        p.open_write("content://sandbox/alias/new.txt", false)
            .unwrap()
            .write_all(b"ok")
            .unwrap();
        assert_eq!(fs::read(temp.path().join("real/new.txt")).unwrap(), b"ok");
        assert!(p.stat("content://sandbox/alias/missing").unwrap().is_none());
    }
}
