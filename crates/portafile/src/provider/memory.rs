//! In-process document store.
//!
//! Documents get opaque ids (`scheme://authority/document/<n>`), so a rename
//! changes the display name but never the URI. Document 0 is the root.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use url::Url;

use super::tree::DIRECTORY_MIME_TYPE;
use super::{validate_name, CapabilityProvider, DocumentInfo, DocumentKind};
use crate::error::{FileError, Result};
use crate::metadata::system_time_to_millis;

const ROOT_ID: u64 = 0;

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<u64>,
    kind: DocumentKind,
    mime_type: String,
    data: Vec<u8>,
    last_modified: i64,
}

#[derive(Debug)]
struct Store {
    next_id: u64,
    nodes: BTreeMap<u64, Node>,
}

impl Store {
    fn node(&self, id: u64) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| FileError::NotFound(format!("document {id}")))
    }

    fn node_mut(&mut self, id: u64) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| FileError::NotFound(format!("document {id}")))
    }

    fn children_of(&self, id: u64) -> impl Iterator<Item = (u64, &Node)> + '_ {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.parent == Some(id))
            .map(|(child, node)| (*child, node))
    }

    fn insert(&mut self, parent: u64, name: &str, kind: DocumentKind, mime_type: &str) -> Result<u64> {
        validate_name(name)?;
        if self.node(parent)?.kind != DocumentKind::Directory {
            return Err(FileError::NotADirectory(format!("document {parent}")));
        }
        if self.children_of(parent).any(|(_, n)| n.name == name) {
            return Err(FileError::AlreadyExists(name.to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                parent: Some(parent),
                kind,
                mime_type: mime_type.to_string(),
                data: Vec::new(),
                last_modified: now_millis(),
            },
        );
        Ok(id)
    }

    fn remove_tree(&mut self, id: u64) {
        let children: Vec<u64> = self.children_of(id).map(|(child, _)| child).collect();
        for child in children {
            self.remove_tree(child);
        }
        self.nodes.remove(&id);
    }
}

fn now_millis() -> i64 {
    system_time_to_millis(SystemTime::now())
}

fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct MemoryProvider {
    scheme: String,
    authority: String,
    store: Arc<Mutex<Store>>,
}

impl MemoryProvider {
    pub fn new(scheme: impl Into<String>, authority: impl Into<String>) -> Self {
        let authority = authority.into();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT_ID,
            Node {
                name: authority.clone(),
                parent: None,
                kind: DocumentKind::Directory,
                mime_type: DIRECTORY_MIME_TYPE.to_string(),
                data: Vec::new(),
                last_modified: now_millis(),
            },
        );
        Self {
            scheme: scheme.into(),
            authority,
            store: Arc::new(Mutex::new(Store {
                next_id: ROOT_ID + 1,
                nodes,
            })),
        }
    }

    pub fn root_uri(&self) -> String {
        self.uri_for(ROOT_ID)
    }

    fn uri_for(&self, id: u64) -> String {
        format!("{}://{}/document/{}", self.scheme, self.authority, id)
    }

    fn id_of_url(&self, url: &Url) -> Result<u64> {
        let input = url.as_str();
        if url.scheme() != self.scheme || url.host_str() != Some(self.authority.as_str()) {
            return Err(FileError::invalid_uri(input, "not served by this store"));
        }
        let segments: Vec<&str> = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        match segments.as_slice() {
            ["document", id] => id
                .parse()
                .map_err(|_| FileError::invalid_uri(input, "document id is not a number")),
            _ => Err(FileError::invalid_uri(input, "expected /document/<id>")),
        }
    }

    fn id_of(&self, uri: &str) -> Result<u64> {
        let url = Url::parse(uri).map_err(|e| FileError::invalid_uri(uri, e.to_string()))?;
        self.id_of_url(&url)
    }
}

impl CapabilityProvider for MemoryProvider {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn resolve(&self, uri: &Url, _tree: bool) -> Result<String> {
        Ok(self.uri_for(self.id_of_url(uri)?))
    }

    fn stat(&self, uri: &str) -> Result<Option<DocumentInfo>> {
        let id = self.id_of(uri)?;
        let store = lock(&self.store);
        Ok(store.nodes.get(&id).map(|node| DocumentInfo {
            name: Some(node.name.clone()),
            kind: node.kind,
            mime_type: Some(node.mime_type.clone()),
            len: node.data.len() as u64,
            last_modified: node.last_modified,
            can_read: true,
            can_write: true,
        }))
    }

    fn parent(&self, uri: &str) -> Result<Option<String>> {
        let id = self.id_of(uri)?;
        let store = lock(&self.store);
        Ok(store.node(id)?.parent.map(|p| self.uri_for(p)))
    }

    fn children(&self, uri: &str) -> Result<Vec<String>> {
        let id = self.id_of(uri)?;
        let store = lock(&self.store);
        if store.node(id)?.kind != DocumentKind::Directory {
            return Err(FileError::NotADirectory(uri.to_string()));
        }
        Ok(store
            .children_of(id)
            .map(|(child, _)| self.uri_for(child))
            .collect())
    }

    fn create_document(&self, parent: &str, mime_type: &str, name: &str) -> Result<String> {
        let parent = self.id_of(parent)?;
        let id = lock(&self.store).insert(parent, name, DocumentKind::Document, mime_type)?;
        Ok(self.uri_for(id))
    }

    fn create_directory(&self, parent: &str, name: &str) -> Result<String> {
        let parent = self.id_of(parent)?;
        let id = lock(&self.store).insert(
            parent,
            name,
            DocumentKind::Directory,
            DIRECTORY_MIME_TYPE,
        )?;
        Ok(self.uri_for(id))
    }

    fn rename(&self, uri: &str, name: &str) -> Result<String> {
        validate_name(name)?;
        let id = self.id_of(uri)?;
        let mut store = lock(&self.store);
        let parent = store.node(id)?.parent.ok_or_else(|| {
            FileError::InvalidArgument("the root document cannot be renamed".to_string())
        })?;
        if store
            .children_of(parent)
            .any(|(other, n)| other != id && n.name == name)
        {
            return Err(FileError::AlreadyExists(name.to_string()));
        }
        let node = store.node_mut(id)?;
        node.name = name.to_string();
        node.last_modified = now_millis();
        Ok(uri.to_string())
    }

    fn delete(&self, uri: &str) -> Result<()> {
        let id = self.id_of(uri)?;
        if id == ROOT_ID {
            return Err(FileError::InvalidArgument(
                "the root document cannot be deleted".to_string(),
            ));
        }
        let mut store = lock(&self.store);
        store.node(id)?;
        store.remove_tree(id);
        Ok(())
    }

    fn open_read(&self, uri: &str) -> Result<Box<dyn Read + Send>> {
        let id = self.id_of(uri)?;
        let store = lock(&self.store);
        let node = store.node(id)?;
        if node.kind == DocumentKind::Directory {
            return Err(FileError::InvalidArgument(format!("{uri} is a directory")));
        }
        Ok(Box::new(Cursor::new(node.data.clone())))
    }

    fn open_write(&self, uri: &str, append: bool) -> Result<Box<dyn Write + Send>> {
        let id = self.id_of(uri)?;
        let mut store = lock(&self.store);
        let node = store.node_mut(id)?;
        if node.kind == DocumentKind::Directory {
            return Err(FileError::InvalidArgument(format!("{uri} is a directory")));
        }
        if !append {
            node.data.clear();
            node.last_modified = now_millis();
        }
        Ok(Box::new(MemoryWriter {
            store: Arc::clone(&self.store),
            id,
            pending: Vec::new(),
        }))
    }
}

/// Buffers writes and appends them to the document on flush or drop.
struct MemoryWriter {
    store: Arc<Mutex<Store>>,
    id: u64,
    pending: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut store = lock(&self.store);
        let node = store
            .nodes
            .get_mut(&self.id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "document was deleted"))?;
        node.data.append(&mut self.pending);
        node.last_modified = now_millis();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
