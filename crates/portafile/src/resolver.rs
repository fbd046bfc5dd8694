//! Turning free-form strings into handles.
//!
//! Decision order:
//!
//! 1. Not a URI at all: plain path.
//! 2. One-letter scheme (`C:\...`): a Windows drive, plain path.
//! 3. `file:` scheme: path handle on the decoded URI path. Always wins,
//!    whatever providers are registered.
//! 4. Any other scheme with a registered provider: capability handle.
//! 5. Anything else: no handle.
//!
//! A leading `~` or `~/` on a plain path expands to the home directory.

use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use tracing::instrument;
use url::Url;

use crate::context::Context;
use crate::error::{FileError, Result};
use crate::handle::{CapabilityHandle, FileHandle};

const FILE_SCHEME: &str = "file";

pub struct PathResolver<'a> {
    context: &'a Context,
}

impl<'a> PathResolver<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Handle for `input`, or `None` when no variant can represent it.
    ///
    /// `is_directory` asks capability providers for a navigable tree
    /// handle. Path handles ignore it.
    pub fn resolve(&self, input: &str, is_directory: bool) -> Option<FileHandle> {
        match self.try_resolve(input, is_directory) {
            Ok(handle) => Some(handle),
            Err(e) => {
                portafile_config::log_resolver_debug!(
                    "No handle for input",
                    input = input,
                    error = tracing::field::display(&e)
                );
                None
            }
        }
    }

    /// Like [`resolve`](Self::resolve) but says why nothing matched.
    #[instrument(level = "debug", skip(self))]
    pub fn try_resolve(&self, input: &str, is_directory: bool) -> Result<FileHandle> {
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(e) => {
                portafile_config::log_resolver_debug!(
                    "Not a URI, treating as path",
                    input = input,
                    reason = tracing::field::display(&e)
                );
                return Ok(self.path_handle(expand_home(input)));
            }
        };

        let scheme = url.scheme();
        if scheme.len() == 1 {
            return Ok(self.path_handle(PathBuf::from(input)));
        }
        if scheme == FILE_SCHEME {
            return self.file_url(input, &url);
        }

        let provider = self
            .context
            .provider(scheme)
            .ok_or_else(|| FileError::UnsupportedScheme(scheme.to_string()))?;
        let handle = CapabilityHandle::from_url(provider, &url, is_directory)?
            .with_default_mime_type(self.context.default_mime_type());
        portafile_config::log_resolver_debug!(
            "Resolved capability handle",
            uri = handle.uri(),
            tree = is_directory
        );
        Ok(FileHandle::Capability(handle))
    }

    fn file_url(&self, input: &str, url: &Url) -> Result<FileHandle> {
        if let Ok(path) = url.to_file_path() {
            return Ok(self.path_handle(path));
        }
        // Hosts other than localhost, or a path this platform cannot express
        let decoded = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|_| FileError::invalid_uri(input, "path is not UTF-8"))?;
        if decoded.is_empty() {
            return Err(FileError::invalid_uri(input, "empty file path"));
        }
        Ok(self.path_handle(PathBuf::from(decoded.as_ref())))
    }

    fn path_handle(&self, path: PathBuf) -> FileHandle {
        FileHandle::Path(self.context.file(path))
    }
}

fn expand_home(input: &str) -> PathBuf {
    let rest = match input.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(input),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(input),
    }
}
