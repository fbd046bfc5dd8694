//! Host-owned context: capability providers, defaults, exit cleanup.
//!
//! Built once by the host and passed to whatever resolves or creates
//! handles. There is no process-global instance.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use portafile_config::{Config, DEFAULT_MIME_TYPE};

use crate::handle::PathHandle;
use crate::provider::{CapabilityProvider, TreeProvider};
use crate::resolver::PathResolver;

/// Paths to remove once the owning context and every handle created
/// through it are gone.
#[derive(Default)]
pub struct CleanupRegistry {
    paths: Mutex<Vec<PathBuf>>,
}

impl CleanupRegistry {
    pub fn schedule(&self, path: PathBuf) {
        let mut paths = self.paths.lock().unwrap_or_else(|p| p.into_inner());
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn pending(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending", &self.pending().len())
            .finish()
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        let paths = std::mem::take(self.paths.get_mut().unwrap_or_else(|p| p.into_inner()));
        // Last scheduled first, so files go before the directories holding them
        for path in paths.into_iter().rev() {
            let result = if path.is_dir() {
                fs::remove_dir(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = result {
                portafile_config::log_handle_debug!(
                    "Exit cleanup failed",
                    path = tracing::field::display(path.display()),
                    error = tracing::field::display(&e)
                );
            }
        }
    }
}

#[derive(Clone)]
pub struct Context {
    providers: BTreeMap<String, Arc<dyn CapabilityProvider>>,
    default_mime_type: String,
    capabilities_enabled: bool,
    cleanup: Arc<CleanupRegistry>,
}

impl Context {
    /// Path-only context with nothing registered.
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
            default_mime_type: DEFAULT_MIME_TYPE.to_string(),
            capabilities_enabled: true,
            cleanup: Arc::new(CleanupRegistry::default()),
        }
    }

    /// Context described by a loaded config: a [`TreeProvider`] for the
    /// configured scheme when any roots are granted.
    pub fn from_config(config: &Config) -> Self {
        let mut ctx = Self::new().with_default_mime_type(&config.capability.default_mime_type);
        ctx.capabilities_enabled = config.resolver.enable_capabilities;

        let roots = config.capability_roots();
        if ctx.capabilities_enabled && !roots.is_empty() {
            let provider = roots.into_iter().fold(
                TreeProvider::new(config.resolver.capability_scheme.clone()),
                |provider, (authority, dir)| provider.with_root(authority, dir),
            );
            ctx.register(Arc::new(provider));
        }
        ctx
    }

    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn with_default_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.default_mime_type = mime_type.into();
        self
    }

    /// Register `provider` for its scheme, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn CapabilityProvider>) {
        let scheme = provider.scheme().to_ascii_lowercase();
        portafile_config::log_capability_debug!("Registering provider", scheme = scheme.as_str());
        self.providers.insert(scheme, provider);
    }

    pub fn provider(&self, scheme: &str) -> Option<Arc<dyn CapabilityProvider>> {
        if !self.capabilities_enabled {
            return None;
        }
        self.providers.get(&scheme.to_ascii_lowercase()).cloned()
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// False for path-only hosts.
    pub fn supports_capabilities(&self) -> bool {
        self.capabilities_enabled && !self.providers.is_empty()
    }

    pub fn default_mime_type(&self) -> &str {
        &self.default_mime_type
    }

    pub fn cleanup(&self) -> &Arc<CleanupRegistry> {
        &self.cleanup
    }

    pub fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self)
    }

    /// Path handle bound to this context's exit cleanup.
    pub fn file(&self, path: impl Into<PathBuf>) -> PathHandle {
        PathHandle::new(path).with_cleanup(Arc::clone(&self.cleanup))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("schemes", &self.providers.keys().collect::<Vec<_>>())
            .field("default_mime_type", &self.default_mime_type)
            .field("capabilities_enabled", &self.capabilities_enabled)
            .finish()
    }
}
