//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated local directory for path-addressed files
//! - A granted root served to capability handles
//! - A matching `Config` and on-disk project config
//!
//! # Usage
//!
//! ```ignore
//! use portafile_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new()?;
//! let file = env.create_file("notes/a.txt", b"hello")?;
//! let uri = env.capability_uri("notes/a.txt");
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::Config;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Authority the granted root is registered under.
pub const TEST_AUTHORITY: &str = "sandbox";

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Root of the whole sandbox (usable as a working directory)
    pub root: PathBuf,
    /// Directory for path-addressed fixtures
    pub local_root: PathBuf,
    /// Directory exposed through the capability provider
    pub granted_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();

        let local_root = root.join("local");
        let granted_root = root.join("granted");

        std::fs::create_dir_all(&local_root)?;
        std::fs::create_dir_all(&granted_root)?;

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            local_root,
            granted_root,
            test_id,
        })
    }

    /// Create a test file under the local root
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.local_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a test directory under the local root
    pub fn create_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.local_root.join(relative_path);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create a file inside the granted root
    pub fn create_granted_file(
        &self,
        relative_path: &str,
        content: &[u8],
    ) -> anyhow::Result<PathBuf> {
        let path = self.granted_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// URI of an entry inside the granted root (`content://sandbox/<rel>`)
    pub fn capability_uri(&self, relative_path: &str) -> String {
        format!(
            "{}://{}/{}",
            crate::DEFAULT_CAPABILITY_SCHEME,
            TEST_AUTHORITY,
            relative_path.trim_start_matches('/')
        )
    }

    /// Config granting the capability root under [`TEST_AUTHORITY`]
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.capability
            .roots
            .insert(TEST_AUTHORITY.to_string(), self.granted_root.clone());
        cfg
    }

    /// Write `config()` to `<root>/.portafile/config.toml` so a process
    /// started in `root` picks it up as its project config.
    pub fn write_project_config(&self) -> anyhow::Result<PathBuf> {
        let dir = self.root.join(".portafile");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("config.toml");
        std::fs::write(&path, self.config().to_toml()?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.local_root.exists());
        assert!(env.granted_root.exists());
    }

    #[test]
    fn test_environment_has_unique_ids() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.test_id, env2.test_id);
        assert_ne!(env1.root, env2.root);
    }

    #[test]
    fn test_create_file() {
        let env = TestEnvironment::new().unwrap();
        let path = env.create_file("notes/todo.txt", b"- ship it").unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"- ship it");
    }

    #[test]
    fn test_capability_uri_and_config() {
        let env = TestEnvironment::new().unwrap();
        assert_eq!(env.capability_uri("/a/b.txt"), "content://sandbox/a/b.txt");
        let cfg = env.config();
        assert_eq!(cfg.capability.roots.get(TEST_AUTHORITY), Some(&env.granted_root));
    }

    #[test]
    fn test_write_project_config_parses_back() {
        let env = TestEnvironment::new().unwrap();
        let path = env.write_project_config().unwrap();
        let parsed: Config = toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, env.config());
    }
}
