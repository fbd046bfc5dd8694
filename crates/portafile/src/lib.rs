//! # portafile
//!
//! One file-handle type over two addressing models:
//!
//! - **Path handles**: ordinary filesystem paths, full operation set
//! - **Capability handles**: opaque document URIs served by a
//!   [`CapabilityProvider`], reduced operation set
//!
//! ## Architecture
//!
//! ```text
//! PathResolver ──► FileHandle ──┬─► metadata  (stat, access, statvfs)
//!                               ├─► mutator   (read-modify-write chmod)
//!                               │     └─► permission (rwx <-> mode)
//!                               ├─► provider  (capability documents)
//!                               └─► stream    (Source / Sink)
//! ```
//!
//! Everything is synchronous and talks to the platform on every call. The
//! `tokio` feature adds [`nonblocking::AsyncFileHandle`], which runs the
//! same calls on the blocking pool.
//!
//! ## Example
//!
//! ```ignore
//! use portafile::Context;
//!
//! let ctx = Context::from_config(&portafile_config::Config::load()?);
//! let file = ctx.resolver().resolve("~/notes.txt", false).unwrap();
//! file.set_writable(true, false)?;
//! ```

pub mod context;
pub mod error;
pub mod handle;
pub mod metadata;
pub mod mutator;
pub mod permission;
mod platform;
pub mod provider;
pub mod resolver;
pub mod stream;

#[cfg(feature = "tokio")]
pub mod nonblocking;

pub use context::{CleanupRegistry, Context};
pub use error::{FileError, Result};
pub use handle::{CapabilityHandle, FileHandle, PathHandle};
pub use metadata::SpaceStats;
pub use permission::{Access, Class, PermissionSet, PosixPermission};
pub use provider::{CapabilityProvider, DocumentInfo, DocumentKind, MemoryProvider, TreeProvider};
pub use resolver::PathResolver;
pub use stream::{Sink, Source};
