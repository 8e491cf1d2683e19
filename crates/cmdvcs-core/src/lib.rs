//! # cmdvcs-core
//!
//! Adapter that delegates VCS operations to an external command-line tool.
//!
//! ## Overview
//!
//! The tool does the real version control work. This crate runs it through a
//! [`cmdvcs_process::ProcessInvoker`], parses its line-oriented output, and
//! remembers which directories are checkout roots so hosts can ask cheaply.
//!
//! ## Key Types
//!
//! - [`VcsBackend`] - Capability set consumed by a host (IDE, CLI, service)
//! - [`CmdlineVcs`] - Backend that shells out to the tool
//! - [`RootCache`] - Root answers with sliding expiry, shared via `Arc`
//! - [`ContentCache`] - Base file contents by path and revision
//! - [`RevisionId`] - Opaque base revision, or `Null` for added files
//! - [`AdapterError`] - Everything a non-root operation can fail with
//!
//! ## Tool Protocol
//!
//! ```text
//! tool list-changed-files <dir>            # "<abs path>;<revision|NULL>" per line
//! tool get-base-file-contents <file> <rev> # raw content on stdout
//! tool get-vcs-root <dir>                  # root path, or nothing
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cmdvcs_core::{AdapterConfig, CmdlineVcs, NotCancelled, RootCache, VcsBackend};
//!
//! let cache = Arc::new(RootCache::new());
//! let vcs = CmdlineVcs::new(AdapterConfig::default(), cache);
//!
//! for (path, revision) in vcs.list_changed_files(dir, &NotCancelled)? {
//!     println!("{} {}", path.display(), revision);
//! }
//! ```

mod adapter;
mod cancel;
pub mod clock;
mod config;
mod content_cache;
mod error;
mod parser;
mod root_cache;
mod types;

pub use adapter::{CmdlineVcs, Configurable, VcsBackend};
pub use cancel::{Cancellation, NotCancelled};
pub use config::{AdapterConfig, Subcommand, DEFAULT_TOOL_PATH};
pub use content_cache::{ContentCache, DEFAULT_CONTENT_CACHE_CAPACITY};
pub use error::AdapterError;
pub use parser::{parse_changed_files, parse_changed_output, parse_root_line, ParseError};
pub use root_cache::{RootCache, DEFAULT_ROOT_CACHE_TTL};
pub use types::{ChangeKind, ChangedFile, ChangedFiles, RevisionId, NULL_REVISION_TOKEN};
