//! # cmdvcs-process
//!
//! Runs the external VCS tool. One call is one process: output is captured
//! in full, the exit code is reported, and a hard timeout kills the child.
//!
//! ## Key Types
//!
//! - [`ProcessInvoker`] - Blocking "run this and give me the output" seam
//! - [`ProcessSpawner`] - Live implementation on top of `tokio::process`
//! - [`Invocation`] - Program, arguments, working directory and timeout
//! - [`ProcessResult`] - Exit code, stdout (raw and split), stderr

mod output;
mod spawner;
mod traits;

pub use output::ProcessResult;
pub use spawner::ProcessSpawner;
pub use traits::{Invocation, ProcessError, ProcessInvoker, DEFAULT_TIMEOUT};
