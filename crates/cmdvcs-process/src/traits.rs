use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ProcessResult;

/// Default wall-clock bound for a single tool invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while running an external process
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to launch {}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} timed out after {timeout:?}", .program.display())]
    Timeout { program: PathBuf, timeout: Duration },

    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("IO error while running process: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout { .. })
    }

    pub fn is_launch(&self) -> bool {
        matches!(self, ProcessError::Launch { .. })
    }
}

/// A single request to run an external executable
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory (None = inherit from the current process)
    pub working_dir: Option<PathBuf>,
    /// Hard wall-clock limit
    pub timeout: Duration,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
            env_vars: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }

    pub fn with_envs(mut self, vars: &HashMap<String, String>) -> Self {
        self.env_vars
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Check the invocation before anything is spawned.
    ///
    /// Arguments must not contain NUL and the working directory, when set,
    /// must be an existing directory.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if let Some(arg) = self.args.iter().find(|a| a.contains('\0')) {
            return Err(ProcessError::InvalidInvocation(format!(
                "argument contains NUL: {:?}",
                arg
            )));
        }

        if let Some(ref dir) = self.working_dir {
            if !dir.is_dir() {
                return Err(ProcessError::InvalidInvocation(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Runs one external process per call and waits for it to finish.
///
/// Implementations block the calling thread. There are no retries: a
/// single call is exactly one process.
pub trait ProcessInvoker: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ProcessResult, ProcessError>;
}
