use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use cmdvcs_process::{Invocation, ProcessInvoker, ProcessResult, ProcessSpawner};

use crate::cancel::Cancellation;
use crate::config::{AdapterConfig, Subcommand};
use crate::content_cache::ContentCache;
use crate::error::AdapterError;
use crate::parser::{parse_changed_output, parse_root_line};
use crate::root_cache::RootCache;
use crate::types::{ChangedFile, ChangedFiles, RevisionId};

/// Settings a host may expose for a backend
pub trait Configurable: Send + Sync {
    /// Title for the host's settings page
    fn display_name(&self) -> &str;

    /// Current settings as key/value pairs
    fn settings(&self) -> Vec<(String, String)>;
}

/// The capability set a host consumes from a VCS backend
pub trait VcsBackend: Send + Sync {
    /// Human-readable name (e.g., "Command-line VCS")
    fn display_name(&self) -> &str;

    /// Changed files under `dir` with the revision to diff each against
    fn list_changed_files(
        &self,
        dir: &Path,
        cancel: &dyn Cancellation,
    ) -> Result<ChangedFiles, AdapterError>;

    /// Content of `file` at `revision`
    fn base_content(&self, file: &Path, revision: &RevisionId) -> Result<Vec<u8>, AdapterError>;

    /// Root of the checkout containing `dir`; failures yield `None`
    fn resolve_root(&self, dir: &Path) -> Option<PathBuf>;

    /// Whether `dir` is itself a checkout root
    fn is_root(&self, dir: &Path) -> bool;

    /// Changed files across every directory of a dirty scope.
    ///
    /// Directories are listed in order and merged; when two report the same
    /// path the later one wins. `cancel` is checked before each directory as
    /// well as during each listing.
    fn list_changed_files_in_scope(
        &self,
        dirs: &[PathBuf],
        cancel: &dyn Cancellation,
    ) -> Result<ChangedFiles, AdapterError> {
        let mut merged = ChangedFiles::new();
        for dir in dirs {
            if cancel.is_cancelled() {
                return Err(AdapterError::Cancelled);
            }
            merged.extend(self.list_changed_files(dir, cancel)?);
        }
        Ok(merged)
    }

    /// Settings capability; `None` when the backend has nothing to configure
    fn configurable(&self) -> Option<&dyn Configurable> {
        None
    }
}

/// Backend that shells out to an external command-line tool
pub struct CmdlineVcs {
    config: AdapterConfig,
    invoker: Arc<dyn ProcessInvoker>,
    root_cache: Arc<RootCache>,
    content_cache: Arc<ContentCache>,
}

impl CmdlineVcs {
    /// Create a backend that spawns real processes
    pub fn new(config: AdapterConfig, root_cache: Arc<RootCache>) -> Self {
        Self::with_invoker(config, Arc::new(ProcessSpawner::new()), root_cache)
    }

    pub fn with_invoker(
        config: AdapterConfig,
        invoker: Arc<dyn ProcessInvoker>,
        root_cache: Arc<RootCache>,
    ) -> Self {
        Self {
            config,
            invoker,
            root_cache,
            content_cache: Arc::new(ContentCache::new()),
        }
    }

    /// Share a base content cache with other backends
    pub fn with_content_cache(mut self, content_cache: Arc<ContentCache>) -> Self {
        self.content_cache = content_cache;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn root_cache(&self) -> &Arc<RootCache> {
        &self.root_cache
    }

    pub fn content_cache(&self) -> &Arc<ContentCache> {
        &self.content_cache
    }

    fn invocation(&self, subcommand: Subcommand, args: &[&Path]) -> Invocation {
        Invocation::new(&self.config.tool_path)
            .arg(subcommand.as_str())
            .args(args.iter().map(|p| p.to_string_lossy().into_owned()))
            .with_timeout(self.config.timeout)
            .with_envs(&self.config.env_vars)
    }

    /// Run the tool and turn a nonzero exit into an error
    fn run_checked(
        &self,
        subcommand: Subcommand,
        invocation: &Invocation,
    ) -> Result<ProcessResult, AdapterError> {
        let result = self.invoker.run(invocation)?;

        if !result.success() {
            debug!(
                subcommand = %subcommand,
                exit_code = result.exit_code,
                stderr = result.stderr_trimmed(),
                "Tool reported failure"
            );
            return Err(AdapterError::ToolFailed {
                subcommand,
                exit_code: result.exit_code,
                stderr: result.stderr_trimmed().to_string(),
            });
        }

        Ok(result)
    }

    fn fetch_base_content(
        &self,
        file: &Path,
        revision: &RevisionId,
    ) -> Result<Vec<u8>, AdapterError> {
        let subcommand = Subcommand::GetBaseFileContents;
        let mut invocation = self
            .invocation(subcommand, &[file])
            .arg(revision.as_str());

        // Files without a parent run in the inherited working directory
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            invocation = invocation.current_dir(parent);
        }

        let result = self.run_checked(subcommand, &invocation)?;

        debug!(
            file = %file.display(),
            revision = %revision,
            bytes = result.stdout.len(),
            "Loaded base content"
        );

        Ok(result.stdout)
    }

    /// Stream the changed files under `dir` to `visitor`.
    ///
    /// The whole tool output is parsed before the first entry is handed
    /// out, so a parse error never reaches the visitor. `cancel` is checked
    /// before each entry; once it fires no further entry is visited and
    /// [`AdapterError::Cancelled`] is returned. Returns the entry count.
    pub fn visit_changed_files<F>(
        &self,
        dir: &Path,
        cancel: &dyn Cancellation,
        mut visitor: F,
    ) -> Result<usize, AdapterError>
    where
        F: FnMut(ChangedFile),
    {
        let subcommand = Subcommand::ListChangedFiles;
        let invocation = self.invocation(subcommand, &[dir]).current_dir(dir);
        let result = self.run_checked(subcommand, &invocation)?;

        let entries = parse_changed_output(&result.stdout)?;
        let total = entries.len();

        for (visited, (path, base_revision)) in entries.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    dir = %dir.display(),
                    visited,
                    total,
                    "Listing changed files cancelled"
                );
                return Err(AdapterError::Cancelled);
            }
            visitor(ChangedFile::new(path, base_revision));
        }

        debug!(dir = %dir.display(), changed = total, "Listed changed files");

        Ok(total)
    }
}

impl VcsBackend for CmdlineVcs {
    fn display_name(&self) -> &str {
        "Command-line VCS"
    }

    fn list_changed_files(
        &self,
        dir: &Path,
        cancel: &dyn Cancellation,
    ) -> Result<ChangedFiles, AdapterError> {
        let mut files = ChangedFiles::new();
        self.visit_changed_files(dir, cancel, |file| {
            files.insert(file.path, file.base_revision);
        })?;
        Ok(files)
    }

    fn base_content(&self, file: &Path, revision: &RevisionId) -> Result<Vec<u8>, AdapterError> {
        if revision.is_null() {
            return Err(AdapterError::NoBaseRevision(file.to_path_buf()));
        }

        let content = self
            .content_cache
            .get_or_load(file, revision, || self.fetch_base_content(file, revision))?;

        Ok(content.to_vec())
    }

    fn resolve_root(&self, dir: &Path) -> Option<PathBuf> {
        let invocation = self
            .invocation(Subcommand::GetVcsRoot, &[dir])
            .current_dir(dir);

        match self.invoker.run(&invocation) {
            Ok(result) if result.success() => parse_root_line(&result.stdout_lines),
            Ok(result) => {
                debug!(
                    dir = %dir.display(),
                    exit_code = result.exit_code,
                    stderr = result.stderr_trimmed(),
                    "get-vcs-root failed, treating as unversioned"
                );
                None
            }
            Err(e) => {
                debug!(
                    dir = %dir.display(),
                    error = %e,
                    "get-vcs-root could not run, treating as unversioned"
                );
                None
            }
        }
    }

    fn is_root(&self, dir: &Path) -> bool {
        self.root_cache.is_root(dir, |d| self.resolve_root(d))
    }

    fn configurable(&self) -> Option<&dyn Configurable> {
        Some(self)
    }
}

/// Read-only view of the tool settings
impl Configurable for CmdlineVcs {
    fn display_name(&self) -> &str {
        "Command-line VCS"
    }

    fn settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            (
                "tool".to_string(),
                self.config.tool_path.display().to_string(),
            ),
            ("timeout".to_string(), format!("{:?}", self.config.timeout)),
            (
                "root_cache_ttl".to_string(),
                format!("{:?}", self.root_cache.ttl()),
            ),
        ];

        let mut env: Vec<_> = self.config.env_vars.iter().collect();
        env.sort();
        settings.extend(
            env.into_iter()
                .map(|(key, value)| (format!("env.{key}"), value.clone())),
        );

        settings
    }
}
