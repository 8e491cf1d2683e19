use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Wire token the tool uses for "no base revision"
pub const NULL_REVISION_TOKEN: &str = "NULL";

/// Opaque base revision reported by the external tool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RevisionId {
    /// The file is newly added and has no committed content
    Null,
    /// Any other token, kept verbatim
    Text(String),
}

impl RevisionId {
    /// Interpret a revision token as printed by the tool
    pub fn parse(token: &str) -> Self {
        if token == NULL_REVISION_TOKEN {
            RevisionId::Null
        } else {
            RevisionId::Text(token.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RevisionId::Null)
    }

    /// The token as passed back to the tool
    pub fn as_str(&self) -> &str {
        match self {
            RevisionId::Null => NULL_REVISION_TOKEN,
            RevisionId::Text(s) => s,
        }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RevisionId {
    fn from(token: String) -> Self {
        if token == NULL_REVISION_TOKEN {
            RevisionId::Null
        } else {
            RevisionId::Text(token)
        }
    }
}

impl From<&str> for RevisionId {
    fn from(token: &str) -> Self {
        Self::parse(token)
    }
}

impl From<RevisionId> for String {
    fn from(revision: RevisionId) -> Self {
        match revision {
            RevisionId::Null => NULL_REVISION_TOKEN.to_string(),
            RevisionId::Text(s) => s,
        }
    }
}

/// How a changed file differs from its base revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// No base revision
    Added,
    /// Base revision and a file on disk
    Modified,
    /// Base revision but no file on disk
    Deleted,
}

impl ChangeKind {
    /// Classify from the base revision and whether the working copy has the file.
    ///
    /// A `Null` base is `Added` even when the file is gone: there is nothing
    /// on either side to diff.
    pub fn classify(base_revision: &RevisionId, exists: bool) -> Self {
        match (base_revision.is_null(), exists) {
            (true, _) => ChangeKind::Added,
            (false, true) => ChangeKind::Modified,
            (false, false) => ChangeKind::Deleted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One changed file and the revision it should be diffed against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: PathBuf,
    pub base_revision: RevisionId,
}

impl ChangedFile {
    pub fn new(path: PathBuf, base_revision: RevisionId) -> Self {
        Self {
            path,
            base_revision,
        }
    }

    /// Newly added files have nothing to diff against
    pub fn is_added(&self) -> bool {
        self.base_revision.is_null()
    }

    /// Classify against the working copy; a dangling symlink still counts as present
    pub fn kind(&self) -> ChangeKind {
        ChangeKind::classify(&self.base_revision, path_exists(&self.path))
    }
}

fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Changed files keyed by absolute path
pub type ChangedFiles = BTreeMap<PathBuf, RevisionId>;
