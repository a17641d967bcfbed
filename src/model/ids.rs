//! Validated identifier and path newtypes used throughout the engine.
//!
//! Every identifier that crosses a component boundary — a store id, a
//! workspace-relative path, a repository fingerprint, a workspace id — is
//! validated once at construction and carried around as a typed value from
//! then on. Nothing downstream re-validates.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// What kind of value failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A [`StoreId`] validation error.
    StoreId,
    /// A [`RelPath`] validation error.
    RelPath,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreId => write!(f, "StoreId"),
            Self::RelPath => write!(f, "RelPath"),
        }
    }
}

/// A validation error for a core identifier or path newtype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value, as given.
    pub value: String,
    /// Human-readable explanation of what was wrong.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}: {:?} — {}",
            self.kind, self.value, self.reason
        )
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// StoreId
// ---------------------------------------------------------------------------

/// A validated store identifier.
///
/// Must be a single path segment: non-empty, free of path separators, and
/// not `.` or `..`. This is the same contract `validate_identifier` (see
/// [`crate::fs`]) applies to any identifier used as a directory name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreId(String);

impl StoreId {
    /// Create a new `StoreId`, validating that it is a safe single path segment.
    ///
    /// # Errors
    /// Returns an error if `s` is empty, contains a path separator, or is
    /// `.`/`..`.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        crate::fs::validate_identifier(s).map_err(|reason| ValidationError {
            kind: ErrorKind::StoreId,
            value: s.to_owned(),
            reason,
        })?;
        Ok(Self(s.to_owned()))
    }

    /// Return the store id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoreId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StoreId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<StoreId> for String {
    fn from(id: StoreId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// RelPath
// ---------------------------------------------------------------------------

/// A validated, normalized path relative to a workspace or overlay root.
///
/// After normalization the path is non-empty, not `.`, not absolute, and
/// contains no `..` component at any position. `RelPath` orders by path
/// depth then lexicographically, which is exactly the tie-break the planner
/// and unapplier need (see [`crate::model::plan`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(PathBuf);

impl RelPath {
    /// Create a new `RelPath` from a path-like value, validating and
    /// normalizing it.
    ///
    /// # Errors
    /// Returns an error if the path is empty, `.`, absolute, or contains a
    /// `..` component.
    pub fn new<P: AsRef<Path>>(p: P) -> Result<Self, ValidationError> {
        let raw = p.as_ref();
        let display = raw.to_string_lossy().into_owned();
        crate::fs::validate_rel_path(raw).map_err(|reason| ValidationError {
            kind: ErrorKind::RelPath,
            value: display,
            reason,
        })?;
        Ok(Self(raw.to_path_buf()))
    }

    /// Borrow this path as a `&Path`.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Number of path components. Used to order operations deepest/shallowest
    /// first.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.components().count()
    }

    /// Join a child path segment onto this path, producing a new `RelPath`.
    ///
    /// # Errors
    /// Returns an error if the resulting path fails validation (it should
    /// not, for well-formed `child` values, but the check is cheap).
    pub fn join(&self, child: &str) -> Result<Self, ValidationError> {
        Self::new(self.0.join(child))
    }

    /// Returns `true` if `other` is a strict descendant of this path (i.e.
    /// `other` is nested one or more levels below `self`).
    #[must_use]
    pub fn is_strict_prefix_of(&self, other: &Self) -> bool {
        self != other && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for RelPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl FromStr for RelPath {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelPath {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(PathBuf::from(s))
    }
}

impl From<RelPath> for String {
    fn from(p: RelPath) -> Self {
        p.0.to_string_lossy().into_owned()
    }
}

/// Order by depth (deepest first when reversed by the caller), then by
/// descending lexicographic path string — the exact tie-break the planner
/// and unapplier use for deterministic operation ordering.
impl PartialOrd for RelPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.depth()
            .cmp(&other.depth())
            .then_with(|| self.0.cmp(&other.0))
    }
}

/// Normalize a path: resolve `.` components away and reject `..` anywhere.
/// Exposed for callers (e.g. the planner) that need to normalize a path
/// built from joined segments before constructing a [`RelPath`].
#[must_use]
pub fn normalize_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// An opaque, stable repository fingerprint supplied by the repository
/// identity collaborator (see [`crate::identity`]).
///
/// The engine never computes a fingerprint itself from a live repository —
/// it treats whatever string the collaborator hands it as authoritative —
/// but it does use the fingerprint, combined with a relative path, to derive
/// a [`WorkspaceIdent`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a raw fingerprint string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// WorkspaceIdent
// ---------------------------------------------------------------------------

/// A stable workspace identifier: `H(fingerprint || "/" || relative_path)`.
///
/// Two calls with the same fingerprint and relative path always produce the
/// same `WorkspaceIdent`, across processes, hosts, and runs — this is the
/// ledger's primary key (see [`crate::identity::workspace_ident`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceIdent(String);

impl WorkspaceIdent {
    /// Wrap a precomputed hash string. Prefer
    /// [`crate::identity::workspace_ident`] over calling this directly.
    #[must_use]
    pub fn from_hash(hash: String) -> Self {
        Self(hash)
    }

    /// Borrow the identifier as a string slice (also its on-disk file name
    /// under the workspaces root).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
