//! Store metadata and track manifest types (§3 "Store").
//!
//! A store's on-disk layout is `<root>/<store_id>/{meta, track, overlay/}`.
//! This module defines the `meta` and `track` document shapes; the overlay
//! tree itself is just files on disk, walked by the planner.

use serde::{Deserialize, Serialize};

use super::ids::RelPath;

/// Whether a store applies everywhere (`global`) or is scoped to a specific
/// component of a repository (`component`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Applies across the whole repository.
    Global,
    /// Applies to one component/subdirectory of the repository.
    Component,
}

/// Where a store's contents currently stand in a development lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Not yet started.
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Finished.
    Done,
    /// Stuck on an external dependency.
    Blocked,
    /// Abandoned.
    Cancelled,
    /// Doesn't fit the other tags.
    Other,
}

/// Human-readable, non-authoritative metadata about a store.
///
/// The overlay tree is what the engine actually materializes; everything
/// here exists to help a human or agent pick the right store, not to drive
/// planning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Human-readable name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional scope tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// Optional lifecycle tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
    /// Optional free-form type tag (e.g. `"editor-config"`, `"scripts"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Optional free-form priority tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Creation timestamp, as produced by the clock collaborator
    /// (see [`crate::clock`]). An RFC 3339 string.
    pub created_at: String,
}

impl StoreMeta {
    /// Construct metadata for a freshly created store.
    #[must_use]
    pub fn new(name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            scope: None,
            lifecycle: None,
            kind: None,
            priority: None,
            created_at: created_at.into(),
        }
    }
}

/// Whether a tracked entry is a single file or an entire directory subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// A single file, relative to the overlay root.
    File,
    /// A directory; all files beneath it (recursively) are tracked.
    Dir,
}

/// One entry in a store's track manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    /// Path relative to the overlay root.
    pub path: RelPath,
    /// Whether `path` names a file or a directory.
    pub kind: TrackKind,
}

/// The ordered list of paths a store tracks.
///
/// Order is preserved but does not affect planning (the planner recurses
/// into each entry independently); duplicates are rejected by
/// [`TrackManifest::push`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackManifest {
    /// The tracked entries, in the order they were added.
    #[serde(default)]
    pub entries: Vec<TrackEntry>,
}

impl TrackManifest {
    /// An empty manifest — what [`crate::store_repo::StoreRepository::load_track`]
    /// returns for a store that has never tracked anything.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a tracked entry.
    ///
    /// # Errors
    /// Returns an error (the duplicate path, as a string) if `entry.path` is
    /// already tracked.
    pub fn push(&mut self, entry: TrackEntry) -> Result<(), String> {
        if self.entries.iter().any(|e| e.path == entry.path) {
            return Err(format!("path already tracked: {}", entry.path));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove a tracked entry by path. Returns `true` if something was
    /// removed.
    pub fn remove(&mut self, path: &RelPath) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.path != path);
        self.entries.len() != before
    }
}
