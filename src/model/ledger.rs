//! Workspace ledger and repository stack records (§3 "Workspace",
//! "Repository stack").
//!
//! The ledger is the single source of truth for which paths in a workspace
//! are owned by the engine, by which store, and how (symlink or copy). It is
//! loaded by value, mutated locally by the applier/unapplier, and written
//! back atomically — nothing holds a reference into it across calls.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ids::{Fingerprint, RelPath, StoreId};

/// How the engine materializes a store's files into a workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Workspace entries are symlinks into the store's overlay tree.
    Symlink,
    /// Workspace entries are independent copies; drift is detectable.
    Copy,
}

/// The kind of filesystem entry the engine placed at a given path.
///
/// Distinct from [`Mode`]: `Mode` is the workspace-wide setting requested at
/// apply time, `PathKind` is what ended up on disk for one specific path
/// (always matches `Mode` in current behavior, but kept separate because the
/// ledger records facts about paths, not policy).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// A symlink into the owning store's overlay tree.
    Symlink,
    /// An independent copy of the owning store's file.
    Copy,
}

impl From<Mode> for PathKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Symlink => Self::Symlink,
            Mode::Copy => Self::Copy,
        }
    }
}

/// Record of who owns one workspace-relative path and how it was placed.
///
/// `checksum` is mandatory for `kind == Copy` and absent for
/// `kind == Symlink`. `symlink_target` records the absolute target a symlink
/// was created with, so the unapplier can detect out-of-band retargeting
/// (see the integrity check in [`crate::unapplier`] and the open question in
/// `DESIGN.md`) — it is absent for `kind == Copy`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOwnership {
    /// The store that contributed this path.
    pub store_id: StoreId,
    /// How the path was materialized.
    pub kind: PathKind,
    /// SHA-256 hex digest of the file's content at apply time. Mandatory for
    /// `kind == Copy`, absent for `kind == Symlink`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// The absolute path the symlink was created to point at. Mandatory for
    /// `kind == Symlink`, absent for `kind == Copy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<PathBuf>,
}

impl PathOwnership {
    /// Construct a symlink ownership record.
    #[must_use]
    pub fn symlink(store_id: StoreId, target: PathBuf) -> Self {
        Self {
            store_id,
            kind: PathKind::Symlink,
            checksum: None,
            symlink_target: Some(target),
        }
    }

    /// Construct a copy ownership record with its content checksum.
    #[must_use]
    pub fn copy(store_id: StoreId, checksum: String) -> Self {
        Self {
            store_id,
            kind: PathKind::Copy,
            checksum: Some(checksum),
            symlink_target: None,
        }
    }
}

/// The per-workspace ownership ledger (§3 "Workspace").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLedger {
    /// The repository fingerprint this workspace belongs to.
    pub repo: Fingerprint,
    /// Path of the workspace relative to the repository root. Empty string
    /// means the repository root itself.
    pub workspace_path: String,
    /// Requested materialization mode.
    pub mode: Mode,
    /// Whether the workspace currently has an applied overlay.
    pub applied: bool,
    /// The store applied last (highest precedence), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_store: Option<StoreId>,
    /// Snapshot of the stack at apply time (excludes `active_store`).
    #[serde(default)]
    pub stack: Vec<StoreId>,
    /// Workspace-relative path → ownership record, for every path the
    /// applier created on this workspace.
    #[serde(default)]
    pub paths: BTreeMap<RelPath, PathOwnership>,
}

impl WorkspaceLedger {
    /// A fresh, unapplied ledger for a workspace that has never been
    /// materialized (or whose prior ledger was deleted).
    #[must_use]
    pub fn fresh(repo: Fingerprint, workspace_path: String, mode: Mode) -> Self {
        Self {
            repo,
            workspace_path,
            mode,
            applied: false,
            active_store: None,
            stack: Vec::new(),
            paths: BTreeMap::new(),
        }
    }

    /// Returns `true` if this ledger represents a workspace with nothing
    /// applied — the state that should never be persisted (deleted instead).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.applied && self.paths.is_empty() && self.active_store.is_none() && self.stack.is_empty()
    }
}

/// A per-repository record of the store stack and active store (§3
/// "Repository stack").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Ordered list of store ids; later entries take precedence over earlier
    /// ones.
    #[serde(default)]
    pub stack: Vec<StoreId>,
    /// The store applied on top of the stack, with the highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_store: Option<StoreId>,
}

impl RepoRecord {
    /// The effective, ordered list of stores for planning: `stack` followed
    /// by `active_store` if set. Duplicates are preserved — only the last
    /// occurrence of a given store id matters for ownership.
    #[must_use]
    pub fn effective_list(&self) -> Vec<StoreId> {
        let mut list = self.stack.clone();
        if let Some(active) = &self.active_store {
            list.push(active.clone());
        }
        list
    }
}
