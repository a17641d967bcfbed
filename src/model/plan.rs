//! The plan value produced by the planner and consumed by the applier and
//! unapplier (§3 "Plan", §4.4).
//!
//! A [`Plan`] carries no references into the planner's inputs: it is an
//! owned value, safe to log, serialize for a dry-run report, or hand to a
//! different process entirely.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ids::RelPath;
use super::store::TrackKind;

/// Why a desired entry could not simply be created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The workspace-relative path in conflict.
    pub path: RelPath,
    /// The store that previously owned `path`, if the ledger had a record
    /// for it at all.
    pub existing_owner: Option<super::ids::StoreId>,
    /// The store that would own `path` after this plan is applied.
    pub new_owner: super::ids::StoreId,
}

/// A non-blocking observation surfaced alongside a plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// A copy-mode file's on-disk content no longer matches the checksum
    /// recorded in the ledger.
    Drift {
        /// The workspace-relative path that drifted.
        path: RelPath,
        /// The checksum recorded in the ledger.
        expected_hash: String,
        /// The checksum recomputed from the file currently on disk.
        actual_hash: String,
    },
    /// A symlink-mode path's on-disk target no longer matches the target
    /// recorded in the ledger at apply time (§9 Open Question: out-of-band
    /// retargeting).
    Retarget {
        /// The workspace-relative path whose symlink was retargeted.
        path: RelPath,
        /// The target recorded in the ledger.
        expected_target: PathBuf,
        /// The target the symlink currently resolves to on disk.
        actual_target: PathBuf,
    },
}

/// One filesystem mutation the applier or unapplier may perform (§3
/// "Plan").
///
/// `ReplaceWith` models "an existing owned entry must change type or source
/// store" as a single atomic unit, but the planner never emits it directly
/// into a [`Plan`]'s operation list — it always decomposes a replacement into
/// its constituent `RemoveManagedPath` (scheduled in the removal phase) and
/// creation (scheduled in the creation phase) before the plan is returned.
/// The variant exists so the type faithfully models the concept described in
/// the data model; callers that only consume finished plans will never see
/// one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a symlink at `rel_path` pointing at `target_abs_path`.
    CreateSymlink {
        /// Workspace-relative path of the new symlink.
        rel_path: RelPath,
        /// Absolute path the symlink should point to (inside the owning
        /// store's overlay tree).
        target_abs_path: PathBuf,
        /// The store contributing this path.
        owning_store: super::ids::StoreId,
    },
    /// Copy a file from the owning store's overlay tree into the workspace.
    CopyFile {
        /// Absolute path of the source file.
        src_abs_path: PathBuf,
        /// Workspace-relative destination path.
        dst_rel_path: RelPath,
        /// The store contributing this path.
        owning_store: super::ids::StoreId,
    },
    /// Remove a path the ledger believes is owned by `expected_owner`.
    RemoveManagedPath {
        /// Workspace-relative path to remove.
        rel_path: RelPath,
        /// The store the ledger's current entry attributes this path to.
        expected_owner: super::ids::StoreId,
    },
    /// Atomically replace an existing owned entry with a new one. See the
    /// type-level docs: finished plans never contain this variant.
    ReplaceWith {
        /// The workspace-relative path being replaced.
        rel_path: RelPath,
        /// The operation that will take its place.
        new_op: Box<Operation>,
    },
}

impl Operation {
    /// The workspace-relative path this operation touches.
    #[must_use]
    pub fn rel_path(&self) -> &RelPath {
        match self {
            Self::CreateSymlink { rel_path, .. }
            | Self::RemoveManagedPath { rel_path, .. }
            | Self::ReplaceWith { rel_path, .. } => rel_path,
            Self::CopyFile { dst_rel_path, .. } => dst_rel_path,
        }
    }
}

/// A desired workspace entry enumerated from a store's overlay tree (§4.4
/// step 3). Intermediate planner state — not part of the public `Plan`
/// output, but shared with the unapplier's drift-recomputation helper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredEntry {
    /// Workspace-relative destination path.
    pub rel_path: RelPath,
    /// Absolute path of the source file in the owning store's overlay tree.
    pub src_abs_path: PathBuf,
    /// The store that contributes this path (last writer wins).
    pub owning_store: super::ids::StoreId,
    /// Always `TrackKind::File` — directories are expanded to the files
    /// beneath them before reaching this stage.
    pub source_kind: TrackKind,
}

/// A pure value describing the filesystem operations required to bring a
/// workspace to a desired state (§3 "Plan").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Operations in execution order: all removals (deepest-first), then all
    /// creations (shallowest-first).
    pub operations: Vec<Operation>,
    /// Unowned-file conflicts found while diffing desired state against the
    /// ledger.
    pub conflicts: Vec<Conflict>,
    /// Non-blocking warnings (currently: copy-mode drift).
    pub warnings: Vec<Warning>,
}

impl Plan {
    /// Returns `true` if the plan has unresolved conflicts that block
    /// execution without `force`.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
