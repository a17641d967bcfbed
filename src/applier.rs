//! Applier (§4.5, component C5) — the undo-journaled transactional executor.
//!
//! Consumes a [`crate::planner::PlanOutcome`], mutates the filesystem in plan
//! order, and on success rebuilds and persists the workspace ledger. Any
//! operation failure triggers a best-effort reverse-order rollback of
//! whatever already succeeded in this invocation.

use std::path::PathBuf;

use crate::error::OverlayError;
use crate::fs::{FileKind, Fs};
use crate::hash::ContentHasher;
use crate::model::ledger::PathOwnership;
use crate::model::plan::{Operation, Plan};
use crate::planner::{conflict_details, PlanOutcome};
use crate::state_store::StateStore;

/// Options controlling one `apply` invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApplyOptions {
    /// If set, compute and return the result without mutating anything.
    pub dry_run: bool,
    /// If set, a plan's conflicts do not block execution.
    pub force: bool,
}

/// The result of a successful (or dry-run) apply.
#[derive(Clone, Debug)]
pub struct ApplyReport {
    /// The operations actually performed, in order. Empty for a dry run.
    pub applied: Vec<Operation>,
    /// The plan that was executed (or would have been).
    pub plan: Plan,
}

/// One action recorded on the undo journal so a failed apply can roll back
/// whatever already succeeded.
enum UndoAction {
    /// Undo a `CreateSymlink`/`CopyFile` by removing what was created.
    RemoveCreated { rel_path: crate::model::ids::RelPath },
    /// Undo a `RemoveManagedPath` by recreating what was removed.
    RecreateRemoved {
        rel_path: crate::model::ids::RelPath,
        prior: PathOwnership,
    },
}

/// Apply a previously computed [`PlanOutcome`] (§4.5).
///
/// # Errors
/// Returns [`OverlayError::Conflict`] if the plan has non-forced conflicts.
/// Returns [`OverlayError::Io`] if a filesystem mutation fails; in that case
/// every operation already completed in this invocation is rolled back on a
/// best-effort basis before the error is returned.
#[tracing::instrument(skip(fsys, state_store, hasher, outcome), fields(workspace_id = %outcome.workspace_id, ops = outcome.plan.operations.len()))]
pub fn apply<F, S, H>(
    fsys: &F,
    state_store: &S,
    hasher: &H,
    workspace_root: &std::path::Path,
    outcome: PlanOutcome,
    options: ApplyOptions,
) -> Result<ApplyReport, OverlayError>
where
    F: Fs,
    S: StateStore,
    H: ContentHasher,
{
    if !options.force && outcome.plan.has_conflicts() {
        return Err(OverlayError::Conflict {
            conflicts: conflict_details(&outcome.plan.conflicts),
        });
    }

    if options.dry_run {
        return Ok(ApplyReport {
            applied: Vec::new(),
            plan: outcome.plan,
        });
    }

    let mut journal: Vec<UndoAction> = Vec::new();
    let mut applied: Vec<Operation> = Vec::new();

    for op in &outcome.plan.operations {
        match perform(fsys, workspace_root, &outcome, op, options.force) {
            Ok(undo) => {
                journal.push(undo);
                applied.push(op.clone());
            }
            Err(err) => {
                let rolled_back = journal.len();
                rollback(fsys, workspace_root, journal);
                tracing::warn!(
                    error = %err,
                    rolled_back,
                    "apply failed mid-plan; rolled back operations completed so far"
                );
                return Err(err);
            }
        }
    }

    let mut ledger = outcome.previous_ledger;
    ledger.applied = true;
    ledger.mode = outcome.mode;
    ledger.active_store = outcome.active_store;
    ledger.stack = outcome.stack;
    ledger.paths = rebuild_paths(fsys, hasher, workspace_root, &outcome.desired)?;

    if let Err(err) = state_store.save_workspace(&outcome.workspace_id, &ledger) {
        tracing::warn!(
            workspace_id = %outcome.workspace_id,
            error = %err,
            "filesystem mutation succeeded but the ledger write failed; workspace is applied but unrecorded, a rerun will reconcile"
        );
        return Err(err);
    }

    Ok(ApplyReport {
        applied,
        plan: outcome.plan,
    })
}

fn rebuild_paths<F: Fs, H: ContentHasher>(
    fsys: &F,
    hasher: &H,
    workspace_root: &std::path::Path,
    desired: &std::collections::BTreeMap<crate::model::ids::RelPath, crate::model::plan::DesiredEntry>,
) -> Result<std::collections::BTreeMap<crate::model::ids::RelPath, PathOwnership>, OverlayError> {
    let mut paths = std::collections::BTreeMap::new();
    for (rel_path, entry) in desired {
        let abs = workspace_root.join(rel_path.as_path());
        let ownership = match fsys.lstat(&abs)? {
            Some(FileKind::Symlink) => {
                PathOwnership::symlink(entry.owning_store.clone(), fsys.readlink(&abs)?)
            }
            _ => PathOwnership::copy(entry.owning_store.clone(), hasher.hash_file(fsys, &abs)?),
        };
        paths.insert(rel_path.clone(), ownership);
    }
    Ok(paths)
}

fn perform<F: Fs>(
    fsys: &F,
    workspace_root: &std::path::Path,
    outcome: &PlanOutcome,
    op: &Operation,
    force: bool,
) -> Result<UndoAction, OverlayError> {
    match op {
        Operation::CreateSymlink {
            rel_path,
            target_abs_path,
            ..
        } => {
            let abs = workspace_root.join(rel_path.as_path());
            if let Some(parent) = abs.parent() {
                fsys.mkdir_all(parent)?;
            }
            fsys.symlink(target_abs_path, &abs)?;
            Ok(UndoAction::RemoveCreated {
                rel_path: rel_path.clone(),
            })
        }
        Operation::CopyFile {
            src_abs_path,
            dst_rel_path,
            ..
        } => {
            let abs = workspace_root.join(dst_rel_path.as_path());
            if let Some(parent) = abs.parent() {
                fsys.mkdir_all(parent)?;
            }
            fsys.copy(src_abs_path, &abs)?;
            Ok(UndoAction::RemoveCreated {
                rel_path: dst_rel_path.clone(),
            })
        }
        Operation::RemoveManagedPath { rel_path, .. } => {
            let abs = workspace_root.join(rel_path.as_path());
            let prior = outcome.previous_ledger.paths.get(rel_path).cloned();
            if !force {
                if let Some(prior) = &prior {
                    let on_disk = fsys.lstat(&abs)?;
                    let consistent = matches!(
                        (prior.kind, on_disk),
                        (crate::model::ledger::PathKind::Symlink, Some(FileKind::Symlink))
                            | (crate::model::ledger::PathKind::Copy, Some(FileKind::File))
                    );
                    if !consistent {
                        return Err(OverlayError::Io(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            format!(
                                "refusing to remove {rel_path}: on-disk kind does not match the ledger"
                            ),
                        )));
                    }
                }
            }
            fsys.remove_all(&abs)?;
            match prior {
                Some(prior) => Ok(UndoAction::RecreateRemoved {
                    rel_path: rel_path.clone(),
                    prior,
                }),
                None => Ok(UndoAction::RemoveCreated {
                    rel_path: rel_path.clone(),
                }),
            }
        }
        Operation::ReplaceWith { rel_path, .. } => Err(OverlayError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{rel_path}: ReplaceWith should never reach the applier directly"),
        ))),
    }
}

fn rollback<F: Fs>(fsys: &F, workspace_root: &std::path::Path, journal: Vec<UndoAction>) {
    for action in journal.into_iter().rev() {
        match action {
            UndoAction::RemoveCreated { rel_path } => {
                let abs = workspace_root.join(rel_path.as_path());
                let _ = fsys.remove_all(&abs);
            }
            UndoAction::RecreateRemoved { rel_path, prior } => {
                let abs = workspace_root.join(rel_path.as_path());
                if let Some(parent) = abs.parent() {
                    let _ = fsys.mkdir_all(parent);
                }
                match prior.kind {
                    crate::model::ledger::PathKind::Symlink => {
                        if let Some(target) = &prior.symlink_target {
                            let _ = fsys.symlink(target, &abs);
                        }
                    }
                    crate::model::ledger::PathKind::Copy => {
                        // The original bytes no longer exist anywhere
                        // addressable once removed; best-effort rollback
                        // cannot restore copy-mode content without a prior
                        // backup, so it only restores symlinks precisely.
                    }
                }
            }
        }
    }
}
