//! Unapplier (§4.6, component C6) — removes applied paths deepest-first and
//! retires the workspace ledger.
//!
//! Grounded on the same "stat, check kind, remove, continue past already
//! missing entries" shape the applier's rollback uses, but driven by the
//! ledger directly rather than a freshly computed plan: unapply never
//! re-plans, it only undoes what the ledger says is there.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::OverlayError;
use crate::fs::{FileKind, Fs};
use crate::hash::ContentHasher;
use crate::model::ids::{RelPath, WorkspaceIdent};
use crate::model::ledger::PathKind;
use crate::model::plan::Warning;
use crate::state_store::StateStore;

/// Options controlling one `unapply` invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnapplyOptions {
    /// If set, compute and return the result without mutating anything.
    pub dry_run: bool,
    /// If set, remove a path even if its on-disk kind doesn't match what the
    /// ledger recorded.
    pub force: bool,
}

/// The result of an `unapply` invocation.
#[derive(Clone, Debug, Default)]
pub struct UnapplyReport {
    /// Paths removed (or, for a dry run, that would be removed), in removal
    /// order.
    pub removed: Vec<RelPath>,
    /// Paths the ledger recorded but which this invocation did not remove,
    /// because removal failed. Non-empty only on partial failure.
    pub remaining: Vec<RelPath>,
    /// Non-blocking drift warnings observed while unapplying copy-mode
    /// paths.
    pub warnings: Vec<Warning>,
}

/// Remove every path a workspace's ledger claims to own, deepest-first, and
/// retire the ledger on full success (§4.6).
///
/// # Errors
/// Returns [`OverlayError::WorkspaceNotFound`] if no ledger exists for
/// `workspace_id`. Returns [`OverlayError::Io`] if a removal fails and
/// `dry_run` is not set; the ledger is then rewritten to retain only the
/// paths that were not removed, so a subsequent call can resume.
#[tracing::instrument(skip(fsys, state_store, hasher), fields(%workspace_id))]
pub fn unapply<F, S, H>(
    fsys: &F,
    state_store: &S,
    hasher: &H,
    workspace_root: &Path,
    workspace_id: &WorkspaceIdent,
    options: UnapplyOptions,
) -> Result<UnapplyReport, OverlayError>
where
    F: Fs,
    S: StateStore,
    H: ContentHasher,
{
    let mut ledger = state_store
        .load_workspace(workspace_id)?
        .ok_or_else(|| OverlayError::WorkspaceNotFound {
            workspace_id: workspace_id.as_str().to_owned(),
        })?;

    let mut order: Vec<RelPath> = ledger.paths.keys().cloned().collect();
    order.sort();
    order.reverse();

    let mut report = UnapplyReport::default();
    let mut remaining: BTreeMap<RelPath, crate::model::ledger::PathOwnership> = BTreeMap::new();

    for rel_path in order {
        let ownership = ledger
            .paths
            .get(&rel_path)
            .expect("path came from this ledger's own key set")
            .clone();

        let abs = workspace_root.join(rel_path.as_path());
        let on_disk = fsys.lstat(&abs)?;

        if ownership.kind == PathKind::Copy {
            if let Some(expected_hash) = &ownership.checksum {
                if on_disk.is_some() {
                    let actual_hash = hasher.hash_file(fsys, &abs)?;
                    if &actual_hash != expected_hash {
                        tracing::warn!(path = %rel_path, expected = %expected_hash, actual = %actual_hash, "copy-mode drift detected during unapply");
                        report.warnings.push(Warning::Drift {
                            path: rel_path.clone(),
                            expected_hash: expected_hash.clone(),
                            actual_hash,
                        });
                    }
                }
            }
        }

        if ownership.kind == PathKind::Symlink && on_disk == Some(FileKind::Symlink) {
            if let Some(expected_target) = &ownership.symlink_target {
                let actual_target = fsys.readlink(&abs)?;
                if &actual_target != expected_target {
                    tracing::warn!(path = %rel_path, expected = ?expected_target, actual = ?actual_target, "symlink retargeted out of band before unapply");
                    report.warnings.push(Warning::Retarget {
                        path: rel_path.clone(),
                        expected_target: expected_target.clone(),
                        actual_target,
                    });
                }
            }
        }

        let consistent = options.force
            || matches!(
                (ownership.kind, on_disk),
                (PathKind::Symlink, Some(FileKind::Symlink) | None)
                    | (PathKind::Copy, Some(FileKind::File) | None)
            );

        if !consistent {
            remaining.insert(rel_path.clone(), ownership);
            continue;
        }

        if options.dry_run {
            report.removed.push(rel_path);
            continue;
        }

        match fsys.remove_all(&abs) {
            Ok(()) => report.removed.push(rel_path),
            Err(_) => {
                remaining.insert(rel_path.clone(), ownership);
            }
        }
    }

    report.remaining = remaining.keys().cloned().collect();

    if options.dry_run {
        return Ok(report);
    }

    if remaining.is_empty() {
        state_store.delete_workspace(workspace_id)?;
    } else {
        tracing::warn!(
            workspace_id = %workspace_id,
            remaining = remaining.len(),
            "unapply left paths behind; ledger kept so a subsequent call can resume"
        );
        ledger.paths = remaining;
        state_store.save_workspace(workspace_id, &ledger)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::applier::{apply, ApplyOptions};
    use crate::fs::MemFs;
    use crate::hash::Sha256Hasher;
    use crate::model::ids::{Fingerprint, StoreId};
    use crate::model::ledger::{Mode, RepoRecord};
    use crate::model::store::{StoreMeta, TrackEntry, TrackKind};
    use crate::planner::{plan, PlanRequest};
    use crate::state_store::FsStateStore;
    use crate::store_repo::{FsStoreRepository, StoreRepository};

    struct Harness {
        fsys: MemFs,
        store_repo: FsStoreRepository<MemFs>,
        state_store: FsStateStore<MemFs>,
        hasher: Sha256Hasher,
    }

    fn harness() -> Harness {
        let fsys = MemFs::new();
        Harness {
            store_repo: FsStoreRepository::new(fsys.clone(), PathBuf::from("/stores")),
            state_store: FsStateStore::new(
                fsys.clone(),
                PathBuf::from("/workspaces"),
                PathBuf::from("/repos"),
            ),
            fsys,
            hasher: Sha256Hasher::new(),
        }
    }

    impl Harness {
        fn make_store(&self, id: &str, files: &[(&str, &str)]) -> StoreId {
            let store_id = StoreId::new(id).unwrap();
            self.store_repo
                .create(&store_id, &StoreMeta::new(id, "2024-01-01T00:00:00Z"))
                .unwrap();
            let overlay_root = self.store_repo.overlay_root(&store_id).unwrap();
            let mut manifest = self.store_repo.load_track(&store_id).unwrap();
            for (path, content) in files {
                self.fsys
                    .atomic_write(&overlay_root.join(path), content.as_bytes(), 0o644)
                    .unwrap();
                manifest
                    .push(TrackEntry {
                        path: RelPath::new(*path).unwrap(),
                        kind: TrackKind::File,
                    })
                    .unwrap();
            }
            self.store_repo.save_track(&store_id, &manifest).unwrap();
            store_id
        }

        fn apply_fresh(&self, mode: Mode, store_id: StoreId) -> WorkspaceIdent {
            self.state_store
                .save_repo(
                    &Fingerprint::new("fp"),
                    &RepoRecord {
                        stack: Vec::new(),
                        active_store: Some(store_id),
                    },
                )
                .unwrap();
            let outcome = plan(
                &self.fsys,
                &self.store_repo,
                &self.state_store,
                &self.hasher,
                &PlanRequest {
                    workspace_root: PathBuf::from("/repo/workspace"),
                    mode,
                    repo_fingerprint: Fingerprint::new("fp"),
                    relative_workspace_path: String::new(),
                    force: false,
                },
            )
            .unwrap();
            let workspace_id = outcome.workspace_id.clone();
            apply(
                &self.fsys,
                &self.state_store,
                &self.hasher,
                &PathBuf::from("/repo/workspace"),
                outcome,
                ApplyOptions::default(),
            )
            .unwrap();
            workspace_id
        }
    }

    #[test]
    fn unapply_removes_everything_and_deletes_ledger() {
        let h = harness();
        let store_id = h.make_store(
            "test-store",
            &[("scripts/init.sh", "x"), ("Makefile", "all:\n")],
        );
        let workspace_id = h.apply_fresh(Mode::Symlink, store_id);

        let report = unapply(
            &h.fsys,
            &h.state_store,
            &h.hasher,
            &PathBuf::from("/repo/workspace"),
            &workspace_id,
            UnapplyOptions::default(),
        )
        .unwrap();

        assert!(report.remaining.is_empty());
        // Deepest-first: scripts/init.sh (depth 2) before Makefile (depth 1)
        // would be wrong — Makefile is shallower, so it's removed *after*.
        assert_eq!(
            report.removed,
            vec![
                RelPath::new("scripts/init.sh").unwrap(),
                RelPath::new("Makefile").unwrap(),
            ]
        );
        assert!(h
            .state_store
            .load_workspace(&workspace_id)
            .unwrap()
            .is_none());
        assert!(!h.fsys.exists(&PathBuf::from("/repo/workspace/Makefile")));
    }

    #[test]
    fn unapply_missing_ledger_is_an_error() {
        let h = harness();
        let workspace_id = WorkspaceIdent::from_hash("nope".to_owned());
        let result = unapply(
            &h.fsys,
            &h.state_store,
            &h.hasher,
            &PathBuf::from("/repo/workspace"),
            &workspace_id,
            UnapplyOptions::default(),
        );
        assert!(matches!(
            result,
            Err(OverlayError::WorkspaceNotFound { .. })
        ));
    }

    #[test]
    fn dry_run_unapply_mutates_nothing() {
        let h = harness();
        let store_id = h.make_store("test-store", &[("Makefile", "all:\n")]);
        let workspace_id = h.apply_fresh(Mode::Symlink, store_id);

        let report = unapply(
            &h.fsys,
            &h.state_store,
            &h.hasher,
            &PathBuf::from("/repo/workspace"),
            &workspace_id,
            UnapplyOptions {
                dry_run: true,
                force: false,
            },
        )
        .unwrap();

        assert_eq!(report.removed, vec![RelPath::new("Makefile").unwrap()]);
        assert!(h.fsys.exists(&PathBuf::from("/repo/workspace/Makefile")));
        assert!(h
            .state_store
            .load_workspace(&workspace_id)
            .unwrap()
            .unwrap()
            .applied);
    }

    #[test]
    fn copy_mode_drift_is_reported_and_file_is_still_removed() {
        let h = harness();
        let store_id = h.make_store("test-store", &[("test.txt", "original")]);
        let workspace_id = h.apply_fresh(Mode::Copy, store_id);

        h.fsys
            .atomic_write(
                &PathBuf::from("/repo/workspace/test.txt"),
                b"drifted",
                0o644,
            )
            .unwrap();

        let report = unapply(
            &h.fsys,
            &h.state_store,
            &h.hasher,
            &PathBuf::from("/repo/workspace"),
            &workspace_id,
            UnapplyOptions::default(),
        )
        .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(&report.warnings[0], Warning::Drift { .. }));
        assert!(!h.fsys.exists(&PathBuf::from("/repo/workspace/test.txt")));
    }

    #[test]
    fn retargeted_symlink_is_reported_and_still_removed() {
        let h = harness();
        let store_id = h.make_store("test-store", &[("Makefile", "all:\n")]);
        let workspace_id = h.apply_fresh(Mode::Symlink, store_id);

        let link = PathBuf::from("/repo/workspace/Makefile");
        h.fsys.remove_all(&link).unwrap();
        h.fsys
            .symlink(&PathBuf::from("/somewhere/else"), &link)
            .unwrap();

        let report = unapply(
            &h.fsys,
            &h.state_store,
            &h.hasher,
            &PathBuf::from("/repo/workspace"),
            &workspace_id,
            UnapplyOptions::default(),
        )
        .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(&report.warnings[0], Warning::Retarget { .. }));
        assert!(!h.fsys.exists(&link));
    }
}
