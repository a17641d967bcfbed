//! Planner (§4.4, component C4) — the overlay engine's core.
//!
//! Computes the ordered list of filesystem operations required to bring a
//! workspace to the state implied by a repository's store stack, without
//! mutating anything. Reads the store repository and the state store;
//! never writes to either.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{ConflictDetail, OverlayError};
use crate::fs::Fs;
use crate::hash::ContentHasher;
use crate::identity::workspace_ident;
use crate::model::ids::{Fingerprint, RelPath, StoreId, WorkspaceIdent};
use crate::model::ledger::{Mode, PathKind, WorkspaceLedger};
use crate::model::plan::{Conflict, DesiredEntry, Operation, Plan, Warning};
use crate::model::store::TrackKind;
use crate::state_store::StateStore;
use crate::store_repo::{list_files_under, StoreRepository};

/// Everything the planner needs for one invocation (§4.4 "Input").
#[derive(Clone, Debug)]
pub struct PlanRequest {
    /// Absolute path of the workspace directory being planned for.
    pub workspace_root: PathBuf,
    /// Requested materialization mode.
    pub mode: Mode,
    /// Stable fingerprint of the repository the workspace belongs to.
    pub repo_fingerprint: Fingerprint,
    /// Path of the workspace relative to the repository root (empty string
    /// for the repository root itself).
    pub relative_workspace_path: String,
    /// Whether a blocking conflict should still allow the resulting plan to
    /// be applied. The planner records conflicts regardless; `force` only
    /// changes whether the applier honors them.
    pub force: bool,
}

/// Everything the planner computed, beyond the [`Plan`] itself — the
/// applier needs the desired map and resolved identity to rebuild the
/// ledger after a successful apply (§4.5 "update the ledger").
#[derive(Clone, Debug)]
pub struct PlanOutcome {
    /// The workspace identifier this plan applies to.
    pub workspace_id: WorkspaceIdent,
    /// The materialization mode this plan was computed for — the mode the
    /// applier must record on the ledger, which may differ from
    /// `previous_ledger.mode` when a workspace switches modes between
    /// applies.
    pub mode: Mode,
    /// The ledger as it stood before this plan (fresh and empty if none was
    /// ever saved).
    pub previous_ledger: WorkspaceLedger,
    /// Every workspace-relative path the effective store stack currently
    /// wants to exist, and who provides it.
    pub desired: BTreeMap<RelPath, DesiredEntry>,
    /// The resolved stack, snapshot at planning time (excludes the active
    /// store).
    pub stack: Vec<StoreId>,
    /// The resolved active store, if any.
    pub active_store: Option<StoreId>,
    /// The computed plan.
    pub plan: Plan,
}

/// Compute a [`PlanOutcome`] for one workspace (§4.4).
///
/// # Errors
/// Returns an error if the store repository or state store cannot be read,
/// or if a tracked path fails validation.
#[tracing::instrument(skip(fsys, store_repo, state_store, hasher), fields(workspace_path = %request.relative_workspace_path, mode = ?request.mode))]
pub fn plan<F, R, S, H>(
    fsys: &F,
    store_repo: &R,
    state_store: &S,
    hasher: &H,
    request: &PlanRequest,
) -> Result<PlanOutcome, OverlayError>
where
    F: Fs,
    R: StoreRepository,
    S: StateStore,
    H: ContentHasher,
{
    // Step 1: resolve the effective store list.
    let repo_record = state_store.load_repo(&request.repo_fingerprint)?;
    let effective = repo_record.effective_list();

    // Step 2: load (or default) the current ledger.
    let workspace_id = workspace_ident(&request.repo_fingerprint, &request.relative_workspace_path);
    let previous_ledger = state_store
        .load_workspace(&workspace_id)?
        .unwrap_or_else(|| {
            WorkspaceLedger::fresh(
                request.repo_fingerprint.clone(),
                request.relative_workspace_path.clone(),
                request.mode,
            )
        });

    // Step 3: enumerate desired entries. Later stores in `effective`
    // override earlier ones for the same path.
    let mut desired: BTreeMap<RelPath, DesiredEntry> = BTreeMap::new();
    for store_id in &effective {
        let overlay_root = store_repo.overlay_root(store_id)?;
        let manifest = store_repo.load_track(store_id)?;
        for entry in &manifest.entries {
            let files = match entry.kind {
                TrackKind::File => vec![entry.path.as_path().to_path_buf()],
                TrackKind::Dir => {
                    list_files_under(fsys, &overlay_root, entry.path.as_path())?
                }
            };
            for rel in files {
                let rel_path = RelPath::new(&rel)?;
                desired.insert(
                    rel_path.clone(),
                    DesiredEntry {
                        rel_path,
                        src_abs_path: overlay_root.join(&rel),
                        owning_store: store_id.clone(),
                        source_kind: TrackKind::File,
                    },
                );
            }
        }
    }

    // Steps 4-6: diff against the previous ledger, detect conflicts and drift.
    let mut removals: Vec<(RelPath, StoreId)> = Vec::new();
    let mut creations: Vec<DesiredEntry> = Vec::new();
    let mut conflicts: Vec<Conflict> = Vec::new();
    let mut warnings: Vec<Warning> = Vec::new();

    for (path, prev) in &previous_ledger.paths {
        let still_wanted = desired.get(path).is_some_and(|desired_entry| {
            desired_entry.owning_store == prev.store_id
                && PathKind::from(request.mode) == prev.kind
        });
        if !still_wanted {
            removals.push((path.clone(), prev.store_id.clone()));
        }

        if prev.kind == PathKind::Copy {
            if let Some(expected_hash) = &prev.checksum {
                let abs = request.workspace_root.join(path.as_path());
                if fsys.lstat(&abs)?.is_some() {
                    let actual_hash = hasher.hash_file(fsys, &abs)?;
                    if &actual_hash != expected_hash {
                        tracing::warn!(path = %path, expected = %expected_hash, actual = %actual_hash, "copy-mode drift detected");
                        warnings.push(Warning::Drift {
                            path: path.clone(),
                            expected_hash: expected_hash.clone(),
                            actual_hash,
                        });
                    }
                }
            }
        }
    }

    for (path, desired_entry) in &desired {
        let prev = previous_ledger.paths.get(path);
        let unchanged = prev.is_some_and(|prev| {
            desired_entry.owning_store == prev.store_id
                && PathKind::from(request.mode) == prev.kind
        });
        if unchanged {
            continue;
        }

        let abs = request.workspace_root.join(path.as_path());
        let on_disk = fsys.lstat(&abs)?;
        match (on_disk, prev) {
            (None, _) => creations.push(desired_entry.clone()),
            (Some(_), Some(prev)) => {
                // Owned by a different store/kind than before: a replacement.
                removals.push((path.clone(), prev.store_id.clone()));
                creations.push(desired_entry.clone());
            }
            (Some(_), None) => {
                // An unowned file blocks this path.
                conflicts.push(Conflict {
                    path: path.clone(),
                    existing_owner: None,
                    new_owner: desired_entry.owning_store.clone(),
                });
                if request.force {
                    removals.push((path.clone(), desired_entry.owning_store.clone()));
                    creations.push(desired_entry.clone());
                }
            }
        }
    }

    // Step 7: emit operations in execution order.
    removals.sort_by(|a, b| a.0.cmp(&b.0));
    removals.reverse();
    let mut operations: Vec<Operation> = removals
        .into_iter()
        .map(|(rel_path, expected_owner)| Operation::RemoveManagedPath {
            rel_path,
            expected_owner,
        })
        .collect();

    creations.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    operations.extend(creations.into_iter().map(|entry| match request.mode {
        Mode::Symlink => Operation::CreateSymlink {
            rel_path: entry.rel_path,
            target_abs_path: entry.src_abs_path,
            owning_store: entry.owning_store,
        },
        Mode::Copy => Operation::CopyFile {
            src_abs_path: entry.src_abs_path,
            dst_rel_path: entry.rel_path,
            owning_store: entry.owning_store,
        },
    }));

    Ok(PlanOutcome {
        workspace_id,
        mode: request.mode,
        previous_ledger,
        desired,
        stack: repo_record.stack,
        active_store: repo_record.active_store,
        plan: Plan {
            operations,
            conflicts,
            warnings,
        },
    })
}

/// Convert a plan's conflicts into the detailed diagnostics
/// [`OverlayError::Conflict`] expects.
#[must_use]
pub fn conflict_details(conflicts: &[Conflict]) -> Vec<ConflictDetail> {
    conflicts
        .iter()
        .map(|c| ConflictDetail {
            path: c.path.clone(),
            existing_owner: c.existing_owner.clone(),
            new_owner: c.new_owner.clone(),
        })
        .collect()
}

#[cfg(all(test, feature = "proptests"))]
mod planner_proptests;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{Fs, MemFs};
    use crate::hash::Sha256Hasher;
    use crate::model::ids::StoreId;
    use crate::model::ledger::RepoRecord;
    use crate::model::store::{StoreMeta, TrackEntry, TrackKind};
    use crate::state_store::FsStateStore;
    use crate::store_repo::FsStoreRepository;

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
        fn make_store(&self, id: &str, files: &[(&str, &str)], track_dirs: &[&str]) -> StoreId {
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
            for dir in track_dirs {
                manifest
                    .push(TrackEntry {
                        path: RelPath::new(*dir).unwrap(),
                        kind: TrackKind::Dir,
                    })
                    .unwrap();
            }
            self.store_repo.save_track(&store_id, &manifest).unwrap();
            store_id
        }

        fn request(&self, mode: Mode, force: bool) -> PlanRequest {
            PlanRequest {
                workspace_root: PathBuf::from("/repo/workspace"),
                mode,
                repo_fingerprint: Fingerprint::new("fp"),
                relative_workspace_path: String::new(),
                force,
            }
        }
    }

    #[test]
    fn fresh_apply_produces_one_creation_and_no_conflicts() {
        let h = harness();
        let store_id = h.make_store("test-store", &[("Makefile", "all: build\n")], &[]);
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord {
                    stack: Vec::new(),
                    active_store: Some(store_id.clone()),
                },
            )
            .unwrap();

        let outcome = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Symlink, false),
        )
        .unwrap();

        assert!(outcome.plan.conflicts.is_empty());
        assert_eq!(outcome.plan.operations.len(), 1);
        assert!(matches!(
            &outcome.plan.operations[0],
            Operation::CreateSymlink { rel_path, owning_store, .. }
                if rel_path.to_string() == "Makefile" && *owning_store == store_id
        ));
    }

    #[test]
    fn precedence_active_store_wins_over_stack() {
        let h = harness();
        let s1 = h.make_store("store1", &[("Makefile", "s1\n")], &[]);
        let s2 = h.make_store("store2", &[("Makefile", "s2\n")], &[]);
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord {
                    stack: vec![s1],
                    active_store: Some(s2.clone()),
                },
            )
            .unwrap();

        let outcome = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Symlink, false),
        )
        .unwrap();

        let owner = outcome.desired.get(&RelPath::new("Makefile").unwrap()).unwrap();
        assert_eq!(owner.owning_store, s2);
    }

    #[test]
    fn unowned_file_at_desired_path_is_a_conflict() {
        let h = harness();
        let store_id = h.make_store("test-store", &[("Makefile", "all: build\n")], &[]);
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord {
                    stack: Vec::new(),
                    active_store: Some(store_id),
                },
            )
            .unwrap();
        h.fsys.mkdir_all(std::path::Path::new("/repo/workspace")).unwrap();
        h.fsys
            .atomic_write(
                std::path::Path::new("/repo/workspace/Makefile"),
                b"unmanaged",
                0o644,
            )
            .unwrap();

        let outcome = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Symlink, false),
        )
        .unwrap();

        assert_eq!(outcome.plan.conflicts.len(), 1);
        assert!(outcome.plan.conflicts[0].existing_owner.is_none());
    }

    #[test]
    fn directory_tracking_expands_recursively() {
        let h = harness();
        let store_id = StoreId::new("scripts-store").unwrap();
        h.store_repo
            .create(&store_id, &StoreMeta::new("scripts-store", "2024-01-01T00:00:00Z"))
            .unwrap();
        let overlay_root = h.store_repo.overlay_root(&store_id).unwrap();
        h.fsys
            .atomic_write(&overlay_root.join("scripts/init.sh"), b"init", 0o644)
            .unwrap();
        h.fsys
            .atomic_write(
                &overlay_root.join("scripts/utils/helper.sh"),
                b"help",
                0o644,
            )
            .unwrap();
        let mut manifest = h.store_repo.load_track(&store_id).unwrap();
        manifest
            .push(TrackEntry {
                path: RelPath::new("scripts").unwrap(),
                kind: TrackKind::Dir,
            })
            .unwrap();
        h.store_repo.save_track(&store_id, &manifest).unwrap();

        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord {
                    stack: Vec::new(),
                    active_store: Some(store_id),
                },
            )
            .unwrap();

        let outcome = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Symlink, false),
        )
        .unwrap();

        // Shallowest-first creation ordering: init.sh (depth 2) precedes
        // utils/helper.sh (depth 3).
        let rel_paths: Vec<String> = outcome
            .plan
            .operations
            .iter()
            .map(|op| op.rel_path().to_string())
            .collect();
        assert_eq!(
            rel_paths,
            vec!["scripts/init.sh", "scripts/utils/helper.sh"]
        );
    }

    #[test]
    fn copy_mode_drift_is_reported_without_blocking() {
        let h = harness();
        let store_id = h.make_store("test-store", &[("test.txt", "new content")], &[]);
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord {
                    stack: Vec::new(),
                    active_store: Some(store_id.clone()),
                },
            )
            .unwrap();

        h.fsys.mkdir_all(std::path::Path::new("/repo/workspace")).unwrap();
        h.fsys
            .atomic_write(
                std::path::Path::new("/repo/workspace/test.txt"),
                b"drifted content",
                0o644,
            )
            .unwrap();
        let mut ledger =
            WorkspaceLedger::fresh(Fingerprint::new("fp"), String::new(), Mode::Copy);
        ledger.applied = true;
        ledger.active_store = Some(store_id.clone());
        ledger.paths.insert(
            RelPath::new("test.txt").unwrap(),
            crate::model::ledger::PathOwnership::copy(store_id, h.hasher.hash_bytes(b"new content")),
        );
        let workspace_id = workspace_ident(&Fingerprint::new("fp"), "");
        h.state_store.save_workspace(&workspace_id, &ledger).unwrap();

        let outcome = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Copy, false),
        )
        .unwrap();

        assert_eq!(outcome.plan.warnings.len(), 1);
        assert!(matches!(
            &outcome.plan.warnings[0],
            Warning::Drift { path, .. } if path.to_string() == "test.txt"
        ));
    }

    #[test]
    fn determinism_two_runs_produce_identical_plans() {
        let h = harness();
        let store_id = h.make_store(
            "test-store",
            &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")],
            &[],
        );
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord {
                    stack: Vec::new(),
                    active_store: Some(store_id),
                },
            )
            .unwrap();

        let first = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Symlink, false),
        )
        .unwrap();
        let second = plan(
            &h.fsys,
            &h.store_repo,
            &h.state_store,
            &h.hasher,
            &h.request(Mode::Symlink, false),
        )
        .unwrap();

        assert_eq!(first.plan.operations, second.plan.operations);
    }
}
