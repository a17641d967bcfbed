//! Property tests for planner determinism and apply/plan idempotence (§8).
//!
//! Uses proptest to generate random stores, track manifests, and repository
//! stacks, then verifies that (a) planning the same inputs twice always
//! produces identical operations and diagnostics, and (b) planning again
//! immediately after a successful apply always yields zero further
//! operations.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use proptest::prelude::*;

use crate::applier::{apply, ApplyOptions};
use crate::fs::{Fs, MemFs};
use crate::hash::Sha256Hasher;
use crate::model::ids::{Fingerprint, RelPath, StoreId};
use crate::model::ledger::{Mode, RepoRecord};
use crate::model::store::{StoreMeta, TrackEntry, TrackKind};
use crate::planner::{plan, PlanRequest};
use crate::state_store::{FsStateStore, StateStore};
use crate::store_repo::{FsStoreRepository, StoreRepository};

fn arb_file_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}\\.txt"
}

fn arb_files() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((arb_file_name(), "[a-zA-Z0-9 ]{0,16}"), 1..=6).prop_map(|pairs| {
        let mut seen = std::collections::BTreeSet::new();
        pairs
            .into_iter()
            .filter(|(name, _)| seen.insert(name.clone()))
            .collect()
    })
}

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
    fn make_store(&self, id: &str, files: &[(String, String)]) -> StoreId {
        let store_id = StoreId::new(id).unwrap();
        self.store_repo
            .create(&store_id, &StoreMeta::new(id, "2024-01-01T00:00:00Z"))
            .unwrap();
        let overlay_root = self.store_repo.overlay_root(&store_id).unwrap();
        let mut manifest = self.store_repo.load_track(&store_id).unwrap();
        for (name, content) in files {
            self.fsys
                .atomic_write(&overlay_root.join(name), content.as_bytes(), 0o644)
                .unwrap();
            manifest
                .push(TrackEntry {
                    path: RelPath::new(name).unwrap(),
                    kind: TrackKind::File,
                })
                .unwrap();
        }
        self.store_repo.save_track(&store_id, &manifest).unwrap();
        store_id
    }

    fn request(&self, mode: Mode) -> PlanRequest {
        PlanRequest {
            workspace_root: PathBuf::from("/repo/workspace"),
            mode,
            repo_fingerprint: Fingerprint::new("fp"),
            relative_workspace_path: String::new(),
            force: false,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Planning the same (store, stack, ledger, mode) twice always produces
    /// the same operation sequence and the same diagnostics.
    #[test]
    fn planning_is_deterministic(files in arb_files(), mode_is_copy in any::<bool>()) {
        let h = harness();
        let store_id = h.make_store("store", &files);
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord { stack: Vec::new(), active_store: Some(store_id) },
            )
            .unwrap();
        let mode = if mode_is_copy { Mode::Copy } else { Mode::Symlink };

        let first = plan(&h.fsys, &h.store_repo, &h.state_store, &h.hasher, &h.request(mode)).unwrap();
        let second = plan(&h.fsys, &h.store_repo, &h.state_store, &h.hasher, &h.request(mode)).unwrap();

        prop_assert_eq!(first.plan.operations, second.plan.operations);
        prop_assert_eq!(first.plan.conflicts, second.plan.conflicts);
    }

    /// Apply then plan again over the same inputs yields no further
    /// operations and no conflicts: a second `apply` would be a no-op.
    #[test]
    fn apply_then_plan_again_is_idempotent(files in arb_files(), mode_is_copy in any::<bool>()) {
        let h = harness();
        let store_id = h.make_store("store", &files);
        h.state_store
            .save_repo(
                &Fingerprint::new("fp"),
                &RepoRecord { stack: Vec::new(), active_store: Some(store_id) },
            )
            .unwrap();
        let mode = if mode_is_copy { Mode::Copy } else { Mode::Symlink };

        let outcome = plan(&h.fsys, &h.store_repo, &h.state_store, &h.hasher, &h.request(mode)).unwrap();
        apply(
            &h.fsys,
            &h.state_store,
            &h.hasher,
            &PathBuf::from("/repo/workspace"),
            outcome,
            ApplyOptions::default(),
        )
        .unwrap();

        let replanned = plan(&h.fsys, &h.store_repo, &h.state_store, &h.hasher, &h.request(mode)).unwrap();

        prop_assert!(replanned.plan.operations.is_empty());
        prop_assert!(replanned.plan.conflicts.is_empty());
    }
}
