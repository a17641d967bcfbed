//! Explicit engine configuration (§9 "Global state").
//!
//! The engine holds no process-wide state. Every call site supplies its own
//! roots; nothing here is read from a config file or environment variable —
//! repo-local directory layout and initialization are an external
//! collaborator's job (§1 Non-goals), not this crate's.

use std::path::{Path, PathBuf};

/// The three on-disk roots every engine component is parameterized over.
///
/// Typically all three live under one `.monodev/` directory in the
/// repository, but the engine never assumes that — it only ever joins a
/// `store_id`/`WorkspaceIdent`/`Fingerprint` onto whichever root the caller
/// handed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineRoots {
    /// Root directory under which every store lives, one subdirectory per
    /// `store_id` (see [`crate::store_repo::StoreRepository`]).
    pub stores_root: PathBuf,
    /// Root directory under which every workspace ledger lives, one file
    /// per `WorkspaceIdent` (see [`crate::state_store::StateStore`]).
    pub workspaces_root: PathBuf,
    /// Root directory under which every per-repository stack record lives,
    /// one file per `Fingerprint`.
    pub repos_root: PathBuf,
}

impl EngineRoots {
    /// Construct roots explicitly.
    #[must_use]
    pub fn new(
        stores_root: impl Into<PathBuf>,
        workspaces_root: impl Into<PathBuf>,
        repos_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stores_root: stores_root.into(),
            workspaces_root: workspaces_root.into(),
            repos_root: repos_root.into(),
        }
    }

    /// The conventional layout: `<base>/.monodev/{stores,workspaces,repos}`.
    #[must_use]
    pub fn under(base: &Path) -> Self {
        let home = base.join(".monodev");
        Self {
            stores_root: home.join("stores"),
            workspaces_root: home.join("workspaces"),
            repos_root: home.join("repos"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_derives_conventional_subdirectories() {
        let roots = EngineRoots::under(Path::new("/home/user/project"));
        assert_eq!(
            roots.stores_root,
            PathBuf::from("/home/user/project/.monodev/stores")
        );
        assert_eq!(
            roots.workspaces_root,
            PathBuf::from("/home/user/project/.monodev/workspaces")
        );
        assert_eq!(
            roots.repos_root,
            PathBuf::from("/home/user/project/.monodev/repos")
        );
    }
}
