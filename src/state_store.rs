//! State store (§4.3, component C3).
//!
//! Persists per-workspace ownership ledgers and per-repository store stacks.
//! Every read returns a deep (owned) copy — nothing here hands back a
//! reference into cached state, because there is no cache.

use std::path::PathBuf;

use crate::doc::{read_doc, write_doc};
use crate::error::OverlayError;
use crate::fs::Fs;
use crate::model::ids::{Fingerprint, WorkspaceIdent};
use crate::model::ledger::{RepoRecord, WorkspaceLedger};

/// Persistence for workspace ledgers and repository stack records (§4.3).
pub trait StateStore {
    /// Load the ledger for a workspace. Returns `Ok(None)` if no ledger has
    /// ever been saved (the caller should treat this as a fresh, unapplied
    /// ledger).
    ///
    /// # Errors
    /// Returns an error on I/O failure reading an existing ledger.
    fn load_workspace(
        &self,
        id: &WorkspaceIdent,
    ) -> Result<Option<WorkspaceLedger>, OverlayError>;

    /// Persist a workspace's ledger atomically.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    fn save_workspace(
        &self,
        id: &WorkspaceIdent,
        ledger: &WorkspaceLedger,
    ) -> Result<(), OverlayError>;

    /// Delete a workspace's ledger, if one exists.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    fn delete_workspace(&self, id: &WorkspaceIdent) -> Result<(), OverlayError>;

    /// Load the repository stack record for a fingerprint. Returns the
    /// default (empty stack, no active store) if none has ever been saved.
    ///
    /// # Errors
    /// Returns an error on I/O failure reading an existing record.
    fn load_repo(&self, fingerprint: &Fingerprint) -> Result<RepoRecord, OverlayError>;

    /// Persist a repository stack record atomically.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    fn save_repo(
        &self,
        fingerprint: &Fingerprint,
        record: &RepoRecord,
    ) -> Result<(), OverlayError>;
}

/// Production [`StateStore`], backed by an [`Fs`] implementation rooted at
/// a workspaces directory and a repos directory.
#[derive(Clone, Debug)]
pub struct FsStateStore<F> {
    fsys: F,
    workspaces_root: PathBuf,
    repos_root: PathBuf,
}

impl<F: Fs> FsStateStore<F> {
    /// Construct a state store rooted at the given workspace-ledger and
    /// repo-record directories.
    #[must_use]
    pub fn new(fsys: F, workspaces_root: PathBuf, repos_root: PathBuf) -> Self {
        Self {
            fsys,
            workspaces_root,
            repos_root,
        }
    }

    fn workspace_path(&self, id: &WorkspaceIdent) -> PathBuf {
        self.workspaces_root.join(id.as_str())
    }

    fn repo_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.repos_root.join(fingerprint.as_str())
    }
}

impl<F: Fs> StateStore for FsStateStore<F> {
    fn load_workspace(
        &self,
        id: &WorkspaceIdent,
    ) -> Result<Option<WorkspaceLedger>, OverlayError> {
        let path = self.workspace_path(id);
        if !self.fsys.exists(&path) {
            return Ok(None);
        }
        Ok(Some(read_doc(&self.fsys, &path)?))
    }

    fn save_workspace(
        &self,
        id: &WorkspaceIdent,
        ledger: &WorkspaceLedger,
    ) -> Result<(), OverlayError> {
        write_doc(&self.fsys, &self.workspace_path(id), ledger)?;
        Ok(())
    }

    fn delete_workspace(&self, id: &WorkspaceIdent) -> Result<(), OverlayError> {
        self.fsys.remove_all(&self.workspace_path(id))?;
        Ok(())
    }

    fn load_repo(&self, fingerprint: &Fingerprint) -> Result<RepoRecord, OverlayError> {
        let path = self.repo_path(fingerprint);
        if !self.fsys.exists(&path) {
            return Ok(RepoRecord::default());
        }
        Ok(read_doc(&self.fsys, &path)?)
    }

    fn save_repo(
        &self,
        fingerprint: &Fingerprint,
        record: &RepoRecord,
    ) -> Result<(), OverlayError> {
        write_doc(&self.fsys, &self.repo_path(fingerprint), record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::model::ids::StoreId;
    use crate::model::ledger::Mode;

    fn store() -> FsStateStore<MemFs> {
        FsStateStore::new(
            MemFs::new(),
            PathBuf::from("/workspaces"),
            PathBuf::from("/repos"),
        )
    }

    #[test]
    fn load_missing_workspace_is_none() {
        let store = store();
        let id = WorkspaceIdent::from_hash("abc".to_owned());
        assert!(store.load_workspace(&id).unwrap().is_none());
    }

    #[test]
    fn save_then_load_workspace_roundtrips() {
        let store = store();
        let id = WorkspaceIdent::from_hash("abc".to_owned());
        let ledger = WorkspaceLedger::fresh(Fingerprint::new("fp"), String::new(), Mode::Symlink);
        store.save_workspace(&id, &ledger).unwrap();
        assert_eq!(store.load_workspace(&id).unwrap(), Some(ledger));
    }

    #[test]
    fn delete_workspace_removes_it() {
        let store = store();
        let id = WorkspaceIdent::from_hash("abc".to_owned());
        let ledger = WorkspaceLedger::fresh(Fingerprint::new("fp"), String::new(), Mode::Symlink);
        store.save_workspace(&id, &ledger).unwrap();
        store.delete_workspace(&id).unwrap();
        assert!(store.load_workspace(&id).unwrap().is_none());
    }

    #[test]
    fn load_missing_repo_is_default() {
        let store = store();
        let fp = Fingerprint::new("fp");
        assert_eq!(store.load_repo(&fp).unwrap(), RepoRecord::default());
    }

    #[test]
    fn save_then_load_repo_roundtrips() {
        let store = store();
        let fp = Fingerprint::new("fp");
        let record = RepoRecord {
            stack: vec![StoreId::new("s1").unwrap()],
            active_store: Some(StoreId::new("s2").unwrap()),
        };
        store.save_repo(&fp, &record).unwrap();
        assert_eq!(store.load_repo(&fp).unwrap(), record);
    }
}
