//! Store repository (§4.2, component C2).
//!
//! Persists and reads store metadata, tracked-path manifests, and the
//! overlay tree on disk. A store's on-disk layout is
//! `<root>/<store_id>/{meta, track, overlay/}`. Every call validates
//! `store_id` — nothing downstream re-validates.

use std::path::{Path, PathBuf};

use crate::doc::{read_doc, write_doc};
use crate::error::OverlayError;
use crate::fs::Fs;
use crate::model::ids::StoreId;
use crate::model::store::{StoreMeta, TrackManifest};

/// CRUD over stores (§4.2).
pub trait StoreRepository {
    /// List every existing store id, in no particular order.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    fn list(&self) -> Result<Vec<StoreId>, OverlayError>;

    /// Returns `true` if a store with this id exists.
    fn exists(&self, id: &StoreId) -> bool;

    /// Create a new, empty store with the given metadata.
    ///
    /// # Errors
    /// Returns [`OverlayError::StoreExists`] if `id` already exists, or an
    /// I/O error.
    fn create(&self, id: &StoreId, meta: &StoreMeta) -> Result<(), OverlayError>;

    /// Delete a store and its entire on-disk layout.
    ///
    /// # Errors
    /// Returns [`OverlayError::StoreNotFound`] if `id` does not exist, or an
    /// I/O error.
    fn delete(&self, id: &StoreId) -> Result<(), OverlayError>;

    /// Load a store's metadata document.
    ///
    /// # Errors
    /// Returns [`OverlayError::StoreNotFound`] if `id` does not exist, or an
    /// I/O error.
    fn load_meta(&self, id: &StoreId) -> Result<StoreMeta, OverlayError>;

    /// Persist a store's metadata document atomically.
    ///
    /// # Errors
    /// Returns [`OverlayError::StoreNotFound`] if `id` does not exist, or an
    /// I/O error.
    fn save_meta(&self, id: &StoreId, meta: &StoreMeta) -> Result<(), OverlayError>;

    /// Load a store's track manifest. Returns an empty manifest, rather
    /// than failing, when none has ever been saved.
    ///
    /// # Errors
    /// Returns [`OverlayError::StoreNotFound`] if `id` does not exist, or an
    /// I/O error reading an existing manifest.
    fn load_track(&self, id: &StoreId) -> Result<TrackManifest, OverlayError>;

    /// Persist a store's track manifest atomically.
    ///
    /// # Errors
    /// Returns [`OverlayError::StoreNotFound`] if `id` does not exist, or an
    /// I/O error.
    fn save_track(&self, id: &StoreId, manifest: &TrackManifest) -> Result<(), OverlayError>;

    /// The absolute path of a store's overlay subtree. Not guaranteed to
    /// exist yet.
    ///
    /// # Errors
    /// Returns [`OverlayError::InvalidIdentifier`] if `id` fails validation
    /// (it should not, for an already-constructed `StoreId`, but the
    /// interface stays fallible for callers building paths from raw
    /// strings).
    fn overlay_root(&self, id: &StoreId) -> Result<PathBuf, OverlayError>;
}

/// Production [`StoreRepository`], backed by an [`Fs`] implementation
/// rooted at a single stores directory.
#[derive(Clone, Debug)]
pub struct FsStoreRepository<F> {
    fsys: F,
    root: PathBuf,
}

impl<F: Fs> FsStoreRepository<F> {
    /// Construct a store repository rooted at `root`.
    #[must_use]
    pub fn new(fsys: F, root: PathBuf) -> Self {
        Self { fsys, root }
    }

    fn store_dir(&self, id: &StoreId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn meta_path(&self, id: &StoreId) -> PathBuf {
        self.store_dir(id).join("meta")
    }

    fn track_path(&self, id: &StoreId) -> PathBuf {
        self.store_dir(id).join("track")
    }

    fn require_exists(&self, id: &StoreId) -> Result<(), OverlayError> {
        if self.exists(id) {
            Ok(())
        } else {
            Err(OverlayError::StoreNotFound {
                store_id: id.clone(),
            })
        }
    }
}

impl<F: Fs> StoreRepository for FsStoreRepository<F> {
    fn list(&self) -> Result<Vec<StoreId>, OverlayError> {
        let mut ids = Vec::new();
        for name in self.fsys.list_dir(&self.root).unwrap_or_default() {
            if let Ok(id) = StoreId::new(&name) {
                if self.exists(&id) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn exists(&self, id: &StoreId) -> bool {
        self.fsys.exists(&self.meta_path(id))
    }

    fn create(&self, id: &StoreId, meta: &StoreMeta) -> Result<(), OverlayError> {
        if self.exists(id) {
            return Err(OverlayError::StoreExists {
                store_id: id.clone(),
            });
        }
        let dir = self.store_dir(id);
        self.fsys.mkdir_all(&dir.join("overlay"))?;
        write_doc(&self.fsys, &self.meta_path(id), meta)?;
        write_doc(&self.fsys, &self.track_path(id), &TrackManifest::empty())?;
        Ok(())
    }

    fn delete(&self, id: &StoreId) -> Result<(), OverlayError> {
        self.require_exists(id)?;
        self.fsys.remove_all(&self.store_dir(id))?;
        Ok(())
    }

    fn load_meta(&self, id: &StoreId) -> Result<StoreMeta, OverlayError> {
        self.require_exists(id)?;
        Ok(read_doc(&self.fsys, &self.meta_path(id))?)
    }

    fn save_meta(&self, id: &StoreId, meta: &StoreMeta) -> Result<(), OverlayError> {
        self.require_exists(id)?;
        write_doc(&self.fsys, &self.meta_path(id), meta)?;
        Ok(())
    }

    fn load_track(&self, id: &StoreId) -> Result<TrackManifest, OverlayError> {
        self.require_exists(id)?;
        let path = self.track_path(id);
        if !self.fsys.exists(&path) {
            return Ok(TrackManifest::empty());
        }
        Ok(read_doc(&self.fsys, &path)?)
    }

    fn save_track(&self, id: &StoreId, manifest: &TrackManifest) -> Result<(), OverlayError> {
        self.require_exists(id)?;
        write_doc(&self.fsys, &self.track_path(id), manifest)?;
        Ok(())
    }

    fn overlay_root(&self, id: &StoreId) -> Result<PathBuf, OverlayError> {
        Ok(self.store_dir(id).join("overlay"))
    }
}

/// Recursively walk `dir` (relative to `overlay_root`) and return every
/// file found beneath it, as paths relative to `overlay_root`. Used by the
/// planner (§4.4 step 3) to expand a tracked directory entry into its
/// constituent files.
///
/// # Errors
/// Returns an error on I/O failure.
pub fn list_files_under<F: Fs>(
    fsys: &F,
    overlay_root: &Path,
    rel_dir: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk(fsys, overlay_root, rel_dir, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk<F: Fs>(
    fsys: &F,
    overlay_root: &Path,
    rel: &Path,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    let abs = overlay_root.join(rel);
    match fsys.lstat(&abs)? {
        Some(crate::fs::FileKind::Dir) => {
            for name in fsys.list_dir(&abs)? {
                walk(fsys, overlay_root, &rel.join(&name), out)?;
            }
            Ok(())
        }
        Some(_) => {
            out.push(rel.to_path_buf());
            Ok(())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::model::store::{TrackEntry, TrackKind};

    fn repo() -> FsStoreRepository<MemFs> {
        FsStoreRepository::new(MemFs::new(), PathBuf::from("/stores"))
    }

    fn meta() -> StoreMeta {
        StoreMeta::new("dotfiles", "2024-01-01T00:00:00Z")
    }

    #[test]
    fn create_then_exists() {
        let repo = repo();
        let id = StoreId::new("dotfiles").unwrap();
        assert!(!repo.exists(&id));
        repo.create(&id, &meta()).unwrap();
        assert!(repo.exists(&id));
    }

    #[test]
    fn create_twice_fails() {
        let repo = repo();
        let id = StoreId::new("dotfiles").unwrap();
        repo.create(&id, &meta()).unwrap();
        assert!(matches!(
            repo.create(&id, &meta()),
            Err(OverlayError::StoreExists { .. })
        ));
    }

    #[test]
    fn load_track_of_fresh_store_is_empty() {
        let repo = repo();
        let id = StoreId::new("dotfiles").unwrap();
        repo.create(&id, &meta()).unwrap();
        assert!(repo.load_track(&id).unwrap().entries.is_empty());
    }

    #[test]
    fn save_and_load_track_roundtrips() {
        let repo = repo();
        let id = StoreId::new("dotfiles").unwrap();
        repo.create(&id, &meta()).unwrap();
        let mut manifest = TrackManifest::empty();
        manifest
            .push(TrackEntry {
                path: crate::model::ids::RelPath::new("Makefile").unwrap(),
                kind: TrackKind::File,
            })
            .unwrap();
        repo.save_track(&id, &manifest).unwrap();
        assert_eq!(repo.load_track(&id).unwrap(), manifest);
    }

    #[test]
    fn delete_removes_entire_store() {
        let repo = repo();
        let id = StoreId::new("dotfiles").unwrap();
        repo.create(&id, &meta()).unwrap();
        repo.delete(&id).unwrap();
        assert!(!repo.exists(&id));
        assert!(matches!(
            repo.delete(&id),
            Err(OverlayError::StoreNotFound { .. })
        ));
    }

    #[test]
    fn list_returns_every_created_store() {
        let repo = repo();
        repo.create(&StoreId::new("a").unwrap(), &meta()).unwrap();
        repo.create(&StoreId::new("b").unwrap(), &meta()).unwrap();
        let ids: Vec<String> = repo.list().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn list_files_under_expands_directory_recursively() {
        let fsys = MemFs::new();
        fsys.mkdir_all(Path::new("/stores/s/overlay/scripts/utils"))
            .unwrap();
        fsys.atomic_write(
            Path::new("/stores/s/overlay/scripts/init.sh"),
            b"x",
            0o644,
        )
        .unwrap();
        fsys.atomic_write(
            Path::new("/stores/s/overlay/scripts/utils/helper.sh"),
            b"x",
            0o644,
        )
        .unwrap();
        let files = list_files_under(
            &fsys,
            Path::new("/stores/s/overlay"),
            Path::new("scripts"),
        )
        .unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("scripts/init.sh"),
                PathBuf::from("scripts/utils/helper.sh"),
            ]
        );
    }
}
