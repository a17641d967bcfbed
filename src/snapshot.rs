//! Snapshot mover (§4.7, component C7) and remote-persistence configuration.
//!
//! Grounded on `Cellar::materialize`/`remove_keg` from the reference pack's
//! zerobrew example: an idempotent copy-to-destination keyed by identity,
//! with a symmetric removal. Here the identity is a [`StoreId`] rather than
//! a name/version pair, and the copy goes through [`Fs::copy`] rather than a
//! clonefile/hardlink/copy cascade, since this engine has no platform-specific
//! fast path to offer. Neither operation performs git or network I/O — the
//! external collaborator that owns repository push/pull drives that around
//! these calls.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;
use crate::fs::Fs;
use crate::hash::ContentHasher;
use crate::model::ids::StoreId;
use crate::store_repo::StoreRepository;

/// `.monodev/remote.json`: where a repository's stores are persisted for
/// sharing between clones (§6 "Remote config").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// The git remote name stores are persisted against.
    pub remote: String,
    /// The branch (or ref namespace) persisted snapshots live under.
    pub branch: String,
    /// When this config was last written, from the clock collaborator.
    pub updated_at: String,
}

impl RemoteConfig {
    /// The conventional defaults: `origin`, `monodev/persist`, timestamped
    /// with `now`.
    #[must_use]
    pub fn defaults(now: String) -> Self {
        Self {
            remote: "origin".to_owned(),
            branch: "monodev/persist".to_owned(),
            updated_at: now,
        }
    }
}

fn persisted_store_dir(persist_root: &std::path::Path, store_id: &StoreId) -> PathBuf {
    persist_root
        .join(".monodev")
        .join("persist")
        .join("stores")
        .join(store_id.as_str())
}

/// Copy a store's entire on-disk layout (`meta`, `track`, `overlay/`) from
/// the store repository into `<persist_root>/.monodev/persist/stores/<id>/`,
/// replacing any prior contents there.
///
/// # Errors
/// Returns [`OverlayError::StoreNotFound`] if `store_id` does not exist, or
/// an I/O error.
pub fn materialize<F: Fs, R: StoreRepository>(
    fsys: &F,
    store_repo: &R,
    store_id: &StoreId,
    persist_root: &std::path::Path,
) -> Result<(), OverlayError> {
    store_repo.load_meta(store_id)?;
    let overlay_root = store_repo.overlay_root(store_id)?;
    let store_dir = overlay_root
        .parent()
        .map_or_else(|| overlay_root.clone(), std::path::Path::to_path_buf);
    let dst = persisted_store_dir(persist_root, store_id);
    fsys.copy(&store_dir, &dst)?;
    Ok(())
}

/// Copy a persisted store's layout back into the store repository, replacing
/// any prior contents there. The reverse of [`materialize`].
///
/// # Errors
/// Returns [`OverlayError::StoreNotFound`] if nothing is persisted for
/// `store_id`, or an I/O error.
pub fn dematerialize<F: Fs, R: StoreRepository>(
    fsys: &F,
    persist_root: &std::path::Path,
    store_id: &StoreId,
    store_repo: &R,
) -> Result<(), OverlayError> {
    let src = persisted_store_dir(persist_root, store_id);
    if fsys.lstat(&src)?.is_none() {
        return Err(OverlayError::StoreNotFound {
            store_id: store_id.clone(),
        });
    }
    let overlay_root = store_repo.overlay_root(store_id)?;
    let store_dir = overlay_root
        .parent()
        .map_or_else(|| overlay_root.clone(), std::path::Path::to_path_buf);
    fsys.copy(&src, &store_dir)?;
    Ok(())
}

/// Enumerate the store ids present under `<persist_root>/.monodev/persist/stores/`.
///
/// # Errors
/// Returns an error on I/O failure.
pub fn list_persisted<F: Fs>(
    fsys: &F,
    persist_root: &std::path::Path,
) -> Result<Vec<StoreId>, OverlayError> {
    let dir = persist_root.join(".monodev").join("persist").join("stores");
    let mut ids = Vec::new();
    for name in fsys.list_dir(&dir).unwrap_or_default() {
        if let Ok(id) = StoreId::new(&name) {
            ids.push(id);
        }
    }
    ids.sort();
    Ok(ids)
}

/// Check that a store is persisted and that its metadata document matches
/// what's in the store repository, byte for byte. Deeper content
/// verification (per-file hashing of the overlay tree) is reserved for a
/// future version.
///
/// # Errors
/// Returns [`OverlayError::StoreNotFound`] if nothing is persisted for
/// `store_id`, or an I/O error.
pub fn verify<F: Fs, R: StoreRepository, H: ContentHasher>(
    fsys: &F,
    persist_root: &std::path::Path,
    store_id: &StoreId,
    store_repo: &R,
    hasher: &H,
) -> Result<bool, OverlayError> {
    let persisted_meta = persisted_store_dir(persist_root, store_id).join("meta");
    if fsys.lstat(&persisted_meta)?.is_none() {
        return Err(OverlayError::StoreNotFound {
            store_id: store_id.clone(),
        });
    }
    let live_meta = store_repo.overlay_root(store_id)?;
    let live_meta = live_meta
        .parent()
        .map_or_else(|| live_meta.clone(), std::path::Path::to_path_buf)
        .join("meta");

    let persisted_hash = hasher.hash_file(fsys, &persisted_meta)?;
    let live_hash = hasher.hash_file(fsys, &live_meta)?;
    Ok(persisted_hash == live_hash)
}
