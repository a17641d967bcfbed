//! Workspace identity (§4.8, component C8) and the repository identity
//! collaborator it's built on (§6, consumed).
//!
//! `workspace_id(fingerprint, rel_path) = H(fingerprint || "/" || rel_path)`.
//! The engine never computes a [`Fingerprint`] itself from a live
//! repository — it treats whatever the [`RepoIdentity`] collaborator hands
//! it as authoritative — but it does derive a [`WorkspaceIdent`] from one.

use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

use crate::model::ids::{Fingerprint, WorkspaceIdent};

/// How many hex characters of the SHA-256 digest become the workspace id.
/// 16 hex chars (64 bits) is ample collision resistance for a
/// workspace-scoped filename while staying legible in a directory listing.
const SHORT_HASH_LEN: usize = 16;

/// Derive a stable workspace identifier from a repository fingerprint and a
/// path relative to the repository root.
///
/// Two calls with the same `fingerprint` and `rel_path` always produce the
/// same [`WorkspaceIdent`], across processes, hosts, and runs.
#[must_use]
pub fn workspace_ident(fingerprint: &Fingerprint, rel_path: &str) -> WorkspaceIdent {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_str().as_bytes());
    hasher.update(b"/");
    hasher.update(rel_path.as_bytes());
    let digest = hex::encode(hasher.finalize());
    WorkspaceIdent::from_hash(digest[..SHORT_HASH_LEN].to_owned())
}

/// Repository identity collaborator (§6, consumed): discovers a
/// repository's root from a working directory, derives its stable
/// fingerprint, and expresses an absolute path relative to that root.
pub trait RepoIdentity {
    /// Find the repository root containing `cwd`.
    ///
    /// # Errors
    /// Returns an error if no repository can be found.
    fn discover(&self, cwd: &Path) -> std::io::Result<PathBuf>;

    /// Derive the stable fingerprint for a repository rooted at `root`.
    ///
    /// # Errors
    /// Returns an error if the fingerprint cannot be determined.
    fn fingerprint(&self, root: &Path) -> std::io::Result<Fingerprint>;

    /// Express `abs` as a path relative to `root`, using the host path
    /// separator.
    ///
    /// # Errors
    /// Returns an error if `abs` is not inside `root`.
    fn rel_path(&self, root: &Path, abs: &Path) -> std::io::Result<String>;
}

/// Production [`RepoIdentity`]: shells out to `git`. `fingerprint` combines
/// the canonicalized root with the `origin` remote URL (or the literal
/// `"unknown"` if there is none), matching §4.8's
/// `H(absolute_repo_path || "|" || remote_url_or_"unknown")`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GitRepoIdentity;

impl GitRepoIdentity {
    /// Construct the production git-backed identity collaborator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn remote_url(root: &Path) -> String {
        Command::new("git")
            .args(["remote", "get-url", "origin"])
            .current_dir(root)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_owned())
    }
}

impl RepoIdentity for GitRepoIdentity {
    fn discover(&self, cwd: &Path) -> std::io::Result<PathBuf> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(cwd)
            .output()?;
        if !output.status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no git repository found above {}", cwd.display()),
            ));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        Ok(PathBuf::from(root))
    }

    fn fingerprint(&self, root: &Path) -> std::io::Result<Fingerprint> {
        let abs = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let remote = Self::remote_url(root);
        let mut hasher = Sha256::new();
        hasher.update(abs.to_string_lossy().as_bytes());
        hasher.update(b"|");
        hasher.update(remote.as_bytes());
        Ok(Fingerprint::new(hex::encode(hasher.finalize())))
    }

    fn rel_path(&self, root: &Path, abs: &Path) -> std::io::Result<String> {
        let root_canon = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let abs_canon = abs.canonicalize().unwrap_or_else(|_| abs.to_path_buf());
        let rel = abs_canon.strip_prefix(&root_canon).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not inside {}", abs.display(), root.display()),
            )
        })?;
        Ok(rel.to_string_lossy().into_owned())
    }
}

/// Test double required by §6: a fixed root and fingerprint, so workspace
/// identity tests don't need a real git repository.
#[derive(Clone, Debug)]
pub struct FakeRepoIdentity {
    /// The root this fake always reports from `discover`.
    pub root: PathBuf,
    /// The fingerprint this fake always reports from `fingerprint`.
    pub fingerprint: Fingerprint,
}

impl FakeRepoIdentity {
    /// Construct a fake identity collaborator with a fixed root and
    /// fingerprint.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            fingerprint: Fingerprint::new(fingerprint.into()),
        }
    }
}

impl RepoIdentity for FakeRepoIdentity {
    fn discover(&self, _cwd: &Path) -> std::io::Result<PathBuf> {
        Ok(self.root.clone())
    }

    fn fingerprint(&self, _root: &Path) -> std::io::Result<Fingerprint> {
        Ok(self.fingerprint.clone())
    }

    fn rel_path(&self, root: &Path, abs: &Path) -> std::io::Result<String> {
        let rel = abs.strip_prefix(root).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not inside {}", abs.display(), root.display()),
            )
        })?;
        Ok(rel.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_ident_is_deterministic() {
        let fp = Fingerprint::new("repo-fp");
        let a = workspace_ident(&fp, "ws/alice");
        let b = workspace_ident(&fp, "ws/alice");
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn workspace_ident_differs_by_rel_path() {
        let fp = Fingerprint::new("repo-fp");
        let a = workspace_ident(&fp, "ws/alice");
        let b = workspace_ident(&fp, "ws/bob");
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn workspace_ident_differs_by_fingerprint() {
        let a = workspace_ident(&Fingerprint::new("fp1"), "ws/alice");
        let b = workspace_ident(&Fingerprint::new("fp2"), "ws/alice");
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn fake_repo_identity_rel_path() {
        let fake = FakeRepoIdentity::new("/repo", "repo-fp");
        let rel = fake.rel_path(Path::new("/repo"), Path::new("/repo/ws/alice"));
        assert_eq!(rel.unwrap(), "ws/alice");
    }

    #[test]
    fn fake_repo_identity_root_rel_path_is_empty() {
        let fake = FakeRepoIdentity::new("/repo", "repo-fp");
        let rel = fake.rel_path(Path::new("/repo"), Path::new("/repo"));
        assert_eq!(rel.unwrap(), "");
    }
}
