//! Unified error type for the overlay engine (§6 "Error codes", §7 "Error
//! handling design").
//!
//! Every public entry point returns `Result<_, OverlayError>`. Variants
//! correspond one-to-one with the error codes in §6; messages are written to
//! be actionable on their own, without requiring the caller to inspect a
//! wrapped cause.

use std::fmt;

use crate::model::ids::{RelPath, StoreId, ValidationError};

/// Unified error type for overlay engine operations.
#[derive(Debug)]
pub enum OverlayError {
    /// The store or workspace roots have not been set up.
    NotInitialized {
        /// Human-readable description of what is missing.
        detail: String,
    },
    /// The requested store does not exist.
    StoreNotFound {
        /// The store id that was not found.
        store_id: StoreId,
    },
    /// A store with this id already exists.
    StoreExists {
        /// The store id that already exists.
        store_id: StoreId,
    },
    /// No ledger exists for the requested workspace.
    WorkspaceNotFound {
        /// The workspace identifier (see [`crate::model::ids::WorkspaceIdent`]).
        workspace_id: String,
    },
    /// A relative path failed [`crate::fs::validate_rel_path`].
    InvalidPath {
        /// The offending path, as given.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A store id or other identifier failed [`crate::fs::validate_identifier`].
    InvalidIdentifier {
        /// The offending identifier, as given.
        identifier: String,
        /// Why it was rejected.
        reason: String,
    },
    /// One or more desired paths collide with an unowned file already on
    /// disk (§4.4 step 5).
    Conflict {
        /// Every conflicting path, with its existing and would-be owner.
        conflicts: Vec<ConflictDetail>,
    },
    /// A copy-mode file's content no longer matches the checksum recorded in
    /// the ledger (§4.4 step 6, §4.6 step 3). Never blocks an operation on
    /// its own — surfaced for the caller's awareness.
    Drift {
        /// The workspace-relative path that drifted.
        path: RelPath,
        /// The checksum recorded in the ledger.
        expected_hash: String,
        /// The checksum recomputed from the file currently on disk.
        actual_hash: String,
    },
    /// `unapply` was requested for a workspace with no applied overlay.
    NotApplied {
        /// The workspace identifier.
        workspace_id: String,
    },
    /// An I/O error occurred during a filesystem mutation.
    Io(std::io::Error),
}

/// One conflicting path inside [`OverlayError::Conflict`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictDetail {
    /// The workspace-relative path in conflict.
    pub path: RelPath,
    /// The store that currently owns the path per the ledger, if any.
    pub existing_owner: Option<StoreId>,
    /// The store that would own the path after the pending plan applies.
    pub new_owner: StoreId,
}

impl fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.existing_owner {
            Some(owner) => write!(
                f,
                "{}: owned by '{owner}' in the ledger, but '{}' would take it over",
                self.path, self.new_owner
            ),
            None => write!(
                f,
                "{}: an unowned file already exists here; '{}' wants to place a file at the same path",
                self.path, self.new_owner
            ),
        }
    }
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized { detail } => {
                write!(
                    f,
                    "not initialized: {detail}\n  To fix: create the stores/workspaces roots before calling into the engine."
                )
            }
            Self::StoreNotFound { store_id } => {
                write!(
                    f,
                    "store '{store_id}' not found.\n  To fix: check available stores, or create it first."
                )
            }
            Self::StoreExists { store_id } => {
                write!(
                    f,
                    "store '{store_id}' already exists.\n  To fix: use a different store id, or delete the existing store first."
                )
            }
            Self::WorkspaceNotFound { workspace_id } => {
                write!(
                    f,
                    "no ledger for workspace '{workspace_id}'.\n  To fix: nothing is applied here; there is nothing to unapply."
                )
            }
            Self::InvalidPath { path, reason } => {
                write!(
                    f,
                    "invalid relative path '{path}': {reason}\n  Relative paths must be non-empty, non-absolute, and contain no '..' component."
                )
            }
            Self::InvalidIdentifier { identifier, reason } => {
                write!(
                    f,
                    "invalid identifier '{identifier}': {reason}\n  Identifiers must be non-empty, contain no path separator, and not be '.' or '..'."
                )
            }
            Self::Conflict { conflicts } => {
                write!(f, "{} unowned path(s) block this plan:", conflicts.len())?;
                for c in conflicts {
                    write!(f, "\n  - {c}")?;
                }
                write!(
                    f,
                    "\n  To fix: move the conflicting file(s) aside, or pass force=true to overwrite them."
                )
            }
            Self::Drift {
                path,
                expected_hash,
                actual_hash,
            } => {
                write!(
                    f,
                    "drift at '{path}': expected checksum {expected_hash}, found {actual_hash}.\n  The file was modified outside the engine since it was last applied."
                )
            }
            Self::NotApplied { workspace_id } => {
                write!(
                    f,
                    "workspace '{workspace_id}' has nothing applied.\n  To fix: nothing to unapply here."
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

impl std::error::Error for OverlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ValidationError> for OverlayError {
    fn from(err: ValidationError) -> Self {
        match err.kind {
            crate::model::ids::ErrorKind::StoreId => Self::InvalidIdentifier {
                identifier: err.value,
                reason: err.reason,
            },
            crate::model::ids::ErrorKind::RelPath => Self::InvalidPath {
                path: err.value,
                reason: err.reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_store_not_found() {
        let err = OverlayError::StoreNotFound {
            store_id: StoreId::new("dotfiles").unwrap(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("dotfiles"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn display_conflict_lists_every_path() {
        let err = OverlayError::Conflict {
            conflicts: vec![ConflictDetail {
                path: RelPath::new("Makefile").unwrap(),
                existing_owner: None,
                new_owner: StoreId::new("dotfiles").unwrap(),
            }],
        };
        let msg = format!("{err}");
        assert!(msg.contains("Makefile"));
        assert!(msg.contains("force=true"));
    }

    #[test]
    fn validation_error_maps_to_invalid_identifier() {
        let verr = StoreId::new("a/b").unwrap_err();
        let err: OverlayError = verr.into();
        assert!(matches!(err, OverlayError::InvalidIdentifier { .. }));
    }
}
