//! In-memory [`Fs`] test double.
//!
//! Every entry lives in a `BTreeMap` keyed by absolute path. No real disk
//! I/O happens, which makes tests for the planner, applier, and unapplier
//! fast and hermetic (§9 "capability sets ... an in-memory testing
//! implementation").

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{FileKind, Fs};

#[derive(Clone, Debug)]
enum Node {
    File { bytes: Vec<u8>, perm: u32 },
    Dir,
    Symlink { target: PathBuf },
}

/// An in-memory filesystem, rooted at whatever absolute paths callers use.
///
/// Directories must exist before a file or symlink can be created inside
/// them — just like the real filesystem — so tests that call
/// [`Fs::symlink`] or [`Fs::copy`] directly (rather than through the
/// applier, which calls [`Fs::mkdir_all`] first) need to create parent
/// directories themselves.
///
/// Cloning shares the same backing store (`Rc`, not a deep copy) — the same
/// way one real disk backs every [`super::StdFs`] handle in a process, a
/// test can construct one `MemFs` and hand clones of it to a store
/// repository, a state store, and a planner/applier call, all observing
/// the same files.
#[derive(Clone, Debug, Default)]
pub struct MemFs {
    nodes: Rc<RefCell<BTreeMap<PathBuf, Node>>>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

impl MemFs {
    /// Construct an empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_ancestors(&self, path: &Path) {
        let mut nodes = self.nodes.borrow_mut();
        let mut ancestors: Vec<&Path> = path.ancestors().skip(1).collect();
        ancestors.reverse();
        for ancestor in ancestors {
            nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir);
        }
    }

    /// Resolve symlinks (one level is enough for this engine's use) to find
    /// the effective kind of whatever is ultimately at `path`.
    fn resolve_kind(&self, path: &Path) -> Option<FileKind> {
        let nodes = self.nodes.borrow();
        match nodes.get(path)? {
            Node::File { .. } => Some(FileKind::File),
            Node::Dir => Some(FileKind::Dir),
            Node::Symlink { target } => {
                drop(nodes);
                self.resolve_kind(target)
            }
        }
    }

    fn resolve_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        let nodes = self.nodes.borrow();
        match nodes.get(path) {
            Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
            Some(Node::Symlink { target }) => {
                let target = target.clone();
                drop(nodes);
                self.resolve_bytes(&target)
            }
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}

impl Fs for MemFs {
    fn lstat(&self, path: &Path) -> io::Result<Option<FileKind>> {
        let nodes = self.nodes.borrow();
        Ok(match nodes.get(path) {
            Some(Node::File { .. }) => Some(FileKind::File),
            Some(Node::Dir) => Some(FileKind::Dir),
            Some(Node::Symlink { .. }) => Some(FileKind::Symlink),
            None => None,
        })
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        let nodes = self.nodes.borrow();
        match nodes.get(path) {
            Some(Node::Symlink { target }) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a symlink", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        let mut ancestors: Vec<&Path> = path.ancestors().collect();
        ancestors.reverse();
        let mut nodes = self.nodes.borrow_mut();
        for ancestor in ancestors {
            match nodes.get(ancestor) {
                Some(Node::Dir) | None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", ancestor.display()),
                    ));
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.borrow_mut();
        match nodes.get(path) {
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to remove directory {} as a file", path.display()),
            )),
            Some(_) => {
                nodes.remove(path);
                Ok(())
            }
            None => Err(not_found(path)),
        }
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.borrow_mut();
        if !nodes.contains_key(path) {
            return Ok(());
        }
        nodes.retain(|k, _| k != path && !k.starts_with(path));
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.borrow_mut();
        if nodes.contains_key(link) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", link.display()),
            ));
        }
        let Some(parent) = link.parent() else {
            return Err(not_found(link));
        };
        if !matches!(nodes.get(parent), Some(Node::Dir)) {
            return Err(not_found(parent));
        }
        nodes.insert(
            link.to_path_buf(),
            Node::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let src_kind = self.resolve_kind(src).ok_or_else(|| not_found(src))?;
        let dst_kind = self.lstat(dst)?;
        let mismatch = match (dst_kind, src_kind) {
            (Some(FileKind::Dir), FileKind::Dir) => false,
            (Some(FileKind::Dir), _) | (Some(_), FileKind::Dir) => true,
            _ => false,
        };
        if dst_kind.is_some() && mismatch {
            self.remove_all(dst)?;
        }

        if src_kind == FileKind::Dir {
            self.mkdir_all(dst)?;
            let children: Vec<PathBuf> = {
                let nodes = self.nodes.borrow();
                nodes
                    .keys()
                    .filter(|k| k.parent() == Some(src))
                    .cloned()
                    .collect()
            };
            for child in children {
                let name = child.file_name().expect("child has a name");
                self.copy(&child, &dst.join(name))?;
            }
            Ok(())
        } else {
            self.ensure_ancestors(dst);
            let bytes = self.resolve_bytes(src)?;
            let perm = {
                let nodes = self.nodes.borrow();
                match nodes.get(src) {
                    Some(Node::File { perm, .. }) => *perm,
                    _ => 0o644,
                }
            };
            self.nodes
                .borrow_mut()
                .insert(dst.to_path_buf(), Node::File { bytes, perm });
            Ok(())
        }
    }

    fn atomic_write(&self, path: &Path, bytes: &[u8], perm: u32) -> io::Result<()> {
        self.ensure_ancestors(path);
        self.nodes.borrow_mut().insert(
            path.to_path_buf(),
            Node::File {
                bytes: bytes.to_vec(),
                perm,
            },
        );
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let nodes = self.nodes.borrow();
        match nodes.get(path) {
            Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            Some(Node::Symlink { target }) => {
                let target = target.clone();
                drop(nodes);
                self.read_file(&target)
            }
            None => Err(not_found(path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.borrow().contains_key(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let nodes = self.nodes.borrow();
        match nodes.get(path) {
            Some(Node::Dir) => Ok(nodes
                .keys()
                .filter(|k| k.parent() == Some(path))
                .filter_map(|k| k.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", path.display()),
            )),
            None => Ok(Vec::new()),
        }
    }
}
