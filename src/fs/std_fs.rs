//! Production [`Fs`] implementation backed by `std::fs` and `tempfile`.

use std::fs;
use std::io;
use std::path::Path;

use super::{FileKind, Fs};

/// The real filesystem. Zero-sized: all state lives on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFs;

impl StdFs {
    /// Construct a new handle onto the real filesystem.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
        fs::create_dir_all(dst)?;
        if let Ok(meta) = fs::metadata(src) {
            let _ = fs::set_permissions(dst, meta.permissions());
        }
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let src_child = entry.path();
            let dst_child = dst.join(entry.file_name());
            if file_type.is_dir() {
                Self::copy_dir_recursive(&src_child, &dst_child)?;
            } else {
                fs::copy(&src_child, &dst_child)?;
                let f = fs::File::open(&dst_child)?;
                f.sync_all()?;
            }
        }
        Ok(())
    }
}

impl Fs for StdFs {
    fn lstat(&self, path: &Path) -> io::Result<Option<FileKind>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => {
                let kind = if meta.file_type().is_symlink() {
                    FileKind::Symlink
                } else if meta.is_dir() {
                    FileKind::Dir
                } else {
                    FileKind::File
                };
                Ok(Some(kind))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn readlink(&self, path: &Path) -> io::Result<std::path::PathBuf> {
        fs::read_link(path)
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o755));
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.is_dir() && !meta.file_type().is_symlink() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to remove directory {} as a file", path.display()),
            ));
        }
        fs::remove_file(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if meta.is_dir() && !meta.file_type().is_symlink() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(windows)]
        {
            if target.is_dir() {
                std::os::windows::fs::symlink_dir(target, link)
            } else {
                std::os::windows::fs::symlink_file(target, link)
            }
        }
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let src_meta = fs::metadata(src)?;
        let dst_kind = self.lstat(dst)?;
        let src_is_dir = src_meta.is_dir();
        let kind_mismatch = match dst_kind {
            Some(FileKind::Dir) => !src_is_dir,
            Some(FileKind::File | FileKind::Symlink) => src_is_dir,
            None => false,
        };
        if dst_kind.is_some() && kind_mismatch {
            self.remove_all(dst)?;
        }

        if src_is_dir {
            Self::copy_dir_recursive(src, dst)
        } else {
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(src, dst)?;
            let meta = fs::metadata(src)?;
            let _ = fs::set_permissions(dst, meta.permissions());
            let f = fs::File::open(dst)?;
            f.sync_all()
        }
    }

    fn atomic_write(&self, path: &Path, bytes: &[u8], perm: u32) -> io::Result<()> {
        use std::io::Write;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".monodev-tmp-")
            .tempfile_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(perm))?;
        }
        #[cfg(not(unix))]
        {
            let _ = perm;
        }

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        match fs::read_dir(path) {
            Ok(entries) => entries
                .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        let fsys = StdFs::new();
        fsys.atomic_write(&file, b"hello", 0o644).unwrap();
        assert_eq!(fsys.read_file(&file).unwrap(), b"hello");
    }

    #[test]
    fn atomic_write_leaves_no_temp_files_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        let fsys = StdFs::new();
        fsys.atomic_write(&file, b"data", 0o644).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn lstat_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.txt");
        fs::write(&target, b"x").unwrap();
        let link = dir.path().join("link");
        let fsys = StdFs::new();
        fsys.symlink(&target, &link).unwrap();
        assert_eq!(fsys.lstat(&link).unwrap(), Some(FileKind::Symlink));
        assert_eq!(fsys.lstat(&target).unwrap(), Some(FileKind::File));
    }

    #[test]
    fn copy_replaces_mismatched_kind() {
        let dir = tempfile::tempdir().unwrap();
        let fsys = StdFs::new();
        let src_dir = dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("a.txt"), b"a").unwrap();

        let dst = dir.path().join("dst");
        fs::write(&dst, b"was a file").unwrap();

        fsys.copy(&src_dir, &dst).unwrap();
        assert!(dst.is_dir());
        assert_eq!(fs::read(dst.join("a.txt")).unwrap(), b"a");
    }
}
