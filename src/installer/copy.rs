//! Recursive copy helpers used by the installer and the local fetcher.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

/// Deepest nesting a copied directory tree may have.
pub const MAX_COPY_DEPTH: usize = 32;

/// Copy a directory tree, keeping its nested structure. Returns the number of files copied.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<u64> {
    copy_dir_filtered(src, dst, |_| true)
}

/// Copy a directory tree, descending only into entries accepted by `keep`.
///
/// Symlinks are followed; a loop surfaces as an error from the walker.
pub fn copy_dir_filtered<P>(src: &Path, dst: &Path, mut keep: P) -> io::Result<u64>
where
    P: FnMut(&DirEntry) -> bool,
{
    if !fs::metadata(src)?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", src.display()),
        ));
    }
    fs::create_dir_all(dst)?;

    let walker = WalkDir::new(src)
        .min_depth(1)
        .max_depth(MAX_COPY_DEPTH + 1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| keep(entry));

    let mut copied = 0;
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.depth() > MAX_COPY_DEPTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} exceeds maximum copy depth of {MAX_COPY_DEPTH}",
                    entry.path().display()
                ),
            ));
        }
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy a single file, creating parent directories as needed.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)
}

#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
