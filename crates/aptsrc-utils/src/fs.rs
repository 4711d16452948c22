use std::{fs, path::Path};

use crate::error::{FileSystemError, FileSystemResult};

pub trait FileSystemProvider {
    /// Creates a directory structure if it doesn't exist.
    ///
    /// If the directory already exists, this function does nothing. If the path exists but is
    /// not a directory, this function returns an error.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Directory`] if the directory could not be created.
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Writes `contents` to `path`, creating the parent directory when missing.
    ///
    /// The file handle is opened, written and closed before this returns, so a caller
    /// writing several files never holds more than one of them open.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Directory`] if the parent directory could not be created.
    /// * [`FileSystemError::File`] if the file could not be written.
    fn write_file<P: AsRef<Path>>(&self, path: P, contents: &str) -> FileSystemResult<()>;

    /// Copies `from` over `to`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError::File`] if the copy fails.
    fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, from: P, to: Q) -> FileSystemResult<()>;
}

#[derive(Default, Clone)]
pub struct StandardFileSystemProvider;

impl FileSystemProvider for StandardFileSystemProvider {
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).map_err(|err| {
                FileSystemError::Directory {
                    path: path.to_path_buf(),
                    action: "create",
                    source: err,
                }
            })?;
        } else if !path.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn write_file<P: AsRef<Path>>(&self, path: P, contents: &str) -> FileSystemResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_dir_exists(parent)?;
        }

        fs::write(path, contents).map_err(|err| {
            FileSystemError::File {
                path: path.to_path_buf(),
                action: "write",
                source: err,
            }
        })
    }

    fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, from: P, to: Q) -> FileSystemResult<()> {
        let from = from.as_ref();
        fs::copy(from, to.as_ref()).map_err(|err| {
            FileSystemError::File {
                path: from.to_path_buf(),
                action: "copy",
                source: err,
            }
        })?;
        Ok(())
    }
}

/// Creates a directory structure if it doesn't exist.
///
/// See [`FileSystemProvider::ensure_dir_exists`] for detailed documentation.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.ensure_dir_exists(path)
}

/// Writes a whole file in one go.
///
/// See [`FileSystemProvider::write_file`] for detailed documentation.
pub fn write_file<P: AsRef<Path>>(path: P, contents: &str) -> FileSystemResult<()> {
    StandardFileSystemProvider.write_file(path, contents)
}

/// Copies one file over another.
///
/// See [`FileSystemProvider::copy_file`] for detailed documentation.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> FileSystemResult<()> {
    StandardFileSystemProvider.copy_file(from, to)
}
