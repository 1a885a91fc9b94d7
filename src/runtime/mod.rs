//! Runtime abstraction for system operations.
//!
//! Every filesystem and environment access made by the engine goes through the
//! [`Runtime`] trait, so tests can inject failures (a rename that fails halfway
//! through a registry write, a permission error while restoring a protected file)
//! without touching a real disk.
//!
//! # Structure
//!
//! - `path` - Lexical path helpers (normalize, is_path_under, archive entry paths)
//! - `atomic` - Temp-file-then-rename document writes
//! - `env` - Well-known directories (home, config, current)
//! - `fs` - File system operations (read, write, copy, walk, metadata)
//! - `user` - User interaction (confirmation prompts)

mod atomic;
mod env;
mod fs;
pub mod path;
mod user;

use anyhow::Result;
use async_trait::async_trait;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

pub use atomic::{temp_path_for, write_atomic};
pub use path::{entry_path, escapes_root, is_path_under, normalize_path};

/// A readable, seekable byte source. Zip archives need random access to their
/// central directory, so plain `Read` is not enough.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;

    /// List the immediate children of a directory, sorted by file name.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// List every regular file below `root` (recursively), sorted by path.
    /// Symlinks are not followed.
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Modification time in whole seconds since the Unix epoch.
    fn modified_secs(&self, path: &Path) -> Result<u64>;

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>>;
    fn open_seekable(&self, path: &Path) -> Result<Box<dyn ReadSeek>>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;
    fn config_dir(&self) -> Option<PathBuf>;
    fn current_dir(&self) -> Result<PathBuf>;

    // User interaction
    /// Prompt user for confirmation. Returns true if user confirms (y/yes), false otherwise.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.read_impl(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.is_file_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        self.walk_files_impl(root)
    }

    fn modified_secs(&self, path: &Path) -> Result<u64> {
        self.modified_secs_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>> {
        self.open_impl(path)
    }

    fn open_seekable(&self, path: &Path) -> Result<Box<dyn ReadSeek>> {
        self.open_seekable_impl(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir_impl()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirm_impl(prompt)
    }
}
