// src/config.rs

//! Runtime configuration

use crate::lock::LOCK_FILE;
use crate::patch::Verbosity;
use crate::repository::project::{INSTALLED_INDEX, ROOT_MANIFEST, VENDOR_DIR};
use std::path::{Path, PathBuf};

/// Where a run reads and writes its files, and how much it reports
///
/// Relative paths are resolved against `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    pub lock_file: PathBuf,
    pub manifest: PathBuf,
    pub installed_index: PathBuf,
    pub vendor_dir: PathBuf,
    pub verbosity: Verbosity,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.resolve(&self.lock_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest)
    }

    pub fn installed_index_path(&self) -> PathBuf {
        self.resolve(&self.installed_index)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            lock_file: PathBuf::from(LOCK_FILE),
            manifest: PathBuf::from(ROOT_MANIFEST),
            installed_index: PathBuf::from(INSTALLED_INDEX),
            vendor_dir: PathBuf::from(VENDOR_DIR),
            verbosity: Verbosity::default(),
        }
    }
}
