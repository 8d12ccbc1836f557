// src/patch/mod.rs

//! Patch descriptors and application
//!
//! A [`PatchDescriptor`] identifies one declared patch: which package it
//! modifies, where its file lives relative to the package that declared it,
//! and two digests:
//!
//! - `id`: derived from the description and target, stable across content edits
//! - `hash`: derived from the file bytes, used only to notice content changes
//!
//! Application itself lives in [`applier`], process execution in [`command`].

pub mod applier;
pub mod command;

pub use applier::{ApplyOutcome, PatchApplier, PatchTool, STRIP_LEVELS};
pub use command::{CommandRunner, ProcessCommand, SystemRunner, Verbosity};

use crate::error::{Error, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One declared patch, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDescriptor {
    pub target_package: String,
    /// Patch path relative to the contributing package's install root
    pub source: String,
    pub source_package: String,
    pub description: String,
    pub id: String,
    pub hash: String,
}

impl PatchDescriptor {
    /// Build a descriptor, hashing the patch file found under `source_root`
    pub fn create(
        source: &str,
        target_package: &str,
        description: &str,
        source_package: &str,
        source_root: &Path,
    ) -> Result<Self> {
        let path = resolve_patch_file(source, source_root)?;
        let hash = hash_file(&path)?;

        debug!(
            "Hashed patch {} for {} from {}: {}",
            source, target_package, source_package, hash
        );

        Ok(Self {
            target_package: target_package.to_string(),
            source: source.to_string(),
            source_package: source_package.to_string(),
            description: description.to_string(),
            id: patch_id(description, target_package),
            hash,
        })
    }

    /// Locate the patch file again under `source_root`, e.g. right before applying it
    pub fn resolve(&self, source_root: &Path) -> Result<PathBuf> {
        resolve_patch_file(&self.source, source_root)
    }
}

/// Identity of a logical patch: MD5 hex of the description followed by the target name
pub fn patch_id(description: &str, target_package: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(description.as_bytes());
    hasher.update(target_package.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// MD5 hex of a file's full contents
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn resolve_patch_file(source: &str, source_root: &Path) -> Result<PathBuf> {
    let not_found = || Error::PatchFileNotFound {
        file: source.to_string(),
        root: source_root.to_path_buf(),
    };

    let path = source_root.join(source).canonicalize().map_err(|_| not_found())?;
    if !path.is_file() {
        return Err(not_found());
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_patch(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_create_descriptor() {
        let dir = TempDir::new().unwrap();
        write_patch(&dir, "fixes/issue1.patch", "--- a/x\n+++ b/x\n");

        let patch = PatchDescriptor::create(
            "fixes/issue1.patch",
            "bar/baz",
            "fix issue 1",
            "lib/foo",
            dir.path(),
        )
        .unwrap();

        assert_eq!(patch.target_package, "bar/baz");
        assert_eq!(patch.source, "fixes/issue1.patch");
        assert_eq!(patch.source_package, "lib/foo");
        assert_eq!(patch.id, patch_id("fix issue 1", "bar/baz"));
        assert_eq!(patch.hash, "645304fd3c8c6a5b5bb4fdb95d7c42a1");
    }

    #[test]
    fn test_identity_matches_lock_file_format() {
        assert_eq!(patch_id("fix issue 1", "bar/baz"), "cc5b05d82086c93c1fc4df208c6f3663");
    }

    #[test]
    fn test_identity_ignores_content() {
        let dir = TempDir::new().unwrap();
        write_patch(&dir, "a.patch", "one");
        let first = PatchDescriptor::create("a.patch", "t/t", "desc", "p/p", dir.path()).unwrap();

        write_patch(&dir, "a.patch", "two");
        let second = PatchDescriptor::create("a.patch", "t/t", "desc", "p/p", dir.path()).unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_identity_depends_on_description_and_target() {
        assert_ne!(patch_id("fix", "a/b"), patch_id("fix", "a/c"));
        assert_ne!(patch_id("fix 1", "a/b"), patch_id("fix 2", "a/b"));
        // Plain concatenation, so the split point does not matter
        assert_eq!(patch_id("fix a", "/b"), patch_id("fix ", "a/b"));
    }

    #[test]
    fn test_missing_patch_file() {
        let dir = TempDir::new().unwrap();
        let result = PatchDescriptor::create("nope.patch", "t/t", "desc", "p/p", dir.path());

        match result {
            Err(Error::PatchFileNotFound { file, root }) => {
                assert_eq!(file, "nope.patch");
                assert_eq!(root, dir.path());
            }
            other => panic!("expected PatchFileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_is_not_a_patch() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("patches")).unwrap();

        let result = PatchDescriptor::create("patches", "t/t", "desc", "p/p", dir.path());
        assert!(matches!(result, Err(Error::PatchFileNotFound { .. })));
    }

    #[test]
    fn test_resolve_after_file_removed() {
        let dir = TempDir::new().unwrap();
        write_patch(&dir, "a.patch", "content");
        let patch = PatchDescriptor::create("a.patch", "t/t", "desc", "p/p", dir.path()).unwrap();

        assert!(patch.resolve(dir.path()).unwrap().ends_with("a.patch"));

        std::fs::remove_file(dir.path().join("a.patch")).unwrap();
        assert!(matches!(
            patch.resolve(dir.path()),
            Err(Error::PatchFileNotFound { .. })
        ));
    }
}
