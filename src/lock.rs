// src/lock.rs

//! Installed patch state (`medic.lock`)
//!
//! Records, per target package, which patch ids are applied to the installed
//! copy and with which content hash. The file is rewritten in full after each
//! successful application so a crash leaves it matching what is on disk.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Default lock file name, relative to the project root
pub const LOCK_FILE: &str = "medic.lock";

/// target -> id -> content hash
pub type PatchHashes = BTreeMap<String, BTreeMap<String, String>>;

/// Patches believed applied, backed by a lock file
#[derive(Debug, Clone)]
pub struct InstallState {
    path: PathBuf,
    installed: PatchHashes,
}

impl InstallState {
    /// Load state from `path`; a missing file is an empty state
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let installed = match fs::read_to_string(&path) {
            Ok(content) => parse_lock(&path, &content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => PatchHashes::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Found {} reportedly installed patches in {}",
            installed.values().map(BTreeMap::len).sum::<usize>(),
            path.display()
        );

        Ok(Self { path, installed })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded content hash of patch `id` on `target`
    pub fn has(&self, target: &str, id: &str) -> Option<&str> {
        self.installed
            .get(target)
            .and_then(|patches| patches.get(id))
            .map(String::as_str)
    }

    /// Record a successfully applied patch and persist immediately
    pub fn record(&mut self, target: &str, id: &str, hash: &str) -> Result<()> {
        self.installed
            .entry(target.to_string())
            .or_default()
            .insert(id.to_string(), hash.to_string());
        self.save()
    }

    /// Forget everything recorded for `target`; returns whether anything was recorded
    pub fn clear(&mut self, target: &str) -> bool {
        self.installed.remove(target).is_some()
    }

    /// Remove entries rejected by `keep`, returning the removed `(target, id)` pairs
    pub fn prune<F>(&mut self, mut keep: F) -> Vec<(String, String)>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let mut removed = Vec::new();
        for (target, patches) in &mut self.installed {
            patches.retain(|id, _| {
                let kept = keep(target, id);
                if !kept {
                    removed.push((target.clone(), id.clone()));
                }
                kept
            });
        }
        self.installed.retain(|_, patches| !patches.is_empty());
        removed
    }

    /// Targets with at least one recorded patch
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.installed.keys().map(String::as_str)
    }

    pub fn entries(&self) -> &PatchHashes {
        &self.installed
    }

    /// Number of recorded patches across all targets
    pub fn len(&self) -> usize {
        self.installed.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    /// Write the full state to the lock file
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // Write to a sibling temp file first, then rename over the lock
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, &self.installed)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!("Saved {} installed patches to {}", self.len(), self.path.display());
        Ok(())
    }
}

fn parse_lock(path: &Path, content: &str) -> Result<PatchHashes> {
    if content.trim().is_empty() {
        return Ok(PatchHashes::new());
    }

    let parse_error = |source| Error::LockParse {
        path: path.to_path_buf(),
        source,
    };

    let value: Value = serde_json::from_str(content).map_err(parse_error)?;
    match value {
        // An empty state has historically been written as a JSON list
        Value::Array(items) if items.is_empty() => Ok(PatchHashes::new()),
        other => serde_json::from_value(other).map_err(parse_error),
    }
}
