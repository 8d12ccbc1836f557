// src/patch/applier.rs

//! Patch application cascade
//!
//! `git apply` is tried first at each strip level, guarded by a `--check` dry
//! run so a failed attempt never leaves a half-applied tree. If no level
//! checks out, the plain `patch` utility gets a turn at the same levels.
//!
//! A tool that cannot be started counts as a failed attempt, so a machine
//! without `git` still reaches the `patch` fallback.

use super::command::{CommandRunner, ProcessCommand};
use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Strip levels in the order they are attempted
///
/// Level 1 fits most VCS-generated patches, 0 is next likely, 2 is rare.
pub const STRIP_LEVELS: [u8; 3] = [1, 0, 2];

/// Tool that ended up applying a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTool {
    GitApply,
    Patch,
}

impl fmt::Display for PatchTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchTool::GitApply => write!(f, "git apply"),
            PatchTool::Patch => write!(f, "patch"),
        }
    }
}

/// The strategy that succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub tool: PatchTool,
    pub strip_level: u8,
}

/// Applies patch files to installed package directories
pub struct PatchApplier<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> PatchApplier<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Apply `patch_file` inside `target_dir`
    pub fn apply(&self, patch_file: &Path, target_dir: &Path) -> Result<ApplyOutcome> {
        if let Some(level) = self.try_git_apply(patch_file, target_dir) {
            return Ok(ApplyOutcome {
                tool: PatchTool::GitApply,
                strip_level: level,
            });
        }

        debug!("git apply could not apply {}, falling back to patch", patch_file.display());

        for level in STRIP_LEVELS {
            if self.attempt(&patch_command(patch_file, target_dir, level)) {
                return Ok(ApplyOutcome {
                    tool: PatchTool::Patch,
                    strip_level: level,
                });
            }
        }

        Err(Error::PatchApplicationFailed {
            path: patch_file.to_path_buf(),
        })
    }

    /// Returns the strip level git applied the patch at, if any
    fn try_git_apply(&self, patch_file: &Path, target_dir: &Path) -> Option<u8> {
        for level in STRIP_LEVELS {
            if self.attempt(&git_apply_command(patch_file, target_dir, level, true)) {
                // Only the first level that checks out gets a real attempt
                let applied = self.attempt(&git_apply_command(patch_file, target_dir, level, false));
                return applied.then_some(level);
            }
        }
        None
    }

    /// Run one step of the cascade; an error starting the tool is a failed step
    fn attempt(&self, command: &ProcessCommand) -> bool {
        match self.runner.run(command) {
            Ok(success) => success,
            Err(e) => {
                debug!("Could not run {}: {}", command.program, e);
                false
            }
        }
    }
}

/// `git apply` run inside the target with `GIT_DIR=.` so an enclosing repository is ignored
pub fn git_apply_command(patch_file: &Path, target_dir: &Path, level: u8, check: bool) -> ProcessCommand {
    let mut cmd = ProcessCommand::new("git")
        .arg("apply")
        .current_dir(target_dir)
        .env("GIT_DIR", ".");
    if check {
        cmd = cmd.arg("--check");
    }
    cmd.arg(format!("-p{}", level))
        .arg(patch_file.to_string_lossy())
}

/// `patch` fallback
///
/// `--no-backup-if-mismatch` smooths over platform line-ending differences.
/// `--batch` keeps patch from prompting for a file name when a level is wrong.
/// `--forward` makes a patch that looks already applied fail instead of being
/// reversed, which `--batch` alone would do.
pub fn patch_command(patch_file: &Path, target_dir: &Path, level: u8) -> ProcessCommand {
    ProcessCommand::new("patch")
        .arg(format!("-p{}", level))
        .arg("--no-backup-if-mismatch")
        .arg("--forward")
        .arg("--batch")
        .arg("-d")
        .arg(target_dir.to_string_lossy())
        .stdin_file(patch_file)
}
