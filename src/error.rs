// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for medic
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors outside of the lock file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A declared patch file does not exist under its package root
    #[error("Cannot find patch file \"{file}\" in \"{}\"", root.display())]
    PatchFileNotFound { file: String, root: PathBuf },

    /// Every strategy of the apply cascade failed
    #[error("Cannot apply patch {}", path.display())]
    PatchApplicationFailed { path: PathBuf },

    /// A package event carried an operation that does not map to a package
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A package's `medic` block is not shaped as expected
    #[error("Invalid patch declaration in package {package}: {reason}")]
    InvalidDeclaration { package: String, reason: String },

    /// A target package is not present in the local repository
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// Uninstalling or installing a package for re-patching failed
    #[error("Reinstall failed: {0}")]
    Reinstall(String),

    /// The lock file exists but cannot be read as patch state
    #[error("Failed to parse lock file {}: {source}", path.display())]
    LockParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias using medic's Error type
pub type Result<T> = std::result::Result<T, Error>;
