// src/lib.rs

//! medic: patches for installed dependencies
//!
//! Packages declare patches for other packages in their metadata. medic
//! gathers those declarations, applies each patch to the installed copy of
//! its target and remembers what it applied in `medic.lock`, so that:
//!
//! - repeated installs do not re-apply anything
//! - a changed patch reinstalls its target and re-applies the whole set
//! - a patch that cannot be applied stops the install
//!
//! # Architecture
//!
//! - [`patch`]: descriptors, the apply cascade and process execution
//! - [`registry`]: authoritative patch set across contributing packages
//! - [`lock`]: persisted install state
//! - [`orchestrator`]: the run driver
//! - [`repository`] and [`installer`]: the package manager side

pub mod config;
mod error;
pub mod installer;
pub mod lock;
pub mod manifest;
pub mod orchestrator;
pub mod patch;
pub mod registry;
pub mod repository;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{PackageOperation, PatchOrchestrator, PatchState, RunReport};
