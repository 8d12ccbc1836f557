// src/repository/mod.rs

//! Installed package lookup
//!
//! medic does not resolve or install packages itself. It reads what the
//! package manager installed through [`PackageRepository`], and triggers
//! reinstalls through [`crate::installer::Installer`].

pub mod project;

pub use project::ProjectRepository;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// An installed package, or the root project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Package {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Install location relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,

    /// Free-form package metadata; patch declarations live under `extra.medic`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,

    /// Set when this entry only aliases another installed package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            install_path: None,
            extra: None,
            alias_of: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }
}

/// Read access to the installed packages of a project
pub trait PackageRepository {
    /// The project being installed into
    fn root_package(&self) -> &Package;

    /// All installed packages, aliases included
    fn packages(&self) -> &[Package];

    /// Find an installed package by name
    fn find_package(&self, name: &str) -> Option<&Package> {
        self.packages()
            .iter()
            .find(|p| p.name == name && !p.is_alias())
    }

    /// Absolute directory a package is installed in
    fn install_path(&self, package: &Package) -> Result<PathBuf>;
}
