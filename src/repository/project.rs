// src/repository/project.rs

//! File-backed repository for a project checkout
//!
//! Reads the root manifest (`name` plus optional `extra`) and an installed
//! package index of the form:
//!
//! ```json
//! { "packages": [ { "name": "bar/baz", "version": "1.2.0", "install-path": "vendor/bar/baz" } ] }
//! ```

use super::{Package, PackageRepository};
use crate::config::Config;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default root manifest, relative to the project root
pub const ROOT_MANIFEST: &str = "medic.json";

/// Default directory packages are installed under
pub const VENDOR_DIR: &str = "vendor";

/// Default installed package index, relative to the project root
pub const INSTALLED_INDEX: &str = "vendor/installed.json";

#[derive(Debug, Deserialize)]
struct InstalledIndex {
    #[serde(default)]
    packages: Vec<Package>,
}

/// Packages installed under a project root
#[derive(Debug, Clone)]
pub struct ProjectRepository {
    root: PathBuf,
    vendor_dir: PathBuf,
    root_package: Package,
    packages: Vec<Package>,
}

impl ProjectRepository {
    /// Load the root manifest and installed index named by `config`
    ///
    /// A missing index means nothing is installed yet.
    pub fn load(config: &Config) -> Result<Self> {
        let manifest_path = config.manifest_path();
        let root_package: Package = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;

        let index_path = config.installed_index_path();
        let packages = match fs::read_to_string(&index_path) {
            Ok(content) => serde_json::from_str::<InstalledIndex>(&content)?.packages,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Loaded {} installed packages for {} from {}",
            packages.len(),
            root_package.name,
            index_path.display()
        );

        Ok(Self::new(&config.root, &config.vendor_dir, root_package, packages))
    }

    pub fn new(root: &Path, vendor_dir: &Path, root_package: Package, packages: Vec<Package>) -> Self {
        Self {
            root: root.to_path_buf(),
            vendor_dir: vendor_dir.to_path_buf(),
            root_package,
            packages,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PackageRepository for ProjectRepository {
    fn root_package(&self) -> &Package {
        &self.root_package
    }

    fn packages(&self) -> &[Package] {
        &self.packages
    }

    fn install_path(&self, package: &Package) -> Result<PathBuf> {
        if package.name == self.root_package.name {
            return Ok(self.root.clone());
        }
        if self.find_package(&package.name).is_none() {
            return Err(Error::PackageNotFound(package.name.clone()));
        }

        let relative = match &package.install_path {
            Some(path) => path.clone(),
            None => self.vendor_dir.join(&package.name),
        };
        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn load(dir: &TempDir) -> Result<ProjectRepository> {
        ProjectRepository::load(&Config::new(dir.path()))
    }

    #[test]
    fn test_load_project() {
        let dir = TempDir::new().unwrap();
        write(&dir, ROOT_MANIFEST, r#"{ "name": "acme/app", "extra": { "medic": {} } }"#);
        write(
            &dir,
            INSTALLED_INDEX,
            r#"{ "packages": [
                { "name": "bar/baz", "version": "1.2.0" },
                { "name": "lib/foo", "install-path": "modules/foo", "extra": { "medic": {} } },
                { "name": "bar/baz-alias", "alias-of": "bar/baz" }
            ] }"#,
        );

        let repo = load(&dir).unwrap();

        assert_eq!(repo.root_package().name, "acme/app");
        assert_eq!(repo.packages().len(), 3);
        assert!(repo.packages()[2].is_alias());

        let baz = repo.find_package("bar/baz").unwrap();
        assert_eq!(baz.version.as_deref(), Some("1.2.0"));
        assert_eq!(repo.install_path(baz).unwrap(), dir.path().join("vendor/bar/baz"));

        let foo = repo.find_package("lib/foo").unwrap();
        assert_eq!(repo.install_path(foo).unwrap(), dir.path().join("modules/foo"));

        assert!(repo.find_package("bar/baz-alias").is_none());
    }

    #[test]
    fn test_missing_index_means_nothing_installed() {
        let dir = TempDir::new().unwrap();
        write(&dir, ROOT_MANIFEST, r#"{ "name": "acme/app" }"#);

        let repo = load(&dir).unwrap();
        assert!(repo.packages().is_empty());
        assert_eq!(repo.install_path(&Package::new("acme/app")).unwrap(), dir.path());
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(load(&dir), Err(Error::Io(_))));
    }

    #[test]
    fn test_load_honors_configured_paths() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config/project.json", r#"{ "name": "acme/app" }"#);
        write(&dir, "deps/index.json", r#"{ "packages": [ { "name": "bar/baz" } ] }"#);
        let config = Config {
            manifest: PathBuf::from("config/project.json"),
            installed_index: PathBuf::from("deps/index.json"),
            vendor_dir: PathBuf::from("deps"),
            ..Config::new(dir.path())
        };

        let repo = ProjectRepository::load(&config).unwrap();

        assert_eq!(repo.root_package().name, "acme/app");
        let baz = repo.find_package("bar/baz").unwrap();
        assert_eq!(repo.install_path(baz).unwrap(), dir.path().join("deps/bar/baz"));
    }

    #[test]
    fn test_install_path_of_unknown_package() {
        let dir = TempDir::new().unwrap();
        write(&dir, ROOT_MANIFEST, r#"{ "name": "acme/app" }"#);
        let repo = load(&dir).unwrap();

        assert!(matches!(
            repo.install_path(&Package::new("no/such")),
            Err(Error::PackageNotFound(_))
        ));
    }
}
