// src/orchestrator.rs

//! Patch run driver
//!
//! One [`PatchOrchestrator`] lives for one install/update batch:
//!
//! 1. `new` loads the lock file and gathers declarations from the root
//!    project and every installed package
//! 2. `on_package_event` re-gathers a package the package manager just
//!    installed or updated
//! 3. `run` reinstalls targets whose patches changed, applies what is
//!    pending and records each success in the lock file
//!
//! Every failure is fatal for the run. Nothing is retried.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::installer::Installer;
use crate::lock::InstallState;
use crate::manifest::parse_declarations;
use crate::patch::{CommandRunner, PatchApplier, PatchDescriptor};
use crate::registry::PatchRegistry;
use crate::repository::{Package, PackageRepository};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Package lifecycle operation reported by the package manager
#[derive(Debug, Clone, PartialEq)]
pub enum PackageOperation {
    Install(Package),
    Update { initial: Package, target: Package },
    Uninstall(Package),
}

impl PackageOperation {
    /// The package whose files the operation left on disk
    pub fn package(&self) -> Result<&Package> {
        match self {
            PackageOperation::Install(package) => Ok(package),
            PackageOperation::Update { target, .. } => Ok(target),
            PackageOperation::Uninstall(package) => Err(Error::UnknownOperation(format!(
                "uninstall of {}",
                package.name
            ))),
        }
    }
}

/// Where a target stands relative to its declared patches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    /// Every declared patch is recorded with its current hash
    Unchanged,
    /// A recorded hash differs; the package must be reinstalled first
    PendingReinstall,
    /// Some patches are not recorded yet
    PendingApply,
    /// Patches were applied during this run
    Applied,
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PatchState::Unchanged => "unchanged",
            PatchState::PendingReinstall => "pending reinstall",
            PatchState::PendingApply => "pending apply",
            PatchState::Applied => "applied",
        };
        f.write_str(label)
    }
}

/// What `run` would do for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    pub target: String,
    pub state: PatchState,
    /// Patches that would be applied, in order
    pub pending: Vec<PatchDescriptor>,
}

/// What `run` did for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    pub state: PatchState,
    pub reinstalled: bool,
    pub applied: usize,
    pub skipped: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
    /// Lock entries dropped because their patch is no longer declared
    pub pruned: usize,
}

impl RunReport {
    pub fn applied(&self) -> usize {
        self.targets.iter().map(|t| t.applied).sum()
    }

    pub fn skipped(&self) -> usize {
        self.targets.iter().map(|t| t.skipped).sum()
    }

    pub fn reinstalled(&self) -> usize {
        self.targets.iter().filter(|t| t.reinstalled).count()
    }
}

/// Gathers declared patches and brings installed packages in line with them
pub struct PatchOrchestrator<'a> {
    root: PathBuf,
    repository: &'a dyn PackageRepository,
    installer: &'a dyn Installer,
    applier: PatchApplier<'a>,
    registry: PatchRegistry,
    state: InstallState,
}

impl<'a> PatchOrchestrator<'a> {
    /// Load the lock file and gather patches from the root project and all installed packages
    pub fn new(
        config: &Config,
        repository: &'a dyn PackageRepository,
        installer: &'a dyn Installer,
        runner: &'a dyn CommandRunner,
    ) -> Result<Self> {
        let state = InstallState::load(config.lock_path())?;

        let mut orchestrator = Self {
            root: config.root.clone(),
            repository,
            installer,
            applier: PatchApplier::new(runner),
            registry: PatchRegistry::new(),
            state,
        };

        orchestrator.gather_from_package(repository.root_package())?;
        for package in repository.packages().iter().filter(|p| !p.is_alias()) {
            orchestrator.gather_from_package(package)?;
        }

        Ok(orchestrator)
    }

    pub fn registry(&self) -> &PatchRegistry {
        &self.registry
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// Merge the patches `package` declares into the registry
    pub fn gather_from_package(&mut self, package: &Package) -> Result<usize> {
        let requests = parse_declarations(&package.name, package.extra.as_ref())?;
        if requests.is_empty() {
            return Ok(0);
        }

        let source_root = if self.is_root(package) {
            self.root.clone()
        } else {
            self.repository.install_path(package)?
        };

        let descriptors = requests
            .iter()
            .map(|request| {
                PatchDescriptor::create(
                    &request.source,
                    &request.target_package,
                    &request.description,
                    &package.name,
                    &source_root,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.registry.merge_from(&package.name, descriptors))
    }

    /// A package was just installed or updated: its files are pristine again
    pub fn on_package_event(&mut self, operation: &PackageOperation) -> Result<usize> {
        let package = operation.package()?;

        if self.state.clear(&package.name) {
            info!("Resetting installed patches for {}", package.name);
            self.state.save()?;
        }

        let forgotten = self.registry.forget_source(&package.name);
        if forgotten > 0 {
            debug!("Discarded {} patches previously gathered from {}", forgotten, package.name);
        }

        self.gather_from_package(package)
    }

    /// Evaluate every target against the lock without changing anything
    pub fn plan(&self) -> Vec<TargetPlan> {
        self.registry
            .all_targets()
            .map(|(target, patches)| {
                if self.find_stale(target, patches).is_some() {
                    return TargetPlan {
                        target: target.to_string(),
                        state: PatchState::PendingReinstall,
                        pending: patches.to_vec(),
                    };
                }

                let pending: Vec<_> = patches
                    .iter()
                    .filter(|patch| !self.is_applied(target, patch))
                    .cloned()
                    .collect();
                let state = if pending.is_empty() {
                    PatchState::Unchanged
                } else {
                    PatchState::PendingApply
                };

                TargetPlan {
                    target: target.to_string(),
                    state,
                    pending,
                }
            })
            .collect()
    }

    /// Apply all pending patches, reinstalling targets whose patches changed
    pub fn run(&mut self) -> Result<RunReport> {
        let pruned = self.prune_orphans()?;

        let targets: Vec<(String, Vec<PatchDescriptor>)> = self
            .registry
            .all_targets()
            .map(|(target, patches)| (target.to_string(), patches.to_vec()))
            .collect();

        let mut report = RunReport {
            targets: Vec::with_capacity(targets.len()),
            pruned,
        };
        for (target, patches) in &targets {
            report.targets.push(self.run_target(target, patches)?);
        }

        Ok(report)
    }

    fn run_target(&mut self, target: &str, patches: &[PatchDescriptor]) -> Result<TargetReport> {
        let mut report = TargetReport {
            target: target.to_string(),
            state: PatchState::Unchanged,
            reinstalled: false,
            applied: 0,
            skipped: 0,
        };

        // One reinstall covers any number of changed patches
        if let Some(stale) = self.find_stale(target, patches) {
            info!(
                "Removing package {} so that it can be re-installed and re-patched ({} changed)",
                target, stale.description
            );
            let package = self.find_target(target)?;
            self.installer.uninstall(package)?;
            self.installer.install(package)?;
            self.state.clear(target);
            self.state.save()?;
            report.reinstalled = true;
        }

        for patch in patches {
            if self.is_applied(target, patch) {
                debug!("Patch {} for {} is already applied", patch.description, target);
                report.skipped += 1;
                continue;
            }

            info!("Applying patch {} for {}", patch.description, target);

            let package = self.find_target(target)?;
            let target_dir = self.repository.install_path(package)?;
            let patch_file = patch.resolve(&self.source_root_for(&patch.source_package)?)?;

            let outcome = self.applier.apply(&patch_file, &target_dir)?;
            debug!(
                "Applied {} with {} -p{}",
                patch_file.display(),
                outcome.tool,
                outcome.strip_level
            );

            self.state.record(target, &patch.id, &patch.hash)?;
            report.applied += 1;
        }

        if report.applied > 0 {
            report.state = PatchState::Applied;
        }
        Ok(report)
    }

    /// Drop lock entries for patches nobody declares anymore
    fn prune_orphans(&mut self) -> Result<usize> {
        let registry = &self.registry;
        let removed = self.state.prune(|target, id| registry.contains(target, id));

        for (target, id) in &removed {
            warn!(
                "Patch {} is no longer declared for {}; the installed copy keeps it until {} is reinstalled",
                id, target, target
            );
        }
        if !removed.is_empty() {
            self.state.save()?;
        }

        Ok(removed.len())
    }

    /// First patch whose recorded hash differs from its current one
    fn find_stale<'p>(&self, target: &str, patches: &'p [PatchDescriptor]) -> Option<&'p PatchDescriptor> {
        patches.iter().find(|patch| {
            self.state
                .has(target, &patch.id)
                .is_some_and(|recorded| recorded != patch.hash)
        })
    }

    fn is_applied(&self, target: &str, patch: &PatchDescriptor) -> bool {
        self.state.has(target, &patch.id) == Some(patch.hash.as_str())
    }

    fn is_root(&self, package: &Package) -> bool {
        package.name == self.repository.root_package().name
    }

    fn find_target(&self, name: &str) -> Result<&'a Package> {
        let repository: &'a dyn PackageRepository = self.repository;
        repository
            .find_package(name)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    /// Root a patch path is relative to; a contributor that is not installed is the root project
    fn source_root_for(&self, source_package: &str) -> Result<PathBuf> {
        match self.repository.find_package(source_package) {
            Some(package) => self.repository.install_path(package),
            None => Ok(self.root.clone()),
        }
    }
}
