// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use medic::installer::CommandInstaller;
use medic::lock::LOCK_FILE;
use medic::patch::{SystemRunner, Verbosity};
use medic::repository::project::{INSTALLED_INDEX, ROOT_MANIFEST, VENDOR_DIR};
use medic::repository::{PackageRepository, ProjectRepository};
use medic::{Config, PackageOperation, PatchOrchestrator, PatchState};
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "medic")]
#[command(author, version, about = "Apply and track patches for installed dependencies", long_about = None)]
struct Cli {
    /// Increase output (-v for details, -vv to stream patch tool output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root directory
    #[arg(short, long, default_value = ".", env = "MEDIC_ROOT")]
    root: PathBuf,

    /// Lock file recording applied patches
    #[arg(long, default_value = LOCK_FILE)]
    lock_file: PathBuf,

    /// Root project manifest
    #[arg(long, default_value = ROOT_MANIFEST)]
    manifest: PathBuf,

    /// Index of installed packages
    #[arg(long, default_value = INSTALLED_INDEX)]
    installed: PathBuf,

    /// Directory packages without an explicit install path live under
    #[arg(long, default_value = VENDOR_DIR)]
    vendor_dir: PathBuf,
}

impl ProjectArgs {
    fn config(&self, verbosity: Verbosity) -> Config {
        Config {
            root: self.root.clone(),
            lock_file: self.lock_file.clone(),
            manifest: self.manifest.clone(),
            installed_index: self.installed.clone(),
            vendor_dir: self.vendor_dir.clone(),
            verbosity,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending patches, reinstalling packages whose patches changed
    Apply {
        #[command(flatten)]
        project: ProjectArgs,

        /// Package that was just installed or updated (repeatable)
        #[arg(long = "changed", value_name = "PACKAGE")]
        changed: Vec<String>,

        /// Command removing a package; {name} is replaced by the package name
        #[arg(long, value_name = "TEMPLATE", env = "MEDIC_UNINSTALL_CMD")]
        uninstall_cmd: Option<String>,

        /// Command installing a package; {name} is replaced by the package name
        #[arg(long, value_name = "TEMPLATE", env = "MEDIC_INSTALL_CMD")]
        install_cmd: Option<String>,
    },
    /// Show declared patches and whether they are applied
    Status {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn load_repository(config: &Config) -> Result<ProjectRepository> {
    ProjectRepository::load(config)
        .with_context(|| format!("Failed to load project at {}", config.root.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.filter_directive())),
        )
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Apply {
            project,
            changed,
            uninstall_cmd,
            install_cmd,
        }) => {
            let config = project.config(verbosity);
            let repo = load_repository(&config)?;
            let runner = SystemRunner::new(config.verbosity);
            let installer = CommandInstaller::new(&runner, &config.root, uninstall_cmd, install_cmd);

            let mut medic = PatchOrchestrator::new(&config, &repo, &installer, &runner)?;

            for name in &changed {
                let package = repo
                    .find_package(name)
                    .with_context(|| format!("Changed package '{}' is not installed", name))?;
                medic.on_package_event(&PackageOperation::Install(package.clone()))?;
            }

            info!("Applying patches for {} packages", medic.registry().all_targets().count());
            let report = medic.run()?;

            for target in &report.targets {
                if target.reinstalled || target.applied > 0 {
                    println!(
                        "  {}: {} applied, {} already applied{}",
                        target.target,
                        target.applied,
                        target.skipped,
                        if target.reinstalled { " (reinstalled)" } else { "" }
                    );
                }
            }
            println!(
                "Applied {} patch(es), skipped {}, reinstalled {} package(s)",
                report.applied(),
                report.skipped(),
                report.reinstalled()
            );
            if report.pruned > 0 {
                println!("Pruned {} stale lock entry(ies)", report.pruned);
            }

            Ok(())
        }
        Some(Commands::Status { project }) => {
            let config = project.config(verbosity);
            let repo = load_repository(&config)?;
            let runner = SystemRunner::new(config.verbosity);
            let installer = CommandInstaller::new(&runner, &config.root, None, None);

            let medic = PatchOrchestrator::new(&config, &repo, &installer, &runner)?;
            let plans = medic.plan();

            if plans.is_empty() {
                println!("No patches declared.");
                return Ok(());
            }

            println!("Declared patches:");
            for plan in &plans {
                println!("  {} [{}]", plan.target, plan.state);
                for patch in medic.registry().patches_for(&plan.target) {
                    let marker = if plan.pending.iter().any(|p| p.id == patch.id) {
                        "pending"
                    } else {
                        "applied"
                    };
                    println!(
                        "    - {} ({} from {}) {}",
                        patch.description, patch.source, patch.source_package, marker
                    );
                }
            }

            let pending = plans
                .iter()
                .filter(|p| p.state != PatchState::Unchanged)
                .count();
            println!("\nTotal: {} package(s), {} need work", plans.len(), pending);

            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "medic", &mut io::stdout());
            Ok(())
        }
        None => {
            println!("medic v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'medic --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_with_changed_packages() {
        let cli = Cli::try_parse_from([
            "medic",
            "-vv",
            "apply",
            "--root",
            "/srv/app",
            "--changed",
            "bar/baz",
            "--changed",
            "lib/foo",
            "--uninstall-cmd",
            "pm remove {name}",
        ])
        .unwrap();

        assert_eq!(Verbosity::from_flags(cli.verbose, cli.quiet), Verbosity::Debug);
        match cli.command {
            Some(Commands::Apply {
                project,
                changed,
                uninstall_cmd,
                ..
            }) => {
                assert_eq!(project.root, PathBuf::from("/srv/app"));
                assert_eq!(project.lock_file, PathBuf::from("medic.lock"));
                assert_eq!(changed, vec!["bar/baz", "lib/foo"]);
                assert_eq!(uninstall_cmd.as_deref(), Some("pm remove {name}"));
            }
            _ => panic!("expected apply command"),
        }
    }

    #[test]
    fn test_environment_bindings() {
        let cli = Cli::command();
        let apply = cli.find_subcommand("apply").unwrap();
        let env_of = |id: &str| {
            apply
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|name| name.to_string_lossy().to_string())
        };

        assert_eq!(env_of("root").as_deref(), Some("MEDIC_ROOT"));
        assert_eq!(env_of("uninstall_cmd").as_deref(), Some("MEDIC_UNINSTALL_CMD"));
        assert_eq!(env_of("install_cmd").as_deref(), Some("MEDIC_INSTALL_CMD"));
    }

    #[test]
    fn test_parse_status_defaults() {
        let cli = Cli::try_parse_from(["medic", "status", "-q", "--root", "/srv/app"]).unwrap();

        assert_eq!(Verbosity::from_flags(cli.verbose, cli.quiet), Verbosity::Quiet);
        match cli.command {
            Some(Commands::Status { project }) => {
                let config = project.config(Verbosity::Quiet);
                assert_eq!(config.manifest_path(), PathBuf::from("/srv/app/medic.json"));
                assert_eq!(config.installed_index_path(), PathBuf::from("/srv/app/vendor/installed.json"));
                assert_eq!(config.vendor_dir, PathBuf::from("vendor"));
            }
            _ => panic!("expected status command"),
        }
    }
}
