// src/installer.rs

//! Package reinstallation
//!
//! A target whose patch changed is removed and installed again so the new
//! patch set is applied to pristine sources.

use crate::error::{Error, Result};
use crate::patch::{CommandRunner, ProcessCommand};
use crate::repository::Package;
use std::path::{Path, PathBuf};
use tracing::info;

/// Placeholder replaced with the quoted package name in command templates
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Install and uninstall operations of the package manager
pub trait Installer {
    fn uninstall(&self, package: &Package) -> Result<()>;
    fn install(&self, package: &Package) -> Result<()>;
}

/// Runs user-supplied shell command templates, e.g. `composer reinstall {name}`
pub struct CommandInstaller<'a> {
    runner: &'a dyn CommandRunner,
    working_dir: PathBuf,
    uninstall: Option<String>,
    install: Option<String>,
}

impl<'a> CommandInstaller<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        working_dir: &Path,
        uninstall: Option<String>,
        install: Option<String>,
    ) -> Self {
        Self {
            runner,
            working_dir: working_dir.to_path_buf(),
            uninstall,
            install,
        }
    }

    fn run_template(&self, action: &str, template: Option<&str>, package: &Package) -> Result<()> {
        let template = template.ok_or_else(|| {
            Error::Reinstall(format!(
                "no {} command configured, cannot {} {}",
                action, action, package.name
            ))
        })?;

        let script = render_template(template, &package.name);
        let command = ProcessCommand::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(&self.working_dir);

        if self.runner.run(&command)? {
            Ok(())
        } else {
            Err(Error::Reinstall(format!(
                "{} of {} failed: {}",
                action,
                package.name,
                command.display()
            )))
        }
    }
}

impl Installer for CommandInstaller<'_> {
    fn uninstall(&self, package: &Package) -> Result<()> {
        info!("Uninstalling {}", package.name);
        self.run_template("uninstall", self.uninstall.as_deref(), package)
    }

    fn install(&self, package: &Package) -> Result<()> {
        info!("Installing {}", package.name);
        self.run_template("install", self.install.as_deref(), package)
    }
}

/// Substitute the shell-quoted package name into a command template
pub fn render_template(template: &str, package: &str) -> String {
    let quoted = shlex::try_quote(package)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| package.to_string());
    template.replace(NAME_PLACEHOLDER, &quoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingRunner {
        succeed: bool,
        scripts: RefCell<Vec<String>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &ProcessCommand) -> Result<bool> {
            self.scripts.borrow_mut().push(command.args[1].clone());
            Ok(self.succeed)
        }
    }

    #[test]
    fn test_render_template() {
        assert_eq!(render_template("pm remove {name}", "bar/baz"), "pm remove bar/baz");
        assert_eq!(render_template("pm remove {name}", "odd name"), "pm remove 'odd name'");
    }

    #[test]
    fn test_command_installer_runs_templates() {
        let runner = RecordingRunner {
            succeed: true,
            scripts: RefCell::new(Vec::new()),
        };
        let installer = CommandInstaller::new(
            &runner,
            Path::new("/srv/app"),
            Some("pm remove {name}".to_string()),
            Some("pm add {name}".to_string()),
        );
        let package = Package::new("bar/baz");

        installer.uninstall(&package).unwrap();
        installer.install(&package).unwrap();

        assert_eq!(*runner.scripts.borrow(), vec!["pm remove bar/baz", "pm add bar/baz"]);
    }

    #[test]
    fn test_command_installer_failure() {
        let runner = RecordingRunner {
            succeed: false,
            scripts: RefCell::new(Vec::new()),
        };
        let installer = CommandInstaller::new(&runner, Path::new("."), Some("pm remove {name}".to_string()), None);

        assert!(matches!(installer.uninstall(&Package::new("bar/baz")), Err(Error::Reinstall(_))));
    }

    #[test]
    fn test_command_installer_without_template() {
        let runner = RecordingRunner {
            succeed: true,
            scripts: RefCell::new(Vec::new()),
        };
        let installer = CommandInstaller::new(&runner, Path::new("."), None, None);

        assert!(matches!(installer.install(&Package::new("bar/baz")), Err(Error::Reinstall(_))));
        assert!(runner.scripts.borrow().is_empty());
    }
}
