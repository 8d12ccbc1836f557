// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn project_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("root")
            .short('r')
            .long("root")
            .value_name("PATH")
            .default_value(".")
            .env("MEDIC_ROOT")
            .help("Project root directory"),
    )
    .arg(
        Arg::new("lock_file")
            .long("lock-file")
            .value_name("PATH")
            .default_value("medic.lock")
            .help("Lock file recording applied patches"),
    )
    .arg(
        Arg::new("manifest")
            .long("manifest")
            .value_name("PATH")
            .default_value("medic.json")
            .help("Root project manifest"),
    )
    .arg(
        Arg::new("installed")
            .long("installed")
            .value_name("PATH")
            .default_value("vendor/installed.json")
            .help("Index of installed packages"),
    )
    .arg(
        Arg::new("vendor_dir")
            .long("vendor-dir")
            .value_name("PATH")
            .default_value("vendor")
            .help("Directory packages without an explicit install path live under"),
    )
}

fn build_cli() -> Command {
    Command::new("medic")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Medic Contributors")
        .about("Apply and track patches for installed dependencies")
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase output (-v for details, -vv to stream patch tool output)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only report warnings and errors"),
        )
        .subcommand(
            project_args(
                Command::new("apply")
                    .about("Apply pending patches, reinstalling packages whose patches changed"),
            )
            .arg(
                Arg::new("changed")
                    .long("changed")
                    .value_name("PACKAGE")
                    .action(ArgAction::Append)
                    .help("Package that was just installed or updated (repeatable)"),
            )
            .arg(
                Arg::new("uninstall_cmd")
                    .long("uninstall-cmd")
                    .value_name("TEMPLATE")
                    .env("MEDIC_UNINSTALL_CMD")
                    .help("Command removing a package; {name} is replaced by the package name"),
            )
            .arg(
                Arg::new("install_cmd")
                    .long("install-cmd")
                    .value_name("TEMPLATE")
                    .env("MEDIC_INSTALL_CMD")
                    .help("Command installing a package; {name} is replaced by the package name"),
            ),
        )
        .subcommand(project_args(
            Command::new("status").about("Show declared patches and whether they are applied"),
        ))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(Arg::new("shell").required(true).help("Shell to generate completions for")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/main.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("medic.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
