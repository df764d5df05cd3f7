// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: installation root
fn root_arg() -> Arg {
    Arg::new("root")
        .long("root")
        .value_name("PATH")
        .default_value(".")
        .help("Installation root directory")
}

/// Common argument: default triplet
fn triplet_arg() -> Arg {
    Arg::new("triplet")
        .long("triplet")
        .default_value("x86-windows")
        .help("Default triplet for unqualified package specs")
}

fn build_cli() -> Command {
    Command::new("quarry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Source-based package manager for native C/C++ libraries")
        .subcommand_required(false)
        .subcommand(
            Command::new("install")
                .about("Build and install packages")
                .arg(Arg::new("packages").required(true).num_args(1..).help("Package specs"))
                .arg(root_arg())
                .arg(triplet_arg())
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(clap::ArgAction::SetTrue)
                        .help("Show the plan without executing it"),
                )
                .arg(
                    Arg::new("head")
                        .long("head")
                        .action(clap::ArgAction::SetTrue)
                        .help("Build from the upstream HEAD"),
                )
                .arg(
                    Arg::new("no_downloads")
                        .long("no-downloads")
                        .action(clap::ArgAction::SetTrue)
                        .help("Fail instead of downloading missing sources"),
                )
                .arg(
                    Arg::new("recurse")
                        .long("recurse")
                        .action(clap::ArgAction::SetTrue)
                        .help("Allow rebuilding already-installed packages"),
                )
                .arg(
                    Arg::new("keep_going")
                        .long("keep-going")
                        .action(clap::ArgAction::SetTrue)
                        .help("Continue past failing packages"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(Arg::new("packages").required(true).num_args(1..).help("Package specs"))
                .arg(root_arg())
                .arg(triplet_arg()),
        )
        .subcommand(
            Command::new("build")
                .about("Build a single package")
                .arg(Arg::new("package").required(true).help("Package spec"))
                .arg(root_arg())
                .arg(triplet_arg()),
        )
        .subcommand(Command::new("list").about("List installed packages").arg(root_arg()))
        .subcommand(
            Command::new("search")
                .about("Search the ports tree")
                .arg(Arg::new("pattern").help("Substring pattern"))
                .arg(root_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Show installed packages that differ from their ports")
                .arg(root_arg()),
        )
        .subcommand(
            Command::new("depend-info")
                .about("Show dependency lists of ports")
                .arg(Arg::new("packages").num_args(0..).help("Port names"))
                .arg(root_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("quarry.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
