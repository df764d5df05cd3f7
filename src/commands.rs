// src/commands.rs
//! Command handlers for the quarry CLI.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use quarry::build::{
    perform_all_checks, BuildInfo, BuildPackageConfig, BuildPackageOptions, BuildResult,
    CpuArchitecture, KnownToolchains, Toolset, ToolsetArchOption,
};
use quarry::executor::{execute_plan, ExecuteOptions};
use quarry::install::remove::remove_package;
use quarry::ports::{try_load_port, PortRegistry};
use quarry::resolver::{
    create_feature_install_plan, create_install_plan, create_remove_plan, group_plan, AnyAction,
    GroupedPlan, RemovePlanType, RequestType,
};
use quarry::spec::{FullPackageSpec, PackageSpec, Triplet};
use quarry::status::StatusDb;
use quarry::{Error, InstallationPaths, JsonFileMetrics, RunContext};

/// Shared CLI state resolved from global flags.
pub struct GlobalArgs {
    pub root: PathBuf,
    pub default_triplet: String,
    pub debug: bool,
    pub feature_packages: bool,
}

impl GlobalArgs {
    fn paths(&self) -> InstallationPaths {
        InstallationPaths::new(&self.root)
    }

    fn context(&self) -> RunContext {
        let mut ctx = RunContext::new();
        ctx.debugging = self.debug;
        ctx.feature_packages = self.feature_packages;
        if let Ok(path) = std::env::var("QUARRY_METRICS_FILE") {
            match JsonFileMetrics::open(Path::new(&path)) {
                Ok(sink) => ctx = ctx.with_metrics(Box::new(sink)),
                Err(e) => eprintln!("warning: cannot open metrics file {}: {}", path, e),
            }
        }
        ctx
    }

    fn triplet(&self) -> Result<Triplet> {
        Ok(Triplet::from_canonical_name(&self.default_triplet)?)
    }
}

/// Stand-in for the external toolchain discovery collaborator: a single
/// toolset described by environment variables. Builds fail with a
/// toolchain error when it is absent.
fn toolchain_resolver() -> KnownToolchains {
    let Ok(vcvarsall) = std::env::var("QUARRY_VCVARSALL") else {
        return KnownToolchains::default();
    };
    let version =
        std::env::var("QUARRY_PLATFORM_TOOLSET").unwrap_or_else(|_| "v141".to_string());
    let vcvarsall = PathBuf::from(vcvarsall);
    let toolset = Toolset {
        visual_studio_root: vcvarsall
            .ancestors()
            .nth(4)
            .map(PathBuf::from)
            .unwrap_or_default(),
        vcvarsall,
        vcvarsall_options: Vec::new(),
        version,
        supported_architectures: vec![
            ToolsetArchOption {
                name: "x86".to_string(),
                host_arch: CpuArchitecture::X86,
                target_arch: CpuArchitecture::X86,
            },
            ToolsetArchOption {
                name: "amd64".to_string(),
                host_arch: CpuArchitecture::X64,
                target_arch: CpuArchitecture::X64,
            },
            ToolsetArchOption {
                name: "amd64_x86".to_string(),
                host_arch: CpuArchitecture::X64,
                target_arch: CpuArchitecture::X86,
            },
            ToolsetArchOption {
                name: "amd64_arm".to_string(),
                host_arch: CpuArchitecture::X64,
                target_arch: CpuArchitecture::Arm,
            },
        ],
    };
    KnownToolchains::new(vec![toolset])
}

fn load_registry(paths: &InstallationPaths) -> Result<PortRegistry> {
    let results = PortRegistry::load_all(&paths.ports)?;
    for error in &results.errors {
        eprintln!("warning: {}", error);
    }
    Ok(results.registry)
}

fn print_plan(grouped: &GroupedPlan) {
    if !grouped.already_installed.is_empty() {
        println!("The following packages are already installed:");
        for line in &grouped.already_installed {
            println!("{}", line);
        }
    }
    if !grouped.rebuilt.is_empty() {
        println!("The following packages will be rebuilt:");
        for line in &grouped.rebuilt {
            println!("{}", line);
        }
    }
    if !grouped.new_installs.is_empty() {
        println!("The following packages will be built and installed:");
        for line in &grouped.new_installs {
            println!("{}", line);
        }
    }
    if !grouped.only_install.is_empty() {
        println!("The following packages will be directly installed:");
        for line in &grouped.only_install {
            println!("{}", line);
        }
    }
    if grouped.has_auto_selected {
        println!("Additional packages (*) will be installed to complete this operation.");
    }
}

pub struct InstallArgs {
    pub packages: Vec<String>,
    pub dry_run: bool,
    pub head: bool,
    pub no_downloads: bool,
    pub recurse: bool,
    pub keep_going: bool,
}

pub fn cmd_install(global: &GlobalArgs, args: &InstallArgs) -> Result<()> {
    let paths = global.paths();
    let ctx = global.context();
    let default_triplet = global.triplet()?;

    let specs = args
        .packages
        .iter()
        .map(|p| FullPackageSpec::parse(p, &default_triplet))
        .collect::<quarry::Result<Vec<_>>>()?;

    for spec in &specs {
        paths.check_triplet(spec.package_spec.triplet())?;
        if !spec.features.is_empty() && !ctx.feature_packages {
            bail!("feature selection requires the --feature-packages flag");
        }
    }

    let mut status_db = StatusDb::load(&paths)?;
    let registry = load_registry(&paths)?;

    let plan: Vec<AnyAction> = if ctx.feature_packages {
        let feature_specs = FullPackageSpec::to_feature_specs(&specs);
        create_feature_install_plan(&registry, &feature_specs, &status_db)?
    } else {
        let package_specs: Vec<PackageSpec> =
            specs.iter().map(|s| s.package_spec.clone()).collect();
        create_install_plan(&registry, &package_specs, &status_db, &paths)?
            .into_iter()
            .map(AnyAction::Install)
            .collect()
    };

    if plan.is_empty() {
        return Err(Error::EmptyPlan.into());
    }

    let plan_string: Vec<String> = plan
        .iter()
        .map(|action| match action {
            AnyAction::Install(a) => a.spec.to_string(),
            AnyAction::Remove(a) => format!("R${}", a.spec),
        })
        .collect();
    ctx.metrics()
        .track_property("installplan", &plan_string.join(","));

    let grouped = group_plan(&plan);
    print_plan(&grouped);
    if grouped.has_rebuilds && !args.recurse {
        bail!(
            "if you are sure you want to rebuild the above packages, run the command with the --recurse option"
        );
    }

    if args.dry_run {
        return Ok(());
    }

    let build_options = BuildPackageOptions {
        use_head_version: args.head,
        allow_downloads: !args.no_downloads,
    };
    let execute_options = ExecuteOptions {
        keep_going: args.keep_going,
    };
    let resolver = toolchain_resolver();

    let summary = execute_plan(
        &paths,
        &plan,
        &build_options,
        &execute_options,
        &mut status_db,
        &resolver,
        &ctx,
    )?;

    // keep-going runs report everything at the end instead of stopping.
    if args.keep_going {
        println!("\nSUMMARY");
        for (result, count) in summary.histogram() {
            println!("    {}: {}", result, count);
        }
        let failed: Vec<_> = summary
            .results
            .iter()
            .filter(|r| {
                r.result != BuildResult::Succeeded && r.result != BuildResult::Nullvalue
            })
            .collect();
        if !failed.is_empty() {
            for action in &failed {
                println!("    {}: {}", action.display_name, action.result);
            }
            bail!("{} package(s) failed", failed.len());
        }
    }

    Ok(())
}

pub fn cmd_remove(
    global: &GlobalArgs,
    packages: &[String],
    recurse: bool,
    dry_run: bool,
) -> Result<()> {
    let paths = global.paths();
    let default_triplet = global.triplet()?;

    let specs = packages
        .iter()
        .map(|p| {
            let full = FullPackageSpec::parse(p, &default_triplet)?;
            if !full.features.is_empty() {
                return Err(Error::InvalidSpec {
                    input: p.clone(),
                    reason: "remove operates on whole packages".to_string(),
                });
            }
            Ok(full.package_spec)
        })
        .collect::<quarry::Result<Vec<_>>>()?;

    let mut status_db = StatusDb::load(&paths)?;
    let remove_plan = create_remove_plan(&specs, &status_db)?;

    let mut to_remove = Vec::new();
    let mut dependents = Vec::new();
    for action in remove_plan {
        match action.plan_type {
            RemovePlanType::NotInstalled => {
                println!("Package {} is not installed", action.spec);
            }
            RemovePlanType::Remove => {
                if action.request_type == RequestType::AutoSelected {
                    dependents.push(action.spec.to_string());
                }
                to_remove.push(action.spec);
            }
        }
    }

    if !dependents.is_empty() && !recurse {
        bail!(
            "the following packages depend on the ones being removed and must be removed too \
             (re-run with --recurse): {}",
            dependents.join(", ")
        );
    }

    if to_remove.is_empty() {
        return Ok(());
    }

    println!("The following packages will be removed:");
    for spec in &to_remove {
        println!("    {}", spec);
    }
    if dry_run {
        return Ok(());
    }

    for spec in &to_remove {
        remove_package(&paths, spec, &mut status_db)?;
        println!("Removing package {}... done", spec);
    }
    Ok(())
}

pub fn cmd_build(global: &GlobalArgs, package: &str, checks_only: bool) -> Result<()> {
    let paths = global.paths();
    let ctx = global.context();
    let default_triplet = global.triplet()?;

    let full = FullPackageSpec::parse(package, &default_triplet)?;
    let spec = full.package_spec.clone();
    paths.check_triplet(spec.triplet())?;

    if checks_only {
        let build_info = BuildInfo::read(&paths.build_info_path(&spec))?;
        let error_count = perform_all_checks(&spec, &paths, &build_info)?;
        if error_count != 0 {
            bail!("post-build checks for {} found {} error(s)", spec, error_count);
        }
        println!("Post-build checks for {} passed", spec);
        return Ok(());
    }

    let scf = try_load_port(&paths.port_dir(spec.name()))
        .with_context(|| format!("loading port {}", spec.name()))?;

    let status_db = StatusDb::load(&paths)?;
    let feature_list = (!full.features.is_empty()).then(|| full.features.clone());
    let config = BuildPackageConfig {
        scf: &scf,
        triplet: spec.triplet().clone(),
        port_dir: paths.port_dir(spec.name()),
        options: BuildPackageOptions::default(),
        feature_list,
    };

    let resolver = toolchain_resolver();
    let result = quarry::build::build_package(&paths, &config, &status_db, &resolver, &ctx)?;

    match result.code {
        BuildResult::Succeeded => {
            println!("Package {} built successfully", spec);
            Ok(())
        }
        BuildResult::CascadedDueToMissingDependencies => {
            eprintln!("The build command requires all dependencies to be already installed.");
            eprintln!("The following dependencies are missing:");
            for unmet in &result.unmet_dependencies {
                eprintln!("    {}", unmet);
            }
            bail!("missing dependencies for {}", spec);
        }
        code => {
            eprintln!("{}", quarry::build::create_error_message(code, &spec));
            eprintln!("{}", quarry::build::create_user_troubleshooting_message(&spec));
            bail!("build of {} failed", spec);
        }
    }
}

pub fn cmd_list(global: &GlobalArgs) -> Result<()> {
    let paths = global.paths();
    let status_db = StatusDb::load(&paths)?;

    let mut lines: Vec<String> = status_db
        .iter()
        .filter(|r| r.is_installed())
        .map(|r| {
            let description = r.package.description.lines().next().unwrap_or("");
            format!(
                "{:<40} {:<16} {}",
                r.package.displayname(),
                r.package.version,
                description
            )
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("No packages are installed");
    }
    for line in lines {
        println!("{}", line.trim_end());
    }
    Ok(())
}

pub fn cmd_search(global: &GlobalArgs, pattern: Option<&str>) -> Result<()> {
    let paths = global.paths();
    let registry = load_registry(&paths)?;

    for port in registry.iter() {
        let core = &port.core_paragraph;
        let matches = pattern.map_or(true, |p| {
            let p = p.to_lowercase();
            core.name.contains(&p) || core.description.to_lowercase().contains(&p)
        });
        if !matches {
            continue;
        }
        let description = core.description.lines().next().unwrap_or("");
        println!("{:<24} {:<16} {}", core.name, core.version, description);
        for feature in &port.feature_paragraphs {
            println!(
                "{:<24} {:<16} {}",
                format!("{}[{}]", core.name, feature.name),
                "",
                feature.description.lines().next().unwrap_or("")
            );
        }
    }
    Ok(())
}

/// List installed packages whose port now carries a different version.
pub fn cmd_update(global: &GlobalArgs) -> Result<()> {
    let paths = global.paths();
    let registry = load_registry(&paths)?;
    let status_db = StatusDb::load(&paths)?;

    let mut outdated = Vec::new();
    for record in status_db.iter() {
        if !record.is_installed() || record.package.feature.is_some() {
            continue;
        }
        if let Some(port) = registry.find(record.package.spec.name()) {
            let current = &port.core_paragraph.version;
            if current != &record.package.version {
                outdated.push(format!(
                    "    {:<40} {} -> {}",
                    record.package.spec, record.package.version, current
                ));
            }
        }
    }

    if outdated.is_empty() {
        println!("No packages need updating");
        return Ok(());
    }
    outdated.sort();
    println!("The following packages differ from their port versions:");
    for line in outdated {
        println!("{}", line);
    }
    println!("To update a package, remove and reinstall it.");
    Ok(())
}

pub fn cmd_depend_info(global: &GlobalArgs, packages: &[String]) -> Result<()> {
    let paths = global.paths();
    let registry = load_registry(&paths)?;

    let selected: Vec<&str> = packages.iter().map(String::as_str).collect();
    for port in registry.iter() {
        let core = &port.core_paragraph;
        if !selected.is_empty() && !selected.contains(&core.name.as_str()) {
            continue;
        }
        let deps: Vec<&str> = core.depends.iter().map(|d| d.name.as_str()).collect();
        println!("{}: {}", core.name, deps.join(", "));
    }
    Ok(())
}
