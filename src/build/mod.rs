// src/build/mod.rs

//! The build driver.
//!
//! Drives the external CMake-based port build under a resolved compiler
//! environment: check dependencies, probe the triplet environment, compose
//! the `env && build` child invocation, classify the outcome, lint the
//! sandbox, and write the binary manifest.
//!
//! Outcomes are values, not errors. Only environment problems (missing
//! toolchain, missing tool) and parse failures escape as `Err`.

mod command;
mod info;
mod lint;
mod prebuild;
mod toolchain;

pub use command::{cmd_execute, cmd_execute_and_capture_output, make_cmake_cmd, CapturedOutput};
pub use info::{BuildInfo, BuildPolicies, BuildPolicy, LinkageType};
pub use lint::perform_all_checks;
pub use prebuild::{PreBuildInfo, PREBUILD_SENTINEL};
pub use toolchain::{
    supported_host_architectures, vcvarsall_architecture, vcvarsall_target, CpuArchitecture,
    KnownToolchains, Toolset, ToolsetArchOption, ToolchainResolver,
};

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::context::RunContext;
use crate::error::Result;
use crate::manifest::{
    filter_dependencies, BinaryControlFile, BinaryParagraph, SourceControlFile,
};
use crate::paths::InstallationPaths;
use crate::spec::{PackageSpec, Triplet};
use crate::status::StatusDb;

/// Classification of one build or install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildResult {
    /// Action never ran (used to pre-fill summaries).
    Nullvalue,
    Succeeded,
    BuildFailed,
    PostBuildChecksFailed,
    FileConflicts,
    CascadedDueToMissingDependencies,
}

impl BuildResult {
    pub const ALL: [BuildResult; 6] = [
        BuildResult::Nullvalue,
        BuildResult::Succeeded,
        BuildResult::BuildFailed,
        BuildResult::PostBuildChecksFailed,
        BuildResult::FileConflicts,
        BuildResult::CascadedDueToMissingDependencies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Nullvalue => "NULLVALUE",
            BuildResult::Succeeded => "SUCCEEDED",
            BuildResult::BuildFailed => "BUILD_FAILED",
            BuildResult::PostBuildChecksFailed => "POST_BUILD_CHECKS_FAILED",
            BuildResult::FileConflicts => "FILE_CONFLICTS",
            BuildResult::CascadedDueToMissingDependencies => {
                "CASCADED_DUE_TO_MISSING_DEPENDENCIES"
            }
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build outcome plus the dependencies that blocked it, if any.
#[derive(Debug, Clone)]
pub struct ExtendedBuildResult {
    pub code: BuildResult,
    pub unmet_dependencies: Vec<PackageSpec>,
}

impl ExtendedBuildResult {
    fn of(code: BuildResult) -> Self {
        Self {
            code,
            unmet_dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildPackageOptions {
    pub use_head_version: bool,
    pub allow_downloads: bool,
}

impl Default for BuildPackageOptions {
    fn default() -> Self {
        Self {
            use_head_version: false,
            allow_downloads: true,
        }
    }
}

/// Everything needed to build one port for one triplet.
pub struct BuildPackageConfig<'a> {
    pub scf: &'a SourceControlFile,
    pub triplet: Triplet,
    pub port_dir: PathBuf,
    pub options: BuildPackageOptions,
    /// Selected features for feature-aware builds, `core` included.
    pub feature_list: Option<Vec<String>>,
}

pub fn create_error_message(result: BuildResult, spec: &PackageSpec) -> String {
    format!("Error: Building package {} failed with: {}", spec, result)
}

pub fn create_user_troubleshooting_message(spec: &PackageSpec) -> String {
    format!(
        "Please ensure your ports tree is up to date with `quarry update`, then\n\
         submit an issue at https://github.com/quarry-pm/quarry/issues including:\n\
         \x20 Package: {}\n\
         \x20 Quarry version: {}\n\
         \n\
         Additionally, attach any relevant sections from the log files above.",
        spec,
        env!("CARGO_PKG_VERSION")
    )
}

/// Compose the environment half of the child command: source the toolchain
/// environment, discarding its noise unless debugging.
pub fn make_build_env_cmd(
    pre_build_info: &PreBuildInfo,
    toolset: &Toolset,
    debugging: bool,
) -> Result<String> {
    let arch = vcvarsall_architecture(&pre_build_info.target_architecture, toolset)?;
    let target = vcvarsall_target(&pre_build_info.cmake_system_name)?;
    let tonull = if debugging { "" } else { " >nul" };

    Ok(format!(
        "\"{}\" {} {} {}{} 2>&1",
        toolset.vcvarsall.display(),
        toolset.vcvarsall_options.join(" "),
        arch,
        target,
        tonull
    ))
}

fn write_binary_control_file(paths: &InstallationPaths, bcf: &BinaryControlFile) -> Result<()> {
    let path = paths.binary_control_path(&bcf.core_paragraph.spec);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bcf.serialize())?;
    Ok(())
}

/// Build one package. Preconditions: every qualified dependency must
/// already be installed, otherwise the result cascades without attempting
/// anything.
pub fn build_package(
    paths: &InstallationPaths,
    config: &BuildPackageConfig<'_>,
    status_db: &StatusDb,
    resolver: &dyn ToolchainResolver,
    ctx: &RunContext,
) -> Result<ExtendedBuildResult> {
    let src = &config.scf.core_paragraph;
    let triplet = &config.triplet;
    let spec = PackageSpec::new(&src.name, triplet.clone())?;

    let mut missing = Vec::new();
    for dep in filter_dependencies(&src.depends, triplet) {
        if status_db.find_installed(&dep, triplet, None).is_none() {
            missing.push(PackageSpec::new(&dep, triplet.clone())?);
        }
    }
    if !missing.is_empty() {
        return Ok(ExtendedBuildResult {
            code: BuildResult::CascadedDueToMissingDependencies,
            unmet_dependencies: missing,
        });
    }

    let pre_build_info = PreBuildInfo::from_triplet_file(paths, triplet)?;
    let toolset = resolver.resolve(
        pre_build_info.platform_toolset.as_deref(),
        pre_build_info.visual_studio_path.as_deref(),
    )?;

    let features = config
        .feature_list
        .as_ref()
        .map(|list| list.join(";"))
        .unwrap_or_default();

    let cmd_launch_cmake = make_cmake_cmd(
        &paths.cmake_exe,
        &paths.ports_cmake(),
        &[
            ("CMD", "BUILD".to_string()),
            ("PORT", src.name.clone()),
            (
                "CURRENT_PORT_DIR",
                format!("{}/.", config.port_dir.to_string_lossy()),
            ),
            ("TARGET_TRIPLET", triplet.canonical_name().to_string()),
            ("VCPKG_PLATFORM_TOOLSET", toolset.version.clone()),
            (
                "VCPKG_USE_HEAD_VERSION",
                if config.options.use_head_version { "1" } else { "0" }.to_string(),
            ),
            (
                "_VCPKG_NO_DOWNLOADS",
                if config.options.allow_downloads { "0" } else { "1" }.to_string(),
            ),
            ("GIT", paths.git_exe.to_string_lossy().into_owned()),
            ("FEATURES", features),
        ],
    );

    let cmd_set_environment = make_build_env_cmd(&pre_build_info, &toolset, ctx.debugging)?;
    let command = format!("{} && {}", cmd_set_environment, cmd_launch_cmake);

    info!("building {}", spec);
    let timer = Instant::now();
    let return_code = cmd_execute(&command)?;
    let buildtimeus = timer.elapsed().as_micros() as f64;

    let spec_string = spec.to_string();
    ctx.metrics()
        .track_metric(&format!("buildtimeus-{}", spec_string), buildtimeus);
    if return_code != 0 {
        ctx.metrics().track_property("error", "build failed");
        ctx.metrics().track_property("build_error", &spec_string);
        return Ok(ExtendedBuildResult::of(BuildResult::BuildFailed));
    }

    let build_info = BuildInfo::read(&paths.build_info_path(&spec))?;
    let error_count = perform_all_checks(&spec, paths, &build_info)?;
    if error_count != 0 {
        return Ok(ExtendedBuildResult::of(BuildResult::PostBuildChecksFailed));
    }

    let mut core_paragraph = BinaryParagraph::from_source(src, triplet)?;
    if let Some(version) = &build_info.version {
        core_paragraph.version = version.clone();
    }

    let mut bcf = BinaryControlFile {
        core_paragraph,
        features: Vec::new(),
    };
    if let Some(feature_list) = &config.feature_list {
        for feature in feature_list {
            if let Some(fpgh) = config.scf.find_feature(feature) {
                bcf.features
                    .push(BinaryParagraph::from_feature(src, fpgh, triplet)?);
            }
        }
    }

    write_binary_control_file(paths, &bcf)?;

    Ok(ExtendedBuildResult::of(BuildResult::Succeeded))
}
