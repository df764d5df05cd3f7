// src/executor.rs

//! Sequential plan execution.
//!
//! Walks the action plan in order, applying removes and installs through
//! the build driver and installer. Each action's side effects (filesystem
//! and status database) are fully durable before the next action starts.
//! `keep_going` records failures and continues; otherwise the first
//! non-succeeded action aborts the run.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::build::{
    build_package, create_error_message, BuildPackageConfig, BuildPackageOptions, BuildResult,
    ToolchainResolver,
};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::install::{install_package, remove::remove_package, InstallResult};
use crate::paths::InstallationPaths;
use crate::resolver::{try_load_cached_package, AnyAction, InstallPlanAction, InstallPlanType, RequestType};
use crate::status::StatusDb;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub keep_going: bool,
}

/// Outcome of one plan action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub display_name: String,
    pub result: BuildResult,
    pub elapsed: Duration,
}

/// Results of a full plan run, in plan order.
#[derive(Debug, Default)]
pub struct ExecutionSummary {
    pub results: Vec<ActionResult>,
}

impl ExecutionSummary {
    /// Count per result code, every known code present.
    pub fn histogram(&self) -> BTreeMap<BuildResult, usize> {
        let mut summary: BTreeMap<BuildResult, usize> =
            BuildResult::ALL.iter().map(|r| (*r, 0)).collect();
        for action in &self.results {
            *summary.entry(action.result).or_insert(0) += 1;
        }
        summary
    }
}

fn perform_install_plan_action(
    paths: &InstallationPaths,
    action: &InstallPlanAction,
    build_options: &BuildPackageOptions,
    status_db: &mut StatusDb,
    resolver: &dyn ToolchainResolver,
    ctx: &RunContext,
) -> Result<BuildResult> {
    let is_user_requested = action.request_type == RequestType::UserRequested;

    match action.plan_type {
        InstallPlanType::AlreadyInstalled => {
            if build_options.use_head_version && is_user_requested {
                warn!(
                    "package {} is already installed -- not building from HEAD",
                    action.spec
                );
            } else {
                info!("package {} is already installed", action.spec);
            }
            Ok(BuildResult::Succeeded)
        }

        InstallPlanType::BuildAndInstall => {
            let scf = action.source.as_ref().ok_or_else(|| {
                Error::Install(format!("plan action for {} carries no port manifest", action.spec))
            })?;
            info!("building package {}...", action.displayname());

            let feature_list = (!action.features.is_empty())
                .then(|| action.features.iter().cloned().collect::<Vec<_>>());
            let config = BuildPackageConfig {
                scf,
                triplet: action.spec.triplet().clone(),
                port_dir: paths.port_dir(action.spec.name()),
                options: *build_options,
                feature_list,
            };

            let result = build_package(paths, &config, status_db, resolver, ctx)?;
            if result.code != BuildResult::Succeeded {
                error!("{}", create_error_message(result.code, &action.spec));
                for unmet in &result.unmet_dependencies {
                    error!("    missing dependency: {}", unmet);
                }
                return Ok(result.code);
            }
            info!("building package {}... done", action.displayname());

            let bcf = try_load_cached_package(paths, &action.spec)?.ok_or_else(|| {
                Error::Install(format!(
                    "build of {} reported success but left no binary manifest",
                    action.spec
                ))
            })?;
            info!("installing package {}...", action.displayname());
            match install_package(paths, &bcf, status_db)? {
                InstallResult::Success => {
                    info!("installing package {}... done", action.spec);
                    Ok(BuildResult::Succeeded)
                }
                InstallResult::FileConflicts => Ok(BuildResult::FileConflicts),
            }
        }

        InstallPlanType::Install => {
            if build_options.use_head_version && is_user_requested {
                warn!(
                    "package {} is already built -- not building from HEAD",
                    action.spec
                );
            }
            let bcf = action.binary.as_ref().ok_or_else(|| {
                Error::Install(format!(
                    "plan action for {} carries no binary manifest",
                    action.spec
                ))
            })?;
            info!("installing package {}...", action.spec);
            match install_package(paths, bcf, status_db)? {
                InstallResult::Success => {
                    info!("installing package {}... done", action.spec);
                    Ok(BuildResult::Succeeded)
                }
                InstallResult::FileConflicts => Ok(BuildResult::FileConflicts),
            }
        }
    }
}

/// Execute the plan in order. Returns per-action results; fails fast on
/// the first non-succeeded action unless `keep_going` is set.
pub fn execute_plan(
    paths: &InstallationPaths,
    plan: &[AnyAction],
    build_options: &BuildPackageOptions,
    execute_options: &ExecuteOptions,
    status_db: &mut StatusDb,
    resolver: &dyn ToolchainResolver,
    ctx: &RunContext,
) -> Result<ExecutionSummary> {
    let mut summary = ExecutionSummary::default();
    let total = plan.len();

    for (index, action) in plan.iter().enumerate() {
        let display_name = action.spec().to_string();
        info!("starting package {}/{}: {}", index + 1, total, display_name);
        let timer = Instant::now();

        let result = match action {
            AnyAction::Install(install_action) => {
                let result = perform_install_plan_action(
                    paths,
                    install_action,
                    build_options,
                    status_db,
                    resolver,
                    ctx,
                )?;
                if result != BuildResult::Succeeded && !execute_options.keep_going {
                    summary.results.push(ActionResult {
                        display_name: display_name.clone(),
                        result,
                        elapsed: timer.elapsed(),
                    });
                    return Err(Error::Build {
                        spec: display_name,
                        result: result.to_string(),
                    });
                }
                result
            }
            AnyAction::Remove(remove_action) => {
                match remove_package(paths, &remove_action.spec, status_db) {
                    Ok(()) => {
                        info!("removed package {}", remove_action.spec);
                        BuildResult::Nullvalue
                    }
                    Err(e) if execute_options.keep_going => {
                        warn!("failed to remove {}: {}", remove_action.spec, e);
                        BuildResult::Nullvalue
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let elapsed = timer.elapsed();
        info!(
            "elapsed time for package {}: {:.1?}",
            display_name, elapsed
        );
        summary.results.push(ActionResult {
            display_name,
            result,
            elapsed,
        });
    }

    Ok(summary)
}
