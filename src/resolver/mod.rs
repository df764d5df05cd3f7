// src/resolver/mod.rs

//! Dependency planners.
//!
//! Both planners turn (requested specs, status database, port registry)
//! into an ordered action plan. The legacy planner is featureless and emits
//! only install actions; the feature-aware planner additionally handles
//! feature closures, and rebuilds (remove + install) for packages whose
//! installed feature set is missing something that is now required.
//!
//! All emitted orders put dependencies before dependents, with
//! lexicographic tie-breaks, so identical inputs always give identical
//! plans.

mod graph;
mod plan;

pub use graph::DependencyGraph;
pub use plan::{
    group_plan, to_output_string, AnyAction, GroupedPlan, InstallPlanAction, InstallPlanType,
    RemovePlanAction, RemovePlanType, RequestType,
};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;

use tracing::debug;

use crate::error::{Error, Result};
use crate::manifest::{filter_dependencies, BinaryControlFile, SourceControlFile};
use crate::paragraph::parse_paragraphs;
use crate::paths::InstallationPaths;
use crate::ports::PortRegistry;
use crate::spec::{FeatureSpec, PackageSpec, CORE_FEATURE};
use crate::status::{InstallState, StatusDb};

/// Load the binary manifest from the package sandbox, if the package has
/// been built there. A present CONTROL file marks a completed build.
pub fn try_load_cached_package(
    paths: &InstallationPaths,
    spec: &PackageSpec,
) -> Result<Option<BinaryControlFile>> {
    let control_path = paths.binary_control_path(spec);
    if !control_path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&control_path)?;
    let paragraphs = parse_paragraphs(&text).map_err(|e| e.in_file(&control_path))?;
    Ok(Some(BinaryControlFile::from_paragraphs(&paragraphs)?))
}

struct ExaminedSpec {
    plan_type: InstallPlanType,
    source: Option<SourceControlFile>,
    binary: Option<BinaryControlFile>,
    deps: Vec<PackageSpec>,
}

/// The legacy (featureless) planner.
///
/// Walks the requested specs and their transitive dependencies, deciding
/// per spec whether it is already installed, has a cached binary, or must
/// be built from its port. Dependencies are drawn from the decisive
/// manifest in each case so an installed package is never re-resolved
/// against a newer port.
pub fn create_install_plan(
    registry: &PortRegistry,
    requested: &[PackageSpec],
    status_db: &StatusDb,
    paths: &InstallationPaths,
) -> Result<Vec<InstallPlanAction>> {
    let mut request_types: BTreeMap<PackageSpec, RequestType> = BTreeMap::new();
    let mut worklist: VecDeque<PackageSpec> = VecDeque::new();
    for spec in requested {
        // Duplicate user requests collapse to one action.
        if request_types
            .insert(spec.clone(), RequestType::UserRequested)
            .is_none()
        {
            worklist.push_back(spec.clone());
        }
    }

    let mut examined: BTreeMap<PackageSpec, ExaminedSpec> = BTreeMap::new();

    while let Some(spec) = worklist.pop_front() {
        if examined.contains_key(&spec) {
            continue;
        }

        let exam = if let Some(record) = status_db.find_installed(spec.name(), spec.triplet(), None)
        {
            let deps = record
                .package
                .depends
                .iter()
                .map(|d| PackageSpec::new(d, spec.triplet().clone()))
                .collect::<Result<Vec<_>>>()?;
            ExaminedSpec {
                plan_type: InstallPlanType::AlreadyInstalled,
                source: None,
                binary: None,
                deps,
            }
        } else if let Some(bcf) = try_load_cached_package(paths, &spec)? {
            let deps = bcf
                .core_paragraph
                .depends
                .iter()
                .map(|d| PackageSpec::new(d, spec.triplet().clone()))
                .collect::<Result<Vec<_>>>()?;
            ExaminedSpec {
                plan_type: InstallPlanType::Install,
                source: None,
                binary: Some(bcf),
                deps,
            }
        } else {
            let scf = registry
                .find(spec.name())
                .ok_or_else(|| Error::PackageNotFound(spec.name().to_string()))?;
            let deps = filter_dependencies(&scf.core_paragraph.depends, spec.triplet())
                .into_iter()
                .map(|d| PackageSpec::new(&d, spec.triplet().clone()))
                .collect::<Result<Vec<_>>>()?;
            ExaminedSpec {
                plan_type: InstallPlanType::BuildAndInstall,
                source: Some(scf.clone()),
                binary: None,
                deps,
            }
        };

        for dep in &exam.deps {
            if !examined.contains_key(dep) && !request_types.contains_key(dep) {
                request_types.insert(dep.clone(), RequestType::AutoSelected);
                worklist.push_back(dep.clone());
            }
        }
        examined.insert(spec, exam);
    }

    let mut graph = DependencyGraph::new();
    for (spec, exam) in &examined {
        graph.add_node(spec.to_string());
        for dep in &exam.deps {
            graph.add_edge(spec.to_string(), dep.to_string());
        }
    }

    let order = graph.install_order()?;
    debug!("install order: {}", order.join(", "));

    let mut by_name: BTreeMap<String, (PackageSpec, ExaminedSpec)> = examined
        .into_iter()
        .map(|(spec, exam)| (spec.to_string(), (spec, exam)))
        .collect();

    let mut actions = Vec::with_capacity(order.len());
    for name in order {
        let (spec, exam) = by_name
            .remove(&name)
            .expect("ordered nodes come from the examined set");
        let request_type = request_types
            .get(&spec)
            .copied()
            .unwrap_or(RequestType::AutoSelected);
        actions.push(InstallPlanAction {
            spec,
            plan_type: exam.plan_type,
            request_type,
            source: exam.source,
            binary: exam.binary,
            features: BTreeSet::new(),
        });
    }
    Ok(actions)
}

struct Cluster<'a> {
    required: BTreeSet<String>,
    deps: BTreeSet<PackageSpec>,
    request_type: RequestType,
    source: Option<&'a SourceControlFile>,
    installed: BTreeSet<String>,
    half_installed: bool,
}

/// The feature-aware planner.
///
/// A package's effective feature set is the union of what was requested
/// and what is already installed; features are additive, and shrinking the
/// set requires an explicit remove. When the installed set is a strict
/// subset of what is now required, the spec is rebuilt: removed first, then
/// built and installed with the full set.
pub fn create_feature_install_plan(
    registry: &PortRegistry,
    requested: &[FeatureSpec],
    status_db: &StatusDb,
) -> Result<Vec<AnyAction>> {
    let mut clusters: BTreeMap<PackageSpec, Cluster<'_>> = BTreeMap::new();
    let mut worklist: VecDeque<(PackageSpec, String, RequestType)> = VecDeque::new();

    let explicit_core: BTreeSet<&PackageSpec> = requested
        .iter()
        .filter(|fs| fs.explicit_core)
        .map(|fs| &fs.spec)
        .collect();

    for fs in requested {
        worklist.push_back((fs.spec.clone(), fs.feature.clone(), RequestType::UserRequested));
    }

    while let Some((spec, feature, request_type)) = worklist.pop_front() {
        if !clusters.contains_key(&spec) {
            let mut installed = BTreeSet::new();
            let mut half_installed = false;
            for record in status_db.iter() {
                if record.package.spec != spec {
                    continue;
                }
                let feature_name = record
                    .package
                    .feature
                    .clone()
                    .unwrap_or_else(|| CORE_FEATURE.to_string());
                if record.is_installed() {
                    installed.insert(feature_name.clone());
                }
                if record.state == InstallState::HalfInstalled {
                    half_installed = true;
                }
            }

            let cluster = Cluster {
                required: BTreeSet::new(),
                deps: BTreeSet::new(),
                request_type,
                source: registry.find(spec.name()),
                installed: installed.clone(),
                half_installed,
            };
            clusters.insert(spec.clone(), cluster);

            // Installed features stay part of the effective set, so their
            // dependencies must re-enter the closure too.
            for feature_name in installed {
                worklist.push_back((spec.clone(), feature_name, request_type));
            }

            // Default features apply unless the user pinned this spec to
            // bare core.
            if !explicit_core.contains(&spec) {
                let defaults = default_features_of(registry, status_db, &spec);
                for default in defaults {
                    worklist.push_back((spec.clone(), default, request_type));
                }
            }
        }

        let cluster = clusters.get_mut(&spec).expect("cluster inserted above");
        if request_type == RequestType::UserRequested {
            cluster.request_type = RequestType::UserRequested;
        }
        if !cluster.required.insert(feature.clone()) {
            continue;
        }

        let feature_opt = if feature == CORE_FEATURE {
            None
        } else {
            Some(feature.as_str())
        };

        // Dependency names for this (spec, feature): prefer the installed
        // record (already projected through the triplet at build time),
        // otherwise consult the port.
        let dep_names: Vec<String> =
            if let Some(record) = status_db.find_installed(spec.name(), spec.triplet(), feature_opt)
            {
                record.package.depends.clone()
            } else {
                let scf = cluster
                    .source
                    .ok_or_else(|| Error::PackageNotFound(spec.name().to_string()))?;
                let depends = scf.feature_dependencies(&feature)?;
                filter_dependencies(depends, spec.triplet())
            };

        for dep_name in dep_names {
            let dep_spec = PackageSpec::new(&dep_name, spec.triplet().clone())?;
            clusters
                .get_mut(&spec)
                .expect("cluster exists")
                .deps
                .insert(dep_spec.clone());
            worklist.push_back((dep_spec, CORE_FEATURE.to_string(), RequestType::AutoSelected));
        }
    }

    // Decide per cluster, then order over the union graph.
    let mut graph = DependencyGraph::new();
    for (spec, cluster) in &clusters {
        graph.add_node(spec.to_string());
        for dep in &cluster.deps {
            graph.add_edge(spec.to_string(), dep.to_string());
        }
    }
    let order = graph.install_order()?;

    let mut removes = Vec::new();
    let mut installs = Vec::new();
    for name in &order {
        let (spec, cluster) = clusters
            .iter()
            .find(|(spec, _)| spec.to_string() == *name)
            .expect("ordered nodes come from the cluster set");

        let needs_rebuild = cluster.half_installed
            || (!cluster.installed.is_empty()
                && !cluster.required.is_subset(&cluster.installed));
        let fully_installed =
            !cluster.half_installed && cluster.required.is_subset(&cluster.installed);

        let mut effective: BTreeSet<String> = cluster.required.clone();
        effective.extend(cluster.installed.iter().cloned());

        if fully_installed {
            installs.push(InstallPlanAction {
                spec: spec.clone(),
                plan_type: InstallPlanType::AlreadyInstalled,
                request_type: cluster.request_type,
                source: None,
                binary: None,
                features: effective,
            });
            continue;
        }

        if needs_rebuild {
            removes.push(RemovePlanAction {
                spec: spec.clone(),
                plan_type: RemovePlanType::Remove,
                request_type: cluster.request_type,
            });
        }

        let scf = cluster
            .source
            .ok_or_else(|| Error::PackageNotFound(spec.name().to_string()))?;
        installs.push(InstallPlanAction {
            spec: spec.clone(),
            plan_type: InstallPlanType::BuildAndInstall,
            request_type: cluster.request_type,
            source: Some(scf.clone()),
            binary: None,
            features: effective,
        });
    }

    // Removes precede every install; dependents are removed before the
    // packages they depend on.
    removes.reverse();
    let mut plan: Vec<AnyAction> = removes.into_iter().map(AnyAction::Remove).collect();
    plan.extend(installs.into_iter().map(AnyAction::Install));
    Ok(plan)
}

fn default_features_of(
    registry: &PortRegistry,
    status_db: &StatusDb,
    spec: &PackageSpec,
) -> Vec<String> {
    if let Some(scf) = registry.find(spec.name()) {
        return scf.core_paragraph.default_features.clone();
    }
    if let Some(record) = status_db.find_installed(spec.name(), spec.triplet(), None) {
        return record.package.default_features.clone();
    }
    Vec::new()
}

/// Plan removals for the requested specs, pulling in installed dependents.
///
/// Dependents are ordered before the packages they depend on. Specs that
/// are not installed get a `NotInstalled` marker action so the front-end
/// can report them.
pub fn create_remove_plan(
    requested: &[PackageSpec],
    status_db: &StatusDb,
) -> Result<Vec<RemovePlanAction>> {
    let mut request_types: BTreeMap<PackageSpec, RequestType> = BTreeMap::new();
    let mut worklist: VecDeque<PackageSpec> = VecDeque::new();
    let mut not_installed = Vec::new();

    for spec in requested {
        if request_types.contains_key(spec) {
            continue;
        }
        if status_db.find(spec.name(), spec.triplet(), None).is_none() {
            not_installed.push(spec.clone());
            request_types.insert(spec.clone(), RequestType::UserRequested);
            continue;
        }
        request_types.insert(spec.clone(), RequestType::UserRequested);
        worklist.push_back(spec.clone());
    }

    // Transitive closure of installed dependents: removing a package also
    // removes everything that needs it.
    let mut to_remove: BTreeSet<PackageSpec> = BTreeSet::new();
    while let Some(spec) = worklist.pop_front() {
        if !to_remove.insert(spec.clone()) {
            continue;
        }
        for record in status_db.iter() {
            if record.package.feature.is_some() {
                continue;
            }
            if record.package.spec.triplet() != spec.triplet() {
                continue;
            }
            if record.package.depends.iter().any(|d| d == spec.name()) {
                let dependent = record.package.spec.clone();
                request_types
                    .entry(dependent.clone())
                    .or_insert(RequestType::AutoSelected);
                worklist.push_back(dependent);
            }
        }
    }

    let mut graph = DependencyGraph::new();
    for spec in &to_remove {
        graph.add_node(spec.to_string());
        if let Some(record) = status_db.find(spec.name(), spec.triplet(), None) {
            for dep in &record.package.depends {
                let dep_spec = PackageSpec::new(dep, spec.triplet().clone())?;
                if to_remove.contains(&dep_spec) {
                    graph.add_edge(spec.to_string(), dep_spec.to_string());
                }
            }
        }
    }
    let mut order = graph.install_order()?;
    order.reverse();

    let mut actions = Vec::new();
    for name in order {
        let spec = to_remove
            .iter()
            .find(|spec| spec.to_string() == name)
            .expect("ordered nodes come from the removal set")
            .clone();
        let request_type = request_types[&spec];
        actions.push(RemovePlanAction {
            spec,
            plan_type: RemovePlanType::Remove,
            request_type,
        });
    }
    for spec in not_installed {
        actions.push(RemovePlanAction {
            spec,
            plan_type: RemovePlanType::NotInstalled,
            request_type: RequestType::UserRequested,
        });
    }
    Ok(actions)
}
