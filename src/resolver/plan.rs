// src/resolver/plan.rs

//! Action plan value types.
//!
//! A plan is an ordered list of tagged actions. Install actions own the
//! manifest they will act on: the parsed port for build-and-install, or the
//! cached binary manifest for a direct install. Plans are values produced by
//! the planners and consumed by the executor; they are never persisted.

use std::collections::BTreeSet;

use crate::manifest::{BinaryControlFile, SourceControlFile};
use crate::spec::PackageSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPlanType {
    AlreadyInstalled,
    /// Install from the cached binary manifest in the package sandbox.
    Install,
    BuildAndInstall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    UserRequested,
    AutoSelected,
}

#[derive(Debug, Clone)]
pub struct InstallPlanAction {
    pub spec: PackageSpec,
    pub plan_type: InstallPlanType,
    pub request_type: RequestType,
    /// Owned port manifest for `BuildAndInstall`.
    pub source: Option<SourceControlFile>,
    /// Owned binary manifest for `Install`.
    pub binary: Option<BinaryControlFile>,
    /// Selected features, `core` included. Empty in legacy (featureless)
    /// plans.
    pub features: BTreeSet<String>,
}

impl InstallPlanAction {
    pub fn displayname(&self) -> String {
        if self.features.is_empty() {
            return self.spec.to_string();
        }
        let features: Vec<&str> = self.features.iter().map(String::as_str).collect();
        format!(
            "{}[{}]:{}",
            self.spec.name(),
            features.join(","),
            self.spec.triplet()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovePlanType {
    Remove,
    NotInstalled,
}

#[derive(Debug, Clone)]
pub struct RemovePlanAction {
    pub spec: PackageSpec,
    pub plan_type: RemovePlanType,
    pub request_type: RequestType,
}

/// One step of a plan.
#[derive(Debug, Clone)]
pub enum AnyAction {
    Install(InstallPlanAction),
    Remove(RemovePlanAction),
}

impl AnyAction {
    pub fn spec(&self) -> &PackageSpec {
        match self {
            AnyAction::Install(a) => &a.spec,
            AnyAction::Remove(a) => &a.spec,
        }
    }
}

/// Marker prefix for entries the user did not ask for directly.
pub fn to_output_string(request_type: RequestType, display: &str) -> String {
    match request_type {
        RequestType::AutoSelected => format!("  * {}", display),
        RequestType::UserRequested => format!("    {}", display),
    }
}

/// The plan regrouped for presentation.
#[derive(Debug, Default)]
pub struct GroupedPlan {
    /// User-requested specs that need nothing done.
    pub already_installed: Vec<String>,
    /// Specs with both a remove and an install in the plan.
    pub rebuilt: Vec<String>,
    /// Fresh build-and-install entries.
    pub new_installs: Vec<String>,
    /// Direct installs from a cached binary.
    pub only_install: Vec<String>,
    pub has_auto_selected: bool,
    pub has_rebuilds: bool,
}

/// Group actions into display buckets, each sorted by name.
///
/// Removes are guaranteed to precede installs of the same spec, so a
/// remove seen earlier marks its install as a rebuild.
pub fn group_plan(plan: &[AnyAction]) -> GroupedPlan {
    let mut grouped = GroupedPlan::default();
    let mut removed_specs: BTreeSet<&PackageSpec> = BTreeSet::new();

    for action in plan {
        match action {
            AnyAction::Remove(remove) => {
                if remove.plan_type == RemovePlanType::Remove {
                    removed_specs.insert(&remove.spec);
                }
            }
            AnyAction::Install(install) => {
                if install.request_type == RequestType::AutoSelected {
                    grouped.has_auto_selected = true;
                }
                let line = to_output_string(install.request_type, &install.displayname());
                if removed_specs.contains(&install.spec) {
                    grouped.rebuilt.push(line);
                } else {
                    match install.plan_type {
                        InstallPlanType::AlreadyInstalled => {
                            if install.request_type == RequestType::UserRequested {
                                grouped.already_installed.push(line);
                            }
                        }
                        InstallPlanType::Install => grouped.only_install.push(line),
                        InstallPlanType::BuildAndInstall => grouped.new_installs.push(line),
                    }
                }
            }
        }
    }

    grouped.already_installed.sort();
    grouped.rebuilt.sort();
    grouped.new_installs.sort();
    grouped.only_install.sort();
    grouped.has_rebuilds = !grouped.rebuilt.is_empty();
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Triplet;

    fn spec(name: &str) -> PackageSpec {
        PackageSpec::new(name, Triplet::from_canonical_name("x64-windows").unwrap()).unwrap()
    }

    fn install(name: &str, plan_type: InstallPlanType, request_type: RequestType) -> AnyAction {
        AnyAction::Install(InstallPlanAction {
            spec: spec(name),
            plan_type,
            request_type,
            source: None,
            binary: None,
            features: BTreeSet::new(),
        })
    }

    #[test]
    fn test_group_plan_buckets() {
        let plan = vec![
            AnyAction::Remove(RemovePlanAction {
                spec: spec("curl"),
                plan_type: RemovePlanType::Remove,
                request_type: RequestType::UserRequested,
            }),
            install("zlib", InstallPlanType::BuildAndInstall, RequestType::AutoSelected),
            install("curl", InstallPlanType::BuildAndInstall, RequestType::UserRequested),
            install("bzip2", InstallPlanType::AlreadyInstalled, RequestType::UserRequested),
            install("openssl", InstallPlanType::Install, RequestType::UserRequested),
        ];

        let grouped = group_plan(&plan);
        assert_eq!(grouped.rebuilt.len(), 1);
        assert!(grouped.rebuilt[0].contains("curl"));
        assert_eq!(grouped.new_installs.len(), 1);
        assert!(grouped.new_installs[0].starts_with("  * "));
        assert_eq!(grouped.already_installed.len(), 1);
        assert_eq!(grouped.only_install.len(), 1);
        assert!(grouped.has_auto_selected);
        assert!(grouped.has_rebuilds);
    }

    #[test]
    fn test_auto_selected_already_installed_hidden() {
        let plan = vec![install(
            "zlib",
            InstallPlanType::AlreadyInstalled,
            RequestType::AutoSelected,
        )];
        let grouped = group_plan(&plan);
        assert!(grouped.already_installed.is_empty());
    }

    #[test]
    fn test_displayname_with_features() {
        let mut features = BTreeSet::new();
        features.insert("core".to_string());
        features.insert("tls".to_string());
        let action = InstallPlanAction {
            spec: spec("curl"),
            plan_type: InstallPlanType::BuildAndInstall,
            request_type: RequestType::UserRequested,
            source: None,
            binary: None,
            features,
        };
        assert_eq!(action.displayname(), "curl[core,tls]:x64-windows");
    }
}
