// tests/features.rs

//! Feature-aware planner scenarios.

mod common;

use std::collections::BTreeSet;

use common::{binary_paragraph, install_fake_package, setup, spec, triplet, write_port};
use quarry::ports::PortRegistry;
use quarry::resolver::{create_feature_install_plan, AnyAction, InstallPlanType, RequestType};
use quarry::spec::{FeatureSpec, FullPackageSpec};
use quarry::status::{InstallState, StatusDb, StatusParagraph, Want};
use quarry::Error;

fn registry(paths: &quarry::InstallationPaths) -> PortRegistry {
    let results = PortRegistry::load_all(&paths.ports).unwrap();
    assert!(results.errors.is_empty(), "{:?}", results.errors);
    results.registry
}

fn request(text: &str) -> Vec<FeatureSpec> {
    let full = FullPackageSpec::parse(text, &triplet(common::TRIPLET)).unwrap();
    FullPackageSpec::to_feature_specs(std::slice::from_ref(&full))
}

fn features(set: &BTreeSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}

#[test]
fn feature_addition_rebuilds_with_union() {
    // c installed bare; requesting c[x] (which pulls d) must remove c,
    // build d, then rebuild c with {core,x}.
    let root = setup();
    write_port(&root.paths, "d", "Source: d\nVersion: 1\n");
    write_port(
        &root.paths,
        "c",
        "Source: c\nVersion: 1\n\nFeature: x\nDescription: extra\nBuild-Depends: d\n",
    );

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    install_fake_package(&root.paths, &mut status_db, "c", "1", &[], &["lib/c.lib"]);

    let plan =
        create_feature_install_plan(&registry(&root.paths), &request("c[x]"), &status_db).unwrap();

    assert_eq!(plan.len(), 3);
    match &plan[0] {
        AnyAction::Remove(remove) => assert_eq!(remove.spec, spec("c")),
        other => panic!("expected remove first, got {:?}", other),
    }
    match &plan[1] {
        AnyAction::Install(install) => {
            assert_eq!(install.spec, spec("d"));
            assert_eq!(install.plan_type, InstallPlanType::BuildAndInstall);
            assert_eq!(install.request_type, RequestType::AutoSelected);
        }
        other => panic!("expected install of d, got {:?}", other),
    }
    match &plan[2] {
        AnyAction::Install(install) => {
            assert_eq!(install.spec, spec("c"));
            assert_eq!(install.plan_type, InstallPlanType::BuildAndInstall);
            assert_eq!(install.request_type, RequestType::UserRequested);
            assert_eq!(features(&install.features), vec!["core", "x"]);
        }
        other => panic!("expected rebuild of c, got {:?}", other),
    }
}

#[test]
fn satisfied_feature_set_is_already_installed() {
    let root = setup();
    write_port(
        &root.paths,
        "c",
        "Source: c\nVersion: 1\n\nFeature: x\nBuild-Depends:\n",
    );

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    install_fake_package(&root.paths, &mut status_db, "c", "1", &[], &["lib/c.lib"]);
    status_db
        .write_update(StatusParagraph::new(
            binary_paragraph("c", "1", Some("x"), &[]),
            Want::Install,
            InstallState::Installed,
        ))
        .unwrap();

    let plan =
        create_feature_install_plan(&registry(&root.paths), &request("c[x]"), &status_db).unwrap();
    assert_eq!(plan.len(), 1);
    match &plan[0] {
        AnyAction::Install(install) => {
            assert_eq!(install.plan_type, InstallPlanType::AlreadyInstalled);
        }
        other => panic!("expected already-installed, got {:?}", other),
    }
}

#[test]
fn default_features_apply_to_fresh_installs() {
    let root = setup();
    write_port(&root.paths, "tlslib", "Source: tlslib\nVersion: 1\n");
    write_port(
        &root.paths,
        "curl",
        "Source: curl\nVersion: 1\nDefault-Features: tls\n\n\
         Feature: tls\nBuild-Depends: tlslib\n",
    );

    let status_db = StatusDb::load(&root.paths).unwrap();
    let plan =
        create_feature_install_plan(&registry(&root.paths), &request("curl"), &status_db).unwrap();

    let curl = plan
        .iter()
        .find_map(|a| match a {
            AnyAction::Install(i) if i.spec.name() == "curl" => Some(i),
            _ => None,
        })
        .unwrap();
    assert_eq!(features(&curl.features), vec!["core", "tls"]);
    assert!(plan.iter().any(|a| a.spec().name() == "tlslib"));
}

#[test]
fn explicit_core_suppresses_default_features() {
    let root = setup();
    write_port(&root.paths, "tlslib", "Source: tlslib\nVersion: 1\n");
    write_port(
        &root.paths,
        "curl",
        "Source: curl\nVersion: 1\nDefault-Features: tls\n\n\
         Feature: tls\nBuild-Depends: tlslib\n",
    );

    let status_db = StatusDb::load(&root.paths).unwrap();
    let plan =
        create_feature_install_plan(&registry(&root.paths), &request("curl[core]"), &status_db)
            .unwrap();

    assert_eq!(plan.len(), 1);
    match &plan[0] {
        AnyAction::Install(install) => {
            assert_eq!(install.spec.name(), "curl");
            assert_eq!(features(&install.features), vec!["core"]);
        }
        other => panic!("expected bare install of curl, got {:?}", other),
    }
}

#[test]
fn depended_on_packages_get_their_default_features() {
    let root = setup();
    write_port(&root.paths, "zstd", "Source: zstd\nVersion: 1\n");
    write_port(
        &root.paths,
        "archive",
        "Source: archive\nVersion: 1\nDefault-Features: zstd\n\n\
         Feature: zstd\nBuild-Depends: zstd\n",
    );
    write_port(&root.paths, "app", "Source: app\nVersion: 1\nBuild-Depends: archive\n");

    let status_db = StatusDb::load(&root.paths).unwrap();
    let plan =
        create_feature_install_plan(&registry(&root.paths), &request("app"), &status_db).unwrap();

    let archive = plan
        .iter()
        .find_map(|a| match a {
            AnyAction::Install(i) if i.spec.name() == "archive" => Some(i),
            _ => None,
        })
        .unwrap();
    assert_eq!(features(&archive.features), vec!["core", "zstd"]);
    assert!(plan.iter().any(|a| a.spec().name() == "zstd"));
}

#[test]
fn unknown_feature_is_fatal() {
    let root = setup();
    write_port(&root.paths, "c", "Source: c\nVersion: 1\n");

    let status_db = StatusDb::load(&root.paths).unwrap();
    let err = create_feature_install_plan(&registry(&root.paths), &request("c[nope]"), &status_db)
        .unwrap_err();
    match err {
        Error::UnknownFeature { package, feature } => {
            assert_eq!(package, "c");
            assert_eq!(feature, "nope");
        }
        other => panic!("expected UnknownFeature, got {:?}", other),
    }
}

#[test]
fn half_installed_package_is_rebuilt() {
    // Crash recovery: a half-installed record forces remove + rebuild even
    // when the requested feature set matches.
    let root = setup();
    write_port(&root.paths, "c", "Source: c\nVersion: 1\n");

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    status_db
        .write_update(StatusParagraph::new(
            binary_paragraph("c", "1", None, &[]),
            Want::Install,
            InstallState::HalfInstalled,
        ))
        .unwrap();

    let plan =
        create_feature_install_plan(&registry(&root.paths), &request("c"), &status_db).unwrap();

    assert_eq!(plan.len(), 2);
    assert!(matches!(&plan[0], AnyAction::Remove(_)));
    match &plan[1] {
        AnyAction::Install(install) => {
            assert_eq!(install.plan_type, InstallPlanType::BuildAndInstall);
        }
        other => panic!("expected rebuild, got {:?}", other),
    }
}

#[test]
fn unknown_package_is_fatal_in_feature_mode() {
    let root = setup();
    let status_db = StatusDb::load(&root.paths).unwrap();
    let err = create_feature_install_plan(&registry(&root.paths), &request("ghost"), &status_db)
        .unwrap_err();
    assert!(matches!(err, Error::PackageNotFound(_)));
}
