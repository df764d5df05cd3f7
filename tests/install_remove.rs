// tests/install_remove.rs

//! Installer, remover, and executor scenarios against a real prefix.

mod common;

use common::{setup, spec, write_sandbox};
use quarry::build::{BuildPackageOptions, BuildResult, KnownToolchains};
use quarry::executor::{execute_plan, ExecuteOptions};
use quarry::install::{install_package, remove::remove_package, InstallResult};
use quarry::resolver::{create_install_plan, try_load_cached_package, AnyAction};
use quarry::status::StatusDb;
use quarry::{Error, RunContext};

#[test]
fn install_then_remove_roundtrip() {
    let root = setup();
    write_sandbox(&root.paths, "zlib", "1.2.11", &[], &["include/zlib.h", "lib/zlib.lib"]);

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    let bcf = try_load_cached_package(&root.paths, &spec("zlib"))
        .unwrap()
        .unwrap();

    let result = install_package(&root.paths, &bcf, &mut status_db).unwrap();
    assert_eq!(result, InstallResult::Success);

    let prefix = root.dir.path().join("installed/x64-windows");
    assert!(prefix.join("include/zlib.h").is_file());
    assert!(status_db
        .find_installed("zlib", spec("zlib").triplet(), None)
        .is_some());
    let listfile = root
        .paths
        .info_dir
        .join("zlib_1.2.11_x64-windows.list");
    assert!(listfile.is_file());

    remove_package(&root.paths, &spec("zlib"), &mut status_db).unwrap();
    assert!(!prefix.join("include/zlib.h").exists());
    assert!(!listfile.exists());
    assert!(status_db.find("zlib", spec("zlib").triplet(), None).is_none());

    // Reload sees the same logical state.
    let reloaded = StatusDb::load(&root.paths).unwrap();
    assert!(reloaded.find("zlib", spec("zlib").triplet(), None).is_none());
}

#[test]
fn conflicting_file_blocks_second_install() {
    // p and q both produce bin/tool.exe. Installing p succeeds; installing
    // q reports FILE_CONFLICTS, leaves the prefix untouched and q
    // effectively not-installed.
    let root = setup();
    write_sandbox(&root.paths, "p", "1", &[], &["bin/tool.exe"]);
    write_sandbox(&root.paths, "q", "1", &[], &["bin/tool.exe", "bin/q-only.exe"]);

    let mut status_db = StatusDb::load(&root.paths).unwrap();

    let p = try_load_cached_package(&root.paths, &spec("p")).unwrap().unwrap();
    assert_eq!(
        install_package(&root.paths, &p, &mut status_db).unwrap(),
        InstallResult::Success
    );

    let q = try_load_cached_package(&root.paths, &spec("q")).unwrap().unwrap();
    assert_eq!(
        install_package(&root.paths, &q, &mut status_db).unwrap(),
        InstallResult::FileConflicts
    );

    let prefix = root.dir.path().join("installed/x64-windows");
    assert!(prefix.join("bin/tool.exe").is_file());
    assert!(!prefix.join("bin/q-only.exe").exists());
    assert!(status_db.find("q", spec("q").triplet(), None).is_none());

    // And the state survives a reload unchanged.
    let reloaded = StatusDb::load(&root.paths).unwrap();
    assert!(reloaded.find_installed("p", spec("p").triplet(), None).is_some());
    assert!(reloaded.find("q", spec("q").triplet(), None).is_none());
}

#[test]
fn listfiles_within_a_triplet_stay_disjoint() {
    let root = setup();
    write_sandbox(&root.paths, "a", "1", &[], &["include/a.h", "lib/a.lib"]);
    write_sandbox(&root.paths, "b", "1", &[], &["include/b.h", "lib/b.lib"]);

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    for name in ["a", "b"] {
        let bcf = try_load_cached_package(&root.paths, &spec(name)).unwrap().unwrap();
        assert_eq!(
            install_package(&root.paths, &bcf, &mut status_db).unwrap(),
            InstallResult::Success
        );
    }

    let mut files: Vec<String> = Vec::new();
    for (_, listed) in status_db.get_installed_files().unwrap() {
        files.extend(listed.into_iter().filter(|l| !l.ends_with('/')));
    }
    let total = files.len();
    files.sort();
    files.dedup();
    assert_eq!(files.len(), total, "duplicate file path across listfiles");
}

#[test]
fn executor_keep_going_records_conflicts_and_continues() {
    let root = setup();
    write_sandbox(&root.paths, "p", "1", &[], &["bin/tool.exe"]);
    write_sandbox(&root.paths, "q", "1", &[], &["bin/tool.exe"]);
    write_sandbox(&root.paths, "r", "1", &[], &["bin/r.exe"]);

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    let registry = quarry::ports::PortRegistry::load_all(&root.paths.ports)
        .unwrap()
        .registry;
    let plan: Vec<AnyAction> = create_install_plan(
        &registry,
        &[spec("p"), spec("q"), spec("r")],
        &status_db,
        &root.paths,
    )
    .unwrap()
    .into_iter()
    .map(AnyAction::Install)
    .collect();

    let summary = execute_plan(
        &root.paths,
        &plan,
        &BuildPackageOptions::default(),
        &ExecuteOptions { keep_going: true },
        &mut status_db,
        &KnownToolchains::default(),
        &RunContext::new(),
    )
    .unwrap();

    let histogram = summary.histogram();
    assert_eq!(histogram[&BuildResult::Succeeded], 2);
    assert_eq!(histogram[&BuildResult::FileConflicts], 1);
}

#[test]
fn executor_fail_fast_stops_at_first_conflict() {
    let root = setup();
    write_sandbox(&root.paths, "p", "1", &[], &["bin/tool.exe"]);
    write_sandbox(&root.paths, "q", "1", &[], &["bin/tool.exe"]);

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    let registry = quarry::ports::PortRegistry::load_all(&root.paths.ports)
        .unwrap()
        .registry;
    let plan: Vec<AnyAction> =
        create_install_plan(&registry, &[spec("p"), spec("q")], &status_db, &root.paths)
            .unwrap()
            .into_iter()
            .map(AnyAction::Install)
            .collect();

    let err = execute_plan(
        &root.paths,
        &plan,
        &BuildPackageOptions::default(),
        &ExecuteOptions { keep_going: false },
        &mut status_db,
        &KnownToolchains::default(),
        &RunContext::new(),
    )
    .unwrap_err();

    match err {
        Error::Build { spec: failed, result } => {
            assert_eq!(failed, "q:x64-windows");
            assert_eq!(result, "FILE_CONFLICTS");
        }
        other => panic!("expected Build error, got {:?}", other),
    }
}

#[test]
fn executor_runs_removes_before_installs() {
    // A rebuilt package goes through remove then build; with a cached
    // sandbox standing in for the rebuild we can exercise the remove half
    // and the ordering without a toolchain.
    let root = setup();
    write_sandbox(&root.paths, "c", "1", &[], &["lib/c.lib", "lib/c2.lib"]);

    let mut status_db = StatusDb::load(&root.paths).unwrap();
    common::install_fake_package(
        &root.paths,
        &mut status_db,
        "c",
        "1",
        &[],
        &["lib/c.lib"],
    );

    let plan = vec![
        AnyAction::Remove(quarry::resolver::RemovePlanAction {
            spec: spec("c"),
            plan_type: quarry::resolver::RemovePlanType::Remove,
            request_type: quarry::resolver::RequestType::UserRequested,
        }),
        AnyAction::Install(quarry::resolver::InstallPlanAction {
            spec: spec("c"),
            plan_type: quarry::resolver::InstallPlanType::Install,
            request_type: quarry::resolver::RequestType::UserRequested,
            source: None,
            binary: Some(
                try_load_cached_package(&root.paths, &spec("c")).unwrap().unwrap(),
            ),
            features: Default::default(),
        }),
    ];

    execute_plan(
        &root.paths,
        &plan,
        &BuildPackageOptions::default(),
        &ExecuteOptions { keep_going: false },
        &mut status_db,
        &KnownToolchains::default(),
        &RunContext::new(),
    )
    .unwrap();

    let prefix = root.dir.path().join("installed/x64-windows");
    assert!(prefix.join("lib/c.lib").is_file());
    assert!(prefix.join("lib/c2.lib").is_file());
    assert!(status_db.find_installed("c", spec("c").triplet(), None).is_some());
}
