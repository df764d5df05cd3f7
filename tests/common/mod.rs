// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use std::fs;
use std::path::Path;

use quarry::manifest::BinaryParagraph;
use quarry::spec::{PackageSpec, Triplet};
use quarry::status::{InstallState, StatusDb, StatusParagraph, Want};
use quarry::InstallationPaths;
use tempfile::TempDir;

pub const TRIPLET: &str = "x64-windows";

/// A scratch installation root with the standard layout.
///
/// Keep the TempDir alive to prevent cleanup.
pub struct TestRoot {
    pub dir: TempDir,
    pub paths: InstallationPaths,
}

pub fn setup() -> TestRoot {
    let dir = TempDir::new().unwrap();
    let paths = InstallationPaths::new(dir.path());
    fs::create_dir_all(&paths.ports).unwrap();
    fs::create_dir_all(&paths.triplets).unwrap();
    fs::create_dir_all(&paths.packages).unwrap();
    for triplet in ["x64-windows", "x86-windows", "x64-linux"] {
        fs::write(
            paths.triplets.join(format!("{}.cmake", triplet)),
            "set(VCPKG_TARGET_ARCHITECTURE x64)\n",
        )
        .unwrap();
    }
    TestRoot { dir, paths }
}

pub fn triplet(name: &str) -> Triplet {
    Triplet::from_canonical_name(name).unwrap()
}

pub fn spec(name: &str) -> PackageSpec {
    PackageSpec::new(name, triplet(TRIPLET)).unwrap()
}

pub fn write_port(paths: &InstallationPaths, name: &str, control: &str) {
    let dir = paths.ports.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("CONTROL"), control).unwrap();
}

pub fn binary_paragraph(
    name: &str,
    version: &str,
    feature: Option<&str>,
    depends: &[&str],
) -> BinaryParagraph {
    BinaryParagraph {
        spec: spec(name),
        version: version.to_string(),
        description: String::new(),
        maintainer: String::new(),
        feature: feature.map(str::to_string),
        default_features: Vec::new(),
        depends: depends.iter().map(|d| d.to_string()).collect(),
    }
}

/// Record a package as installed: status records, prefix files, and the
/// listfile tying them together.
pub fn install_fake_package(
    paths: &InstallationPaths,
    status_db: &mut StatusDb,
    name: &str,
    version: &str,
    depends: &[&str],
    files: &[&str],
) {
    let core = binary_paragraph(name, version, None, depends);

    let prefix = paths.installed.join(TRIPLET);
    let mut listed = vec![format!("{}/", TRIPLET)];
    for file in files {
        let path = prefix.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, name.as_bytes()).unwrap();

        let mut partial = String::new();
        for part in Path::new(file).parent().unwrap().components() {
            partial.push_str(&part.as_os_str().to_string_lossy());
            partial.push('/');
            listed.push(format!("{}/{}", TRIPLET, partial));
        }
        listed.push(format!("{}/{}", TRIPLET, file));
    }
    listed.sort();
    listed.dedup();
    fs::write(
        paths
            .info_dir
            .join(format!("{}.list", core.fullstem())),
        listed.join("\n") + "\n",
    )
    .unwrap();

    status_db
        .write_update(StatusParagraph::new(
            core,
            Want::Install,
            InstallState::Installed,
        ))
        .unwrap();
}

/// Populate a built sandbox: binary CONTROL plus payload files.
pub fn write_sandbox(
    paths: &InstallationPaths,
    name: &str,
    version: &str,
    depends: &[&str],
    files: &[&str],
) {
    let core = binary_paragraph(name, version, None, depends);
    let sandbox = paths.package_dir(&core.spec);
    fs::create_dir_all(&sandbox).unwrap();
    let bcf = quarry::manifest::BinaryControlFile {
        core_paragraph: core,
        features: Vec::new(),
    };
    fs::write(sandbox.join("CONTROL"), bcf.serialize()).unwrap();
    for file in files {
        let path = sandbox.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, name.as_bytes()).unwrap();
    }
}
