// src/build/lint.rs

//! Post-build checks over a package sandbox.
//!
//! Each check returns a count of findings; the sum decides whether the
//! build is classified `POST_BUILD_CHECKS_FAILED`. A port that knows better
//! can suppress an individual check through the matching policy in its
//! BUILD_INFO.
//!
//! Binary-content checks work by scanning for the import-name strings the
//! linker embeds, which keeps them self-contained; they are heuristics, not
//! a PE parser.

use std::path::{Path, PathBuf};

use tracing::error;
use walkdir::WalkDir;

use crate::error::Result;
use crate::paths::InstallationPaths;
use crate::spec::PackageSpec;

use super::info::{BuildInfo, BuildPolicy};

const RELEASE_CRT_NAMES: [&str; 2] = ["ucrtbase.dll", "msvcr120.dll"];
const OBSOLETE_CRT_NAMES: [&str; 4] = [
    "msvcrt20.dll",
    "msvcrt40.dll",
    "msvcr70.dll",
    "msvcr71.dll",
];
const FORBIDDEN_EXTENSIONS: [&str; 2] = ["obj", "ilk"];

fn files_under(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn contains_name(haystack: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

/// Does the sandbox contain anything besides its manifests?
fn check_empty_package(sandbox: &Path, spec: &PackageSpec) -> usize {
    let has_content = files_under(sandbox).iter().any(|f| {
        let name = f.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        !name.eq_ignore_ascii_case("CONTROL") && !name.eq_ignore_ascii_case("BUILD_INFO")
    });
    if has_content {
        return 0;
    }
    error!("the build for {} produced an empty package", spec);
    1
}

fn check_include_folder_not_empty(sandbox: &Path, spec: &PackageSpec) -> usize {
    if !files_under(&sandbox.join("include")).is_empty() {
        return 0;
    }
    error!(
        "the include folder for {} is empty or missing; headers should be installed to include/",
        spec
    );
    1
}

/// Debug and release artifacts must come in pairs.
fn check_debug_and_release(sandbox: &Path, spec: &PackageSpec) -> usize {
    let mut errors = 0;
    for folder in ["lib", "bin"] {
        let release = !files_under(&sandbox.join(folder)).is_empty();
        let debug = !files_under(&sandbox.join("debug").join(folder)).is_empty();
        if release != debug {
            let (present, missing) = if release {
                (folder.to_string(), format!("debug/{}", folder))
            } else {
                (format!("debug/{}", folder), folder.to_string())
            };
            error!(
                "{}: mismatch between debug and release: {} has files but {} does not",
                spec, present, missing
            );
            errors += 1;
        }
    }
    errors
}

/// Headers and cmake config belong to the release half only.
fn check_no_duplicated_debug_trees(sandbox: &Path, spec: &PackageSpec) -> usize {
    let mut errors = 0;
    for folder in ["debug/include", "debug/share"] {
        if sandbox.join(folder).is_dir() {
            error!("{}: {} should not exist", spec, folder);
            errors += 1;
        }
    }
    errors
}

/// Every half that ships DLLs must ship import libraries next to them.
fn check_dlls_have_libs(sandbox: &Path, spec: &PackageSpec) -> usize {
    let mut errors = 0;
    for (bin, lib) in [("bin", "lib"), ("debug/bin", "debug/lib")] {
        let dll_count = files_under(&sandbox.join(bin))
            .iter()
            .filter(|f| has_extension(f, "dll"))
            .count();
        let lib_count = files_under(&sandbox.join(lib))
            .iter()
            .filter(|f| has_extension(f, "lib"))
            .count();
        if dll_count > 0 && lib_count == 0 {
            error!(
                "{}: {} contains {} DLL(s) but {} contains no import libraries",
                spec, bin, dll_count, lib
            );
            errors += 1;
        }
    }
    errors
}

/// Debug binaries linking the release CRT mix allocators at runtime.
fn check_no_release_crt_in_debug(sandbox: &Path, spec: &PackageSpec) -> Result<usize> {
    let mut errors = 0;
    for folder in ["debug/bin", "debug/lib"] {
        for file in files_under(&sandbox.join(folder)) {
            if !has_extension(&file, "dll") && !has_extension(&file, "exe") {
                continue;
            }
            let bytes = std::fs::read(&file)?;
            for crt in RELEASE_CRT_NAMES {
                if contains_name(&bytes, crt) {
                    error!(
                        "{}: debug binary {} links the release CRT ({})",
                        spec,
                        file.display(),
                        crt
                    );
                    errors += 1;
                }
            }
        }
    }
    Ok(errors)
}

fn check_no_obsolete_crt(sandbox: &Path, spec: &PackageSpec) -> Result<usize> {
    let mut errors = 0;
    for folder in ["bin", "lib", "debug/bin", "debug/lib"] {
        for file in files_under(&sandbox.join(folder)) {
            if !has_extension(&file, "dll") && !has_extension(&file, "exe") {
                continue;
            }
            let bytes = std::fs::read(&file)?;
            for crt in OBSOLETE_CRT_NAMES {
                if contains_name(&bytes, crt) {
                    error!(
                        "{}: binary {} references the obsolete CRT {}",
                        spec,
                        file.display(),
                        crt
                    );
                    errors += 1;
                }
            }
        }
    }
    Ok(errors)
}

/// Intermediate build artifacts and absolute paths must not ship.
fn check_no_forbidden_artifacts(
    sandbox: &Path,
    root: &Path,
    spec: &PackageSpec,
) -> Result<usize> {
    let mut errors = 0;
    for file in files_under(sandbox) {
        if FORBIDDEN_EXTENSIONS.iter().any(|e| has_extension(&file, e)) {
            error!(
                "{}: forbidden build artifact {} was installed",
                spec,
                file.display()
            );
            errors += 1;
            continue;
        }

        // Config files referring to the installation root stop working the
        // moment the tree is copied anywhere else.
        let is_config = has_extension(&file, "cmake") || has_extension(&file, "pc");
        if is_config {
            let text = std::fs::read_to_string(&file).unwrap_or_default();
            let root_forward = root.to_string_lossy().replace('\\', "/");
            if !root_forward.is_empty()
                && (text.contains(root_forward.as_str())
                    || text.contains(&*root.to_string_lossy()))
            {
                error!(
                    "{}: {} contains an absolute path into the install tree",
                    spec,
                    file.display()
                );
                errors += 1;
            }
        }
    }
    Ok(errors)
}

/// Run every check not suppressed by a policy; returns the total error
/// count.
pub fn perform_all_checks(
    spec: &PackageSpec,
    paths: &InstallationPaths,
    build_info: &BuildInfo,
) -> Result<usize> {
    let sandbox = paths.package_dir(spec);
    let policies = &build_info.policies;

    if policies.is_enabled(BuildPolicy::EmptyPackage) {
        return Ok(0);
    }

    let mut errors = 0;
    errors += check_empty_package(&sandbox, spec);
    if !policies.is_enabled(BuildPolicy::EmptyIncludeFolder) {
        errors += check_include_folder_not_empty(&sandbox, spec);
    }
    errors += check_debug_and_release(&sandbox, spec);
    errors += check_no_duplicated_debug_trees(&sandbox, spec);
    if !policies.is_enabled(BuildPolicy::DllsWithoutLibs) {
        errors += check_dlls_have_libs(&sandbox, spec);
    }
    if !policies.is_enabled(BuildPolicy::OnlyReleaseCrt) {
        errors += check_no_release_crt_in_debug(&sandbox, spec)?;
    }
    if !policies.is_enabled(BuildPolicy::AllowObsoleteMsvcrt) {
        errors += check_no_obsolete_crt(&sandbox, spec)?;
    }
    errors += check_no_forbidden_artifacts(&sandbox, &paths.root, spec)?;

    Ok(errors)
}
