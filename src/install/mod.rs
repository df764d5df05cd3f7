// src/install/mod.rs

//! Merging a built package sandbox into the shared install prefix.
//!
//! Install is a conflict scan followed by a two-phase status update: the
//! package (and its features) are journaled `half-installed`, the tree is
//! copied and the listfile written, then the records are upgraded to
//! `installed`. A crash in between leaves `half-installed` records, which
//! the planner turns into a remove-and-rebuild.

pub mod remove;

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::error;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest::BinaryControlFile;
use crate::paths::InstallationPaths;
use crate::spec::Triplet;
use crate::status::{InstallState, StatusDb, StatusParagraph, Want};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallResult {
    Success,
    FileConflicts,
}

/// Where one package's files land, and where its listfile goes.
#[derive(Debug, Clone)]
pub struct InstallDir {
    destination: PathBuf,
    destination_subdirectory: String,
    listfile: PathBuf,
}

impl InstallDir {
    pub fn from_destination_root(
        destination_root: &Path,
        destination_subdirectory: &str,
        listfile: PathBuf,
    ) -> Self {
        Self {
            destination: destination_root.join(destination_subdirectory),
            destination_subdirectory: destination_subdirectory.to_string(),
            listfile,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn listfile(&self) -> &Path {
        &self.listfile
    }
}

/// Forward-slash path of `path` relative to `base`.
fn relative_unix(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

fn is_manifest_name(path: &Path) -> bool {
    path.file_name()
        .map(|n| {
            let name = n.to_string_lossy();
            name.eq_ignore_ascii_case("CONTROL") || name.eq_ignore_ascii_case("BUILD_INFO")
        })
        .unwrap_or(false)
}

/// Every entry in the package sandbox, relative to it, manifests excluded.
/// Directories appear without a trailing slash, so they can never collide
/// with the slash-suffixed directory entries of a listfile.
pub fn build_list_of_package_files(package_dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(package_dir).min_depth(1) {
        let entry = entry.map_err(|e| Error::Install(e.to_string()))?;
        if entry.file_type().is_file() && is_manifest_name(entry.path()) {
            continue;
        }
        files.push(relative_unix(entry.path(), package_dir));
    }
    files.sort();
    Ok(files)
}

/// Every path currently installed for a triplet, triplet prefix stripped,
/// merged from all listfiles and sorted.
pub fn build_list_of_installed_files(
    status_db: &StatusDb,
    triplet: &Triplet,
) -> Result<Vec<String>> {
    let prefix = format!("{}/", triplet.canonical_name());
    let mut installed = Vec::new();
    for (record, files) in status_db.get_installed_files()? {
        if record.package.spec.triplet() != triplet {
            continue;
        }
        for file in files {
            if let Some(stripped) = file.strip_prefix(&prefix) {
                if !stripped.is_empty() {
                    installed.push(stripped.to_string());
                }
            }
        }
    }
    installed.sort();
    Ok(installed)
}

/// Copy the sandbox into the destination and record every path in the
/// listfile (directories with a trailing slash), sorted.
///
/// The conflict scan runs before this; a file that is nonetheless already
/// present means someone else mutated the prefix mid-run, which is fatal.
pub fn install_files_and_write_listfile(
    source_dir: &Path,
    install_dir: &InstallDir,
) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(Error::Install(format!(
            "source directory {} does not exist",
            source_dir.display()
        )));
    }
    fs::create_dir_all(&install_dir.destination)?;
    if let Some(parent) = install_dir.listfile.parent() {
        fs::create_dir_all(parent)?;
    }

    let subdir = &install_dir.destination_subdirectory;
    let mut output = vec![format!("{}/", subdir)];

    for entry in WalkDir::new(source_dir).min_depth(1) {
        let entry = entry.map_err(|e| Error::Install(e.to_string()))?;
        let suffix = relative_unix(entry.path(), source_dir);
        let target = install_dir.destination.join(&suffix);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            output.push(format!("{}/{}/", subdir, suffix));
        } else if entry.file_type().is_file() {
            if is_manifest_name(entry.path()) {
                continue;
            }
            if target.exists() {
                return Err(Error::Install(format!(
                    "file {} appeared in the install prefix during installation; \
                     the prefix was modified concurrently",
                    target.display()
                )));
            }
            fs::copy(entry.path(), &target)?;
            output.push(format!("{}/{}", subdir, suffix));
        }
        // Other file types (symlinks into nowhere, devices) do not occur in
        // package sandboxes; walkdir follows nothing by default.
    }

    output.sort();
    fs::write(&install_dir.listfile, output.join("\n") + "\n")?;
    Ok(())
}

/// Install one built package into the prefix.
pub fn install_package(
    paths: &InstallationPaths,
    bcf: &BinaryControlFile,
    status_db: &mut StatusDb,
) -> Result<InstallResult> {
    let spec = &bcf.core_paragraph.spec;
    let triplet = spec.triplet().clone();
    let package_dir = paths.package_dir(spec);

    let package_files = build_list_of_package_files(&package_dir)?;
    let installed_files = build_list_of_installed_files(status_db, &triplet)?;

    let mut intersection: Vec<&String> = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < package_files.len() && j < installed_files.len() {
        match package_files[i].cmp(&installed_files[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                intersection.push(&package_files[i]);
                i += 1;
                j += 1;
            }
        }
    }

    if !intersection.is_empty() {
        error!(
            "the following files are already installed in {} and are in conflict with {}",
            paths.triplet_installed_dir(&triplet).display(),
            spec
        );
        for file in intersection {
            error!("    {}", file);
        }
        return Ok(InstallResult::FileConflicts);
    }

    let all_paragraphs =
        std::iter::once(&bcf.core_paragraph).chain(bcf.features.iter());
    let half_installed: Vec<StatusParagraph> = all_paragraphs
        .clone()
        .map(|pgh| StatusParagraph::new(pgh.clone(), Want::Install, InstallState::HalfInstalled))
        .collect();
    status_db.write_updates(&half_installed)?;

    let install_dir = InstallDir::from_destination_root(
        &paths.installed,
        triplet.canonical_name(),
        paths.listfile_path(&bcf.core_paragraph),
    );
    install_files_and_write_listfile(&package_dir, &install_dir)?;

    let installed: Vec<StatusParagraph> = all_paragraphs
        .map(|pgh| StatusParagraph::new(pgh.clone(), Want::Install, InstallState::Installed))
        .collect();
    status_db.write_updates(&installed)?;

    Ok(InstallResult::Success)
}
