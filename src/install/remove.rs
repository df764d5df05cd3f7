// src/install/remove.rs

//! Listfile-driven package removal.
//!
//! The listfile is authoritative: files go first, then directories in
//! deepest-first order (skipped while still shared with other packages).
//! Status records for the package and all its features move through
//! `purge`/`half-installed` to `purge`/`not-installed` in two atomic
//! batches, mirroring the install sequence.

use std::fs;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::paths::InstallationPaths;
use crate::spec::PackageSpec;
use crate::status::{InstallState, StatusDb, StatusParagraph, Want};

/// Remove one installed package (with all its feature records) from the
/// prefix.
pub fn remove_package(
    paths: &InstallationPaths,
    spec: &PackageSpec,
    status_db: &mut StatusDb,
) -> Result<()> {
    let records: Vec<StatusParagraph> = status_db
        .iter()
        .filter(|r| &r.package.spec == spec)
        .cloned()
        .collect();
    let core = records
        .iter()
        .find(|r| r.package.feature.is_none())
        .cloned()
        .ok_or_else(|| {
            Error::Install(format!("package {} is not installed", spec))
        })?;

    let half_removed: Vec<StatusParagraph> = records
        .iter()
        .map(|r| StatusParagraph::new(r.package.clone(), Want::Purge, InstallState::HalfInstalled))
        .collect();
    status_db.write_updates(&half_removed)?;

    let listfile = status_db.listfile_path(&core);
    match fs::read_to_string(&listfile) {
        Ok(text) => {
            let mut files = Vec::new();
            let mut dirs = Vec::new();
            for line in text.lines() {
                if line.is_empty() {
                    continue;
                }
                match line.strip_suffix('/') {
                    Some(dir) => dirs.push(dir.to_string()),
                    None => files.push(line.to_string()),
                }
            }

            for file in files {
                let path = paths.installed.join(&file);
                match fs::remove_file(&path) {
                    Ok(()) => debug!("removed {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        warn!("listed file {} was already gone", path.display())
                    }
                    Err(e) => return Err(Error::Io(e)),
                }
            }

            // Deepest first; a directory still in use by another package
            // simply stays.
            dirs.sort_by_key(|d| std::cmp::Reverse(d.matches('/').count()));
            for dir in dirs {
                let path = paths.installed.join(&dir);
                if fs::remove_dir(&path).is_ok() {
                    debug!("removed directory {}", path.display());
                }
            }

            fs::remove_file(&listfile)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "package {} has no listfile; removing status records only",
                spec
            );
        }
        Err(e) => return Err(Error::Io(e)),
    }

    let purged: Vec<StatusParagraph> = records
        .iter()
        .map(|r| StatusParagraph::new(r.package.clone(), Want::Purge, InstallState::NotInstalled))
        .collect();
    status_db.write_updates(&purged)?;
    Ok(())
}
