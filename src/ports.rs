// src/ports.rs

//! The port registry: every CONTROL manifest under the ports tree, loaded
//! once and cached for the process lifetime.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::manifest::SourceControlFile;
use crate::paragraph::parse_paragraphs;

/// Loaded port manifests, keyed by port name.
#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: BTreeMap<String, SourceControlFile>,
}

/// Result of scanning a ports tree: the manifests that loaded plus the
/// errors for those that did not.
#[derive(Debug)]
pub struct LoadResults {
    pub registry: PortRegistry,
    pub errors: Vec<Error>,
}

/// Load one port directory. The Source: field must match the directory name.
pub fn try_load_port(port_dir: &Path) -> Result<SourceControlFile> {
    let control_path = port_dir.join("CONTROL");
    let text = fs::read_to_string(&control_path)?;
    let paragraphs = parse_paragraphs(&text).map_err(|e| e.in_file(&control_path))?;
    let scf = SourceControlFile::from_paragraphs(&paragraphs)?;

    let directory = port_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if scf.core_paragraph.name != directory {
        return Err(Error::PortNameMismatch {
            directory,
            name: scf.core_paragraph.name,
        });
    }

    Ok(scf)
}

impl PortRegistry {
    /// Scan every immediate subdirectory of `ports_root` containing a
    /// CONTROL file. Ports that fail to load are collected as errors rather
    /// than aborting the scan; the caller decides whether they are fatal.
    pub fn load_all(ports_root: &Path) -> Result<LoadResults> {
        let mut registry = PortRegistry::default();
        let mut errors = Vec::new();

        if !ports_root.is_dir() {
            return Ok(LoadResults { registry, errors });
        }

        let mut port_dirs: Vec<_> = fs::read_dir(ports_root)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.is_dir() && p.join("CONTROL").is_file())
            .collect();
        // BTreeMap gives name order for iteration; sort here so errors come
        // out in a stable order too.
        port_dirs.sort_by_key(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });

        for port_dir in port_dirs {
            match try_load_port(&port_dir) {
                Ok(scf) => {
                    debug!("loaded port {}", scf.core_paragraph.name);
                    registry
                        .ports
                        .insert(scf.core_paragraph.name.clone(), scf);
                }
                Err(e) => errors.push(e),
            }
        }

        Ok(LoadResults { registry, errors })
    }

    pub fn find(&self, name: &str) -> Option<&SourceControlFile> {
        self.ports.get(name)
    }

    /// All ports, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &SourceControlFile> {
        self.ports.values()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
