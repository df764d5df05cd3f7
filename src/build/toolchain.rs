// src/build/toolchain.rs

//! The toolchain resolver seam.
//!
//! Toolchain discovery (scanning Visual Studio installations) belongs to an
//! external collaborator; the core only defines what a resolved toolset
//! looks like and how the vcvarsall invocation is chosen from the
//! host/target architecture table.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuArchitecture {
    X86,
    X64,
    Arm,
    Arm64,
}

impl CpuArchitecture {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86" => Some(CpuArchitecture::X86),
            "x64" | "amd64" => Some(CpuArchitecture::X64),
            "arm" => Some(CpuArchitecture::Arm),
            "arm64" => Some(CpuArchitecture::Arm64),
            _ => None,
        }
    }
}

/// Host architectures usable on this machine, preferred first. An x64 host
/// can always fall back to the x86 toolchain.
pub fn supported_host_architectures() -> Vec<CpuArchitecture> {
    let host = std::env::var("PROCESSOR_ARCHITECTURE")
        .ok()
        .and_then(|s| CpuArchitecture::parse(&s))
        .unwrap_or(CpuArchitecture::X64);
    match host {
        CpuArchitecture::X64 => vec![CpuArchitecture::X64, CpuArchitecture::X86],
        other => vec![other],
    }
}

/// One `vcvarsall` argument and the host/target pair it serves.
#[derive(Debug, Clone)]
pub struct ToolsetArchOption {
    pub name: String,
    pub host_arch: CpuArchitecture,
    pub target_arch: CpuArchitecture,
}

/// A resolved compiler environment.
#[derive(Debug, Clone)]
pub struct Toolset {
    pub visual_studio_root: PathBuf,
    pub vcvarsall: PathBuf,
    pub vcvarsall_options: Vec<String>,
    /// Platform toolset tag, e.g. `v141`.
    pub version: String,
    pub supported_architectures: Vec<ToolsetArchOption>,
}

/// External collaborator interface: find a toolset for the requested
/// platform toolset tag (and optionally a pinned Visual Studio path).
pub trait ToolchainResolver {
    fn resolve(
        &self,
        platform_toolset: Option<&str>,
        visual_studio_path: Option<&Path>,
    ) -> Result<Toolset>;
}

/// Table-driven resolver over a fixed set of known toolsets. The production
/// front-end feeds this from its discovery logic; tests construct it
/// directly.
#[derive(Debug, Default)]
pub struct KnownToolchains {
    toolsets: Vec<Toolset>,
}

impl KnownToolchains {
    pub fn new(toolsets: Vec<Toolset>) -> Self {
        Self { toolsets }
    }
}

impl ToolchainResolver for KnownToolchains {
    fn resolve(
        &self,
        platform_toolset: Option<&str>,
        visual_studio_path: Option<&Path>,
    ) -> Result<Toolset> {
        let candidates = self.toolsets.iter().filter(|t| {
            platform_toolset.map_or(true, |requested| t.version == requested)
                && visual_studio_path.map_or(true, |p| t.visual_studio_root == p)
        });
        candidates
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned()
            .ok_or_else(|| {
                Error::UnsupportedToolchain(format!(
                    "platform toolset {}",
                    platform_toolset.unwrap_or("(default)")
                ))
            })
    }
}

/// Pick the vcvarsall architecture argument for a target, trying each
/// supported host architecture in order.
pub fn vcvarsall_architecture(target_architecture: &str, toolset: &Toolset) -> Result<String> {
    let target = CpuArchitecture::parse(target_architecture).ok_or_else(|| {
        Error::UnsupportedToolchain(format!(
            "invalid architecture string: {}",
            target_architecture
        ))
    })?;

    for host in supported_host_architectures() {
        if let Some(option) = toolset
            .supported_architectures
            .iter()
            .find(|o| o.host_arch == host && o.target_arch == target)
        {
            return Ok(option.name.clone());
        }
    }

    Err(Error::UnsupportedToolchain(format!(
        "no host toolchain can target {}",
        target_architecture
    )))
}

/// Map the CMake system name to the vcvarsall platform argument.
pub fn vcvarsall_target(cmake_system_name: &str) -> Result<&'static str> {
    match cmake_system_name {
        "" | "Windows" => Ok(""),
        "WindowsStore" => Ok("store"),
        other => Err(Error::UnsupportedToolchain(format!(
            "unsupported vcvarsall target {}",
            other
        ))),
    }
}
