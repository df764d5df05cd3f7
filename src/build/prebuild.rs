// src/build/prebuild.rs

//! Pre-build triplet environment extraction.
//!
//! The triplet descriptor is a CMake script; quarry learns what it sets by
//! running the external build tool against it and parsing `KEY=VALUE` lines
//! from the captured output. Output before the sentinel GUID is arbitrary
//! tool chatter and is discarded; after it, every line must be a known
//! variable.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::InstallationPaths;
use crate::spec::Triplet;

use super::command::{cmd_execute_and_capture_output, make_cmake_cmd};

/// Marks the start of structured output in the environment script's chatter.
pub const PREBUILD_SENTINEL: &str = "c35112b6-d1ba-415b-aa5d-81de856ef8eb";

#[derive(Debug, Clone, Default)]
pub struct PreBuildInfo {
    pub target_architecture: String,
    pub cmake_system_name: String,
    pub cmake_system_version: String,
    pub platform_toolset: Option<String>,
    pub visual_studio_path: Option<PathBuf>,
}

impl PreBuildInfo {
    /// Run the triplet environment script and parse its output.
    pub fn from_triplet_file(paths: &InstallationPaths, triplet: &Triplet) -> Result<Self> {
        let triplet_file = paths.triplet_file(triplet);
        let command = make_cmake_cmd(
            &paths.cmake_exe,
            &paths.triplet_environment_script(),
            &[(
                "CMAKE_TRIPLET_FILE",
                triplet_file.to_string_lossy().into_owned(),
            )],
        );

        let output = cmd_execute_and_capture_output(&command)?;
        if output.exit_code != 0 {
            return Err(Error::ToolNotFound(format!(
                "triplet environment probe failed with exit code {}",
                output.exit_code
            )));
        }
        debug!("triplet {} environment:\n{}", triplet, output.output);
        Self::parse_output(&output.output)
    }

    /// Parse captured probe output. Everything before the sentinel line is
    /// discarded; unknown variables after it are fatal.
    pub fn parse_output(output: &str) -> Result<Self> {
        let mut info = PreBuildInfo::default();

        let mut lines = output
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .skip_while(|l| *l != PREBUILD_SENTINEL);
        // Drop the sentinel itself; absent sentinel means no variables.
        lines.next();

        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = match line.split_once('=') {
                Some((name, value)) => {
                    if value.contains('=') {
                        return Err(Error::Manifest(format!(
                            "expected format is [VARIABLE_NAME=VARIABLE_VALUE], but was [{}]",
                            line
                        )));
                    }
                    (name, value)
                }
                None => (line, ""),
            };

            match name {
                "VCPKG_TARGET_ARCHITECTURE" => info.target_architecture = value.to_string(),
                "VCPKG_CMAKE_SYSTEM_NAME" => info.cmake_system_name = value.to_string(),
                "VCPKG_CMAKE_SYSTEM_VERSION" => info.cmake_system_version = value.to_string(),
                "VCPKG_PLATFORM_TOOLSET" => {
                    info.platform_toolset =
                        (!value.is_empty()).then(|| value.to_string());
                }
                "VCPKG_VISUAL_STUDIO_PATH" => {
                    info.visual_studio_path = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                _ => {
                    return Err(Error::Manifest(format!(
                        "unknown variable name {}",
                        line
                    )))
                }
            }
        }

        Ok(info)
    }
}
