// src/paths.rs

//! Layout of an installation root.
//!
//! All on-disk locations are derived from one root directory. The names
//! under `installed/vcpkg/` and the triplet/port conventions are shared with
//! the external CMake build driver and must not be renamed.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::BinaryParagraph;
use crate::spec::{PackageSpec, Triplet};

#[derive(Debug, Clone)]
pub struct InstallationPaths {
    pub root: PathBuf,
    pub ports: PathBuf,
    pub triplets: PathBuf,
    pub packages: PathBuf,
    pub installed: PathBuf,
    pub buildtrees: PathBuf,
    pub scripts: PathBuf,
    pub status_file: PathBuf,
    pub updates_dir: PathBuf,
    pub info_dir: PathBuf,
    /// External tool executables; discovery is the front-end's job, so we
    /// default to bare command names resolved through PATH.
    pub cmake_exe: PathBuf,
    pub git_exe: PathBuf,
}

impl InstallationPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let installed = root.join("installed");
        let package_db = installed.join("vcpkg");
        Self {
            ports: root.join("ports"),
            triplets: root.join("triplets"),
            packages: root.join("packages"),
            buildtrees: root.join("buildtrees"),
            scripts: root.join("scripts"),
            status_file: package_db.join("status"),
            updates_dir: package_db.join("updates"),
            info_dir: package_db.join("info"),
            installed,
            root,
            cmake_exe: PathBuf::from("cmake"),
            git_exe: PathBuf::from("git"),
        }
    }

    pub fn port_dir(&self, name: &str) -> PathBuf {
        self.ports.join(name)
    }

    pub fn package_dir(&self, spec: &PackageSpec) -> PathBuf {
        self.packages.join(spec.dir())
    }

    pub fn build_info_path(&self, spec: &PackageSpec) -> PathBuf {
        self.package_dir(spec).join("BUILD_INFO")
    }

    pub fn binary_control_path(&self, spec: &PackageSpec) -> PathBuf {
        self.package_dir(spec).join("CONTROL")
    }

    pub fn listfile_path(&self, pgh: &BinaryParagraph) -> PathBuf {
        self.info_dir.join(format!("{}.list", pgh.fullstem()))
    }

    pub fn triplet_file(&self, triplet: &Triplet) -> PathBuf {
        self.triplets
            .join(format!("{}.cmake", triplet.canonical_name()))
    }

    pub fn ports_cmake(&self) -> PathBuf {
        self.scripts.join("ports.cmake")
    }

    pub fn triplet_environment_script(&self) -> PathBuf {
        self.scripts.join("get_triplet_environment.cmake")
    }

    /// A triplet is valid when its descriptor exists under `triplets/`.
    /// Requests for unknown triplets are rejected before planning.
    pub fn check_triplet(&self, triplet: &Triplet) -> Result<()> {
        if self.triplet_file(triplet).is_file() {
            Ok(())
        } else {
            Err(Error::InvalidTriplet(triplet.canonical_name().to_string()))
        }
    }

    /// Triplet install prefix: `installed/<triplet>`.
    pub fn triplet_installed_dir(&self, triplet: &Triplet) -> PathBuf {
        self.installed.join(triplet.canonical_name())
    }
}

impl InstallationPaths {
    pub fn with_tools(mut self, cmake_exe: &Path, git_exe: &Path) -> Self {
        self.cmake_exe = cmake_exe.to_path_buf();
        self.git_exe = git_exe.to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = InstallationPaths::new("/q");
        assert_eq!(paths.ports, PathBuf::from("/q/ports"));
        assert_eq!(paths.status_file, PathBuf::from("/q/installed/vcpkg/status"));
        assert_eq!(paths.updates_dir, PathBuf::from("/q/installed/vcpkg/updates"));
        assert_eq!(paths.info_dir, PathBuf::from("/q/installed/vcpkg/info"));

        let triplet = Triplet::from_canonical_name("x64-windows").unwrap();
        let spec = PackageSpec::new("zlib", triplet.clone()).unwrap();
        assert_eq!(paths.package_dir(&spec), PathBuf::from("/q/packages/zlib_x64-windows"));
        assert_eq!(paths.triplet_file(&triplet), PathBuf::from("/q/triplets/x64-windows.cmake"));
        assert_eq!(
            paths.triplet_installed_dir(&triplet),
            PathBuf::from("/q/installed/x64-windows")
        );
    }
}
