// src/build/info.rs

//! BUILD_INFO: metadata emitted by the external build driver after a
//! successful build, read back before post-build linting.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paragraph::{parse_single_paragraph, FieldReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkageType {
    Dynamic,
    Static,
}

impl LinkageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dynamic" => Some(LinkageType::Dynamic),
            "static" => Some(LinkageType::Static),
            _ => None,
        }
    }
}

/// Policies a port can set in BUILD_INFO to suppress individual post-build
/// checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildPolicy {
    EmptyPackage,
    DllsWithoutLibs,
    OnlyReleaseCrt,
    EmptyIncludeFolder,
    AllowObsoleteMsvcrt,
}

impl BuildPolicy {
    pub const ALL: [BuildPolicy; 5] = [
        BuildPolicy::EmptyPackage,
        BuildPolicy::DllsWithoutLibs,
        BuildPolicy::OnlyReleaseCrt,
        BuildPolicy::EmptyIncludeFolder,
        BuildPolicy::AllowObsoleteMsvcrt,
    ];

    /// The variable name used in BUILD_INFO and by the CMake driver.
    pub fn cmake_variable(&self) -> &'static str {
        match self {
            BuildPolicy::EmptyPackage => "VCPKG_POLICY_EMPTY_PACKAGE",
            BuildPolicy::DllsWithoutLibs => "VCPKG_POLICY_DLLS_WITHOUT_LIBS",
            BuildPolicy::OnlyReleaseCrt => "VCPKG_POLICY_ONLY_RELEASE_CRT",
            BuildPolicy::EmptyIncludeFolder => "VCPKG_POLICY_EMPTY_INCLUDE_FOLDER",
            BuildPolicy::AllowObsoleteMsvcrt => "VCPKG_POLICY_ALLOW_OBSOLETE_MSVCRT",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildPolicies(BTreeMap<BuildPolicy, bool>);

impl BuildPolicies {
    pub fn new(policies: BTreeMap<BuildPolicy, bool>) -> Self {
        Self(policies)
    }

    pub fn is_enabled(&self, policy: BuildPolicy) -> bool {
        self.0.get(&policy).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub crt_linkage: LinkageType,
    pub library_linkage: LinkageType,
    pub version: Option<String>,
    pub policies: BuildPolicies,
}

impl BuildInfo {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let paragraph = parse_single_paragraph(text).map_err(|e| e.in_file(path))?;
        let reader = FieldReader::new(&paragraph, "BUILD_INFO");

        let linkage_field = |name: &str| -> Result<LinkageType> {
            let raw = reader.required_field(name)?;
            LinkageType::parse(&raw).ok_or_else(|| Error::Parse {
                path: path.to_path_buf(),
                line: 1,
                reason: format!("invalid linkage type for {}: [{}]", name, raw),
            })
        };
        let crt_linkage = linkage_field("CRTLinkage")?;
        let library_linkage = linkage_field("LibraryLinkage")?;

        let version = match reader.optional_field("Version") {
            v if v.is_empty() => None,
            v => Some(v),
        };

        let mut policies = BTreeMap::new();
        for policy in BuildPolicy::ALL {
            let setting = reader.optional_field(policy.cmake_variable());
            match setting.as_str() {
                "" => {}
                "enabled" => {
                    policies.insert(policy, true);
                }
                "disabled" => {
                    policies.insert(policy, false);
                }
                other => {
                    return Err(Error::Parse {
                        path: path.to_path_buf(),
                        line: 1,
                        reason: format!(
                            "unknown setting for policy '{}': {}",
                            policy.cmake_variable(),
                            other
                        ),
                    })
                }
            }
        }

        Ok(Self {
            crt_linkage,
            library_linkage,
            version,
            policies: BuildPolicies::new(policies),
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<BuildInfo> {
        BuildInfo::parse(text, Path::new("BUILD_INFO"))
    }

    #[test]
    fn test_minimal_build_info() {
        let info = parse("CRTLinkage: dynamic\nLibraryLinkage: static\n").unwrap();
        assert_eq!(info.crt_linkage, LinkageType::Dynamic);
        assert_eq!(info.library_linkage, LinkageType::Static);
        assert!(info.version.is_none());
        assert!(!info.policies.is_enabled(BuildPolicy::EmptyPackage));
    }

    #[test]
    fn test_version_and_policies() {
        let info = parse(
            "CRTLinkage: dynamic\nLibraryLinkage: dynamic\nVersion: 1.2.11-2\n\
             VCPKG_POLICY_EMPTY_PACKAGE: enabled\nVCPKG_POLICY_ONLY_RELEASE_CRT: disabled\n",
        )
        .unwrap();
        assert_eq!(info.version.as_deref(), Some("1.2.11-2"));
        assert!(info.policies.is_enabled(BuildPolicy::EmptyPackage));
        assert!(!info.policies.is_enabled(BuildPolicy::OnlyReleaseCrt));
    }

    #[test]
    fn test_missing_required_field() {
        assert!(parse("CRTLinkage: dynamic\n").is_err());
    }

    #[test]
    fn test_invalid_linkage() {
        assert!(parse("CRTLinkage: shared\nLibraryLinkage: static\n").is_err());
    }

    #[test]
    fn test_invalid_policy_setting() {
        assert!(parse(
            "CRTLinkage: static\nLibraryLinkage: static\nVCPKG_POLICY_EMPTY_PACKAGE: yes\n"
        )
        .is_err());
    }
}
