// src/spec.rs

//! Package specifiers.
//!
//! A triplet is an opaque canonical tag naming an ABI variant
//! (`x64-windows`, `x86-windows-static`); quarry compares triplets by
//! string equality only. A package spec is a port name pinned to a triplet;
//! a full package spec additionally carries requested features.
//!
//! Accepted command-line forms: `zlib`, `zlib:x64-windows`,
//! `zlib[tls,core]:x64-windows`.

use std::fmt;

use crate::error::{Error, Result};

/// The implicit feature naming the bare package.
pub const CORE_FEATURE: &str = "core";

fn valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Canonical triplet tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triplet(String);

impl Triplet {
    pub fn from_canonical_name(name: &str) -> Result<Self> {
        if !valid_identifier(name) {
            return Err(Error::InvalidTriplet(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn canonical_name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A port name pinned to a triplet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageSpec {
    name: String,
    triplet: Triplet,
}

impl PackageSpec {
    pub fn new(name: &str, triplet: Triplet) -> Result<Self> {
        if !valid_identifier(name) {
            return Err(Error::InvalidSpec {
                input: name.to_string(),
                reason: "port names are lowercase alphanumerics and dashes".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            triplet,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn triplet(&self) -> &Triplet {
        &self.triplet
    }

    /// Sandbox directory stem: `<name>_<triplet>`.
    pub fn dir(&self) -> String {
        format!("{}_{}", self.name, self.triplet)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.triplet)
    }
}

/// A package spec plus the feature set requested for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullPackageSpec {
    pub package_spec: PackageSpec,
    /// Requested features, verbatim. Empty means "core plus defaults";
    /// an explicit `core` entry suppresses the port's default features.
    pub features: Vec<String>,
}

impl FullPackageSpec {
    /// Parse a command-line specifier against a default triplet.
    pub fn parse(input: &str, default_triplet: &Triplet) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidSpec {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (left, triplet) = match input.split_once(':') {
            Some((left, triplet_str)) => {
                if triplet_str.contains(':') {
                    return Err(invalid("more than one ':' in specifier"));
                }
                (left, Triplet::from_canonical_name(triplet_str)?)
            }
            None => (input, default_triplet.clone()),
        };

        let (name, features) = match left.split_once('[') {
            Some((name, rest)) => {
                let list = rest
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("unterminated feature list"))?;
                let mut features = Vec::new();
                for feature in list.split(',') {
                    let feature = feature.trim();
                    if !valid_identifier(feature) {
                        return Err(invalid("feature names are lowercase alphanumerics and dashes"));
                    }
                    if !features.iter().any(|f| f == feature) {
                        features.push(feature.to_string());
                    }
                }
                if features.is_empty() {
                    return Err(invalid("empty feature list"));
                }
                (name, features)
            }
            None => (left, Vec::new()),
        };

        Ok(Self {
            package_spec: PackageSpec::new(name, triplet)?,
            features,
        })
    }

    /// Expand requested specs into per-feature requests for the planner.
    ///
    /// Every spec contributes its `core` entry; the explicit-core marker is
    /// preserved so the planner can suppress default features for it.
    pub fn to_feature_specs(specs: &[FullPackageSpec]) -> Vec<FeatureSpec> {
        let mut out = Vec::new();
        for full in specs {
            let explicit_core = full.features.iter().any(|f| f == CORE_FEATURE);
            out.push(FeatureSpec {
                spec: full.package_spec.clone(),
                feature: CORE_FEATURE.to_string(),
                explicit_core,
            });
            for feature in &full.features {
                if feature != CORE_FEATURE {
                    out.push(FeatureSpec {
                        spec: full.package_spec.clone(),
                        feature: feature.clone(),
                        explicit_core,
                    });
                }
            }
        }
        out
    }
}

impl fmt::Display for FullPackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            write!(f, "{}", self.package_spec)
        } else {
            write!(
                f,
                "{}[{}]:{}",
                self.package_spec.name(),
                self.features.join(","),
                self.package_spec.triplet()
            )
        }
    }
}

/// One (spec, feature) requirement fed to the feature-aware planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub spec: PackageSpec,
    /// `core` for the bare package.
    pub feature: String,
    /// True when the user wrote `core` explicitly, which opts the spec out
    /// of its default features.
    pub explicit_core: bool,
}
