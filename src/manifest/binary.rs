// src/manifest/binary.rs

//! Built package metadata.
//!
//! A `BinaryParagraph` is a source (or feature) paragraph projected through
//! the triplet it was built for: qualified dependencies are resolved to
//! plain names and the version may be overridden by the build. The binary
//! manifest is written as `packages/<name>_<triplet>/CONTROL` and re-read by
//! the installer and the status database.

use crate::error::{Error, Result};
use crate::manifest::source::{filter_dependencies, FeatureParagraph, SourceParagraph};
use crate::paragraph::Paragraph;
use crate::spec::{PackageSpec, Triplet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryParagraph {
    pub spec: PackageSpec,
    pub version: String,
    pub description: String,
    pub maintainer: String,
    /// `None` for the core paragraph of a package.
    pub feature: Option<String>,
    pub default_features: Vec<String>,
    /// Dependency names already filtered for this triplet.
    pub depends: Vec<String>,
}

impl BinaryParagraph {
    pub fn from_source(spgh: &SourceParagraph, triplet: &Triplet) -> Result<Self> {
        Ok(Self {
            spec: PackageSpec::new(&spgh.name, triplet.clone())?,
            version: spgh.version.clone(),
            description: spgh.description.clone(),
            maintainer: spgh.maintainer.clone(),
            feature: None,
            default_features: spgh.default_features.clone(),
            depends: filter_dependencies(&spgh.depends, triplet),
        })
    }

    pub fn from_feature(
        spgh: &SourceParagraph,
        fpgh: &FeatureParagraph,
        triplet: &Triplet,
    ) -> Result<Self> {
        Ok(Self {
            spec: PackageSpec::new(&spgh.name, triplet.clone())?,
            version: spgh.version.clone(),
            description: fpgh.description.clone(),
            maintainer: spgh.maintainer.clone(),
            feature: Some(fpgh.name.clone()),
            default_features: Vec::new(),
            depends: filter_dependencies(&fpgh.depends, triplet),
        })
    }

    /// `<name>_<version>_<triplet>`, the stem of the listfile.
    pub fn fullstem(&self) -> String {
        format!("{}_{}_{}", self.spec.name(), self.version, self.spec.triplet())
    }

    /// `<name>_<triplet>`, the sandbox directory name.
    pub fn dir(&self) -> String {
        self.spec.dir()
    }

    pub fn displayname(&self) -> String {
        match &self.feature {
            Some(feature) => format!("{}[{}]:{}", self.spec.name(), feature, self.spec.triplet()),
            None => self.spec.to_string(),
        }
    }

    pub fn to_paragraph(&self) -> Paragraph {
        let mut p = Paragraph::new();
        p.push("Package", self.spec.name());
        if let Some(feature) = &self.feature {
            p.push("Feature", feature.clone());
        }
        p.push("Version", self.version.clone());
        if !self.depends.is_empty() {
            p.push("Depends", self.depends.join(", "));
        }
        p.push("Architecture", self.spec.triplet().canonical_name());
        p.push("Multi-Arch", "same");
        if !self.maintainer.is_empty() {
            p.push("Maintainer", self.maintainer.clone());
        }
        if !self.description.is_empty() {
            p.push("Description", self.description.clone());
        }
        if !self.default_features.is_empty() {
            p.push("Default-Features", self.default_features.join(", "));
        }
        p
    }

    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let name = paragraph
            .get("Package")
            .ok_or_else(|| Error::Manifest("binary paragraph has no Package: field".to_string()))?;
        let triplet_name = paragraph.get("Architecture").ok_or_else(|| {
            Error::Manifest(format!("package {}: missing Architecture: field", name))
        })?;
        let version = paragraph
            .get("Version")
            .ok_or_else(|| Error::Manifest(format!("package {}: missing Version: field", name)))?;

        let triplet = Triplet::from_canonical_name(triplet_name)?;
        let split_names = |value: Option<&str>| -> Vec<String> {
            value
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        Ok(Self {
            spec: PackageSpec::new(name, triplet)?,
            version: version.to_string(),
            description: paragraph.get("Description").unwrap_or("").to_string(),
            maintainer: paragraph.get("Maintainer").unwrap_or("").to_string(),
            feature: paragraph.get("Feature").map(str::to_string),
            default_features: split_names(paragraph.get("Default-Features")),
            depends: split_names(paragraph.get("Depends")),
        })
    }
}

/// The binary manifest of one built package: core plus built features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryControlFile {
    pub core_paragraph: BinaryParagraph,
    pub features: Vec<BinaryParagraph>,
}

impl BinaryControlFile {
    pub fn from_paragraphs(paragraphs: &[Paragraph]) -> Result<Self> {
        let (core, rest) = paragraphs
            .split_first()
            .ok_or_else(|| Error::Manifest("binary CONTROL file is empty".to_string()))?;
        let core_paragraph = BinaryParagraph::from_paragraph(core)?;
        if core_paragraph.feature.is_some() {
            return Err(Error::Manifest(format!(
                "package {}: first binary paragraph must not be a feature",
                core_paragraph.spec.name()
            )));
        }
        let features = rest
            .iter()
            .map(BinaryParagraph::from_paragraph)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            core_paragraph,
            features,
        })
    }

    pub fn serialize(&self) -> String {
        let paragraphs: Vec<Paragraph> = std::iter::once(&self.core_paragraph)
            .chain(self.features.iter())
            .map(BinaryParagraph::to_paragraph)
            .collect();
        crate::paragraph::serialize_paragraphs(paragraphs.iter())
    }
}
