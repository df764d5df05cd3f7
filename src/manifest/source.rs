// src/manifest/source.rs

//! Port manifests parsed from `ports/<name>/CONTROL`.
//!
//! The first paragraph of a CONTROL file describes the port itself; each
//! following paragraph carrying a `Feature:` field describes an optional
//! feature with its own dependencies.

use crate::error::{Error, Result};
use crate::paragraph::Paragraph;
use crate::spec::{Triplet, CORE_FEATURE};

/// A dependency on another port, optionally restricted to triplets whose
/// canonical name contains the qualifier (`zlib (windows)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub qualifier: Option<String>,
}

impl Dependency {
    pub fn applies_to(&self, triplet: &Triplet) -> bool {
        match &self.qualifier {
            Some(q) => triplet.canonical_name().contains(q.as_str()),
            None => true,
        }
    }

    fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        if let Some((name, rest)) = entry.split_once('(') {
            let qualifier = rest.trim().strip_suffix(')').ok_or_else(|| Error::InvalidSpec {
                input: entry.to_string(),
                reason: "unterminated dependency qualifier".to_string(),
            })?;
            Ok(Self {
                name: name.trim().to_string(),
                qualifier: Some(qualifier.trim().to_string()),
            })
        } else {
            Ok(Self {
                name: entry.to_string(),
                qualifier: None,
            })
        }
    }

    fn render(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{} ({})", self.name, q),
            None => self.name.clone(),
        }
    }
}

/// Names of the dependencies applicable to the given triplet.
pub fn filter_dependencies(depends: &[Dependency], triplet: &Triplet) -> Vec<String> {
    depends
        .iter()
        .filter(|d| d.applies_to(triplet))
        .map(|d| d.name.clone())
        .collect()
}

fn parse_depends_field(value: &str) -> Result<Vec<Dependency>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Dependency::parse)
        .collect()
}

fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn render_depends(depends: &[Dependency]) -> String {
    depends
        .iter()
        .map(Dependency::render)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The core paragraph of a port manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceParagraph {
    pub name: String,
    pub version: String,
    pub description: String,
    pub maintainer: String,
    pub depends: Vec<Dependency>,
    pub default_features: Vec<String>,
}

impl SourceParagraph {
    fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let field = |name: &str| paragraph.get(name).unwrap_or("").to_string();
        let name = paragraph
            .get("Source")
            .ok_or_else(|| Error::Manifest("CONTROL file has no Source: field".to_string()))?
            .to_string();
        let version = paragraph
            .get("Version")
            .ok_or_else(|| Error::Manifest(format!("port {}: missing Version: field", name)))?
            .to_string();
        Ok(Self {
            name,
            version,
            description: field("Description"),
            maintainer: field("Maintainer"),
            depends: parse_depends_field(&field("Build-Depends"))?,
            default_features: parse_name_list(&field("Default-Features")),
        })
    }
}

/// One optional feature of a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureParagraph {
    pub name: String,
    pub description: String,
    pub depends: Vec<Dependency>,
}

impl FeatureParagraph {
    fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let name = paragraph
            .get("Feature")
            .ok_or_else(|| {
                Error::Manifest("secondary CONTROL paragraph has no Feature: field".to_string())
            })?
            .to_string();
        Ok(Self {
            name,
            description: paragraph.get("Description").unwrap_or("").to_string(),
            depends: parse_depends_field(paragraph.get("Build-Depends").unwrap_or(""))?,
        })
    }
}

/// A whole parsed CONTROL file: the port plus its features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceControlFile {
    pub core_paragraph: SourceParagraph,
    pub feature_paragraphs: Vec<FeatureParagraph>,
}

impl SourceControlFile {
    pub fn from_paragraphs(paragraphs: &[Paragraph]) -> Result<Self> {
        let (core, rest) = paragraphs
            .split_first()
            .ok_or_else(|| Error::Manifest("CONTROL file is empty".to_string()))?;

        let core_paragraph = SourceParagraph::from_paragraph(core)?;
        let feature_paragraphs: Vec<FeatureParagraph> = rest
            .iter()
            .map(FeatureParagraph::from_paragraph)
            .collect::<Result<_>>()?;

        for (i, feature) in feature_paragraphs.iter().enumerate() {
            if feature.name == CORE_FEATURE {
                return Err(Error::Manifest(format!(
                    "port {}: a feature may not be named '{}'",
                    core_paragraph.name, CORE_FEATURE
                )));
            }
            if feature_paragraphs[..i].iter().any(|f| f.name == feature.name) {
                return Err(Error::Manifest(format!(
                    "port {}: duplicate feature '{}'",
                    core_paragraph.name, feature.name
                )));
            }
        }

        Ok(Self {
            core_paragraph,
            feature_paragraphs,
        })
    }

    pub fn find_feature(&self, name: &str) -> Option<&FeatureParagraph> {
        self.feature_paragraphs.iter().find(|f| f.name == name)
    }

    /// Dependencies of one selected feature, `core` included.
    pub fn feature_dependencies(&self, feature: &str) -> Result<&[Dependency]> {
        if feature == CORE_FEATURE {
            return Ok(&self.core_paragraph.depends);
        }
        self.find_feature(feature)
            .map(|f| f.depends.as_slice())
            .ok_or_else(|| Error::UnknownFeature {
                package: self.core_paragraph.name.clone(),
                feature: feature.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paragraph::parse_paragraphs;

    fn load(text: &str) -> SourceControlFile {
        SourceControlFile::from_paragraphs(&parse_paragraphs(text).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_minimal_port() {
        let scf = load("Source: zlib\nVersion: 1.2.11\n");
        assert_eq!(scf.core_paragraph.name, "zlib");
        assert_eq!(scf.core_paragraph.version, "1.2.11");
        assert!(scf.feature_paragraphs.is_empty());
    }

    #[test]
    fn test_parse_port_with_features() {
        let scf = load(
            "Source: curl\nVersion: 7.61.0\nBuild-Depends: zlib\nDefault-Features: tls\n\n\
             Feature: tls\nDescription: TLS support\nBuild-Depends: openssl (windows)\n\n\
             Feature: ssh\nBuild-Depends: libssh2\n",
        );
        assert_eq!(scf.feature_paragraphs.len(), 2);
        assert_eq!(scf.core_paragraph.default_features, vec!["tls"]);
        let tls = scf.find_feature("tls").unwrap();
        assert_eq!(tls.depends[0].name, "openssl");
        assert_eq!(tls.depends[0].qualifier.as_deref(), Some("windows"));
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let paragraphs = parse_paragraphs(
            "Source: a\nVersion: 1\n\nFeature: x\n\nFeature: x\n",
        )
        .unwrap();
        assert!(SourceControlFile::from_paragraphs(&paragraphs).is_err());
    }

    #[test]
    fn test_core_feature_name_rejected() {
        let paragraphs = parse_paragraphs("Source: a\nVersion: 1\n\nFeature: core\n").unwrap();
        assert!(SourceControlFile::from_paragraphs(&paragraphs).is_err());
    }

    #[test]
    fn test_qualified_dependency_filtering() {
        let deps = vec![
            Dependency { name: "zlib".to_string(), qualifier: None },
            Dependency { name: "winss".to_string(), qualifier: Some("windows".to_string()) },
        ];
        let windows = Triplet::from_canonical_name("x64-windows").unwrap();
        let linux = Triplet::from_canonical_name("x64-linux").unwrap();
        assert_eq!(filter_dependencies(&deps, &windows), vec!["zlib", "winss"]);
        assert_eq!(filter_dependencies(&deps, &linux), vec!["zlib"]);
    }

    #[test]
    fn test_depends_render_roundtrip() {
        let deps = parse_depends_field("zlib, openssl (windows), libssh2").unwrap();
        assert_eq!(render_depends(&deps), "zlib, openssl (windows), libssh2");
    }
}
