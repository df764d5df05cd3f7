// src/status/mod.rs

//! Status records: the durable per-package lifecycle state.
//!
//! Each record pairs a binary paragraph with what the user wants done
//! (`Want`) and how far the system actually got (`InstallState`), encoded on
//! a dpkg-style `Status: <want> ok <state>` line. Records are keyed by
//! `(name, triplet, feature)`; a later record for the same key supersedes
//! earlier ones.
//!
//! Replay of the logical log is a pure function ([`rebuild_index`]) so that
//! durability (`db`) stays separate from the merge logic.

mod db;

pub use db::StatusDb;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::manifest::BinaryParagraph;
use crate::paragraph::Paragraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Want {
    Install,
    Purge,
    Hold,
}

impl Want {
    fn as_str(&self) -> &'static str {
        match self {
            Want::Install => "install",
            Want::Purge => "purge",
            Want::Hold => "hold",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "install" => Some(Want::Install),
            "purge" => Some(Want::Purge),
            "hold" => Some(Want::Hold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    HalfInstalled,
    Installed,
}

impl InstallState {
    fn as_str(&self) -> &'static str {
        match self {
            InstallState::NotInstalled => "not-installed",
            InstallState::HalfInstalled => "half-installed",
            InstallState::Installed => "installed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "not-installed" => Some(InstallState::NotInstalled),
            "half-installed" => Some(InstallState::HalfInstalled),
            "installed" => Some(InstallState::Installed),
            _ => None,
        }
    }
}

/// Primary key of a status record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatusKey {
    pub name: String,
    pub triplet: String,
    /// `None` for the core record of a package.
    pub feature: Option<String>,
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.feature {
            Some(feature) => write!(f, "{}[{}]:{}", self.name, feature, self.triplet),
            None => write!(f, "{}:{}", self.name, self.triplet),
        }
    }
}

/// One record in the status database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusParagraph {
    pub package: BinaryParagraph,
    pub want: Want,
    pub state: InstallState,
}

impl StatusParagraph {
    pub fn new(package: BinaryParagraph, want: Want, state: InstallState) -> Self {
        Self {
            package,
            want,
            state,
        }
    }

    pub fn key(&self) -> StatusKey {
        StatusKey {
            name: self.package.spec.name().to_string(),
            triplet: self.package.spec.triplet().canonical_name().to_string(),
            feature: self.package.feature.clone(),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.want == Want::Install && self.state == InstallState::Installed
    }

    pub fn to_paragraph(&self) -> Paragraph {
        let mut p = self.package.to_paragraph();
        p.push(
            "Status",
            format!("{} ok {}", self.want.as_str(), self.state.as_str()),
        );
        p
    }

    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let package = BinaryParagraph::from_paragraph(paragraph)?;
        let status_line = paragraph.get("Status").ok_or_else(|| {
            Error::Status(format!(
                "record for {} has no Status: field",
                package.displayname()
            ))
        })?;

        let mut words = status_line.split_whitespace();
        let (want, ok, state) = (words.next(), words.next(), words.next());
        let parsed = match (want, ok, state, words.next()) {
            (Some(want), Some("ok"), Some(state), None) => {
                Want::parse(want).zip(InstallState::parse(state))
            }
            _ => None,
        };
        let (want, state) = parsed.ok_or_else(|| {
            Error::Status(format!(
                "record for {}: malformed status line '{}'",
                package.displayname(),
                status_line
            ))
        })?;

        Ok(Self {
            package,
            want,
            state,
        })
    }
}

/// Replay a base snapshot plus a sequence of update batches into the
/// current view. Later records win per key; records that reach
/// `purge`/`not-installed` drop out of the view entirely.
pub fn rebuild_index<I, J>(base: I, updates: J) -> BTreeMap<StatusKey, StatusParagraph>
where
    I: IntoIterator<Item = StatusParagraph>,
    J: IntoIterator<Item = StatusParagraph>,
{
    let mut index = BTreeMap::new();
    for record in base.into_iter().chain(updates) {
        let key = record.key();
        if record.want == Want::Purge && record.state == InstallState::NotInstalled {
            index.remove(&key);
        } else {
            index.insert(key, record);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paragraph::{parse_paragraphs, serialize_paragraph};

    fn record(name: &str, feature: Option<&str>, want: Want, state: InstallState) -> StatusParagraph {
        let text = match feature {
            Some(f) => format!(
                "Package: {}\nFeature: {}\nVersion: 1.0\nArchitecture: x64-windows\nMulti-Arch: same\nStatus: {} ok {}\n",
                name, f, want.as_str(), state.as_str()
            ),
            None => format!(
                "Package: {}\nVersion: 1.0\nArchitecture: x64-windows\nMulti-Arch: same\nStatus: {} ok {}\n",
                name, want.as_str(), state.as_str()
            ),
        };
        let paragraphs = parse_paragraphs(&text).unwrap();
        StatusParagraph::from_paragraph(&paragraphs[0]).unwrap()
    }

    #[test]
    fn test_status_roundtrip() {
        let r = record("zlib", None, Want::Install, InstallState::Installed);
        let text = serialize_paragraph(&r.to_paragraph());
        let reparsed =
            StatusParagraph::from_paragraph(&parse_paragraphs(&text).unwrap()[0]).unwrap();
        assert_eq!(reparsed, r);
        assert!(reparsed.is_installed());
    }

    #[test]
    fn test_malformed_status_line() {
        let text = "Package: zlib\nVersion: 1\nArchitecture: x64-windows\nStatus: installed\n";
        let paragraphs = parse_paragraphs(text).unwrap();
        assert!(StatusParagraph::from_paragraph(&paragraphs[0]).is_err());
    }

    #[test]
    fn test_key_distinguishes_features() {
        let core = record("curl", None, Want::Install, InstallState::Installed);
        let tls = record("curl", Some("tls"), Want::Install, InstallState::Installed);
        assert_ne!(core.key(), tls.key());
        assert_eq!(core.key().to_string(), "curl:x64-windows");
        assert_eq!(tls.key().to_string(), "curl[tls]:x64-windows");
    }

    #[test]
    fn test_rebuild_index_later_records_win() {
        let base = vec![record("zlib", None, Want::Install, InstallState::HalfInstalled)];
        let updates = vec![record("zlib", None, Want::Install, InstallState::Installed)];
        let index = rebuild_index(base, updates);
        assert_eq!(index.len(), 1);
        assert!(index.values().next().unwrap().is_installed());
    }

    #[test]
    fn test_rebuild_index_purge_drops_record() {
        let base = vec![record("zlib", None, Want::Install, InstallState::Installed)];
        let updates = vec![record("zlib", None, Want::Purge, InstallState::NotInstalled)];
        let index = rebuild_index(base, updates);
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_index_idempotent_under_duplication() {
        let updates: Vec<_> = vec![
            record("a", None, Want::Install, InstallState::Installed),
            record("b", None, Want::Purge, InstallState::HalfInstalled),
        ];
        let once = rebuild_index(updates.clone(), []);
        let twice = rebuild_index(updates.clone(), updates);
        assert_eq!(once, twice);
    }
}
