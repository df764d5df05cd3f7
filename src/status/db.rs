// src/status/db.rs

//! The durable status store.
//!
//! On disk this is the `status` snapshot plus a directory of numbered
//! update files. Every mutation is journaled with write-then-rename so a
//! crash can only lose the update being written, never corrupt the store:
//! a partially written `incomplete` file is invisible to the loader because
//! its name never becomes a number.
//!
//! Loading replays the snapshot and all pending updates, then compacts: the
//! merged view is rewritten to `status` (again via temp + rename) and the
//! applied update files are deleted. Loading is therefore a fixed-point and
//! doubles as crash recovery.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::paragraph::{parse_paragraphs, serialize_paragraphs, Paragraph};
use crate::paths::InstallationPaths;
use crate::spec::Triplet;

use super::{rebuild_index, InstallState, StatusKey, StatusParagraph, Want};

const INCOMPLETE_NAME: &str = "incomplete";

pub struct StatusDb {
    status_file: PathBuf,
    updates_dir: PathBuf,
    info_dir: PathBuf,
    index: BTreeMap<StatusKey, StatusParagraph>,
    next_update: u64,
}

fn parse_status_records(path: &PathBuf) -> Result<Vec<StatusParagraph>> {
    let text = fs::read_to_string(path)?;
    let paragraphs = parse_paragraphs(&text).map_err(|e| e.in_file(path))?;
    paragraphs
        .iter()
        .map(StatusParagraph::from_paragraph)
        .collect()
}

impl StatusDb {
    /// Load and compact the store. Errors here are always fatal: a status
    /// database we cannot read is a data-integrity problem, not a condition
    /// to limp past.
    pub fn load(paths: &InstallationPaths) -> Result<Self> {
        fs::create_dir_all(&paths.updates_dir)?;
        fs::create_dir_all(&paths.info_dir)?;

        let base = if paths.status_file.is_file() {
            parse_status_records(&paths.status_file)?
        } else {
            Vec::new()
        };

        // Pending updates, in sequence order. Anything not named as a
        // number is a leftover from an interrupted write and is ignored.
        let mut pending: Vec<(u64, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&paths.updates_dir)? {
            let path = entry?.path();
            let stem = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match stem.parse::<u64>() {
                Ok(seq) => pending.push((seq, path)),
                Err(_) => debug!("ignoring non-journal file {}", path.display()),
            }
        }
        pending.sort_by_key(|(seq, _)| *seq);

        let mut updates = Vec::new();
        for (_, path) in &pending {
            updates.extend(parse_status_records(path)?);
        }

        let next_update = pending.last().map(|(seq, _)| seq + 1).unwrap_or(1);
        let mut db = Self {
            status_file: paths.status_file.clone(),
            updates_dir: paths.updates_dir.clone(),
            info_dir: paths.info_dir.clone(),
            index: rebuild_index(base, updates),
            next_update,
        };

        db.compact(&pending)?;
        Ok(db)
    }

    /// Rewrite `status` from the in-memory view, then drop applied updates.
    /// Ordered so that a crash at any point replays to the same state.
    fn compact(&mut self, applied: &[(u64, PathBuf)]) -> Result<()> {
        let serialized = serialize_paragraphs(
            self.index
                .values()
                .map(StatusParagraph::to_paragraph)
                .collect::<Vec<_>>()
                .iter(),
        );

        let temp_path = self.status_file.with_extension("incomplete");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.status_file)?;

        for (_, path) in applied {
            fs::remove_file(path)?;
        }
        self.next_update = 1;
        Ok(())
    }

    /// Journal a batch of records as one atomic update, then apply them to
    /// the in-memory view. The records are durable before this returns.
    pub fn write_updates(&mut self, records: &[StatusParagraph]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let paragraphs: Vec<Paragraph> =
            records.iter().map(StatusParagraph::to_paragraph).collect();
        let serialized = serialize_paragraphs(paragraphs.iter());

        let incomplete = self.updates_dir.join(INCOMPLETE_NAME);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&incomplete)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        let final_path = self.updates_dir.join(format!("{:06}", self.next_update));
        fs::rename(&incomplete, &final_path)?;
        self.next_update += 1;

        for record in records {
            let key = record.key();
            if record.want == Want::Purge && record.state == InstallState::NotInstalled {
                self.index.remove(&key);
            } else {
                self.index.insert(key, record.clone());
            }
        }
        Ok(())
    }

    pub fn write_update(&mut self, record: StatusParagraph) -> Result<()> {
        self.write_updates(std::slice::from_ref(&record))
    }

    /// Latest record for a key, whatever its state.
    pub fn find(&self, name: &str, triplet: &Triplet, feature: Option<&str>) -> Option<&StatusParagraph> {
        self.index.get(&StatusKey {
            name: name.to_string(),
            triplet: triplet.canonical_name().to_string(),
            feature: feature.map(str::to_string),
        })
    }

    /// Record for a key only if it is fully installed.
    pub fn find_installed(
        &self,
        name: &str,
        triplet: &Triplet,
        feature: Option<&str>,
    ) -> Option<&StatusParagraph> {
        self.find(name, triplet, feature).filter(|r| r.is_installed())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusParagraph> {
        self.index.values()
    }

    /// Installed core packages with the paths they contributed, read from
    /// their listfiles. Feature records share the core record's listfile and
    /// are not re-read.
    pub fn get_installed_files(&self) -> Result<Vec<(StatusParagraph, Vec<String>)>> {
        let mut out = Vec::new();
        for record in self.index.values() {
            if record.package.feature.is_some() || record.state != InstallState::Installed {
                continue;
            }
            let listfile = self
                .info_dir
                .join(format!("{}.list", record.package.fullstem()));
            let files = match fs::read_to_string(&listfile) {
                Ok(text) => text.lines().map(str::to_string).collect(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        "installed package {} has no listfile at {}",
                        record.package.displayname(),
                        listfile.display()
                    );
                    Vec::new()
                }
                Err(e) => return Err(Error::Io(e)),
            };
            out.push((record.clone(), files));
        }
        Ok(out)
    }

    pub fn listfile_path(&self, record: &StatusParagraph) -> PathBuf {
        self.info_dir
            .join(format!("{}.list", record.package.fullstem()))
    }
}
