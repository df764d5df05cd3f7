// src/error.rs

//! Central error type for the quarry library.
//!
//! Build outcomes (`BuildResult`) are deliberately not errors; they are
//! ordinary return values classified by the executor. Everything in here is
//! a genuine failure that aborts the enclosing operation.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed paragraph file (CONTROL, status, BUILD_INFO).
    #[error("{path}:{line}: {reason}", path = path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid package specifier '{input}': {reason}")]
    InvalidSpec { input: String, reason: String },

    #[error("invalid triplet: {0}")]
    InvalidTriplet(String),

    #[error("the port {0} was not found in the ports tree")]
    PackageNotFound(String),

    #[error("package {package} has no feature named '{feature}'")]
    UnknownFeature { package: String, feature: String },

    #[error("cycle detected within the dependency graph: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Structurally valid paragraphs with invalid manifest content.
    #[error("manifest: {0}")]
    Manifest(String),

    /// The port directory and the Source: field disagree.
    #[error("the Source: field inside the CONTROL file does not match the port directory: '{name}' != '{directory}'")]
    PortNameMismatch { directory: String, name: String },

    #[error("no toolchain available for {0}")]
    UnsupportedToolchain(String),

    #[error("required external tool not found: {0}")]
    ToolNotFound(String),

    /// Status database integrity failure. Always fatal.
    #[error("status database: {0}")]
    Status(String),

    /// Installer detected a mutation it did not perform.
    #[error("install: {0}")]
    Install(String),

    /// Fail-fast executor abort for a non-succeeded action.
    #[error("building package {spec} failed with: {result}")]
    Build { spec: String, result: String },

    #[error("install plan cannot be empty")]
    EmptyPlan,
}
