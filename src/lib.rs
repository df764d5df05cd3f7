// src/lib.rs

//! Quarry Package Manager
//!
//! Source-based package manager for native C/C++ libraries. For a requested
//! set of packages, each pinned to a target triplet, quarry computes a
//! dependency-ordered plan, drives an external CMake-based toolchain to
//! produce per-package artifact trees, and merges them into a shared
//! installation prefix.
//!
//! # Architecture
//!
//! - Paragraph files: one RFC-822-like format for all metadata on disk
//! - Status journal: append-only numbered updates, compacted on load
//! - Plans: immutable values over two tagged action unions
//! - Builds: delegated to an external driver over a KEY=VALUE protocol
//! - No globals: per-run state travels in an explicit `RunContext`

pub mod build;
pub mod context;
mod error;
pub mod executor;
pub mod install;
pub mod manifest;
pub mod paragraph;
pub mod paths;
pub mod ports;
pub mod resolver;
pub mod spec;
pub mod status;

pub use context::{JsonFileMetrics, MetricsSink, NullMetrics, RunContext};
pub use error::{Error, Result};
pub use paths::InstallationPaths;
pub use spec::{FeatureSpec, FullPackageSpec, PackageSpec, Triplet};
