// src/manifest/mod.rs

//! Typed views over CONTROL paragraphs.
//!
//! `source` covers the port-side manifest (what can be built); `binary`
//! covers the post-build manifest (what was built, projected through a
//! triplet).

pub mod binary;
pub mod source;

pub use binary::{BinaryControlFile, BinaryParagraph};
pub use source::{
    filter_dependencies, Dependency, FeatureParagraph, SourceControlFile, SourceParagraph,
};
