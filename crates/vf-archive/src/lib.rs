//! # vf-archive
//!
//! Bundles everything the generators wrote into one zip.
//!
//! The results directory is scanned exactly once, after every generator has
//! finished. Every regular file found is included, whatever its name or
//! format, flattened to its file name.
//!
//! ## Key components
//!
//! - [`collect_entries`] — recursive scan, sorted, collision-free names.
//! - [`build_archive`] — deflate (level 9 by default) zip on disk, with an
//!   optional in-memory sidecar such as an outcome manifest.
//! - [`read_entries`] — decode an archive back into memory.

pub mod builder;
pub mod collect;
pub mod error;

pub use builder::{
    build_archive, hash_bytes, read_entries, ArchiveOptions, ArchiveSummary, EntrySummary,
    ExtractedEntry, Sidecar, DEFAULT_COMPRESSION_LEVEL,
};
pub use collect::{collect_entries, ArchiveEntry};
pub use error::ArchiveError;
