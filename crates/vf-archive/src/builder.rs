// builder.rs — Write collected results into one deflate-compressed zip.
//
// The archive is materialized on disk, outside the results directory, and
// only then read back for the response. Zero entries still produce a valid
// (empty) zip.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::collect::{ArchiveEntry, NameRegistry};
use crate::error::ArchiveError;

/// Deflate level used unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 9;

/// Extra in-memory file appended after the collected entries.
#[derive(Debug, Clone)]
pub struct Sidecar {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub compression_level: i64,
    pub sidecar: Option<Sidecar>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sidecar: None,
        }
    }
}

/// One file as stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the uncompressed content.
    pub sha256: String,
}

/// What was written, and where.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: Vec<EntrySummary>,
    /// Size of the finished zip on disk.
    pub archive_size: u64,
}

impl ArchiveSummary {
    /// Read the finished archive into memory.
    pub fn load(&self) -> Result<Vec<u8>, ArchiveError> {
        fs::read(&self.path).map_err(|source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// A file read back out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Write `entries` (and the optional sidecar) into a new zip at `dest`.
pub fn build_archive(
    entries: &[ArchiveEntry],
    dest: &Path,
    options: &ArchiveOptions,
) -> Result<ArchiveSummary, ArchiveError> {
    let file = File::create(dest).map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let mut names = NameRegistry::default();
    let mut written = Vec::with_capacity(entries.len() + 1);

    for entry in entries {
        let bytes = fs::read(&entry.source).map_err(|source| ArchiveError::Io {
            path: entry.source.clone(),
            source,
        })?;
        let name = names.claim(&entry.name);
        written.push(write_entry(&mut zip, &name, &bytes, options, dest)?);
    }

    if let Some(sidecar) = &options.sidecar {
        let name = names.claim(&sidecar.name);
        written.push(write_entry(&mut zip, &name, &sidecar.bytes, options, dest)?);
    }

    let mut out = zip.finish()?;
    out.flush().map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    drop(out);

    let archive_size = fs::metadata(dest)
        .map_err(|source| ArchiveError::Io {
            path: dest.to_path_buf(),
            source,
        })?
        .len();

    tracing::debug!(
        entries = written.len(),
        archive_size,
        "archive written to {}",
        dest.display()
    );

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        entries: written,
        archive_size,
    })
}

fn write_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
    options: &ArchiveOptions,
    dest: &Path,
) -> Result<EntrySummary, ArchiveError> {
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(options.compression_level))
        .large_file(bytes.len() as u64 >= u32::MAX as u64);

    zip.start_file(name, file_options)?;
    zip.write_all(bytes).map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    Ok(EntrySummary {
        name: name.to_string(),
        size: bytes.len() as u64,
        sha256: hash_bytes(bytes),
    })
}

/// Lowercase hex SHA-256.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Decode every entry of an in-memory zip, in archive order.
pub fn read_entries(archive: &[u8]) -> Result<Vec<ExtractedEntry>, ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut out = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        let name = file.name().to_string();
        file.read_to_end(&mut bytes).map_err(|source| ArchiveError::Io {
            path: PathBuf::from(&name),
            source,
        })?;
        out.push(ExtractedEntry { name, bytes });
    }
    Ok(out)
}
