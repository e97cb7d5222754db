// collect.rs — One-shot scan of a results directory.
//
// Generators may write anywhere under the results directory, at any depth.
// The archive is flat, so every regular file is entered under its file name
// alone. Two files with the same name in different subdirectories keep both
// copies: the later one (in sorted relative-path order) gets `-2`, `-3`, ...
// appended to its stem.
//
// Symlinks and other non-regular entries are skipped; a generator cannot
// pull files from outside its workspace into the archive.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ArchiveError;

/// A file found in the results directory, with its name inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    /// Flattened, collision-free name inside the archive.
    pub name: String,

    /// Path relative to the results directory.
    pub relative: PathBuf,

    /// Absolute path on disk.
    pub source: PathBuf,
}

/// Walk `results_dir` once and return every regular file, sorted by
/// relative path, with flattened archive names.
///
/// A results directory that does not exist yields no entries.
pub fn collect_entries(results_dir: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut found = Vec::new();
    walk(results_dir, results_dir, &mut found)?;
    found.sort_by(|a, b| a.0.cmp(&b.0));

    let mut names = NameRegistry::default();
    let entries = found
        .into_iter()
        .map(|(relative, source)| {
            let base = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = names.claim(&base);
            if name != base {
                tracing::warn!(
                    "archive name collision for {}, stored as {}",
                    relative.display(),
                    name
                );
            }
            ArchiveEntry {
                name,
                relative,
                source,
            }
        })
        .collect();

    Ok(entries)
}

fn walk(dir: &Path, root: &Path, found: &mut Vec<(PathBuf, PathBuf)>) -> Result<(), ArchiveError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && dir == root => return Ok(()),
        Err(source) => {
            return Err(ArchiveError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    for entry in entries {
        let entry = entry.map_err(|source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        // file_type() does not follow symlinks.
        let file_type = entry.file_type().map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            walk(&path, root, found)?;
        } else if file_type.is_file() {
            if let Ok(rel) = path.strip_prefix(root) {
                found.push((rel.to_path_buf(), path.clone()));
            }
        } else {
            tracing::debug!("skipping non-regular entry {}", path.display());
        }
    }

    Ok(())
}

/// Hands out archive names, suffixing the stem on collision.
#[derive(Debug, Default)]
pub(crate) struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    pub(crate) fn claim(&mut self, name: &str) -> String {
        if self.used.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, ext) = split_name(name);
        let mut n = 2;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// `report.tar.xlsx` splits as (`report.tar`, `xlsx`); dotfiles have no
/// extension.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}
