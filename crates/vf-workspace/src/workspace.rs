// workspace.rs — Isolated per-request workspace for one generation run.
//
// A Workspace is a directory tree under a shared work root:
//
//   <work_root>/<id>/
//     <generator scripts>          staged copies of allow-listed generators
//     <base file>                  the spreadsheet every generator reads
//     <base dir>/<base file>       duplicate where generators also look
//     <results dir>/...            whatever the generators write
//     <archive file>               the zip, materialized after all runs
//
// Key design:
// - One workspace per request, named by a unique WorkspaceId
// - The directory is removed exactly once: either by `destroy()` or, if
//   that is never reached (error, panic, dropped future), by `Drop`
// - Staging a generator never fails the request; a missing script is
//   reported back as skipped and the batch continues with the rest

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;
use crate::id::WorkspaceId;
use crate::layout::{is_single_component, WorkspaceLayout};

/// A generator program staged into a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorScript {
    /// Allow-list name (also the file name at the source and in the workspace).
    pub name: String,

    /// Where the script was copied from.
    pub source: PathBuf,

    /// Where the script now lives inside the workspace.
    pub staged: PathBuf,
}

/// A generator that could not be staged, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedScript {
    pub name: String,
    pub reason: String,
}

/// Result of staging the allow-list into a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingReport {
    pub staged: Vec<GeneratorScript>,
    pub skipped: Vec<SkippedScript>,
}

impl StagingReport {
    /// Look up a staged script by allow-list name.
    pub fn script(&self, name: &str) -> Option<&GeneratorScript> {
        self.staged.iter().find(|s| s.name == name)
    }

    /// Why a script was skipped, if it was.
    pub fn skip_reason(&self, name: &str) -> Option<&str> {
        self.skipped
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.reason.as_str())
    }

    fn skip(&mut self, name: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedScript {
            name: name.to_string(),
            reason: reason.into(),
        });
    }
}

/// Where the staged base file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseFileOrigin {
    /// Bytes supplied with the request.
    Uploaded,
    /// The configured default base file.
    Default,
}

/// An isolated per-request workspace.
///
/// Owned by exactly one request. The directory tree is deleted when the
/// workspace is destroyed or dropped, whichever comes first.
#[derive(Debug)]
pub struct Workspace {
    id: WorkspaceId,
    root: PathBuf,
    layout: WorkspaceLayout,
    released: AtomicBool,
}

impl Workspace {
    /// Create `<work_root>/<id>/` with its results and base-file
    /// subdirectories.
    ///
    /// The id directory is created with `create_dir`, not `create_dir_all`,
    /// so two requests can never share a directory: an existing directory
    /// is an error.
    pub fn create(
        work_root: impl AsRef<Path>,
        id: WorkspaceId,
        layout: WorkspaceLayout,
    ) -> Result<Self, WorkspaceError> {
        layout.validate()?;

        let work_root =
            std::path::absolute(work_root.as_ref()).map_err(|source| WorkspaceError::Create {
                path: work_root.as_ref().to_path_buf(),
                source,
            })?;
        fs::create_dir_all(&work_root).map_err(|source| WorkspaceError::Create {
            path: work_root.clone(),
            source,
        })?;

        let root = work_root.join(id.as_str());
        fs::create_dir(&root).map_err(|source| WorkspaceError::Create {
            path: root.clone(),
            source,
        })?;

        // From here on the guard owns the directory and removes it on error.
        let workspace = Self {
            id,
            root,
            layout,
            released: AtomicBool::new(false),
        };

        for dir in [workspace.results_dir(), workspace.base_dir()] {
            fs::create_dir_all(&dir).map_err(|source| WorkspaceError::Create {
                path: dir.clone(),
                source,
            })?;
        }

        tracing::debug!(
            workspace = %workspace.id,
            root = %workspace.root.display(),
            "workspace created"
        );
        Ok(workspace)
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Directory generators write their outputs into.
    pub fn results_dir(&self) -> PathBuf {
        self.root.join(&self.layout.results_dir)
    }

    /// Secondary directory holding a duplicate of the base file.
    pub fn base_dir(&self) -> PathBuf {
        self.root.join(&self.layout.base_dir_name)
    }

    /// Staged base file in the workspace root.
    pub fn base_file_path(&self) -> PathBuf {
        self.root.join(&self.layout.base_file_name)
    }

    /// Where the archive is materialized.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(&self.layout.archive_file_name)
    }

    /// Where a generator with the given allow-list name is staged.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Copy each named generator from `source_dir` into the workspace root.
    ///
    /// Never fails as a whole: a script that is missing at the source, has
    /// an unusable name, or cannot be copied is listed in
    /// [`StagingReport::skipped`] and the rest are staged anyway.
    pub fn stage_generators<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        source_dir: impl AsRef<Path>,
    ) -> StagingReport {
        let source_dir = source_dir.as_ref();
        let mut report = StagingReport::default();

        for name in names {
            if !is_single_component(name) || self.is_reserved(name) {
                report.skip(name, "invalid generator name");
                continue;
            }

            let source = source_dir.join(name);
            if !source.is_file() {
                tracing::warn!(
                    workspace = %self.id,
                    script = name,
                    "generator not found at {}, skipping",
                    source.display()
                );
                report.skip(name, format!("not found at {}", source.display()));
                continue;
            }

            let staged = self.script_path(name);
            // fs::copy carries permission bits over, so executables stay executable.
            match fs::copy(&source, &staged) {
                Ok(_) => report.staged.push(GeneratorScript {
                    name: name.to_string(),
                    source,
                    staged,
                }),
                Err(e) => {
                    tracing::warn!(
                        workspace = %self.id,
                        script = name,
                        "failed to stage generator: {}",
                        e
                    );
                    report.skip(name, format!("copy failed: {}", e));
                }
            }
        }

        report
    }

    /// Place the base file in the workspace.
    ///
    /// Uploaded bytes are written verbatim; otherwise `default_file` is
    /// copied. Either way a duplicate lands in the secondary base
    /// directory. With neither available this is a
    /// [`WorkspaceError::BaseFileMissing`].
    pub fn stage_base_file(
        &self,
        payload: Option<&[u8]>,
        default_file: Option<&Path>,
    ) -> Result<BaseFileOrigin, WorkspaceError> {
        let target = self.base_file_path();

        let origin = match payload {
            Some(bytes) => {
                fs::write(&target, bytes).map_err(|source| WorkspaceError::IoError {
                    path: target.clone(),
                    source,
                })?;
                BaseFileOrigin::Uploaded
            }
            None => match default_file {
                Some(default) if default.is_file() => {
                    fs::copy(default, &target).map_err(|source| WorkspaceError::IoError {
                        path: default.to_path_buf(),
                        source,
                    })?;
                    BaseFileOrigin::Default
                }
                Some(default) => {
                    return Err(WorkspaceError::BaseFileMissing {
                        searched: default.display().to_string(),
                    })
                }
                None => {
                    return Err(WorkspaceError::BaseFileMissing {
                        searched: "(no default configured)".to_string(),
                    })
                }
            },
        };

        let duplicate = self.base_dir().join(&self.layout.base_file_name);
        fs::copy(&target, &duplicate).map_err(|source| WorkspaceError::IoError {
            path: duplicate,
            source,
        })?;

        tracing::debug!(workspace = %self.id, ?origin, "base file staged");
        Ok(origin)
    }

    /// Recursively delete the workspace directory.
    ///
    /// Once a removal has succeeded, later calls (and the eventual `Drop`)
    /// are no-ops. A failed removal leaves the workspace unreleased, so a
    /// retry or the `Drop` tries again. Returns whether this call performed
    /// the removal.
    pub fn destroy(&self) -> Result<bool, WorkspaceError> {
        if self.released.load(Ordering::SeqCst) {
            return Ok(false);
        }
        remove_tree(&self.root)?;
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        tracing::debug!(workspace = %self.id, "workspace destroyed");
        Ok(true)
    }

    fn is_reserved(&self, name: &str) -> bool {
        name == self.layout.results_dir
            || name == self.layout.base_file_name
            || name == self.layout.base_dir_name
            || name == self.layout.archive_file_name
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        match remove_tree(&self.root) {
            Ok(()) => tracing::debug!(workspace = %self.id, "workspace released on drop"),
            Err(e) => tracing::error!(workspace = %self.id, "failed to release workspace: {}", e),
        }
    }
}

/// Forced recursive delete. A tree that is already gone counts as removed.
fn remove_tree(path: &Path) -> Result<(), WorkspaceError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WorkspaceError::IoError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
