// layout.rs — Names of the files and directories inside a workspace.
//
// Generator programs find their input and drop their output by fixed
// names relative to their working directory. Those names are an external
// contract, so they live in config rather than in code; the defaults match
// the generators shipped with the original deployment.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// Directory and file names used inside every workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLayout {
    /// Subdirectory generators write their outputs into.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// File name of the base spreadsheet in the workspace root.
    #[serde(default = "default_base_file_name")]
    pub base_file_name: String,

    /// Secondary directory that also receives a copy of the base file.
    #[serde(default = "default_base_dir_name")]
    pub base_dir_name: String,

    /// File name of the materialized archive in the workspace root.
    #[serde(default = "default_archive_file_name")]
    pub archive_file_name: String,
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            base_file_name: default_base_file_name(),
            base_dir_name: default_base_dir_name(),
            archive_file_name: default_archive_file_name(),
        }
    }
}

fn default_results_dir() -> String {
    "résultats".to_string()
}

fn default_base_file_name() -> String {
    "nepastoucher.xlsx".to_string()
}

fn default_base_dir_name() -> String {
    "fichier de base".to_string()
}

fn default_archive_file_name() -> String {
    "resultats.zip".to_string()
}

impl WorkspaceLayout {
    /// Every entry must be one plain path component, and the archive must
    /// not collide with the results directory.
    pub fn validate(&self) -> Result<(), WorkspaceError> {
        check_component("results_dir", &self.results_dir)?;
        check_component("base_file_name", &self.base_file_name)?;
        check_component("base_dir_name", &self.base_dir_name)?;
        check_component("archive_file_name", &self.archive_file_name)?;
        if self.archive_file_name == self.results_dir {
            return Err(WorkspaceError::InvalidLayout {
                field: "archive_file_name",
                value: self.archive_file_name.clone(),
            });
        }
        Ok(())
    }
}

/// True when `value` is exactly one normal path component.
pub fn is_single_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains(&['/', '\\'][..])
}

fn check_component(field: &'static str, value: &str) -> Result<(), WorkspaceError> {
    if is_single_component(value) {
        Ok(())
    } else {
        Err(WorkspaceError::InvalidLayout {
            field,
            value: value.to_string(),
        })
    }
}
