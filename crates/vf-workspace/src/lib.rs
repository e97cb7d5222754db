//! # vf-workspace
//!
//! Per-request workspace manager for variant-forge.
//!
//! Every generation request gets its own directory under a shared work
//! root. Generator programs and the base spreadsheet are staged into it,
//! generators write their outputs into its results directory, and the
//! whole tree is removed when the request finishes.
//!
//! ## Key components
//!
//! - [`Workspace`] — the directory guard. Removed by [`Workspace::destroy`]
//!   or, failing that, on drop.
//! - [`WorkspaceId`] — time + nonce identifier, unique per request.
//! - [`WorkspaceLayout`] — the file and directory names generators expect.
//! - [`StagingReport`] — which generators were staged and which were
//!   skipped.

pub mod error;
pub mod id;
pub mod layout;
pub mod workspace;

pub use error::WorkspaceError;
pub use id::WorkspaceId;
pub use layout::WorkspaceLayout;
pub use workspace::{BaseFileOrigin, GeneratorScript, SkippedScript, StagingReport, Workspace};
