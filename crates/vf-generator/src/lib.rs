//! # vf-generator
//!
//! Runs the allow-listed variant generators for one workspace.
//!
//! Generators are external programs. They read the base spreadsheet from
//! the workspace root and write variants into the results directory. Any
//! of them may fail, crash, or hang; the runner records that and moves on.
//!
//! ## Key components
//!
//! - [`GeneratorSpec`] / [`stock_generators`] — the allow-list.
//! - [`GeneratorRunner`] — sequential or bounded-parallel execution with a
//!   per-generator timeout.
//! - [`GenerationOutcome`] / [`OutcomeManifest`] — what happened to each
//!   generator, in allow-list order.

pub mod allow_list;
pub mod error;
pub mod outcome;
pub mod runner;

pub use allow_list::{stock_generators, validate_allow_list, GeneratorSpec};
pub use error::GeneratorError;
pub use outcome::{GenerationOutcome, OutcomeManifest, OutcomeStatus};
pub use runner::{GeneratorRunner, RunnerConfig, WORKSPACE_ENV};
