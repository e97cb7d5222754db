//! # vf-daemon
//!
//! HTTP front door and request orchestrator for variant-forge.
//!
//! A POST to `/generate` carries a base spreadsheet. The handler gives the
//! request its own workspace, runs every allow-listed generator against
//! it, zips whatever they wrote and returns the zip. The workspace is gone
//! by the time the response leaves, whatever happened in between.
//!
//! ## Key components
//!
//! - [`RequestHandler`] — validate, stage, run, archive, release.
//! - [`RequestPhase`] — the request state machine.
//! - [`http::router`] — axum routes, CORS and upload limits.
//! - [`DaemonConfig`] — `vf.toml`.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod phase;
pub mod request;
pub mod response;
pub mod server;

pub use config::{ConfigError, ConfigOverrides, DaemonConfig, DEFAULT_CONFIG_FILE};
pub use error::HandlerError;
pub use handler::{RequestHandler, MANIFEST_ENTRY};
pub use phase::{PhaseError, RequestPhase, RequestRun};
pub use request::{GenerateRequest, RequestBody, ResponseEncoding};
pub use response::{ErrorBody, GenerateResponse, GeneratedArchive};
pub use server::serve;
