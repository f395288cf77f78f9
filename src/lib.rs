// Library root
// -----------
// This crate exposes the export logic behind the `omie-export` binary. The
// binary (`main.rs`) parses the command line and either runs a single export
// or hands over to the interactive menu in `ui`.
//
// Module responsibilities:
// - `endpoints`: the fixed set of OMIE list calls and their URLs.
// - `credentials`: app key/secret pairs and the named profile file.
// - `api`: the blocking HTTP client and the `PageSource` seam.
// - `paginator`: the page loop and its background-worker wrapper.
// - `output`: result file naming, rendering and export.
// - `export`: one full run, fetch then write.
// - `config`, `logging`, `error`: ambient plumbing.
// - `ui`: terminal menus, prompts and progress display.
pub mod api;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod logging;
pub mod output;
pub mod paginator;
pub mod ui;

pub use error::{Error, Result};
