// One complete export run: resolve the endpoint, page through it, write the
// result file. This is the non-interactive path; the UI drives the same
// pieces through the worker in `paginator`.

use crate::api::PageSource;
use crate::config::AppConfig;
use crate::credentials::Credentials;
use crate::endpoints::Registry;
use crate::error::{Error, Result};
use crate::output;
use crate::paginator::{FetchEvent, FetchReport, Paginator};
use std::path::PathBuf;
use tracing::warn;

/// A finished run: the report from the paginator and where it was saved.
#[derive(Debug)]
pub struct ExportOutcome {
    pub report: FetchReport,
    pub path: PathBuf,
}

/// Fetch every page of `call` and save the result set.
pub fn run(
    source: impl PageSource,
    registry: &Registry,
    call: &str,
    creds: &Credentials,
    cfg: &AppConfig,
    on_event: impl FnMut(FetchEvent),
) -> Result<ExportOutcome> {
    let endpoint = registry.get(call)?;
    let report = Paginator::new(source, &endpoint.url, endpoint.call, creds).run(on_event);
    finish(report, cfg)
}

/// Persist a report. An empty result set writes nothing. Partial results are
/// always written first; in strict mode a run that ended on a failed request
/// is then reported as `Error::Truncated`.
pub fn finish(report: FetchReport, cfg: &AppConfig) -> Result<ExportOutcome> {
    if report.is_empty() {
        if !report.is_complete() {
            warn!(call = %report.call, stop = %report.stop, "no pages fetched");
        }
        return Err(Error::EmptyResult { call: report.call });
    }

    let path = output::write_results(&cfg.output_dir, &cfg.output_base, &report.pages)?;

    if cfg.strict && !report.is_complete() {
        return Err(Error::Truncated {
            call: report.call,
            fetched: report.pages.len(),
            reason: report.stop.to_string(),
            path,
        });
    }
    Ok(ExportOutcome { report, path })
}
