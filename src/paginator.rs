// Page-by-page fetch loop for one list call, plus a worker-thread wrapper
// that streams progress over a channel for interactive use.

use crate::api::{is_empty_page, total_pages, PageOutcome, PageRequest, PageSource};
use crate::credentials::Credentials;
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why the loop stopped. The first two are the normal end of a listing; the
/// rest mean the last request failed and the result set may be short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    LastPage,
    EmptyPage,
    HttpStatus { status: u16, body: String },
    Transport(String),
    Malformed(String),
}

impl StopReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, StopReason::LastPage | StopReason::EmptyPage)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::LastPage => write!(f, "reached last page"),
            StopReason::EmptyPage => write!(f, "server returned an empty page"),
            StopReason::HttpStatus { status, .. } => write!(f, "HTTP error {}", status),
            StopReason::Transport(msg) => write!(f, "request failed: {}", msg),
            StopReason::Malformed(msg) => write!(f, "response was not valid JSON: {}", msg),
        }
    }
}

/// Everything one run produced: the raw page responses in fetch order and
/// how the loop ended.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub call: String,
    pub pages: Vec<Value>,
    /// Last `total_de_paginas` the server declared.
    pub total_pages: u64,
    pub stop: StopReason,
    pub elapsed: Duration,
}

impl FetchReport {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.stop.is_clean()
    }
}

/// Events emitted while fetching. `PageFetched` and `Log` come from the loop
/// itself; `Finished` and `Failed` are sent once by `spawn_fetch`.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    PageFetched { page: u32, total: u64 },
    Log(String),
    Finished(FetchReport),
    Failed(String),
}

/// Sequential paginator over one endpoint.
pub struct Paginator<'a, S: PageSource> {
    source: S,
    url: &'a str,
    call: &'a str,
    creds: &'a Credentials,
}

impl<'a, S: PageSource> Paginator<'a, S> {
    pub fn new(source: S, url: &'a str, call: &'a str, creds: &'a Credentials) -> Self {
        Paginator {
            source,
            url,
            call,
            creds,
        }
    }

    /// Fetch pages 1, 2, ... until the declared total is reached, a page comes
    /// back empty, or a request fails. Never returns an error: failures end
    /// the loop and are recorded in `FetchReport::stop`.
    pub fn run(&self, mut on_event: impl FnMut(FetchEvent)) -> FetchReport {
        let started = Instant::now();
        let mut pages = Vec::new();
        let mut total = 0u64;
        let mut page: u32 = 1;

        let stop = loop {
            let request = PageRequest::new(self.call, self.creds, page);
            on_event(FetchEvent::Log(format!(
                "Call: {} | URL: {} | Page: {}",
                self.call, self.url, page
            )));
            info!(call = self.call, url = self.url, page, "fetching page");

            let body = match self.source.fetch_page(self.url, &request) {
                PageOutcome::Page(body) => body,
                PageOutcome::HttpStatus { status, body } => {
                    on_event(FetchEvent::Log(format!("Error: {}", status)));
                    break StopReason::HttpStatus { status, body };
                }
                PageOutcome::Transport(msg) => {
                    on_event(FetchEvent::Log(format!("Error: {}", msg)));
                    break StopReason::Transport(msg);
                }
                PageOutcome::Malformed(msg) => {
                    on_event(FetchEvent::Log(format!("Error: {}", msg)));
                    break StopReason::Malformed(msg);
                }
            };
            if is_empty_page(&body) {
                break StopReason::EmptyPage;
            }

            total = total_pages(&body);
            pages.push(body);
            on_event(FetchEvent::PageFetched { page, total });

            page = match next_page(page, total) {
                Some(next) => next,
                None => break StopReason::LastPage,
            };
            on_event(FetchEvent::Log(format!(
                "Fetching page {} of {}",
                page, total
            )));
        };

        let elapsed = started.elapsed();
        if stop.is_clean() {
            info!(call = self.call, pages = pages.len(), ?elapsed, %stop, "pagination finished");
        } else {
            warn!(call = self.call, pages = pages.len(), ?elapsed, %stop, "pagination stopped early");
        }
        FetchReport {
            call: self.call.to_string(),
            pages,
            total_pages: total,
            stop,
            elapsed,
        }
    }
}

/// The page after `page`, or `None` once `total` is reached. A counter that
/// would overflow also ends the run.
pub fn next_page(page: u32, total: u64) -> Option<u32> {
    if u64::from(page) >= total {
        return None;
    }
    page.checked_add(1)
}

/// Run the paginator on a background thread. The receiver yields progress and
/// log events followed by exactly one `Finished` or `Failed`. A panic inside
/// the worker is caught and reported as `Failed`.
pub fn spawn_fetch<S>(
    source: S,
    url: String,
    call: String,
    creds: Credentials,
) -> (JoinHandle<()>, Receiver<FetchEvent>)
where
    S: PageSource + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || worker(source, url, call, creds, tx));
    (handle, rx)
}

fn worker<S: PageSource>(
    source: S,
    url: String,
    call: String,
    creds: Credentials,
    tx: Sender<FetchEvent>,
) {
    let progress = tx.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Paginator::new(&source, &url, &call, &creds).run(|event| {
            // A closed receiver just means nobody is watching any more.
            let _ = progress.send(event);
        })
    }));
    let last = match result {
        Ok(report) => FetchEvent::Finished(report),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            FetchEvent::Failed(format!("fetch worker panicked: {}", msg))
        }
    };
    if tx.send(last).is_err() {
        debug!("fetch result dropped: receiver closed");
    }
}
