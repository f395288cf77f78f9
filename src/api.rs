// API client module: a small blocking HTTP client that posts paged list
// requests to OMIE. Every call is a JSON POST carrying the call name, the
// app credentials and the page parameters; there is no retry or backoff.

use crate::credentials::Credentials;
use crate::error::Result;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Records requested per page. OMIE caps list calls at 50.
pub const PAGE_SIZE: u32 = 50;

/// Pagination parameters, the single element of `param`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PageParam {
    pub pagina: u32,
    pub registros_por_pagina: u32,
}

/// Request body for one page of a list call. Field names are fixed by the
/// OMIE API.
#[derive(Serialize, Debug, Clone)]
pub struct PageRequest<'a> {
    pub call: &'a str,
    pub app_key: &'a str,
    pub app_secret: &'a str,
    pub param: [PageParam; 1],
}

impl<'a> PageRequest<'a> {
    pub fn new(call: &'a str, creds: &'a Credentials, page: u32) -> Self {
        PageRequest {
            call,
            app_key: &creds.key,
            app_secret: &creds.secret,
            param: [PageParam {
                pagina: page,
                registros_por_pagina: PAGE_SIZE,
            }],
        }
    }

    pub fn page(&self) -> u32 {
        self.param[0].pagina
    }
}

/// What came back for one page request. Only `Page` carries data; the other
/// variants say why there is none, so callers can tell a failed request from
/// the natural end of the listing.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Page(Value),
    HttpStatus { status: u16, body: String },
    Transport(String),
    Malformed(String),
}

/// Anything that can answer a page request. `OmieClient` talks HTTP; tests
/// plug in scripted sources.
pub trait PageSource {
    fn fetch_page(&self, url: &str, request: &PageRequest<'_>) -> PageOutcome;
}

impl<S: PageSource + ?Sized> PageSource for &S {
    fn fetch_page(&self, url: &str, request: &PageRequest<'_>) -> PageOutcome {
        (**self).fetch_page(url, request)
    }
}

/// Blocking OMIE client. Cheap to clone; the inner reqwest client shares its
/// connection pool.
#[derive(Clone)]
pub struct OmieClient {
    client: Client,
}

impl OmieClient {
    /// Build a client with a JSON content type on every request and the
    /// reqwest default timeouts.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("omie-export/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(OmieClient { client })
    }
}

impl PageSource for OmieClient {
    fn fetch_page(&self, url: &str, request: &PageRequest<'_>) -> PageOutcome {
        debug!(call = request.call, url, page = request.page(), "POST page");
        let res = match self.client.post(url).json(request).send() {
            Ok(res) => res,
            Err(e) => {
                warn!(error = %e, "request failed");
                return PageOutcome::Transport(e.to_string());
            }
        };
        // Only 200 carries a page; any other status, 2xx included, ends the run.
        if res.status() != StatusCode::OK {
            let status = res.status().as_u16();
            let body = res.text().unwrap_or_default();
            warn!(status, "non-200 response");
            return PageOutcome::HttpStatus { status, body };
        }
        match res.json::<Value>() {
            Ok(v) => PageOutcome::Page(v),
            Err(e) => {
                warn!(error = %e, "response body is not JSON");
                PageOutcome::Malformed(e.to_string())
            }
        }
    }
}

/// Read `total_de_paginas` from a page response. Integers and numeric strings
/// are accepted; anything else counts as zero.
pub fn total_pages(page: &Value) -> u64 {
    match page.get("total_de_paginas") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Whether a response counts as "no data": null, false, zero, or an empty
/// string, array or object.
pub fn is_empty_page(page: &Value) -> bool {
    match page {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
