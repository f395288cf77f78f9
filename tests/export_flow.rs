//! End-to-end runs of `export::run` against scripted page sources.

use omie_export::api::{PageOutcome, PageRequest, PageSource};
use omie_export::config::AppConfig;
use omie_export::credentials::Credentials;
use omie_export::endpoints::Registry;
use omie_export::export;
use omie_export::paginator::{FetchEvent, StopReason};
use omie_export::Error;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Serves canned outcomes and records every request body it receives.
struct Recorder {
    outcomes: RefCell<VecDeque<PageOutcome>>,
    seen: RefCell<Vec<(String, Value)>>,
}

impl Recorder {
    fn new(outcomes: Vec<PageOutcome>) -> Self {
        Recorder {
            outcomes: RefCell::new(outcomes.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn pages_requested(&self) -> Vec<u64> {
        self.seen
            .borrow()
            .iter()
            .map(|(_, body)| body["param"][0]["pagina"].as_u64().unwrap())
            .collect()
    }
}

impl PageSource for Recorder {
    fn fetch_page(&self, url: &str, request: &PageRequest<'_>) -> PageOutcome {
        let body = serde_json::to_value(request).unwrap();
        self.seen.borrow_mut().push((url.to_string(), body));
        self.outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request for page {}", request.page()))
    }
}

fn page(n: u64, total: u64) -> PageOutcome {
    PageOutcome::Page(json!({
        "pagina": n,
        "total_de_paginas": total,
        "registros": 1,
        "clientes_cadastro": [{ "codigo_cliente_omie": n, "razao_social": "Comércio Ação" }]
    }))
}

fn setup(strict: bool) -> (TempDir, AppConfig, Registry, Credentials) {
    let dir = tempdir().unwrap();
    let cfg = AppConfig {
        output_dir: dir.path().to_path_buf(),
        strict,
        ..AppConfig::default()
    };
    let registry = Registry::new("http://omie.test/api/v1/");
    let creds = Credentials::new("app-key", "app-secret").unwrap();
    (dir, cfg, registry, creds)
}

fn json_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn three_pages_are_fetched_in_order_and_saved() {
    let (dir, cfg, registry, creds) = setup(false);
    let source = Recorder::new(vec![page(1, 3), page(2, 3), page(3, 3)]);

    let outcome = export::run(&source, &registry, "ListarClientes", &creds, &cfg, |_| {}).unwrap();

    assert_eq!(source.pages_requested(), vec![1, 2, 3]);
    let (url, body) = source.seen.borrow()[0].clone();
    assert_eq!(url, "http://omie.test/api/v1/geral/clientes/");
    assert_eq!(
        body,
        json!({
            "call": "ListarClientes",
            "app_key": "app-key",
            "app_secret": "app-secret",
            "param": [{ "pagina": 1, "registros_por_pagina": 50 }]
        })
    );

    assert_eq!(outcome.path, dir.path().join("response.json"));
    assert_eq!(outcome.report.stop, StopReason::LastPage);
    let text = fs::read_to_string(&outcome.path).unwrap();
    assert!(text.contains("Comércio Ação"));
    let saved: Vec<Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(saved, outcome.report.pages);
    assert_eq!(saved.len(), 3);
}

#[test]
fn single_page_makes_one_request() {
    let (_dir, cfg, registry, creds) = setup(false);
    let source = Recorder::new(vec![page(1, 1)]);
    let outcome = export::run(&source, &registry, "ListarCategorias", &creds, &cfg, |_| {}).unwrap();
    assert_eq!(source.pages_requested(), vec![1]);
    assert_eq!(outcome.report.pages.len(), 1);
}

#[test]
fn first_page_error_writes_nothing() {
    let (dir, cfg, registry, creds) = setup(false);
    let source = Recorder::new(vec![PageOutcome::HttpStatus {
        status: 500,
        body: "{\"faultstring\": \"boom\"}".into(),
    }]);

    let err = export::run(&source, &registry, "ListarProjetos", &creds, &cfg, |_| {}).unwrap_err();
    assert!(matches!(err, Error::EmptyResult { ref call } if call == "ListarProjetos"));
    assert!(json_files(dir.path()).is_empty());
}

#[test]
fn lenient_run_keeps_partial_results() {
    let (dir, cfg, registry, creds) = setup(false);
    let source = Recorder::new(vec![
        page(1, 3),
        PageOutcome::Transport("connection reset".into()),
    ]);

    let outcome = export::run(&source, &registry, "ListarContasPagar", &creds, &cfg, |_| {}).unwrap();
    assert!(!outcome.report.is_complete());
    assert_eq!(outcome.report.pages.len(), 1);
    assert_eq!(json_files(dir.path()), vec!["response.json"]);
}

#[test]
fn strict_run_reports_truncation_after_saving() {
    let (dir, cfg, registry, creds) = setup(true);
    let source = Recorder::new(vec![
        page(1, 3),
        page(2, 3),
        PageOutcome::HttpStatus {
            status: 429,
            body: String::new(),
        },
    ]);

    let err = export::run(&source, &registry, "ListarContasReceber", &creds, &cfg, |_| {}).unwrap_err();
    match err {
        Error::Truncated { fetched, path, .. } => {
            assert_eq!(fetched, 2);
            assert!(path.exists());
        }
        other => panic!("expected Truncated, got {:?}", other),
    }
    assert_eq!(json_files(dir.path()), vec!["response.json"]);
}

#[test]
fn unknown_call_sends_no_request() {
    let (_dir, cfg, registry, creds) = setup(false);
    let source = Recorder::new(vec![]);
    let err = export::run(&source, &registry, "ListarTudo", &creds, &cfg, |_| {}).unwrap_err();
    assert!(matches!(err, Error::UnknownCall(_)));
    assert!(source.seen.borrow().is_empty());
}

#[test]
fn repeated_runs_never_overwrite() {
    let (dir, cfg, registry, creds) = setup(false);
    for _ in 0..3 {
        let source = Recorder::new(vec![page(1, 1)]);
        export::run(&source, &registry, "ListarClientes", &creds, &cfg, |_| {}).unwrap();
    }
    assert_eq!(
        json_files(dir.path()),
        vec!["response.json", "response_1.json", "response_2.json"]
    );
}

#[test]
fn progress_events_report_each_page() {
    let (_dir, cfg, registry, creds) = setup(false);
    let source = Recorder::new(vec![page(1, 2), page(2, 2)]);
    let mut progress = Vec::new();
    export::run(&source, &registry, "ListarClientes", &creds, &cfg, |e| {
        if let FetchEvent::PageFetched { page, total } = e {
            progress.push((page, total));
        }
    })
    .unwrap();
    assert_eq!(progress, vec![(1, 2), (2, 2)]);
}
