// Run configuration, built once in `main` and passed down by reference.
// Precedence: command line flags, then environment (including `.env`), then
// built-in defaults.

use crate::credentials::ProfileStore;
use crate::endpoints::DEFAULT_API_BASE;
use crate::output::DEFAULT_BASE_NAME;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root URL the registered call paths are joined onto.
    pub api_base: String,
    pub profiles_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_base: String,
    /// Treat a run that ended on a failed request as an error.
    pub strict: bool,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            profiles_path: ProfileStore::default_path(),
            output_dir: PathBuf::from("."),
            output_base: DEFAULT_BASE_NAME.to_string(),
            strict: false,
            log_level: "info".to_string(),
        }
    }
}

/// Values that may be overridden from the command line. `None` keeps the
/// environment or default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base: Option<String>,
    pub profiles_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub strict: bool,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Load `.env` (if any) into the process environment, then build the
    /// configuration from the real environment.
    pub fn load(overrides: Overrides) -> Self {
        // A missing .env file is the normal case.
        let _ = dotenv::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok(), overrides)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, overrides: Overrides) -> Self {
        let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut cfg = AppConfig::default();
        if let Some(v) = overrides.api_base.or_else(|| env("OMIE_API_BASE")) {
            cfg.api_base = v;
        }
        if let Some(v) = overrides
            .profiles_path
            .or_else(|| env("OMIE_PROFILES").map(PathBuf::from))
        {
            cfg.profiles_path = v;
        }
        if let Some(v) = overrides
            .output_dir
            .or_else(|| env("OMIE_OUTPUT_DIR").map(PathBuf::from))
        {
            cfg.output_dir = v;
        }
        if let Some(v) = overrides.log_level.or_else(|| env("OMIE_LOG")) {
            cfg.log_level = v;
        }
        cfg.strict = overrides.strict;
        cfg
    }
}
