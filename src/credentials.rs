// Credential handling: the (app_key, app_secret) pair sent with every call,
// and a small JSON file of named profiles so several OMIE accounts can be
// kept side by side.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Profile name used when credentials are entered without choosing a name.
pub const DEFAULT_PROFILE: &str = "default";

/// The key/secret pair identifying the caller to the OMIE API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"***")
            .finish()
    }
}

impl Credentials {
    /// Build a pair from user input, trimming whitespace. Both halves are
    /// required.
    pub fn new(key: &str, secret: &str) -> Result<Self> {
        let key = key.trim();
        let secret = secret.trim();
        if key.is_empty() || secret.is_empty() {
            return Err(Error::MissingCredentials(
                "please enter both API key and secret".into(),
            ));
        }
        Ok(Credentials {
            key: key.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Read `APP_KEY` / `APP_SECRET` from the environment (a `.env` file is
    /// loaded by `config` beforehand). Absent or blank values yield `None`.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("APP_KEY").ok()?;
        let secret = std::env::var("APP_SECRET").ok()?;
        Credentials::new(&key, &secret).ok()
    }
}

/// Where the active credentials came from, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Profile(String),
    Environment,
    Entered,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Profile(name) => write!(f, "profile \"{}\"", name),
            CredentialSource::Environment => write!(f, "environment (APP_KEY/APP_SECRET)"),
            CredentialSource::Entered => write!(f, "entered"),
        }
    }
}

/// Named credential profiles persisted as a JSON object:
/// `{ "<name>": { "key": "...", "secret": "..." } }`.
///
/// Every mutation is written to disk immediately.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, Credentials>,
}

impl ProfileStore {
    /// Default profiles file: `<config dir>/omie-export/credentials.json`,
    /// falling back to the working directory when no config dir exists.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("omie-export"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("credentials.json")
    }

    /// Load profiles from `path`. A missing file gives an empty store; an
    /// unreadable or malformed one is logged and also treated as empty so the
    /// user can still enter credentials.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring malformed profiles file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read profiles file");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), count = profiles.len(), "loaded profiles");
        ProfileStore { path, profiles }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Profile names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Credentials> {
        self.profiles.get(name)
    }

    /// Insert or replace a profile and persist.
    pub fn save(&mut self, name: &str, creds: Credentials) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::MissingCredentials("profile name is empty".into()));
        }
        self.profiles.insert(name.to_string(), creds);
        self.persist()
    }

    /// Remove a profile and persist. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if self.profiles.remove(name).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        let err = |message: String| Error::Profiles {
            path: self.path.clone(),
            message,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| err(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&self.profiles)?;
        fs::write(&self.path, text).map_err(|e| err(e.to_string()))?;
        debug!(path = %self.path.display(), count = self.profiles.len(), "saved profiles");
        Ok(())
    }
}

/// Find credentials for a run without prompting.
///
/// Order: the explicitly named profile, then the environment pair, then the
/// `default` profile. `Ok(None)` means the caller must acquire credentials
/// (prompt). Naming a profile that does not exist is an error.
pub fn resolve(
    store: &ProfileStore,
    profile: Option<&str>,
    env: Option<Credentials>,
) -> Result<Option<(Credentials, CredentialSource)>> {
    if let Some(name) = profile {
        return match store.get(name) {
            Some(c) => Ok(Some((c.clone(), CredentialSource::Profile(name.to_string())))),
            None => Err(Error::MissingCredentials(format!(
                "no profile named \"{}\" in {}",
                name,
                store.path().display()
            ))),
        };
    }
    if let Some(c) = env {
        return Ok(Some((c, CredentialSource::Environment)));
    }
    Ok(store
        .get(DEFAULT_PROFILE)
        .map(|c| (c.clone(), CredentialSource::Profile(DEFAULT_PROFILE.to_string()))))
}
