//! Harness environment loading
//!
//! Configuration comes from two places: the process environment and an
//! optional dotenv-style file (by convention `server/.env`). Values already
//! present in the process environment always win over the file, so a
//! developer can override a single key on the command line without editing
//! the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Error, Result};

pub const MONGO_URI: &str = "MONGO_URI";
pub const JWT_SECRET: &str = "JWT_SECRET";
pub const PORT: &str = "PORT";
pub const TEST_SERVER_PORT: &str = "TEST_SERVER_PORT";
pub const TEST_BASE_URL: &str = "TEST_BASE_URL";
pub const NODE_ENV: &str = "NODE_ENV";

/// Secret used when the environment does not provide one
pub const DEFAULT_JWT_SECRET: &str = "integration-test-secret";

/// Port the orchestrator binds the backend to for test runs
pub const DEFAULT_SERVER_PORT: u16 = 4100;

/// API origin used by rendered pages when no orchestrator exported one
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000/api";

/// Resolved harness configuration
#[derive(Debug, Clone)]
pub struct HarnessEnv {
    mongo_uri: String,
    jwt_secret: String,
    server_port: u16,
    base_url: String,
    /// Every resolved variable, forwarded to spawned processes
    vars: BTreeMap<String, String>,
}

impl HarnessEnv {
    pub fn mongo_uri(&self) -> &str {
        &self.mongo_uri
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// API base URL (origin plus `/api` prefix) pages talk to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// All resolved variables, in a stable order
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy with a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.vars.insert(TEST_BASE_URL.to_string(), base_url.clone());
        self.base_url = base_url;
        self
    }
}

/// Builder that merges an env file under the process environment
#[derive(Debug, Clone)]
pub struct EnvLoader {
    process: BTreeMap<String, String>,
    file: Option<PathBuf>,
}

impl EnvLoader {
    /// Loader seeded from the current process environment
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Loader seeded from an explicit variable set
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            process: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            file: None,
        }
    }

    /// Read defaults from a dotenv file; a missing file is not an error
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Resolve and validate the configuration
    pub fn load(self) -> Result<HarnessEnv> {
        let mut vars = match &self.file {
            Some(path) => read_env_file(path)?,
            None => BTreeMap::new(),
        };
        // Process values take precedence over anything the file defines.
        vars.extend(self.process);

        let mongo_uri = vars
            .get(MONGO_URI)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| Error::MissingConfig {
                var: MONGO_URI,
                hint: "integration tests run against the live database; set it in server/.env \
                       or export it before running the suite"
                    .to_string(),
            })?;

        let jwt_secret = vars
            .entry(JWT_SECRET.to_string())
            .or_insert_with(|| DEFAULT_JWT_SECRET.to_string())
            .clone();

        let server_port = match vars.get(TEST_SERVER_PORT) {
            Some(raw) => parse_port(TEST_SERVER_PORT, raw)?,
            None => DEFAULT_SERVER_PORT,
        };

        let base_url = vars
            .get(TEST_BASE_URL)
            .cloned()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        vars.insert(NODE_ENV.to_string(), "test".to_string());

        debug!(
            server_port,
            base_url = %base_url,
            "Resolved harness environment ({} variables)",
            vars.len()
        );

        Ok(HarnessEnv {
            mongo_uri,
            jwt_secret,
            server_port,
            base_url,
            vars,
        })
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        debug!("No environment file at {}", path.display());
        return Ok(BTreeMap::new());
    }

    let to_err = |source| Error::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let mut vars = BTreeMap::new();
    for item in dotenvy::from_path_iter(path).map_err(to_err)? {
        let (key, value) = item.map_err(to_err)?;
        vars.insert(key, value);
    }

    info!("Loaded {} variable(s) from {}", vars.len(), path.display());
    Ok(vars)
}

fn parse_port(var: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| Error::InvalidConfig(format!("{var} must be a port number, got {raw:?}")))
}
