use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use secrecy::SecretString;
use std::path::PathBuf;

pub const DEFAULT_ESTIMATE_TIMEOUT_SECS: u64 = 20;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrilog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("nutrilog.db");

        Ok(Config { db_path, data_dir })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        tracing::info!(path = %path.display(), "generated new API key");
        eprintln!("Generated new API key: {key}");
        eprintln!("Send it with every request: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

/// Where free-text meal descriptions are sent for calorie estimation.
#[derive(Clone, Debug)]
pub struct EstimatorConfig {
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

impl EstimatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Read settings through `get` so tests never touch the process
    /// environment. Blank values count as unset.
    pub fn from_env_with<F>(mut get: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut read = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let url = read("NUTRILOG_ESTIMATE_URL");
        let api_key = read("NUTRILOG_ESTIMATE_KEY").map(|k| SecretString::new(k.into()));
        let timeout_secs = match read("NUTRILOG_ESTIMATE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("Invalid NUTRILOG_ESTIMATE_TIMEOUT_SECS: {raw}"))?;
                if secs == 0 {
                    bail!("NUTRILOG_ESTIMATE_TIMEOUT_SECS must be greater than 0");
                }
                secs
            }
            None => DEFAULT_ESTIMATE_TIMEOUT_SECS,
        };

        Ok(Self {
            url,
            api_key,
            timeout_secs,
        })
    }

    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .context("Estimation is not configured. Set NUTRILOG_ESTIMATE_URL")
    }
}
