// Configuration management
use crate::error::{CliError, Result};
use crate::store::ScopeStore;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_HOST: &str = "https://api.keyscope.dev";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Settings resolved once per invocation from flags, env vars and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Host used for new logins
    pub api_host: String,
    /// Set when the user passed an explicit host; overrides stored hosts
    pub api_host_override: bool,
    pub verify_tls: bool,
    pub config_dir: PathBuf,
}

impl Settings {
    pub fn resolve(
        api_host: Option<String>,
        no_verify_tls: bool,
        config_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => Self::default_config_dir()?,
        };

        let api_host_override = api_host.is_some();
        let api_host = api_host.unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        if no_verify_tls {
            tracing::warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            api_host,
            api_host_override,
            verify_tls: !no_verify_tls,
            config_dir,
        })
    }

    /// Get the config directory path
    ///
    /// Priority:
    /// 1. XDG_CONFIG_HOME/keyscope (if env var is set)
    /// 2. ~/.config/keyscope (if ~/.config exists)
    /// 3. ~/.keyscope (fallback on Unix, doesn't create ~/.config)
    /// 4. Platform default on Windows
    pub fn default_config_dir() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg_config.is_empty() {
                return Ok(PathBuf::from(xdg_config).join("keyscope"));
            }
        }

        #[cfg(unix)]
        {
            if let Some(home_dir) = dirs::home_dir() {
                let xdg_config = home_dir.join(".config");

                if xdg_config.exists() {
                    return Ok(xdg_config.join("keyscope"));
                }

                return Ok(home_dir.join(".keyscope"));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                return Ok(config_dir.join("keyscope"));
            }
        }

        Err(CliError::ConfigError(
            "Could not determine config directory".to_string(),
        ))
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}

/// Everything a command needs to read and change local state.
///
/// Built at command start and persisted explicitly at the end; nothing here is
/// global.
#[derive(Debug)]
pub struct ConfigContext {
    settings: Settings,
    store: ScopeStore,
    path: PathBuf,
    dirty: bool,
}

impl ConfigContext {
    pub fn load(settings: Settings) -> Result<Self> {
        let path = settings.config_file_path();
        let store = ScopeStore::load(&path)?;
        Ok(Self {
            settings,
            store,
            path,
            dirty: false,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    /// Mutable access to the store; marks the context for saving
    pub fn store_mut(&mut self) -> &mut ScopeStore {
        self.dirty = true;
        &mut self.store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the store back if anything changed
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&self.path)?;
        self.dirty = false;
        Ok(())
    }
}
