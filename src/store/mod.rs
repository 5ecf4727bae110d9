// Scope-keyed token store
mod persist;
mod scope;

pub use scope::Scope;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::api::Endpoint;
use crate::error::{CliError, Result};

fn default_verify_tls() -> bool {
    true
}

fn is_default_verify_tls(value: &bool) -> bool {
    *value
}

/// A token and the API metadata it was issued for
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub api_host: String,
    pub dashboard_host: String,
    #[serde(
        default = "default_verify_tls",
        skip_serializing_if = "is_default_verify_tls"
    )]
    pub verify_tls: bool,
}

impl TokenRecord {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.api_host.clone(), self.verify_tls)
    }

    /// Short stable identifier for the token that is safe to print or log
    pub fn fingerprint(&self) -> String {
        token_fingerprint(&self.token)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token", &self.fingerprint())
            .field("api_host", &self.api_host)
            .field("dashboard_host", &self.dashboard_host)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("sha256:{}", &digest[..12])
}

/// Project/config binding that depends on a scope's login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl EnclaveConfig {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.config.is_none()
    }
}

/// Tokens keyed by exact scope.
///
/// Maps are ordered so the file is written in the same order every time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeStore {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    scoped: BTreeMap<Scope, TokenRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    enclave: BTreeMap<Scope, EnclaveConfig>,
}

impl ScopeStore {
    /// Load the store, treating a missing file as empty.
    ///
    /// A file that does not parse is an error rather than an empty store so a
    /// damaged file is never silently overwritten.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        tracing::debug!("Loading config from: {}", path.display());
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| CliError::StoreCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        persist::write_private_file_atomic(path, contents.as_bytes())?;
        tracing::debug!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Exact-match lookup. A token for `/a` does not answer for `/a/b`.
    pub fn get(&self, scope: &Scope) -> Option<&TokenRecord> {
        self.scoped.get(scope)
    }

    pub fn set(&mut self, scope: Scope, record: TokenRecord) {
        self.scoped.insert(scope, record);
    }

    /// Remove the entry for `scope`, returning it if there was one
    pub fn delete(&mut self, scope: &Scope) -> Option<TokenRecord> {
        self.scoped.remove(scope)
    }

    pub fn all(&self) -> impl Iterator<Item = (&Scope, &TokenRecord)> {
        self.scoped.iter()
    }

    /// Every scope whose record holds exactly `token`
    pub fn scopes_with_token(&self, token: &str) -> Vec<Scope> {
        self.scoped
            .iter()
            .filter(|(_, record)| record.token == token)
            .map(|(scope, _)| scope.clone())
            .collect()
    }

    /// Replace `old` with `new` in every record holding `old`. Returns the
    /// scopes that were updated.
    pub fn replace_token(&mut self, old: &str, new: &str) -> Vec<Scope> {
        let mut updated = Vec::new();
        for (scope, record) in self.scoped.iter_mut() {
            if record.token == old {
                record.token = new.to_string();
                updated.push(scope.clone());
            }
        }
        updated
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.scoped.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty()
    }

    pub fn enclave(&self, scope: &Scope) -> Option<&EnclaveConfig> {
        self.enclave.get(scope)
    }

    pub fn set_enclave(&mut self, scope: Scope, config: EnclaveConfig) {
        if config.is_empty() {
            self.enclave.remove(&scope);
        } else {
            self.enclave.insert(scope, config);
        }
    }

    pub fn clear_enclave(&mut self, scope: &Scope) -> Option<EnclaveConfig> {
        self.enclave.remove(scope)
    }
}
