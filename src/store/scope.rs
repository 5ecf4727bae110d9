use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// A canonical absolute directory path a token is bound to.
///
/// Built only through [`Scope::canonicalize`] (or [`Scope::root`]), so two
/// scopes compare equal exactly when they name the same directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// The global scope
    pub fn root() -> Self {
        Scope(std::path::MAIN_SEPARATOR.to_string())
    }

    /// Canonicalize a user-supplied scope.
    ///
    /// Relative paths are joined to `cwd` and a leading `~` is expanded. The
    /// longest prefix that exists on disk is resolved physically (symlinks
    /// included); the remainder is normalized lexically.
    pub fn canonicalize(raw: &str, cwd: &Path) -> Result<Self> {
        let expanded = expand_home(raw)?;
        let joined = if expanded.is_absolute() {
            expanded
        } else {
            cwd.join(expanded)
        };

        let mut resolved = PathBuf::new();
        // trailing components of `resolved` that do not exist on disk
        let mut lexical = 0usize;

        for component in joined.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if resolved.pop() && lexical > 0 {
                        lexical -= 1;
                    }
                }
                Component::Normal(name) => {
                    resolved.push(name);
                    if lexical > 0 {
                        lexical += 1;
                        continue;
                    }
                    match fs::canonicalize(&resolved) {
                        Ok(real) => resolved = real,
                        Err(_) => lexical = 1,
                    }
                }
            }
        }

        if resolved.as_os_str().is_empty() {
            return Err(CliError::ConfigError(format!(
                "Unable to resolve scope '{}'",
                raw
            )));
        }

        Ok(Scope(resolved.to_string_lossy().into_owned()))
    }

    /// Scope for the process working directory
    pub fn current_dir() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::canonicalize(&cwd.to_string_lossy(), &cwd)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        *self == Self::root()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return Ok(PathBuf::from(raw)),
    };

    let home = dirs::home_dir().ok_or_else(|| {
        CliError::ConfigError("Could not determine home directory".to_string())
    })?;
    Ok(home.join(rest.trim_start_matches(['/', '\\'])))
}
