// Environment detection utilities
use std::io::IsTerminal;

/// What the current process is allowed to do with the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// Prompts can be shown and answered
    pub interactive: bool,
    /// No browser can be launched on this machine
    pub headless: bool,
}

impl Environment {
    pub fn detect(force_headless: bool) -> Self {
        let interactive = is_interactive();
        let headless = force_headless || is_headless_environment();
        tracing::debug!("Environment: interactive={}, headless={}", interactive, headless);
        Self {
            interactive,
            headless,
        }
    }
}

/// Prompts need a terminal on both ends and no CI runner
fn is_interactive() -> bool {
    if std::env::var("CI").is_ok() {
        return false;
    }
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Check if we're running in a headless environment
///
/// Headless mode is detected when:
/// - SSH_TTY or SSH_CONNECTION environment variables are set (SSH session)
/// - TERM is set to "dumb" or is empty
/// - On Linux: DISPLAY and WAYLAND_DISPLAY are not set
/// - CI environment is detected
fn is_headless_environment() -> bool {
    if std::env::var("SSH_TTY").is_ok() {
        tracing::debug!("Headless detected: SSH_TTY set");
        return true;
    }

    if std::env::var("SSH_CONNECTION").is_ok() {
        tracing::debug!("Headless detected: SSH_CONNECTION set");
        return true;
    }

    if std::env::var("CI").is_ok() {
        tracing::debug!("Headless detected: CI environment");
        return true;
    }

    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" || term.is_empty() {
            tracing::debug!("Headless detected: TERM is '{}'", term);
            return true;
        }
    }

    // macOS and Windows don't use DISPLAY
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if std::env::var("DISPLAY").is_err() && std::env::var("WAYLAND_DISPLAY").is_err() {
            tracing::debug!("Headless detected: no DISPLAY or WAYLAND_DISPLAY");
            return true;
        }
    }

    false
}
