// Side-effect capabilities used during login
mod system;

pub use system::{DialoguerPrompter, SystemBrowser, SystemClipboard};

use crate::error::Result;

/// Questions asked of the user
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Returns the index of the chosen item
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize>;
}

pub trait Clipboard {
    fn copy(&self, text: &str) -> Result<()>;
}

pub trait Browser {
    fn open(&self, url: &str) -> Result<()>;
}

/// The capabilities a login needs, bundled so callers can swap them out
pub struct Desktop<'a> {
    pub prompter: &'a dyn Prompter,
    pub clipboard: &'a dyn Clipboard,
    pub browser: &'a dyn Browser,
}
