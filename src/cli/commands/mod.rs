pub mod completions;
pub mod configure;
pub mod login;
pub mod logout;
pub mod roll;

use crate::api::HttpAuthApi;
use crate::auth::{SystemClock, TokenLifecycle};
use crate::cli::Runtime;

/// Lifecycle wired to the real HTTP client and wall clock
fn with_lifecycle<T>(runtime: &Runtime, run: impl FnOnce(&TokenLifecycle<'_>) -> T) -> T {
    let api = HttpAuthApi::new();
    let clock = SystemClock;
    let lifecycle = TokenLifecycle::new(&api, &clock, runtime.env);
    run(&lifecycle)
}
