use crate::auth::LoginRequest;
use crate::cli::{LoginArgs, Runtime};
use crate::desktop::{Desktop, DialoguerPrompter, SystemBrowser, SystemClipboard};
use crate::error::Result;

use super::with_lifecycle;

pub fn execute(runtime: &Runtime, args: LoginArgs) -> Result<()> {
    let mut ctx = runtime.context()?;
    let request = LoginRequest {
        scope: runtime.scope(&args.scope)?,
        cwd: runtime.cwd.clone(),
        overwrite: args.overwrite,
        copy_code: !args.no_copy,
        yes: args.yes,
    };
    let desktop = Desktop {
        prompter: &DialoguerPrompter,
        clipboard: &SystemClipboard,
        browser: &SystemBrowser,
    };

    let outcome = with_lifecycle(runtime, |lifecycle| {
        lifecycle.login(&mut ctx, &request, &desktop)
    })?;

    if outcome.previous_revoked == Some(false) {
        eprintln!(
            "Warning: the previous token for {} could not be revoked",
            outcome.scope
        );
    }
    println!("✓ Welcome, {}", outcome.name);
    println!("  Token saved for scope {}", outcome.scope);

    Ok(())
}
