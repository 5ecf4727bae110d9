use crate::auth::RevokeOptions;
use crate::cli::{confirm_destructive, RevokeArgs, Runtime};
use crate::desktop::DialoguerPrompter;
use crate::error::{CliError, Result};

use super::with_lifecycle;

pub fn execute(runtime: &Runtime, args: RevokeArgs) -> Result<()> {
    let mut ctx = runtime.context()?;
    let scope = runtime.scope(&args.scope)?;

    if ctx.store().get(&scope).is_none() {
        return Err(CliError::MissingValue("token"));
    }
    confirm_destructive(
        &runtime.env,
        &DialoguerPrompter,
        &format!("Revoke the token for {}?", scope),
        args.yes,
    )?;

    let options = RevokeOptions {
        update_config: !args.no_update_config,
        update_enclave_config: !args.no_update_enclave_config,
        force: args.force,
    };
    let outcome = with_lifecycle(runtime, |lifecycle| {
        lifecycle.revoke(&mut ctx, &scope, options)
    })?;

    println!("✓ Revoked token for {}", scope);
    for removed in &outcome.removed {
        println!("  Removed scope {}", removed);
    }
    for cleared in &outcome.cleared_enclave {
        println!("  Cleared enclave config for {}", cleared);
    }

    Ok(())
}
