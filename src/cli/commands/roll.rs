use crate::cli::{RollArgs, Runtime};
use crate::error::{CliError, Result};

use super::with_lifecycle;

pub fn execute(runtime: &Runtime, args: RollArgs) -> Result<()> {
    let mut ctx = runtime.context()?;
    let scope = runtime.scope(&args.scope)?;
    let update_config = !args.no_update_config;

    let outcome = match with_lifecycle(runtime, |lifecycle| {
        lifecycle.roll(&mut ctx, &scope, update_config)
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            if let CliError::UnsavedToken { token, .. } = &err {
                println!("{}", token);
            }
            return Err(err);
        }
    };

    if update_config {
        println!("✓ Rolled token");
        for scope in &outcome.updated {
            println!("  Updated scope {}", scope);
        }
    } else {
        // the old token is dead; this is the only copy of the new one
        println!("{}", outcome.token);
    }

    Ok(())
}
