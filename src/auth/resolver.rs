use crate::desktop::Prompter;
use crate::error::Result;
use crate::store::Scope;

/// What a login should do about the scope it was asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Proceed(Scope),
    Abort,
}

#[derive(Debug, Clone, Copy)]
pub struct ScopeRequest<'a> {
    pub requested: &'a Scope,
    pub cwd: &'a Scope,
    /// Scope of the entry already holding a token for `requested`, if any
    pub existing: Option<&'a Scope>,
    pub overwrite: bool,
    pub interactive: bool,
}

/// Decide how a new login interacts with an existing one.
///
/// A token is never replaced without either `--overwrite` or an explicit
/// answer from the user.
pub fn resolve_scope(request: ScopeRequest<'_>, prompter: &dyn Prompter) -> Result<Resolution> {
    let existing = match request.existing {
        Some(existing) if !request.overwrite => existing,
        _ => return Ok(Resolution::Proceed(request.requested.clone())),
    };

    if existing != request.requested {
        return Ok(Resolution::Proceed(request.requested.clone()));
    }

    if !request.interactive {
        eprintln!(
            "Warning: {} has already been authorized from a previous login.",
            request.requested
        );
        eprintln!("Re-run with --overwrite to replace it.");
        tracing::debug!("Scope conflict in non-interactive mode, aborting");
        return Ok(Resolution::Abort);
    }

    if request.requested == request.cwd {
        eprintln!("Warning: This scope has already been authorized from a previous login.");
        return Ok(if prompter.confirm("Overwrite existing login?", false)? {
            Resolution::Proceed(request.requested.clone())
        } else {
            Resolution::Abort
        });
    }

    let (warning, message, overwrite_option) = if request.requested.is_root() {
        (
            "You have already authorized this directory.",
            "You may scope your new login to the current directory, or overwrite the global login.",
            format!("Overwrite global login ({})", request.requested),
        )
    } else {
        (
            "This scope has already been authorized from a previous login.",
            "You may scope your new login to the current directory, or overwrite your existing login.",
            format!("Overwrite existing login ({})", request.requested),
        )
    };

    eprintln!("Warning: {}", warning);
    eprintln!("{}", message);

    let options = vec![
        format!("Scope login to current directory ({})", request.cwd),
        overwrite_option,
    ];
    let choice = prompter.select("Select an option", &options, 0)?;

    Ok(if choice == 0 {
        Resolution::Proceed(request.cwd.clone())
    } else {
        Resolution::Proceed(request.requested.clone())
    })
}
