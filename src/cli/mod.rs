// CLI interface
pub mod commands;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{ConfigContext, Settings};
use crate::desktop::Prompter;
use crate::env::Environment;
use crate::error::{CliError, Result};
use crate::store::Scope;

#[derive(Parser, Debug)]
#[command(name = "keyscope")]
#[command(about = "Manage scoped CLI tokens for the Keyscope secrets service", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// API host to authenticate against
    #[arg(long, global = true, env = "KEYSCOPE_API_HOST")]
    pub api_host: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true, env = "KEYSCOPE_NO_VERIFY_TLS")]
    pub no_verify_tls: bool,

    /// Directory holding config.toml
    #[arg(long, global = true, env = "KEYSCOPE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Force headless mode (print the authorization URL instead of opening a browser)
    #[arg(long, global = true)]
    pub headless: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize this machine and store a token for a scope
    #[command(args_conflicts_with_subcommands = true)]
    Login {
        #[command(subcommand)]
        action: Option<LoginAction>,

        #[command(flatten)]
        args: LoginArgs,
    },

    /// Revoke the scope's token (alias of `login revoke`)
    Logout(RevokeArgs),

    /// Show stored scopes or bind enclave settings to a scope
    Configure {
        #[command(subcommand)]
        action: Option<ConfigureAction>,

        /// Output in JSON format for scripting
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    ///
    /// INSTALLATION:
    ///
    /// Bash:
    ///   eval "$(keyscope completions bash)"    # Add to ~/.bashrc
    ///
    /// Zsh:
    ///   eval "$(keyscope completions zsh)"     # Add to ~/.zshrc
    ///
    /// Fish:
    ///   keyscope completions fish > ~/.config/fish/completions/keyscope.fish
    ///
    /// PowerShell:
    ///   keyscope completions powershell | Out-String | Invoke-Expression
    ///
    /// Elvish:
    ///   eval (keyscope completions elvish | slurp)
    Completions {
        /// Shell type to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum LoginAction {
    /// Replace the scope's token with a new one
    Roll(RollArgs),

    /// Revoke the scope's token
    Revoke(RevokeArgs),
}

#[derive(Subcommand, Debug)]
pub enum ConfigureAction {
    /// Bind a project and config to a scope
    Enclave {
        /// Enclave project
        #[arg(long)]
        project: Option<String>,

        /// Enclave config
        #[arg(long)]
        config: Option<String>,

        /// Directory the binding applies to
        #[arg(long, default_value = "/")]
        scope: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Directory the token is valid for
    #[arg(long, default_value = "/")]
    pub scope: String,

    /// Replace an existing token for the scope without asking
    #[arg(long)]
    pub overwrite: bool,

    /// Don't copy the auth code to the clipboard
    #[arg(long)]
    pub no_copy: bool,

    /// Open the authorization page without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RollArgs {
    /// Scope whose token is rolled
    #[arg(long, default_value = "/")]
    pub scope: String,

    /// Print the new token instead of saving it
    #[arg(long)]
    pub no_update_config: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RevokeArgs {
    /// Scope whose token is revoked
    #[arg(long, default_value = "/")]
    pub scope: String,

    /// Keep the token in the local config
    #[arg(long)]
    pub no_update_config: bool,

    /// Keep the enclave settings of affected scopes
    #[arg(long)]
    pub no_update_enclave_config: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Remove local entries even if the server rejects the revocation
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Everything a command needs from the process it runs in
pub struct Runtime {
    pub settings: Settings,
    pub env: Environment,
    pub cwd: Scope,
}

impl Runtime {
    fn from_cli(args: &Cli) -> Result<Self> {
        let settings = Settings::resolve(
            args.api_host.clone(),
            args.no_verify_tls,
            args.config_dir.clone(),
        )?;
        Ok(Self {
            settings,
            env: Environment::detect(args.headless),
            cwd: Scope::current_dir()?,
        })
    }

    pub fn scope(&self, raw: &str) -> Result<Scope> {
        Scope::canonicalize(raw, Path::new(self.cwd.as_str()))
    }

    pub fn context(&self) -> Result<ConfigContext> {
        ConfigContext::load(self.settings.clone())
    }
}

/// Ask before a destructive step; non-interactive runs need `--yes`
pub fn confirm_destructive(
    env: &Environment,
    prompter: &dyn Prompter,
    prompt: &str,
    yes: bool,
) -> Result<()> {
    if yes {
        return Ok(());
    }
    if !env.interactive {
        eprintln!("Re-run with --yes to confirm.");
        return Err(CliError::Aborted);
    }
    if prompter.confirm(prompt, false)? {
        Ok(())
    } else {
        Err(CliError::Aborted)
    }
}

pub fn execute(args: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &args.command {
        commands::completions::execute(shell.clone());
        return Ok(());
    }

    let runtime = Runtime::from_cli(&args)?;
    match args.command {
        Commands::Login { action: None, args } => commands::login::execute(&runtime, args),
        Commands::Login {
            action: Some(LoginAction::Roll(args)),
            ..
        } => commands::roll::execute(&runtime, args),
        Commands::Login {
            action: Some(LoginAction::Revoke(args)),
            ..
        }
        | Commands::Logout(args) => commands::logout::execute(&runtime, args),
        Commands::Configure { action: None, json } => commands::configure::list(&runtime, json),
        Commands::Configure {
            action:
                Some(ConfigureAction::Enclave {
                    project,
                    config,
                    scope,
                }),
            ..
        } => commands::configure::enclave(&runtime, project, config, &scope),
        Commands::Completions { .. } => Ok(()),
    }
}
