use crate::cli::{Cli, Shell};
use clap::CommandFactory;
use clap_complete::{generate, Shell as ClapShell};
use std::io;

const BIN_NAME: &str = "keyscope";

impl Shell {
    fn generator(&self) -> ClapShell {
        match self {
            Shell::Bash => ClapShell::Bash,
            Shell::Zsh => ClapShell::Zsh,
            Shell::Fish => ClapShell::Fish,
            Shell::PowerShell => ClapShell::PowerShell,
            Shell::Elvish => ClapShell::Elvish,
        }
    }

    fn install_hint(&self) -> &'static [&'static str] {
        match self {
            Shell::Bash => &[
                "Add to ~/.bashrc:",
                "  eval \"$(keyscope completions bash)\"",
            ],
            Shell::Zsh => &[
                "Add to ~/.zshrc:",
                "  eval \"$(keyscope completions zsh)\"",
            ],
            Shell::Fish => &[
                "Save to the fish completion directory:",
                "  keyscope completions fish > ~/.config/fish/completions/keyscope.fish",
            ],
            Shell::PowerShell => &[
                "Add to your PowerShell profile:",
                "  keyscope completions powershell | Out-String | Invoke-Expression",
            ],
            Shell::Elvish => &[
                "Add to your Elvish config:",
                "  eval (keyscope completions elvish | slurp)",
            ],
        }
    }
}

/// Completion script goes to stdout, instructions to stderr so the output can be eval'd
pub fn execute(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell.generator(), &mut cmd, BIN_NAME, &mut io::stdout());

    eprintln!();
    for line in shell.install_hint() {
        eprintln!("# {}", line);
    }
}
