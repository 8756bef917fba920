// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

/// User id chatted as when none is given.
pub const DEFAULT_USER: &str = "local";

#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    about = "An agent orchestrator with pluggable contexts",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the agent of one user (the default command).
    ///
    /// Lines starting with `/` are commands: /usage, /tools, /clear, /quit.
    Chat {
        /// User whose agent is loaded or created
        #[arg(long, short = 'u', default_value = DEFAULT_USER)]
        user: String,
    },
    /// Summarise a saved agent state file
    Inspect {
        /// Path to an `agent_<user>.json` file
        path: PathBuf,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// List the context types new agents can be given
    Contexts,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tessera", &mut std::io::stdout());
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Usage,
    Tools,
    Clear,
    Quit,
    Unknown(&'a str),
    Message(&'a str),
    Empty,
}

pub fn parse_chat_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    match line {
        "" => ChatInput::Empty,
        "/usage" => ChatInput::Usage,
        "/tools" => ChatInput::Tools,
        "/clear" => ChatInput::Clear,
        "/quit" | "/exit" => ChatInput::Quit,
        cmd if cmd.starts_with('/') => ChatInput::Unknown(cmd),
        text => ChatInput::Message(text),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
