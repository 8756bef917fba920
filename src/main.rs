// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{parse_chat_input, ChatInput, Cli, Commands, DEFAULT_USER};
use tessera_config::Config;
use tessera_contexts::register_builtin_contexts;
use tessera_core::{
    persistence, AgentDirectory, AgentManager, ContextRegistry, CreateAgentTool, SharedAgent,
    DEFAULT_CONTEXTS,
};
use tessera_model::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Completions { shell }) => {
            cli::print_completions(shell);
            Ok(())
        }
        Some(Commands::ShowConfig) => {
            let config = tessera_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Some(Commands::Contexts) => {
            let config = tessera_config::load(cli.config.as_deref())?;
            list_contexts(&config);
            Ok(())
        }
        Some(Commands::Inspect { path }) => inspect(&path).await,
        Some(Commands::Chat { user }) => {
            let config = tessera_config::load(cli.config.as_deref())?;
            chat(&config, &user).await
        }
        None => {
            let config = tessera_config::load(cli.config.as_deref())?;
            chat(&config, DEFAULT_USER).await
        }
    }
}

fn builtin_registry(config: &Config) -> ContextRegistry {
    let mut registry = ContextRegistry::new();
    register_builtin_contexts(&mut registry, config);
    registry
}

fn list_contexts(config: &Config) {
    for kind in builtin_registry(config).kinds() {
        let marker = if DEFAULT_CONTEXTS.contains(&kind) { "*" } else { " " };
        println!("{marker} {kind}");
    }
    println!("\n* given to new agents");
}

/// Print a summary of a saved agent without rebuilding it.
async fn inspect(path: &Path) -> anyhow::Result<()> {
    let state = persistence::read_state(path).await?;
    let usage = &state.token_usage;

    println!("Agent:     {} ({})", state.identity.name, state.identity.id);
    println!("User:      {}", state.identity.user_id);
    println!("Model:     {}", state.model);
    println!(
        "Tokens:    {} prompt + {} completion = {} of {}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens, state.token_budget
    );
    println!("Messages:  {}", state.message_log.len());
    if state.contexts.is_empty() {
        println!("Contexts:  (none)");
        return Ok(());
    }
    println!("Contexts:");
    for context in &state.contexts {
        println!("  {:<14} {}", context.kind, context.id);
    }
    Ok(())
}

async fn chat(config: &Config, user: &str) -> anyhow::Result<()> {
    let client = tessera_model::client_from_config(&config.model)?;
    let directory = AgentDirectory::new();
    let manager = Arc::new(AgentManager::new(
        config,
        builtin_registry(config),
        directory.clone(),
        client.clone(),
    ));
    if config.manager.autosave_interval_secs > 0 {
        manager.spawn_autosave(Duration::from_secs(config.manager.autosave_interval_secs));
    }

    let handle = manager.get_or_create_agent(user).await?;
    {
        let mut agent = handle.lock().await;
        if agent.tool("create_agent").is_none() {
            agent.register_tool(Arc::new(CreateAgentTool::new(directory, client)?));
        }
        info!(user, agent_id = %agent.id(), "chat session started");
        eprintln!("Chatting as {} ({}). Type /quit to leave.", agent.name(), agent.id());
    }

    let result = repl(&handle).await;
    manager.shutdown().await;
    result
}

async fn repl(handle: &SharedAgent) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_chat_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Usage => {
                let agent = handle.lock().await;
                let usage = agent.get_token_usage();
                println!(
                    "prompt_tokens: {}, completion_tokens: {}, total_tokens: {} (budget {})",
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens,
                    agent.token_budget()
                );
            }
            ChatInput::Tools => {
                let names = handle.lock().await.tool_names();
                println!("{}", names.join(", "));
            }
            ChatInput::Clear => {
                handle.lock().await.clear_message_log();
                println!("Message log cleared.");
            }
            ChatInput::Unknown(cmd) => {
                eprintln!("Unknown command {cmd}; try /usage, /tools, /clear or /quit");
            }
            ChatInput::Message(text) => {
                let produced = handle.lock().await.run_loop(text).await;
                for message in produced.iter().filter(|m| m.role == Role::Assistant) {
                    if let Some(reply) = message.as_text().filter(|t| !t.trim().is_empty()) {
                        println!("{reply}\n");
                    }
                }
            }
        }
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
