use anyhow::Result;
use clap::Parser;

use termrelay::app::{
    run_chat_mode, run_connect, run_list, run_mappings, run_once, run_send, run_to_completion,
};
use termrelay::cli::join_text;
use termrelay::{setup_from_cli, Cli, Commands};

fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    run_to_completion(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = setup_from_cli(&cli)?;

    match &cli.command {
        Commands::List => run_list(&ctx).await,
        Commands::Connect { target, channel } => run_connect(&ctx, target, channel).await,
        Commands::Send { thread_key, text } => run_send(&ctx, thread_key, &join_text(text)).await,
        Commands::Run { session, text, channel } => {
            run_once(&ctx, session, &join_text(text), channel).await
        }
        Commands::Chat { target, channel } => run_chat_mode(&ctx, target, channel).await,
        Commands::Mappings { command } => run_mappings(&ctx, command),
    }
}
