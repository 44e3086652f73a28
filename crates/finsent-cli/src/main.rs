use std::io::BufRead;

use anyhow::Context;
use clap::{Parser, Subcommand};
use finsent_sentiment::{classify, init_provider, ProviderState, SentimentScorer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "finsent-cli")]
#[command(about = "Financial-text sentiment scoring from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score texts with the configured provider and print one JSON object per text
    Score {
        /// Texts to score
        texts: Vec<String>,

        /// Read texts from stdin, one per line
        #[arg(long)]
        stdin: bool,
    },
    /// Print the label for a raw score
    Classify {
        #[arg(allow_negative_numbers = true)]
        score: f64,
    },
    /// Initialize the configured provider and report whether it is usable
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { score } => println!("{}", classify(score)),
        Commands::Score { texts, stdin } => {
            let texts = if stdin { read_stdin_lines()? } else { texts };
            if texts.is_empty() {
                anyhow::bail!("nothing to score: pass texts as arguments or use --stdin");
            }
            let state = init_from_env().await?;
            run_score(&SentimentScorer::new(state), &texts).await?;
        }
        Commands::Health => {
            let state = init_from_env().await?;
            run_health(&state)?;
        }
    }

    Ok(())
}

/// Load configuration, install logging on stderr and build the provider.
async fn init_from_env() -> anyhow::Result<ProviderState> {
    let config = finsent_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let provider_config = config.provider_config().clone();
    Ok(tokio::task::spawn_blocking(move || init_provider(&provider_config)).await?)
}

async fn run_score(scorer: &SentimentScorer, texts: &[String]) -> anyhow::Result<()> {
    tracing::debug!(count = texts.len(), provider = %scorer.provider_state().kind(), "scoring texts");
    for text in texts {
        let result = scorer.analyze(text).await;
        let line = serde_json::json!({
            "text": text,
            "score": result.score,
            "label": result.label,
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn run_health(state: &ProviderState) -> anyhow::Result<()> {
    match state {
        ProviderState::Ready(_) => {
            println!("{} provider ready", state.kind());
            Ok(())
        }
        ProviderState::Unavailable { kind, reason } => {
            anyhow::bail!("{kind} provider unavailable: {reason}")
        }
    }
}

fn read_stdin_lines() -> anyhow::Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut texts = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        if !line.trim().is_empty() {
            texts.push(line);
        }
    }
    Ok(texts)
}

#[cfg(test)]
mod tests;
