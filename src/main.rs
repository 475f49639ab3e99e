use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use journalist::{merge, types::ChannelAuthor, GenerationEngine, JournalistConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "journalist", about = "Curated Atom feeds from heterogeneous sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the configured channels and the OPML registry.
    Generate {
        /// Path to the JSON configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Generate only the named channel.
        #[arg(long)]
        channel: Option<String>,
    },
    /// Combine several generated Atom files into one consolidated feed.
    Merge {
        /// Input Atom files, in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output path for the merged feed.
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "Merged feed")]
        title: String,
        /// Atom feed id of the merged document.
        #[arg(long, default_value = "urn:journalist:merged")]
        feed_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Generate { config, channel } => run_generate(config, channel).await,
        Command::Merge {
            inputs,
            output,
            title,
            feed_id,
        } => run_merge(inputs, output, title, feed_id),
    }
}

async fn run_generate(config_path: PathBuf, channel: Option<String>) -> anyhow::Result<()> {
    let config = Arc::new(
        JournalistConfig::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?,
    );

    if let Some(name) = &channel {
        if config.channel(name).is_none() {
            bail!("unknown channel '{}'", name);
        }
    }

    let engine = Arc::new(GenerationEngine::new(&config)?);
    let results = engine.run_all(&config, channel.as_deref()).await;

    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(count) => info!("channel {}: {} entries", name, count),
            Err(e) => {
                failed += 1;
                error!("channel {}: {}", name, e);
            }
        }
    }

    // The registry covers all known channels and has no state of its own;
    // regenerate it even when some channels failed.
    engine.write_registry(&config)?;

    if failed > 0 {
        bail!("{} of {} channels failed", failed, results.len());
    }
    Ok(())
}

fn run_merge(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    title: String,
    feed_id: String,
) -> anyhow::Result<()> {
    let meta = merge::MergeOutput {
        title,
        feed_id,
        author: ChannelAuthor {
            name: "journalist".to_string(),
            email: String::new(),
            uri: String::new(),
        },
    };

    let count = merge::merge_files(&inputs, &output, &meta)?;
    info!("wrote {} merged entries to {}", count, output.display());
    Ok(())
}
