use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use spacebot::{
    config::Config,
    console::{parse_line, print_replies},
    llm::{GenerationClient, HttpGenerationClient},
    logging::init_logging,
    state::Bot,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);

    tracing::info!("Starting spacebot console");
    tracing::info!(
        endpoint = %config.upstream.endpoint(),
        format = ?config.upstream.format,
        "Upstream configured"
    );

    let client: Arc<dyn GenerationClient> = Arc::new(
        HttpGenerationClient::new(config.upstream.clone())
            .context("Failed to create generation client")?,
    );

    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&config, client, replies_tx).context("Failed to create bot")?;

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        if let Err(e) = print_replies(replies_rx, &mut stdout).await {
            tracing::warn!(error = %e, "stdout closed, dropping replies");
        }
    });

    let mut handlers = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_line(&line) {
            Ok(incoming) => {
                let bot = bot.clone();
                handlers.spawn(async move { bot.handle(incoming).await });
            }
            Err(e) => tracing::warn!(error = %e, line = %line, "Ignoring input line"),
        }
    }

    tracing::info!(in_flight = handlers.len(), "stdin closed, finishing pending replies");
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "message handler failed");
        }
    }

    // Debounced messages hold their own reply sender, so the printer runs
    // until the last of them has fired
    drop(bot);
    printer.await.context("Reply printer failed")?;

    tracing::info!("shutting down");
    Ok(())
}
