// HygieiAI console harness
// Reads one utterance per line from stdin and prints the reply.

use anyhow::Context;
use hygieia_core::{PipelineConfig, SupervisorHandle, Utterance};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = PipelineConfig::from_env().context("Failed to load configuration")?;
    hygieia_core::telemetry::init(env!("CARGO_PKG_NAME"), config.log_format)
        .context("Failed to initialise logging")?;
    info!(?config, "Configuration loaded");

    let supervisor = SupervisorHandle::from_config(&config).context("Failed to start the pipeline")?;
    let conversation_id = Uuid::new_v4().to_string();
    info!(%conversation_id, "Session started, type a message (Ctrl-D to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let utterance = Utterance::new(line).in_conversation(conversation_id.clone());
        match supervisor.process_utterance(utterance).await {
            Ok(output) => {
                stdout.write_all(format!("{}\n", output.reply).as_bytes()).await?;
                if !output.memory_note.is_empty() {
                    stdout
                        .write_all(format!("  (memory: {})\n", output.memory_note).as_bytes())
                        .await?;
                }
                stdout.flush().await?;
            }
            Err(e) => error!("Failed to process utterance: {}", e),
        }
    }

    supervisor.shutdown().await.ok();
    info!("Session ended");
    Ok(())
}
