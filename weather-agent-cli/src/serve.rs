use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinSet,
};
use tracing::{error, info};
use weather_agent_core::AgentSession;

/// Read one JSON request per line from `input`, answer each on `output`.
///
/// Requests run concurrently; a single writer owns `output` so reply lines
/// never interleave. Returns the writer once input ends (or Ctrl-C) and every
/// in-flight request has been answered.
pub async fn serve<R, W>(session: Arc<AgentSession>, input: R, mut output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(output)
    });

    let mut lines = input.lines();
    let mut tasks = JoinSet::new();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    info!(agent = session.name(), "listening for requests on stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read request line")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let session = Arc::clone(&session);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let reply = session.dispatch_payload(&line).await;
                    match serde_json::to_string(&reply) {
                        Ok(json) => {
                            // The writer only stops once every sender is gone.
                            let _ = tx.send(json);
                        }
                        Err(e) => {
                            error!(request_id = ?reply.request_id, "failed to encode reply: {e}");
                        }
                    }
                });
            }
            _ = &mut interrupt => {
                info!("interrupt received; finishing in-flight requests");
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("request task failed: {e}");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("request task failed: {e}");
        }
    }
    drop(tx);

    let output = writer
        .await
        .context("Reply writer task failed")?
        .context("Failed to write reply")?;

    Ok(output)
}
