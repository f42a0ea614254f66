//! Newline-delimited JSON-RPC over a single bidirectional channel
//!
//! One implicit session; messages are handled one at a time in arrival order.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::mcp::{
    rpc::{json_rpc_error, PARSE_ERROR},
    server::ProtocolServer,
};

/// Serves until the reader reaches EOF.
pub async fn serve_lines<R, W>(
    server: Arc<ProtocolServer>,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(payload) => server.handle_message(payload).await,
            Err(err) => {
                debug!(error = %err, "discarding unparseable stdio message");
                Some(json_rpc_error(None, PARSE_ERROR, "Parse error"))
            }
        };

        if let Some(response) = response {
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }
    }

    info!("stdio channel closed");
    Ok(())
}
