use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::{mcp::McpServer, shutdown::shutdown_signal};

// Local sessions carry no caller identity.
pub async fn serve<R, W>(server: &McpServer, reader: R, mut writer: W) -> std::io::Result<()>
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

        let Some(response) = server.handle_raw(line.as_bytes(), None).await else {
            continue;
        };

        let mut frame = serde_json::to_vec(&response)?;
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }

    debug!("stdin closed");
    Ok(())
}

pub async fn boot_stdio_server(server: McpServer) -> anyhow::Result<()> {
    info!("Zendesk MCP server running on stdio");

    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tokio::select! {
        result = serve(&server, reader, writer) => result?,
        _ = shutdown_signal() => {}
    }

    info!("stdio transport stopped");
    Ok(())
}
