use crate::infrastructure::error::InfraError;
use crate::mcp::line_gate::{LineGate, Screened};
use crate::mcp::server::CalendarColorServer;
use rmcp::ServiceExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;

const PIPE_CAPACITY: usize = 64 * 1024;

pub async fn serve_stdio(server: CalendarColorServer) -> Result<(), InfraError> {
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Runs `server` over newline-delimited JSON-RPC on `reader`/`writer`.
///
/// Input passes through a [`LineGate`] before it reaches the MCP service.
/// Lines the gate answers itself share `writer` with the service's output,
/// one whole line at a time. Ends when `reader` is exhausted.
pub async fn serve_lines<R, W>(
    server: CalendarColorServer,
    reader: R,
    writer: W,
) -> Result<(), InfraError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (client_side, service_side) = tokio::io::duplex(PIPE_CAPACITY);
    let (from_service, to_service) = tokio::io::split(client_side);
    let writer = Mutex::new(writer);

    let service = async move {
        let running = server
            .serve(tokio::io::split(service_side))
            .await
            .map_err(|error| InfraError::Mcp(format!("session did not start: {error}")))?;
        let reason = running
            .waiting()
            .await
            .map_err(|error| InfraError::Mcp(format!("session task failed: {error}")))?;
        info!(?reason, "mcp session ended");
        Ok::<(), InfraError>(())
    };

    tokio::try_join!(
        forward_requests(reader, to_service, &writer),
        forward_responses(from_service, &writer),
        service,
    )?;
    Ok(())
}

async fn forward_requests<R, S, W>(
    reader: R,
    mut to_service: S,
    writer: &Mutex<W>,
) -> Result<(), InfraError>
where
    R: AsyncRead + Unpin,
    S: AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut gate = LineGate::default();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        match gate.screen(&line) {
            Screened::Forward(message) => {
                to_service.write_all(message.as_bytes()).await?;
                to_service.write_all(b"\n").await?;
                to_service.flush().await?;
            }
            Screened::Reply(reply) => write_line(writer, &reply.to_string()).await?,
            Screened::Drop => {}
        }
    }
    info!("input closed; shutting down");
    to_service.shutdown().await?;
    Ok(())
}

async fn forward_responses<S, W>(from_service: S, writer: &Mutex<W>) -> Result<(), InfraError>
where
    S: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(from_service).lines();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            write_line(writer, &line).await?;
        }
    }
    Ok(())
}

async fn write_line<W>(writer: &Mutex<W>, line: &str) -> Result<(), InfraError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
