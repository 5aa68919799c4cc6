//! Line-framed pipe transport
//!
//! Newline-delimited JSON-RPC on stdin/stdout: one request per line, one
//! response per line, strictly in request order. Unparseable lines are
//! answered with a parse-error envelope instead of killing the loop. The
//! pump is generic over the reader/writer pair so tests can drive it over
//! an in-memory duplex pipe.

use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use super::super::dispatcher::Dispatcher;
use super::super::protocol::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::super::session::SessionManager;
use crate::error::AppResult;

/// Serve JSON-RPC over stdin/stdout until EOF
pub async fn serve(dispatcher: Arc<Dispatcher>, sessions: Arc<SessionManager>) -> AppResult<()> {
    let stdin = BufReader::new(io::stdin());
    let stdout = io::stdout();
    run_pipe(dispatcher, sessions, stdin, stdout).await
}

/// Pump requests from `reader` to `writer` until EOF
///
/// A pipe session tracks the connection for lifecycle bookkeeping; it is
/// activated after a successful `initialize` and closed when the reader
/// reaches EOF.
pub async fn run_pipe<R, W>(
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionManager>,
    reader: R,
    mut writer: W,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = sessions.open_pipe();
    info!("Pipe transport serving session {}", session_id);

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        sessions.touch(&session_id);

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => {
                if let Err(err) = request.validate() {
                    warn!("Rejecting malformed envelope: {}", err);
                    Some(JsonRpcResponse::error(
                        request.id.clone(),
                        JsonRpcError::invalid_request(err.to_string()),
                    ))
                } else {
                    let is_initialize = request.method == methods::INITIALIZE;
                    let response = dispatcher.dispatch(request).await;
                    if is_initialize && matches!(&response, Some(r) if r.is_success()) {
                        sessions.activate(&session_id);
                    }
                    response
                }
            }
            Err(err) => {
                warn!("Unparseable request line: {}", err);
                Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(err.to_string()),
                ))
            }
        };

        if let Some(response) = response {
            let payload = serde_json::to_string(&response)?;
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    sessions.close(&session_id);
    info!("Pipe transport closed session {}", session_id);
    Ok(())
}
