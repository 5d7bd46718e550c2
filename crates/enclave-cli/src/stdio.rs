//! Line-delimited JSON front end over a pair of byte streams.
//!
//! Each input line is one `OperationRequest`; each output line is one
//! `OperationResponse`. Requests run concurrently, so responses may arrive
//! out of order and a `cancel` can reach a request that is still running.

use std::io;
use std::sync::Arc;

use enclave_core::{EngineError, OperationRequest, OperationResponse, OperationService, RequestId};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Responses buffered before request tasks wait on the writer.
const RESPONSE_CAPACITY: usize = 64;

/// Serve requests from `input` until it closes, then wait for in-flight work.
///
/// # Errors
///
/// Returns an error if reading `input` or writing `output` fails.
pub(crate) async fn serve<R, W>(
    service: Arc<dyn OperationService>,
    input: R,
    output: W,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<OperationResponse>(RESPONSE_CAPACITY);
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_string(&response)?;
            line.push('\n');
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<(), io::Error>(())
    });

    info!("Serving requests on stdio");
    let mut lines = BufReader::new(input).lines();
    let mut requests = JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        while requests.try_join_next().is_some() {}

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<OperationRequest>(line) {
            Ok(request) => {
                debug!(id = %request.id, op = request.operation.name(), "Request received");
                let service = Arc::clone(&service);
                let tx = tx.clone();
                requests.spawn(async move {
                    let response = service.handle(request).await;
                    let _ = tx.send(response).await;
                });
            },
            Err(e) => {
                warn!(error = %e, "Malformed request line");
                let response = OperationResponse::failed(
                    salvage_id(line),
                    &EngineError::invalid(format!("malformed request: {e}")),
                );
                let _ = tx.send(response).await;
            },
        }
    }

    while requests.join_next().await.is_some() {}
    drop(tx);
    writer.await.map_err(io::Error::other)??;
    info!("Input closed, front end stopped");
    Ok(())
}

/// Best-effort id from a line that failed to parse as a request.
fn salvage_id(line: &str) -> RequestId {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|value| value.get("id")?.as_str().map(RequestId::from))
        .unwrap_or_else(|| RequestId::from(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::ErrorKind;
    use enclave_test::ScriptedService;
    use tokio::io::{AsyncReadExt, duplex};

    async fn run(service: ScriptedService, input: &str) -> Vec<OperationResponse> {
        let (mut client, server_in) = duplex(65_536);
        let (server_out, mut reader) = duplex(65_536);
        client.write_all(input.as_bytes()).await.unwrap();
        drop(client);

        serve(Arc::new(service), server_in, server_out).await.unwrap();

        let mut text = String::new();
        reader.read_to_string(&mut text).await.unwrap();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request() {
        let input = concat!(
            r#"{"id":"1","op":"ping"}"#,
            "\n\n",
            r#"{"id":"2","op":"describe"}"#,
            "\n",
        );
        let mut responses = run(ScriptedService::new(), input).await;
        responses.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].output(), Some("ping"));
        assert_eq!(responses[1].output(), Some("describe"));
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_serving() {
        let input = concat!(
            r#"{"id":"bad","op":"no_such_op"}"#,
            "\n",
            "not json\n",
            r#"{"id":"ok","op":"ping"}"#,
            "\n",
        );
        let responses = run(ScriptedService::new(), input).await;
        assert_eq!(responses.len(), 3);

        let bad = responses.iter().find(|r| r.id.as_str() == "bad").unwrap();
        assert_eq!(bad.error().unwrap().kind, ErrorKind::InvalidRequest);
        let anonymous = responses.iter().find(|r| r.id.as_str().is_empty()).unwrap();
        assert_eq!(anonymous.error().unwrap().kind, ErrorKind::InvalidRequest);
        assert!(responses.iter().any(|r| r.output() == Some("ping")));
    }
}
