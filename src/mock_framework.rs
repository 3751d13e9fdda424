//! # Mock Framework
//!
//! Utilities for testing the desk clients without a real script endpoint.
//!
//! Use [`create_mock_transport`] to get a transport and a receiver.
//! Then use [`expect_request`] to inspect each outgoing call and answer it.
//!
//! [`spawn_script_server`] stands in for the endpoint at the HTTP level, for
//! tests that go through the real transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use crate::clients::transport::{ScriptRequest, ScriptTransport, TransportReply};
use crate::error::RemoteError;

pub type TransportResponder = oneshot::Sender<Result<TransportReply, RemoteError>>;

/// One request seen by the mock transport, with the channel to answer it.
#[derive(Debug)]
pub struct TransportCall {
    pub request: ScriptRequest,
    pub respond_to: TransportResponder,
}

/// Transport whose requests arrive on a channel the test controls.
pub struct MockTransport {
    sender: mpsc::Sender<TransportCall>,
    upload_readable: bool,
}

#[async_trait]
impl ScriptTransport for MockTransport {
    fn reads_upload_reply(&self) -> bool {
        self.upload_readable
    }

    async fn post(&self, request: ScriptRequest) -> Result<TransportReply, RemoteError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(TransportCall { request, respond_to })
            .await
            .map_err(|_| RemoteError::Network("Mock receiver closed".to_string()))?;
        response
            .await
            .map_err(|_| RemoteError::Network("Mock responder dropped".to_string()))?
    }
}

/// Creates a mock transport and a receiver for asserting requests.
///
/// Instead of a real endpoint, each call lands on `receiver`. The test decides
/// the outcome (success, rejection, network failure, opaque reply) by what it
/// sends back, which keeps the client flows deterministic.
pub fn create_mock_transport(buffer_size: usize, upload_readable: bool) -> (MockTransport, mpsc::Receiver<TransportCall>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (MockTransport { sender, upload_readable }, receiver)
}

/// Helper to take the next outgoing request
pub async fn expect_request(
    receiver: &mut mpsc::Receiver<TransportCall>,
) -> Option<(ScriptRequest, TransportResponder)> {
    receiver
        .recv()
        .await
        .map(|call| (call.request, call.respond_to))
}

/// Helper to verify that nothing was sent
pub fn expect_no_request(receiver: &mut mpsc::Receiver<TransportCall>) -> bool {
    matches!(receiver.try_recv(), Err(mpsc::error::TryRecvError::Empty))
}

/// Starts a local HTTP endpoint that answers every POST with `handler(body)`.
///
/// Each reply closes its connection. Returns the URL to post to.
pub async fn spawn_script_server<F>(handler: F) -> String
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind script server");
    let addr = listener.local_addr().expect("script server address");
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let Some(body) = read_request_body(&mut socket).await else {
                    return;
                };
                let request = serde_json::from_slice(&body).unwrap_or(Value::Null);
                let reply = handler(request).to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.len(),
                    reply
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/exec", addr)
}

async fn read_request_body(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let (body_start, body_len) = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            break (end + 4, len);
        }
    };
    while buf.len() < body_start + body_len {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(buf[body_start..body_start + body_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport() {
        let (transport, mut receiver) = create_mock_transport(10, true);
        assert!(transport.reads_upload_reply());
        assert!(expect_no_request(&mut receiver));

        let call = tokio::spawn(async move { transport.post(ScriptRequest::GetStatus).await });

        let (request, responder) = expect_request(&mut receiver).await.expect("Expected a request");
        assert_eq!(request, ScriptRequest::GetStatus);
        responder.send(Ok(TransportReply::Body(json!({"success": true})))).unwrap();

        let result = call.await.unwrap();
        assert_eq!(result, Ok(TransportReply::Body(json!({"success": true}))));
    }
}
