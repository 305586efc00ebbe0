//! WebSocket plumbing: connect, writer task, Hello handshake

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::GatewayError;
use crate::protocol::{classify, decode, CloseAction, CloseCode, GatewayMessage, HelloPayload, OpCode};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsWriter = SplitSink<WsStream, Message>;
pub(crate) type WsReader = SplitStream<WsStream>;

/// Frames queued for the writer task
#[derive(Debug)]
pub(crate) enum Outbound {
    Payload(GatewayMessage),
    /// Send a close frame and stop writing
    Close(u16, &'static str),
}

pub(crate) async fn connect(url: &str) -> Result<(WsWriter, WsReader), GatewayError> {
    let (ws, _response) = connect_async(url).await?;
    Ok(ws.split())
}

/// Drain `outbound` into the socket until a close is sent or the channel ends
pub(crate) fn spawn_writer(mut writer: WsWriter, mut outbound: mpsc::Receiver<Outbound>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let message = match frame {
                Outbound::Payload(payload) => match payload.to_json() {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::error!(error = %e, op = %payload.op, "Failed to encode payload");
                        continue;
                    }
                },
                Outbound::Close(code, reason) => {
                    send_close(&mut writer, code, reason).await;
                    break;
                }
            };
            if let Err(e) = writer.send(message).await {
                tracing::debug!(error = %e, "Writer stopped");
                break;
            }
        }
    })
}

/// Send a close frame straight on the socket, bypassing any writer task
pub(crate) async fn send_close(writer: &mut WsWriter, code: u16, reason: &'static str) {
    tracing::debug!(code, reason, "Closing socket");
    let frame = CloseFrame {
        code: WsCloseCode::from(code),
        reason: reason.into(),
    };
    if let Err(e) = writer.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "Close frame not sent");
    }
}

/// Map a close frame on a socket that never reached Hello
pub(crate) fn close_error(code: Option<u16>, reason: &str) -> GatewayError {
    match (classify(code), code) {
        (CloseAction::Fatal, Some(4004)) => GatewayError::AuthenticationFailed,
        (CloseAction::Fatal, Some(code)) => GatewayError::FatalClose {
            code,
            reason: CloseCode::from_u16(code).map_or_else(|| reason.to_string(), |c| c.description().to_string()),
        },
        _ => GatewayError::Protocol(format!("socket closed ({code:?}) {reason}")),
    }
}

/// Read until Hello arrives, ignoring anything else
///
/// Fails with [`GatewayError::Shutdown`] as soon as shutdown is requested.
pub(crate) async fn wait_for_hello(
    reader: &mut WsReader,
    timeout: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<HelloPayload, GatewayError> {
    let hello = async {
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => match decode(&text) {
                    Ok(msg) if msg.op == OpCode::Hello => {
                        return msg
                            .as_hello()
                            .ok_or_else(|| GatewayError::Protocol("Hello without heartbeat interval".into()));
                    }
                    Ok(msg) => tracing::debug!(op = %msg.op, "Ignoring frame before Hello"),
                    Err(e) => tracing::debug!(error = %e, "Dropping malformed frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code));
                    let reason = frame.as_ref().map(|f| f.reason.to_string()).unwrap_or_default();
                    return Err(close_error(code, &reason));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(GatewayError::Protocol("connection closed before Hello".into())),
            }
        }
    };

    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => Err(GatewayError::Shutdown),
        hello = tokio::time::timeout(timeout, hello) => hello.map_err(|_| GatewayError::HelloTimeout)?,
    }
}
