//! WebSocket server for handling command connections.
//!
//! Accepts upgraded HTTP connections and runs one session per connection:
//! receive a text message, parse it, route it to a handler, send the reply
//! if one is produced. One failed message never ends its session, and one
//! failed session never affects the listener or any other session.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch;
use crate::protocol::{self, CommandError, Severity};

/// Server instance owning the bound listener.
pub struct Server {
    listener: TcpListener,
    idle_timeout: Option<Duration>,
}

impl Server {
    /// Bind the configured listen address.
    ///
    /// Failure here is fatal to the process; the caller reports it once and
    /// exits. Every later failure is scoped to a single connection.
    pub async fn bind(config: &Config) -> io::Result<Server> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        Ok(Server {
            listener,
            idle_timeout: config.idle_timeout,
        })
    }

    /// Address the listener actually bound, for ephemeral-port setups.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, spawning one session task each.
    ///
    /// Accepting never waits on session work, and a failed accept only logs.
    /// There is deliberately no cap on concurrent sessions.
    pub async fn run(self) {
        if let Ok(address) = self.listener.local_addr() {
            info!(address = %address, "server listening");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "new connection");
                    let idle_timeout = self.idle_timeout;
                    tokio::spawn(async move {
                        handle_connection(stream, peer, idle_timeout).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}

/// Handle a single client connection from handshake to close.
///
/// The stream is owned by this task, so it is released on every exit path.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, idle_timeout: Option<Duration>) {
    // A request that never upgrades is dropped here without being serviced.
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(peer = %peer, error = %e, "handshake failed, dropping connection");
            return;
        }
    };

    info!(peer = %peer, "connection established");

    let (mut outbound, mut inbound) = ws.split();

    let close_reason = loop {
        let received = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, inbound.next()).await {
                Ok(received) => received,
                Err(_) => break "idle timeout".to_string(),
            },
            None => inbound.next().await,
        };

        let message = match received {
            Some(Ok(message)) => message,
            Some(Err(e)) => break e.to_string(),
            None => break "closed by peer".to_string(),
        };

        match message {
            Message::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                if let Err(failure) = process_message(text.as_str(), &mut outbound).await {
                    log_failure(peer, &failure);
                }
            }
            Message::Close(_) => break "closed by peer".to_string(),
            // The protocol is text-only; binary and ping/pong frames are
            // ignored.
            _ => {}
        }
    };

    error!(peer = %peer, reason = %close_reason, "connection closed");
}

/// Parse, route, and execute one inbound message, sending the reply if the
/// handler produced one.
///
/// Strictly one command in flight per connection: the session awaits this
/// before receiving the next message.
async fn process_message<S>(text: &str, outbound: &mut S) -> Result<(), CommandError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let command = protocol::parse(text)?;
    let reply = dispatch::dispatch(&command)?;

    if let Some(payload) = reply {
        if let Err(e) = outbound.send(Message::text(payload)).await {
            return Err(CommandError::Send {
                command: command.name,
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}

/// Log one command failure at its classified severity.
///
/// Failures are diagnostics only; the client is never told and the session
/// keeps serving.
fn log_failure(peer: SocketAddr, failure: &CommandError) {
    match failure.severity() {
        Severity::Warning => {
            warn!(peer = %peer, command = failure.label(), reason = %failure, "command rejected")
        }
        Severity::Error => {
            error!(peer = %peer, command = failure.label(), reason = %failure, "command failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Sink that records every sent message.
    struct TestSink {
        sent: Vec<Message>,
    }

    impl TestSink {
        fn new() -> TestSink {
            TestSink { sent: Vec::new() }
        }
    }

    impl Sink<Message> for TestSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Infallible> {
            self.get_mut().sent.push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_echo_sends_exactly_one_reply() {
        let mut sink = TestSink::new();
        process_message("echo hello world", &mut sink).await.unwrap();
        assert_eq!(sink.sent, vec![Message::text("hello world")]);
    }

    #[tokio::test]
    async fn test_unknown_command_sends_nothing() {
        let mut sink = TestSink::new();
        let err = process_message("flush everything", &mut sink).await.unwrap_err();
        assert_eq!(err, CommandError::Unknown("flush".to_string()));
        assert_eq!(err.severity(), Severity::Error);
        assert!(sink.sent.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_sends_nothing() {
        let mut sink = TestSink::new();
        let err = process_message("no-space-here", &mut sink).await.unwrap_err();
        assert_eq!(err.severity(), Severity::Warning);
        assert!(sink.sent.is_empty());
    }

    #[tokio::test]
    async fn test_failure_then_success_on_same_sink() {
        let mut sink = TestSink::new();
        assert!(process_message("garbage", &mut sink).await.is_err());
        process_message("echo still alive", &mut sink).await.unwrap();
        assert_eq!(sink.sent, vec![Message::text("still alive")]);
    }
}
