use std::panic::AssertUnwindSafe;

use futures::FutureExt; // catch_unwind
use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info};

use protocol::{ChatCodec, Request, Response};
use crate::error::ChatError;
use crate::registry::Registry;
use crate::server_channel::Publisher;
use crate::server_types::{BroadcastEvent, Connection};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Stream ended or failed before a name arrived, nothing was announced
    NoName,
    /// Client sent the quit command
    Quit,
    /// Peer closed or reset the connection after joining
    Disconnected,
    /// Prompt write or publish failed
    Failed,
    Panicked,
}

// Handles server communication from one client,
// from name handshake until the connection is torn down
pub struct ClientHandler<R> {
    conn: Connection,
    reader: FramedRead<R, ChatCodec>,
    clients: Registry,
    publisher: Publisher,
}

impl<R> ClientHandler<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    pub fn new(conn: Connection, reader: R, clients: Registry, publisher: Publisher,
               max_line_length: usize) -> Self {
        ClientHandler {
            conn,
            reader: FramedRead::new(reader, ChatCodec::new_with_max_length(max_line_length)),
            clients,
            publisher,
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        let outcome = AssertUnwindSafe(self.converse()).catch_unwind().await;

        // teardown runs on every exit path
        self.teardown().await;

        match outcome {
            Ok(Ok(end)) => end,
            Ok(Err(e)) => {
                debug!("session {} ended with error: {}", self.conn.id(), e);
                SessionEnd::Failed
            },
            Err(_) => {
                error!("session {} panicked", self.conn.id());
                SessionEnd::Panicked
            },
        }
    }

    async fn converse(&mut self) -> Result<SessionEnd, ChatError> {
        self.conn.send(Response::Prompt).await?;

        let name = match self.reader.next().await {
            Some(Ok(Request::JoinName(name))) => name,
            Some(Ok(other)) => {
                debug!("unexpected handshake request {:?}", other);
                return Ok(SessionEnd::NoName);
            },
            Some(Err(e)) => {
                debug!("handshake read from {} failed: {}", self.conn.addr(), e);
                return Ok(SessionEnd::NoName);
            },
            None => {
                debug!("{} closed before sending a name", self.conn.addr());
                return Ok(SessionEnd::NoName);
            },
        };

        self.clients.add(&self.conn, name.clone()).await;
        info!("{} joined as {:?} (connection {})", self.conn.addr(), &name, self.conn.id());
        self.publisher.publish(BroadcastEvent::joined(&name))?;

        loop {
            match self.reader.next().await {
                Some(Ok(Request::Quit)) => {
                    info!("User {:?} has left", &name);
                    self.publisher.publish(BroadcastEvent::left(&name))?;
                    return Ok(SessionEnd::Quit);
                },
                // the codec only yields JoinName for the first line
                Some(Ok(Request::Message(text) | Request::JoinName(text))) => {
                    debug!("server received from {:?}: {:?}", &name, &text);
                    self.publisher.publish(BroadcastEvent::new(&name, text))?;
                },
                Some(Err(e)) => {
                    debug!("Server Connection closing error: {:?}", e);
                    self.publisher.publish(BroadcastEvent::left(&name))?;
                    return Ok(SessionEnd::Disconnected);
                },
                None => {
                    info!("Remote {} has closed connection, user {:?} has left", self.conn.addr(), &name);
                    self.publisher.publish(BroadcastEvent::left(&name))?;
                    return Ok(SessionEnd::Disconnected);
                },
            }
        }
    }

    async fn teardown(&mut self) {
        self.clients.remove(self.conn.id()).await;
        if let Err(e) = self.conn.close().await {
            debug!("closing connection {} failed: {}", self.conn.id(), e);
        }
    }
}
