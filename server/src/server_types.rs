use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::SinkExt; // send/close combinators on FramedWrite
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::FramedWrite;

use protocol::{ChatCodec, Response, JOINED_TEXT, LEFT_TEXT};
use crate::error::ChatError;

// server type definitions

pub type ConnId = u64;

pub type ChatWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub type ChatSink = FramedWrite<ChatWriter, ChatCodec>;

/// One line to relay, produced by a session and consumed once by the distributor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub name: String,
    pub text: String,
}

impl BroadcastEvent {
    pub fn new(name: &str, text: impl Into<String>) -> Self {
        BroadcastEvent {
            name: name.to_owned(),
            text: text.into(),
        }
    }

    pub fn joined(name: &str) -> Self {
        Self::new(name, JOINED_TEXT)
    }

    pub fn left(name: &str) -> Self {
        Self::new(name, LEFT_TEXT)
    }

    pub fn to_response(&self) -> Response {
        Response::UserMessage {
            name: self.name.clone(),
            text: self.text.clone(),
        }
    }
}

// Write half of a client connection, owned by its session handler.
// Everyone else only gets a weak handle through the registry.
pub struct Connection {
    id: ConnId,
    addr: SocketAddr,
    sink: Arc<Mutex<ChatSink>>,
    write_timeout: Duration,
}

impl Connection {
    pub fn new<W>(id: ConnId, addr: SocketAddr, writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: ChatWriter = Box::new(writer);

        Connection {
            id,
            addr,
            sink: Arc::new(Mutex::new(FramedWrite::new(writer, ChatCodec::new()))),
            write_timeout,
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn entry(&self, name: String) -> ClientEntry {
        ClientEntry {
            id: self.id,
            addr: self.addr,
            name,
            sink: Arc::downgrade(&self.sink),
            write_timeout: self.write_timeout,
        }
    }

    pub async fn send(&self, response: Response) -> Result<(), ChatError> {
        write_timed(&self.sink, response, self.write_timeout).await
    }

    // flush what is buffered then shut down the write direction
    pub async fn close(&self) -> Result<(), ChatError> {
        let limit = self.write_timeout;
        match timeout(limit, async { self.sink.lock().await.close().await }).await {
            Ok(res) => res.map_err(ChatError::from),
            Err(_) => Err(ChatError::WriteTimeout(limit)),
        }
    }
}

/// Registry view of a joined client
#[derive(Clone)]
pub struct ClientEntry {
    pub id: ConnId,
    pub addr: SocketAddr,
    pub name: String,
    sink: Weak<Mutex<ChatSink>>,
    write_timeout: Duration,
}

impl ClientEntry {
    pub fn is_alive(&self) -> bool {
        self.sink.strong_count() > 0
    }

    pub async fn deliver(&self, response: Response) -> Result<(), ChatError> {
        let sink = self.sink.upgrade().ok_or(ChatError::RecipientGone(self.id))?;
        write_timed(&sink, response, self.write_timeout).await
    }
}

impl fmt::Debug for ClientEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientEntry")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

async fn write_timed(sink: &Mutex<ChatSink>, response: Response, limit: Duration) -> Result<(), ChatError> {
    match timeout(limit, async { sink.lock().await.send(response).await }).await {
        Ok(res) => res.map_err(ChatError::from),
        Err(_) => Err(ChatError::WriteTimeout(limit)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    use tokio::io::{DuplexStream, ReadHalf};
    use tokio_stream::StreamExt;
    use tokio_util::codec::{FramedRead, LinesCodec};

    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub type Peer = FramedRead<DuplexStream, LinesCodec>;

    pub fn test_addr(id: ConnId) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000 + id as u16))
    }

    // Connection whose remote end is handed back as a line reader
    pub fn duplex_connection(id: ConnId) -> (Connection, Peer) {
        let (local, remote) = tokio::io::duplex(4096);
        let conn = Connection::new(id, test_addr(id), local, TEST_TIMEOUT);
        (conn, FramedRead::new(remote, LinesCodec::new()))
    }

    // Full session plumbing: read half for the handler, write half in the
    // connection, and the client's end of the pipe
    pub fn duplex_session(id: ConnId) -> (Connection, ReadHalf<DuplexStream>, DuplexStream) {
        let (local, remote) = tokio::io::duplex(4096);
        let (read, write) = tokio::io::split(local);
        (Connection::new(id, test_addr(id), write, TEST_TIMEOUT), read, remote)
    }

    pub async fn next_line(peer: &mut Peer) -> Option<String> {
        match timeout(TEST_TIMEOUT, peer.next()).await {
            Ok(Some(Ok(line))) => Some(line),
            Ok(_) => None,
            Err(_) => panic!("timed out waiting for a line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn events_render_as_name_prefixed_lines() {
        assert_eq!(BroadcastEvent::joined("alice").to_response(), Response::UserMessage {
            name: "alice".into(),
            text: "has joined the chat".into(),
        });
        assert_eq!(BroadcastEvent::left("").text, "has left the chat");
    }

    #[tokio::test]
    async fn entry_writes_through_the_connection() {
        let (conn, mut peer) = duplex_connection(1);
        let entry = conn.entry("alice".into());

        entry.deliver(BroadcastEvent::new("bob", "hi").to_response()).await.unwrap();
        assert_eq!(next_line(&mut peer).await.as_deref(), Some("bob: hi"));
    }

    #[tokio::test]
    async fn entry_does_not_keep_connection_alive() {
        let (conn, _peer) = duplex_connection(2);
        let entry = conn.entry("carol".into());
        assert!(entry.is_alive());

        drop(conn);
        assert!(!entry.is_alive());
        let err = entry.deliver(Response::Prompt).await.unwrap_err();
        assert!(matches!(err, ChatError::RecipientGone(2)), "{err:?}");
    }

    #[tokio::test]
    async fn close_ends_the_remote_stream() {
        let (conn, mut peer) = duplex_connection(3);
        conn.send(Response::Prompt).await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(next_line(&mut peer).await.as_deref(), Some("Enter your name:"));
        assert_eq!(next_line(&mut peer).await, None);
    }
}
