use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::select;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::client_handler::{ClientHandler, SessionEnd};
use crate::config::ServerConfig;
use crate::delivery::Distributor;
use crate::error::ChatError;
use crate::registry::Registry;
use crate::server_channel;
use crate::server_types::{ConnId, Connection};

const COUNTER_SEED: ConnId = 1;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Bound listening socket plus the shared state every session gets a handle to
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    clients: Registry,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Server, ChatError> {
        let listener = TcpListener::bind(&config.addr).await
            .map_err(|source| ChatError::Bind { addr: config.addr.clone(), source })?;

        Ok(Server {
            listener,
            config,
            clients: Registry::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Registry {
        self.clients.clone()
    }

    // Accept until `shutdown` resolves, then drop the listener. Sessions still
    // running are handed back; they and the distributor keep going until
    // their peers leave.
    pub async fn run<F>(self, shutdown: F) -> JoinSet<SessionEnd>
    where
        F: Future<Output = ()>,
    {
        let (publisher, events) = server_channel::channel();
        Distributor::new(&self.clients).spawn(events);

        let mut sessions = JoinSet::new();
        let mut next_id = COUNTER_SEED;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    debug!("session finished: {:?}", finished);
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((tcp_socket, addr)) => {
                        let (tcp_read, tcp_write) = tcp_socket.into_split();
                        let id = next_id;
                        next_id += 1;

                        info!("Server received new client connection {} from {}", id, &addr);

                        let conn = Connection::new(id, addr, tcp_write, self.config.write_timeout);
                        let handler = ClientHandler::new(conn, tcp_read, self.clients.clone(),
                                                         publisher.clone(), self.config.max_line_length);
                        sessions.spawn(handler.run());
                    },
                    Err(e) => {
                        // e.g. fd exhaustion, keep serving once it clears
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    },
                },
            }
        }

        sessions
    }
}
