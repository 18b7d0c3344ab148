use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::server_types::ConnId;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Listening socket could not be created, the only fatal error
    #[error("unable to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    /// Recipient's session already released its connection
    #[error("connection {0} is gone")]
    RecipientGone(ConnId),

    #[error("broadcast channel closed")]
    ChannelClosed,
}
