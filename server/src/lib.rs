pub mod config;
pub mod error;
pub mod server_types;

// shared state
pub mod registry;
pub mod server_channel;

// fan out
pub mod delivery;

// sessions
pub mod client_handler;
pub mod server_listener;

pub use config::{Args, ServerConfig};
pub use error::ChatError;
pub use server_listener::Server;
