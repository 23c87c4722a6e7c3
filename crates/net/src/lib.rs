//! Hostel network service
//!
//! Length-prefixed JSON over TCP. A client sends one [`Request`] at a time
//! and reads back exactly one [`Response`]. Logging in binds a session token
//! to the connection; every later request is checked against it.
//!
//! ```ignore
//! let server = Server::start(addr, db, ServerSettings::default()).await?;
//!
//! let mut client = Client::connect(server.addr()).await?;
//! client.login("admin", password).await?;
//! let response = client.call(Request::Dashboard).await?;
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod routes;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use frame::MAX_FRAME_SIZE;
pub use protocol::{Request, Response};
pub use server::{Server, ServerSettings};

/// Default port for hostel servers
pub const DEFAULT_PORT: u16 = 7340;
