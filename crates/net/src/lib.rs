//! FleetFlow Network Library
//!
//! TCP transport for the FleetFlow backend.
//!
//! # Architecture
//!
//! - **Server**: Accepts connections and dispatches requests to a [`Backend`](fleetflow_core::Backend)
//! - **Client**: Sends requests and waits for the matching response
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(addr, Arc::new(backend)).await?;
//!
//! let mut client = Client::connect(server.addr()).await?;
//! client.sign_in("boss@acme.com", "password").await?;
//! let issued = client.issue_invite(request).await?;
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{ErrorBody, Operation, Reply, Request, Response};
pub use server::{dispatch, Server};

/// Default port for FleetFlow servers
pub const DEFAULT_PORT: u16 = 7411;
