//! # turnwire
//!
//! Minimal framed request/response messaging.
//!
//! A client sends one typed message over a persistent connection and gets
//! exactly one typed reply back: a result or an error. Servers hand every
//! command to an [`Evaluator`] supplied by the integrator and answer with
//! whatever text it produces.
//!
//! ## Layers
//!
//! ```text
//! Transport (Connection, bytes) → Protocol (frames) → Channel / Server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnwire::prelude::*;
//!
//! struct Upper;
//!
//! impl Evaluator for Upper {
//!     async fn evaluate(&self, command: &str) -> Result<String, String> {
//!         Ok(command.to_uppercase())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), TurnwireError> {
//! let server = ServerBuilder::new().bind("127.0.0.1:7400").build(Upper).await?;
//! tokio::spawn(server.run());
//!
//! let mut client = Client::connect(None, 7400).await?;
//! assert_eq!(client.request("hi").await?, "HI");
//! # Ok(())
//! # }
//! ```

mod channel;
mod config;
mod error;
mod evaluator;
mod handler;
pub mod logging;
mod server;

pub use channel::{Channel, Client};
pub use config::{ClientConfig, ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_PORT};
pub use error::TurnwireError;
pub use evaluator::Evaluator;
pub use handler::{dispatch_once, handle_connection, Dispatch};
pub use server::{Server, ServerBuilder};

/// Re-exports everything needed to run a server or a client.
pub mod prelude {
    pub use crate::{
        dispatch_once, handle_connection, Channel, Client, ClientConfig, Dispatch,
        Evaluator, Server, ServerBuilder, ServerConfig, TurnwireError,
    };
    pub use turnwire_protocol::{
        decode, encode, write_frame, FrameCodec, Message, ProtocolError, TypeCode,
    };
    pub use turnwire_transport::{
        Connection, ConnectionId, TcpTransport, Transport, TransportError,
    };
}
