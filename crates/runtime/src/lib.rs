//! BiDi transport layer: the WebSocket client (§4.1 of SPEC_FULL.md) and the
//! browser process supervisor (§4.2). Nothing in this crate knows about
//! tools, selectors, or element refs — that is `vibium-core`.

pub mod client;
pub mod connection;
pub mod driver;
pub mod error;
pub mod supervisor;
pub mod transport;

pub use client::Client;
pub use connection::{Connection, EventStream};
pub use error::{Error, Result};
pub use supervisor::{Launched, LaunchOptions};
