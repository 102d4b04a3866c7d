//! Client for the AT&T M2X time-series HTTP API
//!
//! Requests are plain HTTP/1.0 over whatever byte stream implements
//! [`Connection`]: one request per connection, closed when the response has
//! been read. Response bodies are read into a fixed buffer and parsed with
//! `serde-json-core`, so nothing here allocates.

use embedded_io::{Read, ReadReady, Write};
use ufmt::derive::uDebug;

mod client;
mod encode;
mod json;
mod response;
#[cfg(test)]
mod testing;

pub use client::{M2xClient, ValuesQuery};
pub use encode::write_encoded;
pub use json::{StreamValue, Waypoint};
pub use response::ResponseReader;

/// Public M2X API endpoint
pub const DEFAULT_HOST: &str = "api-m2x.att.com";
/// Plain HTTP
pub const DEFAULT_PORT: u16 = 80;
/// First header line of every request
pub const USER_AGENT: &str = "User-Agent: M2X TM4C1294 Client/0.1";
/// Largest response body that will be parsed
pub const MAX_BODY_LEN: usize = 1024;
/// Most values or waypoints reported from one response
pub const MAX_ITEMS: usize = 16;
/// Wait between polls of an idle connection
pub const POLL_INTERVAL_MS: u32 = 1000;

/// A byte stream to one server at a time, like a TCP socket.
///
/// Reads must not block: `read_ready` says whether `read` has data, and an
/// idle but open connection is detected through `connected`.
pub trait Connection: Read + Write + ReadReady {
    /// Open a connection to `host:port`
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Whether the peer is still there
    fn connected(&mut self) -> bool;

    /// Drop the connection
    fn stop(&mut self);
}

impl<T: Connection + ?Sized> Connection for &mut T {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        T::connect(self, host, port)
    }

    fn connected(&mut self) -> bool {
        T::connected(self)
    }

    fn stop(&mut self) {
        T::stop(self)
    }
}

/// Errors from an M2X request
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum M2xError {
    /// Could not connect to the server
    NoConnection,
    /// The server hung up before the response was complete
    Disconnected,
    /// Gave up waiting on a silent connection
    NotReachable,
    /// The response did not look like HTTP
    Invalid,
    /// The response body was not the expected JSON
    JsonInvalid,
    /// The response body does not fit the receive buffer
    ResponseTooLarge,
    /// The transport failed
    Io,
}

impl M2xError {
    pub(crate) fn io<E>(_: E) -> Self {
        M2xError::Io
    }
}

/// Per-client settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig<'a> {
    /// Server host name or address
    pub host: &'a str,
    /// Server port
    pub port: u16,
    /// Match response header names without regard to case
    pub case_insensitive: bool,
    /// Give up after this many consecutive idle polls. `None` waits as long as
    /// the peer stays connected.
    pub max_idle_polls: Option<u32>,
}

impl Default for ClientConfig<'_> {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            case_insensitive: false,
            max_idle_polls: None,
        }
    }
}
