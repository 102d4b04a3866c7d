//! In-memory connection and delay for exercising the client

use std::collections::VecDeque;

use embedded_hal::blocking::delay::DelayMs;
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};

use super::Connection;

/// Plays back a canned response and records what was sent
#[derive(Debug, Default)]
pub struct ScriptedConnection {
    incoming: VecDeque<u8>,
    pub outgoing: Vec<u8>,
    pub refuse: bool,
    open: bool,
    hang_up_when_drained: bool,
    stall_polls: u32,
    pub connects: Vec<(String, u16)>,
    pub flushes: u32,
    pub stops: u32,
}

impl ScriptedConnection {
    /// A server that sends `response` and then closes
    pub fn responding(response: &[u8]) -> Self {
        ScriptedConnection {
            incoming: response.iter().copied().collect(),
            open: true,
            hang_up_when_drained: true,
            ..Default::default()
        }
    }

    /// A server that refuses the connection
    pub fn refusing() -> Self {
        ScriptedConnection {
            refuse: true,
            ..Default::default()
        }
    }

    /// Keep the connection up after the response runs out
    pub fn kept_open(mut self) -> Self {
        self.hang_up_when_drained = false;
        self
    }

    /// Report nothing ready for the first `polls` polls
    pub fn stalled_for(mut self, polls: u32) -> Self {
        self.stall_polls = polls;
        self
    }

    pub fn sent(&self) -> &str {
        std::str::from_utf8(&self.outgoing).unwrap()
    }
}

impl ErrorType for ScriptedConnection {
    type Error = ErrorKind;
}

impl Read for ScriptedConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.incoming.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl ReadReady for ScriptedConnection {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.stall_polls > 0 {
            self.stall_polls -= 1;
            return Ok(false);
        }
        Ok(!self.incoming.is_empty())
    }
}

impl Write for ScriptedConnection {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.open {
            return Err(ErrorKind::NotConnected);
        }
        self.outgoing.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

impl Connection for ScriptedConnection {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.connects.push((host.to_string(), port));
        if self.refuse {
            return Err(ErrorKind::ConnectionRefused);
        }
        self.open = true;
        Ok(())
    }

    fn connected(&mut self) -> bool {
        if self.hang_up_when_drained && self.incoming.is_empty() {
            self.open = false;
        }
        self.open
    }

    fn stop(&mut self) {
        self.open = false;
        self.stops += 1;
    }
}

/// Records requested delays without sleeping
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub calls: u32,
    pub total_ms: u32,
}

impl DelayMs<u32> for CountingDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += ms;
    }
}
