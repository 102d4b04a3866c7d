//! The board's M2X client against the sink, over real TCP

use std::collections::VecDeque;
use std::io::{self, Read as _, Write as _};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use embedded_hal::blocking::delay::DelayMs;
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use m2x_sink::{run, Sink};
use tm4c1294_launchpad_core::m2x::{ClientConfig, Connection, M2xClient, M2xError, ValuesQuery};

/// `std` socket behind the client's non-blocking connection model
#[derive(Default)]
struct StdConnection {
    stream: Option<TcpStream>,
    pending: VecDeque<u8>,
    eof: bool,
}

fn kind(e: io::Error) -> ErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        io::ErrorKind::NotConnected => ErrorKind::NotConnected,
        io::ErrorKind::TimedOut => ErrorKind::TimedOut,
        _ => ErrorKind::Other,
    }
}

impl ErrorType for StdConnection {
    type Error = ErrorKind;
}

impl Read for StdConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        let n = buf.len().min(self.pending.len());
        for (slot, b) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

impl ReadReady for StdConnection {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        if self.eof {
            return Ok(false);
        }
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .map_err(kind)?;
        let mut chunk = [0_u8; 512];
        match stream.read(&mut chunk) {
            Ok(0) => {
                self.eof = true;
                Ok(false)
            }
            Ok(n) => {
                self.pending.extend(&chunk[..n]);
                Ok(true)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(false)
            }
            Err(e) => Err(kind(e)),
        }
    }
}

impl Write for StdConnection {
    fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        let stream = self.stream.as_mut().ok_or(ErrorKind::NotConnected)?;
        stream.write(buf).map_err(kind)
    }

    fn flush(&mut self) -> Result<(), ErrorKind> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush().map_err(kind),
            None => Ok(()),
        }
    }
}

impl Connection for StdConnection {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), ErrorKind> {
        self.stop();
        self.stream = Some(TcpStream::connect((host, port)).map_err(kind)?);
        self.pending.clear();
        self.eof = false;
        Ok(())
    }

    fn connected(&mut self) -> bool {
        self.stream.is_some() && !(self.eof && self.pending.is_empty())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Short real sleeps so idle polls don't slow the tests down
struct ShortDelay;

impl DelayMs<u32> for ShortDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.min(20) as u64));
    }
}

fn start_sink(key: &str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = Arc::new(Sink::new(key));
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(run(listener, sink)).unwrap();
    });
    addr
}

fn client(addr: SocketAddr, key: &str) -> M2xClient<'_, StdConnection, ShortDelay> {
    let config = ClientConfig {
        host: "127.0.0.1",
        port: addr.port(),
        case_insensitive: false,
        max_idle_polls: Some(50),
    };
    M2xClient::new(StdConnection::default(), ShortDelay, key, config)
}

#[test]
fn values_round_trip() {
    let addr = start_sink("secret");
    let mut c = client(addr, "secret");

    for celsius in [21, 22, 23] {
        assert_eq!(c.send("board 1", "temperature", &celsius), Ok(202));
    }

    let query = ValuesQuery {
        limit: Some(2),
        ..Default::default()
    };
    let mut seen = Vec::new();
    let status = c.fetch_values("board 1", "temperature", &query, |v, i| {
        seen.push((i, v.value.to_string(), v.at.to_string()))
    });
    assert_eq!(status, Ok(200));
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].0, seen[0].1.as_str()), (0, "22"));
    assert_eq!((seen[1].0, seen[1].1.as_str()), (1, "23"));
    assert!(seen[0].2 <= seen[1].2);
}

#[test]
fn location_round_trip() {
    let addr = start_sink("");
    let mut c = client(addr, "whatever");

    assert_eq!(c.update_location("rover", "Lab", 47.6097, -122.3331, 56.0), Ok(202));
    assert_eq!(c.update_location("rover", "Yard", 47.61, -122.33, 57.5), Ok(202));

    let mut points = Vec::new();
    let status = c.read_location("rover", |w, i| {
        points.push((i, w.name.to_string(), w.latitude, w.longitude, w.elevation))
    });
    assert_eq!(status, Ok(200));
    assert_eq!(points.len(), 2);
    // Newest first, named after the current location
    assert_eq!(points[0], (0, "Yard".to_string(), 47.61, -122.33, 57.5));
    assert_eq!(points[1].2, 47.6097);
}

#[test]
fn refusals_are_statuses() {
    let addr = start_sink("secret");

    let mut wrong = client(addr, "guess");
    assert_eq!(wrong.send("f", "s", &1), Ok(401));

    let mut c = client(addr, "secret");
    let mut calls = 0;
    let status = c.fetch_values("f", "never-written", &ValuesQuery::default(), |_, _| calls += 1);
    assert_eq!(status, Ok(404));
    assert_eq!(calls, 0);
}

#[test]
fn nothing_listening() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let mut c = client(addr, "secret");
    assert_eq!(c.send("f", "s", &1), Err(M2xError::NoConnection));
}
