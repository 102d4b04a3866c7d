//! Incremental reading of an HTTP/1.0 response from a non-blocking connection

use embedded_hal::blocking::delay::DelayMs;

use super::{Connection, M2xError, POLL_INTERVAL_MS};

/// Reads a response one byte at a time, sleeping while the connection is idle
pub struct ResponseReader<'r, C, D> {
    conn: &'r mut C,
    delay: &'r mut D,
    case_insensitive: bool,
    max_idle_polls: Option<u32>,
    /// Byte that ended the last number, consumed with it
    terminator: Option<u8>,
}

impl<'r, C, D> ResponseReader<'r, C, D>
where
    C: Connection,
    D: DelayMs<u32>,
{
    /// Read from `conn`, waiting on `delay` between idle polls
    pub fn new(
        conn: &'r mut C,
        delay: &'r mut D,
        case_insensitive: bool,
        max_idle_polls: Option<u32>,
    ) -> Self {
        ResponseReader {
            conn,
            delay,
            case_insensitive,
            max_idle_polls,
            terminator: None,
        }
    }

    fn wait_readable(&mut self) -> Result<(), M2xError> {
        let mut idle = 0_u32;
        loop {
            if self.conn.read_ready().map_err(M2xError::io)? {
                return Ok(());
            }
            if !self.conn.connected() {
                return Err(M2xError::Disconnected);
            }
            idle += 1;
            if matches!(self.max_idle_polls, Some(max) if idle > max) {
                return Err(M2xError::NotReachable);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Next byte of the response
    pub fn next_byte(&mut self) -> Result<u8, M2xError> {
        self.wait_readable()?;
        let mut b = [0_u8];
        match self.conn.read(&mut b).map_err(M2xError::io)? {
            0 => Err(M2xError::Disconnected),
            _ => Ok(b[0]),
        }
    }

    fn byte_matches(&self, expected: u8, actual: u8) -> bool {
        expected == b'*'
            || expected == actual
            || (self.case_insensitive && expected.eq_ignore_ascii_case(&actual))
    }

    /// Skip input until `pattern` has been read. `*` in the pattern matches
    /// any byte.
    pub fn wait_for(&mut self, pattern: &[u8]) -> Result<(), M2xError> {
        self.wait_for_from(pattern, 0)
    }

    fn wait_for_from(&mut self, pattern: &[u8], mut matched: usize) -> Result<(), M2xError> {
        while matched < pattern.len() {
            let b = self.next_byte()?;
            if self.byte_matches(pattern[matched], b) {
                matched += 1;
            } else {
                // The byte that broke the match may start a new one
                matched = usize::from(self.byte_matches(pattern[0], b));
            }
        }
        Ok(())
    }

    /// Three-digit status code from the status line
    pub fn status_code(&mut self) -> Result<u16, M2xError> {
        self.wait_for(b"HTTP/*.* ")?;
        let mut code = 0_u16;
        for _ in 0..3 {
            let b = self.next_byte()?;
            if !b.is_ascii_digit() {
                return Err(M2xError::Invalid);
            }
            code = code * 10 + (b - b'0') as u16;
        }
        Ok(code)
    }

    /// Value of the Content-Length header. A zero length is rejected.
    pub fn content_length(&mut self) -> Result<usize, M2xError> {
        self.wait_for(b"Content-Length: ")?;
        let mut len = 0_usize;
        let mut digits = 0;
        loop {
            let b = self.next_byte()?;
            match b {
                b'0'..=b'9' => {
                    len = len
                        .checked_mul(10)
                        .and_then(|l| l.checked_add((b - b'0') as usize))
                        .ok_or(M2xError::Invalid)?;
                    digits += 1;
                }
                b'\r' | b'\n' => {
                    self.terminator = Some(b);
                    break;
                }
                _ => return Err(M2xError::Invalid),
            }
        }
        if digits == 0 || len == 0 {
            return Err(M2xError::Invalid);
        }
        Ok(len)
    }

    /// Skip to the blank line that ends the header
    pub fn skip_header(&mut self) -> Result<(), M2xError> {
        let matched = match self.terminator.take() {
            Some(b'\r') => 1,
            _ => 0,
        };
        self.wait_for_from(b"\r\n\r\n", matched)
    }

    /// Read exactly `len` body bytes into the front of `buf`
    pub fn body<'b>(&mut self, len: usize, buf: &'b mut [u8]) -> Result<&'b [u8], M2xError> {
        let dst = buf.get_mut(..len).ok_or(M2xError::ResponseTooLarge)?;
        let mut filled = 0;
        while filled < len {
            self.wait_readable()?;
            match self.conn.read(&mut dst[filled..]).map_err(M2xError::io)? {
                0 => return Err(M2xError::Disconnected),
                n => filled += n,
            }
        }
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::m2x::testing::{CountingDelay, ScriptedConnection};

    fn reader<'r>(
        conn: &'r mut ScriptedConnection,
        delay: &'r mut CountingDelay,
    ) -> ResponseReader<'r, ScriptedConnection, CountingDelay> {
        ResponseReader::new(conn, delay, false, Some(5))
    }

    #[test]
    fn status_after_noise() {
        let mut conn = ScriptedConnection::responding(b"garbage HHTTP/1.1 404 Not Found\r\n");
        let mut delay = CountingDelay::default();
        assert_eq!(reader(&mut conn, &mut delay).status_code(), Ok(404));
    }

    #[test]
    fn non_digit_status_is_invalid() {
        let mut conn = ScriptedConnection::responding(b"HTTP/1.0 2x0 OK\r\n");
        let mut delay = CountingDelay::default();
        assert_eq!(reader(&mut conn, &mut delay).status_code(), Err(M2xError::Invalid));
    }

    #[test]
    fn header_then_body() {
        let mut conn = ScriptedConnection::responding(
            b"HTTP/1.0 200 OK\r\nServer: x\r\nContent-Length: 5\r\nX-Other: y\r\n\r\nhello",
        );
        let mut delay = CountingDelay::default();
        let mut r = reader(&mut conn, &mut delay);
        assert_eq!(r.status_code(), Ok(200));
        assert_eq!(r.content_length(), Ok(5));
        r.skip_header().unwrap();
        let mut buf = [0; 16];
        assert_eq!(r.body(5, &mut buf), Ok(&b"hello"[..]));
    }

    #[test]
    fn content_length_last_before_blank_line() {
        let mut conn = ScriptedConnection::responding(b"Content-Length: 2\r\n\r\nok");
        let mut delay = CountingDelay::default();
        let mut r = reader(&mut conn, &mut delay);
        assert_eq!(r.content_length(), Ok(2));
        r.skip_header().unwrap();
        let mut buf = [0; 2];
        assert_eq!(r.body(2, &mut buf), Ok(&b"ok"[..]));
    }

    #[test]
    fn header_names_can_match_any_case() {
        let mut conn = ScriptedConnection::responding(b"content-length: 12\r\n");
        let mut delay = CountingDelay::default();
        let mut r = ResponseReader::new(&mut conn, &mut delay, true, Some(0));
        assert_eq!(r.content_length(), Ok(12));
    }

    #[test]
    fn zero_length_is_invalid() {
        let mut conn = ScriptedConnection::responding(b"Content-Length: 0\r\n\r\n");
        let mut delay = CountingDelay::default();
        assert_eq!(reader(&mut conn, &mut delay).content_length(), Err(M2xError::Invalid));
    }

    #[test]
    fn body_must_fit_buffer() {
        let mut conn = ScriptedConnection::responding(b"0123456789");
        let mut delay = CountingDelay::default();
        let mut buf = [0; 4];
        assert_eq!(
            reader(&mut conn, &mut delay).body(10, &mut buf),
            Err(M2xError::ResponseTooLarge)
        );
    }

    #[test]
    fn idle_connection_polls_once_a_second() {
        let mut conn = ScriptedConnection::responding(b"HTTP/1.0 201 Created\r\n").stalled_for(3);
        let mut delay = CountingDelay::default();
        assert_eq!(reader(&mut conn, &mut delay).status_code(), Ok(201));
        assert_eq!(delay.calls, 3);
        assert_eq!(delay.total_ms, 3 * POLL_INTERVAL_MS);
    }

    #[test]
    fn silent_connection_gives_up() {
        let mut conn = ScriptedConnection::responding(b"").kept_open();
        let mut delay = CountingDelay::default();
        assert_eq!(
            reader(&mut conn, &mut delay).next_byte(),
            Err(M2xError::NotReachable)
        );
        assert_eq!(delay.calls, 5);
    }

    #[test]
    fn hang_up_mid_response() {
        let mut conn = ScriptedConnection::responding(b"HTTP/1.0 2");
        let mut delay = CountingDelay::default();
        assert_eq!(
            reader(&mut conn, &mut delay).status_code(),
            Err(M2xError::Disconnected)
        );
        assert_eq!(delay.calls, 0);
    }
}
