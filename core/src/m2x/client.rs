//! Request construction and the public client

use core::fmt;

use embedded_hal::blocking::delay::DelayMs;
use embedded_io::Write;
use ufmt::{uWrite, uwrite};

use super::encode::write_encoded;
use super::json::{for_each_value, for_each_waypoint};
use super::response::ResponseReader;
use super::{ClientConfig, Connection, M2xError, StreamValue, Waypoint, MAX_BODY_LEN, USER_AGENT};

/// Optional filters for [`M2xClient::fetch_values`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValuesQuery<'q> {
    /// Earliest timestamp, ISO 8601
    pub start: Option<&'q str>,
    /// Latest timestamp, ISO 8601
    pub end: Option<&'q str>,
    /// Most values to return
    pub limit: Option<u32>,
}

/// M2X API client over a [`Connection`].
///
/// Every call opens a connection, sends one request, reads the response and
/// closes the connection again, whatever the outcome.
pub struct M2xClient<'a, C, D> {
    conn: C,
    delay: D,
    key: &'a str,
    config: ClientConfig<'a>,
}

/// Path of an API resource
#[derive(Clone, Copy)]
enum Resource<'r> {
    Stream { feed: &'r str, stream: &'r str },
    Values { feed: &'r str, stream: &'r str },
    Location { feed: &'r str },
}

impl Resource<'_> {
    fn write<W: uWrite + ?Sized>(&self, w: &mut W) -> Result<(), W::Error> {
        w.write_str("/v1/feeds/")?;
        match *self {
            Resource::Stream { feed, stream } | Resource::Values { feed, stream } => {
                write_encoded(w, feed)?;
                w.write_str("/streams/")?;
                write_encoded(w, stream)?;
                if let Resource::Values { .. } = self {
                    w.write_str("/values")?;
                }
                Ok(())
            }
            Resource::Location { feed } => {
                write_encoded(w, feed)?;
                w.write_str("/location")
            }
        }
    }
}

/// Request writer over the connection
struct Wire<'w, C>(&'w mut C);

impl<C: Write> uWrite for Wire<'_, C> {
    type Error = M2xError;

    fn write_str(&mut self, s: &str) -> Result<(), M2xError> {
        self.0.write_all(s.as_bytes()).map_err(M2xError::io)
    }
}

/// `core::fmt` view of a ufmt writer, for `Display` values
struct Fmt<'w, W>(&'w mut W);

impl<W: uWrite> fmt::Write for Fmt<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s).map_err(|_| fmt::Error)
    }
}

/// Counts bytes instead of writing them
#[derive(Default)]
struct Counter(usize);

impl fmt::Write for Counter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Escapes the inside of a JSON string
struct JsonEscape<'w, W>(&'w mut W);

impl<W: fmt::Write> fmt::Write for JsonEscape<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        use fmt::Write as _;
        let mut start = 0;
        for (i, c) in s.char_indices() {
            let escape = match c {
                '"' => "\\\"",
                '\\' => "\\\\",
                '\n' => "\\n",
                '\r' => "\\r",
                '\t' => "\\t",
                c if c.is_ascii_control() && c != '\u{7f}' => "",
                _ => continue,
            };
            self.0.write_str(&s[start..i])?;
            if escape.is_empty() {
                write!(self.0, "\\u{:04x}", c as u32)?;
            } else {
                self.0.write_str(escape)?;
            }
            start = i + c.len_utf8();
        }
        self.0.write_str(&s[start..])
    }
}

fn json_string<W: fmt::Write, V: fmt::Display + ?Sized>(w: &mut W, value: &V) -> fmt::Result {
    use fmt::Write as _;
    w.write_char('"')?;
    write!(JsonEscape(w), "{}", value)?;
    w.write_char('"')
}

fn value_body<W: fmt::Write, V: fmt::Display + ?Sized>(w: &mut W, value: &V) -> fmt::Result {
    w.write_str("{\"value\": ")?;
    json_string(w, value)?;
    w.write_str("}")
}

fn location_body<W: fmt::Write, T: fmt::Display>(
    w: &mut W,
    name: &str,
    latitude: &T,
    longitude: &T,
    elevation: &T,
) -> fmt::Result {
    w.write_str("{\"name\": ")?;
    json_string(w, name)?;
    w.write_str(", \"latitude\": ")?;
    json_string(w, latitude)?;
    w.write_str(", \"longitude\": ")?;
    json_string(w, longitude)?;
    w.write_str(", \"elevation\": ")?;
    json_string(w, elevation)?;
    w.write_str("}")
}

fn body_len(body: impl FnOnce(&mut Counter) -> fmt::Result) -> Result<usize, M2xError> {
    let mut counter = Counter::default();
    body(&mut counter).map_err(|_| M2xError::Invalid)?;
    Ok(counter.0)
}

impl<'a, C, D> M2xClient<'a, C, D>
where
    C: Connection,
    D: DelayMs<u32>,
{
    /// A client that authenticates with `key`
    pub fn new(conn: C, delay: D, key: &'a str, config: ClientConfig<'a>) -> Self {
        M2xClient {
            conn,
            delay,
            key,
            config,
        }
    }

    /// Settings in use
    pub fn config(&self) -> &ClientConfig<'a> {
        &self.config
    }

    /// Give back the connection and delay
    pub fn release(self) -> (C, D) {
        (self.conn, self.delay)
    }

    /// Post one value to a stream. Returns the HTTP status.
    pub fn send<V>(&mut self, feed: &str, stream: &str, value: &V) -> Result<u16, M2xError>
    where
        V: fmt::Display + ?Sized,
    {
        let len = body_len(|w| value_body(w, value))?;
        self.open()?;
        let result = self.put(Resource::Stream { feed, stream }, len, |w| value_body(w, value));
        self.close();
        result
    }

    /// Set the current location of a feed. Returns the HTTP status.
    pub fn update_location<T: fmt::Display>(
        &mut self,
        feed: &str,
        name: &str,
        latitude: T,
        longitude: T,
        elevation: T,
    ) -> Result<u16, M2xError> {
        let (lat, lon, elev) = (&latitude, &longitude, &elevation);
        let len = body_len(|w| location_body(w, name, lat, lon, elev))?;
        self.open()?;
        let result = self.put(Resource::Location { feed }, len, |w| {
            location_body(w, name, lat, lon, elev)
        });
        self.close();
        result
    }

    /// Read values of a stream, oldest first as the server orders them.
    ///
    /// `f` is called with each value and its index, only on a 2xx status.
    /// Returns the HTTP status.
    pub fn fetch_values<F>(
        &mut self,
        feed: &str,
        stream: &str,
        query: &ValuesQuery<'_>,
        f: F,
    ) -> Result<u16, M2xError>
    where
        F: FnMut(&StreamValue<'_>, usize),
    {
        self.open()?;
        let result = self
            .get(Resource::Values { feed, stream }, Some(query))
            .and_then(|status| {
                self.read_body(status, |body| for_each_value(body, f).map(|_| ()))
            });
        self.close();
        result
    }

    /// Read the location history of a feed.
    ///
    /// `f` is called with each waypoint and its index, only on a 2xx status.
    /// Returns the HTTP status.
    pub fn read_location<F>(&mut self, feed: &str, f: F) -> Result<u16, M2xError>
    where
        F: FnMut(&Waypoint<'_>, usize),
    {
        self.open()?;
        let result = self
            .get(Resource::Location { feed }, None)
            .and_then(|status| {
                self.read_body(status, |body| for_each_waypoint(body, f).map(|_| ()))
            });
        self.close();
        result
    }

    /// Flush and drop the connection
    pub fn close(&mut self) {
        let _ = self.conn.flush();
        self.conn.stop();
    }

    fn open(&mut self) -> Result<(), M2xError> {
        let ClientConfig { host, port, .. } = self.config;
        self.conn
            .connect(host, port)
            .map_err(|_| M2xError::NoConnection)
    }

    fn reader(&mut self) -> ResponseReader<'_, C, D> {
        ResponseReader::new(
            &mut self.conn,
            &mut self.delay,
            self.config.case_insensitive,
            self.config.max_idle_polls,
        )
    }

    fn put(
        &mut self,
        resource: Resource<'_>,
        len: usize,
        body: impl FnOnce(&mut Fmt<'_, Wire<'_, C>>) -> fmt::Result,
    ) -> Result<u16, M2xError> {
        let mut w = Wire(&mut self.conn);
        w.write_str("PUT ")?;
        resource.write(&mut w)?;
        w.write_str(" HTTP/1.0\r\n")?;
        write_header(&mut w, self.key, &self.config, Some(len))?;
        body(&mut Fmt(&mut w)).map_err(|_| M2xError::Io)?;
        self.conn.flush().map_err(M2xError::io)?;
        self.reader().status_code()
    }

    fn get(&mut self, resource: Resource<'_>, query: Option<&ValuesQuery<'_>>) -> Result<u16, M2xError> {
        let mut w = Wire(&mut self.conn);
        w.write_str("GET ")?;
        resource.write(&mut w)?;
        if let Some(q) = query {
            write_query(&mut w, q)?;
        }
        w.write_str(" HTTP/1.0\r\n")?;
        write_header(&mut w, self.key, &self.config, None)?;
        self.conn.flush().map_err(M2xError::io)?;
        self.reader().status_code()
    }

    fn read_body(
        &mut self,
        status: u16,
        parse: impl FnOnce(&[u8]) -> Result<(), M2xError>,
    ) -> Result<u16, M2xError> {
        if !(200..300).contains(&status) {
            return Ok(status);
        }
        let mut buf = [0_u8; MAX_BODY_LEN];
        let mut r = self.reader();
        let len = r.content_length()?;
        r.skip_header()?;
        let body = r.body(len, &mut buf)?;
        parse(body)?;
        Ok(status)
    }
}

fn write_query<W: uWrite + ?Sized>(w: &mut W, q: &ValuesQuery<'_>) -> Result<(), W::Error> {
    let mut sep = '?';
    for (name, value) in [("start", q.start), ("end", q.end)] {
        if let Some(v) = value {
            w.write_char(sep)?;
            w.write_str(name)?;
            w.write_char('=')?;
            write_encoded(w, v)?;
            sep = '&';
        }
    }
    if let Some(limit) = q.limit {
        w.write_char(sep)?;
        uwrite!(w, "limit={}", limit)?;
    }
    Ok(())
}

fn write_header<W: uWrite + ?Sized>(
    w: &mut W,
    key: &str,
    config: &ClientConfig<'_>,
    content_length: Option<usize>,
) -> Result<(), W::Error> {
    w.write_str(USER_AGENT)?;
    uwrite!(w, "\r\nX-M2X-KEY: {}\r\nHost: ", key)?;
    write_encoded(w, config.host)?;
    if config.port != super::DEFAULT_PORT {
        uwrite!(w, ":{}", config.port)?;
    }
    w.write_str("\r\n")?;
    if let Some(len) = content_length {
        uwrite!(w, "Content-Type: application/json\r\nContent-Length: {}\r\n", len)?;
    }
    w.write_str("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::m2x::testing::{CountingDelay, ScriptedConnection};
    use crate::m2x::DEFAULT_HOST;

    fn client(
        conn: ScriptedConnection,
        config: ClientConfig<'static>,
    ) -> M2xClient<'static, ScriptedConnection, CountingDelay> {
        M2xClient::new(conn, CountingDelay::default(), "secret", config)
    }

    #[test]
    fn send_writes_exact_request() {
        let conn = ScriptedConnection::responding(b"HTTP/1.1 202 Accepted\r\n\r\n");
        let mut c = client(conn, ClientConfig::default());
        assert_eq!(c.send("feed1", "temperature", &42), Ok(202));
        let (conn, _) = c.release();
        assert_eq!(
            conn.sent(),
            "PUT /v1/feeds/feed1/streams/temperature HTTP/1.0\r\n\
             User-Agent: M2X TM4C1294 Client/0.1\r\n\
             X-M2X-KEY: secret\r\n\
             Host: api-m2x.att.com\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 15\r\n\
             \r\n\
             {\"value\": \"42\"}"
        );
        assert_eq!(conn.connects, [(DEFAULT_HOST.to_string(), 80)]);
        assert_eq!(conn.stops, 1);
        assert!(conn.flushes >= 1);
    }

    #[test]
    fn odd_port_and_escaped_names() {
        let conn = ScriptedConnection::responding(b"HTTP/1.0 204 No Content\r\n");
        let config = ClientConfig {
            host: "192.168.1.10",
            port: 8080,
            ..Default::default()
        };
        let mut c = client(conn, config);
        assert_eq!(c.send("my feed", "a/b", "say \"hi\""), Ok(204));
        let (conn, _) = c.release();
        let sent = conn.sent();
        assert!(sent.starts_with("PUT /v1/feeds/my%20feed/streams/a%2Fb HTTP/1.0\r\n"));
        assert!(sent.contains("\r\nHost: 192.168.1.10:8080\r\n"));
        assert!(sent.ends_with("{\"value\": \"say \\\"hi\\\"\"}"));
        let body = "{\"value\": \"say \\\"hi\\\"\"}";
        assert!(sent.contains(&format!("Content-Length: {}\r\n", body.len())));
    }

    #[test]
    fn non_ascii_names_and_control_characters() {
        let conn = ScriptedConnection::responding(b"HTTP/1.0 202 Accepted\r\n");
        let mut c = client(conn, ClientConfig::default());
        assert_eq!(c.send("f", "température", "a\u{1}b"), Ok(202));
        let (conn, _) = c.release();
        let sent = conn.sent();
        assert!(sent.starts_with("PUT /v1/feeds/f/streams/temp%C3%A9rature HTTP/1.0\r\n"));
        assert!(sent.contains("Content-Length: 21\r\n"));
        assert!(sent.ends_with("{\"value\": \"a\\u0001b\"}"));
    }

    #[test]
    fn location_update_body() {
        let conn = ScriptedConnection::responding(b"HTTP/1.0 202 Accepted\r\n");
        let mut c = client(conn, ClientConfig::default());
        assert_eq!(c.update_location("f", "Lab", 47.5, -122.25, 10.0), Ok(202));
        let (conn, _) = c.release();
        let sent = conn.sent();
        assert!(sent.starts_with("PUT /v1/feeds/f/location HTTP/1.0\r\n"));
        assert!(sent.ends_with(
            "{\"name\": \"Lab\", \"latitude\": \"47.5\", \"longitude\": \"-122.25\", \"elevation\": \"10\"}"
        ));
    }

    #[test]
    fn refused_connection() {
        let mut c = client(ScriptedConnection::refusing(), ClientConfig::default());
        assert_eq!(c.send("f", "s", "1"), Err(M2xError::NoConnection));
        let (conn, _) = c.release();
        assert!(conn.outgoing.is_empty());
    }

    #[test]
    fn fetch_values_with_query() {
        let body = r#"{"values":[{"at":"t0","value":"1"},{"at":"t1","value":"2"}]}"#;
        let response = format!(
            "HTTP/1.0 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let conn = ScriptedConnection::responding(response.as_bytes());
        let mut c = client(conn, ClientConfig::default());
        let query = ValuesQuery {
            start: Some("2014-01-01T00:00:00Z"),
            end: None,
            limit: Some(2),
        };
        let mut seen = Vec::new();
        let status = c.fetch_values("f", "s", &query, |v, i| {
            seen.push((i, v.at.to_string(), v.value.to_string()))
        });
        assert_eq!(status, Ok(200));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (1, "t1".to_string(), "2".to_string()));
        let (conn, _) = c.release();
        assert!(conn.sent().starts_with(
            "GET /v1/feeds/f/streams/s/values?start=2014-01-01T00%3A00%3A00Z&limit=2 HTTP/1.0\r\n"
        ));
        assert!(!conn.sent().contains("Content-Length"));
        assert_eq!(conn.stops, 1);
    }

    #[test]
    fn error_status_skips_body() {
        let conn = ScriptedConnection::responding(b"HTTP/1.0 404 Not Found\r\nContent-Length: 9\r\n\r\nnot json!");
        let mut c = client(conn, ClientConfig::default());
        let mut calls = 0;
        assert_eq!(c.fetch_values("f", "s", &ValuesQuery::default(), |_, _| calls += 1), Ok(404));
        assert_eq!(calls, 0);
    }

    #[test]
    fn read_location_reports_waypoints() {
        let body = r#"{"name":"Home","waypoints":[{"timestamp":"t0","latitude":"1.5","longitude":"-2","elevation":"3"}]}"#;
        let response = format!("HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
        let conn = ScriptedConnection::responding(response.as_bytes());
        let mut c = client(conn, ClientConfig::default());
        let mut seen = Vec::new();
        assert_eq!(
            c.read_location("f", |w, i| seen.push((i, w.name.to_string(), w.latitude, w.longitude))),
            Ok(200)
        );
        assert_eq!(seen, [(0, "Home".to_string(), 1.5, -2.0)]);
    }

    #[test]
    fn oversized_body_is_rejected_and_closed() {
        let response = format!("HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n", MAX_BODY_LEN + 1);
        let conn = ScriptedConnection::responding(response.as_bytes());
        let mut c = client(conn, ClientConfig::default());
        assert_eq!(
            c.read_location("f", |_, _| ()),
            Err(M2xError::ResponseTooLarge)
        );
        let (conn, _) = c.release();
        assert_eq!(conn.stops, 1);
    }

    #[test]
    fn server_hangs_up_before_status() {
        let conn = ScriptedConnection::responding(b"HTT");
        let mut c = client(conn, ClientConfig::default());
        assert_eq!(c.send("f", "s", "1"), Err(M2xError::Disconnected));
        let (conn, delay) = c.release();
        assert_eq!(conn.stops, 1);
        assert_eq!(delay.calls, 0);
    }
}
