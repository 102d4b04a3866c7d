//! Local stand-in for the M2X v1 time-series API.
//!
//! Serves the four endpoints the board's M2X client uses, over plain HTTP:
//!
//! * `PUT /v1/feeds/{feed}/streams/{stream}` stores `{"value": ...}`
//! * `GET /v1/feeds/{feed}/streams/{stream}/values` lists stored values,
//!   honoring `start`, `end` and `limit`
//! * `PUT /v1/feeds/{feed}/location` records a waypoint
//! * `GET /v1/feeds/{feed}/location` returns the location and its history
//!
//! Everything is kept in memory. Values and coordinates are reported as JSON
//! strings, the way the real service does.

use std::convert::Infallible;
use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

mod store;

pub use store::{StoredLocation, StoredValue, StoredWaypoint, Store, ValueFilter};

/// Header carrying the API key
pub const KEY_HEADER: &str = "X-M2X-KEY";

/// Why a request was refused
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("missing or wrong API key")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("reading request: {0}")]
    Body(#[from] hyper::Error),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Unauthorized => StatusCode::UNAUTHORIZED,
            RequestError::NotFound => StatusCode::NOT_FOUND,
            RequestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::Json(_) | RequestError::Invalid(_) | RequestError::Body(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// Resource named by a request path, with segments decoded
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Stream { feed: String, stream: String },
    Values { feed: String, stream: String },
    Location { feed: String },
}

impl Route {
    fn parse(path: &str) -> Option<Route> {
        let rest = path.strip_prefix("/v1/feeds/")?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        match segments.as_slice() {
            [feed, "streams", stream] => Some(Route::Stream {
                feed: percent_decode(feed)?,
                stream: percent_decode(stream)?,
            }),
            [feed, "streams", stream, "values"] => Some(Route::Values {
                feed: percent_decode(feed)?,
                stream: percent_decode(stream)?,
            }),
            [feed, "location"] => Some(Route::Location {
                feed: percent_decode(feed)?,
            }),
            _ => None,
        }
    }
}

/// Undo `%HH` escapes. `None` for a broken escape or non-UTF-8 result.
pub fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn value_filter(query: Option<&str>) -> Result<ValueFilter, RequestError> {
    let mut filter = ValueFilter::default();
    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (name, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode(raw).ok_or(RequestError::Invalid("bad query escape"))?;
        match name {
            "start" => filter.start = Some(value),
            "end" => filter.end = Some(value),
            "limit" => {
                let limit = value
                    .parse()
                    .map_err(|_| RequestError::Invalid("limit must be a number"))?;
                filter.limit = Some(limit);
            }
            _ => {}
        }
    }
    Ok(filter)
}

/// Text form of a JSON string or number
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coordinate(value: &Value) -> Result<String, RequestError> {
    let text = as_text(value).ok_or(RequestError::Invalid("coordinates must be numbers"))?;
    match text.trim().parse::<f64>() {
        Ok(_) => Ok(text),
        Err(_) => Err(RequestError::Invalid("coordinates must be numbers")),
    }
}

#[derive(Deserialize)]
struct ValueBody {
    value: Value,
}

#[derive(Deserialize)]
struct LocationBody {
    #[serde(default)]
    name: Option<String>,
    latitude: Value,
    longitude: Value,
    #[serde(default)]
    elevation: Option<Value>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// The service state: one API key and the stored data
#[derive(Debug, Default)]
pub struct Sink {
    key: String,
    store: Mutex<Store>,
}

impl Sink {
    /// Accept requests carrying `key`. An empty key accepts any key.
    pub fn new(key: impl Into<String>) -> Self {
        Sink {
            key: key.into(),
            store: Mutex::new(Store::default()),
        }
    }

    /// The stored data
    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer one request
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        match self.dispatch(req).await {
            Ok(response) => response,
            Err(e) => json_response(e.status(), &json!({ "message": e.to_string() })),
        }
    }

    fn authorized(&self, req: &Request<Body>) -> bool {
        if self.key.is_empty() {
            return true;
        }
        req.headers()
            .get(KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |k| k == self.key)
    }

    async fn dispatch(&self, req: Request<Body>) -> Result<Response<Body>, RequestError> {
        let route = Route::parse(req.uri().path()).ok_or(RequestError::NotFound)?;
        if !self.authorized(&req) {
            return Err(RequestError::Unauthorized);
        }

        match (req.method().clone(), route) {
            (Method::PUT, Route::Stream { feed, stream }) => {
                let body: ValueBody = read_json(req).await?;
                let value = as_text(&body.value)
                    .ok_or(RequestError::Invalid("value must be a string or number"))?;
                self.store()
                    .push_value(&feed, &stream, StoredValue { at: now(), value });
                Ok(json_response(StatusCode::ACCEPTED, &json!({ "status": "accepted" })))
            }
            (Method::GET, Route::Stream { feed, stream }) => {
                let values = self
                    .store()
                    .values(&feed, &stream, &ValueFilter::default())
                    .ok_or(RequestError::NotFound)?;
                let latest = values.last();
                Ok(json_response(
                    StatusCode::OK,
                    &json!({
                        "name": stream,
                        "value": latest.map(|v| v.value.as_str()),
                        "latest_value_at": latest.map(|v| v.at.as_str()),
                    }),
                ))
            }
            (Method::GET, Route::Values { feed, stream }) => {
                let filter = value_filter(req.uri().query())?;
                let values = self
                    .store()
                    .values(&feed, &stream, &filter)
                    .ok_or(RequestError::NotFound)?;
                let mut body = json!({ "values": values });
                if let Some(limit) = filter.limit {
                    body["limit"] = json!(limit.to_string());
                }
                Ok(json_response(StatusCode::OK, &body))
            }
            (Method::PUT, Route::Location { feed }) => {
                let body: LocationBody = read_json(req).await?;
                let elevation = match &body.elevation {
                    Some(e) => coordinate(e)?,
                    None => "0".to_string(),
                };
                let point = StoredWaypoint {
                    timestamp: now(),
                    latitude: coordinate(&body.latitude)?,
                    longitude: coordinate(&body.longitude)?,
                    elevation,
                };
                self.store()
                    .update_location(&feed, body.name.as_deref().unwrap_or(""), point);
                Ok(json_response(StatusCode::ACCEPTED, &json!({ "status": "accepted" })))
            }
            (Method::GET, Route::Location { feed }) => {
                let store = self.store();
                let location = store.location(&feed).ok_or(RequestError::NotFound)?;
                Ok(json_response(StatusCode::OK, &serde_json::to_value(location)?))
            }
            _ => Err(RequestError::MethodNotAllowed),
        }
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(req: Request<Body>) -> Result<T, RequestError> {
    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Serve `sink` on an already bound listener until the server fails.
///
/// Header names go out in title case, since the board matches
/// `Content-Length` byte for byte. Each request is logged to stdout.
pub async fn run(listener: TcpListener, sink: Arc<Sink>) -> hyper::Result<()> {
    let make_service = make_service_fn(move |_conn| {
        let sink = Arc::clone(&sink);
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let sink = Arc::clone(&sink);
                async move {
                    let method = req.method().clone();
                    let path = req.uri().path().to_string();
                    let response = sink.handle(req).await;
                    println!(
                        "{} {} {} -> {}",
                        Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        method,
                        path,
                        response.status().as_u16()
                    );
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    Server::from_tcp(listener)?
        .http1_title_case_headers(true)
        .serve(make_service)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str, key: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(KEY_HEADER, key)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn routes() {
        assert_eq!(
            Route::parse("/v1/feeds/f%201/streams/temp"),
            Some(Route::Stream {
                feed: "f 1".into(),
                stream: "temp".into()
            })
        );
        assert_eq!(
            Route::parse("/v1/feeds/f/streams/a%2Fb/values"),
            Some(Route::Values {
                feed: "f".into(),
                stream: "a/b".into()
            })
        );
        assert_eq!(
            Route::parse("/v1/feeds/f/location"),
            Some(Route::Location { feed: "f".into() })
        );
        assert_eq!(Route::parse("/v1/feeds//location"), None);
        assert_eq!(Route::parse("/v2/feeds/f/location"), None);
        assert_eq!(Route::parse("/v1/feeds/f%zz/location"), None);
    }

    #[test]
    fn query_values() {
        let filter = value_filter(Some("start=2024-01-01T00%3A00%3A00Z&limit=5&x=1")).unwrap();
        assert_eq!(filter.start.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(filter.limit, Some(5));
        assert_eq!(filter.end, None);
        assert!(value_filter(Some("limit=many")).is_err());
    }

    #[tokio::test]
    async fn put_then_list_values() {
        let sink = Sink::new("k");
        for v in ["20", "21", "22"] {
            let body = format!(r#"{{"value": "{v}"}}"#);
            let response = sink
                .handle(request(Method::PUT, "/v1/feeds/f/streams/temperature", "k", &body))
                .await;
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }
        // Numbers are stored as text too
        let response = sink
            .handle(request(Method::PUT, "/v1/feeds/f/streams/temperature", "k", r#"{"value": 23}"#))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = sink
            .handle(request(
                Method::GET,
                "/v1/feeds/f/streams/temperature/values?limit=2",
                "k",
                "",
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let values = body["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["value"], "22");
        assert_eq!(values[1]["value"], "23");
        assert!(values[1]["at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn location_round_trip() {
        let sink = Sink::new("");
        let body = r#"{"name": "Lab", "latitude": "47.6", "longitude": -122.3, "elevation": "56"}"#;
        let response = sink
            .handle(request(Method::PUT, "/v1/feeds/f/location", "anything", body))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = sink
            .handle(request(Method::GET, "/v1/feeds/f/location", "", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Lab");
        assert_eq!(body["longitude"], "-122.3");
        assert_eq!(body["waypoints"][0]["latitude"], "47.6");
    }

    #[tokio::test]
    async fn refusals() {
        let sink = Sink::new("k");
        let put = |key: &str, body: &str| request(Method::PUT, "/v1/feeds/f/streams/t", key, body);

        assert_eq!(
            sink.handle(put("wrong", r#"{"value": "1"}"#)).await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(sink.handle(put("k", "{not json")).await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            sink.handle(put("k", r#"{"value": [1]}"#)).await.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            sink.handle(request(Method::GET, "/v1/feeds/f/streams/t/values", "k", ""))
                .await
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            sink.handle(request(Method::GET, "/status", "k", "")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            sink.handle(request(Method::DELETE, "/v1/feeds/f/location", "k", ""))
                .await
                .status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        let bad_coordinate = r#"{"name": "x", "latitude": "north", "longitude": "1"}"#;
        assert_eq!(
            sink.handle(request(Method::PUT, "/v1/feeds/f/location", "k", bad_coordinate))
                .await
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
