//! In-memory streams and locations, keyed by feed

use std::collections::HashMap;

use serde::Serialize;

/// One stored stream value
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredValue {
    /// RFC 3339 time of arrival
    pub at: String,
    /// Value as text, the way the API reports it
    pub value: String,
}

/// One location update
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredWaypoint {
    pub timestamp: String,
    pub latitude: String,
    pub longitude: String,
    pub elevation: String,
}

/// Current location of a feed with its history, newest first
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredLocation {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    pub elevation: String,
    pub timestamp: String,
    pub waypoints: Vec<StoredWaypoint>,
}

/// Which values a read returns
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueFilter {
    /// Earliest `at`, inclusive
    pub start: Option<String>,
    /// Latest `at`, inclusive
    pub end: Option<String>,
    /// Keep only the newest this many
    pub limit: Option<usize>,
}

/// Values kept per stream, and waypoints per location, by default
pub const HISTORY_LIMIT: usize = 1000;

#[derive(Debug)]
pub struct Store {
    history: usize,
    streams: HashMap<(String, String), Vec<StoredValue>>,
    locations: HashMap<String, StoredLocation>,
}

impl Default for Store {
    fn default() -> Self {
        Store::with_history(HISTORY_LIMIT)
    }
}

impl Store {
    /// Keep at most `history` values per stream and waypoints per feed,
    /// dropping the oldest
    pub fn with_history(history: usize) -> Self {
        Store {
            history: history.max(1),
            streams: HashMap::new(),
            locations: HashMap::new(),
        }
    }

    pub fn push_value(&mut self, feed: &str, stream: &str, value: StoredValue) {
        let values = self
            .streams
            .entry((feed.to_string(), stream.to_string()))
            .or_default();
        values.push(value);
        if values.len() > self.history {
            let excess = values.len() - self.history;
            values.drain(..excess);
        }
    }

    /// Values of a stream in arrival order, or `None` for a stream that was
    /// never written
    pub fn values(&self, feed: &str, stream: &str, filter: &ValueFilter) -> Option<Vec<StoredValue>> {
        let all = self.streams.get(&(feed.to_string(), stream.to_string()))?;

        // RFC 3339 UTC timestamps sort as text
        let selected: Vec<StoredValue> = all
            .iter()
            .filter(|v| filter.start.as_deref().map_or(true, |s| v.at.as_str() >= s))
            .filter(|v| filter.end.as_deref().map_or(true, |e| v.at.as_str() <= e))
            .cloned()
            .collect();

        let skip = match filter.limit {
            Some(limit) => selected.len().saturating_sub(limit),
            None => 0,
        };
        Some(selected.into_iter().skip(skip).collect())
    }

    pub fn update_location(&mut self, feed: &str, name: &str, point: StoredWaypoint) {
        let location = self
            .locations
            .entry(feed.to_string())
            .or_insert_with(|| StoredLocation {
                name: String::new(),
                latitude: String::new(),
                longitude: String::new(),
                elevation: String::new(),
                timestamp: String::new(),
                waypoints: Vec::new(),
            });
        location.name = name.to_string();
        location.latitude = point.latitude.clone();
        location.longitude = point.longitude.clone();
        location.elevation = point.elevation.clone();
        location.timestamp = point.timestamp.clone();
        location.waypoints.insert(0, point);
        location.waypoints.truncate(self.history);
    }

    pub fn location(&self, feed: &str) -> Option<&StoredLocation> {
        self.locations.get(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(at: &str, v: &str) -> StoredValue {
        StoredValue {
            at: at.to_string(),
            value: v.to_string(),
        }
    }

    fn filled() -> Store {
        let mut store = Store::default();
        for (i, at) in ["2024-01-01T00:00:01Z", "2024-01-01T00:00:02Z", "2024-01-01T00:00:03Z"]
            .iter()
            .enumerate()
        {
            store.push_value("f", "t", value(at, &i.to_string()));
        }
        store
    }

    #[test]
    fn unknown_stream_is_none() {
        assert_eq!(filled().values("f", "other", &ValueFilter::default()), None);
    }

    #[test]
    fn limit_keeps_newest_in_order() {
        let filter = ValueFilter {
            limit: Some(2),
            ..Default::default()
        };
        let values = filled().values("f", "t", &filter).unwrap();
        let seen: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(seen, ["1", "2"]);
    }

    #[test]
    fn time_window() {
        let filter = ValueFilter {
            start: Some("2024-01-01T00:00:02Z".into()),
            end: Some("2024-01-01T00:00:02Z".into()),
            limit: None,
        };
        let values = filled().values("f", "t", &filter).unwrap();
        assert_eq!(values, [value("2024-01-01T00:00:02Z", "1")]);
    }

    #[test]
    fn history_drops_oldest() {
        let mut store = Store::with_history(2);
        for i in 0..5 {
            store.push_value("f", "t", value(&format!("2024-01-01T00:00:0{}Z", i), &i.to_string()));
            let point = StoredWaypoint {
                timestamp: i.to_string(),
                latitude: "1".into(),
                longitude: "2".into(),
                elevation: "3".into(),
            };
            store.update_location("f", "Lab", point);
        }
        let values = store.values("f", "t", &ValueFilter::default()).unwrap();
        let seen: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(seen, ["3", "4"]);
        let stamps: Vec<&str> = store
            .location("f")
            .unwrap()
            .waypoints
            .iter()
            .map(|w| w.timestamp.as_str())
            .collect();
        assert_eq!(stamps, ["4", "3"]);
    }

    #[test]
    fn location_history_is_newest_first() {
        let mut store = Store::default();
        for (i, ts) in ["t0", "t1"].iter().enumerate() {
            let point = StoredWaypoint {
                timestamp: ts.to_string(),
                latitude: format!("{}", 47 + i),
                longitude: "-122".into(),
                elevation: "10".into(),
            };
            store.update_location("f", "Lab", point);
        }
        let loc = store.location("f").unwrap();
        assert_eq!(loc.latitude, "48");
        assert_eq!(loc.timestamp, "t1");
        assert_eq!(loc.waypoints.len(), 2);
        assert_eq!(loc.waypoints[0].timestamp, "t1");
        assert!(store.location("g").is_none());
    }
}
