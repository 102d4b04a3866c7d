//! Response bodies of the values and location endpoints

use core::fmt;
use core::marker::PhantomData;

use heapless::Vec;
use serde::de::{Deserialize, Deserializer, SeqAccess, Visitor};

use super::{M2xError, MAX_ITEMS};

/// One timestamped value of a stream
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamValue<'a> {
    /// ISO 8601 timestamp
    pub at: &'a str,
    /// Value as the server stores it
    pub value: &'a str,
}

/// One point of a location history
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint<'a> {
    /// Name of the location the point belongs to
    pub name: &'a str,
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
    /// Metres
    pub elevation: f64,
    /// ISO 8601 timestamp
    pub timestamp: &'a str,
}

#[derive(serde::Deserialize)]
struct ValuesBody<'a> {
    #[serde(borrow, deserialize_with = "first_items")]
    values: Vec<RawValue<'a>, MAX_ITEMS>,
}

#[derive(serde::Deserialize)]
struct RawValue<'a> {
    at: &'a str,
    value: &'a str,
}

#[derive(serde::Deserialize)]
struct LocationBody<'a> {
    #[serde(borrow, default)]
    name: Option<&'a str>,
    #[serde(borrow, default, deserialize_with = "first_items")]
    waypoints: Vec<RawWaypoint<'a>, MAX_ITEMS>,
}

#[derive(serde::Deserialize)]
struct RawWaypoint<'a> {
    timestamp: &'a str,
    latitude: &'a str,
    longitude: &'a str,
    elevation: &'a str,
}

/// Keep the first `N` elements of an array and skip the rest
fn first_items<'de, D, T, const N: usize>(deserializer: D) -> Result<Vec<T, N>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct Bounded<T, const N: usize>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>, const N: usize> Visitor<'de> for Bounded<T, N> {
        type Value = Vec<T, N>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an array")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some(item) = seq.next_element::<T>()? {
                // Full; the rest is parsed and dropped
                let _ = out.push(item);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_seq(Bounded(PhantomData))
}

fn coordinate(s: &str) -> Result<f64, M2xError> {
    s.trim().parse().map_err(|_| M2xError::JsonInvalid)
}

/// Call `f` for each value in a values response
pub(crate) fn for_each_value<F>(body: &[u8], mut f: F) -> Result<usize, M2xError>
where
    F: FnMut(&StreamValue<'_>, usize),
{
    let (parsed, _) = serde_json_core::from_slice::<ValuesBody<'_>>(body)
        .map_err(|_| M2xError::JsonInvalid)?;
    for (i, raw) in parsed.values.iter().enumerate() {
        let value = StreamValue {
            at: raw.at,
            value: raw.value,
        };
        f(&value, i);
    }
    Ok(parsed.values.len())
}

/// Call `f` for each waypoint in a location response.
///
/// All coordinates are checked before the first call.
pub(crate) fn for_each_waypoint<F>(body: &[u8], mut f: F) -> Result<usize, M2xError>
where
    F: FnMut(&Waypoint<'_>, usize),
{
    let (parsed, _) = serde_json_core::from_slice::<LocationBody<'_>>(body)
        .map_err(|_| M2xError::JsonInvalid)?;
    let name = parsed.name.unwrap_or("");

    let mut points: Vec<Waypoint<'_>, MAX_ITEMS> = Vec::new();
    for raw in &parsed.waypoints {
        let point = Waypoint {
            name,
            latitude: coordinate(raw.latitude)?,
            longitude: coordinate(raw.longitude)?,
            elevation: coordinate(raw.elevation)?,
            timestamp: raw.timestamp,
        };
        let _ = points.push(point);
    }
    for (i, p) in points.iter().enumerate() {
        f(p, i);
    }
    Ok(points.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_in_order() {
        let body = br#"{"start":"2014-01-01T00:00:00Z","limit":"2","values":[
            {"at":"2014-01-01T00:00:01Z","value":"21"},
            {"at":"2014-01-01T00:00:02Z","value":"22.5"}]}"#;
        let mut seen = std::vec::Vec::new();
        let n = for_each_value(body, |v, i| seen.push((i, v.at.to_string(), v.value.to_string())))
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen[0], (0, "2014-01-01T00:00:01Z".into(), "21".into()));
        assert_eq!(seen[1].2, "22.5");
    }

    #[test]
    fn values_are_capped() {
        let mut body = std::string::String::from(r#"{"values":["#);
        for i in 0..20 {
            if i > 0 {
                body.push(',');
            }
            body.push_str(&format!(r#"{{"at":"t{i}","value":"{i}"}}"#));
        }
        body.push_str("]}");
        let mut last = None;
        let n = for_each_value(body.as_bytes(), |v, _| last = Some(v.value.to_string())).unwrap();
        assert_eq!(n, MAX_ITEMS);
        assert_eq!(last.as_deref(), Some("15"));
    }

    #[test]
    fn waypoints_take_location_name() {
        let body = br#"{"name":"Lab","latitude":"1","longitude":"2","elevation":"3",
            "timestamp":"now","waypoints":[
            {"timestamp":"t0","latitude":"47.6097","longitude":"-122.3331","elevation":"56"},
            {"timestamp":"t1","latitude":"47.61","longitude":"-122.33","elevation":"57.5"}]}"#;
        let mut seen = std::vec::Vec::new();
        let n = for_each_waypoint(body, |w, i| {
            seen.push((i, w.name.to_string(), w.latitude, w.longitude, w.elevation))
        })
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen[0], (0, "Lab".into(), 47.6097, -122.3331, 56.0));
        assert_eq!(seen[1].4, 57.5);
    }

    #[test]
    fn bad_coordinate_reports_nothing() {
        let body = br#"{"name":"Lab","waypoints":[
            {"timestamp":"t0","latitude":"1","longitude":"2","elevation":"3"},
            {"timestamp":"t1","latitude":"north","longitude":"2","elevation":"3"}]}"#;
        let mut calls = 0;
        assert_eq!(
            for_each_waypoint(body, |_, _| calls += 1),
            Err(M2xError::JsonInvalid)
        );
        assert_eq!(calls, 0);
    }

    #[test]
    fn malformed_bodies() {
        assert_eq!(for_each_value(b"{\"values\":", |_, _| ()), Err(M2xError::JsonInvalid));
        assert_eq!(for_each_value(b"[]", |_, _| ()), Err(M2xError::JsonInvalid));
    }
}
