use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, Serializer};

/// One normalized weather reading for the configured city.
///
/// Field order is the order of the published JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Capture time, ISO-8601 UTC with a `Z` suffix.
    pub timestamp: String,
    /// Capture time in epoch milliseconds, read from a second clock call.
    pub timestamp_ms: i64,
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: i64,
    pub pressure: i64,
    pub description: String,
    pub weather_main: String,
    pub wind_speed: f64,
    pub wind_direction: i64,
    pub visibility: i64,
    pub cloudiness: i64,
    pub sunrise: String,
    pub sunset: String,
    pub coord_lat: f64,
    pub coord_lon: f64,
}

impl Observation {
    /// Encode as the sink payload: `", "` between members, `": "` after keys,
    /// non-ASCII left unescaped.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::with_capacity(512);
        let mut ser = Serializer::with_formatter(&mut buf, SpacedFormatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)
    }
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
