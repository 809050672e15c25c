//! Sensor readings and the field-count driven line schema.
//!
//! A line looks like
//! `satellites,latitude,longitude,altitude,speed,course,timestamp[,humidity,temperature]`.
//! Values stay text; see [`crate::numeric`] for typed values.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Satellite count reported while the sensor has sent nothing yet.
pub const SATELLITES_SENTINEL: &str = "0";

/// Fields of a complete base line (satellites .. timestamp).
pub const BASE_FIELD_COUNT: usize = 7;

/// Fields of a line carrying humidity and temperature as well.
pub const EXTENDED_FIELD_COUNT: usize = 9;

/// Offset appended to the sensor's local date-time before parsing.
pub const UTC_OFFSET: &str = "+00:00";

/// Length of `YYYY-MM-DDTHH:MM:SS`.
const TIMESTAMP_LEN: usize = 19;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";
const TIMESTAMP_FORMAT_SPACE: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Sensor line columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Satellites,
    Latitude,
    Longitude,
    Altitude,
    Speed,
    Course,
    Timestamp,
    Humidity,
    Temperature,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Satellites => "satellites",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Altitude => "altitude",
            Self::Speed => "speed",
            Self::Course => "course",
            Self::Timestamp => "timestamp",
            Self::Humidity => "humidity",
            Self::Temperature => "temperature",
        })
    }
}

/// Which line layout introduces a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Base,
    Extended,
}

/// Column layout, indexed by position in the line.
pub const SCHEMA: [(Field, Tier); EXTENDED_FIELD_COUNT] = [
    (Field::Satellites, Tier::Base),
    (Field::Latitude, Tier::Base),
    (Field::Longitude, Tier::Base),
    (Field::Altitude, Tier::Base),
    (Field::Speed, Tier::Base),
    (Field::Course, Tier::Base),
    (Field::Timestamp, Tier::Base),
    (Field::Humidity, Tier::Extended),
    (Field::Temperature, Tier::Extended),
];

/// Layout of a line, judged by field count alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// No fields, the sensor has not produced data yet
    Empty,
    /// 1 to 6 fields
    Partial,
    /// 7 or 8 fields
    Base,
    /// 9 fields or more
    Extended,
}

impl Schema {
    pub fn classify(field_count: usize) -> Self {
        match field_count {
            0 => Self::Empty,
            n if n < BASE_FIELD_COUNT => Self::Partial,
            n if n < EXTENDED_FIELD_COUNT => Self::Base,
            _ => Self::Extended,
        }
    }

    /// Whether columns of `tier` are taken from a line of this layout.
    pub fn admits(&self, tier: Tier) -> bool {
        match (self, tier) {
            (Self::Empty, _) => false,
            (Self::Partial | Self::Base, Tier::Base) => true,
            (Self::Partial | Self::Base, Tier::Extended) => false,
            (Self::Extended, _) => true,
        }
    }
}

/// The line had fewer fields than a base line.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Partial sensor data: {found} of {expected} fields")]
pub struct PartialDataError {
    pub found: usize,
    pub expected: usize,
}

/// The timestamp column could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormatError {
    /// Normal until the sensor has a time fix.
    #[error("Timestamp field is empty")]
    Empty,
    #[error("Invalid timestamp {text:?}: {source}")]
    Malformed {
        text: String,
        #[source]
        source: MalformedTimestamp,
    },
}

/// Why a timestamp was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTimestamp {
    #[error("expected YYYY-MM-DDTHH:MM:SS[.fraction]")]
    Layout,
    #[error("leap second")]
    LeapSecond,
    #[error(transparent)]
    Value(#[from] chrono::ParseError),
}

/// Non-fatal findings from parsing one line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error(transparent)]
    PartialData(#[from] PartialDataError),
    #[error(transparent)]
    TimestampFormat(#[from] TimestampFormatError),
}

/// One sensor poll.
///
/// Holds exactly what one line provided. Columns missing from the line are
/// `None`, except the satellite count which falls back to
/// [`SATELLITES_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    satellites: String,
    latitude: Option<String>,
    longitude: Option<String>,
    altitude: Option<String>,
    speed: Option<String>,
    course: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    humidity: Option<String>,
    temperature: Option<String>,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            satellites: String::from(SATELLITES_SENTINEL),
            latitude: None,
            longitude: None,
            altitude: None,
            speed: None,
            course: None,
            timestamp: None,
            humidity: None,
            temperature: None,
        }
    }
}

impl Reading {
    /// Parse a line's fields, dropping the diagnostics.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        parse(fields).reading
    }

    pub fn satellites(&self) -> &str {
        &self.satellites
    }

    pub fn latitude(&self) -> Option<&str> {
        self.latitude.as_deref()
    }

    pub fn longitude(&self) -> Option<&str> {
        self.longitude.as_deref()
    }

    pub fn altitude(&self) -> Option<&str> {
        self.altitude.as_deref()
    }

    pub fn speed(&self) -> Option<&str> {
        self.speed.as_deref()
    }

    pub fn course(&self) -> Option<&str> {
        self.course.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn humidity(&self) -> Option<&str> {
        self.humidity.as_deref()
    }

    pub fn temperature(&self) -> Option<&str> {
        self.temperature.as_deref()
    }

    /// Raw text of an optional text column.
    ///
    /// `None` for [`Field::Satellites`] and [`Field::Timestamp`], which are
    /// not optional text.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Latitude => self.latitude(),
            Field::Longitude => self.longitude(),
            Field::Altitude => self.altitude(),
            Field::Speed => self.speed(),
            Field::Course => self.course(),
            Field::Humidity => self.humidity(),
            Field::Temperature => self.temperature(),
            Field::Satellites | Field::Timestamp => None,
        }
    }

    fn text_slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::Latitude => Some(&mut self.latitude),
            Field::Longitude => Some(&mut self.longitude),
            Field::Altitude => Some(&mut self.altitude),
            Field::Speed => Some(&mut self.speed),
            Field::Course => Some(&mut self.course),
            Field::Humidity => Some(&mut self.humidity),
            Field::Temperature => Some(&mut self.temperature),
            Field::Satellites | Field::Timestamp => None,
        }
    }
}

struct Opt<'a>(Option<&'a str>);

impl fmt::Display for Opt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.unwrap_or("---"))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self.timestamp.map(|ts| ts.to_rfc3339());
        if f.alternate() {
            writeln!(f, "number of satellites: {}", self.satellites)?;
            writeln!(f, "lat: {}", Opt(self.latitude()))?;
            writeln!(f, "lon: {}", Opt(self.longitude()))?;
            writeln!(f, "alt: {}", Opt(self.altitude()))?;
            writeln!(f, "speed: {}", Opt(self.speed()))?;
            writeln!(f, "course: {}", Opt(self.course()))?;
            if self.humidity.is_some() || self.temperature.is_some() {
                writeln!(f, "humidity: {}", Opt(self.humidity()))?;
                writeln!(f, "temperature: {}", Opt(self.temperature()))?;
            }
            write!(f, "datetime: {}", Opt(timestamp.as_deref()))
        } else {
            write!(
                f,
                "sats={} lat={} lon={} alt={} speed={} course={} time={}",
                self.satellites,
                Opt(self.latitude()),
                Opt(self.longitude()),
                Opt(self.altitude()),
                Opt(self.speed()),
                Opt(self.course()),
                Opt(timestamp.as_deref()),
            )?;
            if self.humidity.is_some() || self.temperature.is_some() {
                write!(
                    f,
                    " hum={} temp={}",
                    Opt(self.humidity()),
                    Opt(self.temperature())
                )?;
            }
            Ok(())
        }
    }
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub reading: Reading,
    pub diagnostics: Vec<Diagnostic>,
}

/// Check the fixed-width `YYYY-MM-DD[T ]HH:MM:SS[.digits]` layout.
///
/// chrono on its own accepts unpadded numbers and embedded whitespace.
fn has_timestamp_layout(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < TIMESTAMP_LEN {
        return false;
    }
    let (head, tail) = bytes.split_at(TIMESTAMP_LEN);
    let head_ok = head.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T' || *b == b' ',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    });
    let fraction_ok = match tail.split_first() {
        None => true,
        Some((b'.', digits)) => !digits.is_empty() && digits.iter().all(u8::is_ascii_digit),
        Some(_) => false,
    };
    head_ok && fraction_ok
}

/// Parse the timestamp column.
///
/// The sensor sends local ISO-8601 date-times without offset, so
/// [`UTC_OFFSET`] is appended first. Fractional seconds and a space
/// instead of `T` are accepted. Anything else, including second 60,
/// is [`TimestampFormatError::Malformed`].
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TimestampFormatError> {
    if text.is_empty() {
        return Err(TimestampFormatError::Empty);
    }
    let malformed = |source: MalformedTimestamp| TimestampFormatError::Malformed {
        text: text.to_owned(),
        source,
    };
    if !has_timestamp_layout(text) {
        return Err(malformed(MalformedTimestamp::Layout));
    }
    let format = if text.as_bytes()[10] == b' ' {
        TIMESTAMP_FORMAT_SPACE
    } else {
        TIMESTAMP_FORMAT
    };
    let ts = DateTime::parse_from_str(&format!("{}{}", text, UTC_OFFSET), format)
        .map_err(|e| malformed(e.into()))?;
    // chrono keeps a leap second as nanoseconds past 1_000_000_000
    if ts.nanosecond() >= 1_000_000_000 {
        return Err(malformed(MalformedTimestamp::LeapSecond));
    }
    Ok(ts.with_timezone(&Utc))
}

/// Build a [`Reading`] from the fields of one line.
///
/// Never fails. Short lines fill what they have, an unusable timestamp
/// is left unset; both are noted in [`Parsed::diagnostics`].
pub fn parse<S: AsRef<str>>(fields: &[S]) -> Parsed {
    let schema = Schema::classify(fields.len());
    let mut reading = Reading::default();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    if schema == Schema::Partial {
        let err = PartialDataError {
            found: fields.len(),
            expected: BASE_FIELD_COUNT,
        };
        info!(found = err.found, expected = err.expected, "{}", err);
        diagnostics.push(err.into());
    }

    for ((field, tier), text) in SCHEMA.iter().zip(fields) {
        if !schema.admits(*tier) {
            continue;
        }
        let text: &str = text.as_ref();
        match field {
            Field::Satellites => reading.satellites = text.to_owned(),
            Field::Timestamp => match parse_timestamp(text) {
                Ok(ts) => reading.timestamp = Some(ts),
                Err(err @ TimestampFormatError::Empty) => {
                    trace!("{}", err);
                    diagnostics.push(err.into());
                }
                Err(err) => {
                    debug!("{}", err);
                    diagnostics.push(err.into());
                }
            },
            other => {
                if let Some(slot) = reading.text_slot(*other) {
                    *slot = Some(text.to_owned());
                }
            }
        }
    }

    debug!(
        ?schema,
        fields = fields.len(),
        satellites = %reading.satellites,
        latitude = ?reading.latitude,
        longitude = ?reading.longitude,
        altitude = ?reading.altitude,
        speed = ?reading.speed,
        course = ?reading.course,
        timestamp = ?reading.timestamp,
        humidity = ?reading.humidity,
        temperature = ?reading.temperature,
        diagnostics = diagnostics.len(),
        "Parsed sensor reading"
    );

    Parsed {
        reading,
        diagnostics,
    }
}
