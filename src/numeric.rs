//! Typed view of a [`Reading`].
//!
//! Kept apart from the parser: a `Reading` always holds the sensor text
//! as sent, converting it is opt-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::reading::{Field, Reading};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Field {field} is not numeric: {text:?}")]
pub struct ConversionError {
    pub field: Field,
    pub text: String,
}

/// Reading with numeric columns
///
/// Blank or missing columns are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericReading {
    pub satellites: Option<u8>,
    /// Degrees, negative south
    pub latitude: Option<f64>,
    /// Degrees, negative west
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

fn convert<T: FromStr>(field: Field, text: Option<&str>) -> Result<Option<T>, ConversionError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(|_| ConversionError {
            field,
            text: text.to_owned(),
        }),
    }
}

impl TryFrom<&Reading> for NumericReading {
    type Error = ConversionError;

    fn try_from(value: &Reading) -> Result<Self, Self::Error> {
        Ok(Self {
            satellites: convert(Field::Satellites, Some(value.satellites()))?,
            latitude: convert(Field::Latitude, value.latitude())?,
            longitude: convert(Field::Longitude, value.longitude())?,
            altitude: convert(Field::Altitude, value.altitude())?,
            speed: convert(Field::Speed, value.speed())?,
            course: convert(Field::Course, value.course())?,
            timestamp: value.timestamp(),
            humidity: convert(Field::Humidity, value.humidity())?,
            temperature: convert(Field::Temperature, value.temperature())?,
        })
    }
}
