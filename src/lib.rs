//!
//! This library polls a GPS/environmental sensor that prints CSV telemetry
//! lines on a serial port.
//!
//! <br>
//!
//! # Details
//!
//! - Every line is one reading:
//!
//!   `satellites,latitude,longitude,altitude,speed,course,timestamp[,humidity,temperature]`
//!
//!   Values are kept as the text the sensor sent. Short lines give partially
//!   filled readings, an empty or malformed timestamp is left unset.
//!
//! - Basic setup and connection
//!
//!   ```no_run
//!   use gpsctrl::{device::Cycle, Device, SerialConfig};
//!   #[tokio::main]
//!   async fn main() -> gpsctrl::Result<()> {
//!       let mut device = Device::new(&SerialConfig::default())?;
//!       loop {
//!           match device.poll().await? {
//!               Cycle::Reading(parsed) => println!("{:#}", parsed.reading),
//!               Cycle::Undecodable(err) => eprintln!("{}", err),
//!           }
//!       }
//!   }
//!   ```
//!
//! - Parsing without a port
//!
//!   ```
//!   use gpsctrl::{proto::line::Fields, reading};
//!   let fields = Fields::try_from(&b"07,40.7128,-74.0060,10,1.2,45,2024-03-01T12:00:00\n"[..]).unwrap();
//!   let parsed = reading::parse(&fields);
//!   assert_eq!(parsed.reading.latitude(), Some("40.7128"));
//!   ```
//!

use std::time::Duration;

pub mod device;
pub mod numeric;
pub mod poll;
pub mod proto;
pub mod reading;
pub mod report;

pub use device::{Device, SerialConfig};
pub use proto::Result;
pub use reading::Reading;

#[cfg(unix)]
pub const DEFAULT_TTY: &str = "/dev/ttyACM0";
#[cfg(windows)]
pub const DEFAULT_TTY: &str = "COM3";

/// Default baudrate of the sensor.
pub const DEFAULT_BAUDRATE: u32 = 115200;

/// Default time a single line read may block.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
