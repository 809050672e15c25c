use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::{pin::Pin, time::Duration};
use tokio::io::AsyncRead;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::FramedRead;
use tracing::{info, trace};

use super::proto::{
    codec::LineCodec,
    line::{DecodeError, Fields},
    ProtoError,
};
use crate::proto::Result;
use crate::reading::{self, Parsed};
use crate::{DEFAULT_BAUDRATE, DEFAULT_TIMEOUT, DEFAULT_TTY};

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub path: String,
    pub baudrate: u32,
    /// How long a single line read may block
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: String::from(DEFAULT_TTY),
            baudrate: DEFAULT_BAUDRATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    Reading(Parsed),
    /// The line was not text, no reading this cycle.
    Undecodable(DecodeError),
}

pub struct Device {
    stream: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>,
    timeout: Duration,
}

impl Device {
    /// Open the sensor's serial port.
    ///
    /// The port is closed when the `Device` is dropped.
    pub fn new(config: &SerialConfig) -> Result<Self> {
        let mut port = tokio_serial::new(&config.path, config.baudrate)
            .timeout(config.timeout)
            .open_native_async()?;

        #[cfg(unix)]
        port.set_exclusive(false)?;

        info!(
            path = %config.path,
            baudrate = config.baudrate,
            "Sensor serial port open"
        );

        Ok(Self::from_reader(port, config.timeout))
    }

    /// Read sensor lines from any byte source, e.g. a captured log file.
    pub fn from_reader<R>(reader: R, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            stream: Box::pin(FramedRead::new(reader, LineCodec::new())),
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_faked(buffer: super::proto::fake::FakeBuffer, timeout: Duration) -> Self {
        Self::from_reader(buffer, timeout)
    }

    /// Next raw line, newline included.
    ///
    /// Returns an empty line if nothing arrives within the read timeout.
    pub async fn next_line(&mut self) -> Result<Bytes> {
        match tokio::time::timeout(self.timeout, self.stream.next()).await {
            Ok(Some(Ok(line))) => Ok(line),
            Ok(Some(Err(ioerr))) => Err(ioerr.into()),
            Ok(None) => Err(ProtoError::Abort),
            Err(_) => {
                trace!(timeout = ?self.timeout, "No sensor line within read timeout");
                Ok(Bytes::new())
            }
        }
    }

    /// Read one line and turn it into a reading.
    pub async fn poll(&mut self) -> Result<Cycle> {
        let line = self.next_line().await?;
        Ok(match Fields::try_from(&line[..]) {
            Ok(fields) => Cycle::Reading(reading::parse(&fields)),
            Err(err) => Cycle::Undecodable(err),
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::proto::fake::FakeBuffer;
    use crate::reading::Reading;

    const TIMEOUT: Duration = Duration::from_millis(20);

    fn reading(cycle: Cycle) -> Reading {
        match cycle {
            Cycle::Reading(parsed) => parsed.reading,
            Cycle::Undecodable(err) => panic!("Unexpected decode error: {}", err),
        }
    }

    #[tokio::test]
    async fn test_poll_base_line() {
        let mut device = Device::new_faked(
            FakeBuffer::new("07,40.7128,-74.0060,10,1.2,45,2024-03-01T12:00:00\n"),
            TIMEOUT,
        );
        let r = reading(device.poll().await.unwrap());
        assert_eq!(r.satellites(), "07");
        assert_eq!(r.latitude(), Some("40.7128"));
        assert!(r.timestamp().is_some());
    }

    #[tokio::test]
    async fn test_poll_line_split_across_reads() {
        let mut device = Device::new_faked(
            FakeBuffer::chunked(vec![
                b"01,1,2,3,4,5,2024-01-01T".to_vec(),
                b"00:00:00,55,21.3\n03,,".to_vec(),
                b",,,,\n".to_vec(),
            ]),
            TIMEOUT,
        );
        let first = reading(device.poll().await.unwrap());
        assert_eq!(first.humidity(), Some("55"));
        assert_eq!(first.temperature(), Some("21.3"));
        let second = reading(device.poll().await.unwrap());
        assert_eq!(second.satellites(), "03");
        assert_eq!(second.latitude(), Some(""));
        assert_eq!(second.humidity(), None);
    }

    #[tokio::test]
    async fn test_undecodable_line_is_skipped() {
        let mut device = Device::new_faked(FakeBuffer::new(&b"\xfe\xff,1\n05,1,2\n"[..]), TIMEOUT);
        assert!(matches!(
            device.poll().await.unwrap(),
            Cycle::Undecodable(DecodeError::InvalidUtf8 { .. })
        ));
        assert_eq!(reading(device.poll().await.unwrap()).satellites(), "05");
    }

    #[tokio::test]
    async fn test_end_of_stream_aborts() {
        let mut device = Device::new_faked(FakeBuffer::new("01,2\n"), TIMEOUT);
        assert!(device.poll().await.is_ok());
        assert!(matches!(device.poll().await, Err(ProtoError::Abort)));
    }

    #[tokio::test]
    async fn test_timeout_gives_empty_reading() {
        let mut device = Device::new_faked(FakeBuffer::new("").hanging(), TIMEOUT);
        assert_eq!(device.next_line().await.unwrap(), Bytes::new());
        assert_eq!(reading(device.poll().await.unwrap()), Reading::default());
    }
}
