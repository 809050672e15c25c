use thiserror::Error;

pub mod codec;
pub mod line;

#[cfg(test)]
pub(crate) mod fake;

pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors that end a polling session.
///
/// Anything wrong with a single line is not a `ProtoError`, see
/// [`line::DecodeError`] and the diagnostics in [`crate::reading`].
#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sensor stream closed")]
    Abort,
}
