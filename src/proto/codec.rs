use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;
use tracing::warn;

const EOL: u8 = b'\n';

/// Longest line accepted from the sensor, newline included.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// Frames the serial byte stream into `\n` terminated lines.
///
/// Each frame keeps its trailing newline, the same bytes a `readline`
/// on the port would hand out. Turning a frame into text is up to
/// [`super::line::Fields`].
#[derive(Debug)]
pub struct LineCodec {
    max_length: usize,
    /// Set while skipping the rest of an overlong line.
    discarding: bool,
    /// Bytes already scanned for a newline, so partial reads are not rescanned.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
            next_index: 0,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    // Only transport level failures end up here. A line full of
    // garbage is still a line as far as framing is concerned.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let eol = src[self.next_index..]
                .iter()
                .position(|b| *b == EOL)
                .map(|n| n + self.next_index);

            match (self.discarding, eol) {
                (true, Some(offset)) => {
                    // Drop the tail of the overlong line, newline included.
                    let _ = src.split_to(offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    let _ = src.split_to(src.len());
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(offset)) if offset + 1 > self.max_length => {
                    warn!(
                        len = offset + 1,
                        max = self.max_length,
                        "Discarding overlong sensor line"
                    );
                    let _ = src.split_to(offset + 1);
                    self.next_index = 0;
                }
                (false, Some(offset)) => {
                    self.next_index = 0;
                    return Ok(Some(src.split_to(offset + 1).freeze()));
                }
                (false, None) if src.len() > self.max_length => {
                    warn!(
                        len = src.len(),
                        max = self.max_length,
                        "Sensor line exceeds maximum length, skipping to next newline"
                    );
                    let _ = src.split_to(src.len());
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, None) => {
                    self.next_index = src.len();
                    return Ok(None); // Not enough bytes yet
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() || self.discarding => {
                src.clear();
                self.discarding = false;
                self.next_index = 0;
                Ok(None)
            }
            None => {
                // Unterminated last line, e.g. a capture file without final newline.
                self.next_index = 0;
                Ok(Some(src.split_to(src.len()).freeze()))
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn frames(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(buf).expect("decode failed") {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_splits_lines_and_keeps_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"07,1,2\n03,,,,,,\n"[..]);
        let out = frames(&mut codec, &mut buf);
        assert_eq!(out, vec![Bytes::from("07,1,2\n"), Bytes::from("03,,,,,,\n")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_waits_for_rest_of_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"07,40.71"[..]);
        assert!(frames(&mut codec, &mut buf).is_empty());
        buf.extend_from_slice(b"28\n");
        assert_eq!(frames(&mut codec, &mut buf), vec![Bytes::from("07,40.7128\n")]);
    }

    #[test]
    fn test_empty_line_is_a_frame() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\n"[..]);
        assert_eq!(frames(&mut codec, &mut buf), vec![Bytes::from("\n")]);
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(frames(&mut codec, &mut buf).is_empty());
        buf.extend_from_slice(b"abc\n01,2\n");
        assert_eq!(frames(&mut codec, &mut buf), vec![Bytes::from("01,2\n")]);
    }

    #[test]
    fn test_overlong_complete_line_is_discarded() {
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"0123456\n1,2\n"[..]);
        assert_eq!(frames(&mut codec, &mut buf), vec![Bytes::from("1,2\n")]);
    }

    #[test]
    fn test_eof_yields_unterminated_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"01,2\n05,6"[..]);
        assert_eq!(
            codec.decode_eof(&mut buf).expect("decode failed"),
            Some(Bytes::from("01,2\n"))
        );
        assert_eq!(
            codec.decode_eof(&mut buf).expect("decode failed"),
            Some(Bytes::from("05,6"))
        );
        assert_eq!(codec.decode_eof(&mut buf).expect("decode failed"), None);
    }
}
