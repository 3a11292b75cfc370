//! # Frame Capture
//!
//! The frame-source seam of the realtime loop. A [`FrameSource`] hands
//! out RGBA frames until it is stopped; implementations here cover still
//! images (binary PPM) and a deterministic synthetic pattern that stands
//! in for a camera. A real device backend plugs in through the same
//! trait.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

/// A single RGBA8 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA bytes, row-major
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Solid-color frame; mostly useful in demos and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&rgba);
        }
        Self { width, height, pixels }
    }
}

/// Custom error types for frame acquisition
#[derive(Debug)]
pub enum CaptureError {
    /// The device or source cannot be used: permission denied, missing
    /// hardware, an insecure host context, or a stopped stream
    Unavailable(String),
    /// Wraps std::io::Error for file operations
    Io(std::io::Error),
    /// The frame data could not be decoded
    Decode(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CaptureError::Unavailable(msg) => write!(f, "Capture device unavailable: {}", msg),
            CaptureError::Io(e) => write!(f, "I/O error: {}", e),
            CaptureError::Decode(msg) => write!(f, "Frame decode error: {}", msg),
        }
    }
}

impl Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

/// A live or still source of frames.
///
/// After `stop`, `capture` fails with `Unavailable`; the realtime loop
/// relies on this so in-flight cycles against a torn-down source become
/// no-ops.
pub trait FrameSource: Send {
    /// Captures the current frame.
    fn capture(&mut self) -> Result<Frame, CaptureError>;

    /// Stops the source and releases its backing device or buffer.
    fn stop(&mut self);
}

/// Serves one decoded still frame repeatedly (the sample-image path).
pub struct StillSource {
    frame: Option<Frame>,
}

impl StillSource {
    pub fn new(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }

    /// Loads the still from a binary PPM file.
    pub fn from_ppm(path: &Path) -> Result<Self, CaptureError> {
        Ok(Self::new(read_ppm(path)?))
    }
}

impl FrameSource for StillSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self.frame
            .clone()
            .ok_or_else(|| CaptureError::Unavailable("still source stopped".to_string()))
    }

    fn stop(&mut self) {
        self.frame = None;
    }
}

/// Deterministic moving test pattern standing in for a camera feed.
pub struct SyntheticSource {
    size: u32,
    tick: u32,
    stopped: bool,
}

impl SyntheticSource {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1), tick: 0, stopped: false }
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Unavailable("synthetic source stopped".to_string()));
        }
        let s = self.size;
        let mut pixels = Vec::with_capacity((s * s * 4) as usize);
        let phase = (self.tick.wrapping_mul(7) & 0xff) as u8;
        for y in 0..s {
            for x in 0..s {
                let r = ((x * 255 / s) as u8).wrapping_add(phase);
                let g = (y * 255 / s) as u8;
                pixels.extend_from_slice(&[r, g, phase, 255]);
            }
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(Frame { width: s, height: s, pixels })
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Reads a binary PPM (P6) file into an RGBA frame.
pub fn read_ppm(path: &Path) -> Result<Frame, CaptureError> {
    let bytes = fs::read(path)?;
    parse_ppm(&bytes)
}

/// Parses binary PPM (P6) bytes: an ASCII header of magic, width, height
/// and maxval (with `#` comments allowed), one whitespace byte, then raw
/// RGB triplets.
pub fn parse_ppm(bytes: &[u8]) -> Result<Frame, CaptureError> {
    let mut pos = 0;

    let magic = next_token(bytes, &mut pos)?;
    if magic != "P6" {
        return Err(CaptureError::Decode(format!("not a P6 file (magic {:?})", magic)));
    }

    let width: u32 = parse_dimension(&next_token(bytes, &mut pos)?)?;
    let height: u32 = parse_dimension(&next_token(bytes, &mut pos)?)?;
    let maxval: u32 = parse_dimension(&next_token(bytes, &mut pos)?)?;
    if maxval != 255 {
        return Err(CaptureError::Decode(format!("unsupported maxval {}", maxval)));
    }
    if width == 0 || height == 0 {
        return Err(CaptureError::Decode("zero-sized image".to_string()));
    }

    // The header ends with exactly one whitespace byte before the raster.
    pos += 1;
    let expected = width as usize * height as usize * 3;
    if bytes.len() < pos + expected {
        return Err(CaptureError::Decode(format!(
            "truncated raster: expected {} bytes, {} available",
            expected,
            bytes.len().saturating_sub(pos)
        )));
    }

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for rgb in bytes[pos..pos + expected].chunks_exact(3) {
        pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }

    Ok(Frame { width, height, pixels })
}

/// Reads the next whitespace-delimited header token, skipping `#`
/// comments.
fn next_token(bytes: &[u8], pos: &mut usize) -> Result<String, CaptureError> {
    // Skip whitespace and comment lines
    loop {
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
        if *pos < bytes.len() && bytes[*pos] == b'#' {
            while *pos < bytes.len() && bytes[*pos] != b'\n' {
                *pos += 1;
            }
            continue;
        }
        break;
    }

    let start = *pos;
    while *pos < bytes.len() && !bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    if start == *pos {
        return Err(CaptureError::Decode("unexpected end of header".to_string()));
    }
    String::from_utf8(bytes[start..*pos].to_vec())
        .map_err(|e| CaptureError::Decode(format!("invalid header token: {}", e)))
}

fn parse_dimension(token: &str) -> Result<u32, CaptureError> {
    token
        .parse::<u32>()
        .map_err(|e| CaptureError::Decode(format!("bad header value {:?}: {}", token, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_p6() {
        let mut bytes = b"P6\n2 2\n255\n".to_vec();
        bytes.extend_from_slice(&[
            255, 0, 0, 0, 255, 0,
            0, 0, 255, 255, 255, 255,
        ]);
        let frame = parse_ppm(&bytes).unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(&frame.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&frame.pixels[12..16], &[255, 255, 255, 255]);
    }

    #[test]
    fn skips_header_comments() {
        let mut bytes = b"P6\n# camera dump\n1 1\n255\n".to_vec();
        bytes.extend_from_slice(&[9, 8, 7]);
        let frame = parse_ppm(&bytes).unwrap();
        assert_eq!(frame.pixels, vec![9, 8, 7, 255]);
    }

    #[test]
    fn rejects_wrong_magic() {
        assert!(matches!(parse_ppm(b"P3\n1 1\n255\n000"), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn rejects_truncated_raster() {
        let bytes = b"P6\n2 2\n255\n\xff\x00".to_vec();
        assert!(matches!(parse_ppm(&bytes), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn still_source_stops_cleanly() {
        let mut source = StillSource::new(Frame::solid(2, 2, [1, 2, 3, 255]));
        assert!(source.capture().is_ok());
        source.stop();
        assert!(matches!(source.capture(), Err(CaptureError::Unavailable(_))));
    }

    #[test]
    fn synthetic_source_varies_between_frames() {
        let mut source = SyntheticSource::new(8);
        let a = source.capture().unwrap();
        let b = source.capture().unwrap();
        assert_ne!(a.pixels, b.pixels);
    }
}
