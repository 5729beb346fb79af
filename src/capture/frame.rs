//! Frame type representing a captured or processed image with metadata.

use std::time::Instant;

/// Pixel layout of a [`Frame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved blue, green, red; 8 bits per channel.
    Bgr8,
    /// Single 8-bit intensity channel.
    Gray8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single image buffer.
///
/// Frames are immutable once built: every pipeline stage produces a new
/// frame, and there are no mutable accessors to the pixel data.
#[derive(Clone)]
pub struct Frame {
    /// Raw interleaved pixel data, row-major.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Channel layout of `pixels`.
    format: PixelFormat,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number assigned by the device.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Creates a single-channel frame.
    pub fn gray(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::new(pixels, width, height, PixelFormat::Gray8, sequence)
    }

    /// Creates a three-channel BGR frame.
    pub fn bgr(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::new(pixels, width, height, PixelFormat::Bgr8, sequence)
    }

    /// Builds a derived frame that keeps this frame's sequence and timestamp.
    pub(crate) fn derive(&self, pixels: Vec<u8>, format: PixelFormat) -> Self {
        Self {
            pixels,
            width: self.width,
            height: self.height,
            format,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consumes the frame and returns the pixel buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the number of interleaved channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True when the frame has no area or no data.
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0 || self.pixels.is_empty()
    }

    /// Validates that the pixel buffer size matches dimensions and format.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * self.channels()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}
