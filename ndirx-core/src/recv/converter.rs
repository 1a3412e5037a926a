//! Frame converter: native video frames to a reusable RGBA8 image.
//!
//! The converter keeps one output buffer. It is reused while frame
//! dimensions stay the same and reallocated when they change, so a steady
//! stream costs no allocations after the first frame.

use tracing::debug;

use crate::error::NdiError;
use crate::native::PixelFormat;
use crate::recv::kernel::{CpuKernel, PixelKernel};

// ── FrameLayout ──────────────────────────────────────────────────

/// Geometry and format of a native frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    /// Line stride in bytes (may exceed the packed row size).
    pub stride: u32,
    pub format: PixelFormat,
}

impl FrameLayout {
    /// Bytes the native buffer must hold for this layout.
    pub fn required_len(&self) -> usize {
        self.format
            .buffer_len(self.stride as usize, self.width as usize, self.height as usize)
    }
}

// ── DecodedImage ─────────────────────────────────────────────────

/// Tightly packed RGBA8 pixels, `width * height * 4` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    has_alpha: bool,
    source_format: Option<PixelFormat>,
    pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the source format carried alpha. Otherwise every alpha
    /// byte is 255.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Format of the frame this image was decoded from.
    pub fn source_format(&self) -> Option<PixelFormat> {
        self.source_format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[offset..offset + 4]);
        px
    }
}

// ── FrameConverter ───────────────────────────────────────────────

pub struct FrameConverter<K: PixelKernel = CpuKernel> {
    kernel: K,
    image: DecodedImage,
    /// Whether `image` holds a completed decode.
    ready: bool,
    allocations: u64,
}

impl FrameConverter<CpuKernel> {
    /// A converter using the scalar CPU kernel.
    pub fn new() -> Self {
        Self::with_kernel(CpuKernel)
    }
}

impl Default for FrameConverter<CpuKernel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PixelKernel> FrameConverter<K> {
    pub fn with_kernel(kernel: K) -> Self {
        Self {
            kernel,
            image: DecodedImage::default(),
            ready: false,
            allocations: 0,
        }
    }

    /// Convert one frame. The returned image stays valid until the next
    /// call.
    ///
    /// On error the previous image is left as it was.
    pub fn decode(&mut self, layout: FrameLayout, raw: &[u8]) -> Result<&DecodedImage, NdiError> {
        if layout.width == 0 || layout.height == 0 {
            return Err(NdiError::InvalidDimensions {
                width: layout.width,
                height: layout.height,
            });
        }
        if !self.kernel.supports(layout.format) {
            return Err(NdiError::UnsupportedFormat(layout.format));
        }
        let expected = layout.required_len();
        if raw.len() < expected {
            return Err(NdiError::BufferTooSmall {
                expected,
                actual: raw.len(),
            });
        }

        let out_len = layout.width as usize * layout.height as usize * 4;
        let mut pixels = if self.image.width == layout.width
            && self.image.height == layout.height
            && self.image.pixels.len() == out_len
        {
            std::mem::take(&mut self.image.pixels)
        } else {
            debug!(
                width = layout.width,
                height = layout.height,
                "resizing decode buffer"
            );
            self.allocations += 1;
            vec![0u8; out_len]
        };

        if let Err(e) = self.kernel.convert(&layout, raw, &mut pixels) {
            // Keep a reusable buffer around only if it still matches.
            if pixels.len() == self.image.width as usize * self.image.height as usize * 4 {
                self.image.pixels = pixels;
            }
            return Err(e);
        }

        self.image = DecodedImage {
            width: layout.width,
            height: layout.height,
            has_alpha: layout.format.has_alpha(),
            source_format: Some(layout.format),
            pixels,
        };
        self.ready = true;
        Ok(&self.image)
    }

    /// The most recent successful decode, if any.
    pub fn image(&self) -> Option<&DecodedImage> {
        self.ready.then_some(&self.image)
    }

    /// Number of times the output buffer has been (re)allocated.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Drop the output buffer and forget the last image.
    pub fn reset(&mut self) {
        self.image = DecodedImage::default();
        self.ready = false;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bgra(width: u32, height: u32) -> (FrameLayout, Vec<u8>) {
        let layout = FrameLayout {
            width,
            height,
            stride: width * 4,
            format: PixelFormat::Bgra,
        };
        (layout, vec![0x40; layout.required_len()])
    }

    #[test]
    fn output_is_exact_size() {
        let mut conv = FrameConverter::new();
        let (layout, raw) = bgra(7, 3);
        let image = conv.decode(layout, &raw).unwrap();
        assert_eq!(image.pixels().len(), 7 * 3 * 4);
        assert_eq!((image.width(), image.height()), (7, 3));
        assert!(image.has_alpha());
        assert_eq!(image.source_format(), Some(PixelFormat::Bgra));
    }

    #[test]
    fn buffer_reused_until_dimensions_change() {
        let mut conv = FrameConverter::new();
        let (full_hd, raw) = bgra(1920, 1080);
        conv.decode(full_hd, &raw).unwrap();
        conv.decode(full_hd, &raw).unwrap();
        assert_eq!(conv.allocations(), 1);

        let (hd, raw) = bgra(1280, 720);
        conv.decode(hd, &raw).unwrap();
        assert_eq!(conv.allocations(), 2);
        assert_eq!(conv.image().unwrap().pixels().len(), 1280 * 720 * 4);
    }

    #[test]
    fn zero_dimensions_rejected() {
        let mut conv = FrameConverter::new();
        let layout = FrameLayout {
            width: 0,
            height: 10,
            stride: 0,
            format: PixelFormat::Bgra,
        };
        assert!(matches!(
            conv.decode(layout, &[]),
            Err(NdiError::InvalidDimensions { width: 0, height: 10 })
        ));
    }

    #[test]
    fn short_buffer_rejected() {
        let mut conv = FrameConverter::new();
        let (layout, raw) = bgra(4, 4);
        let err = conv.decode(layout, &raw[..10]).unwrap_err();
        assert!(matches!(err, NdiError::BufferTooSmall { expected: 64, actual: 10 }));
    }

    #[test]
    fn unsupported_format_rejected() {
        let mut conv = FrameConverter::new();
        let layout = FrameLayout {
            width: 2,
            height: 2,
            stride: 2,
            format: PixelFormat::Nv12,
        };
        let raw = vec![0; layout.required_len()];
        assert!(matches!(
            conv.decode(layout, &raw),
            Err(NdiError::UnsupportedFormat(PixelFormat::Nv12))
        ));
        assert_eq!(conv.allocations(), 0);
    }

    #[test]
    fn failed_decode_keeps_previous_image() {
        let mut conv = FrameConverter::new();
        let (layout, raw) = bgra(2, 2);
        conv.decode(layout, &raw).unwrap();

        let bad = FrameLayout { stride: 4, ..layout };
        assert!(conv.decode(bad, &raw).is_err());
        let image = conv.image().unwrap();
        assert_eq!(image.pixel(1, 1), [0x40, 0x40, 0x40, 0x40]);

        // Same dimensions again: still no new allocation.
        conv.decode(layout, &raw).unwrap();
        assert_eq!(conv.allocations(), 1);
    }

    #[test]
    fn opaque_source_has_no_alpha() {
        let mut conv = FrameConverter::new();
        let layout = FrameLayout {
            width: 2,
            height: 1,
            stride: 4,
            format: PixelFormat::Uyvy,
        };
        let image = conv.decode(layout, &[128, 235, 128, 235]).unwrap();
        assert!(!image.has_alpha());
        assert_eq!(image.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn reset_forgets_image() {
        let mut conv = FrameConverter::new();
        let (layout, raw) = bgra(1, 1);
        conv.decode(layout, &raw).unwrap();
        conv.reset();
        assert!(conv.image().is_none());
    }
}
