//! Pixel kernels: native frame layouts to tightly packed RGBA8.
//!
//! | Format            | CPU kernel                                     |
//! |-------------------|------------------------------------------------|
//! | `UYVY`            | BT.709 limited range, alpha 255                |
//! | `UYVA`            | as `UYVY`, alpha from the trailing 8-bit plane |
//! | `BGRA` / `RGBA`   | swizzle / copy                                 |
//! | `BGRX` / `RGBX`   | swizzle / copy, alpha forced to 255            |
//!
//! Planar and 16-bit formats are not handled by [`CpuKernel`]; ask the
//! sender for a packed format (`ColorFormat::UyvyBgra` and friends) or plug
//! in another [`PixelKernel`].

use crate::error::NdiError;
use crate::native::PixelFormat;
use crate::recv::converter::FrameLayout;

/// Converts one frame into RGBA8.
pub trait PixelKernel {
    fn supports(&self, format: PixelFormat) -> bool;

    /// Write `layout.width * layout.height` RGBA8 pixels into `out`.
    ///
    /// `raw` is at least `layout.required_len()` bytes and `out` is exactly
    /// `width * height * 4` bytes. An implementation must validate before it
    /// writes, so `out` is untouched on error.
    fn convert(&self, layout: &FrameLayout, raw: &[u8], out: &mut [u8]) -> Result<(), NdiError>;
}

// ── CpuKernel ────────────────────────────────────────────────────

/// Scalar reference kernel for packed formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernel;

impl CpuKernel {
    /// Smallest line stride that covers `width` pixels of `format`.
    fn min_stride(format: PixelFormat, width: usize) -> usize {
        match format {
            PixelFormat::Uyvy | PixelFormat::Uyva => width.div_ceil(2) * 4,
            _ => width * 4,
        }
    }
}

impl PixelKernel for CpuKernel {
    fn supports(&self, format: PixelFormat) -> bool {
        matches!(
            format,
            PixelFormat::Uyvy
                | PixelFormat::Uyva
                | PixelFormat::Bgra
                | PixelFormat::Bgrx
                | PixelFormat::Rgba
                | PixelFormat::Rgbx
        )
    }

    fn convert(&self, layout: &FrameLayout, raw: &[u8], out: &mut [u8]) -> Result<(), NdiError> {
        let width = layout.width as usize;
        let height = layout.height as usize;
        let stride = layout.stride as usize;
        if width == 0 || height == 0 {
            return Err(NdiError::InvalidDimensions {
                width: layout.width,
                height: layout.height,
            });
        }

        if raw.len() < layout.required_len() {
            return Err(NdiError::BufferTooSmall {
                expected: layout.required_len(),
                actual: raw.len(),
            });
        }

        let min_stride = Self::min_stride(layout.format, width);
        if stride < min_stride {
            return Err(NdiError::BufferTooSmall {
                expected: layout.format.buffer_len(min_stride, width, height),
                actual: layout.required_len(),
            });
        }

        match layout.format {
            PixelFormat::Uyvy => {
                uyvy_to_rgba(raw, stride, width, height, None, out);
                Ok(())
            }
            PixelFormat::Uyva => {
                let alpha = &raw[stride * height..stride * height + width * height];
                uyvy_to_rgba(raw, stride, width, height, Some(alpha), out);
                Ok(())
            }
            PixelFormat::Bgra => {
                swizzle_rows(raw, stride, width, out, [2, 1, 0], true);
                Ok(())
            }
            PixelFormat::Bgrx => {
                swizzle_rows(raw, stride, width, out, [2, 1, 0], false);
                Ok(())
            }
            PixelFormat::Rgba => {
                swizzle_rows(raw, stride, width, out, [0, 1, 2], true);
                Ok(())
            }
            PixelFormat::Rgbx => {
                swizzle_rows(raw, stride, width, out, [0, 1, 2], false);
                Ok(())
            }
            other => Err(NdiError::UnsupportedFormat(other)),
        }
    }
}

// ── Internal ─────────────────────────────────────────────────────

/// BT.709 limited range, 8.8 fixed point.
#[inline]
fn yuv_to_rgb(luma: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = 298 * (i32::from(luma) - 16);
    let d = i32::from(cb) - 128;
    let e = i32::from(cr) - 128;
    let clamp = |v: i32| ((v + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 459 * e),
        clamp(c - 55 * d - 136 * e),
        clamp(c + 541 * d),
    ]
}

fn uyvy_to_rgba(
    raw: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    alpha: Option<&[u8]>,
    out: &mut [u8],
) {
    for (y, out_row) in out.chunks_exact_mut(width * 4).take(height).enumerate() {
        let row = &raw[y * stride..y * stride + width.div_ceil(2) * 4];
        let alpha_row = alpha.map(|plane| &plane[y * width..(y + 1) * width]);
        for (x, px) in out_row.chunks_exact_mut(4).enumerate() {
            let pair = &row[(x / 2) * 4..(x / 2) * 4 + 4];
            let luma = if x % 2 == 0 { pair[1] } else { pair[3] };
            let [r, g, b] = yuv_to_rgb(luma, pair[0], pair[2]);
            let a = alpha_row.map_or(255, |row| row[x]);
            px.copy_from_slice(&[r, g, b, a]);
        }
    }
}

/// Copy 4-byte pixels, picking source channels by `order` for R, G, B.
fn swizzle_rows(
    raw: &[u8],
    stride: usize,
    width: usize,
    out: &mut [u8],
    order: [usize; 3],
    keep_alpha: bool,
) {
    for (y, out_row) in out.chunks_exact_mut(width * 4).enumerate() {
        let row = &raw[y * stride..y * stride + width * 4];
        for (src, dst) in row.chunks_exact(4).zip(out_row.chunks_exact_mut(4)) {
            dst[0] = src[order[0]];
            dst[1] = src[order[1]];
            dst[2] = src[order[2]];
            dst[3] = if keep_alpha { src[3] } else { 255 };
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
