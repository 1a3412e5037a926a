//! Value types shared by every backend.
//!
//! [`VideoFrameV2`] mirrors the native video frame descriptor byte for
//! byte so that both the SDK and the in-process mock hand the session the
//! same structure. Everything else is a plain Rust value.

use std::ffi::c_char;
use std::fmt;
use std::ptr;

use serde::{Deserialize, Serialize};

// ── PixelFormat ──────────────────────────────────────────────────

/// Build a FourCC code the way the native headers do (little-endian ASCII).
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Pixel layout of a captured video frame, identified by its FourCC.
///
/// The set is closed; anything else the native layer reports lands in
/// [`PixelFormat::Unknown`] with the raw code preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 4:2:2 YCbCr, 16 bpp.
    Uyvy,
    /// `Uyvy` followed by an 8-bit alpha plane.
    Uyva,
    /// Semi-planar 4:2:2, 16 bits per sample.
    P216,
    /// `P216` followed by a 16-bit alpha plane.
    Pa16,
    /// Planar 4:2:0, V plane before U.
    Yv12,
    /// Planar 4:2:0, U plane before V.
    I420,
    /// Semi-planar 4:2:0.
    Nv12,
    /// Packed 8-bit B, G, R, A.
    Bgra,
    /// Packed 8-bit B, G, R, unused.
    Bgrx,
    /// Packed 8-bit R, G, B, A.
    Rgba,
    /// Packed 8-bit R, G, B, unused.
    Rgbx,
    /// A code outside the known set.
    Unknown(u32),
}

impl PixelFormat {
    /// Map a raw FourCC to the closed set.
    pub const fn from_fourcc(code: u32) -> Self {
        match code {
            c if c == fourcc(b"UYVY") => Self::Uyvy,
            c if c == fourcc(b"UYVA") => Self::Uyva,
            c if c == fourcc(b"P216") => Self::P216,
            c if c == fourcc(b"PA16") => Self::Pa16,
            c if c == fourcc(b"YV12") => Self::Yv12,
            c if c == fourcc(b"I420") => Self::I420,
            c if c == fourcc(b"NV12") => Self::Nv12,
            c if c == fourcc(b"BGRA") => Self::Bgra,
            c if c == fourcc(b"BGRX") => Self::Bgrx,
            c if c == fourcc(b"RGBA") => Self::Rgba,
            c if c == fourcc(b"RGBX") => Self::Rgbx,
            other => Self::Unknown(other),
        }
    }

    /// The raw FourCC code.
    pub const fn fourcc(self) -> u32 {
        match self {
            Self::Uyvy => fourcc(b"UYVY"),
            Self::Uyva => fourcc(b"UYVA"),
            Self::P216 => fourcc(b"P216"),
            Self::Pa16 => fourcc(b"PA16"),
            Self::Yv12 => fourcc(b"YV12"),
            Self::I420 => fourcc(b"I420"),
            Self::Nv12 => fourcc(b"NV12"),
            Self::Bgra => fourcc(b"BGRA"),
            Self::Bgrx => fourcc(b"BGRX"),
            Self::Rgba => fourcc(b"RGBA"),
            Self::Rgbx => fourcc(b"RGBX"),
            Self::Unknown(code) => code,
        }
    }

    /// Whether frames in this format carry an alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Uyva | Self::Pa16 | Self::Bgra | Self::Rgba)
    }

    /// Size in bytes of a native buffer with the given line stride.
    ///
    /// Alpha planes and chroma planes follow the primary plane; the alpha
    /// plane of `Uyva` is tightly packed (`width` bytes per row).
    pub const fn buffer_len(self, stride: usize, width: usize, height: usize) -> usize {
        match self {
            Self::Uyva => stride * height + width * height,
            Self::P216 => stride * height * 2,
            Self::Pa16 => stride * height * 3,
            Self::Yv12 | Self::I420 | Self::Nv12 => stride * height + stride * height / 2,
            Self::Uyvy
            | Self::Bgra
            | Self::Bgrx
            | Self::Rgba
            | Self::Rgbx
            | Self::Unknown(_) => stride * height,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.fourcc().to_le_bytes();
        if bytes.iter().all(u8::is_ascii_graphic) {
            // All four bytes are printable ASCII.
            write!(f, "{}", bytes.iter().map(|&b| b as char).collect::<String>())
        } else {
            write!(f, "{:#010x}", self.fourcc())
        }
    }
}

// ── FrameType ────────────────────────────────────────────────────

/// What a capture call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    None,
    Video,
    Audio,
    Metadata,
    Error,
    StatusChange,
    Unknown(i32),
}

impl FrameType {
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Video,
            2 => Self::Audio,
            3 => Self::Metadata,
            4 => Self::Error,
            100 => Self::StatusChange,
            other => Self::Unknown(other),
        }
    }
}

// ── Receiver settings ────────────────────────────────────────────

/// Preferred color format requested when a receiver is created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    BgrxBgra,
    UyvyBgra,
    RgbxRgba,
    UyvyRgba,
    /// Whatever the sender produces natively (usually UYVY/UYVA).
    #[default]
    Fastest,
    Best,
}

impl ColorFormat {
    pub const fn to_raw(self) -> i32 {
        match self {
            Self::BgrxBgra => 0,
            Self::UyvyBgra => 1,
            Self::RgbxRgba => 2,
            Self::UyvyRgba => 3,
            Self::Fastest => 100,
            Self::Best => 101,
        }
    }
}

/// Quality/cost tradeoff requested when a receiver is created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bandwidth {
    MetadataOnly,
    AudioOnly,
    Lowest,
    #[default]
    Highest,
}

impl Bandwidth {
    pub const fn to_raw(self) -> i32 {
        match self {
            Self::MetadataOnly => -10,
            Self::AudioOnly => 10,
            Self::Lowest => 0,
            Self::Highest => 100,
        }
    }
}

/// Fixed configuration used to open a receive session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecvSettings {
    pub color_format: ColorFormat,
    pub bandwidth: Bandwidth,
    pub allow_video_fields: bool,
    /// Name this receiver announces to senders.
    pub receiver_name: Option<String>,
}

impl Default for RecvSettings {
    fn default() -> Self {
        Self {
            color_format: ColorFormat::Fastest,
            bandwidth: Bandwidth::Highest,
            allow_video_fields: true,
            receiver_name: None,
        }
    }
}

/// Options for creating a discovery instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindSettings {
    pub show_local_sources: bool,
    pub groups: Option<String>,
    /// Additional addresses to query directly, comma separated.
    pub extra_ips: Option<String>,
}

impl Default for FindSettings {
    fn default() -> Self {
        Self {
            show_local_sources: true,
            groups: None,
            extra_ips: None,
        }
    }
}

// ── Source ───────────────────────────────────────────────────────

/// A discovered sender, borrowed from the discovery instance's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source<'a> {
    /// Full advertised name, e.g. `"STUDIO (cam-1)"`.
    pub name: &'a str,
    /// `host[:port]` address of the sender.
    pub url_address: &'a str,
}

// ── VideoFrameV2 ─────────────────────────────────────────────────

/// Native video frame descriptor (`NDIlib_video_frame_v2_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VideoFrameV2 {
    pub xres: i32,
    pub yres: i32,
    pub four_cc: u32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub picture_aspect_ratio: f32,
    pub frame_format_type: i32,
    pub timecode: i64,
    pub p_data: *mut u8,
    pub line_stride_in_bytes: i32,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

/// Timecode value meaning "none supplied".
pub const TIMECODE_SYNTHESIZE: i64 = i64::MAX;

impl Default for VideoFrameV2 {
    fn default() -> Self {
        Self {
            xres: 0,
            yres: 0,
            four_cc: 0,
            frame_rate_n: 30000,
            frame_rate_d: 1001,
            picture_aspect_ratio: 0.0,
            frame_format_type: 1,
            timecode: TIMECODE_SYNTHESIZE,
            p_data: ptr::null_mut(),
            line_stride_in_bytes: 0,
            p_metadata: ptr::null(),
            timestamp: 0,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
