//! Domain-specific error types for the receive pipeline.
//!
//! Only resource-creation failures and conversion problems are errors.
//! "No source yet" and "no frame this tick" are normal states and are
//! reported through [`TickOutcome`](crate::recv::TickOutcome) instead.

use thiserror::Error;

use crate::native::PixelFormat;

/// The canonical error type for ndirx.
#[derive(Debug, Error)]
pub enum NdiError {
    // ── Native resources ─────────────────────────────────────────
    /// The native layer refused to create a discovery (find) instance.
    #[error("discovery unavailable for network context {context:?}")]
    DiscoveryUnavailable { context: String },

    /// The native layer could not create a receiver bound to the source.
    #[error("receiver unavailable for source {source_name:?}")]
    ReceiverUnavailable { source_name: String },

    /// The native layer could not create a sender.
    #[error("sender unavailable: {name:?}")]
    SenderUnavailable { name: String },

    /// The runtime library could not be loaded or initialised.
    #[error("native library error: {0}")]
    Library(String),

    /// A string passed to the native layer contained an interior NUL.
    #[error("invalid C string: {0}")]
    InvalidCString(#[from] std::ffi::NulError),

    // ── Frame conversion ─────────────────────────────────────────
    /// A frame reported zero width or height.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The native buffer is shorter than its layout requires.
    #[error("frame buffer too small: expected {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    /// The active pixel kernel cannot convert this format.
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(PixelFormat),
}

#[cfg(feature = "ndi-sdk")]
impl From<libloading::Error> for NdiError {
    fn from(e: libloading::Error) -> Self {
        NdiError::Library(e.to_string())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = NdiError::BufferTooSmall {
            expected: 1000,
            actual: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = NdiError::ReceiverUnavailable {
            source_name: "STUDIO (cam-1)".into(),
        };
        assert!(e.to_string().contains("cam-1"));
    }

    #[test]
    fn unsupported_format_shows_fourcc() {
        let e = NdiError::UnsupportedFormat(PixelFormat::Nv12);
        assert!(e.to_string().contains("NV12"));
    }

    #[test]
    fn from_nul_error() {
        let nul = std::ffi::CString::new("a\0b").unwrap_err();
        let e: NdiError = nul.into();
        assert!(matches!(e, NdiError::InvalidCString(_)));
    }
}
