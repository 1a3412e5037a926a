//! Receive session bound to one source.
//!
//! [`ReceiveSession`] owns exactly one receive handle and never rebinds;
//! switching sources means closing the session and opening a new one.
//!
//! Captured frames come back as a [`CapturedFrame`] guard that mutably
//! borrows the session. The native buffer is returned when the guard is
//! released or dropped, and no second capture can start while a guard is
//! alive:
//!
//! ```compile_fail
//! # use std::rc::Rc;
//! # use ndirx_core::native::{MockNative, RecvSettings, Source};
//! # use ndirx_core::recv::ReceiveSession;
//! # let mock = Rc::new(MockNative::new().with_source("S", "h"));
//! # let source = Source { name: "S", url_address: "h" };
//! let mut session = ReceiveSession::open(mock, &source, &RecvSettings::default()).unwrap();
//! let first = session.try_capture_frame();
//! let second = session.try_capture_frame(); // `session` is still borrowed by `first`
//! drop(first);
//! ```

use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::NdiError;
use crate::native::types::TIMECODE_SYNTHESIZE;
use crate::native::{Backend, FrameType, PixelFormat, ReceiveHandle, RecvSettings, Source, VideoFrameV2};
use crate::recv::converter::FrameLayout;

// ── ReceiveSession ───────────────────────────────────────────────

pub struct ReceiveSession<B: Backend> {
    handle: ReceiveHandle<B>,
    source_name: String,
    source_address: String,
    settings: RecvSettings,
    /// Non-video captures dropped by `try_capture_frame`.
    discarded: u64,
}

impl<B: Backend> ReceiveSession<B> {
    /// Create a receiver bound to `source`.
    ///
    /// Fails with [`NdiError::ReceiverUnavailable`] when the native layer
    /// refuses, typically because the source went away after it was listed.
    pub fn open(backend: Rc<B>, source: &Source<'_>, settings: &RecvSettings) -> Result<Self, NdiError> {
        let handle = ReceiveHandle::acquire(backend, |b| b.recv_create(source, settings))
            .ok_or_else(|| NdiError::ReceiverUnavailable {
                source_name: source.name.to_owned(),
            })?;
        debug!(source = source.name, address = source.url_address, "receive session opened");
        Ok(Self {
            handle,
            source_name: source.name.to_owned(),
            source_address: source.url_address.to_owned(),
            settings: settings.clone(),
            discarded: 0,
        })
    }

    /// Poll for a video frame without blocking.
    ///
    /// Returns `None` when nothing is pending. Audio, metadata, status and
    /// error results are consumed and also reported as `None`.
    ///
    /// ```
    /// # use std::rc::Rc;
    /// # use ndirx_core::native::{MockFrame, MockNative, PixelFormat, RecvSettings, Source};
    /// # use ndirx_core::recv::ReceiveSession;
    /// let mock = Rc::new(MockNative::new().with_source("S", "h"));
    /// mock.push_frame("S", MockFrame::new(PixelFormat::Bgra, 4, 2));
    ///
    /// let source = Source { name: "S", url_address: "h" };
    /// let mut session = ReceiveSession::open(mock.clone(), &source, &RecvSettings::default())?;
    /// if let Some(frame) = session.try_capture_frame() {
    ///     assert_eq!((frame.width(), frame.height()), (4, 2));
    ///     frame.release();
    /// }
    /// assert_eq!(mock.counters().outstanding_frames(), 0);
    /// # Ok::<(), ndirx_core::NdiError>(())
    /// ```
    pub fn try_capture_frame(&mut self) -> Option<CapturedFrame<'_, B>> {
        let mut frame = VideoFrameV2::default();
        let (backend, raw) = self.handle.parts_mut();
        match backend.recv_capture_video(raw, &mut frame, 0) {
            FrameType::Video => Some(CapturedFrame { session: self, frame }),
            FrameType::None => None,
            FrameType::Error => {
                debug!(source = %self.source_name, "receiver reported an error frame");
                self.discarded += 1;
                None
            }
            other => {
                trace!(source = %self.source_name, ?other, "discarding non-video frame");
                self.discarded += 1;
                None
            }
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// URL address the source had when the session was opened.
    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn settings(&self) -> &RecvSettings {
        &self.settings
    }

    pub fn discarded_frames(&self) -> u64 {
        self.discarded
    }

    /// Destroy the receiver.
    pub fn close(self) {
        debug!(source = %self.source_name, "receive session closed");
        self.handle.release();
    }
}

impl<B: Backend> fmt::Debug for ReceiveSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveSession")
            .field("source_name", &self.source_name)
            .field("source_address", &self.source_address)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ── CapturedFrame ────────────────────────────────────────────────

/// A video frame held by the native layer.
///
/// The pixel buffer belongs to the receiver and goes back to it when this
/// guard is released or dropped.
pub struct CapturedFrame<'s, B: Backend> {
    session: &'s mut ReceiveSession<B>,
    frame: VideoFrameV2,
}

impl<B: Backend> CapturedFrame<'_, B> {
    pub fn width(&self) -> u32 {
        self.frame.xres.max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.frame.yres.max(0) as u32
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::from_fourcc(self.frame.four_cc)
    }

    /// Line stride in bytes.
    pub fn stride(&self) -> u32 {
        self.frame.line_stride_in_bytes.max(0) as u32
    }

    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            width: self.width(),
            height: self.height(),
            stride: self.stride(),
            format: self.format(),
        }
    }

    /// Frames per second, if the sender reported a valid rate.
    pub fn frame_rate(&self) -> Option<f64> {
        (self.frame.frame_rate_d > 0)
            .then(|| f64::from(self.frame.frame_rate_n) / f64::from(self.frame.frame_rate_d))
    }

    /// Sender timecode in 100 ns units; `None` when the sender left it to
    /// be synthesized.
    pub fn timecode(&self) -> Option<i64> {
        (self.frame.timecode != TIMECODE_SYNTHESIZE).then_some(self.frame.timecode)
    }

    /// The raw pixel buffer, sized for this frame's format and stride.
    pub fn data(&self) -> &[u8] {
        if self.frame.p_data.is_null() {
            return &[];
        }
        let len = self.format().buffer_len(
            self.stride() as usize,
            self.width() as usize,
            self.height() as usize,
        );
        // SAFETY: the native layer hands out a buffer of at least `len`
        // bytes for a video frame of this format, and keeps it alive until
        // the frame is freed in `Drop`, which cannot run while `&self` is held.
        unsafe { std::slice::from_raw_parts(self.frame.p_data, len) }
    }

    /// Per-frame metadata as text, decoded lossily.
    pub fn metadata(&self) -> Option<Cow<'_, str>> {
        if self.frame.p_metadata.is_null() {
            return None;
        }
        // SAFETY: non-null metadata is a NUL-terminated string owned by the
        // frame, valid until the frame is freed.
        let text = unsafe { CStr::from_ptr(self.frame.p_metadata) };
        Some(text.to_string_lossy())
    }

    pub fn raw(&self) -> &VideoFrameV2 {
        &self.frame
    }

    pub fn source_name(&self) -> &str {
        &self.session.source_name
    }

    /// Return the buffer to the native layer now.
    pub fn release(self) {
        drop(self);
    }
}

impl<B: Backend> Drop for CapturedFrame<'_, B> {
    fn drop(&mut self) {
        let (backend, raw) = self.session.handle.parts_mut();
        // SAFETY: `frame` was filled by a Video capture on this receiver and
        // this is the only place it is freed.
        unsafe { backend.recv_free_video(raw, &self.frame) };
    }
}

impl<B: Backend> fmt::Debug for CapturedFrame<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format())
            .field("stride", &self.stride())
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────
