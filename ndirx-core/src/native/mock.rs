//! In-process simulated NDI network.
//!
//! [`MockNative`] implements [`Backend`] without any native library. It
//! keeps a list of advertised sources, per-source capture scripts, and a
//! set of counters that record every create/destroy/capture/free so tests
//! can check resource balance and frame lifecycle discipline.
//!
//! The viewer also uses it as a `mock` backend that streams a test
//! pattern, which is handy on machines without the NDI runtime.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use ndirx_core::native::{MockFrame, MockNative, PixelFormat};
//!
//! let mock = Rc::new(MockNative::new().with_source("STUDIO (cam-1)", "10.0.0.5:5960"));
//! mock.push_frame("STUDIO (cam-1)", MockFrame::new(PixelFormat::Uyvy, 16, 8));
//! assert_eq!(mock.counters().outstanding_frames(), 0);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::CString;
use std::ptr;

use tracing::trace;

use super::Backend;
use super::types::{
    FindSettings, FrameType, PixelFormat, RecvSettings, Source, TIMECODE_SYNTHESIZE,
    VideoFrameV2,
};

// ── Scripted frames ──────────────────────────────────────────────

/// A video frame the mock will hand out on capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFrame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Line stride in bytes.
    pub stride: u32,
    pub data: Vec<u8>,
    pub metadata: Option<String>,
    pub timecode: Option<i64>,
}

impl MockFrame {
    /// A zero-filled frame with the natural stride for `format`.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let stride = natural_stride(format, width);
        let len = format.buffer_len(stride as usize, width as usize, height as usize);
        Self {
            format,
            width,
            height,
            stride,
            data: vec![0; len],
            metadata: None,
            timecode: None,
        }
    }

    /// Fill every byte of the buffer with `byte`.
    pub fn with_fill(mut self, byte: u8) -> Self {
        self.data.fill(byte);
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_timecode(mut self, timecode: i64) -> Self {
        self.timecode = Some(timecode);
        self
    }

    /// Eight vertical bars in UYVY (75% BT.709 colour bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        // (Y, Cb, Cr) for white, yellow, cyan, green, magenta, red, blue, black.
        const BARS: [(u8, u8, u8); 8] = [
            (180, 128, 128),
            (168, 44, 136),
            (145, 147, 44),
            (133, 63, 52),
            (63, 193, 204),
            (51, 109, 212),
            (28, 212, 120),
            (16, 128, 128),
        ];

        let width = width.max(2) & !1;
        let mut frame = Self::new(PixelFormat::Uyvy, width, height);
        let stride = frame.stride as usize;
        for y in 0..height as usize {
            let row = &mut frame.data[y * stride..(y + 1) * stride];
            for (pair, px) in row.chunks_exact_mut(4).enumerate() {
                let bar = (pair * 2 * BARS.len()) / width as usize;
                let (luma, cb, cr) = BARS[bar.min(BARS.len() - 1)];
                px.copy_from_slice(&[cb, luma, cr, luma]);
            }
        }
        frame
    }
}

fn natural_stride(format: PixelFormat, width: u32) -> u32 {
    match format {
        PixelFormat::Uyvy | PixelFormat::Uyva | PixelFormat::P216 | PixelFormat::Pa16 => {
            width * 2
        }
        PixelFormat::Yv12 | PixelFormat::I420 | PixelFormat::Nv12 => width,
        PixelFormat::Bgra
        | PixelFormat::Bgrx
        | PixelFormat::Rgba
        | PixelFormat::Rgbx
        | PixelFormat::Unknown(_) => width * 4,
    }
}

/// One scripted capture result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCapture {
    Video(MockFrame),
    Audio,
    Metadata,
    StatusChange,
    Error,
}

// ── Counters ─────────────────────────────────────────────────────

/// Lifecycle counters. Compare snapshots before/after an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCounters {
    pub finds_created: u64,
    pub finds_destroyed: u64,
    pub recvs_created: u64,
    pub recvs_destroyed: u64,
    pub sends_created: u64,
    pub sends_destroyed: u64,
    /// Calls to `recv_capture_video`.
    pub captures: u64,
    /// Captures that returned a video frame.
    pub video_frames: u64,
    pub frames_freed: u64,
    /// Capture-before-free, double free, and destroy-while-holding.
    pub violations: u64,
}

impl MockCounters {
    pub fn live_finds(&self) -> u64 {
        self.finds_created - self.finds_destroyed
    }

    pub fn live_recvs(&self) -> u64 {
        self.recvs_created - self.recvs_destroyed
    }

    pub fn live_sends(&self) -> u64 {
        self.sends_created - self.sends_destroyed
    }

    /// Video frames handed out and not yet freed.
    pub fn outstanding_frames(&self) -> u64 {
        self.video_frames.saturating_sub(self.frames_freed)
    }
}

// ── Raw resources ────────────────────────────────────────────────

/// Raw discovery instance: an id plus its current source listing.
#[derive(Debug)]
pub struct MockFind {
    id: u64,
    listing: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct MockRecv {
    id: u64,
    source: String,
}

#[derive(Debug)]
pub struct MockSend {
    id: u64,
    name: String,
}

impl MockSend {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Iterator returned by [`MockNative::find_current_sources`].
pub struct MockSources<'a> {
    inner: std::slice::Iter<'a, (String, String)>,
}

impl<'a> Iterator for MockSources<'a> {
    type Item = Source<'a>;

    fn next(&mut self) -> Option<Source<'a>> {
        self.inner.next().map(|(name, url)| Source {
            name,
            url_address: url,
        })
    }
}

// ── MockNative ───────────────────────────────────────────────────

#[derive(Debug)]
struct MockSource {
    name: String,
    url: String,
    queue: VecDeque<MockCapture>,
    looping: Option<MockFrame>,
}

/// A handed-out frame; keeps the buffers alive until freed.
#[derive(Debug)]
struct Outstanding {
    recv: u64,
    _data: Box<[u8]>,
    _metadata: Option<CString>,
}

#[derive(Debug, Default)]
struct MockState {
    sources: Vec<MockSource>,
    next_id: u64,
    outstanding: HashMap<i64, Outstanding>,
    counters: MockCounters,
    fail_find: bool,
    fail_recv: bool,
    fail_send: bool,
    last_find_settings: Option<FindSettings>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simulated backend. Interior mutability through `RefCell`; single thread only.
#[derive(Debug, Default)]
pub struct MockNative {
    state: RefCell<MockState>,
}

impl MockNative {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add_source`](Self::add_source).
    pub fn with_source(self, name: &str, url: &str) -> Self {
        self.add_source(name, url);
        self
    }

    /// Start advertising a source.
    pub fn add_source(&self, name: &str, url: &str) {
        self.state.borrow_mut().sources.push(MockSource {
            name: name.into(),
            url: url.into(),
            queue: VecDeque::new(),
            looping: None,
        });
    }

    /// Stop advertising every source named `name`. Receivers bound to it
    /// see no further frames.
    pub fn remove_source(&self, name: &str) {
        self.state.borrow_mut().sources.retain(|s| s.name != name);
    }

    /// Queue a capture result for the named source.
    pub fn push_capture(&self, source: &str, capture: MockCapture) {
        let mut state = self.state.borrow_mut();
        if let Some(s) = state.sources.iter_mut().find(|s| s.name == source) {
            s.queue.push_back(capture);
        }
    }

    pub fn push_frame(&self, source: &str, frame: MockFrame) {
        self.push_capture(source, MockCapture::Video(frame));
    }

    /// Deliver `frame` on every capture once the queue is empty.
    pub fn set_looping(&self, source: &str, frame: Option<MockFrame>) {
        let mut state = self.state.borrow_mut();
        if let Some(s) = state.sources.iter_mut().find(|s| s.name == source) {
            s.looping = frame;
        }
    }

    pub fn fail_next_find_create(&self) {
        self.state.borrow_mut().fail_find = true;
    }

    pub fn fail_next_recv_create(&self) {
        self.state.borrow_mut().fail_recv = true;
    }

    pub fn fail_next_send_create(&self) {
        self.state.borrow_mut().fail_send = true;
    }

    pub fn counters(&self) -> MockCounters {
        self.state.borrow().counters.clone()
    }

    /// Settings passed to the most recent `find_create`.
    pub fn last_find_settings(&self) -> Option<FindSettings> {
        self.state.borrow().last_find_settings.clone()
    }
}

impl Backend for MockNative {
    type Find = MockFind;
    type Recv = MockRecv;
    type Send = MockSend;
    type Sources<'a> = MockSources<'a>;

    fn find_create(&self, settings: &FindSettings) -> Option<MockFind> {
        let mut state = self.state.borrow_mut();
        state.last_find_settings = Some(settings.clone());
        if std::mem::take(&mut state.fail_find) {
            return None;
        }
        state.counters.finds_created += 1;
        let id = state.next_id();
        trace!(id, "mock find created");
        Some(MockFind {
            id,
            listing: Vec::new(),
        })
    }

    fn find_destroy(&self, find: &mut MockFind) {
        self.state.borrow_mut().counters.finds_destroyed += 1;
        trace!(id = find.id, "mock find destroyed");
    }

    fn find_current_sources<'a>(&'a self, find: &'a mut MockFind) -> MockSources<'a> {
        let state = self.state.borrow();
        find.listing.clear();
        find.listing.extend(
            state
                .sources
                .iter()
                .map(|s| (s.name.clone(), s.url.clone())),
        );
        drop(state);
        MockSources {
            inner: find.listing.iter(),
        }
    }

    fn recv_create(&self, source: &Source<'_>, _settings: &RecvSettings) -> Option<MockRecv> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_recv) {
            return None;
        }
        // The source may have gone away between listing and connecting.
        if !state.sources.iter().any(|s| s.name == source.name) {
            return None;
        }
        state.counters.recvs_created += 1;
        let id = state.next_id();
        Some(MockRecv {
            id,
            source: source.name.to_owned(),
        })
    }

    fn recv_destroy(&self, recv: &mut MockRecv) {
        let mut state = self.state.borrow_mut();
        if state.outstanding.values().any(|o| o.recv == recv.id) {
            state.counters.violations += 1;
        }
        state.counters.recvs_destroyed += 1;
    }

    fn recv_capture_video(
        &self,
        recv: &mut MockRecv,
        frame: &mut VideoFrameV2,
        _timeout_ms: u32,
    ) -> FrameType {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.counters.captures += 1;
        if state.outstanding.values().any(|o| o.recv == recv.id) {
            state.counters.violations += 1;
        }

        let Some(source) = state.sources.iter_mut().find(|s| s.name == recv.source) else {
            return FrameType::None;
        };
        let next = source
            .queue
            .pop_front()
            .or_else(|| source.looping.clone().map(MockCapture::Video));

        let video = match next {
            None => return FrameType::None,
            Some(MockCapture::Audio) => return FrameType::Audio,
            Some(MockCapture::Metadata) => return FrameType::Metadata,
            Some(MockCapture::StatusChange) => return FrameType::StatusChange,
            Some(MockCapture::Error) => return FrameType::Error,
            Some(MockCapture::Video(video)) => video,
        };

        let mut data = video.data.into_boxed_slice();
        let metadata = video.metadata.and_then(|m| CString::new(m).ok());
        state.next_id += 1;
        let key = state.next_id as i64;

        *frame = VideoFrameV2 {
            xres: video.width as i32,
            yres: video.height as i32,
            four_cc: video.format.fourcc(),
            timecode: video.timecode.unwrap_or(TIMECODE_SYNTHESIZE),
            p_data: data.as_mut_ptr(),
            line_stride_in_bytes: video.stride as i32,
            p_metadata: metadata.as_ref().map_or(ptr::null(), |m| m.as_ptr()),
            timestamp: key,
            ..VideoFrameV2::default()
        };

        state.outstanding.insert(
            key,
            Outstanding {
                recv: recv.id,
                _data: data,
                _metadata: metadata,
            },
        );
        state.counters.video_frames += 1;
        FrameType::Video
    }

    unsafe fn recv_free_video(&self, _recv: &mut MockRecv, frame: &VideoFrameV2) {
        let mut state = self.state.borrow_mut();
        if state.outstanding.remove(&frame.timestamp).is_some() {
            state.counters.frames_freed += 1;
        } else {
            state.counters.violations += 1;
        }
    }

    fn send_create(&self, name: &str) -> Option<MockSend> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_send) {
            return None;
        }
        state.counters.sends_created += 1;
        let id = state.next_id();
        Some(MockSend {
            id,
            name: name.to_owned(),
        })
    }

    fn send_destroy(&self, send: &mut MockSend) {
        self.state.borrow_mut().counters.sends_destroyed += 1;
        trace!(id = send.id, "mock send destroyed");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn recv_for(mock: &MockNative, name: &str) -> MockRecv {
        let source = Source {
            name,
            url_address: "",
        };
        mock.recv_create(&source, &RecvSettings::default()).unwrap()
    }

    #[test]
    fn listing_reflects_network() {
        let mock = MockNative::new().with_source("A (1)", "10.0.0.1:5960");
        let mut find = mock.find_create(&FindSettings::default()).unwrap();
        assert_eq!(mock.find_current_sources(&mut find).count(), 1);

        mock.add_source("B (2)", "10.0.0.2:5960");
        let names: Vec<String> = mock
            .find_current_sources(&mut find)
            .map(|s| s.name.to_owned())
            .collect();
        assert_eq!(names, ["A (1)", "B (2)"]);

        mock.remove_source("A (1)");
        assert_eq!(mock.find_current_sources(&mut find).count(), 1);
    }

    #[test]
    fn recv_create_fails_for_vanished_source() {
        let mock = MockNative::new();
        let ghost = Source {
            name: "GONE",
            url_address: "",
        };
        assert!(mock.recv_create(&ghost, &RecvSettings::default()).is_none());
        assert_eq!(mock.counters().recvs_created, 0);
    }

    #[test]
    fn capture_and_free_balance() {
        let mock = MockNative::new().with_source("S", "h");
        mock.push_frame("S", MockFrame::new(PixelFormat::Bgra, 4, 4).with_metadata("<x/>"));
        let mut recv = recv_for(&mock, "S");

        let mut frame = VideoFrameV2::default();
        assert_eq!(mock.recv_capture_video(&mut recv, &mut frame, 0), FrameType::Video);
        assert_eq!(frame.xres, 4);
        assert!(!frame.p_data.is_null());
        assert!(!frame.p_metadata.is_null());
        assert_eq!(mock.counters().outstanding_frames(), 1);

        unsafe { mock.recv_free_video(&mut recv, &frame) };
        let c = mock.counters();
        assert_eq!(c.outstanding_frames(), 0);
        assert_eq!(c.violations, 0);
    }

    #[test]
    fn double_free_is_a_violation() {
        let mock = MockNative::new().with_source("S", "h");
        mock.push_frame("S", MockFrame::new(PixelFormat::Bgra, 2, 2));
        let mut recv = recv_for(&mock, "S");
        let mut frame = VideoFrameV2::default();
        mock.recv_capture_video(&mut recv, &mut frame, 0);

        unsafe {
            mock.recv_free_video(&mut recv, &frame);
            mock.recv_free_video(&mut recv, &frame);
        }
        assert_eq!(mock.counters().violations, 1);
    }

    #[test]
    fn capture_while_holding_is_a_violation() {
        let mock = MockNative::new().with_source("S", "h");
        mock.set_looping("S", Some(MockFrame::new(PixelFormat::Bgra, 2, 2)));
        let mut recv = recv_for(&mock, "S");
        let mut first = VideoFrameV2::default();
        let mut second = VideoFrameV2::default();
        mock.recv_capture_video(&mut recv, &mut first, 0);
        mock.recv_capture_video(&mut recv, &mut second, 0);
        assert_eq!(mock.counters().violations, 1);
        assert_eq!(mock.counters().outstanding_frames(), 2);
    }

    #[test]
    fn non_video_captures_carry_no_frame() {
        let mock = MockNative::new().with_source("S", "h");
        mock.push_capture("S", MockCapture::Audio);
        mock.push_capture("S", MockCapture::Metadata);
        let mut recv = recv_for(&mock, "S");
        let mut frame = VideoFrameV2::default();
        assert_eq!(mock.recv_capture_video(&mut recv, &mut frame, 0), FrameType::Audio);
        assert_eq!(mock.recv_capture_video(&mut recv, &mut frame, 0), FrameType::Metadata);
        assert_eq!(mock.recv_capture_video(&mut recv, &mut frame, 0), FrameType::None);
        assert_eq!(mock.counters().video_frames, 0);
    }

    #[test]
    fn test_pattern_has_bars() {
        let frame = MockFrame::test_pattern(64, 4);
        assert_eq!(frame.stride, 128);
        assert_eq!(frame.data.len(), 128 * 4);
        // First macropixel is white, last is black.
        assert_eq!(&frame.data[0..4], &[128, 180, 128, 180]);
        assert_eq!(&frame.data[124..128], &[128, 16, 128, 16]);
    }
}
