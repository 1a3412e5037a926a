//! Integration tests: the full discovery → session → decode → present
//! cycle against the simulated network, with resource balance checked
//! after every scenario.

use std::cell::RefCell;
use std::rc::Rc;

use ndirx_core::native::{MockCapture, MockCounters, MockFrame, MockNative, PixelFormat};
use ndirx_core::{
    ConnectionState, DecodedImage, NdiError, ReceiveSession, ReceiverConfig, ReceiverPipeline,
    RecvSettings, SharedResources, StaticAddress, TickOutcome, resolve,
};

const CAM: &str = "STUDIO (cam-1)";
const CAM_URL: &str = "10.0.0.5:5960";

// ── Helpers ──────────────────────────────────────────────────────

/// A network with one camera and shared resources bound to a fixed address.
fn studio() -> (Rc<MockNative>, SharedResources<MockNative>) {
    let mock = Rc::new(MockNative::new().with_source(CAM, CAM_URL));
    let shared = SharedResources::new(Rc::clone(&mock), StaticAddress::new("10.0.0.1"));
    (mock, shared)
}

/// Records every presented image's size.
#[derive(Default)]
struct Recorder {
    sizes: Vec<(u32, u32)>,
    first_pixel: Option<[u8; 4]>,
}

impl ndirx_core::RenderAdapter for Recorder {
    fn present(&mut self, image: &DecodedImage) {
        self.sizes.push((image.width(), image.height()));
        self.first_pixel.get_or_insert(image.pixel(0, 0));
    }
}

/// No frames outstanding, no lifecycle violations.
fn assert_balanced(c: &MockCounters) {
    assert_eq!(c.outstanding_frames(), 0, "leaked frames: {c:?}");
    assert_eq!(c.violations, 0, "violations: {c:?}");
}

// ── Connection state ─────────────────────────────────────────────

#[test]
fn test_connected_iff_frame_this_tick() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();

    let script = [true, false, true, true, false, false, true];
    for &has_frame in &script {
        if has_frame {
            mock.push_frame(CAM, MockFrame::test_pattern(32, 8));
        }
        let outcome = pipeline.tick(&mut shared, &mut renderer);
        let expected = ConnectionState::from_frame(has_frame);
        assert_eq!(pipeline.connection_state(), expected, "outcome {outcome:?}");
        assert_eq!(shared.last_connection_state(), expected);
    }

    assert_eq!(renderer.sizes.len(), 4);
    assert_eq!(pipeline.stats().frames_decoded, 4);
    assert_eq!(pipeline.stats().ticks, script.len() as u64);
    assert_balanced(&mock.counters());
}

#[test]
fn test_non_video_frames_do_not_connect() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();

    for capture in [MockCapture::Audio, MockCapture::Metadata, MockCapture::StatusChange] {
        mock.push_capture(CAM, capture);
        assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoFrame);
        assert_eq!(pipeline.connection_state(), ConnectionState::Disconnected);
    }
    assert!(pipeline.is_bound());
    assert_eq!(pipeline.session().unwrap().discarded_frames(), 3);
    assert!(renderer.sizes.is_empty());
}

// ── Source lifecycle ─────────────────────────────────────────────

#[test]
fn test_source_appears_later() {
    let mock = Rc::new(MockNative::new());
    let mut shared = SharedResources::new(Rc::clone(&mock), StaticAddress::default());
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();

    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoSource);
    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoSource);

    mock.add_source(CAM, CAM_URL);
    mock.push_frame(CAM, MockFrame::new(PixelFormat::Bgra, 4, 4));
    assert_eq!(
        pipeline.tick(&mut shared, &mut renderer),
        TickOutcome::Frame { width: 4, height: 4 }
    );
    // One discovery handle served all three ticks.
    assert_eq!(mock.counters().finds_created, 1);
}

#[test]
fn test_source_vanishes_mid_stream() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();
    mock.set_looping(CAM, Some(MockFrame::test_pattern(16, 2)));

    for _ in 0..3 {
        assert!(matches!(
            pipeline.tick(&mut shared, &mut renderer),
            TickOutcome::Frame { .. }
        ));
    }

    mock.remove_source(CAM);
    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoFrame);
    assert_eq!(pipeline.connection_state(), ConnectionState::Disconnected);
    assert_balanced(&mock.counters());

    // After a restart the source is gone from discovery too.
    pipeline.restart();
    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoSource);
    assert_eq!(mock.counters().live_recvs(), 0);
}

#[test]
fn test_open_failure_is_retried() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();

    mock.fail_next_recv_create();
    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::OpenFailed);
    assert!(!pipeline.is_bound());

    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoFrame);
    assert!(pipeline.is_bound());
    assert_eq!(pipeline.stats().sessions_opened, 1);
}

#[test]
fn test_discovery_failure_is_retried() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();

    mock.fail_next_find_create();
    assert_eq!(
        pipeline.tick(&mut shared, &mut renderer),
        TickOutcome::DiscoveryUnavailable
    );
    assert_eq!(pipeline.tick(&mut shared, &mut renderer), TickOutcome::NoFrame);
}

// ── Network context ──────────────────────────────────────────────

#[test]
fn test_address_change_recreates_discovery_once() {
    let mock = Rc::new(MockNative::new().with_source(CAM, CAM_URL));
    let address = Rc::new(RefCell::new(String::from("192.168.1.10")));
    let provider = {
        let address = Rc::clone(&address);
        move || address.borrow().clone()
    };
    let mut shared = SharedResources::new(Rc::clone(&mock), provider);

    // Two pipelines share one discovery handle.
    let mut a = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut b = ReceiverPipeline::new(ReceiverConfig::new("nothing-here"));
    let mut renderer = Recorder::default();
    a.tick(&mut shared, &mut renderer);
    b.tick(&mut shared, &mut renderer);
    assert_eq!(mock.counters().finds_created, 1);

    *address.borrow_mut() = "192.168.1.20".into();
    let before = mock.counters();
    b.tick(&mut shared, &mut renderer);
    b.tick(&mut shared, &mut renderer);
    let after = mock.counters();

    assert_eq!(after.finds_destroyed - before.finds_destroyed, 1);
    assert_eq!(after.finds_created - before.finds_created, 1);
    assert_eq!(shared.network_context(), Some("192.168.1.20"));
    assert_eq!(
        mock.last_find_settings().unwrap().extra_ips.as_deref(),
        Some("192.168.1.20")
    );
    // The bound pipeline keeps its session across the swap.
    assert!(a.is_bound());
}

// ── Restart / close / teardown ───────────────────────────────────

#[test]
fn test_restart_close_idempotent() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();
    mock.push_frame(CAM, MockFrame::test_pattern(8, 2));
    pipeline.tick(&mut shared, &mut renderer);
    assert!(pipeline.last_image().is_some());

    pipeline.restart();
    assert!(!pipeline.is_bound());
    assert!(pipeline.last_image().is_none());
    // Shared resources survive a restart.
    assert_eq!(mock.counters().live_finds(), 1);

    pipeline.tick(&mut shared, &mut renderer);
    assert_eq!(pipeline.stats().sessions_opened, 2);

    pipeline.close();
    let once = mock.counters();
    pipeline.close();
    assert_eq!(mock.counters(), once);
    assert_eq!(once.live_recvs(), 0);

    shared.teardown();
    let once = mock.counters();
    shared.teardown();
    assert_eq!(mock.counters(), once);
    assert_eq!(once.live_finds(), 0);
    assert_balanced(&once);
}

#[test]
fn test_teardown_then_resume() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();
    shared.default_sender().unwrap();
    pipeline.tick(&mut shared, &mut renderer);

    pipeline.close();
    shared.teardown();
    let c = mock.counters();
    assert_eq!((c.live_finds(), c.live_recvs(), c.live_sends()), (0, 0, 0));

    mock.push_frame(CAM, MockFrame::new(PixelFormat::Rgba, 2, 2));
    assert!(matches!(
        pipeline.tick(&mut shared, &mut renderer),
        TickOutcome::Frame { .. }
    ));
    assert_eq!(mock.counters().finds_created, 2);
}

#[test]
fn test_dropping_everything_releases_handles() {
    let mock = Rc::new(MockNative::new().with_source(CAM, CAM_URL));
    {
        let mut shared = SharedResources::new(Rc::clone(&mock), StaticAddress::default());
        let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
        pipeline.tick(&mut shared, &mut Recorder::default());
        shared.default_sender().unwrap();
    }
    let c = mock.counters();
    assert_eq!((c.live_finds(), c.live_recvs(), c.live_sends()), (0, 0, 0));
}

// ── Source switching ─────────────────────────────────────────────

#[test]
fn test_set_source_name_switches_session() {
    let mock = Rc::new(
        MockNative::new()
            .with_source(CAM, CAM_URL)
            .with_source("STUDIO (cam-2)", "10.0.0.6:5960"),
    );
    let mut shared = SharedResources::new(Rc::clone(&mock), StaticAddress::default());
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam-1"));
    let mut renderer = Recorder::default();

    pipeline.tick(&mut shared, &mut renderer);
    assert_eq!(pipeline.session().unwrap().source_name(), CAM);

    assert!(pipeline.set_source_name("cam-2"));
    assert_eq!(mock.counters().live_recvs(), 0);
    pipeline.tick(&mut shared, &mut renderer);
    assert_eq!(pipeline.session().unwrap().source_name(), "STUDIO (cam-2)");
    assert_eq!(mock.counters().live_recvs(), 1);
}

// ── Frames and metadata ──────────────────────────────────────────

#[test]
fn test_metadata_and_decode_output() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();
    mock.push_frame(
        CAM,
        MockFrame::test_pattern(64, 4).with_metadata("<ndi_tally on_preview=\"true\"/>"),
    );

    pipeline.tick(&mut shared, &mut renderer);
    assert_eq!(pipeline.metadata(), Some("<ndi_tally on_preview=\"true\"/>"));
    // First bar is 75% white.
    let [r, g, b, a] = renderer.first_pixel.unwrap();
    assert!(r == g && g == b && (185..=195).contains(&r), "{r} {g} {b}");
    assert_eq!(a, 255);
    assert!(!pipeline.last_image().unwrap().has_alpha());
}

#[test]
fn test_resolution_change_reallocates() {
    let (mock, mut shared) = studio();
    let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
    let mut renderer = Recorder::default();
    for (w, h) in [(64, 36), (64, 36), (32, 18)] {
        mock.push_frame(CAM, MockFrame::new(PixelFormat::Bgrx, w, h));
        pipeline.tick(&mut shared, &mut renderer);
    }
    assert_eq!(renderer.sizes, [(64, 36), (64, 36), (32, 18)]);
    assert_eq!(pipeline.stats().width, 32);
    assert_eq!(pipeline.last_image().unwrap().pixels().len(), 32 * 18 * 4);
}

// ── Building blocks used directly ────────────────────────────────

#[test]
fn test_manual_resolve_and_capture() {
    let (mock, mut shared) = studio();
    mock.push_frame(CAM, MockFrame::new(PixelFormat::Uyva, 4, 2));
    let backend = Rc::clone(shared.backend());

    let registry = shared.discovery().unwrap();
    let source = resolve(registry.snapshot(), "cam", Some("10.0.0.5")).unwrap();
    let mut session = ReceiveSession::open(backend, &source, &RecvSettings::default()).unwrap();

    let frame = session.try_capture_frame().unwrap();
    assert_eq!(frame.format(), PixelFormat::Uyva);
    assert_eq!(frame.data().len(), 4 * 2 * 2 + 4 * 2);
    frame.release();
    session.close();
    assert_balanced(&mock.counters());
}

#[test]
fn test_open_vanished_source_is_error() {
    let (mock, mut shared) = studio();
    let backend = Rc::clone(shared.backend());
    let registry = shared.discovery().unwrap();
    let source = resolve(registry.snapshot(), "cam", None).unwrap();
    let (name, url) = (source.name.to_owned(), source.url_address.to_owned());

    mock.remove_source(CAM);
    let gone = ndirx_core::Source {
        name: &name,
        url_address: &url,
    };
    let err = ReceiveSession::open(backend, &gone, &RecvSettings::default()).unwrap_err();
    assert!(matches!(err, NdiError::ReceiverUnavailable { .. }));
}
