//! Backend construction and the tick loop.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use ndirx_core::native::{Backend, MockFrame, MockNative};
use ndirx_core::{
    ConnectionState, ReceiverPipeline, ReceiverStats, SharedResources, StaticAddress, TickOutcome,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{BackendConfig, ViewerConfig};
use crate::renderer::{LogRenderer, PresentStats};

/// Address the mock test pattern is advertised at.
pub const MOCK_SOURCE_URL: &str = "127.0.0.1:5960";

// ── Backends ─────────────────────────────────────────────────────

/// A simulated network with one source looping a colour-bar pattern.
pub fn mock_backend(config: &BackendConfig) -> Rc<MockNative> {
    let mock = MockNative::new().with_source(&config.mock_source_name, MOCK_SOURCE_URL);
    let frame = MockFrame::test_pattern(config.mock_width.max(2), config.mock_height.max(1))
        .with_metadata("<ndi_product long_name=\"ndirx test pattern\"/>");
    mock.set_looping(&config.mock_source_name, Some(frame));
    Rc::new(mock)
}

#[cfg(feature = "ndi-sdk")]
pub fn sdk_backend(
    config: &BackendConfig,
) -> Result<Rc<ndirx_core::native::SdkBackend>, ndirx_core::NdiError> {
    use ndirx_core::native::SdkBackend;

    let backend = if config.library_path.is_empty() {
        SdkBackend::load()?
    } else {
        SdkBackend::load_from(&config.library_path)?
    };
    Ok(Rc::new(backend))
}

// ── Tick loop ────────────────────────────────────────────────────

/// What a run did, for the exit log line.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub receiver: ReceiverStats,
    pub present: PresentStats,
    pub final_state: ConnectionState,
}

/// Drive one pipeline until `shutdown` resolves or `max_ticks` is hit.
///
/// Shared resources are torn down before returning.
pub async fn run<B: Backend>(
    backend: Rc<B>,
    config: &ViewerConfig,
    shutdown: impl Future<Output = ()>,
) -> RunSummary {
    let address = StaticAddress::new(config.network.local_address.clone());
    let mut shared = SharedResources::with_config(backend, address, config.shared_config());
    let mut pipeline = ReceiverPipeline::new(config.receiver_config());
    let mut renderer = LogRenderer::new();

    let hz = config.runtime.tick_hz.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(1) / hz);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let stats_every = u64::from(hz) * config.runtime.stats_interval_secs;

    info!(
        source = %pipeline.config().source_name,
        hz,
        "receiving"
    );

    tokio::pin!(shutdown);
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            _ = interval.tick() => {
                let outcome = pipeline.tick(&mut shared, &mut renderer);
                ticks += 1;
                if let TickOutcome::Frame { .. } = outcome {
                    if let Some(meta) = pipeline.metadata() {
                        debug!(metadata = meta, "frame metadata");
                    }
                }
                if stats_every > 0 && ticks % stats_every == 0 {
                    let s = renderer.stats();
                    info!(
                        state = %pipeline.connection_state(),
                        fps = format_args!("{:.1}", s.fps),
                        frames = s.total_frames,
                        width = s.width,
                        height = s.height,
                        "stats"
                    );
                }
                if config.runtime.max_ticks > 0 && ticks >= config.runtime.max_ticks {
                    break;
                }
            }
        }
    }

    let summary = RunSummary {
        ticks,
        receiver: pipeline.stats().clone(),
        present: renderer.stats().clone(),
        final_state: pipeline.connection_state(),
    };
    pipeline.close();
    shared.teardown();
    summary
}

// ── Tests ────────────────────────────────────────────────────────
