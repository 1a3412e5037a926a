//! Per-tick receive orchestration.
//!
//! A [`ReceiverPipeline`] is driven by the host once per frame:
//!
//! ```text
//!  tick ──► bound? ──no──► discovery ─► resolve ─► open ──┐
//!             │                 (any failure: Disconnected, return)
//!             yes ◄───────────────────────────────────────┘
//!             │
//!             ▼
//!      try_capture_frame ──none──► Disconnected
//!             │
//!             ▼
//!   decode + copy metadata ─► release frame ─► present ─► Connected
//! ```
//!
//! Nothing here blocks: discovery is a snapshot of what is already known
//! and captures use a zero timeout.

use std::borrow::Cow;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::discovery::resolve;
use crate::native::{Backend, RecvSettings};
use crate::recv::converter::{DecodedImage, FrameConverter};
use crate::recv::kernel::{CpuKernel, PixelKernel};
use crate::recv::session::ReceiveSession;
use crate::shared::SharedResources;
use crate::state::{ConnectionState, ConnectionTracker};

// ── RenderAdapter ────────────────────────────────────────────────

/// Consumer of decoded images, e.g. a texture uploader.
///
/// The image is only borrowed for the call; copy it to keep it.
pub trait RenderAdapter {
    fn present(&mut self, image: &DecodedImage);
}

impl<F: FnMut(&DecodedImage)> RenderAdapter for F {
    fn present(&mut self, image: &DecodedImage) {
        self(image)
    }
}

// ── ReceiverConfig ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Substring of the wanted source's full name. Case-sensitive.
    pub source_name: String,
    /// Exact host the source must live on, port excluded. Empty means any.
    pub address_filter: Option<String>,
    pub recv: RecvSettings,
}

impl ReceiverConfig {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    fn address(&self) -> Option<&str> {
        self.address_filter.as_deref().filter(|a| !a.is_empty())
    }
}

// ── TickOutcome ──────────────────────────────────────────────────

/// What one [`tick`](ReceiverPipeline::tick) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No advertised source matched the configuration.
    NoSource,
    /// The discovery handle could not be created.
    DiscoveryUnavailable,
    /// A source matched but the receiver could not be created.
    OpenFailed,
    /// Bound, but no video frame was pending.
    NoFrame,
    /// A frame was decoded and presented.
    Frame { width: u32, height: u32 },
    /// A frame arrived but could not be decoded; nothing was presented.
    DecodeFailed,
}

impl TickOutcome {
    /// `Connected` exactly when a video frame arrived this tick.
    pub fn connection_state(self) -> ConnectionState {
        ConnectionState::from_frame(matches!(self, Self::Frame { .. } | Self::DecodeFailed))
    }
}

// ── ReceiverStats ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub ticks: u64,
    /// Video frames captured, decoded or not.
    pub frames_received: u64,
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub sessions_opened: u64,
    /// Last decoded frame width.
    pub width: u32,
    /// Last decoded frame height.
    pub height: u32,
}

// ── ReceiverPipeline ─────────────────────────────────────────────

pub struct ReceiverPipeline<B: Backend, K: PixelKernel = CpuKernel> {
    config: ReceiverConfig,
    session: Option<ReceiveSession<B>>,
    converter: FrameConverter<K>,
    connection: ConnectionTracker,
    /// Metadata of this tick's frame.
    metadata: Option<String>,
    stats: ReceiverStats,
}

impl<B: Backend> ReceiverPipeline<B, CpuKernel> {
    pub fn new(config: ReceiverConfig) -> Self {
        Self::with_kernel(config, CpuKernel)
    }
}

impl<B: Backend, K: PixelKernel> ReceiverPipeline<B, K> {
    pub fn with_kernel(config: ReceiverConfig, kernel: K) -> Self {
        Self {
            config,
            session: None,
            converter: FrameConverter::with_kernel(kernel),
            connection: ConnectionTracker::default(),
            metadata: None,
            stats: ReceiverStats::default(),
        }
    }

    /// Run one non-blocking receive step.
    ///
    /// Binds to the configured source if needed, then polls for one video
    /// frame, decodes it, returns it to the native layer and hands the
    /// image to `renderer`. Every failure is absorbed into the returned
    /// outcome and retried on the next tick.
    pub fn tick(
        &mut self,
        shared: &mut SharedResources<B>,
        renderer: &mut impl RenderAdapter,
    ) -> TickOutcome {
        self.stats.ticks += 1;
        self.metadata = None;

        let outcome = self.poll(shared, renderer);

        let state = outcome.connection_state();
        if self.connection.record(state) {
            info!(source = %self.config.source_name, %state, "connection state changed");
        }
        shared.report_state(state);
        outcome
    }

    fn poll(
        &mut self,
        shared: &mut SharedResources<B>,
        renderer: &mut impl RenderAdapter,
    ) -> TickOutcome {
        let session = match self.session.take() {
            Some(session) => self.session.insert(session),
            None => match self.bind(shared) {
                Ok(session) => self.session.insert(session),
                Err(outcome) => return outcome,
            },
        };

        let Some(frame) = session.try_capture_frame() else {
            return TickOutcome::NoFrame;
        };
        self.stats.frames_received += 1;

        let decoded = self.converter.decode(frame.layout(), frame.data());
        self.metadata = frame.metadata().map(Cow::into_owned);
        frame.release();

        match decoded {
            Ok(image) => {
                renderer.present(image);
                self.stats.frames_decoded += 1;
                self.stats.width = image.width();
                self.stats.height = image.height();
                TickOutcome::Frame {
                    width: image.width(),
                    height: image.height(),
                }
            }
            Err(e) => {
                debug!(source = %self.config.source_name, error = %e, "frame decode failed");
                self.stats.decode_failures += 1;
                TickOutcome::DecodeFailed
            }
        }
    }

    fn bind(&mut self, shared: &mut SharedResources<B>) -> Result<ReceiveSession<B>, TickOutcome> {
        let backend = Rc::clone(shared.backend());
        let registry = shared.discovery().map_err(|e| {
            debug!(error = %e, "discovery unavailable");
            TickOutcome::DiscoveryUnavailable
        })?;

        let Some(source) = resolve(
            registry.snapshot(),
            &self.config.source_name,
            self.config.address(),
        ) else {
            trace!(source = %self.config.source_name, "no matching source");
            return Err(TickOutcome::NoSource);
        };

        let session = ReceiveSession::open(backend, &source, &self.config.recv).map_err(|e| {
            debug!(error = %e, "receiver open failed");
            TickOutcome::OpenFailed
        })?;
        info!(source = source.name, address = source.url_address, "bound to source");
        self.stats.sessions_opened += 1;
        Ok(session)
    }

    /// Drop the session so the next tick resolves and opens again.
    ///
    /// Shared resources are left alone.
    pub fn restart(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.converter.reset();
        self.metadata = None;
        self.connection.reset();
    }

    /// Release everything this pipeline owns. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.restart();
    }

    /// Change the wanted source. Restarts only if the name differs.
    pub fn set_source_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name == self.config.source_name {
            return false;
        }
        debug!(old = %self.config.source_name, new = %name, "source name changed");
        self.config.source_name = name;
        self.restart();
        true
    }

    /// Change the address filter. Restarts only if the filter differs.
    pub fn set_address_filter(&mut self, address: Option<String>) -> bool {
        if address == self.config.address_filter {
            return false;
        }
        self.config.address_filter = address;
        self.restart();
        true
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionTracker {
        &self.connection
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ReceiveSession<B>> {
        self.session.as_ref()
    }

    /// Most recently decoded image.
    pub fn last_image(&self) -> Option<&DecodedImage> {
        self.converter.image()
    }

    /// Metadata that came with this tick's frame.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

// ── Tests ────────────────────────────────────────────────────────
