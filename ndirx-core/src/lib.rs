//! # ndirx-core
//!
//! Discovery and receive pipeline for NDI video sources.
//!
//! This crate contains:
//! - **Native layer**: the `Backend` trait, owned `NativeHandle`s, a
//!   runtime-loaded SDK backend (feature `ndi-sdk`) and `MockNative`
//! - **Discovery**: `SourceRegistry` bound to the local network address,
//!   plus name/address resolution
//! - **Receive**: `ReceiveSession`, the `CapturedFrame` guard,
//!   `FrameConverter` and the per-tick `ReceiverPipeline`
//! - **Shared**: `SharedResources`, the explicitly passed holder of the
//!   discovery registry and the default sender
//! - **State**: `ConnectionState` as observed per tick
//! - **Error**: `NdiError`, a typed, `thiserror`-based error enum
//!
//! Everything is single-threaded: backends are shared through `Rc`, so
//! none of the handle-owning types are `Send`.
//!
//! ```
//! use std::rc::Rc;
//! use ndirx_core::native::{MockFrame, MockNative};
//! use ndirx_core::{DecodedImage, ReceiverConfig, ReceiverPipeline, SharedResources, StaticAddress, TickOutcome};
//!
//! let mock = Rc::new(MockNative::new().with_source("STUDIO (cam-1)", "10.0.0.5:5960"));
//! mock.push_frame("STUDIO (cam-1)", MockFrame::test_pattern(64, 16));
//!
//! let mut shared = SharedResources::new(mock.clone(), StaticAddress::new("10.0.0.1"));
//! let mut pipeline = ReceiverPipeline::new(ReceiverConfig::new("cam"));
//! let mut renderer = |image: &DecodedImage| assert_eq!(image.pixels().len(), 64 * 16 * 4);
//!
//! let outcome = pipeline.tick(&mut shared, &mut renderer);
//! assert_eq!(outcome, TickOutcome::Frame { width: 64, height: 16 });
//!
//! pipeline.close();
//! shared.teardown();
//! assert_eq!(mock.counters().live_recvs(), 0);
//! ```

pub mod discovery;
pub mod error;
pub mod native;
pub mod recv;
pub mod shared;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use discovery::{Snapshot, SourceRegistry, resolve, strip_port};
pub use error::NdiError;
pub use native::{
    Backend, DiscoveryHandle, MockNative, NativeHandle, PixelFormat, ReceiveHandle, RecvSettings,
    SendHandle, Source,
};
#[cfg(feature = "ndi-sdk")]
pub use native::SdkBackend;
pub use recv::{
    CapturedFrame, CpuKernel, DecodedImage, FrameConverter, FrameLayout, PixelKernel,
    ReceiveSession, ReceiverConfig, ReceiverPipeline, ReceiverStats, RenderAdapter, TickOutcome,
};
pub use shared::{AddressProvider, SharedConfig, SharedResources, StaticAddress};
pub use state::{ConnectionState, ConnectionTracker};
