//! # Native layer
//!
//! Everything that touches the foreign discovery/receive library sits
//! behind the [`Backend`] trait. The rest of the crate only ever sees
//! owned [`NativeHandle`]s and the value types in [`types`].
//!
//! | Module   | Purpose                                                   |
//! |----------|-----------------------------------------------------------|
//! | `types`  | FourCC formats, frame types, settings, `VideoFrameV2`     |
//! | `handle` | Owned, kind-tagged handles released exactly once          |
//! | `mock`   | In-process simulated network with lifecycle counters      |
//! | `sdk`    | Runtime-loaded NDI library (feature `ndi-sdk`)            |
//!
//! ## Threading
//!
//! Backends are shared through `Rc`, so every handle-owning type is
//! `!Send`. All native calls happen on the thread that created them.

pub mod handle;
pub mod mock;
#[cfg(feature = "ndi-sdk")]
pub mod sdk;
pub mod types;

pub use handle::{
    DiscoveryHandle, FindKind, HandleKind, NativeHandle, ReceiveHandle, RecvKind, SendHandle,
    SendKind,
};
pub use mock::{MockCapture, MockCounters, MockFrame, MockNative};
#[cfg(feature = "ndi-sdk")]
pub use sdk::SdkBackend;
pub use types::{
    Bandwidth, ColorFormat, FindSettings, FrameType, PixelFormat, RecvSettings, Source,
    VideoFrameV2,
};

// ── Backend ──────────────────────────────────────────────────────

/// The foreign-function surface the pipeline is written against.
///
/// Implementations wrap one native library instance. Raw resource types
/// are associated types so a backend can use pointers, ids or richer
/// bookkeeping structs; the crate never inspects them.
pub trait Backend {
    /// Raw discovery instance.
    type Find;
    /// Raw receiver instance.
    type Recv;
    /// Raw sender instance.
    type Send;
    /// Iterator over the current source list of a discovery instance.
    type Sources<'a>: Iterator<Item = Source<'a>>
    where
        Self: 'a;

    fn find_create(&self, settings: &FindSettings) -> Option<Self::Find>;

    fn find_destroy(&self, find: &mut Self::Find);

    /// Sources currently known to `find`.
    ///
    /// The list is owned by the native layer and is invalidated by the next
    /// call on the same instance, which the `&mut` borrow enforces.
    fn find_current_sources<'a>(&'a self, find: &'a mut Self::Find) -> Self::Sources<'a>;

    fn recv_create(&self, source: &Source<'_>, settings: &RecvSettings) -> Option<Self::Recv>;

    fn recv_destroy(&self, recv: &mut Self::Recv);

    /// Poll for one frame, asking for video only.
    ///
    /// When the result is [`FrameType::Video`], `frame` describes a buffer
    /// owned by the native layer that must be returned through
    /// [`recv_free_video`](Self::recv_free_video) before the next capture.
    fn recv_capture_video(
        &self,
        recv: &mut Self::Recv,
        frame: &mut VideoFrameV2,
        timeout_ms: u32,
    ) -> FrameType;

    /// Return a captured video buffer to the native layer.
    ///
    /// # Safety
    ///
    /// `frame` must have been filled by a `Video` result of
    /// [`recv_capture_video`](Self::recv_capture_video) on the same `recv`
    /// and must not have been freed already.
    unsafe fn recv_free_video(&self, recv: &mut Self::Recv, frame: &VideoFrameV2);

    fn send_create(&self, name: &str) -> Option<Self::Send>;

    fn send_destroy(&self, send: &mut Self::Send);
}
