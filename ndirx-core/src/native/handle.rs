//! Owned native handles.
//!
//! A [`NativeHandle`] pairs a raw backend resource with the backend that
//! created it and destroys it exactly once: on [`release`](NativeHandle::release)
//! or when dropped, whichever comes first. There is no other path to
//! destruction, so error unwinding releases handles deterministically.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

use super::Backend;

// ── Kinds ────────────────────────────────────────────────────────

/// Tags a handle with the raw type it owns and how to destroy it.
pub trait HandleKind<B: Backend> {
    type Raw;
    /// Short label used in logs.
    const NAME: &'static str;

    fn destroy(backend: &B, raw: &mut Self::Raw);
}

/// Discovery (find) instance.
pub struct FindKind;
/// Receiver instance.
pub struct RecvKind;
/// Sender instance.
pub struct SendKind;

impl<B: Backend> HandleKind<B> for FindKind {
    type Raw = B::Find;
    const NAME: &'static str = "find";

    fn destroy(backend: &B, raw: &mut B::Find) {
        backend.find_destroy(raw);
    }
}

impl<B: Backend> HandleKind<B> for RecvKind {
    type Raw = B::Recv;
    const NAME: &'static str = "recv";

    fn destroy(backend: &B, raw: &mut B::Recv) {
        backend.recv_destroy(raw);
    }
}

impl<B: Backend> HandleKind<B> for SendKind {
    type Raw = B::Send;
    const NAME: &'static str = "send";

    fn destroy(backend: &B, raw: &mut B::Send) {
        backend.send_destroy(raw);
    }
}

pub type DiscoveryHandle<B> = NativeHandle<B, FindKind>;
pub type ReceiveHandle<B> = NativeHandle<B, RecvKind>;
pub type SendHandle<B> = NativeHandle<B, SendKind>;

// ── NativeHandle ─────────────────────────────────────────────────

/// A live native resource of kind `K`.
pub struct NativeHandle<B: Backend, K: HandleKind<B>> {
    backend: Rc<B>,
    raw: K::Raw,
    _kind: PhantomData<K>,
}

impl<B: Backend, K: HandleKind<B>> NativeHandle<B, K> {
    /// Run `create` against the backend and take ownership of the result.
    ///
    /// Returns `None` when the native layer reports failure.
    pub fn acquire(backend: Rc<B>, create: impl FnOnce(&B) -> Option<K::Raw>) -> Option<Self> {
        let raw = create(&backend)?;
        trace!("acquired {} handle", K::NAME);
        Some(Self {
            backend,
            raw,
            _kind: PhantomData,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn raw(&self) -> &K::Raw {
        &self.raw
    }

    /// Borrow the backend and the raw resource together.
    pub fn parts_mut(&mut self) -> (&B, &mut K::Raw) {
        (&*self.backend, &mut self.raw)
    }

    /// Destroy the resource now.
    pub fn release(self) {
        drop(self);
    }
}

impl<B: Backend, K: HandleKind<B>> Drop for NativeHandle<B, K> {
    fn drop(&mut self) {
        K::destroy(&*self.backend, &mut self.raw);
        trace!("released {} handle", K::NAME);
    }
}

impl<B: Backend, K: HandleKind<B>> fmt::Debug for NativeHandle<B, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle").field("kind", &K::NAME).finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
