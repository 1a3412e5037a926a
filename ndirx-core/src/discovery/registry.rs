//! Discovery instance bound to a network context.
//!
//! A [`SourceRegistry`] owns at most one discovery handle and remembers the
//! local address it was created for. When [`ensure`](SourceRegistry::ensure)
//! sees a different address, the stale handle is destroyed before the
//! replacement is created, so there is never more than one live handle per
//! registry.

use std::rc::Rc;

use tracing::{debug, info};

use crate::error::NdiError;
use crate::native::{Backend, DiscoveryHandle, FindSettings, Source};

// ── Snapshot ─────────────────────────────────────────────────────

/// The sources a registry currently knows about.
///
/// Borrowed straight from the native list: no copies, single pass, and
/// valid only while the registry stays borrowed.
pub struct Snapshot<'a, B: Backend + 'a> {
    inner: Option<B::Sources<'a>>,
}

impl<'a, B: Backend + 'a> Snapshot<'a, B> {
    /// A snapshot with no sources.
    pub fn empty() -> Self {
        Self { inner: None }
    }
}

impl<'a, B: Backend + 'a> Iterator for Snapshot<'a, B> {
    type Item = Source<'a>;

    fn next(&mut self) -> Option<Source<'a>> {
        self.inner.as_mut()?.next()
    }
}

// ── SourceRegistry ───────────────────────────────────────────────

pub struct SourceRegistry<B: Backend> {
    backend: Rc<B>,
    settings: FindSettings,
    handle: Option<DiscoveryHandle<B>>,
    /// Local address the live handle was created for.
    context: Option<String>,
}

impl<B: Backend> SourceRegistry<B> {
    /// A closed registry; the first [`ensure`](Self::ensure) opens it.
    pub fn new(backend: Rc<B>, settings: FindSettings) -> Self {
        Self {
            backend,
            settings,
            handle: None,
            context: None,
        }
    }

    /// Make sure a handle exists for `address`, replacing a stale one.
    ///
    /// A non-empty `address` is also handed to the native layer as an extra
    /// address to query. Failure leaves the registry closed; retrying is the
    /// caller's job.
    pub fn ensure(&mut self, address: &str) -> Result<(), NdiError> {
        if self.handle.is_some() && self.context.as_deref() == Some(address) {
            return Ok(());
        }

        if let Some(stale) = self.handle.take() {
            info!(
                old = self.context.as_deref().unwrap_or(""),
                new = address,
                "network context changed; recreating discovery"
            );
            stale.release();
        }
        self.context = None;

        let settings = FindSettings {
            extra_ips: if address.is_empty() {
                self.settings.extra_ips.clone()
            } else {
                Some(address.to_owned())
            },
            ..self.settings.clone()
        };

        let handle = DiscoveryHandle::acquire(Rc::clone(&self.backend), |b| b.find_create(&settings))
            .ok_or_else(|| NdiError::DiscoveryUnavailable {
                context: address.to_owned(),
            })?;

        debug!(context = address, "discovery opened");
        self.handle = Some(handle);
        self.context = Some(address.to_owned());
        Ok(())
    }

    /// Current source list; empty while the registry is closed.
    pub fn snapshot(&mut self) -> Snapshot<'_, B> {
        let inner = self.handle.as_mut().map(|handle| {
            let (backend, raw) = handle.parts_mut();
            backend.find_current_sources(raw)
        });
        Snapshot { inner }
    }

    /// Address the live handle was created for.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Destroy the handle, if any. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
            debug!("discovery closed");
        }
        self.context = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::MockNative;

    fn registry(mock: &Rc<MockNative>) -> SourceRegistry<MockNative> {
        SourceRegistry::new(Rc::clone(mock), FindSettings::default())
    }

    #[test]
    fn closed_registry_has_empty_snapshot() {
        let mock = Rc::new(MockNative::new().with_source("A", "h"));
        let mut reg = registry(&mock);
        assert_eq!(reg.snapshot().count(), 0);
        assert_eq!(mock.counters().finds_created, 0);
    }

    #[test]
    fn ensure_is_stable_for_same_address() {
        let mock = Rc::new(MockNative::new());
        let mut reg = registry(&mock);
        reg.ensure("192.168.1.10").unwrap();
        reg.ensure("192.168.1.10").unwrap();
        assert_eq!(mock.counters().finds_created, 1);
        assert_eq!(reg.context(), Some("192.168.1.10"));
    }

    #[test]
    fn address_change_replaces_handle() {
        let mock = Rc::new(MockNative::new());
        let mut reg = registry(&mock);
        reg.ensure("192.168.1.10").unwrap();
        let before = mock.counters();

        reg.ensure("192.168.1.20").unwrap();
        let after = mock.counters();
        assert_eq!(after.finds_destroyed - before.finds_destroyed, 1);
        assert_eq!(after.finds_created - before.finds_created, 1);
        assert_eq!(after.live_finds(), 1);
        assert_eq!(reg.context(), Some("192.168.1.20"));
    }

    #[test]
    fn address_is_passed_as_extra_ip() {
        let mock = Rc::new(MockNative::new());
        let mut reg = registry(&mock);
        reg.ensure("10.0.0.5").unwrap();
        let settings = mock.last_find_settings().unwrap();
        assert_eq!(settings.extra_ips.as_deref(), Some("10.0.0.5"));
        assert!(settings.show_local_sources);

        reg.ensure("").unwrap();
        assert_eq!(mock.last_find_settings().unwrap().extra_ips, None);
    }

    #[test]
    fn failed_create_leaves_registry_closed() {
        let mock = Rc::new(MockNative::new());
        let mut reg = registry(&mock);
        reg.ensure("a").unwrap();

        mock.fail_next_find_create();
        let err = reg.ensure("b").unwrap_err();
        assert!(matches!(err, NdiError::DiscoveryUnavailable { .. }));
        assert!(!reg.is_open());
        assert_eq!(reg.context(), None);
        assert_eq!(mock.counters().live_finds(), 0);

        // Next attempt succeeds.
        reg.ensure("b").unwrap();
        assert!(reg.is_open());
    }

    #[test]
    fn close_twice_is_same_as_once() {
        let mock = Rc::new(MockNative::new());
        let mut reg = registry(&mock);
        reg.ensure("a").unwrap();
        reg.close();
        let once = mock.counters();
        reg.close();
        assert_eq!(mock.counters(), once);
        assert!(!reg.is_open());
    }

    #[test]
    fn snapshot_lists_sources() {
        let mock = Rc::new(
            MockNative::new()
                .with_source("STUDIO (cam-1)", "10.0.0.5:5960")
                .with_source("STUDIO (cam-2)", "10.0.0.6:5960"),
        );
        let mut reg = registry(&mock);
        reg.ensure("").unwrap();
        let names: Vec<&str> = reg.snapshot().map(|s| s.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"STUDIO (cam-2)"));
    }
}
