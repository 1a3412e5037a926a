//! Process-wide shared native resources.
//!
//! One [`SharedResources`] per process (or per host reload cycle) holds the
//! discovery registry every pipeline resolves against and the lazily
//! created default sender. It is constructed by the host and passed to
//! each [`ReceiverPipeline::tick`](crate::recv::ReceiverPipeline::tick);
//! there is no global.
//!
//! The local network address is polled through an [`AddressProvider`] on
//! every [`discovery`](SharedResources::discovery) call. A change replaces
//! the discovery handle within that same call.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::discovery::SourceRegistry;
use crate::error::NdiError;
use crate::native::{Backend, FindSettings, SendHandle};
use crate::state::ConnectionState;

/// Name of the shared default sender unless configured otherwise.
pub const DEFAULT_SENDER_NAME: &str = "Game View";

// ── AddressProvider ──────────────────────────────────────────────

/// Source of the host's current local network address.
pub trait AddressProvider {
    fn local_address(&self) -> String;
}

/// A fixed address, for hosts that never move between networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAddress(pub String);

impl StaticAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

impl AddressProvider for StaticAddress {
    fn local_address(&self) -> String {
        self.0.clone()
    }
}

impl<F: Fn() -> String> AddressProvider for F {
    fn local_address(&self) -> String {
        self()
    }
}

// ── SharedConfig ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    pub default_sender_name: String,
    pub find: FindSettings,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            default_sender_name: DEFAULT_SENDER_NAME.into(),
            find: FindSettings::default(),
        }
    }
}

// ── SharedResources ──────────────────────────────────────────────

pub struct SharedResources<B: Backend> {
    backend: Rc<B>,
    address: Box<dyn AddressProvider>,
    registry: SourceRegistry<B>,
    sender: Option<SendHandle<B>>,
    sender_name: String,
    last_state: ConnectionState,
}

impl<B: Backend> SharedResources<B> {
    pub fn new(backend: Rc<B>, address: impl AddressProvider + 'static) -> Self {
        Self::with_config(backend, address, SharedConfig::default())
    }

    pub fn with_config(
        backend: Rc<B>,
        address: impl AddressProvider + 'static,
        config: SharedConfig,
    ) -> Self {
        let registry = SourceRegistry::new(Rc::clone(&backend), config.find);
        Self {
            backend,
            address: Box::new(address),
            registry,
            sender: None,
            sender_name: config.default_sender_name,
            last_state: ConnectionState::Disconnected,
        }
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    /// The discovery registry, bound to the current local address.
    ///
    /// Creates the handle on first use and replaces it when the address
    /// has changed since it was created. A creation failure is returned
    /// as-is; the next call tries again.
    pub fn discovery(&mut self) -> Result<&mut SourceRegistry<B>, NdiError> {
        let address = self.address.local_address();
        self.registry.ensure(&address)?;
        Ok(&mut self.registry)
    }

    /// Address the live discovery handle was created for, if any.
    pub fn network_context(&self) -> Option<&str> {
        self.registry.context()
    }

    /// The shared sender, created on first use.
    pub fn default_sender(&mut self) -> Result<&SendHandle<B>, NdiError> {
        let handle = match self.sender.take() {
            Some(handle) => handle,
            None => {
                let name = self.sender_name.as_str();
                let handle = SendHandle::acquire(Rc::clone(&self.backend), |b| {
                    b.send_create(name)
                })
                .ok_or_else(|| NdiError::SenderUnavailable {
                    name: name.to_owned(),
                })?;
                debug!(name, "default sender created");
                handle
            }
        };
        Ok(self.sender.insert(handle))
    }

    /// The shared sender if it has been created.
    pub fn current_sender(&self) -> Option<&SendHandle<B>> {
        self.sender.as_ref()
    }

    /// Whether `handle` is the shared default sender.
    pub fn is_default_sender(&self, handle: &SendHandle<B>) -> bool {
        self.sender
            .as_ref()
            .is_some_and(|shared| std::ptr::eq(shared, handle))
    }

    /// Status reported by the most recent pipeline tick.
    pub fn last_connection_state(&self) -> ConnectionState {
        self.last_state
    }

    pub(crate) fn report_state(&mut self, state: ConnectionState) {
        self.last_state = state;
    }

    /// Release every shared handle and forget the recorded address.
    ///
    /// Hosts call this before reloading code or shutting down. Safe to
    /// call repeatedly; the next `discovery()` starts from scratch.
    pub fn teardown(&mut self) {
        let had_discovery = self.registry.is_open();
        self.registry.close();
        let had_sender = self.sender.take().map(SendHandle::release).is_some();
        self.last_state = ConnectionState::Disconnected;
        if had_discovery || had_sender {
            info!(had_discovery, had_sender, "shared resources torn down");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
