//! Connection status reported by a receiver pipeline.
//!
//! The receive protocol has no handshake the pipeline can observe, so the
//! status is inferred per tick: a pipeline is `Connected` on exactly the
//! ticks where a video frame arrived, and `Disconnected` otherwise.

use std::fmt;
use std::time::Instant;

// ── ConnectionState ──────────────────────────────────────────────

/// Last-known connection status of a pipeline.
///
/// ```text
///  Disconnected ◄──── no source / open failed / no frame ────┐
///       │                                                    │
///       └──── video frame captured this tick ──► Connected ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No frame this tick, or nothing bound. Initial state.
    #[default]
    Disconnected,

    /// A video frame was captured this tick.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// `Connected` iff `got_frame`.
    pub fn from_frame(got_frame: bool) -> Self {
        if got_frame {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

// ── ConnectionTracker ────────────────────────────────────────────

/// Per-tick state plus edge detection for logging.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    /// When the current run of `Connected` ticks started.
    since: Option<Instant>,
}

impl ConnectionTracker {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Record this tick's state. Returns `true` when it differs from the
    /// previous tick.
    pub fn record(&mut self, state: ConnectionState) -> bool {
        let changed = state != self.state;
        if changed {
            self.since = state.is_connected().then(Instant::now);
        }
        self.state = state;
        changed
    }

    /// How long the current run of `Connected` ticks has lasted.
    ///
    /// Returns `None` while disconnected.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        self.since.map(|t| t.elapsed())
    }

    /// Back to `Disconnected` regardless of current state.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.since = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────
