//! Viewer configuration.

use std::path::Path;

use clap::ValueEnum;
use ndirx_core::native::FindSettings;
use ndirx_core::{ReceiverConfig, SharedConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Which source to receive and how.
    pub receiver: ReceiverConfig,
    /// Discovery and shared-resource settings.
    pub network: NetworkConfig,
    /// Native backend selection.
    pub backend: BackendConfig,
    /// Tick loop pacing.
    pub runtime: RuntimeConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address discovery is bound to. Also queried directly.
    pub local_address: String,
    /// Include sources running on this machine.
    pub show_local_sources: bool,
    /// Comma-separated discovery groups; empty for the default group.
    pub groups: String,
    /// Name of the shared default sender.
    pub sender_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process simulated network streaming a test pattern.
    #[default]
    Mock,
    /// The installed NDI runtime (needs the `ndi-sdk` feature).
    Sdk,
}

/// Backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Explicit path to the NDI runtime library; empty to search the
    /// `NDI_RUNTIME_DIR_*` variables and the system loader path.
    pub library_path: String,
    /// Name the mock backend advertises its test pattern under.
    pub mock_source_name: String,
    pub mock_width: u32,
    pub mock_height: u32,
}

/// Tick loop pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Ticks per second.
    pub tick_hz: u32,
    /// Stop after this many ticks; 0 runs until interrupted.
    pub max_ticks: u64,
    /// Seconds between stats log lines; 0 disables them.
    pub stats_interval_secs: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_address: String::new(),
            show_local_sources: true,
            groups: String::new(),
            sender_name: ndirx_core::shared::DEFAULT_SENDER_NAME.into(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Mock,
            library_path: String::new(),
            mock_source_name: "NDIRX (test pattern)".into(),
            mock_width: 1280,
            mock_height: 720,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            max_ticks: 0,
            stats_interval_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Settings for the shared discovery registry and default sender.
    pub fn shared_config(&self) -> SharedConfig {
        let groups = self.network.groups.trim();
        SharedConfig {
            default_sender_name: self.network.sender_name.clone(),
            find: FindSettings {
                show_local_sources: self.network.show_local_sources,
                groups: (!groups.is_empty()).then(|| groups.to_owned()),
                extra_ips: None,
            },
        }
    }

    /// Receiver settings, defaulting the source name to the mock's
    /// advertised name when using the mock backend.
    pub fn receiver_config(&self) -> ReceiverConfig {
        let mut receiver = self.receiver.clone();
        if receiver.source_name.is_empty() && self.backend.kind == BackendKind::Mock {
            receiver.source_name = self.backend.mock_source_name.clone();
        }
        receiver
    }
}

// ── Tests ────────────────────────────────────────────────────────
