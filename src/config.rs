// src/config.rs

//! Defines the configuration structures for the `webview-bridge` toolkit.
//!
//! Every field has a default, so an empty JSON object (or no configuration at
//! all) yields a working toolkit in `Manual` pump mode with the engine on the
//! application thread. The modes are read once by `Toolkit::new` and never
//! change afterwards.

use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding a path to a JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "WEBVIEW_BRIDGE_CONFIG";

/// Process-wide configuration, loaded on first use from [`CONFIG_ENV_VAR`].
///
/// Falls back to defaults (with a warning) when the variable is unset or the
/// file cannot be parsed.
pub static CONFIG: Lazy<ToolkitConfig> = Lazy::new(|| match std::env::var(CONFIG_ENV_VAR) {
    Ok(path) => ToolkitConfig::load(&path).unwrap_or_else(|e| {
        warn!("Config: Failed to load '{}': {:#}. Using defaults.", path, e);
        ToolkitConfig::default()
    }),
    Err(_) => {
        info!("Config: {} not set, using defaults", CONFIG_ENV_VAR);
        ToolkitConfig::default()
    }
});

/// How the host's event loop cooperates with the engine's work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PumpMode {
    /// The host calls `pre_handle_message`/`post_handle_message` around every
    /// dispatch.
    #[default]
    Manual,
    /// The host only dispatches; engine work runs from the pump's timer.
    Automatic,
}

/// Which thread owns the real WebView implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThreadMode {
    /// Engine runner and views live on the application thread.
    #[default]
    Original,
    /// Views live on a dedicated browser-main thread behind proxies.
    RendererMain,
}

/// Root configuration object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolkitConfig {
    pub pump_mode: PumpMode,
    pub thread_mode: ThreadMode,
    /// Message pump tuning.
    pub pump: PumpConfig,
    /// Browser-main thread settings. Only used in `RendererMain` mode.
    pub threading: ThreadingConfig,
    /// Defaults applied to newly created WebViews.
    pub webview: WebViewDefaults,
}

/// Message pump tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Upper bound of one timer-driven drain, in milliseconds.
    pub time_slice_ms: u64,
    /// Identifier the native queue uses for the pump's wake message.
    pub have_work_message_id: u32,
}

impl Default for PumpConfig {
    fn default() -> Self {
        PumpConfig {
            time_slice_ms: 100,
            have_work_message_id: 0x0400 + 1, // first user message after WM_USER
        }
    }
}

impl PumpConfig {
    pub fn time_slice(&self) -> Duration {
        Duration::from_millis(self.time_slice_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingConfig {
    /// How long the application thread waits for browser-main to come up.
    pub startup_timeout_ms: u64,
    pub browser_thread_name: String,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        ThreadingConfig {
            startup_timeout_ms: 30_000,
            browser_thread_name: "browser-main".to_string(),
        }
    }
}

impl ThreadingConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// Defaults copied into `WebViewCreateParams::default()`-based requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebViewDefaults {
    pub initially_visible: bool,
    pub take_focus_on_mouse_down: bool,
    pub dom_paste_enabled: bool,
    pub javascript_can_access_clipboard: bool,
}

impl Default for WebViewDefaults {
    fn default() -> Self {
        WebViewDefaults {
            initially_visible: true,
            take_focus_on_mouse_down: false,
            dom_paste_enabled: false,
            javascript_can_access_clipboard: false,
        }
    }
}

impl ToolkitConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse toolkit config JSON")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&text)?;
        info!(
            "Config: Loaded {} (pump_mode={:?}, thread_mode={:?})",
            path.display(),
            config.pump_mode,
            config.thread_mode
        );
        Ok(config)
    }
}
