//! Renderer backend selection for `usdrecord`

use log::info;
use std::fmt;

/// Hydra render delegate passed to `usdrecord --renderer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererBackend(String);

impl RendererBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The platform default: Metal on macOS, GL everywhere else
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            info!("macOS default renderer Metal being used");
            Self::new("Metal")
        } else {
            info!("Default renderer GL being used");
            Self::new("GL")
        }
    }

    /// Use `requested` when given, otherwise the platform default
    pub fn select(requested: Option<&str>) -> Self {
        match requested.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => {
                info!("Renderer {} requested", name);
                Self::new(name)
            }
            None => Self::platform_default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RendererBackend {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for RendererBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
