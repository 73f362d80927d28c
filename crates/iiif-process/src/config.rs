//! Processing configuration
//!
//! Decoded from the same JSON document image servers use, e.g.
//!
//! ```json
//! {
//!   "profile": {"services": {"enable": ["palette"]}},
//!   "palette": {"extruder": {"name": "vibrant", "count": 5}},
//!   "derivatives": {"cache": {"name": "disk", "path": "/var/cache/iiif"}}
//! }
//! ```

use crate::error::ProcessError;
use iiif_cache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Service name that enables palette extraction
pub const PALETTE_SERVICE: &str = "palette";

/// Default report file name
pub const DEFAULT_REPORT_NAME: &str = "process.json";

/// Processing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub images: CacheSection,
    #[serde(default)]
    pub derivatives: CacheSection,
    #[serde(default)]
    pub report: ReportConfig,
}

impl ProcessConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an additional enabled service
    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.profile.services.enable.contains(&name) {
            self.profile.services.enable.push(name);
        }
        self
    }

    /// With palette extraction enabled
    #[inline]
    #[must_use]
    pub fn with_palette(self) -> Self {
        self.with_service(PALETTE_SERVICE)
    }

    /// With derivative cache
    #[inline]
    #[must_use]
    pub fn with_derivatives_cache(mut self, cache: CacheConfig) -> Self {
        self.derivatives.cache = cache;
        self
    }

    /// With process reports enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_report(mut self, enabled: bool) -> Self {
        self.report.enabled = enabled;
        self
    }

    /// With report file name
    #[inline]
    #[must_use]
    pub fn with_report_name(mut self, name: impl Into<String>) -> Self {
        self.report.name = name.into();
        self
    }

    /// Check if a service is enabled in the active profile
    #[inline]
    #[must_use]
    pub fn is_service_enabled(&self, name: &str) -> bool {
        self.profile.services.enable.iter().any(|s| s == name)
    }

    /// Check if palette extraction is enabled
    #[inline]
    #[must_use]
    pub fn palette_enabled(&self) -> bool {
        self.is_service_enabled(PALETTE_SERVICE)
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// - `ProcessError::InvalidConfig` for a disk cache without a path or an
    ///   empty report name
    pub fn validate(&self) -> Result<(), ProcessError> {
        let caches = [
            ("images", &self.images.cache),
            ("derivatives", &self.derivatives.cache),
        ];
        for (section, cache) in caches {
            if cache.name.eq_ignore_ascii_case("disk") && cache.path.is_none() {
                return Err(ProcessError::InvalidConfig(format!(
                    "{section} disk cache requires a path"
                )));
            }
        }

        if self.report.name.trim_matches('/').is_empty() {
            return Err(ProcessError::InvalidConfig("report name is empty".to_string()));
        }

        Ok(())
    }

    /// Decode and validate from JSON
    ///
    /// # Errors
    /// - `ProcessError::InvalidConfig` if the document does not decode or
    ///   does not validate
    pub fn from_json(body: &[u8]) -> Result<Self, ProcessError> {
        let config: Self =
            serde_json::from_slice(body).map_err(|e| ProcessError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, decode and validate a configuration file
    ///
    /// # Errors
    /// - `ProcessError::Io` if the file cannot be read
    /// - `ProcessError::InvalidConfig` otherwise, as for [`Self::from_json`]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProcessError> {
        let path = path.as_ref();
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| ProcessError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&body)
    }
}

/// Active service profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Enabled services
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub enable: Vec<String>,
}

/// Palette service settings, passed through to the palette backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteConfig {
    #[serde(default)]
    pub extruder: ExtruderConfig,
    #[serde(default)]
    pub grid: NamedConfig,
    #[serde(default = "default_palettes")]
    pub palettes: Vec<NamedConfig>,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            extruder: ExtruderConfig::default(),
            grid: NamedConfig::default(),
            palettes: default_palettes(),
        }
    }
}

fn default_palettes() -> Vec<NamedConfig> {
    vec![NamedConfig::new("crayola"), NamedConfig::new("css4")]
}

/// Colour extraction algorithm and number of colours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtruderConfig {
    pub name: String,
    pub count: u32,
}

impl Default for ExtruderConfig {
    fn default() -> Self {
        Self {
            name: "vibrant".to_string(),
            count: 5,
        }
    }
}

/// Something selected by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedConfig {
    pub name: String,
}

impl NamedConfig {
    /// Create by name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for NamedConfig {
    fn default() -> Self {
        Self::new("euclidian")
    }
}

/// Wrapper matching the `{"cache": {...}}` layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Process report settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_report_name")]
    pub name: String,
}

fn default_report_name() -> String {
    DEFAULT_REPORT_NAME.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: default_report_name(),
        }
    }
}
