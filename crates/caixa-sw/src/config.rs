//! Worker configuration.
//!
//! The generation identifier, asset manifest and notification defaults are
//! injected at startup instead of being baked into the worker, so a
//! deployment pipeline can roll the cache generation forward by shipping a
//! new config file.

use std::path::Path;

use caixa_common::{CaixaError, Subsystem};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{SwError, SwResult};

/// Environment variable that overrides [`WorkerConfig::cache_name`].
pub const CACHE_NAME_ENV: &str = "CAIXA_CACHE_NAME";

/// Default cache generation identifier.
pub const DEFAULT_CACHE_NAME: &str = "caixa-promessa-v2";

/// Assets that must be available offline.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/pwa_manifest.json",
    "/harp_music.mp3",
    "/caixa_abrindo.mp4",
    "/icon-192x192.png",
    "/icon-512x512.png",
    "/promessas_espiritual.json",
    "/promessas_familia.json",
    "/promessas_saude.json",
    "/promessas_negocios.json",
    "/promessas_dinheiro.json",
    "/service-worker.js",
];

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cache generation identifier. Stores with any other name are deleted
    /// on activation.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin (and scope) the worker serves.
    pub origin: Url,

    /// Ordered asset manifest, as same-origin paths.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Document served to navigations that fail while offline.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Request activation as soon as install finishes.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Defaults merged under every push payload.
    #[serde(default)]
    pub notification: NotificationDefaults,
}

/// Notification fields used when a push payload omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds (on, off, on, ...).
    pub vibrate: Vec<u32>,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Sua Promessa Diária".to_string(),
            body: "Abra a caixa e receba a promessa de hoje!".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-192x192.png".to_string(),
            vibrate: vec![200, 100, 200],
        }
    }
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.to_string()
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect()
}

fn default_offline_fallback() -> String {
    "/index.html".to_string()
}

fn default_true() -> bool {
    true
}

impl WorkerConfig {
    /// Create a configuration with the default manifest for `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            cache_name: default_cache_name(),
            origin,
            precache: default_precache(),
            offline_fallback: default_offline_fallback(),
            skip_waiting_on_install: true,
            notification: NotificationDefaults::default(),
        }
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self, CaixaError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            CaixaError::worker(
                Subsystem::Config,
                format!("invalid config {}", path.display()),
            )
            .caused_by(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the generation identifier.
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Set the asset manifest.
    pub fn with_precache<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Apply a generation override, typically read from [`CACHE_NAME_ENV`].
    /// Blank values are ignored.
    pub fn with_cache_name_override(self, name: Option<String>) -> Self {
        match name {
            Some(name) if !name.trim().is_empty() => self.with_cache_name(name.trim()),
            _ => self,
        }
    }

    /// Check the invariants the worker relies on.
    pub fn validate(&self) -> SwResult<()> {
        if self.cache_name.trim().is_empty() {
            return Err(SwError::Config("cache_name must not be empty".into()));
        }
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(SwError::Config(format!(
                "origin must be http(s), got {}",
                self.origin
            )));
        }
        for path in self.precache.iter().chain(std::iter::once(&self.offline_fallback)) {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(SwError::Config(format!(
                    "'{path}' is not a same-origin path"
                )));
            }
        }
        Ok(())
    }

    /// Resolve a same-origin path against the worker origin.
    pub fn resolve(&self, path: &str) -> SwResult<Url> {
        Ok(self.origin.join(path)?)
    }

    /// Resolve the whole manifest, preserving order.
    pub fn precache_urls(&self) -> SwResult<Vec<Url>> {
        self.precache.iter().map(|p| self.resolve(p)).collect()
    }

    /// Root of the app; the default notification click target.
    pub fn app_root(&self) -> SwResult<Url> {
        self.resolve("/")
    }

    /// Whether `url` belongs to the worker's origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}
