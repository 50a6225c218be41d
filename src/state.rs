use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::embeddings::ImageEncoder;
use crate::error::Result;
use crate::utils::{parse_or, split_list};

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the server binds to
    pub host: IpAddr,
    /// Port the server binds to
    pub port: u16,
    /// Browser origins allowed by CORS; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_upload_size: usize,
    /// Maximum width or height of a decoded upload
    pub max_image_dimension: u32,
    /// Upper bound on decode + inference + heatmap per request
    pub inference_timeout: Duration,
    /// TorchScript export of the CLIP image tower
    pub model_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            allowed_origins: vec![String::from("http://localhost:3000")],
            max_upload_size: 20 * 1024 * 1024, // 20MB, both files
            max_image_dimension: 8192,
            inference_timeout: Duration::from_secs(30),
            model_path: PathBuf::from("models/clip-vit-base-patch32-vision.pt"),
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let allowed_origins = match lookup("CORS_ORIGINS") {
            Some(raw) if !split_list(&raw).is_empty() => split_list(&raw),
            _ => defaults.allowed_origins,
        };
        let timeout_secs = parse_or(
            "INFERENCE_TIMEOUT_SECS",
            lookup("INFERENCE_TIMEOUT_SECS"),
            defaults.inference_timeout.as_secs(),
        )?;

        Ok(Self {
            host: parse_or("HOST", lookup("HOST"), defaults.host)?,
            port: parse_or("PORT", lookup("PORT"), defaults.port)?,
            allowed_origins,
            max_upload_size: parse_or(
                "MAX_UPLOAD_BYTES",
                lookup("MAX_UPLOAD_BYTES"),
                defaults.max_upload_size,
            )?,
            max_image_dimension: parse_or(
                "MAX_IMAGE_DIMENSION",
                lookup("MAX_IMAGE_DIMENSION"),
                defaults.max_image_dimension,
            )?,
            inference_timeout: Duration::from_secs(timeout_secs),
            model_path: lookup("MODEL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
        })
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Shared, read-only image encoder
    pub encoder: Arc<dyn ImageEncoder>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("encoder", &self.encoder.name())
            .finish()
    }
}

impl AppState {
    /// Create a new application state with custom configuration
    pub fn with_config(config: Config, encoder: Arc<dyn ImageEncoder>) -> Arc<Self> {
        Arc::new(Self { config, encoder })
    }
}
