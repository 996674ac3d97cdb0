//! # Host Configuration
//!
//! All configuration structures for the window host in one place: the
//! network listener, the command executor, the renderer and logging.
//!
//! ## Configuration Categories
//!
//! - **Server Config**: where the command gateway listens
//! - **Client Config**: where the command-line client connects
//! - **Executor Config**: frame pacing and submission queue depth
//! - **Renderer Config**: graphics backend, shaders, validation
//! - **Logging Config**: default log filter
//!
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it wants to change.

use serde::{Serialize, Deserialize};
use std::path::Path;
use std::time::Duration;

// Re-export from the config module for compatibility
pub use crate::config::{Config, ConfigError};

/// Default address for both the listener and the client
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// # Shader Configuration
///
/// SPIR-V paths for the textured-quad pipeline used by QR windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// This tries multiple common locations for shaders, useful for a host
    /// that might be started from different working directories.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "shaders/",
            "resources/shaders/",
            "../target/shaders/",
            "../../target/shaders/",
            "./",
        ];

        let mut vertex_path = None;
        let mut fragment_path = None;

        for dir in &shader_dirs {
            let vertex_test = format!("{dir}{base_vertex}");
            let fragment_test = format!("{dir}{base_fragment}");

            if vertex_path.is_none() && Path::new(&vertex_test).exists() {
                vertex_path = Some(vertex_test);
            }
            if fragment_path.is_none() && Path::new(&fragment_test).exists() {
                fragment_path = Some(fragment_test);
            }

            if vertex_path.is_some() && fragment_path.is_some() {
                break;
            }
        }

        Self {
            vertex_shader_path: vertex_path.unwrap_or_else(|| format!("target/shaders/{base_vertex}")),
            fragment_shader_path: fragment_path.unwrap_or_else(|| format!("target/shaders/{base_fragment}")),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex_shader_path));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment_shader_path));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("textured_quad.vert.spv", "textured_quad.frag.spv")
    }
}

/// Which graphics backend the executor drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GLFW windows presented through Vulkan
    #[default]
    Vulkan,
    /// In-memory backend with no display
    Headless,
}

/// # Renderer Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Graphics backend selection
    pub backend: BackendKind,
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers (auto-detect when unset)
    pub enable_validation: Option<bool>,
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Resolve the validation flag against the build type
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Select the backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            application_name: "alat".to_string(),
            enable_validation: None,
            shaders: ShaderConfig::default(),
        }
    }
}

/// # Executor Configuration
///
/// Frame pacing for the command executor loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Sleep after each full window sweep, in milliseconds
    pub idle_sleep_ms: u64,
    /// Number of privileged operations that may wait in the queue
    pub queue_depth: usize,
}

impl ExecutorConfig {
    /// Idle sleep as a duration
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: 10,
            queue_depth: 1,
        }
    }
}

/// # Server Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the command gateway listens on
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
        }
    }
}

/// # Client Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address of the host to call
    pub server_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_ADDR.to_string(),
        }
    }
}

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// # Host Configuration
///
/// Top-level configuration loaded by the `alat` binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Network listener
    pub server: ServerConfig,
    /// Command-line client
    pub client: ClientConfig,
    /// Command executor
    pub executor: ExecutorConfig,
    /// Renderer
    pub renderer: RendererConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl Config for HostConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: HostConfig = toml::from_str(
            r#"
            [executor]
            idle_sleep_ms = 25

            [renderer]
            backend = "headless"
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.idle_sleep(), Duration::from_millis(25));
        assert_eq!(config.executor.queue_depth, 1);
        assert_eq!(config.renderer.backend, BackendKind::Headless);
        assert_eq!(config.server.bind_addr, DEFAULT_ADDR);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");

        let mut config = HostConfig::default();
        config.server.bind_addr = "0.0.0.0:9000".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = HostConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_ron_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.ron");
        std::fs::write(&path, "(logging: (level: \"debug\"))").unwrap();

        let loaded = HostConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.logging.level, "debug");
        assert_eq!(loaded.executor, ExecutorConfig::default());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.yaml");
        std::fs::write(&path, "server: {}").unwrap();

        assert!(matches!(
            HostConfig::load_from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded = HostConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded, HostConfig::default());
    }

    #[test]
    fn test_validation_auto_detect() {
        let mut renderer = RendererConfig::default();
        assert_eq!(renderer.validation_enabled(), cfg!(debug_assertions));
        renderer.enable_validation = Some(false);
        assert!(!renderer.validation_enabled());
    }
}
