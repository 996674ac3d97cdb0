//! # Core Host Module
//!
//! Shared configuration used by every other subsystem of the host.
//!
//! ## Organization
//!
//! - **Config**: configuration for the server, client, executor and renderer

pub mod config;

// Re-export commonly used config types
pub use config::{
    BackendKind,
    ClientConfig,
    Config,
    ConfigError,
    ExecutorConfig,
    HostConfig,
    LoggingConfig,
    RendererConfig,
    ServerConfig,
    ShaderConfig,
};
