//! # Alat Engine
//!
//! A remote-controlled window host. One long-lived process owns a set of
//! on-screen windows and renders either a solid color or a QR code into each,
//! while client processes drive it over a small line-delimited JSON protocol.
//!
//! ## Features
//!
//! - **Single graphics thread**: every window and GPU resource is created,
//!   drawn and destroyed by the [`executor::CommandExecutor`] loop
//! - **Privileged operations**: network callers submit closures through a
//!   [`executor::Submitter`] and wait for the executor to run them
//! - **Vulkan rendering**: GLFW windows presented through Vulkan (feature `vulkan`)
//! - **Headless mode**: an in-memory backend for tests and display-less hosts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alat_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HostConfig::default();
//!     let graphics = create_backend(&config.renderer)?;
//!     let (executor, submitter) = CommandExecutor::new(graphics, &config.executor);
//!
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     let gateway = WindowCreator::new(submitter);
//!     let _server = runtime.block_on(start_server(
//!         &config.server.bind_addr,
//!         gateway,
//!         exit_process(),
//!     ))?;
//!
//!     // The graphics thread must be the main thread.
//!     executor.run();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core host modules
pub mod core;
pub mod config;
pub mod foundation;

// Graphics capability and its implementations
pub mod graphics;
pub mod backend;
pub mod qr;

// Window ownership and the executor that serializes access to it
pub mod window;
pub mod executor;

// Outer surfaces
pub mod gateway;
pub mod protocol;
pub mod server;
pub mod client;

#[cfg(test)]
mod tests;

/// Common imports for host and client users
pub mod prelude {
    pub use crate::{
        backend::create_backend,
        client::{Client, ClientError},
        core::config::{
            BackendKind, ClientConfig, ExecutorConfig, HostConfig, LoggingConfig,
            RendererConfig, ServerConfig, ShaderConfig,
        },
        config::{Config, ConfigError},
        executor::{CommandExecutor, ExecutorError, Stage, Submitter},
        gateway::{GatewayError, WindowCreator},
        graphics::{Color, GraphicsBackend, GraphicsError},
        protocol::{Call, QrArgs, SolidColorArgs},
        server::{exit_process, start_server, ServerHandle, ShutdownHook},
    };
}
