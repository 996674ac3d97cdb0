//! # Backend Module
//!
//! Concrete implementations of [`GraphicsBackend`] and the factory that picks
//! one from [`RendererConfig`].
//!
//! - **Vulkan**: GLFW windows presented through Vulkan (feature `vulkan`)
//! - **Headless**: [`crate::graphics::HeadlessBackend`], always available

#[cfg(feature = "vulkan")]
pub mod vulkan;

use crate::core::config::{BackendKind, RendererConfig};
use crate::graphics::{GraphicsBackend, GraphicsError, HeadlessBackend};

#[cfg(feature = "vulkan")]
impl From<vulkan::VulkanError> for GraphicsError {
    fn from(err: vulkan::VulkanError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Create the backend selected by `config`
///
/// Must be called on the thread that will run the command executor.
pub fn create_backend(config: &RendererConfig) -> Result<Box<dyn GraphicsBackend>, GraphicsError> {
    match config.backend {
        BackendKind::Headless => {
            log::info!("Using headless graphics backend");
            Ok(Box::new(HeadlessBackend::new()))
        }
        #[cfg(feature = "vulkan")]
        BackendKind::Vulkan => {
            log::info!("Using Vulkan graphics backend");
            Ok(Box::new(vulkan::VulkanBackend::new(config)?))
        }
        #[cfg(not(feature = "vulkan"))]
        BackendKind::Vulkan => Err(GraphicsError::Backend(
            "Built without the `vulkan` feature; set renderer.backend = \"headless\"".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_backend_selection() {
        let config = RendererConfig::default().with_backend(BackendKind::Headless);
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "headless");
    }
}
