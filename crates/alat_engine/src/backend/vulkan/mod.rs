//! Vulkan rendering backend
//!
//! Low-level wrappers own one Vulkan object each and release it on drop.
//! [`VulkanBackend`] ties them together behind [`crate::graphics::GraphicsBackend`].

#![allow(unsafe_code)]

mod buffer;
mod commands;
mod context;
mod render_pass;
mod renderer;
mod shader;
mod surface_target;
mod swapchain;
mod sync;
mod texture;
mod window;

pub use context::{VulkanError, VulkanResult};
pub use renderer::VulkanBackend;
