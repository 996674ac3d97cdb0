//! GLFW window wrapper
//!
//! Windows are created without a client API; all rendering goes through a
//! Vulkan surface.

use super::context::{VulkanError, VulkanResult};
use crate::graphics::WindowDesc;
use ash::vk;

fn to_glfw(extent: u32) -> i32 {
    i32::try_from(extent).unwrap_or(i32::MAX)
}

/// One GLFW window and its event queue
pub struct GlfwWindow {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl GlfwWindow {
    /// Open a window for Vulkan rendering
    pub fn new(glfw: &mut glfw::Glfw, desc: &WindowDesc) -> Option<Self> {
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) =
            glfw.create_window(desc.width, desc.height, &desc.title, glfw::WindowMode::Windowed)?;
        window.set_framebuffer_size_polling(true);

        Some(Self { window, events })
    }

    /// Change the title bar text
    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// Resize in screen coordinates
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.window.set_size(to_glfw(width), to_glfw(height));
    }

    /// Whether the close flag is set
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Set or clear the close flag
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Whether the escape key is held
    pub fn escape_pressed(&self) -> bool {
        self.window.get_key(glfw::Key::Escape) == glfw::Action::Press
    }

    /// Framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (u32::try_from(width).unwrap_or(0), u32::try_from(height).unwrap_or(0))
    }

    /// Drain queued events; returns true when the framebuffer was resized
    pub fn drain_resize_events(&self) -> bool {
        let mut resized = false;
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(..) = event {
                resized = true;
            }
        }
        resized
    }

    /// Create a Vulkan surface for this window
    pub fn create_vulkan_surface(&mut self, instance: vk::Instance) -> VulkanResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(VulkanError::InitializationFailed(format!(
                "Failed to create Vulkan surface: {result:?}"
            )))
        }
    }
}
