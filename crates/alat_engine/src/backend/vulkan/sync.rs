//! Synchronization primitives for one window's frame

use super::context::VulkanResult;
use ash::{vk, Device};

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    /// Wait for the fence to be signaled
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout)? };
        Ok(())
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Objects pacing a single in-flight frame
pub struct FrameSync {
    /// Signaled when the swapchain image is ready
    pub image_available: Semaphore,
    /// Signaled when rendering has finished
    pub render_finished: Semaphore,
    /// Signaled when the frame's command buffer may be reused
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects; the fence starts signaled
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}
