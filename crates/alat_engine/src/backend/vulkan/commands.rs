//! Command pool shared by every window

use super::context::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&create_info, None)? };
        Ok(Self { device, command_pool })
    }

    /// Allocate one primary command buffer
    pub fn allocate(&self) -> VulkanResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info)? };
        buffers.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Driver returned no command buffer".to_string(),
        })
    }

    /// Return a command buffer to the pool
    pub fn free(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, &[command_buffer]);
        }
    }

    /// Record commands with `record`, submit them to `queue` and wait
    pub fn submit_and_wait(
        &self,
        queue: vk::Queue,
        record: impl FnOnce(&Device, vk::CommandBuffer),
    ) -> VulkanResult<()> {
        let command_buffer = self.allocate()?;
        let result = self.record_and_submit(queue, command_buffer, record);
        self.free(command_buffer);
        result
    }

    fn record_and_submit(
        &self,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(&Device, vk::CommandBuffer),
    ) -> VulkanResult<()> {
        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device.begin_command_buffer(command_buffer, &begin_info)?;
            record(&self.device, command_buffer);
            self.device.end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
            self.device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
            self.device.queue_wait_idle(queue)?;
        }
        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
