//! Color-only render pass and its framebuffers

use super::context::VulkanResult;
use ash::{vk, Device};

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Single color attachment cleared on load and presented afterwards
    pub fn new_color_pass(device: Device, color_format: vk::Format) -> VulkanResult<Self> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();
        let attachments = [color_attachment];

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let color_attachments = [color_attachment_ref];

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .build();
        let subpasses = [subpass];

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();
        let dependencies = [dependency];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.create_render_pass(&create_info, None)? };
        Ok(Self { device, render_pass })
    }

    /// Render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// One framebuffer per swapchain image
pub struct Framebuffers {
    device: Device,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    /// Create framebuffers for `views`
    pub fn new(
        device: Device,
        render_pass: &RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let mut created = Self {
            device,
            framebuffers: Vec::with_capacity(views.len()),
        };

        for &view in views {
            let attachments = [view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass.handle())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { created.device.create_framebuffer(&create_info, None)? };
            created.framebuffers.push(framebuffer);
        }
        Ok(created)
    }

    /// Framebuffer for swapchain image `index`
    pub fn get(&self, index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index as usize).copied()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
