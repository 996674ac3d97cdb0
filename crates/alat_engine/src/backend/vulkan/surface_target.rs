//! Everything one on-screen window needs to present frames
//!
//! A [`SurfaceTarget`] owns its GLFW window, Vulkan surface, swapchain and
//! per-frame objects. Frames are recorded and submitted in [`SurfaceTarget::render`],
//! which the backend calls from `present`.

use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::render_pass::{Framebuffers, RenderPass};
use super::shader::{QuadShaders, TexturedQuadPipeline};
use super::swapchain::Swapchain;
use super::sync::FrameSync;
use super::window::GlfwWindow;
use crate::graphics::{Color, MeshId, TextureId};
use ash::extensions::khr::Surface;
use ash::{vk, Device};

/// Vulkan surface destroyed on drop
pub struct SurfaceHandle {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl SurfaceHandle {
    /// Take ownership of `surface`
    pub fn new(loader: Surface, surface: vk::SurfaceKHR) -> Self {
        Self { loader, surface }
    }

    /// Surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Drawing requested for the next frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameOp {
    /// Clear color; black when nothing was requested
    pub clear: Color,
    /// Mesh and texture to draw after clearing
    pub quad: Option<(MeshId, TextureId)>,
}

/// Raw handles of a resolved textured draw
#[derive(Debug, Clone, Copy)]
pub struct QuadDraw {
    /// Vertex buffer
    pub vertices: vk::Buffer,
    /// Index buffer
    pub indices: vk::Buffer,
    /// Number of indices
    pub index_count: u32,
    /// Texture descriptor set
    pub descriptor_set: vk::DescriptorSet,
}

/// Presentation state of one window
///
/// Fields drop in declaration order: GPU objects go before the swapchain,
/// the swapchain before its surface and the surface before its window.
pub struct SurfaceTarget {
    sync: FrameSync,
    command_buffer: vk::CommandBuffer,
    pipeline: Option<TexturedQuadPipeline>,
    framebuffers: Framebuffers,
    render_pass: RenderPass,
    swapchain: Swapchain,
    surface: SurfaceHandle,
    window: GlfwWindow,
    pending: FrameOp,
    needs_rebuild: bool,
}

impl SurfaceTarget {
    /// Build swapchain and frame objects for `window`
    pub fn new(
        context: &VulkanContext,
        commands: &CommandPool,
        window: GlfwWindow,
        surface: SurfaceHandle,
    ) -> VulkanResult<Self> {
        let device = context.raw_device().clone();
        let swapchain = Swapchain::new(
            context,
            surface.handle(),
            extent_of(&window),
            vk::SwapchainKHR::null(),
        )?;
        let render_pass = RenderPass::new_color_pass(device.clone(), swapchain.format().format)?;
        let framebuffers = Framebuffers::new(
            device.clone(),
            &render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        let sync = FrameSync::new(&device)?;
        let command_buffer = commands.allocate()?;

        Ok(Self {
            sync,
            command_buffer,
            pipeline: None,
            framebuffers,
            render_pass,
            swapchain,
            surface,
            window,
            pending: FrameOp::default(),
            needs_rebuild: false,
        })
    }

    /// The GLFW window
    pub fn window(&self) -> &GlfwWindow {
        &self.window
    }

    /// The GLFW window, mutably
    pub fn window_mut(&mut self) -> &mut GlfwWindow {
        &mut self.window
    }

    /// Command buffer to return to the pool once the target is gone
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Replace the frame content with a clear
    pub fn set_clear(&mut self, color: Color) {
        self.pending = FrameOp { clear: color, quad: None };
    }

    /// Add a textured draw to the frame content
    pub fn set_quad(&mut self, mesh: MeshId, texture: TextureId) {
        self.pending.quad = Some((mesh, texture));
    }

    /// Frame content requested since the last render
    pub fn pending(&self) -> FrameOp {
        self.pending
    }

    /// Recreate the swapchain before the next frame
    pub fn mark_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    /// Create the textured pipeline if it does not exist yet
    pub fn ensure_pipeline(
        &mut self,
        device: &Device,
        shaders: &QuadShaders,
        texture_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<()> {
        if self.pipeline.is_none() {
            self.pipeline = Some(TexturedQuadPipeline::new(
                device.clone(),
                self.render_pass.handle(),
                shaders,
                texture_layout,
            )?);
        }
        Ok(())
    }

    /// Record, submit and present one frame
    ///
    /// Minimized windows skip the frame. Out-of-date swapchains are rebuilt
    /// on the next call.
    pub fn render(
        &mut self,
        context: &VulkanContext,
        quad: Option<QuadDraw>,
        shaders: Option<&QuadShaders>,
        texture_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<()> {
        let clear = self.pending.clear;
        self.pending = FrameOp::default();

        let extent = extent_of(&self.window);
        if extent.width == 0 || extent.height == 0 {
            return Ok(());
        }
        if self.needs_rebuild {
            self.rebuild(context, shaders, texture_layout)?;
        }

        self.sync.in_flight.wait(u64::MAX)?;

        let acquired = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                self.sync.image_available.handle(),
                vk::Fence::null(),
            )
        };
        let image_index = match acquired {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.needs_rebuild = true;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        self.sync.in_flight.reset()?;
        self.record(context.raw_device(), image_index, clear, quad)?;

        let wait_semaphores = [self.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished.handle()];
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        unsafe {
            context.raw_device().queue_submit(
                context.device.graphics_queue,
                &[submit_info],
                self.sync.in_flight.handle(),
            )?;
        }

        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let presented = unsafe {
            self.swapchain
                .loader()
                .queue_present(context.device.present_queue, &present_info)
        };
        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => {
                self.needs_rebuild = true;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn record(
        &self,
        device: &Device,
        image_index: u32,
        clear: Color,
        quad: Option<QuadDraw>,
    ) -> VulkanResult<()> {
        let framebuffer = self.framebuffers.get(image_index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("No framebuffer for swapchain image {image_index}"),
        })?;
        let extent = self.swapchain.extent();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear.to_f32_array(),
            },
        }];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        unsafe {
            device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(self.command_buffer, &vk::CommandBufferBeginInfo::builder())?;
            device.cmd_begin_render_pass(self.command_buffer, &pass_info, vk::SubpassContents::INLINE);

            if let (Some(draw), Some(pipeline)) = (quad, self.pipeline.as_ref()) {
                #[allow(clippy::cast_precision_loss)]
                let viewport = vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                };
                device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
                device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
                device.cmd_set_scissor(self.command_buffer, 0, &[render_area]);
                device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[draw.vertices], &[0]);
                device.cmd_bind_index_buffer(self.command_buffer, draw.indices, 0, vk::IndexType::UINT32);
                device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.layout(),
                    0,
                    &[draw.descriptor_set],
                    &[],
                );
                device.cmd_draw_indexed(self.command_buffer, draw.index_count, 1, 0, 0, 0);
            } else if quad.is_some() {
                log::warn!("Textured draw requested before the pipeline was built");
            }

            device.cmd_end_render_pass(self.command_buffer);
            device.end_command_buffer(self.command_buffer)?;
        }
        Ok(())
    }

    fn rebuild(
        &mut self,
        context: &VulkanContext,
        shaders: Option<&QuadShaders>,
        texture_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<()> {
        context.wait_idle();
        let device = context.raw_device().clone();

        let swapchain = Swapchain::new(
            context,
            self.surface.handle(),
            extent_of(&self.window),
            self.swapchain.handle(),
        )?;

        if swapchain.format().format != self.swapchain.format().format {
            log::debug!("Surface format changed to {:?}", swapchain.format().format);
            let had_pipeline = self.pipeline.take().is_some();
            self.render_pass = RenderPass::new_color_pass(device.clone(), swapchain.format().format)?;
            if let (true, Some(shaders)) = (had_pipeline, shaders) {
                self.ensure_pipeline(&device, shaders, texture_layout)?;
            }
        }

        self.framebuffers = Framebuffers::new(device, &self.render_pass, swapchain.image_views(), swapchain.extent())?;
        self.swapchain = swapchain;
        self.needs_rebuild = false;
        Ok(())
    }
}

fn extent_of(window: &GlfwWindow) -> vk::Extent2D {
    let (width, height) = window.framebuffer_size();
    vk::Extent2D { width, height }
}
