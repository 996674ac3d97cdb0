//! SPIR-V loading and the textured quad pipeline

use super::context::{VulkanError, VulkanResult};
use ash::{vk, Device};
use std::ffi::CStr;
use std::path::Path;

const ENTRY_POINT: &CStr = c"main";

/// Bytes per `[x, y, u, v]` vertex
const VERTEX_STRIDE: u32 = 16;

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        let code = ash::util::read_spv(&mut cursor)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V: {e}")))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        Ok(Self { device, module })
    }

    /// Load a shader module from a SPIR-V file
    pub fn from_file(device: Device, path: &Path) -> VulkanResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to read shader file {}: {e}", path.display()))
        })?;
        Self::from_bytes(device, &bytes)
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Vertex and fragment modules loaded once per backend
pub struct QuadShaders {
    /// Vertex stage
    pub vertex: ShaderModule,
    /// Fragment stage
    pub fragment: ShaderModule,
}

impl QuadShaders {
    /// Load both stages
    pub fn load(device: &Device, vertex_path: &Path, fragment_path: &Path) -> VulkanResult<Self> {
        log::debug!(
            "Loading shaders {} and {}",
            vertex_path.display(),
            fragment_path.display()
        );
        Ok(Self {
            vertex: ShaderModule::from_file(device.clone(), vertex_path)?,
            fragment: ShaderModule::from_file(device.clone(), fragment_path)?,
        })
    }
}

/// Pipeline drawing a textured mesh with one combined image sampler
///
/// Viewport and scissor are dynamic so resizes only rebuild the swapchain.
pub struct TexturedQuadPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl TexturedQuadPipeline {
    /// Create the pipeline for `render_pass`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        shaders: &QuadShaders,
        texture_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let shader_stages = [
            shaders.vertex.stage_info(vk::ShaderStageFlags::VERTEX),
            shaders.fragment.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: VERTEX_STRIDE,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attributes = [
            // position
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            // texture coordinates
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 8,
            },
        ];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let set_layouts = [texture_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match created {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(err.into());
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(VulkanError::InvalidOperation {
                reason: "Driver returned no pipeline".to_string(),
            });
        };

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for TexturedQuadPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
