//! Sampled RGBA textures
//!
//! Every texture owns a descriptor set allocated from the shared
//! [`TextureBindings`] pool, so drawing only binds that set.

use super::buffer::{find_memory_type, Buffer};
use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::swapchain::create_image_view;
use ash::{vk, Device};
use image::RgbaImage;

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Upper bound on live textures
const MAX_TEXTURES: u32 = 256;

/// Descriptor layout, pool and sampler shared by every texture
pub struct TextureBindings {
    device: Device,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sampler: vk::Sampler,
}

impl TextureBindings {
    /// Create the shared texture binding objects
    pub fn new(device: Device) -> VulkanResult<Self> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .build()];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        // Partially built bindings clean up through Drop
        let mut created = Self {
            device,
            layout,
            pool: vk::DescriptorPool::null(),
            sampler: vk::Sampler::null(),
        };

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: MAX_TEXTURES,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(MAX_TEXTURES)
            .pool_sizes(&pool_sizes);
        created.pool = unsafe { created.device.create_descriptor_pool(&pool_info, None)? };

        // Nearest filtering keeps QR modules sharp
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS);
        created.sampler = unsafe { created.device.create_sampler(&sampler_info, None)? };

        Ok(created)
    }

    /// Descriptor set layout used by the textured pipeline
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for TextureBindings {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Device-local image with its view and descriptor set
pub struct GpuTexture {
    device: Device,
    pool: vk::DescriptorPool,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    descriptor_set: vk::DescriptorSet,
}

impl GpuTexture {
    /// Upload `image` through a staging buffer
    pub fn upload(
        context: &VulkanContext,
        commands: &CommandPool,
        bindings: &TextureBindings,
        image: &RgbaImage,
    ) -> VulkanResult<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Texture has no pixels".to_string(),
            });
        }
        let extent = vk::Extent3D { width, height, depth: 1 };

        let device = context.raw_device().clone();
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .format(TEXTURE_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);
        let vk_image = unsafe { device.create_image(&image_info, None)? };

        // Every later failure releases what exists so far through Drop
        let mut texture = Self {
            device,
            pool: bindings.pool,
            image: vk_image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            descriptor_set: vk::DescriptorSet::null(),
        };

        let requirements = unsafe { texture.device.get_image_memory_requirements(vk_image) };
        let memory_type_index = find_memory_type(
            context.instance(),
            context.physical_device.device,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        texture.memory = unsafe { texture.device.allocate_memory(&alloc_info, None)? };
        unsafe { texture.device.bind_image_memory(vk_image, texture.memory, 0)? };

        let staging = Buffer::with_bytes(context, vk::BufferUsageFlags::TRANSFER_SRC, image.as_raw())?;
        commands.submit_and_wait(context.device.graphics_queue, |device, command_buffer| {
            record_upload(device, command_buffer, staging.handle(), vk_image, extent);
        })?;
        drop(staging);

        texture.view = create_image_view(&texture.device, vk_image, TEXTURE_FORMAT)?;

        let set_layouts = [bindings.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(bindings.pool)
            .set_layouts(&set_layouts);
        let sets = unsafe { texture.device.allocate_descriptor_sets(&alloc_info)? };
        texture.descriptor_set = sets.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Driver returned no descriptor set".to_string(),
        })?;

        let image_infos = [vk::DescriptorImageInfo {
            sampler: bindings.sampler,
            image_view: texture.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let writes = [vk::WriteDescriptorSet::builder()
            .dst_set(texture.descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos)
            .build()];
        unsafe { texture.device.update_descriptor_sets(&writes, &[]) };

        Ok(texture)
    }

    /// Descriptor set binding this texture
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        unsafe {
            if self.descriptor_set != vk::DescriptorSet::null() {
                let _ = self.device.free_descriptor_sets(self.pool, &[self.descriptor_set]);
            }
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn record_upload(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    staging: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent3D,
) {
    let to_transfer = vk::ImageMemoryBarrier::builder()
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range())
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .build();

    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        })
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(extent)
        .build();

    let to_shader = vk::ImageMemoryBarrier::builder()
        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range())
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ)
        .build();

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_transfer],
        );
        device.cmd_copy_buffer_to_image(
            command_buffer,
            staging,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_shader],
        );
    }
}
