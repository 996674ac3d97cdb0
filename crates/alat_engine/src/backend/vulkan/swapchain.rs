//! Per-window swapchain
//!
//! Creation and recreation share one path; recreation passes the old handle
//! so the driver can reuse its images.

use super::context::{VulkanContext, VulkanError, VulkanResult};
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for `surface`, replacing `old_swapchain` if not null
    pub fn new(
        context: &VulkanContext,
        surface: vk::SurfaceKHR,
        framebuffer_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let physical_device = context.physical_device.device;
        let surface_loader = &context.surface_loader;

        let surface_caps =
            unsafe { surface_loader.get_physical_device_surface_capabilities(physical_device, surface)? };
        let surface_formats =
            unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface)? };
        let present_modes =
            unsafe { surface_loader.get_physical_device_surface_present_modes(physical_device, surface)? };

        let format = choose_format(&surface_formats)?;
        let present_mode = choose_present_mode(&present_modes);

        let extent = if surface_caps.current_extent.width == u32::MAX {
            vk::Extent2D {
                width: framebuffer_extent
                    .width
                    .clamp(surface_caps.min_image_extent.width, surface_caps.max_image_extent.width),
                height: framebuffer_extent
                    .height
                    .clamp(surface_caps.min_image_extent.height, surface_caps.max_image_extent.height),
            }
        } else {
            surface_caps.current_extent
        };

        let image_count = if surface_caps.max_image_count > 0 {
            (surface_caps.min_image_count + 1).min(surface_caps.max_image_count)
        } else {
            surface_caps.min_image_count + 1
        };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let device = context.raw_device().clone();
        let loader = context.device.swapchain_loader.clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(err) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(err.into());
            }
        };

        let mut chain = Self {
            device,
            loader,
            swapchain,
            image_views: Vec::with_capacity(images.len()),
            format,
            extent,
        };
        for image in images {
            let view = create_image_view(&chain.device, image, format.format)?;
            chain.image_views.push(view);
        }
        Ok(chain)
    }

    /// Swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image views in swapchain image order
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain extension loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.loader
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Prefer a linear 8-bit format so clear colors are written unchanged
fn choose_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_UNORM && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))
}

/// Prefer modes that never block the executor on vsync
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Create a 2D color view of `image`
pub fn create_image_view(device: &Device, image: vk::Image, format: vk::Format) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    Ok(unsafe { device.create_image_view(&create_info, None)? })
}
