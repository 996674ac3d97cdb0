//! Vulkan context management
//!
//! Instance, physical device selection and logical device creation. The
//! context is built from the first window's surface, since device selection
//! needs a surface to check presentation support.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the extensions GLFW needs
    ///
    /// Validation is only enabled when requested and the layer is installed.
    pub fn new(required_extensions: &[String], app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"alat")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {e}")))?;
        let mut extensions: Vec<*const std::ffi::c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && Self::validation_layer_available(&entry);
        if enable_validation && !validation {
            log::warn!("Validation requested but {VALIDATION_LAYER:?} is not installed");
        }

        let mut layers = Vec::new();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(err) => {
                    log::warn!("Failed to install Vulkan debug messenger: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        #[allow(unused_unsafe)]
        let layers = unsafe { entry.enumerate_instance_layer_properties() };
        layers
            .map(|layers| {
                layers.iter().any(|layer| {
                    let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    name == VALIDATION_LAYER
                })
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        Ok(unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the first device that can render and present to `surface`
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => {
                    log::info!("Selected GPU: {}", unsafe {
                        CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
                    });
                    return Ok(info);
                }
                Err(err) => log::debug!("Skipping GPU: {err}"),
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;

        for (index, family) in (0u32..).zip(queue_families.iter()) {
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support =
                unsafe { surface_loader.get_physical_device_surface_support(device, index, surface)? };
            if present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let graphics_family = graphics_family
            .ok_or_else(|| VulkanError::InitializationFailed("No graphics queue family found".to_string()))?;
        let present_family = present_family
            .ok_or_else(|| VulkanError::InitializationFailed("No present queue family found".to_string()))?;

        let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "Swapchain extension not supported".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            graphics_family,
            present_family,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with graphics and present queues
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut families = vec![physical_device_info.graphics_family];
        if physical_device_info.present_family != physical_device_info.graphics_family {
            families.push(physical_device_info.present_family);
        }

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions);

        let device = unsafe { instance.create_device(physical_device_info.device, &create_info, None)? };
        let graphics_queue = unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device_info.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Core Vulkan objects shared by every window
///
/// Fields drop in declaration order: the device goes before the instance.
pub struct VulkanContext {
    /// Logical device and queues
    pub device: LogicalDevice,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Vulkan instance and debug utilities
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Select a device able to present to `surface` and create it
    ///
    /// On failure `surface` is destroyed before the instance.
    pub fn new(instance: VulkanInstance, surface: vk::SurfaceKHR, surface_loader: Surface) -> VulkanResult<Self> {
        let selected = PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)
            .and_then(|physical_device| {
                let device = LogicalDevice::new(&instance.instance, &physical_device)?;
                Ok((device, physical_device))
            });

        match selected {
            Ok((device, physical_device)) => Ok(Self {
                device,
                physical_device,
                surface_loader,
                instance,
            }),
            Err(err) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                Err(err)
            }
        }
    }

    /// Raw device handle
    pub fn raw_device(&self) -> &Device {
        &self.device.device
    }

    /// Raw instance handle
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Whether the present queue family can present to `surface`
    pub fn supports_surface(&self, surface: vk::SurfaceKHR) -> VulkanResult<bool> {
        Ok(unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical_device.device,
                self.physical_device.present_family,
                surface,
            )?
        })
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) {
        if let Err(err) = unsafe { self.device.device.device_wait_idle() } {
            log::warn!("device_wait_idle failed: {err:?}");
        }
    }
}
