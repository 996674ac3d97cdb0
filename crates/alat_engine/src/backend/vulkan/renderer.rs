//! Vulkan implementation of [`GraphicsBackend`]
//!
//! GLFW is initialized when the backend is created. The Vulkan instance and
//! device are created with the first window, because device selection needs a
//! surface to check presentation support. Later windows share that device.

use super::buffer::GpuMesh;
use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanInstance};
use super::shader::QuadShaders;
use super::surface_target::{QuadDraw, SurfaceHandle, SurfaceTarget};
use super::texture::{GpuTexture, TextureBindings};
use super::window::GlfwWindow;
use crate::core::config::RendererConfig;
use crate::graphics::{
    Color, GraphicsBackend, GraphicsError, GraphicsResult, Key, MeshData, MeshId, SurfaceId,
    TextureId, WindowDesc,
};
use ash::extensions::khr::Surface;
use ash::vk;
use image::RgbaImage;
use slotmap::SlotMap;
use std::path::Path;

fn log_glfw_error(error: glfw::Error, description: String) {
    log::error!("GLFW error {error:?}: {description}");
}

/// Device-level state shared by every window
///
/// Fields drop in declaration order: windows and resources go before the
/// pool and the device.
struct Gpu {
    targets: SlotMap<SurfaceId, SurfaceTarget>,
    meshes: SlotMap<MeshId, GpuMesh>,
    textures: SlotMap<TextureId, GpuTexture>,
    shaders: Option<QuadShaders>,
    bindings: TextureBindings,
    command_pool: CommandPool,
    context: VulkanContext,
}

impl Gpu {
    /// Create instance and device from the first window
    fn bootstrap(
        glfw: &glfw::Glfw,
        window: &mut GlfwWindow,
        config: &RendererConfig,
    ) -> Result<(Self, SurfaceHandle), VulkanError> {
        let extensions = glfw.get_required_instance_extensions().ok_or_else(|| {
            VulkanError::InitializationFailed("GLFW reports no Vulkan support".to_string())
        })?;

        let instance = VulkanInstance::new(
            &extensions,
            &config.application_name,
            config.validation_enabled(),
        )?;
        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window.create_vulkan_surface(instance.instance.handle())?;
        let context = VulkanContext::new(instance, surface, surface_loader.clone())?;
        let surface = SurfaceHandle::new(surface_loader, surface);

        let bindings = TextureBindings::new(context.raw_device().clone())?;
        let command_pool = CommandPool::new(
            context.raw_device().clone(),
            context.physical_device.graphics_family,
        )?;

        log::info!("Vulkan device ready");
        Ok((
            Self {
                targets: SlotMap::with_key(),
                meshes: SlotMap::with_key(),
                textures: SlotMap::with_key(),
                shaders: None,
                bindings,
                command_pool,
                context,
            },
            surface,
        ))
    }

    /// Create a surface for a later window on the existing device
    fn surface_for(&self, window: &mut GlfwWindow) -> Result<SurfaceHandle, VulkanError> {
        let raw = window.create_vulkan_surface(self.context.instance().handle())?;
        let surface = SurfaceHandle::new(self.context.surface_loader.clone(), raw);

        if self.context.supports_surface(surface.handle())? {
            Ok(surface)
        } else {
            Err(VulkanError::InitializationFailed(
                "Selected GPU cannot present to the new window".to_string(),
            ))
        }
    }

    fn load_shaders(&mut self, config: &RendererConfig) -> GraphicsResult<&QuadShaders> {
        if self.shaders.is_none() {
            let shaders = QuadShaders::load(
                self.context.raw_device(),
                Path::new(&config.shaders.vertex_shader_path),
                Path::new(&config.shaders.fragment_shader_path),
            )
            .map_err(|e| GraphicsError::Shader(e.to_string()))?;
            self.shaders = Some(shaders);
        }
        self.shaders
            .as_ref()
            .ok_or_else(|| GraphicsError::Shader("shaders unavailable".to_string()))
    }

    fn resolve_quad(&self, mesh: MeshId, texture: TextureId) -> GraphicsResult<QuadDraw> {
        let mesh = self.meshes.get(mesh).ok_or(GraphicsError::UnknownMesh)?;
        let texture = self.textures.get(texture).ok_or(GraphicsError::UnknownTexture)?;
        Ok(QuadDraw {
            vertices: mesh.vertices.handle(),
            indices: mesh.indices.handle(),
            index_count: mesh.index_count,
            descriptor_set: texture.descriptor_set(),
        })
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        self.context.wait_idle();
    }
}

/// GLFW windows presented through Vulkan
pub struct VulkanBackend {
    gpu: Option<Gpu>,
    glfw: glfw::Glfw,
    config: RendererConfig,
}

impl VulkanBackend {
    /// Initialize GLFW
    ///
    /// Must be called on the thread that will run the command executor.
    pub fn new(config: &RendererConfig) -> GraphicsResult<Self> {
        let glfw = glfw::init(log_glfw_error)
            .map_err(|e| GraphicsError::Backend(format!("Failed to initialize GLFW: {e:?}")))?;
        if !glfw.vulkan_supported() {
            return Err(GraphicsError::Backend("Vulkan is not supported on this system".to_string()));
        }

        if let Err(err) = config.shaders.validate() {
            log::warn!("{err}; QR windows will fail until the shaders are built");
        }

        Ok(Self {
            gpu: None,
            glfw,
            config: config.clone(),
        })
    }

    fn gpu_mut(&mut self) -> GraphicsResult<&mut Gpu> {
        self.gpu
            .as_mut()
            .ok_or_else(|| GraphicsError::Backend("No GPU context; open a window first".to_string()))
    }

    fn target_mut(&mut self, surface: SurfaceId) -> GraphicsResult<&mut SurfaceTarget> {
        self.gpu_mut()?
            .targets
            .get_mut(surface)
            .ok_or(GraphicsError::UnknownSurface)
    }

    fn target(&self, surface: SurfaceId) -> Option<&SurfaceTarget> {
        self.gpu.as_ref().and_then(|gpu| gpu.targets.get(surface))
    }
}

impl GraphicsBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn create_window(&mut self, desc: &WindowDesc) -> GraphicsResult<SurfaceId> {
        let mut window = GlfwWindow::new(&mut self.glfw, desc)
            .ok_or_else(|| GraphicsError::WindowCreation("GLFW could not open a window".to_string()))?;

        let surface = if let Some(gpu) = self.gpu.as_ref() {
            gpu.surface_for(&mut window)
        } else {
            let (gpu, surface) = Gpu::bootstrap(&self.glfw, &mut window, &self.config)
                .map_err(|e| GraphicsError::WindowCreation(e.to_string()))?;
            self.gpu = Some(gpu);
            Ok(surface)
        }
        .map_err(|e| GraphicsError::WindowCreation(e.to_string()))?;

        let gpu = self.gpu_mut()?;
        let target = SurfaceTarget::new(&gpu.context, &gpu.command_pool, window, surface)
            .map_err(|e| GraphicsError::WindowCreation(e.to_string()))?;

        let id = gpu.targets.insert(target);
        log::debug!("Opened window {id:?} ({}x{})", desc.width, desc.height);
        Ok(id)
    }

    fn destroy_window(&mut self, surface: SurfaceId) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.context.wait_idle();
        if let Some(target) = gpu.targets.remove(surface) {
            gpu.command_pool.free(target.command_buffer());
            log::debug!("Closed window {surface:?}");
        }
    }

    fn set_title(&mut self, surface: SurfaceId, title: &str) -> GraphicsResult<()> {
        self.target_mut(surface)?.window_mut().set_title(title);
        Ok(())
    }

    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32) -> GraphicsResult<()> {
        let target = self.target_mut(surface)?;
        target.window_mut().set_size(width, height);
        target.mark_rebuild();
        Ok(())
    }

    fn should_close(&self, surface: SurfaceId) -> bool {
        self.target(surface).map_or(true, |target| target.window().should_close())
    }

    fn set_should_close(&mut self, surface: SurfaceId, should_close: bool) {
        if let Ok(target) = self.target_mut(surface) {
            target.window_mut().set_should_close(should_close);
        }
    }

    fn is_key_pressed(&self, surface: SurfaceId, key: Key) -> bool {
        match key {
            Key::Escape => self
                .target(surface)
                .is_some_and(|target| target.window().escape_pressed()),
        }
    }

    fn create_mesh(&mut self, surface: SurfaceId, mesh: &MeshData) -> GraphicsResult<MeshId> {
        let config = self.config.clone();
        let gpu = self.gpu_mut()?;
        if !gpu.targets.contains_key(surface) {
            return Err(GraphicsError::UnknownSurface);
        }

        gpu.load_shaders(&config)?;
        let Gpu {
            targets,
            meshes,
            shaders,
            bindings,
            context,
            ..
        } = gpu;
        let shaders = shaders
            .as_ref()
            .ok_or_else(|| GraphicsError::Shader("shaders unavailable".to_string()))?;
        let target = targets.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target
            .ensure_pipeline(context.raw_device(), shaders, bindings.layout())
            .map_err(|e| GraphicsError::Shader(e.to_string()))?;

        let uploaded = GpuMesh::new(context, mesh)?;
        Ok(meshes.insert(uploaded))
    }

    fn destroy_mesh(&mut self, mesh: MeshId) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.context.wait_idle();
            gpu.meshes.remove(mesh);
        }
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> GraphicsResult<TextureId> {
        let gpu = self.gpu_mut()?;
        let texture = GpuTexture::upload(&gpu.context, &gpu.command_pool, &gpu.bindings, image)
            .map_err(|e| GraphicsError::TextureUpload(e.to_string()))?;
        Ok(gpu.textures.insert(texture))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.context.wait_idle();
            gpu.textures.remove(texture);
        }
    }

    fn clear(&mut self, surface: SurfaceId, color: Color) -> GraphicsResult<()> {
        self.target_mut(surface)?.set_clear(color);
        Ok(())
    }

    fn draw_textured_mesh(
        &mut self,
        surface: SurfaceId,
        mesh: MeshId,
        texture: TextureId,
    ) -> GraphicsResult<()> {
        let gpu = self.gpu_mut()?;
        if !gpu.meshes.contains_key(mesh) {
            return Err(GraphicsError::UnknownMesh);
        }
        if !gpu.textures.contains_key(texture) {
            return Err(GraphicsError::UnknownTexture);
        }
        let target = gpu.targets.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target.set_quad(mesh, texture);
        Ok(())
    }

    fn present(&mut self, surface: SurfaceId) -> GraphicsResult<()> {
        let gpu = self.gpu_mut()?;
        let pending = gpu
            .targets
            .get(surface)
            .ok_or(GraphicsError::UnknownSurface)?
            .pending();
        let quad = pending
            .quad
            .map(|(mesh, texture)| gpu.resolve_quad(mesh, texture))
            .transpose()?;

        let texture_layout: vk::DescriptorSetLayout = gpu.bindings.layout();
        let Gpu {
            targets,
            shaders,
            context,
            ..
        } = gpu;
        let target = targets.get_mut(surface).ok_or(GraphicsError::UnknownSurface)?;
        target.render(context, quad, shaders.as_ref(), texture_layout)?;
        Ok(())
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
        if let Some(gpu) = self.gpu.as_mut() {
            for target in gpu.targets.values_mut() {
                if target.window().drain_resize_events() {
                    target.mark_rebuild();
                }
            }
        }
    }
}
