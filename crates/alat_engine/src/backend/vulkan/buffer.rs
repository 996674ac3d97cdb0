//! Host-visible buffers for mesh data

use super::context::{VulkanContext, VulkanError, VulkanResult};
use crate::graphics::MeshData;
use ash::{vk, Device, Instance};

/// Buffer wrapper with its own memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer backed by memory with `properties`
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device().clone();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory = find_memory_type(
            context.instance(),
            context.physical_device.device,
            requirements.memory_type_bits,
            properties,
        )
        .and_then(|memory_type_index| {
            let alloc_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type_index);
            Ok(unsafe { device.allocate_memory(&alloc_info, None)? })
        });
        let memory = match memory {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        let created = Self {
            device,
            buffer,
            memory,
            size,
        };
        unsafe { created.device.bind_buffer_memory(buffer, memory, 0)? };
        Ok(created)
    }

    /// Create a host-visible buffer holding `bytes`
    pub fn with_bytes(context: &VulkanContext, usage: vk::BufferUsageFlags, bytes: &[u8]) -> VulkanResult<Self> {
        let buffer = Self::new(
            context,
            bytes.len() as vk::DeviceSize,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(bytes)?;
        Ok(buffer)
    }

    /// Copy `bytes` to the start of the buffer
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("{} bytes do not fit a {}-byte buffer", bytes.len(), self.size),
            });
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?
                .cast::<u8>();
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Vertex and index buffers for one mesh
pub struct GpuMesh {
    /// Interleaved position and texture coordinates
    pub vertices: Buffer,
    /// Triangle list indices
    pub indices: Buffer,
    /// Number of indices to draw
    pub index_count: u32,
}

impl GpuMesh {
    /// Upload `mesh`
    pub fn new(context: &VulkanContext, mesh: &MeshData) -> VulkanResult<Self> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Mesh has no geometry".to_string(),
            });
        }

        let vertices = Buffer::with_bytes(
            context,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(mesh.vertices.as_slice()),
        )?;
        let indices = Buffer::with_bytes(
            context,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(mesh.indices.as_slice()),
        )?;

        Ok(Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        })
    }
}

/// Find a memory type index matching `type_filter` with `properties`
pub fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    (0..mem_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && mem_properties.memory_types[i as usize].property_flags.contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}
